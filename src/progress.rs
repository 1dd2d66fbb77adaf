//! Weighted progress aggregation over subtask trees.

use crate::config::EngineConfig;
use crate::error::{EngineError, EngineResult};
use crate::repo::GraphRepository;
use crate::types::{Task, TaskStatus};
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use tracing::warn;

/// One subtask's contribution to an aggregate.
#[derive(Debug, Clone, Serialize)]
pub struct SubtaskContribution {
    pub task_id: String,
    pub progress: u8,
    pub weight: f64,
}

/// Result of a progress aggregation.
#[derive(Debug, Clone, Serialize)]
pub struct ProgressResult {
    /// Weighted average progress, 0-100.
    pub progress: u8,
    pub breakdown: Vec<SubtaskContribution>,
    /// True iff every subtask is done (false when there are none).
    pub auto_complete_eligible: bool,
}

/// Computes parent progress from subtrees of subtasks.
pub struct ProgressAggregator<'a> {
    config: &'a EngineConfig,
}

impl<'a> ProgressAggregator<'a> {
    pub fn new(config: &'a EngineConfig) -> Self {
        Self { config }
    }

    /// A single task's own progress: the explicit value when set (clamped to
    /// 100), otherwise derived from status.
    pub fn individual_progress(&self, task: &Task) -> u8 {
        if let Some(progress) = task.progress {
            return progress.min(100);
        }
        match task.status {
            TaskStatus::Done => 100,
            TaskStatus::InProgress => 50,
            TaskStatus::Blocked => 25,
            TaskStatus::Todo | TaskStatus::Archived => 0,
        }
    }

    /// Auto-derived weight: effort capped at three ideal days, scaled by a
    /// priority multiplier, clamped to the configured range. Tasks with no
    /// estimate weigh one ideal day.
    pub fn auto_weight(&self, task: &Task) -> f64 {
        let effort = task
            .estimated_hours
            .map(|h| (h / 8.0).min(3.0))
            .unwrap_or(1.0);
        let multiplier = 1.0 + (task.priority as f64 - 1.0) * 0.2;
        (effort * multiplier).clamp(self.config.weight_min, self.config.weight_max)
    }

    /// Weight for one subtask. Precedence: explicit override (validated),
    /// then the task's weight config, then auto-derivation.
    fn subtask_weight(&self, task: &Task, explicit: Option<f64>) -> EngineResult<f64> {
        if let Some(weight) = explicit {
            if weight < self.config.weight_min || weight > self.config.weight_max {
                return Err(EngineError::invalid_weight(
                    &task.id,
                    weight,
                    self.config.weight_min,
                    self.config.weight_max,
                ));
            }
            return Ok(weight);
        }
        if let Some(config) = task.effective_weight_config() {
            let factor = config.factor;
            if factor < self.config.weight_min || factor > self.config.weight_max {
                warn!(
                    task = %task.id,
                    factor,
                    "stored weight config out of range; clamping"
                );
            }
            return Ok(factor.clamp(self.config.weight_min, self.config.weight_max));
        }
        Ok(self.auto_weight(task))
    }

    /// Aggregate a parent's progress from its direct subtasks.
    ///
    /// With zero subtasks the parent's stored progress is preserved as-is,
    /// never overwritten by a computed zero.
    pub fn calculate_progress(
        &self,
        parent: &Task,
        subtasks: &[Task],
        weights: Option<&HashMap<String, f64>>,
    ) -> EngineResult<ProgressResult> {
        if subtasks.is_empty() {
            return Ok(ProgressResult {
                progress: parent.progress.unwrap_or(0),
                breakdown: Vec::new(),
                auto_complete_eligible: false,
            });
        }

        let mut breakdown = Vec::with_capacity(subtasks.len());
        let mut weighted_sum = 0.0;
        let mut weight_total = 0.0;

        for subtask in subtasks {
            let explicit = weights.and_then(|w| w.get(&subtask.id).copied());
            let weight = self.subtask_weight(subtask, explicit)?;
            let progress = self.individual_progress(subtask);
            weighted_sum += progress as f64 / 100.0 * weight;
            weight_total += weight;
            breakdown.push(SubtaskContribution {
                task_id: subtask.id.clone(),
                progress,
                weight,
            });
        }

        let progress = if weight_total > 0.0 {
            (100.0 * weighted_sum / weight_total).round() as u8
        } else {
            0
        };

        Ok(ProgressResult {
            progress,
            breakdown,
            auto_complete_eligible: subtasks.iter().all(|t| t.status == TaskStatus::Done),
        })
    }

    /// Aggregate through a multi-level subtask tree, bottom-up.
    ///
    /// `tasks` is the full candidate set; children are resolved through
    /// `parent_task_id`. Recursion stops at `max_depth` (capped by the
    /// configured maximum), and a per-path visited set guards against cycles
    /// in the parent relation, which is not otherwise enforced.
    pub fn calculate_hierarchical(
        &self,
        parent_id: &str,
        tasks: &[Task],
        max_depth: usize,
    ) -> EngineResult<ProgressResult> {
        let parent = tasks
            .iter()
            .find(|t| t.id == parent_id)
            .ok_or_else(|| EngineError::task_not_found(parent_id))?;

        let mut children: HashMap<&str, Vec<&Task>> = HashMap::new();
        for task in tasks {
            if let Some(pid) = &task.parent_task_id {
                children.entry(pid.as_str()).or_default().push(task);
            }
        }

        let depth_cap = max_depth.min(self.config.max_hierarchy_depth);
        let mut path: HashSet<String> = HashSet::new();
        self.aggregate_node(parent, &children, depth_cap, &mut path)
    }

    fn aggregate_node(
        &self,
        node: &Task,
        children: &HashMap<&str, Vec<&Task>>,
        depth_remaining: usize,
        path: &mut HashSet<String>,
    ) -> EngineResult<ProgressResult> {
        let direct = children
            .get(node.id.as_str())
            .map(Vec::as_slice)
            .unwrap_or(&[]);

        if direct.is_empty() || depth_remaining == 0 {
            let progress = self.individual_progress(node);
            return Ok(ProgressResult {
                progress,
                breakdown: Vec::new(),
                auto_complete_eligible: node.status == TaskStatus::Done,
            });
        }

        if !path.insert(node.id.clone()) {
            warn!(task = %node.id, "cycle in parent relation; treating as leaf");
            return Ok(ProgressResult {
                progress: self.individual_progress(node),
                breakdown: Vec::new(),
                auto_complete_eligible: false,
            });
        }

        let mut breakdown = Vec::with_capacity(direct.len());
        let mut weighted_sum = 0.0;
        let mut weight_total = 0.0;
        let mut all_done = true;

        for child in direct {
            if path.contains(child.id.as_str()) {
                warn!(task = %child.id, "cycle in parent relation; skipping child");
                all_done = false;
                continue;
            }
            let child_result = self.aggregate_node(child, children, depth_remaining - 1, path)?;
            let weight = self.subtask_weight(child, None)?;
            weighted_sum += child_result.progress as f64 / 100.0 * weight;
            weight_total += weight;
            all_done &= child_result.auto_complete_eligible || child.status == TaskStatus::Done;
            breakdown.push(SubtaskContribution {
                task_id: child.id.clone(),
                progress: child_result.progress,
                weight,
            });
        }

        path.remove(&node.id);

        let progress = if weight_total > 0.0 {
            (100.0 * weighted_sum / weight_total).round() as u8
        } else {
            self.individual_progress(node)
        };

        let auto_complete_eligible = !breakdown.is_empty() && all_done;
        Ok(ProgressResult {
            progress,
            breakdown,
            auto_complete_eligible,
        })
    }
}

/// Persist a computed aggregate back through the repository.
pub fn apply_progress<R: GraphRepository>(
    repo: &R,
    task_id: &str,
    result: &ProgressResult,
) -> EngineResult<()> {
    repo.update_task_progress(task_id, result.progress)?;
    Ok(())
}
