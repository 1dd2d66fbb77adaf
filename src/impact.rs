//! Impact and scheduling analysis for a single task.
//!
//! Answers "what happens downstream if this task slips" and "what must land
//! before it can start", plus scheduling helpers: parallel grouping,
//! dependency depth, and earliest start dates. All analyses are advisory and
//! may run on a non-transactional snapshot.

use crate::config::EngineConfig;
use crate::error::{EngineError, EngineResult};
use crate::graph::DependencyGraph;
use crate::types::Task;
use chrono::{Duration, NaiveDate};
use serde::Serialize;
use std::collections::{HashMap, HashSet, VecDeque};
use tracing::warn;

/// Risk classification derived from the impact score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

/// Result of analyzing one task's blast radius.
#[derive(Debug, Clone, Serialize)]
pub struct ImpactAnalysis {
    pub task_id: String,
    /// Immediate reverse-adjacency, sorted by id.
    pub direct_dependents: Vec<String>,
    /// Transitively reachable dependents beyond the direct ones, sorted.
    pub indirect_dependents: Vec<String>,
    /// Everything that must complete before this task can start, sorted.
    pub upstream: Vec<String>,
    pub impact_score: f64,
    pub risk_level: RiskLevel,
}

pub struct ImpactAnalyzer<'a> {
    config: &'a EngineConfig,
}

enum Direction {
    /// Follow dependents (who is blocked by this task).
    Downstream,
    /// Follow dependencies (what blocks this task).
    Upstream,
}

impl<'a> ImpactAnalyzer<'a> {
    pub fn new(config: &'a EngineConfig) -> Self {
        Self { config }
    }

    /// All nodes transitively reachable from `start`, excluding `start`.
    ///
    /// Visited-set guarded and capped at `max_traversal_visits`, so corrupted
    /// cyclic data degrades to a partial set rather than a hang.
    fn reachable(
        &self,
        graph: &DependencyGraph,
        start: &str,
        direction: Direction,
    ) -> HashSet<String> {
        let mut visited: HashSet<String> = HashSet::new();
        let mut queue: VecDeque<&str> = VecDeque::new();
        queue.push_back(start);
        let mut seen: HashSet<&str> = HashSet::new();
        seen.insert(start);
        let mut visits = 0usize;

        while let Some(current) = queue.pop_front() {
            visits += 1;
            if visits > self.config.max_traversal_visits {
                warn!(start, "traversal cap hit; returning partial reachability");
                break;
            }
            let next = match direction {
                Direction::Downstream => graph.dependents_of(current),
                Direction::Upstream => graph.dependencies_of(current),
            };
            for id in next {
                if seen.insert(id) {
                    visited.insert(id.clone());
                    queue.push_back(id);
                }
            }
        }

        visited
    }

    /// Analyze the downstream blast radius and upstream requirements of one
    /// task. `today` anchors the due-date multipliers.
    pub fn analyze(
        &self,
        graph: &DependencyGraph,
        tasks: &[Task],
        task_id: &str,
        today: NaiveDate,
    ) -> EngineResult<ImpactAnalysis> {
        if !graph.contains(task_id) {
            return Err(EngineError::task_not_found(task_id));
        }
        let task = tasks
            .iter()
            .find(|t| t.id == task_id)
            .ok_or_else(|| EngineError::task_not_found(task_id))?;

        let mut direct: Vec<String> = graph.dependents_of(task_id).to_vec();
        direct.sort();
        let direct_set: HashSet<&String> = direct.iter().collect();

        let mut indirect: Vec<String> = self
            .reachable(graph, task_id, Direction::Downstream)
            .into_iter()
            .filter(|id| !direct_set.contains(id))
            .collect();
        indirect.sort();

        let mut upstream: Vec<String> = self
            .reachable(graph, task_id, Direction::Upstream)
            .into_iter()
            .collect();
        upstream.sort();

        let base = 3.0 * direct.len() as f64 + indirect.len() as f64;
        let mut score = base * (1.0 + task.priority as f64 / 5.0);
        if let Some(due) = task.due_date {
            if due < today {
                score *= self.config.overdue_multiplier;
            } else if due <= today + Duration::days(self.config.due_soon_days) {
                score *= self.config.due_soon_multiplier;
            }
        }

        let risk_level = if score > self.config.risk_high_threshold {
            RiskLevel::High
        } else if score > self.config.risk_medium_threshold {
            RiskLevel::Medium
        } else {
            RiskLevel::Low
        };

        Ok(ImpactAnalysis {
            task_id: task_id.to_string(),
            direct_dependents: direct,
            indirect_dependents: indirect,
            upstream,
            impact_score: score,
            risk_level,
        })
    }

    /// Partition `candidates` into groups with no dependency relation between
    /// any two members, so each group can execute in parallel.
    ///
    /// Greedy: seed a group with the first unprocessed candidate and add every
    /// later unprocessed candidate that conflicts with no member. This is an
    /// approximation; it does not minimize the number of groups.
    pub fn parallel_groups(
        &self,
        graph: &DependencyGraph,
        candidates: &[String],
    ) -> Vec<Vec<String>> {
        // Upstream reachability per candidate; a and b conflict iff one is
        // upstream of the other.
        let upstream: HashMap<&str, HashSet<String>> = candidates
            .iter()
            .map(|id| {
                (
                    id.as_str(),
                    self.reachable(graph, id, Direction::Upstream),
                )
            })
            .collect();
        let conflicts = |a: &str, b: &str| -> bool {
            upstream.get(a).is_some_and(|set| set.contains(b))
                || upstream.get(b).is_some_and(|set| set.contains(a))
        };

        let mut processed: HashSet<&str> = HashSet::new();
        let mut groups: Vec<Vec<String>> = Vec::new();

        for seed in candidates {
            if !processed.insert(seed.as_str()) {
                continue;
            }
            let mut group = vec![seed.clone()];
            for other in candidates {
                if processed.contains(other.as_str()) {
                    continue;
                }
                if group.iter().all(|member| !conflicts(member, other)) {
                    processed.insert(other.as_str());
                    group.push(other.clone());
                }
            }
            groups.push(group);
        }

        groups
    }

    /// Length of the longest upstream chain below `task_id` (0 for roots).
    pub fn dependency_depth(&self, graph: &DependencyGraph, task_id: &str) -> usize {
        let mut memo: HashMap<String, usize> = HashMap::new();
        self.depth_walk(graph, task_id, &mut memo, &mut HashSet::new())
    }

    fn depth_walk(
        &self,
        graph: &DependencyGraph,
        task_id: &str,
        memo: &mut HashMap<String, usize>,
        path: &mut HashSet<String>,
    ) -> usize {
        if let Some(&depth) = memo.get(task_id) {
            return depth;
        }
        if !path.insert(task_id.to_string()) {
            // Cycle in corrupted data; treat the back edge as depth 0.
            warn!(task = task_id, "cycle encountered during depth walk");
            return 0;
        }
        let depth = graph
            .dependencies_of(task_id)
            .iter()
            .map(|dep| self.depth_walk(graph, dep, memo, path) + 1)
            .max()
            .unwrap_or(0);
        path.remove(task_id);
        memo.insert(task_id.to_string(), depth);
        depth
    }

    /// Earliest start date per task: roots start at `project_start`; every
    /// other task starts at the max over its dependencies of the dependency's
    /// earliest start plus its estimated duration in whole days.
    pub fn earliest_start_dates(
        &self,
        graph: &DependencyGraph,
        tasks: &[Task],
        project_start: NaiveDate,
    ) -> HashMap<String, NaiveDate> {
        let by_id: HashMap<&str, &Task> = tasks.iter().map(|t| (t.id.as_str(), t)).collect();
        let duration_days = |id: &str| -> i64 {
            let hours = by_id
                .get(id)
                .and_then(|t| t.estimated_hours)
                .unwrap_or(self.config.default_duration_hours);
            ((hours / self.config.hours_per_day).ceil() as i64).max(1)
        };

        // Kahn order so every dependency is dated before its dependents.
        let mut remaining: HashMap<&str, usize> = graph
            .ids()
            .map(|id| (id, graph.dependencies_of(id).len()))
            .collect();
        let mut queue: VecDeque<&str> = graph.roots().iter().map(String::as_str).collect();
        let mut earliest: HashMap<String, NaiveDate> = HashMap::new();

        while let Some(id) = queue.pop_front() {
            let start = graph
                .dependencies_of(id)
                .iter()
                .filter_map(|dep| {
                    earliest
                        .get(dep.as_str())
                        .map(|&d| d + Duration::days(duration_days(dep)))
                })
                .max()
                .unwrap_or(project_start);
            earliest.insert(id.to_string(), start);

            for dependent in graph.dependents_of(id) {
                if let Some(rem) = remaining.get_mut(dependent.as_str()) {
                    *rem -= 1;
                    if *rem == 0 {
                        queue.push_back(dependent);
                    }
                }
            }
        }

        earliest
    }
}
