//! Core types for the task dependency engine.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Task priority as an integer (higher = more important).
/// Default is 5. Typical range: 1 to 10.
pub type Priority = i32;

pub const PRIORITY_DEFAULT: Priority = 5;

/// Default dependency type for edges created without an explicit type.
pub const DEP_TYPE_BLOCKS: &str = "blocks";

/// Lifecycle status of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Todo,
    InProgress,
    Done,
    Blocked,
    Archived,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Todo => "todo",
            TaskStatus::InProgress => "in_progress",
            TaskStatus::Done => "done",
            TaskStatus::Blocked => "blocked",
            TaskStatus::Archived => "archived",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "todo" => Some(TaskStatus::Todo),
            "in_progress" => Some(TaskStatus::InProgress),
            "done" => Some(TaskStatus::Done),
            "blocked" => Some(TaskStatus::Blocked),
            "archived" => Some(TaskStatus::Archived),
            _ => None,
        }
    }
}

/// How a subtask weight was determined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WeightKind {
    /// Set explicitly by a user.
    Manual,
    /// Derived from estimate and priority.
    Auto,
}

/// Structured per-task weight configuration.
///
/// Stored as a first-class field on the task; older records may still carry
/// it as a `weight_config` object inside the metadata JSON blob, which
/// [`Task::effective_weight_config`] falls back to.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WeightConfig {
    pub factor: f64,
    pub kind: WeightKind,
    pub updated_at: i64,
}

impl WeightConfig {
    /// Parse a weight config from a legacy metadata blob.
    ///
    /// Returns `None` (with a warning) on malformed content; a bad blob must
    /// never fail progress computation.
    pub fn from_metadata(metadata: &serde_json::Value) -> Option<Self> {
        let raw = metadata.get("weight_config")?;
        match serde_json::from_value::<WeightConfig>(raw.clone()) {
            Ok(config) => Some(config),
            Err(e) => {
                warn!(error = %e, "ignoring malformed weight_config in task metadata");
                None
            }
        }
    }
}

/// A task on a board.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    pub board_id: String,
    pub column_id: String,
    /// 1-based position within the column; dense among non-archived tasks.
    pub position: i64,
    pub status: TaskStatus,
    pub priority: Priority,
    pub estimated_hours: Option<f64>,
    pub actual_hours: Option<f64>,
    /// Explicit progress 0-100; `None` when never set.
    pub progress: Option<u8>,
    /// Optional parent task; forms a tree independent of the dependency graph.
    pub parent_task_id: Option<String>,
    pub due_date: Option<NaiveDate>,
    pub archived: bool,
    pub weight_config: Option<WeightConfig>,
    /// Free-form metadata; may carry a legacy `weight_config` object.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
    pub created_at: i64,
    pub updated_at: i64,
}

impl Task {
    /// Minimal constructor; everything beyond identity and placement defaults.
    pub fn new(
        id: impl Into<String>,
        board_id: impl Into<String>,
        column_id: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            board_id: board_id.into(),
            column_id: column_id.into(),
            position: 1,
            status: TaskStatus::Todo,
            priority: PRIORITY_DEFAULT,
            estimated_hours: None,
            actual_hours: None,
            progress: None,
            parent_task_id: None,
            due_date: None,
            archived: false,
            weight_config: None,
            metadata: None,
            created_at: 0,
            updated_at: 0,
        }
    }

    /// True when the task does not occupy a position slot.
    pub fn is_archived(&self) -> bool {
        self.archived || self.status == TaskStatus::Archived
    }

    /// Weight config with legacy-metadata fallback. Structured field wins.
    pub fn effective_weight_config(&self) -> Option<WeightConfig> {
        if self.weight_config.is_some() {
            return self.weight_config;
        }
        self.metadata.as_ref().and_then(WeightConfig::from_metadata)
    }
}

/// A directed dependency edge: `task_id` depends on `depends_on_task_id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DependencyEdge {
    pub task_id: String,
    pub depends_on_task_id: String,
    /// Dependency type: "blocks" (default) or custom types.
    pub dep_type: String,
}

impl DependencyEdge {
    pub fn new(task_id: impl Into<String>, depends_on_task_id: impl Into<String>) -> Self {
        Self {
            task_id: task_id.into(),
            depends_on_task_id: depends_on_task_id.into(),
            dep_type: DEP_TYPE_BLOCKS.to_string(),
        }
    }

    pub fn with_type(mut self, dep_type: impl Into<String>) -> Self {
        self.dep_type = dep_type.into();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn status_round_trips_through_strings() {
        for status in [
            TaskStatus::Todo,
            TaskStatus::InProgress,
            TaskStatus::Done,
            TaskStatus::Blocked,
            TaskStatus::Archived,
        ] {
            assert_eq!(TaskStatus::from_str(status.as_str()), Some(status));
        }
        assert_eq!(TaskStatus::from_str("bogus"), None);
    }

    #[test]
    fn weight_config_falls_back_to_metadata() {
        let mut task = Task::new("t1", "b1", "c1");
        task.metadata = Some(json!({
            "weight_config": { "factor": 2.5, "kind": "manual", "updated_at": 123 }
        }));

        let config = task.effective_weight_config().unwrap();
        assert_eq!(config.factor, 2.5);
        assert_eq!(config.kind, WeightKind::Manual);
    }

    #[test]
    fn structured_weight_config_wins_over_metadata() {
        let mut task = Task::new("t1", "b1", "c1");
        task.weight_config = Some(WeightConfig {
            factor: 1.0,
            kind: WeightKind::Auto,
            updated_at: 1,
        });
        task.metadata = Some(json!({
            "weight_config": { "factor": 9.0, "kind": "manual", "updated_at": 2 }
        }));

        assert_eq!(task.effective_weight_config().unwrap().factor, 1.0);
    }

    #[test]
    fn malformed_metadata_weight_config_is_ignored() {
        let mut task = Task::new("t1", "b1", "c1");
        task.metadata = Some(json!({ "weight_config": "not an object" }));

        assert!(task.effective_weight_config().is_none());
    }

    #[test]
    fn archived_status_counts_as_archived() {
        let mut task = Task::new("t1", "b1", "c1");
        assert!(!task.is_archived());
        task.status = TaskStatus::Archived;
        assert!(task.is_archived());
    }
}
