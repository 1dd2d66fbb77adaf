//! Engine policy configuration.
//!
//! Thresholds and multipliers used by the analyzers are a policy choice, not
//! derived from data, so they live here rather than as hard-coded constants.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Tunable engine policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Duration assumed for tasks with no estimate, in hours.
    #[serde(default = "default_duration_hours")]
    pub default_duration_hours: f64,

    /// Working hours per day, used when converting estimates to days.
    #[serde(default = "default_hours_per_day")]
    pub hours_per_day: f64,

    /// Minimum dependent count for a task to be flagged as a bottleneck.
    #[serde(default = "default_bottleneck_min_dependents")]
    pub bottleneck_min_dependents: usize,

    /// Impact score above which risk is High.
    #[serde(default = "default_risk_high")]
    pub risk_high_threshold: f64,

    /// Impact score above which risk is Medium.
    #[serde(default = "default_risk_medium")]
    pub risk_medium_threshold: f64,

    /// Days ahead within which a due date counts as "due soon".
    #[serde(default = "default_due_soon_days")]
    pub due_soon_days: i64,

    /// Impact multiplier for overdue tasks.
    #[serde(default = "default_overdue_multiplier")]
    pub overdue_multiplier: f64,

    /// Impact multiplier for tasks due soon.
    #[serde(default = "default_due_soon_multiplier")]
    pub due_soon_multiplier: f64,

    /// Lower bound for subtask weights.
    #[serde(default = "default_weight_min")]
    pub weight_min: f64,

    /// Upper bound for subtask weights.
    #[serde(default = "default_weight_max")]
    pub weight_max: f64,

    /// Recursion cap for hierarchical progress aggregation.
    #[serde(default = "default_max_hierarchy_depth")]
    pub max_hierarchy_depth: usize,

    /// Iteration cap for graph traversals, a last resort against corrupted
    /// data. Traversals that hit it return a partial result.
    #[serde(default = "default_max_traversal_visits")]
    pub max_traversal_visits: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            default_duration_hours: default_duration_hours(),
            hours_per_day: default_hours_per_day(),
            bottleneck_min_dependents: default_bottleneck_min_dependents(),
            risk_high_threshold: default_risk_high(),
            risk_medium_threshold: default_risk_medium(),
            due_soon_days: default_due_soon_days(),
            overdue_multiplier: default_overdue_multiplier(),
            due_soon_multiplier: default_due_soon_multiplier(),
            weight_min: default_weight_min(),
            weight_max: default_weight_max(),
            max_hierarchy_depth: default_max_hierarchy_depth(),
            max_traversal_visits: default_max_traversal_visits(),
        }
    }
}

fn default_duration_hours() -> f64 {
    8.0
}

fn default_hours_per_day() -> f64 {
    8.0
}

fn default_bottleneck_min_dependents() -> usize {
    2
}

fn default_risk_high() -> f64 {
    10.0
}

fn default_risk_medium() -> f64 {
    5.0
}

fn default_due_soon_days() -> i64 {
    3
}

fn default_overdue_multiplier() -> f64 {
    1.5
}

fn default_due_soon_multiplier() -> f64 {
    1.3
}

fn default_weight_min() -> f64 {
    0.1
}

fn default_weight_max() -> f64 {
    5.0
}

fn default_max_hierarchy_depth() -> usize {
    10
}

fn default_max_traversal_visits() -> usize {
    100_000
}

impl EngineConfig {
    /// Load configuration from a YAML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: EngineConfig = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Load from the given path if present, otherwise defaults plus
    /// environment overrides.
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Self {
        if let Ok(config) = Self::load(path) {
            return config;
        }

        let mut config = Self::default();

        if let Ok(v) = std::env::var("TASK_DAG_RISK_HIGH") {
            if let Ok(v) = v.parse() {
                config.risk_high_threshold = v;
            }
        }

        if let Ok(v) = std::env::var("TASK_DAG_RISK_MEDIUM") {
            if let Ok(v) = v.parse() {
                config.risk_medium_threshold = v;
            }
        }

        if let Ok(v) = std::env::var("TASK_DAG_DUE_SOON_DAYS") {
            if let Ok(v) = v.parse() {
                config.due_soon_days = v;
            }
        }

        config
    }
}
