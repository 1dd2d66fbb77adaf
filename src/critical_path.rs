//! Critical path analysis over the dependency graph.
//!
//! Topologically orders the graph (Kahn's algorithm) and relaxes the longest
//! duration-weighted path, which determines the minimum completion time of
//! the board.

use crate::config::EngineConfig;
use crate::graph::DependencyGraph;
use crate::types::{Task, TaskStatus};
use serde::Serialize;
use std::collections::{HashMap, VecDeque};
use tracing::warn;

/// A task with enough direct dependents to delay downstream work.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Bottleneck {
    pub task_id: String,
    pub dependent_count: usize,
}

/// Result of a critical path analysis.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CriticalPath {
    /// Task ids along the longest path, dependency-first.
    pub path: Vec<String>,
    /// Sum of durations along `path`, in hours.
    pub total_duration: f64,
    /// Tasks with no dependencies.
    pub starting_tasks: Vec<String>,
    /// Tasks with no dependents.
    pub ending_tasks: Vec<String>,
    /// Non-done tasks whose dependent count meets the configured threshold,
    /// sorted by count descending then id.
    pub bottlenecks: Vec<Bottleneck>,
}

pub struct CriticalPathAnalyzer<'a> {
    config: &'a EngineConfig,
}

impl<'a> CriticalPathAnalyzer<'a> {
    pub fn new(config: &'a EngineConfig) -> Self {
        Self { config }
    }

    /// Duration used for relaxation: the task estimate or the configured
    /// fallback.
    fn duration_of(&self, task: Option<&Task>) -> f64 {
        task.and_then(|t| t.estimated_hours)
            .unwrap_or(self.config.default_duration_hours)
    }

    /// Find the longest duration-weighted path through the graph.
    ///
    /// O(V+E). Deterministic for a fixed input: zero-in-degree nodes enter
    /// the queue in sorted id order and predecessor ties keep the first edge
    /// found. An empty graph returns an empty result. If the edge data is
    /// corrupted with a cycle the unprocessable remainder is skipped with a
    /// warning and the result covers the acyclic portion.
    pub fn find_critical_path(&self, graph: &DependencyGraph, tasks: &[Task]) -> CriticalPath {
        if graph.is_empty() {
            return CriticalPath::default();
        }

        let by_id: HashMap<&str, &Task> = tasks.iter().map(|t| (t.id.as_str(), t)).collect();

        // Kahn's algorithm over remaining-dependency counts.
        let mut remaining: HashMap<&str, usize> = graph
            .ids()
            .map(|id| (id, graph.dependencies_of(id).len()))
            .collect();
        let mut queue: VecDeque<&str> = graph.roots().iter().map(String::as_str).collect();

        // Longest distance ending at each node, and the predecessor that
        // produced it.
        let mut distance: HashMap<&str, f64> = HashMap::new();
        let mut predecessor: HashMap<&str, &str> = HashMap::new();
        let mut processed = 0usize;

        while let Some(id) = queue.pop_front() {
            processed += 1;
            let own = self.duration_of(by_id.get(id).copied());
            let best_pred = graph
                .dependencies_of(id)
                .iter()
                .map(|dep| (dep.as_str(), distance.get(dep.as_str()).copied().unwrap_or(0.0)))
                .fold(None::<(&str, f64)>, |acc, (dep, dist)| match acc {
                    Some((_, best)) if best >= dist => acc,
                    _ => Some((dep, dist)),
                });

            let upstream = best_pred.map(|(_, d)| d).unwrap_or(0.0);
            distance.insert(id, upstream + own);
            if let Some((pred, _)) = best_pred {
                predecessor.insert(id, pred);
            }

            for dependent in graph.dependents_of(id) {
                if let Some(rem) = remaining.get_mut(dependent.as_str()) {
                    *rem -= 1;
                    if *rem == 0 {
                        queue.push_back(dependent);
                    }
                }
            }
        }

        if processed < graph.len() {
            warn!(
                processed,
                total = graph.len(),
                "dependency data contains a cycle; critical path covers the acyclic portion"
            );
        }

        // Path end: maximum distance, ties broken by id for determinism.
        let end = distance
            .iter()
            .max_by(|(a_id, a), (b_id, b)| {
                a.partial_cmp(b)
                    .unwrap_or(std::cmp::Ordering::Equal)
                    .then_with(|| b_id.cmp(a_id))
            })
            .map(|(&id, &dist)| (id, dist));

        let (mut path, total_duration) = match end {
            Some((end_id, dist)) => {
                let mut path = vec![end_id.to_string()];
                let mut current = end_id;
                while let Some(&pred) = predecessor.get(current) {
                    path.push(pred.to_string());
                    current = pred;
                }
                (path, dist)
            }
            None => (Vec::new(), 0.0),
        };
        path.reverse();

        let mut bottlenecks: Vec<Bottleneck> = graph
            .ids()
            .filter(|id| {
                by_id
                    .get(id)
                    .is_none_or(|t| t.status != TaskStatus::Done)
            })
            .map(|id| Bottleneck {
                task_id: id.to_string(),
                dependent_count: graph.dependents_of(id).len(),
            })
            .filter(|b| b.dependent_count >= self.config.bottleneck_min_dependents)
            .collect();
        bottlenecks.sort_by(|a, b| {
            b.dependent_count
                .cmp(&a.dependent_count)
                .then_with(|| a.task_id.cmp(&b.task_id))
        });

        CriticalPath {
            path,
            total_duration,
            starting_tasks: graph.roots().to_vec(),
            ending_tasks: graph.leaves().to_vec(),
            bottlenecks,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::DependencyEdge;

    fn task(id: &str, hours: f64) -> Task {
        let mut t = Task::new(id, "b1", "c1");
        t.estimated_hours = Some(hours);
        t
    }

    fn edge(task: &str, dep: &str) -> DependencyEdge {
        DependencyEdge::new(task, dep)
    }

    fn analyzer(config: &EngineConfig) -> CriticalPathAnalyzer<'_> {
        CriticalPathAnalyzer::new(config)
    }

    #[test]
    fn linear_chain_sums_durations() {
        let config = EngineConfig::default();
        let tasks = vec![task("a", 4.0), task("b", 2.0), task("c", 6.0), task("d", 3.0)];
        let edges = vec![edge("b", "a"), edge("c", "b"), edge("d", "c")];
        let graph = DependencyGraph::build(&tasks, &edges);

        let result = analyzer(&config).find_critical_path(&graph, &tasks);

        assert_eq!(result.path, ["a", "b", "c", "d"]);
        assert_eq!(result.total_duration, 15.0);
        assert_eq!(result.starting_tasks, ["a"]);
        assert_eq!(result.ending_tasks, ["d"]);
    }

    #[test]
    fn picks_longer_branch_of_diamond() {
        let config = EngineConfig::default();
        // a -> {b: 10h, c: 1h} -> d
        let tasks = vec![task("a", 1.0), task("b", 10.0), task("c", 1.0), task("d", 1.0)];
        let edges = vec![edge("b", "a"), edge("c", "a"), edge("d", "b"), edge("d", "c")];
        let graph = DependencyGraph::build(&tasks, &edges);

        let result = analyzer(&config).find_critical_path(&graph, &tasks);

        assert_eq!(result.path, ["a", "b", "d"]);
        assert_eq!(result.total_duration, 12.0);
    }

    #[test]
    fn missing_estimate_uses_fallback() {
        let config = EngineConfig::default();
        let mut unestimated = Task::new("a", "b1", "c1");
        unestimated.estimated_hours = None;
        let tasks = vec![unestimated, task("b", 2.0)];
        let edges = vec![edge("b", "a")];
        let graph = DependencyGraph::build(&tasks, &edges);

        let result = analyzer(&config).find_critical_path(&graph, &tasks);
        assert_eq!(result.total_duration, 10.0); // 8h fallback + 2h
    }

    #[test]
    fn empty_graph_returns_empty_result() {
        let config = EngineConfig::default();
        let graph = DependencyGraph::build(&[], &[]);
        let result = analyzer(&config).find_critical_path(&graph, &[]);

        assert!(result.path.is_empty());
        assert_eq!(result.total_duration, 0.0);
        assert!(result.bottlenecks.is_empty());
    }

    #[test]
    fn root_with_three_dependents_is_a_bottleneck() {
        let config = EngineConfig::default();
        let tasks = vec![task("r", 1.0), task("x", 1.0), task("y", 1.0), task("z", 1.0)];
        let edges = vec![edge("x", "r"), edge("y", "r"), edge("z", "r")];
        let graph = DependencyGraph::build(&tasks, &edges);

        let result = analyzer(&config).find_critical_path(&graph, &tasks);

        assert_eq!(result.bottlenecks.len(), 1);
        assert_eq!(result.bottlenecks[0].task_id, "r");
        assert_eq!(result.bottlenecks[0].dependent_count, 3);
    }

    #[test]
    fn done_tasks_are_not_bottlenecks() {
        let config = EngineConfig::default();
        let mut tasks = vec![task("r", 1.0), task("x", 1.0), task("y", 1.0)];
        tasks[0].status = TaskStatus::Done;
        let edges = vec![edge("x", "r"), edge("y", "r")];
        let graph = DependencyGraph::build(&tasks, &edges);

        let result = analyzer(&config).find_critical_path(&graph, &tasks);
        assert!(result.bottlenecks.is_empty());
    }

    #[test]
    fn bottlenecks_sorted_by_dependent_count_then_id() {
        let config = EngineConfig::default();
        let tasks: Vec<Task> = ["p", "q", "w", "x", "y", "z"]
            .iter()
            .map(|&id| task(id, 1.0))
            .collect();
        // p has 3 dependents, q has 2
        let edges = vec![
            edge("w", "p"),
            edge("x", "p"),
            edge("y", "p"),
            edge("y", "q"),
            edge("z", "q"),
        ];
        let graph = DependencyGraph::build(&tasks, &edges);

        let result = analyzer(&config).find_critical_path(&graph, &tasks);
        let ids: Vec<&str> = result.bottlenecks.iter().map(|b| b.task_id.as_str()).collect();
        assert_eq!(ids, ["p", "q"]);
    }

    #[test]
    fn corrupted_cycle_degrades_to_partial_result() {
        let config = EngineConfig::default();
        // a and b form a cycle injected behind the engine's back; c is clean.
        let tasks = vec![task("a", 1.0), task("b", 1.0), task("c", 5.0)];
        let edges = vec![edge("a", "b"), edge("b", "a")];
        let graph = DependencyGraph::build(&tasks, &edges);

        let result = analyzer(&config).find_critical_path(&graph, &tasks);
        assert_eq!(result.path, ["c"]);
        assert_eq!(result.total_duration, 5.0);
    }
}
