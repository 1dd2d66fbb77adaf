//! Dependency graph construction, cycle detection, and edge mutations.

use crate::error::{EngineError, EngineResult};
use crate::repo::GraphRepository;
use crate::types::{DEP_TYPE_BLOCKS, DependencyEdge, Task};
use std::collections::{HashMap, HashSet, VecDeque};
use tracing::{debug, warn};

/// Check if adding `task_id -> depends_on_task_id` would create a cycle.
///
/// Breadth-first walk over the existing "depends-on" edges starting from
/// `depends_on_task_id`; if `task_id` is reachable, the candidate edge closes
/// a cycle. Pure predicate; the self-dependency case is rejected separately
/// by [`add_dependency`] before traversal.
pub fn would_create_cycle(
    edges: &[DependencyEdge],
    task_id: &str,
    depends_on_task_id: &str,
) -> bool {
    let mut forward: HashMap<&str, Vec<&str>> = HashMap::new();
    for edge in edges {
        forward
            .entry(edge.task_id.as_str())
            .or_default()
            .push(edge.depends_on_task_id.as_str());
    }

    let mut visited: HashSet<&str> = HashSet::new();
    let mut queue: VecDeque<&str> = VecDeque::new();
    queue.push_back(depends_on_task_id);

    while let Some(current) = queue.pop_front() {
        if current == task_id {
            return true;
        }
        if !visited.insert(current) {
            continue;
        }
        if let Some(deps) = forward.get(current) {
            for dep in deps {
                if !visited.contains(dep) {
                    queue.push_back(dep);
                }
            }
        }
    }

    false
}

/// A node in the built graph.
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct GraphNode {
    pub id: String,
    /// Tasks this node depends on (forward edges).
    pub dependencies: Vec<String>,
    /// Tasks depending on this node (reverse edges).
    pub dependents: Vec<String>,
    /// BFS distance from a root; 0 for roots and for nodes unreachable from
    /// any root (only possible with corrupted cyclic data).
    pub depth: usize,
}

/// An in-memory view of the dependency graph for one board.
///
/// Rebuilt from repository records on every invocation; owns no long-lived
/// state.
#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
    nodes: HashMap<String, GraphNode>,
    roots: Vec<String>,
    leaves: Vec<String>,
}

impl DependencyGraph {
    /// Assemble the graph from task and edge records.
    ///
    /// Edges referencing unknown task ids are skipped with a warning rather
    /// than invalidating the whole build.
    pub fn build(tasks: &[Task], edges: &[DependencyEdge]) -> Self {
        let mut nodes: HashMap<String, GraphNode> = tasks
            .iter()
            .map(|t| {
                (
                    t.id.clone(),
                    GraphNode {
                        id: t.id.clone(),
                        ..GraphNode::default()
                    },
                )
            })
            .collect();

        for edge in edges {
            if !nodes.contains_key(&edge.task_id) || !nodes.contains_key(&edge.depends_on_task_id)
            {
                warn!(
                    task = %edge.task_id,
                    depends_on = %edge.depends_on_task_id,
                    "skipping dependency edge with unknown endpoint"
                );
                continue;
            }
            let node = nodes.get_mut(&edge.task_id).unwrap();
            if !node.dependencies.contains(&edge.depends_on_task_id) {
                node.dependencies.push(edge.depends_on_task_id.clone());
            }
            let dep = nodes.get_mut(&edge.depends_on_task_id).unwrap();
            if !dep.dependents.contains(&edge.task_id) {
                dep.dependents.push(edge.task_id.clone());
            }
        }

        let mut roots: Vec<String> = nodes
            .values()
            .filter(|n| n.dependencies.is_empty())
            .map(|n| n.id.clone())
            .collect();
        roots.sort();

        let mut leaves: Vec<String> = nodes
            .values()
            .filter(|n| n.dependents.is_empty())
            .map(|n| n.id.clone())
            .collect();
        leaves.sort();

        let mut graph = Self {
            nodes,
            roots,
            leaves,
        };
        graph.compute_depths();
        graph
    }

    /// Depth per node: depth(root) = 0, depth(n) = max(depth of deps) + 1.
    ///
    /// Kahn-style propagation from the roots; a node's depth is final once
    /// all of its dependencies have been processed.
    fn compute_depths(&mut self) {
        let mut remaining: HashMap<String, usize> = self
            .nodes
            .values()
            .map(|n| (n.id.clone(), n.dependencies.len()))
            .collect();
        let mut depths: HashMap<String, usize> =
            self.roots.iter().map(|id| (id.clone(), 0)).collect();
        let mut queue: VecDeque<String> = self.roots.iter().cloned().collect();

        while let Some(id) = queue.pop_front() {
            let depth = depths.get(&id).copied().unwrap_or(0);
            let dependents = self
                .nodes
                .get(&id)
                .map(|n| n.dependents.clone())
                .unwrap_or_default();
            for dependent in dependents {
                let entry = depths.entry(dependent.clone()).or_insert(0);
                if depth + 1 > *entry {
                    *entry = depth + 1;
                }
                if let Some(rem) = remaining.get_mut(&dependent) {
                    *rem -= 1;
                    if *rem == 0 {
                        queue.push_back(dependent);
                    }
                }
            }
        }

        for node in self.nodes.values_mut() {
            node.depth = depths.get(&node.id).copied().unwrap_or(0);
        }
    }

    pub fn node(&self, task_id: &str) -> Option<&GraphNode> {
        self.nodes.get(task_id)
    }

    pub fn contains(&self, task_id: &str) -> bool {
        self.nodes.contains_key(task_id)
    }

    pub fn dependencies_of(&self, task_id: &str) -> &[String] {
        self.nodes
            .get(task_id)
            .map(|n| n.dependencies.as_slice())
            .unwrap_or(&[])
    }

    pub fn dependents_of(&self, task_id: &str) -> &[String] {
        self.nodes
            .get(task_id)
            .map(|n| n.dependents.as_slice())
            .unwrap_or(&[])
    }

    pub fn depth_of(&self, task_id: &str) -> usize {
        self.nodes.get(task_id).map(|n| n.depth).unwrap_or(0)
    }

    /// Tasks with no dependencies, sorted by id.
    pub fn roots(&self) -> &[String] {
        &self.roots
    }

    /// Tasks with no dependents, sorted by id.
    pub fn leaves(&self) -> &[String] {
        &self.leaves
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.nodes.keys().map(String::as_str)
    }

    /// Full-graph acyclicity check, used by diagnostics and tests.
    pub fn has_cycle(&self) -> bool {
        let mut remaining: HashMap<&str, usize> = self
            .nodes
            .values()
            .map(|n| (n.id.as_str(), n.dependencies.len()))
            .collect();
        let mut queue: VecDeque<&str> = remaining
            .iter()
            .filter(|&(_, &count)| count == 0)
            .map(|(&id, _)| id)
            .collect();
        let mut processed = 0;

        while let Some(id) = queue.pop_front() {
            processed += 1;
            if let Some(node) = self.nodes.get(id) {
                for dependent in &node.dependents {
                    if let Some(rem) = remaining.get_mut(dependent.as_str()) {
                        *rem -= 1;
                        if *rem == 0 {
                            queue.push_back(dependent);
                        }
                    }
                }
            }
        }

        processed < self.nodes.len()
    }
}

/// Validate and persist a new dependency edge.
///
/// Checks, in order: self-dependency, both endpoints exist, no cycle; the
/// cycle check and the insert run inside one repository transaction so a
/// concurrent insert cannot close a cycle between them. Re-adding an existing
/// edge is a no-op success.
pub fn add_dependency<R: GraphRepository>(
    repo: &R,
    task_id: &str,
    depends_on_task_id: &str,
    dep_type: Option<&str>,
) -> EngineResult<()> {
    if task_id == depends_on_task_id {
        return Err(EngineError::self_dependency(task_id));
    }

    let task = repo
        .get_task(task_id)?
        .ok_or_else(|| EngineError::task_not_found(task_id))?;
    repo.get_task(depends_on_task_id)?
        .ok_or_else(|| EngineError::task_not_found(depends_on_task_id))?;

    let edge = DependencyEdge::new(task_id, depends_on_task_id)
        .with_type(dep_type.unwrap_or(DEP_TYPE_BLOCKS));

    repo.with_transaction(|tx| {
        let edges = tx.list_board_dependencies(&task.board_id)?;
        if would_create_cycle(&edges, task_id, depends_on_task_id) {
            warn!(task = %task_id, depends_on = %depends_on_task_id, "rejected cyclic dependency");
            return Err(EngineError::circular_dependency(task_id, depends_on_task_id).into());
        }
        tx.persist_edge(&edge)?;
        Ok(())
    })?;

    debug!(task = %task_id, depends_on = %depends_on_task_id, "dependency added");
    Ok(())
}

/// Remove a dependency edge. Removing a missing edge is a no-op.
pub fn remove_dependency<R: GraphRepository>(
    repo: &R,
    task_id: &str,
    depends_on_task_id: &str,
) -> EngineResult<()> {
    repo.with_transaction(|tx| tx.delete_edge(task_id, depends_on_task_id))?;
    debug!(task = %task_id, depends_on = %depends_on_task_id, "dependency removed");
    Ok(())
}
