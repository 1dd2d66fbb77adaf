//! Storage collaborator contract.
//!
//! The engine never talks to storage directly; it reads task and edge records
//! through [`GraphRepository`] and hands mutations back to it. Mutating
//! operations are expected to run inside [`GraphRepository::with_transaction`]
//! so that cycle checks, position reads, and the writes they guard are atomic
//! with respect to concurrent callers.

use crate::types::{DependencyEdge, Task};
use anyhow::{Result, anyhow};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// Scope for a bulk task listing.
#[derive(Debug, Clone, Copy)]
pub enum TaskScope<'a> {
    Board(&'a str),
    Column(&'a str),
}

/// Edges touching a single task, split by direction.
#[derive(Debug, Clone, Default)]
pub struct TaskDependencies {
    /// Edges where the task is the dependent (`task -> depends_on`).
    pub depends_on: Vec<DependencyEdge>,
    /// Edges where the task is depended upon.
    pub dependents: Vec<DependencyEdge>,
}

/// Contract the engine requires from the storage layer.
pub trait GraphRepository {
    fn get_task(&self, task_id: &str) -> Result<Option<Task>>;

    fn list_tasks(&self, scope: TaskScope<'_>) -> Result<Vec<Task>>;

    /// Edges touching one task, in both directions.
    fn list_dependencies(&self, task_id: &str) -> Result<TaskDependencies>;

    /// All edges whose dependent task lives on the given board.
    fn list_board_dependencies(&self, board_id: &str) -> Result<Vec<DependencyEdge>>;

    /// Run `f` inside a serializable transaction. Everything the engine reads
    /// and writes within `f` must be atomic with respect to other callers.
    fn with_transaction<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Self) -> Result<T>,
        Self: Sized;

    /// Insert an edge. Re-inserting an identical `(task, depends_on)` pair is
    /// a no-op.
    fn persist_edge(&self, edge: &DependencyEdge) -> Result<()>;

    /// Delete an edge. Deleting a missing edge is a no-op.
    fn delete_edge(&self, task_id: &str, depends_on_task_id: &str) -> Result<()>;

    /// Add `delta` to the position of every non-archived task in the column
    /// whose position lies in `[from, to]` (`to = None` means unbounded).
    /// Returns the number of rows shifted.
    fn shift_positions(
        &self,
        column_id: &str,
        from: i64,
        to: Option<i64>,
        delta: i64,
    ) -> Result<usize>;

    /// Set one task's position outright (used by normalization).
    fn set_position(&self, task_id: &str, position: i64) -> Result<()>;

    /// Move a task to another column at the given position.
    fn set_placement(&self, task_id: &str, column_id: &str, position: i64) -> Result<()>;

    fn update_task_progress(&self, task_id: &str, progress: u8) -> Result<()>;
}

#[derive(Debug, Default)]
struct Store {
    tasks: HashMap<String, Task>,
    edges: Vec<DependencyEdge>,
}

/// In-memory repository.
///
/// Reference implementation of [`GraphRepository`] used by the test suite and
/// as a template for real storage adapters. A single mutex serializes all
/// access, which trivially satisfies the transaction contract.
#[derive(Clone, Default)]
pub struct MemoryRepository {
    store: Arc<Mutex<Store>>,
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a task record.
    pub fn put_task(&self, task: Task) {
        let mut store = self.store.lock().unwrap();
        store.tasks.insert(task.id.clone(), task);
    }

    pub fn remove_task(&self, task_id: &str) {
        let mut store = self.store.lock().unwrap();
        store.tasks.remove(task_id);
        store
            .edges
            .retain(|e| e.task_id != task_id && e.depends_on_task_id != task_id);
    }

    pub fn edge_count(&self) -> usize {
        self.store.lock().unwrap().edges.len()
    }
}

impl GraphRepository for MemoryRepository {
    fn get_task(&self, task_id: &str) -> Result<Option<Task>> {
        let store = self.store.lock().unwrap();
        Ok(store.tasks.get(task_id).cloned())
    }

    fn list_tasks(&self, scope: TaskScope<'_>) -> Result<Vec<Task>> {
        let store = self.store.lock().unwrap();
        let mut tasks: Vec<Task> = store
            .tasks
            .values()
            .filter(|t| match scope {
                TaskScope::Board(board_id) => t.board_id == board_id,
                TaskScope::Column(column_id) => t.column_id == column_id,
            })
            .cloned()
            .collect();
        tasks.sort_by(|a, b| a.position.cmp(&b.position).then_with(|| a.id.cmp(&b.id)));
        Ok(tasks)
    }

    fn list_dependencies(&self, task_id: &str) -> Result<TaskDependencies> {
        let store = self.store.lock().unwrap();
        let mut deps = TaskDependencies::default();
        for edge in &store.edges {
            if edge.task_id == task_id {
                deps.depends_on.push(edge.clone());
            }
            if edge.depends_on_task_id == task_id {
                deps.dependents.push(edge.clone());
            }
        }
        Ok(deps)
    }

    fn list_board_dependencies(&self, board_id: &str) -> Result<Vec<DependencyEdge>> {
        let store = self.store.lock().unwrap();
        Ok(store
            .edges
            .iter()
            .filter(|e| {
                store
                    .tasks
                    .get(&e.task_id)
                    .is_some_and(|t| t.board_id == board_id)
            })
            .cloned()
            .collect())
    }

    fn with_transaction<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Self) -> Result<T>,
    {
        // The store mutex already serializes every operation, so the
        // transaction is just the closure. Real adapters open a serializable
        // transaction here.
        f(self)
    }

    fn persist_edge(&self, edge: &DependencyEdge) -> Result<()> {
        let mut store = self.store.lock().unwrap();
        let exists = store.edges.iter().any(|e| {
            e.task_id == edge.task_id && e.depends_on_task_id == edge.depends_on_task_id
        });
        if !exists {
            store.edges.push(edge.clone());
        }
        Ok(())
    }

    fn delete_edge(&self, task_id: &str, depends_on_task_id: &str) -> Result<()> {
        let mut store = self.store.lock().unwrap();
        store
            .edges
            .retain(|e| !(e.task_id == task_id && e.depends_on_task_id == depends_on_task_id));
        Ok(())
    }

    fn shift_positions(
        &self,
        column_id: &str,
        from: i64,
        to: Option<i64>,
        delta: i64,
    ) -> Result<usize> {
        let mut store = self.store.lock().unwrap();
        let mut shifted = 0;
        for task in store.tasks.values_mut() {
            if task.column_id != column_id || task.is_archived() {
                continue;
            }
            let in_range = task.position >= from && to.is_none_or(|hi| task.position <= hi);
            if in_range {
                task.position += delta;
                shifted += 1;
            }
        }
        Ok(shifted)
    }

    fn set_position(&self, task_id: &str, position: i64) -> Result<()> {
        let mut store = self.store.lock().unwrap();
        let task = store
            .tasks
            .get_mut(task_id)
            .ok_or_else(|| anyhow!("no such task: {}", task_id))?;
        task.position = position;
        Ok(())
    }

    fn set_placement(&self, task_id: &str, column_id: &str, position: i64) -> Result<()> {
        let mut store = self.store.lock().unwrap();
        let task = store
            .tasks
            .get_mut(task_id)
            .ok_or_else(|| anyhow!("no such task: {}", task_id))?;
        task.column_id = column_id.to_string();
        task.position = position;
        Ok(())
    }

    fn update_task_progress(&self, task_id: &str, progress: u8) -> Result<()> {
        let mut store = self.store.lock().unwrap();
        let task = store
            .tasks
            .get_mut(task_id)
            .ok_or_else(|| anyhow!("no such task: {}", task_id))?;
        task.progress = Some(progress.min(100));
        Ok(())
    }
}
