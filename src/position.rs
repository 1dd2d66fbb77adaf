//! Column position sequencing.
//!
//! Tasks in a column occupy a dense 1..N integer sequence; archived tasks do
//! not hold a slot. Every operation here reads and shifts rows through the
//! repository and is expected to run inside one repository transaction, e.g.
//!
//! ```ignore
//! repo.with_transaction(|tx| {
//!     let seq = PositionSequencer::new(tx);
//!     let pos = seq.next_position("col")?;
//!     // ... place the task at `pos` ...
//!     Ok(())
//! })
//! ```

use crate::error::{EngineError, EngineResult, ErrorCode};
use crate::repo::{GraphRepository, TaskScope};
use crate::types::Task;
use serde::Serialize;
use std::collections::HashSet;
use tracing::{debug, warn};

/// Kind of position defect found by [`PositionSequencer::validate`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PositionIssueKind {
    Duplicate,
    Gap,
    NonPositive,
}

/// One defect in a column's position sequence.
#[derive(Debug, Clone, Serialize)]
pub struct PositionIssue {
    pub kind: PositionIssueKind,
    pub task_id: String,
    pub position: i64,
}

/// Diagnostic result of a position validation. Returned as data, never
/// thrown; callers repair drift by invoking [`PositionSequencer::normalize`]
/// deliberately.
#[derive(Debug, Clone, Serialize)]
pub struct PositionReport {
    pub is_valid: bool,
    pub issues: Vec<PositionIssue>,
}

/// Maintains the dense-position invariant within columns.
pub struct PositionSequencer<'a, R: GraphRepository> {
    repo: &'a R,
}

impl<'a, R: GraphRepository> PositionSequencer<'a, R> {
    pub fn new(repo: &'a R) -> Self {
        Self { repo }
    }

    /// Non-archived tasks of the column in position order.
    fn column_tasks(&self, column_id: &str) -> EngineResult<Vec<Task>> {
        let mut tasks = self.repo.list_tasks(TaskScope::Column(column_id))?;
        tasks.retain(|t| !t.is_archived());
        tasks.sort_by(|a, b| a.position.cmp(&b.position).then_with(|| a.id.cmp(&b.id)));
        Ok(tasks)
    }

    /// Position a newly appended task should take: max + 1, or 1 when empty.
    pub fn next_position(&self, column_id: &str) -> EngineResult<i64> {
        let tasks = self.column_tasks(column_id)?;
        Ok(tasks.iter().map(|t| t.position).max().unwrap_or(0) + 1)
    }

    /// Make room for an insertion at `position`: every task at or after it
    /// moves down by one.
    pub fn insert_at(&self, column_id: &str, position: i64) -> EngineResult<()> {
        Self::check_position(column_id, position)?;
        let shifted = self.repo.shift_positions(column_id, position, None, 1)?;
        debug!(column = column_id, position, shifted, "opened position slot");
        Ok(())
    }

    /// Close the gap left by removing the task at `position`.
    pub fn remove_at(&self, column_id: &str, position: i64) -> EngineResult<()> {
        Self::check_position(column_id, position)?;
        let shifted = self.repo.shift_positions(column_id, position + 1, None, -1)?;
        debug!(column = column_id, position, shifted, "closed position slot");
        Ok(())
    }

    /// Shift neighbors for an intra-column move from `old_position` to
    /// `new_position`. The moved task's own row is written by the caller.
    pub fn move_within(
        &self,
        column_id: &str,
        old_position: i64,
        new_position: i64,
    ) -> EngineResult<()> {
        Self::check_position(column_id, old_position)?;
        Self::check_position(column_id, new_position)?;
        if old_position == new_position {
            return Ok(());
        }
        if new_position > old_position {
            // Moving forward: everything between (old, new] steps back.
            self.repo
                .shift_positions(column_id, old_position + 1, Some(new_position), -1)?;
        } else {
            // Moving backward: everything between [new, old) steps forward.
            self.repo
                .shift_positions(column_id, new_position, Some(old_position - 1), 1)?;
        }
        Ok(())
    }

    /// Shift neighbors for a cross-column move: close the slot in the old
    /// column, open one in the new.
    pub fn move_across(
        &self,
        old_column_id: &str,
        old_position: i64,
        new_column_id: &str,
        new_position: i64,
    ) -> EngineResult<()> {
        self.remove_at(old_column_id, old_position)?;
        self.insert_at(new_column_id, new_position)?;
        Ok(())
    }

    /// Re-number the column to 1..N in current order, repairing drift.
    /// Returns how many tasks were renumbered.
    pub fn normalize(&self, column_id: &str) -> EngineResult<usize> {
        let tasks = self.column_tasks(column_id)?;
        let mut updated = 0;
        for (index, task) in tasks.iter().enumerate() {
            let expected = index as i64 + 1;
            if task.position != expected {
                self.repo.set_position(&task.id, expected)?;
                updated += 1;
            }
        }
        if updated > 0 {
            warn!(column = column_id, updated, "normalized drifted positions");
        }
        Ok(updated)
    }

    /// Check the column for duplicate, gapped, or non-positive positions.
    pub fn validate(&self, column_id: &str) -> EngineResult<PositionReport> {
        let tasks = self.column_tasks(column_id)?;
        let mut issues = Vec::new();
        let mut seen: HashSet<i64> = HashSet::new();

        for (index, task) in tasks.iter().enumerate() {
            if task.position < 1 {
                issues.push(PositionIssue {
                    kind: PositionIssueKind::NonPositive,
                    task_id: task.id.clone(),
                    position: task.position,
                });
            }
            if !seen.insert(task.position) {
                issues.push(PositionIssue {
                    kind: PositionIssueKind::Duplicate,
                    task_id: task.id.clone(),
                    position: task.position,
                });
            } else if task.position >= 1 && task.position != index as i64 + 1 {
                issues.push(PositionIssue {
                    kind: PositionIssueKind::Gap,
                    task_id: task.id.clone(),
                    position: task.position,
                });
            }
        }

        Ok(PositionReport {
            is_valid: issues.is_empty(),
            issues,
        })
    }

    fn check_position(column_id: &str, position: i64) -> EngineResult<()> {
        if position < 1 {
            return Err(EngineError::new(
                ErrorCode::PositionInvariantViolation,
                format!(
                    "Position {} in column {} must be >= 1",
                    position, column_id
                ),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repo::MemoryRepository;

    fn setup(column: &str, count: i64) -> MemoryRepository {
        let repo = MemoryRepository::new();
        for i in 1..=count {
            let mut t = Task::new(format!("{}-t{}", column, i), "b1", column);
            t.position = i;
            repo.put_task(t);
        }
        repo
    }

    fn positions(repo: &MemoryRepository, column: &str) -> Vec<(String, i64)> {
        let mut tasks = repo.list_tasks(TaskScope::Column(column)).unwrap();
        tasks.retain(|t| !t.is_archived());
        tasks.sort_by_key(|t| t.position);
        tasks.into_iter().map(|t| (t.id, t.position)).collect()
    }

    fn assert_dense(repo: &MemoryRepository, column: &str) {
        let pos: Vec<i64> = positions(repo, column).into_iter().map(|(_, p)| p).collect();
        let expected: Vec<i64> = (1..=pos.len() as i64).collect();
        assert_eq!(pos, expected, "column {} positions not dense", column);
    }

    #[test]
    fn next_position_is_max_plus_one() {
        let repo = setup("c1", 3);
        let seq = PositionSequencer::new(&repo);
        assert_eq!(seq.next_position("c1").unwrap(), 4);
        assert_eq!(seq.next_position("empty").unwrap(), 1);
    }

    #[test]
    fn insert_shifts_tail_down() {
        let repo = setup("c1", 3);
        let seq = PositionSequencer::new(&repo);

        seq.insert_at("c1", 2).unwrap();
        // Old positions 2 and 3 became 3 and 4; slot 2 is open.
        let got = positions(&repo, "c1");
        assert_eq!(got, vec![
            ("c1-t1".to_string(), 1),
            ("c1-t2".to_string(), 3),
            ("c1-t3".to_string(), 4),
        ]);
    }

    #[test]
    fn remove_closes_gap() {
        let repo = setup("c1", 3);
        let seq = PositionSequencer::new(&repo);

        repo.remove_task("c1-t2");
        seq.remove_at("c1", 2).unwrap();
        assert_dense(&repo, "c1");
    }

    #[test]
    fn move_forward_shifts_between_down() {
        let repo = setup("c1", 4);
        let seq = PositionSequencer::new(&repo);

        // Move t1 from position 1 to 3.
        seq.move_within("c1", 1, 3).unwrap();
        repo.set_position("c1-t1", 3).unwrap();
        assert_dense(&repo, "c1");
        let got = positions(&repo, "c1");
        assert_eq!(got[2].0, "c1-t1");
    }

    #[test]
    fn move_backward_shifts_between_up() {
        let repo = setup("c1", 4);
        let seq = PositionSequencer::new(&repo);

        // Move t4 from position 4 to 2.
        seq.move_within("c1", 4, 2).unwrap();
        repo.set_position("c1-t4", 2).unwrap();
        assert_dense(&repo, "c1");
        let got = positions(&repo, "c1");
        assert_eq!(got[1].0, "c1-t4");
    }

    #[test]
    fn move_to_same_position_is_noop() {
        let repo = setup("c1", 3);
        let seq = PositionSequencer::new(&repo);
        seq.move_within("c1", 2, 2).unwrap();
        assert_dense(&repo, "c1");
    }

    #[test]
    fn cross_column_move_keeps_both_columns_dense() {
        let repo = setup("c1", 3);
        for i in 1..=2 {
            let mut t = Task::new(format!("c2-t{}", i), "b1", "c2");
            t.position = i;
            repo.put_task(t);
        }
        let seq = PositionSequencer::new(&repo);

        // Move c1-t2 to c2 position 1.
        seq.move_across("c1", 2, "c2", 1).unwrap();
        repo.set_placement("c1-t2", "c2", 1).unwrap();

        assert_dense(&repo, "c1");
        assert_dense(&repo, "c2");
        assert_eq!(positions(&repo, "c2")[0].0, "c1-t2");
    }

    #[test]
    fn archived_tasks_do_not_occupy_slots() {
        let repo = setup("c1", 3);
        let mut archived = Task::new("c1-arch", "b1", "c1");
        archived.archived = true;
        archived.position = 2;
        repo.put_task(archived);
        let seq = PositionSequencer::new(&repo);

        assert_eq!(seq.next_position("c1").unwrap(), 4);
        let report = seq.validate("c1").unwrap();
        assert!(report.is_valid);
    }

    #[test]
    fn validate_reports_duplicates_and_gaps() {
        let repo = MemoryRepository::new();
        for (id, pos) in [("t1", 1), ("t2", 1), ("t3", 5), ("t4", 0)] {
            let mut t = Task::new(id, "b1", "c1");
            t.position = pos;
            repo.put_task(t);
        }
        let seq = PositionSequencer::new(&repo);

        let report = seq.validate("c1").unwrap();
        assert!(!report.is_valid);
        let kinds: Vec<PositionIssueKind> = report.issues.iter().map(|i| i.kind).collect();
        assert!(kinds.contains(&PositionIssueKind::Duplicate));
        assert!(kinds.contains(&PositionIssueKind::Gap));
        assert!(kinds.contains(&PositionIssueKind::NonPositive));
    }

    #[test]
    fn normalize_repairs_drift() {
        let repo = MemoryRepository::new();
        for (id, pos) in [("t1", 2), ("t2", 5), ("t3", 9)] {
            let mut t = Task::new(id, "b1", "c1");
            t.position = pos;
            repo.put_task(t);
        }
        let seq = PositionSequencer::new(&repo);

        let updated = seq.normalize("c1").unwrap();
        assert_eq!(updated, 3);
        assert_dense(&repo, "c1");
        assert!(seq.validate("c1").unwrap().is_valid);
    }

    #[test]
    fn non_positive_target_is_rejected() {
        let repo = setup("c1", 1);
        let seq = PositionSequencer::new(&repo);
        let err = seq.insert_at("c1", 0).unwrap_err();
        assert_eq!(err.code, ErrorCode::PositionInvariantViolation);
    }
}
