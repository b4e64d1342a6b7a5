//! Derived progress figures for epics and sprints.
//!
//! These are pure functions over entity slices; the engine decides when to
//! recompute and whether to persist the result.

use serde::{Deserialize, Serialize};

use super::{Epic, Task, TaskStatus};

/// Completion percentage of an epic over its currently linked tasks.
///
/// Returns `None` when no linked task exists, leaving the stored value alone.
/// Rounds half up, so 1 of 8 done yields 13.
pub fn epic_progress<'a>(epic: &Epic, tasks: impl IntoIterator<Item = &'a Task>) -> Option<u8> {
    let (total, done) = tasks
        .into_iter()
        .filter(|t| epic.links(&t.id))
        .fold((0u64, 0u64), |(total, done), t| {
            (total + 1, done + u64::from(t.status == TaskStatus::Done))
        });
    if total == 0 {
        return None;
    }
    let pct = (200 * done + total) / (2 * total);
    Some(pct.min(100) as u8)
}

/// Point and task totals for one sprint.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SprintProgress {
    /// Tasks assigned to the sprint
    pub task_count: usize,
    /// Tasks in `done`
    pub done_count: usize,
    /// Sum of story points over all sprint tasks
    pub total_points: u64,
    /// Sum of story points over `done` tasks
    pub done_points: u64,
}

impl SprintProgress {
    /// Completion percentage by points (0 when the sprint has no points).
    pub fn percentage(&self) -> f64 {
        if self.total_points > 0 {
            (self.done_points as f64 / self.total_points as f64) * 100.0
        } else {
            0.0
        }
    }
}

/// Aggregate progress for the tasks belonging to `sprint_id`.
pub fn sprint_progress<'a>(
    sprint_id: &str,
    tasks: impl IntoIterator<Item = &'a Task>,
) -> SprintProgress {
    tasks
        .into_iter()
        .filter(|t| t.sprint_id.as_deref() == Some(sprint_id))
        .fold(SprintProgress::default(), |mut acc, t| {
            acc.task_count += 1;
            acc.total_points = acc.total_points.saturating_add(u64::from(t.points));
            if t.status == TaskStatus::Done {
                acc.done_count += 1;
                acc.done_points = acc.done_points.saturating_add(u64::from(t.points));
            }
            acc
        })
}
