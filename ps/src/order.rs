//! Sibling ordering
//!
//! Order keys are plain `f64`s. Appending takes `max + 1`; a drop places the
//! dragged task at `target - INSERT_BEFORE_GAP`. Repeated drops in front of
//! the same task shrink the gap to its predecessor until the key no longer
//! fits, at which point the sibling group is renumbered `1..=n` and the key
//! is recomputed.

use rusqlite::{Connection, params};
use tracing::debug;

use crate::error::StoreResult;
use crate::task::{ParentRef, Task, TaskId};

/// Offset used to place a dropped task immediately before its target
pub const INSERT_BEFORE_GAP: f64 = 0.001;

/// Key that sorts immediately before `target`
pub fn order_before(target: f64) -> f64 {
    target - INSERT_BEFORE_GAP
}

/// Key for a task appended after `siblings`
pub(crate) fn next_order(siblings: &[Task]) -> f64 {
    siblings.iter().map(|t| t.order).fold(0.0, f64::max) + 1.0
}

/// Key placing a task before `siblings[target_idx]`, or `None` when the gap
/// to the preceding sibling is exhausted.
///
/// `siblings` must be sorted and must not contain the task being moved.
pub(crate) fn insert_before(siblings: &[Task], target_idx: usize) -> Option<f64> {
    let target = siblings[target_idx].order;
    let candidate = order_before(target);
    let lower = target_idx.checked_sub(1).map(|i| siblings[i].order);

    let fits = candidate < target && lower.is_none_or(|lo| candidate > lo);
    fits.then_some(candidate)
}

/// Renumber a sibling group `1..=n` in its current order, skipping `exclude`.
///
/// Returns the renumbered siblings.
pub(crate) fn renormalize(conn: &Connection, parent: &ParentRef, exclude: TaskId) -> StoreResult<Vec<Task>> {
    debug!(%parent, %exclude, "renormalize: called");
    let mut siblings = crate::tasks::children_of(conn, parent)?;
    siblings.retain(|t| t.id != exclude);

    let mut stmt = conn.prepare("UPDATE tasks SET sort_order = ?1 WHERE id = ?2")?;
    for (i, task) in siblings.iter_mut().enumerate() {
        task.order = (i + 1) as f64;
        stmt.execute(params![task.order, task.id])?;
    }
    debug!(count = siblings.len(), "renormalize: renumbered siblings");
    Ok(siblings)
}
