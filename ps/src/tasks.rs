//! Task table operations
//!
//! Free functions take a `&Connection` so composite operations can run them
//! inside a single transaction; the `Database` methods are the public surface.

use std::collections::HashSet;

use rusqlite::{Connection, OptionalExtension, params};
use tracing::{debug, info};

use crate::database::Database;
use crate::error::{StoreError, StoreResult};
use crate::now_ms;
use crate::order::{insert_before, next_order, order_before, renormalize};
use crate::task::{ParentRef, Task, TaskChange, TaskId, TaskNode, TaskPatch};

pub(crate) fn validate_title(title: &str) -> StoreResult<()> {
    if title.trim().is_empty() {
        return Err(StoreError::Validation("task title must not be blank".to_string()));
    }
    Ok(())
}

pub(crate) fn find_task(conn: &Connection, id: TaskId) -> StoreResult<Option<Task>> {
    let sql = format!("SELECT {} FROM tasks WHERE id = ?1", Task::COLUMNS);
    let task = conn.query_row(&sql, params![id], Task::from_row).optional()?;
    Ok(task)
}

fn require_task(conn: &Connection, id: TaskId) -> StoreResult<Task> {
    find_task(conn, id)?.ok_or_else(|| StoreError::NotFound(format!("task {}", id)))
}

/// Direct children of `parent`, ascending by order (ties by id)
pub(crate) fn children_of(conn: &Connection, parent: &ParentRef) -> StoreResult<Vec<Task>> {
    let sql = format!(
        "SELECT {} FROM tasks WHERE parent_id = ?1 ORDER BY sort_order ASC, id ASC",
        Task::COLUMNS
    );
    let mut stmt = conn.prepare_cached(&sql)?;
    let tasks = stmt
        .query_map(params![parent], Task::from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(tasks)
}

fn ensure_parent_exists(conn: &Connection, parent: &ParentRef) -> StoreResult<()> {
    if let ParentRef::Task(pid) = parent
        && find_task(conn, *pid)?.is_none()
    {
        return Err(StoreError::NotFound(format!("parent task {}", pid)));
    }
    Ok(())
}

/// True when `node` is `ancestor` or sits somewhere below it
fn is_within(conn: &Connection, node: TaskId, ancestor: TaskId) -> StoreResult<bool> {
    let mut seen = HashSet::new();
    let mut current = node;
    loop {
        if current == ancestor {
            return Ok(true);
        }
        if !seen.insert(current) {
            // Corrupt data already contains a cycle; treat as "not ours"
            return Ok(false);
        }
        match find_task(conn, current)?.map(|t| t.parent_id) {
            Some(ParentRef::Task(parent)) => current = parent,
            _ => return Ok(false),
        }
    }
}

pub(crate) fn insert_task(conn: &Connection, title: &str, parent: ParentRef, completed: bool) -> StoreResult<Task> {
    validate_title(title)?;
    ensure_parent_exists(conn, &parent)?;

    let order = next_order(&children_of(conn, &parent)?);
    let created_at = now_ms();
    conn.execute(
        "INSERT INTO tasks (title, completed, parent_id, sort_order, created_at) VALUES (?1, ?2, ?3, ?4, ?5)",
        params![title, completed, parent, order, created_at],
    )?;

    Ok(Task {
        id: TaskId(conn.last_insert_rowid()),
        title: title.to_string(),
        completed,
        parent_id: parent,
        order,
        created_at,
    })
}

fn apply_patch(conn: &Connection, id: TaskId, patch: &TaskPatch) -> StoreResult<TaskChange> {
    let before = require_task(conn, id)?;
    let mut after = before.clone();

    if let Some(title) = &patch.title {
        validate_title(title)?;
        after.title = title.clone();
    }
    if let Some(completed) = patch.completed {
        after.completed = completed;
    }
    if let Some(parent) = patch.parent {
        if let ParentRef::Task(pid) = parent {
            ensure_parent_exists(conn, &parent)?;
            if is_within(conn, pid, id)? {
                return Err(StoreError::Validation(format!(
                    "cannot move task {} under itself or its own subtask {}",
                    id, pid
                )));
            }
        }
        after.parent_id = parent;
    }
    if let Some(order) = patch.order {
        if !order.is_finite() {
            return Err(StoreError::Validation(format!("order must be a finite number, got {}", order)));
        }
        after.order = order;
    }

    if after != before {
        conn.execute(
            "UPDATE tasks SET title = ?1, completed = ?2, parent_id = ?3, sort_order = ?4 WHERE id = ?5",
            params![after.title, after.completed, after.parent_id, after.order, id],
        )?;
    }
    Ok(TaskChange { before, after })
}

/// Build the ordered forest below `parent`, turning each task and its
/// finished children into a node with `make`.
///
/// Walks with an explicit stack, so depth is bounded by memory rather than by
/// the thread's stack.
pub(crate) fn fold_forest<N>(
    conn: &Connection,
    parent: &ParentRef,
    mut make: impl FnMut(Task, Vec<N>) -> N,
) -> StoreResult<Vec<N>> {
    // Pre-order list of (task, index of its parent in `visited`)
    let mut visited: Vec<(Task, Option<usize>)> = Vec::new();
    let mut seen = HashSet::new();
    let mut stack: Vec<(Task, Option<usize>)> = children_of(conn, parent)?.into_iter().rev().map(|t| (t, None)).collect();
    while let Some((task, up)) = stack.pop() {
        if !seen.insert(task.id) {
            continue;
        }
        let idx = visited.len();
        let children = children_of(conn, &ParentRef::Task(task.id))?;
        stack.extend(children.into_iter().rev().map(|t| (t, Some(idx))));
        visited.push((task, up));
    }

    // Children always follow their parent, so walking backwards completes
    // every subtree before it is attached.
    let mut pending: Vec<Vec<N>> = visited.iter().map(|_| Vec::new()).collect();
    let mut roots = Vec::new();
    for (idx, (task, up)) in visited.into_iter().enumerate().rev() {
        let mut children = std::mem::take(&mut pending[idx]);
        children.reverse();
        let node = make(task, children);
        match up {
            Some(p) => pending[p].push(node),
            None => roots.push(node),
        }
    }
    roots.reverse();
    Ok(roots)
}

impl Database {
    /// Create a task at the end of `parent`'s children
    pub fn add_task(&mut self, title: &str, parent: ParentRef, completed: bool) -> StoreResult<Task> {
        debug!(%title, %parent, completed, "add_task: called");
        let tx = self.conn.transaction()?;
        let task = insert_task(&tx, title, parent, completed)?;
        tx.commit()?;
        debug!(id = %task.id, order = task.order, "add_task: created");
        Ok(task)
    }

    pub fn get_task(&self, id: TaskId) -> StoreResult<Option<Task>> {
        debug!(%id, "get_task: called");
        find_task(&self.conn, id)
    }

    /// Direct children of `parent`, ascending by order
    pub fn get_tasks(&self, parent: &ParentRef) -> StoreResult<Vec<Task>> {
        debug!(%parent, "get_tasks: called");
        children_of(&self.conn, parent)
    }

    /// Shallow-merge `patch` onto task `id`. `created_at` never changes.
    pub fn update_task(&mut self, id: TaskId, patch: &TaskPatch) -> StoreResult<TaskChange> {
        debug!(%id, ?patch, "update_task: called");
        let tx = self.conn.transaction()?;
        let change = apply_patch(&tx, id, patch)?;
        tx.commit()?;
        Ok(change)
    }

    /// Set parent and order in one step
    pub fn reorder_task(&mut self, id: TaskId, parent: ParentRef, order: f64) -> StoreResult<TaskChange> {
        debug!(%id, %parent, order, "reorder_task: called");
        self.update_task(id, &TaskPatch::position(parent, order))
    }

    /// Drop `active` onto `over`: it lands immediately before `over`, under
    /// `over`'s parent.
    ///
    /// A missing target or a drop onto itself does nothing and returns `None`.
    pub fn move_task(&mut self, active: TaskId, over: Option<TaskId>) -> StoreResult<Option<TaskChange>> {
        debug!(%active, ?over, "move_task: called");
        let Some(over) = over else {
            debug!("move_task: no drop target, ignoring");
            return Ok(None);
        };
        if active == over {
            debug!("move_task: dropped onto itself, ignoring");
            return Ok(None);
        }

        let tx = self.conn.transaction()?;
        require_task(&tx, active)?;
        let target = require_task(&tx, over)?;
        let parent = target.parent_id;

        let mut siblings = children_of(&tx, &parent)?;
        siblings.retain(|t| t.id != active);
        let target_idx = siblings
            .iter()
            .position(|t| t.id == over)
            .ok_or_else(|| StoreError::NotFound(format!("task {}", over)))?;

        let order = match insert_before(&siblings, target_idx) {
            Some(order) => order,
            None => {
                info!(%parent, "Order keys exhausted, renumbering siblings");
                let renumbered = renormalize(&tx, &parent, active)?;
                insert_before(&renumbered, target_idx).unwrap_or_else(|| order_before(renumbered[target_idx].order))
            }
        };

        let change = apply_patch(&tx, active, &TaskPatch::position(parent, order))?;
        tx.commit()?;
        debug!(%active, %parent, order, "move_task: moved");
        Ok(Some(change))
    }

    /// Delete a task and every transitive descendant in one transaction.
    ///
    /// Returns the removed rows, the requested task first.
    pub fn delete_task(&mut self, id: TaskId) -> StoreResult<Vec<Task>> {
        debug!(%id, "delete_task: called");
        let tx = self.conn.transaction()?;
        let root = require_task(&tx, id)?;

        let mut removed = Vec::new();
        let mut seen = HashSet::new();
        let mut stack = vec![root];
        while let Some(task) = stack.pop() {
            if !seen.insert(task.id) {
                continue;
            }
            let mut children = children_of(&tx, &ParentRef::Task(task.id))?;
            children.reverse();
            stack.extend(children);
            removed.push(task);
        }

        {
            let mut stmt = tx.prepare("DELETE FROM tasks WHERE id = ?1")?;
            for task in &removed {
                stmt.execute(params![task.id])?;
            }
        }
        tx.commit()?;
        info!(%id, count = removed.len(), "Deleted task subtree");
        Ok(removed)
    }

    /// Delete every task
    pub fn clear_tasks(&mut self) -> StoreResult<usize> {
        debug!("clear_tasks: called");
        let count = self.conn.execute("DELETE FROM tasks", [])?;
        info!(count, "Cleared all tasks");
        Ok(count)
    }

    /// Ordered forest below `parent`
    pub fn task_tree(&self, parent: &ParentRef) -> StoreResult<Vec<TaskNode>> {
        debug!(%parent, "task_tree: called");
        fold_forest(&self.conn, parent, |task, children| TaskNode { task, children })
    }

    pub fn task_count(&self) -> StoreResult<usize> {
        let count: i64 = self.conn.query_row("SELECT COUNT(*) FROM tasks", [], |row| row.get(0))?;
        Ok(count as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn db() -> Database {
        Database::open_in_memory().unwrap()
    }

    fn titles(tasks: &[Task]) -> Vec<&str> {
        tasks.iter().map(|t| t.title.as_str()).collect()
    }

    fn under(id: TaskId) -> ParentRef {
        ParentRef::Task(id)
    }

    #[test]
    fn test_add_get_delete_scenario() {
        let mut db = db();
        let train = db.add_task("Train", ParentRef::Root, false).unwrap();
        assert_eq!(train.id, TaskId(1));

        let stretch = db.add_task("Stretch", under(train.id), false).unwrap();
        assert_eq!(stretch.id, TaskId(2));
        assert_eq!(stretch.parent_id.as_key(), "1");
        assert_eq!(stretch.order, 1.0);

        let children = db.get_tasks(&"1".parse().unwrap()).unwrap();
        assert_eq!(children.len(), 1);
        assert_eq!(children[0].id, TaskId(2));
        assert_eq!(children[0].title, "Stretch");

        db.delete_task(TaskId(1)).unwrap();
        assert!(db.get_tasks(&ParentRef::Root).unwrap().is_empty());
        assert!(db.get_tasks(&under(TaskId(1))).unwrap().is_empty());
    }

    #[test]
    fn test_append_after_max_sibling_order() {
        let mut db = db();
        let a = db.add_task("a", ParentRef::Root, false).unwrap();
        let b = db.add_task("b", ParentRef::Root, false).unwrap();
        let c = db.add_task("c", ParentRef::Root, false).unwrap();
        db.reorder_task(a.id, ParentRef::Root, 1.0).unwrap();
        db.reorder_task(b.id, ParentRef::Root, 2.0).unwrap();
        db.reorder_task(c.id, ParentRef::Root, 5.0).unwrap();

        let d = db.add_task("d", ParentRef::Root, false).unwrap();
        assert_eq!(d.order, 6.0);
    }

    #[test]
    fn test_first_child_order_is_one() {
        let mut db = db();
        let parent = db.add_task("p", ParentRef::Root, false).unwrap();
        db.add_task("x", ParentRef::Root, false).unwrap();
        let child = db.add_task("c", under(parent.id), false).unwrap();
        assert_eq!(child.order, 1.0);
    }

    #[test]
    fn test_add_rejects_blank_title() {
        let mut db = db();
        let err = db.add_task("   ", ParentRef::Root, false).unwrap_err();
        assert!(matches!(err, StoreError::Validation(_)));
        assert_eq!(db.task_count().unwrap(), 0);
    }

    #[test]
    fn test_add_under_missing_parent_is_not_found() {
        let mut db = db();
        let err = db.add_task("orphan", under(TaskId(77)), false).unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
    }

    #[test]
    fn test_add_completed() {
        let mut db = db();
        let task = db.add_task("done already", ParentRef::Root, true).unwrap();
        assert!(db.get_task(task.id).unwrap().unwrap().completed);
    }

    #[test]
    fn test_get_tasks_sorted_by_order() {
        let mut db = db();
        let a = db.add_task("a", ParentRef::Root, false).unwrap();
        db.add_task("b", ParentRef::Root, false).unwrap();
        db.reorder_task(a.id, ParentRef::Root, 10.0).unwrap();
        assert_eq!(titles(&db.get_tasks(&ParentRef::Root).unwrap()), vec!["b", "a"]);
    }

    #[test]
    fn test_update_merges_fields() {
        let mut db = db();
        let task = db.add_task("Ginga", ParentRef::Root, false).unwrap();

        let change = db.update_task(task.id, &TaskPatch::completed(true)).unwrap();
        assert!(!change.before.completed);
        assert!(change.after.completed);
        assert_eq!(change.after.title, "Ginga");

        let change = db.update_task(task.id, &TaskPatch::title("Ginga (3 mins)")).unwrap();
        assert!(change.after.completed);
        assert_eq!(change.after.created_at, task.created_at);

        let stored = db.get_task(task.id).unwrap().unwrap();
        assert_eq!(stored.title, "Ginga (3 mins)");
        assert!(stored.completed);
        assert_eq!(stored.created_at, task.created_at);
    }

    #[test]
    fn test_update_missing_is_not_found() {
        let mut db = db();
        let err = db.update_task(TaskId(5), &TaskPatch::completed(true)).unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
    }

    #[test]
    fn test_update_rejects_blank_title_and_nan_order() {
        let mut db = db();
        let task = db.add_task("x", ParentRef::Root, false).unwrap();
        assert!(matches!(
            db.update_task(task.id, &TaskPatch::title("")),
            Err(StoreError::Validation(_))
        ));
        assert!(matches!(
            db.reorder_task(task.id, ParentRef::Root, f64::NAN),
            Err(StoreError::Validation(_))
        ));
        assert_eq!(db.get_task(task.id).unwrap().unwrap().title, "x");
    }

    #[test]
    fn test_reparent_keeps_children_attached() {
        let mut db = db();
        let a = db.add_task("A", ParentRef::Root, false).unwrap();
        let b = db.add_task("B", under(a.id), false).unwrap();
        let c = db.add_task("C", ParentRef::Root, false).unwrap();

        let change = db.reorder_task(a.id, under(c.id), 1.0).unwrap();
        assert!(change.reparented());

        let b = db.get_task(b.id).unwrap().unwrap();
        assert_eq!(b.parent_id, under(a.id));
        assert_eq!(titles(&db.get_tasks(&under(c.id)).unwrap()), vec!["A"]);
        assert_eq!(titles(&db.get_tasks(&ParentRef::Root).unwrap()), vec!["C"]);
    }

    #[test]
    fn test_reparent_into_own_subtree_rejected() {
        let mut db = db();
        let a = db.add_task("A", ParentRef::Root, false).unwrap();
        let b = db.add_task("B", under(a.id), false).unwrap();
        let c = db.add_task("C", under(b.id), false).unwrap();

        for target in [a.id, b.id, c.id] {
            let err = db.reorder_task(a.id, under(target), 1.0).unwrap_err();
            assert!(matches!(err, StoreError::Validation(_)), "target {}", target);
        }
        assert_eq!(db.get_task(a.id).unwrap().unwrap().parent_id, ParentRef::Root);
    }

    #[test]
    fn test_cascade_delete_deep_subtree() {
        let mut db = db();
        let keep = db.add_task("keep", ParentRef::Root, false).unwrap();
        let top = db.add_task("top", ParentRef::Root, false).unwrap();
        let mut ids = vec![top.id];
        let mut parent = top.id;
        for depth in 0..4 {
            let a = db.add_task(&format!("a{}", depth), under(parent), false).unwrap();
            let b = db.add_task(&format!("b{}", depth), under(parent), false).unwrap();
            ids.extend([a.id, b.id]);
            parent = a.id;
        }
        db.add_task("keep child", under(keep.id), false).unwrap();

        let removed = db.delete_task(top.id).unwrap();
        assert_eq!(removed.len(), ids.len());
        assert_eq!(removed[0].id, top.id);

        for id in &ids {
            assert!(db.get_task(*id).unwrap().is_none());
            assert!(db.get_tasks(&under(*id)).unwrap().is_empty());
        }
        assert_eq!(db.task_count().unwrap(), 2);
    }

    #[test]
    fn test_delete_leaf_and_missing() {
        let mut db = db();
        let leaf = db.add_task("leaf", ParentRef::Root, false).unwrap();
        assert_eq!(db.delete_task(leaf.id).unwrap().len(), 1);
        assert!(matches!(db.delete_task(leaf.id), Err(StoreError::NotFound(_))));
    }

    #[test]
    fn test_ids_not_reused_after_delete() {
        let mut db = db();
        let a = db.add_task("a", ParentRef::Root, false).unwrap();
        db.delete_task(a.id).unwrap();
        let b = db.add_task("b", ParentRef::Root, false).unwrap();
        assert!(b.id > a.id);
    }

    #[test]
    fn test_move_before_target_same_parent() {
        let mut db = db();
        let a = db.add_task("a", ParentRef::Root, false).unwrap();
        let b = db.add_task("b", ParentRef::Root, false).unwrap();
        let c = db.add_task("c", ParentRef::Root, false).unwrap();

        let change = db.move_task(c.id, Some(a.id)).unwrap().unwrap();
        assert_eq!(change.after.order, order_before(a.order));
        assert_eq!(titles(&db.get_tasks(&ParentRef::Root).unwrap()), vec!["c", "a", "b"]);

        db.move_task(a.id, Some(b.id)).unwrap();
        assert_eq!(titles(&db.get_tasks(&ParentRef::Root).unwrap()), vec!["c", "a", "b"]);
    }

    #[test]
    fn test_move_onto_current_position_keeps_order() {
        let mut db = db();
        let a = db.add_task("a", ParentRef::Root, false).unwrap();
        let b = db.add_task("b", ParentRef::Root, false).unwrap();
        db.add_task("c", ParentRef::Root, false).unwrap();

        // a already sits right before b
        db.move_task(a.id, Some(b.id)).unwrap();
        let after = db.get_tasks(&ParentRef::Root).unwrap();
        assert_eq!(titles(&after), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_move_without_target_or_onto_self_is_noop() {
        let mut db = db();
        let a = db.add_task("a", ParentRef::Root, false).unwrap();
        assert!(db.move_task(a.id, None).unwrap().is_none());
        assert!(db.move_task(a.id, Some(a.id)).unwrap().is_none());
        assert_eq!(db.get_task(a.id).unwrap().unwrap(), a);
    }

    #[test]
    fn test_move_across_parents() {
        let mut db = db();
        let x = db.add_task("x", ParentRef::Root, false).unwrap();
        let y = db.add_task("y", ParentRef::Root, false).unwrap();
        let x1 = db.add_task("x1", under(x.id), false).unwrap();
        let y1 = db.add_task("y1", under(y.id), false).unwrap();
        let y1a = db.add_task("y1a", under(y1.id), false).unwrap();

        let change = db.move_task(y1.id, Some(x1.id)).unwrap().unwrap();
        assert_eq!(change.affected_parents(), vec![under(y.id), under(x.id)]);
        assert_eq!(titles(&db.get_tasks(&under(x.id)).unwrap()), vec!["y1", "x1"]);
        assert!(db.get_tasks(&under(y.id)).unwrap().is_empty());
        // The moved task brings its subtree along
        assert_eq!(db.get_task(y1a.id).unwrap().unwrap().parent_id, under(y1.id));
    }

    #[test]
    fn test_move_into_own_subtree_rejected() {
        let mut db = db();
        let a = db.add_task("a", ParentRef::Root, false).unwrap();
        let a1 = db.add_task("a1", under(a.id), false).unwrap();
        db.add_task("a2", under(a.id), false).unwrap();
        let err = db.move_task(a.id, Some(a1.id)).unwrap_err();
        assert!(matches!(err, StoreError::Validation(_)));
    }

    #[test]
    fn test_move_missing_task_is_not_found() {
        let mut db = db();
        let a = db.add_task("a", ParentRef::Root, false).unwrap();
        assert!(matches!(db.move_task(a.id, Some(TaskId(99))), Err(StoreError::NotFound(_))));
        assert!(matches!(db.move_task(TaskId(99), Some(a.id)), Err(StoreError::NotFound(_))));
    }

    #[test]
    fn test_repeated_drops_renormalize() {
        let mut db = db();
        let anchor = db.add_task("anchor", ParentRef::Root, false).unwrap();
        let target = db.add_task("target", ParentRef::Root, false).unwrap();
        let mut dropped = Vec::new();
        // Every drop after the first collides with the previous one's key
        for i in 0..40 {
            let t = db.add_task(&format!("d{}", i), ParentRef::Root, false).unwrap();
            db.move_task(t.id, Some(target.id)).unwrap();
            dropped.push(t.id);
        }

        let tasks = db.get_tasks(&ParentRef::Root).unwrap();
        assert_eq!(tasks.first().unwrap().id, anchor.id);
        assert_eq!(tasks.last().unwrap().id, target.id);
        let middle: Vec<TaskId> = tasks[1..tasks.len() - 1].iter().map(|t| t.id).collect();
        assert_eq!(middle, dropped);
        for pair in tasks.windows(2) {
            assert!(pair[0].order < pair[1].order, "{:?} !< {:?}", pair[0], pair[1]);
        }
    }

    #[test]
    fn test_task_tree_keeps_sibling_order_at_every_level() {
        let mut db = db();
        let a = db.add_task("a", ParentRef::Root, false).unwrap();
        let b = db.add_task("b", ParentRef::Root, false).unwrap();
        let a1 = db.add_task("a1", under(a.id), false).unwrap();
        db.add_task("a2", under(a.id), false).unwrap();
        db.add_task("a1x", under(a1.id), false).unwrap();
        db.add_task("b1", under(b.id), false).unwrap();
        db.move_task(b.id, Some(a.id)).unwrap();

        let tree = db.task_tree(&ParentRef::Root).unwrap();
        let top: Vec<&str> = tree.iter().map(|n| n.task.title.as_str()).collect();
        assert_eq!(top, vec!["b", "a"]);
        let under_a: Vec<&str> = tree[1].children.iter().map(|n| n.task.title.as_str()).collect();
        assert_eq!(under_a, vec!["a1", "a2"]);
        assert_eq!(tree[1].children[0].children[0].task.title, "a1x");
        assert_eq!(tree[0].children[0].task.title, "b1");
    }

    #[test]
    fn test_task_tree_handles_very_deep_chains() {
        let mut db = db();
        let depth = 2000;
        let mut parent = ParentRef::Root;
        for level in 1..=depth {
            let task = db.add_task(&format!("level {}", level), parent, false).unwrap();
            parent = under(task.id);
        }

        let tree = db.task_tree(&ParentRef::Root).unwrap();
        assert_eq!(tree.len(), 1);
        assert_eq!(tree[0].size(), depth);

        let mut node = &tree[0];
        let mut levels = 1;
        while let Some(child) = node.children.first() {
            assert!(child.children.len() <= 1);
            node = child;
            levels += 1;
        }
        assert_eq!(levels, depth);
        assert_eq!(node.task.title, format!("level {}", depth));
    }

    #[test]
    fn test_task_tree_and_clear() {
        let mut db = db();
        let a = db.add_task("a", ParentRef::Root, false).unwrap();
        db.add_task("a1", under(a.id), true).unwrap();
        db.add_task("a2", under(a.id), false).unwrap();
        db.add_task("b", ParentRef::Root, false).unwrap();

        let tree = db.task_tree(&ParentRef::Root).unwrap();
        assert_eq!(tree.len(), 2);
        assert_eq!(tree[0].progress(), (1, 2));
        assert_eq!(tree[0].size(), 3);
        assert!(tree[1].children.is_empty());

        assert_eq!(db.clear_tasks().unwrap(), 4);
        assert!(db.task_tree(&ParentRef::Root).unwrap().is_empty());
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(64))]

        #[test]
        fn prop_moves_match_list_model(moves in prop::collection::vec((0usize..6, 0usize..6), 0..40)) {
            let mut db = db();
            let mut model: Vec<TaskId> = (0..6)
                .map(|i| db.add_task(&format!("t{}", i), ParentRef::Root, false).unwrap().id)
                .collect();
            let ids = model.clone();

            for (from, to) in moves {
                let (active, over) = (ids[from], ids[to]);
                db.move_task(active, Some(over)).unwrap();
                if active != over {
                    model.retain(|id| *id != active);
                    let idx = model.iter().position(|id| *id == over).unwrap();
                    model.insert(idx, active);
                }
            }

            let tasks = db.get_tasks(&ParentRef::Root).unwrap();
            let actual: Vec<TaskId> = tasks.iter().map(|t| t.id).collect();
            prop_assert_eq!(actual, model);
            for pair in tasks.windows(2) {
                prop_assert!(pair[0].order < pair[1].order);
            }
        }
    }
}
