//! Plan table operations: CRUD, catalog seeding, snapshot and load

use rusqlite::{Connection, OptionalExtension, params};
use tracing::{debug, info};

use crate::catalog::builtin_catalog;
use crate::database::Database;
use crate::error::{StoreError, StoreResult};
use crate::plan::{Plan, PlanDocument, PlanId, PlanNode, validate_forest};
use crate::task::{ParentRef, TaskId};
use crate::tasks::{fold_forest, insert_task};

fn insert_plan(conn: &Connection, title: &str, description: &str, tasks: &[PlanNode], is_custom: bool) -> StoreResult<Plan> {
    validate_forest(tasks)?;
    let json = serde_json::to_string(tasks)?;
    conn.execute(
        "INSERT INTO plans (title, description, tasks, is_custom) VALUES (?1, ?2, ?3, ?4)",
        params![title, description, json, is_custom],
    )?;
    Ok(Plan {
        id: PlanId(conn.last_insert_rowid()),
        title: title.to_string(),
        description: description.to_string(),
        tasks: tasks.to_vec(),
        is_custom,
    })
}

/// Replace every non-custom plan with the built-in catalog.
///
/// Runs on whatever connection or transaction it is handed; callers own the
/// transaction boundary.
pub(crate) fn reseed_catalog(conn: &Connection) -> StoreResult<usize> {
    let catalog = builtin_catalog()?;
    let removed = conn.execute("DELETE FROM plans WHERE is_custom = 0", [])?;
    for entry in &catalog {
        insert_plan(conn, &entry.title, &entry.description, &entry.tasks, false)?;
    }
    debug!(removed, inserted = catalog.len(), "reseed_catalog: done");
    Ok(catalog.len())
}

fn snapshot(conn: &Connection, parent: &ParentRef) -> StoreResult<Vec<PlanNode>> {
    fold_forest(conn, parent, |task, children| {
        PlanNode::new(task.title)
            .with_completed(task.completed)
            .with_children(children)
    })
}

/// Create one task per node below `parent`, depth-first in source order
fn instantiate(conn: &Connection, nodes: &[PlanNode], parent: ParentRef) -> StoreResult<usize> {
    let mut created = 0;
    let mut stack: Vec<(&PlanNode, ParentRef)> = nodes.iter().rev().map(|n| (n, parent)).collect();
    while let Some((node, under)) = stack.pop() {
        let task = insert_task(conn, &node.title, under, node.completed.unwrap_or(false))?;
        created += 1;
        stack.extend(node.children().iter().rev().map(|c| (c, ParentRef::Task(task.id))));
    }
    Ok(created)
}

impl Database {
    /// Store a new custom plan
    pub fn add_plan(&mut self, title: &str, description: &str, tasks: Vec<PlanNode>) -> StoreResult<Plan> {
        debug!(%title, "add_plan: called");
        if title.trim().is_empty() {
            return Err(StoreError::Validation("plan title must not be blank".to_string()));
        }
        let plan = insert_plan(&self.conn, title, description, &tasks, true)?;
        info!(id = %plan.id, title = %plan.title, "Added plan");
        Ok(plan)
    }

    pub fn get_plan(&self, id: PlanId) -> StoreResult<Option<Plan>> {
        debug!(%id, "get_plan: called");
        let sql = format!("SELECT {} FROM plans WHERE id = ?1", Plan::COLUMNS);
        let plan = self.conn.query_row(&sql, params![id], Plan::from_row).optional()?;
        Ok(plan)
    }

    /// Every plan, oldest first
    pub fn list_plans(&self) -> StoreResult<Vec<Plan>> {
        debug!("list_plans: called");
        let sql = format!("SELECT {} FROM plans ORDER BY id ASC", Plan::COLUMNS);
        let mut stmt = self.conn.prepare(&sql)?;
        let plans = stmt.query_map([], Plan::from_row)?.collect::<Result<Vec<_>, _>>()?;
        Ok(plans)
    }

    /// Remove a plan record. Tasks loaded from it are independent and stay.
    pub fn delete_plan(&mut self, id: PlanId) -> StoreResult<()> {
        debug!(%id, "delete_plan: called");
        let deleted = self.conn.execute("DELETE FROM plans WHERE id = ?1", params![id])?;
        if deleted == 0 {
            return Err(StoreError::NotFound(format!("plan {}", id)));
        }
        info!(%id, "Deleted plan");
        Ok(())
    }

    /// Restore the built-in catalog, leaving custom plans untouched.
    ///
    /// Returns `false` when there was nothing to seed.
    pub fn seed_plans(&mut self) -> StoreResult<bool> {
        debug!("seed_plans: called");
        if builtin_catalog()?.is_empty() {
            return Ok(false);
        }
        let tx = self.conn.transaction()?;
        let count = reseed_catalog(&tx)?;
        tx.commit()?;
        info!(count, "Seeded built-in plans");
        Ok(true)
    }

    /// Copy the live task forest into plan nodes
    pub fn snapshot_tasks(&self) -> StoreResult<Vec<PlanNode>> {
        debug!("snapshot_tasks: called");
        snapshot(&self.conn, &ParentRef::Root)
    }

    /// Snapshot the current tasks and store them as a new custom plan
    pub fn save_plan(&mut self, title: &str, description: &str) -> StoreResult<Plan> {
        debug!(%title, "save_plan: called");
        if title.trim().is_empty() {
            return Err(StoreError::Validation("plan title must not be blank".to_string()));
        }
        let tx = self.conn.transaction()?;
        let tasks = snapshot(&tx, &ParentRef::Root)?;
        let plan = insert_plan(&tx, title, description, &tasks, true)?;
        tx.commit()?;
        info!(id = %plan.id, tasks = plan.task_count(), "Saved current tasks as plan");
        Ok(plan)
    }

    /// Instantiate a plan as a new top-level task containing its tree.
    ///
    /// Existing tasks are left alone; loading the same plan twice yields two
    /// independent copies.
    pub fn load_plan(&mut self, id: PlanId) -> StoreResult<TaskId> {
        debug!(%id, "load_plan: called");
        let plan = self
            .get_plan(id)?
            .ok_or_else(|| StoreError::NotFound(format!("plan {}", id)))?;

        let tx = self.conn.transaction()?;
        let root = insert_task(&tx, &plan.title, ParentRef::Root, false)?;
        let created = instantiate(&tx, &plan.tasks, ParentRef::Task(root.id))?;
        tx.commit()?;
        info!(plan = %id, root = %root.id, created, "Loaded plan");
        Ok(root.id)
    }

    /// Store an external plan document as a new custom plan
    pub fn import_plan(&mut self, doc: PlanDocument) -> StoreResult<Plan> {
        debug!(title = %doc.title, "import_plan: called");
        doc.validate()?;
        let description = doc.description.unwrap_or_default();
        self.add_plan(&doc.title, &description, doc.tasks)
    }
}
