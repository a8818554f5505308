//! ProntuStore - hierarchical task persistence
//!
//! A single SQLite file holds two tables: a forest of tasks (ordered siblings,
//! arbitrary nesting) and a set of plans (reusable task-tree templates).
//!
//! # Architecture
//!
//! ```text
//! prontu.db
//! ├── schema_version   # applied migrations
//! ├── tasks            # id, title, completed, parent_id, sort_order, created_at
//! └── plans            # id, title, description, tasks (JSON), is_custom
//! ```
//!
//! Every task's `parent_id` is either `"root"` or the id of another task.
//! Deleting a task removes its whole subtree.
//!
//! # Example
//!
//! ```ignore
//! use prontustore::{Database, ParentRef};
//!
//! let mut db = Database::open("prontu.db")?;
//! let train = db.add_task("Train", ParentRef::Root, false)?;
//! db.add_task("Stretch", ParentRef::Task(train.id), false)?;
//! let children = db.get_tasks(&ParentRef::Task(train.id))?;
//! db.delete_task(train.id)?;
//! ```

mod catalog;
mod database;
mod error;
mod migrations;
mod order;
mod plan;
mod plans;
mod task;
mod tasks;

pub use catalog::{CATALOG_JSON, CatalogPlan, builtin_catalog};
pub use database::Database;
pub use error::{StoreError, StoreResult};
pub use migrations::SCHEMA_VERSION;
pub use order::{INSERT_BEFORE_GAP, order_before};
pub use plan::{MAX_PLAN_DEPTH, Plan, PlanDocument, PlanId, PlanNode};
pub use task::{ParentRef, Task, TaskChange, TaskId, TaskNode, TaskPatch};

/// Current time as Unix milliseconds
pub fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
