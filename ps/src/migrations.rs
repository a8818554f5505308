//! Versioned schema migrations
//!
//! Each migration runs in its own transaction together with the row that
//! records it, so an interrupted upgrade leaves the previous version intact.
//! Migrations may restructure tables and indexes and may also rewrite
//! existing rows (back-fills, catalog re-seeds).

use rusqlite::{Connection, Transaction, params};
use tracing::{debug, info};

use crate::error::StoreResult;
use crate::plans::reseed_catalog;

/// Latest schema version
pub const SCHEMA_VERSION: i32 = 4;

struct Migration {
    version: i32,
    description: &'static str,
    apply: fn(&Transaction<'_>) -> StoreResult<()>,
}

const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        description: "Initial tasks table",
        apply: initial_tasks,
    },
    Migration {
        version: 2,
        description: "Add sibling sort order",
        apply: add_sort_order,
    },
    Migration {
        version: 3,
        description: "Add plans table and seed the catalog",
        apply: add_plans,
    },
    Migration {
        version: 4,
        description: "Re-seed the built-in catalog",
        apply: reseed_plans,
    },
];

fn initial_tasks(tx: &Transaction<'_>) -> StoreResult<()> {
    tx.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS tasks (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            title TEXT NOT NULL,
            completed INTEGER NOT NULL DEFAULT 0,
            parent_id TEXT NOT NULL DEFAULT 'root',
            created_at INTEGER NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_tasks_title ON tasks(title);
        CREATE INDEX IF NOT EXISTS idx_tasks_completed ON tasks(completed);
        CREATE INDEX IF NOT EXISTS idx_tasks_parent ON tasks(parent_id);
        CREATE INDEX IF NOT EXISTS idx_tasks_created ON tasks(created_at);
        "#,
    )?;
    Ok(())
}

fn add_sort_order(tx: &Transaction<'_>) -> StoreResult<()> {
    tx.execute_batch(
        r#"
        ALTER TABLE tasks ADD COLUMN sort_order REAL NOT NULL DEFAULT 0;
        CREATE INDEX IF NOT EXISTS idx_tasks_parent_order ON tasks(parent_id, sort_order);
        "#,
    )?;
    // Existing rows keep their creation order
    let backfilled = tx.execute("UPDATE tasks SET sort_order = created_at", [])?;
    debug!(backfilled, "add_sort_order: back-filled existing tasks");
    Ok(())
}

fn add_plans(tx: &Transaction<'_>) -> StoreResult<()> {
    tx.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS plans (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            title TEXT NOT NULL,
            description TEXT NOT NULL DEFAULT '',
            tasks TEXT NOT NULL DEFAULT '[]',
            is_custom INTEGER NOT NULL DEFAULT 1
        );

        CREATE INDEX IF NOT EXISTS idx_plans_title ON plans(title);
        CREATE INDEX IF NOT EXISTS idx_plans_custom ON plans(is_custom);
        "#,
    )?;
    reseed_catalog(tx)?;
    Ok(())
}

fn reseed_plans(tx: &Transaction<'_>) -> StoreResult<()> {
    reseed_catalog(tx)?;
    Ok(())
}

/// Highest applied version (0 for a brand-new file)
pub(crate) fn current_version(conn: &Connection) -> StoreResult<i32> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY,
            applied_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
        )",
        [],
    )?;
    let version = conn.query_row("SELECT COALESCE(MAX(version), 0) FROM schema_version", [], |row| {
        row.get(0)
    })?;
    Ok(version)
}

/// Apply every migration above the current version, up to `target`
pub(crate) fn migrate_to(conn: &mut Connection, target: i32) -> StoreResult<()> {
    let current = current_version(conn)?;
    info!("Database schema version: {} (target: {})", current, target);

    if current >= target {
        return Ok(());
    }

    for migration in MIGRATIONS
        .iter()
        .filter(|m| m.version > current && m.version <= target)
    {
        info!("Running migration {}: {}", migration.version, migration.description);
        let tx = conn.transaction()?;
        (migration.apply)(&tx)?;
        tx.execute("INSERT INTO schema_version (version) VALUES (?1)", params![migration.version])?;
        tx.commit()?;
    }

    info!("Migrations complete");
    Ok(())
}
