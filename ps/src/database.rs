//! SQLite database wrapper

use std::path::{Path, PathBuf};
use std::time::Duration;

use rusqlite::Connection;
use tracing::{debug, info};

use crate::error::StoreResult;
use crate::migrations;

/// Handle to the store's SQLite file.
///
/// Constructed once at startup and passed by reference to whatever needs it.
/// Opening runs every pending migration, so a `Database` is always at
/// [`SCHEMA_VERSION`](crate::SCHEMA_VERSION).
pub struct Database {
    pub(crate) conn: Connection,
    path: Option<PathBuf>,
}

impl Database {
    /// Open (or create) the database at `path` and migrate it to the latest schema
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        let mut db = Self::open_unmigrated(path.as_ref())?;
        migrations::migrate_to(&mut db.conn, migrations::SCHEMA_VERSION)?;
        Ok(db)
    }

    /// Open a private in-memory database (tests, dry runs)
    pub fn open_in_memory() -> StoreResult<Self> {
        debug!("open_in_memory: called");
        let mut conn = Connection::open_in_memory()?;
        migrations::migrate_to(&mut conn, migrations::SCHEMA_VERSION)?;
        Ok(Self { conn, path: None })
    }

    pub(crate) fn open_unmigrated(path: &Path) -> StoreResult<Self> {
        debug!(path = %path.display(), "open: called");
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.busy_timeout(Duration::from_secs(5))?;

        Ok(Self {
            conn,
            path: Some(path.to_path_buf()),
        })
    }

    /// Upgrade to an explicit schema version (tests stop at older versions)
    #[cfg(test)]
    pub(crate) fn migrate_to(&mut self, version: i32) -> StoreResult<()> {
        migrations::migrate_to(&mut self.conn, version)
    }

    /// Applied schema version
    pub fn schema_version(&self) -> StoreResult<i32> {
        migrations::current_version(&self.conn)
    }

    /// Path of the backing file (`None` for in-memory databases)
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Close the connection, flushing the WAL
    pub fn close(self) -> StoreResult<()> {
        debug!("close: called");
        self.conn.close().map_err(|(_, e)| e)?;
        Ok(())
    }

    /// Delete the database file and its WAL companions.
    ///
    /// This is the unconditional hard reset: nothing is kept and nothing can
    /// be undone. Any open `Database` on this path must be closed first.
    pub fn destroy(path: impl AsRef<Path>) -> StoreResult<()> {
        let path = path.as_ref();
        info!(path = %path.display(), "Destroying database");
        for candidate in companion_paths(path) {
            match std::fs::remove_file(&candidate) {
                Ok(()) => debug!(path = %candidate.display(), "destroy: removed"),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        }
        Ok(())
    }
}

/// The WAL companions, then the main file last so a failed removal leaves
/// the database itself intact
fn companion_paths(path: &Path) -> Vec<PathBuf> {
    let mut paths: Vec<PathBuf> = ["-wal", "-shm"]
        .iter()
        .map(|suffix| {
            let mut name = path.as_os_str().to_os_string();
            name.push(suffix);
            PathBuf::from(name)
        })
        .collect();
    paths.push(path.to_path_buf());
    paths
}
