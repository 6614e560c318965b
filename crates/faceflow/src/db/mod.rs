//! Job record persistence.
//!
//! Uses rusqlite (SQLite) with a thread-safe `Database` handle. All
//! access is serialized through a `Mutex<Connection>`. Writes are
//! single statements with no multi-statement transactions, so partial
//! updates (status set, duration not yet) are observable transient
//! states, not corruption.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use log::{error, warn};
use rusqlite::Connection;

pub mod error;
pub mod job_repo;
pub mod migrations;
pub mod template_repo;

pub use error::DatabaseError;
pub use job_repo::{JobRecord, JobRepository, JobStatus};
pub use template_repo::{FaceTemplateRecord, TemplateRecord, TemplateRepository};

/// Bounded retry budget for write operations.
pub const WRITE_RETRIES: u32 = 5;
/// Fixed delay between write retries.
pub const WRITE_RETRY_DELAY: Duration = Duration::from_secs(1);

/// Thread-safe database handle wrapping a single rusqlite connection.
///
/// Cloning is cheap (inner `Arc`). WAL mode is enabled for concurrent
/// read performance when the database lives on disk.
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
    /// Present for file-backed databases; reconnect reopens this path.
    path: Option<PathBuf>,
    retry_delay: Duration,
}

impl Database {
    /// Opens (or creates) the database at the given path and runs all
    /// pending migrations.
    pub fn open(path: &Path) -> Result<Self, DatabaseError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| DatabaseError::Io {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }

        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")?;

        migrations::run_all(&conn)?;

        log::info!("Job record store opened at {}", path.display());

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            path: Some(path.to_path_buf()),
            retry_delay: WRITE_RETRY_DELAY,
        })
    }

    /// Opens an in-memory database for testing. Runs all migrations.
    pub fn open_in_memory() -> Result<Self, DatabaseError> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;

        migrations::run_all(&conn)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            path: None,
            retry_delay: WRITE_RETRY_DELAY,
        })
    }

    /// Overrides the fixed retry delay (tests).
    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    /// Provides locked access to the underlying connection.
    pub fn with_conn<F, T>(&self, f: F) -> Result<T, DatabaseError>
    where
        F: FnOnce(&Connection) -> Result<T, DatabaseError>,
    {
        let conn = self.conn.lock().map_err(|_| DatabaseError::LockPoisoned)?;
        f(&conn)
    }

    /// Drops and reopens the connection. In-memory databases cannot be
    /// reopened without losing their contents, so they keep the
    /// existing connection.
    fn reconnect(&self) -> Result<(), DatabaseError> {
        let Some(ref path) = self.path else {
            return Ok(());
        };
        let fresh = Connection::open(path)?;
        fresh.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")?;
        let mut conn = self.conn.lock().map_err(|_| DatabaseError::LockPoisoned)?;
        *conn = fresh;
        Ok(())
    }

    /// Runs `op` with a bounded reconnect-and-retry loop: up to
    /// [`WRITE_RETRIES`] retries with a fixed delay, reconnecting
    /// before each retry. After the budget is exhausted the operation
    /// is abandoned and logged; `None` means "operation not applied"
    /// and callers must treat it that way.
    pub fn retrying<T>(
        &self,
        what: &str,
        op: impl Fn(&Database) -> Result<T, DatabaseError>,
    ) -> Option<T> {
        let mut attempt = 0u32;
        loop {
            match op(self) {
                Ok(value) => return Some(value),
                Err(e) if attempt < WRITE_RETRIES => {
                    attempt += 1;
                    warn!(
                        "Record store operation '{}' failed (retry {}/{}): {}",
                        what, attempt, WRITE_RETRIES, e
                    );
                    if let Err(re) = self.reconnect() {
                        warn!("Record store reconnect failed: {}", re);
                    }
                    std::thread::sleep(self.retry_delay);
                }
                Err(e) => {
                    error!(
                        "Record store operation '{}' abandoned after {} retries: {}",
                        what, WRITE_RETRIES, e
                    );
                    return None;
                }
            }
        }
    }
}
