//! Durable broker channels with at-least-once, ack-at-receipt delivery.
//!
//! The broker is a SQLite file shared by producers and consumers. A
//! connection is opened per operation and released deterministically,
//! never held as an ambient process-wide handle. Durability comes from
//! the broker file; the queue is a dispatch mechanism, not the
//! durability mechanism for job outcomes (those live in the job record
//! store).

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

use log::{debug, error, warn};
use rusqlite::{params, Connection};

use crate::error::ChannelError;

use super::descriptor::JobDescriptor;

/// Idle sleep between polls when the channel is empty.
pub const POLL_INTERVAL: Duration = Duration::from_millis(100);
/// Backoff before reconnecting after a connection-level failure.
pub const RECONNECT_DELAY: Duration = Duration::from_millis(500);

/// The queue transport contract.
///
/// Delivery is at-least-once with acknowledgment at receipt: a message
/// handed to a consumer is removed from the durable store before
/// processing completes. A consumer crash mid-job therefore loses the
/// in-flight message, an accepted trade-off, since job outcomes are
/// persisted in the record store, not the queue.
pub trait TaskChannel: Send + Sync {
    /// Durably stores a descriptor on the named channel. Fails with
    /// [`ChannelError::Unavailable`] when the broker cannot be reached;
    /// retrying is the caller's decision.
    fn publish(&self, channel: &str, descriptor: &JobDescriptor) -> Result<(), ChannelError>;

    /// Non-blocking pull with immediate acknowledgment: the returned
    /// message is already removed from the channel. `None` when no
    /// message is waiting.
    fn consume_one(&self, channel: &str) -> Result<Option<JobDescriptor>, ChannelError>;

    /// Drains and returns every queued message. Destructive: there is
    /// no non-consuming peek; callers doing introspection must treat
    /// this as consuming.
    fn drain(&self, channel: &str) -> Result<Vec<JobDescriptor>, ChannelError>;

    /// Polling consume loop. Invokes `handler` synchronously per
    /// message; handler errors are logged and the loop continues (the
    /// message was already acknowledged, so there is no requeue).
    /// Connection-level failures back off [`RECONNECT_DELAY`] and
    /// reconnect indefinitely. Runs until `stop` is set; production
    /// workers only set it at process shutdown.
    fn listen(
        &self,
        channel: &str,
        stop: &AtomicBool,
        handler: &mut dyn FnMut(JobDescriptor) -> Result<(), crate::error::FaceflowError>,
    ) {
        while !stop.load(Ordering::Relaxed) {
            match self.consume_one(channel) {
                Ok(Some(descriptor)) => {
                    let job_id = descriptor.job_id.clone();
                    if let Err(e) = handler(descriptor) {
                        // Already acknowledged: no requeue. The job
                        // record store carries the failure outcome.
                        error!("Error processing task {}: {}", job_id, e);
                    }
                }
                Ok(None) => {
                    thread::sleep(POLL_INTERVAL);
                }
                Err(e) => {
                    warn!("Channel '{}' failure, reconnecting: {}", channel, e);
                    thread::sleep(RECONNECT_DELAY);
                }
            }
        }
        debug!("Listener on '{}' stopped", channel);
    }
}

/// SQLite-file-backed broker.
pub struct SqliteChannel {
    path: PathBuf,
}

impl SqliteChannel {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Opens a broker connection and declares the durable message
    /// table. Any failure here is the broker-unreachable case.
    fn connect(&self) -> Result<Connection, ChannelError> {
        let conn = Connection::open(&self.path)?;
        conn.busy_timeout(Duration::from_secs(5))?;
        conn.execute_batch(
            "PRAGMA journal_mode=WAL;
             CREATE TABLE IF NOT EXISTS messages (
                 id INTEGER PRIMARY KEY AUTOINCREMENT,
                 channel TEXT NOT NULL,
                 body TEXT NOT NULL,
                 published_at TEXT NOT NULL
             );
             CREATE INDEX IF NOT EXISTS idx_messages_channel
                 ON messages(channel, id);",
        )?;
        Ok(conn)
    }

    /// Pops the oldest message on `channel`, deleting it in the same
    /// transaction that reads it (acknowledgment at receipt).
    fn pop(conn: &mut Connection, channel: &str) -> Result<Option<String>, ChannelError> {
        let tx = conn.transaction()?;
        let row: Option<(i64, String)> = {
            let mut stmt = tx.prepare(
                "SELECT id, body FROM messages WHERE channel = ?1 ORDER BY id LIMIT 1",
            )?;
            let mut rows = stmt.query(params![channel])?;
            match rows.next()? {
                Some(row) => Some((row.get(0)?, row.get(1)?)),
                None => None,
            }
        };

        match row {
            Some((id, body)) => {
                tx.execute("DELETE FROM messages WHERE id = ?1", params![id])?;
                tx.commit()?;
                Ok(Some(body))
            }
            None => Ok(None),
        }
    }
}

impl TaskChannel for SqliteChannel {
    fn publish(&self, channel: &str, descriptor: &JobDescriptor) -> Result<(), ChannelError> {
        let body = descriptor.to_json().map_err(ChannelError::Encode)?;
        let conn = self.connect()?;
        conn.execute(
            "INSERT INTO messages (channel, body, published_at) VALUES (?1, ?2, ?3)",
            params![channel, body, chrono::Utc::now().to_rfc3339()],
        )?;
        debug!("Published {} to '{}'", descriptor.job_id, channel);
        Ok(())
        // Connection dropped here: released after every operation.
    }

    fn consume_one(&self, channel: &str) -> Result<Option<JobDescriptor>, ChannelError> {
        let mut conn = self.connect()?;
        match Self::pop(&mut conn, channel)? {
            Some(body) => {
                let descriptor =
                    JobDescriptor::from_json(&body).map_err(ChannelError::Decode)?;
                Ok(Some(descriptor))
            }
            None => Ok(None),
        }
    }

    fn drain(&self, channel: &str) -> Result<Vec<JobDescriptor>, ChannelError> {
        let mut conn = self.connect()?;
        let mut tasks = Vec::new();
        while let Some(body) = Self::pop(&mut conn, channel)? {
            tasks.push(JobDescriptor::from_json(&body).map_err(ChannelError::Decode)?);
        }
        Ok(tasks)
    }
}
