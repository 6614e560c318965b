//! Job rows and the status state machine.
//!
//! A job is inserted as `queued` by the producer, moved to `in_work`
//! the moment a worker dequeues its descriptor, and ends in `done` or
//! `error`. Terminal states have no exits. The status column, not the
//! queue, is the durable record of what happened to a job.

use chrono::Utc;
use log::warn;
use rusqlite::params;

use super::error::DatabaseError;
use super::Database;

/// Lifecycle state of a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobStatus {
    Queued,
    InWork,
    Done,
    Error,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Queued => "queued",
            JobStatus::InWork => "in_work",
            JobStatus::Done => "done",
            JobStatus::Error => "error",
        }
    }

    pub fn parse(s: &str) -> Result<Self, DatabaseError> {
        match s {
            "queued" => Ok(JobStatus::Queued),
            "in_work" => Ok(JobStatus::InWork),
            "done" => Ok(JobStatus::Done),
            "error" => Ok(JobStatus::Error),
            other => Err(DatabaseError::InvalidStatus(other.to_string())),
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Done | JobStatus::Error)
    }

    /// Legal transitions: queued -> in_work -> {done, error}. A job may
    /// also fail straight from queued when its descriptor cannot be
    /// handed to a worker.
    pub fn can_transition_to(&self, next: JobStatus) -> bool {
        match (self, next) {
            (JobStatus::Queued, JobStatus::InWork) => true,
            (JobStatus::Queued, JobStatus::Error) => true,
            (JobStatus::InWork, JobStatus::Done) => true,
            (JobStatus::InWork, JobStatus::Error) => true,
            _ => false,
        }
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One row of the `jobs` table.
#[derive(Debug, Clone)]
pub struct JobRecord {
    pub job_id: String,
    pub status: JobStatus,
    pub server: Option<String>,
    pub template_id: String,
    /// Local path the ingest side decoded the submitted image to.
    pub decoded_image_path: Option<String>,
    pub source_path: Option<String>,
    /// Storage key of the result thumbnail, when one was generated.
    pub thumb: Option<String>,
    /// Storage key of the reduced preview rendition of the result.
    pub preview_source: Option<String>,
    pub watermark: bool,
    pub duration_seconds: Option<i64>,
    pub is_image: bool,
    /// True when the job introduced its template to the catalog.
    pub is_new_template: bool,
    pub premium: bool,
    pub created_at: String,
    pub updated_at: String,
}

/// Queries and single-statement writes over `jobs`.
///
/// Every mutation has a `try_*` twin that wraps it in the bounded
/// retry loop and returns `Option`: `None` means the write was not
/// applied and the row keeps its previous value.
pub struct JobRepository {
    db: Database,
}

impl JobRepository {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    pub fn insert(&self, record: &JobRecord) -> Result<(), DatabaseError> {
        self.db.with_conn(|conn| {
            conn.execute(
                "INSERT INTO jobs (job_id, status, server, template_id,
                                   decoded_image_path, source_path, thumb,
                                   preview_source, watermark, duration_seconds,
                                   is_image, is_new_template, premium,
                                   created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12,
                         ?13, ?14, ?15)",
                params![
                    record.job_id,
                    record.status.as_str(),
                    record.server,
                    record.template_id,
                    record.decoded_image_path,
                    record.source_path,
                    record.thumb,
                    record.preview_source,
                    record.watermark,
                    record.duration_seconds,
                    record.is_image,
                    record.is_new_template,
                    record.premium,
                    record.created_at,
                    record.updated_at,
                ],
            )?;
            Ok(())
        })
    }

    pub fn find_by_id(&self, job_id: &str) -> Result<Option<JobRecord>, DatabaseError> {
        self.db.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT job_id, status, server, template_id, decoded_image_path,
                        source_path, thumb, preview_source, watermark,
                        duration_seconds, is_image, is_new_template, premium,
                        created_at, updated_at
                 FROM jobs WHERE job_id = ?1",
            )?;
            let mut rows = stmt.query(params![job_id])?;
            match rows.next()? {
                Some(row) => {
                    let status: String = row.get(1)?;
                    Ok(Some(JobRecord {
                        job_id: row.get(0)?,
                        status: JobStatus::parse(&status)?,
                        server: row.get(2)?,
                        template_id: row.get(3)?,
                        decoded_image_path: row.get(4)?,
                        source_path: row.get(5)?,
                        thumb: row.get(6)?,
                        preview_source: row.get(7)?,
                        watermark: row.get(8)?,
                        duration_seconds: row.get(9)?,
                        is_image: row.get(10)?,
                        is_new_template: row.get(11)?,
                        premium: row.get(12)?,
                        created_at: row.get(13)?,
                        updated_at: row.get(14)?,
                    }))
                }
                None => Ok(None),
            }
        })
    }

    /// Sets the status unconditionally. Transition legality is checked
    /// and logged, not enforced: a worker that decided a job is done
    /// must be able to say so even if the row was mangled meanwhile.
    pub fn update_status(&self, job_id: &str, status: JobStatus) -> Result<(), DatabaseError> {
        if let Some(current) = self.find_by_id(job_id)? {
            if !current.status.can_transition_to(status) && current.status != status {
                warn!(
                    "Job {} status {} -> {} is not a declared transition",
                    job_id, current.status, status
                );
            }
        }
        self.db.with_conn(|conn| {
            conn.execute(
                "UPDATE jobs SET status = ?1, updated_at = ?2 WHERE job_id = ?3",
                params![status.as_str(), Utc::now().to_rfc3339(), job_id],
            )?;
            Ok(())
        })
    }

    pub fn update_duration(&self, job_id: &str, seconds: i64) -> Result<(), DatabaseError> {
        self.db.with_conn(|conn| {
            conn.execute(
                "UPDATE jobs SET duration_seconds = ?1, updated_at = ?2 WHERE job_id = ?3",
                params![seconds, Utc::now().to_rfc3339(), job_id],
            )?;
            Ok(())
        })
    }

    /// Records the storage key of the delivered result (or of the
    /// re-uploaded original on failure).
    pub fn update_source(&self, job_id: &str, source_path: &str) -> Result<(), DatabaseError> {
        self.db.with_conn(|conn| {
            conn.execute(
                "UPDATE jobs SET source_path = ?1, updated_at = ?2 WHERE job_id = ?3",
                params![source_path, Utc::now().to_rfc3339(), job_id],
            )?;
            Ok(())
        })
    }

    /// Records which worker host picked the job up.
    pub fn update_server(&self, job_id: &str, server: &str) -> Result<(), DatabaseError> {
        self.db.with_conn(|conn| {
            conn.execute(
                "UPDATE jobs SET server = ?1, updated_at = ?2 WHERE job_id = ?3",
                params![server, Utc::now().to_rfc3339(), job_id],
            )?;
            Ok(())
        })
    }

    pub fn count_by_status(&self, status: JobStatus) -> Result<u64, DatabaseError> {
        self.db.with_conn(|conn| {
            let n: u64 = conn.query_row(
                "SELECT COUNT(*) FROM jobs WHERE status = ?1",
                params![status.as_str()],
                |row| row.get(0),
            )?;
            Ok(n)
        })
    }

    pub fn try_update_status(&self, job_id: &str, status: JobStatus) -> Option<()> {
        self.db
            .retrying("update_status", |_| self.update_status(job_id, status))
    }

    pub fn try_update_duration(&self, job_id: &str, seconds: i64) -> Option<()> {
        self.db
            .retrying("update_duration", |_| self.update_duration(job_id, seconds))
    }

    pub fn try_update_source(&self, job_id: &str, source_path: &str) -> Option<()> {
        self.db
            .retrying("update_source", |_| self.update_source(job_id, source_path))
    }

    pub fn try_update_server(&self, job_id: &str, server: &str) -> Option<()> {
        self.db
            .retrying("update_server", |_| self.update_server(job_id, server))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(job_id: &str) -> JobRecord {
        let now = Utc::now().to_rfc3339();
        JobRecord {
            job_id: job_id.to_string(),
            status: JobStatus::Queued,
            server: None,
            template_id: "7".to_string(),
            decoded_image_path: None,
            source_path: None,
            thumb: None,
            preview_source: None,
            watermark: true,
            duration_seconds: None,
            is_image: true,
            is_new_template: false,
            premium: false,
            created_at: now.clone(),
            updated_at: now,
        }
    }

    fn repo() -> JobRepository {
        JobRepository::new(Database::open_in_memory().unwrap())
    }

    // ── status state machine ──

    #[test]
    fn test_status_string_round_trip() {
        for status in [
            JobStatus::Queued,
            JobStatus::InWork,
            JobStatus::Done,
            JobStatus::Error,
        ] {
            assert_eq!(JobStatus::parse(status.as_str()).unwrap(), status);
        }
        assert!(JobStatus::parse("bogus").is_err());
    }

    #[test]
    fn test_terminal_states_have_no_exits() {
        for terminal in [JobStatus::Done, JobStatus::Error] {
            assert!(terminal.is_terminal());
            for next in [
                JobStatus::Queued,
                JobStatus::InWork,
                JobStatus::Done,
                JobStatus::Error,
            ] {
                assert!(!terminal.can_transition_to(next));
            }
        }
    }

    #[test]
    fn test_declared_transitions() {
        assert!(JobStatus::Queued.can_transition_to(JobStatus::InWork));
        assert!(JobStatus::Queued.can_transition_to(JobStatus::Error));
        assert!(JobStatus::InWork.can_transition_to(JobStatus::Done));
        assert!(JobStatus::InWork.can_transition_to(JobStatus::Error));
        assert!(!JobStatus::Queued.can_transition_to(JobStatus::Done));
        assert!(!JobStatus::InWork.can_transition_to(JobStatus::Queued));
    }

    // ── repository ──

    #[test]
    fn test_insert_and_find() {
        let repo = repo();
        repo.insert(&record("j1")).unwrap();

        let found = repo.find_by_id("j1").unwrap().unwrap();
        assert_eq!(found.status, JobStatus::Queued);
        assert_eq!(found.template_id, "7");
        assert!(found.watermark);
        assert!(found.duration_seconds.is_none());
    }

    #[test]
    fn test_media_columns_round_trip() {
        let repo = repo();
        let mut rec = record("j1");
        rec.decoded_image_path = Some("/tmp/decoded/j1.png".to_string());
        rec.thumb = Some("thumbs/j1.jpg".to_string());
        rec.preview_source = Some("previews/j1.mp4".to_string());
        rec.is_new_template = true;
        repo.insert(&rec).unwrap();

        let found = repo.find_by_id("j1").unwrap().unwrap();
        assert_eq!(
            found.decoded_image_path.as_deref(),
            Some("/tmp/decoded/j1.png")
        );
        assert_eq!(found.thumb.as_deref(), Some("thumbs/j1.jpg"));
        assert_eq!(found.preview_source.as_deref(), Some("previews/j1.mp4"));
        assert!(found.is_new_template);
    }

    #[test]
    fn test_find_missing_returns_none() {
        assert!(repo().find_by_id("nope").unwrap().is_none());
    }

    #[test]
    fn test_full_lifecycle_updates() {
        let repo = repo();
        repo.insert(&record("j1")).unwrap();

        repo.update_status("j1", JobStatus::InWork).unwrap();
        repo.update_duration("j1", 42).unwrap();
        repo.update_status("j1", JobStatus::Done).unwrap();
        repo.update_source("j1", "results/j1.png").unwrap();

        let found = repo.find_by_id("j1").unwrap().unwrap();
        assert_eq!(found.status, JobStatus::Done);
        assert_eq!(found.duration_seconds, Some(42));
        assert_eq!(found.source_path.as_deref(), Some("results/j1.png"));
    }

    #[test]
    fn test_count_by_status() {
        let repo = repo();
        repo.insert(&record("a")).unwrap();
        repo.insert(&record("b")).unwrap();
        repo.update_status("a", JobStatus::InWork).unwrap();

        assert_eq!(repo.count_by_status(JobStatus::Queued).unwrap(), 1);
        assert_eq!(repo.count_by_status(JobStatus::InWork).unwrap(), 1);
        assert_eq!(repo.count_by_status(JobStatus::Done).unwrap(), 0);
    }

    #[test]
    fn test_try_update_applies_on_healthy_db() {
        let repo = JobRepository::new(
            Database::open_in_memory()
                .unwrap()
                .with_retry_delay(std::time::Duration::ZERO),
        );
        repo.insert(&record("j1")).unwrap();
        assert!(repo.try_update_status("j1", JobStatus::InWork).is_some());
        assert_eq!(
            repo.find_by_id("j1").unwrap().unwrap().status,
            JobStatus::InWork
        );
    }

    #[test]
    fn test_duplicate_insert_is_an_error() {
        let repo = repo();
        repo.insert(&record("j1")).unwrap();
        assert!(repo.insert(&record("j1")).is_err());
    }
}
