use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DatabaseError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("I/O error at '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Database lock poisoned")]
    LockPoisoned,

    #[error("Migration {version} ({description}) failed: {source}")]
    Migration {
        version: u32,
        description: String,
        #[source]
        source: rusqlite::Error,
    },

    #[error("Invalid job status '{0}'")]
    InvalidStatus(String),
}
