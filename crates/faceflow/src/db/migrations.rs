//! Schema migrations, applied in order at open.
//!
//! Applied versions are tracked in a `_migrations` table. Each
//! migration is a SQL batch embedded at compile time. Migrations are
//! append-only: released versions are never edited, new schema changes
//! get a new file.

use log::info;
use rusqlite::Connection;

use super::error::DatabaseError;

struct Migration {
    version: u32,
    description: &'static str,
    sql: &'static str,
}

const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        description: "create jobs",
        sql: include_str!("sql/001_create_jobs.sql"),
    },
    Migration {
        version: 2,
        description: "create templates",
        sql: include_str!("sql/002_create_templates.sql"),
    },
    Migration {
        version: 3,
        description: "create face templates",
        sql: include_str!("sql/003_create_face_templates.sql"),
    },
];

/// Applies every migration not yet recorded in `_migrations`.
pub fn run_all(conn: &Connection) -> Result<(), DatabaseError> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS _migrations (
             version INTEGER PRIMARY KEY,
             description TEXT NOT NULL,
             applied_at TEXT NOT NULL
         )",
        [],
    )?;

    let current: u32 = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM _migrations",
        [],
        |row| row.get(0),
    )?;

    for migration in MIGRATIONS.iter().filter(|m| m.version > current) {
        conn.execute_batch(migration.sql)
            .map_err(|e| DatabaseError::Migration {
                version: migration.version,
                description: migration.description.to_string(),
                source: e,
            })?;
        conn.execute(
            "INSERT INTO _migrations (version, description, applied_at) VALUES (?1, ?2, ?3)",
            rusqlite::params![
                migration.version,
                migration.description,
                chrono::Utc::now().to_rfc3339()
            ],
        )?;
        info!(
            "Applied migration {} ({})",
            migration.version, migration.description
        );
    }

    Ok(())
}
