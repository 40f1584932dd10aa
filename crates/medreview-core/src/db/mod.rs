//! Local SQLite store for review answers.
//!
//! A single `review_answers` table keyed by `(review_id, question_id)` holds
//! the persisted value and sharing flags of every answered question. Schema
//! changes are applied as numbered migrations recorded in `schema_version`.

mod answers;
mod schema;

pub use schema::*;

use std::path::Path;

use rusqlite::{params, Connection};
use thiserror::Error;

/// Database errors.
#[derive(Error, Debug)]
pub enum DbError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Migration v{version} failed: {reason}")]
    MigrationFailed { version: i64, reason: String },

    #[error("Answer not found: {0}")]
    NotFound(String),

    #[error("Answer already exists: {0}")]
    Constraint(String),
}

pub type DbResult<T> = Result<T, DbError>;

/// Connection to the answer database.
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Open the database at `path`, creating it and applying pending
    /// migrations as needed.
    pub fn open<P: AsRef<Path>>(path: P) -> DbResult<Self> {
        Self::with_connection(Connection::open(path)?)
    }

    /// In-memory database (for testing).
    pub fn open_in_memory() -> DbResult<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> DbResult<Self> {
        conn.execute_batch("PRAGMA journal_mode=DELETE;")?;
        let db = Self { conn };
        db.migrate()?;
        Ok(db)
    }

    /// Apply every migration newer than the recorded schema version.
    fn migrate(&self) -> DbResult<()> {
        self.conn.execute_batch(SCHEMA_VERSION_TABLE)?;
        let current = self.schema_version()?;

        for (version, sql) in MIGRATIONS.iter().filter(|(v, _)| *v > current) {
            tracing::info!(version, "Applying answer database migration");
            let apply = || -> rusqlite::Result<()> {
                self.conn.execute_batch(sql)?;
                self.conn.execute(
                    "INSERT INTO schema_version (version, applied_at) VALUES (?1, ?2)",
                    params![version, chrono::Utc::now().to_rfc3339()],
                )?;
                Ok(())
            };
            apply().map_err(|e| DbError::MigrationFailed {
                version: *version,
                reason: e.to_string(),
            })?;
        }
        Ok(())
    }

    /// Highest applied migration (0 for a fresh file).
    pub fn schema_version(&self) -> DbResult<i64> {
        Ok(self.conn.query_row(
            "SELECT COALESCE(MAX(version), 0) FROM schema_version",
            [],
            |row| row.get(0),
        )?)
    }

    /// Raw connection, for ad-hoc queries.
    pub fn conn(&self) -> &Connection {
        &self.conn
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn column_names(db: &Database, table: &str) -> Vec<String> {
        let mut stmt = db
            .conn()
            .prepare(&format!("SELECT name FROM pragma_table_info('{}')", table))
            .unwrap();
        stmt.query_map([], |row| row.get(0))
            .unwrap()
            .collect::<Result<_, _>>()
            .unwrap()
    }

    #[test]
    fn test_fresh_database_is_at_latest_version() {
        let db = Database::open_in_memory().unwrap();
        assert_eq!(db.schema_version().unwrap(), latest_version());
    }

    #[test]
    fn test_answer_table_columns() {
        let db = Database::open_in_memory().unwrap();
        assert_eq!(
            column_names(&db, "review_answers"),
            vec![
                "review_id",
                "question_id",
                "value",
                "shared_with_patient",
                "shared_with_doctor",
                "created_at",
                "updated_at",
            ]
        );
    }

    #[test]
    fn test_sharing_flags_are_checked() {
        let db = Database::open_in_memory().unwrap();
        let result = db.conn().execute(
            "INSERT INTO review_answers VALUES ('r1', 'q1', '', 2, 0, 'now', 'now')",
            [],
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_reopen_does_not_reapply_migrations() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("answers.db");

        Database::open(&path).unwrap();
        let db = Database::open(&path).unwrap();

        let applied: i64 = db
            .conn()
            .query_row("SELECT COUNT(*) FROM schema_version", [], |row| row.get(0))
            .unwrap();
        assert_eq!(applied, MIGRATIONS.len() as i64);
        assert!(db.migrate().is_ok());
    }
}
