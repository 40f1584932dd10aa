//! SQLite schema, as ordered migrations.

/// Bookkeeping table recording applied migrations.
pub const SCHEMA_VERSION_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS schema_version (
    version INTEGER PRIMARY KEY,
    applied_at TEXT NOT NULL
);
"#;

/// v1: one row per (review, question). Rows are never deleted; a cleared
/// answer keeps its row with `value = ''`.
const V1_REVIEW_ANSWERS: &str = r#"
CREATE TABLE IF NOT EXISTS review_answers (
    review_id TEXT NOT NULL,
    question_id TEXT NOT NULL,
    value TEXT NOT NULL DEFAULT '',
    shared_with_patient INTEGER NOT NULL DEFAULT 0 CHECK (shared_with_patient IN (0, 1)),
    shared_with_doctor INTEGER NOT NULL DEFAULT 0 CHECK (shared_with_doctor IN (0, 1)),
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    PRIMARY KEY (review_id, question_id)
);

CREATE INDEX IF NOT EXISTS idx_answers_updated ON review_answers(review_id, updated_at);
"#;

/// Migrations in application order.
pub const MIGRATIONS: &[(i64, &str)] = &[(1, V1_REVIEW_ANSWERS)];

/// Version the schema is at once every migration has run.
pub fn latest_version() -> i64 {
    MIGRATIONS.last().map(|(version, _)| *version).unwrap_or(0)
}
