//! Answer backend over the local SQLite database.

use std::path::Path;
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;

use super::{AnswerBackend, BackendError, BackendResult};
use crate::db::{Database, DbError};
use crate::models::{Answer, AnswerPatch, NewAnswer, ReviewId};

/// Thread-safe SQLite-backed answer persistence.
pub struct SqliteBackend {
    db: Mutex<Database>,
}

impl SqliteBackend {
    pub fn new(db: Database) -> Self {
        Self { db: Mutex::new(db) }
    }

    /// Open or create a database at the given path.
    pub fn open<P: AsRef<Path>>(path: P) -> BackendResult<Self> {
        Ok(Self::new(Database::open(path)?))
    }

    /// In-memory database (for testing).
    pub fn open_in_memory() -> BackendResult<Self> {
        Ok(Self::new(Database::open_in_memory()?))
    }

    fn db(&self) -> MutexGuard<'_, Database> {
        self.db.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Map row-level failures onto the backend's conflict/not-found variants.
fn backend_error(e: DbError) -> BackendError {
    match e {
        DbError::NotFound(what) => BackendError::NotFound(what),
        DbError::Constraint(what) => BackendError::Conflict(what),
        other => BackendError::Database(other),
    }
}

#[async_trait]
impl AnswerBackend for SqliteBackend {
    async fn load_answers(&self, review_id: &ReviewId) -> BackendResult<Vec<Answer>> {
        Ok(self.db().list_answers(review_id.as_str())?)
    }

    async fn create_answer(&self, review_id: &ReviewId, answer: NewAnswer) -> BackendResult<Answer> {
        self.db()
            .insert_answer(review_id.as_str(), &answer)
            .map_err(backend_error)
    }

    async fn update_answer(
        &self,
        review_id: &ReviewId,
        question_id: &str,
        patch: AnswerPatch,
    ) -> BackendResult<Answer> {
        self.db()
            .update_answer(review_id.as_str(), question_id, &patch)
            .map_err(backend_error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_answer(id: &str, value: &str) -> NewAnswer {
        NewAnswer {
            question_id: id.into(),
            value: value.into(),
            shared_with_patient: true,
            shared_with_doctor: false,
        }
    }

    #[tokio::test]
    async fn test_create_then_update() {
        let backend = SqliteBackend::open_in_memory().unwrap();
        let review = ReviewId::new("r1");

        backend.create_answer(&review, new_answer("q1", "a")).await.unwrap();
        let updated = backend
            .update_answer(
                &review,
                "q1",
                AnswerPatch {
                    value: Some("b".into()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        assert_eq!(updated.value, "b");
        assert!(updated.shared_with_patient);
        assert_eq!(backend.load_answers(&review).await.unwrap(), vec![updated]);
    }

    #[tokio::test]
    async fn test_errors_map_to_backend_variants() {
        let backend = SqliteBackend::open_in_memory().unwrap();
        let review = ReviewId::new("r1");

        let missing = backend
            .update_answer(&review, "q1", AnswerPatch::default())
            .await;
        assert!(matches!(missing, Err(BackendError::NotFound(_))));

        backend.create_answer(&review, new_answer("q1", "a")).await.unwrap();
        let duplicate = backend.create_answer(&review, new_answer("q1", "a")).await;
        assert!(matches!(duplicate, Err(BackendError::Conflict(_))));
    }
}
