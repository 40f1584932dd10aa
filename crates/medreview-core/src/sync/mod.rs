//! Answer persistence: backend contract and the reconciling save queue.
//!
//! Pipeline: edit event → per-question debounce → create/update/skip decision
//! → backend call → confirmed answer recorded in the store → notification.

mod memory;
mod queue;
mod sqlite;

pub use memory::*;
pub use queue::*;
pub use sqlite::*;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::{Answer, AnswerPatch, NewAnswer, Question, ReviewId};

/// Persistence backend errors.
#[derive(Error, Debug)]
pub enum BackendError {
    #[error("Database error: {0}")]
    Database(#[from] crate::db::DbError),

    #[error("Answer not found: {0}")]
    NotFound(String),

    #[error("Answer already exists: {0}")]
    Conflict(String),

    #[error("Backend unavailable: {0}")]
    Unavailable(String),
}

pub type BackendResult<T> = Result<T, BackendError>;

/// Persistence collaborator. Calls are keyed by (review, question id).
#[async_trait]
pub trait AnswerBackend: Send + Sync + 'static {
    /// Load every answer of a review.
    async fn load_answers(&self, review_id: &ReviewId) -> BackendResult<Vec<Answer>>;

    /// Create the first answer for a question.
    async fn create_answer(&self, review_id: &ReviewId, answer: NewAnswer) -> BackendResult<Answer>;

    /// Patch an existing answer.
    async fn update_answer(
        &self,
        review_id: &ReviewId,
        question_id: &str,
        patch: AnswerPatch,
    ) -> BackendResult<Answer>;
}

/// One user edit, snapshotting the question's value and flags.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EditEvent {
    pub question_id: String,
    /// Encoded value (`""` when unset)
    pub value: String,
    pub shared_with_patient: bool,
    pub shared_with_doctor: bool,
    /// Save even when value and flags match the stored answer
    pub force_metadata_sync: bool,
}

impl EditEvent {
    pub fn from_question(question: &Question, force_metadata_sync: bool) -> Self {
        Self {
            question_id: question.id.clone(),
            value: question.encoded_value(),
            shared_with_patient: question.shared_with_patient,
            shared_with_doctor: question.shared_with_doctor,
            force_metadata_sync,
        }
    }

    /// Fold a newer event for the same question into this one.
    pub fn merge(&mut self, newer: EditEvent) {
        let force = self.force_metadata_sync || newer.force_metadata_sync;
        *self = newer;
        self.force_metadata_sync = force;
    }

    fn is_blank(&self) -> bool {
        self.value.is_empty() && !self.shared_with_patient && !self.shared_with_doctor
    }
}

/// Outcome of a save, published to subscribers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SaveNotice {
    Created(Answer),
    Updated(Answer),
    /// Nothing changed; no call was made
    Skipped { question_id: String },
    /// The edit stays un-persisted until the question is edited again
    Failed { question_id: String, error: String },
}

impl SaveNotice {
    pub fn question_id(&self) -> &str {
        match self {
            SaveNotice::Created(answer) | SaveNotice::Updated(answer) => &answer.question_id,
            SaveNotice::Skipped { question_id } | SaveNotice::Failed { question_id, .. } => {
                question_id
            }
        }
    }
}

/// Reconciling decision for one debounced event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SavePlan {
    Skip,
    Create(NewAnswer),
    Update(AnswerPatch),
}

/// Decide create, update or skip against the last confirmed answer.
///
/// A question with a known answer is never created again. A blank event for
/// a question without an answer is a no-op unless forced.
pub fn plan_save(existing: Option<&Answer>, event: &EditEvent) -> SavePlan {
    let Some(existing) = existing else {
        if event.is_blank() && !event.force_metadata_sync {
            return SavePlan::Skip;
        }
        return SavePlan::Create(NewAnswer {
            question_id: event.question_id.clone(),
            value: event.value.clone(),
            shared_with_patient: event.shared_with_patient,
            shared_with_doctor: event.shared_with_doctor,
        });
    };

    let unchanged = existing.matches(
        &event.value,
        event.shared_with_patient,
        event.shared_with_doctor,
    );
    if unchanged && !event.force_metadata_sync {
        return SavePlan::Skip;
    }

    let mut patch = AnswerPatch::default();
    if existing.value != event.value {
        patch.value = Some(event.value.clone());
    }
    if existing.shared_with_patient != event.shared_with_patient || event.force_metadata_sync {
        patch.shared_with_patient = Some(event.shared_with_patient);
    }
    if existing.shared_with_doctor != event.shared_with_doctor || event.force_metadata_sync {
        patch.shared_with_doctor = Some(event.shared_with_doctor);
    }
    SavePlan::Update(patch)
}
