//! MedReview Core Library
//!
//! Questionnaire engine for pharmacist-led medication reviews.
//!
//! # Architecture
//!
//! ```text
//!   medications, notes ──► QuestionTree (Part 1 static, Parts 2/3 derived)
//!                                 │
//!   user edit ──► ReviewSession ──┼──► VisibilityResolver (cascade, clears)
//!                                 │              │
//!                                 ▼              ▼
//!                         ┌──────────────────────────────┐
//!                         │  SaveQueue (per-question     │
//!                         │  debounce, create/update/    │
//!                         │  skip, one call in flight)   │
//!                         └──────────────┬───────────────┘
//!                                        │
//!                                  AnswerBackend
//!                                        │ confirmed
//!                                        ▼
//!                                   AnswerStore ──► Progress
//! ```
//!
//! # Core Principle
//!
//! **The answer store only holds confirmed answers.** Local edits live on
//! the question until the backend confirms them; progress reads the store.
//!
//! # Modules
//!
//! - [`models`]: Domain types (Question, Answer, Medication, ClinicianNote)
//! - [`tree`]: Question tree and cascade table
//! - [`visibility`]: Cascade resolver
//! - [`store`]: Confirmed answer store
//! - [`sync`]: Backend contract and reconciling save queue
//! - [`progress`]: Completion and sharing counters
//! - [`session`]: Edit pipeline for one review
//! - [`db`]: Local SQLite persistence

pub mod config;
pub mod db;
pub mod models;
pub mod progress;
pub mod session;
pub mod store;
pub mod sync;
pub mod tree;
pub mod visibility;

// Re-export commonly used types
pub use config::ReviewConfig;
pub use db::Database;
pub use models::{
    Answer, AnswerPatch, ClinicianNote, Medication, NewAnswer, NoteCategory, Question,
    QuestionKind, QuestionValue, ReviewContext, ReviewId,
};
pub use progress::Progress;
pub use session::{ReviewSession, SessionError};
pub use store::AnswerStore;
pub use sync::{AnswerBackend, BackendError, MemoryBackend, SaveNotice, SaveQueue, SqliteBackend};
pub use tree::{QuestionBox, QuestionTree, Stage};

// UniFFI setup - using proc macros
uniffi::setup_scaffolding!();

use std::sync::{Arc, Mutex};

// =========================================================================
// FFI Error Type
// =========================================================================

#[derive(Debug, thiserror::Error, uniffi::Error)]
pub enum MedReviewError {
    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Runtime error: {0}")]
    RuntimeError(String),
}

impl From<BackendError> for MedReviewError {
    fn from(e: BackendError) -> Self {
        MedReviewError::DatabaseError(e.to_string())
    }
}

impl From<SessionError> for MedReviewError {
    fn from(e: SessionError) -> Self {
        MedReviewError::InvalidInput(e.to_string())
    }
}

impl From<std::io::Error> for MedReviewError {
    fn from(e: std::io::Error) -> Self {
        MedReviewError::RuntimeError(e.to_string())
    }
}

impl<T> From<std::sync::PoisonError<T>> for MedReviewError {
    fn from(e: std::sync::PoisonError<T>) -> Self {
        MedReviewError::RuntimeError(format!("Lock poisoned: {}", e))
    }
}

// =========================================================================
// Factory Functions (exported to FFI)
// =========================================================================

/// Open (or create) the database at `path` and start a session for a review.
#[uniffi::export]
pub fn open_review(path: String, review_id: String) -> Result<Arc<MedReviewCore>, MedReviewError> {
    let backend = SqliteBackend::open(&path)?;
    MedReviewCore::start(backend, review_id)
}

/// Start a session over an in-memory database (for testing).
#[uniffi::export]
pub fn open_review_in_memory(review_id: String) -> Result<Arc<MedReviewCore>, MedReviewError> {
    let backend = SqliteBackend::open_in_memory()?;
    MedReviewCore::start(backend, review_id)
}

// =========================================================================
// Main API Object
// =========================================================================

/// Review session with its own runtime, for hosts without one.
///
/// Dropping the object (or calling [`shutdown`](Self::shutdown)) sends every
/// pending edit before the runtime stops.
#[derive(uniffi::Object)]
pub struct MedReviewCore {
    /// `None` once shut down
    session: Mutex<Option<ReviewSession>>,
    runtime: tokio::runtime::Runtime,
}

impl MedReviewCore {
    fn start(backend: SqliteBackend, review_id: String) -> Result<Arc<Self>, MedReviewError> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(2)
            .enable_all()
            .build()?;
        let context = ReviewContext::new(ReviewId::new(review_id));
        let session = runtime.block_on(ReviewSession::start(
            context,
            Arc::new(backend),
            &ReviewConfig::default(),
        ))?;
        Ok(Arc::new(Self {
            session: Mutex::new(Some(session)),
            runtime,
        }))
    }

    fn with_session<T>(
        &self,
        f: impl FnOnce(&mut ReviewSession) -> Result<T, MedReviewError>,
    ) -> Result<T, MedReviewError> {
        let mut guard = self.session.lock()?;
        let session = guard
            .as_mut()
            .ok_or_else(|| MedReviewError::RuntimeError("Review session is closed".into()))?;
        f(session)
    }
}

impl Drop for MedReviewCore {
    fn drop(&mut self) {
        let session = match self.session.get_mut() {
            Ok(session) => session.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        };
        if let Some(session) = session {
            self.runtime.block_on(session.shutdown());
        }
    }
}

#[uniffi::export]
impl MedReviewCore {
    // =========================================================================
    // Inputs
    // =========================================================================

    /// Replace the medication list.
    pub fn set_medications(&self, medications: Vec<FfiMedication>) -> Result<(), MedReviewError> {
        self.with_session(|session| {
            session.set_medications(medications.into_iter().map(Into::into).collect());
            Ok(())
        })
    }

    /// Replace the clinician note list.
    pub fn set_notes(&self, notes: Vec<FfiNote>) -> Result<(), MedReviewError> {
        self.with_session(|session| {
            session.set_notes(notes.into_iter().map(Into::into).collect());
            Ok(())
        })
    }

    // =========================================================================
    // Edits
    // =========================================================================

    /// Answer a question with its encoded value (`""` clears it).
    pub fn answer_question(&self, question_id: String, value: String) -> Result<bool, MedReviewError> {
        self.with_session(|session| {
            let kind = session
                .question(&question_id)
                .map(|q| q.kind)
                .ok_or_else(|| MedReviewError::NotFound(question_id.clone()))?;

            let decoded = QuestionValue::decode(kind, &value);
            if decoded.is_none() && !value.is_empty() {
                return Err(MedReviewError::InvalidInput(format!(
                    "{} is not a valid {:?} value",
                    value, kind
                )));
            }
            Ok(session.answer(&question_id, decoded)?)
        })
    }

    /// Set the sharing flags of a question.
    pub fn set_sharing(
        &self,
        question_id: String,
        with_patient: bool,
        with_doctor: bool,
    ) -> Result<bool, MedReviewError> {
        self.with_session(|session| Ok(session.set_sharing(&question_id, with_patient, with_doctor)))
    }

    /// Comment on a note inside a box.
    pub fn comment_on_note(
        &self,
        box_id: String,
        note_id: String,
        comment: String,
    ) -> Result<bool, MedReviewError> {
        self.with_session(|session| Ok(session.comment_on_note(&box_id, &note_id, &comment)?))
    }

    /// Send pending edits now and wait for the backend.
    pub fn flush(&self) -> Result<(), MedReviewError> {
        self.with_session(|session| {
            self.runtime.block_on(session.flush());
            Ok(())
        })
    }

    /// Send pending edits and close the session. Later calls fail with
    /// `RuntimeError`; shutting down twice is a no-op.
    pub fn shutdown(&self) -> Result<(), MedReviewError> {
        let session = self.session.lock()?.take();
        if let Some(session) = session {
            self.runtime.block_on(session.shutdown());
        }
        Ok(())
    }

    // =========================================================================
    // Queries
    // =========================================================================

    /// Boxes of one part with their current questions.
    pub fn get_part(&self, stage: FfiStage) -> Result<Vec<FfiBox>, MedReviewError> {
        self.with_session(|session| {
            Ok(session
                .tree()
                .part(stage.into())
                .boxes
                .iter()
                .map(FfiBox::from)
                .collect())
        })
    }

    pub fn get_box_progress(&self, box_id: String) -> Result<FfiProgress, MedReviewError> {
        self.with_session(|session| {
            session
                .progress_box(&box_id)
                .map(Into::into)
                .ok_or_else(|| MedReviewError::NotFound(box_id.clone()))
        })
    }

    pub fn get_part_progress(&self, stage: FfiStage) -> Result<FfiProgress, MedReviewError> {
        self.with_session(|session| Ok(session.progress_part(stage.into()).into()))
    }
}

// =========================================================================
// FFI Types
// =========================================================================

/// FFI-safe interview stage.
#[derive(Debug, Clone, Copy, uniffi::Enum)]
pub enum FfiStage {
    One,
    Two,
    Three,
}

impl From<FfiStage> for Stage {
    fn from(stage: FfiStage) -> Self {
        match stage {
            FfiStage::One => Stage::One,
            FfiStage::Two => Stage::Two,
            FfiStage::Three => Stage::Three,
        }
    }
}

/// FFI-safe medication.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiMedication {
    pub product_code: Option<String>,
    pub name: String,
}

impl From<FfiMedication> for Medication {
    fn from(med: FfiMedication) -> Self {
        Medication {
            product_code: med.product_code,
            name: med.name,
        }
    }
}

/// FFI-safe clinician note. Category is `adherence`, `effectiveness` or
/// anything else for notes outside the interview.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiNote {
    pub note_id: String,
    pub category: String,
    pub product_code: Option<String>,
    pub text: String,
}

impl From<FfiNote> for ClinicianNote {
    fn from(note: FfiNote) -> Self {
        let category = match note.category.to_lowercase().as_str() {
            "adherence" => NoteCategory::Adherence,
            "effectiveness" => NoteCategory::Effectiveness,
            _ => NoteCategory::Other,
        };
        ClinicianNote {
            note_id: note.note_id,
            category,
            product_code: note.product_code,
            text: note.text,
        }
    }
}

/// FFI-safe question.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiQuestion {
    pub id: String,
    pub kind: String,
    pub value: String,
    pub options: Vec<String>,
    pub hidden: bool,
    pub originally_hidden: bool,
    pub shared_with_patient: bool,
    pub shared_with_doctor: bool,
}

impl From<&Question> for FfiQuestion {
    fn from(q: &Question) -> Self {
        Self {
            id: q.id.clone(),
            kind: format!("{:?}", q.kind),
            value: q.encoded_value(),
            options: q.options.clone(),
            hidden: q.hidden,
            originally_hidden: q.originally_hidden(),
            shared_with_patient: q.shared_with_patient,
            shared_with_doctor: q.shared_with_doctor,
        }
    }
}

/// FFI-safe box note with its comment question.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiBoxNote {
    pub note_id: String,
    pub text: String,
    pub comment: FfiQuestion,
}

/// FFI-safe box.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiBox {
    pub id: String,
    pub title: String,
    pub questions: Vec<FfiQuestion>,
    pub notes: Vec<FfiBoxNote>,
}

impl From<&QuestionBox> for FfiBox {
    fn from(b: &QuestionBox) -> Self {
        Self {
            id: b.id.clone(),
            title: b.title.clone(),
            questions: b.questions.iter().map(FfiQuestion::from).collect(),
            notes: b
                .notes
                .iter()
                .map(|note| FfiBoxNote {
                    note_id: note.note_id.clone(),
                    text: note.text.clone(),
                    comment: FfiQuestion::from(&note.comment),
                })
                .collect(),
        }
    }
}

/// FFI-safe progress counters.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiProgress {
    pub visible: u32,
    pub answered: u32,
    pub percent: u8,
    pub shared_with_patient: u32,
    pub shared_with_doctor: u32,
}

impl From<Progress> for FfiProgress {
    fn from(p: Progress) -> Self {
        Self {
            visible: p.visible,
            answered: p.answered,
            percent: p.percent(),
            shared_with_patient: p.shared_with_patient,
            shared_with_doctor: p.shared_with_doctor,
        }
    }
}
