//! Review session: the edit pipeline around one review.
//!
//! An edit updates the question in place, is queued for saving, and then
//! runs the visibility cascade; every question the cascade hides is queued
//! as a forced clear through the same per-question pipeline, even when it was
//! never answered.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use thiserror::Error;
use tokio::sync::broadcast;

use crate::config::ReviewConfig;
use crate::models::{
    Answer, ClinicianNote, Medication, Question, QuestionKind, QuestionValue, ReviewContext,
};
use crate::progress::{self, Progress};
use crate::store::{read_store, AnswerStore, SharedAnswerStore};
use crate::sync::{AnswerBackend, EditEvent, SaveNotice, SaveQueue};
use crate::tree::{note_comment_id, QuestionTree, Stage, TreeError};
use crate::visibility;

/// Session errors.
#[derive(Error, Debug)]
pub enum SessionError {
    #[error("Tree error: {0}")]
    Tree(#[from] TreeError),

    #[error("Invalid value for {question_id} ({kind:?})")]
    InvalidValue {
        question_id: String,
        kind: QuestionKind,
    },
}

pub type SessionResult<T> = Result<T, SessionError>;

/// Live state carried across a rebuild: value and sharing flags.
type LiveState = (Option<QuestionValue>, bool, bool);

/// One medication-review interview in progress.
pub struct ReviewSession {
    context: ReviewContext,
    tree: QuestionTree,
    store: SharedAnswerStore,
    queue: SaveQueue,
    medications: Vec<Medication>,
    notes: Vec<ClinicianNote>,
}

impl ReviewSession {
    /// Load the review's answers, build the tree and start the save queue.
    ///
    /// A failed load is not fatal: the session starts with no answers. The
    /// load completes before the queue exists, so no edit can race it.
    pub async fn start<B: AnswerBackend>(
        context: ReviewContext,
        backend: Arc<B>,
        config: &ReviewConfig,
    ) -> SessionResult<Self> {
        let mut store = AnswerStore::new(context.review_id.clone());
        match backend.load_answers(&context.review_id).await {
            Ok(answers) => {
                tracing::info!(review_id = %context.review_id, count = answers.len(), "Loaded answers");
                store.load(answers);
            }
            Err(e) => {
                tracing::warn!(
                    review_id = %context.review_id,
                    error = %e,
                    "Answer load failed, starting without saved answers"
                );
            }
        }

        let mut tree = QuestionTree::build()?;
        store.apply_to(&mut tree);

        let store = Arc::new(RwLock::new(store));
        let queue = SaveQueue::start(context.clone(), backend, Arc::clone(&store), config);

        let mut session = Self {
            context,
            tree,
            store,
            queue,
            medications: Vec::new(),
            notes: Vec::new(),
        };
        session.refresh_visibility();
        Ok(session)
    }

    pub fn context(&self) -> &ReviewContext {
        &self.context
    }

    pub fn tree(&self) -> &QuestionTree {
        &self.tree
    }

    pub fn question(&self, question_id: &str) -> Option<&Question> {
        self.tree.question(question_id)
    }

    /// Last confirmed answer for a question.
    pub fn answer_for(&self, question_id: &str) -> Option<Answer> {
        read_store(&self.store).get(question_id).cloned()
    }

    /// Replace the medication list and rebuild Parts 2 and 3.
    pub fn set_medications(&mut self, medications: Vec<Medication>) {
        self.medications = medications;
        self.rebuild();
    }

    /// Replace the note list and rebuild Parts 2 and 3.
    pub fn set_notes(&mut self, notes: Vec<ClinicianNote>) {
        self.notes = notes;
        self.rebuild();
    }

    /// Set a question's value (`None` clears it).
    ///
    /// Returns `Ok(false)` when the question is unknown or hidden; edits to
    /// those are ignored.
    pub fn answer(&mut self, question_id: &str, value: Option<QuestionValue>) -> SessionResult<bool> {
        let Some(question) = self.editable_question(question_id) else {
            return Ok(false);
        };
        if let Some(value) = &value {
            if !question.accepts(value) {
                return Err(SessionError::InvalidValue {
                    question_id: question_id.to_string(),
                    kind: question.kind,
                });
            }
        }

        question.value = value;
        let event = EditEvent::from_question(question, false);
        self.queue.enqueue(event);
        self.cascade_from(question_id);
        Ok(true)
    }

    /// Set both sharing flags of a question. Always saved, even when the
    /// value is unchanged.
    pub fn set_sharing(&mut self, question_id: &str, with_patient: bool, with_doctor: bool) -> bool {
        let Some(question) = self.editable_question(question_id) else {
            return false;
        };
        question.shared_with_patient = with_patient;
        question.shared_with_doctor = with_doctor;
        let event = EditEvent::from_question(question, true);
        self.queue.enqueue(event);
        true
    }

    /// Comment on a note shown in a box.
    pub fn comment_on_note(&mut self, box_id: &str, note_id: &str, comment: &str) -> SessionResult<bool> {
        let value = if comment.is_empty() {
            None
        } else {
            Some(QuestionValue::Text(comment.to_string()))
        };
        self.answer(&note_comment_id(box_id, note_id), value)
    }

    pub fn progress_box(&self, box_id: &str) -> Option<Progress> {
        let question_box = self.tree.find_box(box_id)?;
        Some(progress::box_progress(question_box, &read_store(&self.store)))
    }

    pub fn progress_part(&self, stage: Stage) -> Progress {
        progress::part_progress(self.tree.part(stage), &read_store(&self.store))
    }

    /// Counters over the whole interview, sharing totals included.
    pub fn sharing_counts(&self) -> Progress {
        progress::tree_progress(&self.tree, &read_store(&self.store))
    }

    /// Questions that may appear in a report: those not hidden at
    /// construction, whatever their current visibility.
    pub fn report_candidates(&self) -> Vec<&Question> {
        self.tree
            .questions()
            .filter(|question| !question.originally_hidden())
            .collect()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SaveNotice> {
        self.queue.subscribe()
    }

    /// Send all pending edits now and wait for their outcome.
    pub async fn flush(&self) {
        self.queue.flush().await;
    }

    /// Stop the session after sending pending edits.
    pub async fn shutdown(self) {
        self.queue.shutdown().await;
    }

    fn editable_question(&mut self, question_id: &str) -> Option<&mut Question> {
        match self.tree.question_mut(question_id) {
            Some(question) if question.hidden => {
                tracing::debug!(%question_id, "Edit to hidden question ignored");
                None
            }
            Some(question) => Some(question),
            None => {
                tracing::warn!(%question_id, "Edit to unknown question ignored");
                None
            }
        }
    }

    fn cascade_from(&mut self, question_id: &str) {
        let cleared = {
            let store = read_store(&self.store);
            visibility::resolve(&mut self.tree, question_id, |id| has_saved_content(&store, id))
        };
        self.enqueue_cleared(cleared);
    }

    fn refresh_visibility(&mut self) {
        let cleared = {
            let store = read_store(&self.store);
            visibility::resolve_all(&mut self.tree, |id| has_saved_content(&store, id))
        };
        self.enqueue_cleared(cleared);
    }

    fn enqueue_cleared(&self, cleared: Vec<String>) {
        for id in cleared {
            if let Some(question) = self.tree.question(&id) {
                self.queue.enqueue(EditEvent::from_question(question, true));
            }
        }
    }

    /// Rebuild Parts 2 and 3, re-apply confirmed answers, then restore the
    /// live state of questions that survived the rebuild, so edits whose save
    /// is still pending (or failed) are not lost from the tree.
    fn rebuild(&mut self) {
        let live: HashMap<String, LiveState> = [Stage::Two, Stage::Three]
            .into_iter()
            .flat_map(|stage| self.tree.part(stage).boxes.iter())
            .flat_map(|question_box| question_box.all_questions())
            .map(|q| {
                (
                    q.id.clone(),
                    (q.value.clone(), q.shared_with_patient, q.shared_with_doctor),
                )
            })
            .collect();

        self.tree
            .rebuild_dynamic_parts(&self.medications, &self.notes);

        {
            let store = read_store(&self.store);
            for stage in [Stage::Two, Stage::Three] {
                store.apply_to_stage(&mut self.tree, stage);
            }
        }
        for stage in [Stage::Two, Stage::Three] {
            for question in self.tree.stage_questions_mut(stage) {
                if let Some((value, with_patient, with_doctor)) = live.get(&question.id) {
                    question.value = value.clone();
                    question.shared_with_patient = *with_patient;
                    question.shared_with_doctor = *with_doctor;
                }
            }
        }

        tracing::info!(
            review_id = %self.context.review_id,
            adherence_boxes = self.tree.part(Stage::Two).boxes.len(),
            effectiveness_boxes = self.tree.part(Stage::Three).boxes.len(),
            "Rebuilt medication parts"
        );
        self.refresh_visibility();
    }
}

/// Whether the confirmed answer for a question is non-blank.
fn has_saved_content(store: &AnswerStore, question_id: &str) -> bool {
    store.get(question_id).is_some_and(Answer::has_content)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ReviewId;
    use crate::sync::MemoryBackend;

    async fn start() -> (ReviewSession, Arc<MemoryBackend>) {
        let backend = Arc::new(MemoryBackend::new());
        let session = ReviewSession::start(
            ReviewContext::new(ReviewId::new("r1")),
            Arc::clone(&backend),
            &ReviewConfig::default(),
        )
        .await
        .unwrap();
        (session, backend)
    }

    #[tokio::test(start_paused = true)]
    async fn test_invalid_value_rejected() {
        let (mut session, _) = start().await;

        let result = session.answer("p1_general_lives_alone", Some(QuestionValue::Number(1.0)));
        assert!(matches!(result, Err(SessionError::InvalidValue { .. })));

        let result = session.answer("p1_usage_dosing_aid", Some(QuestionValue::Choice("jar".into())));
        assert!(matches!(result, Err(SessionError::InvalidValue { .. })));
    }

    #[tokio::test(start_paused = true)]
    async fn test_unknown_and_hidden_edits_ignored() {
        let (mut session, backend) = start().await;

        assert!(!session.answer("p9_nothing", None).unwrap());
        assert!(!session
            .answer("p1_assistance_more_help", Some(QuestionValue::Boolean(true)))
            .unwrap());
        assert!(!session.set_sharing("p1_assistance_more_help_action", true, true));

        session.flush().await;
        assert_eq!(backend.calls().len(), 1); // the load
    }

    #[tokio::test(start_paused = true)]
    async fn test_report_candidates_use_original_visibility() {
        let (mut session, _) = start().await;
        session
            .answer("p1_assistance_needed", Some(QuestionValue::Boolean(true)))
            .unwrap();
        assert!(!session.question("p1_assistance_more_help").unwrap().hidden);

        let ids: Vec<_> = session.report_candidates().iter().map(|q| q.id.clone()).collect();
        assert!(ids.contains(&"p1_assistance_needed".to_string()));
        assert!(!ids.contains(&"p1_assistance_more_help".to_string()));
    }
}
