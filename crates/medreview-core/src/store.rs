//! In-memory answer store.
//!
//! Holds the latest server-confirmed answer per question. Mutated only by the
//! bulk load and by confirmed saves, so readers never see optimistic state.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::models::{Answer, QuestionValue, ReviewId};
use crate::tree::{QuestionTree, Stage};

/// Store shared between the session and the save queue.
pub type SharedAnswerStore = Arc<RwLock<AnswerStore>>;

/// Map from question id to its latest confirmed answer.
#[derive(Debug, Clone)]
pub struct AnswerStore {
    review_id: ReviewId,
    answers: HashMap<String, Answer>,
}

impl AnswerStore {
    pub fn new(review_id: ReviewId) -> Self {
        Self {
            review_id,
            answers: HashMap::new(),
        }
    }

    pub fn review_id(&self) -> &ReviewId {
        &self.review_id
    }

    /// Replace the contents with a bulk-loaded answer set.
    pub fn load(&mut self, answers: Vec<Answer>) {
        self.answers = answers
            .into_iter()
            .map(|answer| (answer.question_id.clone(), answer))
            .collect();
    }

    /// Record an answer confirmed by the backend.
    pub fn record_confirmed(&mut self, answer: Answer) {
        self.answers.insert(answer.question_id.clone(), answer);
    }

    pub fn get(&self, question_id: &str) -> Option<&Answer> {
        self.answers.get(question_id)
    }

    pub fn contains(&self, question_id: &str) -> bool {
        self.answers.contains_key(question_id)
    }

    pub fn len(&self) -> usize {
        self.answers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.answers.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Answer> {
        self.answers.values()
    }

    /// Copy known answers onto every question of the tree.
    pub fn apply_to(&self, tree: &mut QuestionTree) {
        for stage in Stage::ALL {
            self.apply_to_stage(tree, stage);
        }
    }

    /// Copy known answers onto the questions of one stage.
    ///
    /// Questions without an answer keep their constructed state. Values that
    /// do not decode for the question's kind are dropped with a warning.
    pub fn apply_to_stage(&self, tree: &mut QuestionTree, stage: Stage) {
        for question in tree.stage_questions_mut(stage) {
            let Some(answer) = self.answers.get(&question.id) else {
                continue;
            };
            question.value = QuestionValue::decode(question.kind, &answer.value);
            if question.value.is_none() && !answer.value.is_empty() {
                tracing::warn!(
                    question_id = %question.id,
                    value = %answer.value,
                    "Stored answer does not match question kind"
                );
            }
            question.shared_with_patient = answer.shared_with_patient;
            question.shared_with_doctor = answer.shared_with_doctor;
        }
    }
}

/// Read the shared store, recovering from a poisoned lock.
pub fn read_store(store: &SharedAnswerStore) -> RwLockReadGuard<'_, AnswerStore> {
    store.read().unwrap_or_else(PoisonError::into_inner)
}

/// Write the shared store, recovering from a poisoned lock.
pub fn write_store(store: &SharedAnswerStore) -> RwLockWriteGuard<'_, AnswerStore> {
    store.write().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Medication;

    fn answer(id: &str, value: &str) -> Answer {
        Answer {
            question_id: id.into(),
            value: value.into(),
            shared_with_patient: false,
            shared_with_doctor: true,
        }
    }

    #[test]
    fn test_load_replaces_contents() {
        let mut store = AnswerStore::new(ReviewId::new("r1"));
        store.record_confirmed(answer("old", "x"));

        store.load(vec![answer("a", "1"), answer("b", "2")]);

        assert_eq!(store.len(), 2);
        assert!(!store.contains("old"));
        assert_eq!(store.get("b").unwrap().value, "2");
    }

    #[test]
    fn test_apply_decodes_by_kind() {
        let mut tree = QuestionTree::build().unwrap();
        tree.rebuild_dynamic_parts(&[Medication::new(Some("7"), "Aspirin")], &[]);

        let mut store = AnswerStore::new(ReviewId::new("r1"));
        store.load(vec![
            answer("p1_general_medication_count", "4"),
            answer("p2_med_7_adherence", "false"),
            answer("p1_general_lives_alone", "not-a-bool"),
        ]);
        store.apply_to(&mut tree);

        assert_eq!(
            tree.question("p1_general_medication_count").unwrap().value,
            Some(QuestionValue::Number(4.0))
        );
        let gate = tree.question("p2_med_7_adherence").unwrap();
        assert_eq!(gate.value, Some(QuestionValue::Boolean(false)));
        assert!(gate.shared_with_doctor);
        assert_eq!(tree.question("p1_general_lives_alone").unwrap().value, None);
    }
}
