//! Progress and sharing counters, derived from the tree and the answer store.

use serde::{Deserialize, Serialize};

use crate::models::Question;
use crate::store::AnswerStore;
use crate::tree::{Part, QuestionBox, QuestionTree, Stage};

/// Completion counters for a box or a part.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Progress {
    /// Visible questions plus notes
    pub visible: u32,
    /// Answered visible questions plus commented notes
    pub answered: u32,
    /// Visible questions with a confirmed patient-sharing flag
    pub shared_with_patient: u32,
    /// Visible questions with a confirmed doctor-sharing flag
    pub shared_with_doctor: u32,
}

impl Progress {
    /// `round(100 * answered / visible)`, 0 for an empty box.
    pub fn percent(&self) -> u8 {
        if self.visible == 0 {
            return 0;
        }
        let visible = u64::from(self.visible);
        let answered = u64::from(self.answered.min(self.visible));
        ((200 * answered + visible) / (2 * visible)) as u8
    }

    fn add(&mut self, other: Progress) {
        self.visible += other.visible;
        self.answered += other.answered;
        self.shared_with_patient += other.shared_with_patient;
        self.shared_with_doctor += other.shared_with_doctor;
    }
}

fn count_question(progress: &mut Progress, question: &Question, store: &AnswerStore) {
    let Some(answer) = store.get(&question.id) else {
        return;
    };
    if question.kind.is_answered(&answer.value) {
        progress.answered += 1;
    }
    if answer.shared_with_patient {
        progress.shared_with_patient += 1;
    }
    if answer.shared_with_doctor {
        progress.shared_with_doctor += 1;
    }
}

/// Counters for one box. Notes count as visible; a note is answered when its
/// comment holds a non-empty confirmed answer.
pub fn box_progress(question_box: &QuestionBox, store: &AnswerStore) -> Progress {
    let mut progress = Progress::default();

    for question in question_box.questions.iter().filter(|q| !q.hidden) {
        progress.visible += 1;
        count_question(&mut progress, question, store);
    }
    for note in &question_box.notes {
        progress.visible += 1;
        count_question(&mut progress, &note.comment, store);
    }

    progress
}

/// Counters for a part: sums of the per-box counters, so small boxes weigh
/// no more than their question count.
pub fn part_progress(part: &Part, store: &AnswerStore) -> Progress {
    let mut total = Progress::default();
    for question_box in &part.boxes {
        total.add(box_progress(question_box, store));
    }
    total
}

/// Counters for the whole tree.
pub fn tree_progress(tree: &QuestionTree, store: &AnswerStore) -> Progress {
    let mut total = Progress::default();
    for stage in Stage::ALL {
        total.add(part_progress(tree.part(stage), store));
    }
    total
}
