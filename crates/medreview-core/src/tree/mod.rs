//! Question tree: Parts → Boxes → Questions.
//!
//! Part 1 is a fixed interview; Parts 2 and 3 are derived from the current
//! medication and note lists and rebuilt whenever either changes.

mod cascade;
mod dynamic;
mod part_one;

pub use cascade::*;
pub use dynamic::*;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::{ClinicianNote, Medication, Question};

/// Tree construction errors.
#[derive(Error, Debug)]
pub enum TreeError {
    #[error("Single-choice question without options: {0}")]
    MissingOptions(String),

    #[error("Duplicate question id: {0}")]
    DuplicateQuestion(String),

    #[error("Duplicate box id: {0}")]
    DuplicateBox(String),
}

pub type TreeResult<T> = Result<T, TreeError>;

/// Interview stage.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// General interview
    One,
    /// Adherence, one box per medication
    Two,
    /// Effectiveness, one box per medication
    Three,
}

impl Stage {
    pub const ALL: [Stage; 3] = [Stage::One, Stage::Two, Stage::Three];

    /// Id prefix of boxes and questions in this stage.
    pub fn prefix(&self) -> &'static str {
        match self {
            Stage::One => "p1",
            Stage::Two => "p2",
            Stage::Three => "p3",
        }
    }

    fn index(&self) -> usize {
        match self {
            Stage::One => 0,
            Stage::Two => 1,
            Stage::Three => 2,
        }
    }
}

/// A clinician note shown inside a box, with the pharmacist's comment on it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BoxNote {
    pub note_id: String,
    pub text: String,
    /// Free-text comment; always visible
    pub comment: Question,
}

/// A titled group of questions.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct QuestionBox {
    pub id: String,
    pub title: String,
    pub questions: Vec<Question>,
    pub notes: Vec<BoxNote>,
}

impl QuestionBox {
    pub fn new(id: impl Into<String>, title: impl Into<String>, questions: Vec<Question>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            questions,
            notes: Vec::new(),
        }
    }

    /// Questions followed by note comments.
    pub fn all_questions(&self) -> impl Iterator<Item = &Question> {
        self.questions
            .iter()
            .chain(self.notes.iter().map(|note| &note.comment))
    }

    fn all_questions_mut(&mut self) -> impl Iterator<Item = &mut Question> {
        self.questions
            .iter_mut()
            .chain(self.notes.iter_mut().map(|note| &mut note.comment))
    }
}

/// One of the three interview stages.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Part {
    pub stage: Stage,
    pub boxes: Vec<QuestionBox>,
}

impl Part {
    pub fn empty(stage: Stage) -> Self {
        Self {
            stage,
            boxes: Vec::new(),
        }
    }

    pub fn box_ids(&self) -> Vec<&str> {
        self.boxes.iter().map(|b| b.id.as_str()).collect()
    }
}

/// The full interview tree with its cascade rules.
#[derive(Debug, Clone, PartialEq)]
pub struct QuestionTree {
    parts: [Part; 3],
    static_cascades: CascadeTable,
    dynamic_cascades: CascadeTable,
}

impl QuestionTree {
    /// Build the tree with the static Part 1 and empty dynamic parts.
    pub fn build() -> TreeResult<Self> {
        let (part_one, static_cascades) = part_one::build_part_one()?;
        let tree = Self {
            parts: [part_one, Part::empty(Stage::Two), Part::empty(Stage::Three)],
            static_cascades,
            dynamic_cascades: CascadeTable::new(),
        };
        tree.validate()?;
        Ok(tree)
    }

    /// Regenerate Parts 2 and 3 from the given inputs.
    ///
    /// Produces fresh questions with no values; callers re-apply known answers
    /// afterwards. Identical inputs always yield identical box and question ids.
    pub fn rebuild_dynamic_parts(&mut self, medications: &[Medication], notes: &[ClinicianNote]) {
        let derived = derive_dynamic_parts(medications, notes);
        self.parts[Stage::Two.index()] = derived.adherence;
        self.parts[Stage::Three.index()] = derived.effectiveness;
        self.dynamic_cascades = derived.cascades;

        if let Err(e) = self.validate() {
            tracing::error!(error = %e, "Rebuilt tree is inconsistent");
        }
    }

    pub fn part(&self, stage: Stage) -> &Part {
        &self.parts[stage.index()]
    }

    pub fn parts(&self) -> &[Part] {
        &self.parts
    }

    pub fn boxes(&self) -> impl Iterator<Item = &QuestionBox> {
        self.parts.iter().flat_map(|part| part.boxes.iter())
    }

    pub fn find_box(&self, box_id: &str) -> Option<&QuestionBox> {
        self.boxes().find(|b| b.id == box_id)
    }

    /// Every question in the tree, note comments included.
    pub fn questions(&self) -> impl Iterator<Item = &Question> {
        self.boxes().flat_map(QuestionBox::all_questions)
    }

    /// Questions of one stage, note comments included.
    pub fn stage_questions_mut(&mut self, stage: Stage) -> impl Iterator<Item = &mut Question> {
        self.parts[stage.index()]
            .boxes
            .iter_mut()
            .flat_map(QuestionBox::all_questions_mut)
    }

    pub fn question(&self, id: &str) -> Option<&Question> {
        self.questions().find(|q| q.id == id)
    }

    pub fn question_mut(&mut self, id: &str) -> Option<&mut Question> {
        self.parts
            .iter_mut()
            .flat_map(|part| part.boxes.iter_mut())
            .flat_map(QuestionBox::all_questions_mut)
            .find(|q| q.id == id)
    }

    /// Static rules followed by the rules of the dynamic parts.
    pub fn cascade_rules(&self) -> impl Iterator<Item = &CascadeRule> {
        self.static_cascades
            .rules()
            .iter()
            .chain(self.dynamic_cascades.rules().iter())
    }

    /// Rules triggered by `trigger`, cloned so callers can mutate the tree.
    pub fn dependents_of(&self, trigger: &str) -> Vec<CascadeRule> {
        self.static_cascades
            .dependents_of(trigger)
            .chain(self.dynamic_cascades.dependents_of(trigger))
            .cloned()
            .collect()
    }

    /// Check that box ids and question ids are unique across the tree.
    pub fn validate(&self) -> TreeResult<()> {
        let mut boxes = std::collections::HashSet::new();
        for question_box in self.boxes() {
            if !boxes.insert(question_box.id.as_str()) {
                return Err(TreeError::DuplicateBox(question_box.id.clone()));
            }
        }
        let mut questions = std::collections::HashSet::new();
        for question in self.questions() {
            if !questions.insert(question.id.as_str()) {
                return Err(TreeError::DuplicateQuestion(question.id.clone()));
            }
        }
        Ok(())
    }
}
