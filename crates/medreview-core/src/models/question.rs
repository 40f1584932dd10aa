//! Question models for the interview tree.

use serde::{Deserialize, Serialize};

/// Question type discriminant.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum QuestionKind {
    /// Single-line free text
    Text,
    /// Multi-line free text
    LongText,
    /// Numeric input
    Number,
    /// Yes/no
    Boolean,
    /// One value out of a fixed option list
    SingleChoice,
}

impl QuestionKind {
    /// Whether a persisted answer string counts as answered for this kind.
    pub fn is_answered(&self, raw: &str) -> bool {
        let trimmed = raw.trim();
        match self {
            QuestionKind::Boolean => trimmed == "true" || trimmed == "false",
            QuestionKind::Number => trimmed.parse::<f64>().is_ok(),
            QuestionKind::Text | QuestionKind::LongText | QuestionKind::SingleChoice => {
                !trimmed.is_empty()
            }
        }
    }
}

/// Live value held by a question.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum QuestionValue {
    Text(String),
    Number(f64),
    Boolean(bool),
    Choice(String),
}

impl QuestionValue {
    /// Encode to the string form carried by an [`Answer`](super::Answer).
    pub fn encode(&self) -> String {
        match self {
            QuestionValue::Text(s) | QuestionValue::Choice(s) => s.clone(),
            QuestionValue::Number(n) => n.to_string(),
            QuestionValue::Boolean(b) => b.to_string(),
        }
    }

    /// Decode a persisted answer string for the given kind.
    ///
    /// Empty strings decode to `None`, as do values that do not parse for
    /// the kind (a boolean question holding `"maybe"`).
    pub fn decode(kind: QuestionKind, raw: &str) -> Option<Self> {
        if raw.is_empty() {
            return None;
        }
        match kind {
            QuestionKind::Text | QuestionKind::LongText => Some(QuestionValue::Text(raw.to_string())),
            QuestionKind::SingleChoice => Some(QuestionValue::Choice(raw.to_string())),
            QuestionKind::Number => raw.trim().parse().ok().map(QuestionValue::Number),
            QuestionKind::Boolean => match raw.trim() {
                "true" => Some(QuestionValue::Boolean(true)),
                "false" => Some(QuestionValue::Boolean(false)),
                _ => None,
            },
        }
    }

    /// Whether this value is acceptable for a question of `kind`.
    pub fn matches_kind(&self, kind: QuestionKind) -> bool {
        matches!(
            (self, kind),
            (QuestionValue::Text(_), QuestionKind::Text)
                | (QuestionValue::Text(_), QuestionKind::LongText)
                | (QuestionValue::Number(_), QuestionKind::Number)
                | (QuestionValue::Boolean(_), QuestionKind::Boolean)
                | (QuestionValue::Choice(_), QuestionKind::SingleChoice)
        )
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            QuestionValue::Boolean(b) => Some(*b),
            _ => None,
        }
    }
}

/// One answerable item in the interview.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Question {
    /// Globally unique id (encodes part, box and field)
    pub id: String,
    /// Question type
    pub kind: QuestionKind,
    /// Current local value
    pub value: Option<QuestionValue>,
    /// Allowed values (SingleChoice only)
    pub options: Vec<String>,
    /// Current visibility
    pub hidden: bool,
    /// Visibility at construction time; never changes afterwards
    originally_hidden: bool,
    /// Include in patient-facing output
    pub shared_with_patient: bool,
    /// Include in doctor-facing output
    pub shared_with_doctor: bool,
}

impl Question {
    fn with_kind(id: impl Into<String>, kind: QuestionKind, options: Vec<String>) -> Self {
        Self {
            id: id.into(),
            kind,
            value: None,
            options,
            hidden: false,
            originally_hidden: false,
            shared_with_patient: false,
            shared_with_doctor: false,
        }
    }

    pub fn text(id: impl Into<String>) -> Self {
        Self::with_kind(id, QuestionKind::Text, Vec::new())
    }

    pub fn long_text(id: impl Into<String>) -> Self {
        Self::with_kind(id, QuestionKind::LongText, Vec::new())
    }

    pub fn number(id: impl Into<String>) -> Self {
        Self::with_kind(id, QuestionKind::Number, Vec::new())
    }

    pub fn boolean(id: impl Into<String>) -> Self {
        Self::with_kind(id, QuestionKind::Boolean, Vec::new())
    }

    /// Create a single-choice question. Returns `None` for an empty option list.
    pub fn single_choice(id: impl Into<String>, options: &[&str]) -> Option<Self> {
        if options.is_empty() {
            return None;
        }
        let options = options.iter().map(|o| o.to_string()).collect();
        Some(Self::with_kind(id, QuestionKind::SingleChoice, options))
    }

    /// Mark the question as starting hidden (cascade target).
    pub fn initially_hidden(mut self) -> Self {
        self.hidden = true;
        self.originally_hidden = true;
        self
    }

    /// Whether the question started hidden. Reports decide inclusion on this
    /// flag, never on the live `hidden` state.
    pub fn originally_hidden(&self) -> bool {
        self.originally_hidden
    }

    /// Whether the question holds a value or either sharing flag.
    pub fn has_content(&self) -> bool {
        let has_value = match &self.value {
            Some(QuestionValue::Text(s)) | Some(QuestionValue::Choice(s)) => !s.is_empty(),
            Some(_) => true,
            None => false,
        };
        has_value || self.shared_with_patient || self.shared_with_doctor
    }

    /// Reset value and both sharing flags.
    pub fn clear(&mut self) {
        self.value = None;
        self.shared_with_patient = false;
        self.shared_with_doctor = false;
    }

    /// Encoded value as persisted (`""` when unset).
    pub fn encoded_value(&self) -> String {
        self.value.as_ref().map(QuestionValue::encode).unwrap_or_default()
    }

    /// Check a candidate value against kind and options.
    pub fn accepts(&self, value: &QuestionValue) -> bool {
        if !value.matches_kind(self.kind) {
            return false;
        }
        match value {
            QuestionValue::Choice(choice) => self.options.iter().any(|o| o == choice),
            _ => true,
        }
    }
}
