//! Persisted answer records.

use serde::{Deserialize, Serialize};

/// Server-side record backing a question's value and sharing flags.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Answer {
    pub question_id: String,
    /// Encoded value (`""` when cleared)
    pub value: String,
    pub shared_with_patient: bool,
    pub shared_with_doctor: bool,
}

impl Answer {
    /// Whether value and both flags equal the given snapshot.
    pub fn matches(&self, value: &str, shared_with_patient: bool, shared_with_doctor: bool) -> bool {
        self.value == value
            && self.shared_with_patient == shared_with_patient
            && self.shared_with_doctor == shared_with_doctor
    }

    /// Whether the answer holds a value or either sharing flag.
    pub fn has_content(&self) -> bool {
        !self.value.is_empty() || self.shared_with_patient || self.shared_with_doctor
    }
}

/// Payload of a create call.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NewAnswer {
    pub question_id: String,
    pub value: String,
    pub shared_with_patient: bool,
    pub shared_with_doctor: bool,
}

impl From<NewAnswer> for Answer {
    fn from(new: NewAnswer) -> Self {
        Self {
            question_id: new.question_id,
            value: new.value,
            shared_with_patient: new.shared_with_patient,
            shared_with_doctor: new.shared_with_doctor,
        }
    }
}

/// Partial update; `None` fields are left untouched.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct AnswerPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shared_with_patient: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shared_with_doctor: Option<bool>,
}

impl AnswerPatch {
    pub fn is_empty(&self) -> bool {
        self.value.is_none() && self.shared_with_patient.is_none() && self.shared_with_doctor.is_none()
    }

    /// Apply the patch onto an existing answer.
    pub fn apply(&self, answer: &mut Answer) {
        if let Some(value) = &self.value {
            answer.value = value.clone();
        }
        if let Some(shared) = self.shared_with_patient {
            answer.shared_with_patient = shared;
        }
        if let Some(shared) = self.shared_with_doctor {
            answer.shared_with_doctor = shared;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_patch_applies_only_set_fields() {
        let mut answer = Answer {
            question_id: "q".into(),
            value: "old".into(),
            shared_with_patient: true,
            shared_with_doctor: false,
        };
        let patch = AnswerPatch {
            shared_with_doctor: Some(true),
            ..Default::default()
        };
        patch.apply(&mut answer);

        assert_eq!(answer.value, "old");
        assert!(answer.shared_with_patient);
        assert!(answer.shared_with_doctor);
    }

    #[test]
    fn test_patch_serializes_sparse() {
        let patch = AnswerPatch {
            value: Some("x".into()),
            ..Default::default()
        };
        let json = serde_json::to_string(&patch).unwrap();
        assert_eq!(json, r#"{"value":"x"}"#);
    }
}
