//! Medication and clinician note inputs for the dynamic parts.

use serde::{Deserialize, Serialize};

/// Box key used when a medication has no product code.
pub const UNCATEGORIZED: &str = "uncategorized";

/// A medication on the patient's current list.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Medication {
    /// Product code (e.g. national drug code); `None` for free-entered items
    pub product_code: Option<String>,
    /// Display name
    pub name: String,
}

impl Medication {
    pub fn new(product_code: Option<&str>, name: impl Into<String>) -> Self {
        Self {
            product_code: product_code.map(str::to_string),
            name: name.into(),
        }
    }

    /// Stable key for box ids: the product code, or [`UNCATEGORIZED`].
    pub fn box_key(&self) -> String {
        medication_key(self.product_code.as_deref())
    }
}

/// Normalize a product code into a box key.
pub fn medication_key(product_code: Option<&str>) -> String {
    match product_code.map(str::trim) {
        Some(code) if !code.is_empty() => code.to_string(),
        _ => UNCATEGORIZED.to_string(),
    }
}

/// Which interview part a note belongs to.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum NoteCategory {
    /// Relevant to adherence (Part 2)
    Adherence,
    /// Relevant to effectiveness (Part 3)
    Effectiveness,
    /// Not shown in the interview
    Other,
}

/// A clinician note (read-only input).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ClinicianNote {
    pub note_id: String,
    pub category: NoteCategory,
    /// Product code of the linked medication, if any
    pub product_code: Option<String>,
    pub text: String,
}

impl ClinicianNote {
    /// Box key of the linked medication, or `None` for unlinked notes.
    pub fn linked_key(&self) -> Option<String> {
        self.product_code
            .as_deref()
            .map(str::trim)
            .filter(|code| !code.is_empty())
            .map(str::to_string)
    }
}
