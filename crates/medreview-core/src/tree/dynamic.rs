//! Parts 2 and 3, derived from the medication and note lists.

use std::borrow::Cow;
use std::collections::HashSet;

use super::{BoxNote, CascadeTable, Part, QuestionBox, Reveal, Stage};
use crate::models::{ClinicianNote, Medication, NoteCategory, Question};

/// Result of deriving the dynamic parts.
#[derive(Debug, Clone)]
pub struct DynamicParts {
    pub adherence: Part,
    pub effectiveness: Part,
    pub cascades: CascadeTable,
}

/// Escape an externally supplied key for use inside an id.
///
/// `_` separates id segments, so it is percent-encoded (as is `%` itself).
/// Keys without either character are used as-is.
pub fn id_segment(raw: &str) -> Cow<'_, str> {
    if !raw.contains(['_', '%']) {
        return Cow::Borrowed(raw);
    }
    Cow::Owned(raw.replace('%', "%25").replace('_', "%5F"))
}

/// Box id of a medication box.
pub fn medication_box_id(stage: Stage, key: &str) -> String {
    format!("{}_med_{}", stage.prefix(), id_segment(key))
}

/// Box id of the general notes box.
pub fn general_notes_box_id(stage: Stage) -> String {
    format!("{}_general_notes", stage.prefix())
}

/// Question id of the comment attached to a note inside a box.
pub fn note_comment_id(box_id: &str, note_id: &str) -> String {
    format!("{}_note_{}", box_id, id_segment(note_id))
}

/// Per-stage vocabulary: gate field name and the category of notes shown.
struct StageSpec {
    stage: Stage,
    gate: &'static str,
    category: NoteCategory,
    general_title: &'static str,
}

const ADHERENCE: StageSpec = StageSpec {
    stage: Stage::Two,
    gate: "adherence",
    category: NoteCategory::Adherence,
    general_title: "General adherence notes",
};

const EFFECTIVENESS: StageSpec = StageSpec {
    stage: Stage::Three,
    gate: "effective",
    category: NoteCategory::Effectiveness,
    general_title: "General effectiveness notes",
};

/// Derive Parts 2 and 3.
///
/// Medications sharing a key share one box (the first occurrence names it).
/// Notes linked to a listed medication attach to its box; all other notes of
/// the stage's category go to the general notes box, which exists only when
/// it has notes.
pub fn derive_dynamic_parts(medications: &[Medication], notes: &[ClinicianNote]) -> DynamicParts {
    let mut cascades = CascadeTable::new();

    let mut seen = HashSet::new();
    let unique: Vec<(String, &Medication)> = medications
        .iter()
        .map(|med| (med.box_key(), med))
        .filter(|(key, _)| seen.insert(key.clone()))
        .collect();

    let adherence = derive_part(&ADHERENCE, &unique, notes, &mut cascades);
    let effectiveness = derive_part(&EFFECTIVENESS, &unique, notes, &mut cascades);

    DynamicParts {
        adherence,
        effectiveness,
        cascades,
    }
}

fn derive_part(
    spec: &StageSpec,
    medications: &[(String, &Medication)],
    notes: &[ClinicianNote],
    cascades: &mut CascadeTable,
) -> Part {
    let mut boxes = Vec::with_capacity(medications.len() + 1);
    let stage_notes: Vec<&ClinicianNote> = notes
        .iter()
        .filter(|note| note.category == spec.category)
        .collect();

    for (key, medication) in medications {
        let box_id = medication_box_id(spec.stage, key);
        let gate_id = format!("{}_{}", box_id, spec.gate);
        let follow_up_id = format!("{}_notes", box_id);

        cascades.add(gate_id.clone(), follow_up_id.clone(), Reveal::WhenFalse);

        let mut question_box = QuestionBox::new(
            box_id.clone(),
            medication.name.clone(),
            vec![
                Question::boolean(gate_id),
                Question::long_text(follow_up_id).initially_hidden(),
            ],
        );
        question_box.notes = box_notes(
            &box_id,
            stage_notes
                .iter()
                .copied()
                .filter(|note| note.linked_key().as_deref() == Some(key.as_str())),
        );
        boxes.push(question_box);
    }

    let general: Vec<&ClinicianNote> = stage_notes
        .iter()
        .copied()
        .filter(|note| match note.linked_key() {
            Some(key) => !medications.iter().any(|(k, _)| *k == key),
            None => true,
        })
        .collect();

    if !general.is_empty() {
        let box_id = general_notes_box_id(spec.stage);
        let mut question_box = QuestionBox::new(box_id.clone(), spec.general_title, Vec::new());
        question_box.notes = box_notes(&box_id, general);
        boxes.push(question_box);
    }

    Part {
        stage: spec.stage,
        boxes,
    }
}

/// Notes of one box, first occurrence of each note id only.
fn box_notes<'a>(box_id: &str, notes: impl IntoIterator<Item = &'a ClinicianNote>) -> Vec<BoxNote> {
    let mut seen = HashSet::new();
    notes
        .into_iter()
        .filter(|note| seen.insert(note.note_id.as_str()))
        .map(|note| BoxNote {
            note_id: note.note_id.clone(),
            text: note.text.clone(),
            comment: Question::long_text(note_comment_id(box_id, &note.note_id)),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn note(id: &str, category: NoteCategory, code: Option<&str>) -> ClinicianNote {
        ClinicianNote {
            note_id: id.into(),
            category,
            product_code: code.map(str::to_string),
            text: format!("note {}", id),
        }
    }

    #[test]
    fn test_duplicate_keys_share_a_box() {
        let meds = vec![
            Medication::new(None, "Vitamin D"),
            Medication::new(None, "Fish oil"),
            Medication::new(Some("42"), "Atorvastatin"),
            Medication::new(Some("42"), "Atorvastatin (duplicate)"),
        ];
        let parts = derive_dynamic_parts(&meds, &[]);

        assert_eq!(
            parts.adherence.box_ids(),
            vec!["p2_med_uncategorized", "p2_med_42"]
        );
        assert_eq!(parts.adherence.boxes[0].title, "Vitamin D");
        assert_eq!(parts.cascades.len(), 4);
    }

    #[test]
    fn test_notes_route_by_category_and_link() {
        let meds = vec![Medication::new(Some("42"), "Atorvastatin")];
        let notes = vec![
            note("a", NoteCategory::Adherence, Some("42")),
            note("b", NoteCategory::Adherence, None),
            note("c", NoteCategory::Adherence, Some("999")),
            note("d", NoteCategory::Effectiveness, Some("42")),
            note("e", NoteCategory::Other, None),
        ];
        let parts = derive_dynamic_parts(&meds, &notes);

        assert_eq!(parts.adherence.box_ids(), vec!["p2_med_42", "p2_general_notes"]);
        let med_box = &parts.adherence.boxes[0];
        assert_eq!(med_box.notes.len(), 1);
        assert_eq!(med_box.notes[0].comment.id, "p2_med_42_note_a");

        let general = &parts.adherence.boxes[1];
        let ids: Vec<_> = general.notes.iter().map(|n| n.note_id.as_str()).collect();
        assert_eq!(ids, vec!["b", "c"]);

        assert_eq!(parts.effectiveness.box_ids(), vec!["p3_med_42"]);
        assert_eq!(parts.effectiveness.boxes[0].notes.len(), 1);
    }

    #[test]
    fn test_repeated_note_ids_appear_once_per_box() {
        let notes = vec![
            note("n1", NoteCategory::Effectiveness, None),
            note("n1", NoteCategory::Effectiveness, None),
        ];
        let parts = derive_dynamic_parts(&[], &notes);

        let general = &parts.effectiveness.boxes[0];
        assert_eq!(general.notes.len(), 1);
        assert_eq!(general.notes[0].text, "note n1");
    }

    #[test]
    fn test_underscored_keys_cannot_collide() {
        let meds = vec![
            Medication::new(Some("A"), "First"),
            Medication::new(Some("A_note_x"), "Second"),
        ];
        let notes = vec![note("x_adherence", NoteCategory::Adherence, Some("A"))];
        let parts = derive_dynamic_parts(&meds, &notes);

        let ids: Vec<&str> = parts
            .adherence
            .boxes
            .iter()
            .flat_map(|b| b.all_questions())
            .map(|q| q.id.as_str())
            .collect();
        assert_eq!(
            ids,
            vec![
                "p2_med_A_adherence",
                "p2_med_A_notes",
                "p2_med_A_note_x%5Fadherence",
                "p2_med_A%5Fnote%5Fx_adherence",
                "p2_med_A%5Fnote%5Fx_notes",
            ]
        );
        let unique: HashSet<&str> = ids.iter().copied().collect();
        assert_eq!(unique.len(), ids.len());
    }

    #[test]
    fn test_plain_keys_are_not_escaped() {
        assert_eq!(medication_box_id(Stage::Two, "0000123"), "p2_med_0000123");
        assert_eq!(id_segment("50%_off"), "50%25%5Foff");
    }
}
