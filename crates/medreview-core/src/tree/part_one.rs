//! Static Part 1: general interview.

use super::{CascadeTable, Part, QuestionBox, Reveal, Stage, TreeError, TreeResult};
use crate::models::Question;

pub const DOSING_AIDS: &[&str] = &["none", "pill_organizer", "blister_pack", "other"];

fn choice(id: &str, options: &[&str]) -> TreeResult<Question> {
    Question::single_choice(id, options).ok_or_else(|| TreeError::MissingOptions(id.to_string()))
}

/// Build Part 1 and its cascade rules.
pub(super) fn build_part_one() -> TreeResult<(Part, CascadeTable)> {
    let mut cascades = CascadeTable::new();

    let general = QuestionBox::new(
        "p1_general",
        "General",
        vec![
            Question::boolean("p1_general_lives_alone"),
            Question::number("p1_general_medication_count"),
            Question::long_text("p1_general_remarks"),
        ],
    );

    // needs assistance → needs more help → action
    let assistance = QuestionBox::new(
        "p1_assistance",
        "Assistance with medication",
        vec![
            Question::boolean("p1_assistance_needed"),
            Question::boolean("p1_assistance_more_help").initially_hidden(),
            Question::long_text("p1_assistance_more_help_action").initially_hidden(),
        ],
    );
    cascades.add("p1_assistance_needed", "p1_assistance_more_help", Reveal::WhenTrue);
    cascades.add(
        "p1_assistance_more_help",
        "p1_assistance_more_help_action",
        Reveal::WhenTrue,
    );

    let usage = QuestionBox::new(
        "p1_usage",
        "Medication use",
        vec![
            choice("p1_usage_dosing_aid", DOSING_AIDS)?,
            Question::text("p1_usage_dosing_aid_other").initially_hidden(),
            Question::boolean("p1_usage_swallowing_problems"),
            Question::long_text("p1_usage_swallowing_problems_action").initially_hidden(),
        ],
    );
    cascades.add(
        "p1_usage_dosing_aid",
        "p1_usage_dosing_aid_other",
        Reveal::WhenChoiceIn(vec!["other".to_string()]),
    );
    cascades.add(
        "p1_usage_swallowing_problems",
        "p1_usage_swallowing_problems_action",
        Reveal::WhenTrue,
    );

    // experienced → reported to doctor → action when not reported
    let side_effects = QuestionBox::new(
        "p1_side_effects",
        "Side effects",
        vec![
            Question::boolean("p1_side_effects_experienced"),
            Question::long_text("p1_side_effects_details").initially_hidden(),
            Question::boolean("p1_side_effects_reported").initially_hidden(),
            Question::long_text("p1_side_effects_reported_action").initially_hidden(),
        ],
    );
    cascades.add(
        "p1_side_effects_experienced",
        "p1_side_effects_details",
        Reveal::WhenTrue,
    );
    cascades.add(
        "p1_side_effects_experienced",
        "p1_side_effects_reported",
        Reveal::WhenTrue,
    );
    cascades.add(
        "p1_side_effects_reported",
        "p1_side_effects_reported_action",
        Reveal::WhenFalse,
    );

    let part = Part {
        stage: Stage::One,
        boxes: vec![general, assistance, usage, side_effects],
    };
    Ok((part, cascades))
}
