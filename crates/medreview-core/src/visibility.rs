//! Conditional visibility resolver.
//!
//! A dependent question is shown if and only if its trigger is shown and the
//! rule's predicate holds on the trigger value. A hidden question never keeps
//! content: hiding clears value and both sharing flags, and the cleared ids
//! are returned so the caller can persist the reset.
//!
//! A question is reported as cleared when it goes from visible to hidden,
//! or when it is hidden and still holds content locally or in persisted
//! state (as told by the `persisted` predicate).

use std::collections::{HashSet, VecDeque};

use crate::tree::QuestionTree;

/// Re-evaluate every cascade reachable from `changed_id`.
///
/// Walks chains transitively, so an edit to a top-level trigger can hide and
/// clear a field two levels down. Returns ids of questions that were cleared,
/// in the order they were cleared. `persisted` tells whether a question has a
/// non-blank saved answer. Rules referencing questions missing from the tree
/// are skipped.
pub fn resolve(
    tree: &mut QuestionTree,
    changed_id: &str,
    persisted: impl Fn(&str) -> bool,
) -> Vec<String> {
    let mut cleared = Vec::new();
    let mut visited = HashSet::new();
    let mut queue = VecDeque::from([changed_id.to_string()]);

    while let Some(trigger_id) = queue.pop_front() {
        if !visited.insert(trigger_id.clone()) {
            continue;
        }

        let rules = tree.dependents_of(&trigger_id);
        if rules.is_empty() {
            continue;
        }

        let trigger_state = tree
            .question(&trigger_id)
            .map(|trigger| (trigger.hidden, trigger.value.clone()));
        let Some((trigger_hidden, trigger_value)) = trigger_state else {
            tracing::debug!(question_id = %trigger_id, "Cascade trigger not in tree, skipping");
            continue;
        };

        for rule in rules {
            let shown = !trigger_hidden && rule.reveal.holds(trigger_value.as_ref());

            let Some(dependent) = tree.question_mut(&rule.dependent) else {
                tracing::warn!(
                    trigger = %rule.trigger,
                    dependent = %rule.dependent,
                    "Cascade dependent not in tree, skipping"
                );
                continue;
            };

            let was_visible = !dependent.hidden;
            dependent.hidden = !shown;
            if !shown && (was_visible || dependent.has_content() || persisted(&dependent.id)) {
                dependent.clear();
                tracing::debug!(question_id = %dependent.id, "Cleared hidden question");
                cleared.push(dependent.id.clone());
            }

            queue.push_back(rule.dependent);
        }
    }

    cleared
}

/// Re-evaluate every rule in the tree, top-level triggers first.
///
/// Used after a rebuild, when answers were re-applied onto fresh questions.
pub fn resolve_all(tree: &mut QuestionTree, persisted: impl Fn(&str) -> bool) -> Vec<String> {
    let triggers: Vec<String> = {
        let mut seen = HashSet::new();
        tree.cascade_rules()
            .filter(|rule| seen.insert(rule.trigger.clone()))
            .map(|rule| rule.trigger.clone())
            .collect()
    };

    let mut cleared = Vec::new();
    for trigger in triggers {
        for id in resolve(tree, &trigger, &persisted) {
            if !cleared.contains(&id) {
                cleared.push(id);
            }
        }
    }
    cleared
}
