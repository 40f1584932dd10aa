//! Declarative cascade table: trigger question → dependent question.

use serde::{Deserialize, Serialize};

use crate::models::QuestionValue;

/// Condition on the trigger value under which the dependent is shown.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum Reveal {
    /// Trigger answered yes
    WhenTrue,
    /// Trigger answered no
    WhenFalse,
    /// Trigger choice is one of the listed options
    WhenChoiceIn(Vec<String>),
    /// Trigger holds any non-empty value
    WhenAnswered,
}

impl Reveal {
    /// Evaluate against the trigger's current value.
    pub fn holds(&self, value: Option<&QuestionValue>) -> bool {
        match (self, value) {
            (Reveal::WhenTrue, Some(v)) => v.as_bool() == Some(true),
            (Reveal::WhenFalse, Some(v)) => v.as_bool() == Some(false),
            (Reveal::WhenChoiceIn(choices), Some(QuestionValue::Choice(c))) => {
                choices.iter().any(|option| option == c)
            }
            (Reveal::WhenAnswered, Some(v)) => !v.encode().trim().is_empty(),
            _ => false,
        }
    }
}

/// One cascade rule.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CascadeRule {
    pub trigger: String,
    pub dependent: String,
    pub reveal: Reveal,
}

/// Ordered set of cascade rules.
///
/// Rules are kept in declaration order; parents are declared before the
/// rules of their own dependents so a full re-evaluation walks chains top
/// down.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct CascadeTable {
    rules: Vec<CascadeRule>,
}

impl CascadeTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a rule. A dependent is controlled by at most one trigger; a second
    /// rule for the same dependent replaces the first.
    pub fn add(&mut self, trigger: impl Into<String>, dependent: impl Into<String>, reveal: Reveal) {
        let dependent = dependent.into();
        self.rules.retain(|rule| rule.dependent != dependent);
        self.rules.push(CascadeRule {
            trigger: trigger.into(),
            dependent,
            reveal,
        });
    }

    /// Rules whose trigger is `trigger`.
    pub fn dependents_of<'a>(&'a self, trigger: &'a str) -> impl Iterator<Item = &'a CascadeRule> + 'a {
        self.rules.iter().filter(move |rule| rule.trigger == trigger)
    }

    /// Rule controlling `dependent`, if any.
    pub fn rule_for(&self, dependent: &str) -> Option<&CascadeRule> {
        self.rules.iter().find(|rule| rule.dependent == dependent)
    }

    pub fn rules(&self) -> &[CascadeRule] {
        &self.rules
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reveal_predicates() {
        let yes = QuestionValue::Boolean(true);
        let no = QuestionValue::Boolean(false);

        assert!(Reveal::WhenTrue.holds(Some(&yes)));
        assert!(!Reveal::WhenTrue.holds(Some(&no)));
        assert!(!Reveal::WhenTrue.holds(None));
        assert!(Reveal::WhenFalse.holds(Some(&no)));
        assert!(!Reveal::WhenFalse.holds(None));

        let other = Reveal::WhenChoiceIn(vec!["other".into()]);
        assert!(other.holds(Some(&QuestionValue::Choice("other".into()))));
        assert!(!other.holds(Some(&QuestionValue::Choice("none".into()))));

        assert!(Reveal::WhenAnswered.holds(Some(&QuestionValue::Text("x".into()))));
        assert!(!Reveal::WhenAnswered.holds(Some(&QuestionValue::Text("  ".into()))));
    }

    #[test]
    fn test_second_rule_for_dependent_replaces_first() {
        let mut table = CascadeTable::new();
        table.add("a", "c", Reveal::WhenTrue);
        table.add("b", "c", Reveal::WhenFalse);

        assert_eq!(table.len(), 1);
        assert_eq!(table.rule_for("c").unwrap().trigger, "b");
        assert_eq!(table.dependents_of("a").count(), 0);
    }
}
