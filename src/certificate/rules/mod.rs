//! Declarative field dependency rules.
//!
//! A [`Rule`] names a trigger field, a predicate over the value it was just
//! given (and optionally over the rest of the snapshot) and an ordered list of
//! effects on other fields. Rules are data: they can be listed, diffed and
//! checked against the schema before a session ever evaluates them.

mod catalog;
mod config;
mod evaluator;

pub use catalog::standard_rules;
pub use config::RuleConfig;
pub use evaluator::RuleEvaluator;

use std::collections::BTreeSet;

use chrono::{Duration, NaiveDate};
use serde::Serialize;

use super::domain::{FieldKey, FieldValue, Snapshot};
use super::schema::CertificateSchema;

/// Inputs that are not part of the snapshot but still shape evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EvaluationContext {
    pub today: NaiveDate,
}

impl EvaluationContext {
    pub fn new(today: NaiveDate) -> Self {
        Self { today }
    }

    pub fn today() -> Self {
        Self::new(chrono::Local::now().date_naive())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "op", content = "arg", rename_all = "snake_case")]
pub enum Predicate {
    Always,
    Truthy,
    Falsy,
    Present,
    Absent,
    Equals(FieldValue),
    OneOf(Vec<FieldValue>),
    /// Age in whole years strictly greater than the bound.
    AgeAbove(u32),
    /// Age in whole years strictly inside `(min, max)`.
    AgeWithin { min: u32, max: u32 },
    /// Date strictly before the date held by another field. False when either is missing.
    DateBefore(FieldKey),
    DateAfter(FieldKey),
    /// More than `weeks` whole weeks before the date held by `reference`.
    MoreThanWeeksBefore { reference: FieldKey, weeks: u32 },
    /// Every listed field is falsy in the snapshot.
    AllFalsy(Vec<FieldKey>),
    /// Applies the inner predicate to another field's value.
    Field {
        key: FieldKey,
        predicate: Box<Predicate>,
    },
    Not(Box<Predicate>),
    All(Vec<Predicate>),
    Any(Vec<Predicate>),
}

impl Predicate {
    pub fn field(key: &str, predicate: Predicate) -> Self {
        Self::Field {
            key: FieldKey::from(key),
            predicate: Box::new(predicate),
        }
    }

    pub fn not(predicate: Predicate) -> Self {
        Self::Not(Box::new(predicate))
    }

    pub fn equals_code(code: &str) -> Self {
        Self::Equals(FieldValue::code(code))
    }

    pub fn matches(&self, value: &FieldValue, snapshot: &Snapshot, ctx: &EvaluationContext) -> bool {
        match self {
            Predicate::Always => true,
            Predicate::Truthy => value.is_truthy(),
            Predicate::Falsy => !value.is_truthy(),
            Predicate::Present => !value.is_empty(),
            Predicate::Absent => value.is_empty(),
            Predicate::Equals(expected) => value == expected,
            Predicate::OneOf(candidates) => candidates.contains(value),
            Predicate::AgeAbove(bound) => value
                .age_in_years(ctx.today)
                .is_some_and(|age| age > f64::from(*bound)),
            Predicate::AgeWithin { min, max } => value
                .age_in_years(ctx.today)
                .is_some_and(|age| age > f64::from(*min) && age < f64::from(*max)),
            Predicate::DateBefore(other) => match (value.as_date(), snapshot.value(other.as_str()).as_date()) {
                (Some(date), Some(bound)) => date < bound,
                _ => false,
            },
            Predicate::DateAfter(other) => match (value.as_date(), snapshot.value(other.as_str()).as_date()) {
                (Some(date), Some(bound)) => date > bound,
                _ => false,
            },
            Predicate::MoreThanWeeksBefore { reference, weeks } => {
                match (value.as_date(), snapshot.value(reference.as_str()).as_date()) {
                    (Some(date), Some(reference)) => {
                        let gap = reference.signed_duration_since(date);
                        gap.num_weeks() > i64::from(*weeks) && gap > Duration::zero()
                    }
                    _ => false,
                }
            }
            Predicate::AllFalsy(keys) => keys
                .iter()
                .all(|key| !snapshot.value(key.as_str()).is_truthy()),
            Predicate::Field { key, predicate } => {
                predicate.matches(snapshot.value(key.as_str()), snapshot, ctx)
            }
            Predicate::Not(inner) => !inner.matches(value, snapshot, ctx),
            Predicate::All(predicates) => predicates
                .iter()
                .all(|predicate| predicate.matches(value, snapshot, ctx)),
            Predicate::Any(predicates) => predicates
                .iter()
                .any(|predicate| predicate.matches(value, snapshot, ctx)),
        }
    }

    fn referenced_keys<'a>(&'a self, keys: &mut Vec<&'a FieldKey>) {
        match self {
            Predicate::DateBefore(key) | Predicate::DateAfter(key) => keys.push(key),
            Predicate::MoreThanWeeksBefore { reference, .. } => keys.push(reference),
            Predicate::AllFalsy(fields) => keys.extend(fields.iter()),
            Predicate::Field { key, predicate } => {
                keys.push(key);
                predicate.referenced_keys(keys);
            }
            Predicate::Not(inner) => inner.referenced_keys(keys),
            Predicate::All(predicates) | Predicate::Any(predicates) => {
                for predicate in predicates {
                    predicate.referenced_keys(keys);
                }
            }
            _ => {}
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "action", content = "value", rename_all = "snake_case")]
pub enum Action {
    Enable,
    Disable,
    ClearValue,
    SetValue(FieldValue),
    /// Sets the target to the age in whole years derived from the trigger date.
    DeriveAge,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Trigger {
    pub field: FieldKey,
    pub predicate: Predicate,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Effect {
    pub target: FieldKey,
    pub action: Action,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Rule {
    pub name: String,
    pub trigger: Trigger,
    pub effects: Vec<Effect>,
}

impl Rule {
    pub fn when(name: impl Into<String>, field: &str, predicate: Predicate) -> Self {
        Self {
            name: name.into(),
            trigger: Trigger {
                field: FieldKey::from(field),
                predicate,
            },
            effects: Vec::new(),
        }
    }

    pub fn then(mut self, target: &str, action: Action) -> Self {
        self.effects.push(Effect {
            target: FieldKey::from(target),
            action,
        });
        self
    }

    pub fn enable(self, targets: &[&str]) -> Self {
        targets
            .iter()
            .fold(self, |rule, target| rule.then(target, Action::Enable))
    }

    pub fn disable(self, targets: &[&str]) -> Self {
        targets
            .iter()
            .fold(self, |rule, target| rule.then(target, Action::Disable))
    }

    /// Disables and clears each target.
    pub fn reset(self, targets: &[&str]) -> Self {
        targets.iter().fold(self, |rule, target| {
            rule.then(target, Action::Disable)
                .then(target, Action::ClearValue)
        })
    }

    pub fn clear(self, targets: &[&str]) -> Self {
        targets
            .iter()
            .fold(self, |rule, target| rule.then(target, Action::ClearValue))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RuleConfigError {
    #[error("rule `{rule}` references unknown field `{field}`")]
    UnknownField { rule: String, field: String },
    #[error("rule `{0}` is declared more than once")]
    DuplicateRule(String),
    #[error("rule `{0}` has no effects")]
    EmptyRule(String),
    #[error("childbearing age window ({min}, {max}) contains no whole age")]
    EmptyAgeWindow { min: u32, max: u32 },
}

/// Rules checked against a schema, kept in declaration order.
#[derive(Debug, Clone, Serialize)]
pub struct RuleSet {
    rules: Vec<Rule>,
}

impl RuleSet {
    pub fn new(schema: &CertificateSchema, rules: Vec<Rule>) -> Result<Self, RuleConfigError> {
        let mut names = BTreeSet::new();
        for rule in &rules {
            if !names.insert(rule.name.as_str()) {
                return Err(RuleConfigError::DuplicateRule(rule.name.clone()));
            }
            if rule.effects.is_empty() {
                return Err(RuleConfigError::EmptyRule(rule.name.clone()));
            }

            let mut keys = vec![&rule.trigger.field];
            rule.trigger.predicate.referenced_keys(&mut keys);
            keys.extend(rule.effects.iter().map(|effect| &effect.target));

            if let Some(unknown) = keys.into_iter().find(|key| !schema.contains(key.as_str())) {
                return Err(RuleConfigError::UnknownField {
                    rule: rule.name.clone(),
                    field: unknown.to_string(),
                });
            }
        }
        Ok(Self { rules })
    }

    /// Rules fired by a change to `field`, in declaration order.
    pub fn triggered_by<'a>(&'a self, field: &'a str) -> impl Iterator<Item = &'a Rule> + 'a {
        self.rules
            .iter()
            .filter(move |rule| rule.trigger.field.as_str() == field)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Rule> {
        self.rules.iter()
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}
