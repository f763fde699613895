use tracing::debug;

use super::{Action, Effect, EvaluationContext, RuleSet};
use crate::certificate::domain::{FieldKey, FieldMutation, FieldValue, Snapshot};

/// Stateless interpreter of a [`RuleSet`].
#[derive(Debug, Clone)]
pub struct RuleEvaluator {
    rules: RuleSet,
}

impl RuleEvaluator {
    pub fn new(rules: RuleSet) -> Self {
        Self { rules }
    }

    pub fn rules(&self) -> &RuleSet {
        &self.rules
    }

    /// Computes the mutations caused by `changed` taking `new_value`.
    ///
    /// Predicates see the snapshot with the new value in place. Effects of
    /// matching rules are applied in declaration order to a working copy, so
    /// the last write to a target wins. Only changes that differ from the
    /// snapshot are returned, in the order their field was first touched.
    pub fn evaluate(
        &self,
        changed: &str,
        new_value: &FieldValue,
        snapshot: &Snapshot,
        ctx: &EvaluationContext,
    ) -> Vec<FieldMutation> {
        let mut base = snapshot.clone();
        base.set_value(&FieldKey::from(changed), new_value.clone());

        let mut working = base.clone();
        let mut touched: Vec<&FieldKey> = Vec::new();

        for rule in self.rules.triggered_by(changed) {
            if !rule.trigger.predicate.matches(new_value, &base, ctx) {
                continue;
            }
            debug!(rule = %rule.name, field = changed, "rule matched");

            for effect in &rule.effects {
                apply_effect(effect, new_value, ctx, &mut working);
                if !touched.contains(&&effect.target) {
                    touched.push(&effect.target);
                }
            }
        }

        touched
            .into_iter()
            .flat_map(|key| diff_field(key, &base, &working))
            .collect()
    }
}

fn apply_effect(
    effect: &Effect,
    trigger_value: &FieldValue,
    ctx: &EvaluationContext,
    working: &mut Snapshot,
) {
    match &effect.action {
        Action::Enable => working.set_enabled(&effect.target, true),
        Action::Disable => working.set_enabled(&effect.target, false),
        Action::ClearValue => working.set_value(&effect.target, FieldValue::Empty),
        Action::SetValue(value) => working.set_value(&effect.target, value.clone()),
        Action::DeriveAge => {
            let age = trigger_value
                .as_date()
                .and_then(|birth| ctx.today.years_since(birth));
            if let Some(years) = age {
                working.set_value(&effect.target, FieldValue::Number(f64::from(years)));
            }
        }
    }
}

fn diff_field(key: &FieldKey, before: &Snapshot, after: &Snapshot) -> Vec<FieldMutation> {
    let mut changes = Vec::new();

    let old_value = before.value(key.as_str());
    let new_value = after.value(key.as_str());
    let both_empty = old_value.is_empty() && new_value.is_empty();
    if old_value != new_value && !both_empty {
        changes.push(if new_value.is_empty() {
            FieldMutation::clear(key.clone())
        } else {
            FieldMutation::set(key.clone(), new_value.clone())
        });
    }

    match (before.is_enabled(key.as_str()), after.is_enabled(key.as_str())) {
        (false, true) => changes.push(FieldMutation::enable(key.clone())),
        (true, false) => changes.push(FieldMutation::disable(key.clone())),
        _ => {}
    }

    changes
}
