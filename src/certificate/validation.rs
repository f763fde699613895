use chrono::NaiveDate;
use serde::Serialize;

use super::domain::{Field, FieldKey, FieldValue};
use super::options::{IntervalUnit, OptionCode, Sex, YesNo};
use super::registry::FieldRegistry;
use super::schema::{CertificateSchema, FieldKind, FieldSpec, NumberRange, Severity};

/// Inline message attached to one field. Issues never modify field values.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValidationIssue {
    pub field: FieldKey,
    pub severity: Severity,
    pub message: String,
}

impl ValidationIssue {
    fn error(field: &FieldKey, message: impl Into<String>) -> Self {
        Self {
            field: field.clone(),
            severity: Severity::Error,
            message: message.into(),
        }
    }
}

/// Checks every declared field, in schema order.
pub fn validate(
    schema: &CertificateSchema,
    registry: &FieldRegistry,
    today: NaiveDate,
) -> Vec<ValidationIssue> {
    schema
        .fields()
        .iter()
        .filter_map(|spec| registry.get(spec.key).ok().map(|field| (spec, field)))
        .filter_map(|(spec, field)| check_field(spec, field, today))
        .collect()
}

fn check_field(spec: &FieldSpec, field: &Field, today: NaiveDate) -> Option<ValidationIssue> {
    if field.value.is_empty() {
        return (spec.required && field.enabled)
            .then(|| ValidationIssue::error(&field.key, format!("{} is required", spec.label)));
    }

    match (spec.kind, &field.value) {
        (FieldKind::Number { integer, range }, FieldValue::Number(number)) => {
            if integer && number.fract() != 0.0 {
                return Some(ValidationIssue::error(
                    &field.key,
                    format!("{} must be a whole number", spec.label),
                ));
            }
            range.and_then(|range| check_range(&field.key, spec.label, *number, range))
        }
        (FieldKind::Number { .. }, _) => Some(ValidationIssue::error(
            &field.key,
            format!("{} must be a number", spec.label),
        )),
        (FieldKind::Date { allow_future }, value) | (FieldKind::DateTime { allow_future }, value) => {
            match value.as_date() {
                None => Some(ValidationIssue::error(
                    &field.key,
                    format!("{} must be a date", spec.label),
                )),
                Some(date) if !allow_future && date > today => Some(ValidationIssue::error(
                    &field.key,
                    format!("{} cannot be in the future", spec.label),
                )),
                Some(_) => None,
            }
        }
        (FieldKind::Boolean, FieldValue::Bool(_)) => None,
        (FieldKind::Boolean, _) => Some(ValidationIssue::error(
            &field.key,
            format!("{} must be checked or unchecked", spec.label),
        )),
        (FieldKind::Coded { option_set }, FieldValue::Code(code)) => (!is_known_code(option_set, code))
            .then(|| {
                ValidationIssue::error(
                    &field.key,
                    format!("`{code}` is not an option of {option_set}"),
                )
            }),
        (FieldKind::Coded { .. }, _) => Some(ValidationIssue::error(
            &field.key,
            format!("{} must be one of the listed options", spec.label),
        )),
        (FieldKind::Text, _) => None,
    }
}

fn check_range(key: &FieldKey, label: &str, number: f64, range: NumberRange) -> Option<ValidationIssue> {
    let below = range.min.is_some_and(|min| number < min);
    let above = range.max.is_some_and(|max| number > max);
    if !below && !above {
        return None;
    }

    let message = match (range.min, range.max) {
        (Some(min), Some(max)) => format!("{label} should be between {min} and {max}"),
        (Some(min), None) => format!("{label} should be at least {min}"),
        (None, Some(max)) => format!("{label} should be at most {max}"),
        (None, None) => return None,
    };

    Some(ValidationIssue {
        field: key.clone(),
        severity: range.severity,
        message,
    })
}

fn is_known_code(option_set: &str, code: &str) -> bool {
    if option_set == YesNo::SET {
        YesNo::from_code(code).is_some()
    } else if option_set == Sex::SET {
        Sex::from_code(code).is_some()
    } else if option_set == IntervalUnit::SET {
        IntervalUnit::from_code(code).is_some()
    } else {
        true
    }
}

/// True when any issue blocks saving.
pub fn has_errors(issues: &[ValidationIssue]) -> bool {
    issues.iter().any(|issue| issue.severity == Severity::Error)
}
