use std::borrow::Borrow;
use std::collections::BTreeMap;
use std::fmt;

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

/// Stable identifier of a certificate field (the platform's data element id).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FieldKey(pub String);

impl FieldKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for FieldKey {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl Borrow<str> for FieldKey {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FieldKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Value held by a field. Option-set answers are stored as their codes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum FieldValue {
    #[default]
    Empty,
    Bool(bool),
    Number(f64),
    Text(String),
    Code(String),
    Date(NaiveDate),
    DateTime(NaiveDateTime),
}

static EMPTY: FieldValue = FieldValue::Empty;

impl FieldValue {
    pub fn code(code: impl Into<String>) -> Self {
        Self::Code(code.into())
    }

    pub fn text(text: impl Into<String>) -> Self {
        Self::Text(text.into())
    }

    /// Blank text counts as empty, matching how the form treats cleared inputs.
    pub fn is_empty(&self) -> bool {
        match self {
            FieldValue::Empty => true,
            FieldValue::Text(text) | FieldValue::Code(text) => text.trim().is_empty(),
            _ => false,
        }
    }

    pub fn is_truthy(&self) -> bool {
        match self {
            FieldValue::Bool(flag) => *flag,
            FieldValue::Number(number) => *number != 0.0,
            other => !other.is_empty(),
        }
    }

    pub fn as_date(&self) -> Option<NaiveDate> {
        match self {
            FieldValue::Date(date) => Some(*date),
            FieldValue::DateTime(moment) => Some(moment.date()),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            FieldValue::Number(number) => Some(*number),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            FieldValue::Text(text) | FieldValue::Code(text) => Some(text.as_str()),
            _ => None,
        }
    }

    /// Age in whole years: numbers are taken as-is, dates are read as a birth
    /// date and measured up to `today`.
    pub fn age_in_years(&self, today: NaiveDate) -> Option<f64> {
        match self {
            FieldValue::Number(years) => Some(*years),
            other => other
                .as_date()
                .and_then(|birth| today.years_since(birth))
                .map(f64::from),
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Empty => f.write_str("<empty>"),
            FieldValue::Bool(flag) => write!(f, "{flag}"),
            FieldValue::Number(number) => write!(f, "{number}"),
            FieldValue::Text(text) => write!(f, "\"{text}\""),
            FieldValue::Code(code) => f.write_str(code),
            FieldValue::Date(date) => write!(f, "{date}"),
            FieldValue::DateTime(moment) => write!(f, "{moment}"),
        }
    }
}

/// Live state of one field inside an editing session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Field {
    pub key: FieldKey,
    pub value: FieldValue,
    pub enabled: bool,
    pub required: bool,
    pub visible: bool,
}

/// Partial update applied through the registry; `None` leaves an attribute untouched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FieldUpdate {
    pub value: Option<FieldValue>,
    pub enabled: Option<bool>,
    pub visible: Option<bool>,
}

impl FieldUpdate {
    pub fn value(value: FieldValue) -> Self {
        Self {
            value: Some(value),
            ..Self::default()
        }
    }

    pub fn enabled(enabled: bool) -> Self {
        Self {
            enabled: Some(enabled),
            ..Self::default()
        }
    }
}

/// A single state change produced by rule evaluation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldMutation {
    pub key: FieldKey,
    pub change: MutationKind,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", content = "value", rename_all = "snake_case")]
pub enum MutationKind {
    Enable,
    Disable,
    ClearValue,
    SetValue(FieldValue),
}

impl FieldMutation {
    pub fn enable(key: impl Into<FieldKey>) -> Self {
        Self {
            key: key.into(),
            change: MutationKind::Enable,
        }
    }

    pub fn disable(key: impl Into<FieldKey>) -> Self {
        Self {
            key: key.into(),
            change: MutationKind::Disable,
        }
    }

    pub fn clear(key: impl Into<FieldKey>) -> Self {
        Self {
            key: key.into(),
            change: MutationKind::ClearValue,
        }
    }

    pub fn set(key: impl Into<FieldKey>, value: FieldValue) -> Self {
        Self {
            key: key.into(),
            change: MutationKind::SetValue(value),
        }
    }

    pub fn to_update(&self) -> FieldUpdate {
        match &self.change {
            MutationKind::Enable => FieldUpdate::enabled(true),
            MutationKind::Disable => FieldUpdate::enabled(false),
            MutationKind::ClearValue => FieldUpdate::value(FieldValue::Empty),
            MutationKind::SetValue(value) => FieldUpdate::value(value.clone()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldState {
    pub value: FieldValue,
    pub enabled: bool,
}

/// Values and enabled flags of every field at one point in time.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    fields: BTreeMap<FieldKey, FieldState>,
}

impl Snapshot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<FieldKey>, value: FieldValue, enabled: bool) {
        self.fields
            .insert(key.into(), FieldState { value, enabled });
    }

    pub fn state(&self, key: &str) -> Option<&FieldState> {
        self.fields.get(key)
    }

    /// Unknown keys read as empty.
    pub fn value(&self, key: &str) -> &FieldValue {
        self.fields
            .get(key)
            .map(|state| &state.value)
            .unwrap_or(&EMPTY)
    }

    pub fn is_enabled(&self, key: &str) -> bool {
        self.fields.get(key).map(|state| state.enabled).unwrap_or(true)
    }

    pub fn set_value(&mut self, key: &FieldKey, value: FieldValue) {
        match self.fields.get_mut(key.as_str()) {
            Some(state) => state.value = value,
            None => self.insert(key.clone(), value, true),
        }
    }

    pub fn set_enabled(&mut self, key: &FieldKey, enabled: bool) {
        match self.fields.get_mut(key.as_str()) {
            Some(state) => state.enabled = enabled,
            None => self.insert(key.clone(), FieldValue::Empty, enabled),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&FieldKey, &FieldState)> {
        self.fields.iter()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_text_and_false_are_falsy() {
        assert!(!FieldValue::text("   ").is_truthy());
        assert!(!FieldValue::Bool(false).is_truthy());
        assert!(!FieldValue::Empty.is_truthy());
        assert!(FieldValue::code("YN01-01").is_truthy());
    }

    #[test]
    fn age_reads_numbers_and_birth_dates() {
        let today = NaiveDate::from_ymd_opt(2024, 6, 1).expect("valid date");
        let birth = NaiveDate::from_ymd_opt(1994, 6, 2).expect("valid date");

        assert_eq!(FieldValue::Number(42.0).age_in_years(today), Some(42.0));
        assert_eq!(FieldValue::Date(birth).age_in_years(today), Some(29.0));
        assert_eq!(FieldValue::text("x").age_in_years(today), None);
    }

    #[test]
    fn snapshot_defaults_unknown_keys_to_empty_and_enabled() {
        let snapshot = Snapshot::new();
        assert_eq!(snapshot.value("missing"), &FieldValue::Empty);
        assert!(snapshot.is_enabled("missing"));
    }
}
