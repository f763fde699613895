//! Option sets used by coded certificate fields.
//!
//! The platform returns option sets as loose `{code, options: [{code, name}]}`
//! payloads. They are validated here into one tagged variant per known set so
//! the rest of the crate never handles raw option codes it does not know.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::domain::FieldValue;

/// Closed vocabulary backed by a platform option set.
pub trait OptionCode: Sized + Copy + 'static {
    const SET: &'static str;

    fn all() -> &'static [Self];
    fn code(self) -> &'static str;
    fn name(self) -> &'static str;

    fn from_code(code: &str) -> Option<Self> {
        Self::all()
            .iter()
            .copied()
            .find(|candidate| candidate.code() == code)
    }

    fn value(self) -> FieldValue {
        FieldValue::code(self.code())
    }

    /// The set as the platform would deliver it.
    fn payload() -> OptionSetPayload {
        OptionSetPayload {
            code: Self::SET.to_string(),
            options: Self::all()
                .iter()
                .map(|option| OptionPayload {
                    code: option.code().to_string(),
                    name: option.name().to_string(),
                })
                .collect(),
        }
    }
}

/// Payloads of every option set the certificate uses.
pub fn standard_payloads() -> Vec<OptionSetPayload> {
    vec![YesNo::payload(), Sex::payload(), IntervalUnit::payload()]
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum YesNo {
    Yes,
    No,
    Unknown,
}

impl OptionCode for YesNo {
    const SET: &'static str = "YN01";

    fn all() -> &'static [Self] {
        &[Self::Yes, Self::No, Self::Unknown]
    }

    fn code(self) -> &'static str {
        match self {
            Self::Yes => "YN01-01",
            Self::No => "YN01-02",
            Self::Unknown => "YN01-03",
        }
    }

    fn name(self) -> &'static str {
        match self {
            Self::Yes => "Yes",
            Self::No => "No",
            Self::Unknown => "Unknown",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Sex {
    Male,
    Female,
    Unknown,
}

impl Sex {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Male => "Male",
            Self::Female => "Female",
            Self::Unknown => "Unknown",
        }
    }

    /// Accepts either the option code or its display name.
    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        Self::from_code(raw).or_else(|| {
            Self::all()
                .iter()
                .copied()
                .find(|sex| sex.label().eq_ignore_ascii_case(raw))
        })
    }
}

impl OptionCode for Sex {
    const SET: &'static str = "SX01";

    fn all() -> &'static [Self] {
        &[Self::Male, Self::Female, Self::Unknown]
    }

    fn code(self) -> &'static str {
        match self {
            Self::Male => "SX01-01",
            Self::Female => "SX01-02",
            Self::Unknown => "SX01-03",
        }
    }

    fn name(self) -> &'static str {
        self.label()
    }
}

/// Unit of the "time interval from onset to death" column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntervalUnit {
    Minutes,
    Hours,
    Days,
    Weeks,
    Months,
    Years,
}

impl OptionCode for IntervalUnit {
    const SET: &'static str = "TI01";

    fn all() -> &'static [Self] {
        &[
            Self::Minutes,
            Self::Hours,
            Self::Days,
            Self::Weeks,
            Self::Months,
            Self::Years,
        ]
    }

    fn code(self) -> &'static str {
        match self {
            Self::Minutes => "TI01-01",
            Self::Hours => "TI01-02",
            Self::Days => "TI01-03",
            Self::Weeks => "TI01-04",
            Self::Months => "TI01-05",
            Self::Years => "TI01-06",
        }
    }

    fn name(self) -> &'static str {
        match self {
            Self::Minutes => "Minutes",
            Self::Hours => "Hours",
            Self::Days => "Days",
            Self::Weeks => "Weeks",
            Self::Months => "Months",
            Self::Years => "Years",
        }
    }
}

/// Option set as delivered by the platform API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OptionSetPayload {
    pub code: String,
    pub options: Vec<OptionPayload>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OptionPayload {
    pub code: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LabelledOption<T> {
    pub value: T,
    pub name: String,
}

/// Validated option set, one variant per set the certificate uses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "set", content = "options", rename_all = "snake_case")]
pub enum OptionSet {
    YesNo(Vec<LabelledOption<YesNo>>),
    Sex(Vec<LabelledOption<Sex>>),
    IntervalUnit(Vec<LabelledOption<IntervalUnit>>),
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum OptionSetError {
    #[error("unknown option set `{0}`")]
    UnknownSet(String),
    #[error("option set {set} has unknown code `{code}`")]
    UnknownCode { set: String, code: String },
}

fn labelled<T: OptionCode>(
    payload: &OptionSetPayload,
) -> Result<Vec<LabelledOption<T>>, OptionSetError> {
    payload
        .options
        .iter()
        .map(|option| {
            T::from_code(&option.code)
                .map(|value| LabelledOption {
                    value,
                    name: option.name.clone(),
                })
                .ok_or_else(|| OptionSetError::UnknownCode {
                    set: payload.code.clone(),
                    code: option.code.clone(),
                })
        })
        .collect()
}

impl TryFrom<&OptionSetPayload> for OptionSet {
    type Error = OptionSetError;

    fn try_from(payload: &OptionSetPayload) -> Result<Self, Self::Error> {
        let code = payload.code.as_str();
        if code == YesNo::SET {
            labelled(payload).map(OptionSet::YesNo)
        } else if code == Sex::SET {
            labelled(payload).map(OptionSet::Sex)
        } else if code == IntervalUnit::SET {
            labelled(payload).map(OptionSet::IntervalUnit)
        } else {
            Err(OptionSetError::UnknownSet(code.to_string()))
        }
    }
}

impl OptionSet {
    pub fn len(&self) -> usize {
        match self {
            OptionSet::YesNo(options) => options.len(),
            OptionSet::Sex(options) => options.len(),
            OptionSet::IntervalUnit(options) => options.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// All validated option sets keyed by set code.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct OptionCatalog {
    sets: BTreeMap<String, OptionSet>,
}

impl OptionCatalog {
    /// Sets the certificate does not use are skipped; known sets must be fully valid.
    pub fn from_payloads(payloads: &[OptionSetPayload]) -> Result<Self, OptionSetError> {
        let mut sets = BTreeMap::new();
        for payload in payloads {
            match OptionSet::try_from(payload) {
                Ok(set) => {
                    sets.insert(payload.code.clone(), set);
                }
                Err(OptionSetError::UnknownSet(code)) => {
                    tracing::debug!(%code, "ignoring option set not used by the certificate");
                }
                Err(err) => return Err(err),
            }
        }
        Ok(Self { sets })
    }

    pub fn get(&self, code: &str) -> Option<&OptionSet> {
        self.sets.get(code)
    }

    pub fn len(&self) -> usize {
        self.sets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sets.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payload(code: &str, options: &[(&str, &str)]) -> OptionSetPayload {
        OptionSetPayload {
            code: code.to_string(),
            options: options
                .iter()
                .map(|(code, name)| OptionPayload {
                    code: code.to_string(),
                    name: name.to_string(),
                })
                .collect(),
        }
    }

    #[test]
    fn validates_known_sets_into_variants() {
        let set = OptionSet::try_from(&payload(
            "SX01",
            &[("SX01-01", "Male"), ("SX01-02", "Female")],
        ))
        .expect("sex set is valid");

        match set {
            OptionSet::Sex(options) => {
                assert_eq!(options[1].value, Sex::Female);
                assert_eq!(options[1].name, "Female");
            }
            other => panic!("expected sex option set, got {other:?}"),
        }
    }

    #[test]
    fn rejects_unknown_codes_inside_known_sets() {
        let err = OptionSet::try_from(&payload("YN01", &[("YN01-09", "Maybe")]))
            .expect_err("unknown code must fail");

        assert_eq!(
            err,
            OptionSetError::UnknownCode {
                set: "YN01".to_string(),
                code: "YN01-09".to_string(),
            }
        );
    }

    #[test]
    fn catalog_skips_unrelated_sets() {
        let catalog = OptionCatalog::from_payloads(&[
            payload("YN01", &[("YN01-01", "Yes"), ("YN01-02", "No")]),
            payload("OCC01", &[("OCC01-01", "Farmer")]),
        ])
        .expect("catalog builds");

        assert_eq!(catalog.len(), 1);
        assert!(catalog.get("YN01").is_some());
    }

    #[test]
    fn standard_payloads_round_trip_through_the_catalog() {
        let catalog = OptionCatalog::from_payloads(&standard_payloads()).expect("valid sets");
        assert_eq!(catalog.len(), 3);
        assert_eq!(catalog.get("TI01").map(OptionSet::len), Some(6));
    }

    #[test]
    fn sex_parses_codes_and_labels() {
        assert_eq!(Sex::parse("SX01-02"), Some(Sex::Female));
        assert_eq!(Sex::parse("male"), Some(Sex::Male));
        assert_eq!(Sex::parse("other"), None);
    }
}
