//! Frame A cause chain: lines a to d and the underlying cause drawn from them.

use serde::{Deserialize, Serialize};

use super::domain::{FieldMutation, FieldValue, Snapshot};
use super::schema::keys;

/// ICD chapters that may appear in the chain but never as the underlying cause.
pub const BLACKLISTED_PREFIXES: [char; 1] = ['N'];

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CauseLine {
    A,
    B,
    C,
    D,
}

/// Field keys making up one chain line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineKeys {
    pub term: &'static str,
    pub code: &'static str,
    pub free_text: &'static str,
    pub interval_unit: &'static str,
    pub interval: &'static str,
    pub uri: &'static str,
}

impl CauseLine {
    pub const ALL: [CauseLine; 4] = [CauseLine::A, CauseLine::B, CauseLine::C, CauseLine::D];

    pub const fn label(self) -> &'static str {
        match self {
            CauseLine::A => "a",
            CauseLine::B => "b",
            CauseLine::C => "c",
            CauseLine::D => "d",
        }
    }

    pub const fn keys(self) -> LineKeys {
        match self {
            CauseLine::A => LineKeys {
                term: keys::LINE_A_TERM,
                code: keys::LINE_A_CODE,
                free_text: keys::LINE_A_FREE_TEXT,
                interval_unit: keys::LINE_A_INTERVAL_UNIT,
                interval: keys::LINE_A_INTERVAL,
                uri: keys::LINE_A_URI,
            },
            CauseLine::B => LineKeys {
                term: keys::LINE_B_TERM,
                code: keys::LINE_B_CODE,
                free_text: keys::LINE_B_FREE_TEXT,
                interval_unit: keys::LINE_B_INTERVAL_UNIT,
                interval: keys::LINE_B_INTERVAL,
                uri: keys::LINE_B_URI,
            },
            CauseLine::C => LineKeys {
                term: keys::LINE_C_TERM,
                code: keys::LINE_C_CODE,
                free_text: keys::LINE_C_FREE_TEXT,
                interval_unit: keys::LINE_C_INTERVAL_UNIT,
                interval: keys::LINE_C_INTERVAL,
                uri: keys::LINE_C_URI,
            },
            CauseLine::D => LineKeys {
                term: keys::LINE_D_TERM,
                code: keys::LINE_D_CODE,
                free_text: keys::LINE_D_FREE_TEXT,
                interval_unit: keys::LINE_D_INTERVAL_UNIT,
                interval: keys::LINE_D_INTERVAL,
                uri: keys::LINE_D_URI,
            },
        }
    }
}

/// An ICD-11 entity picked from the classification search.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodedCause {
    pub code: String,
    pub title: String,
    pub uri: String,
}

impl CodedCause {
    pub fn is_blacklisted(&self) -> bool {
        is_blacklisted_code(&self.code)
    }
}

pub fn is_blacklisted_code(code: &str) -> bool {
    code.trim()
        .chars()
        .next()
        .is_some_and(|first| BLACKLISTED_PREFIXES.contains(&first.to_ascii_uppercase()))
}

/// A chain line offered in the underlying cause picker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UnderlyingCandidate {
    pub line: CauseLine,
    pub text: String,
    pub code: Option<String>,
    pub uri: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CauseChainError {
    #[error("line {} has no cause recorded", .0.label())]
    EmptyLine(CauseLine),
    #[error("code `{code}` on line {} is an injury and cannot be the underlying cause", .line.label())]
    Blacklisted { line: CauseLine, code: String },
}

fn non_empty_text(snapshot: &Snapshot, key: &str) -> Option<String> {
    snapshot
        .value(key)
        .as_str()
        .map(str::trim)
        .filter(|text| !text.is_empty())
        .map(str::to_string)
}

/// What line `line` currently records, coded or free text.
pub fn line_entry(snapshot: &Snapshot, line: CauseLine) -> Option<UnderlyingCandidate> {
    let keys = line.keys();
    let text = non_empty_text(snapshot, keys.term).or_else(|| non_empty_text(snapshot, keys.free_text))?;
    Some(UnderlyingCandidate {
        line,
        text,
        code: non_empty_text(snapshot, keys.code),
        uri: non_empty_text(snapshot, keys.uri),
    })
}

/// Lines eligible as underlying cause, in chain order.
pub fn underlying_candidates(snapshot: &Snapshot) -> Vec<UnderlyingCandidate> {
    CauseLine::ALL
        .into_iter()
        .filter_map(|line| line_entry(snapshot, line))
        .filter(|entry| !entry.code.as_deref().is_some_and(is_blacklisted_code))
        .collect()
}

/// True when some recorded line was left out of the picker for being an injury code.
pub fn blacklisted_found(snapshot: &Snapshot) -> bool {
    CauseLine::ALL
        .into_iter()
        .filter_map(|line| line_entry(snapshot, line))
        .any(|entry| entry.code.as_deref().is_some_and(is_blacklisted_code))
}

/// Switches a line to coded entry, discarding the free text.
pub fn use_coded_entry(line: CauseLine) -> Vec<FieldMutation> {
    let keys = line.keys();
    vec![
        FieldMutation::clear(keys.free_text),
        FieldMutation::disable(keys.free_text),
        FieldMutation::clear(keys.term),
        FieldMutation::clear(keys.code),
        FieldMutation::clear(keys.uri),
        FieldMutation::enable(keys.term),
        FieldMutation::enable(keys.code),
    ]
}

/// Switches a line to free text when no ICD entity fits.
pub fn use_free_text(line: CauseLine) -> Vec<FieldMutation> {
    let keys = line.keys();
    vec![
        FieldMutation::clear(keys.term),
        FieldMutation::clear(keys.code),
        FieldMutation::clear(keys.uri),
        FieldMutation::disable(keys.term),
        FieldMutation::enable(keys.free_text),
    ]
}

pub fn set_coded_cause(line: CauseLine, cause: &CodedCause) -> Vec<FieldMutation> {
    let keys = line.keys();
    vec![
        FieldMutation::set(keys.term, FieldValue::text(&cause.title)),
        FieldMutation::set(keys.code, FieldValue::text(&cause.code)),
        FieldMutation::set(keys.uri, FieldValue::text(&cause.uri)),
    ]
}

/// Copies line `line` into the underlying cause fields.
pub fn choose_underlying(
    snapshot: &Snapshot,
    line: CauseLine,
) -> Result<Vec<FieldMutation>, CauseChainError> {
    let entry = line_entry(snapshot, line).ok_or(CauseChainError::EmptyLine(line))?;
    if let Some(code) = entry.code.as_deref().filter(|code| is_blacklisted_code(code)) {
        return Err(CauseChainError::Blacklisted {
            line,
            code: code.to_string(),
        });
    }

    let text_or_empty = |value: Option<String>| value.map(FieldValue::Text).unwrap_or_default();
    Ok(vec![
        FieldMutation::set(keys::UNDERLYING_CAUSE, FieldValue::Text(entry.text)),
        FieldMutation::set(keys::UNDERLYING_CODE, text_or_empty(entry.code.clone())),
        FieldMutation::set(keys::UNDERLYING_URI, text_or_empty(entry.uri)),
        FieldMutation::set(keys::UNDERLYING_DISPLAY_CODE, text_or_empty(entry.code)),
    ])
}
