use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::certificate::Sex;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OrgUnitRef {
    pub id: String,
    pub name: String,
}

/// One death event as returned by the analytics endpoint.
///
/// Category and organisation unit may be missing in raw data; such records
/// are skipped by aggregation rather than rejected.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MortalityRecord {
    pub event: String,
    pub category: Option<String>,
    pub organisation_unit: Option<OrgUnitRef>,
    pub event_date: NaiveDate,
    pub sex: Option<Sex>,
    pub age_days: Option<u32>,
}

impl MortalityRecord {
    /// Category and organisation unit, when both are present and non-blank.
    pub fn tags(&self) -> Option<(&str, &OrgUnitRef)> {
        let category = self
            .category
            .as_deref()
            .map(str::trim)
            .filter(|category| !category.is_empty())?;
        let unit = self
            .organisation_unit
            .as_ref()
            .filter(|unit| !unit.id.trim().is_empty())?;
        Some((category, unit))
    }

    pub fn age_years(&self) -> Option<u32> {
        self.age_days.map(|days| days / 365)
    }

    pub fn class(&self) -> Option<MortalityClass> {
        self.age_days.map(MortalityClass::for_age_days)
    }
}

/// Age-at-death classes used by the mortality filters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MortalityClass {
    Neonatal,
    Infant,
    Child,
    Other,
}

impl MortalityClass {
    pub fn ordered() -> [MortalityClass; 4] {
        [
            MortalityClass::Neonatal,
            MortalityClass::Infant,
            MortalityClass::Child,
            MortalityClass::Other,
        ]
    }

    pub fn for_age_days(days: u32) -> Self {
        match days {
            0..=27 => MortalityClass::Neonatal,
            28..=364 => MortalityClass::Infant,
            365..=1824 => MortalityClass::Child,
            _ => MortalityClass::Other,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            MortalityClass::Neonatal => "Neonatal (under 28 days)",
            MortalityClass::Infant => "Infant (under 1 year)",
            MortalityClass::Child => "Child (under 5 years)",
            MortalityClass::Other => "Other",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "neonatal" => Some(MortalityClass::Neonatal),
            "infant" => Some(MortalityClass::Infant),
            "child" => Some(MortalityClass::Child),
            "other" => Some(MortalityClass::Other),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PeriodError {
    #[error("period start {start} is after its end {end}")]
    Inverted { start: NaiveDate, end: NaiveDate },
    #[error("period is out of the supported date range")]
    OutOfRange,
}

/// Inclusive date range selected for a chart refresh.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportingPeriod {
    start: NaiveDate,
    end: NaiveDate,
}

impl ReportingPeriod {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self, PeriodError> {
        if start > end {
            return Err(PeriodError::Inverted { start, end });
        }
        Ok(Self { start, end })
    }

    /// The year up to and including `today`, the dashboard's default range.
    pub fn trailing_year(today: NaiveDate) -> Result<Self, PeriodError> {
        let start = today
            .checked_sub_months(chrono::Months::new(12))
            .ok_or(PeriodError::OutOfRange)?;
        Self::new(start, today)
    }

    pub fn start(&self) -> NaiveDate {
        self.start
    }

    pub fn end(&self) -> NaiveDate {
        self.end
    }

    pub fn days(&self) -> i64 {
        (self.end - self.start).num_days() + 1
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }

    /// The equally long period ending the day before this one starts.
    pub fn previous(&self) -> Result<Self, PeriodError> {
        let end = self
            .start
            .checked_sub_signed(Duration::days(1))
            .ok_or(PeriodError::OutOfRange)?;
        let start = end
            .checked_sub_signed(Duration::days(self.days() - 1))
            .ok_or(PeriodError::OutOfRange)?;
        Self::new(start, end)
    }
}
