use serde::{Deserialize, Serialize};

use super::domain::{MortalityClass, MortalityRecord};
use crate::certificate::Sex;

/// Predicate applied to records before grouping.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "by", content = "value", rename_all = "snake_case")]
pub enum RecordFilter {
    Sex(Sex),
    /// Age in whole years within `[min, max)`.
    AgeBand { min: u32, max: u32 },
    Class(MortalityClass),
    Category(String),
    OrganisationUnit(String),
}

impl RecordFilter {
    /// Records lacking the attribute a filter inspects never match it.
    pub fn matches(&self, record: &MortalityRecord) -> bool {
        match self {
            RecordFilter::Sex(sex) => record.sex == Some(*sex),
            RecordFilter::AgeBand { min, max } => record
                .age_years()
                .is_some_and(|years| *min <= years && years < *max),
            RecordFilter::Class(class) => record.class() == Some(*class),
            RecordFilter::Category(category) => record
                .category
                .as_deref()
                .is_some_and(|value| value.trim().eq_ignore_ascii_case(category.trim())),
            RecordFilter::OrganisationUnit(id) => record
                .organisation_unit
                .as_ref()
                .is_some_and(|unit| &unit.id == id),
        }
    }
}

/// Records matching every filter.
pub fn apply_filters(records: &[MortalityRecord], filters: &[RecordFilter]) -> Vec<MortalityRecord> {
    records
        .iter()
        .filter(|record| filters.iter().all(|filter| filter.matches(record)))
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn record(sex: Option<Sex>, age_days: Option<u32>) -> MortalityRecord {
        MortalityRecord {
            event: "event".to_string(),
            category: Some("Malaria".to_string()),
            organisation_unit: None,
            event_date: NaiveDate::from_ymd_opt(2024, 1, 1).expect("valid date"),
            sex,
            age_days,
        }
    }

    #[test]
    fn combines_filters_conjunctively() {
        let records = vec![
            record(Some(Sex::Female), Some(10)),
            record(Some(Sex::Female), Some(4000)),
            record(Some(Sex::Male), Some(10)),
            record(None, Some(10)),
        ];

        let filtered = apply_filters(
            &records,
            &[
                RecordFilter::Sex(Sex::Female),
                RecordFilter::Class(MortalityClass::Neonatal),
            ],
        );

        assert_eq!(filtered.len(), 1);
        assert_eq!(filtered[0].age_days, Some(10));
    }

    #[test]
    fn age_band_is_half_open() {
        let band = RecordFilter::AgeBand { min: 1, max: 5 };
        assert!(!band.matches(&record(None, Some(364))));
        assert!(band.matches(&record(None, Some(365))));
        assert!(!band.matches(&record(None, Some(5 * 365))));
        assert!(!band.matches(&record(None, None)));
    }

    #[test]
    fn category_match_ignores_case() {
        assert!(RecordFilter::Category("malaria".to_string()).matches(&record(None, None)));
    }
}
