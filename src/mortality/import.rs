use std::io::Read;
use std::path::Path;

use chrono::{DateTime, NaiveDate};
use serde::{Deserialize, Deserializer};

use super::domain::{MortalityRecord, OrgUnitRef};
use crate::certificate::Sex;

#[derive(Debug)]
pub enum ImportError {
    Io(std::io::Error),
    Csv(csv::Error),
    InvalidRow { event: String, reason: String },
}

impl std::fmt::Display for ImportError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ImportError::Io(err) => write!(f, "failed to read events export: {}", err),
            ImportError::Csv(err) => write!(f, "invalid events CSV data: {}", err),
            ImportError::InvalidRow { event, reason } => {
                write!(f, "invalid event {}: {}", event, reason)
            }
        }
    }
}

impl std::error::Error for ImportError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ImportError::Io(err) => Some(err),
            ImportError::Csv(err) => Some(err),
            ImportError::InvalidRow { .. } => None,
        }
    }
}

impl From<std::io::Error> for ImportError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err)
    }
}

impl From<csv::Error> for ImportError {
    fn from(err: csv::Error) -> Self {
        Self::Csv(err)
    }
}

/// Reads death events from an analytics CSV export.
pub struct EventCsvImporter;

impl EventCsvImporter {
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Vec<MortalityRecord>, ImportError> {
        let file = std::fs::File::open(path)?;
        Self::from_reader(file)
    }

    pub fn from_reader<R: Read>(reader: R) -> Result<Vec<MortalityRecord>, ImportError> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(reader);
        let mut records = Vec::new();

        for row in csv_reader.deserialize::<EventRow>() {
            let row = row?;
            records.push(row.into_record()?);
        }

        Ok(records)
    }
}

#[derive(Debug, Deserialize)]
struct EventRow {
    #[serde(rename = "Event")]
    event: String,
    #[serde(rename = "Underlying cause", default, deserialize_with = "empty_string_as_none")]
    category: Option<String>,
    #[serde(
        rename = "Organisation unit ID",
        default,
        deserialize_with = "empty_string_as_none"
    )]
    org_unit_id: Option<String>,
    #[serde(
        rename = "Organisation unit",
        default,
        deserialize_with = "empty_string_as_none"
    )]
    org_unit_name: Option<String>,
    #[serde(rename = "Event date")]
    event_date: String,
    #[serde(rename = "Sex", default, deserialize_with = "empty_string_as_none")]
    sex: Option<String>,
    #[serde(rename = "Age in days", default, deserialize_with = "empty_string_as_none")]
    age_days: Option<String>,
    #[serde(rename = "Age", default, deserialize_with = "empty_string_as_none")]
    age_years: Option<String>,
}

impl EventRow {
    fn into_record(self) -> Result<MortalityRecord, ImportError> {
        let invalid = |reason: String| ImportError::InvalidRow {
            event: self.event.clone(),
            reason,
        };

        let event_date = parse_date(&self.event_date)
            .ok_or_else(|| invalid(format!("unreadable event date `{}`", self.event_date)))?;

        let age_days = match (&self.age_days, &self.age_years) {
            (Some(days), _) => Some(
                days.parse::<u32>()
                    .map_err(|_| invalid(format!("unreadable age in days `{days}`")))?,
            ),
            (None, Some(years)) => Some(
                years
                    .parse::<u32>()
                    .map_err(|_| invalid(format!("unreadable age `{years}`")))?
                    * 365,
            ),
            (None, None) => None,
        };

        let organisation_unit = self.org_unit_id.as_ref().map(|id| OrgUnitRef {
            id: id.clone(),
            name: self.org_unit_name.clone().unwrap_or_else(|| id.clone()),
        });

        Ok(MortalityRecord {
            sex: self.sex.as_deref().and_then(Sex::parse),
            category: self.category.clone(),
            organisation_unit,
            event_date,
            age_days,
            event: self.event.clone(),
        })
    }
}

fn empty_string_as_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let opt = Option::<String>::deserialize(deserializer)?;
    Ok(opt.filter(|value| !value.trim().is_empty()))
}

fn parse_date(value: &str) -> Option<NaiveDate> {
    let trimmed = value.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return Some(dt.date_naive());
    }
    NaiveDate::parse_from_str(trimmed, "%Y-%m-%d")
        .or_else(|_| NaiveDate::parse_from_str(trimmed, "%Y-%m-%d %H:%M:%S%.f"))
        .ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    const HEADER: &str =
        "Event,Underlying cause,Organisation unit ID,Organisation unit,Event date,Sex,Age in days,Age\n";

    #[test]
    fn reads_rows_into_records() {
        let data = format!(
            "{HEADER}ev1,Malaria,ou1,Gulu,2024-02-01,Female,12,\n\
             ev2,,ou2,,2024-02-02T10:00:00+03:00,SX01-01,,45\n"
        );

        let records = EventCsvImporter::from_reader(Cursor::new(data)).expect("valid csv");

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].sex, Some(Sex::Female));
        assert_eq!(records[0].age_days, Some(12));
        assert_eq!(
            records[0].organisation_unit.as_ref().map(|unit| unit.name.as_str()),
            Some("Gulu")
        );
        assert_eq!(records[1].category, None);
        assert_eq!(records[1].age_days, Some(45 * 365));
        assert_eq!(
            records[1].organisation_unit.as_ref().map(|unit| unit.name.as_str()),
            Some("ou2")
        );
    }

    #[test]
    fn reports_unreadable_dates() {
        let data = format!("{HEADER}ev1,Malaria,ou1,Gulu,someday,,,\n");

        let err = EventCsvImporter::from_reader(Cursor::new(data)).expect_err("bad date");
        assert!(err.to_string().contains("someday"));
    }
}
