use serde::{Deserialize, Serialize};

use super::aggregate::{
    compare_organisation_units, percentage, tagged_total, top_categories, AggregateBucket, Trend,
};
use super::domain::MortalityRecord;
use super::filters::{apply_filters, RecordFilter};

/// What a chart refresh asks for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MortalityQuery {
    #[serde(default)]
    pub filters: Vec<RecordFilter>,
    /// Pivots the breakdown to organisation units for this one category.
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default = "default_limit")]
    pub limit: usize,
    /// Display name of the selected organisation unit, used in the title.
    #[serde(default)]
    pub organisation_unit_name: Option<String>,
}

fn default_limit() -> usize {
    10
}

impl Default for MortalityQuery {
    fn default() -> Self {
        Self {
            filters: Vec::new(),
            category: None,
            limit: default_limit(),
            organisation_unit_name: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Breakdown {
    Category,
    OrganisationUnit,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BucketView {
    pub name: String,
    pub count: usize,
    pub previous_count: Option<usize>,
    pub trend: Trend,
    pub trend_label: &'static str,
    pub percentage: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TopCausesReport {
    pub title: String,
    pub breakdown: Breakdown,
    /// Filtered records that carried both tags.
    pub total: usize,
    pub buckets: Vec<BucketView>,
}

impl TopCausesReport {
    /// Filters both periods, then groups by category or, when a category is
    /// selected, by organisation unit. Percentages use the filtered total.
    pub fn build(
        current: &[MortalityRecord],
        previous: &[MortalityRecord],
        query: &MortalityQuery,
    ) -> Self {
        let mut filters = query.filters.clone();
        if let Some(category) = &query.category {
            filters.push(RecordFilter::Category(category.clone()));
        }

        let current = apply_filters(current, &filters);
        let previous = apply_filters(previous, &filters);
        let total = tagged_total(&current);

        let (breakdown, buckets) = match &query.category {
            Some(_) => (
                Breakdown::OrganisationUnit,
                compare_organisation_units(&current, &previous),
            ),
            None => (
                Breakdown::Category,
                top_categories(&current, &previous, query.limit),
            ),
        };

        Self {
            title: title(query),
            breakdown,
            total,
            buckets: buckets
                .into_iter()
                .map(|bucket| to_view(bucket, total))
                .collect(),
        }
    }
}

fn to_view(bucket: AggregateBucket, total: usize) -> BucketView {
    BucketView {
        percentage: percentage(bucket.count, total),
        trend_label: bucket.trend.label(),
        name: bucket.name,
        count: bucket.count,
        previous_count: bucket.previous_count,
        trend: bucket.trend,
    }
}

fn title(query: &MortalityQuery) -> String {
    let base = match &query.category {
        Some(category) => format!("Deaths from {category} by organisation unit"),
        None => format!("Top {} causes of death", query.limit),
    };
    match &query.organisation_unit_name {
        Some(name) => format!("{base} in {name}"),
        None => base,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::certificate::Sex;
    use crate::mortality::domain::OrgUnitRef;
    use chrono::NaiveDate;

    fn record(category: &str, unit: &str, sex: Sex) -> MortalityRecord {
        MortalityRecord {
            event: format!("{category}-{unit}"),
            category: Some(category.to_string()),
            organisation_unit: Some(OrgUnitRef {
                id: unit.to_lowercase(),
                name: unit.to_string(),
            }),
            event_date: NaiveDate::from_ymd_opt(2024, 1, 1).expect("valid date"),
            sex: Some(sex),
            age_days: Some(40 * 365),
        }
    }

    #[test]
    fn percentages_use_the_filtered_total() {
        let current = vec![
            record("Malaria", "Gulu", Sex::Female),
            record("Malaria", "Gulu", Sex::Male),
            record("Sepsis", "Gulu", Sex::Female),
            record("Stroke", "Gulu", Sex::Female),
        ];
        let query = MortalityQuery {
            filters: vec![RecordFilter::Sex(Sex::Female)],
            ..MortalityQuery::default()
        };

        let report = TopCausesReport::build(&current, &[], &query);

        assert_eq!(report.total, 3);
        assert!(report
            .buckets
            .iter()
            .all(|bucket| bucket.percentage == 33.33));
        assert_eq!(report.title, "Top 10 causes of death");
    }

    #[test]
    fn selecting_a_category_pivots_to_organisation_units() {
        let current = vec![
            record("Malaria", "Gulu", Sex::Female),
            record("Malaria", "Kampala", Sex::Male),
            record("Malaria", "Kampala", Sex::Male),
            record("Sepsis", "Gulu", Sex::Female),
        ];
        let previous = vec![record("Malaria", "Kampala", Sex::Male)];
        let query = MortalityQuery {
            category: Some("Malaria".to_string()),
            organisation_unit_name: Some("Uganda".to_string()),
            ..MortalityQuery::default()
        };

        let report = TopCausesReport::build(&current, &previous, &query);

        assert_eq!(report.breakdown, Breakdown::OrganisationUnit);
        assert_eq!(report.title, "Deaths from Malaria by organisation unit in Uganda");
        let names: Vec<_> = report.buckets.iter().map(|b| b.name.as_str()).collect();
        assert_eq!(names, vec!["Gulu", "Kampala"]);
        assert_eq!(report.buckets[1].trend, Trend::Up);
        assert_eq!(report.buckets[1].percentage, 66.67);
    }

    #[test]
    fn empty_input_yields_empty_report() {
        let report = TopCausesReport::build(&[], &[], &MortalityQuery::default());
        assert_eq!(report.total, 0);
        assert!(report.buckets.is_empty());
    }
}
