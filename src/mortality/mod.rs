//! Aggregation behind the "top causes of death" chart.

mod aggregate;
mod dashboard;
mod domain;
mod filters;
mod import;
mod report;

pub use aggregate::{
    compare_organisation_units, group_by_organisation_unit, percentage, tagged_total,
    top_categories, AggregateBucket, Trend,
};
pub use dashboard::{DashboardError, DashboardView, MortalityDashboard};
pub use domain::{MortalityClass, MortalityRecord, OrgUnitRef, PeriodError, ReportingPeriod};
pub use filters::{apply_filters, RecordFilter};
pub use import::{EventCsvImporter, ImportError};
pub use report::{Breakdown, BucketView, MortalityQuery, TopCausesReport};
