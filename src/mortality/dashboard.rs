use std::sync::Arc;

use serde::Serialize;
use tracing::info;

use super::domain::{PeriodError, ReportingPeriod};
use super::report::{MortalityQuery, TopCausesReport};
use crate::remote::{AnalyticsScope, AnalyticsSource, ApiError, RetryPolicy};

#[derive(Debug, thiserror::Error)]
pub enum DashboardError {
    #[error(transparent)]
    Period(#[from] PeriodError),
    #[error("analytics request failed: {0}")]
    Analytics(#[from] ApiError),
}

#[derive(Debug, Clone, Serialize)]
pub struct DashboardView {
    pub period: ReportingPeriod,
    pub previous_period: ReportingPeriod,
    pub report: TopCausesReport,
}

/// Feeds the "top causes of death" chart from the analytics source.
#[derive(Clone)]
pub struct MortalityDashboard {
    source: Arc<dyn AnalyticsSource>,
    policy: RetryPolicy,
}

impl MortalityDashboard {
    pub fn new(source: Arc<dyn AnalyticsSource>, policy: RetryPolicy) -> Self {
        Self { source, policy }
    }

    /// Loads the selected period and the equally long one before it, then
    /// builds the report. A category in the query narrows the fetch as well.
    pub async fn refresh(
        &self,
        period: ReportingPeriod,
        organisation_unit: Option<String>,
        query: &MortalityQuery,
    ) -> Result<DashboardView, DashboardError> {
        let previous_period = period.previous()?;
        let scope = AnalyticsScope {
            category: query.category.clone(),
            organisation_unit,
        };

        let (current, previous) = tokio::try_join!(
            self.policy
                .run("fetch current period", || self.source.events(&period, &scope)),
            self.policy.run("fetch previous period", || self
                .source
                .events(&previous_period, &scope)),
        )?;

        info!(
            start = %period.start(),
            end = %period.end(),
            current = current.len(),
            previous = previous.len(),
            "mortality dashboard refreshed"
        );

        Ok(DashboardView {
            report: TopCausesReport::build(&current, &previous, query),
            period,
            previous_period,
        })
    }
}
