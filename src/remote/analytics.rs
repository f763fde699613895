use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::ApiError;
use crate::mortality::{MortalityRecord, ReportingPeriod};

/// Optional narrowing of an analytics request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalyticsScope {
    pub category: Option<String>,
    pub organisation_unit: Option<String>,
}

/// Raw death events for a reporting period.
#[async_trait]
pub trait AnalyticsSource: Send + Sync {
    async fn events(
        &self,
        period: &ReportingPeriod,
        scope: &AnalyticsScope,
    ) -> Result<Vec<MortalityRecord>, ApiError>;
}
