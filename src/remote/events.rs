use std::collections::BTreeMap;
use std::fmt;

use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::{ApiError, RetryPolicy};
use crate::certificate::{FieldKey, FieldValue, OptionCatalog, OptionSetPayload};

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventId(pub String);

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Organisation unit as listed in the user's hierarchy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrgUnit {
    pub id: String,
    pub name: String,
    pub level: u8,
    pub parent: Option<String>,
}

/// Stored certificate event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CertificateRecord {
    pub event: Option<EventId>,
    pub org_unit: String,
    pub event_date: NaiveDate,
    pub values: BTreeMap<FieldKey, FieldValue>,
}

impl CertificateRecord {
    pub fn value(&self, key: &str) -> Option<&FieldValue> {
        self.values.get(key)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventQuery {
    pub org_unit: Option<String>,
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
    /// Case-insensitive match on any text value.
    pub search: Option<String>,
    /// One-based page number.
    pub page: u32,
    pub page_size: u32,
}

impl Default for EventQuery {
    fn default() -> Self {
        Self {
            org_unit: None,
            start: None,
            end: None,
            search: None,
            page: 1,
            page_size: 10,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventPage {
    pub events: Vec<CertificateRecord>,
    pub page: u32,
    pub page_count: u32,
    pub total: usize,
}

#[async_trait]
pub trait EventApi: Send + Sync {
    async fn create_event(&self, record: &CertificateRecord) -> Result<EventId, ApiError>;
    async fn update_event(&self, id: &EventId, record: &CertificateRecord) -> Result<(), ApiError>;
    async fn delete_event(&self, id: &EventId) -> Result<(), ApiError>;
    async fn list_events(&self, query: &EventQuery) -> Result<EventPage, ApiError>;
    async fn option_sets(&self) -> Result<Vec<OptionSetPayload>, ApiError>;
    async fn organisation_units(&self) -> Result<Vec<OrgUnit>, ApiError>;
}

/// Creates or updates depending on whether the record already has an event id.
pub async fn save_event(
    api: &dyn EventApi,
    record: &CertificateRecord,
    policy: &RetryPolicy,
) -> Result<EventId, ApiError> {
    match &record.event {
        Some(id) => {
            policy
                .run("update event", || api.update_event(id, record))
                .await?;
            Ok(id.clone())
        }
        None => policy.run("create event", || api.create_event(record)).await,
    }
}

/// Fetches option sets and validates them into the catalog.
pub async fn load_option_sets(
    api: &dyn EventApi,
    policy: &RetryPolicy,
) -> Result<OptionCatalog, ApiError> {
    let payloads = policy.run("fetch option sets", || api.option_sets()).await?;
    OptionCatalog::from_payloads(&payloads).map_err(|err| ApiError::InvalidPayload(err.to_string()))
}
