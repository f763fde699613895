use std::collections::{BTreeMap, VecDeque};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::Value;

use super::{
    AnalyticsScope, AnalyticsSource, ApiError, CertificateRecord, DataStore, EventApi, EventId,
    EventPage, EventQuery, OrgUnit,
};
use crate::certificate::{standard_payloads, FieldValue, OptionSetPayload};
use crate::mortality::{MortalityRecord, ReportingPeriod};

/// Queue of failures handed out before calls start succeeding again.
#[derive(Debug, Default)]
struct ScriptedFailures(VecDeque<ApiError>);

impl ScriptedFailures {
    fn next(&mut self) -> Result<(), ApiError> {
        match self.0.pop_front() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

#[derive(Debug, Default)]
struct EventState {
    events: BTreeMap<EventId, CertificateRecord>,
    next_id: u64,
    failures: ScriptedFailures,
    option_sets: Vec<OptionSetPayload>,
    org_units: Vec<OrgUnit>,
}

/// Event API backed by process memory, used by the demo server and tests.
#[derive(Debug, Default, Clone)]
pub struct InMemoryEventApi {
    state: Arc<Mutex<EventState>>,
}

impl InMemoryEventApi {
    /// Seeded with the certificate option sets and a single root unit.
    pub fn seeded() -> Self {
        let api = Self::default();
        {
            let mut state = api.state.lock().expect("event api mutex poisoned");
            state.option_sets = standard_payloads();
            state.org_units = vec![OrgUnit {
                id: "root".to_string(),
                name: "National".to_string(),
                level: 1,
                parent: None,
            }];
        }
        api
    }

    pub fn with_org_units(self, org_units: Vec<OrgUnit>) -> Self {
        self.state.lock().expect("event api mutex poisoned").org_units = org_units;
        self
    }

    pub fn with_option_sets(self, option_sets: Vec<OptionSetPayload>) -> Self {
        self.state.lock().expect("event api mutex poisoned").option_sets = option_sets;
        self
    }

    /// The next calls fail with these errors, in order.
    pub fn fail_next(&self, failures: impl IntoIterator<Item = ApiError>) {
        self.state
            .lock()
            .expect("event api mutex poisoned")
            .failures
            .0
            .extend(failures);
    }

    pub fn stored(&self) -> Vec<CertificateRecord> {
        self.state
            .lock()
            .expect("event api mutex poisoned")
            .events
            .values()
            .cloned()
            .collect()
    }
}

fn matches_search(record: &CertificateRecord, needle: &str) -> bool {
    let needle = needle.to_lowercase();
    record.values.values().any(|value| match value {
        FieldValue::Text(text) => text.to_lowercase().contains(&needle),
        _ => false,
    })
}

#[async_trait]
impl EventApi for InMemoryEventApi {
    async fn create_event(&self, record: &CertificateRecord) -> Result<EventId, ApiError> {
        let mut state = self.state.lock().expect("event api mutex poisoned");
        state.failures.next()?;
        state.next_id += 1;
        let id = EventId(format!("evt{:05}", state.next_id));
        let mut stored = record.clone();
        stored.event = Some(id.clone());
        state.events.insert(id.clone(), stored);
        Ok(id)
    }

    async fn update_event(&self, id: &EventId, record: &CertificateRecord) -> Result<(), ApiError> {
        let mut state = self.state.lock().expect("event api mutex poisoned");
        state.failures.next()?;
        match state.events.get_mut(id) {
            Some(existing) => {
                *existing = record.clone();
                existing.event = Some(id.clone());
                Ok(())
            }
            None => Err(ApiError::NotFound(format!("event {id}"))),
        }
    }

    async fn delete_event(&self, id: &EventId) -> Result<(), ApiError> {
        let mut state = self.state.lock().expect("event api mutex poisoned");
        state.failures.next()?;
        state
            .events
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| ApiError::NotFound(format!("event {id}")))
    }

    async fn list_events(&self, query: &EventQuery) -> Result<EventPage, ApiError> {
        let mut state = self.state.lock().expect("event api mutex poisoned");
        state.failures.next()?;

        let matching: Vec<&CertificateRecord> = state
            .events
            .values()
            .filter(|record| {
                query
                    .org_unit
                    .as_ref()
                    .map_or(true, |unit| &record.org_unit == unit)
            })
            .filter(|record| query.start.map_or(true, |start| record.event_date >= start))
            .filter(|record| query.end.map_or(true, |end| record.event_date <= end))
            .filter(|record| {
                query
                    .search
                    .as_deref()
                    .map_or(true, |needle| matches_search(record, needle))
            })
            .collect();

        let page_size = query.page_size.max(1) as usize;
        let page = query.page.max(1);
        let total = matching.len();
        let events = matching
            .into_iter()
            .skip((page as usize - 1) * page_size)
            .take(page_size)
            .cloned()
            .collect();

        Ok(EventPage {
            events,
            page,
            page_count: total.div_ceil(page_size) as u32,
            total,
        })
    }

    async fn option_sets(&self) -> Result<Vec<OptionSetPayload>, ApiError> {
        let mut state = self.state.lock().expect("event api mutex poisoned");
        state.failures.next()?;
        Ok(state.option_sets.clone())
    }

    async fn organisation_units(&self) -> Result<Vec<OrgUnit>, ApiError> {
        let mut state = self.state.lock().expect("event api mutex poisoned");
        state.failures.next()?;
        Ok(state.org_units.clone())
    }
}

#[derive(Debug, Default)]
struct StoreState {
    entries: BTreeMap<String, BTreeMap<String, Value>>,
    transient_failures: u32,
}

#[derive(Debug, Default, Clone)]
pub struct InMemoryDataStore {
    state: Arc<Mutex<StoreState>>,
}

impl InMemoryDataStore {
    /// The next `count` calls time out.
    pub fn fail_next(&self, count: u32) {
        self.state
            .lock()
            .expect("data store mutex poisoned")
            .transient_failures += count;
    }

    fn guard(state: &mut StoreState) -> Result<(), ApiError> {
        if state.transient_failures > 0 {
            state.transient_failures -= 1;
            return Err(ApiError::Transient("data store timed out".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl DataStore for InMemoryDataStore {
    async fn namespaces(&self) -> Result<Vec<String>, ApiError> {
        let mut state = self.state.lock().expect("data store mutex poisoned");
        Self::guard(&mut state)?;
        Ok(state.entries.keys().cloned().collect())
    }

    async fn read(&self, namespace: &str, key: &str) -> Result<Option<Value>, ApiError> {
        let mut state = self.state.lock().expect("data store mutex poisoned");
        Self::guard(&mut state)?;
        Ok(state
            .entries
            .get(namespace)
            .and_then(|entries| entries.get(key))
            .cloned())
    }

    async fn create(&self, namespace: &str, key: &str, value: Value) -> Result<(), ApiError> {
        let mut state = self.state.lock().expect("data store mutex poisoned");
        Self::guard(&mut state)?;
        let entries = state.entries.entry(namespace.to_string()).or_default();
        if entries.contains_key(key) {
            return Err(ApiError::Rejected {
                status: 409,
                message: format!("{namespace}/{key} already exists"),
            });
        }
        entries.insert(key.to_string(), value);
        Ok(())
    }
}

#[derive(Debug, Default)]
struct AnalyticsState {
    records: Vec<MortalityRecord>,
    failures: ScriptedFailures,
}

#[derive(Debug, Default, Clone)]
pub struct InMemoryAnalytics {
    state: Arc<Mutex<AnalyticsState>>,
}

impl InMemoryAnalytics {
    pub fn new(records: Vec<MortalityRecord>) -> Self {
        Self {
            state: Arc::new(Mutex::new(AnalyticsState {
                records,
                failures: ScriptedFailures::default(),
            })),
        }
    }

    pub fn fail_next(&self, failures: impl IntoIterator<Item = ApiError>) {
        self.state
            .lock()
            .expect("analytics mutex poisoned")
            .failures
            .0
            .extend(failures);
    }
}

#[async_trait]
impl AnalyticsSource for InMemoryAnalytics {
    async fn events(
        &self,
        period: &ReportingPeriod,
        scope: &AnalyticsScope,
    ) -> Result<Vec<MortalityRecord>, ApiError> {
        let mut state = self.state.lock().expect("analytics mutex poisoned");
        state.failures.next()?;
        Ok(state
            .records
            .iter()
            .filter(|record| period.contains(record.event_date))
            .filter(|record| {
                scope
                    .category
                    .as_ref()
                    .map_or(true, |category| record.category.as_ref() == Some(category))
            })
            .filter(|record| {
                scope.organisation_unit.as_ref().map_or(true, |unit| {
                    record
                        .organisation_unit
                        .as_ref()
                        .is_some_and(|candidate| &candidate.id == unit)
                })
            })
            .cloned()
            .collect())
    }
}
