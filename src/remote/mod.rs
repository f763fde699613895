//! Collaborators on the far side of the network. Only their contracts live
//! here, together with bounded retry and in-memory implementations.

mod analytics;
mod datastore;
mod events;
mod memory;

pub use analytics::{AnalyticsScope, AnalyticsSource};
pub use datastore::{fetch_or_init, DataStore, ServiceToken, TOKEN_KEY, TOKEN_NAMESPACE};
pub use events::{
    load_option_sets, save_event, CertificateRecord, EventApi, EventId, EventPage, EventQuery,
    OrgUnit,
};
pub use memory::{InMemoryAnalytics, InMemoryDataStore, InMemoryEventApi};

use std::future::Future;
use std::time::Duration;

use tracing::warn;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ApiError {
    /// Timeouts and server-side failures worth retrying.
    #[error("transient failure: {0}")]
    Transient(String),
    #[error("request rejected with status {status}: {message}")]
    Rejected { status: u16, message: String },
    #[error("unexpected payload: {0}")]
    InvalidPayload(String),
    #[error("{0} not found")]
    NotFound(String),
}

impl ApiError {
    /// Classifies a failed HTTP response.
    pub fn from_status(status: u16, message: impl Into<String>) -> Self {
        let message = message.into();
        match status {
            404 => Self::NotFound(message),
            408 | 429 | 500..=599 => Self::Transient(format!("status {status}: {message}")),
            _ => Self::Rejected { status, message },
        }
    }

    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transient(_))
    }
}

/// Fixed-delay retry for transient remote failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    retries: u32,
    delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3, Duration::from_secs(1))
    }
}

impl RetryPolicy {
    pub fn new(retries: u32, delay: Duration) -> Self {
        Self { retries, delay }
    }

    pub fn retries(&self) -> u32 {
        self.retries
    }

    /// Runs `call` until it succeeds, fails permanently, or the retries are spent.
    pub async fn run<T, F, Fut>(&self, operation: &str, mut call: F) -> Result<T, ApiError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, ApiError>>,
    {
        let mut attempt = 0;
        loop {
            match call().await {
                Err(err) if err.is_transient() && attempt < self.retries => {
                    attempt += 1;
                    warn!(operation, attempt, error = %err, "retrying remote call");
                    tokio::time::sleep(self.delay).await;
                }
                outcome => return outcome,
            }
        }
    }
}
