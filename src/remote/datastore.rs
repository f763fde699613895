use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::info;

use super::{ApiError, RetryPolicy};

pub const TOKEN_NAMESPACE: &str = "mccd";
pub const TOKEN_KEY: &str = "service-token";

/// Namespaced JSON key/value store.
#[async_trait]
pub trait DataStore: Send + Sync {
    async fn namespaces(&self) -> Result<Vec<String>, ApiError>;
    async fn read(&self, namespace: &str, key: &str) -> Result<Option<Value>, ApiError>;
    async fn create(&self, namespace: &str, key: &str, value: Value) -> Result<(), ApiError>;
}

/// Credential for the external classification search, kept in the data store.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceToken {
    pub token: String,
}

/// Reads the singleton entry, creating it from `default` when the namespace
/// or key does not exist yet. Every remote step goes through `policy`.
pub async fn fetch_or_init<T>(
    store: &dyn DataStore,
    namespace: &str,
    key: &str,
    default: T,
    policy: &RetryPolicy,
) -> Result<T, ApiError>
where
    T: Serialize + DeserializeOwned,
{
    let namespaces = policy.run("list namespaces", || store.namespaces()).await?;

    if namespaces.iter().any(|existing| existing == namespace) {
        if let Some(raw) = policy.run("read entry", || store.read(namespace, key)).await? {
            return serde_json::from_value(raw)
                .map_err(|err| ApiError::InvalidPayload(format!("{namespace}/{key}: {err}")));
        }
    }

    let raw = serde_json::to_value(&default)
        .map_err(|err| ApiError::InvalidPayload(format!("{namespace}/{key}: {err}")))?;
    policy
        .run("create entry", || store.create(namespace, key, raw.clone()))
        .await?;
    info!(namespace, key, "initialised data store entry");
    Ok(default)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::InMemoryDataStore;
    use serde_json::json;
    use std::time::Duration;

    fn policy() -> RetryPolicy {
        RetryPolicy::new(3, Duration::from_millis(10))
    }

    #[tokio::test]
    async fn creates_missing_entry_with_default() {
        let store = InMemoryDataStore::default();
        let token = fetch_or_init(
            &store,
            TOKEN_NAMESPACE,
            TOKEN_KEY,
            ServiceToken::default(),
            &policy(),
        )
        .await
        .expect("initialised");

        assert_eq!(token, ServiceToken::default());
        assert_eq!(
            store.read(TOKEN_NAMESPACE, TOKEN_KEY).await.expect("readable"),
            Some(json!({ "token": "" }))
        );
    }

    #[tokio::test]
    async fn returns_existing_entry_untouched() {
        let store = InMemoryDataStore::default();
        store
            .create(TOKEN_NAMESPACE, TOKEN_KEY, json!({ "token": "abc" }))
            .await
            .expect("seeded");

        let token: ServiceToken = fetch_or_init(
            &store,
            TOKEN_NAMESPACE,
            TOKEN_KEY,
            ServiceToken::default(),
            &policy(),
        )
        .await
        .expect("read back");

        assert_eq!(token.token, "abc");
    }

    #[tokio::test(start_paused = true)]
    async fn tolerates_transient_store_failures() {
        let store = InMemoryDataStore::default();
        store.fail_next(2);

        let token = fetch_or_init(
            &store,
            TOKEN_NAMESPACE,
            TOKEN_KEY,
            ServiceToken::default(),
            &policy(),
        )
        .await
        .expect("retries cover the outage");

        assert_eq!(token, ServiceToken::default());
    }

    #[tokio::test]
    async fn malformed_entries_are_payload_errors() {
        let store = InMemoryDataStore::default();
        store
            .create(TOKEN_NAMESPACE, TOKEN_KEY, json!(42))
            .await
            .expect("seeded");

        let err = fetch_or_init(
            &store,
            TOKEN_NAMESPACE,
            TOKEN_KEY,
            ServiceToken::default(),
            &policy(),
        )
        .await
        .expect_err("number is not a token");

        assert!(matches!(err, ApiError::InvalidPayload(_)));
    }
}
