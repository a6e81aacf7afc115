//! Storage traits: the raw key-value backend and typed records.

use crate::error::ValidationErrors;
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;

/// Key holding the JSON snapshot of the signed-in user.
pub const SESSION_USER_KEY: &str = "led_current_user";
/// Key holding `"true"` while a session is active.
pub const SESSION_FLAG_KEY: &str = "led_is_authenticated";

/// The five independently addressable record collections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Collection {
    Incidents,
    IamItems,
    Users,
    UserRegistrations,
    BusinessUnits,
}

impl Collection {
    pub const ALL: [Collection; 5] = [
        Collection::Incidents,
        Collection::IamItems,
        Collection::Users,
        Collection::UserRegistrations,
        Collection::BusinessUnits,
    ];

    /// Backend key the collection is persisted under.
    pub fn storage_key(self) -> &'static str {
        match self {
            Collection::Incidents => "led_incidents",
            Collection::IamItems => "led_iam_items",
            Collection::Users => "led_users",
            Collection::UserRegistrations => "led_user_registrations",
            Collection::BusinessUnits => "led_business_units",
        }
    }

    /// Top-level key in export/import documents.
    pub fn snapshot_key(self) -> &'static str {
        match self {
            Collection::Incidents => "incidents",
            Collection::IamItems => "iamItems",
            Collection::Users => "users",
            Collection::UserRegistrations => "userRegistrations",
            Collection::BusinessUnits => "businessUnits",
        }
    }
}

/// An entity stored in one of the collections, keyed by its `id`.
pub trait Record: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
    const COLLECTION: Collection;

    fn id(&self) -> &str;

    /// Invariants a stored record must hold beyond decoding.
    fn validate(&self) -> Result<(), ValidationErrors> {
        Ok(())
    }
}

/// Key-value backend: each key holds one JSON document, written as a whole.
#[async_trait]
pub trait KvStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    /// Overwrite the value at `key`.
    async fn set(&self, key: &str, value: &str) -> Result<(), StoreError>;

    /// Remove `key`. Removing an absent key is not an error.
    async fn remove(&self, key: &str) -> Result<(), StoreError>;

    async fn keys(&self) -> Result<Vec<String>, StoreError>;

    /// Overwrite several keys. Backends with transactions apply them all or none.
    async fn set_many(&self, entries: &[(&str, String)]) -> Result<(), StoreError> {
        for (key, value) in entries {
            self.set(key, value).await?;
        }
        Ok(())
    }
}

#[async_trait]
impl<K: KvStore + ?Sized> KvStore for std::sync::Arc<K> {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        (**self).get(key).await
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        (**self).set(key, value).await
    }

    async fn remove(&self, key: &str) -> Result<(), StoreError> {
        (**self).remove(key).await
    }

    async fn keys(&self) -> Result<Vec<String>, StoreError> {
        (**self).keys().await
    }

    async fn set_many(&self, entries: &[(&str, String)]) -> Result<(), StoreError> {
        (**self).set_many(entries).await
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("store error: {0}")]
    Other(String),
    #[error("corrupt value at {key}: {reason}")]
    Corrupt { key: String, reason: String },
}
