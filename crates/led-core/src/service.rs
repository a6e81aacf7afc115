//! LedService: every operation of the register over one shared record store.

use crate::config::LedConfig;
use crate::fixtures;
use crate::policy::{self, Action};
use led_store::{InMemoryKvStore, KvStore, RecordStore};
use led_types::{LedError, LedResult, User};
use std::sync::Arc;
use uuid::Uuid;

/// Store handle used by the service; any backend behind one writer lock.
pub type SharedStore = RecordStore<Arc<dyn KvStore>>;

/// The register's operation surface.
///
/// Operations that act on behalf of a user take a [`crate::Session`]. The session's user
/// is looked up again on every call, so the policy always sees the current role and
/// active flag.
pub struct LedService {
    store: SharedStore,
    config: LedConfig,
}

impl LedService {
    pub fn new(kv: Arc<dyn KvStore>, config: LedConfig) -> Self {
        Self {
            store: RecordStore::new(kv),
            config,
        }
    }

    /// Service over a fresh in-memory backend.
    pub fn in_memory(config: LedConfig) -> Self {
        Self::new(Arc::new(InMemoryKvStore::new()), config)
    }

    pub fn store(&self) -> &SharedStore {
        &self.store
    }

    pub fn config(&self) -> &LedConfig {
        &self.config
    }

    /// Seed demo users and business units into empty collections, if configured.
    pub async fn bootstrap(&self) -> LedResult<()> {
        if self.config.seed_demo_data {
            fixtures::seed_if_empty(&self.store).await?;
        }
        Ok(())
    }

    pub(crate) fn require(user: &User, action: Action) -> LedResult<()> {
        if policy::role_allows(user.role, action) {
            Ok(())
        } else {
            Err(LedError::unauthorized(format!(
                "role {} may not perform {:?}",
                user.role, action
            )))
        }
    }
}

pub(crate) fn new_id() -> String {
    Uuid::new_v4().to_string()
}

/// Trimmed copy of `value`, or `None` when it is blank.
pub(crate) fn non_blank(value: &str) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}
