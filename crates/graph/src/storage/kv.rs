//! Key-value persistence seam
//!
//! The host owns the real metadata backend; this crate consumes it through
//! [`KeyValueStore`]. Operations are best effort by contract:
//! implementations over fallible backends absorb and log their own errors
//! rather than surfacing them, so callers treat every call as a plain map
//! access.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use serde_json::Value;

/// Opaque typed map the host persists integration metadata in.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get(&self, key: &str) -> Option<Value>;

    /// Stores a value. The description is display metadata for hosts that
    /// surface their settings to administrators.
    async fn set(&self, key: &str, value: Value, description: Option<&str>);

    async fn delete(&self, key: &str);

    async fn exists(&self, key: &str) -> bool;
}

#[derive(Debug, Clone)]
struct StoredEntry {
    value: Value,
    description: Option<String>,
}

/// In-memory [`KeyValueStore`] for tests and single-process hosts.
#[derive(Default)]
pub struct MemoryKeyValueStore {
    entries: Arc<RwLock<HashMap<String, StoredEntry>>>,
}

impl MemoryKeyValueStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The description recorded with a key, when one was given.
    #[must_use]
    pub fn description(&self, key: &str) -> Option<String> {
        self.entries
            .read()
            .get(key)
            .and_then(|entry| entry.description.clone())
    }
}

#[async_trait]
impl KeyValueStore for MemoryKeyValueStore {
    async fn get(&self, key: &str) -> Option<Value> {
        self.entries.read().get(key).map(|entry| entry.value.clone())
    }

    async fn set(&self, key: &str, value: Value, description: Option<&str>) {
        self.entries.write().insert(
            key.to_string(),
            StoredEntry {
                value,
                description: description.map(str::to_string),
            },
        );
    }

    async fn delete(&self, key: &str) {
        self.entries.write().remove(key);
    }

    async fn exists(&self, key: &str) -> bool {
        self.entries.read().contains_key(key)
    }
}
