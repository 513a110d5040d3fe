//! Persistence of resolved document links

use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, warn};

use crate::sharepoint::DocumentRef;

use super::kv::KeyValueStore;

const KEY_PREFIX: &str = "DOC.";
const KEY_DESCRIPTION: &str = "Workbridge document link";

/// Stores [`DocumentRef`]s under `DOC.<document id>` keys in the host's
/// key-value backend.
///
/// Early deployments stored the bare guid string under the same keys;
/// `load` upgrades those transparently to a guid-only reference.
pub struct DocumentLinkStore {
    store: Arc<dyn KeyValueStore>,
}

impl DocumentLinkStore {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    pub async fn save(&self, document_id: &str, link: &DocumentRef) {
        match serde_json::to_value(link) {
            Ok(value) => {
                self.store
                    .set(&key_for(document_id), value, Some(KEY_DESCRIPTION))
                    .await;
                debug!(document = document_id, guid = %link.guid, "document link saved");
            }
            Err(e) => {
                warn!(
                    document = document_id,
                    "failed to serialize document link: {}", e
                );
            }
        }
    }

    pub async fn load(&self, document_id: &str) -> Option<DocumentRef> {
        let value = self.store.get(&key_for(document_id)).await?;
        match value {
            Value::String(guid) => Some(DocumentRef::from_guid(guid)),
            other => match serde_json::from_value(other) {
                Ok(link) => Some(link),
                Err(e) => {
                    warn!(
                        document = document_id,
                        "stored document link is unreadable: {}", e
                    );
                    None
                }
            },
        }
    }

    pub async fn clear(&self, document_id: &str) {
        self.store.delete(&key_for(document_id)).await;
        debug!(document = document_id, "document link cleared");
    }

    pub async fn exists(&self, document_id: &str) -> bool {
        self.store.exists(&key_for(document_id)).await
    }
}

fn key_for(document_id: &str) -> String {
    format!("{}{}", KEY_PREFIX, document_id)
}
