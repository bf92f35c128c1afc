use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::Mutex;

use super::{ObjectStore, StorageError};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredObject {
    pub body: Bytes,
    pub content_type: String,
}

#[derive(Default)]
struct StoreState {
    objects: BTreeMap<String, StoredObject>,
    put_calls: usize,
    failure: Option<String>,
}

/// Object store that keeps uploads in memory. Clones share state.
#[derive(Clone)]
pub struct InMemoryObjectStore {
    base_url: String,
    state: Arc<Mutex<StoreState>>,
}

impl InMemoryObjectStore {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            state: Arc::new(Mutex::new(StoreState::default())),
        }
    }

    /// Reject every following upload with `message`.
    pub async fn fail_uploads(&self, message: impl Into<String>) {
        self.state.lock().await.failure = Some(message.into());
    }

    pub async fn object(&self, key: &str) -> Option<StoredObject> {
        self.state.lock().await.objects.get(key).cloned()
    }

    /// Number of upload attempts, including rejected ones.
    pub async fn put_calls(&self) -> usize {
        self.state.lock().await.put_calls
    }
}

#[async_trait]
impl ObjectStore for InMemoryObjectStore {
    async fn put_object(
        &self,
        key: &str,
        body: Bytes,
        content_type: &str,
    ) -> Result<(), StorageError> {
        let mut state = self.state.lock().await;
        state.put_calls += 1;
        if let Some(message) = state.failure.clone() {
            return Err(StorageError::Unavailable(message));
        }
        state.objects.insert(
            key.to_string(),
            StoredObject {
                body,
                content_type: content_type.to_string(),
            },
        );
        Ok(())
    }

    fn public_url(&self, key: &str) -> String {
        format!("{}/{key}", self.base_url)
    }
}
