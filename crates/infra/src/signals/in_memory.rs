use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::Instant;

use super::{SignalStore, SignalStoreError};

/// In-process signal store with lazy expiry.
///
/// Uses the tokio clock, so tests can drive expiry with a paused runtime.
#[derive(Debug, Default)]
pub struct InMemorySignalStore {
    entries: Mutex<HashMap<String, Entry>>,
}

#[derive(Debug)]
struct Entry {
    value: String,
    expires_at: Instant,
}

impl InMemorySignalStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn with_entries<T>(
        &self,
        f: impl FnOnce(&mut HashMap<String, Entry>) -> T,
    ) -> Result<T, SignalStoreError> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|_| SignalStoreError::Backend("lock poisoned".to_string()))?;
        let now = Instant::now();
        entries.retain(|_, e| e.expires_at > now);
        Ok(f(&mut entries))
    }
}

#[async_trait]
impl SignalStore for InMemorySignalStore {
    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), SignalStoreError> {
        let entry = Entry {
            value: value.to_string(),
            expires_at: Instant::now() + ttl,
        };
        self.with_entries(|entries| {
            entries.insert(key.to_string(), entry);
        })
    }

    async fn get(&self, key: &str) -> Result<Option<String>, SignalStoreError> {
        self.with_entries(|entries| entries.get(key).map(|e| e.value.clone()))
    }

    async fn take(&self, key: &str) -> Result<Option<String>, SignalStoreError> {
        self.with_entries(|entries| entries.remove(key).map(|e| e.value))
    }

    async fn delete(&self, key: &str) -> Result<(), SignalStoreError> {
        self.with_entries(|entries| {
            entries.remove(key);
        })
    }
}
