//! Synchronous key-value storage port.
//!
//! The manager only needs get/set/remove over string keys with JSON string
//! values, plus key enumeration. Implementations are expected to be
//! infallible from the caller's perspective: a backend that can fail
//! should log and degrade (missing reads, dropped writes) rather than
//! surface errors into the stream path.

use std::sync::Arc;

use dashmap::DashMap;

/// Storage port backing the stream-state store.
pub trait StateStorage: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&self, key: &str, value: String);
    fn remove(&self, key: &str);
    /// All stored keys, in no particular order.
    fn keys(&self) -> Vec<String>;
}

/// In-memory storage, used in tests and as a default for ephemeral
/// contexts.
#[derive(Debug, Default, Clone)]
pub struct MemoryStorage {
    entries: Arc<DashMap<String, String>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl StateStorage for MemoryStorage {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.get(key).map(|v| v.value().clone())
    }

    fn set(&self, key: &str, value: String) {
        self.entries.insert(key.to_string(), value);
    }

    fn remove(&self, key: &str) {
        self.entries.remove(key);
    }

    fn keys(&self) -> Vec<String> {
        self.entries.iter().map(|e| e.key().clone()).collect()
    }
}
