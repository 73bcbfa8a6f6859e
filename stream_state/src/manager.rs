//! Keyed store of in-flight stream records.

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, error, warn};
use uuid::Uuid;

use crate::{config::StateStoreConfig, state::StreamState, storage::StateStorage};

/// Key namespace for stream-state records in the storage port.
pub const STATE_KEY_PREFIX: &str = "chat_stream_states:";

/// Manages [`StreamState`] records over an injected storage port.
///
/// All operations are synchronous. Cleanup (expiry purge + capacity
/// eviction) runs on every save, so the store self-limits without an
/// external garbage collector. Corrupt records are treated as absent:
/// a deserialization failure must never take down the chat path.
pub struct StreamStateManager {
    storage: Arc<dyn StateStorage>,
    config: StateStoreConfig,
}

impl StreamStateManager {
    pub fn new(storage: Arc<dyn StateStorage>) -> Self {
        Self::with_config(storage, StateStoreConfig::default())
    }

    pub fn with_config(storage: Arc<dyn StateStorage>, config: StateStoreConfig) -> Self {
        Self { storage, config }
    }

    pub fn config(&self) -> &StateStoreConfig {
        &self.config
    }

    /// Fresh globally-unique stream id.
    pub fn create_stream_id() -> String {
        format!("stream_{}", Uuid::new_v4())
    }

    /// Upsert a state: stamps `last_chunk_at`, persists, then runs cleanup.
    pub fn save_stream_state(&self, state: &StreamState) {
        let mut state = state.clone();
        state.last_chunk_at = Some(Utc::now());

        match serde_json::to_string(&state) {
            Ok(json) => self.storage.set(&Self::key(&state.stream_id), json),
            Err(e) => {
                error!(stream_id = %state.stream_id, "failed to serialize stream state: {}", e);
                return;
            }
        }

        self.cleanup();
    }

    /// Fetch a state by id. Expired entries are purged on access and
    /// reported as absent.
    pub fn get_stream_state(&self, stream_id: &str) -> Option<StreamState> {
        let key = Self::key(stream_id);
        let state = self.load(&key)?;

        if self.is_expired(&state) {
            debug!(stream_id, "stream state expired, purging");
            self.storage.remove(&key);
            return None;
        }

        Some(state)
    }

    /// Delete a state unconditionally.
    pub fn remove_stream_state(&self, stream_id: &str) {
        self.storage.remove(&Self::key(stream_id));
    }

    /// All unsettled, unexpired states, optionally filtered to one
    /// conversation, most-recently-updated first.
    pub fn get_incomplete_streams(&self, conversation_id: Option<&str>) -> Vec<StreamState> {
        let mut states: Vec<StreamState> = self
            .load_all()
            .into_iter()
            .filter(|state| {
                if let Some(conv) = conversation_id {
                    if state.conversation_id != conv {
                        return false;
                    }
                }
                !state.is_settled()
            })
            .collect();

        states.sort_by(|a, b| b.last_update().cmp(&a.last_update()));
        states
    }

    /// Success path: the record is simply dropped. Calling this twice for
    /// the same id is a no-op the second time.
    pub fn mark_stream_complete(&self, stream_id: &str) {
        self.remove_stream_state(stream_id);
    }

    /// Record a terminal error. The entry is kept (now excluded from
    /// incomplete listings) until expiry or explicit removal.
    pub fn mark_stream_error(&self, stream_id: &str, message: impl Into<String>) {
        if let Some(mut state) = self.get_stream_state(stream_id) {
            state.error = Some(message.into());
            self.save_stream_state(&state);
        }
    }

    /// Record a terminal abort, keeping the entry like
    /// [`mark_stream_error`](Self::mark_stream_error).
    pub fn mark_stream_aborted(&self, stream_id: &str, reason: impl Into<String>) {
        if let Some(mut state) = self.get_stream_state(stream_id) {
            state.abort_reason = Some(reason.into());
            self.save_stream_state(&state);
        }
    }

    /// Completion fraction in `[0, 1]`.
    ///
    /// Determinate when a token budget is known. Otherwise a wall-clock
    /// heuristic at the configured generation rate, capped at 0.95 so an
    /// indeterminate stream never reports "done".
    pub fn estimate_progress(&self, state: &StreamState) -> f64 {
        if let Some(total) = state.total_tokens {
            if total > 0 {
                return (state.tokens_generated as f64 / total as f64).min(1.0);
            }
        }

        let elapsed_ms = (Utc::now() - state.started_at).num_milliseconds().max(0) as u64;
        let expected = elapsed_ms * self.config.tokens_per_second / 1000;
        // Pad the denominator so a stream that just started reads near zero.
        let floor = state.tokens_generated + 100;
        let ratio = state.tokens_generated as f64 / expected.max(floor) as f64;
        ratio.min(0.95)
    }

    fn key(stream_id: &str) -> String {
        format!("{STATE_KEY_PREFIX}{stream_id}")
    }

    fn is_expired(&self, state: &StreamState) -> bool {
        Utc::now() - state.last_update() > self.config.expiry()
    }

    /// Load one record, treating corrupt JSON as absent (fail-open).
    fn load(&self, key: &str) -> Option<StreamState> {
        let json = self.storage.get(key)?;
        match serde_json::from_str(&json) {
            Ok(state) => Some(state),
            Err(e) => {
                warn!(key, "dropping corrupt stream state record: {}", e);
                self.storage.remove(key);
                None
            }
        }
    }

    /// Load every record in the namespace, purging expired and corrupt
    /// entries on the way.
    fn load_all(&self) -> Vec<StreamState> {
        let mut states = Vec::new();
        for key in self.storage.keys() {
            if !key.starts_with(STATE_KEY_PREFIX) {
                continue;
            }
            let Some(state) = self.load(&key) else {
                continue;
            };
            if self.is_expired(&state) {
                debug!(key, "purging expired stream state");
                self.storage.remove(&key);
                continue;
            }
            states.push(state);
        }
        states
    }

    /// Expiry purge plus capacity eviction, oldest-first. Runs on every
    /// save.
    fn cleanup(&self) {
        let mut states = self.load_all();
        if states.len() <= self.config.max_states {
            return;
        }

        states.sort_by(|a, b| b.last_update().cmp(&a.last_update()));
        for evicted in &states[self.config.max_states..] {
            debug!(stream_id = %evicted.stream_id, "evicting stream state over capacity");
            self.storage.remove(&Self::key(&evicted.stream_id));
        }
    }
}
