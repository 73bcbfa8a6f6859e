//! Durable records of in-flight generations, and the policy for getting
//! an interrupted one back.
//!
//! Every streaming generation registers a [`StreamState`] keyed by stream
//! id. States are updated on each observed chunk, removed on graceful
//! completion, and left behind (with a terminal `error`/`abort_reason`
//! marker) when a stream breaks — which is exactly what lets the
//! [`RecoveryController`] surface an "incomplete response" and offer to
//! resume it.
//!
//! Storage is an injected synchronous key-value port so the store works
//! against whatever client-local persistence exists; the in-memory
//! implementation backs tests. This is a UX convenience layer, not a
//! billing source of truth: last-write-wins on save is acceptable.

pub mod config;
pub mod manager;
pub mod recovery;
pub mod state;
pub mod storage;

pub use config::{RecoveryConfig, StateStoreConfig};
pub use manager::StreamStateManager;
pub use recovery::{RecoveryController, RecoveryPrompt};
pub use state::StreamState;
pub use storage::{MemoryStorage, StateStorage};
