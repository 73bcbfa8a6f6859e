//! Shared protocol types for the streaming token-accounting core.
//!
//! These types cross crate boundaries: chat messages feed the token
//! estimator, usage records feed the metering sink, and the `usage` SSE
//! event is emitted to the ultimate client.

pub mod message;
pub mod usage;

pub use message::{ChatMessage, ChatRole};
pub use usage::{TokenCount, UsageEvent, UsageRecord};
