//! Token counts and usage-accounting records.

use serde::{Deserialize, Serialize};

/// A point-in-time token count for one generation.
///
/// `total_tokens` is always `input_tokens + output_tokens`; construct through
/// [`TokenCount::new`] to keep the invariant. Serialized with the camelCase
/// field names the chat client consumes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenCount {
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub total_tokens: u64,
}

impl TokenCount {
    pub fn new(input_tokens: u64, output_tokens: u64) -> Self {
        Self {
            input_tokens,
            output_tokens,
            total_tokens: input_tokens + output_tokens,
        }
    }
}

/// Finalized usage for one assistant message, handed to the metering sink.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageRecord {
    pub user_id: String,
    pub conversation_id: String,
    pub message_id: String,
    pub model: String,
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub cached: bool,
}

/// The synthetic SSE event appended to a completed stream, carrying the
/// final token count to the client.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UsageEvent {
    #[serde(rename = "type")]
    pub event_type: String,
    pub usage: TokenCount,
}

impl UsageEvent {
    pub fn new(usage: TokenCount) -> Self {
        Self {
            event_type: "usage".to_string(),
            usage,
        }
    }
}
