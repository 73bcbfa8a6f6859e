//! The durable record of one in-flight or recently-broken generation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use chat_protocol::ChatMessage;

/// State of a single streaming generation, keyed by `stream_id`.
///
/// Persisted as camelCase JSON so records written by the chat client
/// remain readable. A state with either `error` or `abort_reason` set is
/// "settled": it no longer counts as incomplete, but the record is kept
/// until expiry or explicit removal so the failure stays inspectable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamState {
    pub stream_id: String,
    pub conversation_id: String,
    pub message_id: String,
    /// Provider/model identifier; selects the tokenizer multiplier on resume.
    pub model: String,
    /// Set at creation, immutable afterwards.
    pub started_at: DateTime<Utc>,
    /// Stamped on every save; drives staleness expiry and progress.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_chunk_at: Option<DateTime<Utc>>,
    /// Output tokens observed so far.
    pub tokens_generated: u64,
    /// Model-declared output budget, when known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_tokens: Option<u64>,
    /// Conversation at stream start; the input-token baseline is
    /// recomputed from this on resume.
    pub messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub abort_reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Free-form extension bag, opaque to this crate.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
}

impl StreamState {
    pub fn new(
        stream_id: impl Into<String>,
        conversation_id: impl Into<String>,
        message_id: impl Into<String>,
        model: impl Into<String>,
        messages: Vec<ChatMessage>,
    ) -> Self {
        Self {
            stream_id: stream_id.into(),
            conversation_id: conversation_id.into(),
            message_id: message_id.into(),
            model: model.into(),
            started_at: Utc::now(),
            last_chunk_at: None,
            tokens_generated: 0,
            total_tokens: None,
            messages,
            abort_reason: None,
            error: None,
            metadata: None,
        }
    }

    /// A settled stream reached a terminal failure marker and is excluded
    /// from incomplete listings.
    pub fn is_settled(&self) -> bool {
        self.error.is_some() || self.abort_reason.is_some()
    }

    /// Most recent activity timestamp, falling back to creation time.
    pub fn last_update(&self) -> DateTime<Utc> {
        self.last_chunk_at.unwrap_or(self.started_at)
    }
}
