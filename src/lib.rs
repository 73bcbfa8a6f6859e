//! Token-accounting SSE stream wrapper.
//!
//! Decorates a raw provider byte stream of server-sent events: bytes pass
//! through to the consumer unchanged while an accounting tap estimates
//! token usage from the content deltas. When the upstream finishes, the
//! final count is handed to the [`UsageSink`](sink::UsageSink)
//! (fire-and-forget) and a synthetic `usage` event is appended ahead of
//! the closing `[DONE]` frame.
//!
//! The accounting path is strictly best-effort: malformed frames, sink
//! failures, and decode errors never disturb the pass-through. Upstream
//! errors, by contrast, always propagate — truncating a visible response
//! silently would be worse than surfacing the failure.

pub mod context;
pub mod extract;
pub mod sink;
pub mod sse;
pub mod wrapper;

pub use context::StreamContext;
pub use sink::{NoopUsageSink, SinkError, UsageSink};
pub use sse::{SseMessage, SseParser};
pub use wrapper::wrap_stream;

pub use chat_protocol::{ChatMessage, ChatRole, TokenCount, UsageEvent, UsageRecord};
pub use stream_state::{
    MemoryStorage, RecoveryController, RecoveryPrompt, StateStorage, StreamState,
    StreamStateManager,
};
pub use token_estimator::{
    estimate_conversation_tokens, estimate_tokens, StreamingTokenTracker,
};
