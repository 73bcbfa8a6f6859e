//! Usage metering boundary.

use async_trait::async_trait;
use thiserror::Error;

use chat_protocol::UsageRecord;

/// Errors a metering backend may surface. The wrapper catches and logs
/// these; they never reach the chat-content path.
#[derive(Debug, Error)]
pub enum SinkError {
    #[error("usage sink unreachable: {0}")]
    Unreachable(String),
    #[error("usage sink rejected record: {0}")]
    Rejected(String),
}

/// External collaborator that persists finalized token counts for
/// billing and rate limiting.
///
/// Invoked at most once per stream, fire-and-forget, only on normal
/// completion. Implementations should be safe under duplicate delivery;
/// idempotency is their concern, not the wrapper's.
#[async_trait]
pub trait UsageSink: Send + Sync {
    async fn record_usage(&self, record: UsageRecord) -> Result<(), SinkError>;
}

/// Sink that discards everything. Useful for tests and for deployments
/// without metering.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopUsageSink;

#[async_trait]
impl UsageSink for NoopUsageSink {
    async fn record_usage(&self, _record: UsageRecord) -> Result<(), SinkError> {
        Ok(())
    }
}
