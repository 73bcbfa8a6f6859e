//! The token-tracking stream decorator.

use std::{io, sync::Arc};

use bytes::Bytes;
use futures_util::{Stream, StreamExt};
use memchr::memmem;
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tracing::{debug, error};

use chat_protocol::{UsageEvent, UsageRecord};
use token_estimator::StreamingTokenTracker;

use crate::{
    context::StreamContext,
    extract::extract_delta_from_data,
    sink::UsageSink,
    sse::{SseParser, DONE_FRAME},
};

const DONE_NEEDLE: &[u8] = b"data: [DONE]";

/// Wrap a raw provider SSE byte stream with token accounting.
///
/// Every upstream chunk is forwarded byte-identical and immediately; the
/// upstream `[DONE]` terminator is the one exception — it is withheld so
/// the synthetic usage event can be inserted ahead of it. After the
/// upstream is exhausted the output carries exactly one
/// `data: {"type":"usage",...}` frame (unless the context is exempt)
/// followed by `data: [DONE]\n\n`, then closes.
///
/// Upstream errors propagate on the output's error channel and abandon
/// accounting. Consumer disconnects stop forwarding and skip the sink.
pub fn wrap_stream<S, E>(
    upstream: S,
    ctx: StreamContext,
    sink: Arc<dyn UsageSink>,
) -> UnboundedReceiverStream<Result<Bytes, io::Error>>
where
    S: Stream<Item = Result<Bytes, E>> + Send + 'static,
    E: std::fmt::Display + Send + 'static,
{
    let (tx, rx) = mpsc::unbounded_channel();
    tokio::spawn(forward(upstream, ctx, sink, tx));
    UnboundedReceiverStream::new(rx)
}

async fn forward<S, E>(
    upstream: S,
    ctx: StreamContext,
    sink: Arc<dyn UsageSink>,
    tx: mpsc::UnboundedSender<Result<Bytes, io::Error>>,
) where
    S: Stream<Item = Result<Bytes, E>> + Send + 'static,
    E: std::fmt::Display + Send + 'static,
{
    futures_util::pin_mut!(upstream);

    let mut tracker = StreamingTokenTracker::new(&ctx.messages, &ctx.model);
    let mut tap = SseParser::new();

    while let Some(chunk_result) = upstream.next().await {
        let chunk = match chunk_result {
            Ok(chunk) => chunk,
            Err(e) => {
                error!(
                    conversation_id = %ctx.conversation_id,
                    message_id = %ctx.message_id,
                    "upstream stream error: {}", e
                );
                let _ = tx.send(Err(io::Error::other(e.to_string())));
                // Accounting abandoned; the owning caller marks the
                // stream state as errored.
                return;
            }
        };

        let done_at = memmem::find(&chunk, DONE_NEEDLE);

        // Pass-through. Bytes ahead of the terminator are forwarded
        // unchanged; the terminator itself is withheld and re-emitted
        // after the usage event.
        let forwarded = match done_at {
            Some(pos) => chunk.slice(..pos),
            None => chunk.clone(),
        };
        if !forwarded.is_empty() && tx.send(Ok(forwarded)).is_err() {
            // Consumer went away mid-stream; accounting is moot.
            return;
        }

        // Accounting tap. Lossy decode plus best-effort extraction:
        // nothing on this path may disturb the pass-through.
        for message in tap.parse(&String::from_utf8_lossy(&chunk)) {
            if let Some(data) = message.data {
                if let Some(delta) = extract_delta_from_data(&data) {
                    tracker.add_chunk(&delta);
                }
            }
        }

        if done_at.is_some() {
            break;
        }
    }

    finish(&ctx, &tracker, &sink, &tx);
}

/// Terminal framing: runs exactly once, after the last upstream chunk.
fn finish(
    ctx: &StreamContext,
    tracker: &StreamingTokenTracker,
    sink: &Arc<dyn UsageSink>,
    tx: &mpsc::UnboundedSender<Result<Bytes, io::Error>>,
) {
    if !ctx.exempt {
        let count = tracker.token_count();
        debug!(
            conversation_id = %ctx.conversation_id,
            message_id = %ctx.message_id,
            model = %ctx.model,
            input_tokens = count.input_tokens,
            output_tokens = count.output_tokens,
            "stream complete, recording usage"
        );

        let record = UsageRecord {
            user_id: ctx.user_id.clone(),
            conversation_id: ctx.conversation_id.clone(),
            message_id: ctx.message_id.clone(),
            model: ctx.model.clone(),
            input_tokens: count.input_tokens,
            output_tokens: count.output_tokens,
            cached: false,
        };

        // Fire-and-forget: the hot path never waits on persistence, and
        // a metering fault never reaches the client.
        let sink = Arc::clone(sink);
        tokio::spawn(async move {
            if let Err(e) = sink.record_usage(record).await {
                error!("failed to record token usage: {}", e);
            }
        });

        match serde_json::to_string(&UsageEvent::new(count)) {
            Ok(json) => {
                let _ = tx.send(Ok(Bytes::from(format!("data: {json}\n\n"))));
            }
            Err(e) => error!("failed to serialize usage event: {}", e),
        }
    } else {
        debug!(
            conversation_id = %ctx.conversation_id,
            model = %ctx.model,
            "exempt model, skipping usage accounting"
        );
    }

    let _ = tx.send(Ok(Bytes::from(DONE_FRAME)));
}
