//! End-to-end tests for the token-tracking stream wrapper.

use std::{io, sync::Arc, time::Duration};

use async_trait::async_trait;
use bytes::Bytes;
use futures_util::{stream, StreamExt};
use tokio::sync::mpsc;

use stream_meter::{
    estimate_conversation_tokens, estimate_tokens, wrap_stream, ChatMessage, NoopUsageSink,
    SinkError, StreamContext, UsageRecord, UsageSink,
};

/// Sink that forwards every record to a channel for inspection.
struct RecordingSink {
    tx: mpsc::UnboundedSender<UsageRecord>,
}

#[async_trait]
impl UsageSink for RecordingSink {
    async fn record_usage(&self, record: UsageRecord) -> Result<(), SinkError> {
        let _ = self.tx.send(record);
        Ok(())
    }
}

/// Sink that always fails, to prove metering faults stay off the stream.
struct FailingSink;

#[async_trait]
impl UsageSink for FailingSink {
    async fn record_usage(&self, _record: UsageRecord) -> Result<(), SinkError> {
        Err(SinkError::Unreachable("metering db down".into()))
    }
}

fn ctx() -> StreamContext {
    StreamContext::new(
        "user_1",
        "conv_1",
        "msg_1",
        "gpt-4.1",
        vec![ChatMessage::user("Hi")],
    )
}

fn upstream_of(frames: &[&str]) -> impl futures_util::Stream<Item = Result<Bytes, io::Error>> {
    let owned: Vec<Result<Bytes, io::Error>> = frames
        .iter()
        .map(|f| Ok(Bytes::from(f.to_string())))
        .collect();
    stream::iter(owned)
}

async fn collect(
    output: impl futures_util::Stream<Item = Result<Bytes, io::Error>>,
) -> Vec<Result<Bytes, io::Error>> {
    output.collect().await
}

fn parse_usage_frame(frame: &Bytes) -> serde_json::Value {
    let text = std::str::from_utf8(frame).unwrap();
    let payload = text
        .strip_prefix("data: ")
        .and_then(|t| t.strip_suffix("\n\n"))
        .unwrap();
    serde_json::from_str(payload).unwrap()
}

#[tokio::test]
async fn test_pass_through_and_terminal_framing() {
    let frames = [
        "data: {\"content\":\"Hello\"}\n\n",
        "data: {\"content\":\" wor\"}\n\n",
        "data: {\"choices\":[{\"delta\":{\"content\":\"ld!\"}}]}\n\n",
        "data: [DONE]\n\n",
    ];
    let (tx, mut rx) = mpsc::unbounded_channel();
    let output = wrap_stream(upstream_of(&frames), ctx(), Arc::new(RecordingSink { tx }));

    let collected = collect(output).await;
    assert_eq!(collected.len(), 5, "3 content + usage + [DONE]");

    // Content frames are byte-identical to the input.
    for (frame, expected) in collected.iter().take(3).zip(frames.iter()) {
        assert_eq!(frame.as_ref().unwrap(), expected.as_bytes());
    }

    // The usage frame carries the estimator's counts.
    let usage = parse_usage_frame(collected[3].as_ref().unwrap());
    let input = estimate_conversation_tokens(&[ChatMessage::user("Hi")], "gpt-4.1");
    let output_tokens = estimate_tokens("Hello world!", "gpt-4.1");
    assert_eq!(usage["type"], "usage");
    assert_eq!(usage["usage"]["inputTokens"], input);
    assert_eq!(usage["usage"]["outputTokens"], output_tokens);
    assert_eq!(usage["usage"]["totalTokens"], input + output_tokens);

    assert_eq!(
        collected[4].as_ref().unwrap(),
        "data: [DONE]\n\n".as_bytes()
    );

    // The sink saw the same counts, exactly once.
    let record = tokio::time::timeout(Duration::from_secs(1), rx.recv())
        .await
        .expect("sink called")
        .unwrap();
    assert_eq!(record.user_id, "user_1");
    assert_eq!(record.input_tokens, input);
    assert_eq!(record.output_tokens, output_tokens);
    assert!(!record.cached);
    assert!(rx.try_recv().is_err(), "sink invoked at most once");
}

#[tokio::test]
async fn test_exempt_model_skips_accounting() {
    let frames = [
        "data: {\"content\":\"local\"}\n\n",
        "data: {\"content\":\" output\"}\n\n",
        "data: {\"content\":\"!\"}\n\n",
        "data: [DONE]\n\n",
    ];
    let (tx, mut rx) = mpsc::unbounded_channel();
    let output = wrap_stream(
        upstream_of(&frames),
        ctx().exempt(),
        Arc::new(RecordingSink { tx }),
    );

    let collected = collect(output).await;
    // No usage frame: 3 content + [DONE].
    assert_eq!(collected.len(), 4);
    assert_eq!(
        collected[3].as_ref().unwrap(),
        "data: [DONE]\n\n".as_bytes()
    );
    assert!(rx.try_recv().is_err(), "sink never called for exempt model");
}

#[tokio::test]
async fn test_upstream_error_propagates_and_skips_sink() {
    let frames: Vec<Result<Bytes, io::Error>> = vec![
        Ok(Bytes::from_static(b"data: {\"content\":\"partial\"}\n\n")),
        Err(io::Error::other("connection reset")),
    ];
    let (tx, mut rx) = mpsc::unbounded_channel();
    let output = wrap_stream(stream::iter(frames), ctx(), Arc::new(RecordingSink { tx }));

    let collected = collect(output).await;
    assert_eq!(collected.len(), 2);
    assert!(collected[0].is_ok());
    let err = collected[1].as_ref().unwrap_err();
    assert!(err.to_string().contains("connection reset"));

    // No usage frame, no [DONE], no sink call.
    assert!(rx.try_recv().is_err());
}

#[tokio::test]
async fn test_malformed_frame_passes_through_unharmed() {
    let frames = [
        "data: {\"content\":\"ok\"}\n\n",
        "data: {this is not json\n\n",
        "data: {\"content\":\"fine\"}\n\n",
        "data: [DONE]\n\n",
    ];
    let (tx, mut rx) = mpsc::unbounded_channel();
    let output = wrap_stream(upstream_of(&frames), ctx(), Arc::new(RecordingSink { tx }));

    let collected = collect(output).await;
    assert_eq!(collected.len(), 5);
    // The malformed frame is forwarded byte-identical.
    assert_eq!(collected[1].as_ref().unwrap(), frames[1].as_bytes());

    // Accounting counted only the parseable frames.
    let record = tokio::time::timeout(Duration::from_secs(1), rx.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(
        record.output_tokens,
        estimate_tokens("okfine", "gpt-4.1")
    );
}

#[tokio::test]
async fn test_upstream_end_without_done_still_finalizes() {
    let frames = [
        "data: {\"content\":\"Hello\"}\n\n",
        "data: {\"content\":\" world\"}\n\n",
    ];
    let output = wrap_stream(upstream_of(&frames), ctx(), Arc::new(NoopUsageSink));

    let collected = collect(output).await;
    // 2 content + usage + synthesized [DONE].
    assert_eq!(collected.len(), 4);
    let usage = parse_usage_frame(collected[2].as_ref().unwrap());
    assert_eq!(usage["type"], "usage");
    assert_eq!(
        collected[3].as_ref().unwrap(),
        "data: [DONE]\n\n".as_bytes()
    );
}

#[tokio::test]
async fn test_done_withheld_when_sharing_a_chunk() {
    let frames = ["data: {\"content\":\"x\"}\n\ndata: [DONE]\n\n"];
    let output = wrap_stream(upstream_of(&frames), ctx(), Arc::new(NoopUsageSink));

    let collected = collect(output).await;
    assert_eq!(collected.len(), 3);
    assert_eq!(
        collected[0].as_ref().unwrap(),
        "data: {\"content\":\"x\"}\n\n".as_bytes()
    );
    let usage = parse_usage_frame(collected[1].as_ref().unwrap());
    assert_eq!(usage["type"], "usage");
    assert_eq!(
        collected[2].as_ref().unwrap(),
        "data: [DONE]\n\n".as_bytes()
    );
}

#[tokio::test]
async fn test_sink_failure_never_reaches_the_client() {
    let frames = ["data: {\"content\":\"hi\"}\n\n", "data: [DONE]\n\n"];
    let output = wrap_stream(upstream_of(&frames), ctx(), Arc::new(FailingSink));

    let collected = collect(output).await;
    assert_eq!(collected.len(), 3);
    assert!(collected.iter().all(Result::is_ok));
    let usage = parse_usage_frame(collected[1].as_ref().unwrap());
    assert_eq!(usage["type"], "usage");
}

#[tokio::test]
async fn test_delta_split_across_chunk_boundary_is_counted_once() {
    // One SSE frame delivered in two byte chunks: the tap must stitch it
    // back together and count its delta exactly once.
    let frames = [
        "data: {\"content\":",
        "\"Hello\"}\n\n",
        "data: [DONE]\n\n",
    ];
    let (tx, mut rx) = mpsc::unbounded_channel();
    let output = wrap_stream(upstream_of(&frames), ctx(), Arc::new(RecordingSink { tx }));

    let collected = collect(output).await;
    // 2 partial chunks + usage + [DONE].
    assert_eq!(collected.len(), 4);

    let record = tokio::time::timeout(Duration::from_secs(1), rx.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(record.output_tokens, estimate_tokens("Hello", "gpt-4.1"));
}
