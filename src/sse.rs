//! Incremental server-sent-events parsing.
//!
//! The accounting tap sees arbitrary byte chunks, so frames regularly
//! straddle chunk boundaries. [`SseParser`] carries the unterminated
//! tail between calls and only yields events once their blank-line
//! terminator has arrived.

/// The literal terminator frame.
pub const DONE_FRAME: &str = "data: [DONE]\n\n";
/// Sentinel payload marking the end of a stream.
pub const DONE_SENTINEL: &str = "[DONE]";

/// One parsed SSE event.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SseMessage {
    pub id: Option<String>,
    pub event: Option<String>,
    pub data: Option<String>,
    pub retry: Option<u64>,
}

/// Carry-buffered SSE event parser.
#[derive(Debug, Default)]
pub struct SseParser {
    buffer: String,
}

impl SseParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a chunk of text; returns every event completed by it. Only
    /// events carrying a `data` field are yielded.
    pub fn parse(&mut self, chunk: &str) -> Vec<SseMessage> {
        self.buffer.push_str(chunk);

        let mut messages = Vec::new();
        while let Some(pos) = self.buffer.find("\n\n") {
            let event_text: String = self.buffer.drain(..pos + 2).collect();
            let message = Self::parse_event(event_text.trim_end_matches('\n'));
            if message.data.is_some() {
                messages.push(message);
            }
        }
        messages
    }

    /// Drop any buffered partial event.
    pub fn reset(&mut self) {
        self.buffer.clear();
    }

    fn parse_event(text: &str) -> SseMessage {
        let mut message = SseMessage::default();

        for line in text.lines() {
            if let Some(rest) = line.strip_prefix("data:") {
                let data = rest.trim();
                message.data = Some(match message.data.take() {
                    // Multi-line data joins with newlines.
                    Some(existing) => format!("{existing}\n{data}"),
                    None => data.to_string(),
                });
            } else if let Some(rest) = line.strip_prefix("id:") {
                message.id = Some(rest.trim().to_string());
            } else if let Some(rest) = line.strip_prefix("event:") {
                message.event = Some(rest.trim().to_string());
            } else if let Some(rest) = line.strip_prefix("retry:") {
                message.retry = rest.trim().parse().ok();
            }
        }

        message
    }
}
