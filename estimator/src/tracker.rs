//! Streaming token accumulator for one in-flight generation.

use chat_protocol::{ChatMessage, TokenCount};

use crate::estimate::{estimate_conversation_tokens, estimate_tokens};

/// Tracks token usage while a completion streams.
///
/// The input-token baseline is computed once at construction and frozen.
/// Output chunks are appended raw; the output estimate is derived from the
/// full concatenation at read time rather than summing per-chunk estimates,
/// so chunk boundaries cannot double-count and the estimate is monotone in
/// the number of chunks added.
#[derive(Debug)]
pub struct StreamingTokenTracker {
    model: String,
    input_tokens: u64,
    output: String,
}

impl StreamingTokenTracker {
    pub fn new(messages: &[ChatMessage], model: impl Into<String>) -> Self {
        let model = model.into();
        let input_tokens = estimate_conversation_tokens(messages, &model);
        Self {
            model,
            input_tokens,
            output: String::new(),
        }
    }

    /// Append a textual delta from the stream. Cheap; no estimation runs
    /// until a usage read.
    pub fn add_chunk(&mut self, chunk: &str) {
        self.output.push_str(chunk);
    }

    /// Input-token baseline frozen at construction.
    pub fn input_tokens(&self) -> u64 {
        self.input_tokens
    }

    /// Current usage, safe to call mid-stream any number of times.
    pub fn current_usage(&self) -> TokenCount {
        TokenCount::new(self.input_tokens, estimate_tokens(&self.output, &self.model))
    }

    /// Authoritative final count once the stream has ended. Same
    /// computation as [`current_usage`](Self::current_usage); the distinct
    /// name marks final call sites.
    pub fn token_count(&self) -> TokenCount {
        self.current_usage()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_input_tokens_frozen_at_construction() {
        let messages = vec![ChatMessage::user("Hi")];
        let mut tracker = StreamingTokenTracker::new(&messages, "gpt-4.1");
        assert_eq!(tracker.input_tokens(), 11);

        tracker.add_chunk("lots of output text here");
        assert_eq!(tracker.input_tokens(), 11);
        assert_eq!(tracker.current_usage().input_tokens, 11);
    }

    #[test]
    fn test_output_estimated_from_concatenation() {
        let messages = vec![ChatMessage::user("Hi")];
        let mut tracker = StreamingTokenTracker::new(&messages, "gpt-4.1");

        tracker.add_chunk("Hello");
        let usage = tracker.current_usage();
        assert_eq!(usage.output_tokens, estimate_tokens("Hello", "gpt-4.1"));
        assert_eq!(usage.total_tokens, usage.input_tokens + usage.output_tokens);
    }

    #[test]
    fn test_output_monotone_in_chunks() {
        let mut tracker = StreamingTokenTracker::new(&[], "claude-sonnet-4");
        let mut previous = 0;
        for chunk in ["The ", "quick ", "brown ", "fox, ", "42 ", "times."] {
            tracker.add_chunk(chunk);
            let output = tracker.current_usage().output_tokens;
            assert!(output >= previous);
            previous = output;
        }
    }

    #[test]
    fn test_final_count_matches_current_usage() {
        let mut tracker = StreamingTokenTracker::new(&[ChatMessage::user("q")], "gpt-4o");
        tracker.add_chunk("answer text");
        assert_eq!(tracker.token_count(), tracker.current_usage());
    }

    #[test]
    fn test_no_chunks_means_zero_output() {
        let tracker = StreamingTokenTracker::new(&[ChatMessage::user("q")], "gpt-4o");
        assert_eq!(tracker.current_usage().output_tokens, 0);
    }
}
