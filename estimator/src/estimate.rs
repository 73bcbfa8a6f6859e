//! Character-based token estimation.
//!
//! The base rate is Unicode scalar count times a per-model-family
//! multiplier (roughly 4 characters per token for GPT-family models,
//! 3.5 for Claude). Content that tokenizers are known to spend extra
//! tokens on — numbers, URLs, fenced code, punctuation — is charged an
//! additive surcharge on top of the base estimate.

use once_cell::sync::Lazy;
use regex::Regex;

use chat_protocol::ChatMessage;

/// Multiplier for models without a recognized family marker.
const DEFAULT_MULTIPLIER: f64 = 0.25;

/// Runs of consecutive digits.
static DIGIT_RUNS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d+").unwrap());
/// URL-like substrings.
static URLS: Lazy<Regex> = Lazy::new(|| Regex::new(r"https?://\S+").unwrap());
/// Fenced code blocks.
static CODE_BLOCKS: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)```.*?```").unwrap());
/// Punctuation and symbols (not word characters, not whitespace).
static PUNCTUATION: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^\w\s]").unwrap());

/// Per-model-family character-to-token multiplier. Matching is by
/// substring of the model identifier; unrecognized models fall back to
/// the GPT-family default.
fn model_multiplier(model: &str) -> f64 {
    if model.contains("claude") {
        0.285 // ~1 token per 3.5 chars
    } else if model.contains("gemini") {
        0.27
    } else if model.contains("deepseek") {
        0.26
    } else {
        DEFAULT_MULTIPLIER
    }
}

/// Estimate the token count of `text` for `model`.
///
/// Deterministic and pure; empty text is always 0 tokens. The result is
/// ceiling-rounded, so any non-empty text costs at least one token.
pub fn estimate_tokens(text: &str, model: &str) -> u64 {
    if text.is_empty() {
        return 0;
    }

    // Count Unicode scalars, not UTF-8 bytes or UTF-16 units.
    let char_count = text.chars().count() as f64;
    let mut tokens = (char_count * model_multiplier(model)).ceil();

    // Numbers typically split into more tokens than plain words.
    tokens += DIGIT_RUNS.find_iter(text).count() as f64 * 0.5;

    // URLs fragment heavily.
    tokens += URLS.find_iter(text).count() as f64 * 3.0;

    // Code blocks cost ~10% extra over their own length.
    for block in CODE_BLOCKS.find_iter(text) {
        tokens += block.as_str().chars().count() as f64 * 0.1;
    }

    // Punctuation and symbols.
    tokens += PUNCTUATION.find_iter(text).count() as f64 * 0.2;

    tokens.ceil() as u64
}

/// Estimate the token count of a full conversation for `model`.
///
/// Each message is charged one token for its role marker and two for the
/// inter-message separator, plus its content estimate. A per-request
/// overhead is added once: GPT-4-family chat framing costs more than the
/// baseline.
pub fn estimate_conversation_tokens(messages: &[ChatMessage], model: &str) -> u64 {
    let mut total: u64 = 0;

    for message in messages {
        total += 1; // role marker
        total += estimate_tokens(&message.content, model);
        total += 2; // separator
    }

    total + if model.contains("gpt-4") { 7 } else { 4 }
}
