//! Content-delta extraction from provider SSE payloads.
//!
//! Providers disagree on where the textual delta lives in their JSON.
//! Extraction is an ordered list of shape probes tried in sequence, so a
//! new provider shape is one more entry here, not a change to the
//! wrapper's loop.

use serde_json::Value;

use crate::sse::DONE_SENTINEL;

/// One shape probe: returns the textual delta if this payload matches.
pub type DeltaExtractor = fn(&Value) -> Option<&str>;

/// Flat `{"content": "..."}` payloads.
fn flat_content(value: &Value) -> Option<&str> {
    value.get("content")?.as_str()
}

/// OpenAI-style `{"choices":[{"delta":{"content":"..."}}]}` payloads.
fn choices_delta_content(value: &Value) -> Option<&str> {
    value
        .get("choices")?
        .get(0)?
        .get("delta")?
        .get("content")?
        .as_str()
}

/// Probes in precedence order.
pub const DELTA_EXTRACTORS: &[DeltaExtractor] = &[flat_content, choices_delta_content];

/// Extract the content delta from a parsed payload, if any probe matches.
pub fn extract_delta(value: &Value) -> Option<&str> {
    DELTA_EXTRACTORS.iter().find_map(|probe| probe(value))
}

/// Extract the content delta from a raw `data:` payload.
///
/// The `[DONE]` sentinel, unparseable JSON, and payloads without a
/// recognized shape all yield `None` — accounting is best-effort and a
/// bad frame must never become an error.
pub fn extract_delta_from_data(data: &str) -> Option<String> {
    if data.is_empty() || data == DONE_SENTINEL {
        return None;
    }
    let value: Value = serde_json::from_str(data).ok()?;
    extract_delta(&value).map(str::to_owned)
}
