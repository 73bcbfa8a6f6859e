//! Provider-reported usage extraction.
//!
//! Some upstreams attach their own measured token counts to a response.
//! When present, those are preferred over the heuristic estimate. Shapes
//! are provider-specific; unknown providers and malformed payloads yield
//! `None` rather than an error — this is a best-effort side channel.

use serde_json::Value;

use chat_protocol::TokenCount;

/// Extract a provider's own usage object from a response body, if the
/// provider and shape are recognized.
///
/// The returned count always satisfies `total = input + output`, even
/// where the provider reports its own (occasionally inconsistent) total.
pub fn parse_reported_usage(response: &Value, provider: &str) -> Option<TokenCount> {
    let usage = response.get("usage")?;

    match provider {
        "openai" => Some(TokenCount::new(
            usage.get("prompt_tokens").and_then(Value::as_u64).unwrap_or(0),
            usage
                .get("completion_tokens")
                .and_then(Value::as_u64)
                .unwrap_or(0),
        )),
        "anthropic" => Some(TokenCount::new(
            usage.get("input_tokens").and_then(Value::as_u64).unwrap_or(0),
            usage.get("output_tokens").and_then(Value::as_u64).unwrap_or(0),
        )),
        _ => None,
    }
}
