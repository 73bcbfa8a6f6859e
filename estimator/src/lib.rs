//! Heuristic token estimation for LLM usage accounting.
//!
//! Estimation is pure and offline: no tokenizer model is loaded and no
//! network call is made. The same arithmetic must run server-side (metering)
//! and client-side (progress display) and agree exactly, so everything here
//! is deterministic over `(text, model)`.

pub mod estimate;
pub mod reported;
pub mod tracker;

pub use estimate::{estimate_conversation_tokens, estimate_tokens};
pub use reported::parse_reported_usage;
pub use tracker::StreamingTokenTracker;
