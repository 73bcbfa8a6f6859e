//! Routing context for one wrapped stream.

use chat_protocol::ChatMessage;

/// Everything the wrapper needs to account for one generation.
#[derive(Debug, Clone)]
pub struct StreamContext {
    pub user_id: String,
    pub conversation_id: String,
    pub message_id: String,
    /// Provider/model identifier; selects the estimator multiplier.
    pub model: String,
    /// Conversation at request time; fixes the input-token baseline.
    pub messages: Vec<ChatMessage>,
    /// Local/free providers are exempt from accounting: no sink call and
    /// no usage event, but pass-through and terminal framing are kept.
    pub exempt: bool,
}

impl StreamContext {
    pub fn new(
        user_id: impl Into<String>,
        conversation_id: impl Into<String>,
        message_id: impl Into<String>,
        model: impl Into<String>,
        messages: Vec<ChatMessage>,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            conversation_id: conversation_id.into(),
            message_id: message_id.into(),
            model: model.into(),
            messages,
            exempt: false,
        }
    }

    pub fn exempt(mut self) -> Self {
        self.exempt = true;
        self
    }
}
