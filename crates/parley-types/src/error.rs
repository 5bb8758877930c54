use thiserror::Error;

/// Errors surfaced by the Parley client.
///
/// REST failures are never retried automatically; callers convert them into
/// displayable text at the call site.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChatError {
    /// Non-success HTTP status or transport failure.
    #[error("network error: {message}")]
    Network {
        status: Option<u16>,
        message: String,
    },

    /// A required field was empty or malformed (checked before submission).
    #[error("validation error: {0}")]
    Validation(String),

    /// Missing or rejected credentials.
    #[error("not authenticated: {0}")]
    Auth(String),

    /// The real-time channel has no live connection.
    #[error("real-time channel is not connected")]
    NotConnected,

    /// A response or frame could not be decoded.
    #[error("decode error: {0}")]
    Decode(String),

    /// Local credential or config storage failed.
    #[error("storage error: {0}")]
    Storage(String),
}

impl ChatError {
    /// Build a network error from an optional HTTP status and a message.
    pub fn network(status: Option<u16>, message: impl Into<String>) -> Self {
        ChatError::Network {
            status,
            message: message.into(),
        }
    }

    /// Whether this error means the credentials were rejected.
    pub fn is_auth(&self) -> bool {
        matches!(self, ChatError::Auth(_))
    }

    /// Text suitable for showing to a user (toast/inline message).
    ///
    /// Never empty.
    pub fn user_message(&self) -> String {
        let text = match self {
            ChatError::Network { message, .. } => message.clone(),
            ChatError::Validation(msg) | ChatError::Auth(msg) => msg.clone(),
            ChatError::Decode(_) => "unexpected response from server".to_string(),
            ChatError::Storage(msg) => msg.clone(),
            ChatError::NotConnected => self.to_string(),
        };
        if text.trim().is_empty() {
            self.fallback_message().to_string()
        } else {
            text
        }
    }

    fn fallback_message(&self) -> &'static str {
        match self {
            ChatError::Network { .. } => "request failed",
            ChatError::Validation(_) => "invalid input",
            ChatError::Auth(_) => "not authenticated",
            ChatError::NotConnected => "not connected",
            ChatError::Decode(_) => "unexpected response from server",
            ChatError::Storage(_) => "local storage failed",
        }
    }
}
