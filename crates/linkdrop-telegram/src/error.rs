//! Telegram adapter errors.

use std::time::Duration;

use linkdrop_core::ChatError;
use thiserror::Error;

/// Errors from the Bot API client.
#[derive(Debug, Error)]
pub enum TelegramError {
    /// The request failed before a response arrived.
    #[error("HTTP request failed: {0}")]
    Http(#[source] reqwest::Error),

    /// Telegram answered `ok: false`.
    #[error("Telegram API error {code}: {description}")]
    Api { code: i64, description: String },

    /// Flood control (HTTP 429 with `retry_after`).
    #[error("Too many requests, retry after {0:?}")]
    RetryAfter(Duration),

    /// The response body was not the expected JSON.
    #[error("Invalid response: {0}")]
    Decode(String),

    /// Reading a file to upload failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<reqwest::Error> for TelegramError {
    fn from(err: reqwest::Error) -> Self {
        // The request URL embeds the bot token
        Self::Http(err.without_url())
    }
}

impl TelegramError {
    /// Whether Telegram refused an edit because the text is unchanged.
    pub fn is_not_modified(&self) -> bool {
        matches!(self, Self::Api { description, .. } if description.contains("message is not modified"))
    }
}

impl From<TelegramError> for ChatError {
    fn from(err: TelegramError) -> Self {
        match err {
            TelegramError::RetryAfter(d) => Self::RetryAfter(d),
            TelegramError::Api { .. } | TelegramError::Decode(_) => Self::Api(err.to_string()),
            TelegramError::Http(e) => Self::Network(e.to_string()),
            TelegramError::Io(e) => Self::Io(e.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, TelegramError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_maps_to_chat_error() {
        let err: ChatError = TelegramError::RetryAfter(Duration::from_secs(3)).into();
        assert_eq!(err, ChatError::RetryAfter(Duration::from_secs(3)));

        let err: ChatError = TelegramError::Api {
            code: 400,
            description: "Bad Request: chat not found".into(),
        }
        .into();
        assert!(matches!(err, ChatError::Api(msg) if msg.contains("chat not found")));
    }

    #[test]
    fn test_not_modified_detection() {
        let err = TelegramError::Api {
            code: 400,
            description: "Bad Request: message is not modified: specified new message content and reply markup are exactly the same".into(),
        };
        assert!(err.is_not_modified());
        assert!(!TelegramError::Decode("x".into()).is_not_modified());
    }
}
