// src/error.rs

//! Unified error handling for the watcher.

use std::fmt;
use std::time::Duration;

use thiserror::Error;

/// Result type alias for watcher operations.
pub type Result<T> = std::result::Result<T, AppError>;

/// HTTP status the chat API uses for throttling.
const TOO_MANY_REQUESTS: u16 = 429;

/// Unified application error type.
#[derive(Error, Debug)]
pub enum AppError {
    /// I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP request failed
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML parsing failed
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    /// URL parsing failed
    #[error("URL parse error: {0}")]
    Url(#[from] url::ParseError),

    /// CSS selector parsing failed
    #[error("Invalid selector '{selector}': {message}")]
    Selector { selector: String, message: String },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Data validation error
    #[error("Validation error: {0}")]
    Validation(String),

    /// The page looked like a bot-detection wall
    #[error("Blocked by bot detection at {url}")]
    Blocked { url: String },

    /// The page parsed but yielded no listing entries
    #[error("No items found at {url}")]
    EmptyPage { url: String },

    /// Fetching a page failed for any other reason
    #[error("Fetch error for {context}: {message}")]
    Fetch { context: String, message: String },

    /// The chat API rejected a message
    #[error("Transport error (status {status}): {message}")]
    Transport {
        status: u16,
        message: String,
        retry_after: Option<Duration>,
    },

    /// One or more topics failed during a run
    #[error("{} topic(s) failed: {}", failed.len(), failed.join(", "))]
    TopicsFailed { failed: Vec<String> },
}

impl AppError {
    /// Create a selector parsing error.
    pub fn selector(selector: impl Into<String>, message: impl fmt::Display) -> Self {
        Self::Selector {
            selector: selector.into(),
            message: message.to_string(),
        }
    }

    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Create a fetch error with context.
    pub fn fetch(context: impl Into<String>, message: impl fmt::Display) -> Self {
        Self::Fetch {
            context: context.into(),
            message: message.to_string(),
        }
    }

    /// Create a transport error.
    pub fn transport(
        status: u16,
        message: impl Into<String>,
        retry_after: Option<Duration>,
    ) -> Self {
        Self::Transport {
            status,
            message: message.into(),
            retry_after,
        }
    }

    /// Whether this is a "too many requests" response from the transport.
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, Self::Transport { status, .. } if *status == TOO_MANY_REQUESTS)
    }

    /// Server-supplied wait hint, if the transport sent one.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::Transport { retry_after, .. } => *retry_after,
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rate_limited_detection() {
        let throttled = AppError::transport(429, "Too Many Requests", None);
        let forbidden = AppError::transport(403, "Forbidden", None);

        assert!(throttled.is_rate_limited());
        assert!(!forbidden.is_rate_limited());
        assert!(!AppError::config("x").is_rate_limited());
    }

    #[test]
    fn test_retry_after_hint() {
        let err = AppError::transport(429, "slow down", Some(Duration::from_secs(2)));
        assert_eq!(err.retry_after(), Some(Duration::from_secs(2)));
        assert_eq!(AppError::validation("x").retry_after(), None);
    }

    #[test]
    fn test_topics_failed_message() {
        let err = AppError::TopicsFailed {
            failed: vec!["cars".into(), "bikes".into()],
        };
        assert_eq!(err.to_string(), "2 topic(s) failed: cars, bikes");
    }
}
