//! Outbound chat transport.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use reqwest::header::{HeaderMap, RETRY_AFTER};
use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};

/// Sends one text message to a chat.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Deliver `text` to `chat_id`. Rejections surface as
    /// [`AppError::Transport`] carrying the status and any wait hint.
    async fn send_text(&self, chat_id: &str, text: &str) -> Result<()>;
}

/// Telegram Bot API transport (`sendMessage`).
pub struct TelegramTransport {
    client: Client,
    endpoint: String,
}

impl TelegramTransport {
    pub fn new(client: Client, api_base: &str, bot_token: &str) -> Self {
        let endpoint = format!(
            "{}/bot{}/sendMessage",
            api_base.trim_end_matches('/'),
            bot_token.trim()
        );
        Self { client, endpoint }
    }
}

#[derive(Serialize)]
struct SendMessage<'a> {
    chat_id: &'a str,
    text: &'a str,
    disable_web_page_preview: bool,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    parameters: Option<ResponseParameters>,
}

#[derive(Debug, Deserialize)]
struct ResponseParameters {
    #[serde(default)]
    retry_after: Option<u64>,
}

#[async_trait]
impl Transport for TelegramTransport {
    async fn send_text(&self, chat_id: &str, text: &str) -> Result<()> {
        let request = SendMessage {
            chat_id,
            text,
            disable_web_page_preview: true,
        };
        // The endpoint embeds the bot token; keep it out of error messages.
        let response = self
            .client
            .post(&self.endpoint)
            .json(&request)
            .send()
            .await
            .map_err(|e| AppError::Http(e.without_url()))?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }

        let header_hint = retry_after_header(response.headers());
        let body = response.text().await.unwrap_or_default();
        Err(error_from_response(status.as_u16(), &body, header_hint))
    }
}

/// Parse a `Retry-After` header given in whole seconds.
fn retry_after_header(headers: &HeaderMap) -> Option<Duration> {
    headers
        .get(RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse::<u64>()
        .ok()
        .map(Duration::from_secs)
}

/// Build a transport error, preferring the body's `retry_after` hint.
fn error_from_response(status: u16, body: &str, header_hint: Option<Duration>) -> AppError {
    let parsed: Option<ApiError> = serde_json::from_str(body).ok();
    let body_hint = parsed
        .as_ref()
        .and_then(|p| p.parameters.as_ref())
        .and_then(|p| p.retry_after)
        .map(Duration::from_secs);
    let message = parsed
        .and_then(|p| p.description)
        .unwrap_or_else(|| body.trim().to_string());

    AppError::transport(status, message, body_hint.or(header_hint))
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::HeaderValue;

    #[test]
    fn test_endpoint_format() {
        let transport = TelegramTransport::new(Client::new(), "https://api.telegram.org/", "123:abc");
        assert_eq!(
            transport.endpoint,
            "https://api.telegram.org/bot123:abc/sendMessage"
        );
    }

    #[test]
    fn test_body_hint_preferred_over_header() {
        let body = r#"{"ok":false,"error_code":429,"description":"Too Many Requests: retry after 7","parameters":{"retry_after":7}}"#;
        let err = error_from_response(429, body, Some(Duration::from_secs(30)));

        assert!(err.is_rate_limited());
        assert_eq!(err.retry_after(), Some(Duration::from_secs(7)));
        assert!(err.to_string().contains("Too Many Requests"));
    }

    #[test]
    fn test_header_hint_fallback() {
        let err = error_from_response(429, "slow down", Some(Duration::from_secs(3)));
        assert_eq!(err.retry_after(), Some(Duration::from_secs(3)));
        assert!(err.to_string().contains("slow down"));
    }

    #[test]
    fn test_non_throttle_error() {
        let body = r#"{"ok":false,"error_code":400,"description":"Bad Request: chat not found"}"#;
        let err = error_from_response(400, body, None);
        assert!(!err.is_rate_limited());
        assert_eq!(err.retry_after(), None);
    }

    #[test]
    fn test_retry_after_header_parsing() {
        let mut headers = HeaderMap::new();
        assert_eq!(retry_after_header(&headers), None);

        headers.insert(RETRY_AFTER, HeaderValue::from_static("5"));
        assert_eq!(retry_after_header(&headers), Some(Duration::from_secs(5)));

        headers.insert(
            RETRY_AFTER,
            HeaderValue::from_static("Wed, 21 Oct 2026 07:28:00 GMT"),
        );
        assert_eq!(retry_after_header(&headers), None);
    }
}
