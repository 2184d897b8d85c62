//! Rate-limit aware message sending.

use std::sync::Arc;
use std::time::Duration;

use crate::error::Result;
use crate::models::RetryConfig;
use crate::services::Transport;

/// Longest exponent used for the fallback backoff.
const MAX_BACKOFF_EXPONENT: u32 = 10;

/// Retry policy for throttled sends.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts including the first one
    pub max_attempts: usize,
    /// Delay after the first throttled attempt when no hint is given
    pub base_delay: Duration,
    /// Longest single wait, server hints included
    pub max_delay: Duration,
}

impl RetryPolicy {
    pub fn from_config(config: &RetryConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            base_delay: Duration::from_millis(config.base_delay_ms),
            max_delay: Duration::from_millis(config.max_delay_ms),
        }
    }

    /// Delay before retrying after the `attempt`-th (1-based) throttled try.
    ///
    /// A server hint wins; otherwise `base * 2^(attempt - 1)`. Either way the
    /// result is capped at `max_delay`.
    pub fn delay_for(&self, attempt: usize, hint: Option<Duration>) -> Duration {
        let delay = hint.unwrap_or_else(|| {
            let exponent = (attempt.saturating_sub(1) as u32).min(MAX_BACKOFF_EXPONENT);
            self.base_delay.saturating_mul(2u32.pow(exponent))
        });
        delay.min(self.max_delay)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&RetryConfig::default())
    }
}

/// Wraps a [`Transport`] with retries for "too many requests" responses.
///
/// Any other failure is returned on the spot, untouched.
pub struct RateLimitedSender {
    transport: Arc<dyn Transport>,
    chat_id: String,
    policy: RetryPolicy,
}

impl RateLimitedSender {
    pub fn new(transport: Arc<dyn Transport>, chat_id: impl Into<String>, policy: RetryPolicy) -> Self {
        Self {
            transport,
            chat_id: chat_id.into(),
            policy,
        }
    }

    /// Send one message, retrying while throttled.
    pub async fn send(&self, text: &str) -> Result<()> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            let err = match self.transport.send_text(&self.chat_id, text).await {
                Ok(()) => return Ok(()),
                Err(err) => err,
            };

            if !err.is_rate_limited() || attempt >= self.policy.max_attempts {
                return Err(err);
            }

            let delay = self.policy.delay_for(attempt, err.retry_after());
            log::warn!(
                "Rate limited (attempt {}/{}), retrying in {:?}",
                attempt,
                self.policy.max_attempts,
                delay
            );
            tokio::time::sleep(delay).await;
        }
    }
}
