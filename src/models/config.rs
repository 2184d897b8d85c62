//! Application configuration structures.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};
use crate::models::{ListingSelectors, Topic};
use crate::pipeline::batch::PART_SUFFIX_RESERVE;

/// Environment variable holding the Telegram bot token.
pub const ENV_BOT_TOKEN: &str = "TELEGRAM_BOT_TOKEN";
/// Environment variable holding the Telegram chat id.
pub const ENV_CHAT_ID: &str = "TELEGRAM_CHAT_ID";

/// Root application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Page budget for topics that do not set `pages`
    #[serde(default = "defaults::default_pages")]
    pub default_pages: usize,

    /// Whether a topic's first poll only records a baseline
    #[serde(default = "defaults::enabled")]
    pub bootstrap_if_empty: bool,

    /// Whether an existing but empty state file also counts as a first poll
    #[serde(default = "defaults::enabled")]
    pub bootstrap_on_empty_state: bool,

    /// HTTP and crawling behavior settings
    #[serde(default)]
    pub crawler: CrawlerConfig,

    /// Listing extraction selectors
    #[serde(default)]
    pub extract: ListingSelectors,

    /// Persisted state settings
    #[serde(default)]
    pub storage: StorageConfig,

    /// Message formatting settings
    #[serde(default)]
    pub notify: NotifyConfig,

    /// Rate-limit retry policy
    #[serde(default)]
    pub retry: RetryConfig,

    /// Chat transport settings
    #[serde(default)]
    pub telegram: TelegramConfig,

    /// Feeds to poll
    #[serde(default)]
    pub projects: Vec<Topic>,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Load configuration or return default if loading fails.
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        Self::load(&path).unwrap_or_else(|e| {
            log::warn!(
                "Config load failed from {:?}: {}. Using defaults.",
                path.as_ref(),
                e
            );
            Self::default()
        })
    }

    /// Topics that are not disabled.
    pub fn active_projects(&self) -> impl Iterator<Item = &Topic> {
        self.projects.iter().filter(|t| !t.disabled)
    }

    /// Validate configuration values for basic sanity.
    pub fn validate(&self) -> Result<()> {
        if self.crawler.user_agent.trim().is_empty() {
            return Err(AppError::validation("crawler.user_agent is empty"));
        }
        if self.crawler.timeout_secs == 0 {
            return Err(AppError::validation("crawler.timeout_secs must be > 0"));
        }
        if self.crawler.max_concurrent == 0 {
            return Err(AppError::validation("crawler.max_concurrent must be > 0"));
        }
        if self.default_pages == 0 {
            return Err(AppError::validation("default_pages must be > 0"));
        }
        if self.storage.retention_limit == 0 {
            return Err(AppError::validation("storage.retention_limit must be > 0"));
        }
        if self.notify.max_chars <= PART_SUFFIX_RESERVE * 2 {
            return Err(AppError::validation(format!(
                "notify.max_chars must be > {}",
                PART_SUFFIX_RESERVE * 2
            )));
        }
        if self.retry.max_attempts == 0 {
            return Err(AppError::validation("retry.max_attempts must be > 0"));
        }

        let mut seen = HashSet::new();
        for topic in &self.projects {
            if topic.topic.trim().is_empty() {
                return Err(AppError::validation("project with empty topic name"));
            }
            if !seen.insert(topic.topic.as_str()) {
                return Err(AppError::validation(format!(
                    "duplicate topic '{}'",
                    topic.topic
                )));
            }
            if url::Url::parse(&topic.url).is_err() {
                return Err(AppError::validation(format!(
                    "topic '{}' has invalid url '{}'",
                    topic.topic, topic.url
                )));
            }
            if topic.pages == Some(0) {
                return Err(AppError::validation(format!(
                    "topic '{}' must scan at least one page",
                    topic.topic
                )));
            }
        }
        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_pages: defaults::default_pages(),
            bootstrap_if_empty: true,
            bootstrap_on_empty_state: true,
            crawler: CrawlerConfig::default(),
            extract: ListingSelectors::default(),
            storage: StorageConfig::default(),
            notify: NotifyConfig::default(),
            retry: RetryConfig::default(),
            telegram: TelegramConfig::default(),
            projects: Vec::new(),
        }
    }
}

/// HTTP client and crawling behavior settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrawlerConfig {
    /// User-Agent header for HTTP requests
    #[serde(default = "defaults::user_agent")]
    pub user_agent: String,

    /// Accept-Language header for HTTP requests
    #[serde(default = "defaults::accept_language")]
    pub accept_language: String,

    /// Request timeout in seconds
    #[serde(default = "defaults::timeout")]
    pub timeout_secs: u64,

    /// Delay between page requests of one topic in milliseconds
    #[serde(default = "defaults::request_delay")]
    pub request_delay_ms: u64,

    /// Maximum topics polled at once
    #[serde(default = "defaults::max_concurrent")]
    pub max_concurrent: usize,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            user_agent: defaults::user_agent(),
            accept_language: defaults::accept_language(),
            timeout_secs: defaults::timeout(),
            request_delay_ms: defaults::request_delay(),
            max_concurrent: defaults::max_concurrent(),
        }
    }
}

/// Persisted state settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Directory holding one JSON file per topic
    #[serde(default = "defaults::storage_dir")]
    pub dir: PathBuf,

    /// Most recent identifiers kept per topic
    #[serde(default = "defaults::retention_limit")]
    pub retention_limit: usize,

    /// Zero-byte file created when any topic had new entries
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub marker_file: Option<PathBuf>,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            dir: defaults::storage_dir(),
            retention_limit: defaults::retention_limit(),
            marker_file: None,
        }
    }
}

/// Message formatting settings.
///
/// Templates support `{topic}` and `{count}`; the failure template also
/// supports `{error}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotifyConfig {
    /// Hard character budget of one message
    #[serde(default = "defaults::max_chars")]
    pub max_chars: usize,

    /// Send a message when a topic starts polling
    #[serde(default = "defaults::enabled")]
    pub announce_start: bool,

    #[serde(default = "defaults::start_template")]
    pub start_template: String,

    #[serde(default = "defaults::header_template")]
    pub header_template: String,

    #[serde(default = "defaults::empty_template")]
    pub empty_template: String,

    #[serde(default = "defaults::bootstrap_template")]
    pub bootstrap_template: String,

    #[serde(default = "defaults::failure_template")]
    pub failure_template: String,
}

impl NotifyConfig {
    /// Fill `{topic}` and `{count}` placeholders.
    pub fn render(template: &str, topic: &str, count: usize) -> String {
        template
            .replace("{topic}", topic)
            .replace("{count}", &count.to_string())
    }
}

impl Default for NotifyConfig {
    fn default() -> Self {
        Self {
            max_chars: defaults::max_chars(),
            announce_start: true,
            start_template: defaults::start_template(),
            header_template: defaults::header_template(),
            empty_template: defaults::empty_template(),
            bootstrap_template: defaults::bootstrap_template(),
            failure_template: defaults::failure_template(),
        }
    }
}

/// Retry policy for throttled sends.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Total attempts including the first one
    #[serde(default = "defaults::max_attempts")]
    pub max_attempts: usize,

    /// First backoff delay when the server sends no hint
    #[serde(default = "defaults::base_delay")]
    pub base_delay_ms: u64,

    /// Upper bound for any single wait, server hints included
    #[serde(default = "defaults::max_delay")]
    pub max_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: defaults::max_attempts(),
            base_delay_ms: defaults::base_delay(),
            max_delay_ms: defaults::max_delay(),
        }
    }
}

/// Telegram transport settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelegramConfig {
    /// Bot token; `TELEGRAM_BOT_TOKEN` takes precedence
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bot_token: Option<String>,

    /// Target chat; `TELEGRAM_CHAT_ID` takes precedence
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chat_id: Option<String>,

    /// Bot API base URL
    #[serde(default = "defaults::api_base")]
    pub api_base: String,
}

impl Default for TelegramConfig {
    fn default() -> Self {
        Self {
            bot_token: None,
            chat_id: None,
            api_base: defaults::api_base(),
        }
    }
}

/// Credentials resolved from the environment and configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TelegramCredentials {
    pub bot_token: String,
    pub chat_id: String,
}

impl TelegramConfig {
    /// Resolve credentials from the process environment, then the config.
    pub fn credentials(&self) -> Result<TelegramCredentials> {
        self.credentials_with(|key| std::env::var(key).ok())
    }

    /// Resolve credentials using the given environment lookup.
    pub fn credentials_with<F>(&self, lookup: F) -> Result<TelegramCredentials>
    where
        F: Fn(&str) -> Option<String>,
    {
        let pick = |key: &str, fallback: &Option<String>| {
            lookup(key)
                .filter(|v| !v.trim().is_empty())
                .or_else(|| fallback.clone().filter(|v| !v.trim().is_empty()))
        };

        let bot_token = pick(ENV_BOT_TOKEN, &self.bot_token).ok_or_else(|| {
            AppError::config(format!(
                "bot token missing: set {ENV_BOT_TOKEN} or telegram.bot_token"
            ))
        })?;
        let chat_id = pick(ENV_CHAT_ID, &self.chat_id).ok_or_else(|| {
            AppError::config(format!(
                "chat id missing: set {ENV_CHAT_ID} or telegram.chat_id"
            ))
        })?;

        Ok(TelegramCredentials { bot_token, chat_id })
    }
}

mod defaults {
    use std::path::PathBuf;

    pub fn enabled() -> bool {
        true
    }
    pub fn default_pages() -> usize {
        1
    }

    // Crawler defaults
    pub fn user_agent() -> String {
        "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) \
         Chrome/124.0 Safari/537.36"
            .into()
    }
    pub fn accept_language() -> String {
        "en-US,en;q=0.9".into()
    }
    pub fn timeout() -> u64 {
        30
    }
    pub fn request_delay() -> u64 {
        500
    }
    pub fn max_concurrent() -> usize {
        4
    }

    // Storage defaults
    pub fn storage_dir() -> PathBuf {
        PathBuf::from("state")
    }
    pub fn retention_limit() -> usize {
        5000
    }

    // Notify defaults
    pub fn max_chars() -> usize {
        3900
    }
    pub fn start_template() -> String {
        "Checking {topic}...".into()
    }
    pub fn header_template() -> String {
        "{topic}: {count} new".into()
    }
    pub fn empty_template() -> String {
        "{topic}: no new items".into()
    }
    pub fn bootstrap_template() -> String {
        "{topic}: baseline saved ({count} items), alerts start next run".into()
    }
    pub fn failure_template() -> String {
        "{topic}: check failed: {error}".into()
    }

    // Retry defaults
    pub fn max_attempts() -> usize {
        5
    }
    pub fn base_delay() -> u64 {
        1000
    }
    pub fn max_delay() -> u64 {
        60_000
    }

    pub fn api_base() -> String {
        "https://api.telegram.org".into()
    }
}
