//! Feed topic configuration.

use serde::{Deserialize, Serialize};

/// A named feed to poll. The topic name doubles as its storage key.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Topic {
    /// Display name and storage key
    pub topic: String,

    /// Page 1 URL of the feed
    pub url: String,

    /// Number of pages to scan; falls back to `default_pages`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pages: Option<usize>,

    /// Disabled topics are skipped by the orchestrator
    #[serde(default)]
    pub disabled: bool,
}

impl Topic {
    pub fn new(topic: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            topic: topic.into(),
            url: url.into(),
            pages: None,
            disabled: false,
        }
    }

    pub fn with_pages(mut self, pages: usize) -> Self {
        self.pages = Some(pages);
        self
    }

    /// Page budget for this topic, never less than one.
    pub fn pages_to_scan(&self, default_pages: usize) -> usize {
        self.pages.unwrap_or(default_pages).max(1)
    }
}
