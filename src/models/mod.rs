// src/models/mod.rs

//! Domain models for the watcher.

mod config;
mod entry;
mod selectors;
mod topic;

// Re-export all public types
pub use config::{
    Config, CrawlerConfig, NotifyConfig, RetryConfig, StorageConfig, TelegramConfig,
    TelegramCredentials,
};
pub use entry::{Entry, EntryId};
pub use selectors::ListingSelectors;
pub use topic::Topic;
