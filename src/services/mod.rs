//! Service layer for the watcher.
//!
//! This module contains the collaborators around the pipeline:
//! - Listing page fetch and extraction (`HttpPageSource`)
//! - Chat delivery (`TelegramTransport`)
//! - Throttle-aware sending (`RateLimitedSender`)

mod listing;
mod sender;
mod transport;

pub use listing::{
    CompiledSelectors, HttpPageSource, Page, PageSource, extract_page, interpret_response,
    is_blocked,
};
pub use sender::{RateLimitedSender, RetryPolicy};
pub use transport::{TelegramTransport, Transport};
