//! Storage abstractions for per-topic identifier sets.
//!
//! Each topic owns one persisted value: a JSON array of strings holding the
//! identifiers seen so far (or, for state written by older releases, full
//! links).
//!
//! ## Directory Structure
//!
//! ```text
//! state/
//! ├── cars.json         # ["ABC123", "XYZ789", ...]
//! └── boats.json
//! ```

pub mod local;
pub mod marker;
pub mod memory;

use async_trait::async_trait;

use crate::error::Result;

// Re-export for convenience
pub use local::LocalStorage;
pub use marker::MarkerFile;
pub use memory::MemoryStorage;

/// Key-value store for topic identifier sets.
#[async_trait]
pub trait IdStore: Send + Sync {
    /// Load the values stored under `key`.
    ///
    /// `Ok(None)` means nothing was ever stored, which callers treat
    /// differently from a stored empty array.
    async fn load(&self, key: &str) -> Result<Option<Vec<String>>>;

    /// Replace the values stored under `key`.
    async fn save(&self, key: &str, values: &[String]) -> Result<()>;
}
