//! Polling pipeline.
//!
//! - `aggregate`: collect a topic's entries across pages
//! - `dedup`: classify entries against persisted identifiers
//! - `batch`: pack new entries into messages
//! - `run`: drive every topic through the steps above

pub mod aggregate;
pub mod batch;
pub mod dedup;
pub mod run;

pub use aggregate::PageAggregator;
pub use batch::{batch, batch_lines};
pub use dedup::{BootstrapPolicy, Classification, DedupStore, KnownIds};
pub use run::{Orchestrator, RunSummary, TopicReport};
