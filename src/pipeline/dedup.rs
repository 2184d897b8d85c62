//! Per-topic change detection against the persisted identifier set.
//!
//! Each poll loads the topic's known identifiers, upgrades values written by
//! older releases (full links instead of identifiers), classifies the polled
//! entries as new or known, and writes the updated set back capped to the
//! retention limit.

use std::collections::HashSet;
use std::sync::Arc;

use crate::error::Result;
use crate::models::{Entry, EntryId};
use crate::storage::{IdStore, MarkerFile};
use crate::utils::url::{extract_entry_id, looks_like_url};

/// When a poll only records a baseline instead of reporting entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BootstrapPolicy {
    /// Every poll reports; missing state counts as zero known ids.
    Disabled,
    /// Only a topic with no stored state at all bootstraps.
    MissingOnly,
    /// Missing state and a stored empty set both bootstrap.
    MissingOrEmpty,
}

impl BootstrapPolicy {
    pub fn from_flags(bootstrap_if_empty: bool, on_empty_state: bool) -> Self {
        match (bootstrap_if_empty, on_empty_state) {
            (false, _) => Self::Disabled,
            (true, false) => Self::MissingOnly,
            (true, true) => Self::MissingOrEmpty,
        }
    }
}

/// Outcome of classifying one poll.
#[derive(Debug, Clone, Default)]
pub struct Classification {
    /// Entries not reported before, in input order
    pub new_entries: Vec<Entry>,
    /// Whether this poll only established the baseline
    pub bootstrap: bool,
    /// Identifiers persisted after this poll
    pub known_count: usize,
}

impl Classification {
    pub fn has_new(&self) -> bool {
        !self.new_entries.is_empty()
    }
}

/// Ordered identifier set, oldest first.
#[derive(Debug, Clone, Default)]
pub struct KnownIds {
    order: Vec<String>,
    index: HashSet<String>,
}

impl KnownIds {
    /// Build from stored values, upgrading legacy links to identifiers.
    ///
    /// A link that yields no identifier is kept verbatim. Duplicates
    /// collapse onto their most recent position.
    pub fn from_stored(values: Vec<String>) -> Self {
        let migrated: Vec<String> = values.into_iter().map(migrate_value).collect();

        let mut index = HashSet::with_capacity(migrated.len());
        let mut order: Vec<String> = migrated
            .into_iter()
            .rev()
            .filter(|value| index.insert(value.clone()))
            .collect();
        order.reverse();

        Self { order, index }
    }

    pub fn contains(&self, id: &EntryId) -> bool {
        self.index.contains(id.as_str())
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Mark ids as most recently observed, in the given order.
    pub fn observe(&mut self, ids: &[EntryId]) {
        if ids.is_empty() {
            return;
        }
        let fresh: HashSet<&str> = ids.iter().map(EntryId::as_str).collect();
        self.order.retain(|value| !fresh.contains(value.as_str()));

        let mut pushed = HashSet::new();
        for id in ids {
            if pushed.insert(id.as_str()) {
                self.order.push(id.as_str().to_string());
                self.index.insert(id.as_str().to_string());
            }
        }
    }

    /// Evict the oldest ids beyond `limit`.
    pub fn truncate(&mut self, limit: usize) {
        if self.order.len() <= limit {
            return;
        }
        let excess = self.order.len() - limit;
        for evicted in self.order.drain(..excess) {
            self.index.remove(&evicted);
        }
    }

    pub fn as_slice(&self) -> &[String] {
        &self.order
    }
}

/// Replace a stored legacy link with its identifier when one can be derived.
fn migrate_value(value: String) -> String {
    if !looks_like_url(&value) {
        return value;
    }
    match extract_entry_id(&value) {
        Some(id) => id.into_string(),
        None => value,
    }
}

/// Classifies polled entries against each topic's stored identifiers.
pub struct DedupStore {
    store: Arc<dyn IdStore>,
    retention_limit: usize,
    policy: BootstrapPolicy,
    marker: Option<MarkerFile>,
}

impl DedupStore {
    pub fn new(store: Arc<dyn IdStore>, retention_limit: usize) -> Self {
        Self {
            store,
            retention_limit: retention_limit.max(1),
            policy: BootstrapPolicy::MissingOrEmpty,
            marker: None,
        }
    }

    pub fn with_policy(mut self, policy: BootstrapPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_marker(mut self, marker: MarkerFile) -> Self {
        self.marker = Some(marker);
        self
    }

    /// Load a topic's identifiers. Unreadable state counts as missing.
    pub async fn load_known(&self, topic: &str) -> Option<KnownIds> {
        match self.store.load(topic).await {
            Ok(stored) => stored.map(KnownIds::from_stored),
            Err(e) => {
                log::warn!("[{topic}] stored state unreadable, starting fresh: {e}");
                None
            }
        }
    }

    /// Split `entries` into new and known, then persist the updated set.
    pub async fn classify(&self, topic: &str, entries: &[Entry]) -> Result<Classification> {
        let stored = self.load_known(topic).await;
        let prior_existed = stored.is_some();
        let mut known = stored.unwrap_or_default();

        let mut poll_ids = Vec::new();
        let mut seen = HashSet::new();
        let mut resolved = Vec::new();
        for entry in entries {
            let Some(id) = entry.id() else {
                log::debug!("[{topic}] skipping entry without id: {}", entry.link);
                continue;
            };
            if seen.insert(id.clone()) {
                poll_ids.push(id.clone());
                resolved.push((id, entry));
            }
        }

        let bootstrap = match self.policy {
            BootstrapPolicy::Disabled => false,
            BootstrapPolicy::MissingOnly => !prior_existed,
            BootstrapPolicy::MissingOrEmpty => known.is_empty(),
        };

        let new_entries: Vec<Entry> = if bootstrap {
            Vec::new()
        } else {
            resolved
                .into_iter()
                .filter(|(id, _)| !known.contains(id))
                .map(|(_, entry)| entry.clone())
                .collect()
        };

        if bootstrap && poll_ids.is_empty() {
            log::warn!("[{topic}] nothing to record yet, baseline deferred to the next poll");
            return Ok(Classification {
                new_entries,
                bootstrap,
                known_count: known.len(),
            });
        }

        known.observe(&poll_ids);
        known.truncate(self.retention_limit);
        self.store.save(topic, known.as_slice()).await?;

        if bootstrap {
            log::info!(
                "[{topic}] bootstrap: stored {} ids without notifying",
                known.len()
            );
        } else {
            log::info!(
                "[{topic}] {} new of {} resolvable entries ({} known)",
                new_entries.len(),
                poll_ids.len(),
                known.len()
            );
        }

        if !new_entries.is_empty() {
            self.raise_marker().await;
        }

        Ok(Classification {
            new_entries,
            bootstrap,
            known_count: known.len(),
        })
    }

    async fn raise_marker(&self) {
        if let Some(marker) = &self.marker {
            if let Err(e) = marker.touch().await {
                log::warn!(
                    "Failed to create marker {}: {}",
                    marker.path().display(),
                    e
                );
            }
        }
    }
}
