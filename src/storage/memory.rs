//! In-memory storage for tests and dry runs.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;

use crate::error::Result;
use crate::storage::IdStore;

/// Identifier store kept in process memory. Nothing is persisted.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    values: Mutex<HashMap<String, Vec<String>>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a key, e.g. with legacy state.
    pub fn insert(&self, key: impl Into<String>, values: Vec<String>) {
        self.lock().insert(key.into(), values);
    }

    /// Snapshot of the values under `key`.
    pub fn get(&self, key: &str) -> Option<Vec<String>> {
        self.lock().get(key).cloned()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, Vec<String>>> {
        self.values.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl IdStore for MemoryStorage {
    async fn load(&self, key: &str) -> Result<Option<Vec<String>>> {
        Ok(self.get(key))
    }

    async fn save(&self, key: &str, values: &[String]) -> Result<()> {
        self.insert(key, values.to_vec());
        Ok(())
    }
}
