// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Key-value storage seam.
//!
//! The device's persistent store is an external collaborator; the engine
//! only needs get/set and their batch forms. `MemoryStore` backs tests and
//! hosts without persistence.

use crate::error::{AppError, Result};
use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::Arc;

/// Persistent string key-value store.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>>;

    async fn set(&self, key: &str, value: String) -> Result<()>;

    async fn multi_set(&self, entries: Vec<(String, String)>) -> Result<()>;

    async fn multi_remove(&self, keys: &[String]) -> Result<()>;
}

/// In-memory store.
#[derive(Clone)]
pub struct MemoryStore {
    entries: Option<Arc<DashMap<String, String>>>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            entries: Some(Arc::new(DashMap::new())),
        }
    }

    /// Create a store where every operation fails (offline mode).
    pub fn new_offline() -> Self {
        Self { entries: None }
    }

    /// Number of stored keys (0 when offline).
    pub fn len(&self) -> usize {
        self.entries.as_ref().map_or(0, |e| e.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Helper to get the map or return an error if offline.
    fn entries(&self) -> Result<&DashMap<String, String>> {
        self.entries
            .as_deref()
            .ok_or_else(|| AppError::Storage("Store not available (offline mode)".to_string()))
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.entries()?.get(key).map(|v| v.value().clone()))
    }

    async fn set(&self, key: &str, value: String) -> Result<()> {
        self.entries()?.insert(key.to_string(), value);
        Ok(())
    }

    async fn multi_set(&self, entries: Vec<(String, String)>) -> Result<()> {
        let map = self.entries()?;
        for (key, value) in entries {
            map.insert(key, value);
        }
        Ok(())
    }

    async fn multi_remove(&self, keys: &[String]) -> Result<()> {
        let map = self.entries()?;
        for key in keys {
            map.remove(key);
        }
        Ok(())
    }
}
