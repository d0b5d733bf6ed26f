// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Per-owner publication status storage.
//!
//! The whole `workout_id -> PostingStatus` map for an owner is stored under
//! one key and rewritten on every update. Updates are read-modify-write
//! with no locking: callers must not run two updates for the same owner
//! at once.

use crate::db::keys;
use crate::db::KeyValueStore;
use crate::error::{AppError, Result};
use crate::models::{PostingStatus, PostingStatusUpdate};
use std::collections::HashMap;
use std::sync::Arc;

/// Owner-scoped map of posting statuses.
pub type StatusMap = HashMap<String, PostingStatus>;

/// Reads and writes posting statuses.
#[derive(Clone)]
pub struct PostingStatusStore {
    kv: Arc<dyn KeyValueStore>,
}

impl PostingStatusStore {
    pub fn new(kv: Arc<dyn KeyValueStore>) -> Self {
        Self { kv }
    }

    /// Get the status map for an owner.
    ///
    /// Storage or decode failures are logged and read as "no status", so
    /// every flag defaults to false.
    pub async fn get(&self, owner: &str) -> StatusMap {
        match self.try_get(owner).await {
            Ok(map) => map,
            Err(e) => {
                tracing::warn!(error = %e, owner, "Failed to read posting status, using defaults");
                StatusMap::new()
            }
        }
    }

    /// Get the status map, surfacing storage failures.
    pub async fn try_get(&self, owner: &str) -> Result<StatusMap> {
        let Some(raw) = self.kv.get(&keys::posting_status(owner)).await? else {
            return Ok(StatusMap::new());
        };

        serde_json::from_str(&raw)
            .map_err(|e| AppError::Storage(format!("Corrupt posting status for {}: {}", owner, e)))
    }

    /// Merge a partial status into the entry for `workout_id` and persist
    /// the full map.
    ///
    /// A failed read aborts the update instead of overwriting the stored
    /// map with a fresh one.
    pub async fn update(
        &self,
        owner: &str,
        workout_id: &str,
        update: &PostingStatusUpdate,
    ) -> Result<PostingStatus> {
        if owner.trim().is_empty() {
            return Err(AppError::Storage(
                "Cannot store posting status without an owner".to_string(),
            ));
        }

        let mut map = self.try_get(owner).await?;
        let entry = map
            .entry(workout_id.to_string())
            .or_insert_with(|| PostingStatus::new(workout_id));
        entry.apply(update, chrono::Utc::now());
        let updated = entry.clone();

        let encoded = serde_json::to_string(&map)
            .map_err(|e| AppError::Internal(anyhow::anyhow!("Encode posting status: {}", e)))?;
        self.kv.set(&keys::posting_status(owner), encoded).await?;

        tracing::debug!(
            owner,
            workout_id,
            synced = updated.synced_to_network,
            posted = updated.posted_to_social,
            "Posting status updated"
        );
        Ok(updated)
    }

    /// Record that a workout was published to the network.
    pub async fn mark_synced(
        &self,
        owner: &str,
        workout_id: &str,
        event_id: &str,
    ) -> Result<PostingStatus> {
        self.update(owner, workout_id, &PostingStatusUpdate::synced(event_id))
            .await
    }

    /// Record that a workout was shared as a social post.
    pub async fn mark_posted_to_social(
        &self,
        owner: &str,
        workout_id: &str,
        event_id: &str,
    ) -> Result<PostingStatus> {
        self.update(owner, workout_id, &PostingStatusUpdate::posted(event_id))
            .await
    }

    /// Remove every status for an owner.
    pub async fn clear(&self, owner: &str) -> Result<()> {
        self.kv.multi_remove(&[keys::posting_status(owner)]).await
    }
}
