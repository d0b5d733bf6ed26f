// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Fetch timestamps and cache invalidation.
//!
//! Each merge stamps the sources it fetched. Publish actions elsewhere in
//! the app invalidate those stamps by sending an `Invalidation` message;
//! they never wait for it to be applied.

use crate::db::keys;
use crate::db::KeyValueStore;
use crate::error::Result;
use crate::models::WorkoutSource;
use crate::time_utils::{format_utc_rfc3339, parse_utc_rfc3339};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

const ALL_SOURCES: [WorkoutSource; 3] = [
    WorkoutSource::Wearable,
    WorkoutSource::Network,
    WorkoutSource::Local,
];

/// Tracks when each source was last fetched for an owner.
#[derive(Clone)]
pub struct FreshnessTracker {
    kv: Arc<dyn KeyValueStore>,
}

impl FreshnessTracker {
    pub fn new(kv: Arc<dyn KeyValueStore>) -> Self {
        Self { kv }
    }

    /// Stamp the given sources as fetched at `at`.
    pub async fn record(
        &self,
        owner: &str,
        sources: &[WorkoutSource],
        at: DateTime<Utc>,
    ) -> Result<()> {
        let stamp = format_utc_rfc3339(at);
        let entries = sources
            .iter()
            .map(|source| (keys::last_fetch(owner, *source), stamp.clone()))
            .collect();
        self.kv.multi_set(entries).await
    }

    /// When `source` was last fetched; `None` if never or unreadable.
    pub async fn last_fetched(&self, owner: &str, source: WorkoutSource) -> Option<DateTime<Utc>> {
        match self.kv.get(&keys::last_fetch(owner, source)).await {
            Ok(raw) => raw.as_deref().and_then(parse_utc_rfc3339),
            Err(e) => {
                tracing::warn!(error = %e, owner, %source, "Failed to read fetch timestamp");
                None
            }
        }
    }

    /// Whether `source` was fetched within `max_age` of `now`.
    pub async fn is_fresh(
        &self,
        owner: &str,
        source: WorkoutSource,
        max_age: Duration,
        now: DateTime<Utc>,
    ) -> bool {
        let Some(last) = self.last_fetched(owner, source).await else {
            return false;
        };
        let max_age = chrono::Duration::from_std(max_age).unwrap_or(chrono::Duration::MAX);
        last <= now && now - last <= max_age
    }

    /// Forget every fetch timestamp for an owner.
    pub async fn invalidate(&self, owner: &str) -> Result<()> {
        let keys: Vec<String> = ALL_SOURCES
            .iter()
            .map(|source| keys::last_fetch(owner, *source))
            .collect();
        self.kv.multi_remove(&keys).await
    }
}

/// One-way request to drop an owner's cached fetch state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invalidation {
    pub owner: String,
}

/// Sending half handed to publishers.
pub type InvalidationSender = mpsc::UnboundedSender<Invalidation>;

/// Create an invalidation channel.
pub fn invalidation_channel() -> (InvalidationSender, mpsc::UnboundedReceiver<Invalidation>) {
    mpsc::unbounded_channel()
}

/// Apply invalidation messages until every sender is dropped.
pub fn spawn_invalidation_listener(
    tracker: FreshnessTracker,
    mut rx: mpsc::UnboundedReceiver<Invalidation>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(Invalidation { owner }) = rx.recv().await {
            match tracker.invalidate(&owner).await {
                Ok(()) => tracing::debug!(owner = %owner, "Fetch cache invalidated"),
                Err(e) => tracing::warn!(error = %e, owner = %owner, "Cache invalidation failed"),
            }
        }
        tracing::debug!("Invalidation channel closed");
    })
}
