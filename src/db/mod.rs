// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Persistence layer (owner-namespaced key-value storage).

pub mod freshness;
pub mod kv;
pub mod status;

pub use freshness::{
    invalidation_channel, spawn_invalidation_listener, FreshnessTracker, Invalidation,
    InvalidationSender,
};
pub use kv::{KeyValueStore, MemoryStore};
pub use status::PostingStatusStore;

/// Storage keys. Every key is namespaced by owner identity.
pub mod keys {
    use crate::models::WorkoutSource;

    pub const POSTING_STATUS: &str = "posting_status";
    /// Per-source fetch timestamps
    pub const LAST_FETCH: &str = "last_fetch";

    pub fn posting_status(owner: &str) -> String {
        format!("{}:{}", POSTING_STATUS, owner)
    }

    pub fn last_fetch(owner: &str, source: WorkoutSource) -> String {
        format!("{}:{}:{}", LAST_FETCH, source, owner)
    }
}
