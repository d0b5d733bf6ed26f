// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Raw network events and subscription filters.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// A tagged record as delivered by a relay.
///
/// Only lives for the duration of one fetch; it is parsed into a
/// `NormalizedWorkout` and dropped.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawEvent {
    /// Hex-encoded SHA-256 of the canonical serialization
    pub id: String,
    /// Author identity (hex public key)
    pub pubkey: String,
    /// Creation time (unix seconds)
    pub created_at: i64,
    pub kind: u32,
    /// Ordered key/value tag arrays, e.g. `["distance", "5.00", "km"]`
    pub tags: Vec<Vec<String>>,
    #[serde(default)]
    pub content: String,
}

impl RawEvent {
    /// Build an event and derive its id from the content.
    pub fn build(
        pubkey: impl Into<String>,
        created_at: i64,
        kind: u32,
        tags: Vec<Vec<String>>,
        content: impl Into<String>,
    ) -> Self {
        let mut event = Self {
            id: String::new(),
            pubkey: pubkey.into(),
            created_at,
            kind,
            tags,
            content: content.into(),
        };
        event.id = event.compute_id();
        event
    }

    /// Compute the canonical id: SHA-256 over
    /// `[0, pubkey, created_at, kind, tags, content]`.
    pub fn compute_id(&self) -> String {
        let canonical = serde_json::json!([
            0,
            self.pubkey,
            self.created_at,
            self.kind,
            self.tags,
            self.content
        ]);
        let digest = Sha256::digest(canonical.to_string().as_bytes());
        hex::encode(digest)
    }

    /// Whether the stored id matches the event content.
    pub fn has_valid_id(&self) -> bool {
        self.id.eq_ignore_ascii_case(&self.compute_id())
    }

    /// First value of the first tag named `key`.
    pub fn tag_value(&self, key: &str) -> Option<&str> {
        self.tags
            .iter()
            .find(|tag| tag.first().map(String::as_str) == Some(key))
            .and_then(|tag| tag.get(1))
            .map(String::as_str)
    }
}

/// Which events a subscription asks for.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EventFilter {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub kinds: Vec<u32>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub authors: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<usize>,
    /// Inclusive lower bound on `created_at`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub since: Option<i64>,
    /// Inclusive upper bound on `created_at`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub until: Option<i64>,
}

impl EventFilter {
    /// Filter for one author's events of a single kind.
    pub fn for_author(kind: u32, author: impl Into<String>) -> Self {
        Self {
            kinds: vec![kind],
            authors: vec![author.into()],
            ..Default::default()
        }
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn until(mut self, until: i64) -> Self {
        self.until = Some(until);
        self
    }

    /// Check an event against the filter locally.
    ///
    /// Relays are expected to apply the filter themselves; this catches
    /// the ones that don't.
    pub fn matches(&self, event: &RawEvent) -> bool {
        if !self.kinds.is_empty() && !self.kinds.contains(&event.kind) {
            return false;
        }
        if !self.authors.is_empty()
            && !self
                .authors
                .iter()
                .any(|a| a.eq_ignore_ascii_case(&event.pubkey))
        {
            return false;
        }
        if self.since.is_some_and(|since| event.created_at < since) {
            return false;
        }
        if self.until.is_some_and(|until| event.created_at > until) {
            return false;
        }
        true
    }
}
