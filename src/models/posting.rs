// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Per-workout publication status.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

/// Publication flags for one workout, persisted per owner.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(feature = "binding-generation", ts(export, export_to = "bindings/"))]
pub struct PostingStatus {
    pub workout_id: String,
    /// Published as a workout record to the network
    #[serde(default)]
    pub synced_to_network: bool,
    /// Shared as a social post
    #[serde(default)]
    pub posted_to_social: bool,
    /// Id of the workout record event
    #[serde(default)]
    pub network_event_id: Option<String>,
    /// Id of the social post event
    #[serde(default)]
    pub social_event_id: Option<String>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl PostingStatus {
    pub fn new(workout_id: impl Into<String>) -> Self {
        Self {
            workout_id: workout_id.into(),
            ..Default::default()
        }
    }

    /// Merge a partial update into this entry.
    ///
    /// Fields absent from the update keep their current value.
    pub fn apply(&mut self, update: &PostingStatusUpdate, now: DateTime<Utc>) {
        if let Some(synced) = update.synced_to_network {
            self.synced_to_network = synced;
        }
        if let Some(posted) = update.posted_to_social {
            self.posted_to_social = posted;
        }
        if let Some(ref id) = update.network_event_id {
            self.network_event_id = Some(id.clone());
        }
        if let Some(ref id) = update.social_event_id {
            self.social_event_id = Some(id.clone());
        }
        self.updated_at = Some(now);
    }
}

/// Partial status written by a publish or share action.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostingStatusUpdate {
    pub synced_to_network: Option<bool>,
    pub posted_to_social: Option<bool>,
    pub network_event_id: Option<String>,
    pub social_event_id: Option<String>,
}

impl PostingStatusUpdate {
    /// Update recording a successful workout publish.
    pub fn synced(event_id: impl Into<String>) -> Self {
        Self {
            synced_to_network: Some(true),
            network_event_id: Some(event_id.into()),
            ..Default::default()
        }
    }

    /// Update recording a successful social post.
    pub fn posted(event_id: impl Into<String>) -> Self {
        Self {
            posted_to_social: Some(true),
            social_event_id: Some(event_id.into()),
            ..Default::default()
        }
    }
}
