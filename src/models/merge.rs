// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Merge output handed to the presentation layer.

use crate::models::{NormalizedWorkout, PostingStatus, WorkoutSource};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

/// A workout with its publication state attached.
///
/// Recomputed on every merge, never stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(feature = "binding-generation", ts(export, export_to = "bindings/"))]
pub struct UnifiedWorkout {
    #[serde(flatten)]
    pub workout: NormalizedWorkout,
    pub synced_to_network: bool,
    pub posted_to_social: bool,
    /// Event id of the network copy, when known
    pub network_event_id: Option<String>,
    pub can_sync_to_network: bool,
    pub can_post_to_social: bool,
}

impl UnifiedWorkout {
    /// Wrap a workout with its flags derived from the source alone.
    ///
    /// Network workouts are synced by definition. On-device workouts are
    /// syncable unless they already reference a network event, either as
    /// the record they were imported from or the one they were published as.
    /// That holds even when the relay copy is missing from this fetch.
    pub fn from_workout(workout: NormalizedWorkout) -> Self {
        let network_event_id = match workout.source {
            WorkoutSource::Network => workout.event_id.clone(),
            _ => workout.cross_reference_id.clone(),
        };
        let on_network = workout.source == WorkoutSource::Network || network_event_id.is_some();
        Self {
            synced_to_network: on_network,
            posted_to_social: false,
            network_event_id,
            can_sync_to_network: !on_network,
            can_post_to_social: true,
            workout,
        }
    }

    /// Mark as confirmed on the network through a matched counterpart.
    pub fn confirm_synced(&mut self, event_id: Option<String>) {
        self.synced_to_network = true;
        self.can_sync_to_network = false;
        if self.network_event_id.is_none() {
            self.network_event_id = event_id;
        }
    }

    /// Fold persisted publication flags in.
    ///
    /// Flags only ever turn on here; a stale store entry cannot mark a
    /// network workout as unsynced.
    pub fn attach_status(&mut self, status: &PostingStatus) {
        if status.synced_to_network {
            self.confirm_synced(status.network_event_id.clone());
        }
        if status.posted_to_social {
            self.posted_to_social = true;
        }
        self.can_post_to_social = !self.posted_to_social;
    }

    pub fn id(&self) -> &str {
        &self.workout.id
    }
}

/// Raw record counts per source, before dedup.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(feature = "binding-generation", ts(export, export_to = "bindings/"))]
pub struct SourceCounts {
    pub wearable: u32,
    pub network: u32,
    pub local: u32,
}

impl SourceCounts {
    pub fn total(&self) -> u32 {
        self.wearable + self.network + self.local
    }
}

/// Timing metadata for one merge call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(feature = "binding-generation", ts(export, export_to = "bindings/"))]
pub struct MergeTiming {
    pub started_at: DateTime<Utc>,
    /// Time spent waiting on sources
    #[cfg_attr(feature = "binding-generation", ts(type = "number"))]
    pub fetch_ms: u64,
    /// Time spent indexing, matching and sorting
    #[cfg_attr(feature = "binding-generation", ts(type = "number"))]
    pub merge_ms: u64,
    #[cfg_attr(feature = "binding-generation", ts(type = "number"))]
    pub total_ms: u64,
}

impl Default for MergeTiming {
    fn default() -> Self {
        Self {
            started_at: Utc::now(),
            fetch_ms: 0,
            merge_ms: 0,
            total_ms: 0,
        }
    }
}

/// A source that degraded to an empty contribution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(feature = "binding-generation", ts(export, export_to = "bindings/"))]
pub struct SourceFailure {
    pub source: WorkoutSource,
    pub message: String,
}

/// Deduplicated, ordered view over every source.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(feature = "binding-generation", ts(export, export_to = "bindings/"))]
pub struct MergeResult {
    /// Newest first, ties by id
    pub all_workouts: Vec<UnifiedWorkout>,
    pub counts: SourceCounts,
    pub duplicate_count: u32,
    pub timing: MergeTiming,
    #[serde(default)]
    pub source_errors: Vec<SourceFailure>,
}

impl MergeResult {
    /// Result with nothing in it and every count at zero.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.all_workouts.is_empty()
    }

    /// Start time (unix seconds) of the oldest workout, for use as the
    /// next pagination cursor.
    pub fn oldest_start(&self) -> Option<i64> {
        self.all_workouts
            .iter()
            .map(|w| w.workout.start_timestamp())
            .min()
    }

    pub fn ids(&self) -> Vec<&str> {
        self.all_workouts.iter().map(UnifiedWorkout::id).collect()
    }
}
