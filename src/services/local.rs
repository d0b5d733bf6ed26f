// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! On-device workout storage adapter.

use crate::error::{ParseError, Result};
use crate::models::{ActivityType, LocalOrigin, NormalizedWorkout, WorkoutSource};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Source label of records copied down from the network.
pub const IMPORTED_SOURCE_LABEL: &str = "imported_nostr";

/// Workout persisted on the device.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocalRecord {
    pub id: String,
    pub activity_type: String,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub duration_secs: u64,
    pub distance_meters: Option<f64>,
    pub calories: Option<u32>,
    /// "manual", "gps_tracker", "imported_nostr", ...
    pub source: String,
    /// Network event this record was imported from or published as
    pub network_event_id: Option<String>,
}

impl LocalRecord {
    pub fn origin(&self) -> LocalOrigin {
        match self.source.as_str() {
            IMPORTED_SOURCE_LABEL | "imported_network" => LocalOrigin::ImportedNetwork,
            "gps" | "gps_tracker" => LocalOrigin::GpsTracker,
            _ => LocalOrigin::Manual,
        }
    }

    /// Normalize a stored record.
    ///
    /// Fails when the stored duration cannot produce a representable end
    /// time.
    pub fn to_workout(&self, owner: &str) -> std::result::Result<NormalizedWorkout, ParseError> {
        let end_time = match self.end_time {
            Some(end) => end,
            None => i64::try_from(self.duration_secs)
                .ok()
                .and_then(Duration::try_seconds)
                .and_then(|d| self.start_time.checked_add_signed(d))
                .ok_or_else(|| {
                    ParseError::invalid("duration", &self.duration_secs.to_string())
                })?,
        };

        Ok(NormalizedWorkout {
            id: self.id.clone(),
            owner: owner.to_string(),
            activity_type: ActivityType::from_label(&self.activity_type),
            start_time: self.start_time,
            end_time,
            duration_secs: self.duration_secs,
            distance_meters: self.distance_meters.unwrap_or(0.0),
            calories: self.calories,
            source: WorkoutSource::Local,
            origin_identifier: None,
            event_id: None,
            local_origin: Some(self.origin()),
            cross_reference_id: self.network_event_id.clone(),
        })
    }
}

/// Device-local workout storage.
#[async_trait]
pub trait LocalWorkoutStore: Send + Sync {
    async fn all_workouts(&self) -> Result<Vec<LocalRecord>>;
}

/// Long-lived wrapper around local storage.
#[derive(Clone)]
pub struct LocalAdapter {
    store: Arc<dyn LocalWorkoutStore>,
}

impl LocalAdapter {
    pub fn new(store: Arc<dyn LocalWorkoutStore>) -> Self {
        Self { store }
    }

    /// All stored workouts, normalized for `owner`.
    pub async fn workouts(&self, owner: &str) -> Result<Vec<NormalizedWorkout>> {
        let records = self.store.all_workouts().await?;
        let workouts: Vec<NormalizedWorkout> = records
            .iter()
            .filter_map(|record| match record.to_workout(owner) {
                Ok(workout) => Some(workout),
                Err(e) => {
                    tracing::warn!(record_id = %record.id, error = %e, "Skipping corrupt local workout");
                    None
                }
            })
            .collect();
        tracing::debug!(
            stored = records.len(),
            count = workouts.len(),
            "Loaded local workouts"
        );
        Ok(workouts)
    }
}
