// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Wearable health store adapter.
//!
//! The health store itself (permissions, native queries) lives outside
//! this crate behind `HealthSource`. The adapter decides between cached
//! and fresh records, normalizes them, and turns failures into an empty
//! contribution plus a last-error slot the UI can read.

use crate::error::AppError;
use crate::models::{ActivityType, NormalizedWorkout, WorkoutSource};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Workout record as exported by the health store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthRecord {
    /// Health-store UUID
    pub uuid: String,
    /// Store-specific type label (e.g. "HKWorkoutActivityTypeRunning")
    pub activity_type: String,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub duration_secs: f64,
    pub total_distance_meters: Option<f64>,
    pub total_energy_kcal: Option<f64>,
    /// App or device that recorded the workout
    pub source_name: Option<String>,
}

impl HealthRecord {
    /// Normalize into the common workout shape.
    pub fn to_workout(&self, owner: &str) -> NormalizedWorkout {
        NormalizedWorkout {
            id: self.uuid.clone(),
            owner: owner.to_string(),
            activity_type: ActivityType::from_label(&self.activity_type),
            start_time: self.start_date,
            end_time: self.end_date,
            duration_secs: non_negative(self.duration_secs).round() as u64,
            distance_meters: self.total_distance_meters.map_or(0.0, non_negative),
            calories: self
                .total_energy_kcal
                .map(|kcal| non_negative(kcal).round() as u32),
            source: WorkoutSource::Wearable,
            origin_identifier: Some(self.uuid.clone()),
            event_id: None,
            local_origin: None,
            cross_reference_id: None,
        }
    }
}

fn non_negative(value: f64) -> f64 {
    if value.is_finite() && value > 0.0 {
        value
    } else {
        0.0
    }
}

/// Conditions the health store reports instead of crashing the caller.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HealthError {
    #[error("not authorized")]
    NotAuthorized,

    #[error("timeout")]
    Timeout,

    #[error("not available")]
    NotAvailable,

    #[error("{0}")]
    Other(String),
}

/// Progress callback: `(fetched, expected)`.
pub type ProgressFn<'a> = &'a (dyn Fn(usize, usize) + Send + Sync);

/// The device health store.
#[async_trait]
pub trait HealthSource: Send + Sync {
    /// Records from the store's own cache, if it has any.
    fn cached_workouts(&self) -> Option<Vec<HealthRecord>>;

    /// Query workouts that started between `start` and `end`.
    async fn fetch_recent(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        on_progress: ProgressFn<'_>,
    ) -> Result<Vec<HealthRecord>, HealthError>;
}

/// Long-lived wrapper around the health store.
#[derive(Clone)]
pub struct HealthAdapter {
    source: Arc<dyn HealthSource>,
    lookback: Duration,
    last_error: Arc<Mutex<Option<HealthError>>>,
}

impl HealthAdapter {
    pub fn new(source: Arc<dyn HealthSource>, lookback_days: i64) -> Self {
        Self {
            source,
            lookback: Duration::days(lookback_days.max(1)),
            last_error: Arc::new(Mutex::new(None)),
        }
    }

    /// Fetch and normalize wearable workouts for `owner`.
    ///
    /// With `prefer_cache`, the store's cached records are used when
    /// present. Otherwise the last `lookback_days` are queried.
    pub async fn workouts(
        &self,
        owner: &str,
        prefer_cache: bool,
        now: DateTime<Utc>,
    ) -> Result<Vec<NormalizedWorkout>, AppError> {
        if prefer_cache {
            if let Some(cached) = self.source.cached_workouts() {
                *self.last_error.lock() = None;
                tracing::debug!(count = cached.len(), "Using cached wearable workouts");
                return Ok(cached.iter().map(|r| r.to_workout(owner)).collect());
            }
        }

        let start = now - self.lookback;
        let progress = |fetched: usize, expected: usize| {
            tracing::trace!(fetched, expected, "Wearable fetch progress");
        };

        match self.source.fetch_recent(start, now, &progress).await {
            Ok(records) => {
                *self.last_error.lock() = None;
                tracing::debug!(count = records.len(), "Fetched wearable workouts");
                Ok(records.iter().map(|r| r.to_workout(owner)).collect())
            }
            Err(e) => {
                tracing::warn!(error = %e, "Wearable source unavailable");
                *self.last_error.lock() = Some(e.clone());
                Err(AppError::SourceUnavailable {
                    source_kind: WorkoutSource::Wearable,
                    reason: e.to_string(),
                })
            }
        }
    }

    /// The most recent fetch failure, cleared by the next successful read
    /// from either the store or its cache.
    pub fn last_error(&self) -> Option<HealthError> {
        self.last_error.lock().clone()
    }
}
