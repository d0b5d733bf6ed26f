// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Normalized workout model shared by all sources.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

/// Where a workout record came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(feature = "binding-generation", ts(export, export_to = "bindings/"))]
pub enum WorkoutSource {
    /// Wearable health store
    Wearable,
    /// Federated event network
    Network,
    /// On-device storage
    Local,
}

impl WorkoutSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            WorkoutSource::Wearable => "wearable",
            WorkoutSource::Network => "network",
            WorkoutSource::Local => "local",
        }
    }
}

impl fmt::Display for WorkoutSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a local record ended up on the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(feature = "binding-generation", ts(export, export_to = "bindings/"))]
pub enum LocalOrigin {
    Manual,
    GpsTracker,
    /// Copied down from the network; always listed even when the relay
    /// copy is present too
    ImportedNetwork,
}

/// Normalized activity type.
///
/// Every source spells activity types differently ("Run", "running",
/// "HKWorkoutActivityTypeRunning"); comparisons only happen on this enum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(feature = "binding-generation", ts(export, export_to = "bindings/"))]
pub enum ActivityType {
    Running,
    Walking,
    Cycling,
    Hiking,
    Swimming,
    Rowing,
    Strength,
    Yoga,
    Other,
}

impl ActivityType {
    /// Map a free-form label onto an activity type.
    pub fn from_label(label: &str) -> Self {
        let lowered = label.trim().to_ascii_lowercase();
        let key: String = lowered
            .strip_prefix("hkworkoutactivitytype")
            .unwrap_or(&lowered)
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .collect();

        match key.as_str() {
            "run" | "running" | "jog" | "jogging" | "treadmill" | "trailrun" => {
                ActivityType::Running
            }
            "walk" | "walking" => ActivityType::Walking,
            "ride" | "bike" | "biking" | "cycle" | "cycling" | "virtualride" => {
                ActivityType::Cycling
            }
            "hike" | "hiking" => ActivityType::Hiking,
            "swim" | "swimming" => ActivityType::Swimming,
            "row" | "rowing" => ActivityType::Rowing,
            "strength"
            | "strengthtraining"
            | "weights"
            | "traditionalstrengthtraining"
            | "functionalstrengthtraining" => ActivityType::Strength,
            "yoga" => ActivityType::Yoga,
            _ => ActivityType::Other,
        }
    }
}

/// A workout in the common shape every source is converted into.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(feature = "binding-generation", ts(export, export_to = "bindings/"))]
pub struct NormalizedWorkout {
    /// Cross-reference id when one exists, otherwise the source's own id
    pub id: String,
    /// Owner identity (public key)
    pub owner: String,
    pub activity_type: ActivityType,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    #[cfg_attr(feature = "binding-generation", ts(type = "number"))]
    pub duration_secs: u64,
    pub distance_meters: f64,
    pub calories: Option<u32>,
    pub source: WorkoutSource,
    /// Provider-specific unique id (e.g. a health-store UUID)
    pub origin_identifier: Option<String>,
    /// Raw event id for network records
    pub event_id: Option<String>,
    /// Set for local records only
    pub local_origin: Option<LocalOrigin>,
    /// Network event id a local record was imported from or published as
    pub cross_reference_id: Option<String>,
}

impl NormalizedWorkout {
    /// Whether this is a local copy of a network workout.
    pub fn is_imported_from_network(&self) -> bool {
        self.local_origin == Some(LocalOrigin::ImportedNetwork)
    }

    /// Start time as unix seconds.
    pub fn start_timestamp(&self) -> i64 {
        self.start_time.timestamp()
    }
}

/// Sort newest first; equal start times are ordered by id so repeated
/// calls over the same data give the same order.
pub fn sort_newest_first(workouts: &mut [NormalizedWorkout]) {
    workouts.sort_by(|a, b| {
        b.start_time
            .cmp(&a.start_time)
            .then_with(|| a.id.cmp(&b.id))
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_activity_labels_normalize() {
        assert_eq!(ActivityType::from_label("Running"), ActivityType::Running);
        assert_eq!(ActivityType::from_label(" run "), ActivityType::Running);
        assert_eq!(
            ActivityType::from_label("HKWorkoutActivityTypeRunning"),
            ActivityType::Running
        );
        assert_eq!(ActivityType::from_label("Ride"), ActivityType::Cycling);
        assert_eq!(
            ActivityType::from_label("traditional_strength_training"),
            ActivityType::Strength
        );
        assert_eq!(ActivityType::from_label("curling"), ActivityType::Other);
    }

    #[test]
    fn test_source_serializes_snake_case() {
        let json = serde_json::to_string(&WorkoutSource::Wearable).unwrap();
        assert_eq!(json, "\"wearable\"");
        assert_eq!(WorkoutSource::Network.to_string(), "network");
    }
}
