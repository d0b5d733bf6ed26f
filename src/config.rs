// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Engine configuration loaded from environment variables.

use std::env;
use std::str::FromStr;
use std::time::Duration;

/// Event kind used for published workout records.
pub const WORKOUT_EVENT_KIND: u32 = 1301;

/// Hard ceiling for a single event subscription.
pub const DEFAULT_SUBSCRIPTION_TIMEOUT: Duration = Duration::from_secs(5);

/// Tolerances for the fuzzy duplicate test.
///
/// These are heuristics, not derived values; tune them per deployment.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MatchTolerances {
    /// Maximum start-time difference (seconds)
    pub start_window_secs: i64,
    /// Maximum duration difference (seconds)
    pub duration_delta_secs: u64,
    /// Relative distance tolerance (fraction of the larger distance)
    pub distance_ratio: f64,
    /// Absolute distance tolerance floor (meters)
    pub distance_floor_meters: f64,
}

impl Default for MatchTolerances {
    fn default() -> Self {
        Self {
            start_window_secs: 60,
            duration_delta_secs: 10,
            distance_ratio: 0.02,
            distance_floor_meters: 100.0,
        }
    }
}

/// Engine configuration, loaded once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    /// Time budget for one event subscription
    pub subscription_timeout: Duration,
    /// Event kind carrying workouts
    pub workout_kind: u32,
    /// Result limit for the full network fetch
    pub network_fetch_limit: usize,
    /// Result limit for one page of older workouts
    pub page_size: usize,
    /// How far back the wearable fetch reaches
    pub health_lookback_days: i64,
    /// How long cached wearable records are trusted
    pub health_cache_ttl: Duration,
    /// Drop network events whose id does not match their content
    pub verify_event_ids: bool,
    /// Fuzzy duplicate thresholds
    pub tolerances: MatchTolerances,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            subscription_timeout: DEFAULT_SUBSCRIPTION_TIMEOUT,
            workout_kind: WORKOUT_EVENT_KIND,
            network_fetch_limit: 100,
            page_size: 50,
            health_lookback_days: 30,
            health_cache_ttl: Duration::from_secs(5 * 60),
            verify_event_ids: true,
            tolerances: MatchTolerances::default(),
        }
    }
}

impl Config {
    /// Load configuration from `WORKOUT_SYNC_*` environment variables.
    ///
    /// Unset variables fall back to the defaults; set but malformed ones are
    /// reported rather than silently ignored.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok(); // Load .env file if present

        let defaults = Self::default();
        let tolerance_defaults = defaults.tolerances;

        Ok(Self {
            subscription_timeout: Duration::from_millis(parse_var(
                "WORKOUT_SYNC_SUBSCRIPTION_TIMEOUT_MS",
                defaults.subscription_timeout.as_millis() as u64,
            )?),
            workout_kind: parse_var("WORKOUT_SYNC_WORKOUT_KIND", defaults.workout_kind)?,
            network_fetch_limit: parse_var(
                "WORKOUT_SYNC_NETWORK_LIMIT",
                defaults.network_fetch_limit,
            )?,
            page_size: parse_var("WORKOUT_SYNC_PAGE_SIZE", defaults.page_size)?,
            health_lookback_days: parse_var(
                "WORKOUT_SYNC_HEALTH_LOOKBACK_DAYS",
                defaults.health_lookback_days,
            )?,
            health_cache_ttl: Duration::from_secs(parse_var(
                "WORKOUT_SYNC_HEALTH_CACHE_TTL_SECS",
                defaults.health_cache_ttl.as_secs(),
            )?),
            verify_event_ids: parse_var(
                "WORKOUT_SYNC_VERIFY_EVENT_IDS",
                defaults.verify_event_ids,
            )?,
            tolerances: MatchTolerances {
                start_window_secs: parse_var(
                    "WORKOUT_SYNC_MATCH_START_WINDOW_SECS",
                    tolerance_defaults.start_window_secs,
                )?,
                duration_delta_secs: parse_var(
                    "WORKOUT_SYNC_MATCH_DURATION_DELTA_SECS",
                    tolerance_defaults.duration_delta_secs,
                )?,
                distance_ratio: parse_var(
                    "WORKOUT_SYNC_MATCH_DISTANCE_RATIO",
                    tolerance_defaults.distance_ratio,
                )?,
                distance_floor_meters: parse_var(
                    "WORKOUT_SYNC_MATCH_DISTANCE_FLOOR_METERS",
                    tolerance_defaults.distance_floor_meters,
                )?,
            },
        })
    }
}

/// Read an optional variable, falling back to `default` when unset.
fn parse_var<T: FromStr>(name: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { name, value: raw }),
        Err(_) => Ok(default),
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for environment variable {name}: {value:?}")]
    Invalid { name: &'static str, value: String },
}
