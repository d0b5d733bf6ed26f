// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Fuzzy duplicate detection for workouts without a shared id.
//!
//! Two workouts are the same activity when they have the same activity
//! type, start within the start window, differ in duration by no more than
//! the duration delta, and either both have no distance or differ by no
//! more than max(ratio x larger distance, floor).

use crate::config::MatchTolerances;
use crate::models::{ActivityType, NormalizedWorkout};
use std::collections::HashMap;

/// Whether `a` and `b` look like the same real-world activity.
pub fn is_fuzzy_duplicate(
    a: &NormalizedWorkout,
    b: &NormalizedWorkout,
    tolerances: &MatchTolerances,
) -> bool {
    a.activity_type == b.activity_type
        && (a.start_timestamp() - b.start_timestamp()).abs() <= tolerances.start_window_secs
        && a.duration_secs.abs_diff(b.duration_secs) <= tolerances.duration_delta_secs
        && distances_match(a.distance_meters, b.distance_meters, tolerances)
}

fn distances_match(a: f64, b: f64, tolerances: &MatchTolerances) -> bool {
    if a == 0.0 && b == 0.0 {
        return true;
    }
    let allowed = (a.max(b) * tolerances.distance_ratio).max(tolerances.distance_floor_meters);
    (a - b).abs() <= allowed
}

/// Candidates bucketed by activity type and start-time window.
///
/// A probe only compares against its own bucket and the two neighbours,
/// so lookups stay constant-time for realistic activity densities.
pub struct FuzzyIndex<'a> {
    workouts: &'a [NormalizedWorkout],
    buckets: HashMap<(ActivityType, i64), Vec<usize>>,
    tolerances: MatchTolerances,
}

impl<'a> FuzzyIndex<'a> {
    pub fn new(workouts: &'a [NormalizedWorkout], tolerances: &MatchTolerances) -> Self {
        let mut buckets: HashMap<(ActivityType, i64), Vec<usize>> = HashMap::new();
        for (i, workout) in workouts.iter().enumerate() {
            let key = (workout.activity_type, bucket_of(workout, tolerances));
            buckets.entry(key).or_default().push(i);
        }
        Self {
            workouts,
            buckets,
            tolerances: *tolerances,
        }
    }

    /// Index of the closest-starting match for `probe`, skipping any index
    /// for which `skip` returns true.
    pub fn find(&self, probe: &NormalizedWorkout, skip: impl Fn(usize) -> bool) -> Option<usize> {
        let bucket = bucket_of(probe, &self.tolerances);
        let probe_start = probe.start_timestamp();

        (bucket - 1..=bucket + 1)
            .filter_map(|b| self.buckets.get(&(probe.activity_type, b)))
            .flatten()
            .copied()
            .filter(|&i| !skip(i))
            .filter(|&i| is_fuzzy_duplicate(probe, &self.workouts[i], &self.tolerances))
            .min_by_key(|&i| ((self.workouts[i].start_timestamp() - probe_start).abs(), i))
    }
}

fn bucket_of(workout: &NormalizedWorkout, tolerances: &MatchTolerances) -> i64 {
    workout
        .start_timestamp()
        .div_euclid(tolerances.start_window_secs.max(1))
}
