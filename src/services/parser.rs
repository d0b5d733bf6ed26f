// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Convert workout events into normalized workouts.
//!
//! Workout events carry their data in tags:
//!
//! ```text
//! ["d", "<cross-reference id>"]
//! ["exercise", "running"]
//! ["duration", "00:30:00"]          // HH:MM:SS, MM:SS or seconds
//! ["distance", "5.00", "km"]        // km (default), mi or m
//! ["calories", "320"]
//! ["origin_id", "<provider id>"]
//! ["start", "<unix seconds>"]
//! ["end", "<unix seconds>"]
//! ```
//!
//! Anything else is ignored.

use crate::error::ParseError;
use crate::models::workout::sort_newest_first;
use crate::models::{ActivityType, NormalizedWorkout, RawEvent, WorkoutSource};
use crate::time_utils::from_unix_seconds;

const METERS_PER_KM: f64 = 1000.0;
const METERS_PER_MILE: f64 = 1609.344;

/// Tag fields gathered in one pass.
#[derive(Default)]
struct WorkoutTags<'a> {
    cross_reference: Option<&'a str>,
    origin_id: Option<&'a str>,
    exercise: Option<&'a str>,
    duration_secs: Option<u64>,
    distance_meters: Option<f64>,
    calories: Option<u32>,
    start: Option<i64>,
    end: Option<i64>,
}

/// Parse one workout event.
pub fn parse_workout_event(
    event: &RawEvent,
    expected_kind: u32,
) -> Result<NormalizedWorkout, ParseError> {
    if event.kind != expected_kind {
        return Err(ParseError::WrongKind {
            expected: expected_kind,
            found: event.kind,
        });
    }

    let mut fields = WorkoutTags::default();
    for tag in &event.tags {
        let (Some(key), Some(value)) = (tag.first(), tag.get(1)) else {
            continue;
        };
        let value = value.as_str();
        match key.as_str() {
            "d" if !value.is_empty() => fields.cross_reference = Some(value),
            "origin_id" if !value.is_empty() => fields.origin_id = Some(value),
            "exercise" => fields.exercise = Some(value),
            "duration" => fields.duration_secs = Some(parse_duration(value)?),
            "distance" => {
                let unit = tag.get(2).map(String::as_str);
                fields.distance_meters = Some(parse_distance(value, unit)?);
            }
            "calories" => fields.calories = Some(parse_calories(value)?),
            "start" => fields.start = Some(parse_timestamp("start", value)?),
            "end" => fields.end = Some(parse_timestamp("end", value)?),
            _ => {}
        }
    }

    let exercise = fields
        .exercise
        .filter(|e| !e.trim().is_empty())
        .ok_or_else(|| ParseError::MissingActivity(event.id.clone()))?;

    let duration_secs = fields.duration_secs.unwrap_or(0);
    let start = fields.start.unwrap_or(event.created_at);
    let end = fields
        .end
        .unwrap_or_else(|| start.saturating_add(i64::try_from(duration_secs).unwrap_or(i64::MAX)));

    let start_time = from_unix_seconds(start).ok_or(ParseError::TimestampOutOfRange(start))?;
    let end_time = from_unix_seconds(end).ok_or(ParseError::TimestampOutOfRange(end))?;

    Ok(NormalizedWorkout {
        id: fields
            .cross_reference
            .map(str::to_string)
            .unwrap_or_else(|| event.id.clone()),
        owner: event.pubkey.clone(),
        activity_type: ActivityType::from_label(exercise),
        start_time,
        end_time,
        duration_secs,
        distance_meters: fields.distance_meters.unwrap_or(0.0),
        calories: fields.calories,
        source: WorkoutSource::Network,
        origin_identifier: fields.origin_id.map(str::to_string),
        event_id: Some(event.id.clone()),
        local_origin: None,
        cross_reference_id: None,
    })
}

/// Parse a batch, skipping events that fail.
///
/// Output is sorted newest first.
pub fn parse_events(events: &[RawEvent], expected_kind: u32) -> Vec<NormalizedWorkout> {
    let mut workouts: Vec<NormalizedWorkout> = events
        .iter()
        .filter_map(|event| match parse_workout_event(event, expected_kind) {
            Ok(workout) => Some(workout),
            Err(e) => {
                tracing::debug!(event_id = %event.id, error = %e, "Skipping unparseable event");
                None
            }
        })
        .collect();

    sort_newest_first(&mut workouts);
    workouts
}

/// Parse "HH:MM:SS", "MM:SS" or plain seconds.
///
/// Durations that do not fit a signed 64-bit second count are rejected.
pub fn parse_duration(value: &str) -> Result<u64, ParseError> {
    let value = value.trim();
    let parts: Vec<&str> = value.split(':').collect();

    let numbers = parts
        .iter()
        .map(|p| p.trim().parse::<u64>())
        .collect::<Result<Vec<u64>, _>>();

    let seconds = match (parts.len(), numbers) {
        (1, Ok(n)) => Some(n[0]),
        (1, Err(_)) => value
            .parse::<f64>()
            .ok()
            .filter(|s| s.is_finite() && *s >= 0.0 && *s <= i64::MAX as f64)
            .map(|s| s.round() as u64),
        (2, Ok(n)) if n[1] < 60 => n[0].checked_mul(60).and_then(|m| m.checked_add(n[1])),
        (3, Ok(n)) if n[1] < 60 && n[2] < 60 => n[0]
            .checked_mul(3600)
            .and_then(|h| h.checked_add(n[1] * 60 + n[2])),
        _ => None,
    };

    seconds
        .filter(|s| i64::try_from(*s).is_ok())
        .ok_or_else(|| ParseError::invalid("duration", value))
}

/// Parse a distance with an optional unit into meters.
pub fn parse_distance(value: &str, unit: Option<&str>) -> Result<f64, ParseError> {
    let amount: f64 = value
        .trim()
        .parse()
        .ok()
        .filter(|d: &f64| d.is_finite() && *d >= 0.0)
        .ok_or_else(|| ParseError::invalid("distance", value))?;

    let unit = unit.map(|u| u.trim().to_ascii_lowercase());
    let factor = match unit.as_deref() {
        None | Some("") | Some("km") => METERS_PER_KM,
        Some("mi") | Some("mile") | Some("miles") => METERS_PER_MILE,
        Some("m") => 1.0,
        Some(_) => return Err(ParseError::invalid("distance", value)),
    };
    Ok(amount * factor)
}

/// Parse calories; fractional values are truncated.
fn parse_calories(value: &str) -> Result<u32, ParseError> {
    let value = value.trim();
    if let Ok(n) = value.parse::<u32>() {
        return Ok(n);
    }
    value
        .parse::<f64>()
        .ok()
        .filter(|c| c.is_finite() && *c >= 0.0 && *c <= u32::MAX as f64)
        .map(|c| c as u32)
        .ok_or_else(|| ParseError::invalid("calories", value))
}

fn parse_timestamp(tag: &'static str, value: &str) -> Result<i64, ParseError> {
    value
        .trim()
        .parse()
        .map_err(|_| ParseError::invalid(tag, value))
}

#[cfg(test)]
mod tests {
    use super::*;

    const KIND: u32 = 1301;

    fn event(tags: &[&[&str]]) -> RawEvent {
        RawEvent::build(
            "alice",
            1_700_000_000,
            KIND,
            tags.iter()
                .map(|t| t.iter().map(|s| s.to_string()).collect())
                .collect(),
            "",
        )
    }

    #[test]
    fn test_duration_formats() {
        assert_eq!(parse_duration("00:30:00"), Ok(1800));
        assert_eq!(parse_duration("1:02:03"), Ok(3723));
        assert_eq!(parse_duration("30:15"), Ok(1815));
        assert_eq!(parse_duration("1800"), Ok(1800));
        assert_eq!(parse_duration("1800.4"), Ok(1800));
        assert!(parse_duration("1:75").is_err());
        assert!(parse_duration("abc").is_err());
        assert!(parse_duration("").is_err());
    }

    #[test]
    fn test_oversized_durations_are_rejected() {
        assert!(parse_duration("6000000000000000:00:00").is_err());
        assert!(parse_duration("400000000000000000:00").is_err());
        assert!(parse_duration("18446744073709551615").is_err());
        assert!(parse_duration("1e300").is_err());
        assert_eq!(
            parse_duration("9223372036854775807"),
            Ok(i64::MAX as u64)
        );
    }

    #[test]
    fn test_oversized_duration_skips_only_that_event() {
        let good = event(&[&["exercise", "running"], &["d", "good"]]);
        let huge = event(&[
            &["exercise", "running"],
            &["duration", "6000000000000000:00:00"],
        ]);
        let far_end = event(&[
            &["exercise", "running"],
            &["duration", "9223372036854775807"],
        ]);

        assert!(parse_workout_event(&huge, KIND).is_err());
        assert!(matches!(
            parse_workout_event(&far_end, KIND),
            Err(ParseError::TimestampOutOfRange(_))
        ));

        let workouts = parse_events(&[huge, good, far_end], KIND);
        let ids: Vec<&str> = workouts.iter().map(|w| w.id.as_str()).collect();
        assert_eq!(ids, vec!["good"]);
    }

    #[test]
    fn test_distance_units() {
        assert_eq!(parse_distance("5.00", Some("km")), Ok(5000.0));
        assert_eq!(parse_distance("5", None), Ok(5000.0));
        assert_eq!(parse_distance("400", Some("m")), Ok(400.0));
        assert!((parse_distance("1", Some("mi")).unwrap() - 1609.344).abs() < 1e-9);
        assert!(parse_distance("5", Some("furlongs")).is_err());
        assert!(parse_distance("-1", None).is_err());
    }

    #[test]
    fn test_full_event() {
        let e = event(&[
            &["d", "U1"],
            &["exercise", "running"],
            &["duration", "00:30:00"],
            &["distance", "5.00", "km"],
            &["calories", "320"],
            &["origin_id", "HK-1"],
            &["client", "some app", "v1"],
        ]);
        let workout = parse_workout_event(&e, KIND).unwrap();

        assert_eq!(workout.id, "U1");
        assert_eq!(workout.owner, "alice");
        assert_eq!(workout.activity_type, ActivityType::Running);
        assert_eq!(workout.duration_secs, 1800);
        assert_eq!(workout.distance_meters, 5000.0);
        assert_eq!(workout.calories, Some(320));
        assert_eq!(workout.origin_identifier.as_deref(), Some("HK-1"));
        assert_eq!(workout.event_id.as_deref(), Some(e.id.as_str()));
        assert_eq!(workout.start_timestamp(), 1_700_000_000);
        assert_eq!(workout.end_time.timestamp(), 1_700_001_800);
        assert_eq!(workout.source, WorkoutSource::Network);
    }

    #[test]
    fn test_id_falls_back_to_event_id() {
        let e = event(&[&["exercise", "walk"], &["d", ""]]);
        let workout = parse_workout_event(&e, KIND).unwrap();
        assert_eq!(workout.id, e.id);
        assert_eq!(workout.distance_meters, 0.0);
        assert_eq!(workout.calories, None);
    }

    #[test]
    fn test_explicit_start_and_end() {
        let e = event(&[
            &["exercise", "cycling"],
            &["start", "1699990000"],
            &["end", "1699993600"],
        ]);
        let workout = parse_workout_event(&e, KIND).unwrap();
        assert_eq!(workout.start_timestamp(), 1_699_990_000);
        assert_eq!(workout.end_time.timestamp(), 1_699_993_600);
    }

    #[test]
    fn test_missing_exercise_is_error() {
        let e = event(&[&["distance", "5"]]);
        assert!(matches!(
            parse_workout_event(&e, KIND),
            Err(ParseError::MissingActivity(_))
        ));
    }

    #[test]
    fn test_wrong_kind_is_error() {
        let e = event(&[&["exercise", "running"]]);
        assert!(matches!(
            parse_workout_event(&e, 1),
            Err(ParseError::WrongKind { .. })
        ));
    }

    #[test]
    fn test_malformed_tags_are_skipped_or_fatal() {
        // Short tags are ignored, bad values for known keys are not
        let short = event(&[&["exercise", "running"], &["distance"], &[]]);
        assert!(parse_workout_event(&short, KIND).is_ok());

        let bad = event(&[&["exercise", "running"], &["calories", "lots"]]);
        assert!(parse_workout_event(&bad, KIND).is_err());
    }

    #[test]
    fn test_batch_skips_bad_events_and_sorts() {
        let mut older = event(&[&["exercise", "running"], &["d", "old"]]);
        older.created_at = 1_600_000_000;
        let newer = event(&[&["exercise", "running"], &["d", "new"]]);
        let bad = event(&[&["exercise", "running"], &["duration", "??"]]);

        let workouts = parse_events(&[older, bad, newer], KIND);
        let ids: Vec<&str> = workouts.iter().map(|w| w.id.as_str()).collect();
        assert_eq!(ids, vec!["new", "old"]);
    }
}
