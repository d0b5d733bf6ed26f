// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! In-memory stand-ins for the relay pool, health store and local storage.

use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use workout_sync::config::{Config, WORKOUT_EVENT_KIND};
use workout_sync::db::{KeyValueStore, MemoryStore};
use workout_sync::error::{AppError, Result};
use workout_sync::models::{EventFilter, RawEvent};
use workout_sync::services::health::ProgressFn;
use workout_sync::services::{
    HealthError, HealthRecord, HealthSource, LocalRecord, LocalWorkoutStore, PoolMessage,
    PoolSubscription, RelayPool, SubscribeOptions, SubscriptionHandle,
};
use workout_sync::ReconciliationEngine;

pub const OWNER: &str = "npub-alice";
pub const T0: i64 = 1_700_000_000;

#[allow(dead_code)]
pub fn at(secs: i64) -> DateTime<Utc> {
    DateTime::from_timestamp(secs, 0).expect("timestamp in range")
}

/// Scripted relay pool.
///
/// Every subscription immediately delivers the stored events matching its
/// filter (newest first, up to the limit), then sends `trailer` after
/// `delay`. An empty trailer leaves the subscription open until stopped.
pub struct MockPool {
    events: Vec<RawEvent>,
    trailer: Vec<PoolMessage>,
    delay: Duration,
    fail_open: bool,
    stops: Arc<AtomicUsize>,
    opened: AtomicUsize,
    filters: Mutex<Vec<EventFilter>>,
}

#[allow(dead_code)]
impl MockPool {
    pub fn new(events: Vec<RawEvent>) -> Self {
        Self {
            events,
            trailer: vec![PoolMessage::Eose],
            delay: Duration::ZERO,
            fail_open: false,
            stops: Arc::new(AtomicUsize::new(0)),
            opened: AtomicUsize::new(0),
            filters: Mutex::new(Vec::new()),
        }
    }

    pub fn eose_after(self, delay: Duration) -> Self {
        self.with_trailer(vec![PoolMessage::Eose], delay)
    }

    /// Never signals EOSE.
    pub fn silent(self) -> Self {
        self.with_trailer(Vec::new(), Duration::ZERO)
    }

    pub fn error_after(self, delay: Duration, message: &str) -> Self {
        self.with_trailer(vec![PoolMessage::Error(message.to_string())], delay)
    }

    pub fn with_trailer(mut self, trailer: Vec<PoolMessage>, delay: Duration) -> Self {
        self.trailer = trailer;
        self.delay = delay;
        self
    }

    /// Refuse to open subscriptions at all.
    pub fn failing(mut self) -> Self {
        self.fail_open = true;
        self
    }

    pub fn stop_count(&self) -> usize {
        self.stops.load(Ordering::SeqCst)
    }

    pub fn open_count(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }

    pub fn filters(&self) -> Vec<EventFilter> {
        self.filters.lock().clone()
    }
}

struct MockHandle {
    stops: Arc<AtomicUsize>,
    sender: Arc<Mutex<Option<mpsc::UnboundedSender<PoolMessage>>>>,
}

impl SubscriptionHandle for MockHandle {
    fn stop(&self) {
        self.stops.fetch_add(1, Ordering::SeqCst);
        self.sender.lock().take();
    }
}

#[async_trait]
impl RelayPool for MockPool {
    async fn subscribe(
        &self,
        filter: &EventFilter,
        _options: SubscribeOptions,
    ) -> Result<PoolSubscription> {
        self.filters.lock().push(filter.clone());
        if self.fail_open {
            return Err(AppError::Transport("no relays connected".to_string()));
        }
        self.opened.fetch_add(1, Ordering::SeqCst);

        let (tx, rx) = mpsc::unbounded_channel();
        let mut matching: Vec<RawEvent> = self
            .events
            .iter()
            .filter(|e| filter.matches(e))
            .cloned()
            .collect();
        matching.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        if let Some(limit) = filter.limit {
            matching.truncate(limit);
        }
        for event in matching {
            let _ = tx.send(PoolMessage::Event(event));
        }

        let trailer = self.trailer.clone();
        let delay = self.delay;
        let feeder = tx.clone();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            for message in trailer {
                let _ = feeder.send(message);
            }
        });

        Ok(PoolSubscription {
            messages: rx,
            handle: Arc::new(MockHandle {
                stops: self.stops.clone(),
                sender: Arc::new(Mutex::new(Some(tx))),
            }),
        })
    }
}

/// Health store returning fixed records or a fixed error.
pub struct MockHealth {
    records: Vec<HealthRecord>,
    cached: Option<Vec<HealthRecord>>,
    error: Option<HealthError>,
    fetches: AtomicUsize,
}

#[allow(dead_code)]
impl MockHealth {
    pub fn new(records: Vec<HealthRecord>) -> Self {
        Self {
            records,
            cached: None,
            error: None,
            fetches: AtomicUsize::new(0),
        }
    }

    pub fn failing(error: HealthError) -> Self {
        Self {
            error: Some(error),
            ..Self::new(Vec::new())
        }
    }

    pub fn with_cache(mut self, cached: Vec<HealthRecord>) -> Self {
        self.cached = Some(cached);
        self
    }

    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl HealthSource for MockHealth {
    fn cached_workouts(&self) -> Option<Vec<HealthRecord>> {
        self.cached.clone()
    }

    async fn fetch_recent(
        &self,
        _start: DateTime<Utc>,
        _end: DateTime<Utc>,
        on_progress: ProgressFn<'_>,
    ) -> std::result::Result<Vec<HealthRecord>, HealthError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        if let Some(e) = &self.error {
            return Err(e.clone());
        }
        on_progress(self.records.len(), self.records.len());
        Ok(self.records.clone())
    }
}

/// Local storage with fixed contents.
pub struct MockLocal {
    records: Vec<LocalRecord>,
    fail: bool,
}

#[allow(dead_code)]
impl MockLocal {
    pub fn new(records: Vec<LocalRecord>) -> Self {
        Self {
            records,
            fail: false,
        }
    }

    pub fn failing() -> Self {
        Self {
            records: Vec::new(),
            fail: true,
        }
    }
}

#[async_trait]
impl LocalWorkoutStore for MockLocal {
    async fn all_workouts(&self) -> Result<Vec<LocalRecord>> {
        if self.fail {
            return Err(AppError::Storage("database locked".to_string()));
        }
        Ok(self.records.clone())
    }
}

/// Local storage whose task dies mid-fetch.
#[allow(dead_code)]
pub struct PanickingLocal;

#[async_trait]
impl LocalWorkoutStore for PanickingLocal {
    async fn all_workouts(&self) -> Result<Vec<LocalRecord>> {
        panic!("local storage task crashed");
    }
}

/// Build a signed-id workout event for `OWNER`.
#[allow(dead_code)]
pub fn workout_event(created_at: i64, tags: &[&[&str]]) -> RawEvent {
    RawEvent::build(
        OWNER,
        created_at,
        WORKOUT_EVENT_KIND,
        tags.iter()
            .map(|t| t.iter().map(|s| s.to_string()).collect())
            .collect(),
        "",
    )
}

#[allow(dead_code)]
pub fn health_record(uuid: &str, start: i64, duration_secs: i64, meters: f64) -> HealthRecord {
    HealthRecord {
        uuid: uuid.to_string(),
        activity_type: "HKWorkoutActivityTypeRunning".to_string(),
        start_date: at(start),
        end_date: at(start) + ChronoDuration::seconds(duration_secs),
        duration_secs: duration_secs as f64,
        total_distance_meters: Some(meters),
        total_energy_kcal: Some(300.0),
        source_name: Some("Watch".to_string()),
    }
}

#[allow(dead_code)]
pub fn local_record(id: &str, source: &str, start: i64, event_id: Option<&str>) -> LocalRecord {
    LocalRecord {
        id: id.to_string(),
        activity_type: "running".to_string(),
        start_time: at(start),
        end_time: None,
        duration_secs: 1200,
        distance_meters: Some(3000.0),
        calories: None,
        source: source.to_string(),
        network_event_id: event_id.map(str::to_string),
    }
}

/// Engine wired to the given mocks with default config.
#[allow(dead_code)]
pub fn engine(
    health: Arc<dyn HealthSource>,
    local: Arc<dyn LocalWorkoutStore>,
    pool: Arc<dyn RelayPool>,
    kv: Arc<dyn KeyValueStore>,
) -> ReconciliationEngine {
    ReconciliationEngine::new(Config::default(), health, local, pool, kv)
}

/// Engine over empty sources apart from `pool`.
#[allow(dead_code)]
pub fn network_only_engine(pool: Arc<MockPool>) -> (ReconciliationEngine, MemoryStore) {
    let kv = MemoryStore::new();
    let engine = engine(
        Arc::new(MockHealth::new(Vec::new())),
        Arc::new(MockLocal::new(Vec::new())),
        pool,
        Arc::new(kv.clone()),
    );
    (engine, kv)
}
