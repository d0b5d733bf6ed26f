// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Multi-source workout reconciliation.
//!
//! Handles the merge workflow:
//! 1. Fetch wearable, network and local workouts plus posting status, concurrently
//! 2. Index network and wearable workouts by id and origin id
//! 3. Collapse duplicates (index hits first, fuzzy match second)
//! 4. Sort newest first and attach publication flags
//!
//! A failing source contributes nothing; only a failure of the fan-out
//! itself fails the call.

use crate::config::{Config, MatchTolerances};
use crate::db::status::StatusMap;
use crate::db::{
    spawn_invalidation_listener, FreshnessTracker, InvalidationSender, KeyValueStore,
    PostingStatusStore,
};
use crate::error::{AppError, Result};
use crate::models::workout::sort_newest_first;
use crate::models::{
    MergeResult, MergeTiming, NormalizedWorkout, SourceCounts, SourceFailure, UnifiedWorkout,
    WorkoutSource,
};
use crate::services::health::{HealthAdapter, HealthError, HealthSource};
use crate::services::local::{LocalAdapter, LocalWorkoutStore};
use crate::services::matching::FuzzyIndex;
use crate::services::network::NetworkAdapter;
use crate::services::subscription::{RelayPool, SubscriptionClient};
use crate::time_utils::elapsed_ms;
use chrono::Utc;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Instant;
use tokio::task::JoinError;

/// Output of the pure merge step.
#[derive(Debug, Clone, Default)]
pub struct Reconciled {
    /// Newest first, ties by id
    pub workouts: Vec<UnifiedWorkout>,
    pub duplicate_count: u32,
}

/// Merge per-source workout lists into one deduplicated, ordered list.
///
/// Runs in time linear in the total number of workouts: every lookup is a
/// hash probe, and fuzzy matching only scans neighbouring time buckets.
pub fn reconcile(
    wearable: &[NormalizedWorkout],
    network: &[NormalizedWorkout],
    local: &[NormalizedWorkout],
    statuses: &StatusMap,
    tolerances: &MatchTolerances,
) -> Reconciled {
    // Network entries are reachable by entity id and raw event id
    let mut network_by_id: HashMap<&str, usize> = HashMap::with_capacity(network.len() * 2);
    let mut network_by_origin: HashMap<&str, usize> = HashMap::new();
    for (i, workout) in network.iter().enumerate() {
        network_by_id.entry(workout.id.as_str()).or_insert(i);
        if let Some(event_id) = workout.event_id.as_deref() {
            network_by_id.entry(event_id).or_insert(i);
        }
        if let Some(origin) = workout.origin_identifier.as_deref() {
            network_by_origin.entry(origin).or_insert(i);
        }
    }

    let mut device_by_id: HashMap<&str, usize> = HashMap::with_capacity(wearable.len());
    let mut device_by_origin: HashMap<&str, usize> = HashMap::new();
    for (i, workout) in wearable.iter().enumerate() {
        device_by_id.entry(workout.id.as_str()).or_insert(i);
        if let Some(origin) = workout.origin_identifier.as_deref() {
            device_by_origin.entry(origin).or_insert(i);
        }
    }

    let fuzzy = FuzzyIndex::new(network, tolerances);
    let mut claimed = vec![false; network.len()];
    let mut duplicate_count = 0u32;
    let mut merged: Vec<UnifiedWorkout> =
        Vec::with_capacity(wearable.len() + network.len() + local.len());

    // Wearable workouts: keep them, folding in any network counterpart
    for workout in wearable {
        let exact = network_by_id
            .get(workout.id.as_str())
            .or_else(|| {
                let origin = workout.origin_identifier.as_deref()?;
                network_by_origin
                    .get(origin)
                    .or_else(|| network_by_id.get(origin))
            })
            .copied();
        let hit = exact.or_else(|| fuzzy.find(workout, |i| claimed[i]));

        let mut unified = UnifiedWorkout::from_workout(workout.clone());
        if let Some(i) = hit {
            if !claimed[i] {
                claimed[i] = true;
                duplicate_count += 1;
            }
            unified.confirm_synced(network[i].event_id.clone());
        }
        merged.push(unified);
    }

    // Network workouts nobody on the device claimed
    for (i, workout) in network.iter().enumerate() {
        if claimed[i] {
            continue;
        }
        let on_device = device_by_id.contains_key(workout.id.as_str())
            || workout
                .origin_identifier
                .as_deref()
                .is_some_and(|o| device_by_origin.contains_key(o) || device_by_id.contains_key(o));
        if on_device {
            duplicate_count += 1;
            continue;
        }
        merged.push(UnifiedWorkout::from_workout(workout.clone()));
    }

    // Local workouts: drop copies of network records unless imported
    for workout in local {
        let on_network = [workout.cross_reference_id.as_deref(), Some(workout.id.as_str())]
            .into_iter()
            .flatten()
            .any(|key| network_by_id.contains_key(key));
        if on_network && !workout.is_imported_from_network() {
            duplicate_count += 1;
            continue;
        }
        merged.push(UnifiedWorkout::from_workout(workout.clone()));
    }

    // Ids must be unique; the earlier source wins
    let mut seen: HashSet<String> = HashSet::with_capacity(merged.len());
    let before = merged.len();
    merged.retain(|w| seen.insert(w.id().to_string()));
    duplicate_count += (before - merged.len()) as u32;

    sort_unified(&mut merged);
    attach_statuses(&mut merged, statuses);

    Reconciled {
        workouts: merged,
        duplicate_count,
    }
}

fn sort_unified(workouts: &mut [UnifiedWorkout]) {
    workouts.sort_by(|a, b| {
        b.workout
            .start_time
            .cmp(&a.workout.start_time)
            .then_with(|| a.id().cmp(b.id()))
    });
}

fn attach_statuses(workouts: &mut [UnifiedWorkout], statuses: &StatusMap) {
    if statuses.is_empty() {
        return;
    }
    for workout in workouts.iter_mut() {
        if let Some(status) = statuses.get(workout.id()) {
            workout.attach_status(status);
        }
    }
}

/// Turn a per-source failure into an empty contribution.
fn absorb(
    source: WorkoutSource,
    result: Result<Vec<NormalizedWorkout>>,
    failures: &mut Vec<SourceFailure>,
) -> Vec<NormalizedWorkout> {
    match result {
        Ok(workouts) => workouts,
        Err(e) => {
            tracing::warn!(%source, error = %e, "Source failed, continuing without it");
            failures.push(SourceFailure {
                source,
                message: e.to_string(),
            });
            Vec::new()
        }
    }
}

fn orchestration_error(task: &str, e: JoinError) -> AppError {
    AppError::Orchestration(format!("{} task failed: {}", task, e))
}

/// Orchestrates fetches from every source and merges them.
///
/// Adapters are constructed once and shared by every call.
#[derive(Clone)]
pub struct ReconciliationEngine {
    config: Config,
    health: HealthAdapter,
    local: LocalAdapter,
    network: NetworkAdapter,
    status: PostingStatusStore,
    freshness: FreshnessTracker,
}

impl ReconciliationEngine {
    pub fn new(
        config: Config,
        health: Arc<dyn HealthSource>,
        local: Arc<dyn LocalWorkoutStore>,
        pool: Arc<dyn RelayPool>,
        kv: Arc<dyn KeyValueStore>,
    ) -> Self {
        let client = SubscriptionClient::new(pool, config.subscription_timeout)
            .with_id_verification(config.verify_event_ids);

        Self {
            health: HealthAdapter::new(health, config.health_lookback_days),
            local: LocalAdapter::new(local),
            network: NetworkAdapter::new(client, config.workout_kind, config.network_fetch_limit),
            status: PostingStatusStore::new(kv.clone()),
            freshness: FreshnessTracker::new(kv),
            config,
        }
    }

    /// Merge every source into one view of `owner`'s workouts.
    ///
    /// An empty owner returns an empty result without touching any source.
    pub async fn merge(&self, owner: &str) -> Result<MergeResult> {
        let owner = owner.trim();
        if owner.is_empty() {
            tracing::debug!("Merge requested without owner, returning empty result");
            return Ok(MergeResult::empty());
        }

        let started_at = Utc::now();
        let clock = Instant::now();

        let prefer_cache = self
            .freshness
            .is_fresh(
                owner,
                WorkoutSource::Wearable,
                self.config.health_cache_ttl,
                started_at,
            )
            .await;

        let health_task = {
            let adapter = self.health.clone();
            let owner = owner.to_string();
            tokio::spawn(async move { adapter.workouts(&owner, prefer_cache, started_at).await })
        };
        let local_task = {
            let adapter = self.local.clone();
            let owner = owner.to_string();
            tokio::spawn(async move { adapter.workouts(&owner).await })
        };
        let network_task = {
            let adapter = self.network.clone();
            let owner = owner.to_string();
            tokio::spawn(async move { adapter.workouts(&owner).await })
        };
        let status_task = {
            let store = self.status.clone();
            let owner = owner.to_string();
            tokio::spawn(async move { store.get(&owner).await })
        };

        let (health, local, network, statuses) =
            tokio::join!(health_task, local_task, network_task, status_task);
        let health = health.map_err(|e| orchestration_error("wearable fetch", e))?;
        let local = local.map_err(|e| orchestration_error("local fetch", e))?;
        let network = network.map_err(|e| orchestration_error("network fetch", e))?;
        let statuses = statuses.map_err(|e| orchestration_error("status read", e))?;
        let fetch_ms = elapsed_ms(clock);

        let mut source_errors = Vec::new();
        let wearable = absorb(WorkoutSource::Wearable, health, &mut source_errors);
        let local = absorb(WorkoutSource::Local, local, &mut source_errors);
        if network.is_partial() {
            source_errors.push(SourceFailure {
                source: WorkoutSource::Network,
                message: "relay transport error, results may be partial".to_string(),
            });
        }

        let counts = SourceCounts {
            wearable: wearable.len() as u32,
            network: network.workouts.len() as u32,
            local: local.len() as u32,
        };

        let merge_clock = Instant::now();
        let reconciled = reconcile(
            &wearable,
            &network.workouts,
            &local,
            &statuses,
            &self.config.tolerances,
        );
        let merge_ms = elapsed_ms(merge_clock);

        let fetched: Vec<WorkoutSource> = [
            WorkoutSource::Wearable,
            WorkoutSource::Network,
            WorkoutSource::Local,
        ]
        .into_iter()
        .filter(|s| !source_errors.iter().any(|f| f.source == *s))
        .collect();
        if let Err(e) = self.freshness.record(owner, &fetched, Utc::now()).await {
            tracing::warn!(error = %e, owner, "Failed to record fetch timestamps");
        }

        let result = MergeResult {
            all_workouts: reconciled.workouts,
            counts,
            duplicate_count: reconciled.duplicate_count,
            timing: MergeTiming {
                started_at,
                fetch_ms,
                merge_ms,
                total_ms: elapsed_ms(clock),
            },
            source_errors,
        };

        tracing::info!(
            owner,
            workouts = result.all_workouts.len(),
            wearable = counts.wearable,
            network = counts.network,
            local = counts.local,
            duplicates = result.duplicate_count,
            total_ms = result.timing.total_ms,
            "Workouts merged"
        );

        Ok(result)
    }

    /// Fetch the page of network workouts created before `cursor_secs`.
    ///
    /// Network only, no cross-source dedup. Never fails: any problem
    /// yields an empty page.
    pub async fn fetch_older_than(&self, owner: &str, cursor_secs: i64) -> MergeResult {
        let owner = owner.trim();
        if owner.is_empty() {
            return MergeResult::empty();
        }

        match self.try_fetch_older_than(owner, cursor_secs).await {
            Ok(result) => result,
            Err(e) => {
                tracing::warn!(error = %e, owner, cursor_secs, "Older workouts fetch failed");
                MergeResult::empty()
            }
        }
    }

    async fn try_fetch_older_than(&self, owner: &str, cursor_secs: i64) -> Result<MergeResult> {
        let started_at = Utc::now();
        let clock = Instant::now();
        let until = cursor_secs.saturating_sub(1);

        let network_task = {
            let adapter = self.network.clone();
            let owner = owner.to_string();
            let limit = self.config.page_size;
            tokio::spawn(async move { adapter.workouts_until(&owner, until, limit).await })
        };
        let status_task = {
            let store = self.status.clone();
            let owner = owner.to_string();
            tokio::spawn(async move { store.get(&owner).await })
        };

        let (network, statuses) = tokio::join!(network_task, status_task);
        let network = network.map_err(|e| orchestration_error("network page", e))?;
        let statuses = statuses.map_err(|e| orchestration_error("status read", e))?;
        let fetch_ms = elapsed_ms(clock);

        let merge_clock = Instant::now();
        let partial = network.is_partial();
        let counts = SourceCounts {
            network: network.workouts.len() as u32,
            ..Default::default()
        };

        let mut page = network.workouts;
        sort_newest_first(&mut page);
        let mut seen: HashSet<String> = HashSet::with_capacity(page.len());
        let mut workouts: Vec<UnifiedWorkout> = page
            .into_iter()
            .filter(|w| seen.insert(w.id.clone()))
            .map(UnifiedWorkout::from_workout)
            .collect();
        attach_statuses(&mut workouts, &statuses);
        let duplicate_count = counts.network - workouts.len() as u32;

        let mut source_errors = Vec::new();
        if partial {
            source_errors.push(SourceFailure {
                source: WorkoutSource::Network,
                message: "relay transport error, results may be partial".to_string(),
            });
        }

        tracing::debug!(
            owner,
            cursor_secs,
            workouts = workouts.len(),
            "Fetched older network workouts"
        );

        Ok(MergeResult {
            all_workouts: workouts,
            counts,
            duplicate_count,
            timing: MergeTiming {
                started_at,
                fetch_ms,
                merge_ms: elapsed_ms(merge_clock),
                total_ms: elapsed_ms(clock),
            },
            source_errors,
        })
    }

    /// Publication status storage, for publish and share actions.
    pub fn status_store(&self) -> &PostingStatusStore {
        &self.status
    }

    pub fn freshness(&self) -> &FreshnessTracker {
        &self.freshness
    }

    /// Most recent wearable failure, for UI messaging.
    pub fn last_health_error(&self) -> Option<HealthError> {
        self.health.last_error()
    }

    /// Start applying cache invalidations sent by publishers.
    ///
    /// The listener stops once every returned sender is dropped.
    pub fn start_invalidation_listener(&self) -> InvalidationSender {
        let (tx, rx) = crate::db::invalidation_channel();
        spawn_invalidation_listener(self.freshness.clone(), rx);
        tx
    }

    /// Force-close any subscription still open (e.g. on logout).
    pub fn shutdown(&self) -> usize {
        let closed = self.network.client().close_all();
        if closed > 0 {
            tracing::info!(closed, "Closed open subscriptions on shutdown");
        }
        closed
    }
}
