// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Bounded-lifetime event subscriptions against a shared relay pool.
//!
//! A subscription is OPEN until exactly one of these settles it:
//! - end of stored events (EOSE)
//! - the time budget running out
//! - a transport error, or the pool closing the message stream
//!
//! after which it is CLOSED for good. Teardown (stop the pool handle and
//! drop the registry entry) runs from a drop guard, so it also happens when
//! the caller abandons the future.
//!
//! `stop()` is only ever called by whoever removes the registry entry:
//! either the subscription's own teardown or a `close`/`close_all` sweep. That
//! makes it run exactly once per subscription.

use crate::error::Result;
use crate::models::{EventFilter, RawEvent};
use async_trait::async_trait;
use dashmap::DashMap;
use std::collections::HashSet;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::Instant;

/// Message delivered on an open pool subscription.
#[derive(Debug, Clone)]
pub enum PoolMessage {
    Event(RawEvent),
    /// No more stored events are pending
    Eose,
    Error(String),
}

/// Options passed to the pool when opening a subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubscribeOptions {
    /// Ask relays to close the subscription after EOSE
    pub close_on_eose: bool,
}

/// Stop handle for an open pool subscription.
pub trait SubscriptionHandle: Send + Sync {
    fn stop(&self);
}

/// An open pool subscription.
pub struct PoolSubscription {
    pub messages: mpsc::UnboundedReceiver<PoolMessage>,
    pub handle: Arc<dyn SubscriptionHandle>,
}

/// Shared connection pool to the relays.
#[async_trait]
pub trait RelayPool: Send + Sync {
    async fn subscribe(
        &self,
        filter: &EventFilter,
        options: SubscribeOptions,
    ) -> Result<PoolSubscription>;
}

/// Locally assigned subscription id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(pub u64);

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sub-{}", self.0)
    }
}

/// What closed a subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettleReason {
    Eose,
    Timeout,
    Error,
}

/// Events gathered by one subscription.
#[derive(Debug, Clone)]
pub struct Collected {
    pub id: SubscriptionId,
    pub events: Vec<RawEvent>,
    pub settled_by: SettleReason,
}

/// Registry entry for an open subscription.
struct LiveSubscription {
    handle: Arc<dyn SubscriptionHandle>,
    resolved: Arc<AtomicBool>,
    opened_at: Instant,
}

type Registry = DashMap<SubscriptionId, LiveSubscription>;

/// Fetches events from the pool within a fixed time budget.
#[derive(Clone)]
pub struct SubscriptionClient {
    pool: Arc<dyn RelayPool>,
    registry: Arc<Registry>,
    next_id: Arc<AtomicU64>,
    timeout: Duration,
    verify_ids: bool,
}

impl SubscriptionClient {
    pub fn new(pool: Arc<dyn RelayPool>, timeout: Duration) -> Self {
        Self {
            pool,
            registry: Arc::new(DashMap::new()),
            next_id: Arc::new(AtomicU64::new(1)),
            timeout,
            verify_ids: true,
        }
    }

    /// Enable or disable event id verification.
    pub fn with_id_verification(mut self, verify: bool) -> Self {
        self.verify_ids = verify;
        self
    }

    /// Collect events matching `filter` until EOSE, timeout or error.
    ///
    /// Never fails: on a transport error the events gathered so far are
    /// returned, and a subscription that cannot be opened yields nothing.
    pub async fn subscribe(&self, filter: &EventFilter) -> Collected {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let options = SubscribeOptions {
            close_on_eose: true,
        };

        let PoolSubscription {
            mut messages,
            handle,
        } = match self.pool.subscribe(filter, options).await {
            Ok(sub) => sub,
            Err(e) => {
                tracing::warn!(subscription = %id, error = %e, "Failed to open subscription");
                return Collected {
                    id,
                    events: Vec::new(),
                    settled_by: SettleReason::Error,
                };
            }
        };

        let resolved = Arc::new(AtomicBool::new(false));
        self.registry.insert(
            id,
            LiveSubscription {
                handle,
                resolved: resolved.clone(),
                opened_at: Instant::now(),
            },
        );
        let teardown = Teardown {
            id,
            registry: self.registry.clone(),
            resolved,
        };

        let deadline = Instant::now() + self.timeout;
        let mut collector = Collector::new(filter, self.verify_ids);

        let settled_by = loop {
            match tokio::time::timeout_at(deadline, messages.recv()).await {
                Err(_) => break SettleReason::Timeout,
                Ok(Some(PoolMessage::Event(event))) => collector.push(event),
                Ok(Some(PoolMessage::Eose)) => break SettleReason::Eose,
                Ok(Some(PoolMessage::Error(msg))) => {
                    tracing::warn!(
                        subscription = %id,
                        error = %msg,
                        collected = collector.events.len(),
                        "Subscription error, keeping partial results"
                    );
                    break SettleReason::Error;
                }
                Ok(None) => {
                    tracing::debug!(subscription = %id, "Pool closed subscription stream");
                    break SettleReason::Error;
                }
            }
        };

        teardown.settle();

        tracing::debug!(
            subscription = %id,
            settled_by = ?settled_by,
            events = collector.events.len(),
            rejected = collector.rejected,
            "Subscription settled"
        );

        Collected {
            id,
            events: collector.events,
            settled_by,
        }
    }

    /// Force-close every subscription still in the registry.
    ///
    /// Returns how many were closed.
    pub fn close_all(&self) -> usize {
        let ids: Vec<SubscriptionId> = self.registry.iter().map(|entry| *entry.key()).collect();
        self.close(&ids)
    }

    /// Force-close the given subscriptions if they are still open.
    ///
    /// Returns how many were closed.
    pub fn close(&self, ids: &[SubscriptionId]) -> usize {
        let mut closed = 0;
        for id in ids {
            if let Some((id, live)) = self.registry.remove(id) {
                live.resolved.store(true, Ordering::Release);
                live.handle.stop();
                closed += 1;
                tracing::debug!(
                    subscription = %id,
                    open_ms = live.opened_at.elapsed().as_millis() as u64,
                    "Force-closed straggling subscription"
                );
            }
        }
        closed
    }

    /// Number of subscriptions currently open.
    pub fn live_count(&self) -> usize {
        self.registry.len()
    }
}

/// Runs teardown for one subscription at most once.
struct Teardown {
    id: SubscriptionId,
    registry: Arc<Registry>,
    resolved: Arc<AtomicBool>,
}

impl Teardown {
    /// Returns `false` if the subscription was already resolved.
    fn settle(&self) -> bool {
        if self.resolved.swap(true, Ordering::AcqRel) {
            return false;
        }
        if let Some((_, live)) = self.registry.remove(&self.id) {
            live.handle.stop();
        }
        true
    }
}

impl Drop for Teardown {
    fn drop(&mut self) {
        if self.settle() {
            tracing::debug!(subscription = %self.id, "Subscription abandoned by caller");
        }
    }
}

/// Accumulates events, dropping repeats and anything that should not have
/// been delivered.
struct Collector<'a> {
    filter: &'a EventFilter,
    verify_ids: bool,
    seen: HashSet<String>,
    events: Vec<RawEvent>,
    rejected: usize,
}

impl<'a> Collector<'a> {
    fn new(filter: &'a EventFilter, verify_ids: bool) -> Self {
        Self {
            filter,
            verify_ids,
            seen: HashSet::new(),
            events: Vec::new(),
            rejected: 0,
        }
    }

    fn push(&mut self, event: RawEvent) {
        if !self.filter.matches(&event) || (self.verify_ids && !event.has_valid_id()) {
            self.rejected += 1;
            return;
        }
        // Relays in the pool deliver the same event independently
        if self.seen.insert(event.id.clone()) {
            self.events.push(event);
        }
    }
}
