// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Network workout adapter: subscription client plus parser.

use crate::models::{EventFilter, NormalizedWorkout};
use crate::services::parser::parse_events;
use crate::services::subscription::{SettleReason, SubscriptionClient};

/// Parsed result of one network fetch.
#[derive(Debug, Clone)]
pub struct NetworkFetch {
    /// Newest first
    pub workouts: Vec<NormalizedWorkout>,
    /// Events received before parsing
    pub raw_events: usize,
    pub settled_by: SettleReason,
}

impl NetworkFetch {
    /// Whether the fetch ended on a transport error.
    pub fn is_partial(&self) -> bool {
        self.settled_by == SettleReason::Error
    }
}

/// Fetches an owner's workout events from the relays.
#[derive(Clone)]
pub struct NetworkAdapter {
    client: SubscriptionClient,
    kind: u32,
    limit: usize,
}

impl NetworkAdapter {
    pub fn new(client: SubscriptionClient, kind: u32, limit: usize) -> Self {
        Self {
            client,
            kind,
            limit,
        }
    }

    /// Most recent workouts for `owner`.
    pub async fn workouts(&self, owner: &str) -> NetworkFetch {
        let filter = EventFilter::for_author(self.kind, owner).limit(self.limit);
        self.fetch(&filter).await
    }

    /// Up to `limit` workouts created at or before `until`.
    pub async fn workouts_until(&self, owner: &str, until: i64, limit: usize) -> NetworkFetch {
        let filter = EventFilter::for_author(self.kind, owner)
            .limit(limit)
            .until(until);
        self.fetch(&filter).await
    }

    async fn fetch(&self, filter: &EventFilter) -> NetworkFetch {
        let collected = self.client.subscribe(filter).await;

        // Settled subscriptions are already out of the registry; anything
        // left is a straggler.
        let stragglers = self.client.close(&[collected.id]);
        if stragglers > 0 {
            tracing::warn!(subscription = %collected.id, "Closed straggling subscription");
        }

        let raw_events = collected.events.len();
        let workouts = parse_events(&collected.events, self.kind);
        tracing::debug!(
            raw_events,
            workouts = workouts.len(),
            settled_by = ?collected.settled_by,
            "Fetched network workouts"
        );

        NetworkFetch {
            workouts,
            raw_events,
            settled_by: collected.settled_by,
        }
    }

    pub fn client(&self) -> &SubscriptionClient {
        &self.client
    }
}
