// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Services module - source adapters and the reconciliation engine.

pub mod health;
pub mod local;
pub mod matching;
pub mod network;
pub mod parser;
pub mod reconcile;
pub mod subscription;

pub use health::{HealthAdapter, HealthError, HealthRecord, HealthSource};
pub use local::{LocalAdapter, LocalRecord, LocalWorkoutStore};
pub use network::{NetworkAdapter, NetworkFetch};
pub use reconcile::{reconcile, Reconciled, ReconciliationEngine};
pub use subscription::{
    Collected, PoolMessage, PoolSubscription, RelayPool, SettleReason, SubscribeOptions,
    SubscriptionClient, SubscriptionHandle, SubscriptionId,
};
