// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! workout-sync: one deduplicated view of a user's workouts
//!
//! This crate merges workouts from a wearable health store, a federated
//! event network and on-device storage, collapsing cross-source duplicates
//! and attaching each workout's publication status.

pub mod config;
pub mod db;
pub mod error;
pub mod logging;
pub mod models;
pub mod services;
pub mod time_utils;

pub use config::Config;
pub use error::{AppError, Result};
pub use models::{MergeResult, UnifiedWorkout};
pub use services::ReconciliationEngine;
