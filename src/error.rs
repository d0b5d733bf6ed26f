// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Error types for workout reconciliation.
//!
//! Everything except `Orchestration` and `Internal` is recovered at the
//! per-source boundary; those two reach the caller of `merge`.

use crate::models::WorkoutSource;

/// Application error type.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Failed to parse event: {0}")]
    Parse(#[from] ParseError),

    #[error("Source {source_kind} unavailable: {reason}")]
    SourceUnavailable {
        source_kind: WorkoutSource,
        reason: String,
    },

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Merge orchestration failed: {0}")]
    Orchestration(String),

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    /// Whether the error is absorbed at a per-source boundary.
    ///
    /// Recoverable errors turn into an empty contribution from one source;
    /// the rest fail the whole call and need a retry from the caller.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            AppError::Transport(_)
                | AppError::Parse(_)
                | AppError::SourceUnavailable { .. }
                | AppError::Storage(_)
        )
    }
}

/// Malformed network record.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ParseError {
    #[error("unexpected event kind {found} (expected {expected})")]
    WrongKind { expected: u32, found: u32 },

    #[error("event {0} has no exercise tag")]
    MissingActivity(String),

    #[error("invalid {tag} value: {value:?}")]
    InvalidValue { tag: &'static str, value: String },

    #[error("timestamp {0} out of range")]
    TimestampOutOfRange(i64),
}

impl ParseError {
    pub(crate) fn invalid(tag: &'static str, value: &str) -> Self {
        ParseError::InvalidValue {
            tag,
            value: value.to_string(),
        }
    }
}

/// Result type alias used across the crate.
pub type Result<T> = std::result::Result<T, AppError>;
