// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Data models for the application.

pub mod event;
pub mod merge;
pub mod posting;
pub mod workout;

pub use event::{EventFilter, RawEvent};
pub use merge::{MergeResult, MergeTiming, SourceCounts, SourceFailure, UnifiedWorkout};
pub use posting::{PostingStatus, PostingStatusUpdate};
pub use workout::{ActivityType, LocalOrigin, NormalizedWorkout, WorkoutSource};
