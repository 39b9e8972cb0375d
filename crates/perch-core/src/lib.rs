// SPDX-FileCopyrightText: 2026 Perch Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for the Perch post scheduler.
//!
//! Defines the domain types (posts, snapshots, scraped records), the error
//! type, and the trait seams (the platform agent, the entity store, and an
//! injectable clock) used throughout the Perch workspace. No I/O lives here.

pub mod error;
pub mod snowflake;
pub mod traits;
pub mod types;

pub use error::PerchError;
pub use traits::{Clock, NewSyncedPost, PlatformAgent, PostStore, SyncApply, SystemClock};
pub use types::{
    AccountMetricSnapshot, EngagementCounters, ImportOutcome, LogActor, LogEntry,
    MetricsOutcome, MetricsReading, NewPost, Post, PostFilter, PostMetricSnapshot, PostPatch,
    PostStatus, ProfileStats, PublishOutcome, PublishRequest, ScrapedRecord, SyncOutcome,
    PLACEHOLDER_CONTENT,
};
