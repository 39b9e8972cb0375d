// SPDX-FileCopyrightText: 2026 Perch Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The Perch core engine.
//!
//! Home of the two places where the real invariants live: the publish
//! orchestrator (lifecycle state machine, retries, thread dependencies,
//! timeouts) and the reconciliation engine (merge, quarantine, deletion
//! inference, self-healing). The scheduler loop drives both on independent
//! cadences; the snapshot debouncer and metric refresher round out the
//! write side.

pub mod debounce;
pub mod metrics;
pub mod orchestrator;
pub mod scheduler;
pub mod sync;

pub use metrics::{MetricsRefresher, RefreshOptions, RefreshReport};
pub use orchestrator::{OrchestratorOptions, PublishOrchestrator, TickOutcome, TickReport};
pub use scheduler::{Scheduler, SchedulerIntervals};
pub use sync::{MergeAction, SyncEngine, SyncEngineOptions, SyncReport};
