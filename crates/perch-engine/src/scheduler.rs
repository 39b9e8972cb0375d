// SPDX-FileCopyrightText: 2026 Perch Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The cooperative scheduler loop.
//!
//! Three independently paced periodic tasks share one component: the
//! frequent due-post check, the metric refresh for recently sent posts,
//! and the infrequent full history resync per account. Each task is a
//! single sequential loop, so an instance never overlaps a later instance
//! of the same task; different task kinds run concurrently. Exactly one
//! scheduler process is assumed: there is no distributed locking, and a
//! second instance would double-publish.
//!
//! Task bodies catch and log their own errors; a failed tick never kills
//! the loop. Shutdown is cooperative via a cancellation token.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use perch_config::model::SchedulerConfig;

use crate::metrics::MetricsRefresher;
use crate::orchestrator::PublishOrchestrator;
use crate::sync::SyncEngine;

/// Cadences for the three periodic tasks.
#[derive(Debug, Clone)]
pub struct SchedulerIntervals {
    pub due_check: Duration,
    pub metrics_refresh: Duration,
    pub history_sync: Duration,
}

impl Default for SchedulerIntervals {
    fn default() -> Self {
        Self {
            due_check: Duration::from_secs(60),
            metrics_refresh: Duration::from_secs(900),
            history_sync: Duration::from_secs(21_600),
        }
    }
}

impl SchedulerIntervals {
    pub fn from_config(scheduler: &SchedulerConfig) -> Self {
        Self {
            due_check: Duration::from_secs(scheduler.due_check_secs),
            metrics_refresh: Duration::from_secs(scheduler.metrics_refresh_secs),
            history_sync: Duration::from_secs(scheduler.history_sync_secs),
        }
    }
}

/// Owns the periodic tasks for one scheduler process.
pub struct Scheduler {
    orchestrator: Arc<PublishOrchestrator>,
    refresher: Arc<MetricsRefresher>,
    sync: Arc<SyncEngine>,
    accounts: Vec<String>,
    intervals: SchedulerIntervals,
}

impl Scheduler {
    pub fn new(
        orchestrator: Arc<PublishOrchestrator>,
        refresher: Arc<MetricsRefresher>,
        sync: Arc<SyncEngine>,
        accounts: Vec<String>,
        intervals: SchedulerIntervals,
    ) -> Self {
        Self {
            orchestrator,
            refresher,
            sync,
            accounts,
            intervals,
        }
    }

    /// Run all three loops until the token is cancelled.
    pub async fn run(&self, cancel: CancellationToken) {
        info!(
            accounts = self.accounts.len(),
            due_check_secs = self.intervals.due_check.as_secs(),
            metrics_refresh_secs = self.intervals.metrics_refresh.as_secs(),
            history_sync_secs = self.intervals.history_sync.as_secs(),
            "scheduler started"
        );
        tokio::join!(
            self.due_loop(cancel.clone()),
            self.metrics_loop(cancel.clone()),
            self.sync_loop(cancel.clone()),
        );
        info!("scheduler stopped");
    }

    /// Frequent: publish due posts. Ticks immediately on startup.
    async fn due_loop(&self, cancel: CancellationToken) {
        let mut ticker = tokio::time::interval(self.intervals.due_check);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {
                    match self.orchestrator.run_tick().await {
                        Ok(report) if report.examined > 0 => info!(
                            examined = report.examined,
                            published = report.published,
                            failed = report.failed,
                            waiting = report.waiting,
                            errors = report.errors,
                            "publish tick complete"
                        ),
                        Ok(_) => {}
                        Err(e) => warn!(error = %e, "publish tick failed"),
                    }
                }
            }
        }
    }

    /// Medium cadence: refresh counters for recently sent posts. First
    /// firing waits a full period.
    async fn metrics_loop(&self, cancel: CancellationToken) {
        let period = self.intervals.metrics_refresh;
        let mut ticker = interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {
                    for account in &self.accounts {
                        if let Err(e) = self.refresher.refresh_account(account).await {
                            warn!(account = %account, error = %e, "metric refresh failed");
                        }
                    }
                }
            }
        }
    }

    /// Infrequent: full history resync per account. First firing waits a
    /// full period.
    async fn sync_loop(&self, cancel: CancellationToken) {
        let period = self.intervals.history_sync;
        let mut ticker = interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {
                    for account in &self.accounts {
                        match self.sync.run(account).await {
                            Ok(report) => info!(
                                account = %account,
                                inserted = report.inserted,
                                updated = report.updated,
                                marked_deleted = report.marked_deleted,
                                "history resync complete"
                            ),
                            Err(e) => warn!(account = %account, error = %e, "history resync failed"),
                        }
                    }
                }
            }
        }
    }
}
