// SPDX-FileCopyrightText: 2026 Perch Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Direct metric refresh for recently sent posts.
//!
//! Between full history syncs, posts sent within the lookback window get
//! their headline counters (views, likes, reposts) re-scraped one at a
//! time. No snapshots are written here; the time series is fed by the
//! publish baseline and by reconciliation's debounced observations.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use perch_config::model::{SchedulerConfig, SyncConfig};
use perch_core::{Clock, MetricsOutcome, PerchError, PlatformAgent, PostStore};

/// Policy for the metric refresh pass.
#[derive(Debug, Clone)]
pub struct RefreshOptions {
    /// How far back to look for recently sent posts.
    pub lookback: Duration,
    /// Hard timeout on a single metric scrape.
    pub scrape_timeout: Duration,
    /// Fixed pause between consecutive scrapes.
    pub inter_call_delay: Duration,
}

impl Default for RefreshOptions {
    fn default() -> Self {
        Self {
            lookback: Duration::from_secs(48 * 3600),
            scrape_timeout: Duration::from_secs(60),
            inter_call_delay: Duration::from_secs(10),
        }
    }
}

impl RefreshOptions {
    pub fn from_config(sync: &SyncConfig, scheduler: &SchedulerConfig) -> Self {
        Self {
            lookback: Duration::from_secs(sync.metrics_lookback_hours * 3600),
            scrape_timeout: Duration::from_secs(sync.scrape_timeout_secs),
            inter_call_delay: Duration::from_secs(scheduler.inter_call_delay_secs),
        }
    }
}

/// Summary of one refresh pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RefreshReport {
    pub examined: usize,
    pub updated: usize,
    pub failed: usize,
}

/// Re-scrapes engagement counters for recently sent posts.
pub struct MetricsRefresher {
    store: Arc<dyn PostStore>,
    agent: Arc<dyn PlatformAgent>,
    clock: Arc<dyn Clock>,
    opts: RefreshOptions,
}

impl MetricsRefresher {
    pub fn new(
        store: Arc<dyn PostStore>,
        agent: Arc<dyn PlatformAgent>,
        clock: Arc<dyn Clock>,
        opts: RefreshOptions,
    ) -> Self {
        Self {
            store,
            agent,
            clock,
            opts,
        }
    }

    /// Refresh every recently sent post of the account, sequentially.
    pub async fn refresh_account(&self, account: &str) -> Result<RefreshReport, PerchError> {
        let now = self.clock.now();
        let cutoff = now - chrono::Duration::seconds(self.opts.lookback.as_secs() as i64);
        let posts = self.store.sent_posts_updated_since(account, cutoff).await?;

        let mut report = RefreshReport {
            examined: posts.len(),
            ..Default::default()
        };
        for (i, post) in posts.iter().enumerate() {
            if i > 0 {
                tokio::time::sleep(self.opts.inter_call_delay).await;
            }
            let Some(external_id) = &post.external_id else {
                continue;
            };

            let outcome = match tokio::time::timeout(
                self.opts.scrape_timeout,
                self.agent.scrape_metrics(external_id, account),
            )
            .await
            {
                Ok(Ok(outcome)) => outcome,
                Ok(Err(e)) => MetricsOutcome {
                    success: false,
                    log: format!("agent error: {e}"),
                    ..Default::default()
                },
                Err(_) => MetricsOutcome {
                    success: false,
                    log: format!("scrape timed out after {:?}", self.opts.scrape_timeout),
                    ..Default::default()
                },
            };

            if outcome.success {
                self.store
                    .update_engagement(post.id, outcome.metrics, self.clock.now())
                    .await?;
                debug!(post_id = post.id, views = outcome.metrics.views, "metrics refreshed");
                report.updated += 1;
            } else {
                warn!(post_id = post.id, log = %outcome.log, "metric scrape failed");
                report.failed += 1;
            }
        }

        if report.examined > 0 {
            info!(
                account,
                examined = report.examined,
                updated = report.updated,
                failed = report.failed,
                "metric refresh pass complete"
            );
        }
        Ok(report)
    }
}
