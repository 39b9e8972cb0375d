// SPDX-FileCopyrightText: 2026 Perch Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The publish orchestrator: drives posts through their lifecycle.
//!
//! A tick selects due posts and processes them strictly one at a time:
//! the worker holds a single browser session and the platform rate-limits
//! aggressively. Every Agent call sits under a hard timeout; a timeout is
//! treated exactly like a reported failure, because an unconfirmed call
//! must never be assumed to have succeeded. Reconciliation is the only
//! source of truth for "did this actually publish".
//!
//! Each post's transition commits individually, so one post failing cannot
//! roll back siblings processed in the same tick.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use perch_config::model::{PublishConfig, SchedulerConfig};
use perch_core::{
    Clock, EngagementCounters, LogActor, LogEntry, PerchError, PlatformAgent, Post, PostStatus,
    PostStore, PublishOutcome, PublishRequest,
};

/// Timeouts and retry policy for the orchestrator.
#[derive(Debug, Clone)]
pub struct OrchestratorOptions {
    /// Hard timeout on a single publish call.
    pub publish_timeout: Duration,
    /// After this long in `processing`, a post counts as stuck (a previous
    /// tick died mid-flight) and becomes claimable again.
    pub stuck_after: Duration,
    /// Minimum wait between a failure and its retry.
    pub retry_backoff: Duration,
    /// A post whose `retry_count` reaches this never leaves `failed`.
    pub max_retries: u32,
    /// Fixed pause between consecutive Agent calls.
    pub inter_call_delay: Duration,
}

impl Default for OrchestratorOptions {
    fn default() -> Self {
        Self {
            publish_timeout: Duration::from_secs(120),
            stuck_after: Duration::from_secs(600),
            retry_backoff: Duration::from_secs(600),
            max_retries: 3,
            inter_call_delay: Duration::from_secs(10),
        }
    }
}

impl OrchestratorOptions {
    pub fn from_config(publish: &PublishConfig, scheduler: &SchedulerConfig) -> Self {
        Self {
            publish_timeout: Duration::from_secs(publish.timeout_secs),
            stuck_after: Duration::from_secs(publish.stuck_after_secs),
            retry_backoff: Duration::from_secs(publish.retry_backoff_secs),
            max_retries: publish.max_retries,
            inter_call_delay: Duration::from_secs(scheduler.inter_call_delay_secs),
        }
    }
}

/// What happened to a single post during a tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    Published,
    Failed,
    /// Skipped this tick; its parent is not ready yet.
    Waiting,
}

/// Summary of one orchestrator tick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickReport {
    pub examined: usize,
    pub published: usize,
    pub failed: usize,
    pub waiting: usize,
    pub errors: usize,
}

enum ParentDecision {
    ReplyTo(String),
    /// Publish standalone; an optional degraded-case reason gets logged.
    Standalone(Option<String>),
    Wait(String),
}

/// Drives individual posts through publish attempts.
pub struct PublishOrchestrator {
    store: Arc<dyn PostStore>,
    agent: Arc<dyn PlatformAgent>,
    clock: Arc<dyn Clock>,
    opts: OrchestratorOptions,
}

impl PublishOrchestrator {
    pub fn new(
        store: Arc<dyn PostStore>,
        agent: Arc<dyn PlatformAgent>,
        clock: Arc<dyn Clock>,
        opts: OrchestratorOptions,
    ) -> Self {
        Self {
            store,
            agent,
            clock,
            opts,
        }
    }

    /// Process every post due this tick, sequentially.
    pub async fn run_tick(&self) -> Result<TickReport, PerchError> {
        let now = self.clock.now();
        let due = self
            .store
            .due_posts(
                now,
                self.opts.retry_backoff,
                self.opts.stuck_after,
                self.opts.max_retries,
            )
            .await?;

        let mut report = TickReport {
            examined: due.len(),
            ..Default::default()
        };
        for (i, post) in due.iter().enumerate() {
            if i > 0 {
                tokio::time::sleep(self.opts.inter_call_delay).await;
            }
            match self.process_one(post).await {
                Ok(TickOutcome::Published) => report.published += 1,
                Ok(TickOutcome::Failed) => report.failed += 1,
                Ok(TickOutcome::Waiting) => report.waiting += 1,
                Err(e) => {
                    warn!(post_id = post.id, error = %e, "post processing aborted");
                    report.errors += 1;
                }
            }
        }
        Ok(report)
    }

    /// Trigger entry point: schedule the post for right now and attempt it
    /// immediately.
    pub async fn publish_now(&self, id: i64) -> Result<TickOutcome, PerchError> {
        let now = self.clock.now();
        let post = self
            .store
            .update_post(
                id,
                perch_core::PostPatch {
                    scheduled_at: Some(Some(now)),
                    status: Some(PostStatus::Scheduled),
                    ..Default::default()
                },
                now,
            )
            .await?;
        self.process_one(&post).await
    }

    /// Run one post through parent resolution, claim, Agent call, and
    /// commit. `post` is the pre-claim row from the due query.
    async fn process_one(&self, post: &Post) -> Result<TickOutcome, PerchError> {
        let reply_to = match self.resolve_parent(post).await? {
            ParentDecision::Wait(reason) => {
                debug!(post_id = post.id, %reason, "child skipped this tick");
                return Ok(TickOutcome::Waiting);
            }
            ParentDecision::ReplyTo(external_id) => Some(external_id),
            ParentDecision::Standalone(degraded) => {
                if let Some(reason) = degraded {
                    warn!(post_id = post.id, %reason, "publishing standalone");
                    self.store
                        .append_log(
                            post.id,
                            LogEntry::new(self.clock.now(), LogActor::Orchestrator, reason),
                        )
                        .await?;
                }
                None
            }
        };

        let was_failed = post.status == PostStatus::Failed;
        let claimed = self
            .store
            .claim_for_publish(post.id, was_failed, self.clock.now())
            .await?;
        info!(
            post_id = claimed.id,
            account = %claimed.account,
            retry = claimed.retry_count,
            as_reply = reply_to.is_some(),
            "publishing post"
        );

        let request = PublishRequest {
            account: claimed.account.clone(),
            content: claimed.content.clone(),
            media_refs: claimed.media_refs.clone(),
            reply_to_external_id: reply_to,
        };
        let outcome = match tokio::time::timeout(
            self.opts.publish_timeout,
            self.agent.publish(request),
        )
        .await
        {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(e)) => PublishOutcome::failure(format!("agent error: {e}")),
            Err(_) => PublishOutcome::failure(format!(
                "publish timed out after {:?}; attempt counted as failed",
                self.opts.publish_timeout
            )),
        };

        let finished_at = self.clock.now();
        let message = format!(
            "attempt {}: {}",
            claimed.retry_count,
            if outcome.log.is_empty() {
                "no log provided"
            } else {
                outcome.log.as_str()
            }
        );
        let entry = LogEntry::new(finished_at, LogActor::Orchestrator, message);

        if outcome.success {
            if outcome.external_id.is_none() {
                warn!(post_id = claimed.id, "publish succeeded but no external id was captured");
            }
            self.store
                .finish_publish_success(
                    claimed.id,
                    outcome.external_id.as_deref(),
                    finished_at,
                    entry,
                )
                .await?;
            // Baseline snapshot at publish time.
            self.store
                .insert_post_snapshot(claimed.id, EngagementCounters::default(), finished_at)
                .await?;
            info!(post_id = claimed.id, external_id = ?outcome.external_id, "post sent");
            Ok(TickOutcome::Published)
        } else {
            self.store
                .finish_publish_failure(claimed.id, finished_at, entry)
                .await?;
            warn!(post_id = claimed.id, retry = claimed.retry_count, "publish failed");
            Ok(TickOutcome::Failed)
        }
    }

    /// Resolve the thread parent before claiming, so a waiting child's row
    /// is left untouched this tick.
    async fn resolve_parent(&self, post: &Post) -> Result<ParentDecision, PerchError> {
        let Some(parent_id) = post.parent_id else {
            return Ok(ParentDecision::Standalone(None));
        };
        match self.store.get_post(parent_id).await? {
            None => Ok(ParentDecision::Standalone(Some(format!(
                "parent {parent_id} not found; publishing standalone"
            )))),
            Some(parent) if parent.status == PostStatus::Sent => match parent.external_id {
                Some(external_id) => Ok(ParentDecision::ReplyTo(external_id)),
                None => Ok(ParentDecision::Standalone(Some(format!(
                    "parent {parent_id} sent without an external id; publishing standalone"
                )))),
            },
            Some(parent) => Ok(ParentDecision::Wait(format!(
                "parent {} is {}",
                parent.id, parent.status
            ))),
        }
    }
}
