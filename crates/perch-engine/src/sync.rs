// SPDX-FileCopyrightText: 2026 Perch Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The reconciliation engine: merges externally observed account history
//! into the entity store.
//!
//! Run order is deliberate. Auto-heal runs first, before any new deletion
//! detection, since the design prefers false negatives (a missed deletion) over
//! false positives (a real post wrongly hidden). The blacklist purge is
//! unconditional; it does not depend on the batch. Deletion detection runs
//! last and only when the scan reported how far back it reliably reached.
//!
//! Records merge one at a time, each committed individually; a bad record
//! is logged and skipped without aborting the run.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use perch_config::model::SyncConfig;
use perch_core::{
    snowflake, Clock, EngagementCounters, LogActor, LogEntry, NewSyncedPost, PerchError,
    PlatformAgent, PostStatus, PostStore, ScrapedRecord, SyncApply, SyncOutcome,
    PLACEHOLDER_CONTENT,
};

use crate::debounce;

/// Reconciliation policy.
#[derive(Debug, Clone)]
pub struct SyncEngineOptions {
    /// Hard timeout on a full history scan.
    pub sync_timeout: Duration,
    /// External ids purged unconditionally at the start of every run.
    pub blacklist: Vec<String>,
}

impl Default for SyncEngineOptions {
    fn default() -> Self {
        Self {
            sync_timeout: Duration::from_secs(600),
            blacklist: Vec::new(),
        }
    }
}

impl SyncEngineOptions {
    pub fn from_config(sync: &SyncConfig) -> Self {
        Self {
            sync_timeout: Duration::from_secs(sync.timeout_secs),
            blacklist: sync.blacklist.clone(),
        }
    }
}

/// What a single record merge did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeAction {
    /// Structurally invalid (no external id); counted, never stored.
    SkippedInvalid,
    SkippedBlacklisted,
    SkippedRepost,
    /// A local row turned out to be a repost and was purged.
    PurgedRepost,
    Inserted {
        post_id: i64,
        quarantined: bool,
        snapshot: bool,
    },
    Updated {
        post_id: i64,
        snapshot: bool,
    },
}

/// Summary of one reconciliation run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncReport {
    pub healed: usize,
    pub purged_blacklisted: u64,
    pub inserted: usize,
    pub updated: usize,
    pub quarantined: usize,
    pub snapshots_added: usize,
    pub skipped_reposts: usize,
    pub skipped_invalid: usize,
    pub skipped_blacklisted: usize,
    pub purged_reposts: usize,
    pub marked_deleted: usize,
    pub errors: usize,
}

impl SyncReport {
    fn apply(&mut self, action: &MergeAction) {
        match action {
            MergeAction::SkippedInvalid => self.skipped_invalid += 1,
            MergeAction::SkippedBlacklisted => self.skipped_blacklisted += 1,
            MergeAction::SkippedRepost => self.skipped_reposts += 1,
            MergeAction::PurgedRepost => self.purged_reposts += 1,
            MergeAction::Inserted {
                quarantined,
                snapshot,
                ..
            } => {
                self.inserted += 1;
                if *quarantined {
                    self.quarantined += 1;
                }
                if *snapshot {
                    self.snapshots_added += 1;
                }
            }
            MergeAction::Updated { snapshot, .. } => {
                self.updated += 1;
                if *snapshot {
                    self.snapshots_added += 1;
                }
            }
        }
    }
}

/// Merges scanned account history into the entity store.
pub struct SyncEngine {
    store: Arc<dyn PostStore>,
    agent: Arc<dyn PlatformAgent>,
    clock: Arc<dyn Clock>,
    opts: SyncEngineOptions,
}

impl SyncEngine {
    pub fn new(
        store: Arc<dyn PostStore>,
        agent: Arc<dyn PlatformAgent>,
        clock: Arc<dyn Clock>,
        opts: SyncEngineOptions,
    ) -> Self {
        Self {
            store,
            agent,
            clock,
            opts,
        }
    }

    /// Scan the account's history through the Agent and reconcile the
    /// result into the store.
    pub async fn run(&self, account: &str) -> Result<SyncReport, PerchError> {
        info!(account, "starting history reconciliation");
        let outcome = match tokio::time::timeout(
            self.opts.sync_timeout,
            self.agent.sync_history(account),
        )
        .await
        {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(e)) => return Err(e),
            Err(_) => {
                return Err(PerchError::Timeout {
                    duration: self.opts.sync_timeout,
                })
            }
        };
        if !outcome.success {
            return Err(PerchError::agent(format!(
                "history scan failed: {}",
                outcome.log
            )));
        }
        self.reconcile(account, outcome).await
    }

    /// Merge an already-obtained scan result. Split out from [`run`] so
    /// tests can feed batches directly.
    ///
    /// [`run`]: SyncEngine::run
    pub async fn reconcile(
        &self,
        account: &str,
        outcome: SyncOutcome,
    ) -> Result<SyncReport, PerchError> {
        let mut report = SyncReport::default();
        let now = self.clock.now();

        // Auto-heal every deleted_on_x post before anything else looks at
        // the batch.
        let healed = self.store.heal_deleted_for_account(account, now).await?;
        for id in &healed {
            self.store
                .append_log(
                    *id,
                    LogEntry::new(
                        now,
                        LogActor::Sync,
                        "restored from deleted_on_x ahead of reconciliation",
                    ),
                )
                .await?;
        }
        report.healed = healed.len();

        // Unconditional blacklist purge, batch or no batch.
        report.purged_blacklisted = self
            .store
            .purge_by_external_ids(&self.opts.blacklist)
            .await?;

        // One account snapshot per successful run, changed or not: the
        // series also records when syncs happened.
        if let Some(profile) = &outcome.profile {
            self.store
                .insert_account_snapshot(account, profile.clone(), now)
                .await?;
        }

        // Per-record merge. The id set covers the whole batch, including
        // records skipped below, so deletion detection sees everything the
        // scan saw.
        let mut batch_ids: HashSet<String> = HashSet::new();
        for record in &outcome.posts {
            let external_id = record.external_id.trim();
            if !external_id.is_empty() {
                batch_ids.insert(external_id.to_string());
            }
            match self.merge_record(account, record).await {
                Ok(action) => report.apply(&action),
                Err(e) => {
                    warn!(
                        external_id = %record.external_id,
                        error = %e,
                        "record merge failed; continuing with the rest of the batch"
                    );
                    report.errors += 1;
                }
            }
        }

        // Deletion detection, bounded by the scan horizon. A post the scan
        // may simply have missed gets healed back at the start of the next
        // run; that is the only safeguard, by construction.
        if let Some(horizon) = outcome.scan_horizon {
            report.marked_deleted = self
                .detect_deletions(account, horizon, &batch_ids)
                .await?;
        }

        info!(
            account,
            healed = report.healed,
            inserted = report.inserted,
            updated = report.updated,
            quarantined = report.quarantined,
            snapshots = report.snapshots_added,
            marked_deleted = report.marked_deleted,
            errors = report.errors,
            "reconciliation finished"
        );
        Ok(report)
    }

    /// Fetch one post by URL through the Agent and merge it.
    pub async fn import_one(&self, url: &str, account: &str) -> Result<MergeAction, PerchError> {
        let outcome = match tokio::time::timeout(
            self.opts.sync_timeout,
            self.agent.import_one(url, account),
        )
        .await
        {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(e)) => return Err(e),
            Err(_) => {
                return Err(PerchError::Timeout {
                    duration: self.opts.sync_timeout,
                })
            }
        };
        if !outcome.success {
            return Err(PerchError::agent(format!("import failed: {}", outcome.log)));
        }
        let Some(record) = outcome.record else {
            return Err(PerchError::agent("import succeeded but returned no record"));
        };
        self.merge_record(account, &record).await
    }

    /// Merge a single observed record: validate, classify, resolve the
    /// publish date, apply the quality gate, upsert, and debounce the
    /// snapshot.
    pub async fn merge_record(
        &self,
        account: &str,
        record: &ScrapedRecord,
    ) -> Result<MergeAction, PerchError> {
        let external_id = record.external_id.trim();
        if external_id.is_empty() {
            warn!("record without an external id rejected");
            return Ok(MergeAction::SkippedInvalid);
        }
        if self.is_blacklisted(external_id) {
            debug!(external_id, "blacklisted record skipped");
            return Ok(MergeAction::SkippedBlacklisted);
        }

        let existing = self.store.find_by_external_id(external_id).await?;

        // Reposts are excluded from this system's notion of the account's
        // own posts; a local row under a repost id is an integrity hazard
        // and goes away with its snapshots.
        if record.is_repost {
            if let Some(post) = existing {
                info!(post_id = post.id, external_id, "purging local row for repost");
                self.store.delete_post(post.id).await?;
                return Ok(MergeAction::PurgedRepost);
            }
            debug!(external_id, "repost skipped");
            return Ok(MergeAction::SkippedRepost);
        }
        if let Some(post) = &existing
            && post.is_repost
        {
            info!(post_id = post.id, external_id, "purging legacy repost row");
            self.store.delete_post(post.id).await?;
            return Ok(MergeAction::PurgedRepost);
        }

        let now = self.clock.now();
        // The id-derived timestamp beats any rendered date string; the
        // string beats nothing at all.
        let scraped_date = snowflake::published_at_from_id(external_id)
            .or_else(|| parse_published_at(record.published_at.as_deref()));
        let counters = record.counters();
        let has_body = !record.content.trim().is_empty() || record.media_url.is_some();

        match existing {
            Some(post) => {
                let mut entries = Vec::new();
                let mut status_update = None;
                if post.status == PostStatus::DeletedOnX {
                    status_update = Some(PostStatus::Sent);
                    entries.push(LogEntry::new(
                        now,
                        LogActor::Sync,
                        "restored from deleted_on_x: found in scan",
                    ));
                } else if post.status == PostStatus::Quarantine && has_body {
                    status_update = Some(PostStatus::Sent);
                    entries.push(LogEntry::new(
                        now,
                        LogActor::Sync,
                        "quarantine lifted: content recovered by scan",
                    ));
                }
                let content_update = if !record.content.trim().is_empty()
                    && post.has_placeholder_content()
                {
                    Some(record.content.clone())
                } else {
                    None
                };

                self.store
                    .apply_sync_update(
                        post.id,
                        SyncApply {
                            counters,
                            media_ref: record.media_url.clone(),
                            published_at: scraped_date,
                            content: content_update,
                            status: status_update,
                        },
                        entries,
                    )
                    .await?;
                let snapshot = self.snapshot_if_changed(post.id, &counters).await?;
                Ok(MergeAction::Updated {
                    post_id: post.id,
                    snapshot,
                })
            }
            None => {
                // Quality gate: empty records and undateable records are
                // retained as quarantine, never silently dropped.
                let quarantined = !has_body || scraped_date.is_none();
                let status = if quarantined {
                    PostStatus::Quarantine
                } else {
                    PostStatus::Sent
                };
                let published_at = scraped_date.unwrap_or(now);
                let content = if record.content.trim().is_empty() {
                    PLACEHOLDER_CONTENT.to_string()
                } else {
                    record.content.clone()
                };
                let mut log = vec![LogEntry::new(
                    now,
                    LogActor::Sync,
                    "imported from history scan",
                )];
                if quarantined {
                    log.push(LogEntry::new(
                        now,
                        LogActor::Sync,
                        quarantine_reason(has_body, scraped_date),
                    ));
                }

                let post = self
                    .store
                    .insert_synced(NewSyncedPost {
                        account: account.to_string(),
                        external_id: external_id.to_string(),
                        content,
                        media_refs: record.media_url.clone().into_iter().collect(),
                        status,
                        published_at,
                        counters,
                        log,
                    })
                    .await?;
                let snapshot = self.snapshot_if_changed(post.id, &counters).await?;
                Ok(MergeAction::Inserted {
                    post_id: post.id,
                    quarantined,
                    snapshot,
                })
            }
        }
    }

    async fn detect_deletions(
        &self,
        account: &str,
        horizon: DateTime<Utc>,
        batch_ids: &HashSet<String>,
    ) -> Result<usize, PerchError> {
        let candidates = self
            .store
            .sent_posts_with_external_id_since(account, horizon)
            .await?;
        let mut marked = 0;
        for post in candidates {
            let Some(external_id) = &post.external_id else {
                continue;
            };
            if batch_ids.contains(external_id) {
                continue;
            }
            let at = self.clock.now();
            self.store
                .set_post_status(post.id, PostStatus::DeletedOnX, at)
                .await?;
            self.store
                .append_log(
                    post.id,
                    LogEntry::new(
                        at,
                        LogActor::Sync,
                        format!(
                            "absent from scan covering back to {}; marked deleted_on_x",
                            horizon.to_rfc3339()
                        ),
                    ),
                )
                .await?;
            warn!(
                post_id = post.id,
                external_id = %external_id,
                "post missing from scan; marked deleted_on_x"
            );
            marked += 1;
        }
        Ok(marked)
    }

    async fn snapshot_if_changed(
        &self,
        post_id: i64,
        counters: &EngagementCounters,
    ) -> Result<bool, PerchError> {
        let latest = self.store.latest_post_snapshot(post_id).await?;
        if debounce::needs_snapshot(latest.as_ref(), counters) {
            self.store
                .insert_post_snapshot(post_id, *counters, self.clock.now())
                .await?;
            return Ok(true);
        }
        Ok(false)
    }

    fn is_blacklisted(&self, external_id: &str) -> bool {
        self.opts.blacklist.iter().any(|b| b == external_id)
    }
}

fn parse_published_at(raw: Option<&str>) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw?.trim())
        .ok()
        .map(|d| d.with_timezone(&Utc))
}

fn quarantine_reason(has_body: bool, scraped_date: Option<DateTime<Utc>>) -> String {
    match (has_body, scraped_date) {
        (false, None) => "quarantined: no content, no media, no resolvable publish date".into(),
        (false, Some(_)) => "quarantined: no content and no media".into(),
        (true, None) => "quarantined: no resolvable publish date".into(),
        (true, Some(_)) => "quarantined".into(),
    }
}
