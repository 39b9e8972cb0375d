// SPDX-FileCopyrightText: 2026 Perch Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Entity store trait over posts and metric snapshots.
//!
//! Every method commits independently: the engine transitions posts and
//! merges records one unit at a time, so a failure partway through a tick
//! never rolls back siblings already committed.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::time::Duration;

use crate::error::PerchError;
use crate::types::{
    AccountMetricSnapshot, EngagementCounters, LogEntry, MetricsReading, NewPost, Post,
    PostFilter, PostMetricSnapshot, PostPatch, PostStatus, ProfileStats,
};

/// Mutable fields a reconciliation upsert may overwrite on an existing row.
/// `None` leaves the stored value untouched.
#[derive(Debug, Clone, Default)]
pub struct SyncApply {
    pub counters: EngagementCounters,
    pub media_ref: Option<String>,
    /// When the id-derived publish time is known it overwrites both
    /// `created_at` and `updated_at`, keeping re-runs deterministic.
    pub published_at: Option<DateTime<Utc>>,
    pub content: Option<String>,
    pub status: Option<PostStatus>,
}

/// A brand-new row created from an externally observed record.
#[derive(Debug, Clone)]
pub struct NewSyncedPost {
    pub account: String,
    pub external_id: String,
    pub content: String,
    pub media_refs: Vec<String>,
    pub status: PostStatus,
    pub published_at: DateTime<Utc>,
    pub counters: EngagementCounters,
    pub log: Vec<LogEntry>,
}

/// Persistence operations for posts and snapshots.
#[async_trait]
pub trait PostStore: Send + Sync {
    // --- Post CRUD (presentation-layer pass-throughs) ---

    async fn create_post(&self, new: NewPost, now: DateTime<Utc>) -> Result<Post, PerchError>;

    async fn get_post(&self, id: i64) -> Result<Option<Post>, PerchError>;

    async fn list_posts(&self, filter: PostFilter) -> Result<Vec<Post>, PerchError>;

    async fn update_post(
        &self,
        id: i64,
        patch: PostPatch,
        now: DateTime<Utc>,
    ) -> Result<Post, PerchError>;

    /// Delete a post and its snapshots. Returns `false` if it did not exist.
    async fn delete_post(&self, id: i64) -> Result<bool, PerchError>;

    async fn append_log(&self, id: i64, entry: LogEntry) -> Result<(), PerchError>;

    // --- Publish orchestration ---

    /// Posts eligible for a publish attempt this tick: scheduled and due,
    /// failed under the retry cap with the backoff elapsed, or stuck in
    /// processing past the stuck timeout.
    async fn due_posts(
        &self,
        now: DateTime<Utc>,
        retry_backoff: Duration,
        stuck_after: Duration,
        max_retries: u32,
    ) -> Result<Vec<Post>, PerchError>;

    /// Move a post into `processing`, bumping `retry_count` when the claim
    /// retries a failure. Returns the updated row.
    async fn claim_for_publish(
        &self,
        id: i64,
        increment_retry: bool,
        now: DateTime<Utc>,
    ) -> Result<Post, PerchError>;

    async fn finish_publish_success(
        &self,
        id: i64,
        external_id: Option<&str>,
        now: DateTime<Utc>,
        entry: LogEntry,
    ) -> Result<(), PerchError>;

    async fn finish_publish_failure(
        &self,
        id: i64,
        now: DateTime<Utc>,
        entry: LogEntry,
    ) -> Result<(), PerchError>;

    // --- Metric refresh ---

    /// Sent posts with an external id touched at or after `cutoff`.
    async fn sent_posts_updated_since(
        &self,
        account: &str,
        cutoff: DateTime<Utc>,
    ) -> Result<Vec<Post>, PerchError>;

    async fn update_engagement(
        &self,
        id: i64,
        reading: MetricsReading,
        now: DateTime<Utc>,
    ) -> Result<(), PerchError>;

    // --- Reconciliation ---

    async fn find_by_external_id(&self, external_id: &str)
        -> Result<Option<Post>, PerchError>;

    /// Restore every `deleted_on_x` post of the account to `sent`.
    /// Returns the ids that were healed.
    async fn heal_deleted_for_account(
        &self,
        account: &str,
        now: DateTime<Utc>,
    ) -> Result<Vec<i64>, PerchError>;

    /// Hard-delete posts (with snapshots) whose external id is listed.
    /// Returns how many posts were removed.
    async fn purge_by_external_ids(&self, external_ids: &[String]) -> Result<u64, PerchError>;

    async fn set_post_status(
        &self,
        id: i64,
        status: PostStatus,
        now: DateTime<Utc>,
    ) -> Result<(), PerchError>;

    async fn insert_synced(&self, new: NewSyncedPost) -> Result<Post, PerchError>;

    async fn apply_sync_update(
        &self,
        id: i64,
        update: SyncApply,
        entries: Vec<LogEntry>,
    ) -> Result<(), PerchError>;

    /// Deletion-detection candidates: the account's `sent`, non-repost
    /// posts with an external id whose publish date is at or after the
    /// scan horizon.
    async fn sent_posts_with_external_id_since(
        &self,
        account: &str,
        horizon: DateTime<Utc>,
    ) -> Result<Vec<Post>, PerchError>;

    // --- Snapshots ---

    async fn insert_post_snapshot(
        &self,
        post_id: i64,
        counters: EngagementCounters,
        recorded_at: DateTime<Utc>,
    ) -> Result<(), PerchError>;

    async fn latest_post_snapshot(
        &self,
        post_id: i64,
    ) -> Result<Option<PostMetricSnapshot>, PerchError>;

    async fn snapshots_for_post(
        &self,
        post_id: i64,
    ) -> Result<Vec<PostMetricSnapshot>, PerchError>;

    /// Snapshots recorded at or after `cutoff`, excluding those belonging
    /// to quarantined posts (quarantine never feeds aggregates).
    async fn snapshots_since(
        &self,
        cutoff: DateTime<Utc>,
    ) -> Result<Vec<PostMetricSnapshot>, PerchError>;

    async fn insert_account_snapshot(
        &self,
        account: &str,
        stats: ProfileStats,
        recorded_at: DateTime<Utc>,
    ) -> Result<(), PerchError>;

    async fn account_snapshots(
        &self,
        account: &str,
    ) -> Result<Vec<AccountMetricSnapshot>, PerchError>;
}
