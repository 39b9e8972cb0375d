// SPDX-FileCopyrightText: 2026 Perch Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite implementation of the `PostStore` trait.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::OnceCell;
use tracing::debug;

use perch_config::model::StorageConfig;
use perch_core::{
    AccountMetricSnapshot, EngagementCounters, LogEntry, MetricsReading, NewPost, NewSyncedPost,
    PerchError, Post, PostFilter, PostMetricSnapshot, PostPatch, PostStatus, PostStore,
    ProfileStats, SyncApply,
};

use crate::database::Database;
use crate::queries;

/// SQLite-backed entity store.
///
/// Wraps a [`Database`] handle and delegates all query operations to the
/// typed query modules. The database is lazily opened on the first call to
/// [`SqliteStore::initialize`].
pub struct SqliteStore {
    config: StorageConfig,
    db: OnceCell<Database>,
}

impl SqliteStore {
    /// Create a new store with the given configuration.
    ///
    /// The database connection is not opened until [`initialize`] is called.
    ///
    /// [`initialize`]: SqliteStore::initialize
    pub fn new(config: StorageConfig) -> Self {
        Self {
            config,
            db: OnceCell::new(),
        }
    }

    /// Convenience for tests and one-shot commands: construct and open.
    pub async fn open(config: StorageConfig) -> Result<Self, PerchError> {
        let store = Self::new(config);
        store.initialize().await?;
        Ok(store)
    }

    /// Open the database and run migrations.
    pub async fn initialize(&self) -> Result<(), PerchError> {
        let db = Database::open(&self.config.database_path, self.config.wal_mode).await?;
        self.db.set(db).map_err(|_| PerchError::Storage {
            source: "storage already initialized".into(),
        })?;
        debug!(path = %self.config.database_path, "SQLite store initialized");
        Ok(())
    }

    /// Checkpoint the WAL and flush pending writes.
    pub async fn close(&self) -> Result<(), PerchError> {
        self.db()?.close().await
    }

    fn db(&self) -> Result<&Database, PerchError> {
        self.db.get().ok_or_else(|| PerchError::Storage {
            source: "storage not initialized -- call initialize() first".into(),
        })
    }
}

#[async_trait]
impl PostStore for SqliteStore {
    async fn create_post(&self, new: NewPost, now: DateTime<Utc>) -> Result<Post, PerchError> {
        queries::posts::create_post(self.db()?, new, now).await
    }

    async fn get_post(&self, id: i64) -> Result<Option<Post>, PerchError> {
        queries::posts::get_post(self.db()?, id).await
    }

    async fn list_posts(&self, filter: PostFilter) -> Result<Vec<Post>, PerchError> {
        queries::posts::list_posts(self.db()?, filter).await
    }

    async fn update_post(
        &self,
        id: i64,
        patch: PostPatch,
        now: DateTime<Utc>,
    ) -> Result<Post, PerchError> {
        queries::posts::update_post(self.db()?, id, patch, now).await
    }

    async fn delete_post(&self, id: i64) -> Result<bool, PerchError> {
        queries::posts::delete_post(self.db()?, id).await
    }

    async fn append_log(&self, id: i64, entry: LogEntry) -> Result<(), PerchError> {
        queries::posts::append_log(self.db()?, id, entry).await
    }

    async fn due_posts(
        &self,
        now: DateTime<Utc>,
        retry_backoff: Duration,
        stuck_after: Duration,
        max_retries: u32,
    ) -> Result<Vec<Post>, PerchError> {
        queries::posts::due_posts(self.db()?, now, retry_backoff, stuck_after, max_retries).await
    }

    async fn claim_for_publish(
        &self,
        id: i64,
        increment_retry: bool,
        now: DateTime<Utc>,
    ) -> Result<Post, PerchError> {
        queries::posts::claim_for_publish(self.db()?, id, increment_retry, now).await
    }

    async fn finish_publish_success(
        &self,
        id: i64,
        external_id: Option<&str>,
        now: DateTime<Utc>,
        entry: LogEntry,
    ) -> Result<(), PerchError> {
        queries::posts::finish_publish_success(
            self.db()?,
            id,
            external_id.map(str::to_string),
            now,
            entry,
        )
        .await
    }

    async fn finish_publish_failure(
        &self,
        id: i64,
        now: DateTime<Utc>,
        entry: LogEntry,
    ) -> Result<(), PerchError> {
        queries::posts::finish_publish_failure(self.db()?, id, now, entry).await
    }

    async fn sent_posts_updated_since(
        &self,
        account: &str,
        cutoff: DateTime<Utc>,
    ) -> Result<Vec<Post>, PerchError> {
        queries::posts::sent_posts_updated_since(self.db()?, account.to_string(), cutoff).await
    }

    async fn update_engagement(
        &self,
        id: i64,
        reading: MetricsReading,
        now: DateTime<Utc>,
    ) -> Result<(), PerchError> {
        queries::posts::update_engagement(self.db()?, id, reading, now).await
    }

    async fn find_by_external_id(
        &self,
        external_id: &str,
    ) -> Result<Option<Post>, PerchError> {
        queries::posts::find_by_external_id(self.db()?, external_id.to_string()).await
    }

    async fn heal_deleted_for_account(
        &self,
        account: &str,
        now: DateTime<Utc>,
    ) -> Result<Vec<i64>, PerchError> {
        queries::posts::heal_deleted_for_account(self.db()?, account.to_string(), now).await
    }

    async fn purge_by_external_ids(&self, external_ids: &[String]) -> Result<u64, PerchError> {
        queries::posts::purge_by_external_ids(self.db()?, external_ids.to_vec()).await
    }

    async fn set_post_status(
        &self,
        id: i64,
        status: PostStatus,
        now: DateTime<Utc>,
    ) -> Result<(), PerchError> {
        queries::posts::set_post_status(self.db()?, id, status, now).await
    }

    async fn insert_synced(&self, new: NewSyncedPost) -> Result<Post, PerchError> {
        queries::posts::insert_synced(self.db()?, new).await
    }

    async fn apply_sync_update(
        &self,
        id: i64,
        update: SyncApply,
        entries: Vec<LogEntry>,
    ) -> Result<(), PerchError> {
        queries::posts::apply_sync_update(self.db()?, id, update, entries).await
    }

    async fn sent_posts_with_external_id_since(
        &self,
        account: &str,
        horizon: DateTime<Utc>,
    ) -> Result<Vec<Post>, PerchError> {
        queries::posts::sent_posts_with_external_id_since(
            self.db()?,
            account.to_string(),
            horizon,
        )
        .await
    }

    async fn insert_post_snapshot(
        &self,
        post_id: i64,
        counters: EngagementCounters,
        recorded_at: DateTime<Utc>,
    ) -> Result<(), PerchError> {
        queries::snapshots::insert_post_snapshot(self.db()?, post_id, counters, recorded_at).await
    }

    async fn latest_post_snapshot(
        &self,
        post_id: i64,
    ) -> Result<Option<PostMetricSnapshot>, PerchError> {
        queries::snapshots::latest_post_snapshot(self.db()?, post_id).await
    }

    async fn snapshots_for_post(
        &self,
        post_id: i64,
    ) -> Result<Vec<PostMetricSnapshot>, PerchError> {
        queries::snapshots::snapshots_for_post(self.db()?, post_id).await
    }

    async fn snapshots_since(
        &self,
        cutoff: DateTime<Utc>,
    ) -> Result<Vec<PostMetricSnapshot>, PerchError> {
        queries::snapshots::snapshots_since(self.db()?, cutoff).await
    }

    async fn insert_account_snapshot(
        &self,
        account: &str,
        stats: ProfileStats,
        recorded_at: DateTime<Utc>,
    ) -> Result<(), PerchError> {
        queries::snapshots::insert_account_snapshot(
            self.db()?,
            account.to_string(),
            stats,
            recorded_at,
        )
        .await
    }

    async fn account_snapshots(
        &self,
        account: &str,
    ) -> Result<Vec<AccountMetricSnapshot>, PerchError> {
        queries::snapshots::account_snapshots(self.db()?, account.to_string()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use tempfile::tempdir;

    fn make_config(path: &str) -> StorageConfig {
        StorageConfig {
            database_path: path.to_string(),
            wal_mode: true,
        }
    }

    #[tokio::test]
    async fn initialize_creates_database_file() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("init.db");
        let store = SqliteStore::new(make_config(db_path.to_str().unwrap()));
        store.initialize().await.unwrap();
        assert!(db_path.exists(), "database file should be created");
    }

    #[tokio::test]
    async fn initialize_twice_returns_error() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("double_init.db");
        let store = SqliteStore::new(make_config(db_path.to_str().unwrap()));
        store.initialize().await.unwrap();
        assert!(store.initialize().await.is_err());
    }

    #[tokio::test]
    async fn operations_fail_before_initialize() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("uninit.db");
        let store = SqliteStore::new(make_config(db_path.to_str().unwrap()));
        let result = store.get_post(1).await;
        assert!(result.is_err(), "queries before initialize should fail");
    }

    #[tokio::test]
    async fn full_lifecycle_through_the_trait() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("lifecycle.db");
        let store = SqliteStore::open(make_config(db_path.to_str().unwrap()))
            .await
            .unwrap();
        let now = Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap();

        let post = store
            .create_post(
                NewPost {
                    account: "sparrow".into(),
                    content: "hello".into(),
                    media_refs: vec!["uploads/pic.png".into()],
                    scheduled_at: Some(now),
                    parent_id: None,
                },
                now,
            )
            .await
            .unwrap();
        assert_eq!(post.status, PostStatus::Scheduled);

        let due = store
            .due_posts(
                now,
                Duration::from_secs(600),
                Duration::from_secs(600),
                3,
            )
            .await
            .unwrap();
        assert_eq!(due.len(), 1);

        let claimed = store.claim_for_publish(post.id, false, now).await.unwrap();
        assert_eq!(claimed.status, PostStatus::Processing);

        store
            .finish_publish_success(
                post.id,
                Some("111"),
                now,
                LogEntry::new(now, perch_core::LogActor::Orchestrator, "published"),
            )
            .await
            .unwrap();
        store
            .insert_post_snapshot(post.id, EngagementCounters::default(), now)
            .await
            .unwrap();

        let sent = store.get_post(post.id).await.unwrap().unwrap();
        assert_eq!(sent.status, PostStatus::Sent);
        assert_eq!(sent.external_id.as_deref(), Some("111"));
        assert_eq!(store.snapshots_for_post(post.id).await.unwrap().len(), 1);

        assert!(store.delete_post(post.id).await.unwrap());
        assert!(store.get_post(post.id).await.unwrap().is_none());
        assert!(store.snapshots_for_post(post.id).await.unwrap().is_empty());

        store.close().await.unwrap();
    }
}
