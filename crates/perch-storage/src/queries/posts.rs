// SPDX-FileCopyrightText: 2026 Perch Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Post row operations.
//!
//! Every public function commits independently. The engine relies on that:
//! one post failing mid-tick must not roll back siblings already written.

use std::time::Duration;

use chrono::{DateTime, Utc};
use perch_core::{
    EngagementCounters, LogEntry, MetricsReading, NewPost, NewSyncedPost, PerchError, Post,
    PostFilter, PostPatch, PostStatus, SyncApply,
};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Row};

use crate::database::{map_tr_err, Database};
use crate::queries::{parse_json, parse_ts, ts};

pub(crate) const POST_COLUMNS: &str = "id, account, content, media_refs, scheduled_at, status, \
     created_at, updated_at, retry_count, parent_id, external_id, \
     views, likes, reposts, bookmarks, replies, url_clicks, profile_clicks, detail_expands, \
     is_repost, logs";

fn row_to_post(row: &Row<'_>) -> Result<Post, rusqlite::Error> {
    let media_raw: String = row.get(3)?;
    let status_raw: String = row.get(5)?;
    let scheduled_raw: Option<String> = row.get(4)?;
    let created_raw: String = row.get(6)?;
    let updated_raw: String = row.get(7)?;
    let logs_raw: String = row.get(20)?;

    let status = status_raw.parse::<PostStatus>().map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(5, rusqlite::types::Type::Text, Box::new(e))
    })?;

    Ok(Post {
        id: row.get(0)?,
        account: row.get(1)?,
        content: row.get(2)?,
        media_refs: parse_json(3, &media_raw)?,
        scheduled_at: scheduled_raw.as_deref().map(|s| parse_ts(4, s)).transpose()?,
        status,
        created_at: parse_ts(6, &created_raw)?,
        updated_at: parse_ts(7, &updated_raw)?,
        retry_count: row.get(8)?,
        parent_id: row.get(9)?,
        external_id: row.get(10)?,
        metrics: EngagementCounters {
            views: row.get(11)?,
            likes: row.get(12)?,
            reposts: row.get(13)?,
            bookmarks: row.get(14)?,
            replies: row.get(15)?,
            url_clicks: row.get(16)?,
            profile_clicks: row.get(17)?,
            detail_expands: row.get(18)?,
        },
        is_repost: row.get(19)?,
        logs: parse_json(20, &logs_raw)?,
    })
}

fn read_post(conn: &rusqlite::Connection, id: i64) -> Result<Option<Post>, rusqlite::Error> {
    let mut stmt = conn.prepare(&format!("SELECT {POST_COLUMNS} FROM posts WHERE id = ?1"))?;
    match stmt.query_row(params![id], row_to_post) {
        Ok(post) => Ok(Some(post)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e),
    }
}

fn json_string<T: serde::Serialize>(value: &T) -> Result<String, rusqlite::Error> {
    serde_json::to_string(value).map_err(|e| {
        rusqlite::Error::ToSqlConversionFailure(Box::new(e))
    })
}

fn append_log_entries(
    conn: &rusqlite::Connection,
    id: i64,
    entries: &[LogEntry],
) -> Result<(), rusqlite::Error> {
    if entries.is_empty() {
        return Ok(());
    }
    let raw: String =
        conn.query_row("SELECT logs FROM posts WHERE id = ?1", params![id], |row| {
            row.get(0)
        })?;
    let mut logs: Vec<LogEntry> = parse_json(0, &raw)?;
    logs.extend_from_slice(entries);
    conn.execute(
        "UPDATE posts SET logs = ?1 WHERE id = ?2",
        params![json_string(&logs)?, id],
    )?;
    Ok(())
}

/// Create a user-authored draft. A schedule time moves it straight to
/// `scheduled`.
pub async fn create_post(
    db: &Database,
    new: NewPost,
    now: DateTime<Utc>,
) -> Result<Post, PerchError> {
    db.connection()
        .call(move |conn| {
            let status = if new.scheduled_at.is_some() {
                PostStatus::Scheduled
            } else {
                PostStatus::Draft
            };
            conn.execute(
                "INSERT INTO posts (account, content, media_refs, scheduled_at, status, \
                 created_at, updated_at, parent_id, logs)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, '[]')",
                params![
                    new.account,
                    new.content,
                    json_string(&new.media_refs)?,
                    new.scheduled_at.as_ref().map(ts),
                    status.to_string(),
                    ts(&now),
                    ts(&now),
                    new.parent_id,
                ],
            )?;
            let id = conn.last_insert_rowid();
            read_post(conn, id)?.ok_or(rusqlite::Error::QueryReturnedNoRows)
        })
        .await
        .map_err(map_tr_err)
}

pub async fn get_post(db: &Database, id: i64) -> Result<Option<Post>, PerchError> {
    db.connection()
        .call(move |conn| Ok(read_post(conn, id)?))
        .await
        .map_err(map_tr_err)
}

/// List posts, newest first. Quarantined rows are hidden unless asked for
/// explicitly (by flag or by filtering on the quarantine status itself).
pub async fn list_posts(db: &Database, filter: PostFilter) -> Result<Vec<Post>, PerchError> {
    db.connection()
        .call(move |conn| {
            let mut sql = format!("SELECT {POST_COLUMNS} FROM posts WHERE 1=1");
            let mut args: Vec<Value> = Vec::new();

            if let Some(account) = &filter.account {
                sql.push_str(" AND account = ?");
                args.push(Value::Text(account.clone()));
            }
            match filter.status {
                Some(status) => {
                    sql.push_str(" AND status = ?");
                    args.push(Value::Text(status.to_string()));
                }
                None => {
                    if !filter.include_quarantine {
                        sql.push_str(" AND status <> 'quarantine'");
                    }
                }
            }
            sql.push_str(" ORDER BY created_at DESC, id DESC");
            if let Some(limit) = filter.limit {
                sql.push_str(" LIMIT ?");
                args.push(Value::Integer(limit));
            } else if filter.offset > 0 {
                // SQLite requires a LIMIT clause before OFFSET.
                sql.push_str(" LIMIT -1");
            }
            if filter.offset > 0 {
                sql.push_str(" OFFSET ?");
                args.push(Value::Integer(filter.offset));
            }

            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt.query_map(params_from_iter(args), row_to_post)?;
            let mut posts = Vec::new();
            for row in rows {
                posts.push(row?);
            }
            Ok(posts)
        })
        .await
        .map_err(map_tr_err)
}

/// Apply a partial update. `None` fields are left untouched; setting a
/// schedule on a draft moves it to `scheduled`.
pub async fn update_post(
    db: &Database,
    id: i64,
    patch: PostPatch,
    now: DateTime<Utc>,
) -> Result<Post, PerchError> {
    if patch.parent_id == Some(Some(id)) {
        return Err(PerchError::Internal(format!(
            "post {id} cannot be its own parent"
        )));
    }
    db.connection()
        .call(move |conn| {
            let tx = conn.transaction()?;
            let Some(mut post) = read_post(&tx, id)? else {
                tx.commit()?;
                return Ok(None);
            };

            if let Some(content) = patch.content {
                post.content = content;
            }
            if let Some(media_refs) = patch.media_refs {
                post.media_refs = media_refs;
            }
            if let Some(scheduled_at) = patch.scheduled_at {
                post.scheduled_at = scheduled_at;
                if scheduled_at.is_some() && post.status == PostStatus::Draft {
                    post.status = PostStatus::Scheduled;
                }
            }
            if let Some(parent_id) = patch.parent_id {
                post.parent_id = parent_id;
            }
            if let Some(status) = patch.status {
                post.status = status;
            }

            tx.execute(
                "UPDATE posts SET content = ?1, media_refs = ?2, scheduled_at = ?3, \
                 status = ?4, parent_id = ?5, updated_at = ?6 WHERE id = ?7",
                params![
                    post.content,
                    json_string(&post.media_refs)?,
                    post.scheduled_at.as_ref().map(ts),
                    post.status.to_string(),
                    post.parent_id,
                    ts(&now),
                    id,
                ],
            )?;
            let updated = read_post(&tx, id)?;
            tx.commit()?;
            Ok(updated)
        })
        .await
        .map_err(map_tr_err)?
        .ok_or_else(|| PerchError::NotFound {
            what: "post",
            id: id.to_string(),
        })
}

/// Delete a post and its snapshots. Returns `false` if it did not exist.
pub async fn delete_post(db: &Database, id: i64) -> Result<bool, PerchError> {
    db.connection()
        .call(move |conn| {
            let tx = conn.transaction()?;
            tx.execute(
                "DELETE FROM post_metric_snapshots WHERE post_id = ?1",
                params![id],
            )?;
            let deleted = tx.execute("DELETE FROM posts WHERE id = ?1", params![id])?;
            tx.commit()?;
            Ok(deleted > 0)
        })
        .await
        .map_err(map_tr_err)
}

pub async fn append_log(db: &Database, id: i64, entry: LogEntry) -> Result<(), PerchError> {
    db.connection()
        .call(move |conn| {
            let tx = conn.transaction()?;
            append_log_entries(&tx, id, std::slice::from_ref(&entry))?;
            tx.commit()?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

/// Posts eligible for a publish attempt: due scheduled posts, failed posts
/// under the retry cap whose backoff has elapsed, and posts stuck in
/// `processing` past the stuck timeout.
pub async fn due_posts(
    db: &Database,
    now: DateTime<Utc>,
    retry_backoff: Duration,
    stuck_after: Duration,
    max_retries: u32,
) -> Result<Vec<Post>, PerchError> {
    let backoff_cutoff = now - chrono::Duration::seconds(retry_backoff.as_secs() as i64);
    let stuck_cutoff = now - chrono::Duration::seconds(stuck_after.as_secs() as i64);
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {POST_COLUMNS} FROM posts WHERE
                   (status = 'scheduled' AND scheduled_at IS NOT NULL AND scheduled_at <= ?1)
                   OR (status = 'failed' AND retry_count < ?2 AND updated_at <= ?3)
                   OR (status = 'processing' AND updated_at <= ?4)
                 ORDER BY COALESCE(scheduled_at, updated_at) ASC, id ASC"
            ))?;
            let rows = stmt.query_map(
                params![
                    ts(&now),
                    max_retries,
                    ts(&backoff_cutoff),
                    ts(&stuck_cutoff)
                ],
                row_to_post,
            )?;
            let mut posts = Vec::new();
            for row in rows {
                posts.push(row?);
            }
            Ok(posts)
        })
        .await
        .map_err(map_tr_err)
}

/// Move a post into `processing`, bumping `retry_count` when this claim
/// retries a failure.
pub async fn claim_for_publish(
    db: &Database,
    id: i64,
    increment_retry: bool,
    now: DateTime<Utc>,
) -> Result<Post, PerchError> {
    db.connection()
        .call(move |conn| {
            let bump: i64 = if increment_retry { 1 } else { 0 };
            let changed = conn.execute(
                "UPDATE posts SET status = 'processing', retry_count = retry_count + ?1, \
                 updated_at = ?2 WHERE id = ?3",
                params![bump, ts(&now), id],
            )?;
            if changed == 0 {
                return Ok(None);
            }
            Ok(read_post(conn, id)?)
        })
        .await
        .map_err(map_tr_err)?
        .ok_or_else(|| PerchError::NotFound {
            what: "post",
            id: id.to_string(),
        })
}

pub async fn finish_publish_success(
    db: &Database,
    id: i64,
    external_id: Option<String>,
    now: DateTime<Utc>,
    entry: LogEntry,
) -> Result<(), PerchError> {
    db.connection()
        .call(move |conn| {
            let tx = conn.transaction()?;
            tx.execute(
                "UPDATE posts SET status = 'sent', external_id = ?1, updated_at = ?2 \
                 WHERE id = ?3",
                params![external_id, ts(&now), id],
            )?;
            append_log_entries(&tx, id, std::slice::from_ref(&entry))?;
            tx.commit()?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

pub async fn finish_publish_failure(
    db: &Database,
    id: i64,
    now: DateTime<Utc>,
    entry: LogEntry,
) -> Result<(), PerchError> {
    db.connection()
        .call(move |conn| {
            let tx = conn.transaction()?;
            tx.execute(
                "UPDATE posts SET status = 'failed', updated_at = ?1 WHERE id = ?2",
                params![ts(&now), id],
            )?;
            append_log_entries(&tx, id, std::slice::from_ref(&entry))?;
            tx.commit()?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

/// Sent posts with an external id touched at or after `cutoff`, for the
/// metrics refresher.
pub async fn sent_posts_updated_since(
    db: &Database,
    account: String,
    cutoff: DateTime<Utc>,
) -> Result<Vec<Post>, PerchError> {
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {POST_COLUMNS} FROM posts WHERE account = ?1 AND status = 'sent' \
                 AND external_id IS NOT NULL AND updated_at >= ?2 \
                 ORDER BY updated_at DESC, id DESC"
            ))?;
            let rows = stmt.query_map(params![account, ts(&cutoff)], row_to_post)?;
            let mut posts = Vec::new();
            for row in rows {
                posts.push(row?);
            }
            Ok(posts)
        })
        .await
        .map_err(map_tr_err)
}

/// Overwrite the directly scrapeable counters after a metric refresh.
pub async fn update_engagement(
    db: &Database,
    id: i64,
    reading: MetricsReading,
    now: DateTime<Utc>,
) -> Result<(), PerchError> {
    db.connection()
        .call(move |conn| {
            conn.execute(
                "UPDATE posts SET views = ?1, likes = ?2, reposts = ?3, updated_at = ?4 \
                 WHERE id = ?5",
                params![reading.views, reading.likes, reading.reposts, ts(&now), id],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

pub async fn find_by_external_id(
    db: &Database,
    external_id: String,
) -> Result<Option<Post>, PerchError> {
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {POST_COLUMNS} FROM posts WHERE external_id = ?1"
            ))?;
            match stmt.query_row(params![external_id], row_to_post) {
                Ok(post) => Ok(Some(post)),
                Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                Err(e) => Err(e.into()),
            }
        })
        .await
        .map_err(map_tr_err)
}

/// Restore every `deleted_on_x` post of the account to `sent`, returning
/// the healed ids.
pub async fn heal_deleted_for_account(
    db: &Database,
    account: String,
    now: DateTime<Utc>,
) -> Result<Vec<i64>, PerchError> {
    db.connection()
        .call(move |conn| {
            let tx = conn.transaction()?;
            let ids = {
                let mut stmt = tx.prepare(
                    "SELECT id FROM posts WHERE account = ?1 AND status = 'deleted_on_x' \
                     ORDER BY id ASC",
                )?;
                let rows = stmt.query_map(params![account], |row| row.get::<_, i64>(0))?;
                let mut ids = Vec::new();
                for row in rows {
                    ids.push(row?);
                }
                ids
            };
            tx.execute(
                "UPDATE posts SET status = 'sent', updated_at = ?1 \
                 WHERE account = ?2 AND status = 'deleted_on_x'",
                params![ts(&now), account],
            )?;
            tx.commit()?;
            Ok(ids)
        })
        .await
        .map_err(map_tr_err)
}

/// Hard-delete posts (with snapshots) whose external id is listed.
pub async fn purge_by_external_ids(
    db: &Database,
    external_ids: Vec<String>,
) -> Result<u64, PerchError> {
    if external_ids.is_empty() {
        return Ok(0);
    }
    db.connection()
        .call(move |conn| {
            let tx = conn.transaction()?;
            let mut purged = 0u64;
            for external_id in &external_ids {
                let post_id: Option<i64> = match tx.query_row(
                    "SELECT id FROM posts WHERE external_id = ?1",
                    params![external_id],
                    |row| row.get(0),
                ) {
                    Ok(id) => Some(id),
                    Err(rusqlite::Error::QueryReturnedNoRows) => None,
                    Err(e) => return Err(e.into()),
                };
                if let Some(post_id) = post_id {
                    tx.execute(
                        "DELETE FROM post_metric_snapshots WHERE post_id = ?1",
                        params![post_id],
                    )?;
                    tx.execute("DELETE FROM posts WHERE id = ?1", params![post_id])?;
                    purged += 1;
                }
            }
            tx.commit()?;
            Ok(purged)
        })
        .await
        .map_err(map_tr_err)
}

pub async fn set_post_status(
    db: &Database,
    id: i64,
    status: PostStatus,
    now: DateTime<Utc>,
) -> Result<(), PerchError> {
    let changed = db
        .connection()
        .call(move |conn| {
            Ok(conn.execute(
                "UPDATE posts SET status = ?1, updated_at = ?2 WHERE id = ?3",
                params![status.to_string(), ts(&now), id],
            )?)
        })
        .await
        .map_err(map_tr_err)?;
    if changed == 0 {
        return Err(PerchError::NotFound {
            what: "post",
            id: id.to_string(),
        });
    }
    Ok(())
}

/// Insert a row created from an externally observed record.
pub async fn insert_synced(db: &Database, new: NewSyncedPost) -> Result<Post, PerchError> {
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO posts (account, content, media_refs, status, created_at, \
                 updated_at, external_id, views, likes, reposts, bookmarks, replies, \
                 url_clicks, profile_clicks, detail_expands, is_repost, logs)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, 0, ?16)",
                params![
                    new.account,
                    new.content,
                    json_string(&new.media_refs)?,
                    new.status.to_string(),
                    ts(&new.published_at),
                    ts(&new.published_at),
                    new.external_id,
                    new.counters.views,
                    new.counters.likes,
                    new.counters.reposts,
                    new.counters.bookmarks,
                    new.counters.replies,
                    new.counters.url_clicks,
                    new.counters.profile_clicks,
                    new.counters.detail_expands,
                    json_string(&new.log)?,
                ],
            )?;
            let id = conn.last_insert_rowid();
            read_post(conn, id)?.ok_or(rusqlite::Error::QueryReturnedNoRows)
        })
        .await
        .map_err(map_tr_err)
}

/// Overwrite the mutable fields of an existing row from an observed record.
pub async fn apply_sync_update(
    db: &Database,
    id: i64,
    update: SyncApply,
    entries: Vec<LogEntry>,
) -> Result<(), PerchError> {
    db.connection()
        .call(move |conn| {
            let tx = conn.transaction()?;
            let Some(post) = read_post(&tx, id)? else {
                tx.commit()?;
                return Ok(false);
            };

            let media_refs = match &update.media_ref {
                Some(m) => vec![m.clone()],
                None => post.media_refs,
            };
            let content = update.content.unwrap_or(post.content);
            let status = update.status.unwrap_or(post.status);
            let (created_at, updated_at) = match update.published_at {
                Some(d) => (d, d),
                None => (post.created_at, post.updated_at),
            };

            tx.execute(
                "UPDATE posts SET content = ?1, media_refs = ?2, status = ?3, \
                 created_at = ?4, updated_at = ?5, views = ?6, likes = ?7, reposts = ?8, \
                 bookmarks = ?9, replies = ?10, url_clicks = ?11, profile_clicks = ?12, \
                 detail_expands = ?13 WHERE id = ?14",
                params![
                    content,
                    json_string(&media_refs)?,
                    status.to_string(),
                    ts(&created_at),
                    ts(&updated_at),
                    update.counters.views,
                    update.counters.likes,
                    update.counters.reposts,
                    update.counters.bookmarks,
                    update.counters.replies,
                    update.counters.url_clicks,
                    update.counters.profile_clicks,
                    update.counters.detail_expands,
                    id,
                ],
            )?;
            append_log_entries(&tx, id, &entries)?;
            tx.commit()?;
            Ok(true)
        })
        .await
        .map_err(map_tr_err)?
        .then_some(())
        .ok_or_else(|| PerchError::NotFound {
            what: "post",
            id: id.to_string(),
        })
}

/// Deletion-detection candidates: sent, non-repost posts with an external
/// id whose publish date is at or after the scan horizon.
pub async fn sent_posts_with_external_id_since(
    db: &Database,
    account: String,
    horizon: DateTime<Utc>,
) -> Result<Vec<Post>, PerchError> {
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {POST_COLUMNS} FROM posts WHERE account = ?1 AND status = 'sent' \
                 AND external_id IS NOT NULL AND is_repost = 0 AND created_at >= ?2 \
                 ORDER BY created_at ASC, id ASC"
            ))?;
            let rows = stmt.query_map(params![account, ts(&horizon)], row_to_post)?;
            let mut posts = Vec::new();
            for row in rows {
                posts.push(row?);
            }
            Ok(posts)
        })
        .await
        .map_err(map_tr_err)
}
