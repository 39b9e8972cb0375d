// SPDX-FileCopyrightText: 2026 Perch Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Metric snapshot operations.
//!
//! Snapshots are append-only: inserted, never updated, deleted only when
//! their parent post is deleted.

use chrono::{DateTime, Utc};
use perch_core::{AccountMetricSnapshot, EngagementCounters, PerchError, PostMetricSnapshot, ProfileStats};
use rusqlite::{params, Row};

use crate::database::{map_tr_err, Database};
use crate::queries::{parse_ts, ts};

const SNAPSHOT_COLUMNS: &str =
    "id, post_id, views, likes, reposts, bookmarks, replies, recorded_at";

fn row_to_snapshot(row: &Row<'_>) -> Result<PostMetricSnapshot, rusqlite::Error> {
    let recorded_raw: String = row.get(7)?;
    Ok(PostMetricSnapshot {
        id: row.get(0)?,
        post_id: row.get(1)?,
        views: row.get(2)?,
        likes: row.get(3)?,
        reposts: row.get(4)?,
        bookmarks: row.get(5)?,
        replies: row.get(6)?,
        recorded_at: parse_ts(7, &recorded_raw)?,
    })
}

fn row_to_account_snapshot(row: &Row<'_>) -> Result<AccountMetricSnapshot, rusqlite::Error> {
    let recorded_raw: String = row.get(4)?;
    Ok(AccountMetricSnapshot {
        id: row.get(0)?,
        account: row.get(1)?,
        followers: row.get(2)?,
        following: row.get(3)?,
        recorded_at: parse_ts(4, &recorded_raw)?,
    })
}

/// Append a snapshot of the tracked counters for a post.
pub async fn insert_post_snapshot(
    db: &Database,
    post_id: i64,
    counters: EngagementCounters,
    recorded_at: DateTime<Utc>,
) -> Result<(), PerchError> {
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO post_metric_snapshots \
                 (post_id, views, likes, reposts, bookmarks, replies, recorded_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    post_id,
                    counters.views,
                    counters.likes,
                    counters.reposts,
                    counters.bookmarks,
                    counters.replies,
                    ts(&recorded_at),
                ],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

/// The most recent snapshot for a post, if any.
pub async fn latest_post_snapshot(
    db: &Database,
    post_id: i64,
) -> Result<Option<PostMetricSnapshot>, PerchError> {
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {SNAPSHOT_COLUMNS} FROM post_metric_snapshots \
                 WHERE post_id = ?1 ORDER BY recorded_at DESC, id DESC LIMIT 1"
            ))?;
            match stmt.query_row(params![post_id], row_to_snapshot) {
                Ok(snap) => Ok(Some(snap)),
                Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                Err(e) => Err(e.into()),
            }
        })
        .await
        .map_err(map_tr_err)
}

/// All snapshots for a post, oldest first.
pub async fn snapshots_for_post(
    db: &Database,
    post_id: i64,
) -> Result<Vec<PostMetricSnapshot>, PerchError> {
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {SNAPSHOT_COLUMNS} FROM post_metric_snapshots \
                 WHERE post_id = ?1 ORDER BY recorded_at ASC, id ASC"
            ))?;
            let rows = stmt.query_map(params![post_id], row_to_snapshot)?;
            let mut snaps = Vec::new();
            for row in rows {
                snaps.push(row?);
            }
            Ok(snaps)
        })
        .await
        .map_err(map_tr_err)
}

/// Snapshots recorded at or after `cutoff`, oldest first. Snapshots of
/// quarantined posts never feed aggregates and are excluded here.
pub async fn snapshots_since(
    db: &Database,
    cutoff: DateTime<Utc>,
) -> Result<Vec<PostMetricSnapshot>, PerchError> {
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT s.id, s.post_id, s.views, s.likes, s.reposts, s.bookmarks, \
                        s.replies, s.recorded_at
                 FROM post_metric_snapshots s
                 JOIN posts p ON p.id = s.post_id
                 WHERE s.recorded_at >= ?1 AND p.status <> 'quarantine'
                 ORDER BY s.recorded_at ASC, s.id ASC",
            )?;
            let rows = stmt.query_map(params![ts(&cutoff)], row_to_snapshot)?;
            let mut snaps = Vec::new();
            for row in rows {
                snaps.push(row?);
            }
            Ok(snaps)
        })
        .await
        .map_err(map_tr_err)
}

/// Record follower stats for an account. Written once per successful sync
/// run regardless of change, so the series also records when syncs ran.
pub async fn insert_account_snapshot(
    db: &Database,
    account: String,
    stats: ProfileStats,
    recorded_at: DateTime<Utc>,
) -> Result<(), PerchError> {
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO account_metric_snapshots (account, followers, following, recorded_at)
                 VALUES (?1, ?2, ?3, ?4)",
                params![account, stats.followers, stats.following, ts(&recorded_at)],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

/// All snapshots for an account, oldest first.
pub async fn account_snapshots(
    db: &Database,
    account: String,
) -> Result<Vec<AccountMetricSnapshot>, PerchError> {
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT id, account, followers, following, recorded_at \
                 FROM account_metric_snapshots WHERE account = ?1 \
                 ORDER BY recorded_at ASC, id ASC",
            )?;
            let rows = stmt.query_map(params![account], row_to_account_snapshot)?;
            let mut snaps = Vec::new();
            for row in rows {
                snaps.push(row?);
            }
            Ok(snaps)
        })
        .await
        .map_err(map_tr_err)
}
