// SPDX-FileCopyrightText: 2026 Perch Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Read-side aggregation over the entity store. Pure derivation: nothing
//! here mutates a row.
//!
//! Quarantined rows are excluded from every aggregate; the storage layer
//! already keeps their snapshots out of [`PostStore::snapshots_since`].

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Timelike as _, Utc};

use perch_core::{PerchError, Post, PostFilter, PostStatus, PostStore};

/// Default posting slots returned when history is too thin to rank hours.
pub const DEFAULT_BEST_HOURS: [u32; 4] = [9, 12, 18, 21];

/// Minimum number of qualifying posts before hour ranking kicks in.
pub const MIN_BEST_HOURS_SAMPLES: usize = 5;

/// One calendar day in the growth series.
#[derive(Debug, Clone, PartialEq)]
pub struct DailyGrowthPoint {
    pub day: NaiveDate,
    pub views: i64,
    pub likes: i64,
    pub reposts: i64,
    pub bookmarks: i64,
    pub replies: i64,
    /// Likes plus reposts, the headline engagement number.
    pub engagement: i64,
    /// Distinct posts that contributed a snapshot that day.
    pub posts: usize,
}

/// Ranked posting hours with their provenance.
#[derive(Debug, Clone, PartialEq)]
pub struct BestHours {
    /// Hours of day (UTC), best first.
    pub hours: Vec<u32>,
    /// True when the fixed default slots were used for lack of data.
    pub from_defaults: bool,
    /// How many historical posts fed the ranking.
    pub sampled_posts: usize,
    /// Mean engagement rate per hour, best first.
    pub hourly_means: Vec<(u32, f64)>,
}

/// Status counts and summed counters for the dashboard.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AccountStats {
    pub sent: usize,
    pub failed: usize,
    pub scheduled: usize,
    pub drafts: usize,
    pub quarantined: usize,
    pub deleted_on_x: usize,
    pub views: i64,
    pub likes: i64,
    pub reposts: i64,
}

/// Engagement rate of a post: interactions over views, as a percentage.
/// Zero when the post has no views yet.
pub fn engagement_rate(post: &Post) -> f64 {
    if post.metrics.views > 0 {
        post.metrics.interactions() as f64 / post.metrics.views as f64 * 100.0
    } else {
        0.0
    }
}

/// Group the last `days` days of snapshots into a per-day growth series.
pub async fn growth_series(
    store: &Arc<dyn PostStore>,
    now: DateTime<Utc>,
    days: u32,
) -> Result<Vec<DailyGrowthPoint>, PerchError> {
    let cutoff = now - chrono::Duration::days(i64::from(days));
    let snapshots = store.snapshots_since(cutoff).await?;

    // BTreeMap keeps the series in date order for free.
    let mut by_day: BTreeMap<NaiveDate, (DailyGrowthPoint, HashSet<i64>)> = BTreeMap::new();
    for snap in snapshots {
        let day = snap.recorded_at.date_naive();
        let (point, seen) = by_day.entry(day).or_insert_with(|| {
            (
                DailyGrowthPoint {
                    day,
                    views: 0,
                    likes: 0,
                    reposts: 0,
                    bookmarks: 0,
                    replies: 0,
                    engagement: 0,
                    posts: 0,
                },
                HashSet::new(),
            )
        });
        point.views += snap.views;
        point.likes += snap.likes;
        point.reposts += snap.reposts;
        point.bookmarks += snap.bookmarks;
        point.replies += snap.replies;
        point.engagement += snap.likes + snap.reposts;
        if seen.insert(snap.post_id) {
            point.posts += 1;
        }
    }

    Ok(by_day.into_values().map(|(point, _)| point).collect())
}

/// Rank hours of day by mean engagement rate over historical sent posts.
///
/// Only sent, non-repost posts that actually went out on a schedule
/// qualify. Below [`MIN_BEST_HOURS_SAMPLES`] qualifying posts the fixed
/// default slots are returned instead of a noisy ranking.
pub async fn best_hours(
    store: &Arc<dyn PostStore>,
    account: Option<&str>,
) -> Result<BestHours, PerchError> {
    let posts = store
        .list_posts(PostFilter {
            account: account.map(str::to_string),
            status: Some(PostStatus::Sent),
            ..Default::default()
        })
        .await?;

    let qualifying: Vec<&Post> = posts
        .iter()
        .filter(|p| !p.is_repost && p.scheduled_at.is_some())
        .collect();

    if qualifying.len() < MIN_BEST_HOURS_SAMPLES {
        return Ok(BestHours {
            hours: DEFAULT_BEST_HOURS.to_vec(),
            from_defaults: true,
            sampled_posts: qualifying.len(),
            hourly_means: Vec::new(),
        });
    }

    let mut by_hour: BTreeMap<u32, Vec<f64>> = BTreeMap::new();
    for post in &qualifying {
        let hour = post
            .scheduled_at
            .map(|at| at.hour())
            .unwrap_or_default();
        by_hour.entry(hour).or_default().push(engagement_rate(post));
    }

    let mut hourly_means: Vec<(u32, f64)> = by_hour
        .into_iter()
        .map(|(hour, rates)| {
            let mean = rates.iter().sum::<f64>() / rates.len() as f64;
            (hour, mean)
        })
        .collect();
    // Best first; ties break toward the earlier hour.
    hourly_means.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal).then(a.0.cmp(&b.0)));

    let hours = hourly_means.iter().take(4).map(|(h, _)| *h).collect();
    Ok(BestHours {
        hours,
        from_defaults: false,
        sampled_posts: qualifying.len(),
        hourly_means,
    })
}

/// Count posts by status and sum counters over sent posts.
pub async fn account_stats(
    store: &Arc<dyn PostStore>,
    account: Option<&str>,
) -> Result<AccountStats, PerchError> {
    let posts = store
        .list_posts(PostFilter {
            account: account.map(str::to_string),
            include_quarantine: true,
            ..Default::default()
        })
        .await?;

    let mut stats = AccountStats::default();
    for post in &posts {
        match post.status {
            PostStatus::Sent => {
                stats.sent += 1;
                stats.views += post.metrics.views;
                stats.likes += post.metrics.likes;
                stats.reposts += post.metrics.reposts;
            }
            PostStatus::Failed => stats.failed += 1,
            PostStatus::Scheduled => stats.scheduled += 1,
            PostStatus::Draft => stats.drafts += 1,
            PostStatus::Quarantine => stats.quarantined += 1,
            PostStatus::DeletedOnX => stats.deleted_on_x += 1,
            PostStatus::Processing => {}
        }
    }
    Ok(stats)
}
