// SPDX-FileCopyrightText: 2026 Perch Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Snapshot debouncing.
//!
//! A new time-series point is only worth persisting when something tracked
//! actually moved. The tracked counters are views, likes, reposts,
//! bookmarks, and replies, the five the snapshot table carries; click and
//! expand counters live on the post but are not part of the series.

use perch_core::{EngagementCounters, PostMetricSnapshot};

/// Whether a fresh observation differs from the latest snapshot.
///
/// With no snapshot yet, the answer is always yes: the first observation
/// becomes the baseline.
pub fn needs_snapshot(latest: Option<&PostMetricSnapshot>, current: &EngagementCounters) -> bool {
    match latest {
        None => true,
        Some(snap) => {
            snap.views != current.views
                || snap.likes != current.likes
                || snap.reposts != current.reposts
                || snap.bookmarks != current.bookmarks
                || snap.replies != current.replies
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn snapshot(views: i64, likes: i64) -> PostMetricSnapshot {
        PostMetricSnapshot {
            id: 1,
            post_id: 1,
            views,
            likes,
            reposts: 0,
            bookmarks: 0,
            replies: 0,
            recorded_at: Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap(),
        }
    }

    #[test]
    fn first_observation_is_always_a_baseline() {
        let current = EngagementCounters::default();
        assert!(needs_snapshot(None, &current));
    }

    #[test]
    fn identical_counters_are_debounced() {
        let snap = snapshot(10, 2);
        let current = EngagementCounters {
            views: 10,
            likes: 2,
            ..Default::default()
        };
        assert!(!needs_snapshot(Some(&snap), &current));
    }

    #[test]
    fn any_tracked_change_triggers_a_snapshot() {
        let snap = snapshot(10, 2);
        let current = EngagementCounters {
            views: 15,
            likes: 2,
            ..Default::default()
        };
        assert!(needs_snapshot(Some(&snap), &current));

        let replies_only = EngagementCounters {
            views: 10,
            likes: 2,
            replies: 1,
            ..Default::default()
        };
        assert!(needs_snapshot(Some(&snap), &replies_only));
    }

    #[test]
    fn untracked_counters_do_not_trigger() {
        let snap = snapshot(10, 2);
        let current = EngagementCounters {
            views: 10,
            likes: 2,
            url_clicks: 50,
            profile_clicks: 9,
            detail_expands: 4,
            ..Default::default()
        };
        assert!(!needs_snapshot(Some(&snap), &current));
    }
}
