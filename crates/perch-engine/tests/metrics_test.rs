// SPDX-FileCopyrightText: 2026 Perch Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Metric refresher tests: lookback window, counter overwrite, failure
//! tolerance.

mod common;

use std::time::Duration;

use common::{t0, TestRig};
use perch_core::{
    EngagementCounters, MetricsOutcome, MetricsReading, NewSyncedPost, PostStatus,
};
use perch_engine::{MetricsRefresher, RefreshOptions};

fn refresher(rig: &TestRig) -> MetricsRefresher {
    MetricsRefresher::new(
        rig.store.clone(),
        rig.agent.clone(),
        rig.clock.clone(),
        RefreshOptions {
            scrape_timeout: Duration::from_millis(200),
            inter_call_delay: Duration::ZERO,
            ..Default::default()
        },
    )
}

async fn sent_post(rig: &TestRig, ext: &str, published_hours_ago: i64) -> i64 {
    let at = t0() - chrono::Duration::hours(published_hours_ago);
    rig.store
        .insert_synced(NewSyncedPost {
            account: "sparrow".into(),
            external_id: ext.into(),
            content: "sent earlier".into(),
            media_refs: vec![],
            status: PostStatus::Sent,
            published_at: at,
            counters: EngagementCounters::default(),
            log: vec![],
        })
        .await
        .unwrap()
        .id
}

#[tokio::test]
async fn refresh_overwrites_headline_counters() {
    let rig = TestRig::new().await;
    let post_id = sent_post(&rig, "1680661436348573696", 2).await;
    rig.agent
        .push_metrics_result(Ok(MetricsOutcome {
            success: true,
            log: "scraped".into(),
            metrics: MetricsReading {
                views: 99,
                likes: 7,
                reposts: 3,
            },
        }))
        .await;

    let report = refresher(&rig).refresh_account("sparrow").await.unwrap();
    assert_eq!(report.examined, 1);
    assert_eq!(report.updated, 1);

    let post = rig.store.get_post(post_id).await.unwrap().unwrap();
    assert_eq!(post.metrics.views, 99);
    assert_eq!(post.metrics.likes, 7);
    assert_eq!(post.metrics.reposts, 3);

    // No snapshot from a direct refresh; the series is fed elsewhere.
    assert!(rig.store.snapshots_for_post(post_id).await.unwrap().is_empty());
}

#[tokio::test]
async fn posts_outside_the_lookback_are_left_alone() {
    let rig = TestRig::new().await;
    sent_post(&rig, "1580661436348573696", 72).await;

    let report = refresher(&rig).refresh_account("sparrow").await.unwrap();
    assert_eq!(report.examined, 0);
    assert!(rig.agent.metrics_calls().await.is_empty());
}

#[tokio::test]
async fn scrape_failure_leaves_counters_untouched() {
    let rig = TestRig::new().await;
    let post_id = sent_post(&rig, "1680661436348573696", 2).await;
    rig.agent
        .push_metrics_result(Ok(MetricsOutcome {
            success: false,
            log: "post page did not load".into(),
            ..Default::default()
        }))
        .await;

    let report = refresher(&rig).refresh_account("sparrow").await.unwrap();
    assert_eq!(report.failed, 1);
    assert_eq!(report.updated, 0);

    let post = rig.store.get_post(post_id).await.unwrap().unwrap();
    assert_eq!(post.metrics.views, 0);
}
