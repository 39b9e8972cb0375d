// SPDX-FileCopyrightText: 2026 Perch Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Lifecycle state machine tests: due selection, retries, backoff, stuck
//! recovery, thread dependencies, and timeout handling.

mod common;

use std::time::Duration;

use common::{t_plus_mins, TestRig};
use perch_core::{Clock, PerchError, PostStatus, PublishOutcome};
use perch_engine::TickOutcome;

#[tokio::test]
async fn due_scheduled_post_is_published_exactly_once() {
    let rig = TestRig::new().await;
    let post = rig.scheduled_post("hello world", t_plus_mins(-5)).await;

    let orchestrator = rig.orchestrator();
    let report = orchestrator.run_tick().await.unwrap();
    assert_eq!(report.examined, 1);
    assert_eq!(report.published, 1);

    let sent = rig.store.get_post(post.id).await.unwrap().unwrap();
    assert_eq!(sent.status, PostStatus::Sent);
    assert!(sent.external_id.is_some());
    assert_eq!(sent.retry_count, 0);
    assert_eq!(sent.logs.len(), 1);

    // Baseline snapshot written at publish time.
    let snapshots = rig.store.snapshots_for_post(post.id).await.unwrap();
    assert_eq!(snapshots.len(), 1);
    assert_eq!(snapshots[0].views, 0);

    // A second tick finds nothing due.
    let report = orchestrator.run_tick().await.unwrap();
    assert_eq!(report.examined, 0);
    assert_eq!(rig.agent.publish_call_count().await, 1);
}

#[tokio::test]
async fn future_posts_are_not_selected() {
    let rig = TestRig::new().await;
    rig.scheduled_post("tomorrow", t_plus_mins(60)).await;

    let report = rig.orchestrator().run_tick().await.unwrap();
    assert_eq!(report.examined, 0);
    assert_eq!(rig.agent.publish_call_count().await, 0);
}

#[tokio::test]
async fn failure_increments_on_retry_claim_and_stops_at_cap() {
    let rig = TestRig::new().await;
    let post = rig.scheduled_post("doomed", t_plus_mins(-1)).await;
    // Initial attempt plus three retries, all failing.
    for _ in 0..4 {
        rig.agent
            .push_publish_result(Ok(PublishOutcome::failure("selector drift")))
            .await;
    }

    let orchestrator = rig.orchestrator();

    // Initial attempt: no retry increment.
    orchestrator.run_tick().await.unwrap();
    let failed = rig.store.get_post(post.id).await.unwrap().unwrap();
    assert_eq!(failed.status, PostStatus::Failed);
    assert_eq!(failed.retry_count, 0);

    // Still inside the backoff window: not selected.
    rig.clock.advance(Duration::from_secs(60));
    let report = orchestrator.run_tick().await.unwrap();
    assert_eq!(report.examined, 0, "backoff must gate the retry");

    // Each retry claim bumps retry_count by exactly one.
    for expected_retry in 1..=3u32 {
        rig.clock.advance(Duration::from_secs(601));
        orchestrator.run_tick().await.unwrap();
        let current = rig.store.get_post(post.id).await.unwrap().unwrap();
        assert_eq!(current.retry_count, expected_retry);
        assert_eq!(current.status, PostStatus::Failed);
    }

    // At the cap the post never leaves failed.
    rig.clock.advance(Duration::from_secs(601));
    let report = orchestrator.run_tick().await.unwrap();
    assert_eq!(report.examined, 0);
    assert_eq!(rig.agent.publish_call_count().await, 4);

    let terminal = rig.store.get_post(post.id).await.unwrap().unwrap();
    assert_eq!(terminal.retry_count, 3);
    assert_eq!(terminal.logs.len(), 4, "each attempt leaves a log entry");
}

#[tokio::test]
async fn agent_error_is_normalized_into_failure() {
    let rig = TestRig::new().await;
    let post = rig.scheduled_post("crashy", t_plus_mins(-1)).await;
    rig.agent
        .push_publish_result(Err(PerchError::agent("browser session lost")))
        .await;

    let report = rig.orchestrator().run_tick().await.unwrap();
    assert_eq!(report.failed, 1);
    assert_eq!(report.errors, 0, "agent errors never escape the boundary");

    let failed = rig.store.get_post(post.id).await.unwrap().unwrap();
    assert_eq!(failed.status, PostStatus::Failed);
    assert!(failed.logs[0].message.contains("browser session lost"));
}

#[tokio::test]
async fn timeout_is_treated_exactly_like_failure() {
    let rig = TestRig::new().await;
    let post = rig.scheduled_post("slow", t_plus_mins(-1)).await;
    // Longer than the test orchestrator's 200 ms publish timeout.
    rig.agent.set_publish_delay(Duration::from_secs(2)).await;

    let report = rig.orchestrator().run_tick().await.unwrap();
    assert_eq!(report.failed, 1);

    let failed = rig.store.get_post(post.id).await.unwrap().unwrap();
    assert_eq!(failed.status, PostStatus::Failed);
    assert!(
        failed.logs[0].message.contains("timed out"),
        "log should carry the timeout reason: {:?}",
        failed.logs
    );
}

#[tokio::test]
async fn stuck_processing_post_is_reclaimed_without_retry_increment() {
    let rig = TestRig::new().await;
    let post = rig.scheduled_post("stuck", t_plus_mins(-1)).await;
    // Simulate a tick that claimed the post and then died.
    rig.store
        .claim_for_publish(post.id, false, rig.clock.now())
        .await
        .unwrap();

    // Not yet past the stuck window.
    rig.clock.advance(Duration::from_secs(60));
    let report = rig.orchestrator().run_tick().await.unwrap();
    assert_eq!(report.examined, 0);

    // Past the stuck window it becomes claimable again.
    rig.clock.advance(Duration::from_secs(600));
    let report = rig.orchestrator().run_tick().await.unwrap();
    assert_eq!(report.published, 1);

    let sent = rig.store.get_post(post.id).await.unwrap().unwrap();
    assert_eq!(sent.status, PostStatus::Sent);
    assert_eq!(sent.retry_count, 0, "stuck recovery is not a retry");
}

#[tokio::test]
async fn thread_child_publishes_as_reply_once_parent_is_sent() {
    let rig = TestRig::new().await;
    let parent = rig.scheduled_post("thread head", t_plus_mins(-2)).await;
    let child = rig
        .scheduled_reply("thread tail", t_plus_mins(-2), parent.id)
        .await;

    // Parent comes first in due order; by the time the child is processed
    // the parent is sent with an external id.
    let report = rig.orchestrator().run_tick().await.unwrap();
    assert_eq!(report.published, 2);

    let parent_sent = rig.store.get_post(parent.id).await.unwrap().unwrap();
    let parent_external = parent_sent.external_id.clone().unwrap();

    let calls = rig.agent.publish_calls().await;
    assert_eq!(calls.len(), 2);
    assert_eq!(calls[0].reply_to_external_id, None);
    assert_eq!(
        calls[1].reply_to_external_id.as_deref(),
        Some(parent_external.as_str())
    );

    let child_sent = rig.store.get_post(child.id).await.unwrap().unwrap();
    assert_eq!(child_sent.status, PostStatus::Sent);
}

#[tokio::test]
async fn child_waits_while_parent_is_not_ready() {
    let rig = TestRig::new().await;
    // Parent is scheduled in the future; only the child is due.
    let parent = rig.scheduled_post("head later", t_plus_mins(60)).await;
    let child = rig
        .scheduled_reply("tail now", t_plus_mins(-1), parent.id)
        .await;

    let report = rig.orchestrator().run_tick().await.unwrap();
    assert_eq!(report.waiting, 1);
    assert_eq!(rig.agent.publish_call_count().await, 0);

    // The waiting child's row is untouched: still scheduled, no claim.
    let unchanged = rig.store.get_post(child.id).await.unwrap().unwrap();
    assert_eq!(unchanged.status, PostStatus::Scheduled);
    assert_eq!(unchanged.retry_count, 0);
    assert!(unchanged.logs.is_empty());
}

#[tokio::test]
async fn child_publishes_standalone_when_parent_is_missing() {
    let rig = TestRig::new().await;
    let parent = rig.scheduled_post("to be deleted", t_plus_mins(60)).await;
    let child = rig
        .scheduled_reply("orphan", t_plus_mins(-1), parent.id)
        .await;
    rig.store.delete_post(parent.id).await.unwrap();

    let report = rig.orchestrator().run_tick().await.unwrap();
    assert_eq!(report.published, 1);

    let calls = rig.agent.publish_calls().await;
    assert_eq!(calls[0].reply_to_external_id, None);

    let sent = rig.store.get_post(child.id).await.unwrap().unwrap();
    assert_eq!(sent.status, PostStatus::Sent);
    assert!(
        sent.logs.iter().any(|e| e.message.contains("not found")),
        "degraded case must be logged: {:?}",
        sent.logs
    );
}

#[tokio::test]
async fn child_publishes_standalone_when_parent_has_no_external_id() {
    let rig = TestRig::new().await;
    let parent = rig.scheduled_post("id lost", t_plus_mins(-3)).await;
    // Parent publish succeeds but the worker fails to capture the id.
    rig.agent
        .push_publish_result(Ok(PublishOutcome {
            success: true,
            log: "posted, id extraction failed".into(),
            external_id: None,
        }))
        .await;
    let child = rig
        .scheduled_reply("follows anyway", t_plus_mins(-3), parent.id)
        .await;

    let report = rig.orchestrator().run_tick().await.unwrap();
    assert_eq!(report.published, 2);

    let calls = rig.agent.publish_calls().await;
    assert_eq!(calls[1].reply_to_external_id, None);

    let child_sent = rig.store.get_post(child.id).await.unwrap().unwrap();
    assert!(child_sent
        .logs
        .iter()
        .any(|e| e.message.contains("without an external id")));
}

#[tokio::test]
async fn publish_now_schedules_and_attempts_immediately() {
    let rig = TestRig::new().await;
    let draft = rig
        .store
        .create_post(
            perch_core::NewPost {
                account: "sparrow".into(),
                content: "right now".into(),
                media_refs: vec![],
                scheduled_at: None,
                parent_id: None,
            },
            rig.clock.now(),
        )
        .await
        .unwrap();
    assert_eq!(draft.status, PostStatus::Draft);

    let outcome = rig.orchestrator().publish_now(draft.id).await.unwrap();
    assert_eq!(outcome, TickOutcome::Published);

    let sent = rig.store.get_post(draft.id).await.unwrap().unwrap();
    assert_eq!(sent.status, PostStatus::Sent);
    assert!(sent.external_id.is_some());
}
