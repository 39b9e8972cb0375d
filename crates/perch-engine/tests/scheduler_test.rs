// SPDX-FileCopyrightText: 2026 Perch Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Scheduler loop smoke tests: all three tasks fire, shutdown is prompt.

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{t_plus_mins, TestRig};
use perch_core::PostStatus;
use perch_engine::{
    MetricsRefresher, RefreshOptions, Scheduler, SchedulerIntervals, SyncEngine,
    SyncEngineOptions,
};
use tokio_util::sync::CancellationToken;

#[tokio::test(flavor = "multi_thread")]
async fn all_three_loops_fire_and_stop_on_cancel() {
    let rig = TestRig::new().await;
    let post = rig.scheduled_post("due at boot", t_plus_mins(-1)).await;

    let orchestrator = Arc::new(rig.orchestrator());
    let refresher = Arc::new(MetricsRefresher::new(
        rig.store.clone(),
        rig.agent.clone(),
        rig.clock.clone(),
        RefreshOptions {
            inter_call_delay: Duration::ZERO,
            ..Default::default()
        },
    ));
    let sync = Arc::new(SyncEngine::new(
        rig.store.clone(),
        rig.agent.clone(),
        rig.clock.clone(),
        SyncEngineOptions::default(),
    ));

    let scheduler = Scheduler::new(
        orchestrator,
        refresher,
        sync,
        vec!["sparrow".to_string()],
        SchedulerIntervals {
            due_check: Duration::from_millis(20),
            metrics_refresh: Duration::from_millis(30),
            history_sync: Duration::from_millis(30),
        },
    );

    let cancel = CancellationToken::new();
    let run = {
        let cancel = cancel.clone();
        async move {
            scheduler.run(cancel).await;
        }
    };
    let runner = tokio::spawn(run);

    tokio::time::sleep(Duration::from_millis(250)).await;
    cancel.cancel();
    tokio::time::timeout(Duration::from_secs(2), runner)
        .await
        .expect("scheduler must stop promptly on cancel")
        .unwrap();

    // The due-post loop published the boot-time post.
    let sent = rig.store.get_post(post.id).await.unwrap().unwrap();
    assert_eq!(sent.status, PostStatus::Sent);

    // The resync loop reached the agent at least once.
    assert!(
        !rig.agent.sync_calls().await.is_empty(),
        "history resync should have fired"
    );
}
