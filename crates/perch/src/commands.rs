// SPDX-FileCopyrightText: 2026 Perch Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! One-shot CLI commands: thin pass-throughs over the engine components,
//! sharing the daemon's wiring but running a single operation and exiting.

use std::sync::Arc;

use tracing::info;

use perch_agent::WorkerAgent;
use perch_config::PerchConfig;
use perch_core::{PerchError, PostStore, SystemClock};
use perch_engine::{
    MergeAction, OrchestratorOptions, PublishOrchestrator, SyncEngine, SyncEngineOptions,
};
use perch_storage::SqliteStore;

struct Wiring {
    store: Arc<SqliteStore>,
    agent: Arc<WorkerAgent>,
    clock: Arc<SystemClock>,
}

async fn wire(config: &PerchConfig) -> Result<Wiring, PerchError> {
    Ok(Wiring {
        store: Arc::new(SqliteStore::open(config.storage.clone()).await?),
        agent: Arc::new(WorkerAgent::new(&config.worker)?),
        clock: Arc::new(SystemClock),
    })
}

/// `perch sync --account <handle>`: one full history resync.
pub async fn run_sync(config: PerchConfig, account: &str) -> Result<(), PerchError> {
    let wiring = wire(&config).await?;
    let engine = SyncEngine::new(
        wiring.store.clone(),
        wiring.agent.clone(),
        wiring.clock.clone(),
        SyncEngineOptions::from_config(&config.sync),
    );

    let report = engine.run(account).await?;
    println!(
        "sync complete: {} inserted, {} updated, {} quarantined, {} healed, {} marked deleted, {} snapshots",
        report.inserted,
        report.updated,
        report.quarantined,
        report.healed,
        report.marked_deleted,
        report.snapshots_added,
    );
    wiring.store.close().await
}

/// `perch import <url> --account <handle>`: fetch and merge one post.
pub async fn run_import(config: PerchConfig, url: &str, account: &str) -> Result<(), PerchError> {
    let wiring = wire(&config).await?;
    let engine = SyncEngine::new(
        wiring.store.clone(),
        wiring.agent.clone(),
        wiring.clock.clone(),
        SyncEngineOptions::from_config(&config.sync),
    );

    match engine.import_one(url, account).await? {
        MergeAction::Inserted {
            post_id,
            quarantined,
            ..
        } => {
            if quarantined {
                println!("imported post {post_id} (quarantined pending review)");
            } else {
                println!("imported post {post_id}");
            }
        }
        MergeAction::Updated { post_id, .. } => println!("updated existing post {post_id}"),
        other => println!("nothing imported: {other:?}"),
    }
    wiring.store.close().await
}

/// `perch publish-now <id>`: schedule for now and attempt immediately.
pub async fn run_publish_now(config: PerchConfig, id: i64) -> Result<(), PerchError> {
    let wiring = wire(&config).await?;
    let orchestrator = PublishOrchestrator::new(
        wiring.store.clone(),
        wiring.agent.clone(),
        wiring.clock.clone(),
        OrchestratorOptions::from_config(&config.publish, &config.scheduler),
    );

    let outcome = orchestrator.publish_now(id).await?;
    info!(post_id = id, ?outcome, "publish-now finished");
    println!("post {id}: {outcome:?}");
    wiring.store.close().await
}

/// `perch stats [--account <handle>]`: aggregate stats and best hours.
pub async fn run_stats(config: PerchConfig, account: Option<&str>) -> Result<(), PerchError> {
    let wiring = wire(&config).await?;
    let store: Arc<dyn PostStore> = wiring.store.clone();

    let stats = perch_analytics::account_stats(&store, account).await?;
    println!(
        "sent {} | scheduled {} | drafts {} | failed {} | quarantined {} | deleted_on_x {}",
        stats.sent, stats.scheduled, stats.drafts, stats.failed, stats.quarantined, stats.deleted_on_x,
    );
    println!(
        "views {} | likes {} | reposts {}",
        stats.views, stats.likes, stats.reposts
    );

    let best = perch_analytics::best_hours(&store, account).await?;
    if best.from_defaults {
        println!(
            "best hours (defaults, only {} posts sampled): {:?}",
            best.sampled_posts, best.hours
        );
    } else {
        println!("best hours ({} posts sampled): {:?}", best.sampled_posts, best.hours);
    }

    wiring.store.close().await
}
