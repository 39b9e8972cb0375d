// SPDX-FileCopyrightText: 2026 Perch Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `perch serve` command implementation.
//!
//! Wires the SQLite store, the worker agent, and the engine components
//! into one scheduler process, then runs until a shutdown signal arrives.
//! The design assumes exactly one scheduler instance per database; running
//! two would double-publish.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use perch_agent::WorkerAgent;
use perch_config::PerchConfig;
use perch_core::{PerchError, SystemClock};
use perch_engine::{
    MetricsRefresher, OrchestratorOptions, PublishOrchestrator, RefreshOptions, Scheduler,
    SchedulerIntervals, SyncEngine, SyncEngineOptions,
};
use perch_storage::SqliteStore;

/// Run the scheduler daemon until interrupted.
pub async fn run_serve(config: PerchConfig) -> Result<(), PerchError> {
    info!("starting perch serve");

    if config.accounts.is_empty() {
        warn!("no accounts configured; metric refresh and history resync will idle");
    }

    let store = Arc::new(SqliteStore::open(config.storage.clone()).await?);
    let agent = Arc::new(WorkerAgent::new(&config.worker)?);
    let clock = Arc::new(SystemClock);

    let orchestrator = Arc::new(PublishOrchestrator::new(
        store.clone(),
        agent.clone(),
        clock.clone(),
        OrchestratorOptions::from_config(&config.publish, &config.scheduler),
    ));
    let refresher = Arc::new(MetricsRefresher::new(
        store.clone(),
        agent.clone(),
        clock.clone(),
        RefreshOptions::from_config(&config.sync, &config.scheduler),
    ));
    let sync = Arc::new(SyncEngine::new(
        store.clone(),
        agent.clone(),
        clock.clone(),
        SyncEngineOptions::from_config(&config.sync),
    ));

    let scheduler = Scheduler::new(
        orchestrator,
        refresher,
        sync,
        config.accounts.clone(),
        SchedulerIntervals::from_config(&config.scheduler),
    );

    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("shutdown signal received");
                cancel.cancel();
            }
        });
    }

    scheduler.run(cancel).await;

    store.close().await?;
    info!("perch serve stopped");
    Ok(())
}
