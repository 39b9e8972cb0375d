// SPDX-FileCopyrightText: 2026 Perch Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Shared setup for engine integration tests: a real SQLite store on a
//! temp file, a scripted mock agent, and a hand-driven clock.

// Each integration test binary compiles this module separately and uses a
// different subset of it.
#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};
use perch_config::model::StorageConfig;
use perch_core::{Clock, NewPost, Post, PostStore};
use perch_engine::{OrchestratorOptions, PublishOrchestrator, SyncEngine, SyncEngineOptions};
use perch_storage::SqliteStore;
use perch_test_utils::{ManualClock, MockAgent};

pub struct TestRig {
    pub store: Arc<dyn PostStore>,
    pub agent: Arc<MockAgent>,
    pub clock: Arc<ManualClock>,
    _dir: tempfile::TempDir,
}

impl TestRig {
    pub async fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("engine_test.db");
        let store = SqliteStore::open(StorageConfig {
            database_path: db_path.to_str().unwrap().to_string(),
            wal_mode: true,
        })
        .await
        .unwrap();

        Self {
            store: Arc::new(store),
            agent: Arc::new(MockAgent::new()),
            clock: Arc::new(ManualClock::new(t0())),
            _dir: dir,
        }
    }

    /// Orchestrator with test-friendly timings: no inter-call delay, a
    /// short publish timeout, and the production backoff and stuck windows.
    pub fn orchestrator(&self) -> PublishOrchestrator {
        PublishOrchestrator::new(
            self.store.clone(),
            self.agent.clone(),
            self.clock.clone(),
            OrchestratorOptions {
                publish_timeout: Duration::from_millis(200),
                inter_call_delay: Duration::ZERO,
                ..Default::default()
            },
        )
    }

    pub fn sync_engine(&self) -> SyncEngine {
        self.sync_engine_with_blacklist(Vec::new())
    }

    pub fn sync_engine_with_blacklist(&self, blacklist: Vec<String>) -> SyncEngine {
        SyncEngine::new(
            self.store.clone(),
            self.agent.clone(),
            self.clock.clone(),
            SyncEngineOptions {
                sync_timeout: Duration::from_secs(5),
                blacklist,
            },
        )
    }

    pub async fn scheduled_post(&self, content: &str, at: DateTime<Utc>) -> Post {
        self.store
            .create_post(
                NewPost {
                    account: "sparrow".into(),
                    content: content.into(),
                    media_refs: vec![],
                    scheduled_at: Some(at),
                    parent_id: None,
                },
                self.clock.now(),
            )
            .await
            .unwrap()
    }

    pub async fn scheduled_reply(&self, content: &str, at: DateTime<Utc>, parent: i64) -> Post {
        self.store
            .create_post(
                NewPost {
                    account: "sparrow".into(),
                    content: content.into(),
                    media_refs: vec![],
                    scheduled_at: Some(at),
                    parent_id: Some(parent),
                },
                self.clock.now(),
            )
            .await
            .unwrap()
    }
}

/// The fixed instant every test starts from.
pub fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap()
}

/// Minutes after [`t0`].
pub fn t_plus_mins(mins: i64) -> DateTime<Utc> {
    t0() + chrono::Duration::minutes(mins)
}
