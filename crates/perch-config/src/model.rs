// SPDX-FileCopyrightText: 2026 Perch Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs for the Perch post scheduler.
//!
//! All structs use `#[serde(deny_unknown_fields)]` to reject unrecognized
//! config keys at startup, producing actionable error messages.

use serde::{Deserialize, Serialize};

/// Top-level Perch configuration.
///
/// Loaded from TOML files following the XDG hierarchy, with environment
/// variable overrides. All sections are optional and default to sensible
/// values; a bare `perch serve` works against a local worker.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct PerchConfig {
    /// Process-level settings.
    #[serde(default)]
    pub daemon: DaemonConfig,

    /// Storage backend settings.
    #[serde(default)]
    pub storage: StorageConfig,

    /// Browser worker sidecar settings.
    #[serde(default)]
    pub worker: WorkerConfig,

    /// Periodic task cadences and rate limiting.
    #[serde(default)]
    pub scheduler: SchedulerConfig,

    /// Publish orchestration timeouts and retry policy.
    #[serde(default)]
    pub publish: PublishConfig,

    /// History reconciliation settings.
    #[serde(default)]
    pub sync: SyncConfig,

    /// Account handles the scheduler publishes and syncs for.
    #[serde(default)]
    pub accounts: Vec<String>,
}

/// Process-level configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct DaemonConfig {
    /// Logging level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Storage backend configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct StorageConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_database_path")]
    pub database_path: String,

    /// Enable WAL (Write-Ahead Logging) mode for SQLite.
    #[serde(default = "default_wal_mode")]
    pub wal_mode: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            wal_mode: default_wal_mode(),
        }
    }
}

fn default_database_path() -> String {
    dirs::data_dir()
        .map(|p| p.join("perch").join("perch.db"))
        .unwrap_or_else(|| std::path::PathBuf::from("perch.db"))
        .to_string_lossy()
        .into_owned()
}

fn default_wal_mode() -> bool {
    true
}

/// Browser worker sidecar configuration.
///
/// The worker owns the browser session, cookies, and DOM selectors; Perch
/// talks to it over HTTP and treats every call as fallible.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct WorkerConfig {
    /// Base URL of the worker's HTTP API.
    #[serde(default = "default_worker_base_url")]
    pub base_url: String,

    /// Transport-level timeout for worker requests, in seconds. The engine
    /// applies its own tighter per-operation timeouts on top.
    #[serde(default = "default_worker_request_timeout")]
    pub request_timeout_secs: u64,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            base_url: default_worker_base_url(),
            request_timeout_secs: default_worker_request_timeout(),
        }
    }
}

fn default_worker_base_url() -> String {
    "http://127.0.0.1:8787".to_string()
}

fn default_worker_request_timeout() -> u64 {
    900
}

/// Periodic task cadences.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct SchedulerConfig {
    /// How often to check for due posts, in seconds.
    #[serde(default = "default_due_check_secs")]
    pub due_check_secs: u64,

    /// How often to refresh metrics for recently sent posts, in seconds.
    #[serde(default = "default_metrics_refresh_secs")]
    pub metrics_refresh_secs: u64,

    /// How often to run a full history resync per account, in seconds.
    #[serde(default = "default_history_sync_secs")]
    pub history_sync_secs: u64,

    /// Fixed delay between consecutive calls toward the platform, in
    /// seconds. Rate limiting is this fixed pause, not adaptive.
    #[serde(default = "default_inter_call_delay_secs")]
    pub inter_call_delay_secs: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            due_check_secs: default_due_check_secs(),
            metrics_refresh_secs: default_metrics_refresh_secs(),
            history_sync_secs: default_history_sync_secs(),
            inter_call_delay_secs: default_inter_call_delay_secs(),
        }
    }
}

fn default_due_check_secs() -> u64 {
    60
}

fn default_metrics_refresh_secs() -> u64 {
    900
}

fn default_history_sync_secs() -> u64 {
    21_600
}

fn default_inter_call_delay_secs() -> u64 {
    10
}

/// Publish orchestration policy.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct PublishConfig {
    /// Hard timeout for a single publish call, in seconds.
    #[serde(default = "default_publish_timeout_secs")]
    pub timeout_secs: u64,

    /// After this long in `processing` a post is considered stuck and
    /// becomes retry-eligible again, in seconds.
    #[serde(default = "default_stuck_after_secs")]
    pub stuck_after_secs: u64,

    /// Minimum wait between a failure and its retry, in seconds.
    #[serde(default = "default_retry_backoff_secs")]
    pub retry_backoff_secs: u64,

    /// Retry cap; a post whose `retry_count` reaches this never leaves
    /// `failed`.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

impl Default for PublishConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_publish_timeout_secs(),
            stuck_after_secs: default_stuck_after_secs(),
            retry_backoff_secs: default_retry_backoff_secs(),
            max_retries: default_max_retries(),
        }
    }
}

fn default_publish_timeout_secs() -> u64 {
    120
}

fn default_stuck_after_secs() -> u64 {
    600
}

fn default_retry_backoff_secs() -> u64 {
    600
}

fn default_max_retries() -> u32 {
    3
}

/// History reconciliation settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct SyncConfig {
    /// Hard timeout for a full history scan, in seconds.
    #[serde(default = "default_sync_timeout_secs")]
    pub timeout_secs: u64,

    /// Hard timeout for a single metric scrape, in seconds.
    #[serde(default = "default_scrape_timeout_secs")]
    pub scrape_timeout_secs: u64,

    /// How far back the metrics refresher looks for recently sent posts,
    /// in hours.
    #[serde(default = "default_metrics_lookback_hours")]
    pub metrics_lookback_hours: u64,

    /// External ids purged unconditionally at the start of every sync run
    /// (known ghost or ambiguous records).
    #[serde(default)]
    pub blacklist: Vec<String>,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_sync_timeout_secs(),
            scrape_timeout_secs: default_scrape_timeout_secs(),
            metrics_lookback_hours: default_metrics_lookback_hours(),
            blacklist: Vec::new(),
        }
    }
}

fn default_sync_timeout_secs() -> u64 {
    600
}

fn default_scrape_timeout_secs() -> u64 {
    60
}

fn default_metrics_lookback_hours() -> u64 {
    48
}
