// SPDX-FileCopyrightText: 2026 Perch Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The browser-automation collaborator, specified only by its contract.
//!
//! Everything that drives a real browser (selectors, typing simulation,
//! screenshots) lives behind this trait. The engine wraps every call in a
//! timeout and normalizes both `Err` returns and timeouts into failed
//! outcomes, so nothing from the Agent side escapes the engine boundary.

use async_trait::async_trait;

use crate::error::PerchError;
use crate::types::{ImportOutcome, MetricsOutcome, PublishOutcome, PublishRequest, SyncOutcome};

/// Browser-level operations against the remote platform.
#[async_trait]
pub trait PlatformAgent: Send + Sync {
    /// Publish a post (optionally as a reply) for the given account.
    async fn publish(&self, request: PublishRequest) -> Result<PublishOutcome, PerchError>;

    /// Read engagement counters off a single published post.
    async fn scrape_metrics(
        &self,
        external_id: &str,
        account: &str,
    ) -> Result<MetricsOutcome, PerchError>;

    /// Scan the account's history: posts, profile stats, and how far back
    /// the scan reliably reached.
    async fn sync_history(&self, account: &str) -> Result<SyncOutcome, PerchError>;

    /// Fetch a single post by URL.
    async fn import_one(&self, url: &str, account: &str) -> Result<ImportOutcome, PerchError>;
}
