// SPDX-FileCopyrightText: 2026 Perch Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP client for the browser worker sidecar.
//!
//! The worker owns the browser session: cookies, DOM selectors, typing
//! simulation, screenshots. Perch talks to it over a small JSON API and
//! treats every call as fallible; the engine layers its own per-operation
//! timeouts on top of the transport timeout here.

use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use tracing::debug;

use perch_config::model::WorkerConfig;
use perch_core::{
    ImportOutcome, MetricsOutcome, PerchError, PlatformAgent, PublishOutcome, PublishRequest,
    SyncOutcome,
};

/// HTTP implementation of [`PlatformAgent`] against the worker sidecar.
#[derive(Debug, Clone)]
pub struct WorkerAgent {
    client: reqwest::Client,
    base_url: String,
}

#[derive(Serialize)]
struct MetricsBody<'a> {
    external_id: &'a str,
    account: &'a str,
}

#[derive(Serialize)]
struct SyncBody<'a> {
    account: &'a str,
}

#[derive(Serialize)]
struct ImportBody<'a> {
    url: &'a str,
    account: &'a str,
}

impl WorkerAgent {
    /// Create a new worker client from configuration.
    pub fn new(config: &WorkerConfig) -> Result<Self, PerchError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| PerchError::Agent {
                message: format!("failed to build HTTP client: {e}"),
                source: Some(Box::new(e)),
            })?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Overrides the base URL (for testing against a local mock server).
    #[cfg(test)]
    fn with_base_url(mut self, url: String) -> Self {
        self.base_url = url.trim_end_matches('/').to_string();
        self
    }

    /// POST a JSON body to a worker endpoint and decode the JSON response.
    async fn post<B, R>(&self, path: &str, body: &B) -> Result<R, PerchError>
    where
        B: Serialize + ?Sized,
        R: serde::de::DeserializeOwned,
    {
        let url = format!("{}{path}", self.base_url);
        let response = self
            .client
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(|e| PerchError::Agent {
                message: format!("worker request to {path} failed: {e}"),
                source: Some(Box::new(e)),
            })?;

        let status = response.status();
        debug!(%status, path, "worker response received");
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(PerchError::Agent {
                message: format!("worker returned {status} for {path}: {body}"),
                source: None,
            });
        }

        response.json().await.map_err(|e| PerchError::Agent {
            message: format!("malformed worker response from {path}: {e}"),
            source: Some(Box::new(e)),
        })
    }
}

#[async_trait]
impl PlatformAgent for WorkerAgent {
    async fn publish(&self, request: PublishRequest) -> Result<PublishOutcome, PerchError> {
        self.post("/publish", &request).await
    }

    async fn scrape_metrics(
        &self,
        external_id: &str,
        account: &str,
    ) -> Result<MetricsOutcome, PerchError> {
        self.post(
            "/metrics",
            &MetricsBody {
                external_id,
                account,
            },
        )
        .await
    }

    async fn sync_history(&self, account: &str) -> Result<SyncOutcome, PerchError> {
        self.post("/sync", &SyncBody { account }).await
    }

    async fn import_one(&self, url: &str, account: &str) -> Result<ImportOutcome, PerchError> {
        self.post("/import", &ImportBody { url, account }).await
    }
}
