// SPDX-FileCopyrightText: 2026 Perch Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mock platform agent for deterministic testing.
//!
//! `MockAgent` implements `PlatformAgent` with scripted outcome queues and
//! captured calls for assertion in tests. When a queue is empty the mock
//! falls back to a benign default: publishes succeed with a generated
//! numeric external id, scrapes return zeros, syncs return an empty batch.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;

use perch_core::{
    ImportOutcome, MetricsOutcome, PerchError, PlatformAgent, PublishOutcome, PublishRequest,
    SyncOutcome,
};

/// A scriptable platform agent for tests.
pub struct MockAgent {
    publish_results: Mutex<VecDeque<Result<PublishOutcome, PerchError>>>,
    metrics_results: Mutex<VecDeque<Result<MetricsOutcome, PerchError>>>,
    sync_results: Mutex<VecDeque<Result<SyncOutcome, PerchError>>>,
    import_results: Mutex<VecDeque<Result<ImportOutcome, PerchError>>>,

    publish_calls: Mutex<Vec<PublishRequest>>,
    metrics_calls: Mutex<Vec<(String, String)>>,
    sync_calls: Mutex<Vec<String>>,
    import_calls: Mutex<Vec<(String, String)>>,

    /// Optional artificial latency on publish, for timeout tests.
    publish_delay: Mutex<Option<Duration>>,

    next_external_id: AtomicU64,
}

impl MockAgent {
    pub fn new() -> Self {
        Self {
            publish_results: Mutex::new(VecDeque::new()),
            metrics_results: Mutex::new(VecDeque::new()),
            sync_results: Mutex::new(VecDeque::new()),
            import_results: Mutex::new(VecDeque::new()),
            publish_calls: Mutex::new(Vec::new()),
            metrics_calls: Mutex::new(Vec::new()),
            sync_calls: Mutex::new(Vec::new()),
            import_calls: Mutex::new(Vec::new()),
            publish_delay: Mutex::new(None),
            // Big enough that the id's timestamp portion is non-zero.
            next_external_id: AtomicU64::new(1_600_000_000_000_000_000),
        }
    }

    // --- Scripting ---

    pub async fn push_publish_result(&self, result: Result<PublishOutcome, PerchError>) {
        self.publish_results.lock().await.push_back(result);
    }

    pub async fn push_metrics_result(&self, result: Result<MetricsOutcome, PerchError>) {
        self.metrics_results.lock().await.push_back(result);
    }

    pub async fn push_sync_result(&self, result: Result<SyncOutcome, PerchError>) {
        self.sync_results.lock().await.push_back(result);
    }

    pub async fn push_import_result(&self, result: Result<ImportOutcome, PerchError>) {
        self.import_results.lock().await.push_back(result);
    }

    /// Make every publish call sleep before responding.
    pub async fn set_publish_delay(&self, delay: Duration) {
        *self.publish_delay.lock().await = Some(delay);
    }

    // --- Assertions ---

    pub async fn publish_calls(&self) -> Vec<PublishRequest> {
        self.publish_calls.lock().await.clone()
    }

    pub async fn publish_call_count(&self) -> usize {
        self.publish_calls.lock().await.len()
    }

    pub async fn metrics_calls(&self) -> Vec<(String, String)> {
        self.metrics_calls.lock().await.clone()
    }

    pub async fn sync_calls(&self) -> Vec<String> {
        self.sync_calls.lock().await.clone()
    }

    pub async fn import_calls(&self) -> Vec<(String, String)> {
        self.import_calls.lock().await.clone()
    }

    fn generated_external_id(&self) -> String {
        self.next_external_id
            .fetch_add(1, Ordering::SeqCst)
            .to_string()
    }
}

impl Default for MockAgent {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PlatformAgent for MockAgent {
    async fn publish(&self, request: PublishRequest) -> Result<PublishOutcome, PerchError> {
        self.publish_calls.lock().await.push(request);
        let delay = *self.publish_delay.lock().await;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        match self.publish_results.lock().await.pop_front() {
            Some(result) => result,
            None => Ok(PublishOutcome {
                success: true,
                log: "mock publish".to_string(),
                external_id: Some(self.generated_external_id()),
            }),
        }
    }

    async fn scrape_metrics(
        &self,
        external_id: &str,
        account: &str,
    ) -> Result<MetricsOutcome, PerchError> {
        self.metrics_calls
            .lock()
            .await
            .push((external_id.to_string(), account.to_string()));
        match self.metrics_results.lock().await.pop_front() {
            Some(result) => result,
            None => Ok(MetricsOutcome {
                success: true,
                log: "mock scrape".to_string(),
                metrics: Default::default(),
            }),
        }
    }

    async fn sync_history(&self, account: &str) -> Result<SyncOutcome, PerchError> {
        self.sync_calls.lock().await.push(account.to_string());
        match self.sync_results.lock().await.pop_front() {
            Some(result) => result,
            None => Ok(SyncOutcome {
                success: true,
                log: "mock sync".to_string(),
                ..Default::default()
            }),
        }
    }

    async fn import_one(&self, url: &str, account: &str) -> Result<ImportOutcome, PerchError> {
        self.import_calls
            .lock()
            .await
            .push((url.to_string(), account.to_string()));
        match self.import_results.lock().await.pop_front() {
            Some(result) => result,
            None => Ok(ImportOutcome {
                success: false,
                log: "mock import: no record scripted".to_string(),
                record: None,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> PublishRequest {
        PublishRequest {
            account: "sparrow".into(),
            content: "hi".into(),
            media_refs: vec![],
            reply_to_external_id: None,
        }
    }

    #[tokio::test]
    async fn scripted_results_pop_in_order() {
        let agent = MockAgent::new();
        agent
            .push_publish_result(Ok(PublishOutcome::failure("first fails")))
            .await;

        let first = agent.publish(request()).await.unwrap();
        assert!(!first.success);

        let second = agent.publish(request()).await.unwrap();
        assert!(second.success, "empty queue falls back to success");
        assert!(second.external_id.is_some());
    }

    #[tokio::test]
    async fn generated_external_ids_are_unique() {
        let agent = MockAgent::new();
        let a = agent.publish(request()).await.unwrap();
        let b = agent.publish(request()).await.unwrap();
        assert_ne!(a.external_id, b.external_id);
    }

    #[tokio::test]
    async fn calls_are_recorded() {
        let agent = MockAgent::new();
        agent.publish(request()).await.unwrap();
        agent.scrape_metrics("111", "sparrow").await.unwrap();
        agent.sync_history("sparrow").await.unwrap();

        assert_eq!(agent.publish_call_count().await, 1);
        assert_eq!(
            agent.metrics_calls().await,
            vec![("111".to_string(), "sparrow".to_string())]
        );
        assert_eq!(agent.sync_calls().await, vec!["sparrow".to_string()]);
    }
}
