use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

use serde_json::Value;
use tokio::time::{sleep, timeout, Duration};
use tracing::warn;

use crate::observability::metrics::Metrics;
use crate::store::{
    Collection, CommitOutcome, DocPath, DocumentStore, Snapshot, StoreError, WriteBatch,
};

/// Timeout and retry bounds applied to every store call, and the attempt
/// limit for optimistic read-modify-write loops.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub call_timeout: Duration,
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            call_timeout: Duration::from_millis(5_000),
            backoff: Duration::from_millis(25),
        }
    }
}

impl RetryPolicy {
    /// Linear backoff before attempt `attempt + 1`.
    pub fn backoff_for(&self, attempt: u32) -> Duration {
        self.backoff * attempt
    }

    /// Runs `call` until it succeeds, fails permanently, or the attempt limit
    /// is reached. Each attempt is cut off after `call_timeout`.
    pub async fn run<T, F, Fut>(
        &self,
        op: &'static str,
        metrics: &Metrics,
        mut call: F,
    ) -> Result<T, StoreError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, StoreError>>,
    {
        let max_attempts = self.max_attempts.max(1);
        let mut attempt = 1;

        loop {
            let start = Instant::now();
            let result = match timeout(self.call_timeout, call()).await {
                Ok(result) => result,
                Err(_) => Err(StoreError::Timeout),
            };

            let outcome = if result.is_ok() { "success" } else { "error" };
            metrics
                .store_call_latency_seconds
                .with_label_values(&[op, outcome])
                .observe(start.elapsed().as_secs_f64());

            match result {
                Err(err) if err.is_transient() && attempt < max_attempts => {
                    warn!(op, attempt, error = %err, "store call failed; retrying");
                    sleep(self.backoff_for(attempt)).await;
                    attempt += 1;
                }
                other => return other,
            }
        }
    }
}

/// A [`DocumentStore`] handle whose calls all go through a [`RetryPolicy`].
#[derive(Clone)]
pub struct GuardedStore {
    inner: Arc<dyn DocumentStore>,
    policy: RetryPolicy,
    metrics: Metrics,
}

impl GuardedStore {
    pub fn new(inner: Arc<dyn DocumentStore>, policy: RetryPolicy, metrics: Metrics) -> Self {
        Self {
            inner,
            policy,
            metrics,
        }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    pub async fn get(&self, path: &DocPath) -> Result<Option<Snapshot>, StoreError> {
        self.policy
            .run("get", &self.metrics, || self.inner.get(path))
            .await
    }

    pub async fn query_eq(
        &self,
        collection: Collection,
        field: &str,
        value: &Value,
    ) -> Result<Vec<Snapshot>, StoreError> {
        self.policy
            .run("query", &self.metrics, || {
                self.inner.query_eq(collection, field, value)
            })
            .await
    }

    pub async fn set(&self, path: &DocPath, value: Value) -> Result<(), StoreError> {
        self.policy
            .run("set", &self.metrics, || self.inner.set(path, value.clone()))
            .await
    }

    pub async fn commit(&self, batch: WriteBatch) -> Result<CommitOutcome, StoreError> {
        self.policy
            .run("commit", &self.metrics, || self.inner.commit(batch.clone()))
            .await
    }
}
