//! Retry decorators for the backend gateways
//!
//! Only transient failures ([`RagError::is_retryable`](ragkit_kernel::RagError::is_retryable))
//! are retried, with exponential backoff between attempts. The default policy makes a single
//! attempt, so wrapping a gateway changes nothing until it is configured.

use async_trait::async_trait;
use ragkit_kernel::rag::{EmbeddingGateway, GenerationGateway};
use ragkit_kernel::RagResult;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;
use tracing::{Instrument, debug, info, warn};

/// Backoff schedule for gateway calls.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Total attempts including the first one
    pub max_attempts: u32,
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
    pub multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 1,
            initial_backoff_ms: 200,
            max_backoff_ms: 5000,
            multiplier: 2.0,
        }
    }
}

impl RetryPolicy {
    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts;
        self
    }

    pub fn with_backoff(mut self, initial_ms: u64, max_ms: u64) -> Self {
        self.initial_backoff_ms = initial_ms;
        self.max_backoff_ms = max_ms;
        self
    }

    /// Delay before retry number `retry` (0 for the first retry).
    pub fn delay(&self, retry: u32) -> Duration {
        let factor = self.multiplier.max(1.0).powi(retry.min(i32::MAX as u32) as i32);
        let millis = (self.initial_backoff_ms as f64 * factor).min(self.max_backoff_ms as f64);
        Duration::from_millis(millis as u64)
    }

    async fn run<T, F, Fut>(&self, operation: &str, mut call: F) -> RagResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = RagResult<T>>,
    {
        let max_attempts = self.max_attempts.max(1);
        let mut attempt = 0;
        loop {
            let span = tracing::info_span!("gateway.retry_attempt", operation, attempt, max_attempts);
            if attempt > 0 {
                let delay = self.delay(attempt - 1);
                debug!(
                    "Retry attempt {}/{} after {}ms",
                    attempt + 1,
                    max_attempts,
                    delay.as_millis()
                );
                tokio::time::sleep(delay).instrument(span.clone()).await;
            }

            match call().instrument(span).await {
                Ok(value) => {
                    if attempt > 0 {
                        info!(operation, "Request succeeded on attempt {}", attempt + 1);
                    }
                    return Ok(value);
                }
                Err(error) if error.is_retryable() && attempt + 1 < max_attempts => {
                    warn!(operation, "Request failed (attempt {}): {}, retrying", attempt + 1, error);
                    attempt += 1;
                }
                Err(error) => {
                    if attempt > 0 {
                        warn!(
                            operation,
                            "Request failed after {} attempts. Last error: {}",
                            attempt + 1,
                            error
                        );
                    }
                    return Err(error);
                }
            }
        }
    }
}

/// Embedding gateway that retries transient failures of `inner`.
pub struct RetryingEmbedder<E> {
    inner: E,
    policy: RetryPolicy,
}

impl<E: EmbeddingGateway> RetryingEmbedder<E> {
    pub fn new(inner: E, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }
}

#[async_trait]
impl<E: EmbeddingGateway> EmbeddingGateway for RetryingEmbedder<E> {
    fn model(&self) -> &str {
        self.inner.model()
    }

    async fn embed(&self, text: &str) -> RagResult<Vec<f64>> {
        self.policy.run("embed", || self.inner.embed(text)).await
    }

    async fn embed_batch(&self, texts: &[String]) -> RagResult<Vec<Vec<f64>>> {
        self.policy
            .run("embed_batch", || self.inner.embed_batch(texts))
            .await
    }
}

/// Generation gateway that retries transient failures of `inner`.
pub struct RetryingGenerator<G> {
    inner: G,
    policy: RetryPolicy,
}

impl<G: GenerationGateway> RetryingGenerator<G> {
    pub fn new(inner: G, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }
}

#[async_trait]
impl<G: GenerationGateway> GenerationGateway for RetryingGenerator<G> {
    async fn generate(&self, prompt: &str, model: &str) -> RagResult<String> {
        self.policy
            .run("generate", || self.inner.generate(prompt, model))
            .await
    }
}
