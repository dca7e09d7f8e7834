//! Embedding and generation gateway traits
//!
//! Both backends are external services. The pipeline only sees these traits,
//! so a live network backend and a deterministic mock are interchangeable.

use crate::error::RagResult;
use async_trait::async_trait;
use std::sync::Arc;

/// Converts text into a fixed-dimension embedding vector.
///
/// Implementations fail with [`RagError::Upstream`](crate::RagError::Upstream)
/// when the backend is unreachable or answers with a non-success status, and
/// with [`RagError::Timeout`](crate::RagError::Timeout) when the call exceeds
/// its deadline.
#[async_trait]
pub trait EmbeddingGateway: Send + Sync {
    /// Name of the embedding model, recorded in index snapshots.
    fn model(&self) -> &str;

    /// Embed a single text.
    async fn embed(&self, text: &str) -> RagResult<Vec<f64>>;

    /// Embed several texts at once.
    ///
    /// The returned vectors correspond one-to-one, in order, with `texts`.
    async fn embed_batch(&self, texts: &[String]) -> RagResult<Vec<Vec<f64>>> {
        let mut vectors = Vec::with_capacity(texts.len());
        for text in texts {
            vectors.push(self.embed(text).await?);
        }
        Ok(vectors)
    }
}

/// Turns a prompt into a completion string.
///
/// Streaming backends accumulate their fragments and return the full text.
#[async_trait]
pub trait GenerationGateway: Send + Sync {
    /// Generate a completion for `prompt` with the named model.
    async fn generate(&self, prompt: &str, model: &str) -> RagResult<String>;
}

#[async_trait]
impl<T: EmbeddingGateway + ?Sized> EmbeddingGateway for Arc<T> {
    fn model(&self) -> &str {
        (**self).model()
    }

    async fn embed(&self, text: &str) -> RagResult<Vec<f64>> {
        (**self).embed(text).await
    }

    async fn embed_batch(&self, texts: &[String]) -> RagResult<Vec<Vec<f64>>> {
        (**self).embed_batch(texts).await
    }
}

#[async_trait]
impl<T: GenerationGateway + ?Sized> GenerationGateway for Arc<T> {
    async fn generate(&self, prompt: &str, model: &str) -> RagResult<String> {
        (**self).generate(prompt, model).await
    }
}
