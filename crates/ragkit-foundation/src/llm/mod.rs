//! Backend gateways for embedding and generation
//!
//! - [`OllamaClient`]: native Ollama HTTP API
//! - [`MockEmbedder`] / [`MockGenerator`]: deterministic in-process backends
//! - [`RetryingEmbedder`] / [`RetryingGenerator`]: backoff decorators

pub mod mock;
pub mod ollama;
pub mod retry;

pub use mock::{MockEmbedder, MockGenerator};
pub use ollama::{OllamaClient, OllamaConfig};
pub use retry::{RetryPolicy, RetryingEmbedder, RetryingGenerator};
