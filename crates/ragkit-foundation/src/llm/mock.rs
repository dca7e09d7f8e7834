//! Deterministic in-process gateways for tests and offline runs

use async_trait::async_trait;
use parking_lot::Mutex;
use ragkit_kernel::rag::{EmbeddingGateway, GenerationGateway};
use ragkit_kernel::{RagError, RagResult};
use sha2::{Digest, Sha256};
use std::collections::{HashMap, HashSet, VecDeque};
use std::time::Duration;

/// Embedding gateway producing hash-seeded vectors.
///
/// The same text always maps to the same vector, so searches over a mock
/// index are reproducible. Individual texts can be pinned to explicit
/// vectors, made to fail, or delayed to shuffle completion order.
pub struct MockEmbedder {
    model: String,
    dimension: usize,
    overrides: HashMap<String, Vec<f64>>,
    failures: HashSet<String>,
    delays: HashMap<String, Duration>,
    calls: Mutex<Vec<String>>,
}

impl MockEmbedder {
    pub fn new(dimension: usize) -> Self {
        Self {
            model: "mock-embed".to_string(),
            dimension,
            overrides: HashMap::new(),
            failures: HashSet::new(),
            delays: HashMap::new(),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Return `vector` whenever exactly `text` is embedded.
    pub fn with_vector(mut self, text: impl Into<String>, vector: Vec<f64>) -> Self {
        self.overrides.insert(text.into(), vector);
        self
    }

    /// Fail with an upstream error whenever exactly `text` is embedded.
    pub fn with_failure(mut self, text: impl Into<String>) -> Self {
        self.failures.insert(text.into());
        self
    }

    pub fn with_delay(mut self, text: impl Into<String>, delay: Duration) -> Self {
        self.delays.insert(text.into(), delay);
        self
    }

    /// Texts embedded so far, in call order.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }

    fn hashed_vector(&self, text: &str) -> Vec<f64> {
        let mut vector = Vec::with_capacity(self.dimension);
        let mut block = 0u32;
        while vector.len() < self.dimension {
            let mut hasher = Sha256::new();
            hasher.update(block.to_le_bytes());
            hasher.update(text.as_bytes());
            for byte in hasher.finalize() {
                if vector.len() == self.dimension {
                    break;
                }
                vector.push(f64::from(byte) / 127.5 - 1.0);
            }
            block += 1;
        }
        vector
    }
}

#[async_trait]
impl EmbeddingGateway for MockEmbedder {
    fn model(&self) -> &str {
        &self.model
    }

    async fn embed(&self, text: &str) -> RagResult<Vec<f64>> {
        self.calls.lock().push(text.to_string());
        if let Some(delay) = self.delays.get(text) {
            tokio::time::sleep(*delay).await;
        }
        if self.failures.contains(text) {
            return Err(RagError::upstream("embed", "injected failure"));
        }
        Ok(self
            .overrides
            .get(text)
            .cloned()
            .unwrap_or_else(|| self.hashed_vector(text)))
    }
}

enum Reply {
    Text(String),
    Failure(String),
}

/// Generation gateway answering from a FIFO of canned replies.
///
/// Once the queue is drained it echoes the prompt back.
#[derive(Default)]
pub struct MockGenerator {
    replies: Mutex<VecDeque<Reply>>,
    prompts: Mutex<Vec<(String, String)>>,
}

impl MockGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_response(self, text: impl Into<String>) -> Self {
        self.push_response(text);
        self
    }

    pub fn with_failure(self, message: impl Into<String>) -> Self {
        self.replies.lock().push_back(Reply::Failure(message.into()));
        self
    }

    pub fn push_response(&self, text: impl Into<String>) {
        self.replies.lock().push_back(Reply::Text(text.into()));
    }

    /// Prompts received so far, in call order.
    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().iter().map(|(p, _)| p.clone()).collect()
    }

    /// Model names received so far, in call order.
    pub fn models(&self) -> Vec<String> {
        self.prompts.lock().iter().map(|(_, m)| m.clone()).collect()
    }
}

#[async_trait]
impl GenerationGateway for MockGenerator {
    async fn generate(&self, prompt: &str, model: &str) -> RagResult<String> {
        self.prompts
            .lock()
            .push((prompt.to_string(), model.to_string()));
        let reply = self.replies.lock().pop_front();
        match reply {
            Some(Reply::Text(text)) => Ok(text),
            Some(Reply::Failure(message)) => Err(RagError::upstream("generate", message)),
            None => Ok(prompt.to_string()),
        }
    }
}
