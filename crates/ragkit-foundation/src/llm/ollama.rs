//! Ollama embedding and generation gateway
//!
//! Talks to the native Ollama HTTP API:
//! - `POST {base}/api/embed` with `{model, input}` answers `{embeddings: [[...]]}`
//! - `POST {base}/api/generate` with `{model, prompt, stream: true}` answers an
//!   NDJSON stream of `{response, done}` fragments
//!
//! # Example
//!
//! ```rust,ignore
//! use ragkit_foundation::llm::{OllamaClient, OllamaConfig};
//!
//! let client = OllamaClient::with_config(
//!     OllamaConfig::from_env().with_embedding_model("nomic-embed-text"),
//! )?;
//! let vector = client.embed("hello").await?;
//! ```

use async_trait::async_trait;
use futures::StreamExt;
use ragkit_kernel::rag::{EmbeddingGateway, GenerationGateway};
use ragkit_kernel::{RagError, RagResult};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

pub const DEFAULT_BASE_URL: &str = "http://localhost:11434";
pub const DEFAULT_EMBEDDING_MODEL: &str = "nomic-embed-text";
pub const DEFAULT_GENERATION_MODEL: &str = "llama3.2:3b";

/// Connection settings for a local Ollama server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OllamaConfig {
    /// Server root without the `/api` suffix
    pub base_url: String,
    pub embedding_model: String,
    /// Used when a generation call does not name a model
    pub generation_model: String,
    /// Per-request timeout
    pub timeout_secs: u64,
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            embedding_model: DEFAULT_EMBEDDING_MODEL.to_string(),
            generation_model: DEFAULT_GENERATION_MODEL.to_string(),
            timeout_secs: 120,
        }
    }
}

impl OllamaConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Defaults overridden by `OLLAMA_HOST`, `OLLAMA_EMBED_MODEL` and `OLLAMA_MODEL`.
    pub fn from_env() -> Self {
        let mut cfg = Self::default();
        cfg.apply_env();
        cfg
    }

    pub(crate) fn apply_env(&mut self) {
        if let Ok(host) = std::env::var("OLLAMA_HOST") {
            if !host.trim().is_empty() {
                self.base_url = normalize_base_url(&host);
            }
        }
        if let Ok(model) = std::env::var("OLLAMA_EMBED_MODEL") {
            if !model.trim().is_empty() {
                self.embedding_model = model;
            }
        }
        if let Ok(model) = std::env::var("OLLAMA_MODEL") {
            if !model.trim().is_empty() {
                self.generation_model = model;
            }
        }
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    pub fn with_embedding_model(mut self, model: impl Into<String>) -> Self {
        self.embedding_model = model.into();
        self
    }

    pub fn with_generation_model(mut self, model: impl Into<String>) -> Self {
        self.generation_model = model.into();
        self
    }

    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }
}

/// `OLLAMA_HOST` may be a bare `host:port`.
fn normalize_base_url(host: &str) -> String {
    let host = host.trim().trim_end_matches('/');
    if host.starts_with("http://") || host.starts_with("https://") {
        host.to_string()
    } else {
        format!("http://{host}")
    }
}

#[derive(Serialize)]
struct EmbedRequest<'a, I: Serialize> {
    model: &'a str,
    input: I,
}

#[derive(Deserialize)]
struct EmbedResponse {
    #[serde(default)]
    embeddings: Vec<Vec<f64>>,
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
}

#[derive(Deserialize)]
struct GenerateFragment {
    #[serde(default)]
    response: String,
    #[serde(default)]
    done: bool,
    #[serde(default)]
    error: Option<String>,
}

/// HTTP client for one Ollama server, usable as both gateways.
pub struct OllamaClient {
    client: reqwest::Client,
    config: OllamaConfig,
}

impl OllamaClient {
    pub fn new() -> RagResult<Self> {
        Self::with_config(OllamaConfig::default())
    }

    pub fn from_env() -> RagResult<Self> {
        Self::with_config(OllamaConfig::from_env())
    }

    pub fn with_config(config: OllamaConfig) -> RagResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| RagError::upstream("http client", e.to_string()))?;
        Ok(Self { client, config })
    }

    pub fn config(&self) -> &OllamaConfig {
        &self.config
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.config.base_url.trim_end_matches('/'), path)
    }

    fn map_error(&self, operation: &str, err: reqwest::Error) -> RagError {
        if err.is_timeout() {
            RagError::timeout(operation, self.config.timeout_secs.saturating_mul(1000))
        } else if err.is_connect() {
            RagError::upstream(operation, format!("cannot reach {}: {err}", self.config.base_url))
        } else {
            RagError::upstream(operation, err.to_string())
        }
    }

    async fn post<B: Serialize + ?Sized>(
        &self,
        operation: &str,
        path: &str,
        body: &B,
    ) -> RagResult<reqwest::Response> {
        let response = self
            .client
            .post(self.endpoint(path))
            .json(body)
            .send()
            .await
            .map_err(|e| self.map_error(operation, e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(RagError::upstream(
                operation,
                format!("status {}: {}", status.as_u16(), body.trim()),
            ));
        }
        Ok(response)
    }

    async fn request_embeddings<I: Serialize + Send + Sync>(
        &self,
        input: I,
    ) -> RagResult<Vec<Vec<f64>>> {
        let request = EmbedRequest {
            model: &self.config.embedding_model,
            input,
        };
        let response = self.post("embed", "api/embed", &request).await?;
        let body = response
            .text()
            .await
            .map_err(|e| self.map_error("embed", e))?;
        let parsed: EmbedResponse = serde_json::from_str(&body)
            .map_err(|e| RagError::upstream("embed", format!("invalid response: {e}")))?;

        if parsed.embeddings.iter().any(|v| v.is_empty()) {
            return Err(RagError::upstream("embed", "empty embedding in response"));
        }
        Ok(parsed.embeddings)
    }
}

#[async_trait]
impl EmbeddingGateway for OllamaClient {
    fn model(&self) -> &str {
        &self.config.embedding_model
    }

    async fn embed(&self, text: &str) -> RagResult<Vec<f64>> {
        self.request_embeddings(text)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| RagError::upstream("embed", "no embeddings returned"))
    }

    async fn embed_batch(&self, texts: &[String]) -> RagResult<Vec<Vec<f64>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        let vectors = self.request_embeddings(texts).await?;
        if vectors.len() != texts.len() {
            return Err(RagError::upstream(
                "embed",
                format!("expected {} embeddings, got {}", texts.len(), vectors.len()),
            ));
        }
        Ok(vectors)
    }
}

#[async_trait]
impl GenerationGateway for OllamaClient {
    async fn generate(&self, prompt: &str, model: &str) -> RagResult<String> {
        let model = if model.trim().is_empty() {
            self.config.generation_model.as_str()
        } else {
            model
        };
        let request = GenerateRequest {
            model,
            prompt,
            stream: true,
        };
        let response = self.post("generate", "api/generate", &request).await?;

        let mut stream = response.bytes_stream();
        let mut pending: Vec<u8> = Vec::new();
        let mut answer = String::new();
        let mut done = false;

        while !done {
            let Some(bytes) = stream.next().await else {
                break;
            };
            pending.extend_from_slice(&bytes.map_err(|e| self.map_error("generate", e))?);
            while let Some(pos) = pending.iter().position(|b| *b == b'\n') {
                let line: Vec<u8> = pending.drain(..=pos).collect();
                if accumulate_fragment(&line, &mut answer)? {
                    done = true;
                    break;
                }
            }
        }
        if !done && !pending.is_empty() {
            accumulate_fragment(&pending, &mut answer)?;
        }

        debug!(model, chars = answer.len(), "Generation finished");
        Ok(answer)
    }
}

/// Append one NDJSON fragment to `answer`; returns true once the stream is done.
fn accumulate_fragment(line: &[u8], answer: &mut String) -> RagResult<bool> {
    let line = String::from_utf8_lossy(line);
    let line = line.trim();
    if line.is_empty() {
        return Ok(false);
    }
    let fragment: GenerateFragment = serde_json::from_str(line)
        .map_err(|e| RagError::upstream("generate", format!("invalid stream line: {e}")))?;
    if let Some(error) = fragment.error {
        return Err(RagError::upstream("generate", error));
    }
    answer.push_str(&fragment.response);
    Ok(fragment.done)
}
