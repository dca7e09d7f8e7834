//! Pipeline configuration
//!
//! Every section has defaults, so a config file only needs the keys it
//! changes.
//!
//! # Example config (ragkit.toml)
//!
//! ```toml
//! data_dir = "/var/lib/ragkit"
//!
//! [ollama]
//! base_url = "${OLLAMA_URL}"   # environment variables are substituted
//! embedding_model = "nomic-embed-text"
//!
//! [chunking]
//! target_size = 600
//! overlap = 120
//!
//! [retrieval]
//! top_k = 5
//!
//! [retry]
//! max_attempts = 3
//! ```

use crate::llm::{OllamaConfig, RetryPolicy};
use crate::rag::builder::{DEFAULT_WORKERS, IndexBuilder};
use crate::rag::chunker::ChunkOptions;
use crate::workspace::FsWorkspace;
use ragkit_kernel::config::{self, FileFormat};
use ragkit_kernel::rag::EmbeddingGateway;
use ragkit_kernel::{RagError, RagResult};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Query-time settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    /// Chunks placed into each prompt
    pub top_k: usize,
    /// Generation model; `None` uses the gateway default
    pub generation_model: Option<String>,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: 3,
            generation_model: None,
        }
    }
}

/// Index build settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildConfig {
    /// Embedding requests in flight
    pub workers: usize,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            workers: DEFAULT_WORKERS,
        }
    }
}

/// Root configuration of a ragkit deployment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RagConfig {
    /// Root of the workspace store
    pub data_dir: PathBuf,
    pub ollama: OllamaConfig,
    pub chunking: ChunkOptions,
    pub retrieval: RetrievalConfig,
    pub build: BuildConfig,
    pub retry: RetryPolicy,
}

impl Default for RagConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from(".ragkit"),
            ollama: OllamaConfig::default(),
            chunking: ChunkOptions::default(),
            retrieval: RetrievalConfig::default(),
            build: BuildConfig::default(),
            retry: RetryPolicy::default(),
        }
    }
}

impl RagConfig {
    /// Load from a TOML, YAML, JSON, INI, RON or JSON5 file.
    pub fn from_file(path: impl AsRef<Path>) -> RagResult<Self> {
        let config: Self = config::load_config(path)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_str(content: &str, format: FileFormat) -> RagResult<Self> {
        let config: Self = config::from_str(content, format)?;
        config.validate()?;
        Ok(config)
    }

    /// Defaults overridden by `OLLAMA_HOST`, `OLLAMA_EMBED_MODEL`,
    /// `OLLAMA_MODEL` and `RAGKIT_DATA_DIR`.
    pub fn from_env() -> Self {
        Self::default().with_env_overrides()
    }

    /// Apply the environment overrides of [`from_env`](Self::from_env).
    pub fn with_env_overrides(mut self) -> Self {
        self.ollama.apply_env();
        if let Ok(dir) = std::env::var("RAGKIT_DATA_DIR") {
            if !dir.trim().is_empty() {
                self.data_dir = PathBuf::from(dir);
            }
        }
        self
    }

    pub fn validate(&self) -> RagResult<()> {
        self.chunking.validate()?;
        if self.retrieval.top_k == 0 {
            return Err(RagError::Validation(
                "retrieval.top_k must be greater than 0".to_string(),
            ));
        }
        if self.build.workers == 0 {
            return Err(RagError::Validation(
                "build.workers must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }

    /// Generation model for queries, falling back to the Ollama default.
    pub fn generation_model(&self) -> &str {
        self.retrieval
            .generation_model
            .as_deref()
            .unwrap_or(&self.ollama.generation_model)
    }

    /// Filesystem workspace store rooted at `data_dir`.
    pub fn workspace(&self) -> FsWorkspace {
        FsWorkspace::new(self.data_dir.clone())
    }

    /// Index builder using this configuration's chunking and parallelism.
    pub fn index_builder(&self, embedder: Arc<dyn EmbeddingGateway>) -> IndexBuilder {
        IndexBuilder::new(embedder, self.chunking.clone()).with_workers(self.build.workers)
    }
}
