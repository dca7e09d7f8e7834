//! Workspace-level build and query flows
//!
//! [`RagPipeline`] binds a [`RagConfig`] to a [`WorkspaceStore`]. `build`
//! turns a workspace's ingest manifest into a saved snapshot and records the
//! build statistics; `search` and `ask` open that snapshot and query it with
//! the configured defaults.

use crate::config::RagConfig;
use crate::llm::{OllamaClient, RetryingEmbedder, RetryingGenerator};
use crate::rag::builder::BuildReport;
use crate::rag::retriever::{AskOutput, RagRetriever};
use ragkit_kernel::RagResult;
use ragkit_kernel::rag::{EmbeddingGateway, GenerationGateway, SearchHit};
use ragkit_kernel::workspace::{ModelStats, WorkspaceStore};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Build and query pipeline over the workspaces of one store.
#[derive(Clone)]
pub struct RagPipeline {
    config: RagConfig,
    store: Arc<dyn WorkspaceStore>,
    embedder: Arc<dyn EmbeddingGateway>,
    generator: Arc<dyn GenerationGateway>,
    cancel: CancellationToken,
}

impl RagPipeline {
    /// Validate `config` and assemble the pipeline.
    ///
    /// When `config.retry.max_attempts` is above 1 both gateways are wrapped
    /// in [`RetryingEmbedder`] and [`RetryingGenerator`].
    pub fn new(
        config: RagConfig,
        store: Arc<dyn WorkspaceStore>,
        embedder: Arc<dyn EmbeddingGateway>,
        generator: Arc<dyn GenerationGateway>,
    ) -> RagResult<Self> {
        config.validate()?;

        let (embedder, generator): (Arc<dyn EmbeddingGateway>, Arc<dyn GenerationGateway>) =
            if config.retry.max_attempts > 1 {
                debug!(max_attempts = config.retry.max_attempts, "Gateway retries enabled");
                (
                    Arc::new(RetryingEmbedder::new(embedder, config.retry.clone())),
                    Arc::new(RetryingGenerator::new(generator, config.retry.clone())),
                )
            } else {
                (embedder, generator)
            };

        Ok(Self {
            config,
            store,
            embedder,
            generator,
            cancel: CancellationToken::new(),
        })
    }

    /// Pipeline whose gateways are an [`OllamaClient`] built from
    /// `config.ollama`.
    pub fn ollama(config: RagConfig, store: Arc<dyn WorkspaceStore>) -> RagResult<Self> {
        let client = Arc::new(OllamaClient::with_config(config.ollama.clone())?);
        Self::new(config, store, client.clone(), client)
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn config(&self) -> &RagConfig {
        &self.config
    }

    pub fn store(&self) -> &dyn WorkspaceStore {
        self.store.as_ref()
    }

    /// Rebuild the index of workspace `model` from its manifest.
    ///
    /// The snapshot is written to the store's index path only after every
    /// chunk is embedded, then the model's statistics are updated.
    pub async fn build(&self, model: &str) -> RagResult<BuildReport> {
        let manifest = self.store.manifest(model)?;
        let output = self
            .config
            .index_builder(self.embedder.clone())
            .with_cancellation(self.cancel.clone())
            .build_from_manifest(&manifest.sources)
            .await?;

        let path = self.store.index_path(model);
        output.index.save(&path)?;
        self.store.record_build(
            model,
            ModelStats {
                chunks: output.report.chunks,
                embeddings: output.report.embedded,
            },
        )?;
        info!(
            model,
            path = %path.display(),
            embedded = output.report.embedded,
            "Workspace index saved"
        );
        Ok(output.report)
    }

    /// Open a retriever over the saved index of `model`.
    pub fn retriever(&self, model: &str) -> RagResult<RagRetriever> {
        self.store.get_model(model)?;
        let retriever = RagRetriever::open(
            self.store.index_path(model),
            self.embedder.clone(),
            self.generator.clone(),
        )?;
        Ok(retriever
            .with_generation_model(self.config.generation_model())
            .with_cancellation(self.cancel.clone()))
    }

    /// Semantic search with the configured `retrieval.top_k`.
    pub async fn search(&self, model: &str, query: &str) -> RagResult<Vec<SearchHit>> {
        self.search_with_top_k(model, query, self.config.retrieval.top_k)
            .await
    }

    pub async fn search_with_top_k(
        &self,
        model: &str,
        query: &str,
        top_k: usize,
    ) -> RagResult<Vec<SearchHit>> {
        self.retriever(model)?.retrieve(query, top_k).await
    }

    /// Answer `query` from workspace `model` with the configured `top_k` and
    /// generation model.
    pub async fn ask(&self, model: &str, query: &str) -> RagResult<AskOutput> {
        self.ask_with_top_k(model, query, self.config.retrieval.top_k)
            .await
    }

    pub async fn ask_with_top_k(
        &self,
        model: &str,
        query: &str,
        top_k: usize,
    ) -> RagResult<AskOutput> {
        self.retriever(model)?.ask(query, top_k).await
    }
}
