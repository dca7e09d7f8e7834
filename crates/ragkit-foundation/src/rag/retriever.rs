//! Query-time retrieval and grounded generation
//!
//! [`RagRetriever`] ties a loaded index to the embedding and generation
//! gateways: embed the question, rank chunks by cosine similarity, render a
//! prompt from the ranked hits, and hand it to the generator.

use crate::rag::cancel::run_cancellable;
use crate::rag::prompt::PromptTemplate;
use crate::rag::vector_index::VectorIndex;
use ragkit_kernel::rag::{EmbeddingGateway, GenerationGateway, SearchHit, VectorSearch};
use ragkit_kernel::{RagError, RagResult};
use std::path::Path;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, info, warn};

/// Result of [`RagRetriever::ask`].
#[derive(Debug, Clone)]
pub struct AskOutput {
    /// Trimmed model answer
    pub answer: String,
    /// Hits the prompt was grounded on, best first
    pub retrieved: Vec<SearchHit>,
    /// Exact prompt sent to the generator
    pub prompt: String,
}

/// Answers questions against a read-only index.
pub struct RagRetriever {
    index: Arc<dyn VectorSearch>,
    embedder: Arc<dyn EmbeddingGateway>,
    generator: Arc<dyn GenerationGateway>,
    template: PromptTemplate,
    generation_model: String,
    cancel: CancellationToken,
}

impl RagRetriever {
    pub fn new(
        index: Arc<dyn VectorSearch>,
        embedder: Arc<dyn EmbeddingGateway>,
        generator: Arc<dyn GenerationGateway>,
    ) -> Self {
        Self {
            index,
            embedder,
            generator,
            template: PromptTemplate::default(),
            generation_model: String::new(),
            cancel: CancellationToken::new(),
        }
    }

    /// Load the snapshot at `path` and build a retriever over it.
    ///
    /// A missing snapshot fails with `IndexUnavailable`.
    pub fn open(
        path: impl AsRef<Path>,
        embedder: Arc<dyn EmbeddingGateway>,
        generator: Arc<dyn GenerationGateway>,
    ) -> RagResult<Self> {
        let index = VectorIndex::load(path)?;
        if let Some(indexed_with) = index.embedding_model() {
            if indexed_with != embedder.model() {
                warn!(
                    index_model = indexed_with,
                    query_model = embedder.model(),
                    "Index was built with a different embedding model"
                );
            }
        }
        Ok(Self::new(Arc::new(index), embedder, generator))
    }

    pub fn with_template(mut self, template: PromptTemplate) -> Self {
        self.template = template;
        self
    }

    /// Model used by [`ask`](Self::ask). Empty means the gateway's default.
    pub fn with_generation_model(mut self, model: impl Into<String>) -> Self {
        self.generation_model = model.into();
        self
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn index(&self) -> &dyn VectorSearch {
        self.index.as_ref()
    }

    /// Embed `query` and return the `top_k` most similar chunks.
    pub async fn retrieve(&self, query: &str, top_k: usize) -> RagResult<Vec<SearchHit>> {
        if query.trim().is_empty() {
            return Err(RagError::Validation("query must not be empty".to_string()));
        }
        if top_k == 0 {
            return Err(RagError::Validation(
                "top_k must be greater than 0".to_string(),
            ));
        }
        if self.index.is_empty() {
            return Err(RagError::EmptyCorpus(
                "the index has no records".to_string(),
            ));
        }

        let query_vector =
            run_cancellable(&self.cancel, "embed query", self.embedder.embed(query)).await?;
        let hits = self.index.search(&query_vector, top_k)?;
        debug!(hits = hits.len(), top_k, "Retrieved context");
        Ok(hits)
    }

    /// Answer `query` with the configured generation model.
    pub async fn ask(&self, query: &str, top_k: usize) -> RagResult<AskOutput> {
        self.ask_with_model(query, top_k, &self.generation_model)
            .await
    }

    /// Answer `query`, grounding the prompt on the `top_k` best chunks.
    pub async fn ask_with_model(
        &self,
        query: &str,
        top_k: usize,
        model: &str,
    ) -> RagResult<AskOutput> {
        let span = tracing::info_span!("rag.ask", top_k, model);
        async {
            let retrieved = self.retrieve(query, top_k).await?;
            let prompt = self.template.render(query, &retrieved);
            let answer = run_cancellable(
                &self.cancel,
                "generate answer",
                self.generator.generate(&prompt, model),
            )
            .await?;

            info!(hits = retrieved.len(), answer_chars = answer.len(), "Answered query");
            Ok(AskOutput {
                answer: answer.trim().to_string(),
                retrieved,
                prompt,
            })
        }
        .instrument(span)
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::mock::{MockEmbedder, MockGenerator};
    use ragkit_kernel::rag::{Chunk, Metadata};

    const QUESTION: &str = "which axis?";

    fn record(id: &str, embedding: Vec<f64>) -> ragkit_kernel::EmbeddedChunk {
        Chunk {
            id: id.to_string(),
            ordinal: 0,
            start: 0,
            end: id.len(),
            text: format!("{id} text"),
            source: "axes.txt".to_string(),
            metadata: Metadata::new(),
        }
        .embed(embedding)
    }

    fn axes_index() -> VectorIndex {
        let mut index = VectorIndex::new();
        index.add(record("x", vec![1.0, 0.0, 0.0])).unwrap();
        index.add(record("y", vec![0.0, 1.0, 0.0])).unwrap();
        index.add(record("xy", vec![0.7, 0.7, 0.0])).unwrap();
        index
    }

    fn setup(
        index: VectorIndex,
        generator: MockGenerator,
    ) -> (RagRetriever, Arc<MockEmbedder>, Arc<MockGenerator>) {
        let embedder = Arc::new(MockEmbedder::new(3).with_vector(QUESTION, vec![1.0, 0.0, 0.0]));
        let generator = Arc::new(generator);
        let retriever = RagRetriever::new(Arc::new(index), embedder.clone(), generator.clone());
        (retriever, embedder, generator)
    }

    #[tokio::test]
    async fn test_ask_grounds_prompt_on_ranked_hits() {
        let (retriever, _, generator) =
            setup(axes_index(), MockGenerator::new().with_response("  The x axis.\n"));
        let retriever = retriever.with_generation_model("llama3");

        let output = retriever.ask(QUESTION, 2).await.unwrap();

        assert_eq!(output.answer, "The x axis.");
        let ids: Vec<&str> = output.retrieved.iter().map(|h| h.record.id()).collect();
        assert_eq!(ids, vec!["x", "xy"]);
        assert!(output.prompt.contains("[1] (score=1.0000) x text"));
        assert!(output.prompt.contains("[2] (score=0.7071) xy text"));
        assert!(!output.prompt.contains("[3]"));
        assert!(output.prompt.contains("QUESTION: which axis?"));
        assert_eq!(generator.prompts(), vec![output.prompt.clone()]);
        assert_eq!(generator.models(), vec!["llama3".to_string()]);
    }

    #[tokio::test]
    async fn test_ask_with_model_overrides_default() {
        let (retriever, _, generator) = setup(axes_index(), MockGenerator::new());
        retriever
            .with_generation_model("default")
            .ask_with_model(QUESTION, 1, "mistral")
            .await
            .unwrap();
        assert_eq!(generator.models(), vec!["mistral".to_string()]);
    }

    #[tokio::test]
    async fn test_retrieve_without_generation() {
        let (retriever, _, generator) = setup(axes_index(), MockGenerator::new());
        let hits = retriever.retrieve(QUESTION, 5).await.unwrap();
        assert_eq!(hits.len(), 3);
        assert!(generator.prompts().is_empty());
    }

    #[tokio::test]
    async fn test_invalid_queries_are_rejected() {
        let (retriever, embedder, _) = setup(axes_index(), MockGenerator::new());

        assert!(matches!(
            retriever.ask("   ", 3).await,
            Err(RagError::Validation(_))
        ));
        assert!(matches!(
            retriever.ask(QUESTION, 0).await,
            Err(RagError::Validation(_))
        ));
        assert_eq!(embedder.call_count(), 0);
    }

    #[tokio::test]
    async fn test_empty_index_fails_before_network() {
        let (retriever, embedder, generator) = setup(VectorIndex::new(), MockGenerator::new());

        let err = retriever.ask(QUESTION, 3).await.unwrap_err();
        assert!(matches!(err, RagError::EmptyCorpus(_)));
        assert_eq!(embedder.call_count(), 0);
        assert!(generator.prompts().is_empty());
    }

    #[tokio::test]
    async fn test_embedding_failure_aborts_ask() {
        let embedder = Arc::new(MockEmbedder::new(3).with_failure(QUESTION));
        let generator = Arc::new(MockGenerator::new());
        let retriever =
            RagRetriever::new(Arc::new(axes_index()), embedder, generator.clone());

        let err = retriever.ask(QUESTION, 2).await.unwrap_err();
        assert!(matches!(err, RagError::Upstream { .. }));
        assert!(generator.prompts().is_empty());
    }

    #[tokio::test]
    async fn test_generation_failure_aborts_ask() {
        let (retriever, _, _) =
            setup(axes_index(), MockGenerator::new().with_failure("model not loaded"));
        match retriever.ask(QUESTION, 2).await.unwrap_err() {
            RagError::Upstream { message, .. } => assert_eq!(message, "model not loaded"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_cancelled_ask() {
        let token = CancellationToken::new();
        let (retriever, _, generator) = setup(axes_index(), MockGenerator::new());
        let retriever = retriever.with_cancellation(token.clone());
        token.cancel();

        assert!(matches!(
            retriever.ask(QUESTION, 2).await,
            Err(RagError::Cancelled(_))
        ));
        assert!(generator.prompts().is_empty());
    }

    #[test]
    fn test_open_missing_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let result = RagRetriever::open(
            dir.path().join("index.json"),
            Arc::new(MockEmbedder::new(3)),
            Arc::new(MockGenerator::new()),
        );
        assert!(matches!(result, Err(RagError::IndexUnavailable { .. })));
    }

    #[tokio::test]
    async fn test_open_saved_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("index.json");
        axes_index().save(&path).unwrap();

        let embedder = Arc::new(MockEmbedder::new(3).with_vector(QUESTION, vec![0.0, 1.0, 0.0]));
        let retriever =
            RagRetriever::open(&path, embedder, Arc::new(MockGenerator::new())).unwrap();
        assert_eq!(retriever.index().len(), 3);

        let hits = retriever.retrieve(QUESTION, 1).await.unwrap();
        assert_eq!(hits[0].record.id(), "y");
    }
}
