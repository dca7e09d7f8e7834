//! Index construction: chunk every source, embed every chunk, collect records
//!
//! Embedding requests run with bounded parallelism but complete into the
//! index in submission order, so the record order is always the chunk order.
//! The index is only returned (or saved) once every chunk has been embedded;
//! a failed or cancelled build never leaves a partial snapshot behind.

use crate::rag::cancel::run_cancellable;
use crate::rag::chunker::{ChunkOptions, TextChunker};
use crate::rag::vector_index::VectorIndex;
use futures::{StreamExt, stream};
use ragkit_kernel::rag::{Chunk, EmbeddingGateway, VectorSearch};
use ragkit_kernel::workspace::ManifestEntry;
use ragkit_kernel::{RagError, RagResult};
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, info, warn};

pub const DEFAULT_WORKERS: usize = 4;

/// Extracted text of one source, ready to be chunked.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceDocument {
    /// Reference stored on every chunk and hashed into its id
    pub source_ref: String,
    /// Original document path, recorded as `source_path` metadata
    pub path: String,
    pub text: String,
}

impl SourceDocument {
    pub fn new(
        source_ref: impl Into<String>,
        path: impl Into<String>,
        text: impl Into<String>,
    ) -> Self {
        Self {
            source_ref: source_ref.into(),
            path: path.into(),
            text: text.into(),
        }
    }
}

/// Counters describing a finished build.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BuildReport {
    /// Sources that were chunked
    pub sources: usize,
    /// Manifest entries whose text could not be read
    pub skipped_sources: usize,
    pub chunks: usize,
    /// Records stored in the index
    pub embedded: usize,
    /// Chunks dropped because their vector did not fit the index
    pub skipped_records: usize,
    pub dimension: Option<usize>,
}

#[derive(Debug)]
pub struct BuildOutput {
    pub index: VectorIndex,
    pub report: BuildReport,
}

/// Builds a [`VectorIndex`] from extracted sources.
pub struct IndexBuilder {
    embedder: Arc<dyn EmbeddingGateway>,
    chunker: TextChunker,
    workers: usize,
    cancel: CancellationToken,
}

impl IndexBuilder {
    pub fn new(embedder: Arc<dyn EmbeddingGateway>, options: ChunkOptions) -> Self {
        Self {
            embedder,
            chunker: TextChunker::new(options),
            workers: DEFAULT_WORKERS,
            cancel: CancellationToken::new(),
        }
    }

    /// Maximum number of embedding requests in flight (at least 1).
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Chunk and embed `sources` into a fresh in-memory index.
    pub async fn build(&self, sources: &[SourceDocument]) -> RagResult<BuildOutput> {
        let span = tracing::info_span!("rag.build", sources = sources.len(), workers = self.workers);
        self.build_inner(sources, BuildReport::default())
            .instrument(span)
            .await
    }

    /// Build from an ingest manifest, reading each entry's extracted text.
    ///
    /// Entries whose text file cannot be read are skipped and counted.
    pub async fn build_from_manifest(&self, entries: &[ManifestEntry]) -> RagResult<BuildOutput> {
        let mut report = BuildReport::default();
        let mut sources = Vec::with_capacity(entries.len());
        for entry in entries {
            match tokio::fs::read_to_string(&entry.text_path).await {
                Ok(text) => sources.push(SourceDocument::new(&entry.sha256, &entry.path, text)),
                Err(e) => {
                    warn!(
                        source = %entry.path,
                        text_path = %entry.text_path.display(),
                        error = %e,
                        "Skipping unreadable source"
                    );
                    report.skipped_sources += 1;
                }
            }
        }

        let span = tracing::info_span!("rag.build", sources = sources.len(), workers = self.workers);
        self.build_inner(&sources, report).instrument(span).await
    }

    /// Build and write the snapshot to `path` once every chunk is embedded.
    pub async fn build_and_save(
        &self,
        sources: &[SourceDocument],
        path: impl AsRef<Path>,
    ) -> RagResult<BuildReport> {
        let output = self.build(sources).await?;
        output.index.save(path)?;
        Ok(output.report)
    }

    async fn build_inner(
        &self,
        sources: &[SourceDocument],
        mut report: BuildReport,
    ) -> RagResult<BuildOutput> {
        if self.cancel.is_cancelled() {
            return Err(RagError::Cancelled("build index".to_string()));
        }

        let mut chunks = Vec::new();
        for source in sources {
            let pieces = self.chunker.split(&source.text, &source.source_ref)?;
            debug!(source = %source.path, chunks = pieces.len(), "Chunked source");
            chunks.extend(pieces.into_iter().map(|chunk| {
                let ordinal = chunk.ordinal.to_string();
                chunk
                    .with_metadata("source_path", source.path.clone())
                    .with_metadata("ordinal", ordinal)
            }));
            report.sources += 1;
        }
        report.chunks = chunks.len();
        if chunks.is_empty() {
            return Err(RagError::EmptyCorpus(
                "no chunks were produced from the sources".to_string(),
            ));
        }

        let index = run_cancellable(
            &self.cancel,
            "build index",
            self.embed_chunks(chunks, &mut report),
        )
        .await?;
        if index.is_empty() {
            return Err(RagError::EmptyCorpus(
                "no chunk produced a usable embedding".to_string(),
            ));
        }

        report.embedded = index.len();
        report.dimension = index.dimension();
        info!(
            sources = report.sources,
            chunks = report.chunks,
            embedded = report.embedded,
            skipped = report.skipped_records,
            "Index built"
        );
        Ok(BuildOutput { index, report })
    }

    async fn embed_chunks(
        &self,
        chunks: Vec<Chunk>,
        report: &mut BuildReport,
    ) -> RagResult<VectorIndex> {
        let mut index = VectorIndex::new().with_embedding_model(self.embedder.model());
        let mut embedded = stream::iter(chunks.into_iter().map(|chunk| {
            let embedder = self.embedder.clone();
            async move {
                let result = embedder.embed(&chunk.text).await;
                (chunk, result)
            }
        }))
        .buffered(self.workers);

        while let Some((chunk, result)) = embedded.next().await {
            let source_path = chunk
                .metadata
                .get("source_path")
                .map_or(chunk.source.as_str(), String::as_str);
            let context = format!("chunk {} of {}", chunk.ordinal, source_path);
            let vector = result.map_err(|e| {
                warn!(chunk = chunk.ordinal, source = %source_path, error = %e, "Embedding failed");
                e.with_operation_context(&context)
            })?;

            match index.add(chunk.embed(vector)) {
                Ok(()) => {}
                Err(e @ (RagError::DimensionMismatch { .. } | RagError::Validation(_))) => {
                    warn!(%context, error = %e, "Skipping record");
                    report.skipped_records += 1;
                }
                Err(e) => return Err(e),
            }
        }
        Ok(index)
    }
}
