//! ragkit foundation
//!
//! Concrete implementations of the kernel contracts for a single-node
//! retrieval-augmented generation pipeline.

// rag module - chunking, vector index, builder and retriever
pub mod rag;

// llm module - Ollama, mock and retrying gateways
pub mod llm;

// workspace module - filesystem store and text extraction
pub mod workspace;

// config module
pub mod config;

// pipeline module - workspace build and query flows
pub mod pipeline;

pub use config::{BuildConfig, RagConfig, RetrievalConfig};
pub use llm::{
    MockEmbedder, MockGenerator, OllamaClient, OllamaConfig, RetryPolicy, RetryingEmbedder,
    RetryingGenerator,
};
pub use rag::{
    AskOutput, BuildOutput, BuildReport, ChunkOptions, IndexBuilder, PromptTemplate,
    RagRetriever, SizeUnit, SourceDocument, TextChunker, VectorIndex,
};
pub use pipeline::RagPipeline;
pub use workspace::{FsWorkspace, PlainTextExtractor};

pub use ragkit_kernel::{RagError, RagResult};
