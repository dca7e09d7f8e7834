//! RAG (Retrieval-Augmented Generation) implementations
//!
//! Concrete building blocks on top of the kernel contracts:
//! - [`TextChunker`]: whitespace-aware overlapping chunking
//! - [`VectorIndex`]: brute-force cosine index with JSON snapshots
//! - [`IndexBuilder`]: chunk, embed and collect sources into an index
//! - [`RagRetriever`]: retrieve context and generate grounded answers

pub mod builder;
pub mod cancel;
pub mod chunker;
pub mod prompt;
pub mod retriever;
pub mod similarity;
pub mod vector_index;

pub use builder::{BuildOutput, BuildReport, IndexBuilder, SourceDocument};
pub use cancel::run_cancellable;
pub use chunker::{ChunkOptions, SizeUnit, TextChunker};
pub use prompt::PromptTemplate;
pub use retriever::{AskOutput, RagRetriever};
pub use similarity::cosine_similarity;
pub use vector_index::VectorIndex;

// Re-export kernel types for convenience
pub use ragkit_kernel::rag::{
    Chunk, EmbeddedChunk, EmbeddingGateway, GenerationGateway, Metadata, SearchHit, VectorSearch,
};
