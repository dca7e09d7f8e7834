//! ragkit kernel
//!
//! Contracts shared by every ragkit component: the error taxonomy, the chunk
//! and index data model, the gateway traits for embedding and generation
//! backends, the search abstraction, and the collaborator traits for source
//! extraction and workspace bookkeeping. Concrete implementations live in
//! `ragkit-foundation`.

// error module
pub mod error;
pub use error::{RagError, RagResult};

// config module
#[cfg(feature = "config")]
pub mod config;

// rag contracts
pub mod rag;
pub use rag::{
    Chunk, EmbeddedChunk, EmbeddingGateway, GenerationGateway, Metadata, SearchHit, VectorSearch,
};

// workspace collaborators
pub mod workspace;
