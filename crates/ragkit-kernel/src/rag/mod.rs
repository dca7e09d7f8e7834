//! RAG (Retrieval-Augmented Generation) traits and types
//!
//! Defines the chunk and index data model together with the abstractions the
//! pipeline is assembled from: embedding and generation gateways, and the
//! similarity search seam. Concrete implementations live in ragkit-foundation.

pub mod gateway;
pub mod search;
pub mod types;

pub use gateway::{EmbeddingGateway, GenerationGateway};
pub use search::VectorSearch;
pub use types::{Chunk, EmbeddedChunk, Metadata, SearchHit};
