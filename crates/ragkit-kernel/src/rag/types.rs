//! RAG core data types

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Free-form string metadata attached to a chunk (source path, position, ...).
pub type Metadata = HashMap<String, String>;

/// A bounded, contiguous span of normalized source text.
///
/// This is the unit of retrieval. Its id is derived from the source reference
/// and the text, so re-chunking unchanged input yields the same ids.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    /// Deterministic identifier (hex digest of source reference and text)
    pub id: String,
    /// Position of this chunk among the chunks emitted for its source
    pub ordinal: usize,
    /// Start offset in the normalized source, in the chunker's size unit
    pub start: usize,
    /// End offset (exclusive) in the normalized source
    pub end: usize,
    /// Trimmed chunk text
    pub text: String,
    /// Path or content hash of the originating document
    pub source: String,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub metadata: Metadata,
}

impl Chunk {
    /// Add a metadata entry
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Attach an embedding vector to this chunk.
    pub fn embed(self, embedding: Vec<f64>) -> EmbeddedChunk {
        EmbeddedChunk {
            chunk: self,
            embedding,
        }
    }
}

/// A chunk together with its embedding vector.
///
/// Serializes flat, so a snapshot record carries the chunk fields and the
/// `embedding` array side by side.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbeddedChunk {
    #[serde(flatten)]
    pub chunk: Chunk,
    pub embedding: Vec<f64>,
}

impl EmbeddedChunk {
    pub fn id(&self) -> &str {
        &self.chunk.id
    }

    pub fn text(&self) -> &str {
        &self.chunk.text
    }

    /// Number of components in the embedding.
    pub fn dimension(&self) -> usize {
        self.embedding.len()
    }
}

/// A record returned from a similarity search, with its cosine score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    pub record: EmbeddedChunk,
    pub score: f64,
}

impl SearchHit {
    pub fn new(record: EmbeddedChunk, score: f64) -> Self {
        Self { record, score }
    }

    pub fn text(&self) -> &str {
        self.record.text()
    }
}
