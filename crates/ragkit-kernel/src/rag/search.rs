//! Similarity search abstraction
//!
//! The shipped index is a brute-force linear scan. Callers hold it as a
//! `dyn VectorSearch` so an approximate index can replace it without
//! touching the retriever.

use crate::error::RagResult;
use crate::rag::types::SearchHit;

/// Read-only similarity search over a set of embedded chunks.
///
/// Implementations must:
/// - score with cosine similarity, higher is more similar;
/// - skip records that cannot be compared with the query (dimension
///   disagreement, zero norm) instead of failing the whole search;
/// - order hits by score descending, ties in insertion order;
/// - return at most `top_k` hits and reject `top_k == 0` as invalid input;
/// - return an empty list, not an error, when they hold no records.
pub trait VectorSearch: Send + Sync {
    /// Return the `top_k` records most similar to `query`.
    fn search(&self, query: &[f64], top_k: usize) -> RagResult<Vec<SearchHit>>;

    /// Number of records held.
    fn len(&self) -> usize;

    /// Whether no records are held.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Embedding dimension fixed by the first record, if any.
    fn dimension(&self) -> Option<usize>;
}
