//! Collaborator contracts for source extraction and workspace bookkeeping
//!
//! The RAG core does not own workspaces or document parsing. It consumes the
//! extracted text and content hash of each source, iterates the ingest
//! manifest during a build, and reports chunk statistics back through
//! [`WorkspaceStore::record_build`].

use crate::error::RagResult;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Kind of document a source was extracted from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    Text,
    Markdown,
}

/// Text pulled out of a raw document.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractedSource {
    pub kind: SourceKind,
    /// Extracted text with line endings normalized
    pub text: String,
    /// Hex SHA-256 of `text`
    pub content_hash: String,
}

/// Extracts plain text from a raw document.
///
/// Fails with [`RagError::UnsupportedInput`](crate::RagError::UnsupportedInput)
/// for unrecognized or encrypted documents.
pub trait SourceExtractor: Send + Sync {
    fn extract(&self, path: &Path) -> RagResult<ExtractedSource>;
}

/// One ingested source, as listed in the ingest manifest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManifestEntry {
    /// Original document path
    pub path: String,
    pub kind: SourceKind,
    /// Content hash of the extracted text
    pub sha256: String,
    /// Where the extracted text was stored
    pub text_path: PathBuf,
}

/// Ordered list of sources a build iterates over.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SourcesManifest {
    pub model: String,
    #[serde(default)]
    pub sources: Vec<ManifestEntry>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelStats {
    pub chunks: usize,
    pub embeddings: usize,
}

/// Metadata of a named workspace ("model").
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelMeta {
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub stats: ModelStats,
}

/// Workspace bookkeeping the build and query flows depend on.
pub trait WorkspaceStore: Send + Sync {
    /// Create a workspace; fails if the name is invalid or already taken.
    fn create_model(&self, name: &str) -> RagResult<ModelMeta>;

    /// Fetch a workspace; fails with `NotFound` for unknown names.
    fn get_model(&self, name: &str) -> RagResult<ModelMeta>;

    /// All workspaces, most recently updated first.
    fn list_models(&self) -> RagResult<Vec<ModelMeta>>;

    /// The ingest manifest of a workspace.
    fn manifest(&self, name: &str) -> RagResult<SourcesManifest>;

    /// Record the statistics of a finished build.
    fn record_build(&self, name: &str, stats: ModelStats) -> RagResult<ModelMeta>;

    /// Location of the workspace's index snapshot.
    fn index_path(&self, name: &str) -> PathBuf;
}
