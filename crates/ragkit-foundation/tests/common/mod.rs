//! Common test utilities shared across the `ragkit-foundation` integration tests.
//!
//! This module is not a standalone test binary. It is declared with
//! `mod common;` inside each integration test file that needs it.

#![allow(dead_code)]

use ragkit_foundation::{ChunkOptions, FsWorkspace, MockEmbedder, PlainTextExtractor};
use ragkit_kernel::workspace::{SourcesManifest, WorkspaceStore};
use std::fs;
use std::path::Path;
use tempfile::TempDir;

pub const MODEL: &str = "handbook";

pub const RUST_DOC: &str = "Rust is a systems programming language focused on safety, speed and \
concurrency. The borrow checker enforces ownership rules at compile time.";

pub const OLLAMA_DOC: &str = "Ollama serves local language models over an HTTP API. It exposes \
endpoints for embeddings and text generation.";

pub const QUESTION: &str = "What does the borrow checker do?";

/// Small windows so each corpus document becomes exactly one chunk.
pub fn chunk_options() -> ChunkOptions {
    ChunkOptions::new(400, 40).with_min_size(10)
}

/// Embedder that places the Rust document next to [`QUESTION`].
pub fn corpus_embedder() -> MockEmbedder {
    MockEmbedder::new(3)
        .with_model("nomic-embed-text")
        .with_vector(RUST_DOC, vec![1.0, 0.0, 0.0])
        .with_vector(OLLAMA_DOC, vec![0.0, 1.0, 0.0])
        .with_vector(QUESTION, vec![0.9, 0.1, 0.0])
}

/// Write the corpus, with line endings the extractor has to normalize.
pub fn write_corpus(root: &Path) {
    fs::create_dir_all(root.join("guides")).unwrap();
    fs::write(root.join("rust.md"), RUST_DOC.replace(". ", ".\r\n")).unwrap();
    fs::write(root.join("guides").join("ollama.txt"), OLLAMA_DOC).unwrap();
    fs::write(root.join("diagram.png"), b"\x89PNG\r\n").unwrap();
}

/// A workspace with [`MODEL`] created and the corpus ingested.
pub fn ingested_workspace() -> (TempDir, FsWorkspace, SourcesManifest) {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("input");
    write_corpus(&input);

    let workspace = FsWorkspace::new(dir.path().join("data"));
    workspace.create_model(MODEL).unwrap();
    let manifest = workspace
        .ingest(MODEL, &input, &PlainTextExtractor)
        .unwrap();
    (dir, workspace, manifest)
}
