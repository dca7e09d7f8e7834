//! In-memory vector index with whole-snapshot persistence
//!
//! Records are kept in insertion order and searched by brute force, which is
//! fast enough for a few thousand chunks. The index is written once at the
//! end of a build and loaded once per query session.

use crate::rag::similarity::cosine_similarity;
use chrono::{DateTime, Utc};
use ragkit_kernel::rag::{EmbeddedChunk, SearchHit, VectorSearch};
use ragkit_kernel::{RagError, RagResult};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::{BufWriter, ErrorKind, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Snapshot layout version written by [`VectorIndex::save`].
pub const SNAPSHOT_VERSION: u32 = 1;

#[derive(Serialize)]
struct SnapshotRef<'a> {
    version: u32,
    dimension: Option<usize>,
    embedding_model: Option<&'a str>,
    created_at: DateTime<Utc>,
    records: &'a [EmbeddedChunk],
}

#[derive(Deserialize)]
struct Snapshot {
    version: u32,
    dimension: Option<usize>,
    #[serde(default)]
    embedding_model: Option<String>,
    records: Vec<EmbeddedChunk>,
}

/// Append-only collection of embedded chunks with cosine search.
///
/// The first record fixes the embedding dimension; records of any other
/// dimension are rejected.
///
/// # Example
///
/// ```rust,ignore
/// use ragkit_foundation::rag::{VectorIndex, VectorSearch};
///
/// let mut index = VectorIndex::new();
/// index.add(chunk.embed(vec![0.1, 0.2, 0.3]))?;
/// index.save("models/docs/index.json")?;
///
/// let index = VectorIndex::load("models/docs/index.json")?;
/// let hits = index.search(&[0.1, 0.2, 0.3], 5)?;
/// ```
#[derive(Debug, Clone, Default)]
pub struct VectorIndex {
    records: Vec<EmbeddedChunk>,
    dimension: Option<usize>,
    embedding_model: Option<String>,
}

impl VectorIndex {
    /// Create a new empty index.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record which embedding model produced the vectors.
    pub fn with_embedding_model(mut self, model: impl Into<String>) -> Self {
        self.embedding_model = Some(model.into());
        self
    }

    pub fn embedding_model(&self) -> Option<&str> {
        self.embedding_model.as_deref()
    }

    /// Records in insertion order.
    pub fn records(&self) -> &[EmbeddedChunk] {
        &self.records
    }

    /// Append a record.
    ///
    /// Fails with `Validation` for an empty vector and with
    /// `DimensionMismatch` when the vector length differs from the dimension
    /// fixed by the first record. A rejected record is not stored.
    pub fn add(&mut self, record: EmbeddedChunk) -> RagResult<()> {
        let actual = record.dimension();
        if actual == 0 {
            return Err(RagError::Validation(format!(
                "chunk {} has an empty embedding",
                record.id()
            )));
        }
        match self.dimension {
            Some(expected) if expected != actual => {
                return Err(RagError::DimensionMismatch { expected, actual });
            }
            Some(_) => {}
            None => self.dimension = Some(actual),
        }
        self.records.push(record);
        Ok(())
    }

    /// Write the whole index to `path`, replacing any previous snapshot.
    ///
    /// The snapshot is written to a sibling temporary file first and renamed
    /// into place, so readers never observe a partially written file.
    pub fn save(&self, path: impl AsRef<Path>) -> RagResult<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        let snapshot = SnapshotRef {
            version: SNAPSHOT_VERSION,
            dimension: self.dimension,
            embedding_model: self.embedding_model.as_deref(),
            created_at: Utc::now(),
            records: &self.records,
        };

        let tmp = temp_path(path);
        let result = (|| -> RagResult<()> {
            let mut writer = BufWriter::new(fs::File::create(&tmp)?);
            serde_json::to_writer(&mut writer, &snapshot)?;
            writer.flush()?;
            fs::rename(&tmp, path)?;
            Ok(())
        })();
        if result.is_err() {
            let _ = fs::remove_file(&tmp);
        }
        result?;

        debug!(
            path = %path.display(),
            records = self.records.len(),
            dimension = ?self.dimension,
            "Saved index snapshot"
        );
        Ok(())
    }

    /// Load a snapshot written by [`save`](Self::save).
    ///
    /// A missing file is reported as `IndexUnavailable`; malformed content, an
    /// unknown version or records of inconsistent dimension as `Parse`.
    pub fn load(path: impl AsRef<Path>) -> RagResult<Self> {
        let path = path.as_ref();
        let bytes = match fs::read(path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(RagError::index_unavailable(path.display().to_string()));
            }
            Err(e) => return Err(e.into()),
        };

        let snapshot: Snapshot = serde_json::from_slice(&bytes)
            .map_err(|e| RagError::Parse(format!("{}: {e}", path.display())))?;
        if snapshot.version != SNAPSHOT_VERSION {
            return Err(RagError::Parse(format!(
                "{}: unsupported snapshot version {}",
                path.display(),
                snapshot.version
            )));
        }

        let mut index = Self {
            records: Vec::with_capacity(snapshot.records.len()),
            dimension: None,
            embedding_model: snapshot.embedding_model,
        };
        for record in snapshot.records {
            let id = record.id().to_string();
            index
                .add(record)
                .map_err(|e| RagError::Parse(format!("{}: record {id}: {e}", path.display())))?;
        }
        if let (Some(declared), Some(actual)) = (snapshot.dimension, index.dimension) {
            if declared != actual {
                return Err(RagError::Parse(format!(
                    "{}: declared dimension {declared} but records have {actual}",
                    path.display()
                )));
            }
        }

        debug!(path = %path.display(), records = index.records.len(), "Loaded index snapshot");
        Ok(index)
    }
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

impl VectorSearch for VectorIndex {
    fn search(&self, query: &[f64], top_k: usize) -> RagResult<Vec<SearchHit>> {
        if top_k == 0 {
            return Err(RagError::Validation(
                "top_k must be greater than 0".to_string(),
            ));
        }
        if let Some(dimension) = self.dimension {
            if dimension != query.len() {
                warn!(
                    expected = dimension,
                    actual = query.len(),
                    "Query dimension differs from index dimension"
                );
            }
        }

        let mut scored: Vec<(usize, f64)> = self
            .records
            .iter()
            .enumerate()
            .filter_map(|(i, record)| {
                cosine_similarity(query, &record.embedding).map(|score| (i, score))
            })
            .collect();

        // Stable sort: equal scores keep insertion order.
        scored.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        scored.truncate(top_k);

        Ok(scored
            .into_iter()
            .map(|(i, score)| SearchHit::new(self.records[i].clone(), score))
            .collect())
    }

    fn len(&self) -> usize {
        self.records.len()
    }

    fn dimension(&self) -> Option<usize> {
        self.dimension
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ragkit_kernel::rag::{Chunk, Metadata};

    fn record(id: &str, text: &str, embedding: Vec<f64>) -> EmbeddedChunk {
        Chunk {
            id: id.to_string(),
            ordinal: 0,
            start: 0,
            end: text.len(),
            text: text.to_string(),
            source: "test.txt".to_string(),
            metadata: Metadata::new(),
        }
        .embed(embedding)
    }

    fn scenario_index() -> VectorIndex {
        let mut index = VectorIndex::new();
        index.add(record("x", "x axis", vec![1.0, 0.0, 0.0])).unwrap();
        index.add(record("y", "y axis", vec![0.0, 1.0, 0.0])).unwrap();
        index.add(record("xy", "diagonal", vec![0.7, 0.7, 0.0])).unwrap();
        index
    }

    #[test]
    fn test_search_returns_most_similar() {
        let index = scenario_index();
        let hits = index.search(&[1.0, 0.0, 0.0], 2).unwrap();

        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].record.id(), "x");
        assert!((hits[0].score - 1.0).abs() < 1e-9);
        assert_eq!(hits[1].record.id(), "xy");
        assert!((hits[1].score - 0.7071).abs() < 1e-3);
    }

    #[test]
    fn test_search_len_is_min_of_k_and_corpus() {
        let index = scenario_index();
        assert_eq!(index.search(&[1.0, 1.0, 1.0], 10).unwrap().len(), 3);
        assert_eq!(index.search(&[1.0, 1.0, 1.0], 1).unwrap().len(), 1);
    }

    #[test]
    fn test_search_sorted_descending() {
        let index = scenario_index();
        let hits = index.search(&[0.2, 0.9, 0.1], 3).unwrap();
        for pair in hits.windows(2) {
            assert!(pair[0].score >= pair[1].score);
        }
        assert_eq!(hits[0].record.id(), "y");
    }

    #[test]
    fn test_ties_keep_insertion_order() {
        let mut index = VectorIndex::new();
        index.add(record("first", "a", vec![1.0, 0.0])).unwrap();
        index.add(record("other", "b", vec![0.0, 1.0])).unwrap();
        index.add(record("second", "c", vec![2.0, 0.0])).unwrap();
        index.add(record("third", "d", vec![0.5, 0.0])).unwrap();

        let hits = index.search(&[1.0, 0.0], 3).unwrap();
        let ids: Vec<&str> = hits.iter().map(|h| h.record.id()).collect();
        assert_eq!(ids, vec!["first", "second", "third"]);
    }

    #[test]
    fn test_search_empty_index() {
        let index = VectorIndex::new();
        assert!(index.is_empty());
        assert!(index.search(&[1.0, 0.0], 5).unwrap().is_empty());
    }

    #[test]
    fn test_search_rejects_zero_top_k() {
        let index = scenario_index();
        assert!(matches!(
            index.search(&[1.0, 0.0, 0.0], 0),
            Err(RagError::Validation(_))
        ));
    }

    #[test]
    fn test_search_skips_undefined_comparisons() {
        let index = scenario_index();
        assert!(index.search(&[0.0, 0.0, 0.0], 3).unwrap().is_empty());
        assert!(index.search(&[1.0, 0.0], 3).unwrap().is_empty());
    }

    #[test]
    fn test_zero_norm_record_is_skipped() {
        let mut index = VectorIndex::new();
        index.add(record("zero", "nothing", vec![0.0, 0.0])).unwrap();
        index.add(record("one", "something", vec![1.0, 0.0])).unwrap();

        let hits = index.search(&[1.0, 0.0], 5).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].record.id(), "one");
    }

    #[test]
    fn test_add_rejects_dimension_mismatch() {
        let mut index = scenario_index();
        let err = index
            .add(record("bad", "four dims", vec![1.0, 0.0, 0.0, 0.0]))
            .unwrap_err();
        match err {
            RagError::DimensionMismatch { expected, actual } => {
                assert_eq!(expected, 3);
                assert_eq!(actual, 4);
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(index.len(), 3);
        assert_eq!(index.dimension(), Some(3));
    }

    #[test]
    fn test_add_rejects_empty_vector() {
        let mut index = VectorIndex::new();
        assert!(matches!(
            index.add(record("empty", "e", vec![])),
            Err(RagError::Validation(_))
        ));
        assert_eq!(index.dimension(), None);
    }

    #[test]
    fn test_save_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("models").join("docs").join("index.json");

        let mut index = scenario_index().with_embedding_model("nomic-embed-text");
        index
            .add(
                record("meta", "with metadata", vec![0.1, 0.2, 0.3])
                    .chunk
                    .with_metadata("source_path", "/docs/a.txt")
                    .embed(vec![0.1, 0.2, 0.3]),
            )
            .unwrap();
        index.save(&path).unwrap();

        let loaded = VectorIndex::load(&path).unwrap();
        assert_eq!(loaded.len(), index.len());
        assert_eq!(loaded.dimension(), Some(3));
        assert_eq!(loaded.embedding_model(), Some("nomic-embed-text"));
        for (a, b) in loaded.records().iter().zip(index.records()) {
            assert_eq!(a.id(), b.id());
            assert_eq!(a.text(), b.text());
            assert_eq!(a.chunk.metadata, b.chunk.metadata);
            for (x, y) in a.embedding.iter().zip(&b.embedding) {
                assert!((x - y).abs() < 1e-12);
            }
        }
        assert!(!dir.path().join("models/docs/index.json.tmp").exists());
    }

    #[test]
    fn test_save_replaces_previous_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("index.json");

        scenario_index().save(&path).unwrap();
        let mut smaller = VectorIndex::new();
        smaller.add(record("only", "one", vec![1.0])).unwrap();
        smaller.save(&path).unwrap();

        let loaded = VectorIndex::load(&path).unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded.dimension(), Some(1));
    }

    #[test]
    fn test_load_missing_is_index_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let err = VectorIndex::load(dir.path().join("index.json")).unwrap_err();
        assert!(matches!(err, RagError::IndexUnavailable { .. }));
        assert!(err.is_not_found());
    }

    #[test]
    fn test_load_malformed_is_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("index.json");

        fs::write(&path, "{ not json").unwrap();
        assert!(matches!(VectorIndex::load(&path), Err(RagError::Parse(_))));

        fs::write(&path, r#"{"version": 99, "dimension": null, "records": []}"#).unwrap();
        assert!(matches!(VectorIndex::load(&path), Err(RagError::Parse(_))));
    }

    #[test]
    fn test_load_inconsistent_dimensions_is_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("index.json");
        let snapshot = serde_json::json!({
            "version": SNAPSHOT_VERSION,
            "dimension": 2,
            "records": [
                {"id": "a", "ordinal": 0, "start": 0, "end": 1, "text": "a",
                 "source": "s", "embedding": [1.0, 0.0]},
                {"id": "b", "ordinal": 1, "start": 1, "end": 2, "text": "b",
                 "source": "s", "embedding": [1.0, 0.0, 0.0]}
            ]
        });
        fs::write(&path, snapshot.to_string()).unwrap();

        assert!(matches!(VectorIndex::load(&path), Err(RagError::Parse(_))));
    }

    #[test]
    fn test_load_empty_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("index.json");
        VectorIndex::new().save(&path).unwrap();

        let loaded = VectorIndex::load(&path).unwrap();
        assert!(loaded.is_empty());
        assert_eq!(loaded.dimension(), None);
    }
}
