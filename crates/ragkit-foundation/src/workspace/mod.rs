//! Filesystem workspace store
//!
//! Each named workspace ("model") lives in its own directory:
//!
//! ```text
//! <data_dir>/models/<name>/
//!     model.json          metadata and build statistics
//!     sources.json        ingest manifest
//!     sources/<hash>.txt  extracted text, one file per distinct source
//!     index.json          vector index snapshot
//! ```

pub mod extract;

pub use extract::{PlainTextExtractor, normalize_text};

use chrono::Utc;
use ragkit_kernel::workspace::{
    ManifestEntry, ModelMeta, ModelStats, SourceExtractor, SourcesManifest, WorkspaceStore,
};
use ragkit_kernel::{RagError, RagResult};
use regex::Regex;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::collections::HashSet;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

static MODEL_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z0-9][A-Za-z0-9_-]{0,63}$").expect("model name regex is valid")
});

fn validate_name(name: &str) -> RagResult<()> {
    if MODEL_NAME.is_match(name) {
        Ok(())
    } else {
        Err(RagError::Validation(format!(
            "invalid model name {name:?} (use letters, digits, '_' or '-', up to 64 characters)"
        )))
    }
}

/// [`WorkspaceStore`] backed by a directory tree.
#[derive(Debug, Clone)]
pub struct FsWorkspace {
    data_dir: PathBuf,
}

impl FsWorkspace {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
        }
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    fn models_dir(&self) -> PathBuf {
        self.data_dir.join("models")
    }

    fn model_dir(&self, name: &str) -> PathBuf {
        self.models_dir().join(name)
    }

    fn meta_path(&self, name: &str) -> PathBuf {
        self.model_dir(name).join("model.json")
    }

    fn manifest_path(&self, name: &str) -> PathBuf {
        self.model_dir(name).join("sources.json")
    }

    fn sources_dir(&self, name: &str) -> PathBuf {
        self.model_dir(name).join("sources")
    }

    fn write_meta(&self, meta: &ModelMeta) -> RagResult<()> {
        write_json(&self.meta_path(&meta.name), meta)
    }

    /// Extract every file under `path` into the workspace and rewrite its
    /// manifest.
    ///
    /// `path` may be a single file or a directory, walked recursively in
    /// file-name order. Sources the extractor rejects or cannot read are
    /// skipped with a warning; a source whose text was already ingested
    /// under another path is listed once.
    pub fn ingest(
        &self,
        name: &str,
        path: impl AsRef<Path>,
        extractor: &dyn SourceExtractor,
    ) -> RagResult<SourcesManifest> {
        let mut meta = self.get_model(name)?;
        let root = path.as_ref();
        let files = walk_files(root)?;

        let sources_dir = self.sources_dir(name);
        fs::create_dir_all(&sources_dir)?;

        let mut seen = HashSet::new();
        let mut manifest = SourcesManifest {
            model: name.to_string(),
            sources: Vec::new(),
        };
        for file in files {
            let extracted = match extractor.extract(&file) {
                Ok(extracted) => extracted,
                Err(e) => {
                    warn!(path = %file.display(), error = %e, "Skipping source");
                    continue;
                }
            };
            if !seen.insert(extracted.content_hash.clone()) {
                debug!(path = %file.display(), "Skipping duplicate source");
                continue;
            }

            let text_path = sources_dir.join(format!("{}.txt", extracted.content_hash));
            fs::write(&text_path, &extracted.text)?;
            manifest.sources.push(ManifestEntry {
                path: file.display().to_string(),
                kind: extracted.kind,
                sha256: extracted.content_hash,
                text_path,
            });
        }

        write_json(&self.manifest_path(name), &manifest)?;
        meta.updated_at = Utc::now();
        self.write_meta(&meta)?;

        info!(model = name, sources = manifest.sources.len(), "Ingested sources");
        Ok(manifest)
    }
}

impl WorkspaceStore for FsWorkspace {
    fn create_model(&self, name: &str) -> RagResult<ModelMeta> {
        validate_name(name)?;
        let meta_path = self.meta_path(name);
        if meta_path.exists() {
            return Err(RagError::Validation(format!(
                "model {name:?} already exists"
            )));
        }

        fs::create_dir_all(self.model_dir(name))?;
        let now = Utc::now();
        let meta = ModelMeta {
            name: name.to_string(),
            created_at: now,
            updated_at: now,
            stats: ModelStats::default(),
        };
        self.write_meta(&meta)?;
        info!(model = name, "Created model");
        Ok(meta)
    }

    fn get_model(&self, name: &str) -> RagResult<ModelMeta> {
        validate_name(name)?;
        read_json(&self.meta_path(name))?
            .ok_or_else(|| RagError::NotFound(format!("model {name:?}")))
    }

    fn list_models(&self) -> RagResult<Vec<ModelMeta>> {
        let entries = match fs::read_dir(self.models_dir()) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut models = Vec::new();
        for entry in entries {
            let entry = entry?;
            if !entry.file_type()?.is_dir() {
                continue;
            }
            let meta_path = entry.path().join("model.json");
            match read_json::<ModelMeta>(&meta_path) {
                Ok(Some(meta)) => models.push(meta),
                Ok(None) => {}
                Err(e) => debug!(path = %meta_path.display(), error = %e, "Ignoring model directory"),
            }
        }
        models.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(models)
    }

    fn manifest(&self, name: &str) -> RagResult<SourcesManifest> {
        self.get_model(name)?;
        Ok(read_json(&self.manifest_path(name))?.unwrap_or_else(|| SourcesManifest {
            model: name.to_string(),
            sources: Vec::new(),
        }))
    }

    fn record_build(&self, name: &str, stats: ModelStats) -> RagResult<ModelMeta> {
        let mut meta = self.get_model(name)?;
        meta.stats = stats;
        meta.updated_at = Utc::now();
        self.write_meta(&meta)?;
        Ok(meta)
    }

    fn index_path(&self, name: &str) -> PathBuf {
        self.model_dir(name).join("index.json")
    }
}

fn walk_files(root: &Path) -> RagResult<Vec<PathBuf>> {
    let info = fs::metadata(root)?;
    if !info.is_dir() {
        return Ok(vec![root.to_path_buf()]);
    }

    let mut files = Vec::new();
    for entry in WalkDir::new(root).sort_by_file_name() {
        match entry {
            Ok(entry) if entry.file_type().is_file() => files.push(entry.into_path()),
            Ok(_) => {}
            Err(e) => warn!(error = %e, "Skipping unreadable path"),
        }
    }
    Ok(files)
}

/// `Ok(None)` when the file does not exist.
fn read_json<T: DeserializeOwned>(path: &Path) -> RagResult<Option<T>> {
    let bytes = match fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    serde_json::from_slice(&bytes)
        .map(Some)
        .map_err(|e| RagError::Parse(format!("{}: {e}", path.display())))
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> RagResult<()> {
    let bytes = serde_json::to_vec_pretty(value)?;
    fs::write(path, bytes)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ragkit_kernel::workspace::SourceKind;
    use std::time::Duration;

    fn workspace() -> (tempfile::TempDir, FsWorkspace) {
        let dir = tempfile::tempdir().unwrap();
        let ws = FsWorkspace::new(dir.path().join("data"));
        (dir, ws)
    }

    #[test]
    fn test_create_and_get_model() {
        let (_dir, ws) = workspace();
        let created = ws.create_model("docs_v1").unwrap();
        assert_eq!(created.stats, ModelStats::default());

        let fetched = ws.get_model("docs_v1").unwrap();
        assert_eq!(fetched, created);
        assert!(ws.data_dir().join("models/docs_v1/model.json").exists());
    }

    #[test]
    fn test_model_json_layout() {
        let (_dir, ws) = workspace();
        ws.create_model("docs").unwrap();

        let raw = fs::read_to_string(ws.data_dir().join("models/docs/model.json")).unwrap();
        let json: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(json["name"], "docs");
        assert!(json.get("createdAt").is_some());
        assert_eq!(json["stats"]["chunks"], 0);
    }

    #[test]
    fn test_invalid_names() {
        let (_dir, ws) = workspace();
        let too_long = "x".repeat(65);
        for name in ["", "-lead", "has space", "../escape", too_long.as_str()] {
            assert!(
                matches!(ws.create_model(name), Err(RagError::Validation(_))),
                "{name:?} should be rejected"
            );
        }
        assert!(ws.create_model(&"x".repeat(64)).is_ok());
    }

    #[test]
    fn test_duplicate_and_unknown_models() {
        let (_dir, ws) = workspace();
        ws.create_model("docs").unwrap();
        assert!(matches!(ws.create_model("docs"), Err(RagError::Validation(_))));

        let err = ws.get_model("nope").unwrap_err();
        assert!(matches!(err, RagError::NotFound(_)));
        assert!(ws.manifest("nope").unwrap_err().is_not_found());
    }

    #[test]
    fn test_list_models_most_recent_first() {
        let (_dir, ws) = workspace();
        assert!(ws.list_models().unwrap().is_empty());

        ws.create_model("alpha").unwrap();
        std::thread::sleep(Duration::from_millis(5));
        ws.create_model("beta").unwrap();
        std::thread::sleep(Duration::from_millis(5));
        ws.record_build("alpha", ModelStats { chunks: 4, embeddings: 4 })
            .unwrap();

        let names: Vec<String> = ws.list_models().unwrap().into_iter().map(|m| m.name).collect();
        assert_eq!(names, vec!["alpha", "beta"]);
    }

    #[test]
    fn test_record_build_updates_stats() {
        let (_dir, ws) = workspace();
        let created = ws.create_model("docs").unwrap();
        std::thread::sleep(Duration::from_millis(5));

        let updated = ws
            .record_build("docs", ModelStats { chunks: 12, embeddings: 11 })
            .unwrap();
        assert_eq!(updated.stats.chunks, 12);
        assert_eq!(updated.stats.embeddings, 11);
        assert!(updated.updated_at > created.updated_at);
        assert_eq!(ws.get_model("docs").unwrap(), updated);
    }

    #[test]
    fn test_ingest_directory() {
        let (dir, ws) = workspace();
        ws.create_model("docs").unwrap();

        let input = dir.path().join("input");
        fs::create_dir_all(input.join("nested")).unwrap();
        fs::write(input.join("a.txt"), "alpha text\r\n").unwrap();
        fs::write(input.join("nested").join("b.md"), "# beta").unwrap();
        fs::write(input.join("copy.txt"), "alpha text\n").unwrap();
        fs::write(input.join("image.png"), b"\x89PNG").unwrap();
        fs::write(input.join("locked.pdf"), b"%PDF /Encrypt").unwrap();

        let manifest = ws.ingest("docs", &input, &PlainTextExtractor).unwrap();

        let paths: Vec<&str> = manifest.sources.iter().map(|s| s.path.as_str()).collect();
        assert_eq!(paths.len(), 2);
        assert!(paths[0].ends_with("a.txt"));
        assert!(paths[1].ends_with("b.md"));
        assert_eq!(manifest.sources[1].kind, SourceKind::Markdown);

        let first = &manifest.sources[0];
        assert_eq!(fs::read_to_string(&first.text_path).unwrap(), "alpha text\n");
        assert_eq!(
            first.text_path,
            ws.data_dir()
                .join("models/docs/sources")
                .join(format!("{}.txt", first.sha256))
        );
        assert_eq!(ws.manifest("docs").unwrap(), manifest);
    }

    #[test]
    fn test_ingest_single_file() {
        let (dir, ws) = workspace();
        ws.create_model("docs").unwrap();
        let file = dir.path().join("one.txt");
        fs::write(&file, "just one").unwrap();

        let manifest = ws.ingest("docs", &file, &PlainTextExtractor).unwrap();
        assert_eq!(manifest.sources.len(), 1);
        assert_eq!(manifest.model, "docs");
    }

    #[test]
    fn test_ingest_requires_existing_model_and_path() {
        let (dir, ws) = workspace();
        assert!(matches!(
            ws.ingest("docs", dir.path(), &PlainTextExtractor),
            Err(RagError::NotFound(_))
        ));

        ws.create_model("docs").unwrap();
        assert!(matches!(
            ws.ingest("docs", dir.path().join("missing"), &PlainTextExtractor),
            Err(RagError::Io(_))
        ));
    }

    #[test]
    fn test_manifest_before_ingest_is_empty() {
        let (_dir, ws) = workspace();
        ws.create_model("docs").unwrap();
        assert!(ws.manifest("docs").unwrap().sources.is_empty());
    }

    #[test]
    fn test_index_path() {
        let (_dir, ws) = workspace();
        assert_eq!(
            ws.index_path("docs"),
            ws.data_dir().join("models").join("docs").join("index.json")
        );
    }
}
