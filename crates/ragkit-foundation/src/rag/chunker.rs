//! Text chunking for splitting documents before embedding
//!
//! Text is whitespace-normalized, then walked in overlapping windows of a
//! fixed size. In character mode a window end that falls inside a word is
//! pulled back to the nearest preceding whitespace, within a bounded
//! lookback, so words are not severed.

use ragkit_kernel::rag::{Chunk, Metadata};
use ragkit_kernel::{RagError, RagResult};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashSet;

/// Unit in which chunk sizes, overlaps and offsets are measured.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SizeUnit {
    /// Unicode scalar values, with whitespace-boundary snapping
    #[default]
    Chars,
    /// Whitespace-separated words
    Words,
}

/// Configuration for text chunking.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkOptions {
    /// Window length
    pub target_size: usize,
    /// Units shared by consecutive windows; ignored when not below `target_size`
    pub overlap: usize,
    /// Shortest chunk that is emitted; a shorter chunk ends the source
    pub min_size: usize,
    /// Skip chunks whose id was already emitted for the same source
    pub dedupe: bool,
    pub unit: SizeUnit,
    /// How far back a window end may move to reach whitespace
    pub lookback: usize,
}

impl Default for ChunkOptions {
    fn default() -> Self {
        Self {
            target_size: 900,
            overlap: 180,
            min_size: 120,
            dedupe: true,
            unit: SizeUnit::Chars,
            lookback: 80,
        }
    }
}

impl ChunkOptions {
    /// Character windows of `target_size` with the given overlap.
    pub fn new(target_size: usize, overlap: usize) -> Self {
        Self {
            target_size,
            overlap,
            min_size: 1,
            ..Default::default()
        }
    }

    /// Word windows of `target_size` with the given overlap.
    pub fn words(target_size: usize, overlap: usize) -> Self {
        Self::new(target_size, overlap).with_unit(SizeUnit::Words)
    }

    pub fn with_min_size(mut self, min_size: usize) -> Self {
        self.min_size = min_size;
        self
    }

    pub fn with_dedupe(mut self, dedupe: bool) -> Self {
        self.dedupe = dedupe;
        self
    }

    pub fn with_unit(mut self, unit: SizeUnit) -> Self {
        self.unit = unit;
        self
    }

    pub fn with_lookback(mut self, lookback: usize) -> Self {
        self.lookback = lookback;
        self
    }

    pub(crate) fn validate(&self) -> RagResult<()> {
        if self.target_size == 0 {
            return Err(RagError::Validation(
                "chunk target_size must be greater than 0".to_string(),
            ));
        }
        if self.min_size > self.target_size {
            return Err(RagError::Validation(format!(
                "chunk min_size {} exceeds target_size {}",
                self.min_size, self.target_size
            )));
        }
        Ok(())
    }

    /// Overlap actually applied: none when it would stall the walk.
    fn effective_overlap(&self) -> usize {
        if self.overlap < self.target_size {
            self.overlap
        } else {
            0
        }
    }
}

/// Collapse every whitespace run to one space and trim both ends.
pub fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Deterministic chunk id: hex SHA-256 over the source reference and text.
pub fn chunk_id(source: &str, text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(source.as_bytes());
    hasher.update(b"\n");
    hasher.update(text.as_bytes());
    hex::encode(hasher.finalize())
}

/// Normalized text viewed as a sequence of size units.
enum Units<'a> {
    Chars(Vec<char>),
    Words(Vec<&'a str>),
}

impl<'a> Units<'a> {
    fn new(normalized: &'a str, unit: SizeUnit) -> Self {
        match unit {
            SizeUnit::Chars => Units::Chars(normalized.chars().collect()),
            SizeUnit::Words => Units::Words(normalized.split(' ').collect()),
        }
    }

    fn len(&self) -> usize {
        match self {
            Units::Chars(chars) => chars.len(),
            Units::Words(words) => words.len(),
        }
    }

    /// Cut point at or before `end` that does not split a word.
    ///
    /// The cut must leave at least `min_size` units of text in the window and
    /// lie within `lookback` of `end`; `None` means hard-cut at `end`.
    fn snap(&self, start: usize, end: usize, lookback: usize, min_size: usize) -> Option<usize> {
        let chars = match self {
            Units::Chars(chars) => chars,
            Units::Words(_) => return None,
        };
        if chars[end].is_whitespace() {
            return Some(end);
        }
        let floor = end.saturating_sub(lookback);
        (floor.max(start) + 1..=end)
            .rev()
            .find(|&i| chars[i - 1].is_whitespace() && i - 1 > start + min_size)
    }

    /// Shrink `[start, end)` so it neither starts nor ends on whitespace.
    fn trim(&self, mut start: usize, mut end: usize) -> (usize, usize) {
        if let Units::Chars(chars) = self {
            while start < end && chars[start].is_whitespace() {
                start += 1;
            }
            while end > start && chars[end - 1].is_whitespace() {
                end -= 1;
            }
        }
        (start, end)
    }

    fn text(&self, start: usize, end: usize) -> String {
        match self {
            Units::Chars(chars) => chars[start..end].iter().collect(),
            Units::Words(words) => words[start..end].join(" "),
        }
    }
}

/// Splits text into overlapping, bounded chunks.
#[derive(Debug, Clone, Default)]
pub struct TextChunker {
    options: ChunkOptions,
}

impl TextChunker {
    /// Create a new text chunker with the given configuration.
    pub fn new(options: ChunkOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &ChunkOptions {
        &self.options
    }

    /// Split `text` from `source` into ordered chunks.
    ///
    /// Every emitted chunk is between `min_size` and `target_size` units long.
    /// Walking stops at the first window that trims to less than `min_size`,
    /// so an undersized tail is dropped rather than emitted.
    pub fn split(&self, text: &str, source: &str) -> RagResult<Vec<Chunk>> {
        let opts = &self.options;
        opts.validate()?;

        let normalized = normalize_whitespace(text);
        if normalized.is_empty() {
            return Ok(Vec::new());
        }

        let units = Units::new(&normalized, opts.unit);
        let len = units.len();
        let overlap = opts.effective_overlap();
        let min_size = opts.min_size.max(1);

        let mut seen = HashSet::new();
        let mut chunks = Vec::new();
        let mut start = 0;

        while start < len {
            let mut end = (start + opts.target_size).min(len);
            if end < len {
                if let Some(cut) = units.snap(start, end, opts.lookback, opts.min_size) {
                    end = cut;
                }
            }

            let (text_start, text_end) = units.trim(start, end);
            if text_end - text_start < min_size {
                break;
            }

            let text = units.text(text_start, text_end);
            let id = chunk_id(source, &text);
            if !opts.dedupe || seen.insert(id.clone()) {
                chunks.push(Chunk {
                    id,
                    ordinal: chunks.len(),
                    start: text_start,
                    end: text_end,
                    text,
                    source: source.to_string(),
                    metadata: Metadata::new(),
                });
            }

            if end >= len {
                break;
            }
            let next = end.saturating_sub(overlap);
            start = if next > start { next } else { end };
        }

        Ok(chunks)
    }
}
