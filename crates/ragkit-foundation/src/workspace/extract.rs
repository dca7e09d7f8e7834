//! Plain-text source extraction

use ragkit_kernel::workspace::{ExtractedSource, SourceExtractor, SourceKind};
use ragkit_kernel::{RagError, RagResult};
use sha2::{Digest, Sha256};
use std::fs;
use std::path::Path;

/// Reads `.txt`, `.text`, `.md` and `.markdown` files.
///
/// PDFs are recognized but not extracted: an encrypted PDF is rejected with
/// the reason `encrypted`, any other PDF as unsupported.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlainTextExtractor;

impl SourceExtractor for PlainTextExtractor {
    fn extract(&self, path: &Path) -> RagResult<ExtractedSource> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase)
            .unwrap_or_default();

        let kind = match ext.as_str() {
            "txt" | "text" => SourceKind::Text,
            "md" | "markdown" => SourceKind::Markdown,
            "pdf" => return Err(reject_pdf(path)?),
            _ => {
                return Err(RagError::unsupported(
                    path.display().to_string(),
                    "unrecognized file type",
                ));
            }
        };

        let bytes = fs::read(path)?;
        let text = normalize_text(&String::from_utf8_lossy(&bytes));
        let content_hash = hex::encode(Sha256::digest(text.as_bytes()));
        Ok(ExtractedSource {
            kind,
            text,
            content_hash,
        })
    }
}

/// Strip NUL bytes and normalize CRLF and CR line endings to LF.
pub fn normalize_text(text: &str) -> String {
    text.replace('\0', "")
        .replace("\r\n", "\n")
        .replace('\r', "\n")
}

fn reject_pdf(path: &Path) -> RagResult<RagError> {
    let bytes = fs::read(path)?;
    let reason = if bytes.windows(b"/Encrypt".len()).any(|w| w == b"/Encrypt") {
        "encrypted"
    } else {
        "PDF text extraction is not supported"
    };
    Ok(RagError::unsupported(path.display().to_string(), reason))
}
