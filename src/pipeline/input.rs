//! Input resolution: read a Markdown file and derive its defaults.
//!
//! Read errors are mapped to [`Md2PdfError`] variants with actionable
//! messages. Invalid UTF-8 is reported with the byte offset of the first bad
//! sequence rather than silently replaced, since a lossy conversion would put
//! replacement glyphs into the PDF without any warning.

use crate::config::DEFAULT_TITLE;
use crate::error::Md2PdfError;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Read a Markdown file as UTF-8 text.
pub fn read_markdown(path: &Path) -> Result<String, Md2PdfError> {
    let bytes = std::fs::read(path).map_err(|e| match e.kind() {
        std::io::ErrorKind::PermissionDenied => Md2PdfError::PermissionDenied {
            path: path.to_path_buf(),
        },
        _ => Md2PdfError::InputNotFound {
            path: path.to_path_buf(),
        },
    })?;

    if path.is_dir() {
        return Err(Md2PdfError::InputNotFound {
            path: path.to_path_buf(),
        });
    }

    let text = String::from_utf8(bytes).map_err(|e| Md2PdfError::InputNotUtf8 {
        path: path.to_path_buf(),
        offset: e.utf8_error().valid_up_to(),
    })?;

    debug!("Read {} bytes of Markdown from {}", text.len(), path.display());
    Ok(text)
}

/// Document title derived from the file name: `docs/guide.md` → `guide`.
pub fn default_title(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| DEFAULT_TITLE.to_string())
}

/// Output path next to the input: `docs/guide.md` → `docs/guide.pdf`.
pub fn default_output(path: &Path) -> PathBuf {
    path.with_extension("pdf")
}
