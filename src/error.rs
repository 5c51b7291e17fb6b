//! Error types for the md2pdf-mermaid library.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`Md2PdfError`]: **Fatal**: the conversion cannot produce a PDF at all
//!   (input missing, output path not writable, invalid configuration). Returned
//!   as `Err(Md2PdfError)` from the top-level `convert*` functions.
//!
//! * [`DiagramError`]: **Non-fatal**: a single Mermaid diagram could not be
//!   rendered (browser missing, timeout, bad diagram syntax). The block falls
//!   back to a code listing of its source and the error is recorded in
//!   [`crate::output::DiagramOutcome`] so callers can report it.
//!
//! Malformed Markdown never produces an error; it degrades to plain text.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the md2pdf-mermaid library.
///
/// Diagram-level failures use [`DiagramError`] and are stored in the
/// conversion report rather than propagated here.
#[derive(Debug, Error)]
pub enum Md2PdfError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("Markdown file not found: '{path}'\nCheck the path exists and is readable.")]
    InputNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// The file exists but is not valid UTF-8 text.
    #[error("Input '{path}' is not valid UTF-8 text (invalid byte at offset {offset})")]
    InputNotUtf8 { path: PathBuf, offset: usize },

    // ── Output errors ─────────────────────────────────────────────────────
    /// Could not create or write the output PDF file (e.g. locked by a viewer).
    #[error("Failed to write output file '{path}': {source}\nIs the file open in another program?")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The page-description library rejected the laid-out document.
    #[error("PDF generation failed: {0}")]
    PdfEmitFailed(String),

    // ── HTML engine errors ────────────────────────────────────────────────
    /// The HTML engine needs a browser and none could be launched.
    #[error(
        "The HTML engine requires Chrome or Chromium: {detail}\n\
Install a Chromium-based browser, pass --chrome-path, or use --engine layout."
    )]
    BrowserUnavailable { detail: String },

    /// The browser was running but printing the page to PDF failed.
    #[error("Browser print-to-PDF failed: {0}")]
    HtmlPrintFailed(String),

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// A non-fatal error for a single Mermaid diagram.
///
/// The diagram's block is kept in the output as a code listing of its source.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum DiagramError {
    /// Mermaid rendering is switched off in the configuration.
    #[error("Diagram {index}: Mermaid rendering disabled")]
    Disabled { index: usize },

    /// No browser could be launched (not installed, sandbox refused, …).
    #[error("Diagram {index}: headless browser unavailable: {detail}")]
    BrowserUnavailable { index: usize, detail: String },

    /// The diagram did not finish drawing within the configured wait.
    #[error("Diagram {index}: rendering timed out after {secs}s")]
    Timeout { index: usize, secs: u64 },

    /// Mermaid rejected the diagram source.
    #[error("Diagram {index}: invalid Mermaid syntax: {detail}")]
    InvalidSyntax { index: usize, detail: String },

    /// The page loaded but the diagram element could not be captured.
    #[error("Diagram {index}: screenshot failed: {detail}")]
    CaptureFailed { index: usize, detail: String },

    /// The captured screenshot was not a decodable image.
    #[error("Diagram {index}: could not decode screenshot: {detail}")]
    DecodeFailed { index: usize, detail: String },
}

impl DiagramError {
    /// Ordinal (1-indexed) of the diagram this error belongs to.
    pub fn index(&self) -> usize {
        match self {
            DiagramError::Disabled { index }
            | DiagramError::BrowserUnavailable { index, .. }
            | DiagramError::Timeout { index, .. }
            | DiagramError::InvalidSyntax { index, .. }
            | DiagramError::CaptureFailed { index, .. }
            | DiagramError::DecodeFailed { index, .. } => *index,
        }
    }

    /// Whether the failure comes from the environment rather than the diagram.
    pub fn is_missing_browser(&self) -> bool {
        matches!(self, DiagramError::BrowserUnavailable { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn output_write_failed_display() {
        let e = Md2PdfError::OutputWriteFailed {
            path: PathBuf::from("/tmp/report.pdf"),
            source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "locked"),
        };
        let msg = e.to_string();
        assert!(msg.contains("report.pdf"), "got: {msg}");
        assert!(msg.contains("locked"), "got: {msg}");
    }

    #[test]
    fn diagram_timeout_display() {
        let e = DiagramError::Timeout { index: 2, secs: 15 };
        assert!(e.to_string().contains("15s"));
        assert!(e.to_string().contains("Diagram 2"));
        assert_eq!(e.index(), 2);
    }

    #[test]
    fn browser_unavailable_is_missing_browser() {
        let e = DiagramError::BrowserUnavailable {
            index: 1,
            detail: "no chrome".into(),
        };
        assert!(e.is_missing_browser());
        assert!(!DiagramError::Disabled { index: 1 }.is_missing_browser());
    }

    #[test]
    fn diagram_error_serialises() {
        let e = DiagramError::InvalidSyntax {
            index: 3,
            detail: "Parse error on line 1".into(),
        };
        let json = serde_json::to_string(&e).expect("serialise");
        assert!(json.contains("InvalidSyntax"));
        let back: DiagramError = serde_json::from_str(&json).expect("deserialise");
        assert_eq!(back, e);
    }
}
