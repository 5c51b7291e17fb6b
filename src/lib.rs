//! # md2pdf-mermaid
//!
//! Convert Markdown documents to PDF, rendering fenced `mermaid` blocks as
//! diagrams through a headless Chrome.
//!
//! ## Why this crate?
//!
//! Markdown-to-PDF tools either ignore Mermaid or need a Node toolchain. This
//! crate keeps the text pipeline in Rust, draws the PDF itself with base-14
//! fonts, and only reaches for a browser to run Mermaid. When no browser is
//! available the conversion still succeeds: diagrams are shown as their
//! source and the report says why.
//!
//! ## Pipeline Overview
//!
//! ```text
//! Markdown
//!  │
//!  ├─ 1. Normalise  BOM, CRLF, invisible characters, blank-line runs
//!  ├─ 2. Parse      headings, paragraphs, lists, tables, code, mermaid, rules
//!  ├─ 3. Inline     bold / italic / code runs, link text, emoji policy
//!  ├─ 4. Diagrams   Mermaid → PNG in headless Chrome (bounded wait, fallback)
//!  └─ 5. Engine     flow layout + printpdf, or HTML printed by Chrome
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use md2pdf_mermaid::{convert_sync, ConversionConfig};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let markdown = std::fs::read_to_string("README.md")?;
//!     let output = convert_sync(&markdown, &ConversionConfig::default())?;
//!     std::fs::write("README.pdf", &output.pdf)?;
//!     eprintln!(
//!         "{} pages, {}/{} diagrams rendered",
//!         output.report.pages.unwrap_or(0),
//!         output.report.diagrams_rendered,
//!         output.report.diagrams_found
//!     );
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `md2pdf` binary (clap + anyhow + tracing-subscriber + indicatif) |
//! | `fetch-chrome` | off | Download a Chromium build when none is installed |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! md2pdf-mermaid = { version = "0.1", default-features = false }
//! ```
//!
//! ## Choosing an Engine
//!
//! | Engine | Text | Needs Chrome | Best for |
//! |--------|------|--------------|----------|
//! | `layout` | WinAnsi (Latin-1) via base-14 fonts | only for diagrams | Small files, no browser in CI |
//! | `html`   | Full Unicode and colour emoji | always | Non-Latin scripts, emoji |

// ── Modules ──────────────────────────────────────────────────────────────

pub mod browser;
pub mod config;
pub mod convert;
pub mod engine;
pub mod error;
pub mod model;
pub mod output;
pub mod pipeline;
pub mod progress;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{
    ConversionConfig, ConversionConfigBuilder, DiagramTheme, EmojiPolicy, EngineKind, FontChoice, Margins,
    Orientation, PageSize,
};
pub use convert::{
    convert, convert_document, convert_file, convert_sync, convert_to_file, convert_with_context, inspect,
    prepare_document, ConversionContext,
};
pub use engine::PdfEngine;
pub use error::{DiagramError, Md2PdfError};
pub use model::{Block, BlockKind, Content, DiagramArtifact, InlineRun, RenderDocument, RunStyle, SourceDocument};
pub use output::{ConversionOutput, ConversionReport, DiagramOutcome, DocumentSummary};
pub use pipeline::diagram::{DiagramRenderer, DiagramStyle};
pub use progress::{ConversionProgressCallback, NoopProgressCallback, ProgressCallback};
