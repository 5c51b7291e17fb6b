//! Pipeline stages for Markdown-to-PDF conversion.
//!
//! Each submodule implements exactly one transformation step, so each can be
//! tested on its own and the diagram backend can be swapped without touching
//! the text stages.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ normalise ──▶ parse ──▶ inline ──▶ diagram ──▶ engine
//! (file)    (cleanup)     (blocks)  (runs)     (Chrome)    (PDF)
//! ```
//!
//! 1. [`input`]     read a file as UTF-8 and derive the default title and output path
//! 2. [`normalise`] deterministic text cleanup (BOM, line endings, invisible
//!    characters, tabs in fences, blank-line runs)
//! 3. [`parse`]     Markdown → ordered [`crate::model::Block`]s
//! 4. [`inline`]    raw inline text → styled runs (bold, italic, code, links)
//! 5. [`diagram`]   Mermaid source → raster via headless Chrome; the only stage
//!    that blocks on an external process, always with a bounded wait
//! 6. [`encode`]    diagram PNG → `data:` URI for the HTML engine

pub mod diagram;
pub mod encode;
pub mod inline;
pub mod input;
pub mod normalise;
pub mod parse;
