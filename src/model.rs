//! Document model shared by the pipeline stages and the PDF engines.
//!
//! The flow is `SourceDocument` → [`Block`]s (parser) → [`Content`]
//! (inline formatting and diagram substitution) → [`RenderDocument`] (engine
//! input). Every stage preserves block order.

use image::RgbImage;
use serde::{Deserialize, Serialize};

/// Markdown text plus an optional title, as handed to the converter.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SourceDocument {
    pub text: String,
    pub title: Option<String>,
}

impl SourceDocument {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            title: None,
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }
}

/// List item marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListMarker {
    Bullet,
    /// Ordered item with its number as written (or as continued by the parser).
    Ordered(u64),
}

impl ListMarker {
    /// Marker text as printed in front of the item.
    pub fn label(self) -> String {
        match self {
            ListMarker::Bullet => "\u{2022}".to_string(),
            ListMarker::Ordered(n) => format!("{n}."),
        }
    }
}

/// One structural unit of a Markdown document.
///
/// Text fields hold the raw inline source (with `**`, `` ` `` and link
/// markup still present); [`crate::pipeline::inline::format_inline`] turns
/// them into styled runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Block {
    /// Level is always within 1..=4.
    Heading { level: u8, text: String },
    Paragraph { text: String },
    ListItem {
        marker: ListMarker,
        /// Nesting depth, 0 for a top-level item.
        depth: usize,
        text: String,
    },
    Table {
        header: Vec<String>,
        rows: Vec<Vec<String>>,
    },
    Code {
        language: Option<String>,
        text: String,
    },
    Mermaid { source: String },
    Rule,
}

impl Block {
    pub fn kind(&self) -> BlockKind {
        match self {
            Block::Heading { .. } => BlockKind::Heading,
            Block::Paragraph { .. } => BlockKind::Paragraph,
            Block::ListItem { .. } => BlockKind::ListItem,
            Block::Table { .. } => BlockKind::Table,
            Block::Code { .. } => BlockKind::Code,
            Block::Mermaid { .. } => BlockKind::Mermaid,
            Block::Rule => BlockKind::Rule,
        }
    }
}

/// Field-less tag of a [`Block`] or [`Content`] variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlockKind {
    Heading,
    Paragraph,
    ListItem,
    Table,
    Code,
    Mermaid,
    Diagram,
    Rule,
}

/// Visual style of an inline run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum RunStyle {
    #[default]
    Plain,
    Bold,
    Italic,
    BoldItalic,
    Code,
}

impl RunStyle {
    pub fn is_bold(self) -> bool {
        matches!(self, RunStyle::Bold | RunStyle::BoldItalic)
    }

    pub fn is_italic(self) -> bool {
        matches!(self, RunStyle::Italic | RunStyle::BoldItalic)
    }

    /// Style for the given emphasis flags. Code spans never combine.
    pub fn from_flags(bold: bool, italic: bool) -> Self {
        match (bold, italic) {
            (false, false) => RunStyle::Plain,
            (true, false) => RunStyle::Bold,
            (false, true) => RunStyle::Italic,
            (true, true) => RunStyle::BoldItalic,
        }
    }
}

/// A maximal span of text sharing one style.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InlineRun {
    pub text: String,
    pub style: RunStyle,
}

impl InlineRun {
    pub fn new(text: impl Into<String>, style: RunStyle) -> Self {
        Self {
            text: text.into(),
            style,
        }
    }

    pub fn plain(text: impl Into<String>) -> Self {
        Self::new(text, RunStyle::Plain)
    }
}

/// Concatenated text of a run list, without styling.
pub fn runs_text(runs: &[InlineRun]) -> String {
    runs.iter().map(|r| r.text.as_str()).collect()
}

/// A rendered Mermaid diagram.
#[derive(Debug, Clone, PartialEq)]
pub struct DiagramArtifact {
    /// 1-indexed ordinal among the document's diagrams.
    pub index: usize,
    /// Decoded raster, drawn by the layout engine.
    pub pixels: RgbImage,
    /// The PNG as captured, embedded by the HTML engine.
    pub png: Vec<u8>,
}

impl DiagramArtifact {
    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    pub fn height(&self) -> u32 {
        self.pixels.height()
    }
}

/// A block ready for an engine: inline text formatted, diagrams substituted.
#[derive(Debug, Clone, PartialEq)]
pub enum Content {
    Heading { level: u8, runs: Vec<InlineRun> },
    Paragraph { runs: Vec<InlineRun> },
    ListItem {
        marker: ListMarker,
        depth: usize,
        runs: Vec<InlineRun>,
    },
    Table {
        header: Vec<Vec<InlineRun>>,
        rows: Vec<Vec<Vec<InlineRun>>>,
    },
    Code {
        language: Option<String>,
        text: String,
    },
    Diagram(DiagramArtifact),
    Rule,
}

impl Content {
    pub fn kind(&self) -> BlockKind {
        match self {
            Content::Heading { .. } => BlockKind::Heading,
            Content::Paragraph { .. } => BlockKind::Paragraph,
            Content::ListItem { .. } => BlockKind::ListItem,
            Content::Table { .. } => BlockKind::Table,
            Content::Code { .. } => BlockKind::Code,
            Content::Diagram(_) => BlockKind::Diagram,
            Content::Rule => BlockKind::Rule,
        }
    }
}

/// Everything an engine needs to draw one document.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderDocument {
    pub title: String,
    pub blocks: Vec<Content>,
}
