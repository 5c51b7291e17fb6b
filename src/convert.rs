//! Conversion entry points.
//!
//! Every conversion runs the same blocking pipeline:
//!
//! ```text
//! Markdown ─▶ normalise ─▶ parse ─▶ inline ─▶ diagrams ─▶ engine ─▶ PDF
//! ```
//!
//! Browser state lives in a caller-owned [`ConversionContext`]. The plain
//! entry points create a context per call; batch callers can keep one alive
//! with [`convert_with_context`] so Chrome is launched only once.

use crate::browser::{BrowserSession, LaunchSettings};
use crate::config::{ConversionConfig, EngineKind, DEFAULT_TITLE};
use crate::engine::html::HtmlEngine;
use crate::engine::{LayoutEngine, PdfEngine};
use crate::error::{DiagramError, Md2PdfError};
use crate::model::{Block, Content, RenderDocument, SourceDocument};
use crate::output::{ConversionOutput, ConversionReport, DiagramOutcome, DocumentSummary};
use crate::pipeline::diagram::{DiagramRenderer, DiagramStyle};
use crate::pipeline::{inline, input, normalise, parse};
use crate::progress::{ConversionProgressCallback, NoopProgressCallback};
use std::io::Write;
use std::path::Path;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Resources reused across conversions: the browser session and an optional
/// injected diagram renderer.
pub struct ConversionContext {
    session: BrowserSession,
    renderer: Option<Box<dyn DiagramRenderer + Send>>,
}

impl ConversionContext {
    /// Context whose diagrams are rendered by a lazily started headless Chrome.
    pub fn new(config: &ConversionConfig) -> Self {
        Self {
            session: BrowserSession::new(config),
            renderer: None,
        }
    }

    /// Context that renders diagrams with `renderer` instead of the browser.
    ///
    /// The HTML engine still prints through the context's browser session.
    pub fn with_renderer(config: &ConversionConfig, renderer: impl DiagramRenderer + Send + 'static) -> Self {
        Self {
            session: BrowserSession::new(config),
            renderer: Some(Box::new(renderer)),
        }
    }

    pub fn session(&self) -> &BrowserSession {
        &self.session
    }

    fn diagram_renderer(&mut self) -> &mut dyn DiagramRenderer {
        match self.renderer.as_deref_mut() {
            Some(r) => r,
            None => &mut self.session,
        }
    }
}

/// Convert Markdown text to PDF using an existing context.
///
/// # Errors
/// Only fatal failures are returned (PDF emission, HTML engine without a
/// browser). Diagrams that cannot be drawn fall back to code listings and are
/// listed in [`ConversionReport::diagrams`].
pub fn convert_with_context(
    markdown: impl AsRef<str>,
    config: &ConversionConfig,
    ctx: &mut ConversionContext,
) -> Result<ConversionOutput, Md2PdfError> {
    convert_document(&SourceDocument::new(markdown.as_ref()), config, ctx)
}

/// Convert a [`SourceDocument`]; its title, when set, overrides `config.title`.
pub fn convert_document(
    source: &SourceDocument,
    config: &ConversionConfig,
    ctx: &mut ConversionContext,
) -> Result<ConversionOutput, Md2PdfError> {
    config.validate()?;
    let start = Instant::now();
    info!("Starting conversion: {} bytes, {:?} engine", source.text.len(), config.engine);

    // ── Steps 1–4: normalise, parse, format, render diagrams ─────────────
    let (doc, diagrams) = prepare_document(source, config, ctx);

    // ── Step 5: write the PDF ────────────────────────────────────────────
    let mut engine: Box<dyn PdfEngine + '_> = match config.engine {
        EngineKind::Layout => Box::new(LayoutEngine::new()),
        EngineKind::Html => Box::new(HtmlEngine::new(&mut ctx.session)),
    };
    let pdf = engine.render(&doc, config)?;
    let pages = engine.page_count();
    drop(engine);

    let report = ConversionReport {
        title: doc.title.clone(),
        engine: config.engine,
        pages,
        blocks: doc.blocks.len(),
        diagrams_found: diagrams.len(),
        diagrams_rendered: diagrams.iter().filter(|d| d.is_rendered()).count(),
        diagrams,
        pdf_bytes: pdf.len(),
        duration_ms: start.elapsed().as_millis() as u64,
    };
    info!(
        "Conversion complete: {} blocks, {}/{} diagrams, {} bytes in {}ms",
        report.blocks, report.diagrams_rendered, report.diagrams_found, report.pdf_bytes, report.duration_ms
    );
    Ok(ConversionOutput { pdf, report })
}

/// Run every stage before the engine: the engine-ready document plus one
/// outcome per `mermaid` block.
///
/// The context's browser session adopts `config`'s launch settings first, so
/// a reused context renders at the scale and canvas passed here.
pub fn prepare_document(
    source: &SourceDocument,
    config: &ConversionConfig,
    ctx: &mut ConversionContext,
) -> (RenderDocument, Vec<DiagramOutcome>) {
    // A reused context follows the config of each conversion.
    if ctx.session.reconfigure(LaunchSettings::from_config(config)) {
        debug!("Browser settings updated for this conversion");
    }
    let title = source.title.clone().unwrap_or_else(|| config.title.clone());
    prepare(&source.text, title, config, ctx.diagram_renderer())
}

/// Convert Markdown text to PDF on the calling thread.
pub fn convert_sync(markdown: impl AsRef<str>, config: &ConversionConfig) -> Result<ConversionOutput, Md2PdfError> {
    let mut ctx = ConversionContext::new(config);
    convert_with_context(markdown, config, &mut ctx)
}

/// Convert Markdown text to PDF without blocking the async runtime.
///
/// The pipeline runs on tokio's blocking pool.
///
/// # Example
/// ```rust,no_run
/// use md2pdf_mermaid::{convert, ConversionConfig};
///
/// # async fn run() -> Result<(), Box<dyn std::error::Error>> {
/// let output = convert("# Hello\n\n```mermaid\ngraph LR\nA-->B\n```\n", ConversionConfig::default()).await?;
/// std::fs::write("hello.pdf", &output.pdf)?;
/// println!("{}/{} diagrams rendered", output.report.diagrams_rendered, output.report.diagrams_found);
/// # Ok(())
/// # }
/// ```
pub async fn convert(markdown: impl Into<String>, config: ConversionConfig) -> Result<ConversionOutput, Md2PdfError> {
    let markdown = markdown.into();
    tokio::task::spawn_blocking(move || convert_sync(&markdown, &config))
        .await
        .map_err(|e| Md2PdfError::Internal(format!("conversion task failed: {e}")))?
}

/// Convert Markdown text and write the PDF to `output_path`.
///
/// The file is written to a temporary sibling and renamed into place, so a
/// failure never leaves a partial PDF behind.
pub fn convert_to_file(
    markdown: impl AsRef<str>,
    output_path: impl AsRef<Path>,
    config: &ConversionConfig,
) -> Result<ConversionReport, Md2PdfError> {
    let output = convert_sync(markdown, config)?;
    write_atomic(output_path.as_ref(), &output.pdf)?;
    Ok(output.report)
}

/// Convert a Markdown file.
///
/// Without an explicit output path the PDF is written next to the input
/// (`notes.md` → `notes.pdf`). Unless `config.title` was changed from its
/// default, the title is the input's file stem.
pub fn convert_file(
    input_path: impl AsRef<Path>,
    output_path: Option<&Path>,
    config: &ConversionConfig,
) -> Result<ConversionReport, Md2PdfError> {
    let input_path = input_path.as_ref();
    let text = input::read_markdown(input_path)?;
    let output_path = output_path
        .map(Path::to_path_buf)
        .unwrap_or_else(|| input::default_output(input_path));

    let mut source = SourceDocument::new(text);
    if config.title == DEFAULT_TITLE {
        source = source.with_title(input::default_title(input_path));
    }

    let mut ctx = ConversionContext::new(config);
    let output = convert_document(&source, config, &mut ctx)?;
    write_atomic(&output_path, &output.pdf)?;
    info!("Wrote {} ({} bytes)", output_path.display(), output.pdf.len());
    Ok(output.report)
}

/// Describe a document's structure without rendering anything.
pub fn inspect(markdown: impl AsRef<str>) -> DocumentSummary {
    parse::summarise(&normalise::normalise_markdown(markdown.as_ref()))
}

// ── Pipeline ─────────────────────────────────────────────────────────────

fn prepare(
    markdown: &str,
    title: String,
    config: &ConversionConfig,
    renderer: &mut dyn DiagramRenderer,
) -> (RenderDocument, Vec<DiagramOutcome>) {
    let noop = NoopProgressCallback;
    let progress: &dyn ConversionProgressCallback = config.progress_callback.as_deref().unwrap_or(&noop);

    let text = normalise::normalise_markdown(markdown);
    let blocks: Vec<Block> = parse::parse_blocks(&text).collect();
    let total = blocks.iter().filter(|b| matches!(b, Block::Mermaid { .. })).count();
    debug!("Parsed {} blocks, {} Mermaid diagram(s)", blocks.len(), total);
    progress.on_conversion_start(total);

    let style = DiagramStyle::from_config(config);
    let format = |raw: &str| inline::format_inline(raw, config.emoji);
    let mut outcomes = Vec::with_capacity(total);
    let mut content = Vec::with_capacity(blocks.len());

    for block in blocks {
        let item = match block {
            Block::Heading { level, text } => Content::Heading {
                level,
                runs: format(&text),
            },
            Block::Paragraph { text } => Content::Paragraph { runs: format(&text) },
            Block::ListItem { marker, depth, text } => Content::ListItem {
                marker,
                depth,
                runs: format(&text),
            },
            Block::Table { header, rows } => Content::Table {
                header: header.iter().map(|c| format(c)).collect(),
                rows: rows
                    .iter()
                    .map(|row| row.iter().map(|c| format(c)).collect())
                    .collect(),
            },
            Block::Code { language, text } => Content::Code { language, text },
            Block::Rule => Content::Rule,
            Block::Mermaid { source } => {
                let index = outcomes.len() + 1;
                let (item, outcome) = diagram(index, total, source, config, &style, renderer, progress);
                outcomes.push(outcome);
                item
            }
        };
        content.push(item);
    }

    let rendered = outcomes.iter().filter(|o| o.is_rendered()).count();
    progress.on_conversion_complete(total, rendered);

    (RenderDocument { title, blocks: content }, outcomes)
}

fn diagram(
    index: usize,
    total: usize,
    source: String,
    config: &ConversionConfig,
    style: &DiagramStyle,
    renderer: &mut dyn DiagramRenderer,
    progress: &dyn ConversionProgressCallback,
) -> (Content, DiagramOutcome) {
    let result = if config.mermaid {
        progress.on_diagram_start(index, total);
        renderer.render(index, &source, style)
    } else {
        Err(DiagramError::Disabled { index })
    };

    match result {
        Ok(art) => {
            progress.on_diagram_complete(index, total, art.width(), art.height());
            let outcome = DiagramOutcome::Rendered {
                index,
                width: art.width(),
                height: art.height(),
            };
            (Content::Diagram(art), outcome)
        }
        Err(error) => {
            if !matches!(error, DiagramError::Disabled { .. }) {
                warn!("{}; showing its source instead", error);
                progress.on_diagram_error(index, total, &error.to_string());
            }
            let fallback = Content::Code {
                language: Some("mermaid".to_string()),
                text: source,
            };
            (fallback, DiagramOutcome::Fallback { error })
        }
    }
}

fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), Md2PdfError> {
    let failed = |source: std::io::Error| Md2PdfError::OutputWriteFailed {
        path: path.to_path_buf(),
        source,
    };
    let parent = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(parent).map_err(failed)?;

    let mut tmp = tempfile::NamedTempFile::new_in(parent).map_err(failed)?;
    tmp.write_all(bytes).map_err(failed)?;
    tmp.flush().map_err(failed)?;
    tmp.persist(path).map_err(|e| failed(e.error))?;
    Ok(())
}
