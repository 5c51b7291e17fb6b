//! Integration tests for the conversion pipeline.
//!
//! Diagrams are drawn by an injected renderer, so none of these tests needs a
//! browser. Real Chrome runs live in `tests/e2e.rs`.

use image::RgbImage;
use md2pdf_mermaid::engine::html::render_html;
use md2pdf_mermaid::engine::layout::{layout_document, DrawOp};
use md2pdf_mermaid::engine::metrics::BaseFont;
use md2pdf_mermaid::engine::theme;
use md2pdf_mermaid::{
    convert, convert_file, convert_to_file, convert_with_context, prepare_document, BlockKind, Content,
    ConversionConfig, ConversionContext, ConversionProgressCallback, DiagramArtifact, DiagramError,
    DiagramOutcome, DiagramRenderer, DiagramStyle, EngineKind, InlineRun, Margins, Md2PdfError, RunStyle, SourceDocument,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

const SCENARIO: &str = "# Title\n\nA paragraph with **bold**.\n\n```mermaid\ngraph LR\nA-->B\n```";

// ── Test helpers ─────────────────────────────────────────────────────────────

/// Draws every diagram as an 800×400 raster; sources containing `invalid`
/// fail the way Mermaid reports a parse error.
#[derive(Clone, Default)]
struct FakeRenderer {
    calls: Arc<Mutex<Vec<(usize, String)>>>,
}

impl DiagramRenderer for FakeRenderer {
    fn render(&mut self, index: usize, source: &str, _style: &DiagramStyle) -> Result<DiagramArtifact, DiagramError> {
        self.calls.lock().unwrap().push((index, source.to_string()));
        if source.contains("invalid") {
            return Err(DiagramError::InvalidSyntax {
                index,
                detail: "Parse error on line 1".into(),
            });
        }
        Ok(DiagramArtifact {
            index,
            pixels: RgbImage::from_pixel(800, 400, image::Rgb([240, 240, 255])),
            png: Vec::new(),
        })
    }
}

fn context(config: &ConversionConfig) -> (ConversionContext, FakeRenderer) {
    let fake = FakeRenderer::default();
    (ConversionContext::with_renderer(config, fake.clone()), fake)
}

fn no_browser(builder: md2pdf_mermaid::ConversionConfigBuilder) -> ConversionConfig {
    builder
        .chrome_path("/nonexistent/md2pdf/chrome")
        .build()
        .unwrap()
}

fn region_kinds(markdown: &str, config: &ConversionConfig) -> Vec<BlockKind> {
    let (mut ctx, _) = context(config);
    let (doc, _) = prepare_document(&SourceDocument::new(markdown), config, &mut ctx);
    layout_document(&doc, config).regions.iter().map(|r| r.kind).collect()
}

// ── Scenarios ────────────────────────────────────────────────────────────────

#[test]
fn scenario_heading_paragraph_diagram() {
    let config = ConversionConfig::default();
    let (mut ctx, fake) = context(&config);
    let (doc, outcomes) = prepare_document(&SourceDocument::new(SCENARIO), &config, &mut ctx);
    let layout = layout_document(&doc, &config);

    let kinds: Vec<_> = layout.regions.iter().map(|r| r.kind).collect();
    assert_eq!(kinds, vec![BlockKind::Heading, BlockKind::Paragraph, BlockKind::Diagram]);

    let diagram = &layout.regions[2];
    let ratio = diagram.width / layout.geometry.content_width();
    assert!((ratio - 0.9).abs() < 0.01, "diagram spans {ratio} of the content width");
    assert!(layout.regions[0].y < layout.regions[1].y && layout.regions[1].y < diagram.y);

    assert_eq!(*fake.calls.lock().unwrap(), vec![(1, "graph LR\nA-->B".to_string())]);
    assert_eq!(
        outcomes,
        vec![DiagramOutcome::Rendered {
            index: 1,
            width: 800,
            height: 400
        }]
    );
}

#[test]
fn scenario_with_mermaid_disabled_shows_source() {
    let config = ConversionConfig::builder().mermaid(false).build().unwrap();
    let (mut ctx, fake) = context(&config);
    let (doc, outcomes) = prepare_document(&SourceDocument::new(SCENARIO), &config, &mut ctx);

    assert_eq!(
        region_kinds(SCENARIO, &config),
        vec![BlockKind::Heading, BlockKind::Paragraph, BlockKind::Code]
    );
    assert_eq!(
        doc.blocks[2],
        Content::Code {
            language: Some("mermaid".into()),
            text: "graph LR\nA-->B".into()
        }
    );
    assert!(fake.calls.lock().unwrap().is_empty());
    assert!(matches!(
        outcomes[0],
        DiagramOutcome::Fallback {
            error: DiagramError::Disabled { index: 1 }
        }
    ));
}

#[test]
fn invalid_diagram_falls_back_to_code_block() {
    let config = ConversionConfig::default();
    let (mut ctx, _) = context(&config);
    let md = "Before\n\n```mermaid\ninvalid >>> syntax\n```\n\nAfter\n";
    let output = convert_with_context(md, &config, &mut ctx).expect("conversion should succeed");

    assert!(output.pdf.starts_with(b"%PDF"));
    assert_eq!(output.report.diagrams_found, 1);
    assert_eq!(output.report.diagrams_rendered, 0);
    assert!(!output.report.browser_missing());
    let failed: Vec<_> = output.report.failed_diagrams().collect();
    assert!(matches!(failed[0], DiagramError::InvalidSyntax { index: 1, .. }));

    assert_eq!(
        region_kinds(md, &config),
        vec![BlockKind::Paragraph, BlockKind::Code, BlockKind::Paragraph]
    );
}

#[test]
fn empty_input_gives_one_page_pdf() {
    let config = ConversionConfig::default();
    let (mut ctx, _) = context(&config);
    let output = convert_with_context("", &config, &mut ctx).unwrap();
    assert!(output.pdf.starts_with(b"%PDF"));
    assert_eq!(output.report.pages, Some(1));
    assert_eq!(output.report.blocks, 0);
    assert_eq!(output.report.diagrams_found, 0);
    assert_eq!(output.report.pdf_bytes, output.pdf.len());
}

#[test]
fn block_order_is_preserved() {
    let md = "# One\n\nText\n\n- item\n\n| a | b |\n|---|---|\n| 1 | 2 |\n\n```rust\nfn x() {}\n```\n\n\
```mermaid\ngraph TD\n```\n\n---\n\n## Two\n";
    assert_eq!(
        region_kinds(md, &ConversionConfig::default()),
        vec![
            BlockKind::Heading,
            BlockKind::Paragraph,
            BlockKind::ListItem,
            BlockKind::Table,
            BlockKind::Code,
            BlockKind::Diagram,
            BlockKind::Rule,
            BlockKind::Heading,
        ]
    );
}

#[test]
fn inline_styles_match_across_contexts() {
    let md = "**x** `y`\n\n- **x** `y`\n\n| h |\n|---|\n| **x** `y` |\n";
    let config = ConversionConfig::default();
    let (mut ctx, _) = context(&config);
    let (doc, _) = prepare_document(&SourceDocument::new(md), &config, &mut ctx);

    let expected = vec![
        InlineRun::new("x", RunStyle::Bold),
        InlineRun::plain(" "),
        InlineRun::new("y", RunStyle::Code),
    ];
    let para = match &doc.blocks[0] {
        Content::Paragraph { runs } => runs.clone(),
        other => panic!("expected paragraph, got {other:?}"),
    };
    let item = match &doc.blocks[1] {
        Content::ListItem { runs, .. } => runs.clone(),
        other => panic!("expected list item, got {other:?}"),
    };
    let cell = match &doc.blocks[2] {
        Content::Table { rows, .. } => rows[0][0].clone(),
        other => panic!("expected table, got {other:?}"),
    };
    assert_eq!(para, expected);
    assert_eq!(item, expected);
    assert_eq!(cell, expected);

    // Same faces on the page, whatever the block.
    let layout = layout_document(&doc, &config);
    let mut x_faces = Vec::new();
    let mut y_faces = Vec::new();
    for op in &layout.pages[0].ops {
        if let DrawOp::Text { text, font, color, .. } = op {
            match text.as_str() {
                "x" => x_faces.push(*font),
                "y" => y_faces.push((*font, *color)),
                _ => {}
            }
        }
    }
    assert_eq!(x_faces, vec![BaseFont::HelveticaBold; 3]);
    assert_eq!(y_faces, vec![(BaseFont::Courier, theme::INLINE_CODE); 3]);

    let html = render_html(&doc, &config).unwrap();
    assert_eq!(html.matches("<strong>x</strong> <code>y</code>").count(), 3);
}

#[test]
fn layout_and_html_are_idempotent() {
    let config = ConversionConfig::default();
    let prepare = || {
        let (mut ctx, _) = context(&config);
        prepare_document(&SourceDocument::new(SCENARIO), &config, &mut ctx).0
    };
    let (a, b) = (prepare(), prepare());
    assert_eq!(a, b);
    assert_eq!(layout_document(&a, &config), layout_document(&b, &config));
    assert_eq!(render_html(&a, &config).unwrap(), render_html(&b, &config).unwrap());
}

// ── Progress ─────────────────────────────────────────────────────────────────

#[derive(Default)]
struct Counting {
    started: AtomicUsize,
    diagram_starts: AtomicUsize,
    completed: AtomicUsize,
    errors: AtomicUsize,
    finished: Mutex<Option<(usize, usize)>>,
}

impl ConversionProgressCallback for Counting {
    fn on_conversion_start(&self, total_diagrams: usize) {
        self.started.store(total_diagrams, Ordering::SeqCst);
    }
    fn on_diagram_start(&self, _index: usize, _total: usize) {
        self.diagram_starts.fetch_add(1, Ordering::SeqCst);
    }
    fn on_diagram_complete(&self, _index: usize, _total: usize, _w: u32, _h: u32) {
        self.completed.fetch_add(1, Ordering::SeqCst);
    }
    fn on_diagram_error(&self, _index: usize, _total: usize, _error: &str) {
        self.errors.fetch_add(1, Ordering::SeqCst);
    }
    fn on_conversion_complete(&self, total: usize, rendered: usize) {
        *self.finished.lock().unwrap() = Some((total, rendered));
    }
}

#[test]
fn progress_callback_sees_every_diagram() {
    let counting = Arc::new(Counting::default());
    let config = ConversionConfig::builder()
        .progress_callback(counting.clone())
        .build()
        .unwrap();
    let (mut ctx, _) = context(&config);
    let md = "```mermaid\ngraph TD\n```\n\n```mermaid\ninvalid\n```\n";
    convert_with_context(md, &config, &mut ctx).unwrap();

    assert_eq!(counting.started.load(Ordering::SeqCst), 2);
    assert_eq!(counting.diagram_starts.load(Ordering::SeqCst), 2);
    assert_eq!(counting.completed.load(Ordering::SeqCst), 1);
    assert_eq!(counting.errors.load(Ordering::SeqCst), 1);
    assert_eq!(*counting.finished.lock().unwrap(), Some((2, 1)));
}

// ── Browser availability ─────────────────────────────────────────────────────

#[test]
fn missing_browser_still_produces_pdf() {
    let config = no_browser(ConversionConfig::builder().diagram_timeout_secs(2));
    let mut ctx = ConversionContext::new(&config);
    let md = "# Doc\n\n```mermaid\ngraph TD\nA-->B\n```\n\n```mermaid\ngraph LR\n```\n";
    let output = convert_with_context(md, &config, &mut ctx).unwrap();

    assert!(output.pdf.starts_with(b"%PDF"));
    assert_eq!(output.report.diagrams_rendered, 0);
    assert!(output.report.browser_missing());
    assert_eq!(output.report.failed_diagrams().count(), 2);
    assert!(ctx.session().launch_error().is_some());
}

#[test]
fn html_engine_without_browser_is_fatal() {
    let config = no_browser(ConversionConfig::builder().engine(EngineKind::Html).mermaid(false));
    let mut ctx = ConversionContext::new(&config);
    let err = convert_with_context("# Hi\n", &config, &mut ctx).unwrap_err();
    assert!(matches!(err, Md2PdfError::BrowserUnavailable { .. }), "got {err}");
}

#[test]
fn reused_context_follows_each_config() {
    let first = ConversionConfig::builder().diagram_scale(2).build().unwrap();
    let (mut ctx, _) = context(&first);
    assert_eq!(ctx.session().settings().scale, 2);

    let second = ConversionConfig::builder()
        .diagram_scale(4)
        .diagram_canvas(800, 600)
        .build()
        .unwrap();
    prepare_document(&SourceDocument::new(SCENARIO), &second, &mut ctx);
    assert_eq!(ctx.session().settings().scale, 4);
    assert_eq!(ctx.session().settings().window, (800, 600));
}

// ── Configuration ────────────────────────────────────────────────────────────

#[test]
fn struct_literal_config_is_validated() {
    let config = ConversionConfig {
        margins: Margins::uniform(95.0),
        mermaid: false,
        ..Default::default()
    };
    let (mut ctx, _) = context(&config);
    let md = "| a | b |\n|---|---|\n| 1 | 2 |\n";
    let err = convert_with_context(md, &config, &mut ctx).unwrap_err();
    assert!(matches!(err, Md2PdfError::InvalidConfig(_)), "got {err}");
}

// ── Files and async ──────────────────────────────────────────────────────────

#[test]
fn convert_to_file_writes_pdf() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("out/doc.pdf");
    let config = ConversionConfig::builder().mermaid(false).build().unwrap();
    let report = convert_to_file("# Hello\n\nWorld\n", &path, &config).unwrap();
    let bytes = std::fs::read(&path).unwrap();
    assert!(bytes.starts_with(b"%PDF"));
    assert_eq!(report.pdf_bytes, bytes.len());
    assert_eq!(report.title, "Document");
}

#[test]
fn convert_file_defaults_title_and_output() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("notes.md");
    std::fs::write(&input, "# Notes\n\n- one\n- two\n").unwrap();
    let config = ConversionConfig::builder().mermaid(false).build().unwrap();

    let report = convert_file(&input, None, &config).unwrap();
    assert_eq!(report.title, "notes");
    assert!(dir.path().join("notes.pdf").exists());

    let titled = ConversionConfig::builder().mermaid(false).title("Custom").build().unwrap();
    let out = dir.path().join("custom.pdf");
    let report = convert_file(&input, Some(&out), &titled).unwrap();
    assert_eq!(report.title, "Custom");
    assert!(out.exists());
}

#[test]
fn unwritable_output_fails_without_leftovers() {
    let dir = tempfile::tempdir().unwrap();
    let target = dir.path().join("taken");
    std::fs::create_dir(&target).unwrap();
    let config = ConversionConfig::builder().mermaid(false).build().unwrap();

    let err = convert_to_file("# Hello\n", &target, &config).unwrap_err();
    assert!(matches!(err, Md2PdfError::OutputWriteFailed { .. }), "got {err}");
    assert!(target.is_dir());
    let entries: Vec<_> = std::fs::read_dir(dir.path()).unwrap().collect();
    assert_eq!(entries.len(), 1, "stray files left behind: {entries:?}");
}

#[test]
fn convert_file_missing_input() {
    let err = convert_file("/nonexistent/md2pdf/missing.md", None, &ConversionConfig::default()).unwrap_err();
    assert!(matches!(err, Md2PdfError::InputNotFound { .. }));
}

#[test]
fn async_convert_runs_on_blocking_pool() {
    let config = ConversionConfig::builder().mermaid(false).build().unwrap();
    let output = tokio_test::block_on(convert("# Async\n\nBody\n", config)).unwrap();
    assert!(output.pdf.starts_with(b"%PDF"));
    assert_eq!(output.report.blocks, 2);
}
