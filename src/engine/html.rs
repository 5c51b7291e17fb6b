//! HTML engine: [`RenderDocument`] → styled HTML → Chrome print-to-PDF.
//!
//! The page uses the same palette as the layout engine. Text is set in the
//! browser's fonts, so any Unicode (emoji included) renders natively. Diagrams
//! are inlined as base64 PNGs, which keeps the printed page self-contained.

use super::theme::{self, Rgb};
use super::PdfEngine;
use crate::browser::BrowserSession;
use crate::config::{ConversionConfig, FontChoice, Orientation};
use crate::error::Md2PdfError;
use crate::model::{Content, InlineRun, RenderDocument, RunStyle};
use crate::pipeline::encode::diagram_data_uri;
use headless_chrome::types::PrintToPdfOptions;
use std::fmt::Write as _;
use std::io::Write as _;
use tracing::{debug, info};

/// Prints HTML through the session's browser.
pub struct HtmlEngine<'s> {
    session: &'s mut BrowserSession,
}

impl<'s> HtmlEngine<'s> {
    pub fn new(session: &'s mut BrowserSession) -> Self {
        Self { session }
    }
}

impl PdfEngine for HtmlEngine<'_> {
    fn render(&mut self, doc: &RenderDocument, config: &ConversionConfig) -> Result<Vec<u8>, Md2PdfError> {
        let html = render_html(doc, config)?;

        let mut page = tempfile::Builder::new()
            .prefix("md2pdf-")
            .suffix(".html")
            .tempfile()
            .map_err(|e| Md2PdfError::Internal(format!("cannot create temp HTML file: {e}")))?;
        page.write_all(html.as_bytes())
            .map_err(|e| Md2PdfError::Internal(format!("cannot write temp HTML file: {e}")))?;
        let url = format!("file://{}", page.path().display());

        let tab = self
            .session
            .open_tab()
            .map_err(|detail| Md2PdfError::BrowserUnavailable { detail })?;
        tab.navigate_to(&url)
            .and_then(|t| t.wait_until_navigated())
            .map_err(|e| Md2PdfError::HtmlPrintFailed(format!("navigation failed: {e}")))?;

        let bytes = tab
            .print_to_pdf(Some(print_options(config)))
            .map_err(|e| Md2PdfError::HtmlPrintFailed(e.to_string()))?;
        info!("Printed HTML ({} bytes) to PDF ({} bytes)", html.len(), bytes.len());
        Ok(bytes)
    }
}

const FOOTER_TEMPLATE: &str = "<div style=\"width: 100%; text-align: center; font-size: 9pt; color: #888888;\">\
<span class=\"pageNumber\"></span> / <span class=\"totalPages\"></span></div>";

fn print_options(config: &ConversionConfig) -> PrintToPdfOptions {
    let (width, height) = config.page_size.portrait_pt();
    let m = config.margins;
    let inches = |mm: f32| f64::from(mm) / 25.4;
    PrintToPdfOptions {
        landscape: Some(config.orientation == Orientation::Landscape),
        display_header_footer: Some(config.page_numbers),
        print_background: Some(true),
        paper_width: Some(f64::from(width) / 72.0),
        paper_height: Some(f64::from(height) / 72.0),
        margin_top: Some(inches(m.top)),
        margin_bottom: Some(inches(m.bottom)),
        margin_left: Some(inches(m.left)),
        margin_right: Some(inches(m.right)),
        header_template: Some("<span></span>".to_string()),
        footer_template: Some(FOOTER_TEMPLATE.to_string()),
        ..Default::default()
    }
}

// ── HTML ─────────────────────────────────────────────────────────────────

/// Build the complete HTML page for a document.
pub fn render_html(doc: &RenderDocument, config: &ConversionConfig) -> Result<String, Md2PdfError> {
    let mut out = String::with_capacity(4096);
    out.push_str("<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n");
    let _ = writeln!(out, "<title>{}</title>", escape(&doc.title));
    let _ = writeln!(out, "<style>\n{}</style>", stylesheet(config));
    out.push_str("</head>\n<body>\n");

    for block in &doc.blocks {
        match block {
            Content::Heading { level, runs } => {
                let _ = writeln!(out, "<h{level}>{}</h{level}>", inline_html(runs));
            }
            Content::Paragraph { runs } => {
                let _ = writeln!(out, "<p>{}</p>", inline_html(runs));
            }
            Content::ListItem { marker, depth, runs } => {
                let _ = writeln!(
                    out,
                    "<div class=\"li\" style=\"margin-left: {}pt\"><span class=\"marker\">{}</span><span>{}</span></div>",
                    depth * 18,
                    escape(&marker.label()),
                    inline_html(runs)
                );
            }
            Content::Table { header, rows } => {
                out.push_str("<table>\n");
                if !header.is_empty() {
                    out.push_str("<thead><tr>");
                    for cell in header {
                        let _ = write!(out, "<th>{}</th>", inline_html(cell));
                    }
                    out.push_str("</tr></thead>\n");
                }
                out.push_str("<tbody>\n");
                for row in rows {
                    out.push_str("<tr>");
                    for cell in row {
                        let _ = write!(out, "<td>{}</td>", inline_html(cell));
                    }
                    out.push_str("</tr>\n");
                }
                out.push_str("</tbody>\n</table>\n");
            }
            Content::Code { language, text } => {
                let class = language
                    .as_deref()
                    .map(|l| format!(" class=\"language-{}\"", escape(l)))
                    .unwrap_or_default();
                let _ = writeln!(out, "<pre><code{class}>{}</code></pre>", escape(text.trim_end_matches('\n')));
            }
            Content::Diagram(art) => {
                let uri = diagram_data_uri(art).map_err(|e| {
                    Md2PdfError::Internal(format!("diagram {}: PNG encode failed: {e}", art.index))
                })?;
                let _ = writeln!(
                    out,
                    "<div class=\"diagram\"><img alt=\"Diagram {}\" src=\"{uri}\"></div>",
                    art.index
                );
            }
            Content::Rule => out.push_str("<hr>\n"),
        }
    }

    out.push_str("</body>\n</html>\n");
    debug!("Built HTML page: {} blocks, {} bytes", doc.blocks.len(), out.len());
    Ok(out)
}

fn font_stack(font: FontChoice) -> &'static str {
    match font {
        FontChoice::Helvetica => "Helvetica, Arial, sans-serif",
        FontChoice::Times => "'Times New Roman', Times, serif",
        FontChoice::Courier => "'Courier New', Courier, monospace",
    }
}

fn stylesheet(config: &ConversionConfig) -> String {
    let m = config.margins;
    let orientation = match config.orientation {
        Orientation::Portrait => "portrait",
        Orientation::Landscape => "landscape",
    };
    let c = |rgb: Rgb| rgb.css();
    let width = config.diagram_width_fraction * 100.0;

    let mut css = String::new();
    let _ = writeln!(
        css,
        "@page {{ size: {} {orientation}; margin: {}mm {}mm {}mm {}mm; }}",
        config.page_size.css_name(),
        m.top,
        m.right,
        m.bottom,
        m.left
    );
    let _ = writeln!(
        css,
        "body {{ font-family: {}, 'Noto Color Emoji', 'Apple Color Emoji', 'Segoe UI Emoji'; \
font-size: {}pt; line-height: 1.4; color: {}; margin: 0; }}",
        font_stack(config.font),
        theme::BODY_SIZE,
        c(theme::TEXT)
    );
    for level in 1..=4u8 {
        let _ = write!(
            css,
            "h{level} {{ font-size: {}pt; color: {}; margin: 0.8em 0 0.4em; page-break-after: avoid;",
            theme::heading_size(level),
            c(theme::heading_color(level))
        );
        if let Some((color, thickness)) = theme::heading_rule(level) {
            let _ = write!(css, " border-bottom: {thickness}pt solid {}; padding-bottom: 3pt;", c(color));
        }
        css.push_str(" }\n");
    }
    let _ = writeln!(css, "p {{ margin: 0 0 6pt; }}");
    let _ = writeln!(css, ".li {{ display: flex; margin-bottom: 3pt; }}");
    let _ = writeln!(css, ".li .marker {{ min-width: 18pt; padding-right: 6pt; }}");
    let _ = writeln!(
        css,
        "code {{ font-family: 'Courier New', Courier, monospace; color: {}; }}",
        c(theme::INLINE_CODE)
    );
    let _ = writeln!(
        css,
        "pre {{ background: {}; border: 0.5pt solid {}; padding: 6pt; font-size: {}pt; \
white-space: pre-wrap; word-wrap: break-word; }}",
        c(theme::CODE_BG),
        c(theme::CODE_BORDER),
        theme::CODE_SIZE
    );
    let _ = writeln!(css, "pre code {{ color: {}; }}", c(theme::TEXT));
    let _ = writeln!(
        css,
        "table {{ border-collapse: collapse; width: 100%; font-size: {}pt; margin-bottom: 10pt; }}",
        theme::TABLE_SIZE
    );
    let _ = writeln!(css, "th, td {{ border: 0.5pt solid {}; padding: 4pt; text-align: left; }}", c(theme::TABLE_GRID));
    let _ = writeln!(
        css,
        "th {{ background: {}; color: {}; font-weight: bold; }}",
        c(theme::TABLE_HEADER_BG),
        c(theme::TABLE_HEADER_TEXT)
    );
    let _ = writeln!(css, "th code {{ color: {}; }}", c(theme::TABLE_HEADER_TEXT));
    let _ = writeln!(css, "tr {{ page-break-inside: avoid; }}");
    let _ = writeln!(css, "tbody tr:nth-child(odd) {{ background: {}; }}", c(theme::TABLE_ROW));
    let _ = writeln!(css, "tbody tr:nth-child(even) {{ background: {}; }}", c(theme::TABLE_ROW_ALT));
    let _ = writeln!(css, ".diagram {{ text-align: center; margin: 0 0 10pt; page-break-inside: avoid; }}");
    let _ = writeln!(css, ".diagram img {{ width: {width:.0}%; max-height: 75vh; object-fit: contain; }}");
    let _ = writeln!(css, "hr {{ border: none; border-top: 0.5pt solid {}; margin: 6pt 0; }}", c(theme::RULE));
    css
}

fn inline_html(runs: &[InlineRun]) -> String {
    let mut out = String::new();
    for run in runs {
        let text = escape(&run.text);
        match run.style {
            RunStyle::Plain => out.push_str(&text),
            RunStyle::Bold => {
                let _ = write!(out, "<strong>{text}</strong>");
            }
            RunStyle::Italic => {
                let _ = write!(out, "<em>{text}</em>");
            }
            RunStyle::BoldItalic => {
                let _ = write!(out, "<strong><em>{text}</em></strong>");
            }
            RunStyle::Code => {
                let _ = write!(out, "<code>{text}</code>");
            }
        }
    }
    out
}

fn escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PageSize;
    use crate::model::{DiagramArtifact, ListMarker};
    use image::RgbImage;

    fn doc(blocks: Vec<Content>) -> RenderDocument {
        RenderDocument {
            title: "A <Title>".into(),
            blocks,
        }
    }

    #[test]
    fn blocks_render_in_order() {
        let html = render_html(
            &doc(vec![
                Content::Heading {
                    level: 2,
                    runs: vec![InlineRun::plain("Intro")],
                },
                Content::Paragraph {
                    runs: vec![InlineRun::plain("Hi "), InlineRun::new("there", RunStyle::Bold)],
                },
                Content::Rule,
            ]),
            &ConversionConfig::default(),
        )
        .unwrap();
        let h = html.find("<h2>Intro</h2>").unwrap();
        let p = html.find("<p>Hi <strong>there</strong></p>").unwrap();
        let hr = html.find("<hr>").unwrap();
        assert!(h < p && p < hr);
        assert!(html.contains("<title>A &lt;Title&gt;</title>"));
    }

    #[test]
    fn text_is_escaped() {
        let html = render_html(
            &doc(vec![
                Content::Paragraph {
                    runs: vec![InlineRun::new("<b>&", RunStyle::Code)],
                },
                Content::Code {
                    language: Some("html".into()),
                    text: "<script>alert(1)</script>\n".into(),
                },
            ]),
            &ConversionConfig::default(),
        )
        .unwrap();
        assert!(html.contains("<code>&lt;b&gt;&amp;</code>"));
        assert!(html.contains("<pre><code class=\"language-html\">&lt;script&gt;alert(1)&lt;/script&gt;</code></pre>"));
    }

    #[test]
    fn table_list_and_diagram() {
        let html = render_html(
            &doc(vec![
                Content::ListItem {
                    marker: ListMarker::Ordered(3),
                    depth: 1,
                    runs: vec![InlineRun::plain("third")],
                },
                Content::Table {
                    header: vec![vec![InlineRun::plain("H")]],
                    rows: vec![vec![vec![InlineRun::plain("v")]]],
                },
                Content::Diagram(DiagramArtifact {
                    index: 1,
                    pixels: RgbImage::new(2, 2),
                    png: Vec::new(),
                }),
            ]),
            &ConversionConfig::default(),
        )
        .unwrap();
        assert!(html.contains("margin-left: 18pt\"><span class=\"marker\">3.</span><span>third</span>"));
        assert!(html.contains("<thead><tr><th>H</th></tr></thead>"));
        assert!(html.contains("<td>v</td>"));
        assert!(html.contains("<img alt=\"Diagram 1\" src=\"data:image/png;base64,"));
        assert!(html.contains("width: 90%"));
    }

    #[test]
    fn page_css_follows_config() {
        let config = ConversionConfig::builder()
            .page_size(PageSize::Letter)
            .orientation(Orientation::Landscape)
            .build()
            .unwrap();
        let html = render_html(&doc(vec![]), &config).unwrap();
        assert!(html.contains("@page { size: Letter landscape; margin: 20mm 20mm 20mm 20mm; }"));
        assert!(html.contains("#3498db"));
    }

    #[test]
    fn print_options_use_inches() {
        let opts = print_options(&ConversionConfig::default());
        assert!((opts.paper_width.unwrap() - 8.2678).abs() < 1e-3);
        assert!((opts.margin_top.unwrap() - 20.0 / 25.4).abs() < 1e-6);
        assert_eq!(opts.landscape, Some(false));
        assert!(opts.footer_template.unwrap().contains("totalPages"));
    }

    #[test]
    fn html_is_deterministic() {
        let d = doc(vec![Content::Paragraph {
            runs: vec![InlineRun::plain("x")],
        }]);
        let config = ConversionConfig::default();
        assert_eq!(render_html(&d, &config).unwrap(), render_html(&d, &config).unwrap());
    }
}
