//! Diagram rendering: Mermaid source → raster image via a headless browser.
//!
//! Each diagram is loaded into a tiny harness page as a JSON string literal,
//! rendered by the Mermaid ES module, and captured by screenshotting only the
//! resulting `<svg>` element. The page reports its outcome on
//! `<body data-status>`; the renderer waits for that attribute with a bounded
//! timeout so a hung script can never stall the conversion.
//!
//! Renderers are behind the [`DiagramRenderer`] trait so the pipeline can be
//! driven without a browser (tests inject a fake).

use crate::browser::{BrowserSession, TabGuard};
use crate::config::{ConversionConfig, DiagramTheme};
use crate::error::DiagramError;
use crate::model::DiagramArtifact;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use headless_chrome::protocol::cdp::Page::CaptureScreenshotFormatOption;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, info};

/// Rendering parameters for one diagram.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiagramStyle {
    pub theme: DiagramTheme,
    pub timeout: Duration,
    pub script_url: String,
}

impl DiagramStyle {
    pub fn from_config(config: &ConversionConfig) -> Self {
        Self {
            theme: config.diagram_theme,
            timeout: Duration::from_secs(config.diagram_timeout_secs),
            script_url: config.mermaid_script_url.clone(),
        }
    }
}

/// Turns Mermaid source into a raster image.
pub trait DiagramRenderer {
    /// Render diagram number `index` (1-indexed).
    fn render(
        &mut self,
        index: usize,
        source: &str,
        style: &DiagramStyle,
    ) -> Result<DiagramArtifact, DiagramError>;
}

impl DiagramRenderer for BrowserSession {
    fn render(
        &mut self,
        index: usize,
        source: &str,
        style: &DiagramStyle,
    ) -> Result<DiagramArtifact, DiagramError> {
        let tab = self
            .open_tab()
            .map_err(|detail| DiagramError::BrowserUnavailable { index, detail })?;
        let png = capture(&tab, index, source, style)?;
        drop(tab);
        decode(index, png)
    }
}

// ── Harness ──────────────────────────────────────────────────────────────

/// Build the harness page for one diagram.
///
/// `source`, `theme` and `script_url` are embedded as JSON literals, so no
/// diagram text can break out of the script.
pub fn harness_html(source: &str, style: &DiagramStyle) -> String {
    let source = json_literal(source);
    let theme = json_literal(style.theme.as_str());
    let url = json_literal(&style.script_url);
    format!(
        r#"<!DOCTYPE html>
<html>
<head>
<meta charset="utf-8">
<style>
  html, body {{ margin: 0; padding: 0; background: #ffffff; }}
  #diagram {{ display: inline-block; padding: 8px; background: #ffffff; }}
</style>
</head>
<body>
<div id="diagram"></div>
<script type="module">
const source = {source};
const body = document.body;
let mermaid;
try {{
  mermaid = (await import({url})).default;
}} catch (err) {{
  body.dataset.error = String((err && err.message) || err);
  body.dataset.status = "unavailable";
}}
if (mermaid) {{
  try {{
    mermaid.initialize({{
      startOnLoad: false,
      theme: {theme},
      securityLevel: "strict",
      flowchart: {{ useMaxWidth: false, htmlLabels: true }},
    }});
    await mermaid.parse(source);
    const {{ svg }} = await mermaid.render("md2pdf-diagram", source);
    document.getElementById("diagram").innerHTML = svg;
    body.dataset.status = "done";
  }} catch (err) {{
    body.dataset.error = String((err && err.message) || err);
    body.dataset.status = "error";
  }}
}}
</script>
</body>
</html>
"#
    )
}

fn json_literal(s: &str) -> String {
    // `</` would end the surrounding <script> element.
    serde_json::to_string(s)
        .unwrap_or_else(|_| "\"\"".to_string())
        .replace("</", "<\\/")
}

/// Harness page as a `data:` URL.
pub fn harness_url(source: &str, style: &DiagramStyle) -> String {
    format!(
        "data:text/html;charset=utf-8;base64,{}",
        STANDARD.encode(harness_html(source, style))
    )
}

const STATUS_SCRIPT: &str =
    "JSON.stringify({ status: document.body.dataset.status || null, error: document.body.dataset.error || null })";

#[derive(Debug, Deserialize)]
struct HarnessStatus {
    status: Option<String>,
    error: Option<String>,
}

// ── Capture ──────────────────────────────────────────────────────────────

fn capture(
    tab: &TabGuard,
    index: usize,
    source: &str,
    style: &DiagramStyle,
) -> Result<Vec<u8>, DiagramError> {
    let capture_failed = |detail: String| DiagramError::CaptureFailed { index, detail };

    debug!("Diagram {}: loading harness ({} bytes of source)", index, source.len());
    tab.navigate_to(&harness_url(source, style))
        .and_then(|t| t.wait_until_navigated())
        .map_err(|e| capture_failed(format!("navigation failed: {e}")))?;

    tab.wait_for_element_with_custom_timeout("body[data-status]", style.timeout)
        .map_err(|_| DiagramError::Timeout {
            index,
            secs: style.timeout.as_secs(),
        })?;

    let status = tab
        .evaluate(STATUS_SCRIPT, false)
        .map_err(|e| capture_failed(format!("status query failed: {e}")))?;
    let status: HarnessStatus = status
        .value
        .as_ref()
        .and_then(|v| v.as_str())
        .and_then(|s| serde_json::from_str(s).ok())
        .ok_or_else(|| capture_failed("harness returned no status".to_string()))?;

    match status.status.as_deref() {
        Some("done") => {}
        Some("error") => {
            return Err(DiagramError::InvalidSyntax {
                index,
                detail: first_line(status.error.as_deref().unwrap_or("unknown error")),
            })
        }
        other => {
            return Err(capture_failed(format!(
                "Mermaid could not be loaded from {} ({}): {}",
                style.script_url,
                other.unwrap_or("no status"),
                status.error.as_deref().unwrap_or("unknown error")
            )))
        }
    }

    let element = tab
        .wait_for_element("#diagram svg")
        .map_err(|e| capture_failed(format!("diagram element missing: {e}")))?;
    element
        .capture_screenshot(CaptureScreenshotFormatOption::Png)
        .map_err(|e| capture_failed(format!("screenshot failed: {e}")))
}

fn first_line(s: &str) -> String {
    s.lines().next().unwrap_or_default().trim().to_string()
}

fn decode(index: usize, png: Vec<u8>) -> Result<DiagramArtifact, DiagramError> {
    let img = image::load_from_memory_with_format(&png, image::ImageFormat::Png).map_err(|e| {
        DiagramError::DecodeFailed {
            index,
            detail: e.to_string(),
        }
    })?;
    let pixels = img.to_rgb8();
    if pixels.width() == 0 || pixels.height() == 0 {
        return Err(DiagramError::DecodeFailed {
            index,
            detail: "empty image".to_string(),
        });
    }
    info!(
        "Diagram {}: captured {}x{} px ({} bytes)",
        index,
        pixels.width(),
        pixels.height(),
        png.len()
    );
    Ok(DiagramArtifact { index, pixels, png })
}
