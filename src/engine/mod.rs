//! PDF backends.
//!
//! Both engines take the same [`RenderDocument`] and configuration and return
//! finished PDF bytes; the rest of the pipeline does not know which one runs.
//!
//! | Engine | Module | Text | Browser |
//! |--------|--------|------|---------|
//! | [`LayoutEngine`] | [`layout`] + [`pdf`] | base-14 fonts (WinAnsi) | not needed |
//! | [`html::HtmlEngine`] | [`html`] | any Unicode, colour emoji | required |

pub mod html;
pub mod layout;
pub mod metrics;
pub mod pdf;
pub mod theme;

use crate::config::ConversionConfig;
use crate::error::Md2PdfError;
use crate::model::RenderDocument;
use tracing::info;

/// Writes a [`RenderDocument`] as PDF.
pub trait PdfEngine {
    fn render(&mut self, doc: &RenderDocument, config: &ConversionConfig) -> Result<Vec<u8>, Md2PdfError>;

    /// Pages in the last rendered document, when the engine knows it.
    fn page_count(&self) -> Option<usize> {
        None
    }
}

/// Flow layout drawn directly with printpdf.
#[derive(Debug, Default)]
pub struct LayoutEngine {
    pages: Option<usize>,
}

impl LayoutEngine {
    pub fn new() -> Self {
        Self::default()
    }
}

impl PdfEngine for LayoutEngine {
    fn render(&mut self, doc: &RenderDocument, config: &ConversionConfig) -> Result<Vec<u8>, Md2PdfError> {
        let layout = layout::layout_document(doc, config);
        let bytes = pdf::write_pdf(doc, &layout)?;
        info!(
            "Layout engine: {} page(s), {} bytes",
            layout.page_count(),
            bytes.len()
        );
        self.pages = Some(layout.page_count());
        Ok(bytes)
    }

    fn page_count(&self) -> Option<usize> {
        self.pages
    }
}
