//! PDF emission: display list → printpdf operations → bytes.
//!
//! Text uses the built-in base-14 fonts, so nothing is embedded and the
//! output stays small. Consecutive text ops share one text section; the
//! current font and fill colour are tracked so repeated state changes are
//! not re-emitted.

use super::layout::{DrawOp, LayoutPage, LayoutResult};
use super::metrics::BaseFont;
use super::theme::Rgb;
use crate::error::Md2PdfError;
use crate::model::{Content, RenderDocument};
use crate::pipeline::encode::encode_png;
use printpdf::graphics::{LinePoint, PaintMode, Point, Polygon, PolygonRing, WindingOrder};
use printpdf::matrix::TextMatrix;
use printpdf::ops::Op;
use printpdf::text::TextItem;
use printpdf::xobject::{XObject, XObjectTransform};
use printpdf::{BuiltinFont, Mm, PdfDocument, PdfPage, PdfSaveOptions, Pt, XObjectId};
use std::collections::HashMap;
use tracing::{debug, warn};

/// Emit a laid-out document as PDF bytes.
pub fn write_pdf(doc: &RenderDocument, layout: &LayoutResult) -> Result<Vec<u8>, Md2PdfError> {
    let mut pdf = PdfDocument::new(&doc.title);
    let images = register_images(&mut pdf, doc, layout)?;

    let geo = layout.geometry;
    let (width, height): (Mm, Mm) = (Pt(geo.width).into(), Pt(geo.height).into());
    for page in &layout.pages {
        let ops = PageWriter::new(geo.height, &images).write(page);
        pdf.pages.push(PdfPage::new(width, height, ops));
    }

    let mut warnings = Vec::new();
    let bytes = pdf.save(&PdfSaveOptions::default(), &mut warnings);
    if !warnings.is_empty() {
        debug!("printpdf reported {} warning(s)", warnings.len());
    }
    if bytes.is_empty() {
        return Err(Md2PdfError::PdfEmitFailed("printpdf produced no output".into()));
    }
    debug!("Wrote {} page(s), {} bytes", layout.pages.len(), bytes.len());
    Ok(bytes)
}

/// Add every diagram drawn by the layout as an image XObject, once each.
fn register_images(
    pdf: &mut PdfDocument,
    doc: &RenderDocument,
    layout: &LayoutResult,
) -> Result<HashMap<usize, (XObjectId, (u32, u32))>, Md2PdfError> {
    let mut images = HashMap::new();
    let drawn = layout.pages.iter().flat_map(|p| &p.ops).filter_map(|op| match op {
        DrawOp::Image { block, .. } => Some(*block),
        _ => None,
    });

    for block in drawn {
        if images.contains_key(&block) {
            continue;
        }
        let Some(Content::Diagram(art)) = doc.blocks.get(block) else {
            return Err(Md2PdfError::Internal(format!(
                "layout drew an image for block {block}, which is not a diagram"
            )));
        };
        let png = if art.png.is_empty() {
            encode_png(&art.pixels).map_err(|e| {
                Md2PdfError::PdfEmitFailed(format!("diagram {}: PNG encode failed: {e}", art.index))
            })?
        } else {
            art.png.clone()
        };
        let mut warnings = Vec::new();
        let raw = printpdf::image::RawImage::decode_from_bytes(&png, &mut warnings).map_err(|e| {
            Md2PdfError::PdfEmitFailed(format!("diagram {}: image decode failed: {e}", art.index))
        })?;
        let dims = (raw.width as u32, raw.height as u32);
        let id = XObjectId::new();
        pdf.resources.xobjects.map.insert(id.clone(), XObject::Image(raw));
        images.insert(block, (id, dims));
    }
    Ok(images)
}

fn builtin(font: BaseFont) -> BuiltinFont {
    match font {
        BaseFont::Helvetica => BuiltinFont::Helvetica,
        BaseFont::HelveticaBold => BuiltinFont::HelveticaBold,
        BaseFont::HelveticaOblique => BuiltinFont::HelveticaOblique,
        BaseFont::HelveticaBoldOblique => BuiltinFont::HelveticaBoldOblique,
        BaseFont::TimesRoman => BuiltinFont::TimesRoman,
        BaseFont::TimesBold => BuiltinFont::TimesBold,
        BaseFont::TimesItalic => BuiltinFont::TimesItalic,
        BaseFont::TimesBoldItalic => BuiltinFont::TimesBoldItalic,
        BaseFont::Courier => BuiltinFont::Courier,
        BaseFont::CourierBold => BuiltinFont::CourierBold,
        BaseFont::CourierOblique => BuiltinFont::CourierOblique,
        BaseFont::CourierBoldOblique => BuiltinFont::CourierBoldOblique,
    }
}

fn pdf_color(c: Rgb) -> printpdf::color::Color {
    let (r, g, b) = c.unit();
    printpdf::color::Color::Rgb(printpdf::Rgb::new(r, g, b, None))
}

fn point(x: f32, y: f32) -> LinePoint {
    LinePoint {
        p: Point { x: Pt(x), y: Pt(y) },
        bezier: false,
    }
}

// ── Page writer ──────────────────────────────────────────────────────────

struct PageWriter<'a> {
    page_height: f32,
    images: &'a HashMap<usize, (XObjectId, (u32, u32))>,
    ops: Vec<Op>,
    text_open: bool,
    font: Option<(BaseFont, f32)>,
    fill: Option<Rgb>,
}

impl<'a> PageWriter<'a> {
    fn new(page_height: f32, images: &'a HashMap<usize, (XObjectId, (u32, u32))>) -> Self {
        Self {
            page_height,
            images,
            ops: Vec::new(),
            text_open: false,
            font: None,
            fill: None,
        }
    }

    fn write(mut self, page: &LayoutPage) -> Vec<Op> {
        for op in &page.ops {
            match op {
                DrawOp::Text {
                    x,
                    y,
                    size,
                    font,
                    color,
                    text,
                } => self.text(*x, *y, *size, *font, *color, text),
                DrawOp::Rect {
                    x,
                    y,
                    width,
                    height,
                    fill,
                    stroke,
                } => self.rect(*x, *y, *width, *height, *fill, *stroke),
                DrawOp::Line {
                    x1,
                    y1,
                    x2,
                    y2,
                    color,
                    width,
                } => self.line(*x1, *y1, *x2, *y2, *color, *width),
                DrawOp::Image {
                    x,
                    y,
                    width,
                    height,
                    block,
                } => self.image(*x, *y, *width, *height, *block),
            }
        }
        self.close_text();
        self.ops
    }

    fn close_text(&mut self) {
        if self.text_open {
            self.ops.push(Op::EndTextSection);
            self.text_open = false;
        }
    }

    fn set_fill(&mut self, color: Rgb) {
        if self.fill != Some(color) {
            self.ops.push(Op::SetFillColor {
                col: pdf_color(color),
            });
            self.fill = Some(color);
        }
    }

    fn text(&mut self, x: f32, y: f32, size: f32, font: BaseFont, color: Rgb, text: &str) {
        if text.is_empty() {
            return;
        }
        if !self.text_open {
            self.ops.push(Op::StartTextSection);
            self.text_open = true;
            // Font state does not survive the end of a text object.
            self.font = None;
        }
        self.set_fill(color);
        if self.font != Some((font, size)) {
            self.ops.push(Op::SetFontSizeBuiltinFont {
                size: Pt(size),
                font: builtin(font),
            });
            self.font = Some((font, size));
        }
        self.ops.push(Op::SetTextMatrix {
            matrix: TextMatrix::Translate(Pt(x), Pt(self.page_height - y)),
        });
        self.ops.push(Op::WriteTextBuiltinFont {
            items: vec![TextItem::Text(text.to_string())],
            font: builtin(font),
        });
    }

    fn rect(
        &mut self,
        x: f32,
        y: f32,
        width: f32,
        height: f32,
        fill: Option<Rgb>,
        stroke: Option<(Rgb, f32)>,
    ) {
        let mode = match (fill, stroke) {
            (Some(_), Some(_)) => PaintMode::FillStroke,
            (Some(_), None) => PaintMode::Fill,
            (None, Some(_)) => PaintMode::Stroke,
            (None, None) => return,
        };
        self.close_text();
        if let Some(color) = fill {
            self.set_fill(color);
        }
        if let Some((color, thickness)) = stroke {
            self.ops.push(Op::SetOutlineColor {
                col: pdf_color(color),
            });
            self.ops.push(Op::SetOutlineThickness { pt: Pt(thickness) });
        }
        let bottom = self.page_height - (y + height);
        self.ops.push(Op::DrawPolygon {
            polygon: Polygon {
                rings: vec![PolygonRing {
                    points: vec![
                        point(x, bottom),
                        point(x + width, bottom),
                        point(x + width, bottom + height),
                        point(x, bottom + height),
                    ],
                }],
                mode,
                winding_order: WindingOrder::NonZero,
            },
        });
    }

    fn line(&mut self, x1: f32, y1: f32, x2: f32, y2: f32, color: Rgb, width: f32) {
        self.close_text();
        self.ops.push(Op::SetOutlineColor {
            col: pdf_color(color),
        });
        self.ops.push(Op::SetOutlineThickness { pt: Pt(width) });
        self.ops.push(Op::DrawPolygon {
            polygon: Polygon {
                rings: vec![PolygonRing {
                    points: vec![
                        point(x1, self.page_height - y1),
                        point(x2, self.page_height - y2),
                    ],
                }],
                mode: PaintMode::Stroke,
                winding_order: WindingOrder::NonZero,
            },
        });
    }

    fn image(&mut self, x: f32, y: f32, width: f32, height: f32, block: usize) {
        let Some((id, (px_w, px_h))) = self.images.get(&block) else {
            warn!("No image registered for block {}, skipping", block);
            return;
        };
        self.close_text();
        self.ops.push(Op::UseXobject {
            id: id.clone(),
            transform: XObjectTransform {
                translate_x: Some(Pt(x)),
                translate_y: Some(Pt(self.page_height - (y + height))),
                scale_x: Some(width / (*px_w).max(1) as f32),
                scale_y: Some(height / (*px_h).max(1) as f32),
                rotate: None,
                dpi: Some(72.0),
            },
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConversionConfig;
    use crate::engine::layout::layout_document;
    use crate::model::{DiagramArtifact, InlineRun};
    use image::RgbImage;

    fn render(blocks: Vec<Content>) -> Vec<u8> {
        let doc = RenderDocument {
            title: "Sample".into(),
            blocks,
        };
        let layout = layout_document(&doc, &ConversionConfig::default());
        write_pdf(&doc, &layout).expect("pdf should be written")
    }

    #[test]
    fn empty_document_is_a_pdf() {
        let bytes = render(vec![]);
        assert!(bytes.starts_with(b"%PDF"));
    }

    #[test]
    fn text_and_diagram_are_emitted() {
        let bytes = render(vec![
            Content::Paragraph {
                runs: vec![InlineRun::plain("Hello")],
            },
            Content::Diagram(DiagramArtifact {
                index: 1,
                pixels: RgbImage::from_pixel(20, 10, image::Rgb([200, 10, 10])),
                png: Vec::new(),
            }),
        ]);
        assert!(bytes.starts_with(b"%PDF"));
        assert!(bytes.len() > render(vec![]).len());
    }

    #[test]
    fn text_section_is_reused_for_consecutive_runs() {
        let page = LayoutPage {
            ops: vec![
                DrawOp::Text {
                    x: 10.0,
                    y: 20.0,
                    size: 11.0,
                    font: BaseFont::Helvetica,
                    color: Rgb::hex(0x333333),
                    text: "a".into(),
                },
                DrawOp::Text {
                    x: 20.0,
                    y: 20.0,
                    size: 11.0,
                    font: BaseFont::Helvetica,
                    color: Rgb::hex(0x333333),
                    text: "b".into(),
                },
            ],
        };
        let images = HashMap::new();
        let ops = PageWriter::new(100.0, &images).write(&page);
        let starts = ops.iter().filter(|op| matches!(op, Op::StartTextSection)).count();
        let fonts = ops
            .iter()
            .filter(|op| matches!(op, Op::SetFontSizeBuiltinFont { .. }))
            .count();
        assert_eq!(starts, 1);
        assert_eq!(fonts, 1);
        assert!(matches!(ops.last(), Some(Op::EndTextSection)));
    }

    #[test]
    fn image_without_registration_is_skipped() {
        let page = LayoutPage {
            ops: vec![DrawOp::Image {
                x: 0.0,
                y: 0.0,
                width: 10.0,
                height: 10.0,
                block: 7,
            }],
        };
        let images = HashMap::new();
        assert!(PageWriter::new(100.0, &images).write(&page).is_empty());
    }
}
