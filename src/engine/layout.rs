//! Flow layout: [`RenderDocument`] → positioned draw operations per page.
//!
//! Layout is pure: it measures text with the base-14 metrics, breaks pages
//! and returns a display list. Nothing here touches printpdf, so the same
//! input always yields the same [`LayoutResult`] and tests can inspect page
//! breaks and block regions directly.
//!
//! Coordinates are points from the top-left corner of the page; `y` grows
//! downwards. The PDF writer flips them.

use super::metrics::{to_winansi, wrap_runs, BaseFont, TextLine, TextStyle};
use super::theme::{self, Rgb};
use crate::config::ConversionConfig;
use crate::model::{BlockKind, Content, DiagramArtifact, InlineRun, ListMarker, RenderDocument, RunStyle};
use tracing::debug;

const LEADING: f32 = 1.4;
const HEADING_LEADING: f32 = 1.25;
const PARAGRAPH_GAP: f32 = 6.0;
const LIST_GAP: f32 = 3.0;
const LIST_INDENT: f32 = 18.0;
const TABLE_PAD: f32 = 4.0;
const TABLE_MIN_COL: f32 = 40.0;
const TABLE_GAP: f32 = 10.0;
const CODE_PAD: f32 = 6.0;
const CODE_LINE: f32 = 10.0;
const CODE_GAP: f32 = 8.0;
const DIAGRAM_GAP: f32 = 10.0;
const DIAGRAM_MAX_HEIGHT: f32 = 0.75;
const RULE_GAP: f32 = 6.0;

/// One drawing primitive.
#[derive(Debug, Clone, PartialEq)]
pub enum DrawOp {
    /// `y` is the baseline.
    Text {
        x: f32,
        y: f32,
        size: f32,
        font: BaseFont,
        color: Rgb,
        text: String,
    },
    /// `y` is the top edge.
    Rect {
        x: f32,
        y: f32,
        width: f32,
        height: f32,
        fill: Option<Rgb>,
        stroke: Option<(Rgb, f32)>,
    },
    Line {
        x1: f32,
        y1: f32,
        x2: f32,
        y2: f32,
        color: Rgb,
        width: f32,
    },
    /// `block` indexes [`RenderDocument::blocks`], which holds the pixels.
    Image {
        x: f32,
        y: f32,
        width: f32,
        height: f32,
        block: usize,
    },
}

impl DrawOp {
    /// Bounding box as `(left, top, right, bottom)`.
    fn bounds(&self) -> (f32, f32, f32, f32) {
        match self {
            DrawOp::Text {
                x, y, size, font, text, ..
            } => (*x, y - size * 0.8, x + font.text_width(text, *size), y + size * 0.2),
            DrawOp::Rect {
                x, y, width, height, ..
            }
            | DrawOp::Image {
                x, y, width, height, ..
            } => (*x, *y, x + width, y + height),
            DrawOp::Line {
                x1, y1, x2, y2, width, ..
            } => (
                x1.min(*x2),
                y1.min(*y2) - width / 2.0,
                x1.max(*x2),
                y1.max(*y2) + width / 2.0,
            ),
        }
    }
}

/// The draw operations of one page, in painting order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct LayoutPage {
    pub ops: Vec<DrawOp>,
}

/// Where a content block landed: the box it occupies on its first page.
#[derive(Debug, Clone, PartialEq)]
pub struct Region {
    /// Index into [`RenderDocument::blocks`].
    pub index: usize,
    pub kind: BlockKind,
    /// 1-indexed page the block starts on.
    pub page: usize,
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

/// Page size and margins in points.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageGeometry {
    pub width: f32,
    pub height: f32,
    pub margin_top: f32,
    pub margin_right: f32,
    pub margin_bottom: f32,
    pub margin_left: f32,
}

impl PageGeometry {
    pub fn from_config(config: &ConversionConfig) -> Self {
        let (width, height) = config.page_dimensions_pt();
        let m = config.margins.to_pt();
        Self {
            width,
            height,
            margin_top: m.top,
            margin_right: m.right,
            margin_bottom: m.bottom,
            margin_left: m.left,
        }
    }

    pub fn content_width(&self) -> f32 {
        self.width - self.margin_left - self.margin_right
    }

    pub fn content_height(&self) -> f32 {
        self.height - self.margin_top - self.margin_bottom
    }

    fn content_bottom(&self) -> f32 {
        self.height - self.margin_bottom
    }
}

/// A laid-out document.
#[derive(Debug, Clone, PartialEq)]
pub struct LayoutResult {
    pub pages: Vec<LayoutPage>,
    pub regions: Vec<Region>,
    pub geometry: PageGeometry,
}

impl LayoutResult {
    pub fn page_count(&self) -> usize {
        self.pages.len()
    }
}

/// Lay out every block of `doc` on as many pages as needed.
///
/// Always produces at least one page, so an empty document still carries its
/// footer.
pub fn layout_document(doc: &RenderDocument, config: &ConversionConfig) -> LayoutResult {
    let geometry = PageGeometry::from_config(config);
    let mut flow = Flow {
        config,
        geo: geometry,
        pages: vec![LayoutPage::default()],
        y: geometry.margin_top,
        regions: Vec::new(),
    };

    for (index, block) in doc.blocks.iter().enumerate() {
        let mark = flow.mark();
        match block {
            Content::Heading { level, runs } => flow.heading(*level, runs),
            Content::Paragraph { runs } => flow.paragraph(runs),
            Content::ListItem {
                marker,
                depth,
                runs,
            } => flow.list_item(*marker, *depth, runs),
            Content::Table { header, rows } => flow.table(header, rows),
            Content::Code { text, .. } => flow.code(text),
            Content::Diagram(art) => flow.diagram(index, art),
            Content::Rule => flow.rule(),
        }
        flow.record_region(index, block.kind(), mark);
    }

    if config.page_numbers {
        flow.footers();
    }

    debug!(
        "Laid out {} blocks on {} page(s)",
        doc.blocks.len(),
        flow.pages.len()
    );
    LayoutResult {
        pages: flow.pages,
        regions: flow.regions,
        geometry,
    }
}

/// Split a code line into chunks of at most `max_chars`, continuation chunks
/// indented by two spaces.
pub fn wrap_code_line(line: &str, max_chars: usize) -> Vec<String> {
    let max_chars = max_chars.max(8);
    let chars: Vec<char> = line.chars().collect();
    if chars.len() <= max_chars {
        return vec![line.to_string()];
    }
    let mut out = vec![chars[..max_chars].iter().collect::<String>()];
    let mut rest = &chars[max_chars..];
    let step = max_chars - 2;
    while !rest.is_empty() {
        let n = step.min(rest.len());
        out.push(format!("  {}", rest[..n].iter().collect::<String>()));
        rest = &rest[n..];
    }
    out
}

// ── Flow ─────────────────────────────────────────────────────────────────

struct Flow<'a> {
    config: &'a ConversionConfig,
    geo: PageGeometry,
    pages: Vec<LayoutPage>,
    /// Top of the free space on the current page.
    y: f32,
    regions: Vec<Region>,
}

struct Mark {
    page: usize,
    op: usize,
}

impl Flow<'_> {
    fn left(&self) -> f32 {
        self.geo.margin_left
    }

    fn at_top(&self) -> bool {
        self.y <= self.geo.margin_top + 0.01
    }

    fn remaining(&self) -> f32 {
        self.geo.content_bottom() - self.y
    }

    fn new_page(&mut self) {
        self.pages.push(LayoutPage::default());
        self.y = self.geo.margin_top;
    }

    /// Break the page unless `height` fits. Never breaks an empty page, so
    /// oversized content overflows instead of looping.
    fn ensure(&mut self, height: f32) -> bool {
        if height > self.remaining() && !self.at_top() {
            self.new_page();
            return true;
        }
        false
    }

    fn push(&mut self, op: DrawOp) {
        if let Some(page) = self.pages.last_mut() {
            page.ops.push(op);
        }
    }

    fn gap(&mut self, gap: f32) {
        self.y = (self.y + gap).min(self.geo.content_bottom());
    }

    fn mark(&self) -> Mark {
        Mark {
            page: self.pages.len() - 1,
            op: self.pages.last().map_or(0, |p| p.ops.len()),
        }
    }

    fn record_region(&mut self, index: usize, kind: BlockKind, mark: Mark) {
        let first = self.pages.iter().enumerate().skip(mark.page).find_map(|(i, p)| {
            let start = if i == mark.page { mark.op } else { 0 };
            (p.ops.len() > start).then(|| (i, &p.ops[start..]))
        });
        let Some((page, ops)) = first else {
            return;
        };
        let (mut l, mut t, mut r, mut b) = (f32::MAX, f32::MAX, f32::MIN, f32::MIN);
        for op in ops {
            let (ol, ot, or, ob) = op.bounds();
            l = l.min(ol);
            t = t.min(ot);
            r = r.max(or);
            b = b.max(ob);
        }
        self.regions.push(Region {
            index,
            kind,
            page: page + 1,
            x: l,
            y: t,
            width: r - l,
            height: b - t,
        });
    }

    fn body_style(&self, size: f32) -> TextStyle {
        TextStyle {
            family: self.config.font,
            size,
            color: theme::TEXT,
            code_color: theme::INLINE_CODE,
            force_bold: false,
        }
    }

    /// Draw one wrapped line with its top at `top`.
    fn draw_line(&mut self, line: &TextLine, x: f32, top: f32, size: f32, line_height: f32) {
        let baseline = top + (line_height - size) / 2.0 + size * 0.8;
        let mut x = x;
        for seg in &line.segments {
            let width = seg.font.text_width(&seg.text, size);
            self.push(DrawOp::Text {
                x,
                y: baseline,
                size,
                font: seg.font,
                color: seg.color,
                text: seg.text.clone(),
            });
            x += width;
        }
    }

    // ── Blocks ───────────────────────────────────────────────────────────

    fn heading(&mut self, level: u8, runs: &[InlineRun]) {
        let size = theme::heading_size(level);
        let style = TextStyle {
            color: theme::heading_color(level),
            code_color: theme::heading_color(level),
            force_bold: true,
            ..self.body_style(size)
        };
        let width = self.geo.content_width();
        let lines = wrap_runs(runs, &style, width);
        let line_height = size * HEADING_LEADING;
        let rule = theme::heading_rule(level);
        let rule_space = rule.map_or(0.0, |(_, t)| t + 4.0);
        let height = lines.len() as f32 * line_height + rule_space;

        if !self.at_top() {
            self.gap(size * 0.5);
        }
        // Keep the heading with the first line of what follows.
        self.ensure(height + theme::BODY_SIZE * LEADING);

        for line in &lines {
            let top = self.y;
            self.draw_line(line, self.left(), top, size, line_height);
            self.y += line_height;
        }
        if let Some((color, thickness)) = rule {
            let y = self.y + 2.0 + thickness / 2.0;
            self.push(DrawOp::Line {
                x1: self.left(),
                y1: y,
                x2: self.left() + width,
                y2: y,
                color,
                width: thickness,
            });
            self.y += rule_space;
        }
        self.gap(PARAGRAPH_GAP);
    }

    fn paragraph(&mut self, runs: &[InlineRun]) {
        let size = theme::BODY_SIZE;
        let lines = wrap_runs(runs, &self.body_style(size), self.geo.content_width());
        if lines.is_empty() {
            return;
        }
        let line_height = size * LEADING;
        for line in &lines {
            self.ensure(line_height);
            let top = self.y;
            self.draw_line(line, self.left(), top, size, line_height);
            self.y += line_height;
        }
        self.gap(PARAGRAPH_GAP);
    }

    fn list_item(&mut self, marker: ListMarker, depth: usize, runs: &[InlineRun]) {
        let size = theme::BODY_SIZE;
        let line_height = size * LEADING;
        let style = self.body_style(size);
        let marker_font = BaseFont::for_run(self.config.font, RunStyle::Plain, false);
        let label = marker.label();
        let marker_width = LIST_INDENT.max(marker_font.text_width(&label, size) + 6.0);
        let indent = depth as f32 * LIST_INDENT;
        let text_x = self.left() + indent + marker_width;
        let width = (self.geo.content_width() - indent - marker_width).max(size * 4.0);

        let mut lines = wrap_runs(runs, &style, width);
        if lines.is_empty() {
            lines.push(TextLine::default());
        }

        for (i, line) in lines.iter().enumerate() {
            self.ensure(line_height);
            let top = self.y;
            if i == 0 {
                let baseline = top + (line_height - size) / 2.0 + size * 0.8;
                self.push(DrawOp::Text {
                    x: self.left() + indent,
                    y: baseline,
                    size,
                    font: marker_font,
                    color: theme::TEXT,
                    text: label.clone(),
                });
            }
            self.draw_line(line, text_x, top, size, line_height);
            self.y += line_height;
        }
        self.gap(LIST_GAP);
    }

    fn table(&mut self, header: &[Vec<InlineRun>], rows: &[Vec<Vec<InlineRun>>]) {
        let columns = rows.iter().map(Vec::len).chain([header.len()]).max().unwrap_or(0);
        if columns == 0 {
            return;
        }
        let size = theme::TABLE_SIZE;
        let line_height = size * 1.3;
        let body = self.body_style(size);
        let head = TextStyle {
            color: theme::TABLE_HEADER_TEXT,
            code_color: theme::TABLE_HEADER_TEXT,
            force_bold: true,
            ..body
        };

        let widths = self.column_widths(columns, header, rows, &head, &body);
        let wrap_row = |cells: &[Vec<InlineRun>], style: &TextStyle| -> Vec<Vec<TextLine>> {
            (0..columns)
                .map(|c| {
                    let runs = cells.get(c).map(Vec::as_slice).unwrap_or(&[]);
                    wrap_runs(runs, style, widths[c] - 2.0 * TABLE_PAD)
                })
                .collect()
        };
        let row_height = |cells: &[Vec<TextLine>]| {
            let lines = cells.iter().map(Vec::len).max().unwrap_or(0).max(1);
            lines as f32 * line_height + 2.0 * TABLE_PAD
        };

        let head_cells = (!header.is_empty()).then(|| wrap_row(header, &head));
        let head_height = head_cells.as_deref().map_or(0.0, row_height);
        let body_cells: Vec<_> = rows.iter().map(|r| wrap_row(r, &body)).collect();

        let first_height = body_cells.first().map_or(0.0, |c| row_height(c));
        self.ensure(head_height + first_height);
        if let Some(cells) = &head_cells {
            self.table_row(cells, &widths, head_height, theme::TABLE_HEADER_BG, size, line_height);
        }

        for (i, cells) in body_cells.iter().enumerate() {
            let height = row_height(cells);
            if self.ensure(height) {
                if let Some(head) = &head_cells {
                    self.table_row(head, &widths, head_height, theme::TABLE_HEADER_BG, size, line_height);
                }
            }
            let fill = if i % 2 == 0 {
                theme::TABLE_ROW
            } else {
                theme::TABLE_ROW_ALT
            };
            self.table_row(cells, &widths, height, fill, size, line_height);
        }
        self.gap(TABLE_GAP);
    }

    /// Widths proportional to each column's natural single-line width,
    /// stretched to the content width.
    fn column_widths(
        &self,
        columns: usize,
        header: &[Vec<InlineRun>],
        rows: &[Vec<Vec<InlineRun>>],
        head: &TextStyle,
        body: &TextStyle,
    ) -> Vec<f32> {
        let content = self.geo.content_width();
        let natural_width = |runs: &[InlineRun], style: &TextStyle| -> f32 {
            wrap_runs(runs, style, f32::MAX)
                .first()
                .map_or(0.0, |l| l.width)
        };
        let natural: Vec<f32> = (0..columns)
            .map(|c| {
                let head_w = header.get(c).map_or(0.0, |r| natural_width(r, head));
                let body_w = rows
                    .iter()
                    .filter_map(|row| row.get(c))
                    .map(|r| natural_width(r, body))
                    .fold(0.0, f32::max);
                // Narrow pages can make the cap smaller than the floor.
                (head_w.max(body_w) + 2.0 * TABLE_PAD)
                    .max(TABLE_MIN_COL)
                    .min(content / 2.0)
            })
            .collect();
        let total: f32 = natural.iter().sum();
        if total <= 0.0 {
            return vec![content.max(0.0) / columns.max(1) as f32; columns];
        }
        natural.iter().map(|w| w / total * content).collect()
    }

    fn table_row(
        &mut self,
        cells: &[Vec<TextLine>],
        widths: &[f32],
        height: f32,
        fill: Rgb,
        size: f32,
        line_height: f32,
    ) {
        let top = self.y;
        let mut x = self.left();
        for (lines, &width) in cells.iter().zip(widths) {
            self.push(DrawOp::Rect {
                x,
                y: top,
                width,
                height,
                fill: Some(fill),
                stroke: Some((theme::TABLE_GRID, 0.5)),
            });
            for (i, line) in lines.iter().enumerate() {
                let line_top = top + TABLE_PAD + i as f32 * line_height;
                self.draw_line(line, x + TABLE_PAD, line_top, size, line_height);
            }
            x += width;
        }
        self.y += height;
    }

    fn code(&mut self, text: &str) {
        let size = theme::CODE_SIZE;
        let width = self.geo.content_width();
        let char_width = BaseFont::Courier.text_width("M", size);
        let max_chars = ((width - 2.0 * CODE_PAD) / char_width).floor() as usize;

        let text = to_winansi(text.trim_end_matches('\n'));
        let mut lines: Vec<String> = text
            .split('\n')
            .flat_map(|l| wrap_code_line(l, max_chars))
            .collect();
        if lines.is_empty() {
            lines.push(String::new());
        }

        let mut rest = lines.as_slice();
        while !rest.is_empty() {
            let fit = ((self.remaining() - 2.0 * CODE_PAD) / CODE_LINE).floor();
            let fit = if fit < 1.0 && !self.at_top() {
                self.new_page();
                continue;
            } else {
                (fit.max(1.0) as usize).min(rest.len())
            };
            let (chunk, tail) = rest.split_at(fit);
            let height = chunk.len() as f32 * CODE_LINE + 2.0 * CODE_PAD;
            self.push(DrawOp::Rect {
                x: self.left(),
                y: self.y,
                width,
                height,
                fill: Some(theme::CODE_BG),
                stroke: Some((theme::CODE_BORDER, 0.5)),
            });
            for (i, line) in chunk.iter().enumerate() {
                if line.is_empty() {
                    continue;
                }
                let top = self.y + CODE_PAD + i as f32 * CODE_LINE;
                self.push(DrawOp::Text {
                    x: self.left() + CODE_PAD,
                    y: top + (CODE_LINE - size) / 2.0 + size * 0.8,
                    size,
                    font: BaseFont::Courier,
                    color: theme::TEXT,
                    text: line.clone(),
                });
            }
            self.y += height;
            rest = tail;
            if !rest.is_empty() {
                self.new_page();
            }
        }
        self.gap(CODE_GAP);
    }

    fn diagram(&mut self, index: usize, art: &DiagramArtifact) {
        let (px_w, px_h) = (art.width().max(1) as f32, art.height().max(1) as f32);
        let mut width = self.geo.content_width() * self.config.diagram_width_fraction;
        let mut height = width * px_h / px_w;
        let max_height = self.geo.content_height() * DIAGRAM_MAX_HEIGHT;
        if height > max_height {
            height = max_height;
            width = height * px_w / px_h;
        }
        self.ensure(height);
        let x = self.left() + (self.geo.content_width() - width) / 2.0;
        self.push(DrawOp::Image {
            x,
            y: self.y,
            width,
            height,
            block: index,
        });
        self.y += height;
        self.gap(DIAGRAM_GAP);
    }

    fn rule(&mut self) {
        self.ensure(2.0 * RULE_GAP);
        self.y += RULE_GAP;
        self.push(DrawOp::Line {
            x1: self.left(),
            y1: self.y,
            x2: self.left() + self.geo.content_width(),
            y2: self.y,
            color: theme::RULE,
            width: 0.5,
        });
        self.gap(RULE_GAP);
    }

    fn footers(&mut self) {
        let total = self.pages.len();
        let size = theme::FOOTER_SIZE;
        let font = BaseFont::for_run(self.config.font, RunStyle::Plain, false);
        let baseline = self.geo.height - self.geo.margin_bottom / 2.0 + size * 0.3;
        for (i, page) in self.pages.iter_mut().enumerate() {
            let text = format!("{} / {}", i + 1, total);
            let x = (self.geo.width - font.text_width(&text, size)) / 2.0;
            page.ops.push(DrawOp::Text {
                x,
                y: baseline,
                size,
                font,
                color: theme::FOOTER,
                text,
            });
        }
    }
}
