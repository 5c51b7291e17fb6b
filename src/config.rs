//! Configuration types for Markdown-to-PDF conversion.
//!
//! All conversion behaviour is controlled through [`ConversionConfig`], built
//! via its [`ConversionConfigBuilder`]. The config is immutable once built and
//! is handed unchanged to every pipeline stage and to the selected engine.

use crate::error::Md2PdfError;
use crate::progress::ProgressCallback;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Default ES-module build of Mermaid loaded by the diagram harness.
pub const DEFAULT_MERMAID_SCRIPT_URL: &str =
    "https://cdn.jsdelivr.net/npm/mermaid@11/dist/mermaid.esm.min.mjs";

/// Title used when neither the caller nor the file name provides one.
pub const DEFAULT_TITLE: &str = "Document";

const MM_TO_PT: f32 = 72.0 / 25.4;

/// Configuration for a Markdown-to-PDF conversion.
///
/// Built via [`ConversionConfig::builder()`] or using
/// [`ConversionConfig::default()`].
///
/// # Example
/// ```rust
/// use md2pdf_mermaid::{ConversionConfig, DiagramTheme, Orientation, PageSize};
///
/// let config = ConversionConfig::builder()
///     .page_size(PageSize::Letter)
///     .orientation(Orientation::Landscape)
///     .diagram_theme(DiagramTheme::Forest)
///     .diagram_scale(3)
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct ConversionConfig {
    /// Document title written to the PDF metadata. Default: "Document".
    pub title: String,

    /// Paper size. Default: A4.
    pub page_size: PageSize,

    /// Paper orientation. Default: portrait.
    pub orientation: Orientation,

    /// Page margins in millimetres. Default: 20 mm on every side.
    pub margins: Margins,

    /// Body font family (one of the PDF base-14 families). Default: Helvetica.
    ///
    /// Code is always set in Courier regardless of this choice.
    pub font: FontChoice,

    /// Draw a centred "N / T" page number in the footer of every page. Default: true.
    pub page_numbers: bool,

    /// Render fenced `mermaid` blocks as images. Default: true.
    ///
    /// When false, no browser is launched and every diagram is shown as a code
    /// listing of its source.
    pub mermaid: bool,

    /// Mermaid theme passed to `mermaid.initialize`. Default: [`DiagramTheme::Default`].
    pub diagram_theme: DiagramTheme,

    /// Device scale factor for diagram screenshots, 1–4. Default: 2.
    ///
    /// The virtual canvas is `diagram_canvas × diagram_scale` physical pixels;
    /// higher values produce sharper diagrams and larger PDFs.
    pub diagram_scale: u32,

    /// Base canvas (browser viewport) in CSS pixels. Default: 1400 × 1000.
    pub diagram_canvas: (u32, u32),

    /// Fraction of the content width a diagram image occupies. Default: 0.9.
    pub diagram_width_fraction: f32,

    /// Maximum wait for one diagram to finish drawing, in seconds. Default: 15.
    pub diagram_timeout_secs: u64,

    /// URL of the Mermaid ES module loaded by the harness page.
    pub mermaid_script_url: String,

    /// PDF backend. Default: [`EngineKind::Layout`].
    pub engine: EngineKind,

    /// What to do with emoji and pictographs. Default: [`EmojiPolicy::Strip`].
    ///
    /// The layout engine uses the base-14 fonts, which cannot draw emoji, so
    /// stripping keeps the output free of placeholder glyphs. The HTML engine
    /// renders emoji natively and is usually paired with `Keep`.
    pub emoji: EmojiPolicy,

    /// Explicit Chrome/Chromium executable. If None, the usual install
    /// locations and `CHROME` env var are searched.
    pub chrome_path: Option<PathBuf>,

    /// Optional per-diagram progress callback.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for ConversionConfig {
    fn default() -> Self {
        Self {
            title: DEFAULT_TITLE.to_string(),
            page_size: PageSize::default(),
            orientation: Orientation::default(),
            margins: Margins::default(),
            font: FontChoice::default(),
            page_numbers: true,
            mermaid: true,
            diagram_theme: DiagramTheme::default(),
            diagram_scale: 2,
            diagram_canvas: (1400, 1000),
            diagram_width_fraction: 0.9,
            diagram_timeout_secs: 15,
            mermaid_script_url: DEFAULT_MERMAID_SCRIPT_URL.to_string(),
            engine: EngineKind::default(),
            emoji: EmojiPolicy::default(),
            chrome_path: None,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for ConversionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConversionConfig")
            .field("title", &self.title)
            .field("page_size", &self.page_size)
            .field("orientation", &self.orientation)
            .field("margins", &self.margins)
            .field("font", &self.font)
            .field("page_numbers", &self.page_numbers)
            .field("mermaid", &self.mermaid)
            .field("diagram_theme", &self.diagram_theme)
            .field("diagram_scale", &self.diagram_scale)
            .field("diagram_canvas", &self.diagram_canvas)
            .field("diagram_width_fraction", &self.diagram_width_fraction)
            .field("diagram_timeout_secs", &self.diagram_timeout_secs)
            .field("engine", &self.engine)
            .field("emoji", &self.emoji)
            .field("chrome_path", &self.chrome_path)
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<dyn ConversionProgressCallback>"),
            )
            .finish()
    }
}

impl ConversionConfig {
    /// Create a new builder for `ConversionConfig`.
    pub fn builder() -> ConversionConfigBuilder {
        ConversionConfigBuilder {
            config: Self::default(),
        }
    }

    /// Page width and height in points after applying the orientation.
    pub fn page_dimensions_pt(&self) -> (f32, f32) {
        let (w, h) = self.page_size.portrait_pt();
        match self.orientation {
            Orientation::Portrait => (w, h),
            Orientation::Landscape => (h, w),
        }
    }

    /// Check the constraints the builder enforces.
    ///
    /// Conversions call this too, since the fields are public and a config
    /// may be assembled without the builder.
    pub fn validate(&self) -> Result<(), Md2PdfError> {
        if !(1..=4).contains(&self.diagram_scale) {
            return Err(Md2PdfError::InvalidConfig(format!(
                "Diagram scale must be 1–4, got {}",
                self.diagram_scale
            )));
        }
        if self.diagram_timeout_secs == 0 {
            return Err(Md2PdfError::InvalidConfig(
                "Diagram timeout must be ≥ 1 second".into(),
            ));
        }
        if !(self.diagram_width_fraction > 0.0 && self.diagram_width_fraction <= 1.0) {
            return Err(Md2PdfError::InvalidConfig(format!(
                "Diagram width fraction must be in (0, 1], got {}",
                self.diagram_width_fraction
            )));
        }
        if self.diagram_canvas.0 == 0 || self.diagram_canvas.1 == 0 {
            return Err(Md2PdfError::InvalidConfig(format!(
                "Diagram canvas must be non-empty, got {:?}",
                self.diagram_canvas
            )));
        }
        let m = self.margins;
        if [m.top, m.right, m.bottom, m.left].iter().any(|v| !v.is_finite() || *v < 0.0) {
            return Err(Md2PdfError::InvalidConfig(format!(
                "Margins must be finite and non-negative, got {:?}",
                self.margins
            )));
        }
        let (width, height) = self.page_dimensions_pt();
        let m = m.to_pt();
        // Leave at least 50 mm of content in each direction.
        let min_content = 50.0 * MM_TO_PT;
        if width - m.left - m.right < min_content || height - m.top - m.bottom < min_content {
            return Err(Md2PdfError::InvalidConfig(format!(
                "Margins {:?} leave too little room on a {:?} {:?} page",
                self.margins, self.page_size, self.orientation
            )));
        }
        Ok(())
    }
}

/// Builder for [`ConversionConfig`].
#[derive(Debug)]
pub struct ConversionConfigBuilder {
    config: ConversionConfig,
}

impl ConversionConfigBuilder {
    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.config.title = title.into();
        self
    }

    pub fn page_size(mut self, size: PageSize) -> Self {
        self.config.page_size = size;
        self
    }

    pub fn orientation(mut self, orientation: Orientation) -> Self {
        self.config.orientation = orientation;
        self
    }

    pub fn margins(mut self, margins: Margins) -> Self {
        self.config.margins = margins;
        self
    }

    pub fn font(mut self, font: FontChoice) -> Self {
        self.config.font = font;
        self
    }

    pub fn page_numbers(mut self, v: bool) -> Self {
        self.config.page_numbers = v;
        self
    }

    pub fn mermaid(mut self, v: bool) -> Self {
        self.config.mermaid = v;
        self
    }

    pub fn diagram_theme(mut self, theme: DiagramTheme) -> Self {
        self.config.diagram_theme = theme;
        self
    }

    pub fn diagram_scale(mut self, scale: u32) -> Self {
        self.config.diagram_scale = scale.clamp(1, 4);
        self
    }

    pub fn diagram_canvas(mut self, width: u32, height: u32) -> Self {
        self.config.diagram_canvas = (width.max(100), height.max(100));
        self
    }

    pub fn diagram_width_fraction(mut self, fraction: f32) -> Self {
        self.config.diagram_width_fraction = fraction.clamp(0.1, 1.0);
        self
    }

    pub fn diagram_timeout_secs(mut self, secs: u64) -> Self {
        self.config.diagram_timeout_secs = secs;
        self
    }

    pub fn mermaid_script_url(mut self, url: impl Into<String>) -> Self {
        self.config.mermaid_script_url = url.into();
        self
    }

    pub fn engine(mut self, engine: EngineKind) -> Self {
        self.config.engine = engine;
        self
    }

    pub fn emoji(mut self, policy: EmojiPolicy) -> Self {
        self.config.emoji = policy;
        self
    }

    pub fn chrome_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.chrome_path = Some(path.into());
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ConversionConfig, Md2PdfError> {
        self.config.validate()?;
        Ok(self.config)
    }
}

// ── Enums ────────────────────────────────────────────────────────────────

/// Paper size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "cli", derive(clap::ValueEnum))]
#[serde(rename_all = "lowercase")]
pub enum PageSize {
    /// 210 × 297 mm (default)
    #[default]
    A4,
    /// 297 × 420 mm
    A3,
    /// 8.5 × 11 in
    Letter,
}

impl PageSize {
    /// Portrait width and height in points.
    pub fn portrait_pt(self) -> (f32, f32) {
        match self {
            PageSize::A4 => (595.28, 841.89),
            PageSize::A3 => (841.89, 1190.55),
            PageSize::Letter => (612.0, 792.0),
        }
    }

    /// Paper name understood by CSS `@page { size: … }`.
    pub fn css_name(self) -> &'static str {
        match self {
            PageSize::A4 => "A4",
            PageSize::A3 => "A3",
            PageSize::Letter => "Letter",
        }
    }
}

/// Paper orientation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "cli", derive(clap::ValueEnum))]
#[serde(rename_all = "lowercase")]
pub enum Orientation {
    #[default]
    Portrait,
    Landscape,
}

/// Page margins in millimetres.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Margins {
    pub top: f32,
    pub right: f32,
    pub bottom: f32,
    pub left: f32,
}

impl Margins {
    /// The same margin on all four sides.
    pub fn uniform(mm: f32) -> Self {
        let mm = mm.max(0.0);
        Self {
            top: mm,
            right: mm,
            bottom: mm,
            left: mm,
        }
    }

    /// The margins converted to points.
    pub fn to_pt(self) -> Margins {
        Margins {
            top: self.top * MM_TO_PT,
            right: self.right * MM_TO_PT,
            bottom: self.bottom * MM_TO_PT,
            left: self.left * MM_TO_PT,
        }
    }
}

impl Default for Margins {
    fn default() -> Self {
        Self::uniform(20.0)
    }
}

/// Body font family. All three are PDF base-14 fonts, so nothing is embedded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "cli", derive(clap::ValueEnum))]
#[serde(rename_all = "lowercase")]
pub enum FontChoice {
    #[default]
    Helvetica,
    Times,
    Courier,
}

/// Mermaid colour theme.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "cli", derive(clap::ValueEnum))]
#[serde(rename_all = "lowercase")]
pub enum DiagramTheme {
    #[default]
    Default,
    Neutral,
    Dark,
    Forest,
    Base,
}

impl DiagramTheme {
    /// Theme name as Mermaid expects it.
    pub fn as_str(self) -> &'static str {
        match self {
            DiagramTheme::Default => "default",
            DiagramTheme::Neutral => "neutral",
            DiagramTheme::Dark => "dark",
            DiagramTheme::Forest => "forest",
            DiagramTheme::Base => "base",
        }
    }
}

/// Which PDF backend writes the output.
///
/// | Engine | Unicode/emoji | Needs a browser |
/// |--------|---------------|-----------------|
/// | `Layout` | WinAnsi only (base-14 fonts) | only for diagrams |
/// | `Html`   | full, native colour emoji     | always |
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "cli", derive(clap::ValueEnum))]
#[serde(rename_all = "lowercase")]
pub enum EngineKind {
    /// Flow layout drawn directly with printpdf. (default)
    #[default]
    Layout,
    /// Styled HTML printed to PDF by headless Chrome.
    Html,
}

/// Emoji handling in text runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "cli", derive(clap::ValueEnum))]
#[serde(rename_all = "lowercase")]
pub enum EmojiPolicy {
    /// Remove emoji and pictographs, keep simple symbols (arrows, ✓, ★). (default)
    #[default]
    Strip,
    /// Leave every character untouched.
    Keep,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let c = ConversionConfig::default();
        assert_eq!(c.page_size, PageSize::A4);
        assert_eq!(c.orientation, Orientation::Portrait);
        assert_eq!(c.diagram_scale, 2);
        assert!((c.diagram_width_fraction - 0.9).abs() < f32::EPSILON);
        assert!(c.mermaid);
        assert!(c.page_numbers);
        assert_eq!(c.engine, EngineKind::Layout);
    }

    #[test]
    fn builder_clamps_scale() {
        let c = ConversionConfig::builder().diagram_scale(9).build().unwrap();
        assert_eq!(c.diagram_scale, 4);
        let c = ConversionConfig::builder().diagram_scale(0).build().unwrap();
        assert_eq!(c.diagram_scale, 1);
    }

    #[test]
    fn landscape_swaps_dimensions() {
        let c = ConversionConfig::builder()
            .page_size(PageSize::Letter)
            .orientation(Orientation::Landscape)
            .build()
            .unwrap();
        assert_eq!(c.page_dimensions_pt(), (792.0, 612.0));
    }

    #[test]
    fn negative_margins_rejected() {
        let c = ConversionConfig {
            margins: Margins {
                top: 20.0,
                right: -5.0,
                bottom: 20.0,
                left: 20.0,
            },
            ..Default::default()
        };
        assert!(matches!(c.validate(), Err(Md2PdfError::InvalidConfig(_))));
    }

    #[test]
    fn struct_literal_configs_are_validated() {
        assert!(ConversionConfig::default().validate().is_ok());
        let c = ConversionConfig {
            margins: Margins::uniform(95.0),
            ..Default::default()
        };
        assert!(matches!(c.validate(), Err(Md2PdfError::InvalidConfig(_))));
        let c = ConversionConfig {
            diagram_scale: 0,
            ..Default::default()
        };
        assert!(c.validate().is_err());
        let c = ConversionConfig {
            diagram_width_fraction: 0.0,
            ..Default::default()
        };
        assert!(c.validate().is_err());
    }

    #[test]
    fn oversized_margins_rejected() {
        let err = ConversionConfig::builder()
            .margins(Margins::uniform(100.0))
            .build()
            .unwrap_err();
        assert!(matches!(err, Md2PdfError::InvalidConfig(_)));
    }

    #[test]
    fn zero_timeout_rejected() {
        let err = ConversionConfig::builder()
            .diagram_timeout_secs(0)
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("timeout"));
    }

    #[test]
    fn theme_names() {
        assert_eq!(DiagramTheme::Default.as_str(), "default");
        assert_eq!(DiagramTheme::Forest.as_str(), "forest");
        let json = serde_json::to_string(&DiagramTheme::Neutral).unwrap();
        assert_eq!(json, "\"neutral\"");
    }

    #[test]
    fn debug_hides_callback() {
        let dbg = format!("{:?}", ConversionConfig::default());
        assert!(dbg.contains("ConversionConfig"));
        assert!(dbg.contains("progress_callback: None"));
    }
}
