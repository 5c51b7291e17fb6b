//! CLI binary for md2pdf-mermaid.
//!
//! A thin shim over the library crate that maps CLI flags
//! to `ConversionConfig` and prints results.

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use md2pdf_mermaid::pipeline::input::{default_output, read_markdown};
use md2pdf_mermaid::{
    convert_file, inspect, ConversionConfig, ConversionProgressCallback, ConversionReport, DiagramTheme,
    EmojiPolicy, EngineKind, FontChoice, Margins, Orientation, PageSize, ProgressCallback,
};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

const TICKS: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"];

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal progress callback: a bar over the document's diagrams plus one
/// log line per diagram.
struct CliProgressCallback {
    bar: ProgressBar,
    /// Start of the diagram currently in the browser.
    started: Mutex<Option<Instant>>,
    errors: AtomicUsize,
}

impl CliProgressCallback {
    fn new_dynamic() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        let spinner_style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(TICKS);
        bar.set_style(spinner_style);
        bar.set_prefix("Preparing");
        bar.set_message("Parsing Markdown…");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            started: Mutex::new(None),
            errors: AtomicUsize::new(0),
        })
    }

    fn activate_bar(&self, total: usize) {
        let progress_style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>3}/{len} diagrams  \
             ⏱ {elapsed_precise}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(TICKS);

        self.bar.set_length(total as u64);
        self.bar.set_style(progress_style);
        self.bar.set_prefix("Rendering");
    }

    fn elapsed(&self) -> String {
        let secs = self
            .started
            .lock()
            .ok()
            .and_then(|mut s| s.take())
            .map(|t| t.elapsed().as_secs_f64())
            .unwrap_or(0.0);
        dim(&format!("{secs:.1}s"))
    }
}

impl ConversionProgressCallback for CliProgressCallback {
    fn on_conversion_start(&self, total_diagrams: usize) {
        if total_diagrams == 0 {
            self.bar.set_message("Writing PDF…");
            return;
        }
        self.activate_bar(total_diagrams);
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!("Rendering {total_diagrams} Mermaid diagram(s)…"))
        ));
    }

    fn on_diagram_start(&self, index: usize, _total: usize) {
        if let Ok(mut s) = self.started.lock() {
            *s = Some(Instant::now());
        }
        self.bar.set_message(format!("diagram {index}"));
    }

    fn on_diagram_complete(&self, index: usize, total: usize, width: u32, height: u32) {
        self.bar.println(format!(
            "  {} Diagram {:>3}/{:<3}  {:<12}  {}",
            green("✓"),
            index,
            total,
            dim(&format!("{width}×{height} px")),
            self.elapsed(),
        ));
        self.bar.inc(1);
    }

    fn on_diagram_error(&self, index: usize, total: usize, error: &str) {
        self.errors.fetch_add(1, Ordering::SeqCst);
        let msg = if error.chars().count() > 80 {
            format!("{}\u{2026}", error.chars().take(79).collect::<String>())
        } else {
            error.to_string()
        };
        self.bar.println(format!(
            "  {} Diagram {:>3}/{:<3}  {}  {}",
            red("✗"),
            index,
            total,
            red(&msg),
            self.elapsed(),
        ));
        self.bar.inc(1);
    }

    fn on_conversion_complete(&self, _total_diagrams: usize, _rendered: usize) {
        self.bar.finish_and_clear();
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Basic conversion (writes README.pdf next to the input)
  md2pdf README.md

  # Choose the output file and title
  md2pdf notes.md -o build/notes.pdf --title "Release Notes"

  # US Letter, landscape, 15 mm margins, serif body text
  md2pdf --page-size letter --orientation landscape --margin 15 --font times report.md

  # Sharper diagrams with the forest theme
  md2pdf --scale 3 --theme forest architecture.md

  # Full Unicode and colour emoji through Chrome's print engine
  md2pdf --engine html --emoji keep chat-log.md

  # Skip diagram rendering (diagrams are shown as source)
  md2pdf --no-mermaid draft.md

  # Inspect document structure without rendering
  md2pdf --inspect-only --json README.md

ENGINES:
  Engine   Text                        Needs Chrome
  ───────  ──────────────────────────  ───────────────────
  layout   Latin-1 via base-14 fonts   only for diagrams (default)
  html     full Unicode, colour emoji  always

ENVIRONMENT VARIABLES:
  MD2PDF_*     Every flag can be set through its MD2PDF_ variable
  CHROME       Path to a Chrome/Chromium executable
  RUST_LOG     Override the log filter (e.g. md2pdf_mermaid=debug)

SETUP:
  Diagrams and the html engine need Chrome or Chromium. Without a browser,
  conversion still succeeds and each diagram is printed as its source.
"#;

/// Convert Markdown files with Mermaid diagrams to PDF.
#[derive(Parser, Debug)]
#[command(
    name = "md2pdf",
    version,
    about = "Convert Markdown files with Mermaid diagrams to PDF",
    long_about = "Convert Markdown documents to styled PDF files. Fenced ```mermaid blocks are \
rendered as diagrams through headless Chrome; everything else is laid out natively.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Markdown file to convert.
    input: PathBuf,

    /// Write the PDF here instead of next to the input.
    #[arg(short, long, env = "MD2PDF_OUTPUT")]
    output: Option<PathBuf>,

    /// Document title for the PDF metadata. Default: the input file name.
    #[arg(long, env = "MD2PDF_TITLE")]
    title: Option<String>,

    /// Paper size.
    #[arg(long, env = "MD2PDF_PAGE_SIZE", value_enum, default_value = "a4")]
    page_size: PageSize,

    /// Paper orientation.
    #[arg(long, env = "MD2PDF_ORIENTATION", value_enum, default_value = "portrait")]
    orientation: Orientation,

    /// Margin on every side, in millimetres.
    #[arg(long, env = "MD2PDF_MARGIN", default_value_t = 20.0)]
    margin: f32,

    /// Body font family.
    #[arg(long, env = "MD2PDF_FONT", value_enum, default_value = "helvetica")]
    font: FontChoice,

    /// Mermaid theme.
    #[arg(long, env = "MD2PDF_THEME", value_enum, default_value = "default")]
    theme: DiagramTheme,

    /// Diagram resolution multiplier (1–4).
    #[arg(long, env = "MD2PDF_SCALE", default_value_t = 2,
          value_parser = clap::value_parser!(u32).range(1..=4))]
    scale: u32,

    /// Show diagrams as source instead of rendering them.
    #[arg(long, env = "MD2PDF_NO_MERMAID")]
    no_mermaid: bool,

    /// PDF backend.
    #[arg(long, env = "MD2PDF_ENGINE", value_enum, default_value = "layout")]
    engine: EngineKind,

    /// Omit the "N / T" page footer.
    #[arg(long, env = "MD2PDF_NO_PAGE_NUMBERS")]
    no_page_numbers: bool,

    /// Emoji handling: strip (default) or keep.
    #[arg(long, env = "MD2PDF_EMOJI", value_enum, default_value = "strip")]
    emoji: EmojiPolicy,

    /// Chrome/Chromium executable. Default: search the usual locations.
    #[arg(long, env = "MD2PDF_CHROME_PATH")]
    chrome_path: Option<PathBuf>,

    /// Seconds to wait for one diagram before giving up.
    #[arg(long, env = "MD2PDF_DIAGRAM_TIMEOUT", default_value_t = 15,
          value_parser = clap::value_parser!(u64).range(1..))]
    diagram_timeout: u64,

    /// Print the conversion report as JSON on stdout.
    #[arg(long, env = "MD2PDF_JSON")]
    json: bool,

    /// Print document structure only, no conversion.
    #[arg(long)]
    inspect_only: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "MD2PDF_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "MD2PDF_QUIET")]
    quiet: bool,

    /// Disable progress bar.
    #[arg(long, env = "MD2PDF_NO_PROGRESS")]
    no_progress: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // Library INFO logs would interleave with the progress bar.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json && !cli.inspect_only;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)))
        .with_writer(io::stderr)
        .init();

    // ── Inspect-only mode ────────────────────────────────────────────────
    if cli.inspect_only {
        let markdown = read_markdown(&cli.input).context("Failed to read input")?;
        let summary = inspect(&markdown);
        if cli.json {
            println!(
                "{}",
                serde_json::to_string_pretty(&summary).context("Failed to serialise summary")?
            );
        } else {
            println!("File:         {}", cli.input.display());
            if let Some(ref t) = summary.title {
                println!("Title:        {t}");
            }
            println!("Blocks:       {}", summary.blocks);
            for (kind, count) in &summary.counts {
                println!("  {kind:<12} {count}");
            }
            println!("Diagrams:     {}", summary.mermaid_diagrams);
        }
        return Ok(());
    }

    // ── Build config ─────────────────────────────────────────────────────
    let progress_cb: Option<ProgressCallback> = if show_progress {
        let cb = CliProgressCallback::new_dynamic();
        Some(cb as Arc<dyn ConversionProgressCallback>)
    } else {
        None
    };
    let config = build_config(&cli, progress_cb)?;

    // ── Run conversion ───────────────────────────────────────────────────
    let output_path = cli.output.clone().unwrap_or_else(|| default_output(&cli.input));
    let input = cli.input.clone();
    let target = output_path.clone();
    let report = tokio::task::spawn_blocking(move || convert_file(&input, Some(&target), &config))
        .await
        .context("Conversion task panicked")?
        .context("Conversion failed")?;

    if cli.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&report).context("Failed to serialise report")?
        );
    } else if !cli.quiet {
        print_summary(&report, &output_path);
    }

    Ok(())
}

/// Map CLI args to `ConversionConfig`.
fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<ConversionConfig> {
    let mut builder = ConversionConfig::builder()
        .page_size(cli.page_size)
        .orientation(cli.orientation)
        .margins(Margins::uniform(cli.margin))
        .font(cli.font)
        .page_numbers(!cli.no_page_numbers)
        .mermaid(!cli.no_mermaid)
        .diagram_theme(cli.theme)
        .diagram_scale(cli.scale)
        .diagram_timeout_secs(cli.diagram_timeout)
        .engine(cli.engine)
        .emoji(cli.emoji);

    if let Some(ref title) = cli.title {
        builder = builder.title(title.clone());
    }
    if let Some(ref path) = cli.chrome_path {
        builder = builder.chrome_path(path.clone());
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}

fn print_summary(report: &ConversionReport, output_path: &Path) {
    let pages = report
        .pages
        .map(|p| format!("{p} page{}", if p == 1 { "" } else { "s" }))
        .unwrap_or_else(|| "PDF".to_string());
    eprintln!(
        "{}  {}  {}  {}ms  →  {}",
        if report.diagrams_rendered == report.diagrams_found {
            green("✔")
        } else {
            cyan("⚠")
        },
        pages,
        dim(&human_size(report.pdf_bytes)),
        report.duration_ms,
        bold(&output_path.display().to_string()),
    );

    if report.diagrams_found > 0 {
        eprintln!(
            "   [OK] Rendered {}/{} Mermaid diagrams",
            report.diagrams_rendered, report.diagrams_found
        );
    }
    if report.browser_missing() {
        eprintln!(
            "   {} Chrome/Chromium could not be started, so diagrams are shown as source.\n   \
             Install Chrome or pass --chrome-path.",
            cyan("note:")
        );
    }
}

fn human_size(bytes: usize) -> String {
    const KB: f64 = 1024.0;
    let b = bytes as f64;
    if b < KB {
        format!("{bytes} B")
    } else if b < KB * KB {
        format!("{:.1} KB", b / KB)
    } else {
        format!("{:.1} MB", b / (KB * KB))
    }
}
