//! Normalisation: deterministic cleanup of Markdown input before parsing.
//!
//! Files arrive from editors on every platform. Before the block parser sees
//! them we make the byte-level shape uniform so that offsets, line logic and
//! width measurement downstream never have to care where the text came from.
//!
//! ## Rule Order
//!
//! The BOM goes first (it is only meaningful at offset 0), then line endings,
//! then invisible characters, then tabs inside fenced code, and finally the
//! blank-line collapse, which relies on the earlier passes having produced
//! plain `\n` separators.

use once_cell::sync::Lazy;
use regex::Regex;

/// Apply all normalisation rules to raw Markdown input.
///
/// Rules (applied in order):
/// 1. Strip a leading byte-order mark
/// 2. Normalise line endings (CRLF and lone CR → LF)
/// 3. Strip invisible Unicode (zero-width space, inner BOM, soft hyphen, word joiner)
/// 4. Expand tabs inside fenced code to four spaces
/// 5. Collapse runs of whitespace-only lines to a single empty line
pub fn normalise_markdown(input: &str) -> String {
    let s = strip_bom(input);
    let s = normalise_line_endings(s);
    let s = remove_invisible_chars(&s);
    let s = expand_code_tabs(&s);
    collapse_blank_lines(&s)
}

// ── Rule 1: Strip BOM ────────────────────────────────────────────────────────

fn strip_bom(input: &str) -> &str {
    input.strip_prefix('\u{FEFF}').unwrap_or(input)
}

// ── Rule 2: Normalise line endings ───────────────────────────────────────────

fn normalise_line_endings(input: &str) -> String {
    input.replace("\r\n", "\n").replace('\r', "\n")
}

// ── Rule 3: Remove invisible Unicode characters ─────────────────────────────
//
// ZWJ (U+200D) is left alone: it glues multi-codepoint emoji together and the
// emoji pass in the inline formatter decides whether those survive.

fn remove_invisible_chars(input: &str) -> String {
    input.replace(['\u{200B}', '\u{FEFF}', '\u{00AD}', '\u{2060}'], "")
}

// ── Rule 4: Expand tabs in fenced code ──────────────────────────────────────

static RE_FENCE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\s{0,3}(```+|~~~+)").unwrap());

/// Tabs have no width in the base-14 fonts, so code indentation is made explicit.
fn expand_code_tabs(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut fence: Option<String> = None;

    for line in input.split_inclusive('\n') {
        if let Some(m) = RE_FENCE.captures(line) {
            let marker = &m[1];
            let closes = matches!(
                &fence,
                Some(open) if marker.starts_with(open.as_str()) && line.trim().len() == marker.len()
            );
            if fence.is_none() {
                fence = Some(marker.to_string());
            } else if closes {
                fence = None;
            }
            out.push_str(line);
            continue;
        }
        if fence.is_some() && line.contains('\t') {
            out.push_str(&line.replace('\t', "    "));
        } else {
            out.push_str(line);
        }
    }
    out
}

// ── Rule 5: Collapse blank lines ─────────────────────────────────────────────

static RE_BLANK_LINES: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n[ \t]*\n(?:[ \t]*\n)+").unwrap());

fn collapse_blank_lines(input: &str) -> String {
    // Code fences may legitimately contain several blank lines; leave those alone.
    if input.contains("```") || input.contains("~~~") {
        return input.to_string();
    }
    RE_BLANK_LINES.replace_all(input, "\n\n").to_string()
}

// ── Tests ────────────────────────────────────────────────────────────────────
