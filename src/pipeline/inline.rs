//! Inline formatting: raw inline Markdown → styled [`InlineRun`]s.
//!
//! [`format_inline`] is the one routine every writer uses for headings,
//! paragraphs, list items and table cells, so `**bold**` or `` `code` `` look
//! the same wherever they appear.
//!
//! ## Passes
//!
//! 1. Join soft and hard line breaks into single spaces
//! 2. Lift code spans (and any private-use characters already in the text)
//!    out into placeholders so nothing below touches them
//! 3. Rewrite links and images to their visible text, drop inline HTML tags
//! 4. Strip emoji (when the policy says so)
//! 5. Match `*`/`_` delimiter runs into bold/italic spans
//! 6. Decode HTML entities and merge adjacent runs of the same style

use crate::config::EmojiPolicy;
use crate::model::{InlineRun, RunStyle};
use once_cell::sync::Lazy;
use regex::Regex;

/// Format raw inline Markdown into runs.
///
/// Never fails: unmatched markers stay as literal text.
pub fn format_inline(raw: &str, emoji: EmojiPolicy) -> Vec<InlineRun> {
    let joined = join_lines(raw);
    let (text, spans) = extract_code_spans(&joined);
    let text = rewrite_links(&text);
    let text = RE_INLINE_TAG.replace_all(&text, "");
    let (text, spans) = match emoji {
        EmojiPolicy::Strip => (
            strip_emoji(&text),
            spans
                .into_iter()
                .map(|span| match span {
                    Span::Code(code) => Span::Code(strip_emoji(&code)),
                    literal => literal,
                })
                .collect(),
        ),
        EmojiPolicy::Keep => (text.into_owned(), spans),
    };

    let tokens = tokenize(&text, &spans);
    let runs = resolve_emphasis(tokens);
    finish_runs(runs)
}

// ── Pass 1: line breaks ──────────────────────────────────────────────────

fn join_lines(raw: &str) -> String {
    let lines: Vec<&str> = raw.lines().collect();
    let last = lines.len().saturating_sub(1);
    lines
        .iter()
        .enumerate()
        .map(|(i, line)| {
            let line = line.trim();
            // Backslash hard break.
            match line.strip_suffix('\\') {
                Some(rest) if i < last && !rest.ends_with('\\') => rest.trim_end(),
                _ => line,
            }
        })
        .filter(|l| !l.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

// ── Pass 2: code spans ───────────────────────────────────────────────────

const PLACEHOLDER_BASE: u32 = 0xE000;
const PLACEHOLDER_LAST: u32 = 0xF8FF;

/// What a placeholder stands for.
enum Span {
    Code(String),
    /// A private-use character from the input, restored verbatim.
    Literal(char),
}

fn is_private_use(c: char) -> bool {
    (PLACEHOLDER_BASE..=PLACEHOLDER_LAST).contains(&(c as u32))
}

fn placeholder(index: usize) -> Option<char> {
    let cp = PLACEHOLDER_BASE.checked_add(u32::try_from(index).ok()?)?;
    if cp > PLACEHOLDER_LAST {
        return None;
    }
    char::from_u32(cp)
}

fn placeholder_index(c: char, spans: &[Span]) -> Option<usize> {
    if !is_private_use(c) {
        return None;
    }
    let idx = (c as u32 - PLACEHOLDER_BASE) as usize;
    (idx < spans.len()).then_some(idx)
}

/// Replace each code span with a private-use placeholder character and
/// return the spans in order.
///
/// Private-use characters already present are placeholdered too, so every
/// private-use character in the output is one of ours.
fn extract_code_spans(s: &str) -> (String, Vec<Span>) {
    let chars: Vec<char> = s.chars().collect();
    let mut out = String::with_capacity(s.len());
    let mut spans = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        if is_private_use(c) {
            // Past the last placeholder the character cannot be told apart
            // from one, so it is dropped.
            if let Some(ph) = placeholder(spans.len()) {
                spans.push(Span::Literal(c));
                out.push(ph);
            }
            i += 1;
            continue;
        }
        if c == '\\' && i + 1 < chars.len() && !is_private_use(chars[i + 1]) {
            out.push(c);
            out.push(chars[i + 1]);
            i += 2;
            continue;
        }
        if c != '`' {
            out.push(c);
            i += 1;
            continue;
        }

        let open_len = run_length(&chars, i, '`');
        let content_start = i + open_len;
        let mut j = content_start;
        let mut close = None;
        while j < chars.len() {
            if chars[j] == '`' {
                let len = run_length(&chars, j, '`');
                if len == open_len {
                    close = Some(j);
                    break;
                }
                j += len;
            } else {
                j += 1;
            }
        }

        match (close, placeholder(spans.len())) {
            (Some(end), Some(ph)) => {
                let content: String = chars[content_start..end].iter().collect();
                spans.push(Span::Code(trim_code_padding(&content)));
                out.push(ph);
                i = end + open_len;
            }
            _ => {
                // Unterminated: the backticks are literal.
                for _ in 0..open_len {
                    out.push('`');
                }
                i = content_start;
            }
        }
    }
    (out, spans)
}

fn run_length(chars: &[char], start: usize, c: char) -> usize {
    chars[start..].iter().take_while(|&&x| x == c).count()
}

fn trim_code_padding(content: &str) -> String {
    if content.len() >= 2
        && content.starts_with(' ')
        && content.ends_with(' ')
        && !content.trim().is_empty()
    {
        content[1..content.len() - 1].to_string()
    } else {
        content.to_string()
    }
}

// ── Pass 3: links, images and inline HTML ────────────────────────────────

static RE_LINK: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"!?\[([^\]]*)\](?:\(\s*<?(?:[^()\s>]|\([^()\s]*\))*>?(?:\s+["'(][^)]*["')])?\s*\)|\[[^\]]*\])"#)
        .unwrap()
});

static RE_AUTOLINK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"<((?:https?|ftp|mailto):[^<>\s]+|[^<>\s@]+@[^<>\s@]+\.[^<>\s@]+)>").unwrap());

static RE_INLINE_TAG: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"</?[A-Za-z][A-Za-z0-9-]*(?:\s[^<>]*)?/?>|<!--.*?-->").unwrap());

/// Links and images keep only their visible text; the target is discarded.
fn rewrite_links(s: &str) -> String {
    let s = RE_LINK.replace_all(s, "$1");
    RE_AUTOLINK.replace_all(&s, "$1").into_owned()
}

// ── Pass 4: emoji ────────────────────────────────────────────────────────

/// Remove emoji and pictographs that the base-14 PDF fonts cannot draw.
///
/// Common symbols that merely sit in emoji blocks (arrows, ✓, ✗, ☐, ★,
/// basic shapes and a few maths signs) are kept. A space left doubled by a
/// removal is dropped.
pub fn strip_emoji(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut removed = false;
    for c in text.chars() {
        if is_emoji(c) && !is_simple_symbol(c) {
            removed = true;
            continue;
        }
        if c == ' ' && removed && (out.is_empty() || out.ends_with(' ')) {
            continue;
        }
        removed = false;
        out.push(c);
    }
    if removed {
        let trimmed = out.trim_end_matches(' ').len();
        out.truncate(trimmed);
    }
    out
}

fn is_emoji(c: char) -> bool {
    matches!(c as u32,
        0x1F300..=0x1F9FF   // pictographs, emoticons, transport, supplemental
        | 0x1FA70..=0x1FAFF // symbols and pictographs extended-A
        | 0x1F1E6..=0x1F1FF // regional indicators (flags)
        | 0x2600..=0x26FF   // miscellaneous symbols
        | 0x2700..=0x27BF   // dingbats
        | 0x2300..=0x23FF   // miscellaneous technical
        | 0xFE00..=0xFE0F   // variation selectors
        | 0x200D            // zero width joiner
    )
}

fn is_simple_symbol(c: char) -> bool {
    matches!(c as u32,
        0x2190..=0x2195
        | 0x21D0..=0x21D5
        | 0x2934..=0x2935
        | 0x2B05..=0x2B07
        | 0x00D7 | 0x00F7 | 0x2212 | 0x2260 | 0x2264 | 0x2265 | 0x221E
        | 0x2713 | 0x2714 | 0x2717 | 0x2718
        | 0x2610..=0x2612
        | 0x2605 | 0x2606
        | 0x25A0 | 0x25A1 | 0x25B2 | 0x25B3 | 0x25BC | 0x25BD | 0x25C6 | 0x25C7
    )
}

// ── Pass 5: emphasis ─────────────────────────────────────────────────────

enum Token {
    Text(String),
    Code(String),
    Delim(Delim),
}

struct Delim {
    ch: char,
    /// Characters not yet consumed by a match; printed literally.
    remaining: usize,
    can_open: bool,
    can_close: bool,
    opens_bold: usize,
    opens_italic: usize,
    closes_bold: usize,
    closes_italic: usize,
}

fn tokenize(text: &str, spans: &[Span]) -> Vec<Token> {
    let chars: Vec<char> = text.chars().collect();
    let mut tokens = Vec::new();
    let mut buf = String::new();
    let mut i = 0;

    let flush = |buf: &mut String, tokens: &mut Vec<Token>| {
        if !buf.is_empty() {
            tokens.push(Token::Text(std::mem::take(buf)));
        }
    };

    while i < chars.len() {
        let c = chars[i];
        if c == '\\' {
            match chars.get(i + 1) {
                Some(&next) if next.is_ascii_punctuation() => {
                    buf.push(next);
                    i += 2;
                }
                _ => {
                    buf.push(c);
                    i += 1;
                }
            }
            continue;
        }
        if let Some(idx) = placeholder_index(c, spans) {
            match &spans[idx] {
                Span::Code(code) => {
                    flush(&mut buf, &mut tokens);
                    tokens.push(Token::Code(code.clone()));
                }
                Span::Literal(ch) => buf.push(*ch),
            }
            i += 1;
            continue;
        }
        if c == '*' || c == '_' {
            flush(&mut buf, &mut tokens);
            let len = run_length(&chars, i, c);
            let before = if i == 0 { None } else { Some(chars[i - 1]) };
            let after = chars.get(i + len).copied();
            let (can_open, can_close) = flanking(c, before, after);
            tokens.push(Token::Delim(Delim {
                ch: c,
                remaining: len,
                can_open,
                can_close,
                opens_bold: 0,
                opens_italic: 0,
                closes_bold: 0,
                closes_italic: 0,
            }));
            i += len;
            continue;
        }
        buf.push(c);
        i += 1;
    }
    flush(&mut buf, &mut tokens);
    tokens
}

fn is_punct(c: char) -> bool {
    c.is_ascii_punctuation() || (!c.is_alphanumeric() && !c.is_whitespace() && !c.is_ascii())
}

/// CommonMark left/right-flanking rules, with `_` barred from intraword use.
fn flanking(ch: char, before: Option<char>, after: Option<char>) -> (bool, bool) {
    let before_ws = before.is_none_or(char::is_whitespace);
    let after_ws = after.is_none_or(char::is_whitespace);
    let before_punct = before.is_some_and(is_punct);
    let after_punct = after.is_some_and(is_punct);

    let left = !after_ws && (!after_punct || before_ws || before_punct);
    let right = !before_ws && (!before_punct || after_ws || after_punct);

    if ch == '_' {
        (left && (!right || before_punct), right && (!left || after_punct))
    } else {
        (left, right)
    }
}

fn resolve_emphasis(mut tokens: Vec<Token>) -> Vec<InlineRun> {
    for j in 0..tokens.len() {
        loop {
            let (ch, closer_left) = match &tokens[j] {
                Token::Delim(d) if d.can_close && d.remaining > 0 => (d.ch, d.remaining),
                _ => break,
            };
            let opener = (0..j).rev().find(|&i| {
                matches!(&tokens[i], Token::Delim(d) if d.ch == ch && d.can_open && d.remaining > 0)
            });
            let Some(i) = opener else { break };

            let opener_left = match &tokens[i] {
                Token::Delim(d) => d.remaining,
                _ => break,
            };
            let n = if opener_left >= 2 && closer_left >= 2 { 2 } else { 1 };

            if let Token::Delim(d) = &mut tokens[i] {
                d.remaining -= n;
                if n == 2 {
                    d.opens_bold += 1;
                } else {
                    d.opens_italic += 1;
                }
            }
            if let Token::Delim(d) = &mut tokens[j] {
                d.remaining -= n;
                if n == 2 {
                    d.closes_bold += 1;
                } else {
                    d.closes_italic += 1;
                }
            }
            // Delimiters inside a matched pair can no longer open.
            for token in tokens.iter_mut().take(j).skip(i + 1) {
                if let Token::Delim(d) = token {
                    d.can_open = false;
                }
            }
        }
    }

    let mut runs = Vec::new();
    let mut bold = 0usize;
    let mut italic = 0usize;
    for token in tokens {
        let style = RunStyle::from_flags(bold > 0, italic > 0);
        match token {
            Token::Text(t) => runs.push(InlineRun::new(decode_entities(&t), style)),
            Token::Code(t) => runs.push(InlineRun::new(t, RunStyle::Code)),
            Token::Delim(d) => {
                bold = bold.saturating_sub(d.closes_bold);
                italic = italic.saturating_sub(d.closes_italic);
                if d.remaining > 0 {
                    let style = RunStyle::from_flags(bold > 0, italic > 0);
                    runs.push(InlineRun::new(d.ch.to_string().repeat(d.remaining), style));
                }
                bold += d.opens_bold;
                italic += d.opens_italic;
            }
        }
    }
    runs
}

// ── Pass 6: entities and merging ─────────────────────────────────────────

static RE_ENTITY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"&(#[0-9]{1,7}|#[xX][0-9a-fA-F]{1,6}|[A-Za-z][A-Za-z0-9]{1,31});").unwrap());

fn decode_entities(s: &str) -> String {
    if !s.contains('&') {
        return s.to_string();
    }
    RE_ENTITY
        .replace_all(s, |caps: &regex::Captures<'_>| {
            let name = &caps[1];
            let decoded = if let Some(hex) = name.strip_prefix("#x").or_else(|| name.strip_prefix("#X")) {
                u32::from_str_radix(hex, 16).ok().and_then(char::from_u32)
            } else if let Some(dec) = name.strip_prefix('#') {
                dec.parse::<u32>().ok().and_then(char::from_u32)
            } else {
                named_entity(name)
            };
            match decoded {
                Some('\0') | None => caps[0].to_string(),
                Some(c) => c.to_string(),
            }
        })
        .into_owned()
}

fn named_entity(name: &str) -> Option<char> {
    Some(match name {
        "amp" => '&',
        "lt" => '<',
        "gt" => '>',
        "quot" => '"',
        "apos" => '\'',
        "nbsp" => '\u{00A0}',
        "copy" => '©',
        "reg" => '®',
        "trade" => '™',
        "mdash" => '—',
        "ndash" => '–',
        "hellip" => '…',
        "laquo" => '«',
        "raquo" => '»',
        "lsquo" => '‘',
        "rsquo" => '’',
        "ldquo" => '“',
        "rdquo" => '”',
        "bull" => '•',
        "middot" => '·',
        "deg" => '°',
        "times" => '×',
        "divide" => '÷',
        "plusmn" => '±',
        "euro" => '€',
        "pound" => '£',
        "sect" => '§',
        "para" => '¶',
        "larr" => '←',
        "rarr" => '→',
        "uarr" => '↑',
        "darr" => '↓',
        "harr" => '↔',
        "le" => '≤',
        "ge" => '≥',
        "ne" => '≠',
        "infin" => '∞',
        "check" => '✓',
        _ => return None,
    })
}

/// Merge neighbours of equal style, drop empty runs, trim the outer edges.
fn finish_runs(runs: Vec<InlineRun>) -> Vec<InlineRun> {
    let mut merged: Vec<InlineRun> = Vec::with_capacity(runs.len());
    for run in runs {
        if run.text.is_empty() {
            continue;
        }
        match merged.last_mut() {
            Some(last) if last.style == run.style => last.text.push_str(&run.text),
            _ => merged.push(run),
        }
    }

    if let Some(first) = merged.first_mut() {
        if first.style != RunStyle::Code {
            first.text = first.text.trim_start().to_string();
        }
    }
    if let Some(last) = merged.last_mut() {
        if last.style != RunStyle::Code {
            last.text = last.text.trim_end().to_string();
        }
    }
    merged.retain(|r| !r.text.is_empty());
    merged
}

// ── Tests ────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn fmt(s: &str) -> Vec<InlineRun> {
        format_inline(s, EmojiPolicy::Strip)
    }

    fn run(text: &str, style: RunStyle) -> InlineRun {
        InlineRun::new(text, style)
    }

    #[test]
    fn plain_text_single_run() {
        assert_eq!(fmt("hello world"), vec![run("hello world", RunStyle::Plain)]);
    }

    #[test]
    fn bold_italic_and_code() {
        assert_eq!(
            fmt("a **b** *c* `d` __e__ _f_"),
            vec![
                run("a ", RunStyle::Plain),
                run("b", RunStyle::Bold),
                run(" ", RunStyle::Plain),
                run("c", RunStyle::Italic),
                run(" ", RunStyle::Plain),
                run("d", RunStyle::Code),
                run(" ", RunStyle::Plain),
                run("e", RunStyle::Bold),
                run(" ", RunStyle::Plain),
                run("f", RunStyle::Italic),
            ]
        );
    }

    #[test]
    fn nested_emphasis_combines() {
        assert_eq!(
            fmt("**bold *both* bold**"),
            vec![
                run("bold ", RunStyle::Bold),
                run("both", RunStyle::BoldItalic),
                run(" bold", RunStyle::Bold),
            ]
        );
        assert_eq!(fmt("***all***"), vec![run("all", RunStyle::BoldItalic)]);
    }

    #[test]
    fn unterminated_markers_are_literal() {
        assert_eq!(fmt("**open"), vec![run("**open", RunStyle::Plain)]);
        assert_eq!(fmt("`tick"), vec![run("`tick", RunStyle::Plain)]);
        assert_eq!(fmt("2 * 3 = 6"), vec![run("2 * 3 = 6", RunStyle::Plain)]);
    }

    #[test]
    fn intraword_underscore_is_literal() {
        assert_eq!(fmt("snake_case_name"), vec![run("snake_case_name", RunStyle::Plain)]);
        assert_eq!(
            fmt("in**tra**word"),
            vec![
                run("in", RunStyle::Plain),
                run("tra", RunStyle::Bold),
                run("word", RunStyle::Plain),
            ]
        );
    }

    #[test]
    fn code_span_protects_contents() {
        assert_eq!(
            fmt("run `**x** [a](b) <br>` now"),
            vec![
                run("run ", RunStyle::Plain),
                run("**x** [a](b) <br>", RunStyle::Code),
                run(" now", RunStyle::Plain),
            ]
        );
        assert_eq!(fmt("``a ` b``"), vec![run("a ` b", RunStyle::Code)]);
    }

    #[test]
    fn escapes_are_literal() {
        assert_eq!(fmt(r"\*not italic\*"), vec![run("*not italic*", RunStyle::Plain)]);
        assert_eq!(fmt(r"a \| b"), vec![run("a | b", RunStyle::Plain)]);
    }

    #[test]
    fn links_keep_text_only() {
        assert_eq!(
            fmt("see [the **docs**](https://example.org \"T\") and ![logo](x.png)"),
            vec![
                run("see the ", RunStyle::Plain),
                run("docs", RunStyle::Bold),
                run(" and logo", RunStyle::Plain),
            ]
        );
        assert_eq!(
            fmt("<https://example.org/a>"),
            vec![run("https://example.org/a", RunStyle::Plain)]
        );
        assert_eq!(fmt("[ref link][r1]"), vec![run("ref link", RunStyle::Plain)]);
    }

    #[test]
    fn link_targets_with_parentheses() {
        assert_eq!(
            fmt("see [wiki](https://en.wikipedia.org/wiki/Rust_(language)) now"),
            vec![run("see wiki now", RunStyle::Plain)]
        );
        assert_eq!(
            fmt("[a](x_(1).png \"T\") b"),
            vec![run("a b", RunStyle::Plain)]
        );
    }

    #[test]
    fn private_use_characters_survive() {
        assert_eq!(
            format_inline("icon \u{E000} and `x`", EmojiPolicy::Keep),
            vec![
                run("icon \u{E000} and ", RunStyle::Plain),
                run("x", RunStyle::Code),
            ]
        );
        assert_eq!(
            fmt("`a` \u{E001}\u{E000} **b**"),
            vec![
                run("a", RunStyle::Code),
                run(" \u{E001}\u{E000} ", RunStyle::Plain),
                run("b", RunStyle::Bold),
            ]
        );
    }

    #[test]
    fn inline_html_tags_dropped() {
        assert_eq!(fmt("a<br/>b <span class=\"x\">c</span>"), vec![run("ab c", RunStyle::Plain)]);
    }

    #[test]
    fn entities_decoded() {
        assert_eq!(
            fmt("Tom &amp; Jerry &lt;3 &#169; &#x2192; &bogus;"),
            vec![run("Tom & Jerry <3 © → &bogus;", RunStyle::Plain)]
        );
    }

    #[test]
    fn soft_breaks_become_spaces() {
        assert_eq!(fmt("one\ntwo  \nthree\\\nfour"), vec![run("one two three four", RunStyle::Plain)]);
    }

    #[test]
    fn strip_emoji_keeps_simple_symbols() {
        assert_eq!(strip_emoji("Launch 🚀 now"), "Launch now");
        assert_eq!(strip_emoji("✅ Done"), "Done");
        assert_eq!(strip_emoji("A → B ✓ ★ × ≤"), "A → B ✓ ★ × ≤");
        assert_eq!(strip_emoji("👨\u{200D}💻 dev"), "dev");
        assert_eq!(strip_emoji("flag 🇫🇷"), "flag");
        assert_eq!(strip_emoji("☀\u{FE0F} sun"), "sun");
    }

    #[test]
    fn keep_policy_leaves_emoji() {
        assert_eq!(
            format_inline("Ship 🚀", EmojiPolicy::Keep),
            vec![run("Ship 🚀", RunStyle::Plain)]
        );
    }

    #[test]
    fn empty_input() {
        assert!(fmt("").is_empty());
        assert!(fmt("🚀").is_empty());
    }

    #[test]
    fn same_markup_same_runs_everywhere() {
        let a = fmt("x **b** `c`");
        let b = fmt("  x **b** `c`  ");
        assert_eq!(a, b);
    }
}
