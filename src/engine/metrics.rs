//! Base-14 font metrics and line wrapping for the layout engine.
//!
//! Widths come from the Adobe AFM files for the standard fonts (units of
//! 1/1000 em). Oblique Helvetica shares the upright widths exactly; the Times
//! italics reuse the upright tables, which are slightly wider, so italic
//! Times lines wrap a little early rather than overflow.

use super::theme::Rgb;
use crate::config::FontChoice;
use crate::model::{InlineRun, RunStyle};

/// The twelve base-14 text fonts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum BaseFont {
    Helvetica,
    HelveticaBold,
    HelveticaOblique,
    HelveticaBoldOblique,
    TimesRoman,
    TimesBold,
    TimesItalic,
    TimesBoldItalic,
    Courier,
    CourierBold,
    CourierOblique,
    CourierBoldOblique,
}

impl BaseFont {
    /// Face for a run in the given body family. Code is always Courier.
    pub fn for_run(family: FontChoice, style: RunStyle, force_bold: bool) -> Self {
        let bold = force_bold || style.is_bold();
        let italic = style.is_italic();
        let family = if style == RunStyle::Code {
            FontChoice::Courier
        } else {
            family
        };
        match (family, bold, italic) {
            (FontChoice::Helvetica, false, false) => BaseFont::Helvetica,
            (FontChoice::Helvetica, true, false) => BaseFont::HelveticaBold,
            (FontChoice::Helvetica, false, true) => BaseFont::HelveticaOblique,
            (FontChoice::Helvetica, true, true) => BaseFont::HelveticaBoldOblique,
            (FontChoice::Times, false, false) => BaseFont::TimesRoman,
            (FontChoice::Times, true, false) => BaseFont::TimesBold,
            (FontChoice::Times, false, true) => BaseFont::TimesItalic,
            (FontChoice::Times, true, true) => BaseFont::TimesBoldItalic,
            (FontChoice::Courier, false, false) => BaseFont::Courier,
            (FontChoice::Courier, true, false) => BaseFont::CourierBold,
            (FontChoice::Courier, false, true) => BaseFont::CourierOblique,
            (FontChoice::Courier, true, true) => BaseFont::CourierBoldOblique,
        }
    }

    pub fn is_mono(self) -> bool {
        matches!(
            self,
            BaseFont::Courier
                | BaseFont::CourierBold
                | BaseFont::CourierOblique
                | BaseFont::CourierBoldOblique
        )
    }

    fn is_times(self) -> bool {
        matches!(
            self,
            BaseFont::TimesRoman | BaseFont::TimesBold | BaseFont::TimesItalic | BaseFont::TimesBoldItalic
        )
    }

    fn table(self) -> Option<&'static [u16; 95]> {
        match self {
            BaseFont::Helvetica | BaseFont::HelveticaOblique => Some(&HELVETICA),
            BaseFont::HelveticaBold | BaseFont::HelveticaBoldOblique => Some(&HELVETICA_BOLD),
            BaseFont::TimesRoman | BaseFont::TimesItalic => Some(&TIMES_ROMAN),
            BaseFont::TimesBold | BaseFont::TimesBoldItalic => Some(&TIMES_BOLD),
            _ => None,
        }
    }

    /// Advance width of one character in 1/1000 em.
    pub fn char_width(self, c: char) -> u16 {
        if self.is_mono() {
            return 600;
        }
        let Some(table) = self.table() else {
            return 600;
        };
        let cp = c as u32;
        if (32..=126).contains(&cp) {
            return table[(cp - 32) as usize];
        }
        let times = self.is_times();
        match c {
            '\u{00A0}' => table[0],
            '•' => 350,
            '–' => {
                if times {
                    500
                } else {
                    556
                }
            }
            '—' | '…' | '‰' => 1000,
            '‘' | '’' | '‚' => {
                if times {
                    333
                } else {
                    222
                }
            }
            '“' | '”' | '„' => {
                if times {
                    444
                } else {
                    333
                }
            }
            '©' | '®' => 760,
            '°' => 400,
            '×' | '÷' | '±' => table[('+' as usize) - 32],
            c if c.is_uppercase() => table[('A' as usize) - 32],
            c if c.is_alphabetic() => table[('e' as usize) - 32],
            _ => {
                if times {
                    500
                } else {
                    556
                }
            }
        }
    }

    /// Width of `text` in points at `size`.
    pub fn text_width(self, text: &str, size: f32) -> f32 {
        let units: u32 = text.chars().map(|c| u32::from(self.char_width(c))).sum();
        units as f32 * size / 1000.0
    }
}

#[rustfmt::skip]
const HELVETICA: [u16; 95] = [
    278, 278, 355, 556, 556, 889, 667, 191, 333, 333, 389, 584, 278, 333, 278, 278,
    556, 556, 556, 556, 556, 556, 556, 556, 556, 556, 278, 278, 584, 584, 584, 556,
    1015, 667, 667, 722, 722, 667, 611, 778, 722, 278, 500, 667, 556, 833, 722, 778,
    667, 778, 722, 667, 611, 722, 667, 944, 667, 667, 611, 278, 278, 278, 469, 556,
    333, 556, 556, 500, 556, 556, 278, 556, 556, 222, 222, 500, 222, 833, 556, 556,
    556, 556, 333, 500, 278, 556, 500, 722, 500, 500, 500, 334, 260, 334, 584,
];

#[rustfmt::skip]
const HELVETICA_BOLD: [u16; 95] = [
    278, 333, 474, 556, 556, 889, 722, 238, 333, 333, 389, 584, 278, 333, 278, 278,
    556, 556, 556, 556, 556, 556, 556, 556, 556, 556, 333, 333, 584, 584, 584, 611,
    975, 722, 722, 722, 722, 667, 611, 778, 722, 278, 556, 722, 611, 833, 722, 778,
    667, 778, 722, 667, 611, 722, 667, 944, 667, 667, 611, 333, 278, 333, 584, 556,
    333, 556, 611, 556, 611, 556, 333, 611, 611, 278, 278, 556, 278, 889, 611, 611,
    611, 611, 389, 556, 333, 611, 556, 778, 556, 556, 500, 389, 280, 389, 584,
];

#[rustfmt::skip]
const TIMES_ROMAN: [u16; 95] = [
    250, 333, 408, 500, 500, 833, 778, 180, 333, 333, 500, 564, 250, 333, 250, 278,
    500, 500, 500, 500, 500, 500, 500, 500, 500, 500, 278, 278, 564, 564, 564, 444,
    921, 722, 667, 667, 722, 611, 556, 722, 722, 333, 389, 722, 611, 889, 722, 722,
    556, 722, 667, 556, 611, 722, 722, 944, 722, 722, 611, 333, 278, 333, 469, 500,
    333, 444, 500, 444, 500, 444, 333, 500, 500, 278, 278, 500, 278, 778, 500, 500,
    500, 500, 333, 389, 278, 500, 500, 722, 500, 500, 444, 480, 200, 480, 541,
];

#[rustfmt::skip]
const TIMES_BOLD: [u16; 95] = [
    250, 333, 555, 500, 500, 1000, 833, 278, 333, 333, 500, 570, 250, 333, 250, 278,
    500, 500, 500, 500, 500, 500, 500, 500, 500, 500, 333, 333, 570, 570, 570, 500,
    930, 722, 667, 722, 722, 667, 611, 778, 778, 389, 500, 778, 667, 944, 722, 778,
    611, 778, 722, 556, 667, 722, 722, 1000, 722, 722, 667, 333, 278, 333, 581, 500,
    333, 500, 556, 444, 556, 444, 333, 500, 556, 278, 333, 556, 278, 833, 556, 500,
    556, 556, 444, 389, 333, 556, 500, 722, 500, 500, 444, 394, 220, 394, 520,
];

// ── WinAnsi ──────────────────────────────────────────────────────────────

/// Characters in WinAnsiEncoding outside ASCII and Latin-1.
const WINANSI_EXTRA: &str = "€‚ƒ„…†‡ˆ‰Š‹ŒŽ‘’“”•–—˜™š›œžŸ";

/// Whether the base-14 fonts can draw `c`.
pub fn is_winansi(c: char) -> bool {
    let cp = c as u32;
    (0x20..=0x7E).contains(&cp) || (0xA0..=0xFF).contains(&cp) || WINANSI_EXTRA.contains(c)
}

/// Make `text` drawable with base-14 fonts.
///
/// Common arrows and relations get ASCII spellings; anything else outside
/// WinAnsi becomes `?`.
pub fn to_winansi(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        if is_winansi(c) {
            out.push(c);
            continue;
        }
        match c {
            '\t' => out.push_str("    "),
            '\n' | '\r' => out.push(' '),
            '→' => out.push_str("->"),
            '←' => out.push_str("<-"),
            '↔' => out.push_str("<->"),
            '⇒' => out.push_str("=>"),
            '⇐' => out.push_str("<="),
            '⇔' => out.push_str("<=>"),
            '≤' => out.push_str("<="),
            '≥' => out.push_str(">="),
            '≠' => out.push_str("!="),
            '−' => out.push('-'),
            _ => out.push('?'),
        }
    }
    out
}

// ── Wrapping ─────────────────────────────────────────────────────────────

/// A stretch of one font and colour within a line.
#[derive(Debug, Clone, PartialEq)]
pub struct Segment {
    pub text: String,
    pub font: BaseFont,
    pub color: Rgb,
}

/// One wrapped line.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TextLine {
    pub segments: Vec<Segment>,
    pub width: f32,
}

impl TextLine {
    fn push(&mut self, text: &str, font: BaseFont, color: Rgb, size: f32) {
        if text.is_empty() {
            return;
        }
        self.width += font.text_width(text, size);
        match self.segments.last_mut() {
            Some(last) if last.font == font && last.color == color => last.text.push_str(text),
            _ => self.segments.push(Segment {
                text: text.to_string(),
                font,
                color,
            }),
        }
    }

    fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }
}

/// How a block's runs are drawn.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TextStyle {
    pub family: FontChoice,
    pub size: f32,
    pub color: Rgb,
    pub code_color: Rgb,
    /// Headings and table headers set everything bold.
    pub force_bold: bool,
}

struct Piece {
    text: String,
    font: BaseFont,
    color: Rgb,
}

enum Atom {
    Word(Vec<Piece>),
    Space(Piece),
}

fn atoms(runs: &[InlineRun], style: &TextStyle) -> Vec<Atom> {
    let mut atoms = Vec::new();
    let mut word: Vec<Piece> = Vec::new();

    for run in runs {
        let font = BaseFont::for_run(style.family, run.style, style.force_bold);
        let color = if run.style == RunStyle::Code {
            style.code_color
        } else {
            style.color
        };
        let text = to_winansi(&run.text);
        let mut buf = String::new();
        let mut in_space = false;
        for c in text.chars() {
            let is_space = c == ' ';
            if is_space != in_space && !buf.is_empty() {
                let piece = Piece {
                    text: std::mem::take(&mut buf),
                    font,
                    color,
                };
                if in_space {
                    atoms.push(Atom::Space(piece));
                } else {
                    word.push(piece);
                }
            }
            if is_space && !in_space && !word.is_empty() {
                atoms.push(Atom::Word(std::mem::take(&mut word)));
            }
            in_space = is_space;
            buf.push(c);
        }
        if !buf.is_empty() {
            let piece = Piece { text: buf, font, color };
            if in_space {
                atoms.push(Atom::Space(piece));
            } else {
                word.push(piece);
            }
        }
    }
    if !word.is_empty() {
        atoms.push(Atom::Word(word));
    }
    atoms
}

/// Greedy word wrap of styled runs into lines no wider than `max_width`.
///
/// Words (including words whose halves differ in style) are never split
/// unless a single word is wider than a whole line. Spaces at line breaks are
/// dropped. Returns no lines for empty input.
pub fn wrap_runs(runs: &[InlineRun], style: &TextStyle, max_width: f32) -> Vec<TextLine> {
    let size = style.size;
    let mut lines = Vec::new();
    let mut line = TextLine::default();
    let mut pending: Vec<Piece> = Vec::new();

    for atom in atoms(runs, style) {
        match atom {
            Atom::Space(piece) => {
                if !line.is_empty() {
                    pending.push(piece);
                }
            }
            Atom::Word(pieces) => {
                let word_width: f32 = pieces.iter().map(|p| p.font.text_width(&p.text, size)).sum();
                let space_width: f32 = pending.iter().map(|p| p.font.text_width(&p.text, size)).sum();

                if !line.is_empty() && line.width + space_width + word_width > max_width {
                    lines.push(std::mem::take(&mut line));
                    pending.clear();
                }
                for p in pending.drain(..) {
                    line.push(&p.text, p.font, p.color, size);
                }

                if word_width <= max_width || max_width <= 0.0 {
                    for p in &pieces {
                        line.push(&p.text, p.font, p.color, size);
                    }
                    continue;
                }
                // Hard-break a word longer than the line.
                for p in &pieces {
                    for c in p.text.chars() {
                        let w = p.font.text_width(c.encode_utf8(&mut [0; 4]), size);
                        if !line.is_empty() && line.width + w > max_width {
                            lines.push(std::mem::take(&mut line));
                        }
                        line.push(c.encode_utf8(&mut [0; 4]), p.font, p.color, size);
                    }
                }
            }
        }
    }
    if !line.is_empty() {
        lines.push(line);
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::theme;

    fn body() -> TextStyle {
        TextStyle {
            family: FontChoice::Helvetica,
            size: 10.0,
            color: theme::TEXT,
            code_color: theme::INLINE_CODE,
            force_bold: false,
        }
    }

    #[test]
    fn known_widths() {
        assert_eq!(BaseFont::Helvetica.char_width('A'), 667);
        assert_eq!(BaseFont::HelveticaBold.char_width('m'), 889);
        assert_eq!(BaseFont::TimesRoman.char_width(' '), 250);
        assert_eq!(BaseFont::Courier.char_width('W'), 600);
        assert!((BaseFont::Helvetica.text_width("ii", 10.0) - 4.44).abs() < 1e-4);
    }

    #[test]
    fn faces_follow_styles() {
        use RunStyle::*;
        assert_eq!(BaseFont::for_run(FontChoice::Helvetica, Bold, false), BaseFont::HelveticaBold);
        assert_eq!(BaseFont::for_run(FontChoice::Times, BoldItalic, false), BaseFont::TimesBoldItalic);
        assert_eq!(BaseFont::for_run(FontChoice::Times, Code, false), BaseFont::Courier);
        assert_eq!(BaseFont::for_run(FontChoice::Helvetica, Code, true), BaseFont::CourierBold);
        assert_eq!(BaseFont::for_run(FontChoice::Helvetica, Plain, true), BaseFont::HelveticaBold);
    }

    #[test]
    fn winansi_replacement() {
        assert_eq!(to_winansi("café – “ok” €5"), "café – “ok” €5");
        assert_eq!(to_winansi("A → B ≥ C"), "A -> B >= C");
        assert_eq!(to_winansi("日本 ✓"), "?? ?");
    }

    #[test]
    fn wraps_at_width() {
        let runs = vec![InlineRun::plain("aaa bbb ccc ddd")];
        // "aaa bbb" at 10pt Helvetica: 6*5.56 + 2.78 = 36.14
        let lines = wrap_runs(&runs, &body(), 37.0);
        let texts: Vec<String> = lines
            .iter()
            .map(|l| l.segments.iter().map(|s| s.text.as_str()).collect())
            .collect();
        assert_eq!(texts, vec!["aaa bbb", "ccc ddd"]);
        assert!(lines.iter().all(|l| l.width <= 37.0));
    }

    #[test]
    fn mixed_styles_stay_in_one_word() {
        let runs = vec![
            InlineRun::plain("x in"),
            InlineRun::new("tra", RunStyle::Bold),
            InlineRun::plain("word"),
        ];
        let lines = wrap_runs(&runs, &body(), 48.0);
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[1].segments.len(), 3);
        assert_eq!(lines[1].segments[1].font, BaseFont::HelveticaBold);
    }

    #[test]
    fn long_word_is_hard_broken() {
        let runs = vec![InlineRun::plain("abcdefghijklmnopqrstuvwxyz")];
        let lines = wrap_runs(&runs, &body(), 50.0);
        assert!(lines.len() > 1);
        assert!(lines.iter().all(|l| l.width <= 50.0));
    }

    #[test]
    fn code_runs_use_courier_and_code_colour() {
        let runs = vec![InlineRun::plain("run "), InlineRun::new("cargo", RunStyle::Code)];
        let lines = wrap_runs(&runs, &body(), 500.0);
        let code = &lines[0].segments[1];
        assert_eq!(code.font, BaseFont::Courier);
        assert_eq!(code.color, theme::INLINE_CODE);
        assert_eq!(lines[0].segments[0].text, "run ");
    }

    #[test]
    fn empty_runs_give_no_lines() {
        assert!(wrap_runs(&[], &body(), 100.0).is_empty());
    }
}
