//! Markdown block parser: pulldown-cmark events → [`Block`]s.
//!
//! [`parse_blocks`] returns a lazy iterator. It drives a
//! `pulldown_cmark` offset iterator and groups events into whole blocks,
//! keeping the *raw* inline source of headings, paragraphs, list items and
//! table cells (sliced from the input using event offsets) so that a single
//! inline formatter can style all of them the same way.
//!
//! The parser never fails. Constructs without a block of their own degrade:
//! block quotes to paragraphs, HTML blocks to their tag-stripped text,
//! headings deeper than four levels to level 4.

use crate::model::{Block, ListMarker};
use crate::output::DocumentSummary;
use once_cell::sync::Lazy;
use pulldown_cmark::{CodeBlockKind, Event, HeadingLevel, OffsetIter, Options, Parser, Tag, TagEnd};
use regex::Regex;
use std::collections::VecDeque;
use std::ops::Range;

/// Deepest heading level the writers distinguish.
pub const MAX_HEADING_LEVEL: u8 = 4;

/// Parse Markdown into a lazy sequence of blocks in document order.
pub fn parse_blocks(text: &str) -> Blocks<'_> {
    Blocks {
        src: text,
        events: Parser::new_ext(text, Options::ENABLE_TABLES).into_offset_iter(),
        ready: VecDeque::new(),
        lists: Vec::new(),
        items: Vec::new(),
        inline: None,
        code: None,
        html: None,
        table: None,
        quote_depth: 0,
        done: false,
    }
}

/// Count blocks by kind and find the first level-1 heading.
pub fn summarise(text: &str) -> DocumentSummary {
    let mut summary = DocumentSummary::default();
    for block in parse_blocks(text) {
        if summary.title.is_none() {
            if let Block::Heading { level: 1, text } = &block {
                let runs = crate::pipeline::inline::format_inline(text, crate::config::EmojiPolicy::Keep);
                summary.title = Some(crate::model::runs_text(&runs).trim().to_string());
            }
        }
        summary.record(block.kind());
    }
    summary
}

fn heading_level_to_num(level: HeadingLevel) -> u8 {
    match level {
        HeadingLevel::H1 => 1,
        HeadingLevel::H2 => 2,
        HeadingLevel::H3 => 3,
        HeadingLevel::H4 => 4,
        HeadingLevel::H5 => 5,
        HeadingLevel::H6 => 6,
    }
}

// ── Iterator state ───────────────────────────────────────────────────────

/// Lazy block iterator returned by [`parse_blocks`].
pub struct Blocks<'a> {
    src: &'a str,
    events: OffsetIter<'a>,
    /// Blocks completed but not yet yielded; one event can finish several.
    ready: VecDeque<Block>,
    lists: Vec<ListState>,
    items: Vec<ItemState>,
    inline: Option<InlineCapture>,
    code: Option<CodeCapture>,
    html: Option<String>,
    table: Option<TableCapture>,
    quote_depth: usize,
    done: bool,
}

struct ListState {
    /// Next ordinal for ordered lists, `None` for bullets.
    next: Option<u64>,
}

struct ItemState {
    marker: ListMarker,
    depth: usize,
    emitted: bool,
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum InlineTarget {
    Heading(u8),
    Paragraph,
    ItemText,
    Cell,
}

struct InlineCapture {
    target: InlineTarget,
    span: Option<Range<usize>>,
}

struct CodeCapture {
    language: Option<String>,
    text: String,
}

#[derive(Default)]
struct TableCapture {
    header: Vec<String>,
    rows: Vec<Vec<String>>,
    row: Vec<String>,
}

impl Iterator for Blocks<'_> {
    type Item = Block;

    fn next(&mut self) -> Option<Block> {
        loop {
            if let Some(block) = self.ready.pop_front() {
                return Some(block);
            }
            if self.done {
                return None;
            }
            match self.events.next() {
                Some((event, range)) => self.handle(event, range),
                None => {
                    self.done = true;
                    self.finish_inline();
                }
            }
        }
    }
}

impl<'a> Blocks<'a> {
    fn handle(&mut self, event: Event<'a>, range: Range<usize>) {
        // Code and HTML blocks swallow their text verbatim.
        if let Some(code) = self.code.as_mut() {
            match event {
                Event::Text(t) => {
                    code.text.push_str(&t);
                    return;
                }
                Event::End(TagEnd::CodeBlock) => {
                    self.finish_code();
                    return;
                }
                _ => return,
            }
        }
        if let Some(html) = self.html.as_mut() {
            match event {
                Event::Html(t) | Event::Text(t) => {
                    html.push_str(&t);
                    return;
                }
                Event::End(TagEnd::HtmlBlock) => {
                    self.finish_html();
                    return;
                }
                _ => return,
            }
        }

        match event {
            Event::Start(tag) => self.start(tag, range),
            Event::End(tag) => self.end(tag),
            Event::Rule => {
                self.close_block();
                self.ready.push_back(Block::Rule);
            }
            // Text, Code, InlineHtml, SoftBreak, HardBreak and friends.
            _ => self.extend_inline(range),
        }
    }

    fn start(&mut self, tag: Tag<'a>, range: Range<usize>) {
        match tag {
            Tag::Paragraph => {}
            Tag::Heading { level, .. } => {
                self.close_block();
                let level = heading_level_to_num(level).min(MAX_HEADING_LEVEL);
                self.inline = Some(InlineCapture {
                    target: InlineTarget::Heading(level),
                    span: None,
                });
            }
            Tag::BlockQuote(_) => {
                self.close_block();
                self.quote_depth += 1;
            }
            Tag::CodeBlock(kind) => {
                self.close_block();
                let language = match kind {
                    CodeBlockKind::Fenced(info) => info
                        .split_whitespace()
                        .next()
                        .filter(|s| !s.is_empty())
                        .map(str::to_string),
                    CodeBlockKind::Indented => None,
                };
                self.code = Some(CodeCapture {
                    language,
                    text: String::new(),
                });
            }
            Tag::HtmlBlock => {
                self.close_block();
                self.html = Some(String::new());
            }
            Tag::List(start) => {
                self.close_block();
                self.lists.push(ListState { next: start });
            }
            Tag::Item => {
                self.finish_inline();
                let depth = self.lists.len().saturating_sub(1);
                let marker = match self.lists.last_mut() {
                    Some(ListState { next: Some(n) }) => {
                        let marker = ListMarker::Ordered(*n);
                        *n += 1;
                        marker
                    }
                    _ => ListMarker::Bullet,
                };
                self.items.push(ItemState {
                    marker,
                    depth,
                    emitted: false,
                });
            }
            Tag::Table(_) => {
                self.close_block();
                self.table = Some(TableCapture::default());
            }
            Tag::TableHead | Tag::TableRow => {
                if let Some(t) = self.table.as_mut() {
                    t.row.clear();
                }
            }
            Tag::TableCell => {
                self.inline = Some(InlineCapture {
                    target: InlineTarget::Cell,
                    span: None,
                });
            }
            // Emphasis, strong, links, images: inline markup kept in the raw slice.
            _ => self.extend_inline(range),
        }
    }

    fn end(&mut self, tag: TagEnd) {
        match tag {
            TagEnd::Paragraph | TagEnd::Heading(_) => self.finish_inline(),
            TagEnd::BlockQuote(_) => {
                self.finish_inline();
                self.quote_depth = self.quote_depth.saturating_sub(1);
            }
            TagEnd::List(_) => {
                self.finish_inline();
                self.lists.pop();
            }
            TagEnd::Item => {
                self.finish_inline();
                if let Some(item) = self.items.pop() {
                    if !item.emitted {
                        self.ready.push_back(Block::ListItem {
                            marker: item.marker,
                            depth: item.depth,
                            text: String::new(),
                        });
                    }
                }
            }
            TagEnd::TableCell => {
                let text = self
                    .inline
                    .take()
                    .map(|c| self.slice(c.span))
                    .unwrap_or_default();
                if let Some(t) = self.table.as_mut() {
                    t.row.push(text);
                }
            }
            TagEnd::TableHead => {
                if let Some(t) = self.table.as_mut() {
                    t.header = std::mem::take(&mut t.row);
                }
            }
            TagEnd::TableRow => {
                if let Some(t) = self.table.as_mut() {
                    let row = std::mem::take(&mut t.row);
                    t.rows.push(row);
                }
            }
            TagEnd::Table => {
                if let Some(t) = self.table.take() {
                    self.ready.push_back(Block::Table {
                        header: t.header,
                        rows: t.rows,
                    });
                }
            }
            _ => {}
        }
    }

    /// Grow the current inline span, opening one if needed.
    fn extend_inline(&mut self, range: Range<usize>) {
        if self.inline.is_none() {
            let target = match self.items.last() {
                Some(item) if !item.emitted => InlineTarget::ItemText,
                _ => InlineTarget::Paragraph,
            };
            self.inline = Some(InlineCapture { target, span: None });
        }
        if let Some(capture) = self.inline.as_mut() {
            capture.span = Some(match capture.span.take() {
                Some(span) => span.start.min(range.start)..span.end.max(range.end),
                None => range,
            });
        }
    }

    /// Finish pending inline text before a nested block starts. A list item
    /// whose first child is a block still gets its marker line first.
    fn close_block(&mut self) {
        self.finish_inline();
        if let Some(item) = self.items.last_mut() {
            if !item.emitted {
                item.emitted = true;
                self.ready.push_back(Block::ListItem {
                    marker: item.marker,
                    depth: item.depth,
                    text: String::new(),
                });
            }
        }
    }

    /// Close the current inline span and turn it into a block.
    fn finish_inline(&mut self) {
        let Some(capture) = self.inline.take() else {
            return;
        };
        let text = self.slice(capture.span);
        match capture.target {
            InlineTarget::Heading(level) => self.ready.push_back(Block::Heading { level, text }),
            InlineTarget::Paragraph => {
                if !text.is_empty() {
                    self.ready.push_back(Block::Paragraph { text });
                }
            }
            InlineTarget::ItemText => {
                if let Some(item) = self.items.last_mut() {
                    item.emitted = true;
                    self.ready.push_back(Block::ListItem {
                        marker: item.marker,
                        depth: item.depth,
                        text,
                    });
                } else if !text.is_empty() {
                    self.ready.push_back(Block::Paragraph { text });
                }
            }
            // Cells are closed by their own end tag.
            InlineTarget::Cell => {}
        }
    }

    fn finish_code(&mut self) {
        let Some(code) = self.code.take() else {
            return;
        };
        let text = code.text.trim_end_matches('\n').to_string();
        let is_mermaid = code
            .language
            .as_deref()
            .is_some_and(|l| l.eq_ignore_ascii_case("mermaid"));
        let block = if is_mermaid {
            Block::Mermaid { source: text }
        } else {
            Block::Code {
                language: code.language,
                text,
            }
        };
        self.ready.push_back(block);
    }

    fn finish_html(&mut self) {
        let Some(html) = self.html.take() else {
            return;
        };
        let text = RE_TAG.replace_all(&html, " ");
        let text = text.split_whitespace().collect::<Vec<_>>().join(" ");
        if !text.is_empty() {
            self.ready.push_back(Block::Paragraph { text });
        }
    }

    fn slice(&self, span: Option<Range<usize>>) -> String {
        let Some(span) = span else {
            return String::new();
        };
        let raw = self.src.get(span).unwrap_or_default();
        if self.quote_depth == 0 && self.items.is_empty() {
            return raw.trim().to_string();
        }
        // Continuation lines inside quotes and list items carry their
        // container's prefix in the raw source.
        raw.lines()
            .map(|line| strip_quote_markers(line, self.quote_depth))
            .collect::<Vec<_>>()
            .join("\n")
            .trim()
            .to_string()
    }
}

static RE_TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)<!--.*?-->|<[^>]+>").unwrap());

fn strip_quote_markers(line: &str, depth: usize) -> &str {
    let mut line = line.trim_start();
    for _ in 0..depth {
        match line.strip_prefix('>') {
            Some(rest) => line = rest.trim_start(),
            None => break,
        }
    }
    line
}

// ── Tests ────────────────────────────────────────────────────────────────
