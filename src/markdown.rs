//! Markdown ingestion
//!
//! Splits a markdown document into typed block fragments. The parser is
//! line based: each block kind is recognised from the first characters of a
//! line, list nesting is tracked through the column where each item's content
//! starts, and ordered-list numbering follows CommonMark (numbers are local
//! to one contiguous list at one nesting level and begin at the first item's
//! written number).
//!
//! Parsing is pure. An empty result means the document has no block content
//! and callers must reject it.

use std::sync::LazyLock;

use regex::Regex;

use crate::models::{
    Cid, CodeMeta, FragmentKind, ImageMeta, ListItemMeta, ParsedFragment, DEFAULT_CODE_LANG,
};

/// `![alt](url "title")` on its own
static IMAGE_PARAGRAPH: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"^!\[([^\]]*)\]\(\s*(<[^>]*>|[^\s)]+)(?:\s+"[^"]*")?\s*\)$"#)
        .expect("image pattern is valid")
});

/// Turns markdown into fragments.
///
/// The publish path takes this as a trait object so that ingestion can be
/// substituted in tests.
#[cfg_attr(test, mockall::automock)]
pub trait MarkdownIngest: Send + Sync {
    /// Parse `markdown` into fragments owned by `cid`
    fn parse(&self, markdown: &str, cid: Cid) -> Vec<ParsedFragment>;
}

/// The block parser used in production
#[derive(Debug, Default, Clone, Copy)]
pub struct MarkdownParser;

impl MarkdownIngest for MarkdownParser {
    fn parse(&self, markdown: &str, cid: Cid) -> Vec<ParsedFragment> {
        parse_markdown(markdown, cid)
    }
}

/// Parse a document into fragments with provisional positions
#[must_use]
pub fn parse_markdown(markdown: &str, cid: Cid) -> Vec<ParsedFragment> {
    parse_blocks(markdown)
        .into_iter()
        .enumerate()
        .map(|(position, (kind, content))| ParsedFragment {
            cid,
            position,
            kind,
            content,
        })
        .collect()
}

/// Parse a document into `(kind, content)` pairs in document order
#[must_use]
pub fn parse_blocks(markdown: &str) -> Vec<(FragmentKind, String)> {
    BlockParser::new(markdown).run()
}

/// One open list at one nesting level
#[derive(Debug)]
struct ListLevel {
    marker_col: usize,
    content_col: usize,
    ordered: bool,
    delim: char,
    start: u32,
    next_number: u32,
}

/// A recognised list marker
#[derive(Debug)]
struct ListMarker<'a> {
    ordered: bool,
    number: Option<u32>,
    delim: char,
    /// Columns from the marker to the item content
    width: usize,
    content: &'a str,
}

/// An opening code fence
#[derive(Debug)]
struct Fence {
    ch: char,
    len: usize,
    indent: usize,
    lang: String,
    meta: Option<String>,
}

impl Fence {
    fn open(text: &str, indent: usize) -> Option<Self> {
        let ch = text.chars().next().filter(|c| *c == '`' || *c == '~')?;
        let len = text.chars().take_while(|c| *c == ch).count();
        if len < 3 {
            return None;
        }
        let info = text[len..].trim();
        if ch == '`' && info.contains('`') {
            return None;
        }
        let mut words = info.splitn(2, char::is_whitespace);
        let lang = words
            .next()
            .filter(|w| !w.is_empty())
            .map_or_else(|| DEFAULT_CODE_LANG.to_string(), ToString::to_string);
        let meta = words.next().map(str::trim).filter(|m| !m.is_empty()).map(ToString::to_string);
        Some(Self {
            ch,
            len,
            indent,
            lang,
            meta,
        })
    }

    fn closes(&self, line: &str) -> bool {
        if indent_columns(line) >= 4 {
            return false;
        }
        let text = line.trim();
        let run = text.chars().take_while(|c| *c == self.ch).count();
        run >= self.len && run == text.chars().count()
    }
}

struct BlockParser<'a> {
    lines: Vec<&'a str>,
    pos: usize,
    out: Vec<(FragmentKind, String)>,
    lists: Vec<ListLevel>,
    blank_since_item: bool,
}

impl<'a> BlockParser<'a> {
    fn new(markdown: &'a str) -> Self {
        Self {
            lines: markdown.lines().collect(),
            pos: 0,
            out: Vec::new(),
            lists: Vec::new(),
            blank_since_item: false,
        }
    }

    fn run(mut self) -> Vec<(FragmentKind, String)> {
        while let Some(&line) = self.lines.get(self.pos) {
            if is_blank(line) {
                if !self.lists.is_empty() {
                    self.blank_since_item = true;
                }
                self.pos += 1;
                continue;
            }

            if !self.lists.is_empty() && self.continue_list(line) {
                self.pos += 1;
                continue;
            }

            self.block(line);
        }
        self.out
    }

    /// Handle a line while a list is open. Returns false (and closes every
    /// open list) when the line belongs to a new block.
    fn continue_list(&mut self, line: &str) -> bool {
        let indent = indent_columns(line);
        let text = line.trim_start();

        if !is_thematic_break(text) {
            if let Some(marker) = list_marker(text) {
                self.push_item(indent, &marker);
                return true;
            }
        }

        if let Some(depth) = self.lists.iter().rposition(|level| indent >= level.content_col) {
            self.lists.truncate(depth + 1);
            self.append_to_item(text);
            return true;
        }

        if !self.blank_since_item && !starts_block(text) {
            self.append_to_item(text);
            return true;
        }

        self.lists.clear();
        self.blank_since_item = false;
        false
    }

    fn block(&mut self, line: &str) {
        let indent = indent_columns(line);
        let text = line.trim_start();

        if indent >= 4 {
            self.indented_code();
        } else if let Some(fence) = Fence::open(text, indent) {
            self.fenced_code(&fence);
        } else if let Some((level, heading)) = atx_heading(text) {
            self.push_heading(level, heading);
            self.pos += 1;
        } else if is_thematic_break(text) {
            self.out.push((FragmentKind::HorizontalRule, "---".to_string()));
            self.pos += 1;
        } else if text.starts_with('>') {
            self.blockquote();
        } else if let Some(marker) = list_marker(text) {
            self.push_item(indent, &marker);
            self.pos += 1;
        } else {
            self.paragraph();
        }
    }

    fn push_heading(&mut self, level: usize, text: String) {
        let kind = FragmentKind::heading(level).unwrap_or(FragmentKind::Paragraph);
        self.out.push((kind, text));
    }

    fn push_item(&mut self, indent: usize, marker: &ListMarker<'_>) {
        let mut sibling = false;
        while let Some(top) = self.lists.last() {
            if indent >= top.content_col {
                break;
            }
            // an item anywhere inside the parent item's content stays in this list
            let parent_col = self
                .lists
                .len()
                .checked_sub(2)
                .map_or(0, |idx| self.lists[idx].content_col);
            if indent >= parent_col {
                if top.ordered == marker.ordered && top.delim == marker.delim {
                    sibling = true;
                } else {
                    self.lists.pop();
                }
                break;
            }
            self.lists.pop();
        }

        let content_col = indent + marker.width;
        let number = match self.lists.last_mut() {
            Some(level) if sibling => {
                level.marker_col = indent;
                level.content_col = content_col;
                let number = level.next_number;
                level.next_number = level.next_number.saturating_add(1);
                number
            },
            _ => {
                let start = marker.number.unwrap_or(1);
                self.lists.push(ListLevel {
                    marker_col: indent,
                    content_col,
                    ordered: marker.ordered,
                    delim: marker.delim,
                    start,
                    next_number: start.saturating_add(1),
                });
                start
            },
        };

        let depth = self.lists.len().saturating_sub(1);
        let start = self.lists.last().map_or(1, |level| level.start);
        let meta = ListItemMeta {
            ordered: marker.ordered,
            indentation: u32::try_from(depth).unwrap_or(u32::MAX),
            item_number: marker.ordered.then_some(number),
            start: marker.ordered.then_some(start),
        };
        self.out.push((FragmentKind::ListItem(meta), marker.content.to_string()));
        self.blank_since_item = false;
    }

    fn append_to_item(&mut self, text: &str) {
        let separator = if self.blank_since_item { "\n\n" } else { "\n" };
        if let Some((_, content)) = self.out.last_mut() {
            if !content.is_empty() {
                content.push_str(separator);
            }
            content.push_str(text.trim_end());
        }
        self.blank_since_item = false;
    }

    fn indented_code(&mut self) {
        let mut body: Vec<&str> = Vec::new();
        while let Some(&line) = self.lines.get(self.pos) {
            if is_blank(line) {
                body.push("");
            } else if indent_columns(line) >= 4 {
                body.push(strip_columns(line, 4));
            } else {
                break;
            }
            self.pos += 1;
        }
        while body.last().is_some_and(|l| l.is_empty()) {
            body.pop();
        }
        self.out.push((FragmentKind::Code(CodeMeta::default()), body.join("\n")));
    }

    fn fenced_code(&mut self, fence: &Fence) {
        self.pos += 1;
        let mut body: Vec<&str> = Vec::new();
        while let Some(&line) = self.lines.get(self.pos) {
            self.pos += 1;
            if fence.closes(line) {
                break;
            }
            body.push(strip_columns(line, fence.indent));
        }
        let meta = CodeMeta {
            lang: fence.lang.clone(),
            meta: fence.meta.clone(),
        };
        self.out.push((FragmentKind::Code(meta), body.join("\n")));
    }

    fn blockquote(&mut self) {
        let mut body: Vec<&str> = Vec::new();
        while let Some(&line) = self.lines.get(self.pos) {
            let text = line.trim_start();
            if indent_columns(line) >= 4 || !text.starts_with('>') {
                break;
            }
            let inner = &text[1..];
            body.push(inner.strip_prefix(' ').unwrap_or(inner).trim_end());
            self.pos += 1;
        }
        let content = body.join("\n").trim_matches('\n').to_string();
        self.out.push((FragmentKind::Blockquote, content));
    }

    fn paragraph(&mut self) {
        let mut body = vec![self.lines[self.pos].trim()];
        self.pos += 1;

        while let Some(&line) = self.lines.get(self.pos) {
            if is_blank(line) {
                break;
            }
            let text = line.trim_start();
            if indent_columns(line) < 4 {
                if let Some(level) = setext_level(text) {
                    self.pos += 1;
                    self.push_heading(level, body.join("\n"));
                    return;
                }
                if interrupts_paragraph(text) {
                    break;
                }
            }
            body.push(text.trim_end());
            self.pos += 1;
        }

        let content = body.join("\n");
        let kind = image_meta(&content).map_or(FragmentKind::Paragraph, FragmentKind::Image);
        self.out.push((kind, content));
    }
}

fn is_blank(line: &str) -> bool {
    line.trim().is_empty()
}

/// Leading whitespace width, a tab counting as four columns
fn indent_columns(line: &str) -> usize {
    line.chars()
        .take_while(|c| *c == ' ' || *c == '\t')
        .map(|c| if c == '\t' { 4 } else { 1 })
        .sum()
}

/// Remove up to `columns` columns of leading whitespace
fn strip_columns(line: &str, columns: usize) -> &str {
    let mut col = 0;
    for (idx, c) in line.char_indices() {
        if col >= columns {
            return &line[idx..];
        }
        match c {
            ' ' => col += 1,
            '\t' => col += 4,
            _ => return &line[idx..],
        }
    }
    ""
}

fn atx_heading(text: &str) -> Option<(usize, String)> {
    let level = text.chars().take_while(|c| *c == '#').count();
    if !(1..=6).contains(&level) {
        return None;
    }
    let rest = &text[level..];
    if !(rest.is_empty() || rest.starts_with(' ') || rest.starts_with('\t')) {
        return None;
    }
    let rest = rest.trim();
    let without_closing = rest.trim_end_matches('#');
    let heading = if without_closing.is_empty() {
        ""
    } else if without_closing.ends_with(' ') || without_closing.ends_with('\t') {
        without_closing.trim_end()
    } else {
        rest
    };
    Some((level, heading.to_string()))
}

fn is_thematic_break(text: &str) -> bool {
    let mut marks = text.chars().filter(|c| *c != ' ' && *c != '\t');
    let Some(first) = marks.next() else {
        return false;
    };
    if !matches!(first, '-' | '*' | '_') {
        return false;
    }
    let mut count = 1;
    for c in marks {
        if c != first {
            return false;
        }
        count += 1;
    }
    count >= 3
}

fn setext_level(text: &str) -> Option<usize> {
    let text = text.trim_end();
    if text.is_empty() {
        None
    } else if text.chars().all(|c| c == '=') {
        Some(1)
    } else if text.chars().all(|c| c == '-') {
        Some(2)
    } else {
        None
    }
}

fn list_marker(text: &str) -> Option<ListMarker<'_>> {
    let bytes = text.as_bytes();
    let (ordered, number, delim, marker_len) = match *bytes.first()? {
        b @ (b'-' | b'*' | b'+') => (false, None, char::from(b), 1),
        b'0'..=b'9' => {
            let digits = bytes.iter().take_while(|b| b.is_ascii_digit()).count();
            if digits > 9 {
                return None;
            }
            let delim = *bytes.get(digits)?;
            if delim != b'.' && delim != b')' {
                return None;
            }
            let number = text[..digits].parse().ok()?;
            (true, Some(number), char::from(delim), digits + 1)
        },
        _ => return None,
    };

    let rest = &text[marker_len..];
    if rest.trim().is_empty() {
        return Some(ListMarker {
            ordered,
            number,
            delim,
            width: marker_len + 1,
            content: "",
        });
    }
    let padding: usize = rest
        .chars()
        .take_while(|c| *c == ' ' || *c == '\t')
        .map(|c| if c == '\t' { 4 } else { 1 })
        .sum();
    if padding == 0 {
        return None;
    }
    Some(ListMarker {
        ordered,
        number,
        delim,
        width: marker_len + if padding > 4 { 1 } else { padding },
        content: rest.trim(),
    })
}

/// Lines that end a lazy list continuation
fn starts_block(text: &str) -> bool {
    atx_heading(text).is_some()
        || Fence::open(text, 0).is_some()
        || is_thematic_break(text)
        || text.starts_with('>')
}

/// Lines that end a paragraph without a blank line in between
fn interrupts_paragraph(text: &str) -> bool {
    starts_block(text)
        || list_marker(text)
            .is_some_and(|m| !m.content.is_empty() && m.number.map_or(true, |n| n == 1))
}

fn image_meta(content: &str) -> Option<ImageMeta> {
    let captures = IMAGE_PARAGRAPH.captures(content)?;
    let url = captures.get(2)?.as_str();
    let url = url
        .strip_prefix('<')
        .and_then(|u| u.strip_suffix('>'))
        .unwrap_or(url);
    Some(ImageMeta {
        alt: captures.get(1).map_or("", |m| m.as_str()).to_string(),
        image_url: url.to_string(),
    })
}
