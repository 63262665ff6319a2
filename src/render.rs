//! Rendering and grouping of sentence chains
//!
//! Readers receive a flat chain; list items are stored one per sentence, so
//! consecutive items are regrouped here into list blocks before rendering.

use std::collections::HashSet;
use std::fmt::{self, Write as _};
use std::sync::Arc;

use async_trait::async_trait;

use crate::error::Result;
use crate::models::{Cid, FragmentKind, PageRequest, Sentence, SentencePage};

/// A maximal run of consecutive list items
#[derive(Debug, Clone, PartialEq)]
pub struct ListBlock {
    /// Taken from the first item of the run
    pub ordered: bool,
    /// Depth of the first item of the run
    pub indentation: u32,
    /// Items in chain order
    pub items: Vec<Sentence>,
}

/// A unit of rendered output
#[derive(Debug, Clone, PartialEq)]
pub enum Block {
    /// Any fragment that is not a list item
    Single(Sentence),
    /// A run of list items
    List(ListBlock),
}

/// Group consecutive list items into list blocks.
///
/// Runs never extend across a non-list fragment. Grouping is idempotent:
/// `group(&flatten(&group(s))) == group(s)`.
#[must_use]
pub fn group(sentences: &[Sentence]) -> Vec<Block> {
    let mut blocks: Vec<Block> = Vec::new();
    for sentence in sentences {
        match (&sentence.kind, blocks.last_mut()) {
            (FragmentKind::ListItem(_), Some(Block::List(list))) => list.items.push(sentence.clone()),
            (FragmentKind::ListItem(meta), _) => blocks.push(Block::List(ListBlock {
                ordered: meta.ordered,
                indentation: meta.indentation,
                items: vec![sentence.clone()],
            })),
            _ => blocks.push(Block::Single(sentence.clone())),
        }
    }
    blocks
}

/// Undo [`group`], returning sentences in order
#[must_use]
pub fn flatten(blocks: &[Block]) -> Vec<Sentence> {
    blocks
        .iter()
        .flat_map(|block| match block {
            Block::Single(sentence) => std::slice::from_ref(sentence),
            Block::List(list) => list.items.as_slice(),
        })
        .cloned()
        .collect()
}

/// Render grouped blocks as HTML. All content is escaped.
#[must_use]
pub fn render_html(blocks: &[Block]) -> String {
    let mut html = String::new();
    // formatting into a String never fails
    let _ = write_blocks(&mut html, blocks);
    html
}

fn write_blocks(html: &mut String, blocks: &[Block]) -> fmt::Result {
    for block in blocks {
        match block {
            Block::Single(sentence) => render_single(html, sentence)?,
            Block::List(list) => render_list(html, list)?,
        }
        html.push('\n');
    }
    Ok(())
}

fn render_single(html: &mut String, sentence: &Sentence) -> fmt::Result {
    let content = escape_html(&sentence.content);
    match &sentence.kind {
        FragmentKind::Paragraph => write!(html, "<p>{content}</p>"),
        FragmentKind::Heading1 => write!(html, "<h1>{content}</h1>"),
        FragmentKind::Heading2 => write!(html, "<h2>{content}</h2>"),
        FragmentKind::Heading3 => write!(html, "<h3>{content}</h3>"),
        FragmentKind::Heading4 => write!(html, "<h4>{content}</h4>"),
        FragmentKind::Heading5 => write!(html, "<h5>{content}</h5>"),
        FragmentKind::Heading6 => write!(html, "<h6>{content}</h6>"),
        FragmentKind::Code(meta) => write!(
            html,
            "<pre><code class=\"language-{}\">{content}</code></pre>",
            escape_html(&meta.lang)
        ),
        FragmentKind::Blockquote => write!(html, "<blockquote>{content}</blockquote>"),
        FragmentKind::HorizontalRule => write!(html, "<hr />"),
        FragmentKind::Image(meta) => write!(
            html,
            "<img src=\"{}\" alt=\"{}\" />",
            escape_html(&meta.image_url),
            escape_html(&meta.alt)
        ),
        // a lone item outside a list block still renders as a list
        FragmentKind::ListItem(meta) => render_list(
            html,
            &ListBlock {
                ordered: meta.ordered,
                indentation: meta.indentation,
                items: vec![sentence.clone()],
            },
        ),
    }
}

fn render_list(html: &mut String, list: &ListBlock) -> fmt::Result {
    let tag = if list.ordered { "ol" } else { "ul" };
    if list.indentation > 0 {
        write!(html, "<{tag} style=\"margin-left: {}rem\">", list.indentation - 1)?;
    } else {
        write!(html, "<{tag}>")?;
    }

    for item in &list.items {
        let (indent, prefix) = item.kind.list_meta().map_or((0, String::new()), |meta| {
            let prefix = match (meta.ordered, meta.item_number) {
                (true, Some(number)) => format!("{number}. "),
                _ => String::new(),
            };
            (meta.indentation, prefix)
        });
        write!(
            html,
            "<li style=\"margin-left: {indent}rem\">{prefix}{}</li>",
            escape_html(&item.content)
        )?;
    }

    write!(html, "</{tag}>")
}

/// Escape text for HTML element content and quoted attributes
#[must_use]
pub fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

/// Anything that serves pages of a chain
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SentenceSource: Send + Sync {
    async fn fetch_page(&self, cid: Cid, page: PageRequest) -> Result<SentencePage>;
}

#[async_trait]
impl<T: SentenceSource + ?Sized> SentenceSource for Arc<T> {
    async fn fetch_page(&self, cid: Cid, page: PageRequest) -> Result<SentencePage> {
        (**self).fetch_page(cid, page).await
    }
}

/// Infinite-scroll state over one concept's chain.
///
/// Each `load_more` fetches the page at the current cursor and keeps only
/// sentences it has not seen yet.
pub struct SentenceFeed<S> {
    source: S,
    cid: Cid,
    limit: u32,
    next_sid: Option<u32>,
    sentences: Vec<Sentence>,
    seen: HashSet<u32>,
}

impl<S: SentenceSource> SentenceFeed<S> {
    pub fn new(source: S, cid: Cid, limit: u32) -> Self {
        Self {
            source,
            cid,
            limit,
            next_sid: Some(0),
            sentences: Vec::new(),
            seen: HashSet::new(),
        }
    }

    /// Fetch the next page; returns how many new sentences were added
    pub async fn load_more(&mut self) -> Result<usize> {
        let Some(start_sid) = self.next_sid else {
            return Ok(0);
        };

        let page = self
            .source
            .fetch_page(
                self.cid,
                PageRequest {
                    start_sid,
                    limit: self.limit,
                },
            )
            .await?;

        let before = self.sentences.len();
        for sentence in page.sentences {
            if self.seen.insert(sentence.sid) {
                self.sentences.push(sentence);
            }
        }

        // a cursor that does not advance would loop forever
        self.next_sid = page.next_sid.filter(|next| *next > start_sid);
        Ok(self.sentences.len() - before)
    }

    /// Keep loading until the chain is exhausted
    pub async fn load_all(&mut self) -> Result<&[Sentence]> {
        while !self.is_exhausted() {
            self.load_more().await?;
        }
        Ok(&self.sentences)
    }

    #[must_use]
    pub fn sentences(&self) -> &[Sentence] {
        &self.sentences
    }

    /// Loaded sentences grouped for rendering
    #[must_use]
    pub fn blocks(&self) -> Vec<Block> {
        group(&self.sentences)
    }

    #[must_use]
    pub const fn is_exhausted(&self) -> bool {
        self.next_sid.is_none()
    }
}
