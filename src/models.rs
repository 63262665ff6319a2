//! Data models for concepts, sentences and drafts
//!
//! This module contains all data structures used throughout the application,
//! including the fragment kinds produced by markdown ingestion and the
//! records persisted in the store.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{ChainError, Result};

/// Default page size for sentence retrieval
pub const DEFAULT_PAGE_LIMIT: u32 = 20;
/// Largest page size a caller may request
pub const MAX_PAGE_LIMIT: u32 = 100;
/// Code language used when a fence carries no info string
pub const DEFAULT_CODE_LANG: &str = "plaintext";

/// Concept identifier: a single lowercase ASCII letter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Cid(char);

impl Cid {
    /// Parse a cid, rejecting anything but `^[a-z]$`
    pub fn parse(raw: &str) -> Result<Self> {
        let mut chars = raw.chars();
        match (chars.next(), chars.next()) {
            (Some(c), None) if c.is_ascii_lowercase() => Ok(Self(c)),
            _ => Err(ChainError::Validation(
                "Invalid Concept ID format. Must be a single lowercase letter.".to_string(),
            )),
        }
    }

    /// The underlying letter
    #[must_use]
    pub const fn as_char(self) -> char {
        self.0
    }
}

impl fmt::Display for Cid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Cid {
    type Err = ChainError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl TryFrom<String> for Cid {
    type Error = ChainError;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(&value)
    }
}

impl From<Cid> for String {
    fn from(cid: Cid) -> Self {
        cid.to_string()
    }
}

/// A top-level content unit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Concept {
    /// Concept identifier
    pub cid: Cid,
    /// Display title
    pub title: String,
    /// Short description
    pub description: String,
    /// Cover image URL
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cover_image: Option<String>,
    /// Free-form tags
    #[serde(default)]
    pub tags: Vec<String>,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
}

/// Summary row used by concept listings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConceptSummary {
    /// Concept identifier
    pub cid: Cid,
    /// Display title
    pub title: String,
}

/// Data for seeding a new concept
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewConcept {
    /// Concept identifier (raw, validated on seed)
    pub cid: String,
    /// Display title
    pub title: String,
    /// Short description
    pub description: String,
    /// Cover image URL
    #[serde(default)]
    pub cover_image: Option<String>,
    /// Free-form tags
    #[serde(default)]
    pub tags: Option<Vec<String>>,
    /// Markdown body parsed into the first sentence batch
    pub initial_content: String,
}

/// Metadata carried by list items
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListItemMeta {
    /// True for numbered lists
    pub ordered: bool,
    /// Nesting depth, 0 for top-level items
    pub indentation: u32,
    /// Number displayed for ordered items
    #[serde(skip_serializing_if = "Option::is_none")]
    pub item_number: Option<u32>,
    /// Start value of the enclosing ordered list
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start: Option<u32>,
}

/// Metadata carried by code blocks
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodeMeta {
    /// Language hint from the fence
    pub lang: String,
    /// Remainder of the fence info string
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meta: Option<String>,
}

impl Default for CodeMeta {
    fn default() -> Self {
        Self {
            lang: DEFAULT_CODE_LANG.to_string(),
            meta: None,
        }
    }
}

/// Metadata carried by standalone images
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageMeta {
    /// Alternative text
    pub alt: String,
    /// Image location
    pub image_url: String,
}

/// Fragment type together with the metadata that applies to it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "metadata", rename_all = "camelCase")]
pub enum FragmentKind {
    /// Plain paragraph
    Paragraph,
    /// `#` heading
    Heading1,
    /// `##` heading
    Heading2,
    /// `###` heading
    Heading3,
    /// `####` heading
    Heading4,
    /// `#####` heading
    Heading5,
    /// `######` heading
    Heading6,
    /// One item of a (possibly nested) list
    ListItem(ListItemMeta),
    /// Fenced or indented code block
    Code(CodeMeta),
    /// Block quotation
    Blockquote,
    /// Thematic break
    HorizontalRule,
    /// Paragraph made of a single image
    Image(ImageMeta),
}

impl FragmentKind {
    /// Heading kind for a level between 1 and 6
    #[must_use]
    pub const fn heading(level: usize) -> Option<Self> {
        match level {
            1 => Some(Self::Heading1),
            2 => Some(Self::Heading2),
            3 => Some(Self::Heading3),
            4 => Some(Self::Heading4),
            5 => Some(Self::Heading5),
            6 => Some(Self::Heading6),
            _ => None,
        }
    }

    /// Wire name of the type
    #[must_use]
    pub const fn type_name(&self) -> &'static str {
        match self {
            Self::Paragraph => "paragraph",
            Self::Heading1 => "heading1",
            Self::Heading2 => "heading2",
            Self::Heading3 => "heading3",
            Self::Heading4 => "heading4",
            Self::Heading5 => "heading5",
            Self::Heading6 => "heading6",
            Self::ListItem(_) => "listItem",
            Self::Code(_) => "code",
            Self::Blockquote => "blockquote",
            Self::HorizontalRule => "horizontalRule",
            Self::Image(_) => "image",
        }
    }

    /// List metadata if this is a list item
    #[must_use]
    pub const fn list_meta(&self) -> Option<&ListItemMeta> {
        match self {
            Self::ListItem(meta) => Some(meta),
            _ => None,
        }
    }

    /// True for list items
    #[must_use]
    pub const fn is_list_item(&self) -> bool {
        matches!(self, Self::ListItem(_))
    }

    /// Split into the stored `(type, metadata JSON)` pair
    pub fn to_columns(&self) -> Result<(String, Option<String>)> {
        let value = serde_json::to_value(self)?;
        let metadata = match value.get("metadata") {
            Some(meta) if !meta.is_null() => Some(meta.to_string()),
            _ => None,
        };
        Ok((self.type_name().to_string(), metadata))
    }

    /// Rebuild from the stored `(type, metadata JSON)` pair
    pub fn from_columns(type_name: &str, metadata: Option<&str>) -> Result<Self> {
        let mut object = serde_json::Map::new();
        object.insert("type".to_string(), serde_json::Value::from(type_name));
        if let Some(raw) = metadata {
            object.insert("metadata".to_string(), serde_json::from_str(raw)?);
        }
        Ok(serde_json::from_value(serde_json::Value::Object(object))?)
    }
}

/// A typed markdown fragment produced by ingestion, before a sid is assigned
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParsedFragment {
    /// Owning concept
    pub cid: Cid,
    /// Provisional 0-based position inside the parsed batch
    pub position: usize,
    /// Type and metadata
    #[serde(flatten)]
    pub kind: FragmentKind,
    /// Raw markdown text for this fragment
    pub content: String,
}

/// A sentence ready to be written, with sid and links assigned
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewSentence {
    /// Owning concept
    pub cid: Cid,
    /// Sequence number within the concept
    pub sid: u32,
    /// Previous sentence in the chain
    pub psid: Option<u32>,
    /// Next sentence in the chain
    pub nsid: Option<u32>,
    /// Type and metadata
    pub kind: FragmentKind,
    /// Raw markdown text
    pub content: String,
}

/// A persisted content fragment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Sentence {
    /// Owning concept
    pub cid: Cid,
    /// Sequence number within the concept
    pub sid: u32,
    /// Previous sentence in the chain
    pub psid: Option<u32>,
    /// Next sentence in the chain
    pub nsid: Option<u32>,
    /// Type and metadata
    #[serde(flatten)]
    pub kind: FragmentKind,
    /// Raw markdown text
    pub content: String,
    /// Time the fragment was appended
    pub published_at: DateTime<Utc>,
}

/// One page of a concept's sentence chain
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SentencePage {
    /// Sentences in ascending sid order
    pub sentences: Vec<Sentence>,
    /// Cursor for the following page, `None` when the chain is exhausted
    pub next_sid: Option<u32>,
}

/// Validated pagination request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    /// First sid to return
    pub start_sid: u32,
    /// Maximum number of sentences
    pub limit: u32,
}

impl Default for PageRequest {
    fn default() -> Self {
        Self {
            start_sid: 0,
            limit: DEFAULT_PAGE_LIMIT,
        }
    }
}

/// What a draft targets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DraftKind {
    /// Appends to a concept's sentence chain
    Concept,
}

impl DraftKind {
    /// Stored name
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Concept => "concept",
        }
    }
}

impl FromStr for DraftKind {
    type Err = ChainError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "concept" => Ok(Self::Concept),
            other => Err(ChainError::Validation(format!("Unknown draft type: {other}"))),
        }
    }
}

/// Markdown staged by an author before publication
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Draft {
    /// Draft identifier
    pub did: Uuid,
    /// Lowercase author address
    pub author_address: String,
    /// Draft target
    #[serde(rename = "type")]
    pub kind: DraftKind,
    /// Target concept
    pub cid: Cid,
    /// Markdown content
    pub content: String,
    /// First save
    pub created_at: DateTime<Utc>,
    /// Most recent save
    pub updated_at: DateTime<Utc>,
}

/// Outcome of seeding a concept
#[derive(Debug, Clone, PartialEq)]
pub struct SeedOutcome {
    /// The stored concept
    pub concept: Concept,
    /// The first sentence batch
    pub sentences: Vec<Sentence>,
}
