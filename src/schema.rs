//! Database schema definitions
//!
//! This module provides constants for table and column names used with
//! rusqlite. The tables themselves are created by the SQL files under
//! `migrations/`.

/// Concepts table schema
pub mod concepts {
    /// Table name
    pub const TABLE: &str = "concepts";
    /// Single-letter concept identifier (primary key)
    pub const CID: &str = "cid";
    /// Title column
    pub const TITLE: &str = "title";
    /// Description column
    pub const DESCRIPTION: &str = "description";
    /// Cover image URL column
    pub const COVER_IMAGE: &str = "cover_image";
    /// JSON-encoded tag list column
    pub const TAGS: &str = "tags";
    /// Creation timestamp column
    pub const CREATED_AT: &str = "created_at";
    /// Next sid to hand out for this concept
    pub const NEXT_SID: &str = "next_sid";
}

/// Sentences table schema
pub mod sentences {
    /// Table name
    pub const TABLE: &str = "sentences";
    /// Owning concept column
    pub const CID: &str = "cid";
    /// Sequence number column, unique together with `cid`
    pub const SID: &str = "sid";
    /// Previous-link column
    pub const PSID: &str = "psid";
    /// Next-link column
    pub const NSID: &str = "nsid";
    /// Fragment type column
    pub const KIND: &str = "kind";
    /// JSON-encoded fragment metadata column
    pub const METADATA: &str = "metadata";
    /// Markdown content column
    pub const CONTENT: &str = "content";
    /// Publication timestamp column
    pub const PUBLISHED_AT: &str = "published_at";
}

/// Drafts table schema
pub mod drafts {
    /// Table name
    pub const TABLE: &str = "drafts";
    /// Draft UUID column
    pub const DID: &str = "did";
    /// Lowercase author address column
    pub const AUTHOR_ADDRESS: &str = "author_address";
    /// Draft type column
    pub const KIND: &str = "kind";
    /// Target concept column
    pub const CID: &str = "cid";
    /// Markdown content column
    pub const CONTENT: &str = "content";
    /// First save timestamp column
    pub const CREATED_AT: &str = "created_at";
    /// Last save timestamp column
    pub const UPDATED_AT: &str = "updated_at";
}
