use std::sync::LazyLock;

use regex::Regex;
use uuid::Uuid;

use crate::error::{ChainError, Result};
use crate::models::{Cid, PageRequest, DEFAULT_PAGE_LIMIT, MAX_PAGE_LIMIT};

/// Largest markdown body accepted for a draft or an initial seed
pub const MAX_CONTENT_BYTES: usize = 1024 * 1024;

static ADDRESS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^0x[0-9a-fA-F]{40}$").expect("address pattern is valid"));

fn invalid(message: impl Into<String>) -> ChainError {
    ChainError::Validation(message.into())
}

/// Validation utilities for request input
#[derive(Debug, Copy, Clone)]
pub struct InputValidator;

impl InputValidator {
    /// Validate a concept identifier
    pub fn validate_cid(raw: &str) -> Result<Cid> {
        Cid::parse(raw)
    }

    /// Parse the `startSid` cursor, defaulting to the chain head
    pub fn parse_start_sid(raw: Option<&str>) -> Result<u32> {
        match raw.map(str::trim) {
            None | Some("") => Ok(0),
            Some(value) => value
                .parse::<u32>()
                .map_err(|_| invalid("Invalid startSid parameter.")),
        }
    }

    /// Parse the page `limit`, rejecting values outside `1..=100`
    pub fn parse_limit(raw: Option<&str>) -> Result<u32> {
        let Some(value) = raw else {
            return Ok(DEFAULT_PAGE_LIMIT);
        };
        match value.trim().parse::<u32>() {
            Ok(limit) if (1..=MAX_PAGE_LIMIT).contains(&limit) => Ok(limit),
            _ => Err(invalid(format!(
                "Invalid limit parameter (must be between 1 and {MAX_PAGE_LIMIT})."
            ))),
        }
    }

    /// Build a page request from raw query values
    pub fn page_request(start_sid: Option<&str>, limit: Option<&str>) -> Result<PageRequest> {
        Ok(PageRequest {
            start_sid: Self::parse_start_sid(start_sid)?,
            limit: Self::parse_limit(limit)?,
        })
    }

    /// Validate a concept title
    pub fn validate_title(title: &str) -> Result<String> {
        let title = title.trim();
        if title.is_empty() {
            return Err(invalid("Title cannot be empty"));
        }
        if title.chars().count() > 200 {
            return Err(invalid("Title too long (max 200 characters)"));
        }
        if title.contains('\0') || title.contains('\n') || title.contains('\r') {
            return Err(invalid("Title contains invalid characters"));
        }
        Ok(title.to_string())
    }

    /// Validate a concept description
    pub fn validate_description(description: &str) -> Result<String> {
        let description = description.trim();
        if description.is_empty() {
            return Err(invalid("Description cannot be empty"));
        }
        if description.chars().count() > 2000 {
            return Err(invalid("Description too long (max 2000 characters)"));
        }
        Ok(description.to_string())
    }

    /// Validate and normalize tags; blank tags are dropped
    pub fn validate_tags(tags: Option<&[String]>) -> Result<Vec<String>> {
        let tags: Vec<String> = tags
            .unwrap_or_default()
            .iter()
            .map(|tag| tag.trim())
            .filter(|tag| !tag.is_empty())
            .map(ToString::to_string)
            .collect();

        if tags.len() > 20 {
            return Err(invalid("Too many tags (max 20)"));
        }
        if tags.iter().any(|tag| tag.chars().count() > 50) {
            return Err(invalid("Tag too long (max 50 characters)"));
        }
        Ok(tags)
    }

    /// Validate an optional cover image URL
    pub fn validate_cover_image(url: Option<&str>) -> Result<Option<String>> {
        let Some(url) = url.map(str::trim).filter(|u| !u.is_empty()) else {
            return Ok(None);
        };
        if url.len() > 2048 {
            return Err(invalid("Cover image URL too long"));
        }
        if !(url.starts_with("https://") || url.starts_with("http://") || url.starts_with('/')) {
            return Err(invalid("Cover image must be an http(s) URL or an absolute path"));
        }
        Ok(Some(url.to_string()))
    }

    /// Validate a wallet address and return it lowercased
    pub fn validate_address(address: &str) -> Result<String> {
        let address = address.trim();
        if !ADDRESS.is_match(address) {
            return Err(invalid("Invalid wallet address"));
        }
        Ok(address.to_ascii_lowercase())
    }

    /// Validate the markdown a concept is seeded with
    pub fn validate_initial_content(content: &str) -> Result<()> {
        if content.trim().is_empty() {
            return Err(invalid("Initial content cannot be empty"));
        }
        Self::validate_content_size(content)
    }

    /// Validate draft markdown; empty drafts are allowed
    pub fn validate_draft_content(content: &str) -> Result<()> {
        Self::validate_content_size(content)
    }

    fn validate_content_size(content: &str) -> Result<()> {
        if content.len() > MAX_CONTENT_BYTES {
            return Err(invalid("Content too large (max 1 MiB)"));
        }
        if content.contains('\0') {
            return Err(invalid("Content contains invalid characters"));
        }
        Ok(())
    }

    /// Parse a draft identifier
    pub fn validate_draft_id(raw: &str) -> Result<Uuid> {
        Uuid::parse_str(raw.trim()).map_err(|_| invalid("Invalid draft id"))
    }
}
