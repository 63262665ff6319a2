//! ABSTRACTU content core
//!
//! Concepts, append-only sentence chains and the draft publishing flow that
//! feeds them.
//!
//! # Features
//!
//! - Markdown ingestion into typed block fragments
//! - Gapless, doubly linked sentence chains per concept
//! - Atomic draft publication with retry on aborted transactions
//! - Cursor pagination and list regrouping for readers
//! - HTTP/JSON API

/// HTTP routes and server
pub mod api;
/// Sentence chain planning and verification
pub mod chain;
/// Configuration management
pub mod config;
/// Database operations and connection pooling
pub mod db;
/// Error types
pub mod error;
/// Logging setup and utilities
pub mod logging;
/// Markdown ingestion
pub mod markdown;
/// Metrics collection
pub mod metrics;
/// Data models and structures
pub mod models;
/// Rendering and grouping for readers
pub mod render;
/// Repository pattern for data access
pub mod repository;
/// Database schema definitions
pub mod schema;
/// Validation, retry and observability around the store
pub mod service;
/// Input validation and sanitization
pub mod validation;

// Re-export key components for easier access
pub use db::Database;
pub use error::{ChainError, Result};
pub use markdown::{MarkdownIngest, MarkdownParser};
pub use models::{Cid, Concept, Draft, FragmentKind, Sentence, SentencePage};
pub use service::ContentService;
