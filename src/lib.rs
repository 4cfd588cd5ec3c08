//! iMessage Export - Conversation Reconstruction and Rendering
//!
//! A Rust library that rebuilds conversation threads from an iMessage
//! message store, copies their attachments out of a backup tree and renders
//! everything into one browsable HTML document.
//!
//! # Pipeline
//!
//! - Read the chat→handle lookup, attachment index and message stream from
//!   the store (read-only)
//! - Decode store timestamps (2001 epoch, seconds or nanoseconds)
//! - Resolve attachments by stored filename or by guid digest, copying hits
//!   into the export
//! - Group messages into conversations by effective contact
//! - Render the conversations as a tabbed HTML page

/// Attachment resolution and copying
pub mod attachments;
/// Configuration management
pub mod config;
/// Conversation assembly
pub mod conversation;
/// Read-only message store access
pub mod db;
/// Error types
pub mod error;
/// Logging setup and utilities
pub mod logging;
/// Run accounting
pub mod metrics;
/// Data models and structures
pub mod models;
/// HTML rendering
pub mod render;
/// Message store schema definitions
pub mod schema;
/// Export pipeline
pub mod service;
/// Store timestamp decoding
pub mod timestamp;
/// Input validation and sanitization
pub mod validation;

// Re-export key components for easier access
pub use db::MessageStore;
pub use error::{ExportError, Result};
pub use models::{Attachment, Conversation, ConversationSet, Message, Resolution};
pub use service::{ExportOptions, ExportService};
