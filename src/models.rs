//! Data models for conversation reconstruction
//!
//! Raw rows as they come out of the message store, the lookup tables built
//! from them, and the assembled conversations handed to the renderer.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::timestamp::DecodedTimestamp;

/// Chat id used for messages that are not linked to any chat room
pub const NO_CHAT_ID: i64 = -1;

/// Conversation key used when no participant identity survives
pub const UNKNOWN_CONTACT: &str = "Unknown";

/// Participant recorded for a chat room in the chat→handle lookup
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatHandle {
    /// A participant address was found
    Known(String),
    /// The chat exists but no participant handle could be joined
    Unknown,
}

impl ChatHandle {
    /// Key this entry contributes to conversation grouping
    #[must_use]
    pub fn as_key(&self) -> &str {
        match self {
            Self::Known(handle) => handle,
            Self::Unknown => UNKNOWN_CONTACT,
        }
    }
}

/// Chat room id → participant handle, immutable once built
#[derive(Debug, Clone, Default)]
pub struct ChatHandleLookup {
    entries: HashMap<i64, ChatHandle>,
}

impl ChatHandleLookup {
    /// Build the lookup from `(chat id, handle address)` rows.
    ///
    /// A chat may appear once per participant. The first known participant
    /// wins; a chat whose rows carry no address keeps the `Unknown` sentinel.
    pub fn from_rows<I>(rows: I) -> Self
    where
        I: IntoIterator<Item = (i64, Option<String>)>,
    {
        let mut entries: HashMap<i64, ChatHandle> = HashMap::new();
        for (chat_id, handle) in rows {
            let candidate = match handle {
                Some(h) if h != UNKNOWN_CONTACT => ChatHandle::Known(h),
                _ => ChatHandle::Unknown,
            };
            match entries.get(&chat_id) {
                Some(ChatHandle::Known(_)) => {},
                _ => {
                    entries.insert(chat_id, candidate);
                },
            }
        }
        Self { entries }
    }

    /// Entry for a chat room, if the chat table knows it
    #[must_use]
    pub fn get(&self, chat_id: i64) -> Option<&ChatHandle> {
        self.entries.get(&chat_id)
    }

    /// Number of chat rooms in the lookup
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when the store has no chats
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// One (message, attachment) link as read from the store
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttachmentRef {
    /// Attachment row id
    pub attachment_id: i64,
    /// Stored file path (Strategy A reference)
    pub filename: Option<String>,
    /// Declared MIME type
    pub mime_type: Option<String>,
    /// Declared display name
    pub transfer_name: Option<String>,
    /// Globally unique identifier (Strategy B reference)
    pub guid: Option<String>,
}

impl AttachmentRef {
    /// Key used to memoise resolution and to name the attachment.
    ///
    /// The stored filename when present, otherwise the guid.
    #[must_use]
    pub fn reference_key(&self) -> Option<&str> {
        non_empty(self.filename.as_deref()).or_else(|| non_empty(self.guid.as_deref()))
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.trim().is_empty())
}

/// Message id → attachment links, immutable once built
#[derive(Debug, Clone, Default)]
pub struct AttachmentIndex {
    by_message: HashMap<i64, Vec<AttachmentRef>>,
}

impl AttachmentIndex {
    /// Group `(message id, attachment)` rows by message, keeping row order
    pub fn from_rows<I>(rows: I) -> Self
    where
        I: IntoIterator<Item = (i64, AttachmentRef)>,
    {
        let mut by_message: HashMap<i64, Vec<AttachmentRef>> = HashMap::new();
        for (message_id, attachment) in rows {
            by_message.entry(message_id).or_default().push(attachment);
        }
        Self { by_message }
    }

    /// Attachments linked to a message (empty when none)
    #[must_use]
    pub fn get(&self, message_id: i64) -> &[AttachmentRef] {
        self.by_message.get(&message_id).map_or(&[], Vec::as_slice)
    }

    /// Iterate over every message id and its attachments, in message id order
    pub fn iter(&self) -> impl Iterator<Item = (i64, &[AttachmentRef])> {
        let mut ids: Vec<i64> = self.by_message.keys().copied().collect();
        ids.sort_unstable();
        ids.into_iter().map(move |id| (id, self.get(id)))
    }

    /// Total number of links
    #[must_use]
    pub fn link_count(&self) -> usize {
        self.by_message.values().map(Vec::len).sum()
    }
}

/// A message row from the store, before decoding
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageRow {
    /// Message row id
    pub rowid: i64,
    /// Raw send time
    pub date: i64,
    /// True if the device owner sent the message
    pub is_from_me: bool,
    /// Raw text, absent for attachment-only messages
    pub text: Option<String>,
    /// Linked chat room, absent when the message has no chat link
    pub chat_id: Option<i64>,
    /// Address of the message's own handle
    pub handle: Option<String>,
}

/// Why an attachment could not be copied into the export
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum UnresolvedReason {
    /// The attachment row has neither a filename nor a guid
    #[error("attachment has no filename or guid")]
    NoReference,
    /// The filename cannot be mapped to a path inside the output tree
    #[error("unusable attachment reference: {0}")]
    InvalidReference(String),
    /// No strategy found a source file
    #[error("no backup file found (tried {})", display_paths(.tried))]
    NotFound {
        /// Source paths that were checked
        tried: Vec<PathBuf>,
    },
    /// A source file was found but copying it failed
    #[error("copying {} failed: {message}", .path.display())]
    CopyFailed {
        /// Source path being copied
        path: PathBuf,
        /// I/O error text
        message: String,
    },
}

fn display_paths(paths: &[PathBuf]) -> String {
    if paths.is_empty() {
        return "nothing".to_string();
    }
    paths.iter().map(|p| p.display().to_string()).collect::<Vec<_>>().join(", ")
}

/// Outcome of resolving one attachment reference
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// Copied; path is relative to the export root, `/`-separated
    Resolved(String),
    /// Not copied
    Unresolved(UnresolvedReason),
}

impl Resolution {
    /// Export-relative path when resolved
    #[must_use]
    pub fn path(&self) -> Option<&str> {
        match self {
            Self::Resolved(path) => Some(path),
            Self::Unresolved(_) => None,
        }
    }

    /// True when the file was copied
    #[must_use]
    pub const fn is_resolved(&self) -> bool {
        matches!(self, Self::Resolved(_))
    }
}

const IMAGE_EXTENSIONS: [&str; 5] = ["jpg", "jpeg", "png", "gif", "webp"];

/// An attachment with its resolution result
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    /// Filename or guid the attachment was resolved by
    pub reference_key: String,
    /// Declared MIME type
    pub mime_type: Option<String>,
    /// Declared display name
    pub display_name: Option<String>,
    /// Copy outcome
    pub resolution: Resolution,
}

impl Attachment {
    /// True when the attachment was copied and a browser can show it inline
    #[must_use]
    pub fn is_inline_image(&self) -> bool {
        let Some(path) = self.resolution.path() else {
            return false;
        };
        let by_extension = Path::new(path)
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| IMAGE_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()));
        let by_mime = self.mime_type.as_deref().is_some_and(|mime| {
            mime.strip_prefix("image/")
                .is_some_and(|sub| IMAGE_EXTENSIONS.contains(&sub.to_ascii_lowercase().as_str()))
        });
        by_extension || by_mime
    }

    /// Name to show for the attachment in placeholders
    #[must_use]
    pub fn label(&self) -> &str {
        self.display_name
            .as_deref()
            .filter(|name| !name.trim().is_empty())
            .unwrap_or(&self.reference_key)
    }
}

/// A decoded message ready for rendering
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    /// Source row id
    pub rowid: i64,
    /// True if sent by the device owner
    pub from_me: bool,
    /// Raw text as stored
    pub raw_text: Option<String>,
    /// Escaped text with missing-content markers replaced
    pub body: String,
    /// Decoded send time
    pub timestamp: DecodedTimestamp,
    /// Attachments in link order
    pub attachments: Vec<Attachment>,
}

/// All messages grouped under one effective conversation key
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Conversation {
    /// Effective conversation key
    pub key: String,
    /// Messages in arrival order
    pub messages: Vec<Message>,
}

/// Conversations in first-seen order
#[derive(Debug, Clone, Default)]
pub struct ConversationSet {
    conversations: Vec<Conversation>,
    positions: HashMap<String, usize>,
}

impl ConversationSet {
    /// Create an empty set
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a message to the conversation for `key`, creating it on first use
    pub fn push(&mut self, key: &str, message: Message) {
        let index = if let Some(&index) = self.positions.get(key) {
            index
        } else {
            self.conversations.push(Conversation {
                key: key.to_string(),
                messages: Vec::new(),
            });
            let index = self.conversations.len() - 1;
            self.positions.insert(key.to_string(), index);
            index
        };
        self.conversations[index].messages.push(message);
    }

    /// Conversation for a key
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Conversation> {
        self.positions.get(key).map(|&index| &self.conversations[index])
    }

    /// Iterate in first-seen order
    pub fn iter(&self) -> std::slice::Iter<'_, Conversation> {
        self.conversations.iter()
    }

    /// Number of conversations
    #[must_use]
    pub fn len(&self) -> usize {
        self.conversations.len()
    }

    /// True when nothing was assembled
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.conversations.is_empty()
    }

    /// Messages across all conversations
    #[must_use]
    pub fn message_count(&self) -> usize {
        self.conversations.iter().map(|c| c.messages.len()).sum()
    }
}

impl<'a> IntoIterator for &'a ConversationSet {
    type Item = &'a Conversation;
    type IntoIter = std::slice::Iter<'a, Conversation>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
