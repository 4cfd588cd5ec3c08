//! Conversation assembly.
//!
//! Folds the ordered message stream into conversations keyed by the effective
//! contact: the chat's participant from the lookup table, else the message's
//! own handle, else `Unknown`.

use std::collections::HashMap;

use tracing::{debug, info, warn};

use crate::attachments::ResolvedAttachments;
use crate::metrics::MetricsCollector;
use crate::models::{ChatHandleLookup, ConversationSet, Message, MessageRow, NO_CHAT_ID, UNKNOWN_CONTACT};
use crate::timestamp;

/// In-band markers the store leaves where an attachment sat in the text
pub const MISSING_CONTENT_MARKERS: [&str; 2] = ["\u{FFFC}", "[OBJ]"];

/// Default label substituted for missing-content markers
pub const DEFAULT_PLACEHOLDER: &str = "(Attachment)";

/// Escape text for embedding in HTML element content or attribute values
#[must_use]
pub fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#x27;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

/// Replace missing-content markers with `placeholder`, then escape
#[must_use]
pub fn render_body(raw: Option<&str>, placeholder: &str) -> String {
    let mut text = raw.unwrap_or_default().to_string();
    for marker in MISSING_CONTENT_MARKERS {
        if text.contains(marker) {
            text = text.replace(marker, placeholder);
        }
    }
    escape_html(&text)
}

/// Builds a [`ConversationSet`] from the store's message stream
pub struct ConversationAssembler<'a> {
    chats: &'a ChatHandleLookup,
    attachments: &'a ResolvedAttachments,
    placeholder: String,
    chat_keys: HashMap<i64, Option<String>>,
}

impl<'a> ConversationAssembler<'a> {
    /// Assembler over the two immutable lookup tables
    #[must_use]
    pub fn new(chats: &'a ChatHandleLookup, attachments: &'a ResolvedAttachments) -> Self {
        Self {
            chats,
            attachments,
            placeholder: DEFAULT_PLACEHOLDER.to_string(),
            chat_keys: HashMap::new(),
        }
    }

    /// Use a different label for missing-content markers
    #[must_use]
    pub fn with_placeholder(mut self, placeholder: &str) -> Self {
        self.placeholder = placeholder.to_string();
        self
    }

    /// Effective conversation key for a message row.
    ///
    /// The lookup is consulted once per chat id. A chat with an entry always
    /// maps to that entry, including the `Unknown` sentinel; only a chat with
    /// no entry falls back to the message's own handle.
    pub fn conversation_key(&mut self, row: &MessageRow) -> String {
        let chat_id = row.chat_id.unwrap_or(NO_CHAT_ID);
        let chats = self.chats;
        let from_chat = self
            .chat_keys
            .entry(chat_id)
            .or_insert_with(|| chats.get(chat_id).map(|handle| handle.as_key().to_string()));

        match from_chat {
            Some(key) => key.clone(),
            None => row
                .handle
                .as_deref()
                .filter(|h| !h.is_empty())
                .unwrap_or(UNKNOWN_CONTACT)
                .to_string(),
        }
    }

    /// Decode one row into a [`Message`]
    #[must_use]
    pub fn build_message(&self, row: &MessageRow) -> Message {
        let decoded = timestamp::decode(row.date);
        if decoded.is_fallback() {
            warn!(message = row.rowid, raw = row.date, "Timestamp out of range, showing raw value");
        }
        Message {
            rowid: row.rowid,
            from_me: row.is_from_me,
            raw_text: row.text.clone(),
            body: render_body(row.text.as_deref(), &self.placeholder),
            timestamp: decoded,
            attachments: self.attachments.get(row.rowid).to_vec(),
        }
    }

    /// Group the stream in arrival order. The stream is not re-sorted.
    pub fn assemble(&mut self, rows: &[MessageRow], metrics: &mut MetricsCollector) -> ConversationSet {
        let mut set = ConversationSet::new();
        for row in rows {
            let key = self.conversation_key(row);
            let message = self.build_message(row);
            metrics.record_message(message.timestamp.is_fallback());
            debug!(message = row.rowid, conversation = %key, "Assembled message");
            set.push(&key, message);
        }
        metrics.record_conversations(set.len());
        info!(conversations = set.len(), messages = set.message_count(), "Assembled conversations");
        set
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ChatHandle;
    use proptest::prelude::*;

    fn row(rowid: i64, chat_id: Option<i64>, handle: Option<&str>, text: Option<&str>) -> MessageRow {
        MessageRow {
            rowid,
            date: rowid * 10,
            is_from_me: false,
            text: text.map(ToString::to_string),
            chat_id,
            handle: handle.map(ToString::to_string),
        }
    }

    fn lookup() -> ChatHandleLookup {
        ChatHandleLookup::from_rows(vec![(1, Some("alice".to_string())), (2, None)])
    }

    #[test]
    fn escapes_markup() {
        assert_eq!(
            escape_html(r#"<b>"Tom" & 'Jerry'</b>"#),
            "&lt;b&gt;&quot;Tom&quot; &amp; &#x27;Jerry&#x27;&lt;/b&gt;"
        );
    }

    #[test]
    fn markers_become_placeholder() {
        assert_eq!(render_body(Some("\u{FFFC}"), "(Attachment)"), "(Attachment)");
        assert_eq!(render_body(Some("look [OBJ] <3"), "(Attachment)"), "look (Attachment) &lt;3");
        assert_eq!(render_body(None, "(Attachment)"), "");
    }

    #[test]
    fn key_from_chat_lookup() {
        let chats = lookup();
        let resolved = ResolvedAttachments::default();
        let mut assembler = ConversationAssembler::new(&chats, &resolved);
        assert_eq!(assembler.conversation_key(&row(1, Some(1), Some("bob"), Some("x"))), "alice");
    }

    #[test]
    fn unknown_sentinel_does_not_fall_back() {
        let chats = lookup();
        assert_eq!(chats.get(2), Some(&ChatHandle::Unknown));
        let resolved = ResolvedAttachments::default();
        let mut assembler = ConversationAssembler::new(&chats, &resolved);
        assert_eq!(assembler.conversation_key(&row(1, Some(2), Some("bob"), Some("x"))), "Unknown");
    }

    #[test]
    fn absent_chat_falls_back_to_handle() {
        let chats = lookup();
        let resolved = ResolvedAttachments::default();
        let mut assembler = ConversationAssembler::new(&chats, &resolved);
        assert_eq!(assembler.conversation_key(&row(1, None, Some("bob"), Some("x"))), "bob");
        assert_eq!(assembler.conversation_key(&row(2, Some(99), Some("carol"), Some("x"))), "carol");
        assert_eq!(assembler.conversation_key(&row(3, None, None, Some("x"))), "Unknown");
    }

    #[test]
    fn assemble_preserves_arrival_order() {
        let chats = lookup();
        let resolved = ResolvedAttachments::default();
        let mut assembler = ConversationAssembler::new(&chats, &resolved);
        let rows = vec![
            row(5, None, Some("bob"), Some("first")),
            row(1, Some(1), None, Some("hi")),
            row(3, Some(1), None, Some("again")),
            row(2, None, Some("bob"), Some("second")),
        ];
        let mut metrics = MetricsCollector::default();
        let set = assembler.assemble(&rows, &mut metrics);

        let keys: Vec<&str> = set.iter().map(|c| c.key.as_str()).collect();
        assert_eq!(keys, vec!["bob", "alice"]);
        let alice: Vec<i64> = set.get("alice").unwrap().messages.iter().map(|m| m.rowid).collect();
        assert_eq!(alice, vec![1, 3]);
        let bob: Vec<i64> = set.get("bob").unwrap().messages.iter().map(|m| m.rowid).collect();
        assert_eq!(bob, vec![5, 2]);
        assert_eq!(metrics.messages, 4);
        assert_eq!(metrics.conversations, 2);
    }

    #[test]
    fn custom_placeholder() {
        let chats = lookup();
        let resolved = ResolvedAttachments::default();
        let assembler = ConversationAssembler::new(&chats, &resolved).with_placeholder("[image]");
        let message = assembler.build_message(&row(1, Some(1), None, Some("\u{FFFC}")));
        assert_eq!(message.body, "[image]");
        assert_eq!(message.raw_text.as_deref(), Some("\u{FFFC}"));
    }

    proptest! {
        #[test]
        fn escaped_text_has_no_markup(text in ".*") {
            let escaped = escape_html(&text);
            prop_assert!(!escaped.contains('<'));
            prop_assert!(!escaped.contains('>'));
            prop_assert!(!escaped.contains('"'));
            prop_assert!(!escaped.contains('\''));
        }
    }
}
