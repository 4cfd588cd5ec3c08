//! Message store schema definitions
//!
//! Table and column names of the iMessage `sms.db` / `chat.db` store, used to
//! build the read-only queries in [`crate::db`]. Only the columns the exporter
//! reads are listed.

/// Chat rooms (one row per conversation thread)
pub mod chat {
    /// Table name
    pub const TABLE: &str = "chat";
    /// Primary key column
    pub const ROWID: &str = "ROWID";
}

/// Participant handles (phone numbers, email addresses)
pub mod handle {
    /// Table name
    pub const TABLE: &str = "handle";
    /// Primary key column
    pub const ROWID: &str = "ROWID";
    /// Address column
    pub const ID: &str = "id";
}

/// Chat to participant links
pub mod chat_handle_join {
    /// Table name
    pub const TABLE: &str = "chat_handle_join";
    /// Foreign key to `chat`
    pub const CHAT_ID: &str = "chat_id";
    /// Foreign key to `handle`
    pub const HANDLE_ID: &str = "handle_id";
}

/// Messages
pub mod message {
    /// Table name
    pub const TABLE: &str = "message";
    /// Primary key column
    pub const ROWID: &str = "ROWID";
    /// Send time, seconds or nanoseconds since 2001-01-01
    pub const DATE: &str = "date";
    /// 1 when the device owner sent the message
    pub const IS_FROM_ME: &str = "is_from_me";
    /// Message body
    pub const TEXT: &str = "text";
    /// Foreign key to `handle`
    pub const HANDLE_ID: &str = "handle_id";
}

/// Chat to message links
pub mod chat_message_join {
    /// Table name
    pub const TABLE: &str = "chat_message_join";
    /// Foreign key to `chat`
    pub const CHAT_ID: &str = "chat_id";
    /// Foreign key to `message`
    pub const MESSAGE_ID: &str = "message_id";
}

/// Attachments
pub mod attachment {
    /// Table name
    pub const TABLE: &str = "attachment";
    /// Primary key column
    pub const ROWID: &str = "ROWID";
    /// Stored file path
    pub const FILENAME: &str = "filename";
    /// Declared MIME type
    pub const MIME_TYPE: &str = "mime_type";
    /// Name shown to the user
    pub const TRANSFER_NAME: &str = "transfer_name";
    /// Globally unique identifier
    pub const GUID: &str = "guid";
}

/// Message to attachment links
pub mod message_attachment_join {
    /// Table name
    pub const TABLE: &str = "message_attachment_join";
    /// Foreign key to `message`
    pub const MESSAGE_ID: &str = "message_id";
    /// Foreign key to `attachment`
    pub const ATTACHMENT_ID: &str = "attachment_id";
}
