//! Read-only access to the iMessage message store.
//!
//! [`MessageStore`] issues the three queries the exporter needs and hands back
//! immutable lookup tables plus the ordered message stream. Nothing here
//! writes to the store.

use std::path::{Path, PathBuf};

use rusqlite::{Connection, OpenFlags, Row};
use tracing::{debug, info};

use crate::error::{ExportError, Result};
use crate::models::{AttachmentIndex, AttachmentRef, ChatHandleLookup, MessageRow, UNKNOWN_CONTACT};
use crate::schema::{attachment, chat, chat_handle_join, chat_message_join, handle, message, message_attachment_join};

/// Read-only connection to a message store
pub struct MessageStore {
    conn: Connection,
    path: PathBuf,
}

impl MessageStore {
    /// Open the store at `path` read-only.
    ///
    /// The file must already exist; SQLite is never allowed to create it.
    pub fn open(path: &Path) -> Result<Self> {
        let flags = OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_URI | OpenFlags::SQLITE_OPEN_NO_MUTEX;
        let conn = Connection::open_with_flags(path, flags).map_err(|source| ExportError::StoreOpen {
            path: path.to_path_buf(),
            source,
        })?;

        // Opening is lazy; touch the schema so an unreadable file fails here.
        conn.query_row("SELECT count(*) FROM sqlite_master", [], |row| row.get::<_, i64>(0))
            .map_err(|source| ExportError::StoreOpen {
                path: path.to_path_buf(),
                source,
            })?;

        info!(path = %path.display(), "Opened message store");
        Ok(Self {
            conn,
            path: path.to_path_buf(),
        })
    }

    /// Wrap an existing connection (used by tests with in-memory stores)
    #[must_use]
    pub fn from_connection(conn: Connection) -> Self {
        Self {
            conn,
            path: PathBuf::from(":memory:"),
        }
    }

    /// Path the store was opened from
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Build the chat room → participant lookup
    pub fn chat_handle_lookup(&self) -> Result<ChatHandleLookup> {
        let query = format!(
            "SELECT c.{chat_rowid}, IFNULL(h.{handle_addr}, '{unknown}')
             FROM {chat} c
             LEFT JOIN {chj} chj ON chj.{chj_chat} = c.{chat_rowid}
             LEFT JOIN {handle} h ON h.{handle_rowid} = chj.{chj_handle}
             ORDER BY c.{chat_rowid}, chj.{chj_handle}",
            chat = chat::TABLE,
            chat_rowid = chat::ROWID,
            chj = chat_handle_join::TABLE,
            chj_chat = chat_handle_join::CHAT_ID,
            chj_handle = chat_handle_join::HANDLE_ID,
            handle = handle::TABLE,
            handle_rowid = handle::ROWID,
            handle_addr = handle::ID,
            unknown = UNKNOWN_CONTACT,
        );

        let mut stmt = self.conn.prepare(&query)?;
        let rows = stmt
            .query_map([], |row| Ok((row.get::<_, i64>(0)?, row.get::<_, Option<String>>(1)?)))?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        let lookup = ChatHandleLookup::from_rows(rows);
        debug!(chats = lookup.len(), "Built chat handle lookup");
        Ok(lookup)
    }

    /// Build the message → attachments index
    pub fn attachment_index(&self) -> Result<AttachmentIndex> {
        let query = format!(
            "SELECT ma.{maj_message}, a.{att_rowid}, a.{filename}, a.{mime}, a.{transfer}, a.{guid}
             FROM {maj} ma
             JOIN {att} a ON a.{att_rowid} = ma.{maj_attachment}
             ORDER BY ma.{maj_message}, a.{att_rowid}",
            maj = message_attachment_join::TABLE,
            maj_message = message_attachment_join::MESSAGE_ID,
            maj_attachment = message_attachment_join::ATTACHMENT_ID,
            att = attachment::TABLE,
            att_rowid = attachment::ROWID,
            filename = attachment::FILENAME,
            mime = attachment::MIME_TYPE,
            transfer = attachment::TRANSFER_NAME,
            guid = attachment::GUID,
        );

        let mut stmt = self.conn.prepare(&query)?;
        let rows = stmt
            .query_map([], Self::map_attachment_link)?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        let index = AttachmentIndex::from_rows(rows);
        debug!(links = index.link_count(), "Built attachment index");
        Ok(index)
    }

    /// Every message with text or at least one attachment, ordered by chat
    /// room then send time
    pub fn message_stream(&self) -> Result<Vec<MessageRow>> {
        let query = format!(
            "SELECT m.{rowid}, COALESCE(m.{date}, 0), m.{from_me}, m.{text}, cmj.{cmj_chat}, h.{handle_addr}
             FROM {message} m
             LEFT JOIN {cmj} cmj ON cmj.{cmj_message} = m.{rowid}
             LEFT JOIN {handle} h ON h.{handle_rowid} = m.{msg_handle}
             WHERE m.{text} IS NOT NULL
                OR m.{rowid} IN (SELECT {maj_message} FROM {maj})
             ORDER BY cmj.{cmj_chat}, m.{date}",
            message = message::TABLE,
            rowid = message::ROWID,
            date = message::DATE,
            from_me = message::IS_FROM_ME,
            text = message::TEXT,
            msg_handle = message::HANDLE_ID,
            cmj = chat_message_join::TABLE,
            cmj_chat = chat_message_join::CHAT_ID,
            cmj_message = chat_message_join::MESSAGE_ID,
            handle = handle::TABLE,
            handle_rowid = handle::ROWID,
            handle_addr = handle::ID,
            maj = message_attachment_join::TABLE,
            maj_message = message_attachment_join::MESSAGE_ID,
        );

        let mut stmt = self.conn.prepare(&query)?;
        let rows = stmt
            .query_map([], Self::map_message_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        debug!(messages = rows.len(), "Read message stream");
        Ok(rows)
    }

    fn map_attachment_link(row: &Row) -> rusqlite::Result<(i64, AttachmentRef)> {
        Ok((
            row.get(0)?,
            AttachmentRef {
                attachment_id: row.get(1)?,
                filename: row.get(2)?,
                mime_type: row.get(3)?,
                transfer_name: row.get(4)?,
                guid: row.get(5)?,
            },
        ))
    }

    fn map_message_row(row: &Row) -> rusqlite::Result<MessageRow> {
        Ok(MessageRow {
            rowid: row.get(0)?,
            date: row.get(1)?,
            is_from_me: row.get::<_, Option<i64>>(2)?.unwrap_or(0) != 0,
            text: row.get(3)?,
            chat_id: row.get(4)?,
            handle: row.get(5)?,
        })
    }
}
