//! Fixture builders shared by the integration tests.
#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

use rusqlite::{params, Connection};
use tempfile::TempDir;

use imessage_export::ExportOptions;

const SCHEMA: &str = "
    CREATE TABLE chat (ROWID INTEGER PRIMARY KEY AUTOINCREMENT, chat_identifier TEXT);
    CREATE TABLE handle (ROWID INTEGER PRIMARY KEY AUTOINCREMENT, id TEXT NOT NULL);
    CREATE TABLE chat_handle_join (chat_id INTEGER, handle_id INTEGER);
    CREATE TABLE message (
        ROWID INTEGER PRIMARY KEY AUTOINCREMENT,
        guid TEXT,
        text TEXT,
        handle_id INTEGER DEFAULT 0,
        date INTEGER,
        is_from_me INTEGER DEFAULT 0
    );
    CREATE TABLE chat_message_join (chat_id INTEGER, message_id INTEGER);
    CREATE TABLE attachment (
        ROWID INTEGER PRIMARY KEY AUTOINCREMENT,
        guid TEXT,
        filename TEXT,
        mime_type TEXT,
        transfer_name TEXT
    );
    CREATE TABLE message_attachment_join (message_id INTEGER, attachment_id INTEGER);
";

/// A message store, backup tree and output directory in one temp dir
pub struct Fixture {
    pub dir: TempDir,
    pub conn: Connection,
}

impl Fixture {
    pub fn new() -> Self {
        let dir = TempDir::new().expect("temp dir");
        fs::create_dir_all(dir.path().join("backup")).expect("backup dir");
        let conn = Connection::open(dir.path().join("sms.db")).expect("store");
        conn.execute_batch(SCHEMA).expect("schema");
        Self { dir, conn }
    }

    pub fn db_path(&self) -> PathBuf {
        self.dir.path().join("sms.db")
    }

    pub fn backup(&self) -> PathBuf {
        self.dir.path().join("backup")
    }

    pub fn output(&self) -> PathBuf {
        self.dir.path().join("out")
    }

    pub fn handle(&self, address: &str) -> i64 {
        self.conn.execute("INSERT INTO handle (id) VALUES (?1)", params![address]).expect("handle");
        self.conn.last_insert_rowid()
    }

    pub fn chat(&self, handles: &[i64]) -> i64 {
        self.conn.execute("INSERT INTO chat (chat_identifier) VALUES (NULL)", []).expect("chat");
        let chat_id = self.conn.last_insert_rowid();
        for handle in handles {
            self.conn
                .execute("INSERT INTO chat_handle_join VALUES (?1, ?2)", params![chat_id, handle])
                .expect("chat handle");
        }
        chat_id
    }

    pub fn message(&self, chat: Option<i64>, handle: Option<i64>, text: Option<&str>, date: i64, from_me: bool) -> i64 {
        self.conn
            .execute(
                "INSERT INTO message (text, handle_id, date, is_from_me) VALUES (?1, ?2, ?3, ?4)",
                params![text, handle.unwrap_or(0), date, i64::from(from_me)],
            )
            .expect("message");
        let message_id = self.conn.last_insert_rowid();
        if let Some(chat) = chat {
            self.conn
                .execute("INSERT INTO chat_message_join VALUES (?1, ?2)", params![chat, message_id])
                .expect("chat message");
        }
        message_id
    }

    pub fn attachment(&self, message: i64, filename: Option<&str>, guid: Option<&str>, mime: &str, name: &str) -> i64 {
        self.conn
            .execute(
                "INSERT INTO attachment (guid, filename, mime_type, transfer_name) VALUES (?1, ?2, ?3, ?4)",
                params![guid, filename, mime, name],
            )
            .expect("attachment");
        let attachment_id = self.conn.last_insert_rowid();
        self.conn
            .execute("INSERT INTO message_attachment_join VALUES (?1, ?2)", params![message, attachment_id])
            .expect("message attachment");
        attachment_id
    }

    pub fn blob(&self, relative: &str, contents: &[u8]) -> PathBuf {
        let path = self.backup().join(relative);
        fs::create_dir_all(path.parent().expect("parent")).expect("blob dir");
        fs::write(&path, contents).expect("blob");
        path
    }

    pub fn options(&self) -> ExportOptions {
        ExportOptions {
            database_path: self.db_path(),
            backup_root: self.backup(),
            output_root: self.output(),
            document_name: "imessages.html".to_string(),
            attachments_dir: "attachments".to_string(),
            placeholder_label: "(Attachment)".to_string(),
            title: "iMessage Export".to_string(),
        }
    }
}

pub fn read(path: &Path) -> String {
    fs::read_to_string(path).expect("read output")
}
