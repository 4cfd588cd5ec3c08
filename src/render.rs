//! HTML rendering of assembled conversations.
//!
//! One self-contained document: a tab bar with a button per conversation and
//! a section per conversation listing its messages. Styling and the tab
//! script are static assets compiled into the binary.

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

use crate::conversation::escape_html;
use crate::error::Result;
use crate::models::{Attachment, Conversation, ConversationSet, Message};

const STYLE: &str = include_str!("../assets/export.css");
const SCRIPT: &str = include_str!("../assets/export.js");

/// Write the full document for `conversations` to `writer`
pub fn write_document<W: Write>(writer: &mut W, conversations: &ConversationSet, title: &str) -> io::Result<()> {
    writeln!(writer, "<!DOCTYPE html>")?;
    writeln!(writer, "<html>")?;
    writeln!(writer, "<head>")?;
    writeln!(writer, "<meta charset=\"UTF-8\">")?;
    writeln!(writer, "<title>{}</title>", escape_html(title))?;
    writeln!(writer, "<style>\n{STYLE}</style>")?;
    writeln!(writer, "</head>")?;
    writeln!(writer, "<body>")?;
    writeln!(writer)?;

    writeln!(writer, "<div class=\"tabbar\">")?;
    for (idx, conversation) in conversations.iter().enumerate() {
        writeln!(
            writer,
            "<button class=\"tablink\" onclick=\"openTab(event, 'tab{idx}')\">{}</button>",
            escape_html(&conversation.key)
        )?;
    }
    writeln!(writer, "</div>")?;
    writeln!(writer)?;

    if conversations.is_empty() {
        writeln!(writer, "<div class=\"empty\">No messages were found in this store.</div>")?;
    }
    for (idx, conversation) in conversations.iter().enumerate() {
        write_conversation(writer, idx, conversation)?;
    }

    writeln!(writer)?;
    writeln!(writer, "<script>\n{SCRIPT}</script>")?;
    writeln!(writer)?;
    writeln!(writer, "</body>")?;
    writeln!(writer, "</html>")?;
    Ok(())
}

fn write_conversation<W: Write>(writer: &mut W, idx: usize, conversation: &Conversation) -> io::Result<()> {
    writeln!(writer, "<div id=\"tab{idx}\" class=\"tabcontent\">")?;
    writeln!(writer, "<h2>Chat with {}</h2>", escape_html(&conversation.key))?;
    for message in &conversation.messages {
        write_message(writer, message)?;
    }
    writeln!(writer, "</div>")
}

fn write_message<W: Write>(writer: &mut W, message: &Message) -> io::Result<()> {
    let bubble_class = if message.from_me { "from-me" } else { "from-them" };
    write!(writer, "<div class=\"container\">")?;
    if !message.body.is_empty() {
        write!(writer, "<div class=\"bubble {bubble_class}\">{}</div>", message.body)?;
    }
    for attachment in &message.attachments {
        write_attachment(writer, attachment)?;
    }
    writeln!(writer, "<div class=\"timestamp\">{}</div></div>", message.timestamp)
}

fn write_attachment<W: Write>(writer: &mut W, attachment: &Attachment) -> io::Result<()> {
    let label = escape_html(attachment.label());
    match attachment.resolution.path() {
        Some(path) if attachment.is_inline_image() => write!(
            writer,
            "<div class=\"image\"><img src=\"{}\" alt=\"{label}\" /></div>",
            escape_html(path)
        ),
        Some(path) => write!(
            writer,
            "<div class=\"attachment-placeholder\">Attachment: <a href=\"{}\">{label}</a></div>",
            escape_html(path)
        ),
        None => write!(
            writer,
            "<div class=\"attachment-placeholder missing\">Attachment not found: {label}</div>"
        ),
    }
}

/// Render the document into a string
#[must_use]
pub fn render_document(conversations: &ConversationSet, title: &str) -> String {
    let mut buffer = Vec::new();
    // Writing into a Vec cannot fail.
    let _ = write_document(&mut buffer, conversations, title);
    String::from_utf8_lossy(&buffer).into_owned()
}

/// Write the document to `path`, replacing any existing file
pub fn write_document_file(path: &Path, conversations: &ConversationSet, title: &str) -> Result<()> {
    let file = File::create(path)?;
    let mut writer = BufWriter::new(file);
    write_document(&mut writer, conversations, title)?;
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Resolution, UnresolvedReason};
    use crate::timestamp::decode;

    fn message(body: &str, from_me: bool, attachments: Vec<Attachment>) -> Message {
        Message {
            rowid: 1,
            from_me,
            raw_text: Some(body.to_string()),
            body: body.to_string(),
            timestamp: decode(0),
            attachments,
        }
    }

    fn attachment(resolution: Resolution, mime: &str) -> Attachment {
        Attachment {
            reference_key: "ab/IMG_1.jpg".to_string(),
            mime_type: Some(mime.to_string()),
            display_name: Some("IMG_1.jpg".to_string()),
            resolution,
        }
    }

    #[test]
    fn renders_tabs_and_bubbles() {
        let mut set = ConversationSet::new();
        set.push("alice", message("Hi", false, Vec::new()));
        set.push("alice", message("Hey", true, Vec::new()));
        set.push("<bob>", message("Yo", false, Vec::new()));

        let html = render_document(&set, "iMessage Export");
        assert!(html.contains("<title>iMessage Export</title>"));
        assert!(html.contains("openTab(event, 'tab0')\">alice</button>"));
        assert!(html.contains("openTab(event, 'tab1')\">&lt;bob&gt;</button>"));
        assert!(html.contains("<h2>Chat with alice</h2>"));
        assert!(html.contains("<div class=\"bubble from-them\">Hi</div>"));
        assert!(html.contains("<div class=\"bubble from-me\">Hey</div>"));
        assert!(html.contains("<div class=\"timestamp\">2001-01-01 00:00:00</div>"));
        assert!(!html.contains("<img"));
    }

    #[test]
    fn images_inline_and_other_attachments_as_placeholders() {
        let mut set = ConversationSet::new();
        set.push(
            "alice",
            message(
                "(Attachment)",
                false,
                vec![
                    attachment(Resolution::Resolved("attachments/ab/IMG_1.jpg".to_string()), "image/jpeg"),
                    attachment(Resolution::Resolved("attachments/ab/clip.mov".to_string()), "video/quicktime"),
                    attachment(Resolution::Unresolved(UnresolvedReason::NoReference), "image/jpeg"),
                ],
            ),
        );

        let html = render_document(&set, "t");
        assert!(html.contains("<img src=\"attachments/ab/IMG_1.jpg\" alt=\"IMG_1.jpg\" />"));
        assert!(html.contains("Attachment: <a href=\"attachments/ab/clip.mov\">IMG_1.jpg</a>"));
        assert!(html.contains("Attachment not found: IMG_1.jpg"));
        assert!(html.contains(">(Attachment)</div>"));
    }

    #[test]
    fn empty_set_still_renders() {
        let html = render_document(&ConversationSet::new(), "t");
        assert!(html.contains("No messages were found"));
        assert!(html.trim_end().ends_with("</html>"));
    }

    #[test]
    fn writes_to_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.html");
        let mut set = ConversationSet::new();
        set.push("alice", message("Hi", false, Vec::new()));
        write_document_file(&path, &set, "t").unwrap();
        let written = std::fs::read_to_string(&path).unwrap();
        assert_eq!(written, render_document(&set, "t"));
    }
}
