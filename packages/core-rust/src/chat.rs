//! Chat message records and the text extracted from them for summaries.
//!
//! Message rows are written by the robot's chat client; this crate only reads
//! them. Plain text messages are used verbatim. App messages (type 49) carry
//! an XML payload whose `<appmsg>` element decides how the message is rendered.

use quick_xml::events::Event;
use quick_xml::Reader;
use serde::{Deserialize, Serialize};

/// Top-level message type: plain text.
pub const MESSAGE_TYPE_TEXT: i64 = 1;
/// Top-level message type: app message with an XML payload.
pub const MESSAGE_TYPE_APP: i64 = 49;

/// App message sub-types that are rendered into summaries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppMessageKind {
    /// Quote/reply (57): the reply text lives in `title`.
    Quote,
    /// Shared video (4) or article link (5).
    WebShare,
    /// File attachment (6).
    Attachment,
}

impl AppMessageKind {
    #[must_use]
    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "57" => Some(Self::Quote),
            "4" | "5" => Some(Self::WebShare),
            "6" => Some(Self::Attachment),
            _ => None,
        }
    }
}

/// A message row as read from the tenant database.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub sender_wxid: String,
    /// Display name of the sender; falls back to `sender_wxid`.
    pub sender_nickname: String,
    pub msg_type: i64,
    pub content: String,
    /// Unix seconds.
    pub created_at: i64,
}

/// One line of a conversation transcript.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextMessageItem {
    pub nickname: String,
    pub message: String,
    /// Unix seconds.
    pub created_at: i64,
}

impl ChatMessage {
    /// Converts the row into a transcript item, or `None` when the message
    /// type is not rendered into summaries.
    #[must_use]
    pub fn into_text_item(self) -> Option<TextMessageItem> {
        let message = extract_message_content(self.msg_type, &self.content)?;
        let nickname = if self.sender_nickname.is_empty() {
            self.sender_wxid
        } else {
            self.sender_nickname
        };
        Some(TextMessageItem {
            nickname,
            message,
            created_at: self.created_at,
        })
    }
}

// ---------------------------------------------------------------------------
// App message XML
// ---------------------------------------------------------------------------

/// Extracts the displayable text of a message.
///
/// Returns `None` for message types that are skipped. A type-49 payload that
/// is not well-formed XML is returned raw.
#[must_use]
pub fn extract_message_content(msg_type: i64, content: &str) -> Option<String> {
    match msg_type {
        MESSAGE_TYPE_TEXT => Some(content.to_string()),
        MESSAGE_TYPE_APP => extract_app_message(content),
        _ => None,
    }
}

fn extract_app_message(content: &str) -> Option<String> {
    if content.is_empty() {
        return None;
    }
    let Ok(fields) = AppFields::parse(content) else {
        return Some(content.to_string());
    };

    let kind = AppMessageKind::from_code(fields.kind_code?.trim())?;
    let title = fields.title.unwrap_or_default();
    let rendered = match kind {
        AppMessageKind::Quote => title,
        AppMessageKind::WebShare => {
            let des = fields.des.unwrap_or_default();
            format!("网页分享消息，标题: {title}，描述：{des}")
        }
        AppMessageKind::Attachment => format!("文件消息，文件名: {title}"),
    };
    Some(rendered)
}

/// The payload is not a single well-formed XML document.
#[derive(Debug)]
struct Malformed;

impl From<quick_xml::Error> for Malformed {
    fn from(_: quick_xml::Error) -> Self {
        Self
    }
}

#[derive(Debug, Clone, Copy)]
enum Field {
    Type,
    Title,
    Des,
}

/// Direct children of the first nested `<appmsg>` elements. Elements under
/// `<refermsg>` and other descendants are not picked up.
#[derive(Debug, Default)]
struct AppFields {
    kind_code: Option<String>,
    title: Option<String>,
    des: Option<String>,
}

/// Text collected for one field element, up to its first child element.
struct Capture {
    field: Field,
    depth: usize,
    text: String,
    closed: bool,
}

impl AppFields {
    fn slot(&mut self, field: Field) -> &mut Option<String> {
        match field {
            Field::Type => &mut self.kind_code,
            Field::Title => &mut self.title,
            Field::Des => &mut self.des,
        }
    }

    /// Field an element named `name` fills when opened under `open`, if it
    /// is still unset. The root element itself is never treated as `appmsg`.
    fn target(&mut self, open: &[Vec<u8>], name: &[u8]) -> Option<Field> {
        if open.len() < 2 || open.last().map(Vec::as_slice) != Some(b"appmsg".as_slice()) {
            return None;
        }
        let field = match name {
            b"type" => Field::Type,
            b"title" => Field::Title,
            b"des" => Field::Des,
            _ => return None,
        };
        self.slot(field).is_none().then_some(field)
    }

    fn parse(xml: &str) -> Result<Self, Malformed> {
        let mut reader = Reader::from_str(xml);
        let mut fields = Self::default();
        let mut open: Vec<Vec<u8>> = Vec::new();
        let mut root_done = false;
        let mut capture: Option<Capture> = None;

        loop {
            match reader.read_event()? {
                Event::Start(e) => {
                    if root_done {
                        return Err(Malformed);
                    }
                    let name = e.name().as_ref().to_vec();
                    if let Some(c) = capture.as_mut() {
                        c.closed = true;
                    } else if let Some(field) = fields.target(&open, &name) {
                        capture = Some(Capture {
                            field,
                            depth: open.len() + 1,
                            text: String::new(),
                            closed: false,
                        });
                    }
                    open.push(name);
                }
                Event::Empty(e) => {
                    if root_done {
                        return Err(Malformed);
                    }
                    if let Some(c) = capture.as_mut() {
                        c.closed = true;
                    } else if let Some(field) = fields.target(&open, e.name().as_ref()) {
                        *fields.slot(field) = Some(String::new());
                    }
                    root_done = open.is_empty();
                }
                Event::End(_) => {
                    if open.pop().is_none() {
                        return Err(Malformed);
                    }
                    if capture.as_ref().is_some_and(|c| c.depth == open.len() + 1) {
                        if let Some(c) = capture.take() {
                            *fields.slot(c.field) = Some(c.text);
                        }
                    }
                    root_done = open.is_empty();
                }
                Event::Text(t) => {
                    let text = t.unescape()?;
                    collect_text(&open, capture.as_mut(), &text)?;
                }
                Event::CData(c) => {
                    let text = std::str::from_utf8(&c).map_err(|_| Malformed)?;
                    collect_text(&open, capture.as_mut(), text)?;
                }
                Event::Eof => break,
                _ => {}
            }
        }

        if open.is_empty() && root_done {
            Ok(fields)
        } else {
            Err(Malformed)
        }
    }
}

/// Appends text to the active capture when it sits directly in the field
/// element.
fn collect_text(
    open: &[Vec<u8>],
    capture: Option<&mut Capture>,
    text: &str,
) -> Result<(), Malformed> {
    if open.is_empty() {
        // Only whitespace may surround the root element.
        return if text.trim().is_empty() {
            Ok(())
        } else {
            Err(Malformed)
        };
    }
    if let Some(c) = capture {
        if !c.closed && c.depth == open.len() {
            c.text.push_str(text);
        }
    }
    Ok(())
}
