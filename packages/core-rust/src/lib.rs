//! Robot MCP Core — tenant identity, chat records, settings, and the shared
//! response envelope.

pub mod chat;
pub mod identity;
pub mod settings;
pub mod types;

pub use chat::{extract_message_content, ChatMessage, TextMessageItem};
pub use identity::{ParsedIdentity, TenantIdentity, METADATA_FIELDS};
pub use settings::{
    normalize_ai_base_url, AiConfig, ChatRoomSettings, Contact, GlobalSettings, SummaryDenied,
};
pub use types::{ApiResponse, Metadata};
