//! Robot-wide and per-chat-room settings, and how they combine into the AI
//! configuration used for a chat-room summary.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

/// Model used when neither the global nor the chat-room settings name one.
pub const DEFAULT_SUMMARY_MODEL: &str = "gpt-3.5-turbo";

/// Robot-wide settings (single row of `global_settings`).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GlobalSettings {
    pub chat_ai_enabled: bool,
    pub chat_base_url: String,
    pub chat_api_key: String,
    pub chat_room_summary_enabled: bool,
    pub chat_room_summary_model: String,
}

/// Per-chat-room overrides (`chat_room_settings`). `None` means "inherit".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatRoomSettings {
    pub chat_room_id: String,
    pub chat_base_url: Option<String>,
    pub chat_api_key: Option<String>,
    pub chat_room_summary_enabled: Option<bool>,
    pub chat_room_summary_model: Option<String>,
}

/// Contact or chat-room entry (`contacts`).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contact {
    pub wechat_id: String,
    pub nickname: Option<String>,
    pub remark: String,
}

impl Contact {
    /// Nickname when set and non-empty.
    #[must_use]
    pub fn display_name(&self) -> Option<&str> {
        self.nickname.as_deref().filter(|n| !n.is_empty())
    }
}

/// Why a summary is not allowed for the current chat room.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SummaryDenied {
    #[error("chat AI is not configured in the global settings")]
    GlobalAiDisabled,
    #[error("chat-room summary is not enabled for this chat room")]
    ChatRoomSummaryDisabled,
}

/// Effective credentials and model for the completion call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AiConfig {
    pub api_key: String,
    /// Normalised to end in a `/vN` version segment.
    pub base_url: String,
    pub model: String,
}

impl AiConfig {
    /// Combines global and chat-room settings.
    ///
    /// The global settings must enable chat AI and carry both an API key and a
    /// base URL; the chat room must enable summaries. Non-empty chat-room
    /// values override the global ones.
    ///
    /// # Errors
    ///
    /// Returns [`SummaryDenied`] when either gate is closed.
    pub fn resolve(
        global: &GlobalSettings,
        room: &ChatRoomSettings,
    ) -> Result<Self, SummaryDenied> {
        if !global.chat_ai_enabled
            || global.chat_api_key.is_empty()
            || global.chat_base_url.is_empty()
        {
            return Err(SummaryDenied::GlobalAiDisabled);
        }
        if !room.chat_room_summary_enabled.unwrap_or(false) {
            return Err(SummaryDenied::ChatRoomSummaryDisabled);
        }

        let api_key = non_empty(room.chat_api_key.as_deref()).unwrap_or(&global.chat_api_key);
        let base_url = non_empty(room.chat_base_url.as_deref()).unwrap_or(&global.chat_base_url);
        let model = non_empty(room.chat_room_summary_model.as_deref())
            .or_else(|| non_empty(Some(global.chat_room_summary_model.as_str())))
            .unwrap_or(DEFAULT_SUMMARY_MODEL);

        Ok(Self {
            api_key: api_key.to_string(),
            base_url: normalize_ai_base_url(base_url),
            model: model.to_string(),
        })
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.is_empty())
}

static VERSION_SUFFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"/v\d+$").expect("valid regex"));

/// Trims trailing slashes and appends `/v1` unless the URL already ends in a
/// version segment such as `/v1` or `/v3`.
#[must_use]
pub fn normalize_ai_base_url(base_url: &str) -> String {
    let trimmed = base_url.trim_end_matches('/');
    if VERSION_SUFFIX.is_match(trimmed) {
        trimmed.to_string()
    } else {
        format!("{trimmed}/v1")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn global() -> GlobalSettings {
        GlobalSettings {
            chat_ai_enabled: true,
            chat_base_url: "https://api.example.com/".to_string(),
            chat_api_key: "sk-global".to_string(),
            chat_room_summary_enabled: true,
            chat_room_summary_model: String::new(),
        }
    }

    fn room() -> ChatRoomSettings {
        ChatRoomSettings {
            chat_room_id: "room1".to_string(),
            chat_room_summary_enabled: Some(true),
            ..ChatRoomSettings::default()
        }
    }

    #[test]
    fn normalize_appends_v1() {
        assert_eq!(normalize_ai_base_url("https://a.com"), "https://a.com/v1");
        assert_eq!(normalize_ai_base_url("https://a.com///"), "https://a.com/v1");
        assert_eq!(normalize_ai_base_url("https://a.com/v3/"), "https://a.com/v3");
        assert_eq!(normalize_ai_base_url("https://a.com/api/v12"), "https://a.com/api/v12");
        assert_eq!(normalize_ai_base_url("https://a.com/v1beta"), "https://a.com/v1beta/v1");
    }

    #[test]
    fn global_values_apply_without_overrides() {
        let cfg = AiConfig::resolve(&global(), &room()).unwrap();
        assert_eq!(cfg.api_key, "sk-global");
        assert_eq!(cfg.base_url, "https://api.example.com/v1");
        assert_eq!(cfg.model, DEFAULT_SUMMARY_MODEL);
    }

    #[test]
    fn chat_room_values_override_global() {
        let mut g = global();
        g.chat_room_summary_model = "global-model".to_string();
        let r = ChatRoomSettings {
            chat_api_key: Some("sk-room".to_string()),
            chat_base_url: Some("https://room.example.com/v2".to_string()),
            chat_room_summary_model: Some("room-model".to_string()),
            ..room()
        };
        let cfg = AiConfig::resolve(&g, &r).unwrap();
        assert_eq!(cfg.api_key, "sk-room");
        assert_eq!(cfg.base_url, "https://room.example.com/v2");
        assert_eq!(cfg.model, "room-model");
    }

    #[test]
    fn empty_overrides_inherit() {
        let mut g = global();
        g.chat_room_summary_model = "global-model".to_string();
        let r = ChatRoomSettings {
            chat_api_key: Some(String::new()),
            chat_room_summary_model: Some(String::new()),
            ..room()
        };
        let cfg = AiConfig::resolve(&g, &r).unwrap();
        assert_eq!(cfg.api_key, "sk-global");
        assert_eq!(cfg.model, "global-model");
    }

    #[test]
    fn global_gate_requires_key_and_url() {
        let mut g = global();
        g.chat_api_key.clear();
        assert_eq!(
            AiConfig::resolve(&g, &room()),
            Err(SummaryDenied::GlobalAiDisabled)
        );

        let mut g = global();
        g.chat_ai_enabled = false;
        assert_eq!(
            AiConfig::resolve(&g, &room()),
            Err(SummaryDenied::GlobalAiDisabled)
        );
    }

    #[test]
    fn chat_room_gate_defaults_closed() {
        let r = ChatRoomSettings {
            chat_room_summary_enabled: None,
            ..room()
        };
        assert_eq!(
            AiConfig::resolve(&global(), &r),
            Err(SummaryDenied::ChatRoomSummaryDisabled)
        );
    }

    #[test]
    fn contact_display_name_ignores_empty_nickname() {
        let c = Contact {
            wechat_id: "room1".to_string(),
            nickname: Some(String::new()),
            remark: String::new(),
        };
        assert_eq!(c.display_name(), None);
    }
}
