//! MySQL-backed [`ChatStore`].
//!
//! Every query checks a connection out of the tenant pool and returns it as
//! soon as the rows are read.

use std::sync::Arc;

use async_trait::async_trait;
use robot_mcp_core::chat::{MESSAGE_TYPE_APP, MESSAGE_TYPE_TEXT};
use robot_mcp_core::{ChatMessage, ChatRoomSettings, Contact, GlobalSettings};
use sqlx::mysql::MySqlRow;
use sqlx::{MySqlPool, Row};

use crate::tenant::TenantDatabase;
use crate::traits::{ChatStore, ChatStoreProvider};

const GLOBAL_SETTINGS_SQL: &str = "SELECT chat_ai_enabled, chat_base_url, chat_api_key, \
     chat_room_summary_enabled, chat_room_summary_model \
     FROM global_settings ORDER BY id LIMIT 1";

const CHAT_ROOM_SETTINGS_SQL: &str = "SELECT chat_room_id, chat_base_url, chat_api_key, \
     chat_room_summary_enabled, chat_room_summary_model \
     FROM chat_room_settings WHERE chat_room_id = ? ORDER BY id LIMIT 1";

const CONTACT_SQL: &str =
    "SELECT wechat_id, nickname, remark FROM contacts WHERE wechat_id = ? ORDER BY id LIMIT 1";

// Sender nickname comes from contacts when known, otherwise the raw id.
const MESSAGES_SQL: &str = "SELECT m.sender_wxid, \
     COALESCE((SELECT NULLIF(c.nickname, '') FROM contacts c \
               WHERE c.wechat_id = m.sender_wxid ORDER BY c.id LIMIT 1), m.sender_wxid) \
       AS sender_nickname, \
     m.`type`, m.content, m.created_at \
     FROM messages m \
     WHERE m.from_wxid = ? AND m.`type` IN (?, ?) AND m.sender_wxid <> ? \
       AND m.created_at >= ? AND m.created_at < ? \
     ORDER BY m.created_at ASC, m.id ASC";

/// [`ChatStore`] over one tenant pool.
#[derive(Debug, Clone)]
pub struct MySqlChatStore {
    pool: MySqlPool,
}

impl MySqlChatStore {
    #[must_use]
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ChatStore for MySqlChatStore {
    async fn global_settings(&self) -> anyhow::Result<Option<GlobalSettings>> {
        let row = sqlx::query(GLOBAL_SETTINGS_SQL)
            .fetch_optional(&self.pool)
            .await?;
        row.map(|r| global_settings_from_row(&r)).transpose()
    }

    async fn chat_room_settings(
        &self,
        chat_room_id: &str,
    ) -> anyhow::Result<Option<ChatRoomSettings>> {
        let row = sqlx::query(CHAT_ROOM_SETTINGS_SQL)
            .bind(chat_room_id)
            .fetch_optional(&self.pool)
            .await?;
        row.map(|r| chat_room_settings_from_row(&r)).transpose()
    }

    async fn contact(&self, wechat_id: &str) -> anyhow::Result<Option<Contact>> {
        let row = sqlx::query(CONTACT_SQL)
            .bind(wechat_id)
            .fetch_optional(&self.pool)
            .await?;
        row.map(|r| contact_from_row(&r)).transpose()
    }

    async fn messages_in_range(
        &self,
        robot_wx_id: &str,
        chat_room_id: &str,
        start_time: i64,
        end_time: i64,
    ) -> anyhow::Result<Vec<ChatMessage>> {
        let rows = sqlx::query(MESSAGES_SQL)
            .bind(chat_room_id)
            .bind(MESSAGE_TYPE_TEXT)
            .bind(MESSAGE_TYPE_APP)
            .bind(robot_wx_id)
            .bind(start_time)
            .bind(end_time)
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(message_from_row).collect()
    }
}

fn global_settings_from_row(r: &MySqlRow) -> anyhow::Result<GlobalSettings> {
    Ok(GlobalSettings {
        chat_ai_enabled: r.try_get::<Option<bool>, _>("chat_ai_enabled")?.unwrap_or(false),
        chat_base_url: r.try_get::<Option<String>, _>("chat_base_url")?.unwrap_or_default(),
        chat_api_key: r.try_get::<Option<String>, _>("chat_api_key")?.unwrap_or_default(),
        chat_room_summary_enabled: r
            .try_get::<Option<bool>, _>("chat_room_summary_enabled")?
            .unwrap_or(false),
        chat_room_summary_model: r
            .try_get::<Option<String>, _>("chat_room_summary_model")?
            .unwrap_or_default(),
    })
}

fn chat_room_settings_from_row(r: &MySqlRow) -> anyhow::Result<ChatRoomSettings> {
    Ok(ChatRoomSettings {
        chat_room_id: r.try_get::<Option<String>, _>("chat_room_id")?.unwrap_or_default(),
        chat_base_url: r.try_get("chat_base_url")?,
        chat_api_key: r.try_get("chat_api_key")?,
        chat_room_summary_enabled: r.try_get("chat_room_summary_enabled")?,
        chat_room_summary_model: r.try_get("chat_room_summary_model")?,
    })
}

fn contact_from_row(r: &MySqlRow) -> anyhow::Result<Contact> {
    Ok(Contact {
        wechat_id: r.try_get("wechat_id")?,
        nickname: r.try_get("nickname")?,
        remark: r.try_get::<Option<String>, _>("remark")?.unwrap_or_default(),
    })
}

fn message_from_row(r: &MySqlRow) -> anyhow::Result<ChatMessage> {
    Ok(ChatMessage {
        sender_wxid: r.try_get::<Option<String>, _>("sender_wxid")?.unwrap_or_default(),
        sender_nickname: r
            .try_get::<Option<String>, _>("sender_nickname")?
            .unwrap_or_default(),
        msg_type: r.try_get("type")?,
        content: r.try_get::<Option<String>, _>("content")?.unwrap_or_default(),
        created_at: r.try_get("created_at")?,
    })
}

/// Hands out a [`MySqlChatStore`] over the flow's tenant pool.
#[derive(Debug, Clone, Copy, Default)]
pub struct MySqlStoreProvider;

impl ChatStoreProvider for MySqlStoreProvider {
    fn store_for(&self, database: &TenantDatabase) -> Arc<dyn ChatStore> {
        Arc::new(MySqlChatStore::new(database.pool().clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tenant::registry::tests::lazy_pool;

    #[test]
    fn messages_query_binds_every_placeholder() {
        assert_eq!(MESSAGES_SQL.matches('?').count(), 6);
        assert!(MESSAGES_SQL.contains("ORDER BY m.created_at ASC"));
    }

    #[tokio::test]
    async fn provider_targets_flow_database() {
        let database = TenantDatabase::new("shop001", lazy_pool("shop001"));
        let store = MySqlStoreProvider.store_for(&database);
        // Unreachable server: the query must surface an error, not panic.
        assert!(store.global_settings().await.is_err());
    }
}
