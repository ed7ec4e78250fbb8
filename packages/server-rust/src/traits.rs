use std::sync::Arc;

use async_trait::async_trait;
use robot_mcp_core::{ChatMessage, ChatRoomSettings, Contact, GlobalSettings};

use crate::tenant::TenantDatabase;

/// Read access to one tenant's chat data.
/// Implementations: MySQL (`storage::mysql`), in-memory (tests).
#[async_trait]
pub trait ChatStore: Send + Sync {
    /// The robot-wide settings row, if the tenant has one.
    async fn global_settings(&self) -> anyhow::Result<Option<GlobalSettings>>;

    /// Settings for one chat room.
    async fn chat_room_settings(
        &self,
        chat_room_id: &str,
    ) -> anyhow::Result<Option<ChatRoomSettings>>;

    /// Contact or chat-room entry by its platform id.
    async fn contact(&self, wechat_id: &str) -> anyhow::Result<Option<Contact>>;

    /// Text and app messages posted in `chat_room_id` during
    /// `[start_time, end_time)` (Unix seconds), oldest first, excluding
    /// messages sent by `robot_wx_id`.
    async fn messages_in_range(
        &self,
        robot_wx_id: &str,
        chat_room_id: &str,
        start_time: i64,
        end_time: i64,
    ) -> anyhow::Result<Vec<ChatMessage>>;
}

/// Builds a [`ChatStore`] over the database bound to the current flow.
pub trait ChatStoreProvider: Send + Sync {
    fn store_for(&self, database: &TenantDatabase) -> Arc<dyn ChatStore>;
}
