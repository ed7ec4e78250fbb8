//! Chat-room summary: reads a room's recent messages from the tenant
//! database, asks the configured LLM for a digest and posts it back into the
//! room through the robot's chat client.

use std::fmt::Display;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use chrono::{DateTime, Local, TimeZone, Utc};
use robot_mcp_core::{AiConfig, TenantIdentity, TextMessageItem};
use tower::Service;
use tracing::{error, info};

use crate::clients::{CompletionClient, RobotClient};
use crate::service::operation::{
    ChatRoomSummaryInput, Operation, OperationError, OperationResponse,
};
use crate::tenant::{get_current_tenant_identity, get_tenant_scoped_database};
use crate::traits::{ChatStore, ChatStoreProvider};

/// Longest window that may be summarized, in seconds.
pub const MAX_RECENT_DURATION_SECS: i64 = 24 * 3600;

/// Below this many messages a room is not worth summarizing.
pub const MIN_SUMMARY_MESSAGES: usize = 100;

pub const SUMMARY_SENT: &str = "chat summary sent";

const SYSTEM_PROMPT: &str = r#"你是一个中文的群聊总结的助手，你可以为一个微信的群聊记录，提取并总结每个时间段大家在重点讨论的话题内容。

每一行代表一个人的发言，每一行的的格式为： {"[time] {nickname}": "{content}"}--end--

请帮我将给出的群聊内容总结成一个今日的群聊报告，包含不多于10个的话题的总结（如果还有更多话题，可以在后面简单补充）。每个话题包含以下内容：
- 话题名(50字以内，带序号1️⃣2️⃣3️⃣，同时附带热度，以🔥数量表示）
- 参与者(不超过5个人，将重复的人名去重)
- 时间段(从几点到几点)
- 过程(50到200字左右）
- 评价(50字以下)
- 分割线： ------------

另外有以下要求：
1. 每个话题结束使用 ------------ 分割
2. 使用中文冒号
3. 无需大标题
4. 开始给出本群讨论风格的整体评价，例如活跃、太水、太黄、太暴力、话题不集中、无聊诸如此类
"#;

/// One transcript line: `[time] {"nickname": "content"}--end--`.
///
/// Newlines inside the message are replaced so every line is one utterance.
pub(crate) fn transcript_line<Tz>(item: &TextMessageItem, tz: &Tz) -> String
where
    Tz: TimeZone,
    Tz::Offset: Display,
{
    let time = DateTime::<Utc>::from_timestamp(item.created_at, 0).map_or_else(
        || item.created_at.to_string(),
        |t| t.with_timezone(tz).format("%Y-%m-%d %H:%M:%S").to_string(),
    );
    let message = item.message.replace('\n', "。。");
    format!("[{time}] {{\"{}\": \"{message}\"}}--end--", item.nickname)
}

pub(crate) fn summary_request(chat_room_name: &str, lines: &[String]) -> String {
    format!("群名称: {chat_room_name}\n聊天记录如下:\n{}", lines.join("\n"))
}

pub(crate) fn summary_reply(summary: &str) -> String {
    format!("#消息总结\n让我们一起来看看群友们都聊了什么有趣的话题吧~\n\n{summary}")
}

// ---------------------------------------------------------------------------
// ChatRoomSummaryService
// ---------------------------------------------------------------------------

/// Summarizes the chat room the current request originated from.
pub struct ChatRoomSummaryService {
    stores: Arc<dyn ChatStoreProvider>,
    completion: CompletionClient,
    robot: RobotClient,
}

impl ChatRoomSummaryService {
    #[must_use]
    pub fn new(
        stores: Arc<dyn ChatStoreProvider>,
        completion: CompletionClient,
        robot: RobotClient,
    ) -> Self {
        Self {
            stores,
            completion,
            robot,
        }
    }

    /// Runs one summary for the tenant bound to the current flow.
    ///
    /// # Errors
    ///
    /// Every failure is returned as an [`OperationError`] meant for the
    /// caller: invalid input, missing bindings, disabled settings, too few
    /// messages, or a failing LLM or delivery call.
    pub async fn summarize(&self, input: &ChatRoomSummaryInput) -> Result<String, OperationError> {
        let recent = input.recent_duration;
        if recent <= 0 {
            return Err(OperationError::InvalidInput(
                "please specify a valid time range in seconds".to_string(),
            ));
        }
        if recent > MAX_RECENT_DURATION_SECS {
            return Err(OperationError::InvalidInput(
                "only the last 24 hours can be summarized".to_string(),
            ));
        }

        let identity = get_current_tenant_identity().ok_or(OperationError::NoTenantIdentity)?;
        let database = get_tenant_scoped_database()?;
        let store = self.stores.store_for(&database);

        let config = self.ai_config(store.as_ref(), &identity).await?;
        let chat_room_name = store
            .contact(&identity.from_wx_id)
            .await?
            .and_then(|c| c.display_name().map(str::to_string))
            .unwrap_or_else(|| identity.from_wx_id.clone());

        let end_time = Utc::now().timestamp();
        let start_time = end_time - recent;
        let items: Vec<TextMessageItem> = store
            .messages_in_range(&identity.robot_wx_id, &identity.from_wx_id, start_time, end_time)
            .await?
            .into_iter()
            .filter_map(robot_mcp_core::ChatMessage::into_text_item)
            .collect();

        if items.len() < MIN_SUMMARY_MESSAGES {
            return Err(OperationError::Rejected(format!(
                "fewer than {MIN_SUMMARY_MESSAGES} messages, nothing to summarize"
            )));
        }

        info!(
            robot_code = %identity.robot_code,
            chat_room = %identity.from_wx_id,
            messages = items.len(),
            model = %config.model,
            "summarizing chat room"
        );

        let lines: Vec<String> = items.iter().map(|i| transcript_line(i, &Local)).collect();
        let summary = self
            .completion
            .complete(&config, SYSTEM_PROMPT, &summary_request(&chat_room_name, &lines))
            .await
            .map_err(|e| {
                error!(robot_code = %identity.robot_code, error = %e, "AI summary failed");
                OperationError::Upstream(format!("AI summary failed: {e}"))
            })?;

        self.robot
            .send_long_text(&identity, &identity.from_wx_id, &summary_reply(&summary))
            .await
            .map_err(|e| {
                error!(robot_code = %identity.robot_code, error = %e, "failed to send chat summary");
                OperationError::Upstream(format!("failed to send chat summary: {e}"))
            })?;

        Ok(SUMMARY_SENT.to_string())
    }

    async fn ai_config(
        &self,
        store: &dyn ChatStore,
        identity: &TenantIdentity,
    ) -> Result<AiConfig, OperationError> {
        let global = store
            .global_settings()
            .await?
            .ok_or_else(|| OperationError::Rejected("global settings not found".to_string()))?;
        let room = store
            .chat_room_settings(&identity.from_wx_id)
            .await?
            .ok_or_else(|| OperationError::Rejected("chat room settings not found".to_string()))?;
        AiConfig::resolve(&global, &room).map_err(|e| OperationError::Rejected(e.to_string()))
    }
}

impl Service<Operation> for Arc<ChatRoomSummaryService> {
    type Response = OperationResponse;
    type Error = OperationError;
    type Future = Pin<Box<dyn Future<Output = Result<OperationResponse, OperationError>> + Send>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, op: Operation) -> Self::Future {
        let svc = Arc::clone(self);
        Box::pin(async move {
            match op {
                Operation::ChatRoomSummary { input, .. } => {
                    svc.summarize(&input).await.map(OperationResponse::Text)
                }
                other => Err(OperationError::Internal(anyhow::anyhow!(
                    "chat room summary service received {} operation",
                    other.ctx().service_name
                ))),
            }
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
