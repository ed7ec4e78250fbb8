//! Domain services.
//!
//! Each service implements `tower::Service<Operation>` on `Arc<Self>` so the
//! router can hold cheap clones.

pub mod summary;
pub mod webhook;

use std::sync::Arc;

pub use summary::ChatRoomSummaryService;
pub use webhook::WebhookService;

use crate::service::operation::service_names;
use crate::service::router::OperationRouter;

/// Router with every domain service registered under its service name.
#[must_use]
pub fn domain_router(
    summary: Arc<ChatRoomSummaryService>,
    webhook: Arc<WebhookService>,
) -> OperationRouter {
    let mut router = OperationRouter::new();
    router.register(service_names::CHAT_ROOM_SUMMARY, summary);
    router.register(service_names::WEBHOOK, webhook);
    router
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::clients::{CompletionClient, RobotClient};
    use crate::storage::MySqlStoreProvider;

    #[test]
    fn registers_every_service() {
        let summary = Arc::new(ChatRoomSummaryService::new(
            Arc::new(MySqlStoreProvider),
            CompletionClient::new(Duration::from_secs(1)).unwrap(),
            RobotClient::new("http://localhost", Duration::from_secs(1)).unwrap(),
        ));
        let router = domain_router(summary, Arc::new(WebhookService));
        assert_eq!(router.service_names(), vec!["chat_room_summary", "webhook"]);
    }
}
