//! Outbound message delivery through a robot's chat client.
//!
//! Each robot runs its own chat client reachable over HTTP. The address is
//! derived from the tenant identity through a URL template with the
//! `{robot_code}` and `{port}` placeholders.

use std::time::Duration;

use robot_mcp_core::{ApiResponse, TenantIdentity};
use serde::Serialize;
use tracing::debug;

pub const DEFAULT_URL_TEMPLATE: &str = "http://client_{robot_code}:{port}";

const LONG_TEXT_PATH: &str = "/api/v1/robot/message/send/longtext";

#[derive(Debug, thiserror::Error)]
pub enum DeliveryError {
    #[error("message delivery failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("message delivery returned HTTP {0}")]
    Status(u16),
    #[error("message delivery rejected: {0}")]
    Rejected(String),
}

#[derive(Debug, Serialize)]
struct LongTextRequest<'a> {
    to_wxid: &'a str,
    content: &'a str,
}

#[derive(Debug, Clone)]
pub struct RobotClient {
    http: reqwest::Client,
    url_template: String,
}

impl RobotClient {
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(url_template: impl Into<String>, timeout: Duration) -> Result<Self, DeliveryError> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            url_template: url_template.into(),
        })
    }

    /// Base URL of the chat client serving `identity`.
    #[must_use]
    pub fn base_url(&self, identity: &TenantIdentity) -> String {
        self.url_template
            .replace("{robot_code}", &identity.robot_code)
            .replace("{port}", &identity.we_chat_client_port)
            .trim_end_matches('/')
            .to_string()
    }

    /// Sends a long text message to `to_wxid`.
    ///
    /// # Errors
    ///
    /// Fails unless the client answers HTTP 200 with an envelope whose
    /// `code` is 200.
    pub async fn send_long_text(
        &self,
        identity: &TenantIdentity,
        to_wxid: &str,
        content: &str,
    ) -> Result<(), DeliveryError> {
        let url = format!("{}{LONG_TEXT_PATH}", self.base_url(identity));
        let response = self
            .http
            .post(&url)
            .json(&LongTextRequest { to_wxid, content })
            .send()
            .await?;

        let status = response.status();
        debug!(status = %status, robot_code = %identity.robot_code, "delivery response received");
        if status != reqwest::StatusCode::OK {
            return Err(DeliveryError::Status(status.as_u16()));
        }

        let envelope: ApiResponse = response.json().await?;
        if envelope.is_success() {
            Ok(())
        } else if envelope.message.is_empty() {
            Err(DeliveryError::Rejected(format!("code {}", envelope.code)))
        } else {
            Err(DeliveryError::Rejected(envelope.message))
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    fn identity() -> TenantIdentity {
        TenantIdentity {
            robot_code: "shop001".to_string(),
            we_chat_client_port: "9002".to_string(),
            ..TenantIdentity::default()
        }
    }

    fn client(template: &str) -> RobotClient {
        RobotClient::new(template, Duration::from_secs(5)).unwrap()
    }

    #[test]
    fn default_template_expands_code_and_port() {
        let url = client(DEFAULT_URL_TEMPLATE).base_url(&identity());
        assert_eq!(url, "http://client_shop001:9002");
    }

    #[tokio::test]
    async fn delivers_long_text() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/v1/robot/message/send/longtext"))
            .and(body_json(json!({"to_wxid": "room1", "content": "hello"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"code": 200, "message": "ok"})))
            .expect(1)
            .mount(&server)
            .await;

        client(&server.uri())
            .send_long_text(&identity(), "room1", "hello")
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn envelope_error_is_rejected() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"code": 500, "message": "offline"})),
            )
            .mount(&server)
            .await;

        let err = client(&server.uri())
            .send_long_text(&identity(), "room1", "hello")
            .await
            .unwrap_err();
        assert!(matches!(err, DeliveryError::Rejected(ref m) if m == "offline"));
    }

    #[tokio::test]
    async fn non_200_status_is_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(502))
            .mount(&server)
            .await;

        let err = client(&server.uri())
            .send_long_text(&identity(), "room1", "hello")
            .await
            .unwrap_err();
        assert!(matches!(err, DeliveryError::Status(502)));
    }
}
