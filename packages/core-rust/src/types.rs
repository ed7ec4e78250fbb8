use serde::{Deserialize, Serialize};

/// Free-form metadata attached to an inbound tool call or webhook delivery.
pub type Metadata = serde_json::Map<String, serde_json::Value>;

/// JSON envelope returned by the HTTP surface and by the robot client API.
///
/// `code` mirrors the HTTP status; `data` is omitted when absent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiResponse {
    pub code: u16,
    #[serde(default)]
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

impl ApiResponse {
    #[must_use]
    pub fn ok() -> Self {
        Self {
            code: 200,
            message: "ok".to_string(),
            data: None,
        }
    }

    #[must_use]
    pub fn error(code: u16, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            data: None,
        }
    }

    #[must_use]
    pub fn with_data(mut self, data: serde_json::Value) -> Self {
        self.data = Some(data);
        self
    }

    /// True when the envelope reports success (`code == 200`).
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.code == 200
    }
}
