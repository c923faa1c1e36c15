//! JSON envelope shared by the HTTP service and the CLI.

use serde::{Deserialize, Serialize};

pub const PROTOCOL: &str = "sprout/1";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct SproutResponse {
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Machine-readable failure class: `transport`, `parse`, `shape`, `busy`,
    /// `superseded`, `bad_request`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    pub version: String,
}

impl SproutResponse {
    pub fn ok(data: serde_json::Value) -> Self {
        Self {
            status: "ok".to_string(),
            data: Some(data),
            error: None,
            kind: None,
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }

    pub fn err(kind: impl Into<String>, msg: impl Into<String>) -> Self {
        Self {
            status: "error".to_string(),
            data: None,
            error: Some(msg.into()),
            kind: Some(kind.into()),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.status == "ok"
    }

    /// Split into the data payload or the error message.
    pub fn into_result(self) -> Result<serde_json::Value, String> {
        if self.is_ok() {
            Ok(self.data.unwrap_or(serde_json::json!({})))
        } else {
            Err(self.error.unwrap_or_else(|| "unknown error".to_string()))
        }
    }
}
