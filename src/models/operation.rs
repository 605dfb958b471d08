use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Handle of an in-flight long-running job.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Operation {
    pub operation_name: String,
    pub poll_endpoint: String,
    pub model: String,
    pub created_at: DateTime<Utc>,
}

impl Operation {
    pub fn new(
        operation_name: impl Into<String>,
        poll_endpoint: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            operation_name: operation_name.into(),
            poll_endpoint: poll_endpoint.into(),
            model: model.into(),
            created_at: Utc::now(),
        }
    }
}

/// The operation resource returned by both the start call and each poll.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct OperationStatus {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub done: bool,
    #[serde(default)]
    pub response: Option<Value>,
    #[serde(default)]
    pub error: Option<OperationFault>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct OperationFault {
    #[serde(default)]
    pub code: Option<i64>,
    #[serde(default)]
    pub message: Option<String>,
}

impl OperationFault {
    pub fn describe(&self) -> String {
        match (&self.message, self.code) {
            (Some(message), Some(code)) => format!("{} (code {})", message, code),
            (Some(message), None) => message.clone(),
            (None, Some(code)) => format!("operation failed with code {}", code),
            (None, None) => "operation failed without details".to_string(),
        }
    }
}
