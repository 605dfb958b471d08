use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde_json::Value;
use std::time::Duration;

use crate::error::{ConfigError, UpstreamError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
}

/// How a call authenticates against the backend.
#[derive(Debug, Clone)]
pub enum Credential {
    /// AI Studio key, sent as `x-goog-api-key`.
    ApiKey(SecretString),
    /// OAuth access token, sent as `Authorization: Bearer`.
    Bearer(SecretString),
}

#[derive(Debug, Clone)]
pub struct VendorRequest {
    pub method: Method,
    pub url: String,
    pub credential: Credential,
    pub body: Option<Value>,
}

impl VendorRequest {
    pub fn get(url: impl Into<String>, credential: Credential) -> Self {
        Self {
            method: Method::Get,
            url: url.into(),
            credential,
            body: None,
        }
    }

    pub fn post(url: impl Into<String>, credential: Credential, body: Value) -> Self {
        Self {
            method: Method::Post,
            url: url.into(),
            credential,
            body: Some(body),
        }
    }
}

/// Status and body of an upstream reply. Non-JSON bodies are kept as a
/// JSON string.
#[derive(Debug, Clone, PartialEq)]
pub struct VendorReply {
    pub status: u16,
    pub body: Value,
}

impl VendorReply {
    pub fn new(status: u16, body: Value) -> Self {
        Self { status, body }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Best-effort human readable error message from the body.
    pub fn error_message(&self) -> String {
        self.body
            .pointer("/error/message")
            .and_then(Value::as_str)
            .or_else(|| self.body.get("error").and_then(Value::as_str))
            .or_else(|| self.body.as_str())
            .map(String::from)
            .unwrap_or_else(|| self.body.to_string())
    }
}

/// The network seam: every vendor call goes through this trait.
#[async_trait]
pub trait VendorTransport: Send + Sync {
    /// Performs one HTTP exchange. Only transport-level failures are errors;
    /// non-2xx replies come back as `Ok` for the caller to classify.
    async fn send(&self, request: VendorRequest) -> Result<VendorReply, UpstreamError>;
}

#[derive(Clone)]
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    pub fn new(timeout: Duration) -> Result<Self, ConfigError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ConfigError::Client(e.to_string()))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl VendorTransport for HttpTransport {
    async fn send(&self, request: VendorRequest) -> Result<VendorReply, UpstreamError> {
        let mut builder = match request.method {
            Method::Get => self.client.get(&request.url),
            Method::Post => self.client.post(&request.url),
        };
        builder = match &request.credential {
            Credential::ApiKey(key) => builder.header("x-goog-api-key", key.expose_secret()),
            Credential::Bearer(token) => builder.bearer_auth(token.expose_secret()),
        };
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder.send().await.map_err(|e| {
            if e.is_timeout() {
                UpstreamError::Network(format!("request timed out: {}", e))
            } else {
                UpstreamError::Network(e.to_string())
            }
        })?;

        let status = response.status().as_u16();
        let text = response
            .text()
            .await
            .map_err(|e| UpstreamError::Malformed(e.to_string()))?;
        let body = serde_json::from_str(&text).unwrap_or(Value::String(text));

        Ok(VendorReply { status, body })
    }
}
