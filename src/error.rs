use serde_json::{json, Value};
use thiserror::Error;

/// Credential and configuration problems. Fatal for the request that hit
/// them, never for the process.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ConfigError {
    #[error("GOOGLE_API_KEY is not configured on the server")]
    MissingKey,
    #[error("no Vertex credentials are configured and no ambient credentials were found: {0}")]
    MissingCredentials(String),
    #[error("VERTEX_CREDENTIALS is not valid service-account JSON: {0}")]
    InvalidCredentials(String),
    #[error("no GCP project id could be determined for Vertex AI")]
    MissingProject,
    #[error("could not obtain a Vertex access token: {0}")]
    TokenUnavailable(String),
    #[error("routing table could not be loaded: {0}")]
    RoutingTable(String),
    #[error("HTTP client could not be built: {0}")]
    Client(String),
}

/// Bad request shape. Always reported as 400 and never reaches the network.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ValidationError {
    #[error("request body could not be read: {0}")]
    MalformedBody(String),
    #[error("missing required field: {0}")]
    MissingField(String),
    #[error("too many reference images: {count} supplied, at most {max} allowed")]
    TooManyImages { count: usize, max: usize },
    #[error("reference image {index} could not be decoded: {reason}")]
    InvalidImage { index: usize, reason: String },
    #[error("unknown backend: {0}")]
    UnknownBackend(String),
    #[error("unknown video mode: {0}")]
    UnknownVideoMode(String),
    #[error("no route for backend {backend} with selector {selector}")]
    UnsupportedRoute { backend: String, selector: String },
}

/// Failures reported by the upstream service.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum UpstreamError {
    #[error("model {model} is not available to this project: {message}")]
    ModelUnavailable { model: String, message: String },
    #[error("quota exceeded for model {model}: {message}")]
    QuotaExceeded { model: String, message: String },
    #[error("upstream returned {code}: {message}")]
    Upstream { code: u16, message: String },
    #[error("upstream request failed: {0}")]
    Network(String),
    #[error("upstream response could not be read: {0}")]
    Malformed(String),
}

impl UpstreamError {
    /// True for the failures that may be retried once against the fallback model.
    pub fn allows_fallback(&self) -> bool {
        matches!(
            self,
            UpstreamError::ModelUnavailable { .. } | UpstreamError::QuotaExceeded { .. }
        )
    }
}

/// Terminal states of a long-running operation other than success.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum OperationError {
    #[error("generation failed: {0}")]
    Failed(String),
    #[error("timed out, still processing (operation {operation} after {attempts} polls)")]
    TimedOut { operation: String, attempts: u32 },
    #[error("polling was cancelled")]
    Cancelled,
    #[error("polling failed: {0}")]
    Poll(#[from] UpstreamError),
}

#[derive(Debug, Error)]
pub enum StudioError {
    #[error("configuration problem on the server: {0}")]
    Config(#[from] ConfigError),
    #[error("invalid request: {0}")]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Upstream(#[from] UpstreamError),
    #[error(transparent)]
    Operation(#[from] OperationError),
    #[error("request was cancelled by the caller")]
    Cancelled,
}

impl StudioError {
    pub fn http_status(&self) -> u16 {
        match self {
            StudioError::Config(_) => 500,
            StudioError::Validation(_) => 400,
            StudioError::Upstream(err) => upstream_status(err),
            StudioError::Operation(OperationError::TimedOut { .. }) => 504,
            StudioError::Operation(OperationError::Poll(err)) => upstream_status(err),
            StudioError::Operation(OperationError::Failed(_)) => 500,
            StudioError::Operation(OperationError::Cancelled) | StudioError::Cancelled => 499,
        }
    }

    /// The `{error: {code, message}}` body sent to HTTP callers.
    pub fn envelope(&self) -> Value {
        json!({
            "error": {
                "code": self.http_status(),
                "message": self.to_string(),
            }
        })
    }
}

fn upstream_status(err: &UpstreamError) -> u16 {
    match err {
        UpstreamError::ModelUnavailable { .. } => 404,
        UpstreamError::QuotaExceeded { .. } => 429,
        UpstreamError::Upstream { .. }
        | UpstreamError::Network(_)
        | UpstreamError::Malformed(_) => 500,
    }
}

pub type Result<T> = std::result::Result<T, StudioError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes_follow_error_class() {
        let missing: StudioError = ValidationError::MissingField("endFrame".into()).into();
        assert_eq!(missing.http_status(), 400);

        let unavailable: StudioError = UpstreamError::ModelUnavailable {
            model: "m".into(),
            message: "not found".into(),
        }
        .into();
        assert_eq!(unavailable.http_status(), 404);

        let quota: StudioError = UpstreamError::QuotaExceeded {
            model: "m".into(),
            message: "slow down".into(),
        }
        .into();
        assert_eq!(quota.http_status(), 429);

        let timed_out: StudioError = OperationError::TimedOut {
            operation: "operations/1".into(),
            attempts: 20,
        }
        .into();
        assert_eq!(timed_out.http_status(), 504);

        let config: StudioError = ConfigError::MissingKey.into();
        assert_eq!(config.http_status(), 500);
    }

    #[test]
    fn envelope_carries_code_and_message() {
        let err: StudioError = ValidationError::MissingField("prompt".into()).into();
        let body = err.envelope();
        assert_eq!(body["error"]["code"], 400);
        assert_eq!(
            body["error"]["message"],
            "invalid request: missing required field: prompt"
        );
    }

    #[test]
    fn only_unavailable_and_quota_allow_fallback() {
        assert!(UpstreamError::QuotaExceeded {
            model: "m".into(),
            message: String::new()
        }
        .allows_fallback());
        assert!(!UpstreamError::Upstream {
            code: 500,
            message: String::new()
        }
        .allows_fallback());
        assert!(!UpstreamError::Network("reset".into()).allows_fallback());
    }
}
