use serde_json::Value;
use std::sync::Arc;

use super::credentials::ClientContext;
use super::transport::{VendorReply, VendorRequest, VendorTransport};
use crate::error::UpstreamError;
use crate::models::Operation;
use crate::routing::{render_template, PayloadShape, TemplateValues, VendorCallSpec};

const DEFAULT_POLL_TEMPLATE: &str = "{base}/{operation}";

/// A synchronous reply, before response normalization.
#[derive(Debug, Clone, PartialEq)]
pub struct SyncResult {
    pub raw: Value,
    pub model: String,
    pub note: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Invocation {
    Completed(SyncResult),
    Started(Operation),
}

/// Executes a `VendorCallSpec` against the transport.
#[derive(Clone)]
pub struct VendorInvoker {
    transport: Arc<dyn VendorTransport>,
}

impl VendorInvoker {
    pub fn new(transport: Arc<dyn VendorTransport>) -> Self {
        Self { transport }
    }

    pub async fn invoke(
        &self,
        spec: &VendorCallSpec,
        ctx: &ClientContext,
        payload: Value,
    ) -> Result<Invocation, UpstreamError> {
        match spec.payload_shape {
            PayloadShape::GenerateContent => {
                self.generate(spec, ctx, payload).await.map(Invocation::Completed)
            }
            PayloadShape::PredictLongRunning => {
                self.start_operation(spec, ctx, payload).await.map(Invocation::Started)
            }
        }
    }

    /// Synchronous generation. A model-unavailable or quota failure on the
    /// primary model is retried exactly once against the route's fallback;
    /// the fallback's own failure is returned as-is.
    pub async fn generate(
        &self,
        spec: &VendorCallSpec,
        ctx: &ClientContext,
        payload: Value,
    ) -> Result<SyncResult, UpstreamError> {
        let primary = &spec.model_id;
        let err = match self.call(spec, ctx, primary, payload.clone()).await {
            Ok(raw) => {
                return Ok(SyncResult {
                    raw,
                    model: primary.clone(),
                    note: None,
                })
            }
            Err(err) => err,
        };

        let fallback = match spec.fallback() {
            Some(fallback) if err.allows_fallback() => fallback,
            _ => return Err(err),
        };

        log::warn!(
            "Model {} failed ({}), retrying once with {}",
            primary,
            err,
            fallback
        );
        let raw = self.call(spec, ctx, fallback, payload).await?;
        Ok(SyncResult {
            raw,
            model: fallback.to_string(),
            note: Some(format!(
                "Original model ({}) was unavailable or over quota, used fallback ({}).",
                primary, fallback
            )),
        })
    }

    /// Submits a long-running job and returns its handle without waiting.
    pub async fn start_operation(
        &self,
        spec: &VendorCallSpec,
        ctx: &ClientContext,
        payload: Value,
    ) -> Result<Operation, UpstreamError> {
        let body = self.call(spec, ctx, &spec.model_id, payload).await?;
        let name = body
            .get("name")
            .and_then(Value::as_str)
            .filter(|name| !name.is_empty())
            .ok_or_else(|| {
                UpstreamError::Malformed("long-running call returned no operation name".into())
            })?;

        let poll_endpoint = if name.starts_with("http://") || name.starts_with("https://") {
            name.to_string()
        } else {
            let template = spec.poll_template.as_deref().unwrap_or(DEFAULT_POLL_TEMPLATE);
            render_template(template, &self.values(spec, ctx, &spec.model_id, Some(name)))
        };

        log::info!("Started operation {} on {}", name, spec.model_id);
        Ok(Operation::new(name, poll_endpoint, spec.model_id.clone()))
    }

    async fn call(
        &self,
        spec: &VendorCallSpec,
        ctx: &ClientContext,
        model: &str,
        payload: Value,
    ) -> Result<Value, UpstreamError> {
        let url = render_template(&spec.endpoint_template, &self.values(spec, ctx, model, None));
        log::info!("Invoking model: {} ({})", model, ctx.backend);
        log::debug!("POST {}", url);

        let reply = self
            .transport
            .send(VendorRequest::post(url, ctx.credential.clone(), payload))
            .await?;
        if reply.is_success() {
            Ok(reply.body)
        } else {
            Err(classify_failure(model, &reply))
        }
    }

    fn values<'a>(
        &self,
        spec: &'a VendorCallSpec,
        ctx: &'a ClientContext,
        model: &'a str,
        operation: Option<&'a str>,
    ) -> TemplateValues<'a> {
        TemplateValues {
            base: &ctx.base_url,
            project: ctx.project_id.as_deref(),
            region: Some(spec.region.as_deref().unwrap_or(&ctx.region)),
            model: Some(model),
            operation,
        }
    }
}

/// Maps a non-2xx reply to the error the caller sees.
pub fn classify_failure(model: &str, reply: &VendorReply) -> UpstreamError {
    let message = reply.error_message();
    match reply.status {
        404 => UpstreamError::ModelUnavailable {
            model: model.to_string(),
            message,
        },
        429 => UpstreamError::QuotaExceeded {
            model: model.to_string(),
            message,
        },
        code => UpstreamError::Upstream { code, message },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::google::testing::{studio_context, vertex_context, ScriptedTransport};
    use crate::models::{Backend, GenerationRequest, ModelSelector, VideoMode};
    use crate::routing::RoutingTable;
    use serde_json::json;

    fn content_spec(backend: Backend) -> VendorCallSpec {
        RoutingTable::default()
            .normalize(&GenerationRequest::content("x", backend, ModelSelector::Fast), 3)
            .unwrap()
    }

    fn quota() -> Value {
        json!({"error": {"code": 429, "message": "Resource has been exhausted"}})
    }

    #[tokio::test]
    async fn quota_failure_retries_once_with_fallback() {
        let transport = Arc::new(
            ScriptedTransport::new()
                .reply(429, quota())
                .reply(200, json!({"candidates": []})),
        );
        let invoker = VendorInvoker::new(transport.clone());

        let result = invoker
            .generate(&content_spec(Backend::Studio), &studio_context(), json!({}))
            .await
            .unwrap();

        assert_eq!(transport.calls(), 2);
        let urls: Vec<_> = transport.requests().into_iter().map(|r| r.url).collect();
        assert!(urls[0].ends_with("/models/gemini-2.5-flash-image:generateContent"));
        assert!(urls[1].ends_with("/models/gemini-2.0-flash:generateContent"));
        assert_eq!(result.model, "gemini-2.0-flash");
        assert_eq!(
            result.note.as_deref(),
            Some("Original model (gemini-2.5-flash-image) was unavailable or over quota, used fallback (gemini-2.0-flash).")
        );
    }

    #[tokio::test]
    async fn fallback_failure_is_not_chained() {
        let transport = Arc::new(ScriptedTransport::new().reply(429, quota()).reply(404, json!({})));
        let invoker = VendorInvoker::new(transport.clone());

        let err = invoker
            .generate(&content_spec(Backend::Studio), &studio_context(), json!({}))
            .await
            .unwrap_err();

        assert_eq!(transport.calls(), 2);
        assert!(matches!(
            err,
            UpstreamError::ModelUnavailable { ref model, .. } if model == "gemini-2.0-flash"
        ));
    }

    #[tokio::test]
    async fn server_errors_do_not_trigger_fallback() {
        let transport = Arc::new(ScriptedTransport::new().reply(500, json!("boom")));
        let invoker = VendorInvoker::new(transport.clone());

        let err = invoker
            .generate(&content_spec(Backend::Studio), &studio_context(), json!({}))
            .await
            .unwrap_err();

        assert_eq!(transport.calls(), 1);
        assert_eq!(
            err,
            UpstreamError::Upstream {
                code: 500,
                message: "boom".into()
            }
        );
    }

    #[tokio::test]
    async fn network_failure_does_not_trigger_fallback() {
        let transport = Arc::new(
            ScriptedTransport::new()
                .fail(UpstreamError::Network("connection reset".into()))
                .reply(200, json!({"candidates": []})),
        );
        let invoker = VendorInvoker::new(transport.clone());

        let err = invoker
            .generate(&content_spec(Backend::Studio), &studio_context(), json!({}))
            .await
            .unwrap_err();

        assert_eq!(transport.calls(), 1);
        assert_eq!(err, UpstreamError::Network("connection reset".into()));
    }

    #[tokio::test]
    async fn disabled_fallback_surfaces_primary_error() {
        let transport = Arc::new(ScriptedTransport::new().reply(429, quota()));
        let invoker = VendorInvoker::new(transport.clone());
        let mut spec = content_spec(Backend::Studio);
        spec.fallback_model_id = None;

        let err = invoker
            .generate(&spec, &studio_context(), json!({}))
            .await
            .unwrap_err();
        assert_eq!(transport.calls(), 1);
        assert!(matches!(err, UpstreamError::QuotaExceeded { .. }));
    }

    #[tokio::test]
    async fn vertex_url_uses_route_region_and_project() {
        let transport = Arc::new(ScriptedTransport::new().reply(200, json!({})));
        let invoker = VendorInvoker::new(transport.clone());

        invoker
            .generate(&content_spec(Backend::Vertex), &vertex_context(), json!({}))
            .await
            .unwrap();

        assert_eq!(
            transport.requests()[0].url,
            "http://vertex.test/v1/projects/demo-project/locations/europe-west1/publishers/google/models/gemini-2.5-flash-image:generateContent"
        );
    }

    #[tokio::test]
    async fn video_start_returns_operation_handle() {
        let transport = Arc::new(
            ScriptedTransport::new()
                .reply(200, json!({"name": "models/veo-3.1-generate-preview/operations/op-1"})),
        );
        let invoker = VendorInvoker::new(transport.clone());
        let spec = RoutingTable::default()
            .normalize(&GenerationRequest::video("waves", Backend::Studio, VideoMode::Text), 3)
            .unwrap();

        match invoker.invoke(&spec, &studio_context(), json!({})).await.unwrap() {
            Invocation::Started(op) => {
                assert_eq!(op.operation_name, "models/veo-3.1-generate-preview/operations/op-1");
                assert_eq!(
                    op.poll_endpoint,
                    "http://studio.test/v1beta/models/veo-3.1-generate-preview/operations/op-1"
                );
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[tokio::test]
    async fn video_start_without_name_is_malformed() {
        let transport = Arc::new(ScriptedTransport::new().reply(200, json!({"done": false})));
        let invoker = VendorInvoker::new(transport);
        let spec = RoutingTable::default()
            .normalize(&GenerationRequest::video("waves", Backend::Vertex, VideoMode::Text), 3)
            .unwrap();

        let err = invoker
            .start_operation(&spec, &vertex_context(), json!({}))
            .await
            .unwrap_err();
        assert!(matches!(err, UpstreamError::Malformed(_)));
    }
}
