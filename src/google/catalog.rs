use serde_json::Value;
use std::sync::Arc;

use super::credentials::ClientContext;
use super::invoker::classify_failure;
use super::transport::{VendorRequest, VendorTransport};
use crate::error::UpstreamError;
use crate::models::{Backend, ModelInfo};

const GENERATION_METHODS: [&str; 3] = ["generateContent", "predict", "predictLongRunning"];

/// Lists the generation models visible to the resolved credentials.
#[derive(Clone)]
pub struct ModelCatalog {
    transport: Arc<dyn VendorTransport>,
}

impl ModelCatalog {
    pub fn new(transport: Arc<dyn VendorTransport>) -> Self {
        Self { transport }
    }

    pub async fn list(&self, ctx: &ClientContext) -> Result<Vec<ModelInfo>, UpstreamError> {
        let base = ctx.base_url.replace("{region}", &ctx.region);
        let base = base.trim_end_matches('/');
        let url = match ctx.backend {
            Backend::Studio => format!("{}/v1beta/models?pageSize=1000", base),
            Backend::Vertex => format!("{}/v1beta1/publishers/google/models", base),
        };

        log::debug!("Listing models from {}", url);
        let reply = self
            .transport
            .send(VendorRequest::get(url, ctx.credential.clone()))
            .await?;
        if !reply.is_success() {
            return Err(classify_failure("models", &reply));
        }

        let models = parse_models(&reply.body);
        log::info!("Listed {} models for {}", models.len(), ctx.backend);
        Ok(models)
    }
}

/// Reads a `models` (AI Studio) or `publisherModels` (Vertex) listing.
/// Entries that advertise their methods are kept only if one of them is a
/// generation method. Sorted by family, then by id descending.
pub fn parse_models(body: &Value) -> Vec<ModelInfo> {
    let entries = body
        .get("models")
        .or_else(|| body.get("publisherModels"))
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default();

    let mut models: Vec<ModelInfo> = entries
        .iter()
        .filter(|entry| supports_generation(entry))
        .filter_map(|entry| {
            let name = entry.get("name").and_then(Value::as_str)?;
            let id = name.rsplit_once("models/").map_or(name, |(_, id)| id);
            if id.is_empty() {
                return None;
            }

            let text = |key: &str| entry.get(key).and_then(Value::as_str).map(String::from);
            let mut info = ModelInfo::new(id);
            info.display_name = text("displayName");
            info.description = text("description");
            info.version = text("version").or_else(|| text("versionId"));
            Some(info)
        })
        .collect();

    models.sort_by(|a, b| a.family.cmp(&b.family).then_with(|| b.id.cmp(&a.id)));
    models
}

fn supports_generation(entry: &Value) -> bool {
    match entry.get("supportedGenerationMethods").and_then(Value::as_array) {
        Some(methods) => methods
            .iter()
            .filter_map(Value::as_str)
            .any(|method| GENERATION_METHODS.contains(&method)),
        None => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::google::testing::{studio_context, vertex_context, ScriptedTransport};
    use crate::models::{ModelFamily, ModelType};
    use serde_json::json;

    #[test]
    fn listing_is_filtered_classified_and_sorted() {
        let body = json!({
            "models": [
                {"name": "models/embedding-001", "supportedGenerationMethods": ["embedContent"]},
                {"name": "models/veo-3.1-generate-preview", "supportedGenerationMethods": ["predictLongRunning"]},
                {"name": "models/gemini-2.0-flash", "displayName": "Gemini 2.0 Flash", "version": "2.0",
                 "supportedGenerationMethods": ["generateContent", "countTokens"]},
                {"name": "models/gemini-2.5-flash-image", "supportedGenerationMethods": ["generateContent"]},
                {"name": "models/imagen-4.0-generate-001", "supportedGenerationMethods": ["predict"]}
            ]
        });

        let models = parse_models(&body);
        let ids: Vec<_> = models.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(
            ids,
            [
                "gemini-2.5-flash-image",
                "gemini-2.0-flash",
                "imagen-4.0-generate-001",
                "veo-3.1-generate-preview"
            ]
        );
        assert_eq!(models[0].model_type, ModelType::Image);
        assert_eq!(models[1].model_type, ModelType::Text);
        assert_eq!(models[1].display_name.as_deref(), Some("Gemini 2.0 Flash"));
        assert_eq!(models[3].family, ModelFamily::Veo);
    }

    #[test]
    fn vertex_publisher_models_use_trailing_id() {
        let body = json!({
            "publisherModels": [
                {"name": "publishers/google/models/gemini-2.5-pro", "versionId": "001"}
            ]
        });
        let models = parse_models(&body);
        assert_eq!(models[0].id, "gemini-2.5-pro");
        assert_eq!(models[0].version.as_deref(), Some("001"));
    }

    #[test]
    fn missing_listing_is_empty() {
        assert!(parse_models(&json!({})).is_empty());
    }

    #[tokio::test]
    async fn list_hits_backend_specific_url() {
        let transport = Arc::new(
            ScriptedTransport::new()
                .reply(200, json!({"models": []}))
                .reply(200, json!({"publisherModels": []})),
        );
        let catalog = ModelCatalog::new(transport.clone());

        catalog.list(&studio_context()).await.unwrap();
        catalog.list(&vertex_context()).await.unwrap();

        let urls: Vec<_> = transport.requests().into_iter().map(|r| r.url).collect();
        assert_eq!(urls[0], "http://studio.test/v1beta/models?pageSize=1000");
        assert_eq!(urls[1], "http://vertex.test/v1beta1/publishers/google/models");
    }

    #[tokio::test]
    async fn upstream_failure_is_reported() {
        let transport = Arc::new(ScriptedTransport::new().reply(403, json!({"error": {"message": "denied"}})));
        let err = ModelCatalog::new(transport)
            .list(&studio_context())
            .await
            .unwrap_err();
        assert_eq!(
            err,
            UpstreamError::Upstream {
                code: 403,
                message: "denied".into()
            }
        );
    }
}
