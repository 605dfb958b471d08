//! Declarative routing from (backend, selector, mode) to a concrete vendor call.
//!
//! The table is data: it can be replaced with a JSON file (`ROUTING_TABLE`)
//! to add model ids or regions without touching the call path.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{ConfigError, ValidationError};
use crate::models::{Backend, GenerationRequest, ModelSelector, VideoMode};

const STUDIO_CONTENT: &str = "{base}/v1beta/models/{model}:generateContent";
const STUDIO_VIDEO: &str = "{base}/v1beta/models/{model}:predictLongRunning";
const STUDIO_POLL: &str = "{base}/v1beta/{operation}";
const VERTEX_CONTENT: &str =
    "{base}/v1/projects/{project}/locations/{region}/publishers/google/models/{model}:generateContent";
const VERTEX_VIDEO: &str =
    "{base}/v1beta1/projects/{project}/locations/{region}/publishers/google/models/{model}:predictLongRunning";
const VERTEX_POLL: &str = "{base}/v1beta1/{operation}";

/// Which row of the table a request selects.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum RouteSlot {
    Fast,
    Pro,
    Video,
    /// Row used for caller-supplied model ids on the content path.
    Custom,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum PayloadShape {
    GenerateContent,
    PredictLongRunning,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RouteEntry {
    pub backend: Backend,
    pub slot: RouteSlot,
    #[serde(default)]
    pub model_id: Option<String>,
    #[serde(default)]
    pub region: Option<String>,
    pub endpoint_template: String,
    #[serde(default)]
    pub poll_template: Option<String>,
    pub payload_shape: PayloadShape,
    #[serde(default)]
    pub fallback_model_id: Option<String>,
}

/// Result of a routing lookup. Pure data.
#[derive(Debug, Clone, PartialEq)]
pub struct VendorCallSpec {
    pub backend: Backend,
    pub endpoint_template: String,
    pub poll_template: Option<String>,
    pub model_id: String,
    pub region: Option<String>,
    pub payload_shape: PayloadShape,
    pub fallback_model_id: Option<String>,
}

impl VendorCallSpec {
    /// The fallback model, if one is configured and differs from the primary.
    pub fn fallback(&self) -> Option<&str> {
        self.fallback_model_id
            .as_deref()
            .filter(|fallback| !fallback.is_empty() && *fallback != self.model_id)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RoutingTable {
    routes: Vec<RouteEntry>,
}

impl Default for RoutingTable {
    fn default() -> Self {
        let fallback = Some(crate::config::DEFAULT_FALLBACK_MODEL.to_string());
        let content = |backend, slot, model: Option<&str>, region: Option<&str>| RouteEntry {
            backend,
            slot,
            model_id: model.map(String::from),
            region: region.map(String::from),
            endpoint_template: match backend {
                Backend::Studio => STUDIO_CONTENT.to_string(),
                Backend::Vertex => VERTEX_CONTENT.to_string(),
            },
            poll_template: None,
            payload_shape: PayloadShape::GenerateContent,
            fallback_model_id: fallback.clone(),
        };
        let video = |backend, model: &str, region: Option<&str>| RouteEntry {
            backend,
            slot: RouteSlot::Video,
            model_id: Some(model.to_string()),
            region: region.map(String::from),
            endpoint_template: match backend {
                Backend::Studio => STUDIO_VIDEO.to_string(),
                Backend::Vertex => VERTEX_VIDEO.to_string(),
            },
            poll_template: Some(match backend {
                Backend::Studio => STUDIO_POLL.to_string(),
                Backend::Vertex => VERTEX_POLL.to_string(),
            }),
            payload_shape: PayloadShape::PredictLongRunning,
            fallback_model_id: None,
        };

        RoutingTable {
            routes: vec![
                content(
                    Backend::Vertex,
                    RouteSlot::Fast,
                    Some("gemini-2.5-flash-image"),
                    Some("europe-west1"),
                ),
                content(
                    Backend::Vertex,
                    RouteSlot::Pro,
                    Some("gemini-3-pro-image-preview"),
                    Some("us-central1"),
                ),
                content(Backend::Vertex, RouteSlot::Custom, None, None),
                video(Backend::Vertex, "veo-3.0-generate-001", Some("us-central1")),
                content(
                    Backend::Studio,
                    RouteSlot::Fast,
                    Some("gemini-2.5-flash-image"),
                    None,
                ),
                content(
                    Backend::Studio,
                    RouteSlot::Pro,
                    Some("gemini-3-pro-image-preview"),
                    None,
                ),
                content(Backend::Studio, RouteSlot::Custom, None, None),
                video(Backend::Studio, "veo-3.1-generate-preview", None),
            ],
        }
    }
}

impl RoutingTable {
    pub fn new(routes: Vec<RouteEntry>) -> Self {
        Self { routes }
    }

    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        serde_json::from_str(json).map_err(|e| ConfigError::RoutingTable(e.to_string()))
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let json = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::RoutingTable(format!("{}: {}", path.display(), e)))?;
        Self::from_json(&json)
    }

    /// Replaces the fallback model of every content route. An empty string
    /// disables fallback.
    pub fn with_fallback_override(mut self, fallback: Option<&str>) -> Self {
        if let Some(fallback) = fallback {
            for route in self
                .routes
                .iter_mut()
                .filter(|r| r.payload_shape == PayloadShape::GenerateContent)
            {
                route.fallback_model_id =
                    (!fallback.trim().is_empty()).then(|| fallback.trim().to_string());
            }
        }
        self
    }

    pub fn routes(&self) -> &[RouteEntry] {
        &self.routes
    }

    pub fn lookup(&self, backend: Backend, slot: RouteSlot) -> Option<&RouteEntry> {
        self.routes
            .iter()
            .find(|route| route.backend == backend && route.slot == slot)
    }

    /// Validates `request` and resolves it to a call spec. Pure: no network,
    /// no side effects.
    pub fn normalize(
        &self,
        request: &GenerationRequest,
        max_reference_images: usize,
    ) -> Result<VendorCallSpec, ValidationError> {
        let slot = match &request.video {
            None => {
                require_prompt(request)?;
                if request.media_inputs.len() > max_reference_images {
                    return Err(ValidationError::TooManyImages {
                        count: request.media_inputs.len(),
                        max: max_reference_images,
                    });
                }
                match request.model_selector {
                    ModelSelector::Fast => RouteSlot::Fast,
                    ModelSelector::Pro => RouteSlot::Pro,
                    ModelSelector::Explicit(_) => RouteSlot::Custom,
                }
            }
            Some(video) => {
                match video.mode {
                    VideoMode::Text => {
                        require_prompt(request)?;
                        if !request.media_inputs.is_empty() {
                            return Err(ValidationError::TooManyImages {
                                count: request.media_inputs.len(),
                                max: 0,
                            });
                        }
                    }
                    VideoMode::ImageToVideo => match request.media_inputs.len() {
                        0 => return Err(ValidationError::MissingField("image".into())),
                        1 => {}
                        count => return Err(ValidationError::TooManyImages { count, max: 1 }),
                    },
                    VideoMode::Interpolation => {
                        if video.start_frame.is_none() {
                            return Err(ValidationError::MissingField("startFrame".into()));
                        }
                        if video.end_frame.is_none() {
                            return Err(ValidationError::MissingField("endFrame".into()));
                        }
                    }
                }
                RouteSlot::Video
            }
        };

        let unsupported = || ValidationError::UnsupportedRoute {
            backend: request.backend.to_string(),
            selector: request.model_selector.to_string(),
        };
        let route = self.lookup(request.backend, slot).ok_or_else(unsupported)?;
        let model_id = match &request.model_selector {
            ModelSelector::Explicit(id) => Some(id.clone()),
            _ => route.model_id.clone(),
        }
        .filter(|id| !id.is_empty())
        .ok_or_else(unsupported)?;

        Ok(VendorCallSpec {
            backend: route.backend,
            endpoint_template: route.endpoint_template.clone(),
            poll_template: route.poll_template.clone(),
            model_id,
            region: route.region.clone(),
            payload_shape: route.payload_shape,
            fallback_model_id: route.fallback_model_id.clone(),
        })
    }
}

fn require_prompt(request: &GenerationRequest) -> Result<(), ValidationError> {
    if request.prompt.trim().is_empty() {
        return Err(ValidationError::MissingField("prompt".into()));
    }
    Ok(())
}

/// Substitutes `{base}`, `{project}`, `{region}`, `{model}` and
/// `{operation}`. `{base}` goes first since base URLs may carry `{region}`.
pub fn render_template(template: &str, values: &TemplateValues<'_>) -> String {
    template
        .replace("{base}", values.base.trim_end_matches('/'))
        .replace("{project}", values.project.unwrap_or_default())
        .replace("{region}", values.region.unwrap_or_default())
        .replace("{model}", values.model.unwrap_or_default())
        .replace(
            "{operation}",
            values.operation.unwrap_or_default().trim_start_matches('/'),
        )
}

#[derive(Debug, Default, Clone, Copy)]
pub struct TemplateValues<'a> {
    pub base: &'a str,
    pub project: Option<&'a str>,
    pub region: Option<&'a str>,
    pub model: Option<&'a str>,
    pub operation: Option<&'a str>,
}
