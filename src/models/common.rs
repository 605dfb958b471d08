use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::ValidationError;

/// Upstream service a request is sent to.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum Backend {
    #[serde(rename = "studio", alias = "StudioAPI", alias = "gemini")]
    Studio,
    #[serde(rename = "vertex", alias = "VertexAPI")]
    Vertex,
}

impl Backend {
    pub fn as_str(&self) -> &'static str {
        match self {
            Backend::Studio => "studio",
            Backend::Vertex => "vertex",
        }
    }
}

impl Default for Backend {
    fn default() -> Self {
        Backend::Studio
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Backend {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "studio" | "studioapi" | "gemini" => Ok(Backend::Studio),
            "vertex" | "vertexapi" => Ok(Backend::Vertex),
            other => Err(ValidationError::UnknownBackend(other.to_string())),
        }
    }
}

/// Either a routing-table tier or a caller-supplied model id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ModelSelector {
    Fast,
    Pro,
    Explicit(String),
}

impl Default for ModelSelector {
    fn default() -> Self {
        ModelSelector::Fast
    }
}

impl From<String> for ModelSelector {
    fn from(value: String) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "" | "fast" => ModelSelector::Fast,
            "pro" => ModelSelector::Pro,
            _ => ModelSelector::Explicit(value.trim().to_string()),
        }
    }
}

impl From<&str> for ModelSelector {
    fn from(value: &str) -> Self {
        ModelSelector::from(value.to_string())
    }
}

impl From<ModelSelector> for String {
    fn from(selector: ModelSelector) -> Self {
        selector.to_string()
    }
}

impl fmt::Display for ModelSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModelSelector::Fast => f.write_str("fast"),
            ModelSelector::Pro => f.write_str("pro"),
            ModelSelector::Explicit(id) => f.write_str(id),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum VideoMode {
    #[serde(rename = "text")]
    Text,
    #[serde(rename = "image-to-video", alias = "image")]
    ImageToVideo,
    #[serde(rename = "interpolation")]
    Interpolation,
}

impl Default for VideoMode {
    fn default() -> Self {
        VideoMode::Text
    }
}

impl FromStr for VideoMode {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "" | "text" => Ok(VideoMode::Text),
            "image" | "image-to-video" => Ok(VideoMode::ImageToVideo),
            "interpolation" => Ok(VideoMode::Interpolation),
            other => Err(ValidationError::UnknownVideoMode(other.to_string())),
        }
    }
}
