use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
pub enum ModelFamily {
    Gemini,
    Gemma,
    Imagen,
    Other,
    Veo,
}

impl ModelFamily {
    pub fn as_str(&self) -> &'static str {
        match self {
            ModelFamily::Gemini => "Gemini",
            ModelFamily::Gemma => "Gemma",
            ModelFamily::Imagen => "Imagen",
            ModelFamily::Other => "Other",
            ModelFamily::Veo => "Veo",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ModelType {
    Text,
    Image,
    Video,
}

/// Family and type from substring heuristics on the model id.
pub fn classify(model_id: &str) -> (ModelFamily, ModelType) {
    let id = model_id.to_ascii_lowercase();
    if id.contains("imagen") {
        (ModelFamily::Imagen, ModelType::Image)
    } else if id.contains("veo") {
        (ModelFamily::Veo, ModelType::Video)
    } else if id.contains("gemini") {
        let kind = if id.contains("image") {
            ModelType::Image
        } else {
            ModelType::Text
        };
        (ModelFamily::Gemini, kind)
    } else if id.contains("gemma") {
        (ModelFamily::Gemma, ModelType::Text)
    } else {
        (ModelFamily::Other, ModelType::Text)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ModelInfo {
    pub id: String,
    pub display_name: Option<String>,
    pub description: Option<String>,
    pub version: Option<String>,
    pub family: ModelFamily,
    #[serde(rename = "type")]
    pub model_type: ModelType,
}

impl ModelInfo {
    pub fn new(id: impl Into<String>) -> Self {
        let id = id.into();
        let (family, model_type) = classify(&id);
        Self {
            id,
            display_name: None,
            description: None,
            version: None,
            family,
            model_type,
        }
    }
}
