use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Canonical output of a generation request. Exactly one variant is ever
/// populated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum GenerationResult {
    Text {
        text: String,
    },
    Image {
        #[serde(with = "base64_bytes")]
        data: Vec<u8>,
        #[serde(rename = "mimeType")]
        mime_type: String,
    },
    VideoInline {
        #[serde(with = "base64_bytes")]
        data: Vec<u8>,
        #[serde(rename = "mimeType")]
        mime_type: String,
    },
    VideoUri {
        uri: String,
    },
    /// Nothing usable was found; the raw upstream body is kept for diagnosis.
    Empty {
        raw: Value,
    },
}

impl GenerationResult {
    pub fn kind(&self) -> &'static str {
        match self {
            GenerationResult::Text { .. } => "text",
            GenerationResult::Image { .. } => "image",
            GenerationResult::VideoInline { .. } => "videoInline",
            GenerationResult::VideoUri { .. } => "videoUri",
            GenerationResult::Empty { .. } => "empty",
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, GenerationResult::Empty { .. })
    }
}

/// A result plus the model that produced it and an optional note, e.g. when
/// the fallback model answered instead of the requested one.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationOutcome {
    pub result: GenerationResult,
    pub model: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub operation: Option<String>,
}

impl GenerationOutcome {
    pub fn new(result: GenerationResult, model: impl Into<String>) -> Self {
        Self {
            result,
            model: model.into(),
            note: None,
            operation: None,
        }
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.note = Some(note.into());
        self
    }

    pub fn with_operation(mut self, operation: impl Into<String>) -> Self {
        self.operation = Some(operation.into());
        self
    }
}

mod base64_bytes {
    use base64::{engine::general_purpose::STANDARD, Engine as _};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        STANDARD
            .decode(encoded.as_bytes())
            .map_err(serde::de::Error::custom)
    }
}
