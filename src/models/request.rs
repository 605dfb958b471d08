use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::{Deserialize, Serialize};

use super::common::{Backend, ModelSelector, VideoMode};
use crate::error::ValidationError;

const DEFAULT_IMAGE_MIME: &str = "image/png";

/// A decoded reference image. Decoded once when the request is built and
/// never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReferenceImage {
    data: Vec<u8>,
    mime_type: String,
}

impl ReferenceImage {
    pub fn new(data: Vec<u8>, mime_type: impl Into<String>) -> Self {
        Self {
            data,
            mime_type: mime_type.into(),
        }
    }

    /// Decodes a data URI (`data:image/jpeg;base64,...`) or bare base64.
    pub fn from_encoded(encoded: &str) -> Result<Self, String> {
        let encoded = encoded.trim();
        let (declared_mime, payload) = match encoded.strip_prefix("data:") {
            Some(rest) => {
                let (header, payload) = rest
                    .split_once(',')
                    .ok_or_else(|| "data URI has no payload".to_string())?;
                let mime = header.trim_end_matches(";base64");
                let mime = (!mime.is_empty()).then(|| mime.to_string());
                (mime, payload)
            }
            None => (None, encoded),
        };

        let data = STANDARD
            .decode(payload.trim())
            .map_err(|e| format!("invalid base64: {}", e))?;
        if data.is_empty() {
            return Err("image is empty".to_string());
        }

        let mime_type = declared_mime
            .or_else(|| infer::get(&data).map(|kind| kind.mime_type().to_string()))
            .unwrap_or_else(|| DEFAULT_IMAGE_MIME.to_string());

        Ok(Self { data, mime_type })
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    pub fn to_base64(&self) -> String {
        STANDARD.encode(&self.data)
    }

    pub fn to_data_uri(&self) -> String {
        format!("data:{};base64,{}", self.mime_type, self.to_base64())
    }
}

/// Optional tuning knobs forwarded to the upstream model.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationParameters {
    pub temperature: Option<f32>,
    pub max_output_tokens: Option<u32>,
    pub aspect_ratio: Option<String>,
    pub negative_prompt: Option<String>,
    pub duration_seconds: Option<u32>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct VideoOptions {
    pub mode: VideoMode,
    pub start_frame: Option<ReferenceImage>,
    pub end_frame: Option<ReferenceImage>,
}

/// A normalized generation request. `video` is `None` for content
/// (text/image) generation.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationRequest {
    pub prompt: String,
    pub backend: Backend,
    pub model_selector: ModelSelector,
    pub media_inputs: Vec<ReferenceImage>,
    pub video: Option<VideoOptions>,
    pub parameters: GenerationParameters,
}

impl GenerationRequest {
    pub fn content(prompt: impl Into<String>, backend: Backend, selector: ModelSelector) -> Self {
        Self {
            prompt: prompt.into(),
            backend,
            model_selector: selector,
            media_inputs: Vec::new(),
            video: None,
            parameters: GenerationParameters::default(),
        }
    }

    pub fn video(prompt: impl Into<String>, backend: Backend, mode: VideoMode) -> Self {
        Self {
            prompt: prompt.into(),
            backend,
            model_selector: ModelSelector::Fast,
            media_inputs: Vec::new(),
            video: Some(VideoOptions {
                mode,
                start_frame: None,
                end_frame: None,
            }),
            parameters: GenerationParameters::default(),
        }
    }

    pub fn with_image(mut self, image: ReferenceImage) -> Self {
        self.media_inputs.push(image);
        self
    }

    pub fn with_selector(mut self, selector: ModelSelector) -> Self {
        self.model_selector = selector;
        self
    }

    pub fn with_frames(
        mut self,
        start: Option<ReferenceImage>,
        end: Option<ReferenceImage>,
    ) -> Self {
        if let Some(video) = self.video.as_mut() {
            video.start_frame = start;
            video.end_frame = end;
        }
        self
    }

    pub fn with_parameters(mut self, parameters: GenerationParameters) -> Self {
        self.parameters = parameters;
        self
    }

    pub fn is_video(&self) -> bool {
        self.video.is_some()
    }
}

/// JSON body of `POST /generate/content`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentRequestBody {
    #[serde(default)]
    pub prompt: String,
    #[serde(default)]
    pub backend: Backend,
    #[serde(default, alias = "modelId")]
    pub model_selector: Option<String>,
    #[serde(default)]
    pub reference_images: Vec<String>,
    #[serde(flatten)]
    pub parameters: GenerationParameters,
}

impl TryFrom<ContentRequestBody> for GenerationRequest {
    type Error = ValidationError;

    fn try_from(body: ContentRequestBody) -> Result<Self, Self::Error> {
        let selector = body
            .model_selector
            .map(ModelSelector::from)
            .unwrap_or_default();
        let media_inputs = body
            .reference_images
            .iter()
            .enumerate()
            .map(|(index, encoded)| decode_image(index, encoded))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(GenerationRequest {
            prompt: body.prompt,
            backend: body.backend,
            model_selector: selector,
            media_inputs,
            video: None,
            parameters: body.parameters,
        })
    }
}

/// JSON body of `POST /generate/video`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoRequestBody {
    #[serde(default)]
    pub prompt: String,
    #[serde(default = "vertex_backend")]
    pub backend: Backend,
    #[serde(default, alias = "modelId")]
    pub model_selector: Option<String>,
    #[serde(default, alias = "mode")]
    pub video_mode: Option<String>,
    pub image: Option<String>,
    pub start_frame: Option<String>,
    pub end_frame: Option<String>,
    #[serde(flatten)]
    pub parameters: GenerationParameters,
}

fn vertex_backend() -> Backend {
    Backend::Vertex
}

impl TryFrom<VideoRequestBody> for GenerationRequest {
    type Error = ValidationError;

    fn try_from(body: VideoRequestBody) -> Result<Self, Self::Error> {
        let mode = match body.video_mode.as_deref() {
            Some(mode) => mode.parse()?,
            None => VideoMode::Text,
        };
        let selector = body
            .model_selector
            .map(ModelSelector::from)
            .unwrap_or_default();
        let media_inputs = body
            .image
            .as_deref()
            .filter(|encoded| !encoded.trim().is_empty())
            .map(|encoded| decode_image(0, encoded))
            .transpose()?
            .into_iter()
            .collect();
        let start_frame = body
            .start_frame
            .as_deref()
            .filter(|encoded| !encoded.trim().is_empty())
            .map(|encoded| decode_image(0, encoded))
            .transpose()?;
        let end_frame = body
            .end_frame
            .as_deref()
            .filter(|encoded| !encoded.trim().is_empty())
            .map(|encoded| decode_image(1, encoded))
            .transpose()?;

        Ok(GenerationRequest {
            prompt: body.prompt,
            backend: body.backend,
            model_selector: selector,
            media_inputs,
            video: Some(VideoOptions {
                mode,
                start_frame,
                end_frame,
            }),
            parameters: body.parameters,
        })
    }
}

fn decode_image(index: usize, encoded: &str) -> Result<ReferenceImage, ValidationError> {
    ReferenceImage::from_encoded(encoded)
        .map_err(|reason| ValidationError::InvalidImage { index, reason })
}

#[cfg(test)]
mod tests {
    use super::*;

    const PNG_HEADER: [u8; 8] = [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];

    #[test]
    fn data_uri_round_trip_keeps_bytes_and_mime() {
        let original = ReferenceImage::new(vec![1, 2, 3, 250], "image/webp");
        let decoded = ReferenceImage::from_encoded(&original.to_data_uri()).unwrap();
        assert_eq!(decoded, original);
    }

    #[test]
    fn bare_base64_sniffs_png() {
        let encoded = STANDARD.encode(PNG_HEADER);
        let image = ReferenceImage::from_encoded(&encoded).unwrap();
        assert_eq!(image.mime_type(), "image/png");
        assert_eq!(image.data(), &PNG_HEADER);
    }

    #[test]
    fn unknown_bytes_default_to_png() {
        let image = ReferenceImage::from_encoded(&STANDARD.encode([7u8, 7, 7])).unwrap();
        assert_eq!(image.mime_type(), "image/png");
    }

    #[test]
    fn garbage_is_rejected() {
        assert!(ReferenceImage::from_encoded("data:image/png;base64,@@@").is_err());
        assert!(ReferenceImage::from_encoded("").is_err());
    }

    #[test]
    fn content_body_decodes_reference_images() {
        let body: ContentRequestBody = serde_json::from_value(serde_json::json!({
            "prompt": "a red cube",
            "backend": "studio",
            "modelSelector": "pro",
            "referenceImages": [ReferenceImage::new(vec![9, 9], "image/jpeg").to_data_uri()],
            "temperature": 0.4
        }))
        .unwrap();

        let request = GenerationRequest::try_from(body).unwrap();
        assert_eq!(request.model_selector, ModelSelector::Pro);
        assert_eq!(request.media_inputs.len(), 1);
        assert_eq!(request.media_inputs[0].mime_type(), "image/jpeg");
        assert_eq!(request.parameters.temperature, Some(0.4));
        assert!(!request.is_video());
    }

    #[test]
    fn content_body_reports_index_of_bad_image() {
        let body: ContentRequestBody = serde_json::from_value(serde_json::json!({
            "prompt": "x",
            "referenceImages": [STANDARD.encode([1u8]), "not base64!"]
        }))
        .unwrap();

        match GenerationRequest::try_from(body) {
            Err(ValidationError::InvalidImage { index, .. }) => assert_eq!(index, 1),
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn video_body_maps_image_to_media_inputs() {
        let body: VideoRequestBody = serde_json::from_value(serde_json::json!({
            "prompt": "pan left",
            "mode": "image",
            "image": STANDARD.encode(PNG_HEADER)
        }))
        .unwrap();

        let request = GenerationRequest::try_from(body).unwrap();
        assert_eq!(request.backend, Backend::Vertex);
        assert_eq!(request.media_inputs.len(), 1);
        assert_eq!(
            request.video.as_ref().map(|v| v.mode),
            Some(VideoMode::ImageToVideo)
        );
    }
}
