use serde_json::{json, Map, Value};

use crate::models::{GenerationRequest, ReferenceImage, VideoMode};
use crate::routing::{PayloadShape, VendorCallSpec};

/// Builds the outbound JSON body for `spec`'s payload shape.
pub fn build_payload(spec: &VendorCallSpec, request: &GenerationRequest) -> Value {
    match spec.payload_shape {
        PayloadShape::GenerateContent => content_payload(request),
        PayloadShape::PredictLongRunning => video_payload(request),
    }
}

/// `generateContent` body: the prompt part followed by one inline part per
/// reference image, in request order.
pub fn content_payload(request: &GenerationRequest) -> Value {
    let mut parts = vec![json!({ "text": request.prompt })];
    parts.extend(request.media_inputs.iter().map(|image| {
        json!({
            "inlineData": {
                "mimeType": image.mime_type(),
                "data": image.to_base64(),
            }
        })
    }));

    let mut body = json!({
        "contents": [{ "role": "user", "parts": parts }]
    });

    let params = &request.parameters;
    let mut generation_config = Map::new();
    if let Some(temperature) = params.temperature {
        generation_config.insert("temperature".into(), json!(temperature));
    }
    if let Some(max_tokens) = params.max_output_tokens {
        generation_config.insert("maxOutputTokens".into(), json!(max_tokens));
    }
    if let Some(aspect_ratio) = &params.aspect_ratio {
        generation_config.insert("imageConfig".into(), json!({ "aspectRatio": aspect_ratio }));
    }
    if !generation_config.is_empty() {
        body["generationConfig"] = Value::Object(generation_config);
    }
    body
}

/// `predictLongRunning` body for Veo.
pub fn video_payload(request: &GenerationRequest) -> Value {
    let mut instance = Map::new();
    if !request.prompt.trim().is_empty() {
        instance.insert("prompt".into(), json!(request.prompt));
    }

    if let Some(video) = &request.video {
        match video.mode {
            VideoMode::Text => {}
            VideoMode::ImageToVideo => {
                if let Some(image) = request.media_inputs.first() {
                    instance.insert("image".into(), veo_image(image));
                }
            }
            VideoMode::Interpolation => {
                if let Some(start) = &video.start_frame {
                    instance.insert("image".into(), veo_image(start));
                }
                if let Some(end) = &video.end_frame {
                    instance.insert("lastFrame".into(), veo_image(end));
                }
            }
        }
    }

    let params = &request.parameters;
    let mut parameters = Map::new();
    parameters.insert("sampleCount".into(), json!(1));
    if let Some(aspect_ratio) = &params.aspect_ratio {
        parameters.insert("aspectRatio".into(), json!(aspect_ratio));
    }
    if let Some(negative_prompt) = &params.negative_prompt {
        parameters.insert("negativePrompt".into(), json!(negative_prompt));
    }
    if let Some(duration) = params.duration_seconds {
        parameters.insert("durationSeconds".into(), json!(duration));
    }

    json!({
        "instances": [Value::Object(instance)],
        "parameters": Value::Object(parameters),
    })
}

fn veo_image(image: &ReferenceImage) -> Value {
    json!({
        "bytesBase64Encoded": image.to_base64(),
        "mimeType": image.mime_type(),
    })
}
