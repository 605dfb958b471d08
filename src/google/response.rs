//! Turns any upstream success body into a `GenerationResult`.
//!
//! Both backends and both call shapes are handled here: `generateContent`
//! candidates as well as the several ways a finished video operation
//! reports its output. When several kinds of output are present the result
//! is chosen by a fixed priority: inline video, then a file/video URI, then
//! an inline image, then text. Anything else yields `Empty` with the raw body.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde_json::Value;

use crate::models::GenerationResult;

const DEFAULT_VIDEO_MIME: &str = "video/mp4";
const DEFAULT_IMAGE_MIME: &str = "image/png";

#[derive(Default)]
struct Found {
    video_inline: Option<(Vec<u8>, String)>,
    uri: Option<String>,
    image_inline: Option<(Vec<u8>, String)>,
    text: Vec<String>,
}

impl Found {
    fn inline(&mut self, data: Vec<u8>, mime_type: String) {
        let slot = if mime_type.starts_with("video/") {
            &mut self.video_inline
        } else if mime_type.starts_with("image/") {
            &mut self.image_inline
        } else {
            log::debug!("Ignoring inline part of type {}", mime_type);
            return;
        };
        if slot.is_none() {
            *slot = Some((data, mime_type));
        }
    }

    fn uri(&mut self, uri: &str) {
        if self.uri.is_none() && !uri.is_empty() {
            self.uri = Some(uri.to_string());
        }
    }

    fn into_result(self, raw: &Value) -> GenerationResult {
        if let Some((data, mime_type)) = self.video_inline {
            GenerationResult::VideoInline { data, mime_type }
        } else if let Some(uri) = self.uri {
            GenerationResult::VideoUri { uri }
        } else if let Some((data, mime_type)) = self.image_inline {
            GenerationResult::Image { data, mime_type }
        } else if !self.text.is_empty() {
            GenerationResult::Text {
                text: self.text.join(""),
            }
        } else {
            GenerationResult::Empty { raw: raw.clone() }
        }
    }
}

pub fn normalize(raw: &Value) -> GenerationResult {
    let mut found = Found::default();
    for body in raw.get("response").into_iter().chain(Some(raw)) {
        collect_candidates(body, &mut found);
        collect_video_outputs(body, &mut found);
    }

    let result = found.into_result(raw);
    if result.is_empty() {
        log::warn!("Upstream response contained no usable output");
    }
    result
}

fn field<'a>(value: &'a Value, camel: &str, snake: &str) -> Option<&'a Value> {
    value.get(camel).or_else(|| value.get(snake))
}

fn array<'a>(value: &'a Value, key: &str) -> impl Iterator<Item = &'a Value> {
    value
        .get(key)
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
}

fn decode(encoded: &str) -> Option<Vec<u8>> {
    match STANDARD.decode(encoded.trim()) {
        Ok(data) if !data.is_empty() => Some(data),
        Ok(_) => None,
        Err(e) => {
            log::warn!("Skipping inline part with undecodable data: {}", e);
            None
        }
    }
}

fn collect_candidates(body: &Value, found: &mut Found) {
    let parts = array(body, "candidates")
        .filter_map(|candidate| candidate.pointer("/content/parts"))
        .filter_map(Value::as_array)
        .flatten();

    for part in parts {
        if part.get("thought").and_then(Value::as_bool) == Some(true) {
            continue;
        }
        if let Some(inline) = field(part, "inlineData", "inline_data") {
            let data = inline.get("data").and_then(Value::as_str).and_then(decode);
            if let Some(data) = data {
                let mime_type = field(inline, "mimeType", "mime_type")
                    .and_then(Value::as_str)
                    .unwrap_or(DEFAULT_IMAGE_MIME);
                found.inline(data, mime_type.to_string());
            }
        } else if let Some(file) = field(part, "fileData", "file_data") {
            if let Some(uri) = field(file, "fileUri", "file_uri").and_then(Value::as_str) {
                found.uri(uri);
            }
        } else if let Some(text) = part.get("text").and_then(Value::as_str) {
            found.text.push(text.to_string());
        }
    }
}

/// One video object: `{uri}`, `{gcsUri}` or inline bytes.
fn collect_video(video: &Value, found: &mut Found) {
    let encoded = video
        .get("bytesBase64Encoded")
        .or_else(|| video.get("encodedVideo"))
        .and_then(Value::as_str);
    if let Some(data) = encoded.and_then(decode) {
        let mime_type = video
            .get("mimeType")
            .and_then(Value::as_str)
            .filter(|mime| mime.starts_with("video/"))
            .unwrap_or(DEFAULT_VIDEO_MIME);
        found.inline(data, mime_type.to_string());
    }
    for key in ["uri", "gcsUri", "videoUri"] {
        if let Some(uri) = video.get(key).and_then(Value::as_str) {
            found.uri(uri);
        }
    }
}

fn collect_video_outputs(body: &Value, found: &mut Found) {
    if let Some(samples) = body.pointer("/generateVideoResponse/generatedSamples") {
        for sample in samples.as_array().into_iter().flatten() {
            if let Some(video) = sample.get("video") {
                collect_video(video, found);
            }
            if let Some(uri) = sample.get("videoUri").and_then(Value::as_str) {
                found.uri(uri);
            }
        }
    }
    for video in array(body, "videos") {
        collect_video(video, found);
    }
    for prediction in array(body, "predictions") {
        match prediction.get("video") {
            Some(video) => collect_video(video, found),
            None => collect_video(prediction, found),
        }
    }
    if let Some(uri) = body.get("videoUri").and_then(Value::as_str) {
        found.uri(uri);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn image_wins_over_text() {
        let raw = json!({
            "candidates": [{
                "content": {"parts": [
                    {"text": "Here is your cube."},
                    {"inlineData": {"mimeType": "image/png", "data": "AQID"}}
                ]}
            }]
        });
        assert_eq!(
            normalize(&raw),
            GenerationResult::Image {
                data: vec![1, 2, 3],
                mime_type: "image/png".into()
            }
        );
    }

    #[test]
    fn snake_case_inline_data_is_accepted() {
        let raw = json!({
            "candidates": [{"content": {"parts": [
                {"inline_data": {"mime_type": "image/jpeg", "data": "AQ=="}}
            ]}}]
        });
        assert_eq!(normalize(&raw).kind(), "image");
    }

    #[test]
    fn text_parts_are_joined_and_thoughts_skipped() {
        let raw = json!({
            "candidates": [{"content": {"parts": [
                {"text": "thinking...", "thought": true},
                {"text": "Hello, "},
                {"text": "world"}
            ]}}]
        });
        assert_eq!(
            normalize(&raw),
            GenerationResult::Text {
                text: "Hello, world".into()
            }
        );
    }

    #[test]
    fn video_uri_wins_over_text() {
        let raw = json!({
            "done": true,
            "response": {
                "generateVideoResponse": {
                    "generatedSamples": [{"video": {"uri": "https://files.test/v.mp4"}}]
                },
                "candidates": [{"content": {"parts": [{"text": "done"}]}}]
            }
        });
        assert_eq!(
            normalize(&raw),
            GenerationResult::VideoUri {
                uri: "https://files.test/v.mp4".into()
            }
        );
    }

    #[test]
    fn inline_video_wins_over_uri() {
        let raw = json!({
            "response": {
                "videos": [
                    {"gcsUri": "gs://bucket/a.mp4"},
                    {"bytesBase64Encoded": "AAEC", "mimeType": "video/mp4"}
                ]
            }
        });
        assert_eq!(
            normalize(&raw),
            GenerationResult::VideoInline {
                data: vec![0, 1, 2],
                mime_type: "video/mp4".into()
            }
        );
    }

    #[test]
    fn vertex_prediction_shapes_are_read() {
        let nested = json!({"response": {"predictions": [{"video": {"uri": "gs://b/v.mp4"}}]}});
        assert_eq!(normalize(&nested).kind(), "videoUri");

        let top_level = json!({"response": {"videoUri": "gs://b/w.mp4"}});
        assert_eq!(
            normalize(&top_level),
            GenerationResult::VideoUri {
                uri: "gs://b/w.mp4".into()
            }
        );
    }

    #[test]
    fn undecodable_inline_part_falls_through_to_text() {
        let raw = json!({
            "candidates": [{"content": {"parts": [
                {"inlineData": {"mimeType": "image/png", "data": "%%%"}},
                {"text": "fallback text"}
            ]}}]
        });
        assert_eq!(normalize(&raw).kind(), "text");
    }

    #[test]
    fn non_media_inline_part_does_not_become_image() {
        let raw = json!({
            "candidates": [{"content": {"parts": [
                {"inlineData": {"mimeType": "audio/wav", "data": "AQID"}},
                {"text": "spoken reply"}
            ]}}]
        });
        assert_eq!(
            normalize(&raw),
            GenerationResult::Text {
                text: "spoken reply".into()
            }
        );

        let pdf_only = json!({
            "candidates": [{"content": {"parts": [
                {"inlineData": {"mimeType": "application/pdf", "data": "AQID"}}
            ]}}]
        });
        assert_eq!(normalize(&pdf_only).kind(), "empty");
    }

    #[test]
    fn nothing_usable_is_empty_with_raw_body() {
        let raw = json!({"candidates": [{"finishReason": "SAFETY"}]});
        assert_eq!(normalize(&raw), GenerationResult::Empty { raw: raw.clone() });
    }
}
