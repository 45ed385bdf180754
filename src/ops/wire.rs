//! JSON framing for a Gemini-style `generateContent` endpoint.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Serialize};

use super::ai::{ErrorCategory, GeneratedImage, GenerationError};
use super::request::OutboundRequest;

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct InlineData {
    #[serde(rename = "mimeType", default)]
    pub mime_type: Option<String>,
    pub data: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
pub struct Part {
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub text: Option<String>,
    #[serde(rename = "inlineData", skip_serializing_if = "Option::is_none", default)]
    pub inline_data: Option<InlineData>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
pub struct Content {
    #[serde(default)]
    pub parts: Vec<Part>,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct RequestBody {
    pub contents: Vec<Content>,
}

#[derive(Deserialize, Debug, Clone, Default)]
pub struct Candidate {
    #[serde(default)]
    pub content: Option<Content>,
    #[serde(rename = "finishReason", default)]
    pub finish_reason: Option<String>,
}

#[derive(Deserialize, Debug, Clone, Default)]
pub struct PromptFeedback {
    #[serde(rename = "blockReason", default)]
    pub block_reason: Option<String>,
}

#[derive(Deserialize, Debug, Clone, Default)]
pub struct ResponseBody {
    #[serde(default)]
    pub candidates: Vec<Candidate>,
    #[serde(rename = "promptFeedback", default)]
    pub prompt_feedback: Option<PromptFeedback>,
}

/// Text part first (prompt plus the size phrase), then one inline part per
/// image in request order.
pub fn request_body(request: &OutboundRequest) -> RequestBody {
    let mut parts = Vec::with_capacity(request.images.len() + 1);
    parts.push(Part {
        text: Some(format!("{}{}", request.prompt_text, request.size_hint.prompt_suffix())),
        inline_data: None,
    });
    parts.extend(request.images.iter().map(|img| Part {
        text: None,
        inline_data: Some(InlineData {
            mime_type: Some(img.mime_type.clone()),
            data: STANDARD.encode(&img.bytes),
        }),
    }));
    RequestBody {
        contents: vec![Content { parts }],
    }
}

pub fn encode_request(request: &OutboundRequest) -> Result<Vec<u8>, GenerationError> {
    serde_json::to_vec(&request_body(request))
        .map_err(|e| GenerationError::new(ErrorCategory::Unknown, format!("Could not encode request: {}", e)))
}

pub fn encode_request_pretty(request: &OutboundRequest) -> Result<String, GenerationError> {
    serde_json::to_string_pretty(&request_body(request))
        .map_err(|e| GenerationError::new(ErrorCategory::Unknown, format!("Could not encode request: {}", e)))
}

fn is_safety_reason(reason: &str) -> bool {
    matches!(reason, "SAFETY" | "PROHIBITED_CONTENT" | "IMAGE_SAFETY" | "BLOCKLIST")
}

/// Pull the first inline image out of a successful response body.
pub fn decode_response(body: &[u8]) -> Result<GeneratedImage, GenerationError> {
    let parsed: ResponseBody = serde_json::from_slice(body).map_err(|e| {
        GenerationError::new(ErrorCategory::Unknown, format!("Invalid response: {}", e))
    })?;

    if let Some(reason) = parsed.prompt_feedback.as_ref().and_then(|f| f.block_reason.as_deref()) {
        return Err(GenerationError::new(
            ErrorCategory::SafetyFilter,
            format!("The prompt was blocked ({})", reason),
        ));
    }

    let candidate = parsed
        .candidates
        .first()
        .ok_or_else(|| GenerationError::new(ErrorCategory::Unknown, "Response contained no candidates"))?;

    let inline = candidate
        .content
        .as_ref()
        .and_then(|c| c.parts.iter().find_map(|p| p.inline_data.as_ref()));

    match inline {
        Some(data) => {
            let bytes = STANDARD.decode(data.data.as_bytes()).map_err(|e| {
                GenerationError::new(ErrorCategory::Unknown, format!("Invalid image data: {}", e))
            })?;
            Ok(GeneratedImage {
                bytes,
                mime_type: data.mime_type.clone().unwrap_or_else(|| "image/png".to_string()),
            })
        }
        None => match candidate.finish_reason.as_deref() {
            Some(reason) if is_safety_reason(reason) => Err(GenerationError::new(
                ErrorCategory::SafetyFilter,
                format!("The image was blocked by the safety filter ({})", reason),
            )),
            _ => Err(GenerationError::new(ErrorCategory::Unknown, "Response contained no image data")),
        },
    }
}
