// ============================================================================
// GENERATION API: error taxonomy, collaborator traits, Gemini-style client
// ============================================================================
//
// The core never talks to the network directly. Hosts hand a `Transport`
// (one POST of a JSON body) to `GeminiClient`, or implement `GenerationApi`
// themselves. Failures are categorised and surfaced; nothing is retried here.

use std::future::Future;
use std::time::Duration;

use super::request::OutboundRequest;
use super::wire;
use crate::settings::Settings;

pub const DEFAULT_API_ENDPOINT: &str =
    "https://generativelanguage.googleapis.com/v1beta/models/gemini-2.5-flash-image-preview:generateContent";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

// ============================================================================
// ERRORS
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    Validation,
    Auth,
    RateLimit,
    Server,
    SafetyFilter,
    Timeout,
    Unknown,
}

impl ErrorCategory {
    /// Category for a non-success HTTP status.
    pub fn from_status(status: u16) -> Self {
        match status {
            400 => ErrorCategory::Validation,
            401 | 403 => ErrorCategory::Auth,
            429 => ErrorCategory::RateLimit,
            500..=599 => ErrorCategory::Server,
            _ => ErrorCategory::Unknown,
        }
    }

    /// Short user-facing explanation.
    pub fn description(&self) -> &'static str {
        match self {
            ErrorCategory::Validation => "The request was rejected as invalid",
            ErrorCategory::Auth => "The API key was rejected",
            ErrorCategory::RateLimit => "Too many requests; wait a moment and try again",
            ErrorCategory::Server => "The image service had an internal error",
            ErrorCategory::SafetyFilter => "The content was blocked by the safety filter",
            ErrorCategory::Timeout => "The request timed out",
            ErrorCategory::Unknown => "Image generation failed",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationError {
    pub category: ErrorCategory,
    pub message: String,
}

impl GenerationError {
    pub fn new(category: ErrorCategory, message: impl Into<String>) -> Self {
        Self {
            category,
            message: message.into(),
        }
    }
}

impl std::fmt::Display for GenerationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.category.description(), self.message)
    }
}

impl std::error::Error for GenerationError {}

/// Network-level failure reported by a transport (DNS, TLS, reset, ...).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportError(pub String);

impl std::fmt::Display for TransportError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Network error: {}", self.0)
    }
}

impl std::error::Error for TransportError {}

impl From<TransportError> for GenerationError {
    fn from(e: TransportError) -> Self {
        GenerationError::new(ErrorCategory::Unknown, e.to_string())
    }
}

// ============================================================================
// COLLABORATOR TRAITS
// ============================================================================

/// One generated image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedImage {
    pub bytes: Vec<u8>,
    pub mime_type: String,
}

pub trait GenerationApi {
    fn generate(
        &self,
        request: &OutboundRequest,
        api_key: &str,
    ) -> impl Future<Output = Result<GeneratedImage, GenerationError>>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Sends one JSON POST. `headers` are `(name, value)` pairs.
pub trait Transport {
    fn post_json(
        &self,
        url: &str,
        headers: &[(&str, &str)],
        body: Vec<u8>,
    ) -> impl Future<Output = Result<HttpResponse, TransportError>>;
}

// ============================================================================
// CLIENT
// ============================================================================

pub struct GeminiClient<T: Transport> {
    transport: T,
    endpoint: String,
    timeout: Duration,
}

impl<T: Transport> GeminiClient<T> {
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            endpoint: DEFAULT_API_ENDPOINT.to_string(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Client configured from the `api_endpoint` and `request_timeout_secs`
    /// settings.
    pub fn from_settings(transport: T, settings: &Settings) -> Self {
        Self::new(transport)
            .with_endpoint(settings.api_endpoint.clone())
            .with_timeout(settings.request_timeout())
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }
}

fn error_snippet(body: &[u8]) -> String {
    let text = String::from_utf8_lossy(body);
    let trimmed = text.trim();
    if trimmed.chars().count() > 200 {
        format!("{}...", trimmed.chars().take(200).collect::<String>())
    } else {
        trimmed.to_string()
    }
}

impl<T: Transport> GenerationApi for GeminiClient<T> {
    async fn generate(
        &self,
        request: &OutboundRequest,
        api_key: &str,
    ) -> Result<GeneratedImage, GenerationError> {
        let body = wire::encode_request(request)?;
        let headers = [("Content-Type", "application/json"), ("x-goog-api-key", api_key)];

        let response = tokio::time::timeout(
            self.timeout,
            self.transport.post_json(&self.endpoint, &headers, body),
        )
        .await
        .map_err(|_| {
            GenerationError::new(
                ErrorCategory::Timeout,
                format!("No response after {} seconds", self.timeout.as_secs()),
            )
        })??;

        if !response.is_success() {
            return Err(GenerationError::new(
                ErrorCategory::from_status(response.status),
                format!("HTTP {} {}", response.status, error_snippet(&response.body)),
            ));
        }

        wire::decode_response(&response.body)
    }
}
