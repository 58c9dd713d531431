//! Gemini image backend over `streamGenerateContent` with Server-Sent Events.
//!
//! ## Wire format
//!
//! ```text
//! POST {base}/v1beta/models/{model}:streamGenerateContent?alt=sse
//! x-goog-api-key: …
//! { "contents": [{ "role": "user", "parts": [{ "text": prompt }] }],
//!   "generationConfig": { "responseModalities": ["IMAGE"], "temperature": 1.0 } }
//! ```
//!
//! Each SSE `data:` line is a `GenerateContentResponse`; image bytes arrive
//! base64-encoded in `candidates[0].content.parts[*].inlineData.data`.
//!
//! ## Rate limits
//!
//! Quota errors come back as HTTP 429 / `RESOURCE_EXHAUSTED`. The server's
//! suggested wait is read from the structured `google.rpc.RetryInfo` detail
//! when present; otherwise [`parse_retry_hint`] scans the message text. If
//! neither yields a duration the error carries `retry_after: None` and the
//! client applies its default backoff.

use super::{ChunkStream, GenerationRequest, ImageBackend, ResponseChunk, ResponseModality};
use crate::error::{BackendError, DiagramError};
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use futures::{future, StreamExt, TryStreamExt};
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::Client;
use reqwest_eventsource::{retry::Never, Event, EventSource};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

/// Gemini API client for image generation.
pub struct GeminiBackend {
    api_key: String,
    base_url: String,
    http: Client,
}

impl GeminiBackend {
    pub fn new(
        api_key: impl Into<String>,
        base_url: &str,
        timeout_secs: u64,
    ) -> Result<Self, DiagramError> {
        let http = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| DiagramError::Internal(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            api_key: api_key.into(),
            base_url: base_url.trim_end_matches('/').to_string(),
            http,
        })
    }

    fn endpoint(&self, model: &str) -> String {
        format!(
            "{}/v1beta/models/{}:streamGenerateContent?alt=sse",
            self.base_url, model
        )
    }
}

#[async_trait]
impl ImageBackend for GeminiBackend {
    async fn stream_generate(
        &self,
        request: &GenerationRequest,
    ) -> Result<ChunkStream, BackendError> {
        let url = self.endpoint(&request.model);
        debug!(%url, prompt_len = request.prompt.len(), "stream_generate: opening stream");

        let http_request = self
            .http
            .post(url)
            .header("x-goog-api-key", &self.api_key)
            .json(&build_request_body(request));

        let mut es = EventSource::new(http_request)
            .map_err(|e| BackendError::Transport(e.to_string()))?;
        es.set_retry_policy(Box::new(Never));

        let chunks = es
            .take_while(|event| {
                future::ready(!matches!(
                    event,
                    Err(reqwest_eventsource::Error::StreamEnded)
                ))
            })
            .then(|event| async move {
                match event {
                    Ok(Event::Open) => {
                        debug!("stream_generate: stream opened");
                        Ok(None)
                    }
                    Ok(Event::Message(message)) => parse_chunk(&message.data).map(Some),
                    Err(reqwest_eventsource::Error::InvalidStatusCode(status, response)) => {
                        let body = response.text().await.unwrap_or_default();
                        Err(classify_error(status.as_u16(), &body))
                    }
                    Err(other) => Err(BackendError::Transport(other.to_string())),
                }
            })
            .try_filter_map(|chunk| future::ready(Ok(chunk)));

        Ok(Box::pin(chunks))
    }
}

// ── Request body ─────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest<'a> {
    contents: Vec<Content<'a>>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    role: &'a str,
    parts: Vec<TextPart<'a>>,
}

#[derive(Debug, Serialize)]
struct TextPart<'a> {
    text: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    response_modalities: Vec<ResponseModality>,
    temperature: f32,
}

fn build_request_body(request: &GenerationRequest) -> GenerateContentRequest<'_> {
    GenerateContentRequest {
        contents: vec![Content {
            role: "user",
            parts: vec![TextPart {
                text: &request.prompt,
            }],
        }],
        generation_config: GenerationConfig {
            response_modalities: vec![request.response_modality],
            temperature: request.temperature,
        },
    }
}

// ── Response decoding ────────────────────────────────────────────────────

#[derive(Debug, Default, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    error: Option<ApiErrorBody>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Part {
    inline_data: Option<InlineData>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InlineData {
    #[serde(default)]
    mime_type: Option<String>,
    #[serde(default)]
    data: String,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ApiErrorBody,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    #[serde(default)]
    code: Option<u16>,
    #[serde(default)]
    message: String,
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    details: Vec<serde_json::Value>,
}

/// Decode one SSE `data:` payload into a [`ResponseChunk`].
///
/// Only the first candidate is read. An `error` object embedded in the event
/// is classified like an HTTP error body.
fn parse_chunk(data: &str) -> Result<ResponseChunk, BackendError> {
    let response: GenerateContentResponse = serde_json::from_str(data)
        .map_err(|e| BackendError::InvalidResponse(format!("Bad stream event: {e}")))?;

    if let Some(err) = response.error {
        return Err(classify_api_error(err.code.unwrap_or(500), err));
    }

    let parts = response
        .candidates
        .into_iter()
        .next()
        .and_then(|c| c.content)
        .map(|c| c.parts)
        .unwrap_or_default();

    let mut payloads = Vec::new();
    for inline in parts.into_iter().filter_map(|p| p.inline_data) {
        let bytes = STANDARD.decode(inline.data.as_bytes()).map_err(|e| {
            BackendError::InvalidResponse(format!("Inline data is not base64: {e}"))
        })?;
        debug!(
            mime = inline.mime_type.as_deref().unwrap_or("?"),
            bytes = bytes.len(),
            "parse_chunk: inline payload"
        );
        payloads.push(bytes);
    }

    Ok(ResponseChunk { payloads })
}

/// Map a non-success HTTP response to a [`BackendError`].
fn classify_error(status: u16, body: &str) -> BackendError {
    match serde_json::from_str::<ErrorEnvelope>(body) {
        Ok(envelope) => classify_api_error(status, envelope.error),
        Err(_) if status == 429 => BackendError::RateLimited {
            retry_after: parse_retry_hint(body),
            detail: body.trim().to_string(),
        },
        Err(_) => BackendError::Api {
            status,
            message: body.trim().to_string(),
        },
    }
}

fn classify_api_error(status: u16, err: ApiErrorBody) -> BackendError {
    let exhausted = err.status.as_deref() == Some("RESOURCE_EXHAUSTED");
    if status == 429 || err.code == Some(429) || exhausted {
        let retry_after =
            structured_retry_delay(&err.details).or_else(|| parse_retry_hint(&err.message));
        warn!(?retry_after, "Gemini rate limit: {}", err.message);
        return BackendError::RateLimited {
            retry_after,
            detail: err.message,
        };
    }

    BackendError::Api {
        status: err.code.unwrap_or(status),
        message: err.message,
    }
}

/// Read `retryDelay` from a `google.rpc.RetryInfo` error detail, e.g. `"37s"`.
fn structured_retry_delay(details: &[serde_json::Value]) -> Option<Duration> {
    details
        .iter()
        .filter(|d| {
            d.get("@type")
                .and_then(|t| t.as_str())
                .is_some_and(|t| t.ends_with("google.rpc.RetryInfo"))
        })
        .filter_map(|d| d.get("retryDelay").and_then(|v| v.as_str()))
        .find_map(|delay| {
            delay
                .trim()
                .strip_suffix('s')
                .and_then(|secs| secs.parse::<f64>().ok())
                .and_then(|secs| Duration::try_from_secs_f64(secs).ok())
        })
}

static RE_RETRY_IN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)retry\s+in\s+(\d+(?:\.\d+)?)\s*(ms|s|sec|secs|seconds?)?\b").unwrap()
});

/// Extract a suggested wait from free-form error text ("Please retry in 37.5s.").
///
/// Returns `None` when the text carries no hint, or one too large to
/// represent; the caller then uses its default backoff (60 s unless
/// configured otherwise). A bare number is read as seconds.
pub fn parse_retry_hint(detail: &str) -> Option<Duration> {
    let caps = RE_RETRY_IN.captures(detail)?;
    let value: f64 = caps[1].parse().ok()?;
    let secs = match caps.get(2).map(|m| m.as_str().to_ascii_lowercase()) {
        Some(unit) if unit == "ms" => value / 1000.0,
        _ => value,
    };
    Duration::try_from_secs_f64(secs).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_body_shape() {
        let req = GenerationRequest::new("draw", "gemini-3-pro-image-preview");
        let json = serde_json::to_value(build_request_body(&req)).unwrap();
        assert_eq!(json["contents"][0]["role"], "user");
        assert_eq!(json["contents"][0]["parts"][0]["text"], "draw");
        assert_eq!(json["generationConfig"]["responseModalities"][0], "IMAGE");
        assert_eq!(json["generationConfig"]["temperature"], 1.0);
    }

    #[test]
    fn endpoint_uses_model_and_sse() {
        let backend = GeminiBackend::new("k", "https://example.test/", 30).unwrap();
        assert_eq!(
            backend.endpoint("gemini-2.5-flash-image"),
            "https://example.test/v1beta/models/gemini-2.5-flash-image:streamGenerateContent?alt=sse"
        );
    }

    #[test]
    fn parse_chunk_decodes_inline_data() {
        let data = STANDARD.encode([0x89, b'P', b'N', b'G']);
        let event = format!(
            r#"{{"candidates":[{{"content":{{"role":"model","parts":[
                {{"text":"here you go"}},
                {{"inlineData":{{"mimeType":"image/png","data":"{data}"}}}}
            ]}}}}]}}"#
        );
        let chunk = parse_chunk(&event).unwrap();
        assert_eq!(chunk.payloads, vec![vec![0x89, b'P', b'N', b'G']]);
    }

    #[test]
    fn parse_chunk_without_candidates_is_empty() {
        let chunk = parse_chunk(r#"{"usageMetadata":{"promptTokenCount":12}}"#).unwrap();
        assert!(chunk.payloads.is_empty());
    }

    #[test]
    fn parse_chunk_rejects_garbage() {
        let err = parse_chunk("not json").unwrap_err();
        assert!(matches!(err, BackendError::InvalidResponse(_)));
    }

    #[test]
    fn parse_chunk_embedded_error_is_classified() {
        let err = parse_chunk(
            r#"{"error":{"code":429,"message":"Quota exceeded. Please retry in 12s.","status":"RESOURCE_EXHAUSTED"}}"#,
        )
        .unwrap_err();
        assert_eq!(err.retry_after(), Some(Duration::from_secs(12)));
    }

    #[test]
    fn classify_prefers_structured_retry_info() {
        let body = r#"{"error":{"code":429,"message":"Please retry in 99s.","status":"RESOURCE_EXHAUSTED",
            "details":[{"@type":"type.googleapis.com/google.rpc.RetryInfo","retryDelay":"37s"}]}}"#;
        let err = classify_error(429, body);
        assert!(err.is_rate_limit());
        assert_eq!(err.retry_after(), Some(Duration::from_secs(37)));
    }

    #[test]
    fn classify_resource_exhausted_without_hint() {
        let body = r#"{"error":{"code":429,"message":"Quota exceeded","status":"RESOURCE_EXHAUSTED"}}"#;
        let err = classify_error(429, body);
        assert!(err.is_rate_limit());
        assert_eq!(err.retry_after(), None);
    }

    #[test]
    fn classify_plain_text_429() {
        let err = classify_error(429, "Too many requests, retry in 20 seconds");
        assert_eq!(err.retry_after(), Some(Duration::from_secs(20)));
    }

    #[test]
    fn classify_other_status_is_api_error() {
        let body = r#"{"error":{"code":400,"message":"Model does not support image output","status":"INVALID_ARGUMENT"}}"#;
        match classify_error(400, body) {
            BackendError::Api { status, message } => {
                assert_eq!(status, 400);
                assert!(message.contains("image output"));
            }
            other => panic!("expected Api error, got {other:?}"),
        }
    }

    #[test]
    fn retry_hint_variants() {
        assert_eq!(
            parse_retry_hint("Please retry in 37.5s."),
            Some(Duration::from_secs_f64(37.5))
        );
        assert_eq!(parse_retry_hint("RETRY IN 8"), Some(Duration::from_secs(8)));
        assert_eq!(
            parse_retry_hint("retry in 250ms"),
            Some(Duration::from_millis(250))
        );
        assert_eq!(parse_retry_hint("quota exceeded"), None);
        assert_eq!(parse_retry_hint(""), None);
    }

    #[test]
    fn oversized_retry_hint_is_ignored() {
        assert_eq!(
            parse_retry_hint("Please retry in 99999999999999999999999s."),
            None
        );
        assert_eq!(parse_retry_hint("retry in 99999999999999999999999999ms"), None);
    }

    #[test]
    fn oversized_retry_info_falls_back_to_message() {
        let body = r#"{"error":{"code":429,"message":"Quota exceeded","status":"RESOURCE_EXHAUSTED",
            "details":[{"@type":"type.googleapis.com/google.rpc.RetryInfo","retryDelay":"1e30s"}]}}"#;
        let err = classify_error(429, body);
        assert!(err.is_rate_limit());
        assert_eq!(err.retry_after(), None);

        let body = r#"{"error":{"code":429,"message":"Please retry in 4s.","status":"RESOURCE_EXHAUSTED",
            "details":[{"@type":"type.googleapis.com/google.rpc.RetryInfo","retryDelay":"-3s"}]}}"#;
        assert_eq!(classify_error(429, body).retry_after(), Some(Duration::from_secs(4)));
    }
}
