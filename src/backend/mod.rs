//! Image-generation backends.
//!
//! The generation client only needs one thing from a backend: send a
//! [`GenerationRequest`] and hand back a lazy stream of [`ResponseChunk`]s.
//! [`ImageBackend`] captures that contract so the retry/fold logic in
//! [`crate::pipeline::generate`] never sees HTTP, and tests can drive it
//! with a scripted in-memory backend.
//!
//! [`resolve_backend`] picks the backend for a config: a pre-built one if the
//! caller supplied it, otherwise a [`gemini::GeminiBackend`] keyed from the
//! config or environment.

pub mod gemini;

use crate::config::DiagramConfig;
use crate::error::{BackendError, DiagramError};
use async_trait::async_trait;
use futures::Stream;
use serde::Serialize;
use std::pin::Pin;
use std::sync::Arc;
use tracing::debug;

/// Sampling temperature for every diagram request.
///
/// Maximal diversity suits image generation; it is deliberately not a
/// per-call knob.
pub const DIAGRAM_TEMPERATURE: f32 = 1.0;

/// Environment variables checked, in order, for the API key.
pub const API_KEY_ENV_VARS: [&str; 2] = ["GOOGLE_API_KEY", "GEMINI_API_KEY"];

/// What the backend is asked to return.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ResponseModality {
    Image,
}

/// A single generation request. Built fresh for every attempt.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationRequest {
    pub prompt: String,
    pub model: String,
    pub response_modality: ResponseModality,
    pub temperature: f32,
}

impl GenerationRequest {
    /// Image-only request at [`DIAGRAM_TEMPERATURE`].
    pub fn new(prompt: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            model: model.into(),
            response_modality: ResponseModality::Image,
            temperature: DIAGRAM_TEMPERATURE,
        }
    }
}

/// One streamed fragment of a response.
///
/// A fragment may carry any number of decoded inline payloads, including
/// none (text-only or metadata-only fragments).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResponseChunk {
    pub payloads: Vec<Vec<u8>>,
}

impl ResponseChunk {
    pub fn with_payload(bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            payloads: vec![bytes.into()],
        }
    }
}

/// A boxed stream of response fragments.
pub type ChunkStream = Pin<Box<dyn Stream<Item = Result<ResponseChunk, BackendError>> + Send>>;

/// A remote image generator.
///
/// Errors may surface either from `stream_generate` itself or as an `Err`
/// item in the returned stream; callers treat both the same way.
#[async_trait]
pub trait ImageBackend: Send + Sync {
    async fn stream_generate(&self, request: &GenerationRequest)
        -> Result<ChunkStream, BackendError>;
}

/// Resolve the backend for a config.
///
/// 1. **Pre-built backend** (`config.backend`), used as-is.
/// 2. **API key** from `config.api_key`, then [`API_KEY_ENV_VARS`], builds a
///    [`gemini::GeminiBackend`].
///
/// Fails with [`DiagramError::MissingApiKey`] before any network activity
/// when neither is available.
pub fn resolve_backend(config: &DiagramConfig) -> Result<Arc<dyn ImageBackend>, DiagramError> {
    if let Some(ref backend) = config.backend {
        return Ok(Arc::clone(backend));
    }

    let api_key = config
        .api_key
        .clone()
        .filter(|k| !k.trim().is_empty())
        .or_else(api_key_from_env)
        .ok_or(DiagramError::MissingApiKey)?;

    debug!("Using Gemini backend at {}", config.base_url);
    let backend = gemini::GeminiBackend::new(api_key, &config.base_url, config.api_timeout_secs)?;
    Ok(Arc::new(backend))
}

fn api_key_from_env() -> Option<String> {
    API_KEY_ENV_VARS
        .iter()
        .filter_map(|name| std::env::var(name).ok())
        .find(|value| !value.trim().is_empty())
}
