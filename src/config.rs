//! Configuration types for text-to-diagram generation.
//!
//! All generation behaviour is controlled through [`DiagramConfig`], built
//! via its [`DiagramConfigBuilder`]. The model identifier lives here and is
//! passed down to every request, so two configs can target two different
//! models in the same process.

use crate::backend::ImageBackend;
use crate::error::DiagramError;
use crate::progress::ProgressCallback;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Image model used when none is configured.
///
/// `gemini-2.5-flash-image` is the free-tier alternative.
pub const DEFAULT_MODEL: &str = "gemini-3-pro-image-preview";

/// Public Gemini API endpoint.
pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";

/// Configuration for diagram generation.
///
/// Built via [`DiagramConfig::builder()`] or using [`DiagramConfig::default()`].
///
/// # Example
/// ```rust
/// use edgequake_text2diagram::DiagramConfig;
/// use std::time::Duration;
///
/// let config = DiagramConfig::builder()
///     .model("gemini-2.5-flash-image")
///     .max_attempts(5)
///     .inter_request_delay(Duration::from_secs(20))
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct DiagramConfig {
    /// Image model identifier. Default: [`DEFAULT_MODEL`].
    pub model: String,

    /// API key. If None, read from `GOOGLE_API_KEY` then `GEMINI_API_KEY`.
    pub api_key: Option<String>,

    /// Base URL of the Gemini API. Default: [`DEFAULT_BASE_URL`].
    pub base_url: String,

    /// Pre-constructed backend. Takes precedence over `api_key`.
    pub backend: Option<Arc<dyn ImageBackend>>,

    /// Retry budget: total attempts per diagram when rate-limited. Default: 3.
    ///
    /// Only rate-limit errors consume the budget; other backend errors and
    /// empty responses end the diagram on the first attempt.
    pub max_attempts: u32,

    /// Wait used when a rate-limit error carries no retry hint. Default: 60 s.
    pub default_backoff: Duration,

    /// Safety margin added to a server-suggested wait. Default: 5 s.
    pub backoff_margin: Duration,

    /// Pause between consecutive batch requests. Default: 10 s.
    ///
    /// Applied between every pair of workflows regardless of how the first
    /// one ended; never applied after the last.
    pub inter_request_delay: Duration,

    /// Per-request timeout in seconds, covering the whole streamed response.
    /// Default: 300.
    pub api_timeout_secs: u64,

    /// Optional progress callback for batch, item and backoff events.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for DiagramConfig {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            api_key: None,
            base_url: DEFAULT_BASE_URL.to_string(),
            backend: None,
            max_attempts: 3,
            default_backoff: Duration::from_secs(60),
            backoff_margin: Duration::from_secs(5),
            inter_request_delay: Duration::from_secs(10),
            api_timeout_secs: 300,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for DiagramConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DiagramConfig")
            .field("model", &self.model)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("base_url", &self.base_url)
            .field("backend", &self.backend.as_ref().map(|_| "<dyn ImageBackend>"))
            .field("max_attempts", &self.max_attempts)
            .field("default_backoff", &self.default_backoff)
            .field("backoff_margin", &self.backoff_margin)
            .field("inter_request_delay", &self.inter_request_delay)
            .field("api_timeout_secs", &self.api_timeout_secs)
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<dyn DiagramProgressCallback>"),
            )
            .finish()
    }
}

impl DiagramConfig {
    /// Create a new builder for `DiagramConfig`.
    pub fn builder() -> DiagramConfigBuilder {
        DiagramConfigBuilder {
            config: Self::default(),
        }
    }

    /// Wait before retrying a rate-limited attempt.
    ///
    /// A server hint gets the safety margin added; no hint means the
    /// default backoff.
    pub fn backoff_for(&self, retry_after: Option<Duration>) -> Duration {
        match retry_after {
            Some(hint) => hint.saturating_add(self.backoff_margin),
            None => self.default_backoff,
        }
    }
}

/// Builder for [`DiagramConfig`].
pub struct DiagramConfigBuilder {
    config: DiagramConfig,
}

impl fmt::Debug for DiagramConfigBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DiagramConfigBuilder")
            .field("config", &self.config)
            .finish()
    }
}

impl DiagramConfigBuilder {
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = model.into();
        self
    }

    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.config.api_key = Some(key.into());
        self
    }

    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.config.base_url = url.into();
        self
    }

    pub fn backend(mut self, backend: Arc<dyn ImageBackend>) -> Self {
        self.config.backend = Some(backend);
        self
    }

    pub fn max_attempts(mut self, n: u32) -> Self {
        self.config.max_attempts = n.max(1);
        self
    }

    pub fn default_backoff(mut self, wait: Duration) -> Self {
        self.config.default_backoff = wait;
        self
    }

    pub fn backoff_margin(mut self, margin: Duration) -> Self {
        self.config.backoff_margin = margin;
        self
    }

    pub fn inter_request_delay(mut self, delay: Duration) -> Self {
        self.config.inter_request_delay = delay;
        self
    }

    pub fn api_timeout_secs(mut self, secs: u64) -> Self {
        self.config.api_timeout_secs = secs;
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<DiagramConfig, DiagramError> {
        let c = &self.config;
        if c.model.trim().is_empty() {
            return Err(DiagramError::InvalidConfig(
                "Model identifier must not be empty".into(),
            ));
        }
        if c.base_url.trim().is_empty() {
            return Err(DiagramError::InvalidConfig(
                "Base URL must not be empty".into(),
            ));
        }
        if c.api_timeout_secs == 0 {
            return Err(DiagramError::InvalidConfig(
                "API timeout must be ≥ 1 second".into(),
            ));
        }
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let c = DiagramConfig::default();
        assert_eq!(c.model, DEFAULT_MODEL);
        assert_eq!(c.max_attempts, 3);
        assert_eq!(c.default_backoff, Duration::from_secs(60));
        assert_eq!(c.backoff_margin, Duration::from_secs(5));
    }

    #[test]
    fn backoff_adds_margin_to_hint() {
        let c = DiagramConfig::default();
        assert_eq!(
            c.backoff_for(Some(Duration::from_secs(30))),
            Duration::from_secs(35)
        );
        assert_eq!(c.backoff_for(None), Duration::from_secs(60));
    }

    #[test]
    fn backoff_saturates_on_huge_hint() {
        let c = DiagramConfig::default();
        assert_eq!(c.backoff_for(Some(Duration::MAX)), Duration::MAX);
    }

    #[test]
    fn max_attempts_is_clamped() {
        let c = DiagramConfig::builder().max_attempts(0).build().unwrap();
        assert_eq!(c.max_attempts, 1);
    }

    #[test]
    fn empty_model_rejected() {
        let err = DiagramConfig::builder().model("  ").build().unwrap_err();
        assert!(matches!(err, DiagramError::InvalidConfig(_)));
    }

    #[test]
    fn debug_redacts_api_key() {
        let c = DiagramConfig::builder()
            .api_key("AIza-secret")
            .build()
            .unwrap();
        let dbg = format!("{c:?}");
        assert!(!dbg.contains("AIza-secret"), "got: {dbg}");
        assert!(dbg.contains("<redacted>"));
    }
}
