//! Configuration types for revision sheet generation.
//!
//! All generation behaviour is controlled through [`SheetConfig`], built via
//! its [`SheetConfigBuilder`]. One struct for every knob keeps configs cheap
//! to share between submissions and easy to log.

use crate::error::RevisioError;
use crate::progress::ProgressCallback;
use edgequake_llm::LLMProvider;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Model used when neither the config nor the environment names one.
pub const DEFAULT_MODEL: &str = "gpt-4.1-mini";

/// Configuration for generating a revision sheet.
///
/// Built via [`SheetConfig::builder()`] or using [`SheetConfig::default()`].
///
/// # Example
/// ```rust
/// use revisio::{FailurePolicy, SheetConfig};
///
/// let config = SheetConfig::builder()
///     .model("gpt-4.1-mini")
///     .temperature(0.3)
///     .failure_policy(FailurePolicy::Tolerant)
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct SheetConfig {
    /// LLM model identifier, e.g. "gpt-4.1-mini", "claude-sonnet-4-20250514".
    /// If None, uses [`DEFAULT_MODEL`] or the environment.
    pub model: Option<String>,

    /// LLM provider name (e.g. "openai", "anthropic", "ollama").
    /// If None along with `provider`, the provider is detected from the environment.
    pub provider_name: Option<String>,

    /// Pre-constructed LLM provider. Takes precedence over `provider_name`.
    pub provider: Option<Arc<dyn LLMProvider>>,

    /// Sampling temperature for both stages. Default: 0.2.
    ///
    /// Extraction wants faithful output; supplementation tolerates a little
    /// more variety. 0.2 serves both without a second knob.
    pub temperature: f32,

    /// Maximum tokens the model may generate for the point list. Default: 4096.
    pub extraction_max_tokens: usize,

    /// Maximum tokens for the expanded Markdown document. Default: 8192.
    ///
    /// Every point grows into several paragraphs; a ten-point sheet easily
    /// exceeds 4 000 output tokens and would be cut mid-sentence.
    pub supplementation_max_tokens: usize,

    /// Per-call timeout in seconds. Default: 120.
    pub api_timeout_secs: u64,

    /// Download timeout for image URLs in seconds. Default: 60.
    pub download_timeout_secs: u64,

    /// Largest accepted image in bytes. Default: 20 MiB.
    pub max_image_bytes: usize,

    /// Custom extraction instructions. If None, uses the built-in prompt.
    pub extraction_prompt: Option<String>,

    /// Custom supplementation instructions. If None, uses the built-in prompt.
    pub supplementation_prompt: Option<String>,

    /// What to do when a stage fails. Default: [`FailurePolicy::Strict`].
    pub failure_policy: FailurePolicy,

    /// Receives stage events and notifications.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for SheetConfig {
    fn default() -> Self {
        Self {
            model: None,
            provider_name: None,
            provider: None,
            temperature: 0.2,
            extraction_max_tokens: 4096,
            supplementation_max_tokens: 8192,
            api_timeout_secs: 120,
            download_timeout_secs: 60,
            max_image_bytes: 20 * 1024 * 1024,
            extraction_prompt: None,
            supplementation_prompt: None,
            failure_policy: FailurePolicy::default(),
            progress_callback: None,
        }
    }
}

impl fmt::Debug for SheetConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SheetConfig")
            .field("model", &self.model)
            .field("provider_name", &self.provider_name)
            .field("provider", &self.provider.as_ref().map(|_| "<dyn LLMProvider>"))
            .field("temperature", &self.temperature)
            .field("extraction_max_tokens", &self.extraction_max_tokens)
            .field("supplementation_max_tokens", &self.supplementation_max_tokens)
            .field("api_timeout_secs", &self.api_timeout_secs)
            .field("download_timeout_secs", &self.download_timeout_secs)
            .field("max_image_bytes", &self.max_image_bytes)
            .field("failure_policy", &self.failure_policy)
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<dyn SheetProgressCallback>"),
            )
            .finish()
    }
}

impl SheetConfig {
    /// Create a new builder for `SheetConfig`.
    pub fn builder() -> SheetConfigBuilder {
        SheetConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`SheetConfig`].
pub struct SheetConfigBuilder {
    config: SheetConfig,
}

impl fmt::Debug for SheetConfigBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SheetConfigBuilder")
            .field("config", &self.config)
            .finish()
    }
}

impl SheetConfigBuilder {
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = Some(model.into());
        self
    }

    pub fn provider_name(mut self, name: impl Into<String>) -> Self {
        self.config.provider_name = Some(name.into());
        self
    }

    pub fn provider(mut self, provider: Arc<dyn LLMProvider>) -> Self {
        self.config.provider = Some(provider);
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.config.temperature = t.clamp(0.0, 2.0);
        self
    }

    pub fn extraction_max_tokens(mut self, n: usize) -> Self {
        self.config.extraction_max_tokens = n;
        self
    }

    pub fn supplementation_max_tokens(mut self, n: usize) -> Self {
        self.config.supplementation_max_tokens = n;
        self
    }

    pub fn api_timeout_secs(mut self, secs: u64) -> Self {
        self.config.api_timeout_secs = secs;
        self
    }

    pub fn download_timeout_secs(mut self, secs: u64) -> Self {
        self.config.download_timeout_secs = secs;
        self
    }

    pub fn max_image_bytes(mut self, bytes: usize) -> Self {
        self.config.max_image_bytes = bytes;
        self
    }

    pub fn extraction_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.config.extraction_prompt = Some(prompt.into());
        self
    }

    pub fn supplementation_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.config.supplementation_prompt = Some(prompt.into());
        self
    }

    pub fn failure_policy(mut self, policy: FailurePolicy) -> Self {
        self.config.failure_policy = policy;
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<SheetConfig, RevisioError> {
        let c = &self.config;
        if c.extraction_max_tokens == 0 || c.supplementation_max_tokens == 0 {
            return Err(RevisioError::InvalidConfig(
                "max tokens must be ≥ 1 for both stages".into(),
            ));
        }
        if c.api_timeout_secs == 0 {
            return Err(RevisioError::InvalidConfig(
                "API timeout must be ≥ 1 second".into(),
            ));
        }
        if c.max_image_bytes == 0 {
            return Err(RevisioError::InvalidConfig(
                "max image size must be ≥ 1 byte".into(),
            ));
        }
        Ok(self.config)
    }
}

// ── Enums ────────────────────────────────────────────────────────────────

/// How the orchestrator reacts when a stage fails.
///
/// | Policy | Stage 1 fails | Stage 2 fails |
/// |--------|---------------|---------------|
/// | `Strict` | failure notification, no sheet | failure notification, no sheet |
/// | `Tolerant` | sheet with a localized placeholder point and error block | sheet with real points and an error block |
///
/// Zero extracted points and validation errors end the submission under
/// both policies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FailurePolicy {
    /// Any stage failure ends the submission. (default)
    #[default]
    Strict,
    /// Stage failures are rendered as visible placeholder content.
    Tolerant,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let c = SheetConfig::default();
        assert_eq!(c.temperature, 0.2);
        assert_eq!(c.extraction_max_tokens, 4096);
        assert_eq!(c.supplementation_max_tokens, 8192);
        assert_eq!(c.failure_policy, FailurePolicy::Strict);
        assert!(c.progress_callback.is_none());
    }

    #[test]
    fn builder_clamps_temperature() {
        let c = SheetConfig::builder().temperature(9.0).build().unwrap();
        assert_eq!(c.temperature, 2.0);
    }

    #[test]
    fn builder_rejects_zero_limits() {
        assert!(SheetConfig::builder().api_timeout_secs(0).build().is_err());
        assert!(SheetConfig::builder().extraction_max_tokens(0).build().is_err());
        assert!(SheetConfig::builder().max_image_bytes(0).build().is_err());
    }

    #[test]
    fn debug_hides_trait_objects() {
        let c = SheetConfig::builder()
            .progress_callback(Arc::new(crate::progress::NoopProgressCallback))
            .build()
            .unwrap();
        let dbg = format!("{c:?}");
        assert!(dbg.contains("<dyn SheetProgressCallback>"));
    }
}
