//! Model interaction: the seam between the stages and the hosted LLM.
//!
//! Both stages talk to the model through [`ModelClient`], an opaque
//! `request -> completion | error` function. [`ProviderClient`] implements it
//! on top of any `edgequake_llm` provider; tests implement it with scripted
//! replies. Prompt wording lives in [`crate::prompts`], output parsing in
//! [`super::structured`].
//!
//! There is no retry here: one submission issues at most one call per stage,
//! bounded by [`crate::config::SheetConfig::api_timeout_secs`].

use crate::error::{Stage, StageFailure};
use crate::types::DataUri;
use async_trait::async_trait;
use edgequake_llm::{ChatMessage, CompletionOptions, ImageData, LLMProvider};
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tokio::time::{timeout, Duration};
use tracing::{debug, error};

/// One model call: instructions, user turn, attached images, sampling knobs.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelRequest {
    pub system: String,
    pub user: String,
    /// Attached in order after the user text.
    pub images: Vec<DataUri>,
    pub temperature: f32,
    pub max_tokens: usize,
}

/// The raw text answer of the model plus token usage.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Completion {
    pub content: String,
    pub input_tokens: u64,
    pub output_tokens: u64,
}

impl Completion {
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            ..Default::default()
        }
    }

    pub fn usage(&self) -> Usage {
        Usage {
            input_tokens: self.input_tokens,
            output_tokens: self.output_tokens,
        }
    }
}

/// Token counts of one model call. Zero when the call failed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Usage {
    pub input_tokens: u64,
    pub output_tokens: u64,
}

/// The remote call failed before producing an answer.
#[derive(Debug, Clone, Error)]
#[error("{0}")]
pub struct ModelError(pub String);

/// The hosted generative model, as seen by the stages.
#[async_trait]
pub trait ModelClient: Send + Sync {
    async fn complete(&self, request: &ModelRequest) -> Result<Completion, ModelError>;

    /// Model identifier for logs.
    fn model_name(&self) -> &str {
        "unknown"
    }
}

/// [`ModelClient`] backed by an `edgequake_llm` provider.
pub struct ProviderClient {
    provider: Arc<dyn LLMProvider>,
    model: String,
}

impl ProviderClient {
    pub fn new(provider: Arc<dyn LLMProvider>, model: impl Into<String>) -> Self {
        Self {
            provider,
            model: model.into(),
        }
    }
}

#[async_trait]
impl ModelClient for ProviderClient {
    async fn complete(&self, request: &ModelRequest) -> Result<Completion, ModelError> {
        let messages = build_messages(request);
        let options = CompletionOptions {
            temperature: Some(request.temperature),
            max_tokens: Some(request.max_tokens),
            ..Default::default()
        };

        let response = self
            .provider
            .chat(&messages, Some(&options))
            .await
            .map_err(|e| ModelError(format!("{e}")))?;

        Ok(Completion {
            content: response.content,
            input_tokens: response.prompt_tokens as u64,
            output_tokens: response.completion_tokens as u64,
        })
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

/// System message first, then the user turn with images attached.
///
/// `detail: "high"` keeps fine print readable on photographed notes.
fn build_messages(request: &ModelRequest) -> Vec<ChatMessage> {
    let user = if request.images.is_empty() {
        ChatMessage::user(request.user.as_str())
    } else {
        let images = request
            .images
            .iter()
            .map(|uri| ImageData::new(uri.data().to_string(), uri.mime_type()).with_detail("high"))
            .collect();
        ChatMessage::user_with_images(request.user.as_str(), images)
    };
    vec![ChatMessage::system(request.system.as_str()), user]
}

/// Run one model call for `stage`, mapping transport failures and timeouts
/// to [`StageFailure`]. Never panics or propagates the raw error.
pub async fn call_model(
    client: &dyn ModelClient,
    stage: Stage,
    request: &ModelRequest,
    timeout_secs: u64,
) -> Result<Completion, StageFailure> {
    let start = Instant::now();
    debug!(
        "{}: calling {} ({} chars, {} images)",
        stage,
        client.model_name(),
        request.user.len(),
        request.images.len()
    );

    match timeout(Duration::from_secs(timeout_secs), client.complete(request)).await {
        Ok(Ok(completion)) => {
            debug!(
                "{}: {} input tokens, {} output tokens, {:?}",
                stage,
                completion.input_tokens,
                completion.output_tokens,
                start.elapsed()
            );
            Ok(completion)
        }
        Ok(Err(e)) => {
            error!("{}: model call failed: {}", stage, e);
            Err(StageFailure::Upstream {
                stage,
                message: e.0,
            })
        }
        Err(_) => {
            error!("{}: model call timed out after {}s", stage, timeout_secs);
            Err(StageFailure::Timeout {
                stage,
                secs: timeout_secs,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixed(Result<Completion, ModelError>);

    #[async_trait]
    impl ModelClient for Fixed {
        async fn complete(&self, _request: &ModelRequest) -> Result<Completion, ModelError> {
            self.0.clone()
        }
    }

    struct Stalled;

    #[async_trait]
    impl ModelClient for Stalled {
        async fn complete(&self, _request: &ModelRequest) -> Result<Completion, ModelError> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok(Completion::default())
        }
    }

    fn request() -> ModelRequest {
        ModelRequest {
            system: "sys".into(),
            user: "user".into(),
            images: vec![],
            temperature: 0.2,
            max_tokens: 16,
        }
    }

    #[tokio::test]
    async fn success_passes_through() {
        let client = Fixed(Ok(Completion::text("{}")));
        let out = call_model(&client, Stage::Extraction, &request(), 5)
            .await
            .unwrap();
        assert_eq!(out.content, "{}");
    }

    #[tokio::test]
    async fn transport_error_becomes_upstream_failure() {
        let client = Fixed(Err(ModelError("quota exceeded".into())));
        let err = call_model(&client, Stage::Supplementation, &request(), 5)
            .await
            .unwrap_err();
        assert_eq!(
            err,
            StageFailure::Upstream {
                stage: Stage::Supplementation,
                message: "quota exceeded".into()
            }
        );
    }

    #[tokio::test]
    async fn slow_call_times_out() {
        let err = call_model(&Stalled, Stage::Extraction, &request(), 1)
            .await
            .unwrap_err();
        assert_eq!(
            err,
            StageFailure::Timeout {
                stage: Stage::Extraction,
                secs: 1
            }
        );
    }

    #[test]
    fn messages_put_system_first() {
        let msgs = build_messages(&request());
        assert_eq!(msgs.len(), 2);
    }
}
