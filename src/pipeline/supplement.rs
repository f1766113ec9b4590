//! Stage 2: expand the folded headings into one Markdown document.
//!
//! The model is asked for `{"supplementedPoints": "<markdown>"}`; plain
//! Markdown answers are accepted too. Whatever comes back goes through
//! [`super::sanitize::sanitize_markdown`] before it reaches the caller.

use crate::config::SheetConfig;
use crate::error::{RevisioError, Stage, StageFailure};
use crate::language::Language;
use crate::messages;
use crate::pipeline::llm::{call_model, ModelClient, ModelRequest, Usage};
use crate::pipeline::sanitize::{find_leaks, sanitize_markdown};
use crate::pipeline::structured::{parse_supplementation, SupplementationShape};
use crate::prompts::{
    render_system_prompt, supplementation_user_message, SUPPLEMENTATION_SYSTEM_PROMPT,
};
use crate::types::SupplementationRequest;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Outcome of the supplementation stage.
#[derive(Debug, Clone, PartialEq)]
pub enum Supplementation {
    /// Sanitized Markdown, never blank.
    Markdown(String),
    Failed(StageFailure),
}

impl Supplementation {
    pub fn markdown(&self) -> Option<&str> {
        match self {
            Supplementation::Markdown(md) => Some(md),
            Supplementation::Failed(_) => None,
        }
    }

    pub fn failure(&self) -> Option<&StageFailure> {
        match self {
            Supplementation::Markdown(_) => None,
            Supplementation::Failed(f) => Some(f),
        }
    }

    /// Markdown to display. A failure becomes a localized error block.
    pub fn into_markdown(self, language: Language) -> String {
        match self {
            Supplementation::Markdown(md) => md,
            Supplementation::Failed(failure) => {
                messages::supplementation_failure_markdown(&failure, language)
            }
        }
    }
}

/// Run the supplementation stage.
///
/// Returns `Err` only when the request has no heading to expand.
pub async fn supplement_revision_points(
    client: &dyn ModelClient,
    request: &SupplementationRequest,
    config: &SheetConfig,
) -> Result<Supplementation, RevisioError> {
    supplement_with_usage(client, request, config)
        .await
        .map(|(supplementation, _)| supplementation)
}

/// [`supplement_revision_points`] plus the token usage of the call.
pub async fn supplement_with_usage(
    client: &dyn ModelClient,
    request: &SupplementationRequest,
    config: &SheetConfig,
) -> Result<(Supplementation, Usage), RevisioError> {
    request.validate()?;

    let language = request.language;
    let template = config
        .supplementation_prompt
        .as_deref()
        .unwrap_or(SUPPLEMENTATION_SYSTEM_PROMPT);
    let model_request = ModelRequest {
        system: render_system_prompt(template, language.english_name()),
        user: supplementation_user_message(request),
        images: Vec::new(),
        temperature: config.temperature,
        max_tokens: config.supplementation_max_tokens,
    };

    let start = Instant::now();
    info!("Supplementing revision points ({})", language);

    let completion = match call_model(
        client,
        Stage::Supplementation,
        &model_request,
        config.api_timeout_secs,
    )
    .await
    {
        Ok(c) => c,
        Err(failure) => return Ok((Supplementation::Failed(failure), Usage::default())),
    };
    let usage = completion.usage();

    let markdown = match parse_supplementation(&completion.content) {
        SupplementationShape::Envelope(md) => md,
        SupplementationShape::Markdown(md) => {
            debug!("Supplementation answered without the JSON envelope");
            md
        }
        SupplementationShape::Invalid => {
            warn!("Supplementation output did not match the schema");
            return Ok((schema_violation(completion.content), usage));
        }
    };

    let cleaned = sanitize_markdown(&markdown);
    if cleaned.trim().is_empty() {
        warn!("Supplementation output is empty after sanitizing");
        return Ok((schema_violation(completion.content), usage));
    }
    if cleaned != markdown.trim_matches('\n') {
        debug!("Sanitizer repaired supplementation output");
    }
    let leaks = find_leaks(&cleaned);
    if !leaks.is_empty() {
        warn!("Field names left in supplemented Markdown: {:?}", leaks);
    }

    info!(
        "Supplemented content: {} bytes in {:?}",
        cleaned.len(),
        start.elapsed()
    );
    Ok((Supplementation::Markdown(cleaned), usage))
}

fn schema_violation(raw: String) -> Supplementation {
    Supplementation::Failed(StageFailure::SchemaViolation {
        stage: Stage::Supplementation,
        raw,
    })
}
