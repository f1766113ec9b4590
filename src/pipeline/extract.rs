//! Stage 1: extract titled revision points from text and/or images.
//!
//! One validated request, one model call. Model failures never escape as
//! errors; they come back as [`Extraction::Failed`] so the caller decides
//! whether to abort or to show the localized placeholder point.

use crate::config::SheetConfig;
use crate::error::{RevisioError, Stage, StageFailure};
use crate::language::Language;
use crate::messages;
use crate::pipeline::llm::{call_model, ModelClient, ModelRequest, Usage};
use crate::pipeline::structured::parse_extraction;
use crate::prompts::{extraction_user_message, render_system_prompt, EXTRACTION_SYSTEM_PROMPT};
use crate::types::{ExtractionRequest, RevisionPoint};
use std::time::Instant;
use tracing::{info, warn};

/// Outcome of the extraction stage.
#[derive(Debug, Clone, PartialEq)]
pub enum Extraction {
    /// Points in the order the model produced them. May be empty.
    Points(Vec<RevisionPoint>),
    Failed(StageFailure),
}

impl Extraction {
    pub fn points(&self) -> Option<&[RevisionPoint]> {
        match self {
            Extraction::Points(points) => Some(points),
            Extraction::Failed(_) => None,
        }
    }

    pub fn failure(&self) -> Option<&StageFailure> {
        match self {
            Extraction::Points(_) => None,
            Extraction::Failed(f) => Some(f),
        }
    }

    /// Points to show to the user. A failure becomes a single synthetic
    /// point whose title and summary are written in `language`.
    pub fn into_display_points(self, language: Language) -> Vec<RevisionPoint> {
        match self {
            Extraction::Points(points) => points,
            Extraction::Failed(failure) => {
                let (title, summary) = messages::extraction_failure_point(&failure, language);
                vec![RevisionPoint::new(title, summary)]
            }
        }
    }
}

/// Run the extraction stage.
///
/// Returns `Err` only when the request is invalid, in which case no remote
/// call was made.
pub async fn extract_revision_points(
    client: &dyn ModelClient,
    request: &ExtractionRequest,
    config: &SheetConfig,
) -> Result<Extraction, RevisioError> {
    extract_with_usage(client, request, config)
        .await
        .map(|(extraction, _)| extraction)
}

/// [`extract_revision_points`] plus the token usage of the call.
pub async fn extract_with_usage(
    client: &dyn ModelClient,
    request: &ExtractionRequest,
    config: &SheetConfig,
) -> Result<(Extraction, Usage), RevisioError> {
    request.validate()?;

    let language = request.language;
    let template = config
        .extraction_prompt
        .as_deref()
        .unwrap_or(EXTRACTION_SYSTEM_PROMPT);
    let model_request = ModelRequest {
        system: render_system_prompt(template, language.english_name()),
        user: extraction_user_message(request),
        images: request.images.iter().map(|i| i.data_uri.clone()).collect(),
        temperature: config.temperature,
        max_tokens: config.extraction_max_tokens,
    };

    let start = Instant::now();
    info!(
        "Extracting revision points ({}, text: {}, images: {})",
        language,
        request.text().is_some(),
        request.images.len()
    );

    let completion = match call_model(
        client,
        Stage::Extraction,
        &model_request,
        config.api_timeout_secs,
    )
    .await
    {
        Ok(c) => c,
        Err(failure) => return Ok((Extraction::Failed(failure), Usage::default())),
    };
    let usage = completion.usage();

    let Some(response) = parse_extraction(&completion.content) else {
        warn!("Extraction output did not match the schema");
        return Ok((schema_violation(completion.content), usage));
    };
    if let Some(idx) = response.first_blank_point() {
        warn!("Extraction point {} has a blank title or summary", idx + 1);
        return Ok((schema_violation(completion.content), usage));
    }

    info!(
        "Extracted {} point(s) in {:?}",
        response.revision_points.len(),
        start.elapsed()
    );
    Ok((Extraction::Points(response.revision_points), usage))
}

fn schema_violation(raw: String) -> Extraction {
    Extraction::Failed(StageFailure::SchemaViolation {
        stage: Stage::Extraction,
        raw,
    })
}
