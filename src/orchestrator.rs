//! Submission orchestration: form → stage 1 → fold → stage 2 → sheet.
//!
//! [`Orchestrator::generate`] is the error-typed entry point: it returns
//! `Err(RevisioError)` for anything that ends a submission. The user-facing
//! [`Orchestrator::submit`] wraps it and turns every failure, panics
//! included, into a localized [`Notification`], so nothing escapes to the
//! caller as an error.
//!
//! Stages run strictly in sequence. Stage 2 is only issued when stage 1
//! produced at least one point.

use crate::config::{FailurePolicy, SheetConfig, DEFAULT_MODEL};
use crate::error::{RevisioError, Stage, StageFailure};
use crate::language::Language;
use crate::messages;
use crate::notification::Notification;
use crate::output::{GeneratedSheet, RevisionSheet, SheetStats};
use crate::pipeline::extract::{extract_with_usage, Extraction};
use crate::pipeline::fold::fold_headings;
use crate::pipeline::llm::{ModelClient, ProviderClient};
use crate::pipeline::supplement::{supplement_with_usage, Supplementation};
use crate::types::{DataUri, ExtractionRequest, RevisionPoint, SupplementationRequest};
use edgequake_llm::{LLMProvider, ProviderFactory};
use futures::FutureExt;
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::panic::AssertUnwindSafe;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, warn};

/// Shortest accepted topic, in characters.
pub const MIN_TOPIC_CHARS: usize = 3;

/// Shortest accepted text in text mode, in non-blank characters.
pub const MIN_TEXT_CHARS: usize = 10;

/// Failure details longer than this are cut in notifications.
const MAX_NOTIFICATION_DETAIL: usize = 200;

/// Which input the user chose on the form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InputMode {
    #[default]
    Text,
    Image,
}

/// One user submission.
///
/// Both inputs may be filled; [`SheetForm::input_mode`] decides which one is
/// sent to the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SheetForm {
    pub topic: String,
    pub language: Language,
    pub input_mode: InputMode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text_content: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub images: Vec<DataUri>,
}

impl SheetForm {
    pub fn text(topic: impl Into<String>, text: impl Into<String>, language: Language) -> Self {
        Self {
            topic: topic.into(),
            language,
            input_mode: InputMode::Text,
            text_content: Some(text.into()),
            images: Vec::new(),
        }
    }

    pub fn images(
        topic: impl Into<String>,
        images: impl IntoIterator<Item = DataUri>,
        language: Language,
    ) -> Self {
        Self {
            topic: topic.into(),
            language,
            input_mode: InputMode::Image,
            text_content: None,
            images: images.into_iter().collect(),
        }
    }

    /// Check the form and build the extraction request.
    ///
    /// Image mode with at least one image sends every image, numbered in
    /// order; text mode with non-blank text sends the text. Anything else
    /// is a validation failure with a message in the form's language.
    pub fn extraction_request(&self) -> Result<ExtractionRequest, RevisioError> {
        let lang = self.language;
        if self.topic.trim().chars().count() < MIN_TOPIC_CHARS {
            return Err(RevisioError::Validation(messages::topic_too_short(
                lang,
                MIN_TOPIC_CHARS,
            )));
        }

        let text = self
            .text_content
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty());

        let request = match (self.input_mode, text) {
            (InputMode::Image, _) if !self.images.is_empty() => {
                ExtractionRequest::from_images(self.images.iter().cloned(), lang)
            }
            (InputMode::Text, Some(text)) => {
                let visible = text.chars().filter(|c| !c.is_whitespace()).count();
                if visible < MIN_TEXT_CHARS {
                    return Err(RevisioError::Validation(messages::text_too_short(
                        lang,
                        MIN_TEXT_CHARS,
                    )));
                }
                ExtractionRequest::from_text(text, lang)
            }
            _ => {
                return Err(RevisioError::Validation(
                    messages::missing_content(lang).to_string(),
                ))
            }
        };
        Ok(request)
    }
}

/// Drives submissions through both stages.
///
/// Cheap to share: the model client sits behind an `Arc` and independent
/// submissions can run concurrently on one orchestrator.
pub struct Orchestrator {
    client: Arc<dyn ModelClient>,
    config: SheetConfig,
}

impl Orchestrator {
    pub fn new(client: Arc<dyn ModelClient>, config: SheetConfig) -> Self {
        Self { client, config }
    }

    /// Build an orchestrator backed by the provider the config resolves to.
    pub fn from_config(config: SheetConfig) -> Result<Self, RevisioError> {
        let provider = resolve_provider(&config)?;
        let model = config.model.as_deref().unwrap_or(DEFAULT_MODEL);
        let client = ProviderClient::new(provider, model);
        Ok(Self::new(Arc::new(client), config))
    }

    pub fn config(&self) -> &SheetConfig {
        &self.config
    }

    /// Run one submission.
    ///
    /// # Errors
    /// - `Validation` when the form is incomplete (no model call is made)
    /// - `NoRevisionPoints` when stage 1 returned an empty list
    /// - `Stage` when a stage failed under [`FailurePolicy::Strict`]
    pub async fn generate(&self, form: &SheetForm) -> Result<GeneratedSheet, RevisioError> {
        let total_start = Instant::now();
        let lang = form.language;
        let request = form.extraction_request()?;
        let mut stats = SheetStats::default();

        // ── Stage 1: extraction ──────────────────────────────────────────
        self.stage_started(Stage::Extraction, lang);
        let stage_start = Instant::now();
        let (extraction, usage) =
            extract_with_usage(self.client.as_ref(), &request, &self.config).await?;
        stats.extraction_ms = stage_start.elapsed().as_millis() as u64;
        stats.input_tokens += usage.input_tokens;
        stats.output_tokens += usage.output_tokens;

        let points = match extraction {
            Extraction::Points(points) if points.is_empty() => {
                warn!("Extraction returned no points; skipping supplementation");
                self.stage_failed(Stage::Extraction, "no revision points");
                return Err(RevisioError::NoRevisionPoints);
            }
            Extraction::Points(points) => {
                self.stage_completed(Stage::Extraction, points.len());
                points
            }
            Extraction::Failed(failure) => {
                self.stage_failed(Stage::Extraction, &failure.to_string());
                if self.config.failure_policy == FailurePolicy::Strict {
                    return Err(RevisioError::Stage(failure));
                }
                let points = Extraction::Failed(failure).into_display_points(lang);
                let content = placeholder_markdown(&points);
                stats.total_ms = total_start.elapsed().as_millis() as u64;
                return Ok(self.finish(form, points, content, stats));
            }
        };

        // ── Stage 2: supplementation ─────────────────────────────────────
        let supplementation_request = SupplementationRequest {
            topic: form.topic.trim().to_string(),
            revision_points: fold_headings(&points),
            language: lang,
        };

        self.stage_started(Stage::Supplementation, lang);
        let stage_start = Instant::now();
        let (supplementation, usage) = supplement_with_usage(
            self.client.as_ref(),
            &supplementation_request,
            &self.config,
        )
        .await?;
        stats.supplementation_ms = stage_start.elapsed().as_millis() as u64;
        stats.input_tokens += usage.input_tokens;
        stats.output_tokens += usage.output_tokens;

        let content = match supplementation {
            Supplementation::Markdown(md) => {
                self.stage_completed(Stage::Supplementation, md.len());
                md
            }
            Supplementation::Failed(failure) => {
                self.stage_failed(Stage::Supplementation, &failure.to_string());
                if self.config.failure_policy == FailurePolicy::Strict {
                    return Err(RevisioError::Stage(failure));
                }
                Supplementation::Failed(failure).into_markdown(lang)
            }
        };

        stats.total_ms = total_start.elapsed().as_millis() as u64;
        Ok(self.finish(form, points, content, stats))
    }

    /// Run one submission and report every failure as a notification.
    ///
    /// Never panics and never returns a raw error: a panic inside the
    /// pipeline is caught and reported like any other failure. The failure
    /// notification is also sent to the progress callback.
    pub async fn submit(&self, form: &SheetForm) -> Result<GeneratedSheet, Notification> {
        let lang = form.language;
        let outcome = AssertUnwindSafe(self.generate(form)).catch_unwind().await;

        let notification = match outcome {
            Ok(Ok(sheet)) => return Ok(sheet),
            Ok(Err(e)) => {
                if e.is_validation() {
                    warn!("Submission rejected: {}", e);
                } else {
                    error!("Submission failed: {}", e);
                }
                failure_notification(&e, lang)
            }
            Err(_) => {
                error!("Submission panicked");
                Notification::failure(
                    messages::generation_failed_title(lang),
                    messages::unexpected_failure(lang),
                )
            }
        };

        self.notify(&notification);
        Err(notification)
    }

    /// Synchronous wrapper around [`Orchestrator::generate`].
    ///
    /// Creates a temporary tokio runtime internally.
    pub fn generate_sync(&self, form: &SheetForm) -> Result<GeneratedSheet, RevisioError> {
        tokio::runtime::Runtime::new()
            .map_err(|e| RevisioError::Internal(format!("Failed to create tokio runtime: {}", e)))?
            .block_on(self.generate(form))
    }

    // ── Internal helpers ─────────────────────────────────────────────────

    fn finish(
        &self,
        form: &SheetForm,
        points: Vec<RevisionPoint>,
        content: String,
        stats: SheetStats,
    ) -> GeneratedSheet {
        info!(
            "Revision sheet ready: {} point(s), {} bytes, {}ms",
            points.len(),
            content.len(),
            stats.total_ms
        );
        let (title, description) = messages::sheet_ready(form.language);
        self.notify(&Notification::info(title, description));

        GeneratedSheet {
            sheet: RevisionSheet {
                topic: form.topic.trim().to_string(),
                language: form.language,
                extracted_points: points,
                supplemented_content: content,
            },
            stats,
        }
    }

    fn stage_started(&self, stage: Stage, lang: Language) {
        info!("Starting {} stage", stage);
        if let Some(ref cb) = self.config.progress_callback {
            cb.on_stage_start(stage);
            let (title, description) = messages::stage_started(stage, lang);
            cb.on_notification(&Notification::info(title, description));
        }
    }

    fn stage_completed(&self, stage: Stage, items: usize) {
        if let Some(ref cb) = self.config.progress_callback {
            cb.on_stage_complete(stage, items);
        }
    }

    fn stage_failed(&self, stage: Stage, error: &str) {
        if let Some(ref cb) = self.config.progress_callback {
            cb.on_stage_error(stage, error.to_string());
        }
    }

    fn notify(&self, notification: &Notification) {
        if let Some(ref cb) = self.config.progress_callback {
            cb.on_notification(notification);
        }
    }
}

/// Write the sheet's Markdown to `path`.
///
/// The document goes to a temp file in the target directory first and is
/// then persisted over `path`, so readers never see a partial file.
pub async fn write_sheet(sheet: &RevisionSheet, path: impl AsRef<Path>) -> Result<(), RevisioError> {
    let path = path.as_ref().to_path_buf();
    let dir = match path.parent().filter(|p| !p.as_os_str().is_empty()) {
        Some(parent) => parent.to_path_buf(),
        None => PathBuf::from("."),
    };
    let markdown = sheet.to_markdown();

    let target = path.clone();
    tokio::task::spawn_blocking(move || -> std::io::Result<()> {
        std::fs::create_dir_all(&dir)?;
        let mut tmp = tempfile::NamedTempFile::new_in(&dir)?;
        tmp.write_all(markdown.as_bytes())?;
        tmp.persist(&target).map_err(|e| e.error)?;
        Ok(())
    })
    .await
    .map_err(|e| RevisioError::Internal(format!("write task: {e}")))?
    .map_err(|source| RevisioError::OutputWriteFailed {
        path: path.clone(),
        source,
    })?;

    info!("Wrote revision sheet to {}", path.display());
    Ok(())
}

/// Markdown shown in place of the content when extraction failed.
fn placeholder_markdown(points: &[RevisionPoint]) -> String {
    points
        .iter()
        .map(|p| format!("## {}\n\n{}", p.title, p.summary))
        .collect::<Vec<_>>()
        .join("\n\n")
}

fn failure_notification(error: &RevisioError, lang: Language) -> Notification {
    let title = messages::generation_failed_title(lang);
    let description = match error {
        RevisioError::Validation(msg) => msg.clone(),
        RevisioError::NoRevisionPoints => messages::no_points_extracted(lang).to_string(),
        RevisioError::Stage(failure) => stage_failure_description(failure, lang),
        other => format!("{} {}", messages::unexpected_failure(lang), truncate(&other.to_string())),
    };
    Notification::failure(title, description)
}

fn stage_failure_description(failure: &StageFailure, lang: Language) -> String {
    let heading = match failure.stage() {
        Stage::Extraction => messages::extraction_failure_point(failure, lang).0,
        Stage::Supplementation => {
            let md = messages::supplementation_failure_markdown(failure, lang);
            md.lines()
                .next()
                .map(|line| line.trim_start_matches("## ").to_string())
                .unwrap_or_default()
        }
    };
    format!("{heading}: {}", truncate(&failure.detail()))
}

fn truncate(s: &str) -> String {
    if s.chars().count() <= MAX_NOTIFICATION_DETAIL {
        return s.to_string();
    }
    let cut: String = s.chars().take(MAX_NOTIFICATION_DETAIL).collect();
    format!("{cut}…")
}

/// Instantiate a named provider with the given model.
fn create_provider(provider_name: &str, model: &str) -> Result<Arc<dyn LLMProvider>, RevisioError> {
    ProviderFactory::create_llm_provider(provider_name, model).map_err(|e| {
        RevisioError::ProviderNotConfigured {
            provider: provider_name.to_string(),
            hint: format!("{e}"),
        }
    })
}

/// Resolve the LLM provider, from most-specific to least-specific.
///
/// 1. **Pre-built provider** (`config.provider`), used as-is.
/// 2. **Named provider + model** (`config.provider_name`); the factory reads
///    the matching API key from the environment.
/// 3. **Environment pair** (`EDGEQUAKE_LLM_PROVIDER` + `EDGEQUAKE_MODEL`),
///    honoured even when several API keys are present.
/// 4. **`OPENAI_API_KEY`**, then full auto-detection via
///    [`ProviderFactory::from_env`].
fn resolve_provider(config: &SheetConfig) -> Result<Arc<dyn LLMProvider>, RevisioError> {
    if let Some(ref provider) = config.provider {
        return Ok(Arc::clone(provider));
    }

    let model = config.model.as_deref().unwrap_or(DEFAULT_MODEL);

    if let Some(ref name) = config.provider_name {
        return create_provider(name, model);
    }

    if let (Ok(prov), Ok(env_model)) = (
        std::env::var("EDGEQUAKE_LLM_PROVIDER"),
        std::env::var("EDGEQUAKE_MODEL"),
    ) {
        if !prov.is_empty() && !env_model.is_empty() {
            return create_provider(&prov, &env_model);
        }
    }

    if let Ok(openai_key) = std::env::var("OPENAI_API_KEY") {
        if !openai_key.is_empty() {
            return create_provider("openai", model);
        }
    }

    let (llm_provider, _embedding) =
        ProviderFactory::from_env().map_err(|e| RevisioError::ProviderNotConfigured {
            provider: "auto".to_string(),
            hint: format!(
                "No LLM provider could be auto-detected from environment.\n\
                Set OPENAI_API_KEY, ANTHROPIC_API_KEY, or configure a provider.\n\
                Error: {}",
                e
            ),
        })?;

    Ok(llm_provider)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn short_topic_is_rejected_in_form_language() {
        let form = SheetForm::text("ab", "Plenty of text here.", Language::De);
        let err = form.extraction_request().unwrap_err();
        assert!(err.to_string().contains("mindestens 3 Zeichen"), "got: {err}");
    }

    #[test]
    fn text_mode_needs_ten_visible_characters() {
        let form = SheetForm::text("Biology", "  a b c  ", Language::En);
        let err = form.extraction_request().unwrap_err();
        assert!(err.to_string().contains("at least 10 characters"));

        let form = SheetForm::text("Biology", "Cells divide by mitosis.", Language::En);
        let request = form.extraction_request().unwrap();
        assert_eq!(request.text(), Some("Cells divide by mitosis."));
        assert!(request.images.is_empty());
    }

    #[test]
    fn image_mode_sends_only_images() {
        let mut form = SheetForm::images(
            "Biology",
            [
                DataUri::from_bytes("image/png", b"1"),
                DataUri::from_bytes("image/png", b"2"),
            ],
            Language::Fr,
        );
        form.text_content = Some("ignored in image mode".into());
        let request = form.extraction_request().unwrap();
        assert!(request.text_content.is_none());
        assert_eq!(
            request.images.iter().map(|i| i.display_index).collect::<Vec<_>>(),
            vec![1, 2]
        );
    }

    #[test]
    fn missing_content_is_a_validation_error() {
        let form = SheetForm::images("Biology", [], Language::En);
        let err = form.extraction_request().unwrap_err();
        assert!(err.is_validation());
        assert_eq!(
            err.to_string(),
            format!("Validation failed: {}", messages::missing_content(Language::En))
        );

        let form = SheetForm::text("Biology", "", Language::En);
        assert!(form.extraction_request().unwrap_err().is_validation());
    }

    #[test]
    fn form_deserialises_from_camel_case() {
        let form: SheetForm = serde_json::from_str(
            r#"{"topic": "Cells", "language": "de", "inputMode": "text", "textContent": "Zellen teilen sich."}"#,
        )
        .unwrap();
        assert_eq!(form.input_mode, InputMode::Text);
        assert_eq!(form.language, Language::De);
        assert!(form.images.is_empty());
    }

    #[test]
    fn long_details_are_truncated() {
        let long = "x".repeat(500);
        let cut = truncate(&long);
        assert_eq!(cut.chars().count(), MAX_NOTIFICATION_DETAIL + 1);
        assert!(cut.ends_with('…'));
    }

    #[test]
    fn stage_failure_notification_names_the_failure() {
        let failure = StageFailure::Timeout {
            stage: Stage::Supplementation,
            secs: 120,
        };
        let n = failure_notification(&RevisioError::Stage(failure), Language::En);
        assert!(n.is_failure());
        assert_eq!(n.title, "Generation error");
        assert_eq!(
            n.description,
            "Critical Internal Error: timed out after 120s"
        );
    }

    #[tokio::test]
    async fn write_sheet_is_atomic_and_creates_dirs() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("sheet.md");
        let sheet = RevisionSheet {
            topic: "Cells".into(),
            language: Language::En,
            extracted_points: vec![RevisionPoint::new("Mitosis", "Division")],
            supplemented_content: "## Mitosis\n\nOne cell becomes two.".into(),
        };

        write_sheet(&sheet, &path).await.unwrap();

        let written = std::fs::read_to_string(&path).unwrap();
        assert_eq!(written, "# Cells\n\n## Mitosis\n\nOne cell becomes two.\n");
        let entries: Vec<_> = std::fs::read_dir(path.parent().unwrap())
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(entries, vec![std::ffi::OsString::from("sheet.md")]);
    }

    #[tokio::test]
    async fn write_sheet_replaces_existing_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("sheet.md");
        std::fs::write(&path, "old content").unwrap();
        let sheet = RevisionSheet {
            topic: "Cells".into(),
            language: Language::En,
            extracted_points: Vec::new(),
            supplemented_content: "## Meiosis".into(),
        };

        write_sheet(&sheet, &path).await.unwrap();

        assert_eq!(
            std::fs::read_to_string(&path).unwrap(),
            "# Cells\n\n## Meiosis\n"
        );
    }
}
