//! # revisio
//!
//! Generate study revision sheets from notes using hosted LLMs.
//!
//! ## Why two model calls?
//!
//! Asking a model for a finished revision sheet in one go gives either a
//! shallow list or a wall of text that drifts off the source material. This
//! crate splits the job: a first call pulls titled key points out of the
//! user's text or photographed notes, a second call expands exactly those
//! titles into a structured Markdown document. The points anchor the
//! expansion to the source; the expansion adds definitions and examples.
//!
//! ## Pipeline Overview
//!
//! ```text
//! SheetForm (topic, language, text | images)
//!  │
//!  ├─ 1. Validate  topic and content checks, no model call on failure
//!  ├─ 2. Extract   one call → [{title, summary}, …]
//!  ├─ 3. Fold      "## Title\n\n## Title…"
//!  ├─ 4. Expand    one call → Markdown document
//!  ├─ 5. Sanitize  strip leaked JSON keys, fences, stray emphasis
//!  └─ 6. Output    RevisionSheet + timing and token stats
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use revisio::{Language, Orchestrator, SheetConfig, SheetForm};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Provider auto-detected from OPENAI_API_KEY / ANTHROPIC_API_KEY / GEMINI_API_KEY
//!     let orchestrator = Orchestrator::from_config(SheetConfig::default())?;
//!     let form = SheetForm::text(
//!         "Plant biology",
//!         "Photosynthesis converts light into chemical energy.",
//!         Language::En,
//!     );
//!     let generated = orchestrator.generate(&form).await?;
//!     println!("{}", generated.sheet.to_markdown());
//!     Ok(())
//! }
//! ```
//!
//! ## Failures
//!
//! [`Orchestrator::generate`] returns `Err(RevisioError)` for anything that
//! ends a submission. [`Orchestrator::submit`] returns a localized
//! [`Notification`] instead and never panics. With
//! [`FailurePolicy::Tolerant`] a failed stage still yields a sheet whose
//! content explains the failure in the user's language.
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `revisio` binary (clap + anyhow + tracing-subscriber) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! revisio = { version = "0.3", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod error;
pub mod language;
pub mod messages;
pub mod notification;
pub mod orchestrator;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod prompts;
pub mod types;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{FailurePolicy, SheetConfig, SheetConfigBuilder, DEFAULT_MODEL};
pub use error::{RevisioError, Stage, StageFailure};
pub use language::Language;
pub use notification::{Notification, NotificationKind};
pub use orchestrator::{write_sheet, InputMode, Orchestrator, SheetForm};
pub use output::{GeneratedSheet, RevisionSheet, SheetStats};
pub use pipeline::extract::{extract_revision_points, Extraction};
pub use pipeline::fold::fold_headings;
pub use pipeline::input::{load_image, load_images};
pub use pipeline::llm::{Completion, ModelClient, ModelError, ModelRequest, ProviderClient};
pub use pipeline::sanitize::sanitize_markdown;
pub use pipeline::supplement::{supplement_revision_points, Supplementation};
pub use progress::{NoopProgressCallback, ProgressCallback, SheetProgressCallback};
pub use types::{
    DataUri, ExtractionRequest, ExtractionResponse, ImagePart, RevisionPoint,
    SupplementationRequest, SupplementationResponse,
};
