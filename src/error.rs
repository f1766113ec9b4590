//! Error types for the revisio library.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`RevisioError`]: **fatal for one submission.** The sheet cannot be
//!   produced at all (no content supplied, image unreadable, provider not
//!   configured). Returned as `Err(RevisioError)` from
//!   [`crate::orchestrator::Orchestrator::generate`] and turned into a
//!   [`crate::notification::Notification`] by
//!   [`crate::orchestrator::Orchestrator::submit`].
//!
//! * [`StageFailure`]: **non-fatal.** A model call failed or answered in the
//!   wrong shape. Stored inside [`crate::pipeline::extract::Extraction`] and
//!   [`crate::pipeline::supplement::Supplementation`] so the caller decides
//!   whether to show a placeholder or abort.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// All errors that end a submission.
///
/// Model-level failures use [`StageFailure`] and are carried inside stage
/// outcomes rather than propagated here.
#[derive(Debug, Error)]
pub enum RevisioError {
    // ── Validation errors ─────────────────────────────────────────────────
    /// The request or form is malformed; no remote call was attempted.
    #[error("Validation failed: {0}")]
    Validation(String),

    /// Stage 1 produced no revision points, so there is nothing to expand.
    #[error("The model did not extract any revision points from the content")]
    NoRevisionPoints,

    // ── Image input errors ────────────────────────────────────────────────
    /// Image file was not found at the given path.
    #[error("Image file not found: '{path}'\nCheck the path exists and is readable.")]
    ImageNotFound { path: PathBuf },

    /// Image file exists but could not be read.
    #[error("Failed to read image '{path}': {source}")]
    ImageReadFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The bytes are not an image format the model accepts.
    #[error("'{source_name}' is not a supported image (first bytes: {magic:?})")]
    NotAnImage { source_name: String, magic: Vec<u8> },

    /// The image exceeds the configured upload limit.
    #[error("Image '{source_name}' is {size} bytes, above the {limit}-byte limit")]
    ImageTooLarge {
        source_name: String,
        size: usize,
        limit: usize,
    },

    /// The string is not a valid `data:<mime>;base64,<data>` URI.
    #[error("Invalid data URI: {0}")]
    InvalidDataUri(String),

    /// HTTP URL was syntactically valid but download failed.
    #[error("Failed to download '{url}': {reason}\nCheck your internet connection.")]
    DownloadFailed { url: String, reason: String },

    /// Download exceeded the configured timeout.
    #[error("Download timed out after {secs}s for '{url}'\nIncrease --download-timeout.")]
    DownloadTimeout { url: String, secs: u64 },

    // ── LLM errors ────────────────────────────────────────────────────────
    /// The configured provider is not initialised (missing API key etc.).
    #[error("LLM provider '{provider}' is not configured.\n{hint}")]
    ProviderNotConfigured { provider: String, hint: String },

    /// A stage failed and the failure policy does not tolerate it.
    #[error("{0}")]
    Stage(StageFailure),

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not create or write the exported sheet.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl RevisioError {
    /// True for failures detected before any remote call was made.
    pub fn is_validation(&self) -> bool {
        matches!(self, RevisioError::Validation(_))
    }
}

/// Which of the two model calls a failure belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Extraction,
    Supplementation,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Extraction => f.write_str("extraction"),
            Stage::Supplementation => f.write_str("supplementation"),
        }
    }
}

/// A non-fatal failure of a single model call.
///
/// Carries enough diagnostic text (raw output or upstream message) for the
/// display layer to render a localized placeholder.
#[derive(Debug, Clone, PartialEq, Error, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StageFailure {
    /// The model answered, but not in the declared output shape.
    #[error("{stage}: model output did not match the expected schema: {raw}")]
    SchemaViolation { stage: Stage, raw: String },

    /// The remote call itself failed (network, quota, authentication).
    #[error("{stage}: model call failed: {message}")]
    Upstream { stage: Stage, message: String },

    /// The remote call did not finish within the configured timeout.
    #[error("{stage}: model call timed out after {secs}s")]
    Timeout { stage: Stage, secs: u64 },
}

impl StageFailure {
    pub fn stage(&self) -> Stage {
        match self {
            StageFailure::SchemaViolation { stage, .. }
            | StageFailure::Upstream { stage, .. }
            | StageFailure::Timeout { stage, .. } => *stage,
        }
    }

    /// True when the call never produced a model answer.
    pub fn is_critical(&self) -> bool {
        !matches!(self, StageFailure::SchemaViolation { .. })
    }

    /// Diagnostic text embedded in placeholders: the raw output for schema
    /// violations, the upstream error message otherwise.
    pub fn detail(&self) -> String {
        match self {
            StageFailure::SchemaViolation { raw, .. } => raw.clone(),
            StageFailure::Upstream { message, .. } => message.clone(),
            StageFailure::Timeout { secs, .. } => format!("timed out after {secs}s"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_display() {
        let e = RevisioError::Validation("no content".into());
        assert!(e.to_string().contains("no content"));
        assert!(e.is_validation());
        assert!(!RevisioError::NoRevisionPoints.is_validation());
    }

    #[test]
    fn image_too_large_display() {
        let e = RevisioError::ImageTooLarge {
            source_name: "scan.png".into(),
            size: 30,
            limit: 20,
        };
        let msg = e.to_string();
        assert!(msg.contains("scan.png"), "got: {msg}");
        assert!(msg.contains("20-byte"), "got: {msg}");
    }

    #[test]
    fn stage_failure_detail_and_stage() {
        let f = StageFailure::SchemaViolation {
            stage: Stage::Extraction,
            raw: "{\"oops\":1}".into(),
        };
        assert_eq!(f.stage(), Stage::Extraction);
        assert_eq!(f.detail(), "{\"oops\":1}");
        assert!(!f.is_critical());

        let t = StageFailure::Timeout {
            stage: Stage::Supplementation,
            secs: 30,
        };
        assert!(t.is_critical());
        assert!(t.to_string().contains("30s"));
        assert!(t.to_string().starts_with("supplementation"));
    }

    #[test]
    fn stage_failure_serialises_with_kind_tag() {
        let f = StageFailure::Upstream {
            stage: Stage::Supplementation,
            message: "quota exceeded".into(),
        };
        let json = serde_json::to_value(&f).expect("serialise");
        assert_eq!(json["kind"], "upstream");
        assert_eq!(json["stage"], "supplementation");
    }
}
