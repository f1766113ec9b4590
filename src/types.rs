//! Request/response contracts of the two model stages.
//!
//! Field names on the wire follow the external interface (`textContent`,
//! `revisionPoints`, `supplementedPoints`, ...) so the same JSON can be
//! exchanged with the model and with a front end.

use crate::error::RevisioError;
use crate::language::Language;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// A short, titled unit of extracted knowledge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RevisionPoint {
    pub title: String,
    pub summary: String,
}

impl RevisionPoint {
    pub fn new(title: impl Into<String>, summary: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            summary: summary.into(),
        }
    }
}

// ── Data URIs ────────────────────────────────────────────────────────────────

/// Binary content inlined as `data:<mime>;base64,<data>`.
///
/// Only base64 payloads are accepted; the MIME type is kept separately so the
/// model adapter can forward it without re-parsing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataUri {
    mime_type: String,
    data: String,
}

impl DataUri {
    /// Wrap raw bytes.
    pub fn from_bytes(mime_type: impl Into<String>, bytes: &[u8]) -> Self {
        Self {
            mime_type: mime_type.into(),
            data: STANDARD.encode(bytes),
        }
    }

    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    /// The base64 payload, without the `data:` prefix.
    pub fn data(&self) -> &str {
        &self.data
    }

    /// Decode the payload back to bytes.
    pub fn decode(&self) -> Result<Vec<u8>, RevisioError> {
        STANDARD
            .decode(&self.data)
            .map_err(|e| RevisioError::InvalidDataUri(format!("payload is not base64: {e}")))
    }
}

impl FromStr for DataUri {
    type Err = RevisioError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let rest = s
            .strip_prefix("data:")
            .ok_or_else(|| RevisioError::InvalidDataUri("missing 'data:' prefix".into()))?;
        let (header, data) = rest
            .split_once(',')
            .ok_or_else(|| RevisioError::InvalidDataUri("missing ',' separator".into()))?;
        let mime_type = header
            .strip_suffix(";base64")
            .ok_or_else(|| RevisioError::InvalidDataUri("only base64 payloads are supported".into()))?;
        if mime_type.is_empty() || !mime_type.contains('/') {
            return Err(RevisioError::InvalidDataUri(format!(
                "invalid MIME type '{mime_type}'"
            )));
        }
        if data.is_empty() {
            return Err(RevisioError::InvalidDataUri("empty payload".into()));
        }
        if !is_base64_payload(data) {
            return Err(RevisioError::InvalidDataUri("payload is not base64".into()));
        }
        Ok(Self {
            mime_type: mime_type.to_string(),
            data: data.to_string(),
        })
    }
}

/// Standard alphabet, padded to a multiple of four. Checked without decoding
/// so large images are not copied.
fn is_base64_payload(data: &str) -> bool {
    let body = data.trim_end_matches('=');
    data.len() % 4 == 0
        && data.len() - body.len() <= 2
        && body
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'+' || b == b'/')
}

impl fmt::Display for DataUri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "data:{};base64,{}", self.mime_type, self.data)
    }
}

impl Serialize for DataUri {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for DataUri {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

// ── Extraction stage ─────────────────────────────────────────────────────────

/// One image of an extraction request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImagePart {
    pub data_uri: DataUri,
    /// 1-based position shown to the model as "Image N".
    pub display_index: usize,
}

/// Input of the extraction stage: optional text, optional ordered images.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractionRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text_content: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub images: Vec<ImagePart>,
    pub language: Language,
}

impl ExtractionRequest {
    pub fn from_text(text: impl Into<String>, language: Language) -> Self {
        Self {
            text_content: Some(text.into()),
            images: Vec::new(),
            language,
        }
    }

    /// Build a request from images, numbering them 1..=N in the given order.
    pub fn from_images(images: impl IntoIterator<Item = DataUri>, language: Language) -> Self {
        let images = images
            .into_iter()
            .enumerate()
            .map(|(i, data_uri)| ImagePart {
                data_uri,
                display_index: i + 1,
            })
            .collect();
        Self {
            text_content: None,
            images,
            language,
        }
    }

    /// The text content, if present and not blank.
    pub fn text(&self) -> Option<&str> {
        self.text_content
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
    }

    /// At least one of text or images must be present.
    pub fn validate(&self) -> Result<(), RevisioError> {
        if self.text().is_none() && self.images.is_empty() {
            return Err(RevisioError::Validation(
                "either textContent or at least one image must be provided".into(),
            ));
        }
        Ok(())
    }
}

/// Output of the extraction stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractionResponse {
    pub revision_points: Vec<RevisionPoint>,
}

impl ExtractionResponse {
    /// Index of the first point with a blank title or summary.
    pub fn first_blank_point(&self) -> Option<usize> {
        self.revision_points
            .iter()
            .position(|p| p.title.trim().is_empty() || p.summary.trim().is_empty())
    }
}

// ── Supplementation stage ────────────────────────────────────────────────────

/// Input of the supplementation stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SupplementationRequest {
    /// Context only; never repeated in the output.
    pub topic: String,
    /// One `## <title>` heading per point, separated by blank lines.
    pub revision_points: String,
    pub language: Language,
}

impl SupplementationRequest {
    pub fn validate(&self) -> Result<(), RevisioError> {
        if !self
            .revision_points
            .lines()
            .any(|l| l.starts_with("## ") && !l[3..].trim().is_empty())
        {
            return Err(RevisioError::Validation(
                "revisionPoints must contain at least one '## ' heading".into(),
            ));
        }
        Ok(())
    }
}

/// Output of the supplementation stage: one Markdown document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SupplementationResponse {
    pub supplemented_points: String,
}
