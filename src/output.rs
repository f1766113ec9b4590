//! Result types handed back to callers after a successful submission.

use crate::language::Language;
use crate::types::RevisionPoint;
use serde::{Deserialize, Serialize};

/// The displayable aggregate assembled after both stages.
///
/// Owned by the caller's session; a new submission replaces it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RevisionSheet {
    pub topic: String,
    pub language: Language,
    pub extracted_points: Vec<RevisionPoint>,
    pub supplemented_content: String,
}

impl RevisionSheet {
    /// Full Markdown document: the topic as title followed by the content.
    pub fn to_markdown(&self) -> String {
        let mut doc = format!("# {}\n\n{}", self.topic.trim(), self.supplemented_content.trim_end());
        doc.push('\n');
        doc
    }

    /// File name used when exporting, e.g. `Revisio_Cell_Biology.md`.
    ///
    /// Whitespace, path separators and characters reserved on common file
    /// systems become single underscores, so the name never leaves the
    /// export directory.
    pub fn export_file_name(&self) -> String {
        let mut name = String::with_capacity(self.topic.len());
        for c in self.topic.chars() {
            let unsafe_char = c.is_whitespace()
                || c.is_control()
                || matches!(c, '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|');
            if !unsafe_char {
                name.push(c);
            } else if !name.ends_with('_') {
                name.push('_');
            }
        }
        let name = name.trim_matches(|c: char| c == '_' || c == '.');
        if name.is_empty() {
            "Revisio.md".to_string()
        } else {
            format!("Revisio_{name}.md")
        }
    }
}

/// Timing and token usage of one submission.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SheetStats {
    pub extraction_ms: u64,
    pub supplementation_ms: u64,
    pub total_ms: u64,
    pub input_tokens: u64,
    pub output_tokens: u64,
}

/// A sheet together with the stats of the run that produced it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneratedSheet {
    pub sheet: RevisionSheet,
    pub stats: SheetStats,
}
