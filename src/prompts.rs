//! Instruction templates for the two model stages.
//!
//! Every prompt lives here so wording changes touch exactly one place and
//! unit tests can inspect them without a model. Callers can override the
//! system prompts via [`crate::config::SheetConfig::extraction_prompt`] and
//! [`crate::config::SheetConfig::supplementation_prompt`]; the `{language}`
//! placeholder is substituted in overrides as well.

use crate::types::{ExtractionRequest, SupplementationRequest};

/// Default system prompt of the extraction stage.
pub const EXTRACTION_SYSTEM_PROMPT: &str = r#"You are an expert at extracting key concepts and information from various types of content to create concise and effective revision sheets.

Analyze the provided content and extract the most important revision points. Each revision point has a title and a short summary.

OUTPUT FORMAT
- Answer with ONE JSON object and nothing else, matching this schema:
  {"revisionPoints": [{"title": "<string>", "summary": "<string>"}]}
- Every title and summary is a non-empty string.
- Do NOT wrap the JSON in ```json fences.
- Write every title and summary in {language}."#;

/// Default system prompt of the supplementation stage.
pub const SUPPLEMENTATION_SYSTEM_PROMPT: &str = r#"You are an AI assistant creating comprehensive revision material in {language}.

You receive point titles as Markdown headings, each starting with '## '. For each heading:
1. Take the title (the text after '## ').
2. Expand it with detailed definitions, clear explanations, and illustrative examples.
3. Start your expansion with the original '## Point Title' heading, followed by your content.

RULES FOR THE MARKDOWN CONTENT
- Use ONLY Markdown: '## ' headings, paragraphs, lists ('* ', '- ', '1. '), **bold**, *italic*.
- Emphasis markers MUST be paired. Never leave stray characters such as `some * text` or `text *`; list bullets always have a space after the marker.
- ABSOLUTELY NO JSON structures, keys (like "topic", "points", "point", "title", "summary"), or array-like syntax inside the Markdown.
- The topic is context only; do not repeat it as a heading.
- Write everything in {language}.

OUTPUT FORMAT
- Answer with ONE JSON object matching this schema:
  {"supplementedPoints": "<Markdown string>"}
- The string value is pure Markdown, ready for direct display."#;

/// Example expansion appended to the supplementation instructions.
const SUPPLEMENTATION_EXAMPLE: &str = r#"Example: for the heading
## Photosynthesis
the expansion looks like
## Photosynthesis
Photosynthesis is the process by which green plants, algae, and some bacteria convert light energy into chemical energy stored as glucose.
**Key components:**
- **Sunlight:** provides the energy for the reactions.
- **Chlorophyll:** the green pigment in chloroplasts that absorbs light.
**Overall equation:**
6CO2 + 6H2O + light energy → C6H12O6 + 6O2"#;

/// Substitute the `{language}` placeholder.
pub fn render_system_prompt(template: &str, language_name: &str) -> String {
    template.replace("{language}", language_name)
}

/// User turn of the extraction call.
///
/// Images travel as attachments in display order; the text names them so
/// the model can refer to "Image N".
pub fn extraction_user_message(request: &ExtractionRequest) -> String {
    let mut msg = String::new();

    if let Some(text) = request.text() {
        msg.push_str("The content to analyze is the following text:\n\"\"\"\n");
        msg.push_str(text);
        msg.push_str("\n\"\"\"\n\n");
    }

    if !request.images.is_empty() {
        msg.push_str(
            "The content to analyze is in the attached images. Extract text, concepts, and key information visible in them.\n",
        );
        for image in &request.images {
            msg.push_str(&format!(
                "Image {}: attachment {} ({})\n",
                image.display_index,
                image.display_index,
                image.data_uri.mime_type()
            ));
        }
        msg.push('\n');
    }

    msg.push_str(&format!(
        "Language for the output: {}",
        request.language.english_name()
    ));
    msg
}

/// User turn of the supplementation call.
pub fn supplementation_user_message(request: &SupplementationRequest) -> String {
    format!(
        "Topic (for context only, do not include in the output): {topic}\n\n\
         Initial revision point titles (each starting with '## '):\n\
         {points}\n\n\
         {example}\n\n\
         Process ALL the headings above and combine the expansions into one flowing Markdown text in {language}.",
        topic = request.topic.trim(),
        points = request.revision_points,
        example = SUPPLEMENTATION_EXAMPLE,
        language = request.language.english_name(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::language::Language;
    use crate::types::DataUri;

    #[test]
    fn system_prompts_declare_output_schema() {
        assert!(EXTRACTION_SYSTEM_PROMPT.contains(r#"{"revisionPoints""#));
        assert!(SUPPLEMENTATION_SYSTEM_PROMPT.contains(r#"{"supplementedPoints""#));
    }

    #[test]
    fn language_placeholder_is_substituted() {
        let p = render_system_prompt(SUPPLEMENTATION_SYSTEM_PROMPT, "German");
        assert!(!p.contains("{language}"));
        assert!(p.contains("revision material in German"));
    }

    #[test]
    fn extraction_message_lists_images_in_order() {
        let req = ExtractionRequest::from_images(
            [
                DataUri::from_bytes("image/png", b"a"),
                DataUri::from_bytes("image/jpeg", b"b"),
            ],
            Language::Fr,
        );
        let msg = extraction_user_message(&req);
        let first = msg.find("Image 1:").expect("image 1 labelled");
        let second = msg.find("Image 2:").expect("image 2 labelled");
        assert!(first < second);
        assert!(msg.contains("image/jpeg"));
        assert!(msg.ends_with("Language for the output: French"));
        assert!(!msg.contains("following text"));
    }

    #[test]
    fn extraction_message_embeds_text() {
        let req = ExtractionRequest::from_text("  Osmosis moves water.  ", Language::En);
        let msg = extraction_user_message(&req);
        assert!(msg.contains("\"\"\"\nOsmosis moves water.\n\"\"\""));
        assert!(!msg.contains("attached images"));
    }

    #[test]
    fn supplementation_message_carries_headings_and_topic() {
        let req = SupplementationRequest {
            topic: "Plants".into(),
            revision_points: "## Photosynthesis\n\n## Respiration".into(),
            language: Language::De,
        };
        let msg = supplementation_user_message(&req);
        assert!(msg.contains("## Photosynthesis\n\n## Respiration"));
        assert!(msg.contains("do not include in the output): Plants"));
        assert!(msg.ends_with("in German."));
    }
}
