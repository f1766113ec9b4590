//! Localized user-facing text.
//!
//! Stage outcomes carry language-neutral [`StageFailure`] values; the strings
//! here are only applied when a failure has to be shown to a person, either
//! as placeholder content inside a sheet or as a notification.

use crate::error::{Stage, StageFailure};
use crate::language::Language;

/// Title and summary of the synthetic revision point shown when extraction fails.
pub fn extraction_failure_point(failure: &StageFailure, lang: Language) -> (String, String) {
    let (title, summary) = if failure.is_critical() {
        match lang {
            Language::En => (
                "Critical Extraction Error",
                "A critical error occurred while extracting revision points.",
            ),
            Language::De => (
                "Kritischer Extraktionsfehler",
                "Beim Extrahieren der Revisionspunkte ist ein kritischer Fehler aufgetreten.",
            ),
            Language::Fr => (
                "Erreur d'Extraction Critique",
                "Une erreur critique est survenue lors de l'extraction des points de révision.",
            ),
        }
    } else {
        match lang {
            Language::En => (
                "Extraction Error",
                "The AI could not return valid revision points.",
            ),
            Language::De => (
                "Extraktionsfehler",
                "Die KI konnte keine gültigen Revisionspunkte zurückgeben.",
            ),
            Language::Fr => (
                "Erreur d'Extraction",
                "L'IA n'a pas pu retourner de points de révision valides.",
            ),
        }
    };

    let summary = if failure.is_critical() {
        format!("{summary} {}: {}. {}", details_label(lang), failure.detail(), check_logs(lang))
    } else {
        format!("{summary} ({}: {})", output_was(lang), failure.detail())
    };
    (title.to_string(), summary)
}

/// Markdown block shown in place of the supplemented content when stage 2 fails.
pub fn supplementation_failure_markdown(failure: &StageFailure, lang: Language) -> String {
    if failure.is_critical() {
        let (heading, body, retry) = match lang {
            Language::En => (
                "Critical Internal Error",
                "A critical error occurred while contacting the AI service to supplement the content",
                "Please check the logs and try again later.",
            ),
            Language::De => (
                "Kritischer interner Systemfehler",
                "Bei der Kommunikation mit dem KI-Dienst zur Ergänzung der Inhalte ist ein kritischer Fehler aufgetreten",
                "Bitte prüfen Sie die Logs und versuchen Sie es später erneut.",
            ),
            Language::Fr => (
                "Erreur Interne Critique du Système",
                "Une erreur critique est survenue lors de la communication avec le service d'IA pour supplémenter le contenu",
                "Veuillez vérifier les logs et réessayer plus tard.",
            ),
        };
        format!("## {heading}\n\n{body}: {}\n\n{retry}", failure.detail())
    } else {
        let (heading, body) = match lang {
            Language::En => (
                "Generation Error",
                "The AI did not return usable Markdown content.",
            ),
            Language::De => (
                "Generierungsfehler",
                "Die KI hat keinen verwendbaren Markdown-Inhalt zurückgegeben.",
            ),
            Language::Fr => (
                "Erreur de Génération",
                "L'IA n'a pas retourné de contenu Markdown exploitable.",
            ),
        };
        format!("## {heading}\n\n{body} ({}: {})", output_was(lang), failure.detail())
    }
}

fn details_label(lang: Language) -> &'static str {
    match lang {
        Language::En => "Details",
        Language::De => "Details",
        Language::Fr => "Détails",
    }
}

fn output_was(lang: Language) -> &'static str {
    match lang {
        Language::En => "Output was",
        Language::De => "Ausgabe war",
        Language::Fr => "Sortie reçue",
    }
}

fn check_logs(lang: Language) -> &'static str {
    match lang {
        Language::En => "Please check the logs.",
        Language::De => "Bitte prüfen Sie die Logs.",
        Language::Fr => "Veuillez vérifier les logs.",
    }
}

// ── Notifications ────────────────────────────────────────────────────────────

/// Title + description of the "step N/2" progress notifications.
pub fn stage_started(stage: Stage, lang: Language) -> (&'static str, &'static str) {
    match (stage, lang) {
        (Stage::Extraction, Language::En) => (
            "Step 1/2: Extracting key points...",
            "The AI is analysing your content.",
        ),
        (Stage::Extraction, Language::De) => (
            "Schritt 1/2: Kernpunkte werden extrahiert...",
            "Die KI analysiert Ihren Inhalt.",
        ),
        (Stage::Extraction, Language::Fr) => (
            "Étape 1/2: Extraction des points clés...",
            "L'IA analyse votre contenu.",
        ),
        (Stage::Supplementation, Language::En) => (
            "Step 2/2: Enriching content...",
            "The AI is adding details and explanations.",
        ),
        (Stage::Supplementation, Language::De) => (
            "Schritt 2/2: Inhalte werden angereichert...",
            "Die KI ergänzt Details und Erklärungen.",
        ),
        (Stage::Supplementation, Language::Fr) => (
            "Étape 2/2: Enrichissement du contenu...",
            "L'IA ajoute des détails et des explications.",
        ),
    }
}

pub fn sheet_ready(lang: Language) -> (&'static str, &'static str) {
    match lang {
        Language::En => (
            "Revision sheet generated!",
            "Your sheet is ready to read and export.",
        ),
        Language::De => (
            "Lernblatt erstellt!",
            "Ihr Blatt ist bereit zum Lesen und Exportieren.",
        ),
        Language::Fr => (
            "Fiche de révision générée!",
            "Votre fiche est prête à être consultée et exportée.",
        ),
    }
}

pub fn generation_failed_title(lang: Language) -> &'static str {
    match lang {
        Language::En => "Generation error",
        Language::De => "Fehler bei der Erstellung",
        Language::Fr => "Erreur de génération",
    }
}

pub fn missing_content(lang: Language) -> &'static str {
    match lang {
        Language::En => "Invalid content. Please provide text or at least one image.",
        Language::De => "Ungültiger Inhalt. Bitte geben Sie Text oder mindestens ein Bild an.",
        Language::Fr => "Contenu invalide. Veuillez fournir du texte ou au moins une image.",
    }
}

pub fn topic_too_short(lang: Language, min: usize) -> String {
    match lang {
        Language::En => format!("The topic must contain at least {min} characters."),
        Language::De => format!("Das Thema muss mindestens {min} Zeichen enthalten."),
        Language::Fr => format!("Le sujet doit contenir au moins {min} caractères."),
    }
}

pub fn text_too_short(lang: Language, min: usize) -> String {
    match lang {
        Language::En => format!("The text must contain at least {min} characters."),
        Language::De => format!("Der Text muss mindestens {min} Zeichen enthalten."),
        Language::Fr => format!("Le texte doit contenir au moins {min} caractères."),
    }
}

pub fn no_points_extracted(lang: Language) -> &'static str {
    match lang {
        Language::En => "The AI could not extract any relevant revision points from your content.",
        Language::De => "Die KI konnte aus Ihrem Inhalt keine relevanten Revisionspunkte extrahieren.",
        Language::Fr => "L'IA n'a pas pu extraire de points de révision pertinents de votre contenu.",
    }
}

pub fn unexpected_failure(lang: Language) -> &'static str {
    match lang {
        Language::En => "An error occurred while generating the sheet.",
        Language::De => "Beim Erstellen des Blatts ist ein Fehler aufgetreten.",
        Language::Fr => "Une erreur est survenue lors de la génération de la fiche.",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extraction_placeholder_is_localized_and_embeds_raw_output() {
        let failure = StageFailure::SchemaViolation {
            stage: Stage::Extraction,
            raw: "null".into(),
        };
        let (title, summary) = extraction_failure_point(&failure, Language::De);
        assert_eq!(title, "Extraktionsfehler");
        assert!(summary.contains("Ausgabe war: null"), "got: {summary}");
    }

    #[test]
    fn critical_extraction_placeholder_embeds_error_text() {
        let failure = StageFailure::Upstream {
            stage: Stage::Extraction,
            message: "connection reset".into(),
        };
        let (title, summary) = extraction_failure_point(&failure, Language::En);
        assert_eq!(title, "Critical Extraction Error");
        assert!(summary.contains("connection reset"));
    }

    #[test]
    fn supplementation_placeholder_has_visible_heading() {
        let failure = StageFailure::Timeout {
            stage: Stage::Supplementation,
            secs: 120,
        };
        for lang in Language::ALL {
            let md = supplementation_failure_markdown(&failure, lang);
            assert!(md.starts_with("## "), "{lang}: {md}");
            assert!(md.contains("120s"), "{lang}: {md}");
        }
        let fr = supplementation_failure_markdown(&failure, Language::Fr);
        assert!(fr.starts_with("## Erreur Interne Critique du Système"));
    }
}
