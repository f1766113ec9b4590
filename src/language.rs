//! Output languages supported by both stages.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Language the revision sheet is written in.
///
/// The wire form is the lowercase ISO 639-1 code (`"en"`, `"de"`, `"fr"`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    En,
    De,
    /// French, the default language of the form.
    #[default]
    Fr,
}

impl Language {
    pub const ALL: [Language; 3] = [Language::En, Language::De, Language::Fr];

    /// ISO 639-1 code as sent to the model.
    pub fn code(self) -> &'static str {
        match self {
            Language::En => "en",
            Language::De => "de",
            Language::Fr => "fr",
        }
    }

    /// English name of the language, used inside prompts.
    pub fn english_name(self) -> &'static str {
        match self {
            Language::En => "English",
            Language::De => "German",
            Language::Fr => "French",
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for Language {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "en" | "english" => Ok(Language::En),
            "de" | "german" | "deutsch" => Ok(Language::De),
            "fr" | "french" | "français" | "francais" => Ok(Language::Fr),
            other => Err(format!("unsupported language '{other}' (expected en, de or fr)")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_codes_and_names() {
        assert_eq!("en".parse::<Language>().unwrap(), Language::En);
        assert_eq!(" DE ".parse::<Language>().unwrap(), Language::De);
        assert_eq!("French".parse::<Language>().unwrap(), Language::Fr);
        assert!("es".parse::<Language>().is_err());
    }

    #[test]
    fn serde_uses_lowercase_codes() {
        assert_eq!(serde_json::to_string(&Language::De).unwrap(), "\"de\"");
        let lang: Language = serde_json::from_str("\"fr\"").unwrap();
        assert_eq!(lang, Language::Fr);
        assert!(serde_json::from_str::<Language>("\"it\"").is_err());
    }

    #[test]
    fn display_matches_code() {
        for lang in Language::ALL {
            assert_eq!(lang.to_string(), lang.code());
        }
    }
}
