/// Languages with localized markers, titles and demo content
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    English,
    Spanish,
    Portuguese,
    French,
    German,
    Korean,
    Japanese,
}

impl Language {
    pub const ALL: [Language; 7] = [
        Language::English,
        Language::Spanish,
        Language::Portuguese,
        Language::French,
        Language::German,
        Language::Korean,
        Language::Japanese,
    ];

    /// Resolve an ISO-639-1-like code (`en`, `pt-BR`, `ES`); unknown codes fall back to English
    pub fn from_code(code: &str) -> Self {
        let base = code
            .trim()
            .split(|c| c == '-' || c == '_')
            .next()
            .unwrap_or("")
            .to_lowercase();

        match base.as_str() {
            "es" => Language::Spanish,
            "pt" => Language::Portuguese,
            "fr" => Language::French,
            "de" => Language::German,
            "ko" => Language::Korean,
            "ja" => Language::Japanese,
            _ => Language::English,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            Language::English => "en",
            Language::Spanish => "es",
            Language::Portuguese => "pt",
            Language::French => "fr",
            Language::German => "de",
            Language::Korean => "ko",
            Language::Japanese => "ja",
        }
    }

    /// Scripts written without spaces between words
    pub fn is_unspaced(&self) -> bool {
        matches!(self, Language::Japanese)
    }
}

impl Default for Language {
    fn default() -> Self {
        Language::English
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}
