use serde::{Deserialize, Serialize};

/// Conversation language, detected once per session from the first inbound
/// message and persisted in the session metadata.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    English,
    Thai,
    Russian,
}

impl Language {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::English => "English",
            Self::Thai => "Thai",
            Self::Russian => "Russian",
        }
    }
}

impl std::fmt::Display for Language {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

const DOMINANCE_RATIO: f64 = 0.3;

/// Guess the language of a message by script-class ratios.
///
/// Counts Thai (U+0E00–U+0E7F) and Cyrillic (U+0400–U+04FF) scalars against
/// the total of alphabetic scalars; a class wins at a ratio above 0.3.
/// Defaults to English for empty or non-alphabetic input (numbers, emoji).
pub fn detect(text: &str) -> Language {
    let mut thai = 0usize;
    let mut cyrillic = 0usize;
    let mut latin = 0usize;

    for c in text.chars() {
        match c {
            '\u{0E00}'..='\u{0E7F}' => thai += 1,
            '\u{0400}'..='\u{04FF}' => cyrillic += 1,
            'a'..='z' | 'A'..='Z' => latin += 1,
            _ => {}
        }
    }

    let total = thai + cyrillic + latin;
    if total == 0 {
        return Language::English;
    }

    let total = total as f64;
    if thai as f64 / total > DOMINANCE_RATIO {
        Language::Thai
    } else if cyrillic as f64 / total > DOMINANCE_RATIO {
        Language::Russian
    } else {
        Language::English
    }
}

#[cfg(test)]
mod tests;
