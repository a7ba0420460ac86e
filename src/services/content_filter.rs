//! Prohibited-language screening for player commands and story text
//!
//! Terms are matched case-insensitively both as written and with any run of
//! whitespace, punctuation, or underscores between their letters, so that
//! spaced-out or punctuated spellings are caught too.

use regex::Regex;
use std::sync::LazyLock;

pub const DEFAULT_PROHIBITED_TERMS: &[&str] = &[
    "nigga", "nigger", "faggot", "retard", "spic", "kike", "chink", "gook",
];

pub const CONTENT_WARNING: &str = "I notice that you've used language that could be considered offensive or disrespectful. In our adventure, let's try to use inclusive and respectful language so everyone can feel welcome. What would you like your character to do next?";

static EDUCATIONAL_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"(?i)harmful",
        r"(?i)inappropriate",
        r"(?i)offensive",
        r"(?i)instead.{1,30}try",
        r"(?i)language.{1,50}hurtful",
        r"(?i)slur",
        r"(?i)respectful",
        r"(?i)inclusive",
    ]
    .into_iter()
    .map(|p| Regex::new(p).expect("valid educational pattern"))
    .collect()
});

/// Minimum number of educational markers for text to count as a teaching reply
const EDUCATIONAL_MIN_MATCHES: usize = 2;

#[derive(Debug, Clone)]
struct TermPattern {
    mask: String,
    lowered: String,
    exact: Regex,
    loose: Regex,
}

impl TermPattern {
    fn new(term: &str) -> Result<Self, regex::Error> {
        let lowered = term.to_lowercase();
        let escaped = regex::escape(term);
        let spaced = term
            .chars()
            .map(|c| regex::escape(&c.to_string()))
            .collect::<Vec<_>>()
            .join(r"[\s\W_]*");

        Ok(Self {
            mask: "*".repeat(term.chars().count()),
            lowered,
            exact: Regex::new(&format!(r"(?i)\b{escaped}\b"))?,
            loose: Regex::new(&format!("(?i){spaced}"))?,
        })
    }

    fn found_in(&self, lowered_text: &str) -> bool {
        lowered_text.contains(&self.lowered) || self.loose.is_match(lowered_text)
    }

    fn mask_in(&self, text: &str) -> String {
        let text = self.exact.replace_all(text, self.mask.as_str());
        self.loose.replace_all(&text, self.mask.as_str()).into_owned()
    }
}

/// Compiled prohibited-term list
#[derive(Debug, Clone)]
pub struct ContentFilter {
    terms: Vec<TermPattern>,
}

impl ContentFilter {
    pub fn new<I, S>(terms: I) -> Result<Self, regex::Error>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let terms = terms
            .into_iter()
            .map(|t| t.as_ref().trim().to_string())
            .filter(|t| !t.is_empty())
            .map(|t| TermPattern::new(&t))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { terms })
    }

    pub fn term_count(&self) -> usize {
        self.terms.len()
    }

    pub fn contains_prohibited(&self, text: &str) -> bool {
        if text.is_empty() {
            return false;
        }
        let lowered = text.to_lowercase();
        self.terms.iter().any(|t| t.found_in(&lowered))
    }

    /// Whether the text reads like a reply explaining why language is hurtful
    pub fn is_educational(&self, text: &str) -> bool {
        EDUCATIONAL_PATTERNS
            .iter()
            .filter(|p| p.is_match(text))
            .count()
            >= EDUCATIONAL_MIN_MATCHES
    }

    /// Mask every prohibited term with asterisks, leaving teaching replies intact
    pub fn filter_prohibited(&self, text: &str) -> String {
        if text.is_empty() || self.is_educational(text) {
            return text.to_string();
        }
        self.terms
            .iter()
            .fold(text.to_string(), |acc, term| term.mask_in(&acc))
    }
}

impl Default for ContentFilter {
    fn default() -> Self {
        Self::new(DEFAULT_PROHIBITED_TERMS).expect("default terms compile")
    }
}
