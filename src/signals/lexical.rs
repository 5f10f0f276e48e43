// Lexical suspicion scorer: stylistic markers of sensationalist news.
//
// Three cheap signals over the raw "title content" string: how many clickbait
// phrases appear, how much of the text is SHOUTED, and how many exclamation
// marks it carries. The combination is linear and clamped to [0, 1].
//
// Two weighting sets exist. The fusion engine uses `enhanced` when token
// features are available and `simple` when they are not.

use serde::{Deserialize, Serialize};

/// Default suspicious phrase vocabulary (matched case-insensitively).
pub const DEFAULT_PATTERNS: [&str; 22] = [
    "shocking",
    "exclusive",
    "secret",
    "urgent",
    "miracle",
    "breaking",
    "doctors hate",
    "one weird trick",
    "you won't believe",
    "leaked",
    "government cover",
    "big pharma",
    "they don't want you to know",
    "amazing discovery",
    "scientists shocked",
    "unbelievable",
    "incredible",
    "must read",
    "viral",
    "exposed",
    "revealed",
    "hidden truth",
];

/// Weights for the suspicion formula.
///
/// `score = patterns * pattern_weight + caps_ratio * caps_weight
///          + min(exclamations / exclamation_divisor, exclamation_cap)`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SuspicionWeights {
    pub pattern_weight: f64,
    pub caps_weight: f64,
    pub exclamation_divisor: f64,
    pub exclamation_cap: f64,
}

impl SuspicionWeights {
    /// Weighting used when only lexical and classifier signals are available.
    pub const SIMPLE: Self = Self {
        pattern_weight: 0.4,
        caps_weight: 0.5,
        exclamation_divisor: 5.0,
        exclamation_cap: 0.3,
    };

    /// Weighting used alongside token features.
    pub const ENHANCED: Self = Self {
        pattern_weight: 0.3,
        caps_weight: 0.4,
        exclamation_divisor: 10.0,
        exclamation_cap: 0.3,
    };
}

/// Raw counts behind a suspicion score. Useful for display and tests.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct LexicalCounts {
    pub pattern_matches: usize,
    pub caps_ratio: f64,
    pub exclamations: usize,
}

impl LexicalCounts {
    /// Combine the counts into a suspicion score in [0, 1].
    pub fn score(&self, weights: &SuspicionWeights) -> f64 {
        let exclamation_term = if weights.exclamation_divisor > 0.0 {
            (self.exclamations as f64 / weights.exclamation_divisor).min(weights.exclamation_cap)
        } else {
            0.0
        };
        let raw = self.pattern_matches as f64 * weights.pattern_weight
            + self.caps_ratio * weights.caps_weight
            + exclamation_term;
        raw.clamp(0.0, 1.0)
    }
}

/// Scores text against a configurable phrase vocabulary.
#[derive(Debug, Clone)]
pub struct LexicalScorer {
    /// Lower-cased, non-empty phrases.
    patterns: Vec<String>,
}

impl Default for LexicalScorer {
    fn default() -> Self {
        Self::new(DEFAULT_PATTERNS.iter().copied())
    }
}

impl LexicalScorer {
    pub fn new<I, S>(patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let patterns = patterns
            .into_iter()
            .map(|p| p.as_ref().trim().to_lowercase())
            .filter(|p| !p.is_empty())
            .collect();
        Self { patterns }
    }

    pub fn patterns(&self) -> &[String] {
        &self.patterns
    }

    /// Count phrases present, shouted words and exclamation marks.
    ///
    /// Each phrase counts once however often it appears.
    pub fn counts(&self, text: &str) -> LexicalCounts {
        let lower = text.to_lowercase();
        let pattern_matches = self
            .patterns
            .iter()
            .filter(|p| lower.contains(p.as_str()))
            .count();

        let words: Vec<&str> = text.split_whitespace().collect();
        let caps_ratio = if words.is_empty() {
            0.0
        } else {
            let shouted = words.iter().filter(|w| is_upper_word(w)).count();
            shouted as f64 / words.len() as f64
        };

        LexicalCounts {
            pattern_matches,
            caps_ratio,
            exclamations: text.matches('!').count(),
        }
    }

    /// Suspicion score in [0, 1] under the given weighting.
    pub fn score(&self, text: &str, weights: &SuspicionWeights) -> f64 {
        self.counts(text).score(weights)
    }
}

/// A word is upper-case when it has at least one cased letter and no
/// lower-case ones. "NASA's" is not, "FDA!" is, "2024" is not.
fn is_upper_word(word: &str) -> bool {
    let mut has_cased = false;
    for c in word.chars() {
        if c.is_lowercase() {
            return false;
        }
        if c.is_uppercase() {
            has_cased = true;
        }
    }
    has_cased
}
