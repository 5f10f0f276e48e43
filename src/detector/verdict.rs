// Verdict: the complete output record of one prediction.

use serde::{Deserialize, Serialize};

use crate::signals::tokens::TokenFeatures;

/// Fused probability above which a text is labelled Fake.
pub const DECISION_BOUNDARY: f64 = 0.5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Prediction {
    Real,
    Fake,
    /// The prediction itself failed; not a usable verdict.
    Error,
}

impl Prediction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Prediction::Real => "Real",
            Prediction::Fake => "Fake",
            Prediction::Error => "Error",
        }
    }

    /// Parse a stored label. Unknown strings map to `Error`.
    pub fn from_label(label: &str) -> Self {
        match label {
            "Real" => Prediction::Real,
            "Fake" => Prediction::Fake,
            _ => Prediction::Error,
        }
    }
}

impl std::fmt::Display for Prediction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Per-signal contributions behind a verdict.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct Breakdown {
    /// Lexical suspicion score under the weighting the branch used
    pub suspicion_patterns: f64,
    /// Normalized classifier signal
    pub pipeline_score: f64,
    /// Present iff tokenization succeeded for this input
    pub bert_features: Option<TokenFeatures>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Verdict {
    pub prediction: Prediction,
    /// |fake_probability - 0.5| * 2, 0.0 to 1.0
    pub confidence: f64,
    pub fake_probability: f64,
    pub real_probability: f64,
    /// Which signal set and backend produced this verdict
    pub method: String,
    pub breakdown: Breakdown,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Verdict {
    /// Build a Real/Fake verdict from a fused probability.
    pub fn from_probability(fake_probability: f64, method: String, breakdown: Breakdown) -> Self {
        let prediction = if fake_probability > DECISION_BOUNDARY {
            Prediction::Fake
        } else {
            Prediction::Real
        };
        Self {
            prediction,
            confidence: (fake_probability - DECISION_BOUNDARY).abs() * 2.0,
            fake_probability,
            real_probability: 1.0 - fake_probability,
            method,
            breakdown,
            error: None,
        }
    }

    /// The terminal failure verdict.
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            prediction: Prediction::Error,
            confidence: 0.0,
            fake_probability: DECISION_BOUNDARY,
            real_probability: DECISION_BOUNDARY,
            method: "Error in Analysis".to_string(),
            breakdown: Breakdown::default(),
            error: Some(message.into()),
        }
    }

    pub fn is_error(&self) -> bool {
        self.prediction == Prediction::Error
    }
}
