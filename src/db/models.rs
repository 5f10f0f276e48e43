// Data models: Rust structs that map to database rows.
//
// Kept separate from the queries so the CLI and web layers can use them
// without depending on rusqlite or sqlx directly.

use serde::{Deserialize, Serialize};

use crate::detector::Verdict;
use crate::input::AnalysisInput;

/// Characters of content shown in history listings.
pub const CONTENT_PREVIEW_CHARS: usize = 100;

/// One stored analysis, as read back from the database.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisRecord {
    pub id: i64,
    pub title: String,
    pub content: String,
    pub prediction: String,
    pub confidence: f64,
    pub fake_probability: f64,
    pub real_probability: f64,
    pub suspicion_score: f64,
    pub pipeline_score: f64,
    /// Absent when the verdict was produced without token features
    pub token_diversity: Option<f64>,
    pub text_length: Option<i64>,
    pub method: String,
    /// Where the analysis came from: "cli", "batch", "web"
    pub source: String,
    /// Caller address for web analyses; never sent back to clients
    #[serde(skip_serializing, default)]
    pub ip_address: Option<String>,
    pub created_at: String,
}

impl AnalysisRecord {
    /// Content truncated for list views.
    pub fn content_preview(&self) -> String {
        crate::output::truncate_chars(&self.content, CONTENT_PREVIEW_CHARS)
    }
}

/// Flattened analysis row ready for insertion.
///
/// Both backends bind the same values, so the mapping from a verdict
/// lives here rather than in each backend.
#[derive(Debug, Clone, PartialEq)]
pub struct NewAnalysis<'a> {
    pub title: &'a str,
    pub content: &'a str,
    pub prediction: &'static str,
    pub is_fake: bool,
    pub confidence: f64,
    pub fake_probability: f64,
    pub real_probability: f64,
    pub suspicion_score: f64,
    pub pipeline_score: f64,
    pub token_diversity: Option<f64>,
    pub text_length: Option<i64>,
    pub method: &'a str,
    pub source: &'a str,
    pub ip_address: Option<&'a str>,
}

impl<'a> NewAnalysis<'a> {
    /// Error verdicts are not analyses and are never stored.
    pub fn from_verdict(
        input: &'a AnalysisInput,
        verdict: &'a Verdict,
        source: &'a str,
    ) -> anyhow::Result<Self> {
        if verdict.is_error() {
            anyhow::bail!(
                "Refusing to record a failed analysis: {}",
                verdict.error.as_deref().unwrap_or("unknown error")
            );
        }
        let features = verdict.breakdown.bert_features;
        Ok(Self {
            title: &input.title,
            content: &input.content,
            prediction: verdict.prediction.as_str(),
            is_fake: verdict.prediction == crate::detector::Prediction::Fake,
            confidence: verdict.confidence,
            fake_probability: verdict.fake_probability,
            real_probability: verdict.real_probability,
            suspicion_score: verdict.breakdown.suspicion_patterns,
            pipeline_score: verdict.breakdown.pipeline_score,
            token_diversity: features.map(|f| f.token_diversity),
            text_length: features.map(|f| f.text_length as i64),
            method: &verdict.method,
            source,
            ip_address: None,
        })
    }

    /// Attach the caller address (web analyses only).
    pub fn with_ip_address(mut self, ip_address: Option<&'a str>) -> Self {
        self.ip_address = ip_address;
        self
    }
}

/// Running totals over every recorded analysis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemStats {
    pub total_analyses: i64,
    pub fake_detected: i64,
    pub real_detected: i64,
    pub fake_percentage: f64,
    pub real_percentage: f64,
    pub last_updated: Option<String>,
}

impl SystemStats {
    pub fn from_totals(
        total_analyses: i64,
        fake_detected: i64,
        real_detected: i64,
        last_updated: Option<String>,
    ) -> Self {
        Self {
            total_analyses,
            fake_detected,
            real_detected,
            fake_percentage: percentage(fake_detected, total_analyses),
            real_percentage: percentage(real_detected, total_analyses),
            last_updated,
        }
    }
}

/// Share of `part` in `total` as a percentage rounded to one decimal.
fn percentage(part: i64, total: i64) -> f64 {
    if total <= 0 {
        return 0.0;
    }
    (part as f64 / total as f64 * 1000.0).round() / 10.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detector::{Breakdown, Verdict};
    use crate::input::InputLimits;

    #[test]
    fn test_percentages_round_to_one_decimal() {
        let stats = SystemStats::from_totals(3, 1, 2, None);
        assert_eq!(stats.fake_percentage, 33.3);
        assert_eq!(stats.real_percentage, 66.7);
    }

    #[test]
    fn test_percentages_zero_when_empty() {
        let stats = SystemStats::from_totals(0, 0, 0, None);
        assert_eq!(stats.fake_percentage, 0.0);
        assert_eq!(stats.real_percentage, 0.0);
    }

    #[test]
    fn test_new_analysis_refuses_error_verdict() {
        let input = AnalysisInput::new("t", "c", &InputLimits::default()).unwrap();
        let verdict = Verdict::error("boom");
        assert!(NewAnalysis::from_verdict(&input, &verdict, "cli").is_err());
    }

    #[test]
    fn test_new_analysis_flattens_breakdown() {
        let input = AnalysisInput::new("t", "c", &InputLimits::default()).unwrap();
        let verdict = Verdict::from_probability(
            0.7,
            "m".to_string(),
            Breakdown {
                suspicion_patterns: 0.9,
                pipeline_score: 0.35,
                bert_features: None,
            },
        );
        let row = NewAnalysis::from_verdict(&input, &verdict, "web").unwrap();
        assert!(row.is_fake);
        assert_eq!(row.prediction, "Fake");
        assert_eq!(row.suspicion_score, 0.9);
        assert_eq!(row.token_diversity, None);
        assert_eq!(row.source, "web");
        assert_eq!(row.ip_address, None);

        let row = row.with_ip_address(Some("203.0.113.7"));
        assert_eq!(row.ip_address, Some("203.0.113.7"));
    }
}
