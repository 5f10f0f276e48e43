// Batch analysis: one JSON object per line, `{"title": ..., "content": ...}`.
//
// Lines are validated up front, predicted in parallel on the blocking pool
// with bounded concurrency, then recorded sequentially in file order.
// A bad line is counted and skipped; it never aborts the batch.

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use futures::stream::{self, StreamExt};
use indicatif::{ProgressBar, ProgressStyle};
use serde::Deserialize;
use tracing::{info, warn};

use crate::db::models::NewAnalysis;
use crate::db::Database;
use crate::detector::{Detector, Prediction, Verdict};
use crate::input::{AnalysisInput, InputLimits};

/// Source tag stored with batch-recorded analyses.
pub const BATCH_SOURCE: &str = "batch";

#[derive(Debug, Deserialize)]
struct BatchLine {
    title: String,
    content: String,
}

/// Counts reported at the end of a batch run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchSummary {
    /// Non-blank lines read
    pub lines: usize,
    /// Lines that were not valid JSON or failed boundary validation
    pub invalid: usize,
    pub fake: usize,
    pub real: usize,
    /// Inputs whose prediction produced an Error verdict
    pub failed: usize,
    pub recorded: usize,
}

/// Parse and validate every non-blank line. Returns valid inputs tagged with
/// their 1-based line number, plus the count of rejected lines.
pub fn parse_lines(text: &str, limits: &InputLimits) -> (Vec<(usize, AnalysisInput)>, usize) {
    let mut inputs = Vec::new();
    let mut invalid = 0;

    for (idx, line) in text.lines().enumerate() {
        let line_no = idx + 1;
        if line.trim().is_empty() {
            continue;
        }
        let parsed = serde_json::from_str::<BatchLine>(line)
            .context("not a {\"title\", \"content\"} object")
            .and_then(|l| AnalysisInput::new(&l.title, &l.content, limits));
        match parsed {
            Ok(input) => inputs.push((line_no, input)),
            Err(e) => {
                warn!(line = line_no, error = %format!("{e:#}"), "Skipping invalid batch line");
                invalid += 1;
            }
        }
    }

    (inputs, invalid)
}

/// Predict every input with at most `concurrency` predictions in flight.
/// Results come back in input order.
pub async fn analyze_all(
    detector: Arc<Detector>,
    inputs: Vec<(usize, AnalysisInput)>,
    concurrency: usize,
    pb: &ProgressBar,
) -> Vec<(usize, AnalysisInput, Verdict)> {
    let mut results: Vec<(usize, AnalysisInput, Verdict)> =
        stream::iter(inputs.into_iter().map(|(line_no, input)| {
            let detector = Arc::clone(&detector);
            async move {
                let job_input = input.clone();
                let verdict = tokio::task::spawn_blocking(move || {
                    detector.predict(&job_input.title, &job_input.content)
                })
                .await
                .unwrap_or_else(|e| Verdict::error(format!("prediction task failed: {e}")));
                pb.inc(1);
                (line_no, input, verdict)
            }
        }))
        .buffer_unordered(concurrency.max(1))
        .collect()
        .await;

    results.sort_by_key(|(line_no, _, _)| *line_no);
    results
}

/// Run a batch file end to end. `db` is `None` when results should not be stored.
pub async fn run(
    detector: Arc<Detector>,
    db: Option<&Arc<dyn Database>>,
    path: &Path,
    limits: &InputLimits,
    concurrency: usize,
) -> Result<BatchSummary> {
    let text = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read batch file {}", path.display()))?;

    let (inputs, invalid) = parse_lines(&text, limits);
    let mut summary = BatchSummary {
        lines: inputs.len() + invalid,
        invalid,
        ..BatchSummary::default()
    };
    info!(
        valid = inputs.len(),
        invalid, concurrency, "Starting batch analysis"
    );

    let pb = ProgressBar::new(inputs.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar().template("  Analyzing [{bar:30}] {pos}/{len} ({eta})")?,
    );
    let results = analyze_all(detector, inputs, concurrency, &pb).await;
    pb.finish_and_clear();

    // Write results sequentially so totals stay consistent with row order
    for (line_no, input, verdict) in &results {
        match verdict.prediction {
            Prediction::Fake => summary.fake += 1,
            Prediction::Real => summary.real += 1,
            Prediction::Error => {
                warn!(
                    line = line_no,
                    error = verdict.error.as_deref().unwrap_or(""),
                    "Prediction failed"
                );
                summary.failed += 1;
                continue;
            }
        }
        if let Some(db) = db {
            let row = NewAnalysis::from_verdict(input, verdict, BATCH_SOURCE)?;
            db.record_analysis(&row)
                .await
                .with_context(|| format!("Failed to record analysis for line {line_no}"))?;
            summary.recorded += 1;
        }
    }

    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detector::{BackendOrigin, DetectorBackend, DetectorSettings};

    fn lexical_detector() -> Arc<Detector> {
        Arc::new(Detector::new(DetectorBackend::lexical_only(
            DetectorSettings::default(),
            BackendOrigin::Fresh,
        )))
    }

    #[test]
    fn test_parse_lines_counts_invalid() {
        let text = concat!(
            "{\"title\": \"Budget passes\", \"content\": \"The council approved it.\"}\n",
            "\n",
            "not json\n",
            "{\"title\": \"  \", \"content\": \"blank title\"}\n",
            "{\"title\": \"Only title\"}\n",
            "{\"title\": \"SHOCKING\", \"content\": \"You won't believe this!!!\"}\n",
        );
        let (inputs, invalid) = parse_lines(text, &InputLimits::default());
        assert_eq!(invalid, 3);
        let lines: Vec<usize> = inputs.iter().map(|(n, _)| *n).collect();
        assert_eq!(lines, vec![1, 6]);
    }

    #[tokio::test]
    async fn test_analyze_all_preserves_order() {
        let limits = InputLimits::default();
        let inputs: Vec<(usize, AnalysisInput)> = (1..=6)
            .map(|n| {
                let input = AnalysisInput::new(&format!("title {n}"), "body", &limits).unwrap();
                (n, input)
            })
            .collect();

        let pb = ProgressBar::hidden();
        let results = analyze_all(lexical_detector(), inputs, 3, &pb).await;
        let order: Vec<usize> = results.iter().map(|(n, _, _)| *n).collect();
        assert_eq!(order, vec![1, 2, 3, 4, 5, 6]);
        assert!(results.iter().all(|(_, _, v)| !v.is_error()));
    }

    #[cfg(feature = "sqlite")]
    #[tokio::test]
    async fn test_run_records_valid_lines() {
        let path = std::env::temp_dir().join(format!("skeptic-batch-{}.jsonl", std::process::id()));
        std::fs::write(
            &path,
            "{\"title\": \"Local news\", \"content\": \"The bridge reopened today.\"}\n\
             garbage\n\
             {\"title\": \"BREAKING\", \"content\": \"SHOCKING cover-up they don't want you to know!!!\"}\n",
        )
        .unwrap();

        let db = crate::db::in_memory_sqlite().unwrap();
        let summary = run(lexical_detector(), Some(&db), &path, &InputLimits::default(), 2)
            .await
            .unwrap();
        std::fs::remove_file(&path).unwrap();

        assert_eq!(summary.lines, 3);
        assert_eq!(summary.invalid, 1);
        assert_eq!(summary.recorded, 2);
        assert_eq!(summary.fake + summary.real, 2);
        assert_eq!(db.count_analyses().await.unwrap(), 2);
    }
}
