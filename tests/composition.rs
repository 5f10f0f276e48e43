// Composition tests: boundary validation -> prediction -> store -> totals,
// against an in-memory SQLite store.

#![cfg(feature = "sqlite")]

use skeptic::db::models::NewAnalysis;
use skeptic::db::Database;
use skeptic::detector::{BackendOrigin, Detector, DetectorBackend, DetectorSettings, Prediction};
use skeptic::input::{AnalysisInput, InputLimits};
use skeptic::output::truncate_chars;

fn detector() -> Detector {
    Detector::new(DetectorBackend::lexical_only(
        DetectorSettings::default(),
        BackendOrigin::Fresh,
    ))
}

#[tokio::test]
async fn analyses_flow_into_history_and_totals() {
    let db = skeptic::db::in_memory_sqlite().unwrap();
    let detector = detector();
    let limits = InputLimits::default();

    let cases = [
        (
            "Scientists Discover New Cancer Treatment",
            "Researchers at a university developed a promising immunotherapy approach.",
        ),
        (
            "SHOCKING: This One Weird Trick Doctors Don't Want You to Know!",
            "URGENT: Big Pharma is hiding this secret! Click here!",
        ),
        ("City opens new library", "The branch will be open seven days a week."),
    ];

    for (title, content) in cases {
        let input = AnalysisInput::new(title, content, &limits).unwrap();
        let verdict = detector.predict(&input.title, &input.content);
        let row = NewAnalysis::from_verdict(&input, &verdict, "cli").unwrap();
        db.record_analysis(&row).await.unwrap();
    }

    let stats = db.get_stats().await.unwrap();
    assert_eq!(stats.total_analyses, 3);
    assert_eq!(stats.fake_detected, 1);
    assert_eq!(stats.real_detected, 2);
    assert_eq!(stats.real_percentage, 66.7);

    let history = db.recent_analyses(10, 0).await.unwrap();
    assert_eq!(history.len(), 3);
    assert_eq!(history[0].title, "City opens new library");
    assert_eq!(
        Prediction::from_label(&history[1].prediction),
        Prediction::Fake
    );
    // Lexical-only verdicts carry no token features
    assert!(history.iter().all(|r| r.token_diversity.is_none()));
}

#[tokio::test]
async fn error_verdicts_are_never_recorded() {
    let db = skeptic::db::in_memory_sqlite().unwrap();
    let input = AnalysisInput::new("t", "c", &InputLimits::default()).unwrap();
    let verdict = skeptic::detector::Verdict::error("model crashed");

    assert!(NewAnalysis::from_verdict(&input, &verdict, "cli").is_err());
    assert_eq!(db.count_analyses().await.unwrap(), 0);
    assert_eq!(db.get_stats().await.unwrap().total_analyses, 0);
}

#[test]
fn empty_content_is_rejected_before_prediction() {
    let err = AnalysisInput::new("A real headline", "", &InputLimits::default()).unwrap_err();
    assert_eq!(err.to_string(), "Both title and content are required");
}

#[test]
fn history_preview_truncates_long_content() {
    let long = "word ".repeat(40);
    let preview = truncate_chars(long.trim(), 100);
    assert!(preview.ends_with("..."));
    assert_eq!(preview.chars().count(), 103);
}
