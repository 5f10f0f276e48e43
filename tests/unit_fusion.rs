// Verdict fusion properties, exercised through Detector::predict with stub
// capabilities standing in for the real tokenizer and classifier.

use std::sync::Arc;

use anyhow::Result;
use skeptic::detector::{BackendOrigin, Detector, DetectorBackend, DetectorSettings, Prediction};
use skeptic::signals::traits::{Classification, TextClassifier, TextTokenizer, TokenizedText};

/// Returns the same tokens whatever the text.
struct FixedTokenizer(TokenizedText);

impl TextTokenizer for FixedTokenizer {
    fn tokenize(&self, _text: &str, _max_length: usize) -> Result<Option<TokenizedText>> {
        Ok(Some(self.0.clone()))
    }

    fn name(&self) -> &str {
        "fixed-tokenizer"
    }
}

struct FixedClassifier {
    label: &'static str,
    score: f64,
}

impl TextClassifier for FixedClassifier {
    fn classify(&self, _text: &str) -> Result<Classification> {
        Ok(Classification {
            label: self.label.to_string(),
            score: self.score,
        })
    }

    fn name(&self) -> &str {
        "fixed-classifier"
    }
}

fn lexical_only() -> Detector {
    Detector::new(DetectorBackend::lexical_only(
        DetectorSettings::default(),
        BackendOrigin::Fresh,
    ))
}

fn with_stubs() -> Detector {
    let tokenizer: Arc<dyn TextTokenizer> = Arc::new(FixedTokenizer(TokenizedText {
        token_ids: vec![101, 7, 7, 9, 0, 0],
        attention_mask: vec![1, 1, 1, 1, 0, 0],
    }));
    let classifier: Arc<dyn TextClassifier> = Arc::new(FixedClassifier {
        label: "toxic",
        score: 0.9,
    });
    Detector::new(DetectorBackend::new(
        Some(tokenizer),
        Some(classifier),
        DetectorSettings::default(),
        BackendOrigin::Fresh,
    ))
}

const REAL_TITLE: &str = "Scientists Discover New Cancer Treatment";
const REAL_CONTENT: &str = "Researchers at a university developed a promising immunotherapy approach.";
const FAKE_TITLE: &str = "SHOCKING: This One Weird Trick Doctors Don't Want You to Know!";
const FAKE_CONTENT: &str = "URGENT: Big Pharma is hiding this secret! Click here!";

// ============================================================
// Scenarios
// ============================================================

#[test]
fn sober_science_headline_is_real() {
    let verdict = lexical_only().predict(REAL_TITLE, REAL_CONTENT);
    assert_eq!(verdict.prediction, Prediction::Real);
    assert!(verdict.fake_probability < 0.5);
    assert_eq!(verdict.breakdown.suspicion_patterns, 0.0);
    assert!(verdict.error.is_none());
}

#[test]
fn clickbait_headline_is_fake() {
    let settings = DetectorSettings::default();
    let counts = settings
        .lexical
        .counts(&format!("{FAKE_TITLE} {FAKE_CONTENT}"));
    assert!(counts.pattern_matches >= 4);
    assert!(counts.exclamations >= 3);

    let verdict = lexical_only().predict(FAKE_TITLE, FAKE_CONTENT);
    assert_eq!(verdict.prediction, Prediction::Fake);
    assert!(verdict.fake_probability > 0.5);
}

#[test]
fn clickbait_headline_is_fake_with_capabilities() {
    let verdict = with_stubs().predict(FAKE_TITLE, FAKE_CONTENT);
    assert_eq!(verdict.prediction, Prediction::Fake);
    assert!(verdict.breakdown.bert_features.is_some());
    assert!(verdict.method.starts_with("Enhanced Analysis"));
}

// ============================================================
// Invariants
// ============================================================

#[test]
fn probabilities_are_complementary_and_confidence_matches() {
    for detector in [lexical_only(), with_stubs()] {
        for (title, content) in [(REAL_TITLE, REAL_CONTENT), (FAKE_TITLE, FAKE_CONTENT)] {
            let v = detector.predict(title, content);
            assert_eq!(v.real_probability, 1.0 - v.fake_probability);
            assert_eq!(v.confidence, (v.fake_probability - 0.5).abs() * 2.0);
            assert_eq!(v.prediction == Prediction::Fake, v.fake_probability > 0.5);
            assert!((0.0..=1.0).contains(&v.fake_probability));
        }
    }
}

#[test]
fn predict_is_idempotent() {
    let detector = with_stubs();
    let first = detector.predict(FAKE_TITLE, FAKE_CONTENT);
    let second = detector.predict(FAKE_TITLE, FAKE_CONTENT);
    assert_eq!(first, second);
}

#[test]
fn more_suspicious_phrases_never_lower_the_score() {
    for detector in [lexical_only(), with_stubs()] {
        let mut content = String::from("The committee met on Tuesday.");
        let mut previous = detector.predict("Council update", &content).fake_probability;
        for phrase in ["leaked", "leaked", "viral", "exposed", "big pharma", "hidden truth"] {
            content.push(' ');
            content.push_str(phrase);
            let next = detector.predict("Council update", &content).fake_probability;
            assert!(next >= previous, "{next} < {previous} for {content:?}");
            previous = next;
        }
    }
}

#[test]
fn repeated_benign_word_stays_real() {
    let verdict = lexical_only().predict(
        "Secretary of State meets counterpart",
        "The secretary said talks with the foreign secretary were constructive.",
    );
    // one "secret" substring match: 0.4 * 0.6 + 0.5 * 0.4
    assert!((verdict.fake_probability - 0.44).abs() < 1e-12);
    assert_eq!(verdict.prediction, Prediction::Real);
}

#[test]
fn no_capabilities_degrades_to_simple_suspicion() {
    let detector = lexical_only();
    let settings = DetectorSettings::default();
    let title = "BREAKING news";
    let content = "An unbelievable result was revealed today!";

    let suspicion = settings
        .lexical
        .score(&format!("{title} {content}"), &settings.simple_weights);
    let verdict = detector.predict(title, content);

    assert_eq!(verdict.fake_probability, suspicion * 0.6 + 0.5 * 0.4);
    assert_eq!(verdict.breakdown.pipeline_score, 0.5);
    assert!(verdict.breakdown.bert_features.is_none());
    assert!(verdict.method.starts_with("Fallback Analysis"));
}

#[test]
fn enhanced_branch_uses_all_three_signals() {
    let verdict = with_stubs().predict("Quiet day", "Nothing happened.");

    let features = verdict.breakdown.bert_features.unwrap();
    // ids 101, 7, 7, 9 are active: 3 distinct of 4
    assert_eq!(features.text_length, 4);
    assert!((features.token_diversity - 0.75).abs() < 1e-12);
    assert!((verdict.breakdown.pipeline_score - 0.63).abs() < 1e-12);

    let expected = 0.0 * 0.4 + 0.63 * 0.4 + 0.25 * 0.2;
    assert!((verdict.fake_probability - expected).abs() < 1e-12);
    assert_eq!(verdict.prediction, Prediction::Real);
}

#[test]
fn non_negative_label_is_neutral() {
    let classifier: Arc<dyn TextClassifier> = Arc::new(FixedClassifier {
        label: "non-toxic",
        score: 0.99,
    });
    let detector = Detector::new(DetectorBackend::new(
        None,
        Some(classifier),
        DetectorSettings::default(),
        BackendOrigin::Fresh,
    ));
    let verdict = detector.predict(REAL_TITLE, REAL_CONTENT);
    assert_eq!(verdict.breakdown.pipeline_score, 0.5);
}
