// Verdict fusion engine.
//
// Every prediction runs the lexical scorer, the classifier adapter and the
// token feature extractor, then takes one of two convex combinations:
//
//   with token features:    0.4 * suspicion(enhanced) + 0.4 * classifier + 0.2 * (1 - diversity)
//   without token features: 0.6 * suspicion(simple)   + 0.4 * classifier
//
// The engine holds no mutable state. A Detector is built once by the backend
// acquisition step and then shared read-only (Arc<Detector>) by every caller.
// `predict` never fails outward: anything unexpected, panics included, comes
// back as an Error verdict.

use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use tracing::{debug, error};

use super::verdict::{Breakdown, Verdict};
use crate::signals::classifier::{self, DEFAULT_NEGATIVE_LABEL};
use crate::signals::lexical::{LexicalScorer, SuspicionWeights};
use crate::signals::tokens::{self, DEFAULT_MAX_LENGTH};
use crate::signals::traits::{NeutralClassifier, NullTokenizer, TextClassifier, TextTokenizer};

/// Fusion weights when token features are available.
pub const ENHANCED_SUSPICION_WEIGHT: f64 = 0.4;
pub const ENHANCED_CLASSIFIER_WEIGHT: f64 = 0.4;
pub const ENHANCED_REPETITION_WEIGHT: f64 = 0.2;

/// Fusion weights when token features are absent.
pub const FALLBACK_SUSPICION_WEIGHT: f64 = 0.6;
pub const FALLBACK_CLASSIFIER_WEIGHT: f64 = 0.4;

/// Tunables shared by every prediction against one backend.
#[derive(Debug, Clone)]
pub struct DetectorSettings {
    pub lexical: LexicalScorer,
    /// Suspicion weighting for the branch without token features
    pub simple_weights: SuspicionWeights,
    /// Suspicion weighting for the branch with token features
    pub enhanced_weights: SuspicionWeights,
    pub max_length: usize,
    /// Classifier label counted as negative evidence
    pub negative_label: String,
}

impl Default for DetectorSettings {
    fn default() -> Self {
        Self {
            lexical: LexicalScorer::default(),
            simple_weights: SuspicionWeights::SIMPLE,
            enhanced_weights: SuspicionWeights::ENHANCED,
            max_length: DEFAULT_MAX_LENGTH,
            negative_label: DEFAULT_NEGATIVE_LABEL.to_string(),
        }
    }
}

/// Where the backend came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendOrigin {
    /// Loaded from a persisted bundle directory
    Persisted(PathBuf),
    /// Constructed from the model directory at startup
    Fresh,
    /// Fresh construction itself blew up; lexical signal only
    Fallback,
}

impl fmt::Display for BackendOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendOrigin::Persisted(path) => {
                let name = path
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_else(|| path.display().to_string());
                write!(f, "persisted {name}")
            }
            BackendOrigin::Fresh => write!(f, "fresh"),
            BackendOrigin::Fallback => write!(f, "lexical fallback"),
        }
    }
}

/// The bundle of optional capabilities a Detector scores with.
/// Absent capabilities are represented by their null objects.
pub struct DetectorBackend {
    pub tokenizer: Arc<dyn TextTokenizer>,
    pub classifier: Arc<dyn TextClassifier>,
    pub settings: DetectorSettings,
    pub origin: BackendOrigin,
}

impl DetectorBackend {
    pub fn new(
        tokenizer: Option<Arc<dyn TextTokenizer>>,
        classifier: Option<Arc<dyn TextClassifier>>,
        settings: DetectorSettings,
        origin: BackendOrigin,
    ) -> Self {
        Self {
            tokenizer: tokenizer.unwrap_or_else(|| Arc::new(NullTokenizer)),
            classifier: classifier.unwrap_or_else(|| Arc::new(NeutralClassifier)),
            settings,
            origin,
        }
    }

    /// A backend with neither capability. Always constructible.
    pub fn lexical_only(settings: DetectorSettings, origin: BackendOrigin) -> Self {
        Self::new(None, None, settings, origin)
    }

    pub fn has_tokenizer(&self) -> bool {
        self.tokenizer.is_available()
    }

    pub fn has_classifier(&self) -> bool {
        self.classifier.is_available()
    }

    /// One-line description for logs and status output.
    pub fn describe(&self) -> String {
        format!(
            "{} backend (tokenizer: {}, classifier: {})",
            self.origin,
            self.tokenizer.name(),
            self.classifier.name()
        )
    }
}

/// The fusion engine. Immutable after construction.
pub struct Detector {
    backend: DetectorBackend,
}

impl Detector {
    pub fn new(backend: DetectorBackend) -> Self {
        Self { backend }
    }

    pub fn backend(&self) -> &DetectorBackend {
        &self.backend
    }

    /// Predict a verdict for a validated (title, content) pair.
    ///
    /// Never panics or errors: failures become `Prediction::Error`.
    pub fn predict(&self, title: &str, content: &str) -> Verdict {
        match panic::catch_unwind(AssertUnwindSafe(|| self.fuse(title, content))) {
            Ok(Ok(verdict)) => verdict,
            Ok(Err(e)) => {
                error!(error = %e, "Prediction failed");
                Verdict::error(e.to_string())
            }
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                error!(error = %message, "Prediction panicked");
                Verdict::error(message)
            }
        }
    }

    fn fuse(&self, title: &str, content: &str) -> Result<Verdict> {
        let settings = &self.backend.settings;
        let combined = format!("{title} {content}");

        let counts = settings.lexical.counts(&combined);
        let pipeline_score = classifier::classify(
            self.backend.classifier.as_ref(),
            &combined,
            &settings.negative_label,
        );
        let features = tokens::extract(
            self.backend.tokenizer.as_ref(),
            title,
            content,
            settings.max_length,
        );

        let (fake_probability, suspicion, branch) = match features {
            Some(f) => {
                let suspicion = counts.score(&settings.enhanced_weights);
                let fused = suspicion * ENHANCED_SUSPICION_WEIGHT
                    + pipeline_score * ENHANCED_CLASSIFIER_WEIGHT
                    + (1.0 - f.token_diversity) * ENHANCED_REPETITION_WEIGHT;
                (fused, suspicion, "Enhanced Analysis: lexical + classifier + token diversity")
            }
            None => {
                let suspicion = counts.score(&settings.simple_weights);
                let fused = suspicion * FALLBACK_SUSPICION_WEIGHT
                    + pipeline_score * FALLBACK_CLASSIFIER_WEIGHT;
                (fused, suspicion, "Fallback Analysis: lexical + classifier")
            }
        };

        if !fake_probability.is_finite() || !(0.0..=1.0).contains(&fake_probability) {
            anyhow::bail!("Fused probability out of range: {fake_probability}");
        }

        debug!(
            suspicion,
            pipeline_score,
            pattern_matches = counts.pattern_matches,
            token_diversity = features.map(|f| f.token_diversity),
            fake_probability,
            "Fused verdict"
        );

        let method = format!("{branch} [{}]", self.backend.describe());
        let breakdown = Breakdown {
            suspicion_patterns: suspicion,
            pipeline_score,
            bert_features: features,
        };

        Ok(Verdict::from_probability(fake_probability, method, breakdown))
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        format!("internal error: {s}")
    } else if let Some(s) = payload.downcast_ref::<String>() {
        format!("internal error: {s}")
    } else {
        "internal error during prediction".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detector::verdict::Prediction;
    use crate::signals::traits::{Classification, TokenizedText};

    struct PanickingClassifier;

    impl TextClassifier for PanickingClassifier {
        fn classify(&self, _text: &str) -> Result<Classification> {
            panic!("model state corrupted")
        }

        fn name(&self) -> &str {
            "panicking"
        }
    }

    struct RepeatingTokenizer;

    impl TextTokenizer for RepeatingTokenizer {
        fn tokenize(&self, _text: &str, max_length: usize) -> Result<Option<TokenizedText>> {
            // 4 active tokens, 2 distinct, then padding
            let mut ids = vec![5, 5, 6, 6];
            let mut mask = vec![1, 1, 1, 1];
            ids.resize(max_length, 0);
            mask.resize(max_length, 0);
            Ok(Some(TokenizedText {
                token_ids: ids,
                attention_mask: mask,
            }))
        }

        fn name(&self) -> &str {
            "repeating"
        }
    }

    fn lexical_detector() -> Detector {
        Detector::new(DetectorBackend::lexical_only(
            DetectorSettings::default(),
            BackendOrigin::Fresh,
        ))
    }

    #[test]
    fn test_lexical_only_fallback_formula() {
        let detector = lexical_detector();
        let verdict = detector.predict("Plain title", "plain body text");
        assert_eq!(verdict.breakdown.suspicion_patterns, 0.0);
        assert_eq!(verdict.breakdown.pipeline_score, 0.5);
        assert!(verdict.breakdown.bert_features.is_none());
        assert!((verdict.fake_probability - 0.2).abs() < 1e-12);
        assert_eq!(verdict.prediction, Prediction::Real);
        assert!(verdict.method.starts_with("Fallback Analysis"));
    }

    #[test]
    fn test_enhanced_branch_uses_diversity() {
        let backend = DetectorBackend::new(
            Some(Arc::new(RepeatingTokenizer)),
            None,
            DetectorSettings::default(),
            BackendOrigin::Fresh,
        );
        let verdict = Detector::new(backend).predict("Plain title", "plain body text");
        let features = verdict.breakdown.bert_features.expect("features present");
        assert_eq!(features.text_length, 4);
        assert!((features.token_diversity - 0.5).abs() < 1e-12);
        // 0 * 0.4 + 0.5 * 0.4 + (1 - 0.5) * 0.2
        assert!((verdict.fake_probability - 0.3).abs() < 1e-12);
        assert!(verdict.method.starts_with("Enhanced Analysis"));
    }

    #[test]
    fn test_panic_becomes_error_verdict() {
        let backend = DetectorBackend::new(
            None,
            Some(Arc::new(PanickingClassifier)),
            DetectorSettings::default(),
            BackendOrigin::Fresh,
        );
        let verdict = Detector::new(backend).predict("title", "content");
        assert_eq!(verdict.prediction, Prediction::Error);
        assert_eq!(verdict.fake_probability, 0.5);
        assert!(verdict
            .error
            .as_deref()
            .unwrap()
            .contains("model state corrupted"));
    }

    #[test]
    fn test_origin_display() {
        assert_eq!(BackendOrigin::Fresh.to_string(), "fresh");
        assert_eq!(BackendOrigin::Fallback.to_string(), "lexical fallback");
        let persisted =
            BackendOrigin::Persisted(PathBuf::from("/models/fake_news_detector_20240101_000000.bundle"));
        assert_eq!(
            persisted.to_string(),
            "persisted fake_news_detector_20240101_000000.bundle"
        );
    }

    #[test]
    fn test_describe_lexical_only() {
        let detector = lexical_detector();
        assert!(!detector.backend().has_tokenizer());
        assert!(!detector.backend().has_classifier());
        assert_eq!(
            detector.backend().describe(),
            "fresh backend (tokenizer: none, classifier: none)"
        );
    }
}
