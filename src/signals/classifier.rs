// Classifier adapter: turns a (label, score) pair into one signal in [0, 1].
//
// Only the negative label counts as evidence: its score is damped by 0.7.
// Any other label, a failed call, or a garbage score yields the neutral 0.5.

use tracing::{debug, warn};

use super::traits::TextClassifier;

/// Neutral signal used whenever the classifier offers no negative evidence.
pub const NEUTRAL_SIGNAL: f64 = 0.5;

/// Damping applied to the negative label's score.
pub const NEGATIVE_SCALE: f64 = 0.7;

/// Characters of combined text passed to the classifier.
pub const CLASSIFIER_INPUT_CHARS: usize = 512;

/// Default label treated as negative.
pub const DEFAULT_NEGATIVE_LABEL: &str = "toxic";

/// Classify the first [`CLASSIFIER_INPUT_CHARS`] characters of `text`.
pub fn classify(classifier: &dyn TextClassifier, text: &str, negative_label: &str) -> f64 {
    let input: String = text.chars().take(CLASSIFIER_INPUT_CHARS).collect();

    match classifier.classify(&input) {
        Ok(result) => {
            if !result.score.is_finite() {
                warn!(
                    classifier = classifier.name(),
                    score = result.score,
                    "Classifier returned a non-finite score, using neutral signal"
                );
                return NEUTRAL_SIGNAL;
            }
            let signal = if result.label.eq_ignore_ascii_case(negative_label) {
                result.score.clamp(0.0, 1.0) * NEGATIVE_SCALE
            } else {
                NEUTRAL_SIGNAL
            };
            debug!(
                classifier = classifier.name(),
                label = %result.label,
                score = result.score,
                signal,
                "Classifier signal"
            );
            signal
        }
        Err(e) => {
            warn!(classifier = classifier.name(), error = %e, "Classifier failed, using neutral signal");
            NEUTRAL_SIGNAL
        }
    }
}
