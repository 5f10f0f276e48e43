// Capability traits: the seams between the fusion engine and the models.
//
// The engine never talks to ONNX Runtime or the tokenizers crate directly.
// It holds one implementation of each trait, and when a real model could not
// be acquired it holds the null object instead: NullTokenizer reports
// "absent" and NeutralClassifier answers NEUTRAL/0.5. The fusion logic then
// needs a single Option check and nothing else.
//
// Implementations must be safe for concurrent read-only use; the detector
// is shared across request handlers behind an Arc.

use anyhow::Result;

/// Token ids and attention mask for one input, always the same length.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenizedText {
    pub token_ids: Vec<u32>,
    pub attention_mask: Vec<u32>,
}

/// Top label and its score from a text classifier.
#[derive(Debug, Clone, PartialEq)]
pub struct Classification {
    pub label: String,
    /// 0.0 to 1.0
    pub score: f64,
}

/// Tokenize text into ids plus an attention mask, padded/truncated to `max_length`.
pub trait TextTokenizer: Send + Sync {
    /// `Ok(None)` means the capability is not available at all.
    fn tokenize(&self, text: &str, max_length: usize) -> Result<Option<TokenizedText>>;

    /// Short identifier for logs and the verdict's `method` string.
    fn name(&self) -> &str;

    fn is_available(&self) -> bool {
        true
    }
}

/// Classify text into a single top label with a score.
pub trait TextClassifier: Send + Sync {
    fn classify(&self, text: &str) -> Result<Classification>;

    fn name(&self) -> &str;

    fn is_available(&self) -> bool {
        true
    }
}

/// Tokenizer stand-in used when no tokenizer could be acquired.
pub struct NullTokenizer;

impl TextTokenizer for NullTokenizer {
    fn tokenize(&self, _text: &str, _max_length: usize) -> Result<Option<TokenizedText>> {
        Ok(None)
    }

    fn name(&self) -> &str {
        "none"
    }

    fn is_available(&self) -> bool {
        false
    }
}

/// Classifier stand-in: always neutral.
pub struct NeutralClassifier;

/// Label returned by [`NeutralClassifier`].
pub const NEUTRAL_LABEL: &str = "NEUTRAL";

impl TextClassifier for NeutralClassifier {
    fn classify(&self, _text: &str) -> Result<Classification> {
        Ok(Classification {
            label: NEUTRAL_LABEL.to_string(),
            score: 0.5,
        })
    }

    fn name(&self) -> &str {
        "none"
    }

    fn is_available(&self) -> bool {
        false
    }
}
