// Local model capabilities: a HuggingFace tokenizer and an ONNX text classifier.
//
// Both run entirely on the local CPU. The tokenizer feeds token-diversity
// features; the classifier (a DistilBERT toxic-comment model exported to
// ONNX) feeds the classifier signal.
//
// Files are produced by `skeptic download-model` or shipped inside a
// persisted backend bundle.

use std::path::Path;
use std::sync::Mutex;

use anyhow::{Context, Result};
use ort::session::Session;
use ort::value::Tensor;
use tokenizers::{Encoding, PaddingDirection, PostProcessor, Tokenizer, TruncationDirection};
use tracing::debug;

use super::traits::{Classification, TextClassifier, TextTokenizer, TokenizedText};

/// Token-level context size of the classifier model.
const CLASSIFIER_MAX_TOKENS: usize = 512;

/// HuggingFace `tokenizer.json` wrapper producing fixed-length ids + mask.
pub struct HfTokenizer {
    tokenizer: Tokenizer,
    pad_id: u32,
    pad_token: String,
}

impl HfTokenizer {
    /// Load a `tokenizer.json` file.
    pub fn load(tokenizer_path: &Path) -> Result<Self> {
        if !tokenizer_path.exists() {
            anyhow::bail!(
                "Tokenizer file not found: {}\nRun `skeptic download-model` to download it.",
                tokenizer_path.display()
            );
        }

        let tokenizer = Tokenizer::from_file(tokenizer_path)
            .map_err(|e| anyhow::anyhow!("Failed to load tokenizer: {}", e))?;

        debug!("Loaded tokenizer from {}", tokenizer_path.display());

        Ok(Self::from_tokenizer(tokenizer))
    }

    fn from_tokenizer(tokenizer: Tokenizer) -> Self {
        let pad_token = "[PAD]".to_string();
        let pad_id = tokenizer.token_to_id(&pad_token).unwrap_or(0);
        Self {
            tokenizer,
            pad_id,
            pad_token,
        }
    }
}

/// Encode `text` so it fits in `max_length` tokens, special tokens included.
///
/// The content is cut before `[CLS]`/`[SEP]` are added, so the closing
/// separator survives truncation.
fn encode_truncated(tokenizer: &Tokenizer, text: &str, max_length: usize) -> Result<Encoding> {
    let mut encoding = tokenizer
        .encode(text, false)
        .map_err(|e| anyhow::anyhow!("Tokenization failed: {}", e))?;

    let specials = tokenizer
        .get_post_processor()
        .map_or(0, |pp| pp.added_tokens(false));
    let budget = max_length.saturating_sub(specials);
    if encoding.len() > budget {
        encoding.truncate(budget, 0, TruncationDirection::Right);
    }

    let mut encoding = tokenizer
        .post_process(encoding, None, true)
        .map_err(|e| anyhow::anyhow!("Tokenization failed: {}", e))?;
    // Only reachable when max_length cannot hold the special tokens themselves
    if encoding.len() > max_length {
        encoding.truncate(max_length, 0, TruncationDirection::Right);
    }
    Ok(encoding)
}

impl TextTokenizer for HfTokenizer {
    fn tokenize(&self, text: &str, max_length: usize) -> Result<Option<TokenizedText>> {
        let mut encoding = encode_truncated(&self.tokenizer, text, max_length)?;

        if encoding.len() < max_length {
            encoding.pad(
                max_length,
                self.pad_id,
                0,
                &self.pad_token,
                PaddingDirection::Right,
            );
        }

        Ok(Some(TokenizedText {
            token_ids: encoding.get_ids().to_vec(),
            attention_mask: encoding.get_attention_mask().to_vec(),
        }))
    }

    fn name(&self) -> &str {
        "hf-tokenizer"
    }
}

/// Local ONNX sequence classifier returning the top label and its softmax score.
pub struct OnnxClassifier {
    // ort::Session::run takes &mut self, so concurrent callers take turns.
    session: Mutex<Session>,
    tokenizer: Tokenizer,
    labels: Vec<String>,
}

impl OnnxClassifier {
    /// Load the classifier from `model.onnx`, `tokenizer.json` and `config.json`.
    pub fn load(model_path: &Path, tokenizer_path: &Path, config_path: &Path) -> Result<Self> {
        for (what, path) in [
            ("Classifier model", model_path),
            ("Classifier tokenizer", tokenizer_path),
            ("Classifier config", config_path),
        ] {
            if !path.exists() {
                anyhow::bail!(
                    "{what} not found: {}\nRun `skeptic download-model` to download it.",
                    path.display()
                );
            }
        }

        let session = Session::builder()
            .context("Failed to create ONNX session builder")?
            .commit_from_file(model_path)
            .with_context(|| format!("Failed to load ONNX model from {}", model_path.display()))?;

        let tokenizer = Tokenizer::from_file(tokenizer_path)
            .map_err(|e| anyhow::anyhow!("Failed to load classifier tokenizer: {}", e))?;

        let config_json = std::fs::read_to_string(config_path)
            .with_context(|| format!("Failed to read {}", config_path.display()))?;
        let labels = parse_id2label(&config_json)?;

        debug!(
            labels = ?labels,
            "Loaded ONNX classifier from {}",
            model_path.display()
        );

        Ok(Self {
            session: Mutex::new(session),
            tokenizer,
            labels,
        })
    }
}

impl TextClassifier for OnnxClassifier {
    fn classify(&self, text: &str) -> Result<Classification> {
        let encoding = encode_truncated(&self.tokenizer, text, CLASSIFIER_MAX_TOKENS)?;

        let seq_len = encoding.len();
        let input_ids: Vec<i64> = encoding.get_ids().iter().map(|&id| id as i64).collect();
        let attention_mask: Vec<i64> = encoding
            .get_attention_mask()
            .iter()
            .map(|&m| m as i64)
            .collect();
        let shape = [1_i64, seq_len as i64];

        let input_ids_tensor = Tensor::from_array((shape, input_ids))
            .context("Failed to create input_ids tensor")?;
        let attention_mask_tensor = Tensor::from_array((shape, attention_mask))
            .context("Failed to create attention_mask tensor")?;

        let logits = {
            let mut session = self
                .session
                .lock()
                .map_err(|e| anyhow::anyhow!("Session lock poisoned: {}", e))?;

            let outputs = session
                .run(ort::inputs! {
                    "input_ids" => input_ids_tensor,
                    "attention_mask" => attention_mask_tensor
                })
                .context("ONNX inference failed")?;

            // Output shape: [1, num_labels]
            let (_shape, data) = outputs[0]
                .try_extract_tensor::<f32>()
                .context("Failed to extract output tensor")?;

            data.iter().map(|&x| x as f64).collect::<Vec<f64>>()
        };

        top_label(&logits, &self.labels)
    }

    fn name(&self) -> &str {
        "onnx-classifier"
    }
}

/// Read `id2label` from a HuggingFace `config.json`, ordered by class index.
fn parse_id2label(config_json: &str) -> Result<Vec<String>> {
    let config: serde_json::Value =
        serde_json::from_str(config_json).context("Classifier config is not valid JSON")?;
    let map = config
        .get("id2label")
        .and_then(|v| v.as_object())
        .context("Classifier config has no id2label map")?;

    let mut entries: Vec<(usize, String)> = map
        .iter()
        .map(|(k, v)| {
            let idx: usize = k
                .parse()
                .with_context(|| format!("Invalid id2label index: {k}"))?;
            let label = v
                .as_str()
                .with_context(|| format!("id2label[{k}] is not a string"))?;
            Ok((idx, label.to_string()))
        })
        .collect::<Result<_>>()?;
    entries.sort_by_key(|(idx, _)| *idx);

    if entries.is_empty() {
        anyhow::bail!("Classifier config has an empty id2label map");
    }
    Ok(entries.into_iter().map(|(_, label)| label).collect())
}

/// Softmax over logits and pick the argmax label.
fn top_label(logits: &[f64], labels: &[String]) -> Result<Classification> {
    if logits.len() != labels.len() {
        anyhow::bail!(
            "Classifier returned {} logits for {} labels",
            logits.len(),
            labels.len()
        );
    }

    let probs = softmax(logits);
    let (best, score) = probs
        .iter()
        .copied()
        .enumerate()
        .fold((0, f64::NEG_INFINITY), |acc, (i, p)| if p > acc.1 { (i, p) } else { acc });

    Ok(Classification {
        label: labels[best].clone(),
        score,
    })
}

fn softmax(logits: &[f64]) -> Vec<f64> {
    let max = logits.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let exps: Vec<f64> = logits.iter().map(|&x| (x - max).exp()).collect();
    let sum: f64 = exps.iter().sum();
    exps.into_iter().map(|e| e / sum).collect()
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use super::*;

    const WORD_LEVEL_TOKENIZER: &str = r#"{
        "version": "1.0",
        "truncation": null,
        "padding": null,
        "added_tokens": [],
        "normalizer": null,
        "pre_tokenizer": {"type": "Whitespace"},
        "post_processor": {"type": "BertProcessing", "sep": ["[SEP]", 102], "cls": ["[CLS]", 101]},
        "decoder": null,
        "model": {
            "type": "WordLevel",
            "vocab": {"[PAD]": 0, "a": 1, "b": 2, "c": 3, "d": 4, "e": 5, "[UNK]": 100, "[CLS]": 101, "[SEP]": 102},
            "unk_token": "[UNK]"
        }
    }"#;

    fn word_level() -> HfTokenizer {
        HfTokenizer::from_tokenizer(Tokenizer::from_str(WORD_LEVEL_TOKENIZER).unwrap())
    }

    #[test]
    fn test_truncation_keeps_closing_separator() {
        let tokenized = word_level().tokenize("a b c d e", 4).unwrap().unwrap();
        assert_eq!(tokenized.token_ids, vec![101, 1, 2, 102]);
        assert_eq!(tokenized.attention_mask, vec![1, 1, 1, 1]);
    }

    #[test]
    fn test_short_text_is_padded() {
        let tokenized = word_level().tokenize("a b c", 7).unwrap().unwrap();
        assert_eq!(tokenized.token_ids, vec![101, 1, 2, 3, 102, 0, 0]);
        assert_eq!(tokenized.attention_mask, vec![1, 1, 1, 1, 1, 0, 0]);
    }

    #[test]
    fn test_softmax_sums_to_one() {
        let probs = softmax(&[1.0, 2.0, 3.0]);
        let sum: f64 = probs.iter().sum();
        assert!((sum - 1.0).abs() < 1e-12);
        assert!(probs[2] > probs[1] && probs[1] > probs[0]);
    }

    #[test]
    fn test_softmax_is_stable_for_large_logits() {
        let probs = softmax(&[1000.0, 1000.0]);
        assert!((probs[0] - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_parse_id2label_orders_by_index() {
        let json = r#"{"id2label": {"1": "toxic", "0": "non-toxic"}}"#;
        assert_eq!(parse_id2label(json).unwrap(), vec!["non-toxic", "toxic"]);
    }

    #[test]
    fn test_parse_id2label_missing() {
        assert!(parse_id2label(r#"{"architectures": []}"#).is_err());
    }

    #[test]
    fn test_top_label_picks_argmax() {
        let labels = vec!["non-toxic".to_string(), "toxic".to_string()];
        let result = top_label(&[-2.0, 2.0], &labels).unwrap();
        assert_eq!(result.label, "toxic");
        assert!(result.score > 0.98);
    }

    #[test]
    fn test_top_label_rejects_shape_mismatch() {
        let labels = vec!["only".to_string()];
        assert!(top_label(&[0.1, 0.2], &labels).is_err());
    }

    #[test]
    fn test_missing_tokenizer_file() {
        let path = std::env::temp_dir().join("skeptic-test-nonexistent/tokenizer.json");
        assert!(HfTokenizer::load(&path).is_err());
    }
}
