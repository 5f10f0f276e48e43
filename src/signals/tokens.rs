// Token feature extraction: diversity and length of the tokenized text.
//
// Low token diversity (the same few tokens repeated) is treated as a proxy
// for boilerplate, sensationalist phrasing. Padding positions are excluded
// via the attention mask.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use tracing::warn;

use super::traits::{TextTokenizer, TokenizedText};

/// Separator placed between title and content before tokenizing.
pub const TITLE_SEPARATOR: &str = " [SEP] ";

/// Default tokenizer max length (BERT-family context size).
pub const DEFAULT_MAX_LENGTH: usize = 512;

/// Features derived from a tokenized (title, content) pair.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TokenFeatures {
    /// Distinct active token ids / active token ids, 0.0 to 1.0
    pub token_diversity: f64,
    /// Number of active (non-padding) tokens
    pub text_length: usize,
}

impl TokenFeatures {
    /// Compute features from ids and mask. Positions with mask 0 are ignored.
    pub fn from_tokenized(tokens: &TokenizedText) -> Self {
        let active: Vec<u32> = tokens
            .token_ids
            .iter()
            .zip(&tokens.attention_mask)
            .filter(|(_, &mask)| mask == 1)
            .map(|(&id, _)| id)
            .collect();

        let text_length = active.len();
        let token_diversity = if text_length == 0 {
            0.0
        } else {
            let unique: HashSet<u32> = active.iter().copied().collect();
            unique.len() as f64 / text_length as f64
        };

        Self {
            token_diversity,
            text_length,
        }
    }
}

/// Tokenize `title [SEP] content` and derive features.
///
/// Returns `None` when the tokenizer is unavailable, fails on this input, or
/// returns mismatched arrays. None of these are fatal to the verdict.
pub fn extract(
    tokenizer: &dyn TextTokenizer,
    title: &str,
    content: &str,
    max_length: usize,
) -> Option<TokenFeatures> {
    let combined = format!("{title}{TITLE_SEPARATOR}{content}");

    match tokenizer.tokenize(&combined, max_length) {
        Ok(Some(tokens)) => {
            if tokens.token_ids.len() != tokens.attention_mask.len() {
                warn!(
                    tokenizer = tokenizer.name(),
                    ids = tokens.token_ids.len(),
                    mask = tokens.attention_mask.len(),
                    "Tokenizer returned mismatched ids and mask, skipping token features"
                );
                return None;
            }
            Some(TokenFeatures::from_tokenized(&tokens))
        }
        Ok(None) => None,
        Err(e) => {
            warn!(tokenizer = tokenizer.name(), error = %e, "Tokenization failed, skipping token features");
            None
        }
    }
}
