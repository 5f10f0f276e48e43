// Boundary validation for analysis requests.
//
// The detector assumes both fields are present and non-blank; every entry
// point (CLI, batch file, HTTP) builds an AnalysisInput first.

use anyhow::Result;
use serde::{Deserialize, Serialize};

/// Length caps applied at the boundary, in characters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InputLimits {
    pub max_title_chars: usize,
    pub max_content_chars: usize,
}

impl Default for InputLimits {
    fn default() -> Self {
        Self {
            max_title_chars: 200,
            max_content_chars: 10_000,
        }
    }
}

/// A validated (title, content) pair, both trimmed and non-empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisInput {
    pub title: String,
    pub content: String,
}

impl AnalysisInput {
    pub fn new(title: &str, content: &str, limits: &InputLimits) -> Result<Self> {
        let title = title.trim();
        let content = content.trim();

        if title.is_empty() || content.is_empty() {
            anyhow::bail!("Both title and content are required");
        }
        let title_chars = title.chars().count();
        if title_chars > limits.max_title_chars {
            anyhow::bail!(
                "Title is too long ({title_chars} characters, max {})",
                limits.max_title_chars
            );
        }
        let content_chars = content.chars().count();
        if content_chars > limits.max_content_chars {
            anyhow::bail!(
                "Content is too long ({content_chars} characters, max {})",
                limits.max_content_chars
            );
        }

        Ok(Self {
            title: title.to_string(),
            content: content.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trims_fields() {
        let input = AnalysisInput::new("  Title ", "\tBody\n", &InputLimits::default()).unwrap();
        assert_eq!(input.title, "Title");
        assert_eq!(input.content, "Body");
    }

    #[test]
    fn test_rejects_blank_content() {
        let err = AnalysisInput::new("A real title", "   ", &InputLimits::default()).unwrap_err();
        assert_eq!(err.to_string(), "Both title and content are required");
    }

    #[test]
    fn test_rejects_blank_title() {
        assert!(AnalysisInput::new("", "content", &InputLimits::default()).is_err());
    }

    #[test]
    fn test_length_caps_count_characters() {
        let limits = InputLimits {
            max_title_chars: 3,
            max_content_chars: 5,
        };
        assert!(AnalysisInput::new("ééé", "ééééé", &limits).is_ok());
        assert!(AnalysisInput::new("éééé", "ééééé", &limits).is_err());
        assert!(AnalysisInput::new("ééé", "éééééé", &limits).is_err());
    }
}
