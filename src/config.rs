use std::env;
use std::path::PathBuf;

use anyhow::{Context, Result};

use crate::detector::DetectorSettings;
use crate::input::InputLimits;
use crate::signals::classifier::DEFAULT_NEGATIVE_LABEL;
use crate::signals::lexical::LexicalScorer;
use crate::signals::tokens::DEFAULT_MAX_LENGTH;

/// Central configuration loaded from environment variables.
///
/// The .env file is loaded automatically at startup via dotenvy.
#[derive(Debug, Clone)]
pub struct Config {
    pub db_path: String,
    /// PostgreSQL connection URL (when set and starts with postgres://, uses Postgres backend)
    pub database_url: Option<String>,
    /// Directory holding downloaded tokenizer/classifier files
    pub model_dir: PathBuf,
    /// Directory scanned for persisted detector bundles
    pub artifact_dir: PathBuf,
    /// Optional newline-separated suspicious phrase list
    pub patterns_file: Option<PathBuf>,
    pub max_length: usize,
    pub negative_label: String,
    pub limits: InputLimits,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// Everything has a default; only malformed values are errors.
    pub fn load() -> Result<Self> {
        let model_dir = env::var("SKEPTIC_MODEL_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| crate::signals::download::default_model_dir());

        let max_length = parse_usize("SKEPTIC_MAX_LENGTH", DEFAULT_MAX_LENGTH)?;
        if max_length == 0 {
            anyhow::bail!("SKEPTIC_MAX_LENGTH must be positive");
        }

        let defaults = InputLimits::default();
        let limits = InputLimits {
            max_title_chars: parse_usize("SKEPTIC_MAX_TITLE_CHARS", defaults.max_title_chars)?,
            max_content_chars: parse_usize(
                "SKEPTIC_MAX_CONTENT_CHARS",
                defaults.max_content_chars,
            )?,
        };

        Ok(Self {
            db_path: env::var("SKEPTIC_DB_PATH").unwrap_or_else(|_| "./skeptic.db".to_string()),
            database_url: env::var("DATABASE_URL").ok(),
            model_dir,
            artifact_dir: env::var("SKEPTIC_ARTIFACT_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("./models")),
            patterns_file: env::var("SKEPTIC_PATTERNS_FILE").ok().map(PathBuf::from),
            max_length,
            negative_label: env::var("SKEPTIC_NEGATIVE_LABEL")
                .unwrap_or_else(|_| DEFAULT_NEGATIVE_LABEL.to_string()),
            limits,
        })
    }

    /// Build detector settings, reading the phrase file if one is configured.
    pub fn detector_settings(&self) -> Result<DetectorSettings> {
        let lexical = match &self.patterns_file {
            Some(path) => {
                let text = std::fs::read_to_string(path).with_context(|| {
                    format!("Failed to read SKEPTIC_PATTERNS_FILE {}", path.display())
                })?;
                let scorer = LexicalScorer::new(parse_patterns(&text));
                if scorer.patterns().is_empty() {
                    anyhow::bail!("Pattern file {} contains no phrases", path.display());
                }
                scorer
            }
            None => LexicalScorer::default(),
        };

        Ok(DetectorSettings {
            lexical,
            max_length: self.max_length,
            negative_label: self.negative_label.clone(),
            ..DetectorSettings::default()
        })
    }

    /// True when DATABASE_URL selects the PostgreSQL backend.
    pub fn uses_postgres(&self) -> bool {
        self.database_url
            .as_deref()
            .is_some_and(|url| url.starts_with("postgres://") || url.starts_with("postgresql://"))
    }
}

/// One phrase per line; blank lines and `#` comments are skipped.
pub fn parse_patterns(text: &str) -> Vec<String> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_string)
        .collect()
}

fn parse_usize(var: &str, default: usize) -> Result<usize> {
    match env::var(var) {
        Ok(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("{var} must be a non-negative integer, got {raw:?}")),
        Err(_) => Ok(default),
    }
}
