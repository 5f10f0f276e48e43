// Persisted backend bundles.
//
// A bundle is a directory named `fake_news_detector_YYYYMMDD_HHMMSS.bundle`
// holding a `manifest.json` plus the model files it references. Loading a
// bundle only reads data files: no code in the bundle is ever executed.
// Bundles record the compute target they were exported on; at load time
// everything is placed on the target available in this process (CPU).
//
// The timestamp in the name is the recency key: the lexicographically
// greatest name is the newest bundle.

use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::engine::{BackendOrigin, DetectorBackend, DetectorSettings};
use crate::signals::download::{
    classifier_dir, tokenizer_dir, CLASSIFIER_CONFIG_FILE, CLASSIFIER_MODEL_FILE, TOKENIZER_FILE,
};
use crate::signals::lexical::LexicalScorer;
use crate::signals::onnx::{HfTokenizer, OnnxClassifier};
use crate::signals::traits::{TextClassifier, TextTokenizer};

pub const BUNDLE_PREFIX: &str = "fake_news_detector_";
pub const BUNDLE_SUFFIX: &str = ".bundle";
pub const MANIFEST_FILE: &str = "manifest.json";
pub const FORMAT_VERSION: u32 = 1;

/// Compute target a bundle was exported on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ComputeTarget {
    Cpu,
    Cuda,
    Mps,
    #[serde(other)]
    Other,
}

impl ComputeTarget {
    /// The target models are placed on in this process.
    /// Inference uses ONNX Runtime's default CPU execution provider.
    pub fn current() -> Self {
        ComputeTarget::Cpu
    }
}

/// Files making up a bundled classifier, relative to the bundle root.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassifierFiles {
    pub model: String,
    pub tokenizer: String,
    pub config: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BundleManifest {
    pub format_version: u32,
    pub created_at: DateTime<Utc>,
    #[serde(default = "ComputeTarget::current")]
    pub exported_on: ComputeTarget,
    /// Feature tokenizer file, relative to the bundle root
    #[serde(default)]
    pub tokenizer: Option<String>,
    #[serde(default)]
    pub classifier: Option<ClassifierFiles>,
    /// Overrides the configured phrase vocabulary
    #[serde(default)]
    pub suspicious_patterns: Option<Vec<String>>,
    /// Overrides the configured tokenizer max length
    #[serde(default)]
    pub max_length: Option<usize>,
}

/// Directory name for a bundle exported at `at`.
pub fn bundle_name(at: DateTime<Utc>) -> String {
    format!("{BUNDLE_PREFIX}{}{BUNDLE_SUFFIX}", at.format("%Y%m%d_%H%M%S"))
}

fn is_bundle_name(name: &str) -> bool {
    name.len() > BUNDLE_PREFIX.len() + BUNDLE_SUFFIX.len()
        && name.starts_with(BUNDLE_PREFIX)
        && name.ends_with(BUNDLE_SUFFIX)
}

/// Find the newest bundle in `dir`. A missing or unreadable directory is
/// treated as "no bundles".
pub fn find_latest_bundle(dir: &Path) -> Option<PathBuf> {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            debug!(dir = %dir.display(), error = %e, "Artifact directory not readable");
            return None;
        }
    };

    entries
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.path().is_dir())
        .filter_map(|entry| entry.file_name().into_string().ok())
        .filter(|name| is_bundle_name(name))
        .max()
        .map(|name| dir.join(name))
}

/// List every bundle in `dir`, newest first.
pub fn list_bundles(dir: &Path) -> Vec<PathBuf> {
    let mut names: Vec<String> = std::fs::read_dir(dir)
        .map(|entries| {
            entries
                .filter_map(|entry| entry.ok())
                .filter(|entry| entry.path().is_dir())
                .filter_map(|entry| entry.file_name().into_string().ok())
                .filter(|name| is_bundle_name(name))
                .collect()
        })
        .unwrap_or_default();
    names.sort_unstable_by(|a, b| b.cmp(a));
    names.into_iter().map(|name| dir.join(name)).collect()
}

pub fn read_manifest(bundle: &Path) -> Result<BundleManifest> {
    let path = bundle.join(MANIFEST_FILE);
    let json = std::fs::read_to_string(&path)
        .with_context(|| format!("Failed to read bundle manifest {}", path.display()))?;
    let manifest: BundleManifest = serde_json::from_str(&json)
        .with_context(|| format!("Invalid bundle manifest {}", path.display()))?;

    if manifest.format_version != FORMAT_VERSION {
        anyhow::bail!(
            "Unsupported bundle format version {} in {} (expected {})",
            manifest.format_version,
            path.display(),
            FORMAT_VERSION
        );
    }
    Ok(manifest)
}

/// Resolve a manifest-relative path, refusing anything that leaves the bundle.
fn resolve(bundle: &Path, relative: &str) -> Result<PathBuf> {
    let rel = Path::new(relative);
    if rel.as_os_str().is_empty()
        || rel
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir))
    {
        anyhow::bail!("Bundle path escapes the bundle directory: {relative}");
    }
    Ok(bundle.join(rel))
}

/// Load a bundle into a backend. Any missing or unreadable file fails the
/// whole load; partial bundles are not used.
pub fn load_bundle(bundle: &Path, base: &DetectorSettings) -> Result<DetectorBackend> {
    let manifest = read_manifest(bundle)?;

    let target = ComputeTarget::current();
    if manifest.exported_on != target {
        info!(
            exported_on = ?manifest.exported_on,
            target = ?target,
            "Remapping bundle to the available compute target"
        );
    }

    let tokenizer: Option<Arc<dyn TextTokenizer>> = match &manifest.tokenizer {
        Some(rel) => {
            let path = resolve(bundle, rel)?;
            Some(Arc::new(HfTokenizer::load(&path).with_context(|| {
                format!("Failed to load bundled tokenizer from {}", bundle.display())
            })?))
        }
        None => None,
    };

    let classifier: Option<Arc<dyn TextClassifier>> = match &manifest.classifier {
        Some(files) => {
            let model = resolve(bundle, &files.model)?;
            let tok = resolve(bundle, &files.tokenizer)?;
            let config = resolve(bundle, &files.config)?;
            Some(Arc::new(OnnxClassifier::load(&model, &tok, &config).with_context(|| {
                format!("Failed to load bundled classifier from {}", bundle.display())
            })?))
        }
        None => None,
    };

    let mut settings = base.clone();
    if let Some(patterns) = &manifest.suspicious_patterns {
        settings.lexical = LexicalScorer::new(patterns);
    }
    if let Some(max_length) = manifest.max_length {
        if max_length == 0 {
            anyhow::bail!("Bundle max_length must be positive");
        }
        settings.max_length = max_length;
    }

    Ok(DetectorBackend::new(
        tokenizer,
        classifier,
        settings,
        BackendOrigin::Persisted(bundle.to_path_buf()),
    ))
}

/// Write a new bundle from the downloaded model files.
///
/// Copies whichever capabilities are present in `model_dir` and records the
/// current vocabulary and max length. Returns the bundle path.
pub fn export_bundle(
    artifact_dir: &Path,
    model_dir: &Path,
    settings: &DetectorSettings,
    at: DateTime<Utc>,
) -> Result<PathBuf> {
    let bundle = artifact_dir.join(bundle_name(at));
    if bundle.exists() {
        anyhow::bail!("Bundle already exists: {}", bundle.display());
    }
    std::fs::create_dir_all(&bundle)
        .with_context(|| format!("Failed to create bundle directory {}", bundle.display()))?;

    let src_tokenizer = tokenizer_dir(model_dir).join(TOKENIZER_FILE);
    let tokenizer = if src_tokenizer.exists() {
        copy_into(&src_tokenizer, &bundle, TOKENIZER_FILE)?;
        Some(TOKENIZER_FILE.to_string())
    } else {
        warn!(path = %src_tokenizer.display(), "No feature tokenizer to bundle");
        None
    };

    let src_classifier = classifier_dir(model_dir);
    let classifier_files = [CLASSIFIER_MODEL_FILE, TOKENIZER_FILE, CLASSIFIER_CONFIG_FILE];
    let classifier = if classifier_files
        .iter()
        .all(|f| src_classifier.join(f).exists())
    {
        for file in classifier_files {
            copy_into(&src_classifier.join(file), &bundle, &format!("classifier/{file}"))?;
        }
        Some(ClassifierFiles {
            model: format!("classifier/{CLASSIFIER_MODEL_FILE}"),
            tokenizer: format!("classifier/{TOKENIZER_FILE}"),
            config: format!("classifier/{CLASSIFIER_CONFIG_FILE}"),
        })
    } else {
        warn!(dir = %src_classifier.display(), "No complete classifier to bundle");
        None
    };

    let manifest = BundleManifest {
        format_version: FORMAT_VERSION,
        created_at: at,
        exported_on: ComputeTarget::current(),
        tokenizer,
        classifier,
        suspicious_patterns: Some(settings.lexical.patterns().to_vec()),
        max_length: Some(settings.max_length),
    };
    let json = serde_json::to_string_pretty(&manifest)?;
    std::fs::write(bundle.join(MANIFEST_FILE), json)
        .with_context(|| format!("Failed to write manifest in {}", bundle.display()))?;

    info!(bundle = %bundle.display(), "Exported detector bundle");
    Ok(bundle)
}

fn copy_into(src: &Path, bundle: &Path, relative: &str) -> Result<()> {
    let dest = bundle.join(relative);
    if let Some(parent) = dest.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    std::fs::copy(src, &dest)
        .with_context(|| format!("Failed to copy {} to {}", src.display(), dest.display()))?;
    Ok(())
}
