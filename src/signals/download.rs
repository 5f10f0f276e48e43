// Model download helper.
//
// Downloads two sets of files from HuggingFace:
// 1. distilbert-base-uncased tokenizer: token diversity features
// 2. martin-ha/toxic-comment-model (ONNX export): classifier signal
//
// Files are stored in a platform-appropriate directory
// (~/.local/share/skeptic/models/ on Linux) so they persist across runs.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;

/// HuggingFace repo for the feature tokenizer.
const TOKENIZER_HF_URL: &str = "https://huggingface.co/distilbert-base-uncased/resolve/main";

/// HuggingFace repo for the text classifier.
const CLASSIFIER_HF_URL: &str =
    "https://huggingface.co/martin-ha/toxic-comment-model/resolve/main";

pub const TOKENIZER_FILE: &str = "tokenizer.json";
pub const CLASSIFIER_MODEL_FILE: &str = "model.onnx";
pub const CLASSIFIER_CONFIG_FILE: &str = "config.json";

/// Remote path of the ONNX export inside the classifier repo.
const CLASSIFIER_REMOTE_MODEL: &str = "onnx/model.onnx";

/// Returns the default directory for storing model files.
/// Uses the platform data directory: ~/.local/share/skeptic/models/ on Linux.
pub fn default_model_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("skeptic")
        .join("models")
}

/// Subdirectory holding the feature tokenizer.
pub fn tokenizer_dir(base: &Path) -> PathBuf {
    base.join("tokenizer")
}

/// Subdirectory holding the classifier model, tokenizer and config.
pub fn classifier_dir(base: &Path) -> PathBuf {
    base.join("classifier")
}

/// Check whether the feature tokenizer file exists.
pub fn tokenizer_files_present(base: &Path) -> bool {
    tokenizer_dir(base).join(TOKENIZER_FILE).exists()
}

/// Check whether all three classifier files exist.
pub fn classifier_files_present(base: &Path) -> bool {
    let dir = classifier_dir(base);
    dir.join(CLASSIFIER_MODEL_FILE).exists()
        && dir.join(TOKENIZER_FILE).exists()
        && dir.join(CLASSIFIER_CONFIG_FILE).exists()
}

/// Download the tokenizer and classifier files.
///
/// Shows progress bars for large files. Skips files that already exist.
/// Creates directories as needed.
pub async fn download_model(dir: &Path) -> Result<()> {
    // --- Feature tokenizer (distilbert-base-uncased) ---
    println!("\nFeature tokenizer (distilbert-base-uncased):");

    let tok_dir = tokenizer_dir(dir);
    std::fs::create_dir_all(&tok_dir)
        .with_context(|| format!("Failed to create tokenizer directory: {}", tok_dir.display()))?;
    fetch_if_missing(
        &format!("{}/{}", TOKENIZER_HF_URL, TOKENIZER_FILE),
        &tok_dir.join(TOKENIZER_FILE),
        TOKENIZER_FILE,
        false,
    )
    .await?;

    // --- Classifier (toxic-comment-model) ---
    println!("\nClassifier (toxic-comment-model):");

    let clf_dir = classifier_dir(dir);
    std::fs::create_dir_all(&clf_dir).with_context(|| {
        format!("Failed to create classifier directory: {}", clf_dir.display())
    })?;

    fetch_if_missing(
        &format!("{}/{}", CLASSIFIER_HF_URL, TOKENIZER_FILE),
        &clf_dir.join(TOKENIZER_FILE),
        TOKENIZER_FILE,
        false,
    )
    .await?;
    fetch_if_missing(
        &format!("{}/{}", CLASSIFIER_HF_URL, CLASSIFIER_CONFIG_FILE),
        &clf_dir.join(CLASSIFIER_CONFIG_FILE),
        CLASSIFIER_CONFIG_FILE,
        false,
    )
    .await?;
    fetch_if_missing(
        &format!("{}/{}", CLASSIFIER_HF_URL, CLASSIFIER_REMOTE_MODEL),
        &clf_dir.join(CLASSIFIER_MODEL_FILE),
        "model.onnx (~260 MB)",
        true,
    )
    .await?;

    Ok(())
}

async fn fetch_if_missing(url: &str, dest: &Path, label: &str, show_progress: bool) -> Result<()> {
    if dest.exists() {
        info!(path = %dest.display(), "File already exists, skipping");
        println!("  {} (already exists)", label);
        return Ok(());
    }
    println!("  Downloading {}...", label);
    download_file(url, dest, show_progress).await
}

/// Download a single file from a URL to a local path.
/// If `show_progress` is true, display a progress bar.
async fn download_file(url: &str, dest: &Path, show_progress: bool) -> Result<()> {
    let client = reqwest::Client::new();
    let mut response = client
        .get(url)
        .send()
        .await
        .with_context(|| format!("Failed to download {}", url))?;

    if !response.status().is_success() {
        anyhow::bail!("Download failed with status {}: {}", response.status(), url);
    }

    let total_size = response.content_length();

    let pb = if show_progress {
        let pb = match total_size {
            Some(size) => {
                let pb = ProgressBar::new(size);
                pb.set_style(
                    ProgressStyle::default_bar()
                        .template("    [{bar:40.cyan/blue}] {bytes}/{total_bytes} ({eta})")?
                        .progress_chars("=> "),
                );
                pb
            }
            None => {
                let pb = ProgressBar::new_spinner();
                pb.set_style(
                    ProgressStyle::default_spinner()
                        .template("    {spinner} {bytes}")?,
                );
                pb
            }
        };
        Some(pb)
    } else {
        None
    };

    // Stream chunks so the bar moves during large downloads
    let mut bytes: Vec<u8> = Vec::with_capacity(total_size.unwrap_or(0) as usize);
    while let Some(chunk) = response
        .chunk()
        .await
        .context("Failed to read response body")?
    {
        bytes.extend_from_slice(&chunk);
        if let Some(ref pb) = pb {
            pb.set_position(bytes.len() as u64);
        }
    }

    // Write to a temp name first so an interrupted download never looks complete
    let partial = dest.with_extension("partial");
    std::fs::write(&partial, &bytes)
        .with_context(|| format!("Failed to write {}", partial.display()))?;
    std::fs::rename(&partial, dest)
        .with_context(|| format!("Failed to move {} into place", dest.display()))?;

    if let Some(pb) = pb {
        pb.finish_and_clear();
    }

    info!("Downloaded {} to {}", url, dest.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_model_dir_is_under_skeptic() {
        let dir = default_model_dir();
        let path_str = dir.to_string_lossy();
        assert!(
            path_str.contains("skeptic") && path_str.contains("models"),
            "Expected path containing skeptic/models, got: {path_str}"
        );
    }

    #[test]
    fn test_subdirectories() {
        let base = PathBuf::from("/tmp/test-models");
        assert_eq!(tokenizer_dir(&base), base.join("tokenizer"));
        assert_eq!(classifier_dir(&base), base.join("classifier"));
    }

    #[test]
    fn test_files_present_false_when_empty() {
        let dir = std::env::temp_dir().join("skeptic-test-nonexistent");
        assert!(!tokenizer_files_present(&dir));
        assert!(!classifier_files_present(&dir));
    }

    #[test]
    fn test_classifier_files_present_true_when_files_exist() {
        let dir = std::env::temp_dir().join("skeptic-classifier-present-test");
        let clf = classifier_dir(&dir);
        std::fs::create_dir_all(&clf).unwrap();
        for file in [CLASSIFIER_MODEL_FILE, TOKENIZER_FILE, CLASSIFIER_CONFIG_FILE] {
            std::fs::write(clf.join(file), b"fake").unwrap();
        }

        assert!(classifier_files_present(&dir));
        assert!(!tokenizer_files_present(&dir));

        std::fs::remove_dir_all(&dir).unwrap();
    }
}
