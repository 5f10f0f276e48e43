// System status display: store totals, model files, persisted bundles.

use anyhow::Result;
use std::path::Path;
use std::sync::Arc;

use colored::Colorize;

use crate::db::Database;
use crate::detector::artifact;
use crate::signals::download;

/// Display system status to the terminal.
pub async fn show(
    db: &Arc<dyn Database>,
    db_display: &str,
    model_dir: &Path,
    artifact_dir: &Path,
) -> Result<()> {
    // File size only makes sense for a local SQLite file
    let size = std::fs::metadata(db_display)
        .map(|m| format!(" ({})", format_bytes(m.len())))
        .unwrap_or_default();
    println!("Database: {db_display}{size} [{}]", db.backend_name());

    let stats = db.get_stats().await?;
    println!(
        "Analyses: {} total, {} fake, {} real",
        stats.total_analyses, stats.fake_detected, stats.real_detected
    );

    println!("\nModel directory: {}", model_dir.display());
    println!(
        "  Feature tokenizer: {}",
        present(download::tokenizer_files_present(model_dir))
    );
    println!(
        "  Classifier:        {}",
        present(download::classifier_files_present(model_dir))
    );
    if !download::tokenizer_files_present(model_dir)
        || !download::classifier_files_present(model_dir)
    {
        println!("  Run `skeptic download-model` to fetch missing files");
    }

    println!("\nBundle directory: {}", artifact_dir.display());
    let bundles = artifact::list_bundles(artifact_dir);
    match bundles.first() {
        Some(newest) => {
            let name = newest
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            println!("  {} bundle(s), newest: {name}", bundles.len());
            match artifact::read_manifest(newest) {
                Ok(manifest) => println!(
                    "  exported on {:?}, tokenizer: {}, classifier: {}",
                    manifest.exported_on,
                    present(manifest.tokenizer.is_some()),
                    present(manifest.classifier.is_some()),
                ),
                Err(e) => println!("  {} {e:#}", "unreadable:".red()),
            }
        }
        None => {
            println!("  No bundles. Run `skeptic export` after downloading models");
        }
    }

    Ok(())
}

fn present(yes: bool) -> colored::ColoredString {
    if yes {
        "present".green()
    } else {
        "missing".yellow()
    }
}

fn format_bytes(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{} B", bytes)
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    }
}
