// Colored terminal output for verdicts, analysis history and totals.
//
// main.rs and the batch pipeline delegate all terminal formatting here.

use colored::Colorize;

use crate::db::models::{AnalysisRecord, SystemStats};
use crate::detector::{Prediction, Verdict};

/// Display a single verdict with its signal breakdown.
pub fn display_verdict(title: &str, verdict: &Verdict) {
    println!("\n{}", format!("=== {} ===", super::truncate_chars(title, 60)).bold());

    if let Some(err) = &verdict.error {
        println!("  {} {}", "Analysis failed:".red().bold(), err);
        return;
    }

    println!(
        "  Prediction:  {}  ({:.0}% confidence)",
        colorize_prediction(verdict.prediction),
        verdict.confidence * 100.0
    );
    println!(
        "  Fake: {:.3}   Real: {:.3}",
        verdict.fake_probability, verdict.real_probability
    );
    println!("  {}", verdict.method.dimmed());

    println!("\n  Signals:");
    println!(
        "    Suspicious phrasing: {:.3}",
        verdict.breakdown.suspicion_patterns
    );
    println!(
        "    Classifier signal:   {:.3}",
        verdict.breakdown.pipeline_score
    );
    match verdict.breakdown.bert_features {
        Some(features) => println!(
            "    Token diversity:     {:.3} ({} tokens)",
            features.token_diversity, features.text_length
        ),
        None => println!("    Token diversity:     {}", "unavailable".dimmed()),
    }
    println!();
}

/// Display one page of past analyses.
pub fn display_history(records: &[AnalysisRecord], page: u32, pages: u32, total: i64) {
    if records.is_empty() {
        println!("No analyses recorded yet. Run `skeptic analyze` first.");
        return;
    }

    println!(
        "\n{}",
        format!("=== Analysis History (page {page} of {pages}, {total} total) ===").bold()
    );
    println!();
    println!(
        "  {:>5}  {:<19}  {:<6}  {:>6}  {}",
        "ID".dimmed(),
        "When".dimmed(),
        "Label".dimmed(),
        "Fake".dimmed(),
        "Title".dimmed(),
    );
    println!("  {}", "-".repeat(78).dimmed());

    for record in records {
        println!(
            "  {:>5}  {:<19}  {:<6}  {:>6.3}  {}",
            record.id,
            record.created_at,
            colorize_prediction(Prediction::from_label(&record.prediction)),
            record.fake_probability,
            super::truncate_chars(&record.title, 40),
        );
    }
    println!();
}

/// Display running totals.
pub fn display_stats(stats: &SystemStats) {
    println!("\n{}", "=== Detection Totals ===".bold());
    println!("  Total analyses: {}", stats.total_analyses);
    println!(
        "  Fake detected:  {} ({:.1}%)",
        stats.fake_detected.to_string().red(),
        stats.fake_percentage
    );
    println!(
        "  Real detected:  {} ({:.1}%)",
        stats.real_detected.to_string().green(),
        stats.real_percentage
    );
    match &stats.last_updated {
        Some(at) => println!("  Last updated:   {at}"),
        None => println!("  Last updated:   {}", "never".dimmed()),
    }
    println!();
}

fn colorize_prediction(prediction: Prediction) -> colored::ColoredString {
    match prediction {
        Prediction::Fake => "Fake".red().bold(),
        Prediction::Real => "Real".green().bold(),
        Prediction::Error => "Error".yellow(),
    }
}
