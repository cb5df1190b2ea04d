// Colored terminal output for verdicts, batches, judges and strategies.
//
// The main.rs command handlers delegate here for anything human-readable.

use colored::Colorize;

use crate::batch::BatchReport;
use crate::engine::registry::{JudgeInfo, JudgeStatus};
use crate::engine::strategy::Strategy;
use crate::engine::Verdict;
use crate::taxonomy::Taxonomy;

/// Display one verdict in detail.
pub fn display_verdict(text: &str, verdict: &Verdict, taxonomy: &Taxonomy) {
    println!(
        "\n{}",
        format!("=== {} ===", super::truncate_chars(text, 60)).bold()
    );

    let label = if verdict.is_toxic {
        "TOXIC".red().bold()
    } else {
        "ok".green()
    };
    println!(
        "  Verdict: {}  score {}  confidence {:.2}",
        label,
        colorize_score(verdict.toxicity_score),
        verdict.confidence
    );
    if let Some(primary) = verdict.primary_category {
        println!(
            "  Primary category: {} ({})",
            primary.to_string().bold(),
            taxonomy.display_name(primary)
        );
    }

    if !verdict.categories.is_empty() {
        println!("\n  Categories:");
        for category in &verdict.categories {
            println!(
                "    {:<16} {}  (confidence {:.2})  {}",
                category.name.as_str(),
                colorize_score(category.score),
                category.confidence,
                taxonomy.display_name(category.name).dimmed()
            );
        }
    }

    println!("\n  Judges ({}):", verdict.strategy);
    let took = |judge: &str| {
        let seconds = verdict.per_judge_seconds.get(judge).copied().unwrap_or(0.0);
        format!("{:.1} ms", seconds * 1000.0).dimmed()
    };
    for judge in &verdict.judges_used {
        let score = verdict.per_judge_scores.get(judge).copied().unwrap_or(0.0);
        println!("    {:<12} {:.2}  {}", judge, score, took(judge.as_str()));
    }
    for failure in &verdict.failures {
        println!(
            "    {:<12} {} {}  {}",
            failure.judge,
            "failed:".yellow(),
            failure.reason.dimmed(),
            took(failure.judge.as_str())
        );
    }

    if let Some(reasoning) = &verdict.reasoning {
        if !reasoning.is_empty() {
            println!("\n  Evidence:");
        }
        for (judge, evidence) in reasoning {
            if !evidence.matched.is_empty() {
                println!("    {:<12} matched: {}", judge, evidence.matched.join(", "));
            }
            if let Some(reason) = &evidence.reasoning {
                println!("    {:<12} {}", judge, super::truncate_chars(reason, 120).dimmed());
            }
        }
    }

    println!(
        "\n  {}",
        format!("{:.1} ms", verdict.processing_time_seconds * 1000.0).dimmed()
    );
}

/// Display a batch as one line per text.
pub fn display_batch(texts: &[String], report: &BatchReport) {
    println!(
        "\n{}",
        format!(
            "=== Batch ({} texts, strategy {}) ===",
            texts.len(),
            report.strategy
        )
        .bold()
    );
    println!();

    println!(
        "  {:>4}  {:>6}  {:<16}  {}",
        "#".dimmed(),
        "Score".dimmed(),
        "Category".dimmed(),
        "Text".dimmed(),
    );
    println!("  {}", "-".repeat(72).dimmed());

    for (i, (text, result)) in texts.iter().zip(&report.results).enumerate() {
        let preview = super::truncate_chars(text, 40);
        match result {
            Ok(verdict) => {
                let category = verdict
                    .primary_category
                    .map(|c| c.as_str())
                    .unwrap_or("-");
                let marker = if verdict.is_toxic { "!".red().bold() } else { " ".normal() };
                println!(
                    "  {:>4}. {} {}  {:<16}  {}",
                    i + 1,
                    marker,
                    colorize_score(verdict.toxicity_score),
                    category,
                    preview
                );
            }
            Err(e) => {
                println!(
                    "  {:>4}.   {}  {:<16}  {}",
                    i + 1,
                    "error".yellow(),
                    e.to_string().dimmed(),
                    preview
                );
            }
        }
    }

    println!();
    println!(
        "  {} toxic, {} errors, {:.2}s total ({:.1} ms/text)",
        report.toxic_count(),
        report.error_count(),
        report.total_seconds,
        report.average_seconds * 1000.0
    );
}

/// Display every judge and whether it loaded.
pub fn display_judges(judges: &[JudgeInfo]) {
    println!("\n{}", "=== Judges ===".bold());
    println!();
    for judge in judges {
        let status = match &judge.status {
            JudgeStatus::Ready => "ready".green().to_string(),
            JudgeStatus::Disabled(reason) => format!("{} ({})", "disabled".dimmed(), reason),
            JudgeStatus::Unavailable(reason) => {
                format!("{} ({})", "unavailable".red(), super::truncate_chars(reason, 80))
            }
        };
        let mut details = format!("weight {:.2}", judge.weight);
        if let (Some(rank), Some(use_case)) = (judge.cost_rank, judge.use_case) {
            details.push_str(&format!(", cost {}, {}", rank, use_case.as_str()));
        }
        if let Some(timeout) = judge.timeout_seconds {
            details.push_str(&format!(", timeout {timeout:.1}s"));
        }
        println!(
            "  {:<12} {:<10} {}  {}",
            judge.name,
            judge.kind.as_str(),
            status,
            details.dimmed()
        );
    }
}

/// Display the available strategies.
pub fn display_strategies() {
    println!("\n{}", "=== Strategies ===".bold());
    println!();
    for strategy in Strategy::ALL {
        println!(
            "  {:<10} {:<8} {}",
            strategy.as_str().bold(),
            strategy.latency_hint(),
            strategy.description()
        );
    }
}

/// Color a score by severity.
fn colorize_score(score: f64) -> colored::ColoredString {
    let text = format!("{score:.2}");
    if score >= 0.7 {
        text.red().bold()
    } else if score >= 0.3 {
        text.yellow()
    } else {
        text.green()
    }
}
