use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;

use tonecheck::batch::score_batch;
use tonecheck::cache::CachedEngine;
use tonecheck::config::Config;
use tonecheck::engine::strategy::Strategy;
use tonecheck::engine::{ScoreOptions, ScoringEngine};
use tonecheck::judges::download;
use tonecheck::output::{self, terminal};

/// tonecheck: multi-strategy toxicity scoring for short-form text.
///
/// Combines keyword matching, embedding similarity and hosted moderation/LLM
/// judges into one confidence-annotated verdict.
#[derive(Parser)]
#[command(name = "tonecheck", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Score a single text
    Score {
        /// The text to score
        text: String,

        /// fast, cascade, balanced or accurate
        #[arg(long, short, default_value = "cascade")]
        strategy: String,

        /// Toxic threshold for this request (default from TONECHECK_TOXIC_THRESHOLD)
        #[arg(long)]
        threshold: Option<f64>,

        /// Include each judge's evidence
        #[arg(long)]
        reasoning: bool,

        /// Print the verdict as JSON
        #[arg(long)]
        json: bool,
    },

    /// Score every line of a file
    Batch {
        /// File with one text per line; blank lines are skipped
        file: PathBuf,

        /// fast, cascade, balanced or accurate
        #[arg(long, short, default_value = "cascade")]
        strategy: String,

        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },

    /// List judges and whether they loaded
    Judges {
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },

    /// List scoring strategies
    Strategies,

    /// Download the embedding model (~470 MB)
    DownloadModel,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if missing)
    let _ = dotenvy::dotenv();

    // Logs go to stderr so --json output stays machine-readable
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("tonecheck=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Score {
            text,
            strategy,
            threshold,
            reasoning,
            json,
        } => {
            let strategy: Strategy = strategy.parse()?;
            let config = Config::load()?;
            let engine = ScoringEngine::from_config(&config).await?;

            let options = ScoreOptions {
                threshold,
                include_reasoning: reasoning,
            };
            let verdict = engine.score(&text, strategy, &options).await?;

            if json {
                println!("{}", output::to_json(&verdict)?);
            } else {
                terminal::display_verdict(&text, &verdict, engine.taxonomy());
            }
        }

        Commands::Batch {
            file,
            strategy,
            json,
        } => {
            let strategy: Strategy = strategy.parse()?;
            let config = Config::load()?;

            let raw = std::fs::read_to_string(&file)
                .with_context(|| format!("Failed to read {}", file.display()))?;
            let texts: Vec<String> = raw
                .lines()
                .map(str::trim)
                .filter(|line| !line.is_empty())
                .map(str::to_string)
                .collect();
            if texts.is_empty() {
                anyhow::bail!("{} contains no texts", file.display());
            }

            let engine = ScoringEngine::from_config(&config).await?;
            let scorer = CachedEngine::new(engine, config.cache_capacity);

            info!(
                texts = texts.len(),
                strategy = %strategy,
                concurrency = config.batch_concurrency,
                "Starting batch"
            );

            let pb = ProgressBar::new(texts.len() as u64);
            pb.set_style(
                ProgressStyle::default_bar().template("  Scoring [{bar:30}] {pos}/{len} ({eta})")?,
            );

            let report = score_batch(
                &scorer,
                &texts,
                strategy,
                &ScoreOptions::default(),
                config.batch_concurrency,
                Some(&pb),
            )
            .await;
            pb.finish_and_clear();

            if json {
                println!("{}", output::to_json(&report)?);
            } else {
                terminal::display_batch(&texts, &report);
            }
        }

        Commands::Judges { json } => {
            let config = Config::load()?;
            let engine = ScoringEngine::from_config(&config).await?;
            let judges = engine.judges();

            if json {
                println!("{}", output::to_json(&judges)?);
            } else {
                terminal::display_judges(&judges);
            }
        }

        Commands::Strategies => {
            terminal::display_strategies();
        }

        Commands::DownloadModel => {
            let config = Config::load()?;
            let model_dir = &config.model_dir;

            println!("Downloading embedding model...");
            println!("  Destination: {}", model_dir.display());

            download::download_model(model_dir).await?;

            println!("\n{}", "Model downloaded successfully.".bold());
            println!("The embedding judge will load on the next run; check with `tonecheck judges`.");
        }
    }

    Ok(())
}
