//! Disctag command-line front end.
//!
//! `disctag train` runs a training job described by a JSON configuration;
//! `disctag decode` tags whitespace-tokenized sentences read from stdin with
//! the model that configuration produced.

use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use disctag_trainer::{Tagger, Trainer, TrainerConfig};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "disctag")]
#[command(about = "Train and run a discriminative sequence tagger")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Train a model
    Train {
        /// Training configuration (JSON)
        #[arg(short, long)]
        config: PathBuf,
    },
    /// Tag sentences from stdin, one per line
    Decode {
        /// Configuration the model was trained with (JSON)
        #[arg(short, long)]
        config: PathBuf,

        /// Model file to use instead of the configured one
        #[arg(short, long)]
        model: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Train { config } => train(config),
        Commands::Decode { config, model } => decode(config, model),
    }
}

fn load_config(path: &Path) -> Result<TrainerConfig> {
    TrainerConfig::from_file(path)
        .with_context(|| format!("failed to load configuration {}", path.display()))
}

fn train(config_path: PathBuf) -> Result<()> {
    let config = load_config(&config_path)?;
    let trainer = Trainer::from_config(config).context("failed to prepare training")?;
    let report = trainer.run().context("training failed")?;

    let final_accuracy = report.epochs.last().map_or(0.0, |e| e.accuracy);
    info!(
        epochs = report.epochs.len(),
        final_accuracy,
        n_weights = report.n_weights,
        model = %report.model_file.display(),
        "training finished"
    );
    Ok(())
}

fn decode(config_path: PathBuf, model: Option<PathBuf>) -> Result<()> {
    let mut config = load_config(&config_path)?;
    if let Some(model) = model {
        config.model_file = model;
    }
    let mut tagger = Tagger::load(&config)
        .with_context(|| format!("failed to load model {}", config.model_file.display()))?;

    let stdin = io::stdin();
    let stdout = io::stdout();
    let mut out = stdout.lock();
    for (i, line) in stdin.lock().lines().enumerate() {
        let line = line.context("failed to read stdin")?;
        let words: Vec<&str> = line.split_whitespace().collect();
        if words.is_empty() {
            writeln!(out)?;
            continue;
        }
        let tagged = tagger
            .tag(words.as_slice())
            .with_context(|| format!("failed to tag sentence {}", i + 1))?;
        writeln!(out, "{tagged}")?;
        writeln!(out)?;
    }
    out.flush()?;
    Ok(())
}
