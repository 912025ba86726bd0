//! Offline training: dataset → fitted encoders, scaler and forest → model directory.

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::Parser;
use ibf_core::{train, Dataset, SyntheticGenerator, TrainingConfig};

#[derive(Parser, Debug)]
#[command(name = "train", about = "Train the IBF risk classifier and persist its artifact set")]
struct Args {
    /// Labeled CSV dataset (Region, Season, nine numerics, RiskLevel).
    #[arg(short, long, conflicts_with = "synthetic")]
    data: Option<PathBuf>,

    /// Train on N generated records instead of a CSV file.
    #[arg(long, value_name = "N")]
    synthetic: Option<usize>,

    /// Seed for the synthetic generator.
    #[arg(long, default_value_t = 42)]
    seed: u64,

    /// Output directory for the artifact set; replaced atomically.
    #[arg(short, long, default_value = "model")]
    model_dir: PathBuf,

    /// JSON training config; omitted fields keep their defaults.
    #[arg(short, long)]
    config: Option<PathBuf>,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let config = match &args.config {
        Some(path) => {
            TrainingConfig::load(path).with_context(|| format!("loading {}", path.display()))?
        }
        None => TrainingConfig::default(),
    };

    let dataset = match (&args.data, args.synthetic) {
        (Some(path), _) => {
            Dataset::load_csv(path).with_context(|| format!("loading {}", path.display()))?
        }
        (None, Some(n)) => {
            eprintln!("[train] Generating {n} synthetic records (seed {})", args.seed);
            SyntheticGenerator::new(args.seed).dataset(n)
        }
        (None, None) => bail!("pass --data <CSV> or --synthetic <N>"),
    };

    let outcome = train(&dataset, &config).context("training failed")?;

    match &outcome.report {
        Some(report) => eprintln!("\n{report}\n"),
        None => eprintln!("[train] No held-out split; skipping evaluation."),
    }

    eprintln!("Feature importances:");
    for (name, importance) in &outcome.feature_importances {
        eprintln!("  {name:<20} {importance:.4}");
    }

    outcome
        .artifacts
        .save(&args.model_dir)
        .with_context(|| format!("saving artifacts to {}", args.model_dir.display()))?;
    eprintln!(
        "[train] Wrote {} ({} train / {} test samples)",
        args.model_dir.display(),
        outcome.n_train,
        outcome.n_test
    );
    Ok(())
}
