//! Generate a labeled synthetic dataset in the training CSV layout.

use std::fs::{self, File};
use std::io::BufWriter;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use ibf_core::{RiskTier, SyntheticGenerator};

#[derive(Parser, Debug)]
#[command(name = "synthesize", about = "Write seeded synthetic disaster records to CSV")]
struct Args {
    /// Number of records.
    #[arg(short = 'n', long, default_value_t = 3000)]
    samples: usize,

    #[arg(long, default_value_t = 42)]
    seed: u64,

    /// Output CSV file.
    #[arg(short, long, default_value = "data/disaster_data.csv")]
    output: PathBuf,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let dataset = SyntheticGenerator::new(args.seed).dataset(args.samples);

    if let Some(parent) = args.output.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).with_context(|| format!("creating {}", parent.display()))?;
    }
    let file = File::create(&args.output)
        .with_context(|| format!("creating {}", args.output.display()))?;
    dataset
        .write_csv(BufWriter::new(file))
        .with_context(|| format!("writing {}", args.output.display()))?;

    eprintln!("[synthesize] Wrote {} records to {}", dataset.len(), args.output.display());
    for tier in RiskTier::ALL {
        let n = dataset.labels().filter(|l| *l == tier.as_str()).count();
        eprintln!("  {tier:<9} {n}");
    }
    Ok(())
}
