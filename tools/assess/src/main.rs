//! One IBF assessment from the command line against a saved artifact set.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use ibf_core::units::{fahrenheit_to_celsius, inches_to_mm, kmh_to_mph, mm_to_inches, mph_to_kmh};
use ibf_core::{Advisory, ArtifactSet, IbfEngine, IbfPolicy, RiskInputs};
use serde::Serialize;

#[derive(Parser, Debug)]
#[command(name = "assess", about = "Assess disaster risk for one region from raw readings")]
struct Args {
    /// Artifact set written by `train`.
    #[arg(short, long, default_value = "model")]
    model_dir: PathBuf,

    /// JSON policy overriding vulnerability constants, weights or thresholds.
    #[arg(long)]
    policy: Option<PathBuf>,

    #[arg(long)]
    region: String,

    /// Displayed only; the model season is derived from rainfall.
    #[arg(long, default_value = "Summer")]
    season: String,

    /// mm (inches with --imperial).
    #[arg(long)]
    rainfall: f64,

    /// °C (°F with --imperial).
    #[arg(long, default_value_t = 30.0)]
    temperature: f64,

    /// %.
    #[arg(long, default_value_t = 60.0)]
    humidity: f64,

    /// %.
    #[arg(long, default_value_t = 50.0)]
    soil_moisture: f64,

    /// m.
    #[arg(long, default_value_t = 5.0)]
    river_level: f64,

    /// km/h (mph with --imperial).
    #[arg(long)]
    wind_speed: f64,

    /// hPa.
    #[arg(long, default_value_t = 1010.0)]
    pressure: f64,

    /// People per km².
    #[arg(long)]
    population_density: f64,

    /// 1 (poor) to 10 (resilient).
    #[arg(long)]
    infrastructure_index: f64,

    /// Read rainfall, temperature and wind speed in imperial units.
    #[arg(long)]
    imperial: bool,

    /// Print the assessment, trace and advisory as JSON.
    #[arg(long)]
    json: bool,
}

#[derive(Serialize)]
struct Report<'a> {
    inputs: &'a RiskInputs,
    assessment: &'a ibf_core::RiskAssessment,
    trace: &'a ibf_core::AssessmentTrace,
    advisory: &'a Advisory,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let policy = match &args.policy {
        Some(path) => {
            IbfPolicy::load(path).with_context(|| format!("loading {}", path.display()))?
        }
        None => IbfPolicy::default(),
    };
    let artifacts = ArtifactSet::load(&args.model_dir)
        .with_context(|| format!("loading artifact set from {}", args.model_dir.display()))?;
    let engine = IbfEngine::from_artifacts(artifacts, policy).context("artifact set rejected")?;

    let (rainfall, temperature, wind_speed) = if args.imperial {
        (
            inches_to_mm(args.rainfall),
            fahrenheit_to_celsius(args.temperature),
            mph_to_kmh(args.wind_speed),
        )
    } else {
        (args.rainfall, args.temperature, args.wind_speed)
    };
    let inputs = RiskInputs {
        region: args.region,
        season: args.season,
        rainfall,
        temperature,
        humidity: args.humidity,
        soil_moisture: args.soil_moisture,
        river_level: args.river_level,
        wind_speed,
        pressure: args.pressure,
        population_density: args.population_density,
        infrastructure_index: args.infrastructure_index,
    };

    let (assessment, trace) = engine.assess_traced(&inputs).with_context(|| {
        format!("assessment failed (known regions: {})", engine.regions().join(", "))
    })?;
    let advisory = Advisory::from_assessment(&inputs, &assessment);

    if args.json {
        let report =
            Report { inputs: &inputs, assessment: &assessment, trace: &trace, advisory: &advisory };
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    let (rain_display, wind_display) = if args.imperial {
        (format!("{:.2} in", mm_to_inches(rainfall)), format!("{:.1} mph", kmh_to_mph(wind_speed)))
    } else {
        (format!("{rainfall:.1} mm"), format!("{wind_speed:.1} km/h"))
    };

    println!("Region:             {}", inputs.region);
    println!("Rainfall / wind:    {rain_display} / {wind_display}");
    println!("Season (model):     {} (requested {})", trace.derived_season, trace.requested_season);
    println!("Final tier:         {}", assessment.final_tier);
    println!("IBF score:          {:.3}", assessment.ibf_score);
    println!("Likelihood P(High): {:.3}", assessment.likelihood);
    println!("Vulnerability:      {:.3}", assessment.vulnerability_norm);
    println!("Class distribution:");
    for (label, p) in &trace.class_probabilities {
        println!("  {label:<10} {p:.3}");
    }
    println!("{advisory}");
    Ok(())
}
