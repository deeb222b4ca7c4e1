use std::path::PathBuf;

use apexline::{AnalysisConfig, AnalysisOutcome, ApexError, analyze_file, report};
use clap::{Parser, Subcommand};
use log::{error, info, warn};

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
#[command(propagate_version = true)]
struct Args {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Analyze a JSON Lines telemetry file
    Analyze {
        #[arg(short, long)]
        input: PathBuf,

        /// Where to write the JSON report, printed to stdout when missing
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Export every selected sample with its corner id
        #[arg(long)]
        samples_output: Option<PathBuf>,

        /// Ignore laps slower than this (seconds)
        #[arg(long)]
        max_lap_time: Option<f64>,

        /// Only analyze these laps
        #[arg(short, long = "lap")]
        laps: Vec<u32>,

        /// Config file, defaults to the user config when present
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
    /// Write the default configuration to the user config directory
    InitConfig,
}

fn load_config(path: Option<&PathBuf>) -> Result<AnalysisConfig, ApexError> {
    match path {
        Some(path) => AnalysisConfig::from_path(path),
        None => Ok(AnalysisConfig::from_local_file()?.unwrap_or_default()),
    }
}

fn analyze(
    input: &PathBuf,
    output: Option<&PathBuf>,
    samples_output: Option<&PathBuf>,
    max_lap_time: Option<f64>,
    laps: &[u32],
    config: Option<&PathBuf>,
) -> Result<(), ApexError> {
    let mut config = load_config(config)?;
    if max_lap_time.is_some() {
        config.lap_selection.max_lap_time_s = max_lap_time;
    }
    if !laps.is_empty() {
        config.lap_selection.laps = Some(laps.to_vec());
    }
    config.validate()?;

    let analysis = analyze_file(input, &config)?;
    if let AnalysisOutcome::NoCornersDetected { reason } = &analysis.outcome {
        warn!("No corners detected: {:?}", reason);
    }

    match output {
        Some(output) => report::write_report(output, &analysis.outcome)?,
        None => {
            let json = serde_json::to_string_pretty(&analysis.outcome)
                .map_err(|e| ApexError::ReportSerializeError { source: e })?;
            println!("{}", json);
        }
    }
    if let Some(samples_output) = samples_output {
        report::write_samples_jsonl(samples_output, &analysis.sample_rows())?;
    }
    Ok(())
}

fn init_config() -> Result<(), ApexError> {
    let path = AnalysisConfig::default().save()?;
    info!("Default configuration written to {:?}", path);
    Ok(())
}

fn main() {
    colog::init();

    let cli = Args::parse();
    let result = match &cli.command {
        Commands::Analyze {
            input,
            output,
            samples_output,
            max_lap_time,
            laps,
            config,
        } => analyze(
            input,
            output.as_ref(),
            samples_output.as_ref(),
            *max_lap_time,
            laps,
            config.as_ref(),
        ),
        Commands::InitConfig => init_config(),
    };
    if let Err(e) = result {
        if e.is_internal() {
            error!("Analysis aborted: {}", e);
        } else {
            error!("{}", e);
        }
        std::process::exit(1);
    }
}
