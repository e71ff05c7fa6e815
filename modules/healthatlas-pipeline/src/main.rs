//! NDJSON batch validation CLI.
//!
//! Reads one JSON record per line, normalizes field-name variants, runs the
//! validation pipeline with bounded concurrency, and writes one outcome
//! JSON per line to stdout.

use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use healthatlas_common::{NormalizedProvider, PipelineConfig, RoutePath, ServiceConfig};
use healthatlas_pipeline::{sources, Validator};

#[derive(Parser)]
#[command(name = "healthatlas", about = "Validate provider records against five evidence sources")]
struct Args {
    /// NDJSON input file, or "-" for stdin.
    #[arg(long, default_value = "-")]
    input: PathBuf,

    /// Override the configured batch concurrency.
    #[arg(long)]
    concurrency: Option<usize>,

    /// Pretty-print outcomes instead of one JSON per line.
    #[arg(long)]
    pretty: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("healthatlas=info".parse()?))
        .init();

    let args = Args::parse();
    let mut config = PipelineConfig::from_env()?;
    if let Some(concurrency) = args.concurrency {
        config.batch_concurrency = concurrency;
    }
    let validator = Validator::new(sources::from_config(&ServiceConfig::from_env())?, config)?;

    let providers = read_records(&args.input)?;
    info!(records = providers.len(), "Validating records");

    let outcomes = validator.validate_many(providers).await;

    let mut tally = [0usize; 4];
    for outcome in &outcomes {
        match outcome.confidence.path {
            RoutePath::Green => tally[0] += 1,
            RoutePath::Yellow => tally[1] += 1,
            RoutePath::Red => tally[2] += 1,
            RoutePath::Error => tally[3] += 1,
        }
        let line = if args.pretty {
            serde_json::to_string_pretty(outcome)?
        } else {
            serde_json::to_string(outcome)?
        };
        println!("{line}");
    }
    info!(
        green = tally[0],
        yellow = tally[1],
        red = tally[2],
        error = tally[3],
        "Batch complete"
    );
    Ok(())
}

fn read_records(input: &PathBuf) -> Result<Vec<NormalizedProvider>> {
    let reader: Box<dyn BufRead> = if input.as_os_str() == "-" {
        Box::new(BufReader::new(io::stdin()))
    } else {
        Box::new(BufReader::new(File::open(input).with_context(|| {
            format!("failed to open input file {}", input.display())
        })?))
    };

    let mut providers = Vec::new();
    for (line_no, line) in reader.lines().enumerate() {
        let line = line.context("failed to read input line")?;
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<serde_json::Value>(&line) {
            Ok(serde_json::Value::Object(record)) => {
                providers.push(NormalizedProvider::from_record(&record));
            }
            Ok(_) => warn!(line = line_no + 1, "Skipping non-object record"),
            Err(e) => warn!(line = line_no + 1, error = %e, "Skipping unparseable record"),
        }
    }
    Ok(providers)
}
