//! RiskForge: critical product suggestions via K-Means clustering
//!
//! Loads a products payload, runs the partition-and-rank pipeline, prints
//! `{"sugerencias": [...]}` on stdout and optionally writes plots.

use anyhow::{Context, Result};
use clap::Parser;
use riskforge::logging::configure_logging;
use riskforge::{load_records, suggest, viz, Args, CriticalError};
use std::process::ExitCode;
use std::time::Instant;
use tracing::debug;

/// Exit code for rejected input or an empty selection
const EXIT_CRITICAL_ERROR: u8 = 2;

fn main() -> ExitCode {
    // Usage errors exit 1 so that 2 stays reserved for rejected input
    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(err) if !err.use_stderr() => err.exit(),
        Err(err) => {
            let _ = err.print();
            return ExitCode::FAILURE;
        }
    };
    configure_logging(args.verbose);

    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("Error: {:#}", err);
            if err.downcast_ref::<CriticalError>().is_some() {
                ExitCode::from(EXIT_CRITICAL_ERROR)
            } else {
                ExitCode::FAILURE
            }
        }
    }
}

/// Run the suggestion pipeline for the parsed arguments
fn run(args: &Args) -> Result<()> {
    let start_time = Instant::now();

    let records = load_records(&args.input, args.format)?;
    debug!(records = records.len(), input = %args.input.display(), "payload loaded");

    let report = suggest(&records, &args.kmeans_config(), &args.selector_config())?;

    let response = report.response();
    let body = if args.pretty {
        serde_json::to_string_pretty(&response)?
    } else {
        serde_json::to_string(&response)?
    };
    println!("{}", body);

    if args.verbose {
        eprint!("{}", viz::format_cluster_statistics(&report));
    }

    if let Some(plot_path) = &args.plot {
        viz::generate_visualization_report(&report, plot_path)
            .with_context(|| format!("Failed to write plots to '{}'", plot_path.display()))?;
    }

    debug!(
        elapsed_ms = start_time.elapsed().as_millis() as u64,
        suggestions = response.suggestions.len(),
        "pipeline complete"
    );

    Ok(())
}
