//! Command-line interface definitions and argument parsing

use crate::data::InputFormat;
use crate::model::{KMeansConfig, DEFAULT_MAX_ITERATIONS, DEFAULT_N_INIT, DEFAULT_SEED};
use crate::selector::{EmptyClusterPolicy, SelectorConfig};
use clap::Parser;
use std::path::PathBuf;

/// Flag the most critical inventory products using K-Means clustering
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Path to the products file: {"productos": [...]} JSON, a JSON array, or CSV
    #[arg(short, long)]
    pub input: PathBuf,

    /// Input encoding
    #[arg(short, long, value_enum, default_value_t = InputFormat::Auto)]
    pub format: InputFormat,

    /// Seed for centroid initialization
    #[arg(long, default_value_t = DEFAULT_SEED)]
    pub seed: u64,

    /// Maximum iterations for a K-Means run
    #[arg(long, default_value_t = DEFAULT_MAX_ITERATIONS)]
    pub max_iters: usize,

    /// Number of seeded K-Means runs; the lowest inertia wins
    #[arg(long, default_value_t = DEFAULT_N_INIT)]
    pub n_init: usize,

    /// Fail instead of skipping when an empty cluster scores highest
    #[arg(long)]
    pub strict_empty: bool,

    /// Write a cluster scatter plot (and a `_sizes` bar chart) to this PNG path
    #[arg(short, long)]
    pub plot: Option<PathBuf>,

    /// Pretty-print the JSON response
    #[arg(long)]
    pub pretty: bool,

    /// Enable verbose output
    #[arg(short, long)]
    pub verbose: bool,
}

impl Args {
    pub fn kmeans_config(&self) -> KMeansConfig {
        KMeansConfig::default()
            .with_seed(self.seed)
            .with_max_iterations(self.max_iters)
            .with_n_init(self.n_init)
    }

    pub fn selector_config(&self) -> SelectorConfig {
        SelectorConfig {
            empty_clusters: if self.strict_empty {
                EmptyClusterPolicy::Strict
            } else {
                EmptyClusterPolicy::Exclude
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let args = Args::try_parse_from(["riskforge", "--input", "products.json"]).unwrap();

        assert_eq!(args.input, PathBuf::from("products.json"));
        assert_eq!(args.format, InputFormat::Auto);
        assert_eq!(args.kmeans_config(), KMeansConfig::default());
        assert_eq!(args.selector_config(), SelectorConfig::default());
        assert!(args.plot.is_none());
    }

    #[test]
    fn test_overrides() {
        let args = Args::try_parse_from([
            "riskforge",
            "-i",
            "stock.txt",
            "--format",
            "csv",
            "--seed",
            "7",
            "--max-iters",
            "50",
            "--n-init",
            "1",
            "--strict-empty",
        ])
        .unwrap();

        assert_eq!(args.format, InputFormat::Csv);
        assert_eq!(
            args.kmeans_config(),
            KMeansConfig {
                seed: 7,
                max_iterations: 50,
                n_init: 1,
            }
        );
        assert_eq!(args.selector_config().empty_clusters, EmptyClusterPolicy::Strict);
    }

    #[test]
    fn test_input_is_required() {
        assert!(Args::try_parse_from(["riskforge"]).is_err());
        assert!(Args::try_parse_from(["riskforge", "-i", "a.json", "--format", "xml"]).is_err());
    }
}
