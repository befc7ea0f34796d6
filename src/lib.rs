//! RiskForge: flags the most critical group of inventory products
//!
//! Products are partitioned with K-Means over (risk, stock, repetitions)
//! and the cluster whose centroid scores highest on a weighted
//! criticality formula is returned as the set of suggestions.

pub mod cli;
pub mod data;
pub mod error;
pub mod logging;
pub mod model;
pub mod pipeline;
pub mod selector;
pub mod viz;

// Re-export public items for easier access
pub use cli::Args;
pub use data::{load_records, InputFormat, Item, ItemRecord, Suggestion, SuggestionResponse};
pub use error::{CriticalError, CriticalResult};
pub use model::{fit_partition, KMeansConfig, Partition, CLUSTER_COUNT};
pub use pipeline::{suggest, suggest_items, CriticalReport};
pub use selector::{criticality_score, select_critical, EmptyClusterPolicy, SelectorConfig};
pub use viz::create_cluster_visualization;

/// Result type for loading, plotting and other I/O-facing code
pub type Result<T> = anyhow::Result<T>;
