//! Criticality ranking of clusters and selection of the critical one

use crate::data::{Item, Suggestion, REPETITIONS, RISK, STOCK};
use crate::error::{CriticalError, CriticalResult};
use crate::model::Partition;
use ndarray::ArrayView1;
use serde::Serialize;
use std::cmp::Ordering;
use tracing::{info, warn};

/// Weight of the mean risk
pub const RISK_WEIGHT: f64 = 0.4;
/// Weight of the inverse stock term `1 / (stock + 1)`
pub const STOCK_WEIGHT: f64 = 0.4;
/// Weight of the mean repetition count
pub const REPETITION_WEIGHT: f64 = 0.2;

/// Weighted criticality of a centroid (risk, stock, repetitions).
///
/// Zero stock gives the maximum stock term of exactly `STOCK_WEIGHT`.
pub fn criticality_score(centroid: ArrayView1<f64>) -> f64 {
    RISK_WEIGHT * centroid[RISK]
        + STOCK_WEIGHT * (1.0 / (centroid[STOCK] + 1.0))
        + REPETITION_WEIGHT * centroid[REPETITIONS]
}

/// How clusters without members take part in the ranking
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EmptyClusterPolicy {
    /// Skip empty clusters and select the best-scoring populated one
    #[default]
    Exclude,
    /// Rank every centroid; fail with `EmptySelection` if the winner is empty
    Strict,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SelectorConfig {
    pub empty_clusters: EmptyClusterPolicy,
}

impl SelectorConfig {
    pub fn strict() -> Self {
        Self {
            empty_clusters: EmptyClusterPolicy::Strict,
        }
    }
}

/// Score and size of one cluster
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClusterSummary {
    pub cluster: usize,
    pub size: usize,
    /// Centroid as (risk, stock, repetitions)
    pub centroid: [f64; 3],
    pub score: f64,
}

/// The critical cluster and its members
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CriticalSelection {
    /// Index of the selected cluster
    pub cluster: usize,
    /// All clusters, most critical first
    pub ranking: Vec<ClusterSummary>,
    /// Members of the selected cluster, in input order
    pub suggestions: Vec<Suggestion>,
}

impl CriticalSelection {
    pub fn selected(&self) -> Option<&ClusterSummary> {
        self.ranking.iter().find(|s| s.cluster == self.cluster)
    }
}

/// Rank clusters by descending score.
///
/// The sort is stable, so equal scores keep ascending cluster order and
/// the lowest index wins ties. NaN scores sink to the end.
pub fn rank_clusters(partition: &Partition) -> Vec<ClusterSummary> {
    let sizes = partition.cluster_sizes();
    let mut ranking: Vec<ClusterSummary> = partition
        .centroids
        .outer_iter()
        .enumerate()
        .map(|(cluster, centroid)| ClusterSummary {
            cluster,
            size: sizes[cluster],
            centroid: [centroid[RISK], centroid[STOCK], centroid[REPETITIONS]],
            score: criticality_score(centroid),
        })
        .collect();

    ranking.sort_by(|a, b| match (a.score.is_nan(), b.score.is_nan()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Greater,
        (false, true) => Ordering::Less,
        (false, false) => b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal),
    });
    ranking
}

/// Pick the most critical cluster and project its members.
///
/// `items` must be the products the partition was fitted on, in the same
/// order.
pub fn select_critical(
    partition: &Partition,
    items: &[Item],
    config: &SelectorConfig,
) -> CriticalResult<CriticalSelection> {
    debug_assert_eq!(partition.labels.len(), items.len());

    let ranking = rank_clusters(partition);
    let top = ranking.first().map(|s| s.cluster).unwrap_or(0);

    let chosen = match config.empty_clusters {
        EmptyClusterPolicy::Exclude => ranking.iter().find(|s| s.size > 0),
        EmptyClusterPolicy::Strict => ranking.first(),
    };
    let chosen = match chosen {
        Some(summary) if summary.size > 0 => summary,
        Some(summary) => {
            return Err(CriticalError::EmptySelection {
                cluster: summary.cluster,
            })
        }
        None => return Err(CriticalError::EmptySelection { cluster: top }),
    };

    if chosen.cluster != top {
        warn!(
            skipped = top,
            selected = chosen.cluster,
            "empty cluster outranked the selected one"
        );
    }

    let cluster = chosen.cluster;
    let suggestions: Vec<Suggestion> = partition
        .members(cluster)
        .into_iter()
        .filter_map(|idx| items.get(idx))
        .map(Suggestion::from)
        .collect();

    info!(
        cluster,
        score = chosen.score,
        members = suggestions.len(),
        "selected critical cluster"
    );

    Ok(CriticalSelection {
        cluster,
        ranking,
        suggestions,
    })
}
