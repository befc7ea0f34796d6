//! K-Means partitioning of products over (risk, stock, repetitions)

use crate::data::{feature_matrix, Item, FEATURE_COUNT, FEATURE_NAMES};
use crate::error::{CriticalError, CriticalResult};
use ndarray::{Array1, Array2, ArrayView1, ArrayView2};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::debug;

/// Number of clusters; fixed for criticality ranking
pub const CLUSTER_COUNT: usize = 3;
/// Seed used when the caller does not provide one
pub const DEFAULT_SEED: u64 = 42;
/// Iteration cap for a single Lloyd run
pub const DEFAULT_MAX_ITERATIONS: usize = 300;
/// Number of seeded runs; the lowest-inertia run is kept
pub const DEFAULT_N_INIT: usize = 10;
/// Largest accepted feature magnitude. Squared distances between points
/// within this bound stay finite.
pub const MAX_FEATURE_MAGNITUDE: f64 = 1e150;

/// Clustering parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KMeansConfig {
    /// Seed for centroid initialization. Run `i` uses `seed + i`.
    pub seed: u64,
    /// Maximum assignment/update passes per run
    pub max_iterations: usize,
    /// Number of independently seeded runs
    pub n_init: usize,
}

impl Default for KMeansConfig {
    fn default() -> Self {
        Self {
            seed: DEFAULT_SEED,
            max_iterations: DEFAULT_MAX_ITERATIONS,
            n_init: DEFAULT_N_INIT,
        }
    }
}

impl KMeansConfig {
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    pub fn with_n_init(mut self, n_init: usize) -> Self {
        self.n_init = n_init;
        self
    }
}

/// Result of partitioning products into clusters
#[derive(Debug, Clone, PartialEq)]
pub struct Partition {
    /// Cluster label per product, in input order
    pub labels: Array1<usize>,
    /// Centroids in raw feature space, shape (CLUSTER_COUNT, 3)
    pub centroids: Array2<f64>,
    /// Passes run by the winning run
    pub iterations: usize,
    /// Whether labels stopped changing before the iteration cap
    pub converged: bool,
    /// Within-cluster sum of squares
    pub inertia: f64,
}

impl Partition {
    pub fn n_clusters(&self) -> usize {
        self.centroids.nrows()
    }

    /// Get cluster sizes
    pub fn cluster_sizes(&self) -> Vec<usize> {
        let mut sizes = vec![0; self.n_clusters()];
        for &label in self.labels.iter() {
            if label < sizes.len() {
                sizes[label] += 1;
            }
        }
        sizes
    }

    /// Indices of the products labelled `cluster`, in input order
    pub fn members(&self, cluster: usize) -> Vec<usize> {
        self.labels
            .iter()
            .enumerate()
            .filter(|(_, label)| **label == cluster)
            .map(|(idx, _)| idx)
            .collect()
    }
}

/// Partition products into [`CLUSTER_COUNT`] clusters.
///
/// Fails with `InsufficientData` below `CLUSTER_COUNT` products and with
/// `InvalidFeature` if any feature is not finite or exceeds
/// [`MAX_FEATURE_MAGNITUDE`] in absolute value. The input is not
/// modified; labels come back as a parallel array.
pub fn fit_partition(items: &[Item], config: &KMeansConfig) -> CriticalResult<Partition> {
    if items.len() < CLUSTER_COUNT {
        return Err(CriticalError::InsufficientData {
            found: items.len(),
            required: CLUSTER_COUNT,
        });
    }

    let features = feature_matrix(items);
    for (row, point) in features.outer_iter().enumerate() {
        if let Some(col) = point.iter().position(|v| !v.is_finite()) {
            return Err(CriticalError::InvalidFeature {
                row,
                field: FEATURE_NAMES[col],
                reason: format!("value {} is not finite", point[col]),
            });
        }
        if let Some(col) = point.iter().position(|v| v.abs() > MAX_FEATURE_MAGNITUDE) {
            return Err(CriticalError::InvalidFeature {
                row,
                field: FEATURE_NAMES[col],
                reason: format!(
                    "value {} exceeds the supported magnitude {:e}",
                    point[col], MAX_FEATURE_MAGNITUDE
                ),
            });
        }
    }

    partition_features(features.view(), config)
}

/// Run K-Means on an (n, 3) feature matrix, keeping the best of
/// `config.n_init` seeded runs.
pub fn partition_features(
    features: ArrayView2<f64>,
    config: &KMeansConfig,
) -> CriticalResult<Partition> {
    if features.nrows() < CLUSTER_COUNT {
        return Err(CriticalError::InsufficientData {
            found: features.nrows(),
            required: CLUSTER_COUNT,
        });
    }

    let mut best: Option<Partition> = None;
    for run in 0..config.n_init.max(1) {
        let seed = config.seed.wrapping_add(run as u64);
        let mut rng = StdRng::seed_from_u64(seed);
        let initial = kmeans_plus_plus(features, CLUSTER_COUNT, &mut rng);
        let candidate = lloyd(features, initial, config.max_iterations.max(1));

        debug!(
            run,
            seed,
            iterations = candidate.iterations,
            converged = candidate.converged,
            inertia = candidate.inertia,
            "k-means run finished"
        );

        // Strict comparison keeps the earliest run on ties
        if best
            .as_ref()
            .map_or(true, |current| candidate.inertia < current.inertia)
        {
            best = Some(candidate);
        }
    }

    best.ok_or(CriticalError::InsufficientData {
        found: features.nrows(),
        required: CLUSTER_COUNT,
    })
}

/// Greedy k-means++ seeding.
///
/// Each centre after the first is the best of `2 + ln(k)` candidates
/// sampled proportionally to squared distance from the chosen centres.
fn kmeans_plus_plus(features: ArrayView2<f64>, k: usize, rng: &mut StdRng) -> Array2<f64> {
    let n_samples = features.nrows();
    let n_local_trials = 2 + (k as f64).ln().floor() as usize;
    let mut centroids = Array2::zeros((k, FEATURE_COUNT));

    let first = rng.gen_range(0..n_samples);
    centroids.row_mut(0).assign(&features.row(first));

    let mut closest: Vec<f64> = features
        .outer_iter()
        .map(|point| squared_distance(point, features.row(first)))
        .collect();
    let mut potential: f64 = closest.iter().sum();

    for cluster in 1..k {
        let mut best: Option<(usize, f64, Vec<f64>)> = None;

        for _ in 0..n_local_trials {
            let candidate = sample_weighted(&closest, potential, rng);
            let distances: Vec<f64> = features
                .outer_iter()
                .zip(closest.iter())
                .map(|(point, &current)| {
                    current.min(squared_distance(point, features.row(candidate)))
                })
                .collect();
            let candidate_potential: f64 = distances.iter().sum();

            if best
                .as_ref()
                .map_or(true, |(_, best_potential, _)| {
                    candidate_potential < *best_potential
                })
            {
                best = Some((candidate, candidate_potential, distances));
            }
        }

        if let Some((idx, best_potential, distances)) = best {
            centroids.row_mut(cluster).assign(&features.row(idx));
            closest = distances;
            potential = best_potential;
        }
    }

    centroids
}

/// Draw an index with probability proportional to its weight; uniform
/// when all weights are zero.
fn sample_weighted(weights: &[f64], total: f64, rng: &mut StdRng) -> usize {
    if total <= 0.0 {
        return rng.gen_range(0..weights.len());
    }

    let target = rng.gen::<f64>() * total;
    let mut cumulative = 0.0;
    for (idx, &weight) in weights.iter().enumerate() {
        cumulative += weight;
        if target < cumulative {
            return idx;
        }
    }

    // Rounding can leave target at the very top of the range
    weights
        .iter()
        .rposition(|&weight| weight > 0.0)
        .unwrap_or(weights.len() - 1)
}

/// Lloyd iterations from the given centroids until labels are stable or
/// `max_iterations` passes have run.
fn lloyd(features: ArrayView2<f64>, mut centroids: Array2<f64>, max_iterations: usize) -> Partition {
    let mut labels: Option<Array1<usize>> = None;
    let mut iterations = 0;
    let mut converged = false;

    while iterations < max_iterations {
        iterations += 1;
        let next = assign(features, centroids.view());

        if labels.as_ref() == Some(&next) {
            converged = true;
            break;
        }

        update_centroids(features, &next, &mut centroids);
        labels = Some(next);
    }

    let labels = labels.unwrap_or_else(|| assign(features, centroids.view()));
    let inertia = compute_inertia(features, &labels, centroids.view());

    Partition {
        labels,
        centroids,
        iterations,
        converged,
        inertia,
    }
}

fn assign(features: ArrayView2<f64>, centroids: ArrayView2<f64>) -> Array1<usize> {
    features
        .outer_iter()
        .map(|point| nearest_centroid(point, centroids))
        .collect()
}

/// Index of the closest centroid; ties go to the lowest index
pub fn nearest_centroid(point: ArrayView1<f64>, centroids: ArrayView2<f64>) -> usize {
    let mut min_distance = f64::INFINITY;
    let mut closest_cluster = 0;

    for (cluster_idx, centroid) in centroids.outer_iter().enumerate() {
        let distance = squared_distance(point, centroid);
        if distance < min_distance {
            min_distance = distance;
            closest_cluster = cluster_idx;
        }
    }

    closest_cluster
}

/// Empty clusters keep their previous centroid.
fn update_centroids(features: ArrayView2<f64>, labels: &Array1<usize>, centroids: &mut Array2<f64>) {
    let n_clusters = centroids.nrows();
    let mut sums = Array2::<f64>::zeros((n_clusters, FEATURE_COUNT));
    let mut counts = vec![0usize; n_clusters];

    for (point, &label) in features.outer_iter().zip(labels.iter()) {
        let mut sum = sums.row_mut(label);
        sum += &point;
        counts[label] += 1;
    }

    for (cluster, &count) in counts.iter().enumerate() {
        if count > 0 {
            let mean = &sums.row(cluster) / count as f64;
            centroids.row_mut(cluster).assign(&mean);
        }
    }
}

/// Compute within-cluster sum of squares (inertia)
fn compute_inertia(features: ArrayView2<f64>, labels: &Array1<usize>, centroids: ArrayView2<f64>) -> f64 {
    features
        .outer_iter()
        .zip(labels.iter())
        .map(|(point, &cluster)| squared_distance(point, centroids.row(cluster)))
        .sum()
}

fn squared_distance(a: ArrayView1<f64>, b: ArrayView1<f64>) -> f64 {
    a.iter().zip(b.iter()).map(|(x, y)| (x - y).powi(2)).sum()
}
