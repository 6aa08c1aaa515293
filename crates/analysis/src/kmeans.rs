//! Seeded k-means clustering.
//!
//! k-means++ seeding followed by Lloyd iterations, repeated `n_init` times
//! from one `ChaCha8Rng` stream; the run with the lowest inertia wins. The
//! same seed and input always give the same partition.

use nalgebra::{DMatrix, RowDVector};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{AnalysisError, AnalysisResult};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KMeansConfig {
    pub n_clusters: usize,
    pub seed: u64,
    /// Independent initialisations; the best by inertia is kept
    pub n_init: usize,
    pub max_iter: usize,
    /// Relative tolerance, scaled by the mean feature variance
    pub tol: f64,
}

impl Default for KMeansConfig {
    fn default() -> Self {
        Self {
            n_clusters: 6,
            seed: 42,
            n_init: 10,
            max_iter: 300,
            tol: 1e-4,
        }
    }
}

impl KMeansConfig {
    pub fn with_clusters(n_clusters: usize) -> Self {
        Self {
            n_clusters,
            ..Self::default()
        }
    }

    pub fn validate(&self) -> AnalysisResult<()> {
        if self.n_clusters == 0 {
            return Err(AnalysisError::InvalidParameter(
                "n_clusters must be at least 1".to_string(),
            ));
        }
        if self.n_init == 0 || self.max_iter == 0 {
            return Err(AnalysisError::InvalidParameter(
                "n_init and max_iter must be at least 1".to_string(),
            ));
        }
        if !self.tol.is_finite() || self.tol < 0.0 {
            return Err(AnalysisError::InvalidParameter(format!(
                "tol must be a non-negative number, got {}",
                self.tol
            )));
        }
        Ok(())
    }
}

/// A fitted partition.
#[derive(Debug, Clone)]
pub struct KMeansModel {
    /// One row per cluster
    pub centroids: DMatrix<f64>,
    /// Cluster index per sample
    pub labels: Vec<usize>,
    /// Sum of squared distances to the assigned centroid
    pub inertia: f64,
    /// Lloyd iterations of the winning run
    pub iterations: usize,
}

impl KMeansModel {
    pub fn n_clusters(&self) -> usize {
        self.centroids.nrows()
    }

    /// Index of the nearest centroid.
    pub fn predict(&self, sample: &[f64]) -> AnalysisResult<usize> {
        if sample.len() != self.centroids.ncols() {
            return Err(AnalysisError::InvalidParameter(format!(
                "sample has {} features, model has {}",
                sample.len(),
                self.centroids.ncols()
            )));
        }
        let row = RowDVector::from_row_slice(sample);
        Ok(nearest(&self.centroids, &row).0)
    }

    /// Number of samples per cluster.
    pub fn cluster_sizes(&self) -> Vec<usize> {
        let mut sizes = vec![0; self.n_clusters()];
        for &label in &self.labels {
            sizes[label] += 1;
        }
        sizes
    }
}

/// Cluster the rows of `data`.
pub fn fit(data: &DMatrix<f64>, config: &KMeansConfig) -> AnalysisResult<KMeansModel> {
    config.validate()?;
    let (n_samples, _) = data.shape();
    let k = config.n_clusters;
    if k > n_samples {
        return Err(AnalysisError::InvalidParameter(format!(
            "n_clusters ({}) exceeds the number of samples ({})",
            k, n_samples
        )));
    }
    if data.iter().any(|v| !v.is_finite()) {
        return Err(AnalysisError::InvalidParameter(
            "features contain non-finite values".to_string(),
        ));
    }

    let tolerance = config.tol * mean_variance(data);
    let mut rng = ChaCha8Rng::seed_from_u64(config.seed);
    let mut best: Option<KMeansModel> = None;

    for run in 0..config.n_init {
        let centroids = kmeans_plus_plus(data, k, &mut rng);
        let model = lloyd(data, centroids, config.max_iter, tolerance);
        debug!(
            run = run,
            inertia = model.inertia,
            iterations = model.iterations,
            "k-means run finished"
        );
        if best.as_ref().map_or(true, |b| model.inertia < b.inertia) {
            best = Some(model);
        }
    }

    best.ok_or_else(|| AnalysisError::InvalidParameter("n_init must be at least 1".to_string()))
}

/// Mean over features of the population variance.
fn mean_variance(data: &DMatrix<f64>) -> f64 {
    let (n, d) = data.shape();
    if n == 0 || d == 0 {
        return 0.0;
    }
    let total: f64 = data
        .column_iter()
        .map(|col| {
            let mean = col.mean();
            col.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n as f64
        })
        .sum();
    total / d as f64
}

fn squared_distance(a: &RowDVector<f64>, b: &RowDVector<f64>) -> f64 {
    (a - b).norm_squared()
}

/// Nearest centroid and its squared distance; ties go to the lower index.
fn nearest(centroids: &DMatrix<f64>, sample: &RowDVector<f64>) -> (usize, f64) {
    let mut best = (0, f64::INFINITY);
    for (index, centroid) in centroids.row_iter().enumerate() {
        let d = squared_distance(&centroid.into_owned(), sample);
        if d < best.1 {
            best = (index, d);
        }
    }
    best
}

/// Index drawn with probability proportional to `weights`; uniform when
/// every weight is zero.
fn weighted_index<R: Rng>(weights: &[f64], rng: &mut R) -> usize {
    let total: f64 = weights.iter().sum();
    if total <= 0.0 {
        return rng.gen_range(0..weights.len());
    }
    let target = rng.gen::<f64>() * total;
    let mut cumulative = 0.0;
    for (index, w) in weights.iter().enumerate() {
        cumulative += w;
        if target < cumulative {
            return index;
        }
    }
    // Rounding left target at the very end
    weights
        .iter()
        .rposition(|&w| w > 0.0)
        .unwrap_or(weights.len() - 1)
}

/// Greedy k-means++: each new centre is the best of several D²-weighted
/// candidates.
fn kmeans_plus_plus<R: Rng>(data: &DMatrix<f64>, k: usize, rng: &mut R) -> DMatrix<f64> {
    let (n, d) = data.shape();
    let trials = 2 + (k as f64).ln().floor() as usize;
    let rows: Vec<RowDVector<f64>> = data.row_iter().map(|r| r.into_owned()).collect();

    let mut centroids = DMatrix::zeros(k, d);
    let first = rng.gen_range(0..n);
    centroids.set_row(0, &rows[first]);

    let mut closest: Vec<f64> = rows
        .iter()
        .map(|row| squared_distance(row, &rows[first]))
        .collect();

    for c in 1..k {
        let mut best_candidate = None;
        let mut best_potential = f64::INFINITY;
        let mut best_distances = Vec::new();

        for _ in 0..trials {
            let candidate = weighted_index(&closest, rng);
            let distances: Vec<f64> = rows
                .iter()
                .zip(&closest)
                .map(|(row, &current)| current.min(squared_distance(row, &rows[candidate])))
                .collect();
            let potential: f64 = distances.iter().sum();
            if potential < best_potential {
                best_potential = potential;
                best_candidate = Some(candidate);
                best_distances = distances;
            }
        }

        if let Some(candidate) = best_candidate {
            centroids.set_row(c, &rows[candidate]);
            closest = best_distances;
        }
    }

    centroids
}

fn assign(data: &DMatrix<f64>, centroids: &DMatrix<f64>) -> (Vec<usize>, Vec<f64>) {
    data.row_iter()
        .map(|row| nearest(centroids, &row.into_owned()))
        .unzip()
}

fn lloyd(
    data: &DMatrix<f64>,
    mut centroids: DMatrix<f64>,
    max_iter: usize,
    tolerance: f64,
) -> KMeansModel {
    let (n, d) = data.shape();
    let k = centroids.nrows();
    let mut iterations = 0;

    for _ in 0..max_iter {
        iterations += 1;
        let (labels, distances) = assign(data, &centroids);

        let mut sums = DMatrix::<f64>::zeros(k, d);
        let mut counts = vec![0usize; k];
        for (i, &label) in labels.iter().enumerate() {
            let mut row = sums.row_mut(label);
            row += data.row(i);
            counts[label] += 1;
        }

        // Empty clusters take the points farthest from their centres
        let mut by_distance: Vec<usize> = (0..n).collect();
        by_distance.sort_by(|&a, &b| distances[b].total_cmp(&distances[a]));
        let mut donors = by_distance.into_iter();

        let mut updated = DMatrix::<f64>::zeros(k, d);
        for c in 0..k {
            if counts[c] > 0 {
                updated.set_row(c, &(sums.row(c) / counts[c] as f64));
            } else if let Some(donor) = donors.next() {
                debug!(cluster = c, sample = donor, "Re-seeding empty cluster");
                updated.set_row(c, &data.row(donor));
            } else {
                updated.set_row(c, &centroids.row(c));
            }
        }

        let shift = (&updated - &centroids).norm_squared();
        centroids = updated;
        if shift <= tolerance {
            break;
        }
    }

    let (labels, distances) = assign(data, &centroids);
    KMeansModel {
        centroids,
        labels,
        inertia: distances.iter().sum(),
        iterations,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_groups() -> DMatrix<f64> {
        DMatrix::from_row_slice(
            6,
            2,
            &[0.0, 0.0, 0.1, 0.0, 0.0, 0.1, 10.0, 10.0, 10.1, 10.0, 10.0, 10.1],
        )
    }

    #[test]
    fn test_default_config() {
        let config = KMeansConfig::default();
        assert_eq!(config.n_clusters, 6);
        assert_eq!(config.seed, 42);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_two_obvious_groups() {
        let model = fit(&two_groups(), &KMeansConfig::with_clusters(2)).unwrap();
        assert_eq!(model.labels[0], model.labels[1]);
        assert_eq!(model.labels[0], model.labels[2]);
        assert_eq!(model.labels[3], model.labels[5]);
        assert_ne!(model.labels[0], model.labels[3]);
        assert_eq!(model.cluster_sizes(), vec![3, 3]);
        assert!(model.inertia < 0.1);
    }

    #[test]
    fn test_predict_uses_nearest_centroid() {
        let model = fit(&two_groups(), &KMeansConfig::with_clusters(2)).unwrap();
        assert_eq!(model.predict(&[9.0, 9.5]).unwrap(), model.labels[3]);
        assert!(model.predict(&[1.0]).is_err());
    }

    #[test]
    fn test_zero_clusters_rejected() {
        assert!(matches!(
            fit(&two_groups(), &KMeansConfig::with_clusters(0)),
            Err(AnalysisError::InvalidParameter(_))
        ));
    }

    #[test]
    fn test_more_clusters_than_samples_rejected() {
        assert!(matches!(
            fit(&two_groups(), &KMeansConfig::with_clusters(7)),
            Err(AnalysisError::InvalidParameter(_))
        ));
    }

    #[test]
    fn test_non_finite_features_rejected() {
        let mut data = two_groups();
        data[(2, 1)] = f64::NAN;
        assert!(fit(&data, &KMeansConfig::with_clusters(2)).is_err());
    }

    #[test]
    fn test_k_equals_n_has_zero_inertia() {
        let model = fit(&two_groups(), &KMeansConfig::with_clusters(6)).unwrap();
        assert!(model.inertia.abs() < 1e-12);
        let mut labels = model.labels.clone();
        labels.sort_unstable();
        labels.dedup();
        assert_eq!(labels.len(), 6);
    }

    #[test]
    fn test_weighted_index_never_picks_zero_weight() {
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        for _ in 0..200 {
            assert_eq!(weighted_index(&[0.0, 0.0, 3.0, 0.0], &mut rng), 2);
        }
    }

    #[test]
    fn test_mean_variance() {
        let data = DMatrix::from_row_slice(2, 2, &[0.0, 0.0, 2.0, 4.0]);
        // Variances 1 and 4
        assert!((mean_variance(&data) - 2.5).abs() < 1e-12);
    }
}
