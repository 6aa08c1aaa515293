//! Principal component analysis by eigen-decomposition of the sample
//! covariance matrix.

use nalgebra::{DMatrix, DVector};
use tracing::debug;

use crate::error::{AnalysisError, AnalysisResult};

/// A fitted projection onto the leading principal components.
#[derive(Debug, Clone)]
pub struct Pca {
    /// Per-feature mean removed before projecting
    pub mean: DVector<f64>,
    /// One row per component, unit length
    pub components: DMatrix<f64>,
    /// Variance along each kept component
    pub explained_variance: Vec<f64>,
    /// Share of the total variance along each kept component
    pub explained_variance_ratio: Vec<f64>,
}

impl Pca {
    /// Fit `n_components` components to the rows of `data`.
    ///
    /// Each component's sign is chosen so that its largest-magnitude
    /// loading is positive, which makes the result independent of the
    /// eigen solver's arbitrary sign.
    pub fn fit(data: &DMatrix<f64>, n_components: usize) -> AnalysisResult<Self> {
        let (n_samples, n_features) = data.shape();
        if n_samples < 2 {
            return Err(AnalysisError::InvalidParameter(format!(
                "PCA needs at least 2 samples, got {}",
                n_samples
            )));
        }
        if n_components == 0 || n_components > n_samples.min(n_features) {
            return Err(AnalysisError::InvalidParameter(format!(
                "n_components must be between 1 and {}, got {}",
                n_samples.min(n_features),
                n_components
            )));
        }
        if data.iter().any(|v| !v.is_finite()) {
            return Err(AnalysisError::InvalidParameter(
                "features contain non-finite values".to_string(),
            ));
        }

        let mean: DVector<f64> = data.row_mean().transpose();
        let centered = centre(data, &mean);
        let covariance = centered.transpose() * &centered / (n_samples - 1) as f64;
        let eigen = covariance.symmetric_eigen();

        let mut order: Vec<usize> = (0..n_features).collect();
        order.sort_by(|&a, &b| eigen.eigenvalues[b].total_cmp(&eigen.eigenvalues[a]));

        let total: f64 = eigen.eigenvalues.iter().map(|v| v.max(0.0)).sum();
        let mut components = DMatrix::zeros(n_components, n_features);
        let mut explained_variance = Vec::with_capacity(n_components);

        for (row, &index) in order.iter().take(n_components).enumerate() {
            let mut vector = eigen.eigenvectors.column(index).into_owned();
            let pivot = vector
                .iter()
                .copied()
                .fold(0.0f64, |acc, v| if v.abs() > acc.abs() { v } else { acc });
            if pivot < 0.0 {
                vector.neg_mut();
            }
            components.set_row(row, &vector.transpose());
            explained_variance.push(eigen.eigenvalues[index].max(0.0));
        }

        let explained_variance_ratio = explained_variance
            .iter()
            .map(|v| if total > 0.0 { v / total } else { 0.0 })
            .collect();

        debug!(
            samples = n_samples,
            features = n_features,
            components = n_components,
            "Fitted PCA"
        );

        Ok(Self {
            mean,
            components,
            explained_variance,
            explained_variance_ratio,
        })
    }

    pub fn n_components(&self) -> usize {
        self.components.nrows()
    }

    /// Coordinates of each row of `data`, one column per component.
    pub fn transform(&self, data: &DMatrix<f64>) -> AnalysisResult<DMatrix<f64>> {
        if data.ncols() != self.mean.len() {
            return Err(AnalysisError::InvalidParameter(format!(
                "data has {} features, PCA was fitted on {}",
                data.ncols(),
                self.mean.len()
            )));
        }
        Ok(centre(data, &self.mean) * self.components.transpose())
    }

    pub fn fit_transform(
        data: &DMatrix<f64>,
        n_components: usize,
    ) -> AnalysisResult<(Self, DMatrix<f64>)> {
        let pca = Self::fit(data, n_components)?;
        let projected = pca.transform(data)?;
        Ok((pca, projected))
    }
}

fn centre(data: &DMatrix<f64>, mean: &DVector<f64>) -> DMatrix<f64> {
    let mut centered = data.clone();
    for mut row in centered.row_iter_mut() {
        row -= mean.transpose();
    }
    centered
}

/// A sample in the plane of the first two components.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PcaRow {
    pub first: f64,
    pub second: f64,
    pub cluster: usize,
}

/// Zip a two-column projection with cluster labels.
pub fn pca_rows(projected: &DMatrix<f64>, labels: &[usize]) -> AnalysisResult<Vec<PcaRow>> {
    if projected.ncols() != 2 {
        return Err(AnalysisError::InvalidParameter(format!(
            "expected 2 components, got {}",
            projected.ncols()
        )));
    }
    if projected.nrows() != labels.len() {
        return Err(AnalysisError::InvalidParameter(format!(
            "{} projected rows but {} labels",
            projected.nrows(),
            labels.len()
        )));
    }
    Ok(projected
        .row_iter()
        .zip(labels)
        .map(|(row, &cluster)| PcaRow {
            first: row[0],
            second: row[1],
            cluster,
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_points_on_a_line() {
        let data = DMatrix::from_row_slice(4, 2, &[0.0, 0.0, 1.0, 2.0, 2.0, 4.0, 3.0, 6.0]);
        let (pca, projected) = Pca::fit_transform(&data, 2).unwrap();

        assert!((pca.explained_variance_ratio[0] - 1.0).abs() < 1e-9);
        assert!(pca.explained_variance_ratio[1].abs() < 1e-9);

        // Direction (1, 2) normalised, with a positive dominant loading
        let norm = 5.0f64.sqrt();
        assert!((pca.components[(0, 0)] - 1.0 / norm).abs() < 1e-9);
        assert!((pca.components[(0, 1)] - 2.0 / norm).abs() < 1e-9);

        // Projections are centred and increase along the line
        assert!((projected.column(0).sum()).abs() < 1e-9);
        assert!(projected[(0, 0)] < projected[(3, 0)]);
    }

    #[test]
    fn test_dominant_loading_is_positive() {
        let data = DMatrix::from_row_slice(
            5,
            3,
            &[
                1.0, -4.0, 0.5, 2.0, -8.0, 0.1, 3.0, -12.5, 0.2, 4.0, -16.0, 0.4, 5.0, -19.0, 0.3,
            ],
        );
        let pca = Pca::fit(&data, 2).unwrap();
        for row in pca.components.row_iter() {
            let dominant = row
                .iter()
                .copied()
                .fold(0.0f64, |acc, v| if v.abs() > acc.abs() { v } else { acc });
            assert!(dominant > 0.0);
            assert!((row.norm() - 1.0).abs() < 1e-9);
        }
    }

    #[test]
    fn test_too_many_components() {
        let data = DMatrix::from_row_slice(3, 2, &[0.0, 1.0, 1.0, 0.0, 2.0, 2.0]);
        assert!(matches!(
            Pca::fit(&data, 3),
            Err(AnalysisError::InvalidParameter(_))
        ));
        assert!(Pca::fit(&data, 0).is_err());
    }

    #[test]
    fn test_single_sample_rejected() {
        let data = DMatrix::from_row_slice(1, 3, &[1.0, 2.0, 3.0]);
        assert!(Pca::fit(&data, 1).is_err());
    }

    #[test]
    fn test_transform_checks_width() {
        let data = DMatrix::from_row_slice(3, 2, &[0.0, 1.0, 1.0, 0.0, 2.0, 2.0]);
        let pca = Pca::fit(&data, 1).unwrap();
        assert!(pca.transform(&DMatrix::zeros(2, 3)).is_err());
    }

    #[test]
    fn test_pca_rows_length_mismatch() {
        let projected = DMatrix::from_row_slice(2, 2, &[1.0, 2.0, 3.0, 4.0]);
        let rows = pca_rows(&projected, &[0, 1]).unwrap();
        assert_eq!(
            rows[1],
            PcaRow {
                first: 3.0,
                second: 4.0,
                cluster: 1
            }
        );
        assert!(matches!(
            pca_rows(&projected, &[0]),
            Err(AnalysisError::InvalidParameter(_))
        ));
    }
}
