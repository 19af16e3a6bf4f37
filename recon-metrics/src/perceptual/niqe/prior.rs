//! Multivariate Gaussian model of patch features.

use std::path::Path;

use burn::config::Config;
use faer::Mat;

use super::features::FEATURE_LEN;
use crate::error::{MetricError, MetricResult};

/// Singular values below this fraction of the largest are treated as zero.
const PINV_RCOND: f64 = 1e-15;

/// Mean and covariance of the features of pristine natural images.
///
/// Stored as JSON through [`Config::save`] and [`Config::load`]. The
/// covariance is row-major.
#[derive(Config, Debug)]
pub struct NiqePrior {
    /// Feature means, one per feature.
    pub mean: Vec<f64>,
    /// Feature covariance, `FEATURE_LEN x FEATURE_LEN` row-major.
    pub covariance: Vec<f64>,
}

impl NiqePrior {
    /// Reads a prior from a JSON file.
    pub fn from_file(path: impl AsRef<Path>) -> MetricResult<Self> {
        let prior = Self::load(path.as_ref()).map_err(|e| MetricError::WeightLoading {
            reason: format!("NIQE prior {}: {e}", path.as_ref().display()),
        })?;
        prior.validate()?;
        Ok(prior)
    }

    /// Checks the sizes against the feature layout.
    pub fn validate(&self) -> MetricResult<()> {
        if self.mean.len() != FEATURE_LEN || self.covariance.len() != FEATURE_LEN * FEATURE_LEN {
            return Err(MetricError::invalid_parameter(
                "NIQE",
                format!(
                    "prior needs {FEATURE_LEN} means and {FEATURE_LEN}x{FEATURE_LEN} covariance \
                     entries, got {} and {}",
                    self.mean.len(),
                    self.covariance.len()
                ),
            ));
        }
        Ok(())
    }

    /// Fits the Gaussian to feature rows.
    pub fn fit(rows: &[[f64; FEATURE_LEN]]) -> Self {
        Self::new(nan_mean(rows), covariance(rows))
    }

    /// `sqrt(dᵀ · pinv((Σp + Σ) / 2) · d)` with `d = μp - μ`.
    pub fn distance(&self, other: &NiqePrior) -> f64 {
        let pooled = Mat::<f64>::from_fn(FEATURE_LEN, FEATURE_LEN, |i, j| {
            let k = i * FEATURE_LEN + j;
            (self.covariance[k] + other.covariance[k]) / 2.0
        });
        let inverse = pseudo_inverse(&pooled);

        let diff: Vec<f64> = self
            .mean
            .iter()
            .zip(&other.mean)
            .map(|(a, b)| a - b)
            .collect();

        let mut quadratic = 0.0;
        for (i, di) in diff.iter().enumerate() {
            for (j, dj) in diff.iter().enumerate() {
                quadratic += di * inverse.read(i, j) * dj;
            }
        }
        quadratic.sqrt()
    }
}

/// Index of the first feature that has no finite value in any row.
pub(crate) fn first_unfitted_feature(rows: &[[f64; FEATURE_LEN]]) -> Option<usize> {
    (0..FEATURE_LEN).find(|&j| !rows.iter().any(|row| row[j].is_finite()))
}

/// Column means ignoring NaN entries.
pub(crate) fn nan_mean(rows: &[[f64; FEATURE_LEN]]) -> Vec<f64> {
    (0..FEATURE_LEN)
        .map(|j| {
            let (sum, count) = rows
                .iter()
                .map(|row| row[j])
                .filter(|v| !v.is_nan())
                .fold((0.0, 0usize), |(s, n), v| (s + v, n + 1));
            sum / count as f64
        })
        .collect()
}

/// Sample covariance of the NaN-free rows, row-major.
///
/// Zero when fewer than two such rows exist.
pub(crate) fn covariance(rows: &[[f64; FEATURE_LEN]]) -> Vec<f64> {
    let clean: Vec<&[f64; FEATURE_LEN]> = rows
        .iter()
        .filter(|row| row.iter().all(|v| !v.is_nan()))
        .collect();

    let mut cov = vec![0.0; FEATURE_LEN * FEATURE_LEN];
    if clean.len() < 2 {
        return cov;
    }

    let n = clean.len() as f64;
    let mean: Vec<f64> = (0..FEATURE_LEN)
        .map(|j| clean.iter().map(|row| row[j]).sum::<f64>() / n)
        .collect();

    for row in &clean {
        for i in 0..FEATURE_LEN {
            let di = row[i] - mean[i];
            for j in 0..FEATURE_LEN {
                cov[i * FEATURE_LEN + j] += di * (row[j] - mean[j]);
            }
        }
    }
    for v in &mut cov {
        *v /= n - 1.0;
    }
    cov
}

/// Moore-Penrose pseudo-inverse through the SVD.
fn pseudo_inverse(matrix: &Mat<f64>) -> Mat<f64> {
    let svd = matrix.svd();
    let (u, s, v) = (svd.u(), svd.s_diagonal(), svd.v());

    let largest = (0..s.nrows()).map(|k| s.read(k)).fold(0.0, f64::max);
    let cutoff = PINV_RCOND * largest;
    let inverted: Vec<f64> = (0..s.nrows())
        .map(|k| {
            let sk = s.read(k);
            if sk > cutoff {
                1.0 / sk
            } else {
                0.0
            }
        })
        .collect();

    Mat::from_fn(matrix.ncols(), matrix.nrows(), |i, j| {
        inverted
            .iter()
            .enumerate()
            .map(|(k, inv)| v.read(i, k) * inv * u.read(j, k))
            .sum()
    })
}
