//! Windowed first and second moments of two images.
//!
//! Shared by structural similarity and the universal quality index, which only
//! differ in how they combine these moments.

use burn::prelude::*;

use crate::window::filter2d;

/// Local means, variances and covariance of two images under one window.
#[derive(Debug, Clone)]
pub struct LocalStatistics<B: Backend> {
    /// Local mean of the first image.
    pub mean_x: Tensor<B, 4>,
    /// Local mean of the second image.
    pub mean_y: Tensor<B, 4>,
    /// Local variance of the first image.
    pub var_x: Tensor<B, 4>,
    /// Local variance of the second image.
    pub var_y: Tensor<B, 4>,
    /// Local covariance of the two images.
    pub cov_xy: Tensor<B, 4>,
}

impl<B: Backend> LocalStatistics<B> {
    /// Computes the statistics with a depthwise `window` (see [`filter2d`]).
    ///
    /// # Shapes
    ///
    /// - x, y: `[batch_size, channels, height, width]`
    /// - window: `[channels, 1, k, k]`
    pub fn compute(x: Tensor<B, 4>, y: Tensor<B, 4>, window: Tensor<B, 4>) -> Self {
        let mean_x = filter2d(x.clone(), window.clone());
        let mean_y = filter2d(y.clone(), window.clone());

        let mean_x_sq = mean_x.clone().powi_scalar(2);
        let mean_y_sq = mean_y.clone().powi_scalar(2);
        let mean_xy = mean_x.clone() * mean_y.clone();

        let var_x = filter2d(x.clone().powi_scalar(2), window.clone()) - mean_x_sq;
        let var_y = filter2d(y.clone().powi_scalar(2), window.clone()) - mean_y_sq;
        let cov_xy = filter2d(x * y, window) - mean_xy;

        Self {
            mean_x,
            mean_y,
            var_x,
            var_y,
            cov_xy,
        }
    }
}
