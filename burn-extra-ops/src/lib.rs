//! Additional operations for the Burn deep learning framework
//!
//! This crate provides image-processing operations that image quality metrics need
//! but that are not available in the core Burn framework: Gaussian windows,
//! windowed moments, box decimation, spectral-response projection, and
//! per-sample reductions over batched tensors.

use burn::prelude::*;

mod decimate;
mod decolorize;
mod local_stats;
mod window;

// Convenient re-exports
pub use decimate::box_decimate;
pub use decolorize::{Decolorize, DecolorizeError, REC601};
pub use local_stats::LocalStatistics;
pub use window::{filter2d, gaussian_kernel_1d, gaussian_window};

/// Per-sample reductions over every axis but the leading batch axis.
pub trait TensorExtraOps<B: Backend, const D: usize> {
    /// Mean of each sample, shape `[batch_size]`.
    fn per_sample_mean(self) -> Tensor<B, 1>;
    /// Sum of each sample, shape `[batch_size]`.
    fn per_sample_sum(self) -> Tensor<B, 1>;
    /// Maximum of each sample, shape `[batch_size]`.
    fn per_sample_max(self) -> Tensor<B, 1>;
    /// Minimum of each sample, shape `[batch_size]`.
    fn per_sample_min(self) -> Tensor<B, 1>;
}

impl<B: Backend, const D: usize> TensorExtraOps<B, D> for Tensor<B, D> {
    fn per_sample_mean(self) -> Tensor<B, 1> {
        flatten_samples(self).mean_dim(1).squeeze(1)
    }

    fn per_sample_sum(self) -> Tensor<B, 1> {
        flatten_samples(self).sum_dim(1).squeeze(1)
    }

    fn per_sample_max(self) -> Tensor<B, 1> {
        flatten_samples(self).max_dim(1).squeeze(1)
    }

    fn per_sample_min(self) -> Tensor<B, 1> {
        flatten_samples(self).min_dim(1).squeeze(1)
    }
}

fn flatten_samples<B: Backend, const D: usize>(tensor: Tensor<B, D>) -> Tensor<B, 2> {
    let batch_size = tensor.dims()[0];
    tensor.reshape([batch_size as i32, -1])
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::{
        backend::{ndarray::NdArray, Autodiff},
        tensor::{ops::FloatElem, TensorData, Tolerance},
    };

    pub type TestBackend = NdArray<f32>;
    type FT = FloatElem<TestBackend>;

    #[test]
    fn per_sample_reductions_keep_batch_axis() {
        let device = Default::default();
        let tensor = Tensor::<TestBackend, 3>::from_floats(
            [[[1.0, 2.0], [3.0, 4.0]], [[-1.0, 0.0], [5.0, 0.0]]],
            &device,
        );

        tensor
            .clone()
            .per_sample_mean()
            .into_data()
            .assert_approx_eq::<FT>(&TensorData::from([2.5, 1.0]), Tolerance::default());
        tensor
            .clone()
            .per_sample_sum()
            .into_data()
            .assert_approx_eq::<FT>(&TensorData::from([10.0, 4.0]), Tolerance::default());
        tensor
            .clone()
            .per_sample_max()
            .into_data()
            .assert_approx_eq::<FT>(&TensorData::from([4.0, 5.0]), Tolerance::default());
        tensor
            .per_sample_min()
            .into_data()
            .assert_approx_eq::<FT>(&TensorData::from([1.0, -1.0]), Tolerance::default());
    }

    #[test]
    fn per_sample_mean_propagates_gradients() {
        let device = Default::default();
        let tensor =
            Tensor::<Autodiff<TestBackend>, 4>::ones([2, 1, 2, 2], &device).require_grad();

        let grads = tensor.clone().per_sample_mean().sum().backward();
        let grad = tensor.grad(&grads).expect("gradient should be tracked");

        let expected = TensorData::from([
            [[[0.25, 0.25], [0.25, 0.25]]],
            [[[0.25, 0.25], [0.25, 0.25]]],
        ]);
        grad.into_data()
            .assert_approx_eq::<FT>(&expected, Tolerance::default());
    }
}
