//! Gaussian windows and depthwise filtering.
//!
//! The window is built on the host and uploaded once; filtering uses a grouped
//! convolution so every channel is smoothed independently.

use burn::{
    prelude::*,
    tensor::{module::conv2d, ops::ConvOptions, TensorData},
};

/// Normalized 1D Gaussian kernel of `size` taps centred on `size / 2`.
pub fn gaussian_kernel_1d(size: usize, sigma: f64) -> Vec<f64> {
    let mean = (size / 2) as f64;
    let mut kernel: Vec<f64> = (0..size)
        .map(|i| {
            let x = i as f64 - mean;
            (-(x * x) / (2.0 * sigma * sigma)).exp()
        })
        .collect();

    let sum: f64 = kernel.iter().sum();
    for val in &mut kernel {
        *val /= sum;
    }
    kernel
}

/// Depthwise Gaussian window with shape `[channels, 1, size, size]`.
pub fn gaussian_window<B: Backend>(
    size: usize,
    sigma: f64,
    channels: usize,
    device: &B::Device,
) -> Tensor<B, 4> {
    let gauss_1d = gaussian_kernel_1d(size, sigma);

    // Outer product of the 1D kernel with itself, repeated per channel
    let mut values = Vec::with_capacity(channels * size * size);
    for _ in 0..channels {
        for row in &gauss_1d {
            for col in &gauss_1d {
                values.push(row * col);
            }
        }
    }

    Tensor::from_data(TensorData::new(values, [channels, 1, size, size]), device)
}

/// Applies a depthwise window with "same" zero padding.
///
/// # Shapes
///
/// - input: `[batch_size, channels, height, width]`
/// - window: `[channels, 1, k, k]` with `k` odd
/// - output: `[batch_size, channels, height, width]`
pub fn filter2d<B: Backend>(input: Tensor<B, 4>, window: Tensor<B, 4>) -> Tensor<B, 4> {
    let [channels, _, size, _] = window.dims();
    let padding = size / 2;
    conv2d(
        input,
        window,
        None,
        ConvOptions::new([1, 1], [padding, padding], [1, 1], channels),
    )
}
