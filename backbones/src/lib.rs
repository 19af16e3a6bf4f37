//! Feature extractors for perceptual image metrics
//!
//! This crate provides the convolutional trunks that perceptual distances read
//! intermediate activations from. Only VGG16 is provided for now.

use burn::prelude::*;

mod vgg;

pub use vgg::{Vgg16Features, TORCHVISION_KEY_REMAP, VGG16_TAP_CHANNELS};

/// A network that exposes a list of intermediate activations.
pub trait FeatureExtractor<B: Backend> {
    /// Forward pass through the network
    ///
    /// # Arguments
    /// * `input` - Input tensor of shape `[batch_size, channels, height, width]`
    ///
    /// # Returns
    /// One feature map per tap, ordered from shallow to deep
    fn extract(&self, input: Tensor<B, 4>) -> Vec<Tensor<B, 4>>;

    /// Channel count of each tap, in the order returned by [`FeatureExtractor::extract`]
    fn output_channels(&self) -> Vec<usize>;

    /// Smallest spatial side the network accepts
    fn min_input_size(&self) -> usize;
}
