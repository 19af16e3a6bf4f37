//! Spectral-response projection of multi-band images onto a single band.
//!
//! Used to derive a luminance image from RGB, following the rec601 convention
//! by default. The response weights must sum to one.

use burn::{prelude::*, tensor::TensorData};
use thiserror::Error;

/// rec601 luminance weights, rescaled to sum to one.
pub const REC601: [f64; 3] = [0.4472 * 0.66851, 0.8781 * 0.66851, 0.1706 * 0.66851];

/// Errors raised when building a [`Decolorize`] projection.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DecolorizeError {
    /// The response has more weights than the image has channels.
    #[error("spectral response has {weights} weights but only {channels} channels")]
    TooManyWeights {
        /// Number of supplied weights.
        weights: usize,
        /// Number of image channels.
        channels: usize,
    },

    /// The response weights do not sum to one.
    #[error("spectral response must sum to 1, got {sum}")]
    NotNormalized {
        /// Actual sum of the weights.
        sum: f64,
    },
}

/// Projects `[N, C, H, W]` images onto `[N, 1, H, W]` with a fixed spectral response.
#[derive(Debug, Clone, PartialEq)]
pub struct Decolorize {
    srf: Vec<f64>,
}

impl Decolorize {
    /// rec601 projection for RGB images.
    pub fn rec601() -> Self {
        Self {
            srf: REC601.to_vec(),
        }
    }

    /// Custom response for `channels` bands; missing trailing weights are zero.
    pub fn new(mut srf: Vec<f64>, channels: usize) -> Result<Self, DecolorizeError> {
        if srf.len() > channels {
            return Err(DecolorizeError::TooManyWeights {
                weights: srf.len(),
                channels,
            });
        }

        let sum: f64 = srf.iter().sum();
        if (sum - 1.0).abs() > 1e-4 {
            return Err(DecolorizeError::NotNormalized { sum });
        }

        srf.resize(channels, 0.0);
        Ok(Self { srf })
    }

    /// Number of bands this projection expects.
    pub fn channels(&self) -> usize {
        self.srf.len()
    }

    /// Weighted sum over the channel axis.
    ///
    /// # Panics
    ///
    /// When the input channel count differs from [`Decolorize::channels`].
    pub fn forward<B: Backend>(&self, input: Tensor<B, 4>) -> Tensor<B, 4> {
        let [_, channels, _, _] = input.dims();
        assert_eq!(
            channels,
            self.srf.len(),
            "Input has {channels} channels but the spectral response has {}",
            self.srf.len()
        );

        let weights = Tensor::<B, 4>::from_data(
            TensorData::new(self.srf.clone(), [1, channels, 1, 1]),
            &input.device(),
        );
        (input * weights).sum_dim(1)
    }
}

#[cfg(test)]
mod tests {
    use burn::tensor::{ops::FloatElem, Tolerance};

    use super::*;
    use crate::tests::TestBackend;

    type FT = FloatElem<TestBackend>;

    #[test]
    fn rec601_preserves_constant_images() {
        let device = Default::default();
        let input = Tensor::<TestBackend, 4>::ones([1, 3, 3, 3], &device);

        let output = Decolorize::rec601().forward(input);

        output.into_data().assert_approx_eq::<FT>(
            &TensorData::from([[[[1.0, 1.0, 1.0], [1.0, 1.0, 1.0], [1.0, 1.0, 1.0]]]]),
            Tolerance::rel_abs(1e-3, 1e-3),
        );
    }

    #[test]
    fn custom_response_is_zero_padded() {
        let decolorize = Decolorize::new(vec![0.5, 0.5], 4).unwrap();
        assert_eq!(decolorize.channels(), 4);
    }

    #[test]
    fn unnormalized_response_is_rejected() {
        let err = Decolorize::new(vec![0.5, 0.2], 3).unwrap_err();
        assert!(matches!(err, DecolorizeError::NotNormalized { .. }));
    }

    #[test]
    fn oversized_response_is_rejected() {
        let err = Decolorize::new(vec![0.25; 4], 3).unwrap_err();
        assert_eq!(
            err,
            DecolorizeError::TooManyWeights {
                weights: 4,
                channels: 3
            }
        );
    }
}
