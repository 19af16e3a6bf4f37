//! Auxiliary inputs some metrics need besides the estimate and reference.

use burn::prelude::*;

/// Observations of a pan-sharpening forward operator.
#[derive(Debug, Clone)]
pub struct PansharpenMeasurement<B: Backend> {
    /// Low-resolution multispectral bands `[batch_size, bands, h, w]`.
    pub multispectral: Tensor<B, 4>,
    /// Full-resolution panchromatic image `[batch_size, 1, H, W]`.
    pub panchromatic: Tensor<B, 4>,
    /// Panchromatic image at the multispectral resolution. Derived by box
    /// decimation when absent.
    pub panchromatic_lowres: Option<Tensor<B, 4>>,
}

impl<B: Backend> PansharpenMeasurement<B> {
    pub fn new(multispectral: Tensor<B, 4>, panchromatic: Tensor<B, 4>) -> Self {
        Self {
            multispectral,
            panchromatic,
            panchromatic_lowres: None,
        }
    }

    pub fn with_panchromatic_lowres(mut self, panchromatic_lowres: Tensor<B, 4>) -> Self {
        self.panchromatic_lowres = Some(panchromatic_lowres);
        self
    }
}

/// Named side inputs passed to [`Metric::evaluate`](crate::Metric::evaluate).
///
/// Metrics ignore entries they do not use.
#[derive(Debug, Clone)]
pub struct MetricContext<B: Backend> {
    pub pansharpen: Option<PansharpenMeasurement<B>>,
}

impl<B: Backend> Default for MetricContext<B> {
    fn default() -> Self {
        Self { pansharpen: None }
    }
}

impl<B: Backend> MetricContext<B> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_pansharpen(mut self, measurement: PansharpenMeasurement<B>) -> Self {
        self.pansharpen = Some(measurement);
        self
    }
}
