//! # Reconstruction Metrics
//!
//! Image quality metrics for reconstruction and inverse problems, written
//! against [`burn`] tensors so scores can be used as training losses.
//!
//! Every metric implements [`Metric`]. Concrete metrics only define a
//! per-sample score; the shared [`MetricEngine`] handles reference policy,
//! centre cropping, broadcasting, complex inputs, normalization, loss
//! inversion and batch reduction, all configured through [`MetricConfig`].
//!
//! ## Metrics
//!
//! - Distortion: [`Mse`], [`Nmse`], [`Mae`], [`Psnr`], [`Ssim`], [`L1L2`], [`LpNorm`]
//! - No-reference pan-sharpening: [`Qnr`]
//! - Perceptual: [`Lpips`] (full-reference), [`Niqe`] (no-reference)
//!
//! ## Example
//!
//! ```ignore
//! use recon_metrics::{Metric, MetricConfig, Reduction, SsimConfig};
//!
//! let ssim = SsimConfig::new()
//!     .with_base(MetricConfig::new().with_reduction(Reduction::None))
//!     .init()?;
//! let per_image = ssim.forward(estimate, reference)?;
//! ```

pub mod aggregator;
pub mod config;
pub mod context;
pub mod distortion;
pub mod engine;
pub mod error;
pub mod perceptual;
pub mod signal;
pub mod suite;

pub use aggregator::{MetricAverage, MetricsAggregator};
pub use config::{ComplexMode, MetricConfig, NormInputs, Reduction};
pub use context::{MetricContext, PansharpenMeasurement};
pub use distortion::{
    L1L2Config, LpNorm, LpNormConfig, Mae, MaeConfig, Mse, MseConfig, Nmse, NmseConfig, Psnr,
    PsnrConfig, Qnr, QnrConfig, Ssim, SsimConfig, L1L2,
};
pub use engine::{Metric, MetricEngine, ReferenceMode};
pub use error::{MetricError, MetricResult};
pub use perceptual::{Lpips, LpipsConfig, LpipsNetwork, Niqe, NiqeConfig, NiqePrior};
pub use signal::Signal;
pub use suite::{MetricScore, MetricSuite};

#[cfg(test)]
mod tests {
    use burn::{
        backend::{ndarray::NdArray, Autodiff},
        prelude::*,
    };

    use crate::signal::Signal;

    pub type TestBackend = NdArray<f32>;
    pub type TestAutodiffBackend = Autodiff<TestBackend>;

    /// Complex estimate and reference whose residual is `[0, 2 + i]`.
    ///
    /// Returns the tracked real part of the estimate alongside the pair.
    pub fn complex_pair_with_zero_residual() -> (
        Tensor<TestAutodiffBackend, 4>,
        Signal<TestAutodiffBackend>,
        Signal<TestAutodiffBackend>,
    ) {
        let device = Default::default();
        let real =
            Tensor::<TestAutodiffBackend, 4>::from_floats([[[[1.0, 2.0]]]], &device).require_grad();
        let imag = Tensor::<TestAutodiffBackend, 4>::from_floats([[[[0.0, 1.0]]]], &device);
        let reference = Signal::from_parts(
            Tensor::from_floats([[[[1.0, 0.0]]]], &device),
            Tensor::zeros([1, 1, 1, 2], &device),
        );
        (real.clone(), Signal::from_parts(real, imag), reference)
    }
}
