//! Structural similarity index, single- and multi-scale.
//!
//! ```text
//! SSIM = (2·μx·μy + C1)(2·σxy + C2) / ((μx² + μy² + C1)(σx² + σy² + C2))
//! ```
//!
//! Local moments use a Gaussian window with "same" zero padding; the map is
//! averaged over channels and pixels. The multi-scale variant combines the
//! contrast-structure term of the first four dyadic scales with the full
//! index at the coarsest one:
//!
//! ```text
//! MS-SSIM = Π_{j<L} cs_j^{w_j} · ssim_L^{w_L}
//! ```

use burn::{prelude::*, tensor::activation::relu};
use burn_extra_ops::{box_decimate, gaussian_window, LocalStatistics, TensorExtraOps};

use crate::{
    config::MetricConfig,
    context::MetricContext,
    engine::{required, Metric, MetricEngine},
    error::{MetricError, MetricResult},
    signal::Signal,
};

const NAME: &str = "SSIM";

/// Per-scale exponents of MS-SSIM, finest first.
pub const MS_SSIM_WEIGHTS: [f64; 5] = [0.0448, 0.2856, 0.3001, 0.2363, 0.1333];

/// Configuration for creating an [SSIM](Ssim) metric.
#[derive(Config, Debug)]
pub struct SsimConfig {
    /// Shared evaluation options.
    #[config(default = "MetricConfig::new()")]
    pub base: MetricConfig,

    /// Size of the Gaussian window. Default: 11
    #[config(default = 11)]
    pub window_size: usize,

    /// Sigma parameter for Gaussian window. Default: 1.5
    #[config(default = 1.5)]
    pub sigma: f64,

    /// Luminance constant factor, `C1 = (k1·max_pixel)²`. Default: 0.01
    #[config(default = 0.01)]
    pub k1: f64,

    /// Contrast constant factor, `C2 = (k2·max_pixel)²`. Default: 0.03
    #[config(default = 0.03)]
    pub k2: f64,

    /// Dynamic range of the pixel values. Default: 1.0
    #[config(default = 1.0)]
    pub max_pixel: f64,

    /// Use the five-scale MS-SSIM.
    #[config(default = false)]
    pub multiscale: bool,
}

impl SsimConfig {
    /// Initialize [SSIM](Ssim).
    pub fn init(&self) -> MetricResult<Ssim> {
        self.assertions()?;
        Ok(self.build())
    }

    fn build(&self) -> Ssim {
        Ssim {
            engine: MetricEngine::new(self.base.clone()),
            window_size: self.window_size,
            sigma: self.sigma,
            c1: (self.k1 * self.max_pixel).powi(2),
            c2: (self.k2 * self.max_pixel).powi(2),
            multiscale: self.multiscale,
        }
    }

    fn assertions(&self) -> MetricResult<()> {
        if self.window_size == 0 || self.window_size % 2 == 0 {
            return Err(MetricError::invalid_parameter(
                NAME,
                format!("window size must be positive and odd, got {}", self.window_size),
            ));
        }
        let positive = [
            ("sigma", self.sigma),
            ("k1", self.k1),
            ("k2", self.k2),
            ("max_pixel", self.max_pixel),
        ];
        for (name, value) in positive {
            if value.is_nan() || value <= 0.0 {
                return Err(MetricError::invalid_parameter(
                    NAME,
                    format!("{name} must be positive, got {value}"),
                ));
            }
        }
        Ok(())
    }
}

/// Structural similarity. Higher is better, at most 1.
#[derive(Debug, Clone)]
pub struct Ssim {
    engine: MetricEngine,
    window_size: usize,
    sigma: f64,
    c1: f64,
    c2: f64,
    multiscale: bool,
}

impl Default for Ssim {
    fn default() -> Self {
        Self::new()
    }
}

impl Ssim {
    /// SSIM with the default configuration.
    pub fn new() -> Self {
        SsimConfig::new().build()
    }

    /// SSIM and contrast-structure maps at one scale.
    fn maps<B: Backend>(
        &self,
        x: Tensor<B, 4>,
        y: Tensor<B, 4>,
        window: Tensor<B, 4>,
    ) -> (Tensor<B, 4>, Tensor<B, 4>) {
        let stats = LocalStatistics::compute(x, y, window);

        let luminance = (stats.mean_x.clone() * stats.mean_y.clone())
            .mul_scalar(2.0)
            .add_scalar(self.c1)
            / (stats.mean_x.powi_scalar(2) + stats.mean_y.powi_scalar(2)).add_scalar(self.c1);
        let contrast_structure = stats.cov_xy.mul_scalar(2.0).add_scalar(self.c2)
            / (stats.var_x + stats.var_y).add_scalar(self.c2);

        (luminance * contrast_structure.clone(), contrast_structure)
    }

    fn multiscale_score<B: Backend>(
        &self,
        mut x: Tensor<B, 4>,
        mut y: Tensor<B, 4>,
        window: Tensor<B, 4>,
    ) -> MetricResult<Tensor<B, 1>> {
        let [batch_size, _, height, width] = x.dims();
        let min_side = 1 << (MS_SSIM_WEIGHTS.len() - 1);
        if height.min(width) < min_side {
            return Err(MetricError::invalid_input(
                NAME,
                format!("MS-SSIM needs a side of at least {min_side} pixels, got {height}x{width}"),
            ));
        }

        let last = MS_SSIM_WEIGHTS.len() - 1;
        let mut score = Tensor::<B, 1>::ones([batch_size], &x.device());
        for (level, weight) in MS_SSIM_WEIGHTS.iter().enumerate() {
            let (ssim, cs) = self.maps(x.clone(), y.clone(), window.clone());
            let term = if level == last { ssim } else { cs };
            score = score * relu(term.per_sample_mean()).powf_scalar(*weight);

            if level != last {
                x = box_decimate(x, 2);
                y = box_decimate(y, 2);
            }
        }
        Ok(score)
    }
}

impl<B: Backend> Metric<B> for Ssim {
    fn name(&self) -> &str {
        NAME
    }

    fn higher_is_better(&self) -> bool {
        true
    }

    fn engine(&self) -> &MetricEngine {
        &self.engine
    }

    fn score(
        &self,
        estimate: Signal<B>,
        reference: Option<Signal<B>>,
        _context: &MetricContext<B>,
    ) -> MetricResult<Tensor<B, 1>> {
        let x = estimate.into_real(NAME)?;
        let y = required(NAME, reference)?.into_real(NAME)?;

        let [_, channels, _, _] = x.dims();
        let window = gaussian_window::<B>(self.window_size, self.sigma, channels, &x.device());

        if self.multiscale {
            self.multiscale_score(x, y, window)
        } else {
            let (ssim, _) = self.maps(x, y, window);
            Ok(ssim.per_sample_mean())
        }
    }

    fn invert(&self, score: Tensor<B, 1>) -> Tensor<B, 1> {
        score.neg().add_scalar(1.0)
    }
}
