//! Peak signal-to-noise ratio.
//!
//! `PSNR = 20·log10(max_pixel) - 10·log10(MSE)` per sample, in decibels.
//! Identical inputs give `+inf`; the value is not clamped.

use std::f64::consts::LN_10;

use burn::prelude::*;
use burn_extra_ops::TensorExtraOps;

use crate::{
    config::MetricConfig,
    context::MetricContext,
    distortion::mse::mean_squared_error,
    engine::{required, Metric, MetricEngine},
    error::{MetricError, MetricResult},
    signal::Signal,
};

const NAME: &str = "PSNR";

/// Configuration for creating a [peak signal-to-noise ratio](Psnr) metric.
#[derive(Config, Debug)]
pub struct PsnrConfig {
    /// Shared evaluation options.
    #[config(default = "MetricConfig::new()")]
    pub base: MetricConfig,

    /// Peak signal value. `None` uses the per-sample maximum of `|reference|`.
    #[config(default = "Some(1.0)")]
    pub max_pixel: Option<f64>,
}

impl PsnrConfig {
    /// Initialize [peak signal-to-noise ratio](Psnr).
    pub fn init(&self) -> MetricResult<Psnr> {
        if let Some(max_pixel) = self.max_pixel {
            if max_pixel <= 0.0 || !max_pixel.is_finite() {
                return Err(MetricError::invalid_parameter(
                    NAME,
                    format!("max_pixel must be positive and finite, got {max_pixel}"),
                ));
            }
        }
        Ok(Psnr {
            engine: MetricEngine::new(self.base.clone()),
            max_pixel: self.max_pixel,
        })
    }
}

/// Peak signal-to-noise ratio. Higher is better.
#[derive(Debug, Clone)]
pub struct Psnr {
    engine: MetricEngine,
    max_pixel: Option<f64>,
}

impl Default for Psnr {
    fn default() -> Self {
        Self::new()
    }
}

impl Psnr {
    pub fn new() -> Self {
        Self {
            engine: MetricEngine::new(MetricConfig::new()),
            max_pixel: Some(1.0),
        }
    }
}

impl<B: Backend> Metric<B> for Psnr {
    fn name(&self) -> &str {
        NAME
    }

    fn higher_is_better(&self) -> bool {
        true
    }

    fn supports_complex(&self) -> bool {
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
        let reference = required(NAME, reference)?;
        let noise = mean_squared_error(estimate, reference.clone())
            .log()
            .mul_scalar(-10.0 / LN_10);

        let peak = match self.max_pixel {
            Some(max_pixel) => noise.add_scalar(20.0 * max_pixel.log10()),
            None => {
                let max = reference.modulus().per_sample_max();
                noise + max.log().mul_scalar(20.0 / LN_10)
            }
        };
        Ok(peak)
    }
}
