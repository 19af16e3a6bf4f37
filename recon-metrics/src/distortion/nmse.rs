//! Normalized mean squared error, `‖x - y‖² / ‖y‖²`.

use std::f64::consts::LN_10;

use burn::prelude::*;
use burn_extra_ops::TensorExtraOps;

use crate::{
    config::MetricConfig,
    context::MetricContext,
    engine::{required, Metric, MetricEngine},
    error::MetricResult,
    signal::Signal,
};

const NAME: &str = "NMSE";

/// Configuration for creating a [normalized mean squared error](Nmse) metric.
#[derive(Config, Debug)]
pub struct NmseConfig {
    /// Shared evaluation options.
    #[config(default = "MetricConfig::new()")]
    pub base: MetricConfig,

    /// Report `10·log10(NMSE)` instead of the ratio.
    #[config(default = false)]
    pub in_db: bool,
}

impl NmseConfig {
    /// Initialize [normalized mean squared error](Nmse).
    pub fn init(&self) -> MetricResult<Nmse> {
        Ok(Nmse {
            engine: MetricEngine::new(self.base.clone()),
            in_db: self.in_db,
        })
    }
}

/// Normalized mean squared error. Lower is better.
///
/// A zero reference gives an infinite or undefined score.
#[derive(Debug, Clone)]
pub struct Nmse {
    engine: MetricEngine,
    in_db: bool,
}

impl Default for Nmse {
    fn default() -> Self {
        Self::new()
    }
}

impl Nmse {
    pub fn new() -> Self {
        Self {
            engine: MetricEngine::new(MetricConfig::new()),
            in_db: false,
        }
    }
}

impl<B: Backend> Metric<B> for Nmse {
    fn name(&self) -> &str {
        NAME
    }

    fn higher_is_better(&self) -> bool {
        false
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
        let energy = reference.clone().squared_modulus().per_sample_sum();
        let error = estimate.residual(reference).squared_modulus().per_sample_sum();
        let ratio = error / energy;

        if self.in_db {
            Ok(ratio.log().mul_scalar(10.0 / LN_10))
        } else {
            Ok(ratio)
        }
    }
}
