//! Mean absolute error.
//!
//! `MAE(x, y) = mean |x - y|` over channels and pixels of each sample.

use burn::prelude::*;
use burn_extra_ops::TensorExtraOps;

use crate::{
    config::MetricConfig,
    context::MetricContext,
    engine::{required, Metric, MetricEngine},
    error::MetricResult,
    signal::Signal,
};

const NAME: &str = "MAE";

/// Configuration for creating a [mean absolute error](Mae) metric.
#[derive(Config, Debug)]
pub struct MaeConfig {
    /// Shared evaluation options.
    #[config(default = "MetricConfig::new()")]
    pub base: MetricConfig,
}

impl MaeConfig {
    /// Initialize [mean absolute error](Mae).
    pub fn init(&self) -> MetricResult<Mae> {
        Ok(Mae {
            engine: MetricEngine::new(self.base.clone()),
        })
    }
}

/// Mean absolute error. Lower is better.
#[derive(Debug, Clone)]
pub struct Mae {
    engine: MetricEngine,
}

impl Default for Mae {
    fn default() -> Self {
        Self::new()
    }
}

impl Mae {
    pub fn new() -> Self {
        Self {
            engine: MetricEngine::new(MetricConfig::new()),
        }
    }
}

/// Per-sample mean of `|estimate - reference|`.
pub(crate) fn mean_absolute_error<B: Backend>(
    estimate: Signal<B>,
    reference: Signal<B>,
) -> Tensor<B, 1> {
    estimate.residual(reference).modulus().per_sample_mean()
}

impl<B: Backend> Metric<B> for Mae {
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
        Ok(mean_absolute_error(estimate, reference))
    }
}
