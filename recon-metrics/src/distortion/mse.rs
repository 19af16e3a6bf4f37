//! Mean squared error.
//!
//! `MSE(x, y) = mean |x - y|²` over channels and pixels of each sample. For
//! complex signals `|·|` is the modulus.

use burn::prelude::*;
use burn_extra_ops::TensorExtraOps;

use crate::{
    config::MetricConfig,
    context::MetricContext,
    engine::{required, Metric, MetricEngine},
    error::MetricResult,
    signal::Signal,
};

const NAME: &str = "MSE";

/// Configuration for creating a [mean squared error](Mse) metric.
#[derive(Config, Debug)]
pub struct MseConfig {
    /// Shared evaluation options.
    #[config(default = "MetricConfig::new()")]
    pub base: MetricConfig,
}

impl MseConfig {
    /// Initialize [mean squared error](Mse).
    pub fn init(&self) -> MetricResult<Mse> {
        Ok(Mse {
            engine: MetricEngine::new(self.base.clone()),
        })
    }
}

/// Mean squared error. Lower is better.
#[derive(Debug, Clone)]
pub struct Mse {
    engine: MetricEngine,
}

impl Default for Mse {
    fn default() -> Self {
        Self::new()
    }
}

impl Mse {
    pub fn new() -> Self {
        Self {
            engine: MetricEngine::new(MetricConfig::new()),
        }
    }
}

/// Per-sample mean of `|estimate - reference|²`.
pub(crate) fn mean_squared_error<B: Backend>(
    estimate: Signal<B>,
    reference: Signal<B>,
) -> Tensor<B, 1> {
    estimate
        .residual(reference)
        .squared_modulus()
        .per_sample_mean()
}

impl<B: Backend> Metric<B> for Mse {
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
        Ok(mean_squared_error(estimate, reference))
    }
}

#[cfg(test)]
mod tests {
    use burn::tensor::{ops::FloatElem, TensorData, Tolerance};

    use super::*;
    use crate::{
        config::{ComplexMode, Reduction},
        tests::TestBackend,
    };

    type FT = FloatElem<TestBackend>;

    #[test]
    fn mse_of_known_residual() {
        let device = Default::default();
        let metric = MseConfig::new()
            .with_base(MetricConfig::new().with_reduction(Reduction::None))
            .init()
            .unwrap();

        let estimate = Tensor::<TestBackend, 4>::from_floats(
            [[[[1.0, 2.0], [3.0, 4.0]]], [[[0.0, 0.0], [0.0, 0.0]]]],
            &device,
        );
        let reference = Tensor::<TestBackend, 4>::from_floats(
            [[[[1.0, 0.0], [3.0, 0.0]]], [[[1.0, 1.0], [1.0, 1.0]]]],
            &device,
        );

        let score = metric.forward(estimate, reference).unwrap();

        score
            .into_data()
            .assert_approx_eq::<FT>(&TensorData::from([5.0, 1.0]), Tolerance::default());
    }

    #[test]
    fn mse_complex_uses_modulus() {
        let device = Default::default();
        let metric = Mse::new();

        let estimate = Signal::from_parts(
            Tensor::<TestBackend, 4>::from_floats([[[[3.0, 0.0]]]], &device),
            Tensor::<TestBackend, 4>::from_floats([[[[4.0, 0.0]]]], &device),
        );
        let reference = Signal::Real(Tensor::<TestBackend, 4>::zeros([1, 1, 1, 2], &device));

        let score = metric
            .evaluate(estimate, Some(reference), &MetricContext::default())
            .unwrap();

        score
            .into_data()
            .assert_approx_eq::<FT>(&TensorData::from([12.5]), Tolerance::default());
    }

    #[test]
    fn mse_complex_real_part_only() {
        let device = Default::default();
        let metric = MseConfig::new()
            .with_base(MetricConfig::new().with_complex_mode(ComplexMode::Real))
            .init()
            .unwrap();

        let estimate = Signal::from_parts(
            Tensor::<TestBackend, 4>::from_floats([[[[3.0, 1.0]]]], &device),
            Tensor::<TestBackend, 4>::from_floats([[[[4.0, 9.0]]]], &device),
        );
        let reference = Signal::Real(Tensor::<TestBackend, 4>::zeros([1, 1, 1, 2], &device));

        let score = metric
            .evaluate(estimate, Some(reference), &MetricContext::default())
            .unwrap();

        score
            .into_data()
            .assert_approx_eq::<FT>(&TensorData::from([5.0]), Tolerance::default());
    }
}
