//! Convex mix of absolute and squared error, `α·MAE + (1 - α)·MSE`.

use burn::prelude::*;

use crate::{
    config::MetricConfig,
    context::MetricContext,
    distortion::{mae::mean_absolute_error, mse::mean_squared_error},
    engine::{required, Metric, MetricEngine},
    error::{MetricError, MetricResult},
    signal::Signal,
};

const NAME: &str = "L1L2";

/// Configuration for creating an [L1L2](L1L2) metric.
#[derive(Config, Debug)]
pub struct L1L2Config {
    /// Shared evaluation options.
    #[config(default = "MetricConfig::new()")]
    pub base: MetricConfig,

    /// Weight of the absolute error, in `[0, 1]`.
    #[config(default = 0.5)]
    pub alpha: f64,
}

impl L1L2Config {
    /// Initialize [L1L2](L1L2).
    pub fn init(&self) -> MetricResult<L1L2> {
        if !(0.0..=1.0).contains(&self.alpha) {
            return Err(MetricError::invalid_parameter(
                NAME,
                format!("alpha must lie in [0, 1], got {}", self.alpha),
            ));
        }
        Ok(L1L2 {
            engine: MetricEngine::new(self.base.clone()),
            alpha: self.alpha,
        })
    }
}

/// Weighted sum of mean absolute and mean squared error. Lower is better.
#[derive(Debug, Clone)]
pub struct L1L2 {
    engine: MetricEngine,
    alpha: f64,
}

impl Default for L1L2 {
    fn default() -> Self {
        Self::new()
    }
}

impl L1L2 {
    pub fn new() -> Self {
        Self {
            engine: MetricEngine::new(MetricConfig::new()),
            alpha: 0.5,
        }
    }
}

impl<B: Backend> Metric<B> for L1L2 {
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
        let l1 = mean_absolute_error(estimate.clone(), reference.clone());
        let l2 = mean_squared_error(estimate, reference);
        Ok(l1.mul_scalar(self.alpha) + l2.mul_scalar(1.0 - self.alpha))
    }
}

#[cfg(test)]
mod tests {
    use burn::tensor::{ops::FloatElem, TensorData, Tolerance};

    use super::*;
    use crate::tests::{complex_pair_with_zero_residual, TestBackend};

    type FT = FloatElem<TestBackend>;

    #[test]
    fn l1l2_mixes_both_errors() {
        let device = Default::default();
        let estimate = Tensor::<TestBackend, 4>::full([1, 1, 2, 2], 2.0, &device);
        let reference = Tensor::<TestBackend, 4>::zeros([1, 1, 2, 2], &device);

        let score = L1L2Config::new()
            .with_alpha(0.25)
            .init()
            .unwrap()
            .forward(estimate, reference)
            .unwrap();

        // 0.25 * 2 + 0.75 * 4
        score
            .into_data()
            .assert_approx_eq::<FT>(&TensorData::from([3.5]), Tolerance::default());
    }

    #[test]
    fn l1l2_rejects_alpha_outside_unit_interval() {
        for alpha in [-0.1, 1.5] {
            let err = L1L2Config::new().with_alpha(alpha).init().unwrap_err();
            assert!(matches!(err, MetricError::InvalidParameter { .. }));
        }
    }

    #[test]
    fn l1l2_complex_gradient_is_finite_at_zero_residual() {
        let (real, estimate, reference) = complex_pair_with_zero_residual();

        let grads = L1L2::new()
            .evaluate(estimate, Some(reference), &MetricContext::default())
            .unwrap()
            .backward();

        // 0.5 * 1/sqrt(5) from the L1 term plus 0.5 * 2 from the L2 term
        let expected = 0.5 / 5.0f32.sqrt() + 1.0;
        real.grad(&grads)
            .unwrap()
            .into_data()
            .assert_approx_eq::<FT>(&TensorData::from([[[[0.0, expected]]]]), Tolerance::default());
    }
}
