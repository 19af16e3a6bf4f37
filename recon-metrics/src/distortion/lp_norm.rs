//! Mean `p`-th power of the absolute error.
//!
//! `LpNorm(x, y) = mean |x - y|^p`. Normalized by the element count, so
//! `p = 2` coincides with [MSE](super::Mse). The one-sided variant only
//! penalises `max(x - y, 0)`.

use burn::{prelude::*, tensor::activation::relu};
use burn_extra_ops::TensorExtraOps;

use crate::{
    config::MetricConfig,
    context::MetricContext,
    engine::{required, Metric, MetricEngine},
    error::{MetricError, MetricResult},
    signal::Signal,
};

const NAME: &str = "LpNorm";

/// Configuration for creating an [Lp norm](LpNorm) metric.
#[derive(Config, Debug)]
pub struct LpNormConfig {
    /// Shared evaluation options.
    #[config(default = "MetricConfig::new()")]
    pub base: MetricConfig,

    /// Exponent, strictly positive.
    #[config(default = 2.0)]
    pub p: f64,

    /// Only penalise positive residuals. Real inputs only.
    #[config(default = false)]
    pub onesided: bool,
}

impl LpNormConfig {
    /// Initialize [Lp norm](LpNorm).
    pub fn init(&self) -> MetricResult<LpNorm> {
        if !(self.p > 0.0 && self.p.is_finite()) {
            return Err(MetricError::invalid_parameter(
                NAME,
                format!("p must be positive and finite, got {}", self.p),
            ));
        }
        Ok(LpNorm {
            engine: MetricEngine::new(self.base.clone()),
            p: self.p,
            onesided: self.onesided,
        })
    }
}

/// Mean `p`-th power error. Lower is better.
#[derive(Debug, Clone)]
pub struct LpNorm {
    engine: MetricEngine,
    p: f64,
    onesided: bool,
}

impl Default for LpNorm {
    fn default() -> Self {
        Self::new()
    }
}

impl LpNorm {
    pub fn new() -> Self {
        Self {
            engine: MetricEngine::new(MetricConfig::new()),
            p: 2.0,
            onesided: false,
        }
    }
}

impl LpNorm {
    /// `magnitude^p` for non-negative magnitudes.
    fn power<B: Backend>(&self, magnitude: Tensor<B, 4>) -> Tensor<B, 4> {
        if self.p.fract() == 0.0 && self.p <= i32::MAX as f64 {
            return magnitude.powi_scalar(self.p as i32);
        }
        // pow has an unbounded derivative at zero for p < 1.
        let zero = magnitude.clone().equal_elem(0.0);
        magnitude
            .mask_fill(zero.clone(), 1.0)
            .powf_scalar(self.p)
            .mask_fill(zero, 0.0)
    }
}

impl<B: Backend> Metric<B> for LpNorm {
    fn name(&self) -> &str {
        NAME
    }

    fn higher_is_better(&self) -> bool {
        false
    }

    fn supports_complex(&self) -> bool {
        !self.onesided
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

        if self.onesided {
            let residual = estimate.into_real(NAME)? - reference.into_real(NAME)?;
            return Ok(self.power(relu(residual)).per_sample_mean());
        }

        let residual = estimate.residual(reference);
        // Even exponents need no square root, so zero residuals keep a zero gradient.
        let powered = if self.p % 2.0 == 0.0 && self.p <= i32::MAX as f64 {
            residual.squared_modulus().powi_scalar((self.p / 2.0) as i32)
        } else {
            self.power(residual.modulus())
        };
        Ok(powered.per_sample_mean())
    }
}

#[cfg(test)]
mod tests {
    use burn::tensor::{ops::FloatElem, TensorData, Tolerance};

    use super::*;
    use crate::tests::{complex_pair_with_zero_residual, TestAutodiffBackend, TestBackend};

    type FT = FloatElem<TestBackend>;

    #[test]
    fn lp_norm_with_p_one_is_mae() {
        let device = Default::default();
        let estimate = Tensor::<TestBackend, 4>::from_floats([[[[1.0, -3.0]]]], &device);
        let reference = Tensor::<TestBackend, 4>::zeros([1, 1, 1, 2], &device);

        let score = LpNormConfig::new()
            .with_p(1.0)
            .init()
            .unwrap()
            .forward(estimate, reference)
            .unwrap();

        score
            .into_data()
            .assert_approx_eq::<FT>(&TensorData::from([2.0]), Tolerance::default());
    }

    #[test]
    fn lp_norm_fractional_exponent() {
        let device = Default::default();
        let estimate = Tensor::<TestBackend, 4>::from_floats([[[[4.0, 0.0]]]], &device);
        let reference = Tensor::<TestBackend, 4>::zeros([1, 1, 1, 2], &device);

        let score = LpNormConfig::new()
            .with_p(0.5)
            .init()
            .unwrap()
            .forward(estimate, reference)
            .unwrap();

        score
            .into_data()
            .assert_approx_eq::<FT>(&TensorData::from([1.0]), Tolerance::default());
    }

    #[test]
    fn lp_norm_onesided_ignores_negative_residuals() {
        let device = Default::default();
        let estimate = Tensor::<TestBackend, 4>::from_floats([[[[2.0, -2.0]]]], &device);
        let reference = Tensor::<TestBackend, 4>::zeros([1, 1, 1, 2], &device);

        let score = LpNormConfig::new()
            .with_onesided(true)
            .init()
            .unwrap()
            .forward(estimate, reference)
            .unwrap();

        score
            .into_data()
            .assert_approx_eq::<FT>(&TensorData::from([2.0]), Tolerance::default());
    }

    #[test]
    fn lp_norm_rejects_non_positive_exponent() {
        for p in [0.0, -1.0] {
            let err = LpNormConfig::new().with_p(p).init().unwrap_err();
            assert!(matches!(err, MetricError::InvalidParameter { .. }));
        }
    }

    #[test]
    fn lp_norm_even_exponent_matches_mse_gradient_on_complex_input() {
        let (real, estimate, reference) = complex_pair_with_zero_residual();

        let loss = LpNorm::new()
            .evaluate(estimate, Some(reference), &MetricContext::default())
            .unwrap();
        loss.clone()
            .into_data()
            .assert_approx_eq::<FT>(&TensorData::from([2.5]), Tolerance::default());
        let grads = loss.backward();

        // d/d re mean|r|² = re
        real.grad(&grads)
            .unwrap()
            .into_data()
            .assert_approx_eq::<FT>(&TensorData::from([[[[0.0, 2.0]]]]), Tolerance::default());
    }

    #[test]
    fn lp_norm_odd_exponent_has_finite_gradient_at_zero_residual() {
        let (real, estimate, reference) = complex_pair_with_zero_residual();

        let grads = LpNormConfig::new()
            .with_p(1.0)
            .init()
            .unwrap()
            .evaluate(estimate, Some(reference), &MetricContext::default())
            .unwrap()
            .backward();

        // re / (2 |r|) where r = 2 + i
        let expected = 1.0 / 5.0f32.sqrt();
        real.grad(&grads)
            .unwrap()
            .into_data()
            .assert_approx_eq::<FT>(&TensorData::from([[[[0.0, expected]]]]), Tolerance::default());
    }

    #[test]
    fn lp_norm_fractional_exponent_has_zero_gradient_at_zero_residual() {
        let device = Default::default();
        let estimate =
            Tensor::<TestAutodiffBackend, 4>::from_floats([[[[0.0, 4.0]]]], &device).require_grad();
        let reference = Tensor::<TestAutodiffBackend, 4>::zeros([1, 1, 1, 2], &device);

        let grads = LpNormConfig::new()
            .with_p(0.5)
            .init()
            .unwrap()
            .forward(estimate.clone(), reference)
            .unwrap()
            .backward();

        // d/dx mean sqrt|x| = 1 / (4 sqrt x) at x = 4
        estimate
            .grad(&grads)
            .unwrap()
            .into_data()
            .assert_approx_eq::<FT>(&TensorData::from([[[[0.0, 0.125]]]]), Tolerance::default());
    }
}
