//! The shared evaluation pipeline and the metric contract.

use burn::prelude::*;

use crate::{
    config::{ComplexMode, MetricConfig, NormInputs, Reduction},
    context::MetricContext,
    error::{MetricError, MetricResult},
    signal::Signal,
};

/// Whether a metric compares against a reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReferenceMode {
    /// Full-reference: evaluation fails without one.
    Required,
    /// No-reference: a supplied reference is dropped.
    Ignored,
}

/// Pre- and post-processing common to every metric.
///
/// Built from a [`MetricConfig`] and owned by each metric. Concrete metrics
/// only see inputs that already passed the reference, crop, shape, complex and
/// normalization stages.
#[derive(Debug, Clone)]
pub struct MetricEngine {
    config: MetricConfig,
}

impl MetricEngine {
    pub fn new(config: MetricConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &MetricConfig {
        &self.config
    }

    /// Runs the input stages of the pipeline.
    pub fn prepare<B: Backend>(
        &self,
        name: &str,
        reference_mode: ReferenceMode,
        supports_complex: bool,
        estimate: Signal<B>,
        reference: Option<Signal<B>>,
    ) -> MetricResult<(Signal<B>, Option<Signal<B>>)> {
        let reference = match (reference_mode, reference) {
            (ReferenceMode::Required, None) => {
                return Err(MetricError::MissingReference {
                    metric: name.to_owned(),
                })
            }
            (ReferenceMode::Ignored, Some(_)) => {
                tracing::warn!(metric = name, "no-reference metric, ignoring the supplied reference");
                None
            }
            (_, reference) => reference,
        };

        let (estimate, reference) = match self.config.center_crop {
            Some(size) => (
                crop(estimate, size)?,
                reference.map(|r| crop(r, size)).transpose()?,
            ),
            None => (estimate, reference),
        };

        let (estimate, reference) = match reference {
            Some(reference) => {
                let (estimate, reference) = broadcast(estimate, reference)?;
                (estimate, Some(reference))
            }
            None => (estimate, None),
        };

        let estimate = self.apply_complex_mode(name, supports_complex, estimate)?;
        let reference = reference
            .map(|r| self.apply_complex_mode(name, supports_complex, r))
            .transpose()?;

        // Mixed real/complex pairs are compared in the complex domain.
        let (estimate, reference) = match reference {
            Some(r) if estimate.is_complex() != r.is_complex() => (
                Signal::Complex(estimate.into_complex()),
                Some(Signal::Complex(r.into_complex())),
            ),
            other => (estimate, other),
        };

        let estimate = self.normalize(name, estimate)?;
        let reference = reference.map(|r| self.normalize(name, r)).transpose()?;

        Ok((estimate, reference))
    }

    /// Runs the output stages: optional loss inversion, then batch reduction.
    pub fn finish<B: Backend>(
        &self,
        score: Tensor<B, 1>,
        higher_is_better: bool,
        invert: impl FnOnce(Tensor<B, 1>) -> Tensor<B, 1>,
    ) -> Tensor<B, 1> {
        let score = if self.config.train_loss && higher_is_better {
            invert(score)
        } else {
            score
        };

        match self.config.reduction {
            Reduction::Mean => score.mean(),
            Reduction::Sum => score.sum(),
            Reduction::None => score,
        }
    }

    fn apply_complex_mode<B: Backend>(
        &self,
        name: &str,
        supports_complex: bool,
        signal: Signal<B>,
    ) -> MetricResult<Signal<B>> {
        if !signal.is_complex() {
            return Ok(signal);
        }
        match self.config.complex_mode {
            ComplexMode::Abs => Ok(Signal::Real(signal.modulus())),
            ComplexMode::Real => Ok(Signal::Real(signal.real_part())),
            ComplexMode::AsIs if supports_complex => Ok(signal),
            ComplexMode::AsIs => Err(MetricError::unsupported_input(
                name,
                "complex-valued input requires a complex mode of Abs or Real",
            )),
        }
    }

    fn normalize<B: Backend>(&self, name: &str, signal: Signal<B>) -> MetricResult<Signal<B>> {
        match self.config.norm_inputs {
            None => Ok(signal),
            Some(NormInputs::L2) => Ok(signal.l2_normalized()),
            Some(NormInputs::MinMax) => signal.min_max(name),
            Some(NormInputs::Clip) => signal.clipped(name),
        }
    }
}

/// Unwraps the reference of a full-reference metric.
pub(crate) fn required<B: Backend>(
    metric: &str,
    reference: Option<Signal<B>>,
) -> MetricResult<Signal<B>> {
    reference.ok_or_else(|| MetricError::MissingReference {
        metric: metric.to_owned(),
    })
}

fn crop<B: Backend>(signal: Signal<B>, size: [usize; 2]) -> MetricResult<Signal<B>> {
    let [_, _, h, w] = signal.dims();
    // Unit spatial axes are broadcast later and are left alone.
    let target = [
        if h == 1 { 1 } else { size[0] },
        if w == 1 { 1 } else { size[1] },
    ];
    if target[0] > h || target[1] > w || target[0] == 0 || target[1] == 0 {
        return Err(MetricError::ShapeMismatch {
            estimate: signal.shape(),
            reference: size.to_vec(),
        });
    }
    Ok(signal.center_crop(target))
}

fn broadcast<B: Backend>(
    estimate: Signal<B>,
    reference: Signal<B>,
) -> MetricResult<(Signal<B>, Signal<B>)> {
    let est = estimate.dims();
    let rf = reference.dims();
    let mismatch = || MetricError::ShapeMismatch {
        estimate: estimate.shape(),
        reference: reference.shape(),
    };

    // The score has one entry per estimate sample, so the batch never grows.
    if rf[0] != est[0] && rf[0] != 1 {
        return Err(mismatch());
    }

    let mut target = est;
    for axis in 1..4 {
        target[axis] = match (est[axis], rf[axis]) {
            (a, b) if a == b => a,
            (1, b) => b,
            (a, 1) => a,
            _ => return Err(mismatch()),
        };
    }

    Ok((estimate.expand_to(target), reference.expand_to(target)))
}

/// A quality metric evaluated through the shared pipeline.
///
/// Implementors supply metadata and [`Metric::score`]; [`Metric::evaluate`]
/// is provided and should not be overridden.
pub trait Metric<B: Backend> {
    /// Display name, also used as the aggregation key.
    fn name(&self) -> &str;

    /// Whether larger scores mean better quality.
    fn higher_is_better(&self) -> bool;

    fn reference_mode(&self) -> ReferenceMode {
        ReferenceMode::Required
    }

    /// Whether [`Metric::score`] accepts complex signals as-is.
    fn supports_complex(&self) -> bool {
        false
    }

    /// Whether gradients flow from the score back to the estimate.
    fn differentiable(&self) -> bool {
        true
    }

    fn engine(&self) -> &MetricEngine;

    /// Per-sample raw score of shape `[batch_size]`.
    ///
    /// Inputs have already been prepared by the engine; the reference is
    /// present for [`ReferenceMode::Required`] metrics.
    fn score(
        &self,
        estimate: Signal<B>,
        reference: Option<Signal<B>>,
        context: &MetricContext<B>,
    ) -> MetricResult<Tensor<B, 1>>;

    /// Turns a higher-is-better score into a loss.
    fn invert(&self, score: Tensor<B, 1>) -> Tensor<B, 1> {
        score.neg()
    }

    /// Scores `estimate` against `reference` with the configured options.
    ///
    /// # Returns
    /// `[batch_size]` scores for [`Reduction::None`], otherwise `[1]`.
    fn evaluate(
        &self,
        estimate: Signal<B>,
        reference: Option<Signal<B>>,
        context: &MetricContext<B>,
    ) -> MetricResult<Tensor<B, 1>> {
        let engine = self.engine();
        tracing::debug!(
            metric = self.name(),
            batch = estimate.batch_size(),
            reduction = ?engine.config().reduction,
            "evaluating metric"
        );

        let (estimate, reference) = engine.prepare(
            self.name(),
            self.reference_mode(),
            self.supports_complex(),
            estimate,
            reference,
        )?;
        let score = self.score(estimate, reference, context)?;

        Ok(engine.finish(score, self.higher_is_better(), |s| self.invert(s)))
    }

    /// Full-reference shorthand for real images without context.
    fn forward(&self, estimate: Tensor<B, 4>, reference: Tensor<B, 4>) -> MetricResult<Tensor<B, 1>> {
        self.evaluate(
            Signal::Real(estimate),
            Some(Signal::Real(reference)),
            &MetricContext::default(),
        )
    }
}
