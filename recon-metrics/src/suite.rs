//! Running several metrics on the same inputs.

use burn::prelude::*;

use crate::{
    context::MetricContext,
    engine::Metric,
    error::{MetricError, MetricResult},
    signal::Signal,
};

/// Host copy of one metric's output.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricScore {
    pub name: String,
    /// The score tensor, `[1]` or `[batch_size]` depending on the reduction.
    pub values: Vec<f64>,
    pub higher_is_better: bool,
}

impl MetricScore {
    /// Mean of the values.
    pub fn mean(&self) -> f64 {
        self.values.iter().sum::<f64>() / self.values.len() as f64
    }
}

/// An ordered set of metrics evaluated together.
///
/// # Example
///
/// ```ignore
/// let suite = MetricSuite::new()
///     .with_metric(Psnr::new())
///     .with_metric(SsimConfig::new().init()?);
/// let scores = suite.evaluate(estimate, Some(reference), &MetricContext::default())?;
/// ```
pub struct MetricSuite<B: Backend> {
    metrics: Vec<Box<dyn Metric<B>>>,
}

impl<B: Backend> Default for MetricSuite<B> {
    fn default() -> Self {
        Self::new()
    }
}

impl<B: Backend> MetricSuite<B> {
    pub fn new() -> Self {
        Self {
            metrics: Vec::new(),
        }
    }

    pub fn with_metric(mut self, metric: impl Metric<B> + 'static) -> Self {
        self.push(Box::new(metric));
        self
    }

    pub fn push(&mut self, metric: Box<dyn Metric<B>>) {
        self.metrics.push(metric);
    }

    pub fn len(&self) -> usize {
        self.metrics.len()
    }

    pub fn is_empty(&self) -> bool {
        self.metrics.is_empty()
    }

    pub fn names(&self) -> Vec<&str> {
        self.metrics.iter().map(|m| m.name()).collect()
    }

    /// Evaluates every metric in order. The first failure aborts the run.
    pub fn evaluate(
        &self,
        estimate: Signal<B>,
        reference: Option<Signal<B>>,
        context: &MetricContext<B>,
    ) -> MetricResult<Vec<MetricScore>> {
        self.metrics
            .iter()
            .map(|metric| {
                let score = metric.evaluate(estimate.clone(), reference.clone(), context)?;
                let values = score
                    .into_data()
                    .convert::<f64>()
                    .to_vec::<f64>()
                    .map_err(|e| {
                        MetricError::invalid_input(metric.name(), format!("cannot read score: {e:?}"))
                    })?;

                Ok(MetricScore {
                    name: metric.name().to_owned(),
                    values,
                    higher_is_better: metric.higher_is_better(),
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        distortion::{Mae, Mse, Psnr},
        tests::TestBackend,
    };

    #[test]
    fn suite_reports_every_metric_in_order() {
        let device = Default::default();
        let suite = MetricSuite::<TestBackend>::new()
            .with_metric(Mse::new())
            .with_metric(Mae::new())
            .with_metric(Psnr::new());
        let estimate = Tensor::<TestBackend, 4>::full([2, 1, 2, 2], 0.5, &device);
        let reference = Tensor::<TestBackend, 4>::zeros([2, 1, 2, 2], &device);

        let scores = suite
            .evaluate(
                Signal::Real(estimate),
                Some(Signal::Real(reference)),
                &MetricContext::default(),
            )
            .unwrap();

        assert_eq!(suite.names(), vec!["MSE", "MAE", "PSNR"]);
        assert_eq!(scores.len(), 3);
        assert!((scores[0].mean() - 0.25).abs() < 1e-6);
        assert!((scores[1].mean() - 0.5).abs() < 1e-6);
        assert!(scores[2].higher_is_better);
        assert!(!scores[0].higher_is_better);
    }

    #[test]
    fn suite_propagates_the_first_error() {
        let device = Default::default();
        let suite = MetricSuite::<TestBackend>::new().with_metric(Mse::new());
        let estimate = Tensor::<TestBackend, 4>::zeros([1, 1, 2, 2], &device);

        let err = suite
            .evaluate(Signal::Real(estimate), None, &MetricContext::default())
            .unwrap_err();

        assert!(matches!(err, MetricError::MissingReference { .. }));
    }
}
