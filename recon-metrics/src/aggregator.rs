//! Metrics aggregator for dataset-level evaluation.
//!
//! Accumulates [`MetricScore`]s batch after batch and reports running means.
//! Every value counts once, so unreduced scores weight batches by their size.

use crate::suite::MetricScore;

#[derive(Debug, Clone)]
struct Running {
    name: String,
    sum: f64,
    count: usize,
    higher_is_better: bool,
}

/// Running mean of one metric.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricAverage {
    pub name: String,
    pub mean: f64,
    pub count: usize,
    pub higher_is_better: bool,
}

/// Metrics aggregator keyed by metric name, in first-seen order.
#[derive(Debug, Clone, Default)]
pub struct MetricsAggregator {
    entries: Vec<Running>,
}

impl MetricsAggregator {
    /// Create a new metrics aggregator.
    pub const fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Add the scores of one batch.
    pub fn update(&mut self, scores: &[MetricScore]) {
        for score in scores {
            let index = match self.entries.iter().position(|e| e.name == score.name) {
                Some(index) => index,
                None => {
                    self.entries.push(Running {
                        name: score.name.clone(),
                        sum: 0.0,
                        count: 0,
                        higher_is_better: score.higher_is_better,
                    });
                    self.entries.len() - 1
                }
            };

            let entry = &mut self.entries[index];
            entry.sum += score.values.iter().sum::<f64>();
            entry.count += score.values.len();
        }
    }

    /// Running mean of one metric, if it has been seen.
    pub fn average(&self, name: &str) -> Option<f64> {
        self.entries
            .iter()
            .find(|e| e.name == name && e.count > 0)
            .map(|e| e.sum / e.count as f64)
    }

    /// Get the average of every metric seen so far.
    pub fn averages(&self) -> Vec<MetricAverage> {
        self.entries
            .iter()
            .filter(|e| e.count > 0)
            .map(|e| MetricAverage {
                name: e.name.clone(),
                mean: e.sum / e.count as f64,
                count: e.count,
                higher_is_better: e.higher_is_better,
            })
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Reset the aggregator.
    pub fn reset(&mut self) {
        self.entries.clear();
    }
}
