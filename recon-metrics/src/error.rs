use thiserror::Error;

/// The error type for metric construction and evaluation.
///
/// Parameter errors are raised by the `*Config::init` constructors, everything
/// else by [`Metric::evaluate`](crate::Metric::evaluate). Every variant is a
/// caller contract violation; nothing is retried or silently corrected.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MetricError {
    /// The estimate and reference shapes cannot be broadcast together.
    #[error("Shape mismatch: estimate {estimate:?} cannot be broadcast with reference {reference:?}")]
    ShapeMismatch {
        /// Shape of the estimate.
        estimate: Vec<usize>,
        /// Shape of the reference.
        reference: Vec<usize>,
    },

    /// A full-reference metric was evaluated without a reference.
    #[error("{metric} requires a reference")]
    MissingReference {
        /// Name of the metric.
        metric: String,
    },

    /// A metric was evaluated without the auxiliary context it needs.
    #[error("{metric} requires {what} in the evaluation context")]
    MissingContext {
        /// Name of the metric.
        metric: String,
        /// Description of the missing context entry.
        what: String,
    },

    /// A construction parameter is outside its valid domain.
    #[error("Invalid parameter for {metric}: {reason}")]
    InvalidParameter {
        /// Name of the metric.
        metric: String,
        /// Why the parameter was rejected.
        reason: String,
    },

    /// The input kind is not supported under the configured options.
    #[error("Unsupported input for {metric}: {reason}")]
    UnsupportedInput {
        /// Name of the metric.
        metric: String,
        /// Why the input was rejected.
        reason: String,
    },

    /// The input has the right kind but unusable content or extent.
    #[error("Invalid input for {metric}: {reason}")]
    InvalidInput {
        /// Name of the metric.
        metric: String,
        /// Why the input was rejected.
        reason: String,
    },

    /// Loading pretrained weights failed.
    #[error("Failed to load weights: {reason}")]
    WeightLoading {
        /// The reason for the loading failure.
        reason: String,
    },
}

impl MetricError {
    pub(crate) fn invalid_parameter(metric: &str, reason: impl Into<String>) -> Self {
        Self::InvalidParameter {
            metric: metric.to_owned(),
            reason: reason.into(),
        }
    }

    pub(crate) fn unsupported_input(metric: &str, reason: impl Into<String>) -> Self {
        Self::UnsupportedInput {
            metric: metric.to_owned(),
            reason: reason.into(),
        }
    }

    pub(crate) fn invalid_input(metric: &str, reason: impl Into<String>) -> Self {
        Self::InvalidInput {
            metric: metric.to_owned(),
            reason: reason.into(),
        }
    }
}

/// A specialized `Result` type for metric operations.
pub type MetricResult<T> = Result<T, MetricError>;
