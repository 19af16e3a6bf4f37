//! Evaluation options shared by every metric.

use burn::prelude::*;

/// How per-sample scores are combined.
#[derive(Config, Debug, PartialEq, Eq)]
pub enum Reduction {
    /// Average over the batch, output shape `[1]`.
    Mean,
    /// Sum over the batch, output shape `[1]`.
    Sum,
    /// One score per batch element, output shape `[batch_size]`.
    None,
}

/// Per-sample normalization applied to both inputs before scoring.
#[derive(Config, Debug, PartialEq, Eq)]
pub enum NormInputs {
    /// Affine map of each sample onto `[0, 1]`.
    MinMax,
    /// Division by the Euclidean norm of each sample.
    L2,
    /// Clamp each value to `[0, 1]`.
    Clip,
}

/// How complex-valued inputs are turned into what the metric consumes.
#[derive(Config, Debug, PartialEq, Eq)]
pub enum ComplexMode {
    /// Pass complex values through; rejected by real-only metrics.
    AsIs,
    /// Use the magnitude.
    Abs,
    /// Use the real part.
    Real,
}

/// Options recognized by the shared evaluation pipeline.
#[derive(Config, Debug)]
pub struct MetricConfig {
    /// Batch reduction of the per-sample scores.
    #[config(default = "Reduction::Mean")]
    pub reduction: Reduction,

    /// Optional per-sample input normalization.
    #[config(default = "None")]
    pub norm_inputs: Option<NormInputs>,

    /// Complex-value policy.
    #[config(default = "ComplexMode::AsIs")]
    pub complex_mode: ComplexMode,

    /// Invert higher-is-better scores so they can be minimised as a loss.
    #[config(default = false)]
    pub train_loss: bool,

    /// Centre crop `[height, width]` applied before scoring.
    #[config(default = "None")]
    pub center_crop: Option<[usize; 2]>,
}
