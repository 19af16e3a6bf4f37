//! Real or complex batched images.

use burn::prelude::*;
use burn_extra_ops::TensorExtraOps;

use crate::error::{MetricError, MetricResult};

const NORM_EPSILON: f64 = 1e-12;

/// A batched image, real or complex valued.
///
/// Complex images carry their real and imaginary parts on a trailing axis of
/// length 2. The leading axis is always the batch.
#[derive(Debug, Clone)]
pub enum Signal<B: Backend> {
    /// Shape `[batch_size, channels, height, width]`.
    Real(Tensor<B, 4>),
    /// Shape `[batch_size, channels, height, width, 2]`.
    Complex(Tensor<B, 5>),
}

impl<B: Backend> From<Tensor<B, 4>> for Signal<B> {
    fn from(tensor: Tensor<B, 4>) -> Self {
        Self::Real(tensor)
    }
}

impl<B: Backend> From<Tensor<B, 5>> for Signal<B> {
    fn from(tensor: Tensor<B, 5>) -> Self {
        Self::Complex(tensor)
    }
}

impl<B: Backend> Signal<B> {
    /// Builds a complex signal from its real and imaginary parts.
    pub fn from_parts(real: Tensor<B, 4>, imag: Tensor<B, 4>) -> Self {
        Self::Complex(Tensor::stack(vec![real, imag], 4))
    }

    /// `[batch_size, channels, height, width]`, without the complex axis.
    pub fn dims(&self) -> [usize; 4] {
        match self {
            Self::Real(t) => t.dims(),
            Self::Complex(t) => {
                let [n, c, h, w, _] = t.dims();
                [n, c, h, w]
            }
        }
    }

    /// Full tensor shape, including the complex axis when present.
    pub fn shape(&self) -> Vec<usize> {
        match self {
            Self::Real(t) => t.dims().to_vec(),
            Self::Complex(t) => t.dims().to_vec(),
        }
    }

    /// Leading batch extent.
    pub fn batch_size(&self) -> usize {
        self.dims()[0]
    }

    /// Whether the signal is complex valued.
    pub fn is_complex(&self) -> bool {
        matches!(self, Self::Complex(_))
    }

    /// Complex view; real signals get a zero imaginary part.
    pub fn into_complex(self) -> Tensor<B, 5> {
        match self {
            Self::Real(t) => {
                let imag = t.zeros_like();
                Tensor::stack(vec![t, imag], 4)
            }
            Self::Complex(t) => t,
        }
    }

    /// Real part.
    pub fn real_part(self) -> Tensor<B, 4> {
        match self {
            Self::Real(t) => t,
            Self::Complex(t) => t.narrow(4, 0, 1).squeeze(4),
        }
    }

    /// Element-wise `|z|²`.
    pub fn squared_modulus(self) -> Tensor<B, 4> {
        match self {
            Self::Real(t) => t.powi_scalar(2),
            Self::Complex(t) => t.powi_scalar(2).sum_dim(4).squeeze(4),
        }
    }

    /// Element-wise `|z|`.
    ///
    /// The gradient at `z = 0` is zero, as for `abs` on real signals.
    pub fn modulus(self) -> Tensor<B, 4> {
        match self {
            Self::Real(t) => t.abs(),
            Self::Complex(t) => masked_sqrt(t.powi_scalar(2).sum_dim(4).squeeze::<4>(4)),
        }
    }

    /// The real tensor, or `UnsupportedInput` for complex signals.
    pub fn into_real(self, metric: &str) -> MetricResult<Tensor<B, 4>> {
        match self {
            Self::Real(t) => Ok(t),
            Self::Complex(_) => Err(MetricError::unsupported_input(
                metric,
                "complex-valued input requires a complex mode of Abs or Real",
            )),
        }
    }

    /// Element-wise difference, promoting to complex when either side is complex.
    pub fn residual(self, other: Self) -> Self {
        match (self, other) {
            (Self::Real(a), Self::Real(b)) => Self::Real(a - b),
            (a, b) => Self::Complex(a.into_complex() - b.into_complex()),
        }
    }

    /// Expands every size-1 axis to `dims`.
    pub(crate) fn expand_to(self, dims: [usize; 4]) -> Self {
        if self.dims() == dims {
            return self;
        }
        let [n, c, h, w] = dims;
        match self {
            Self::Real(t) => Self::Real(t.expand(Shape::new(dims))),
            Self::Complex(t) => Self::Complex(t.expand(Shape::new([n, c, h, w, 2]))),
        }
    }

    /// Crops `[height, width]` around the image centre.
    pub(crate) fn center_crop(self, size: [usize; 2]) -> Self {
        let [n, c, h, w] = self.dims();
        let top = (h - size[0]) / 2;
        let left = (w - size[1]) / 2;
        let rows = top..top + size[0];
        let cols = left..left + size[1];
        match self {
            Self::Real(t) => Self::Real(t.slice([0..n, 0..c, rows, cols])),
            Self::Complex(t) => Self::Complex(t.slice([0..n, 0..c, rows, cols, 0..2])),
        }
    }

    /// Maps each sample onto `[0, 1]`.
    pub(crate) fn min_max(self, metric: &str) -> MetricResult<Self> {
        let t = self.into_real(metric)?;
        let n = t.dims()[0];
        let min = t.clone().per_sample_min().reshape([n, 1, 1, 1]);
        let max = t.clone().per_sample_max().reshape([n, 1, 1, 1]);
        let range = (max - min.clone()).clamp_min(NORM_EPSILON);
        Ok(Self::Real((t - min) / range))
    }

    /// Divides each sample by its Euclidean norm.
    pub(crate) fn l2_normalized(self) -> Self {
        let n = self.batch_size();
        let norm = self
            .clone()
            .squared_modulus()
            .per_sample_sum()
            .clamp_min(NORM_EPSILON * NORM_EPSILON)
            .sqrt();
        match self {
            Self::Real(t) => Self::Real(t / norm.reshape([n, 1, 1, 1])),
            Self::Complex(t) => Self::Complex(t / norm.reshape([n, 1, 1, 1, 1])),
        }
    }

    /// Clamps values to `[0, 1]`.
    pub(crate) fn clipped(self, metric: &str) -> MetricResult<Self> {
        Ok(Self::Real(self.into_real(metric)?.clamp(0.0, 1.0)))
    }
}

/// `sqrt` with exact zeros kept out of its backward pass.
pub(crate) fn masked_sqrt<B: Backend, const D: usize>(squared: Tensor<B, D>) -> Tensor<B, D> {
    let zero = squared.clone().equal_elem(0.0);
    squared
        .mask_fill(zero.clone(), 1.0)
        .sqrt()
        .mask_fill(zero, 0.0)
}

#[cfg(test)]
mod tests {
    use burn::tensor::{ops::FloatElem, TensorData, Tolerance};

    use super::*;
    use crate::tests::{TestAutodiffBackend, TestBackend};

    type FT = FloatElem<TestBackend>;

    fn complex_signal() -> Signal<TestBackend> {
        let device = Default::default();
        let real = Tensor::<TestBackend, 4>::from_floats([[[[3.0, 0.0]]]], &device);
        let imag = Tensor::<TestBackend, 4>::from_floats([[[[4.0, -2.0]]]], &device);
        Signal::from_parts(real, imag)
    }

    #[test]
    fn complex_signal_reports_image_dims() {
        let signal = complex_signal();

        assert!(signal.is_complex());
        assert_eq!(signal.dims(), [1, 1, 1, 2]);
        assert_eq!(signal.shape(), vec![1, 1, 1, 2, 2]);
    }

    #[test]
    fn modulus_and_real_part_of_complex_signal() {
        let signal = complex_signal();

        signal
            .clone()
            .modulus()
            .into_data()
            .assert_approx_eq::<FT>(&TensorData::from([[[[5.0, 2.0]]]]), Tolerance::default());
        signal
            .clone()
            .squared_modulus()
            .into_data()
            .assert_approx_eq::<FT>(&TensorData::from([[[[25.0, 4.0]]]]), Tolerance::default());
        signal
            .real_part()
            .into_data()
            .assert_approx_eq::<FT>(&TensorData::from([[[[3.0, 0.0]]]]), Tolerance::default());
    }

    #[test]
    fn residual_promotes_real_to_complex() {
        let device = Default::default();
        let real = Signal::Real(Tensor::<TestBackend, 4>::from_floats(
            [[[[1.0, 1.0]]]],
            &device,
        ));

        let residual = complex_signal().residual(real);

        assert!(residual.is_complex());
        residual
            .modulus()
            .into_data()
            .assert_approx_eq::<FT>(
                &TensorData::from([[[[20.0f32.sqrt(), 5.0f32.sqrt()]]]]),
                Tolerance::default(),
            );
    }

    #[test]
    fn into_real_rejects_complex() {
        let err = complex_signal().into_real("SSIM").unwrap_err();
        assert!(matches!(err, MetricError::UnsupportedInput { .. }));
    }

    #[test]
    fn min_max_maps_each_sample_to_unit_range() {
        let device = Default::default();
        let signal = Signal::Real(Tensor::<TestBackend, 4>::from_floats(
            [[[[2.0, 4.0]]], [[[-1.0, 1.0]]]],
            &device,
        ));

        let normalized = signal.min_max("MSE").unwrap().real_part();

        normalized.into_data().assert_approx_eq::<FT>(
            &TensorData::from([[[[0.0, 1.0]]], [[[0.0, 1.0]]]]),
            Tolerance::default(),
        );
    }

    #[test]
    fn l2_normalization_gives_unit_norm() {
        let signal = complex_signal().l2_normalized();

        let norm = signal.squared_modulus().per_sample_sum().sqrt();
        norm.into_data()
            .assert_approx_eq::<FT>(&TensorData::from([1.0]), Tolerance::default());
    }

    #[test]
    fn center_crop_keeps_middle_window() {
        let device = Default::default();
        let signal = Signal::Real(Tensor::<TestBackend, 4>::from_floats(
            [[[
                [0.0, 0.0, 0.0, 0.0],
                [0.0, 1.0, 2.0, 0.0],
                [0.0, 3.0, 4.0, 0.0],
                [0.0, 0.0, 0.0, 0.0],
            ]]],
            &device,
        ));

        let cropped = signal.center_crop([2, 2]).real_part();

        cropped.into_data().assert_approx_eq::<FT>(
            &TensorData::from([[[[1.0, 2.0], [3.0, 4.0]]]]),
            Tolerance::default(),
        );
    }

    #[test]
    fn expand_to_broadcasts_unit_axes() {
        let device = Default::default();
        let signal = Signal::Real(Tensor::<TestBackend, 4>::ones([1, 1, 2, 2], &device));

        assert_eq!(signal.expand_to([3, 2, 2, 2]).dims(), [3, 2, 2, 2]);
    }

    #[test]
    fn modulus_gradient_is_zero_at_origin() {
        let device = Default::default();
        let real =
            Tensor::<TestAutodiffBackend, 4>::from_floats([[[[0.0, 3.0]]]], &device).require_grad();
        let imag = Tensor::<TestAutodiffBackend, 4>::from_floats([[[[0.0, 4.0]]]], &device);

        let grads = Signal::from_parts(real.clone(), imag)
            .modulus()
            .sum()
            .backward();

        // d|z|/d re = re / |z| away from the origin.
        real.grad(&grads)
            .unwrap()
            .into_data()
            .assert_approx_eq::<FT>(&TensorData::from([[[[0.0, 0.6]]]]), Tolerance::default());
    }
}
