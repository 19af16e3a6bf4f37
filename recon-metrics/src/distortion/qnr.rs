//! Quality with No Reference for pan-sharpened images.
//!
//! Scores a fused multispectral image against the observations it was built
//! from instead of a ground truth:
//!
//! ```text
//! Dλ  = (mean_{i≠j} |Q(x_i, x_j) - Q(ms_i, ms_j)|^p)^(1/p)
//! Ds  = (mean_i |Q(x_i, pan) - Q(ms_i, pan_lr)|^q)^(1/q)
//! QNR = (1 - Dλ)^α · (1 - Ds)^β
//! ```
//!
//! `Q` is the universal image quality index over whole bands.

use burn::{prelude::*, tensor::activation::relu};
use burn_extra_ops::box_decimate;

use crate::{
    config::MetricConfig,
    context::{MetricContext, PansharpenMeasurement},
    engine::{Metric, MetricEngine, ReferenceMode},
    error::{MetricError, MetricResult},
    signal::Signal,
};

const NAME: &str = "QNR";

/// Guards the quality index denominator on flat bands.
const Q_EPSILON: f64 = 1e-12;

/// Configuration for creating a [QNR](Qnr) metric.
#[derive(Config, Debug)]
pub struct QnrConfig {
    /// Shared evaluation options.
    #[config(default = "MetricConfig::new()")]
    pub base: MetricConfig,

    /// Exponent of the spectral term.
    #[config(default = 1.0)]
    pub alpha: f64,

    /// Exponent of the spatial term.
    #[config(default = 1.0)]
    pub beta: f64,

    /// Norm order of the spectral distortion.
    #[config(default = 1.0)]
    pub p: f64,

    /// Norm order of the spatial distortion.
    #[config(default = 1.0)]
    pub q: f64,
}

impl QnrConfig {
    /// Initialize [QNR](Qnr).
    pub fn init(&self) -> MetricResult<Qnr> {
        let positive = [
            ("alpha", self.alpha),
            ("beta", self.beta),
            ("p", self.p),
            ("q", self.q),
        ];
        for (name, value) in positive {
            if value.is_nan() || value <= 0.0 {
                return Err(MetricError::invalid_parameter(
                    NAME,
                    format!("{name} must be positive, got {value}"),
                ));
            }
        }

        Ok(Qnr {
            engine: MetricEngine::new(self.base.clone()),
            alpha: self.alpha,
            beta: self.beta,
            p: self.p,
            q: self.q,
        })
    }
}

/// Quality with No Reference. Higher is better, at most 1.
///
/// Needs a [`PansharpenMeasurement`] in the evaluation context.
#[derive(Debug, Clone)]
pub struct Qnr {
    engine: MetricEngine,
    alpha: f64,
    beta: f64,
    p: f64,
    q: f64,
}

impl Default for Qnr {
    fn default() -> Self {
        Self::new()
    }
}

impl Qnr {
    pub fn new() -> Self {
        Self {
            engine: MetricEngine::new(MetricConfig::new()),
            alpha: 1.0,
            beta: 1.0,
            p: 1.0,
            q: 1.0,
        }
    }

    /// Spectral distortion `Dλ`, shape `[batch_size]`.
    fn spectral_distortion<B: Backend>(
        &self,
        fused: Tensor<B, 4>,
        multispectral: Tensor<B, 4>,
    ) -> Tensor<B, 1> {
        let bands = fused.dims()[1];
        let mut terms = Vec::with_capacity(bands * (bands - 1) / 2);
        for i in 0..bands {
            for j in i + 1..bands {
                let fused_q =
                    quality_index(fused.clone().narrow(1, i, 1), fused.clone().narrow(1, j, 1));
                let ms_q = quality_index(
                    multispectral.clone().narrow(1, i, 1),
                    multispectral.clone().narrow(1, j, 1),
                );
                terms.push((fused_q - ms_q).abs().powf_scalar(self.p));
            }
        }

        // Q is symmetric, so the mean over i < j equals the mean over i ≠ j.
        Tensor::cat(terms, 1)
            .mean_dim(1)
            .squeeze::<1>(1)
            .powf_scalar(1.0 / self.p)
    }

    /// Spatial distortion `Ds`, shape `[batch_size]`.
    fn spatial_distortion<B: Backend>(
        &self,
        fused: Tensor<B, 4>,
        multispectral: Tensor<B, 4>,
        panchromatic: Tensor<B, 4>,
        panchromatic_lowres: Tensor<B, 4>,
    ) -> Tensor<B, 1> {
        let high = quality_index(fused.clone(), panchromatic.expand(Shape::new(fused.dims())));
        let low = quality_index(
            multispectral.clone(),
            panchromatic_lowres.expand(Shape::new(multispectral.dims())),
        );

        (high - low)
            .abs()
            .powf_scalar(self.q)
            .mean_dim(1)
            .squeeze::<1>(1)
            .powf_scalar(1.0 / self.q)
    }
}

/// Universal image quality index of each band pair over whole images.
///
/// # Shapes
///
/// - a, b: `[batch_size, channels, height, width]`
/// - output: `[batch_size, channels]`
fn quality_index<B: Backend>(a: Tensor<B, 4>, b: Tensor<B, 4>) -> Tensor<B, 2> {
    let [batch_size, channels, _, _] = a.dims();

    let mean_a = a.clone().mean_dim(3).mean_dim(2);
    let mean_b = b.clone().mean_dim(3).mean_dim(2);
    let centred_a = a - mean_a.clone();
    let centred_b = b - mean_b.clone();

    let var_a = centred_a.clone().powi_scalar(2).mean_dim(3).mean_dim(2);
    let var_b = centred_b.clone().powi_scalar(2).mean_dim(3).mean_dim(2);
    let cov = (centred_a * centred_b).mean_dim(3).mean_dim(2);

    let numerator = cov * mean_a.clone() * mean_b.clone() * 4.0;
    let denominator = (var_a + var_b) * (mean_a.powi_scalar(2) + mean_b.powi_scalar(2));

    (numerator / denominator.add_scalar(Q_EPSILON)).reshape([batch_size, channels])
}

/// Checks the measurement against the fused image and returns `pan_lr`.
fn panchromatic_lowres<B: Backend>(
    fused: &Tensor<B, 4>,
    measurement: &PansharpenMeasurement<B>,
) -> MetricResult<Tensor<B, 4>> {
    let [n, c, h, w] = fused.dims();
    let [ms_n, ms_c, ms_h, ms_w] = measurement.multispectral.dims();
    let [pan_n, pan_c, pan_h, pan_w] = measurement.panchromatic.dims();

    let mismatch = |other: &Tensor<B, 4>| MetricError::ShapeMismatch {
        estimate: fused.dims().to_vec(),
        reference: other.dims().to_vec(),
    };

    if ms_n != n || ms_c != c {
        return Err(mismatch(&measurement.multispectral));
    }
    if pan_n != n || pan_c != 1 || pan_h != h || pan_w != w {
        return Err(mismatch(&measurement.panchromatic));
    }
    if ms_h == 0 || ms_w == 0 || h % ms_h != 0 || w % ms_w != 0 || h / ms_h != w / ms_w {
        return Err(mismatch(&measurement.multispectral));
    }

    match &measurement.panchromatic_lowres {
        Some(lowres) => {
            if lowres.dims() != [n, 1, ms_h, ms_w] {
                return Err(mismatch(lowres));
            }
            Ok(lowres.clone())
        }
        None => Ok(box_decimate(measurement.panchromatic.clone(), h / ms_h)),
    }
}

impl<B: Backend> Metric<B> for Qnr {
    fn name(&self) -> &str {
        NAME
    }

    fn higher_is_better(&self) -> bool {
        true
    }

    fn reference_mode(&self) -> ReferenceMode {
        ReferenceMode::Ignored
    }

    fn engine(&self) -> &MetricEngine {
        &self.engine
    }

    fn score(
        &self,
        estimate: Signal<B>,
        _reference: Option<Signal<B>>,
        context: &MetricContext<B>,
    ) -> MetricResult<Tensor<B, 1>> {
        let measurement = context
            .pansharpen
            .as_ref()
            .ok_or_else(|| MetricError::MissingContext {
                metric: NAME.to_owned(),
                what: "a pan-sharpening measurement".to_owned(),
            })?;

        let fused = estimate.into_real(NAME)?;
        let bands = fused.dims()[1];
        if bands < 2 {
            return Err(MetricError::invalid_input(
                NAME,
                format!("spectral distortion needs at least 2 bands, got {bands}"),
            ));
        }
        let pan_lr = panchromatic_lowres(&fused, measurement)?;

        let d_lambda = self.spectral_distortion(fused.clone(), measurement.multispectral.clone());
        let d_s = self.spatial_distortion(
            fused,
            measurement.multispectral.clone(),
            measurement.panchromatic.clone(),
            pan_lr,
        );

        let spectral = relu(d_lambda.neg().add_scalar(1.0)).powf_scalar(self.alpha);
        let spatial = relu(d_s.neg().add_scalar(1.0)).powf_scalar(self.beta);
        Ok(spectral * spatial)
    }

    fn invert(&self, score: Tensor<B, 1>) -> Tensor<B, 1> {
        score.neg().add_scalar(1.0)
    }
}

#[cfg(test)]
mod tests {
    use burn::tensor::{cast::ToElement, Distribution};

    use super::*;
    use crate::tests::TestBackend;

    /// Nearest-neighbour upsampling by 2, which preserves band moments.
    fn upsample<B: Backend>(image: Tensor<B, 4>) -> Tensor<B, 4> {
        let [n, c, h, w] = image.dims();
        image
            .reshape([n, c, h, 1, w, 1])
            .expand::<6, _>(Shape::new([n, c, h, 2, w, 2]))
            .reshape([n, c, 2 * h, 2 * w])
    }

    fn measurement(
        device: &<TestBackend as Backend>::Device,
    ) -> (Tensor<TestBackend, 4>, PansharpenMeasurement<TestBackend>) {
        let ms = Tensor::<TestBackend, 4>::random(
            [1, 3, 4, 4],
            Distribution::Uniform(0.1, 1.0),
            device,
        );
        let pan_lr = ms.clone().mean_dim(1);
        let fused = upsample(ms.clone());
        let pan = upsample(pan_lr.clone());
        let measurement = PansharpenMeasurement::new(ms, pan).with_panchromatic_lowres(pan_lr);
        (fused, measurement)
    }

    #[test]
    fn qnr_consistent_fusion_scores_one() {
        let device = Default::default();
        let (fused, measurement) = measurement(&device);
        let context = MetricContext::new().with_pansharpen(measurement);

        let score = Qnr::new()
            .evaluate(Signal::Real(fused), None, &context)
            .unwrap()
            .into_scalar()
            .to_f64();

        assert!((score - 1.0).abs() < 1e-3, "expected QNR near 1, got {score}");
    }

    #[test]
    fn qnr_penalises_spectral_distortion() {
        let device = Default::default();
        let (fused, measurement) = measurement(&device);
        let context = MetricContext::new().with_pansharpen(measurement);
        let noise =
            Tensor::<TestBackend, 4>::random(fused.dims(), Distribution::Normal(0.0, 0.3), &device);

        let score = Qnr::new()
            .evaluate(Signal::Real(fused + noise), None, &context)
            .unwrap()
            .into_scalar()
            .to_f64();

        assert!((0.0..1.0).contains(&score), "unexpected QNR {score}");
    }

    #[test]
    fn qnr_derives_lowres_panchromatic() {
        let device = Default::default();
        let (fused, measurement) = measurement(&device);
        let measurement =
            PansharpenMeasurement::new(measurement.multispectral, measurement.panchromatic);
        let context = MetricContext::new().with_pansharpen(measurement);

        let score = Qnr::new()
            .evaluate(Signal::Real(fused), None, &context)
            .unwrap()
            .into_scalar()
            .to_f64();

        // Box decimation inverts the nearest upsampling exactly.
        assert!((score - 1.0).abs() < 1e-3, "expected QNR near 1, got {score}");
    }

    #[test]
    fn qnr_requires_context() {
        let device = Default::default();
        let fused = Tensor::<TestBackend, 4>::ones([1, 3, 8, 8], &device);

        let err = Qnr::new()
            .evaluate(Signal::Real(fused), None, &MetricContext::default())
            .unwrap_err();

        assert!(matches!(err, MetricError::MissingContext { .. }));
    }

    #[test]
    fn qnr_rejects_single_band() {
        let device = Default::default();
        let ms = Tensor::<TestBackend, 4>::ones([1, 1, 4, 4], &device);
        let pan = Tensor::<TestBackend, 4>::ones([1, 1, 8, 8], &device);
        let context =
            MetricContext::new().with_pansharpen(PansharpenMeasurement::new(ms, pan.clone()));

        let err = Qnr::new()
            .evaluate(Signal::Real(pan), None, &context)
            .unwrap_err();

        assert!(matches!(err, MetricError::InvalidInput { .. }));
    }

    #[test]
    fn qnr_rejects_non_integer_ratio() {
        let device = Default::default();
        let ms = Tensor::<TestBackend, 4>::ones([1, 3, 3, 3], &device);
        let pan = Tensor::<TestBackend, 4>::ones([1, 1, 8, 8], &device);
        let fused = Tensor::<TestBackend, 4>::ones([1, 3, 8, 8], &device);
        let context = MetricContext::new().with_pansharpen(PansharpenMeasurement::new(ms, pan));

        let err = Qnr::new()
            .evaluate(Signal::Real(fused), None, &context)
            .unwrap_err();

        assert!(matches!(err, MetricError::ShapeMismatch { .. }));
    }

    #[test]
    fn qnr_rejects_non_positive_exponents() {
        for config in [QnrConfig::new().with_alpha(0.0), QnrConfig::new().with_q(-1.0)] {
            let err = config.init().unwrap_err();
            assert!(matches!(err, MetricError::InvalidParameter { .. }));
        }
    }
}
