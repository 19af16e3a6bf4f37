//! Natural Image Quality Evaluator.
//!
//! A no-reference score: the distance between a Gaussian fitted to the
//! natural scene statistics of the estimate's patches and a prior fitted to
//! pristine images. Lower is better.
//!
//! The statistics are computed on host memory, so the score carries no
//! gradient.

mod features;
mod prior;

use burn::{prelude::*, tensor::TensorData};
use burn_extra_ops::Decolorize;

pub use features::{FEATURES_PER_SCALE, FEATURE_LEN, SCALES};
pub use prior::NiqePrior;

use self::features::{GammaTable, Plane};
use crate::{
    config::MetricConfig,
    context::MetricContext,
    engine::{Metric, MetricEngine, ReferenceMode},
    error::{MetricError, MetricResult},
    signal::Signal,
};

const NAME: &str = "NIQE";

/// Configuration for creating a [NIQE](Niqe) metric.
#[derive(Config, Debug)]
pub struct NiqeConfig {
    /// Shared evaluation options.
    #[config(default = "MetricConfig::new()")]
    pub base: MetricConfig,

    /// Side of the square patches, even and at least 8.
    #[config(default = 96)]
    pub patch_size: usize,

    /// Factor applied to the luminance before feature extraction.
    #[config(default = 255.0)]
    pub pixel_scale: f64,
}

impl NiqeConfig {
    /// Initialize [NIQE](Niqe) with a pristine prior.
    pub fn init(&self, prior: NiqePrior) -> MetricResult<Niqe> {
        self.assertions()?;
        prior.validate()?;
        Ok(Niqe {
            engine: MetricEngine::new(self.base.clone()),
            prior,
            patch_size: self.patch_size,
            pixel_scale: self.pixel_scale,
            table: GammaTable::new(),
        })
    }

    /// Fits a pristine prior to the patches of `images`.
    ///
    /// Every batch element of every tensor contributes its patches.
    pub fn fit_prior<B: Backend>(&self, images: &[Tensor<B, 4>]) -> MetricResult<NiqePrior> {
        self.assertions()?;
        let table = GammaTable::new();

        let mut rows = Vec::new();
        for image in images {
            for plane in luminance_planes(image.clone(), self.pixel_scale, self.patch_size)? {
                rows.extend(table.image_features(&plane, self.patch_size));
            }
        }
        if rows.is_empty() {
            return Err(MetricError::invalid_input(NAME, "no images to fit a prior on"));
        }
        check_features(&rows)?;

        tracing::debug!(patches = rows.len(), "fitted NIQE prior");
        Ok(NiqePrior::fit(&rows))
    }

    fn assertions(&self) -> MetricResult<()> {
        if self.patch_size < 8 || self.patch_size % 2 != 0 {
            return Err(MetricError::invalid_parameter(
                NAME,
                format!("patch size must be even and at least 8, got {}", self.patch_size),
            ));
        }
        if self.pixel_scale.is_nan() || self.pixel_scale <= 0.0 {
            return Err(MetricError::invalid_parameter(
                NAME,
                format!("pixel scale must be positive, got {}", self.pixel_scale),
            ));
        }
        Ok(())
    }
}

/// Natural Image Quality Evaluator. Lower is better.
#[derive(Debug, Clone)]
pub struct Niqe {
    engine: MetricEngine,
    prior: NiqePrior,
    patch_size: usize,
    pixel_scale: f64,
    table: GammaTable,
}

impl Niqe {
    pub fn prior(&self) -> &NiqePrior {
        &self.prior
    }

    fn image_score(&self, plane: &Plane) -> MetricResult<f64> {
        let rows = self.table.image_features(plane, self.patch_size);
        check_features(&rows)?;
        Ok(self.prior.distance(&NiqePrior::fit(&rows)))
    }
}

/// Fails when some feature could not be fitted on any patch, as on flat images.
fn check_features(rows: &[[f64; FEATURE_LEN]]) -> MetricResult<()> {
    match prior::first_unfitted_feature(rows) {
        Some(feature) => Err(MetricError::invalid_input(
            NAME,
            format!("feature {feature} is undefined on every patch, the image has no texture"),
        )),
        None => Ok(()),
    }
}

/// Luminance of each batch element, scaled and copied to the host.
fn luminance_planes<B: Backend>(
    image: Tensor<B, 4>,
    pixel_scale: f64,
    patch_size: usize,
) -> MetricResult<Vec<Plane>> {
    let [batch_size, channels, height, width] = image.dims();
    if height < patch_size || width < patch_size {
        return Err(MetricError::invalid_input(
            NAME,
            format!("image {height}x{width} is smaller than one {patch_size}x{patch_size} patch"),
        ));
    }

    let luminance = match channels {
        1 => image,
        3 => Decolorize::rec601().forward(image),
        other => {
            return Err(MetricError::unsupported_input(
                NAME,
                format!("expected 1 or 3 channels, got {other}"),
            ))
        }
    };

    let values = luminance
        .mul_scalar(pixel_scale)
        .into_data()
        .convert::<f64>()
        .to_vec::<f64>()
        .map_err(|e| MetricError::invalid_input(NAME, format!("cannot read image data: {e:?}")))?;

    Ok(values
        .chunks_exact(height * width)
        .take(batch_size)
        .map(|chunk| Plane::new(chunk.to_vec(), height, width))
        .collect())
}

impl<B: Backend> Metric<B> for Niqe {
    fn name(&self) -> &str {
        NAME
    }

    fn higher_is_better(&self) -> bool {
        false
    }

    fn reference_mode(&self) -> ReferenceMode {
        ReferenceMode::Ignored
    }

    fn differentiable(&self) -> bool {
        false
    }

    fn engine(&self) -> &MetricEngine {
        &self.engine
    }

    fn score(
        &self,
        estimate: Signal<B>,
        _reference: Option<Signal<B>>,
        _context: &MetricContext<B>,
    ) -> MetricResult<Tensor<B, 1>> {
        let image = estimate.into_real(NAME)?;
        let device = image.device();

        let scores: Vec<f64> = luminance_planes(image, self.pixel_scale, self.patch_size)?
            .iter()
            .map(|plane| self.image_score(plane))
            .collect::<MetricResult<_>>()?;

        let batch_size = scores.len();
        Ok(Tensor::from_data(
            TensorData::new(scores, [batch_size]).convert::<B::FloatElem>(),
            &device,
        ))
    }
}
