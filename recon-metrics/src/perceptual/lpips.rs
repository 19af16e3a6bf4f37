//! Learned Perceptual Image Patch Similarity.
//!
//! Both images go through a VGG16 trunk. At each of five taps the features
//! are unit-normalized along channels, their squared difference is weighted by
//! a 1x1 linear head and averaged over space, and the layer scores are summed.
//!
//! The network starts with uniform unit heads and an untrained trunk. Use the
//! `pretrained` feature to load the official weights.

use backbones::{FeatureExtractor, Vgg16Features, VGG16_TAP_CHANNELS};
use burn::{
    nn::{
        conv::{Conv2d, Conv2dConfig},
        Initializer,
    },
    prelude::*,
};

use crate::{
    config::MetricConfig,
    context::MetricContext,
    engine::{required, Metric, MetricEngine},
    error::{MetricError, MetricResult},
    signal::Signal,
};

const NAME: &str = "LPIPS";

/// Input shift of the scaling layer, per RGB channel.
const SHIFT: [f32; 3] = [-0.030, -0.088, -0.188];
/// Input scale of the scaling layer, per RGB channel.
const SCALE: [f32; 3] = [0.458, 0.448, 0.450];
/// Added to the channel norm before dividing by it.
const FEATURE_EPSILON: f64 = 1e-10;

/// Key remapping from the official LPIPS linear-head checkpoint.
pub const LPIPS_HEAD_KEY_REMAP: (&str, &str) = (r"^lin([0-4])\.model\.1\.(.+)", "heads.$1.$2");

/// 1x1 channel weightings, one per backbone tap.
#[derive(Module, Debug)]
pub struct LinearHeads<B: Backend> {
    pub heads: Vec<Conv2d<B>>,
}

impl<B: Backend> LinearHeads<B> {
    /// Unit weights, which reduce LPIPS to the unweighted feature distance.
    pub fn new(channels: &[usize], device: &Device<B>) -> Self {
        let heads = channels
            .iter()
            .map(|&c| {
                Conv2dConfig::new([c, 1], [1, 1])
                    .with_bias(false)
                    .with_initializer(Initializer::Constant { value: 1.0 })
                    .init(device)
            })
            .collect();
        Self { heads }
    }
}

/// Trunk and heads of LPIPS.
#[derive(Module, Debug)]
pub struct LpipsNetwork<B: Backend> {
    pub backbone: Vgg16Features<B>,
    pub linear: LinearHeads<B>,
}

impl<B: Backend> LpipsNetwork<B> {
    pub fn new(device: &Device<B>) -> Self {
        Self {
            backbone: Vgg16Features::new(device),
            linear: LinearHeads::new(&VGG16_TAP_CHANNELS, device),
        }
    }

    /// Per-sample distance between two RGB batches in `[-1, 1]`.
    ///
    /// # Shapes
    ///
    /// - x, y: `[batch_size, 3, height, width]`
    /// - output: `[batch_size]`
    pub fn distance(&self, x: Tensor<B, 4>, y: Tensor<B, 4>) -> Tensor<B, 1> {
        let batch_size = x.dims()[0];
        let features_x = self.backbone.extract(scaling_layer(x));
        let features_y = self.backbone.extract(scaling_layer(y));

        let mut total = Tensor::<B, 1>::zeros([batch_size], &features_x[0].device());
        for ((fx, fy), head) in features_x
            .into_iter()
            .zip(features_y)
            .zip(&self.linear.heads)
        {
            let diff = (unit_normalize(fx) - unit_normalize(fy)).powi_scalar(2);
            let layer = head.forward(diff).mean_dim(3).mean_dim(2);
            total = total + layer.reshape([batch_size]);
        }
        total
    }
}

fn scaling_layer<B: Backend>(input: Tensor<B, 4>) -> Tensor<B, 4> {
    let device = input.device();
    let shift = Tensor::<B, 1>::from_floats(SHIFT, &device).reshape([1, 3, 1, 1]);
    let scale = Tensor::<B, 1>::from_floats(SCALE, &device).reshape([1, 3, 1, 1]);
    (input - shift) / scale
}

fn unit_normalize<B: Backend>(features: Tensor<B, 4>) -> Tensor<B, 4> {
    let norm = features.clone().powi_scalar(2).sum_dim(1).sqrt();
    features / norm.add_scalar(FEATURE_EPSILON)
}

#[cfg(feature = "pretrained")]
mod pretrained {
    use std::path::Path;

    use backbones::TORCHVISION_KEY_REMAP;
    use burn::record::{FullPrecisionSettings, Recorder};
    use burn_import::pytorch::{LoadArgs, PyTorchFileRecorder};

    use super::*;

    impl<B: Backend> LpipsNetwork<B> {
        /// Loads the trunk from a torchvision `vgg16` checkpoint.
        pub fn load_backbone(
            mut self,
            path: impl AsRef<Path>,
            device: &B::Device,
        ) -> MetricResult<Self> {
            let load_args = TORCHVISION_KEY_REMAP.iter().fold(
                LoadArgs::new(path.as_ref().to_path_buf()),
                |args, (pattern, replacement)| args.with_key_remap(pattern, replacement),
            );
            let record = PyTorchFileRecorder::<FullPrecisionSettings>::default()
                .load(load_args, device)
                .map_err(|e| MetricError::WeightLoading {
                    reason: format!("VGG16 backbone loading failed: {e}"),
                })?;
            self.backbone = self.backbone.load_record(record);
            tracing::info!(path = %path.as_ref().display(), "loaded LPIPS backbone weights");
            Ok(self)
        }

        /// Loads the linear heads from an official LPIPS `vgg.pth` checkpoint.
        pub fn load_heads(mut self, path: impl AsRef<Path>, device: &B::Device) -> MetricResult<Self> {
            let (pattern, replacement) = LPIPS_HEAD_KEY_REMAP;
            let load_args =
                LoadArgs::new(path.as_ref().to_path_buf()).with_key_remap(pattern, replacement);
            let record = PyTorchFileRecorder::<FullPrecisionSettings>::default()
                .load(load_args, device)
                .map_err(|e| MetricError::WeightLoading {
                    reason: format!("LPIPS head loading failed: {e}"),
                })?;
            self.linear = self.linear.load_record(record);
            tracing::info!(path = %path.as_ref().display(), "loaded LPIPS head weights");
            Ok(self)
        }
    }
}

/// Configuration for creating an [LPIPS](Lpips) metric.
#[derive(Config, Debug)]
pub struct LpipsConfig {
    /// Shared evaluation options.
    #[config(default = "MetricConfig::new()")]
    pub base: MetricConfig,

    /// Inputs are in `[0, 1]` and get mapped to `[-1, 1]`.
    #[config(default = true)]
    pub normalize: bool,
}

impl LpipsConfig {
    /// Initialize [LPIPS](Lpips) with a freshly built network.
    pub fn init<B: Backend>(&self, device: &B::Device) -> MetricResult<Lpips<B>> {
        self.init_with(LpipsNetwork::new(device))
    }

    /// Initialize [LPIPS](Lpips) around an existing, possibly pretrained, network.
    pub fn init_with<B: Backend>(&self, network: LpipsNetwork<B>) -> MetricResult<Lpips<B>> {
        let taps = network.backbone.output_channels();
        let heads: Vec<usize> = network
            .linear
            .heads
            .iter()
            .map(|head| head.weight.dims()[1])
            .collect();
        if taps != heads {
            return Err(MetricError::invalid_parameter(
                NAME,
                format!("linear heads {heads:?} do not match backbone taps {taps:?}"),
            ));
        }

        Ok(Lpips {
            engine: MetricEngine::new(self.base.clone()),
            network,
            normalize: self.normalize,
        })
    }
}

/// Learned perceptual distance. Lower is better.
#[derive(Debug)]
pub struct Lpips<B: Backend> {
    engine: MetricEngine,
    network: LpipsNetwork<B>,
    normalize: bool,
}

impl<B: Backend> Lpips<B> {
    pub fn network(&self) -> &LpipsNetwork<B> {
        &self.network
    }

    fn to_rgb(&self, image: Tensor<B, 4>) -> MetricResult<Tensor<B, 4>> {
        let [_, channels, height, width] = image.dims();
        let min_side = self.network.backbone.min_input_size();
        if height.min(width) < min_side {
            return Err(MetricError::invalid_input(
                NAME,
                format!("images need a side of at least {min_side} pixels, got {height}x{width}"),
            ));
        }

        let rgb = match channels {
            3 => image,
            1 => image.repeat_dim(1, 3),
            other => {
                return Err(MetricError::unsupported_input(
                    NAME,
                    format!("expected 1 or 3 channels, got {other}"),
                ))
            }
        };

        if self.normalize {
            Ok(rgb.mul_scalar(2.0).sub_scalar(1.0))
        } else {
            Ok(rgb)
        }
    }
}

impl<B: Backend> Metric<B> for Lpips<B> {
    fn name(&self) -> &str {
        NAME
    }

    fn higher_is_better(&self) -> bool {
        false
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
        let x = self.to_rgb(estimate.into_real(NAME)?)?;
        let y = self.to_rgb(required(NAME, reference)?.into_real(NAME)?)?;
        Ok(self.network.distance(x, y))
    }
}
