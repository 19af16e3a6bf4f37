//! VGG16 feature extractor.
//!
//! Exposes the five ReLU activations (relu1_2, relu2_2, relu3_3, relu4_3,
//! relu5_3) used by perceptual distances. Layers are named after their
//! position in the torchvision VGG16 so pretrained weights can be remapped
//! from `features.{index}.*` keys, see [`TORCHVISION_KEY_REMAP`].

use core::f64::consts::SQRT_2;

use burn::{
    nn::{
        conv::{Conv2d, Conv2dConfig},
        pool::{MaxPool2d, MaxPool2dConfig},
        Initializer, PaddingConfig2d, Relu,
    },
    prelude::*,
};

use crate::FeatureExtractor;

/// Output channels of the five taps.
pub const VGG16_TAP_CHANNELS: [usize; 5] = [64, 128, 256, 512, 512];

/// Regex remaps from torchvision `vgg16` state-dict keys to [`Vgg16Features`] fields.
pub const TORCHVISION_KEY_REMAP: [(&str, &str); 13] = [
    (r"^features\.0\.(.+)", "conv1_1.$1"),
    (r"^features\.2\.(.+)", "conv1_2.$1"),
    (r"^features\.5\.(.+)", "conv2_1.$1"),
    (r"^features\.7\.(.+)", "conv2_2.$1"),
    (r"^features\.10\.(.+)", "conv3_1.$1"),
    (r"^features\.12\.(.+)", "conv3_2.$1"),
    (r"^features\.14\.(.+)", "conv3_3.$1"),
    (r"^features\.17\.(.+)", "conv4_1.$1"),
    (r"^features\.19\.(.+)", "conv4_2.$1"),
    (r"^features\.21\.(.+)", "conv4_3.$1"),
    (r"^features\.24\.(.+)", "conv5_1.$1"),
    (r"^features\.26\.(.+)", "conv5_2.$1"),
    (r"^features\.28\.(.+)", "conv5_3.$1"),
];

/// VGG16 convolutional trunk without the classifier.
#[derive(Module, Debug)]
pub struct Vgg16Features<B: Backend> {
    conv1_1: Conv2d<B>,
    conv1_2: Conv2d<B>,
    conv2_1: Conv2d<B>,
    conv2_2: Conv2d<B>,
    conv3_1: Conv2d<B>,
    conv3_2: Conv2d<B>,
    conv3_3: Conv2d<B>,
    conv4_1: Conv2d<B>,
    conv4_2: Conv2d<B>,
    conv4_3: Conv2d<B>,
    conv5_1: Conv2d<B>,
    conv5_2: Conv2d<B>,
    conv5_3: Conv2d<B>,
    pool: MaxPool2d,
    relu: Relu,
}

impl<B: Backend> Vgg16Features<B> {
    /// Creates a randomly initialized trunk.
    pub fn new(device: &Device<B>) -> Self {
        Self {
            conv1_1: conv3x3(3, 64, device),
            conv1_2: conv3x3(64, 64, device),
            conv2_1: conv3x3(64, 128, device),
            conv2_2: conv3x3(128, 128, device),
            conv3_1: conv3x3(128, 256, device),
            conv3_2: conv3x3(256, 256, device),
            conv3_3: conv3x3(256, 256, device),
            conv4_1: conv3x3(256, 512, device),
            conv4_2: conv3x3(512, 512, device),
            conv4_3: conv3x3(512, 512, device),
            conv5_1: conv3x3(512, 512, device),
            conv5_2: conv3x3(512, 512, device),
            conv5_3: conv3x3(512, 512, device),
            pool: MaxPool2dConfig::new([2, 2]).with_strides([2, 2]).init(),
            relu: Relu::new(),
        }
    }

    /// Forward pass returning the five taps.
    ///
    /// # Shapes
    ///
    /// - input: `[batch_size, 3, height, width]`, height and width at least 16
    /// - output: five maps at strides 1, 2, 4, 8 and 16
    pub fn forward(&self, input: Tensor<B, 4>) -> [Tensor<B, 4>; 5] {
        let relu1 = self.block(input, &[&self.conv1_1, &self.conv1_2]);
        let relu2 = self.block(
            self.pool.forward(relu1.clone()),
            &[&self.conv2_1, &self.conv2_2],
        );
        let relu3 = self.block(
            self.pool.forward(relu2.clone()),
            &[&self.conv3_1, &self.conv3_2, &self.conv3_3],
        );
        let relu4 = self.block(
            self.pool.forward(relu3.clone()),
            &[&self.conv4_1, &self.conv4_2, &self.conv4_3],
        );
        let relu5 = self.block(
            self.pool.forward(relu4.clone()),
            &[&self.conv5_1, &self.conv5_2, &self.conv5_3],
        );

        [relu1, relu2, relu3, relu4, relu5]
    }

    fn block(&self, mut input: Tensor<B, 4>, convs: &[&Conv2d<B>]) -> Tensor<B, 4> {
        for conv in convs {
            input = self.relu.forward(conv.forward(input));
        }
        input
    }
}

impl<B: Backend> FeatureExtractor<B> for Vgg16Features<B> {
    fn extract(&self, input: Tensor<B, 4>) -> Vec<Tensor<B, 4>> {
        self.forward(input).into()
    }

    fn output_channels(&self) -> Vec<usize> {
        VGG16_TAP_CHANNELS.to_vec()
    }

    fn min_input_size(&self) -> usize {
        16
    }
}

fn conv3x3<B: Backend>(in_channels: usize, out_channels: usize, device: &Device<B>) -> Conv2d<B> {
    let initializer = Initializer::KaimingNormal {
        gain: SQRT_2,
        fan_out_only: true,
    };

    // 3x3 conv, stride=1, padding=1
    Conv2dConfig::new([in_channels, out_channels], [3, 3])
        .with_stride([1, 1])
        .with_padding(PaddingConfig2d::Explicit(1, 1))
        .with_initializer(initializer)
        .init(device)
}
