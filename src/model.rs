use burn::{
    config::Config,
    module::{Ignored, Module},
    nn::{
        conv::{Conv2d, Conv2dConfig},
        pool::{MaxPool2d, MaxPool2dConfig},
        Linear, LinearConfig, PaddingConfig2d,
    },
    tensor::{activation, backend::Backend, Tensor},
};

use crate::decoder::{scores_from_tensor, NUM_CLASSES};
use crate::error::DecodeError;
use crate::normalizer::IMAGE_SIZE;

/// Non-linearity applied after a layer.
#[derive(Config, Debug, PartialEq, Eq)]
pub enum Activation {
    Relu,
    Gelu,
}

impl Activation {
    pub fn forward<B: Backend, const D: usize>(&self, input: Tensor<B, D>) -> Tensor<B, D> {
        match self {
            Activation::Relu => activation::relu(input),
            Activation::Gelu => activation::gelu(input),
        }
    }
}

/// One convolution stage: conv, activation, then max pooling.
#[derive(Config, Debug)]
pub struct ConvStageConfig {
    pub channels_out: usize,
    #[config(default = 3)]
    pub kernel_size: usize,
    #[config(default = 1)]
    pub stride: usize,
    #[config(default = 1)]
    pub padding: usize,
    /// Pooling window, also used as the pooling stride.
    #[config(default = 2)]
    pub pool_size: usize,
    #[config(default = "Activation::Relu")]
    pub activation: Activation,
}

impl ConvStageConfig {
    /// Spatial edge length after this stage for an input of edge length `size`.
    pub fn output_size(&self, size: usize) -> usize {
        let padded = size + 2 * self.padding;
        if padded < self.kernel_size {
            return 0;
        }
        let convolved = (padded - self.kernel_size) / self.stride + 1;
        convolved / self.pool_size
    }
}

/// Topology of the character classifier.
///
/// The defaults describe the handwriting network:
/// `[1, 28, 28] -> conv 32 -> pool -> conv 64 -> pool -> 3136 -> 128 -> 62`.
#[derive(Config, Debug)]
pub struct ClassifierConfig {
    #[config(default = 1)]
    pub channels_in: usize,
    #[config(default = "IMAGE_SIZE")]
    pub input_size: usize,
    #[config(default = "default_conv_stages()")]
    pub conv_stages: Vec<ConvStageConfig>,
    #[config(default = 128)]
    pub hidden_size: usize,
    #[config(default = "Activation::Relu")]
    pub hidden_activation: Activation,
    #[config(default = "NUM_CLASSES")]
    pub num_classes: usize,
}

fn default_conv_stages() -> Vec<ConvStageConfig> {
    vec![ConvStageConfig::new(32), ConvStageConfig::new(64)]
}

impl ClassifierConfig {
    /// Width of the flattened feature vector fed to the hidden dense layer.
    pub fn flattened_size(&self) -> usize {
        let (channels, size) = self
            .conv_stages
            .iter()
            .fold((self.channels_in, self.input_size), |(_, size), stage| {
                (stage.channels_out, stage.output_size(size))
            });

        channels * size * size
    }

    /// Returns a classifier with freshly initialized parameters.
    ///
    /// Parameters never require gradients, the classifier only runs inference.
    pub fn init<B: Backend>(&self, device: &B::Device) -> Classifier<B> {
        let flattened_size = self.flattened_size();
        assert!(
            flattened_size > 0,
            "Convolution stages reduce a {0}x{0} input to nothing",
            self.input_size
        );

        let mut channels_in = self.channels_in;
        let blocks = self
            .conv_stages
            .iter()
            .map(|stage| {
                let block = ConvBlock::new(stage, channels_in, device);
                channels_in = stage.channels_out;
                block
            })
            .collect();

        let classifier = Classifier {
            blocks,
            hidden: LinearConfig::new(flattened_size, self.hidden_size).init(device),
            output: LinearConfig::new(self.hidden_size, self.num_classes).init(device),
            activation: Ignored(self.hidden_activation.clone()),
            input_shape: Ignored([self.channels_in, self.input_size, self.input_size]),
        };

        log::debug!(
            "Initialized classifier with {} parameters",
            classifier.num_params()
        );

        classifier.no_grad()
    }
}

#[derive(Module, Debug)]
pub struct ConvBlock<B: Backend> {
    conv: Conv2d<B>,
    pool: MaxPool2d,
    activation: Ignored<Activation>,
}

impl<B: Backend> ConvBlock<B> {
    fn new(config: &ConvStageConfig, channels_in: usize, device: &B::Device) -> Self {
        let kernel = [config.kernel_size, config.kernel_size];
        let conv = Conv2dConfig::new([channels_in, config.channels_out], kernel)
            .with_stride([config.stride, config.stride])
            .with_padding(PaddingConfig2d::Explicit(config.padding, config.padding))
            .init(device);
        let pool = MaxPool2dConfig::new([config.pool_size, config.pool_size])
            .with_strides([config.pool_size, config.pool_size])
            .init();

        Self {
            conv,
            pool,
            activation: Ignored(config.activation.clone()),
        }
    }

    pub fn forward(&self, input: Tensor<B, 4>) -> Tensor<B, 4> {
        let x = self.conv.forward(input);
        let x = self.activation.forward(x);
        self.pool.forward(x)
    }
}

/// Convolutional network scoring a grayscale image against every class of the alphabet.
#[derive(Module, Debug)]
pub struct Classifier<B: Backend> {
    blocks: Vec<ConvBlock<B>>,
    hidden: Linear<B>,
    output: Linear<B>,
    activation: Ignored<Activation>,
    input_shape: Ignored<[usize; 3]>,
}

impl<B: Backend> Classifier<B> {
    /// Computes the unnormalized class scores.
    ///
    /// # Shapes
    ///
    /// - input: `[batch_size, channels_in, input_size, input_size]`
    /// - output: `[batch_size, num_classes]`
    ///
    /// # Panics
    ///
    /// When the input does not match the configured channels and size.
    pub fn forward(&self, input: Tensor<B, 4>) -> Tensor<B, 2> {
        let [_batch_size, channels, height, width] = input.dims();
        assert_eq!(
            [channels, height, width],
            *self.input_shape,
            "Classifier input has shape [channels, height, width] = {:?}, expected {:?}",
            [channels, height, width],
            *self.input_shape
        );

        let x = self
            .blocks
            .iter()
            .fold(input, |x, block| block.forward(x));
        let x: Tensor<B, 2> = x.flatten(1, 3);

        let x = self.hidden.forward(x);
        let x = self.activation.forward(x);
        self.output.forward(x)
    }

    /// Scores a single image, returning one raw score per class.
    pub fn score(&self, input: Tensor<B, 4>) -> Result<Vec<f32>, DecodeError> {
        let scores = scores_from_tensor(self.forward(input))?;
        log::trace!("Class scores: {scores:?}");

        Ok(scores)
    }
}
