use burn::{
    nn::{
        conv::{Conv2d, Conv2dConfig},
        loss::CrossEntropyLossConfig,
        pool::{MaxPool2d, MaxPool2dConfig},
        Dropout, DropoutConfig, Linear, LinearConfig, PaddingConfig2d, Relu,
    },
    prelude::*,
    tensor::{activation::softmax, backend::AutodiffBackend},
    train::{ClassificationOutput, TrainOutput, TrainStep, ValidStep},
};

use crate::data::{DigitBatch, TileBatch, DIGIT_PIXELS};
use crate::tile::{CHANNELS, TILE_SIZE};

/// Convolutional classifier of 25x25 RGB board tiles.
#[derive(Module, Debug)]
pub struct TileModel<B: Backend> {
    conv1: Conv2d<B>,
    pool: MaxPool2d,
    conv2: Conv2d<B>,
    conv3: Conv2d<B>,
    hidden: Linear<B>,
    output: Linear<B>,
    dropout: Dropout,
    activation: Relu,
}

#[derive(Config, Debug)]
pub struct TileModelConfig {
    #[config(default = 13)]
    pub num_classes: usize,
    #[config(default = 32)]
    pub channels: usize,
    #[config(default = 128)]
    pub hidden_size: usize,
    #[config(default = 0.2)]
    pub dropout: f64,
}

impl TileModelConfig {
    /// Side of the feature map entering the dense layers.
    ///
    /// 25 -> conv 23 -> pool 12 -> conv 10 -> conv 8.
    fn feature_side() -> usize {
        let side = TILE_SIZE as usize - 2;
        let side = (side + 2 - 2) / 2 + 1;
        side - 4
    }

    pub fn init<B: Backend>(&self, device: &B::Device) -> TileModel<B> {
        let side = Self::feature_side();

        TileModel {
            conv1: Conv2dConfig::new([CHANNELS, self.channels], [3, 3]).init(device),
            pool: MaxPool2dConfig::new([2, 2])
                .with_strides([2, 2])
                // Symmetric padding; same 12x12 output as an asymmetric "same" pad.
                .with_padding(PaddingConfig2d::Explicit(1, 1))
                .init(),
            conv2: Conv2dConfig::new([self.channels, self.channels], [3, 3]).init(device),
            conv3: Conv2dConfig::new([self.channels, self.channels], [3, 3]).init(device),
            hidden: LinearConfig::new(self.channels * side * side, self.hidden_size).init(device),
            output: LinearConfig::new(self.hidden_size, self.num_classes).init(device),
            dropout: DropoutConfig::new(self.dropout).init(),
            activation: Relu::new(),
        }
    }
}

impl<B: Backend> TileModel<B> {
    /// # Shapes
    ///   - Images [batch_size, 3, 25, 25]
    ///   - Output [batch_size, num_classes]
    pub fn forward(&self, images: Tensor<B, 4>) -> Tensor<B, 2> {
        let x = self.activation.forward(self.conv1.forward(images));
        let x = self.dropout.forward(x);
        let x = self.pool.forward(x);

        let x = self.activation.forward(self.conv2.forward(x));
        let x = self.dropout.forward(x);
        let x = self.activation.forward(self.conv3.forward(x));
        let x = self.dropout.forward(x);

        let [batch_size, channels, height, width] = x.dims();
        let x = x.reshape([batch_size, channels * height * width]);

        let x = self.activation.forward(self.hidden.forward(x));
        let x = self.dropout.forward(x);

        self.output.forward(x)
    }

    /// Class probabilities, one row per tile.
    pub fn probabilities(&self, images: Tensor<B, 4>) -> Tensor<B, 2> {
        softmax(self.forward(images), 1)
    }

    pub fn forward_classification(
        &self,
        images: Tensor<B, 4>,
        targets: Tensor<B, 1, Int>,
    ) -> ClassificationOutput<B> {
        let output = self.forward(images);
        let loss = CrossEntropyLossConfig::new()
            .init(&output.device())
            .forward(output.clone(), targets.clone());

        ClassificationOutput::new(loss, output, targets)
    }
}

impl<B: AutodiffBackend> TrainStep<TileBatch<B>, ClassificationOutput<B>> for TileModel<B> {
    fn step(&self, batch: TileBatch<B>) -> TrainOutput<ClassificationOutput<B>> {
        let item = self.forward_classification(batch.images, batch.targets);

        TrainOutput::new(self, item.loss.backward(), item)
    }
}

impl<B: Backend> ValidStep<TileBatch<B>, ClassificationOutput<B>> for TileModel<B> {
    fn step(&self, batch: TileBatch<B>) -> ClassificationOutput<B> {
        self.forward_classification(batch.images, batch.targets)
    }
}

/// Fully connected classifier of flattened MNIST digits.
#[derive(Module, Debug)]
pub struct DigitModel<B: Backend> {
    input: Linear<B>,
    hidden: Linear<B>,
    output: Linear<B>,
    dropout: Dropout,
    activation: Relu,
}

#[derive(Config, Debug)]
pub struct DigitModelConfig {
    #[config(default = 10)]
    pub num_classes: usize,
    #[config(default = 512)]
    pub hidden_size: usize,
    #[config(default = 0.2)]
    pub dropout: f64,
}

impl DigitModelConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> DigitModel<B> {
        DigitModel {
            input: LinearConfig::new(DIGIT_PIXELS, self.hidden_size).init(device),
            hidden: LinearConfig::new(self.hidden_size, self.hidden_size).init(device),
            output: LinearConfig::new(self.hidden_size, self.num_classes).init(device),
            dropout: DropoutConfig::new(self.dropout).init(),
            activation: Relu::new(),
        }
    }
}

impl<B: Backend> DigitModel<B> {
    /// # Shapes
    ///   - Images [batch_size, 784]
    ///   - Output [batch_size, num_classes]
    pub fn forward(&self, images: Tensor<B, 2>) -> Tensor<B, 2> {
        let x = self.activation.forward(self.input.forward(images));
        let x = self.dropout.forward(x);
        let x = self.activation.forward(self.hidden.forward(x));
        let x = self.dropout.forward(x);

        self.output.forward(x)
    }

    pub fn forward_classification(
        &self,
        images: Tensor<B, 2>,
        targets: Tensor<B, 1, Int>,
    ) -> ClassificationOutput<B> {
        let output = self.forward(images);
        let loss = CrossEntropyLossConfig::new()
            .init(&output.device())
            .forward(output.clone(), targets.clone());

        ClassificationOutput::new(loss, output, targets)
    }
}

impl<B: AutodiffBackend> TrainStep<DigitBatch<B>, ClassificationOutput<B>> for DigitModel<B> {
    fn step(&self, batch: DigitBatch<B>) -> TrainOutput<ClassificationOutput<B>> {
        let item = self.forward_classification(batch.images, batch.targets);

        TrainOutput::new(self, item.loss.backward(), item)
    }
}

impl<B: Backend> ValidStep<DigitBatch<B>, ClassificationOutput<B>> for DigitModel<B> {
    fn step(&self, batch: DigitBatch<B>) -> ClassificationOutput<B> {
        self.forward_classification(batch.images, batch.targets)
    }
}
