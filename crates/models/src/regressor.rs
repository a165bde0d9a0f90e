//! Age regressor: MobileNetV2 features, pooled, with a single non-negative output.

use crate::mobilenet::{MobileNetV2, MobileNetV2Config, FEATURE_CHANNELS, NUM_BLOCKS};
use burn::module::{AutodiffModule, Module};
use burn::nn::pool::{AdaptiveAvgPool2d, AdaptiveAvgPool2dConfig};
use burn::nn::{Dropout, DropoutConfig, Linear, LinearConfig};
use burn::record::{BinFileRecorder, FullPrecisionSettings, RecorderError};
use burn::tensor::activation::relu;
use burn::tensor::backend::{AutodiffBackend, Backend};
use burn::tensor::Tensor;
use std::path::Path;

/// Default first trainable block when fine-tuning (blocks `10..17` plus the final conv).
pub const DEFAULT_FINE_TUNE_FROM_BLOCK: usize = 10;

#[derive(Debug, Clone, Copy)]
pub struct AgeRegressorConfig {
    pub backbone: MobileNetV2Config,
    pub dropout: f64,
}

impl Default for AgeRegressorConfig {
    fn default() -> Self {
        Self {
            backbone: MobileNetV2Config::default(),
            dropout: 0.2,
        }
    }
}

impl AgeRegressorConfig {
    pub fn with_dropout(mut self, dropout: f64) -> Self {
        self.dropout = dropout;
        self
    }

    pub fn init<B: Backend>(&self, device: &B::Device) -> AgeRegressor<B> {
        AgeRegressor {
            backbone: self.backbone.init(device),
            head: AgeHead::new(self.dropout, device),
        }
    }
}

/// Global average pool -> dropout -> linear(1280, 1) -> ReLU.
#[derive(Module, Debug)]
pub struct AgeHead<B: Backend> {
    pool: AdaptiveAvgPool2d,
    dropout: Dropout,
    linear: Linear<B>,
}

impl<B: Backend> AgeHead<B> {
    pub fn new(dropout: f64, device: &B::Device) -> Self {
        Self {
            pool: AdaptiveAvgPool2dConfig::new([1, 1]).init(),
            dropout: DropoutConfig::new(dropout).init(),
            linear: LinearConfig::new(FEATURE_CHANNELS, 1).init(device),
        }
    }

    /// `[B, 1280, h, w]` features to `[B, 1]` estimates.
    pub fn forward(&self, features: Tensor<B, 4>) -> Tensor<B, 2> {
        let pooled = self.pool.forward(features);
        let [batch, channels, _, _] = pooled.dims();
        let x = pooled.reshape([batch, channels]);
        let x = self.dropout.forward(x);
        relu(self.linear.forward(x))
    }
}

#[derive(Module, Debug)]
pub struct AgeRegressor<B: Backend> {
    pub backbone: MobileNetV2<B>,
    pub head: AgeHead<B>,
}

impl<B: Backend> AgeRegressor<B> {
    pub fn new(cfg: AgeRegressorConfig, device: &B::Device) -> Self {
        cfg.init(device)
    }

    /// Full forward pass, `[B, 3, H, W]` to `[B, 1]`.
    pub fn forward(&self, images: Tensor<B, 4>) -> Tensor<B, 2> {
        self.head.forward(self.backbone.forward(images))
    }

    pub fn save_checkpoint<P: AsRef<Path>>(self, path: P) -> Result<(), RecorderError> {
        let recorder = BinFileRecorder::<FullPrecisionSettings>::new();
        self.save_file(path.as_ref(), &recorder)
    }

    /// Build a regressor from `cfg` and load the record at `path` into it.
    pub fn load_checkpoint<P: AsRef<Path>>(
        cfg: AgeRegressorConfig,
        path: P,
        device: &B::Device,
    ) -> Result<Self, RecorderError> {
        let recorder = BinFileRecorder::<FullPrecisionSettings>::new();
        cfg.init::<B>(device)
            .load_file(path.as_ref(), &recorder, device)
    }
}

impl<B: AutodiffBackend> AgeRegressor<B> {
    /// Head-only training pass. The whole backbone runs detached in inference mode,
    /// so no backbone gradients exist and batch-norm statistics stay fixed.
    pub fn forward_frozen(&self, images: Tensor<B, 4>) -> Tensor<B, 2> {
        let features = self.backbone.valid().forward(images.inner());
        self.head.forward(Tensor::from_inner(features))
    }

    /// Fine-tuning pass. Blocks before `cutoff` run detached; the rest of the
    /// backbone and the head are tracked.
    pub fn forward_fine_tune(&self, images: Tensor<B, 4>, cutoff: usize) -> Tensor<B, 2> {
        let cutoff = cutoff.min(NUM_BLOCKS);
        let prefix = self.backbone.valid().forward_prefix(images.inner(), cutoff);
        let features = self
            .backbone
            .forward_suffix(Tensor::from_inner(prefix), cutoff);
        self.head.forward(features)
    }
}
