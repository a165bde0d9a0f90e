//! Burn models for age estimation.
//!
//! - `MobileNetV2`: feature extractor with a splittable forward pass for partial fine-tuning.
//! - `pretrained`: ImageNet weight import from torchvision/timm safetensors files.
//! - `AgeRegressor`: backbone plus a pooled single-unit regression head.
//!
//! These are pure Burn Modules. The `inference` crate wraps them into `AgeEstimator`
//! implementations for runtime use.

pub mod mobilenet;
pub mod pretrained;
pub mod regressor;

pub use mobilenet::{
    MobileNetV2, MobileNetV2Config, FEATURE_CHANNELS, INVERTED_RESIDUAL_SETTINGS, NUM_BLOCKS,
};
pub use pretrained::{PretrainedError, WeightLayout, WeightMap, WeightTensor};
pub use regressor::{AgeHead, AgeRegressor, AgeRegressorConfig, DEFAULT_FINE_TUNE_FROM_BLOCK};

pub mod prelude {
    pub use super::{AgeRegressor, AgeRegressorConfig, MobileNetV2, MobileNetV2Config};
}
