//! Image preprocessing shared by the trainer and the inference service.
//!
//! Both sides call [`PreprocessConfig::resize`] and [`PreprocessConfig::normalize_chw`]
//! so the tensor a model sees at inference time is built exactly like the ones it was
//! trained on. The trainer records the config in the model card; the server reads it back.

use image::imageops::FilterType;
use image::RgbImage;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Square input edge for the MobileNetV2 backbone.
pub const DEFAULT_IMAGE_SIZE: u32 = 224;

#[derive(Debug, Error)]
pub enum PreprocessError {
    #[error("failed to decode image: {0}")]
    Decode(#[from] image::ImageError),
    #[error("image is {actual:?}, expected {expected}x{expected}")]
    DimensionMismatch { expected: u32, actual: (u32, u32) },
    #[error("invalid preprocess config: {0}")]
    InvalidConfig(String),
}

/// Resampling filter used when resizing to the model input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResizeFilter {
    Nearest,
    Triangle,
    CatmullRom,
    Lanczos3,
}

impl From<ResizeFilter> for FilterType {
    fn from(filter: ResizeFilter) -> Self {
        match filter {
            ResizeFilter::Nearest => FilterType::Nearest,
            ResizeFilter::Triangle => FilterType::Triangle,
            ResizeFilter::CatmullRom => FilterType::CatmullRom,
            ResizeFilter::Lanczos3 => FilterType::Lanczos3,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PreprocessConfig {
    /// Images are force-resized (no letterbox) to `image_size` x `image_size`.
    pub image_size: u32,
    pub filter: ResizeFilter,
    /// Per-pixel affine map applied to raw u8 values: `v * scale + offset`.
    pub scale: f32,
    pub offset: f32,
}

impl Default for PreprocessConfig {
    fn default() -> Self {
        // MobileNetV2 expects inputs in [-1, 1].
        Self {
            image_size: DEFAULT_IMAGE_SIZE,
            filter: ResizeFilter::Triangle,
            scale: 1.0 / 127.5,
            offset: -1.0,
        }
    }
}

impl PreprocessConfig {
    pub fn with_image_size(mut self, image_size: u32) -> Self {
        self.image_size = image_size;
        self
    }

    pub fn validate(&self) -> Result<(), PreprocessError> {
        if self.image_size == 0 {
            return Err(PreprocessError::InvalidConfig(
                "image_size must be positive".into(),
            ));
        }
        if !self.scale.is_finite() || self.scale == 0.0 || !self.offset.is_finite() {
            return Err(PreprocessError::InvalidConfig(format!(
                "normalization must be finite with non-zero scale (scale={}, offset={})",
                self.scale, self.offset
            )));
        }
        Ok(())
    }

    /// Number of f32 values in one preprocessed CHW sample.
    pub fn input_len(&self) -> usize {
        3 * self.image_size as usize * self.image_size as usize
    }

    /// Tensor shape of a single sample with a leading batch dimension of one.
    pub fn batch_shape(&self) -> [usize; 4] {
        let s = self.image_size as usize;
        [1, 3, s, s]
    }

    pub fn resize(&self, img: &RgbImage) -> RgbImage {
        let s = self.image_size;
        if img.dimensions() == (s, s) {
            return img.clone();
        }
        image::imageops::resize(img, s, s, self.filter.into())
    }

    /// Normalize an already-resized image into planar CHW floats.
    pub fn normalize_chw(&self, img: &RgbImage) -> Result<Vec<f32>, PreprocessError> {
        let s = self.image_size;
        if img.dimensions() != (s, s) {
            return Err(PreprocessError::DimensionMismatch {
                expected: s,
                actual: img.dimensions(),
            });
        }
        let plane = (s * s) as usize;
        let mut out = vec![0.0f32; 3 * plane];
        for (x, y, pixel) in img.enumerate_pixels() {
            let base = (y * s + x) as usize;
            out[base] = pixel[0] as f32 * self.scale + self.offset;
            out[plane + base] = pixel[1] as f32 * self.scale + self.offset;
            out[2 * plane + base] = pixel[2] as f32 * self.scale + self.offset;
        }
        Ok(out)
    }

    /// Resize + normalize in one step (the inference path).
    pub fn preprocess(&self, img: &RgbImage) -> Result<Vec<f32>, PreprocessError> {
        self.normalize_chw(&self.resize(img))
    }

    /// Decode arbitrary image bytes and run the full pipeline.
    pub fn preprocess_bytes(&self, bytes: &[u8]) -> Result<Vec<f32>, PreprocessError> {
        let img = decode_rgb(bytes)?;
        self.preprocess(&img)
    }
}

/// Decode any format the `image` crate understands and force 3-channel RGB.
pub fn decode_rgb(bytes: &[u8]) -> Result<RgbImage, PreprocessError> {
    Ok(image::load_from_memory(bytes)?.to_rgb8())
}
