//! Image augmentation and transformation pipeline.

use crate::types::DatasetResult;
use data_contracts::PreprocessConfig;
use image::RgbImage;
use rand::Rng;
use std::f32::consts::TAU;

#[derive(Debug, Clone)]
pub struct DatasetConfig {
    /// Resize target and normalization; shared with inference.
    pub preprocess: PreprocessConfig,
    /// Probability of applying a horizontal flip augmentation.
    pub flip_horizontal_prob: f32,
    /// Max rotation as a fraction of a full turn; angles are drawn from
    /// `[-factor * 2pi, factor * 2pi]`. Zero disables rotation.
    pub rotation_factor: f32,
    /// Shuffle samples at the start of every pass.
    pub shuffle: bool,
    /// Seed for reproducible shuffling and augmentation.
    pub seed: Option<u64>,
    /// Drop the last partial batch.
    pub drop_last: bool,
}

impl Default for DatasetConfig {
    fn default() -> Self {
        Self {
            preprocess: PreprocessConfig::default(),
            flip_horizontal_prob: 0.5,
            rotation_factor: 0.1,
            shuffle: true,
            seed: None,
            drop_last: false,
        }
    }
}

impl DatasetConfig {
    /// Same preprocessing, no augmentation, fixed order.
    pub fn for_validation(&self) -> Self {
        Self {
            flip_horizontal_prob: 0.0,
            rotation_factor: 0.0,
            shuffle: false,
            drop_last: false,
            ..self.clone()
        }
    }
}

#[derive(Debug, Clone)]
pub struct TransformPipeline {
    pub preprocess: PreprocessConfig,
    pub flip_horizontal_prob: f32,
    pub rotation_factor: f32,
}

impl TransformPipeline {
    pub fn from_config(cfg: &DatasetConfig) -> Self {
        Self {
            preprocess: cfg.preprocess,
            flip_horizontal_prob: cfg.flip_horizontal_prob,
            rotation_factor: cfg.rotation_factor,
        }
    }

    pub fn describe(&self) -> String {
        format!(
            "size={}x{} filter={:?} scale={:.5} offset={:.2} flip_p={:.2} rotation_factor={:.2}",
            self.preprocess.image_size,
            self.preprocess.image_size,
            self.preprocess.filter,
            self.preprocess.scale,
            self.preprocess.offset,
            self.flip_horizontal_prob,
            self.rotation_factor,
        )
    }

    /// Resize, augment, then normalize into CHW floats.
    pub(crate) fn apply(
        &self,
        img: &RgbImage,
        rng: &mut dyn rand::RngCore,
    ) -> DatasetResult<Vec<f32>> {
        let mut resized = self.preprocess.resize(img);
        maybe_hflip(&mut resized, self.flip_horizontal_prob, rng);
        maybe_rotate(&mut resized, self.rotation_factor, rng);
        Ok(self.preprocess.normalize_chw(&resized)?)
    }
}

pub(crate) fn maybe_hflip(img: &mut RgbImage, prob: f32, rng: &mut dyn rand::RngCore) {
    if prob <= 0.0 {
        return;
    }
    if rng.random_range(0.0..1.0) < prob {
        image::imageops::flip_horizontal_in_place(img);
    }
}

pub(crate) fn maybe_rotate(img: &mut RgbImage, factor: f32, rng: &mut dyn rand::RngCore) {
    if factor <= 0.0 {
        return;
    }
    let max_angle = factor * TAU;
    let angle = rng.random_range(-max_angle..max_angle);
    *img = rotate_reflect(img, angle);
}

/// Rotate about the image center, filling uncovered pixels by mirroring the image.
pub(crate) fn rotate_reflect(img: &RgbImage, angle: f32) -> RgbImage {
    let (w, h) = img.dimensions();
    if w == 0 || h == 0 {
        return img.clone();
    }
    let (sin, cos) = angle.sin_cos();
    let cx = (w as f32 - 1.0) * 0.5;
    let cy = (h as f32 - 1.0) * 0.5;
    RgbImage::from_fn(w, h, |x, y| {
        let dx = x as f32 - cx;
        let dy = y as f32 - cy;
        // Inverse map: where does this output pixel come from in the source?
        let sx = cos * dx + sin * dy + cx;
        let sy = -sin * dx + cos * dy + cy;
        sample_bilinear_reflect(img, sx, sy)
    })
}

fn reflect_index(i: i64, len: u32) -> u32 {
    let len = len as i64;
    let period = 2 * len;
    let m = i.rem_euclid(period);
    if m >= len {
        (period - 1 - m) as u32
    } else {
        m as u32
    }
}

fn sample_bilinear_reflect(img: &RgbImage, x: f32, y: f32) -> image::Rgb<u8> {
    let (w, h) = img.dimensions();
    let x0 = x.floor();
    let y0 = y.floor();
    let fx = x - x0;
    let fy = y - y0;
    let (x0, y0) = (x0 as i64, y0 as i64);
    let (xa, xb) = (reflect_index(x0, w), reflect_index(x0 + 1, w));
    let (ya, yb) = (reflect_index(y0, h), reflect_index(y0 + 1, h));
    let p00 = img.get_pixel(xa, ya);
    let p10 = img.get_pixel(xb, ya);
    let p01 = img.get_pixel(xa, yb);
    let p11 = img.get_pixel(xb, yb);
    let mut out = [0u8; 3];
    for c in 0..3 {
        let top = p00[c] as f32 * (1.0 - fx) + p10[c] as f32 * fx;
        let bottom = p01[c] as f32 * (1.0 - fx) + p11[c] as f32 * fx;
        out[c] = (top * (1.0 - fy) + bottom * fy).round().clamp(0.0, 255.0) as u8;
    }
    image::Rgb(out)
}

#[cfg(test)]
mod aug_tests {
    use super::*;
    use rand::rng;

    fn gradient(w: u32, h: u32) -> RgbImage {
        RgbImage::from_fn(w, h, |x, y| image::Rgb([(x * 40) as u8, (y * 40) as u8, 7]))
    }

    #[test]
    fn hflip_mirrors_columns() {
        let mut img = gradient(3, 2);
        let mut rng = rng();
        maybe_hflip(&mut img, 1.0, &mut rng);
        assert_eq!(img.get_pixel(0, 0)[0], 80);
        assert_eq!(img.get_pixel(2, 1)[0], 0);
    }

    #[test]
    fn zero_angle_rotation_is_identity() {
        let img = gradient(5, 4);
        assert_eq!(rotate_reflect(&img, 0.0), img);
    }

    #[test]
    fn half_turn_swaps_corners() {
        let img = gradient(5, 5);
        let rotated = rotate_reflect(&img, std::f32::consts::PI);
        assert_eq!(rotated.get_pixel(0, 0), img.get_pixel(4, 4));
        assert_eq!(rotated.get_pixel(4, 0), img.get_pixel(0, 4));
    }

    #[test]
    fn reflect_index_mirrors_out_of_range() {
        assert_eq!(reflect_index(-1, 4), 0);
        assert_eq!(reflect_index(-2, 4), 1);
        assert_eq!(reflect_index(4, 4), 3);
        assert_eq!(reflect_index(5, 4), 2);
        assert_eq!(reflect_index(2, 4), 2);
    }

    #[test]
    fn validation_config_disables_augmentation() {
        let cfg = DatasetConfig {
            seed: Some(9),
            ..Default::default()
        }
        .for_validation();
        assert_eq!(cfg.flip_horizontal_prob, 0.0);
        assert_eq!(cfg.rotation_factor, 0.0);
        assert!(!cfg.shuffle);
        assert_eq!(cfg.seed, Some(9));
    }
}
