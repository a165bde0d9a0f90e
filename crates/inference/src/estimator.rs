use crate::error::InferenceError;
use crate::{InferenceBackend, InferenceModel};
use burn::tensor::backend::Backend;
use burn::tensor::Tensor;
use data_contracts::{decode_rgb, PreprocessConfig};
use image::RgbImage;
use std::sync::Mutex;

/// Estimates an age from one RGB image.
///
/// Implementations must be shareable across request handlers; the HTTP layer holds
/// them behind `Arc<dyn AgeEstimator>`.
pub trait AgeEstimator: Send + Sync {
    fn estimate(&self, image: &RgbImage) -> Result<f32, InferenceError>;

    /// Decode raw upload bytes (any format `image` understands), then estimate.
    fn estimate_bytes(&self, bytes: &[u8]) -> Result<f32, InferenceError> {
        let image = decode_rgb(bytes)?;
        self.estimate(&image)
    }
}

/// Burn-backed estimator. Burn modules are not `Sync`, so forward passes serialize
/// on the mutex.
pub struct BurnAgeEstimator {
    model: Mutex<InferenceModel<InferenceBackend>>,
    preprocess: PreprocessConfig,
    device: <InferenceBackend as Backend>::Device,
}

impl BurnAgeEstimator {
    pub fn new(
        model: InferenceModel<InferenceBackend>,
        preprocess: PreprocessConfig,
        device: <InferenceBackend as Backend>::Device,
    ) -> Self {
        Self {
            model: Mutex::new(model),
            preprocess,
            device,
        }
    }

    pub fn preprocess(&self) -> &PreprocessConfig {
        &self.preprocess
    }
}

impl AgeEstimator for BurnAgeEstimator {
    fn estimate(&self, image: &RgbImage) -> Result<f32, InferenceError> {
        let input = self.preprocess.preprocess(image)?;
        let tensor = Tensor::<InferenceBackend, 1>::from_floats(input.as_slice(), &self.device)
            .reshape(self.preprocess.batch_shape());
        let output = {
            let model = self.model.lock().map_err(|_| InferenceError::Poisoned)?;
            model.forward(tensor)
        };
        let values = output
            .into_data()
            .to_vec::<f32>()
            .map_err(|_| InferenceError::EmptyOutput)?;
        let age = values.first().copied().ok_or(InferenceError::EmptyOutput)?;
        if !age.is_finite() {
            return Err(InferenceError::NonFinite(age));
        }
        Ok(age)
    }
}
