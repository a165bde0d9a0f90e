use crate::error::InferenceError;
use crate::estimator::{AgeEstimator, BurnAgeEstimator};
use crate::{InferenceBackend, InferenceModel};
use burn::tensor::backend::Backend;
use data_contracts::{card_path_for, ModelCard};
use models::AgeRegressorConfig;
use std::path::Path;
use std::sync::Arc;
use tracing::info;

/// Loads a checkpoint plus its model card into a ready estimator.
pub struct InferenceFactory;

impl InferenceFactory {
    /// Reads `<checkpoint>.card.json` first so preprocessing matches training exactly.
    pub fn load(&self, checkpoint: &Path) -> Result<BurnAgeEstimator, InferenceError> {
        let card_path = card_path_for(checkpoint);
        let card = ModelCard::load(&card_path)?;
        if !checkpoint.exists() {
            return Err(InferenceError::Checkpoint {
                path: checkpoint.to_path_buf(),
                message: "file not found".to_string(),
            });
        }

        let device = <InferenceBackend as Backend>::Device::default();
        let cfg = AgeRegressorConfig::default().with_dropout(card.dropout);
        let model = InferenceModel::<InferenceBackend>::load_checkpoint(cfg, checkpoint, &device)
            .map_err(|e| InferenceError::Checkpoint {
                path: checkpoint.to_path_buf(),
                message: e.to_string(),
            })?;
        info!(
            checkpoint = %checkpoint.display(),
            image_size = card.preprocess.image_size,
            best_val_mae = ?card.best_val_mae,
            "loaded age model"
        );
        Ok(BurnAgeEstimator::new(model, card.preprocess, device))
    }

    pub fn build(&self, checkpoint: &Path) -> Result<Arc<dyn AgeEstimator>, InferenceError> {
        Ok(Arc::new(self.load(checkpoint)?))
    }
}
