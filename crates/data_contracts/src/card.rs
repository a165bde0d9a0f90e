use crate::preprocess::PreprocessConfig;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ModelCardSchemaVersion {
    V1,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TrainStage {
    Frozen,
    FineTune,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EpochRecord {
    pub epoch: usize,
    pub stage: TrainStage,
    pub train_mae: f32,
    pub val_mae: f32,
}

/// Sidecar written next to every checkpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelCard {
    pub schema_version: ModelCardSchemaVersion,
    pub preprocess: PreprocessConfig,
    pub dropout: f64,
    pub fine_tune_from_block: usize,
    pub train_samples: usize,
    pub val_samples: usize,
    pub epochs_run: usize,
    pub stopped_early: bool,
    pub best_val_mae: Option<f32>,
    pub history: Vec<EpochRecord>,
}

#[derive(Debug, Error)]
pub enum ModelCardError {
    #[error("io error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("json error at {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("invalid model card: {0}")]
    Invalid(String),
}

/// `checkpoints/age_regressor.bin` -> `checkpoints/age_regressor.card.json`.
pub fn card_path_for(checkpoint: &Path) -> PathBuf {
    checkpoint.with_extension("card.json")
}

impl ModelCard {
    pub fn validate(&self) -> Result<(), ModelCardError> {
        self.preprocess
            .validate()
            .map_err(|e| ModelCardError::Invalid(e.to_string()))?;
        if !(0.0..1.0).contains(&self.dropout) {
            return Err(ModelCardError::Invalid(format!(
                "dropout {} outside [0, 1)",
                self.dropout
            )));
        }
        if self.history.len() != self.epochs_run {
            return Err(ModelCardError::Invalid(format!(
                "history has {} entries but epochs_run is {}",
                self.history.len(),
                self.epochs_run
            )));
        }
        Ok(())
    }

    pub fn save(&self, path: &Path) -> Result<(), ModelCardError> {
        let json = serde_json::to_vec_pretty(self).map_err(|e| ModelCardError::Json {
            path: path.to_path_buf(),
            source: e,
        })?;
        fs::write(path, json).map_err(|e| ModelCardError::Io {
            path: path.to_path_buf(),
            source: e,
        })
    }

    pub fn load(path: &Path) -> Result<Self, ModelCardError> {
        let raw = fs::read(path).map_err(|e| ModelCardError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;
        let card: ModelCard = serde_json::from_slice(&raw).map_err(|e| ModelCardError::Json {
            path: path.to_path_buf(),
            source: e,
        })?;
        card.validate()?;
        Ok(card)
    }
}
