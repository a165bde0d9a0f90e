use data_contracts::{ModelCardError, PreprocessError};
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum InferenceError {
    #[error(transparent)]
    Card(#[from] ModelCardError),
    #[error("failed to load checkpoint {path}: {message}")]
    Checkpoint { path: PathBuf, message: String },
    #[error(transparent)]
    Preprocess(#[from] PreprocessError),
    #[error("model produced no output")]
    EmptyOutput,
    #[error("model produced a non-finite estimate ({0})")]
    NonFinite(f32),
    #[error("model lock poisoned")]
    Poisoned,
}
