//! Shared data contracts: preprocessing, labels, model cards, and prediction payloads.

pub mod card;
pub mod label;
pub mod prediction;
pub mod preprocess;

pub use card::{card_path_for, EpochRecord, ModelCard, ModelCardError, TrainStage};
pub use label::{label_from_path, label_from_stem, parse_bucket_value, LabelError};
pub use prediction::{ErrorResponse, PredictionResponse, IMAGE_FIELD, NO_IMAGE_MESSAGE};
pub use preprocess::{decode_rgb, PreprocessConfig, PreprocessError, ResizeFilter};
