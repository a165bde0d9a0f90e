//! Core types, error definitions, and data structures for burn_dataset.

use data_contracts::{LabelError, PreprocessError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use thiserror::Error;

pub type DatasetResult<T> = Result<T, BurnDatasetError>;

#[derive(Debug, Error)]
pub enum BurnDatasetError {
    #[error("io error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("image decode error at {path}: {source}")]
    Image {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
    #[error("bucket {path} has no usable label: {source}")]
    Label {
        path: PathBuf,
        #[source]
        source: LabelError,
    },
    #[error(transparent)]
    Preprocess(#[from] PreprocessError),
    #[error("{0}")]
    Other(String),
}

/// One image under a bucket directory, with the bucket's numeric value as its target.
#[derive(Debug, Clone, PartialEq)]
pub struct SampleIndex {
    pub path: PathBuf,
    pub bucket: String,
    pub age: f32,
}

#[derive(Debug, Clone)]
pub struct AgeSample {
    /// Preprocessed image in CHW layout.
    pub image_chw: Vec<f32>,
    pub age: f32,
}

/// Outcome of one organizer pass.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OrganizeReport {
    pub copied: usize,
    /// Files copied per bucket label during this pass.
    pub buckets: BTreeMap<String, usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BucketSummary {
    pub name: String,
    /// `None` when the bucket name does not parse as a number.
    pub value: Option<f32>,
    pub images: usize,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DatasetSummary {
    pub buckets: Vec<BucketSummary>,
    pub total_images: usize,
}

impl DatasetSummary {
    pub fn non_numeric(&self) -> impl Iterator<Item = &BucketSummary> {
        self.buckets.iter().filter(|b| b.value.is_none())
    }

    pub fn empty(&self) -> impl Iterator<Item = &BucketSummary> {
        self.buckets.iter().filter(|b| b.images == 0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ValidationOutcome {
    Pass,
    Warn,
    Fail,
}

impl ValidationOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            ValidationOutcome::Pass => "pass",
            ValidationOutcome::Warn => "warn",
            ValidationOutcome::Fail => "fail",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationReport {
    pub outcome: ValidationOutcome,
    pub reasons: Vec<String>,
    pub summary: DatasetSummary,
}
