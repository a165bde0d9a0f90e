//! Dataset organization, bucket indexing, splitting, and Burn batching for age regression.
//!
//! This crate provides utilities for:
//! - Copying label-prefixed images into per-age bucket directories
//! - Indexing bucket trees into (image, age) samples
//! - Seeded train/val splitting
//! - Flip/rotation augmentation on top of the shared preprocessing contract
//! - Burn-compatible batch iteration

pub mod aug;
pub mod index;
pub mod organize;
pub mod splits;
pub mod types;
pub mod validation;

#[cfg(feature = "burn-runtime")]
pub mod batch;

pub use aug::{DatasetConfig, TransformPipeline};
pub use index::{index_buckets, IMAGE_EXTENSIONS};
pub use organize::{list_source_images, organize_dataset, SOURCE_EXTENSION};
pub use splits::{split_indices, DEFAULT_SPLIT_SEED, DEFAULT_VAL_FRACTION};
pub use types::*;
pub use validation::{summarize_buckets, summarize_root, validate_summary};

#[cfg(feature = "burn-runtime")]
pub use batch::{build_train_val_iters, BatchIter, BurnBatch};
