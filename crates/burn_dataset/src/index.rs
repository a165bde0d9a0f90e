//! Indexing and loading of age bucket directories.

use crate::aug::TransformPipeline;
use crate::types::{AgeSample, BurnDatasetError, DatasetResult, SampleIndex};
use data_contracts::parse_bucket_value;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Extensions picked up when indexing a bucket (compared case-insensitively).
pub const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "bmp", "gif"];

pub(crate) fn is_image_file(path: &Path) -> bool {
    path.is_file()
        && path
            .extension()
            .and_then(|s| s.to_str())
            .map(|ext| {
                IMAGE_EXTENSIONS
                    .iter()
                    .any(|known| ext.eq_ignore_ascii_case(known))
            })
            .unwrap_or(false)
}

/// Paths of the entries directly under `dir`. A failed entry read fails the listing.
pub(crate) fn read_dir_paths(dir: &Path) -> DatasetResult<Vec<PathBuf>> {
    let entries = fs::read_dir(dir).map_err(|e| BurnDatasetError::Io {
        path: dir.to_path_buf(),
        source: e,
    })?;
    collect_entry_paths(dir, entries.map(|entry| entry.map(|e| e.path())))
}

fn collect_entry_paths(
    dir: &Path,
    entries: impl Iterator<Item = io::Result<PathBuf>>,
) -> DatasetResult<Vec<PathBuf>> {
    entries
        .map(|entry| {
            entry.map_err(|e| BurnDatasetError::Io {
                path: dir.to_path_buf(),
                source: e,
            })
        })
        .collect()
}

/// Bucket directories directly under `root`, sorted by name.
pub(crate) fn list_buckets(root: &Path) -> DatasetResult<Vec<(String, PathBuf)>> {
    let mut buckets = Vec::new();
    for path in read_dir_paths(root)? {
        if !path.is_dir() {
            continue;
        }
        let Some(name) = path.file_name().and_then(|s| s.to_str()) else {
            continue;
        };
        buckets.push((name.to_string(), path.clone()));
    }
    buckets.sort();
    Ok(buckets)
}

pub(crate) fn list_bucket_images(bucket_dir: &Path) -> DatasetResult<Vec<PathBuf>> {
    let mut images: Vec<PathBuf> = read_dir_paths(bucket_dir)?
        .into_iter()
        .filter(|p| is_image_file(p))
        .collect();
    images.sort();
    Ok(images)
}

/// Scan a bucket root (e.g. `dataset/new-dataset`) and index every image.
///
/// Fails on the first bucket whose name is not a number: training on a garbage bucket
/// would silently teach the model a wrong target.
pub fn index_buckets(root: &Path) -> DatasetResult<Vec<SampleIndex>> {
    let mut indices = Vec::new();
    for (name, bucket_dir) in list_buckets(root)? {
        let age = parse_bucket_value(&name).map_err(|source| BurnDatasetError::Label {
            path: bucket_dir.clone(),
            source,
        })?;
        for path in list_bucket_images(&bucket_dir)? {
            indices.push(SampleIndex {
                path,
                bucket: name.clone(),
                age,
            });
        }
    }
    indices.sort_by(|a, b| a.path.cmp(&b.path));
    Ok(indices)
}

pub(crate) fn load_sample(
    idx: &SampleIndex,
    pipeline: &TransformPipeline,
    rng: &mut dyn rand::RngCore,
) -> DatasetResult<AgeSample> {
    let img = image::open(&idx.path)
        .map_err(|e| BurnDatasetError::Image {
            path: idx.path.clone(),
            source: e,
        })?
        .to_rgb8();
    let image_chw = pipeline.apply(&img, rng)?;
    Ok(AgeSample {
        image_chw,
        age: idx.age,
    })
}
