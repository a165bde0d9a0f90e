//! Copy flat, label-prefixed images into per-label bucket directories.

use crate::index::read_dir_paths;
use crate::types::{BurnDatasetError, DatasetResult, OrganizeReport};
use data_contracts::label_from_path;
use std::fs::{self, FileTimes};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Only files with this exact extension are organized (non-recursive).
pub const SOURCE_EXTENSION: &str = "jpg";

/// List `*.jpg` files directly under `source`, sorted by path.
pub fn list_source_images(source: &Path) -> DatasetResult<Vec<PathBuf>> {
    let mut files: Vec<PathBuf> = read_dir_paths(source)?
        .into_iter()
        .filter(|p| p.is_file())
        .filter(|p| p.extension().and_then(|s| s.to_str()) == Some(SOURCE_EXTENSION))
        .collect();
    files.sort();
    Ok(files)
}

/// Copy every source image into `dest/<label>/`, creating buckets lazily.
///
/// Labels are taken verbatim from the leading filename segment; malformed names produce
/// oddly named buckets rather than errors. Existing files in a bucket are overwritten,
/// so re-running over the same source is idempotent. Nothing under `dest` is created
/// when there are no matching files.
pub fn organize_dataset(source: &Path, dest: &Path) -> DatasetResult<OrganizeReport> {
    let files = list_source_images(source)?;
    let mut report = OrganizeReport::default();
    for file in files {
        let (Some(label), Some(name)) = (label_from_path(&file), file.file_name()) else {
            warn!(path = %file.display(), "skipping file without a UTF-8 name");
            continue;
        };
        let bucket_dir = dest.join(label);
        fs::create_dir_all(&bucket_dir).map_err(|e| BurnDatasetError::Io {
            path: bucket_dir.clone(),
            source: e,
        })?;
        let target = bucket_dir.join(name);
        copy_preserving_metadata(&file, &target)?;
        info!(
            file = %name.to_string_lossy(),
            label,
            "copied image into age bucket"
        );
        report.copied += 1;
        *report.buckets.entry(label.to_string()).or_default() += 1;
    }
    Ok(report)
}

/// `fs::copy` carries permission bits; access/modification times are copied explicitly.
fn copy_preserving_metadata(src: &Path, dst: &Path) -> DatasetResult<()> {
    fs::copy(src, dst).map_err(|e| BurnDatasetError::Io {
        path: dst.to_path_buf(),
        source: e,
    })?;
    let meta = fs::metadata(src).map_err(|e| BurnDatasetError::Io {
        path: src.to_path_buf(),
        source: e,
    })?;
    let mut times = FileTimes::new();
    if let Ok(modified) = meta.modified() {
        times = times.set_modified(modified);
    }
    if let Ok(accessed) = meta.accessed() {
        times = times.set_accessed(accessed);
    }
    // Read-only copies cannot be reopened for writing; the content copy still stands.
    if let Err(e) = fs::File::options()
        .write(true)
        .open(dst)
        .and_then(|f| f.set_times(times))
    {
        warn!(path = %dst.display(), error = %e, "could not preserve file times");
    }
    Ok(())
}
