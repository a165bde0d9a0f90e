use std::path::Path;
use thiserror::Error;

/// Filenames encode the age as their leading `_`-separated segment (`25_0_0_photo.jpg`).
pub const LABEL_DELIMITER: char = '_';

#[derive(Debug, Error, PartialEq)]
pub enum LabelError {
    #[error("bucket name {0:?} is not a number")]
    NotNumeric(String),
    #[error("bucket value {0} is not finite")]
    NonFinite(f32),
}

/// Leading segment of a file stem. A stem without a delimiter is returned whole.
pub fn label_from_stem(stem: &str) -> &str {
    stem.split(LABEL_DELIMITER).next().unwrap_or(stem)
}

/// Label for a path, taken from its file stem. `None` only when the path has no UTF-8 stem.
pub fn label_from_path(path: &Path) -> Option<&str> {
    path.file_stem()
        .and_then(|s| s.to_str())
        .map(label_from_stem)
}

/// Numeric target for a bucket directory name.
pub fn parse_bucket_value(name: &str) -> Result<f32, LabelError> {
    let value: f32 = name
        .trim()
        .parse()
        .map_err(|_| LabelError::NotNumeric(name.to_string()))?;
    if !value.is_finite() {
        return Err(LabelError::NonFinite(value));
    }
    Ok(value)
}
