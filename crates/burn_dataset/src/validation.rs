//! Bucket tree summaries and pre-training checks.

use crate::index::{list_bucket_images, list_buckets};
use crate::types::{BucketSummary, DatasetResult, DatasetSummary, ValidationOutcome, ValidationReport};
use data_contracts::parse_bucket_value;
use std::path::Path;

pub fn summarize_buckets(root: &Path) -> DatasetResult<DatasetSummary> {
    let mut summary = DatasetSummary::default();
    for (name, dir) in list_buckets(root)? {
        let images = list_bucket_images(&dir)?.len();
        summary.total_images += images;
        summary.buckets.push(BucketSummary {
            value: parse_bucket_value(&name).ok(),
            name,
            images,
        });
    }
    Ok(summary)
}

/// Non-numeric buckets or an empty tree fail (training would abort); empty buckets warn.
pub fn validate_summary(summary: DatasetSummary) -> ValidationReport {
    let mut outcome = ValidationOutcome::Pass;
    let mut reasons = Vec::new();

    if summary.total_images == 0 {
        outcome = ValidationOutcome::Fail;
        reasons.push("no images found".to_string());
    }
    let non_numeric: Vec<&str> = summary.non_numeric().map(|b| b.name.as_str()).collect();
    if !non_numeric.is_empty() {
        outcome = ValidationOutcome::Fail;
        reasons.push(format!("non-numeric buckets: {}", non_numeric.join(", ")));
    }
    let empty = summary.empty().count();
    if empty > 0 {
        if outcome == ValidationOutcome::Pass {
            outcome = ValidationOutcome::Warn;
        }
        reasons.push(format!("empty buckets: {empty} observed"));
    }

    ValidationReport {
        outcome,
        reasons,
        summary,
    }
}

pub fn summarize_root(root: &Path) -> DatasetResult<ValidationReport> {
    Ok(validate_summary(summarize_buckets(root)?))
}
