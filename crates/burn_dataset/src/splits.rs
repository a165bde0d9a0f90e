//! Deterministic train/validation splitting.

use crate::types::{BurnDatasetError, DatasetResult, SampleIndex};
use rand::seq::SliceRandom;
use rand::SeedableRng;

pub const DEFAULT_SPLIT_SEED: u64 = 123;
pub const DEFAULT_VAL_FRACTION: f32 = 0.2;

/// Shuffle with `seed`, then hold out the trailing `floor(len * val_fraction)` samples.
///
/// The same seed and input always produce the same, non-overlapping split.
pub fn split_indices(
    mut indices: Vec<SampleIndex>,
    val_fraction: f32,
    seed: u64,
) -> DatasetResult<(Vec<SampleIndex>, Vec<SampleIndex>)> {
    if !(0.0..1.0).contains(&val_fraction) {
        return Err(BurnDatasetError::Other(format!(
            "val_fraction must be in [0, 1), got {val_fraction}"
        )));
    }
    // Sort first so the split does not depend on directory listing order.
    indices.sort_by(|a, b| a.path.cmp(&b.path));
    let mut rng = rand::rngs::StdRng::seed_from_u64(seed);
    indices.shuffle(&mut rng);
    let val_len = (indices.len() as f32 * val_fraction) as usize;
    let train_len = indices.len() - val_len;
    let val = indices.split_off(train_len);
    Ok((indices, val))
}
