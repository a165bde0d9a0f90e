//! ImageNet MobileNetV2 weights from safetensors checkpoints.
//!
//! Two tensor naming schemes are understood:
//! - torchvision (`features.0.0.weight`, `features.{k}.conv.*`, `features.18.*`)
//! - timm `mobilenetv2_100` (`conv_stem.weight`, `blocks.{i}.{j}.*`, `conv_head.weight`)
//!
//! Conv weights are `[out, in / groups, k, k]` in both, which matches Burn's `Conv2d`.

use crate::mobilenet::{INVERTED_RESIDUAL_SETTINGS, NUM_BLOCKS};
use half::{bf16, f16};
use safetensors::tensor::Dtype;
use safetensors::SafeTensors;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PretrainedError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid safetensors data: {0}")]
    Format(String),
    #[error("unrecognized MobileNetV2 tensor names (expected torchvision or timm layout)")]
    UnknownLayout,
    #[error("pretrained weights are missing tensor `{0}`")]
    Missing(String),
    #[error("tensor `{key}` has shape {found:?}, expected {expected:?}")]
    Shape {
        key: String,
        expected: Vec<usize>,
        found: Vec<usize>,
    },
    #[error("tensor `{key}` has unsupported dtype {dtype}")]
    UnsupportedDtype { key: String, dtype: String },
    #[error("failed to load backbone record: {0}")]
    Record(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WeightLayout {
    TorchVision,
    Timm,
}

#[derive(Debug, Clone)]
pub struct WeightTensor {
    pub shape: Vec<usize>,
    pub values: Vec<f32>,
}

/// Float tensors of a checkpoint, keyed by name. Importing drains it.
#[derive(Debug, Default)]
pub struct WeightMap {
    tensors: HashMap<String, WeightTensor>,
}

impl WeightMap {
    pub fn from_file(path: &Path) -> Result<Self, PretrainedError> {
        let bytes = std::fs::read(path).map_err(|source| PretrainedError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_safetensors(&bytes)
    }

    /// Decode F32/F16/BF16 tensors. Integer tensors (batch-norm counters) are skipped.
    pub fn from_safetensors(bytes: &[u8]) -> Result<Self, PretrainedError> {
        let st = SafeTensors::deserialize(bytes).map_err(|e| PretrainedError::Format(e.to_string()))?;
        let mut tensors = HashMap::new();
        for (name, view) in st.tensors() {
            let data = view.data();
            let values: Vec<f32> = match view.dtype() {
                Dtype::F32 => data
                    .chunks_exact(4)
                    .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
                    .collect(),
                Dtype::F16 => data
                    .chunks_exact(2)
                    .map(|c| f16::from_le_bytes([c[0], c[1]]).to_f32())
                    .collect(),
                Dtype::BF16 => data
                    .chunks_exact(2)
                    .map(|c| bf16::from_le_bytes([c[0], c[1]]).to_f32())
                    .collect(),
                Dtype::I64 | Dtype::I32 | Dtype::U8 => continue,
                other => {
                    return Err(PretrainedError::UnsupportedDtype {
                        key: name,
                        dtype: format!("{other:?}"),
                    })
                }
            };
            tensors.insert(
                name,
                WeightTensor {
                    shape: view.shape().to_vec(),
                    values,
                },
            );
        }
        Ok(Self { tensors })
    }

    pub fn insert(&mut self, name: impl Into<String>, tensor: WeightTensor) {
        self.tensors.insert(name.into(), tensor);
    }

    pub fn len(&self) -> usize {
        self.tensors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tensors.is_empty()
    }

    pub fn layout(&self) -> Option<WeightLayout> {
        if self.tensors.contains_key("features.0.0.weight") {
            Some(WeightLayout::TorchVision)
        } else if self.tensors.contains_key("conv_stem.weight") {
            Some(WeightLayout::Timm)
        } else {
            None
        }
    }

    /// Remove `key`, checking its shape.
    pub fn take(&mut self, key: &str, expected: &[usize]) -> Result<Vec<f32>, PretrainedError> {
        let tensor = self
            .tensors
            .remove(key)
            .ok_or_else(|| PretrainedError::Missing(key.to_string()))?;
        if tensor.shape != expected {
            return Err(PretrainedError::Shape {
                key: key.to_string(),
                expected: expected.to_vec(),
                found: tensor.shape,
            });
        }
        Ok(tensor.values)
    }

    /// Names not consumed by an import, sorted.
    pub fn remaining(&self) -> Vec<String> {
        let mut names: Vec<String> = self.tensors.keys().cloned().collect();
        names.sort();
        names
    }
}

/// One conv + batch-norm unit of the backbone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Unit {
    Stem,
    Expand { block: usize },
    Depthwise { block: usize, expanded: bool },
    Project { block: usize, expanded: bool },
    Head,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnitKeys {
    pub conv_weight: String,
    /// Prefix of `weight`, `bias`, `running_mean`, `running_var`.
    pub norm_prefix: String,
}

impl UnitKeys {
    fn new(conv: String, norm: String) -> Self {
        Self {
            conv_weight: format!("{conv}.weight"),
            norm_prefix: norm,
        }
    }

    /// Gamma, beta, running mean, running variance.
    pub fn norm_keys(&self) -> [String; 4] {
        ["weight", "bias", "running_mean", "running_var"].map(|s| format!("{}.{s}", self.norm_prefix))
    }

    pub fn norm_tensors(&self) -> impl Iterator<Item = String> {
        self.norm_keys().into_iter()
    }
}

/// Stage and repeat index of flat block `block` (timm's `blocks.{i}.{j}`).
fn stage_position(block: usize) -> (usize, usize) {
    let mut remaining = block;
    for (stage, (_, _, repeats, _)) in INVERTED_RESIDUAL_SETTINGS.iter().enumerate() {
        if remaining < *repeats {
            return (stage, remaining);
        }
        remaining -= repeats;
    }
    (INVERTED_RESIDUAL_SETTINGS.len(), remaining)
}

pub fn unit_keys(layout: WeightLayout, unit: Unit) -> UnitKeys {
    match layout {
        WeightLayout::TorchVision => torchvision_keys(unit),
        WeightLayout::Timm => timm_keys(unit),
    }
}

fn torchvision_keys(unit: Unit) -> UnitKeys {
    let head = NUM_BLOCKS + 1;
    let (conv, norm) = match unit {
        Unit::Stem => ("features.0.0".to_string(), "features.0.1".to_string()),
        Unit::Head => (format!("features.{head}.0"), format!("features.{head}.1")),
        Unit::Expand { block } => {
            let f = block + 1;
            (format!("features.{f}.conv.0.0"), format!("features.{f}.conv.0.1"))
        }
        Unit::Depthwise { block, expanded } => {
            let (f, i) = (block + 1, usize::from(expanded));
            (format!("features.{f}.conv.{i}.0"), format!("features.{f}.conv.{i}.1"))
        }
        Unit::Project { block, expanded } => {
            let (f, i) = (block + 1, 1 + usize::from(expanded));
            (format!("features.{f}.conv.{i}"), format!("features.{f}.conv.{}", i + 1))
        }
    };
    UnitKeys::new(conv, norm)
}

fn timm_keys(unit: Unit) -> UnitKeys {
    let block_prefix = |block: usize| {
        let (stage, index) = stage_position(block);
        format!("blocks.{stage}.{index}")
    };
    let (conv, norm) = match unit {
        Unit::Stem => ("conv_stem".to_string(), "bn1".to_string()),
        Unit::Head => ("conv_head".to_string(), "bn2".to_string()),
        Unit::Expand { block } => {
            let p = block_prefix(block);
            (format!("{p}.conv_pw"), format!("{p}.bn1"))
        }
        Unit::Depthwise { block, expanded } => {
            let p = block_prefix(block);
            let bn = if expanded { "bn2" } else { "bn1" };
            (format!("{p}.conv_dw"), format!("{p}.{bn}"))
        }
        Unit::Project { block, expanded } => {
            let p = block_prefix(block);
            let (conv, bn) = if expanded {
                ("conv_pwl", "bn3")
            } else {
                ("conv_pw", "bn2")
            };
            (format!("{p}.{conv}"), format!("{p}.{bn}"))
        }
    };
    UnitKeys::new(conv, norm)
}
