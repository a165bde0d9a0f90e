use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::warn;

const DEFAULT_CONFIG_NAME: &str = "age-pipeline.toml";
const CONFIG_ENV: &str = "AGE_PIPELINE_CONFIG";

/// Default paths shared by the organizer, trainer, server, and tools.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineConfig {
    /// Flat directory of label-prefixed `*.jpg` files.
    pub source_dir: PathBuf,
    /// Bucket tree written by the organizer and read by the trainer.
    pub dataset_root: PathBuf,
    pub checkpoint: PathBuf,
    pub backbone_weights: Option<PathBuf>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        let dataset = PathBuf::from("dataset");
        Self {
            source_dir: dataset.join("old-dataset/UTKFace"),
            dataset_root: dataset.join("new-dataset"),
            checkpoint: PathBuf::from("checkpoints/age_regressor.bin"),
            backbone_weights: None,
        }
    }
}

#[derive(Debug, Deserialize, Default)]
struct PipelineConfigFile {
    source_dir: Option<String>,
    dataset_root: Option<String>,
    checkpoint: Option<String>,
    backbone_weights: Option<String>,
}

impl PipelineConfig {
    /// Load from `$AGE_PIPELINE_CONFIG`, else `./age-pipeline.toml`, else defaults.
    pub fn load() -> Self {
        let path = std::env::var(CONFIG_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_NAME));
        let cfg = Self::from_path(&path).unwrap_or_default();
        cfg.warn_if_invalid();
        cfg
    }

    /// `None` when the file is missing or unparsable.
    pub fn from_path(path: &Path) -> Option<Self> {
        if !path.exists() {
            return None;
        }
        let raw = std::fs::read_to_string(path).ok()?;
        match toml::from_str::<PipelineConfigFile>(&raw) {
            Ok(file) => Some(Self::from_file(file)),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "ignoring unparsable pipeline config");
                None
            }
        }
    }

    fn from_file(file: PipelineConfigFile) -> Self {
        let defaults = Self::default();
        PipelineConfig {
            source_dir: file
                .source_dir
                .map(|v| expand_path(&v))
                .unwrap_or(defaults.source_dir),
            dataset_root: file
                .dataset_root
                .map(|v| expand_path(&v))
                .unwrap_or(defaults.dataset_root),
            checkpoint: file
                .checkpoint
                .map(|v| expand_path(&v))
                .unwrap_or(defaults.checkpoint),
            backbone_weights: file
                .backbone_weights
                .filter(|v| !v.trim().is_empty())
                .map(|v| expand_path(&v)),
        }
    }

    fn warn_if_invalid(&self) {
        if self.dataset_root.as_os_str().is_empty() {
            warn!("pipeline config: dataset_root is empty; training will fail to index");
        }
        if self.checkpoint.as_os_str().is_empty() {
            warn!("pipeline config: checkpoint is empty; train/serve will fail");
        }
    }
}

fn expand_path(raw: &str) -> PathBuf {
    let mut out = raw.to_string();
    if let Some(stripped) = out.strip_prefix('~') {
        if let Ok(home) = std::env::var("HOME") {
            out = format!("{home}{stripped}");
        }
    }
    PathBuf::from(expand_env(&out))
}

/// Replace `${VAR}` with its value; unknown variables are left as written.
fn expand_env(input: &str) -> String {
    let mut out = String::new();
    let mut rest = input;
    while let Some(start) = rest.find("${") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        match after.find('}') {
            Some(end) => {
                let key = &after[..end];
                match std::env::var(key) {
                    Ok(val) => out.push_str(&val),
                    Err(_) => out.push_str(&format!("${{{key}}}")),
                }
                rest = &after[end + 1..];
            }
            None => {
                out.push_str(&rest[start..]);
                rest = "";
            }
        }
    }
    out.push_str(rest);
    out
}
