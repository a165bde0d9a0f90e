use crate::config::PipelineConfig;
use clap::Args;
use std::path::PathBuf;

/// Bucket tree root (`<dest>/<label>/<file>`), falling back to the pipeline config.
#[derive(Debug, Clone, Default, Args)]
pub struct DatasetRootArgs {
    /// Root of the label-named bucket directories.
    #[arg(long)]
    pub dataset_root: Option<PathBuf>,
}

impl DatasetRootArgs {
    pub fn resolve(&self, cfg: &PipelineConfig) -> PathBuf {
        self.dataset_root
            .clone()
            .unwrap_or_else(|| cfg.dataset_root.clone())
    }
}

/// Model checkpoint path; its model card sits next to it.
#[derive(Debug, Clone, Default, Args)]
pub struct CheckpointArgs {
    /// Checkpoint path (`.bin`).
    #[arg(long)]
    pub checkpoint: Option<PathBuf>,
}

impl CheckpointArgs {
    pub fn resolve(&self, cfg: &PipelineConfig) -> PathBuf {
        self.checkpoint
            .clone()
            .unwrap_or_else(|| cfg.checkpoint.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_override_config() {
        let cfg = PipelineConfig::default();
        let args = DatasetRootArgs {
            dataset_root: Some(PathBuf::from("/data/buckets")),
        };
        assert_eq!(args.resolve(&cfg), PathBuf::from("/data/buckets"));
        assert_eq!(DatasetRootArgs::default().resolve(&cfg), cfg.dataset_root);
        assert_eq!(CheckpointArgs::default().resolve(&cfg), cfg.checkpoint);
    }
}
