use std::path::PathBuf;

use anyhow::{Context, Result};
use burn_dataset::{organize_dataset, types::OrganizeReport};
use clap::Args;
use cli_support::PipelineConfig;
use tracing::info;

#[derive(Debug, Clone, Default, Args)]
pub struct OrganizeArgs {
    /// Flat directory of `<label>_*.jpg` files.
    #[arg(long)]
    pub source: Option<PathBuf>,
    /// Destination root for `<label>/` bucket directories.
    #[arg(long)]
    pub dest: Option<PathBuf>,
}

impl OrganizeArgs {
    pub fn resolve(&self, cfg: &PipelineConfig) -> (PathBuf, PathBuf) {
        (
            self.source.clone().unwrap_or_else(|| cfg.source_dir.clone()),
            self.dest.clone().unwrap_or_else(|| cfg.dataset_root.clone()),
        )
    }
}

/// Copy every top-level `*.jpg` under the source into its label bucket.
pub fn run_organize(args: &OrganizeArgs, cfg: &PipelineConfig) -> Result<OrganizeReport> {
    let (source, dest) = args.resolve(cfg);
    let report = organize_dataset(&source, &dest).with_context(|| {
        format!(
            "organizing {} into {}",
            source.display(),
            dest.display()
        )
    })?;
    info!(
        copied = report.copied,
        buckets = report.buckets.len(),
        dest = %dest.display(),
        "dataset organized"
    );
    Ok(report)
}
