use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use inference::InferenceBackend;
use models::MobileNetV2Config;
use tracing::info;

#[derive(Debug, Clone, Args)]
pub struct ImportArgs {
    /// ImageNet MobileNetV2 weights: `.safetensors` (torchvision or timm names) or a Burn record.
    #[arg(long)]
    pub weights: PathBuf,
    /// Output record path; its extension is replaced with `.bin`.
    #[arg(long)]
    pub out: PathBuf,
}

/// Convert pretrained backbone weights into the record `train --backbone-weights` reads.
/// Returns the written file.
pub fn run_import(args: &ImportArgs) -> Result<PathBuf> {
    let device = Default::default();
    let backbone = MobileNetV2Config::default()
        .init::<InferenceBackend>(&device)
        .load_pretrained(&args.weights, &device)
        .with_context(|| format!("importing {}", args.weights.display()))?;
    if let Some(parent) = args.out.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("creating {}", parent.display()))?;
    }
    backbone
        .save_backbone(&args.out)
        .map_err(|e| anyhow::anyhow!("writing {}: {e}", args.out.display()))?;
    let written = args.out.with_extension("bin");
    info!(
        weights = %args.weights.display(),
        out = %written.display(),
        "backbone record written"
    );
    Ok(written)
}
