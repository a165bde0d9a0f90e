use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use cli_support::{init_tracing, CheckpointArgs, PipelineConfig};
use inference::prelude::*;

#[derive(Parser, Debug)]
#[command(
    name = "single_infer",
    about = "Estimate the age of the face in one image file"
)]
struct Args {
    /// Input image path (any format supported by the `image` crate).
    #[arg(long)]
    image: PathBuf,
    #[command(flatten)]
    checkpoint: CheckpointArgs,
}

fn main() -> Result<()> {
    init_tracing();
    let args = Args::parse();
    if !args.image.exists() {
        anyhow::bail!("input image not found: {}", args.image.display());
    }
    let ckpt = args.checkpoint.resolve(&PipelineConfig::load());
    let estimator = InferenceFactory
        .load(&ckpt)
        .with_context(|| format!("loading age model {}", ckpt.display()))?;

    let bytes = std::fs::read(&args.image)
        .with_context(|| format!("reading {}", args.image.display()))?;
    let age = estimator
        .estimate_bytes(&bytes)
        .with_context(|| format!("estimating age for {}", args.image.display()))?;
    println!("{}: {age:.1}", args.image.display());
    Ok(())
}
