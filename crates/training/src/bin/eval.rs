use anyhow::Context;
use burn_dataset::{BatchIter, DatasetConfig};
use clap::Parser;
use cli_support::{init_tracing, CheckpointArgs, DatasetRootArgs, PipelineConfig};
use data_contracts::{card_path_for, ModelCard};
use training::util::{load_regressor_from_checkpoint, validate_backend_choice, BackendKind};
use training::{evaluate_mae, TrainBackend};
use tracing::info;

#[derive(Parser, Debug)]
#[command(
    name = "eval",
    about = "Report the mean absolute error of an age checkpoint over a bucket tree"
)]
struct Args {
    #[command(flatten)]
    dataset: DatasetRootArgs,
    #[command(flatten)]
    checkpoint: CheckpointArgs,
    /// Backend to use (ndarray or wgpu if enabled).
    #[arg(long, value_enum, default_value_t = BackendKind::NdArray)]
    backend: BackendKind,
    #[arg(long, default_value_t = 32)]
    batch_size: usize,
}

fn main() -> anyhow::Result<()> {
    init_tracing();
    let args = Args::parse();
    validate_backend_choice(args.backend)?;
    let pipeline = PipelineConfig::load();
    let root = args.dataset.resolve(&pipeline);
    let ckpt = args.checkpoint.resolve(&pipeline);

    let card_path = card_path_for(&ckpt);
    let card = ModelCard::load(&card_path)
        .with_context(|| format!("loading model card {}", card_path.display()))?;

    let device = <TrainBackend as burn::tensor::backend::Backend>::Device::default();
    let model = load_regressor_from_checkpoint::<TrainBackend, _>(&ckpt, &card, &device)
        .map_err(|e| anyhow::anyhow!("failed to load checkpoint {}: {e}", ckpt.display()))?;

    // Same preprocessing the checkpoint was trained with, no augmentation.
    let cfg = DatasetConfig {
        preprocess: card.preprocess,
        ..Default::default()
    }
    .for_validation();
    let mut iter = BatchIter::from_root(&root, cfg)
        .with_context(|| format!("indexing {}", root.display()))?;
    if iter.is_empty() {
        anyhow::bail!("no images found under {}", root.display());
    }

    let mae = evaluate_mae(&model, &mut iter, args.batch_size.max(1), &device)?;
    info!(
        samples = iter.len(),
        checkpoint = %ckpt.display(),
        "evaluation complete"
    );
    println!("MAE over {} samples: {mae:.4}", iter.len());
    Ok(())
}
