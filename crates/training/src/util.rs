use burn::backend::Autodiff;
use burn::module::AutodiffModule;
use burn::optim::{AdamConfig, GradientsParams, Optimizer};
use burn::record::RecorderError;
use burn::tensor::backend::Backend;
use burn_dataset::{build_train_val_iters, BatchIter, DatasetConfig};
use cli_support::{DatasetRootArgs, PipelineConfig};
use data_contracts::card::ModelCardSchemaVersion;
use data_contracts::{card_path_for, EpochRecord, ModelCard, PreprocessConfig, TrainStage};
use models::{AgeRegressor, AgeRegressorConfig, NUM_BLOCKS};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::early_stopping::{run_monitored, EarlyStopping};
use crate::metrics::{evaluate_mae, mae_loss, scalar, MeanMeter};
use crate::TrainBackend;
use clap::{Parser, ValueEnum};

type ADBackend = Autodiff<TrainBackend>;

#[derive(ValueEnum, Debug, Clone, Copy)]
pub enum BackendKind {
    NdArray,
    Wgpu,
}

#[derive(Parser, Debug, Clone)]
#[command(
    name = "train",
    about = "Train the MobileNetV2 age regressor (frozen head stage, then partial fine-tuning)"
)]
pub struct TrainArgs {
    #[command(flatten)]
    pub dataset: DatasetRootArgs,
    /// Checkpoint output path; the model card is written next to it.
    #[arg(long)]
    pub checkpoint_out: Option<PathBuf>,
    /// Pretrained MobileNetV2 weights: an ImageNet `.safetensors` checkpoint
    /// (torchvision or timm tensor names) or a Burn record from `import_backbone`.
    #[arg(long)]
    pub backbone_weights: Option<PathBuf>,
    /// Backend to use (ndarray or wgpu if enabled).
    #[arg(long, value_enum, default_value_t = BackendKind::NdArray)]
    pub backend: BackendKind,
    #[arg(long, default_value_t = 32)]
    pub batch_size: usize,
    /// Epochs with the backbone frozen.
    #[arg(long, default_value_t = 10)]
    pub frozen_epochs: usize,
    /// Epoch ceiling across both stages.
    #[arg(long, default_value_t = 20)]
    pub total_epochs: usize,
    #[arg(long, default_value_t = 1e-3)]
    pub lr_frozen: f64,
    #[arg(long, default_value_t = 1e-5)]
    pub lr_fine_tune: f64,
    /// Fine-tuning epochs without validation improvement before stopping.
    #[arg(long, default_value_t = 5)]
    pub patience: usize,
    #[arg(long, default_value_t = burn_dataset::DEFAULT_VAL_FRACTION)]
    pub val_fraction: f32,
    /// Seed for the train/val split.
    #[arg(long, default_value_t = burn_dataset::DEFAULT_SPLIT_SEED)]
    pub seed: u64,
    /// Seed for shuffling and augmentation (random when unset).
    #[arg(long)]
    pub aug_seed: Option<u64>,
    /// First inverted-residual block unfrozen during fine-tuning (0..=17).
    #[arg(long, default_value_t = models::DEFAULT_FINE_TUNE_FROM_BLOCK)]
    pub fine_tune_from_block: usize,
    /// Square input size; recorded in the model card for inference.
    #[arg(long, default_value_t = data_contracts::preprocess::DEFAULT_IMAGE_SIZE)]
    pub image_size: u32,
    #[arg(long, default_value_t = 0.2)]
    pub dropout: f64,
}

impl TrainArgs {
    fn validate(&self) -> anyhow::Result<()> {
        if self.batch_size == 0 {
            anyhow::bail!("--batch-size must be at least 1");
        }
        if self.total_epochs < self.frozen_epochs {
            anyhow::bail!(
                "--total-epochs ({}) must be >= --frozen-epochs ({})",
                self.total_epochs,
                self.frozen_epochs
            );
        }
        if self.fine_tune_from_block > NUM_BLOCKS {
            anyhow::bail!(
                "--fine-tune-from-block must be in 0..={NUM_BLOCKS}, got {}",
                self.fine_tune_from_block
            );
        }
        if !(0.0..1.0).contains(&self.dropout) {
            anyhow::bail!("--dropout must be in [0, 1), got {}", self.dropout);
        }
        Ok(())
    }
}

pub fn validate_backend_choice(kind: BackendKind) -> anyhow::Result<()> {
    let built_wgpu = cfg!(feature = "backend-wgpu");
    match (kind, built_wgpu) {
        (BackendKind::Wgpu, false) => {
            anyhow::bail!("backend-wgpu feature not enabled; rebuild with --features backend-wgpu or choose ndarray backend")
        }
        (BackendKind::NdArray, true) => {
            warn!("built with backend-wgpu; training will still use the WGPU backend despite --backend ndarray");
        }
        _ => {}
    }
    Ok(())
}

/// First fine-tuning epoch index: the last frozen epoch, matching a resume from
/// the final epoch of the frozen stage.
pub fn fine_tune_start(frozen_epochs: usize) -> usize {
    frozen_epochs.saturating_sub(1)
}

/// Rebuild the regressor described by `card` and load its weights.
pub fn load_regressor_from_checkpoint<B: Backend, P: AsRef<Path>>(
    path: P,
    card: &ModelCard,
    device: &B::Device,
) -> Result<AgeRegressor<B>, RecorderError> {
    let cfg = AgeRegressorConfig::default().with_dropout(card.dropout);
    AgeRegressor::<B>::load_checkpoint(cfg, path, device)
}

/// Train, save the checkpoint and its model card, and return the card.
pub fn run_train(args: &TrainArgs, pipeline: &PipelineConfig) -> anyhow::Result<ModelCard> {
    validate_backend_choice(args.backend)?;
    args.validate()?;

    let dataset_root = args.dataset.resolve(pipeline);
    let ckpt_path = args
        .checkpoint_out
        .clone()
        .unwrap_or_else(|| pipeline.checkpoint.clone());
    let backbone_weights = args
        .backbone_weights
        .clone()
        .or_else(|| pipeline.backbone_weights.clone());

    if let Some(parent) = ckpt_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }

    let preprocess = PreprocessConfig::default().with_image_size(args.image_size);
    let train_cfg = DatasetConfig {
        preprocess,
        seed: args.aug_seed,
        ..Default::default()
    };
    let (mut train_iter, mut val_iter) =
        build_train_val_iters(&dataset_root, args.val_fraction, args.seed, train_cfg).map_err(
            |e| anyhow::anyhow!("failed to index dataset at {}: {e}", dataset_root.display()),
        )?;
    if train_iter.is_empty() || val_iter.is_empty() {
        anyhow::bail!(
            "split of {} produced {} train / {} val samples; both must be non-empty",
            dataset_root.display(),
            train_iter.len(),
            val_iter.len()
        );
    }
    info!(
        root = %dataset_root.display(),
        train = train_iter.len(),
        val = val_iter.len(),
        pipeline = %train_iter.pipeline().describe(),
        "indexed dataset"
    );

    let device = <ADBackend as Backend>::Device::default();
    let model_cfg = AgeRegressorConfig::default().with_dropout(args.dropout);
    let mut model = model_cfg.init::<ADBackend>(&device);
    match &backbone_weights {
        Some(path) => {
            model.backbone = model
                .backbone
                .load_pretrained(path, &device)
                .map_err(|e| anyhow::anyhow!("failed to load backbone weights {}: {e}", path.display()))?;
            info!(path = %path.display(), "loaded pretrained backbone");
        }
        None => warn!("no --backbone-weights given; backbone starts from random initialization"),
    }

    let mut history = Vec::new();

    // Stage 1: head only.
    let mut optim = AdamConfig::new().init::<ADBackend, AgeRegressor<ADBackend>>();
    for epoch in 0..args.frozen_epochs {
        let (next, train_mae) = train_epoch(
            model,
            &mut optim,
            &mut train_iter,
            args,
            TrainStage::Frozen,
            &device,
        )?;
        model = next;
        let val_mae = evaluate_mae(&model.valid(), &mut val_iter, args.batch_size, &device)?;
        log_epoch(epoch, TrainStage::Frozen, train_mae, val_mae);
        history.push(EpochRecord {
            epoch,
            stage: TrainStage::Frozen,
            train_mae,
            val_mae,
        });
    }

    // Stage 2: a fresh optimizer over the unfrozen tail, with early stopping.
    // Resumes at the last frozen epoch index, so that epoch is numbered twice.
    let mut optim = AdamConfig::new().init::<ADBackend, AgeRegressor<ADBackend>>();
    let mut stopper = EarlyStopping::new(args.patience);
    let epochs = fine_tune_start(args.frozen_epochs)..args.total_epochs;
    let outcome = run_monitored(model, epochs, &mut stopper, |model, epoch| {
        let (next, train_mae) = train_epoch(
            model,
            &mut optim,
            &mut train_iter,
            args,
            TrainStage::FineTune,
            &device,
        )?;
        let val_mae = evaluate_mae(&next.valid(), &mut val_iter, args.batch_size, &device)?;
        log_epoch(epoch, TrainStage::FineTune, train_mae, val_mae);
        history.push(EpochRecord {
            epoch,
            stage: TrainStage::FineTune,
            train_mae,
            val_mae,
        });
        Ok::<_, anyhow::Error>((next, val_mae))
    })?;
    let model = outcome.model;
    let stopped_early = outcome.stopped_early;

    let best_val_mae = stopper
        .best()
        .or_else(|| history.last().map(|r| r.val_mae).filter(|v| v.is_finite()));
    let card = ModelCard {
        schema_version: ModelCardSchemaVersion::V1,
        preprocess,
        dropout: args.dropout,
        fine_tune_from_block: args.fine_tune_from_block,
        train_samples: train_iter.len(),
        val_samples: val_iter.len(),
        epochs_run: history.len(),
        stopped_early,
        best_val_mae,
        history,
    };

    model
        .valid()
        .save_checkpoint(&ckpt_path)
        .map_err(|e| anyhow::anyhow!("failed to save checkpoint: {e}"))?;
    let card_path = card_path_for(&ckpt_path);
    card.save(&card_path)?;
    info!(
        checkpoint = %ckpt_path.display(),
        card = %card_path.display(),
        epochs = card.epochs_run,
        "saved checkpoint"
    );
    Ok(card)
}

fn train_epoch<O>(
    mut model: AgeRegressor<ADBackend>,
    optim: &mut O,
    iter: &mut BatchIter,
    args: &TrainArgs,
    stage: TrainStage,
    device: &<ADBackend as Backend>::Device,
) -> anyhow::Result<(AgeRegressor<ADBackend>, f32)>
where
    O: Optimizer<AgeRegressor<ADBackend>, ADBackend>,
{
    let lr = match stage {
        TrainStage::Frozen => args.lr_frozen,
        TrainStage::FineTune => args.lr_fine_tune,
    };
    let mut meter = MeanMeter::default();
    iter.restart();
    while let Some(batch) = iter.next_batch::<ADBackend>(args.batch_size, device)? {
        let batch_len = batch.ages.dims()[0];
        let preds = match stage {
            TrainStage::Frozen => model.forward_frozen(batch.images),
            TrainStage::FineTune => {
                model.forward_fine_tune(batch.images, args.fine_tune_from_block)
            }
        };
        let loss = mae_loss(preds, batch.ages);
        let loss_detached = loss.clone().detach();
        let grads = GradientsParams::from_grads(loss.backward(), &model);
        model = optim.step(lr, model, grads);
        meter.update(scalar(loss_detached), batch_len);
    }
    Ok((model, meter.mean()))
}

fn log_epoch(epoch: usize, stage: TrainStage, train_mae: f32, val_mae: f32) {
    info!(
        epoch,
        stage = ?stage,
        train_mae,
        val_mae,
        "epoch complete"
    );
}
