use clap::Parser;
use cli_support::PipelineConfig;
use data_contracts::{card_path_for, ModelCard, TrainStage};
use image::{Rgb, RgbImage};
use std::fs;
use std::path::Path;
use burn_dataset::{build_train_val_iters, DatasetConfig};
use training::{
    evaluate_mae, fine_tune_start, load_regressor_from_checkpoint, run_train, TrainArgs,
    TrainBackend,
};

fn synthetic_buckets(root: &Path) -> anyhow::Result<()> {
    for (age, shade) in [("8", 40u8), ("30", 120), ("65", 220)] {
        let dir = root.join(age);
        fs::create_dir_all(&dir)?;
        for i in 0..3u8 {
            let img = RgbImage::from_pixel(24, 24, Rgb([shade, shade / 2 + i, 255 - shade]));
            img.save(dir.join(format!("{age}_{i}_0_sample.jpg")))?;
        }
    }
    Ok(())
}

fn tiny_args(root: &Path, ckpt: &Path, extra: &[&str]) -> TrainArgs {
    let mut argv = vec![
        "train".to_string(),
        "--dataset-root".into(),
        root.display().to_string(),
        "--checkpoint-out".into(),
        ckpt.display().to_string(),
        "--image-size".into(),
        "32".into(),
        "--batch-size".into(),
        "4".into(),
        "--aug-seed".into(),
        "7".into(),
    ];
    argv.extend(extra.iter().map(|s| s.to_string()));
    TrainArgs::parse_from(argv)
}

#[test]
fn two_stage_run_writes_checkpoint_and_card() -> anyhow::Result<()> {
    let tmp = tempfile::tempdir()?;
    let root = tmp.path().join("buckets");
    synthetic_buckets(&root)?;
    let ckpt = tmp.path().join("out").join("age_regressor.bin");

    let args = tiny_args(
        &root,
        &ckpt,
        &["--frozen-epochs", "1", "--total-epochs", "2", "--patience", "1"],
    );
    let card = run_train(&args, &PipelineConfig::default())?;

    assert!(ckpt.exists(), "checkpoint missing");
    // Fine-tuning resumes at the last frozen epoch index: frozen [0], fine-tune [0, 1].
    assert_eq!(card.epochs_run, 3);
    assert_eq!(card.history[0].stage, TrainStage::Frozen);
    assert_eq!(card.history[1].stage, TrainStage::FineTune);
    assert_eq!(card.history[1].epoch, 0);
    assert_eq!(card.history[2].epoch, 1);
    assert_eq!(card.train_samples + card.val_samples, 9);
    assert_eq!(card.preprocess.image_size, 32);

    let loaded = ModelCard::load(&card_path_for(&ckpt))?;
    assert_eq!(loaded.epochs_run, card.epochs_run);

    let device = Default::default();
    let model = load_regressor_from_checkpoint::<TrainBackend, _>(&ckpt, &loaded, &device)
        .map_err(|e| anyhow::anyhow!("failed to load checkpoint: {e}"))?;
    let images = burn::tensor::Tensor::<TrainBackend, 4>::zeros([1, 3, 32, 32], &device);
    let out: Vec<f32> = model.forward(images).into_data().to_vec().unwrap();
    assert!(out[0].is_finite() && out[0] >= 0.0);
    Ok(())
}

#[test]
fn epoch_ceiling_is_never_exceeded() -> anyhow::Result<()> {
    let tmp = tempfile::tempdir()?;
    let root = tmp.path().join("buckets");
    synthetic_buckets(&root)?;
    let ckpt = tmp.path().join("ceiling.bin");

    let args = tiny_args(
        &root,
        &ckpt,
        &["--frozen-epochs", "0", "--total-epochs", "2", "--patience", "5"],
    );
    let card = run_train(&args, &PipelineConfig::default())?;
    assert_eq!(card.epochs_run, 2);
    assert!(!card.stopped_early);
    assert!(card.history.iter().all(|r| r.stage == TrainStage::FineTune));
    Ok(())
}

#[test]
fn non_numeric_bucket_aborts_training() -> anyhow::Result<()> {
    let tmp = tempfile::tempdir()?;
    let root = tmp.path().join("buckets");
    synthetic_buckets(&root)?;
    fs::create_dir_all(root.join("unknown"))?;
    RgbImage::new(8, 8).save(root.join("unknown").join("x.png"))?;

    let args = tiny_args(&root, &tmp.path().join("never.bin"), &["--frozen-epochs", "1"]);
    assert!(run_train(&args, &PipelineConfig::default()).is_err());
    assert!(!tmp.path().join("never.bin").exists());
    Ok(())
}

#[test]
fn invalid_epoch_bounds_are_rejected() {
    let tmp = tempfile::tempdir().unwrap();
    let args = tiny_args(
        tmp.path(),
        &tmp.path().join("x.bin"),
        &["--frozen-epochs", "5", "--total-epochs", "3"],
    );
    assert!(run_train(&args, &PipelineConfig::default()).is_err());
}

#[test]
fn fine_tuning_resumes_from_the_last_frozen_epoch() -> anyhow::Result<()> {
    assert_eq!(fine_tune_start(0), 0);
    assert_eq!(fine_tune_start(10), 9);

    let tmp = tempfile::tempdir()?;
    let root = tmp.path().join("buckets");
    synthetic_buckets(&root)?;
    let args = tiny_args(
        &root,
        &tmp.path().join("resume.bin"),
        &["--frozen-epochs", "2", "--total-epochs", "4", "--patience", "10"],
    );
    let card = run_train(&args, &PipelineConfig::default())?;
    let frozen: Vec<usize> = card
        .history
        .iter()
        .filter(|r| r.stage == TrainStage::Frozen)
        .map(|r| r.epoch)
        .collect();
    let fine: Vec<usize> = card
        .history
        .iter()
        .filter(|r| r.stage == TrainStage::FineTune)
        .map(|r| r.epoch)
        .collect();
    assert_eq!(frozen, vec![0, 1]);
    assert_eq!(fine, vec![1, 2, 3]);
    assert!(card.history.iter().all(|r| r.epoch < 4));
    Ok(())
}

#[test]
fn saved_checkpoint_is_the_best_fine_tuning_epoch() -> anyhow::Result<()> {
    let tmp = tempfile::tempdir()?;
    let root = tmp.path().join("buckets");
    synthetic_buckets(&root)?;
    let ckpt = tmp.path().join("best.bin");
    // A large fine-tuning rate makes validation error bounce between epochs.
    let args = tiny_args(
        &root,
        &ckpt,
        &[
            "--frozen-epochs",
            "0",
            "--total-epochs",
            "5",
            "--patience",
            "2",
            "--lr-fine-tune",
            "0.05",
        ],
    );
    let card = run_train(&args, &PipelineConfig::default())?;

    let best = card
        .history
        .iter()
        .map(|r| r.val_mae)
        .filter(|v| v.is_finite())
        .fold(f32::INFINITY, f32::min);
    assert_eq!(card.best_val_mae, Some(best));
    if card.stopped_early {
        assert!(card.history.len() < 5);
    }

    // Reload and re-score the same validation split.
    let device = Default::default();
    let model = load_regressor_from_checkpoint::<TrainBackend, _>(&ckpt, &card, &device)
        .map_err(|e| anyhow::anyhow!("failed to load checkpoint: {e}"))?;
    let cfg = DatasetConfig {
        preprocess: card.preprocess,
        ..Default::default()
    };
    let (_, mut val_iter) = build_train_val_iters(&root, args.val_fraction, args.seed, cfg)?;
    let reloaded_mae = evaluate_mae(&model, &mut val_iter, args.batch_size, &device)?;
    assert!(
        (reloaded_mae - best).abs() <= 1e-3 * best.max(1.0),
        "reloaded {reloaded_mae} vs best {best} in {:?}",
        card.history
    );
    Ok(())
}
