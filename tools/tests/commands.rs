use std::fs;
use std::path::{Path, PathBuf};

use burn_dataset::{summarize_root, types::ValidationOutcome};
use cli_support::PipelineConfig;
use image::{Rgb, RgbImage};
use tools::{render_text, run_organize, OrganizeArgs};

fn write_jpg(path: &Path, shade: u8) -> anyhow::Result<()> {
    RgbImage::from_pixel(8, 8, Rgb([shade, shade, shade])).save(path)?;
    Ok(())
}

fn args(source: PathBuf, dest: PathBuf) -> OrganizeArgs {
    OrganizeArgs {
        source: Some(source),
        dest: Some(dest),
    }
}

#[test]
fn flags_override_pipeline_paths() {
    let cfg = PipelineConfig::default();
    let (source, dest) = OrganizeArgs::default().resolve(&cfg);
    assert_eq!(source, cfg.source_dir);
    assert_eq!(dest, cfg.dataset_root);

    let explicit = args(PathBuf::from("/in"), PathBuf::from("/out"));
    assert_eq!(
        explicit.resolve(&cfg),
        (PathBuf::from("/in"), PathBuf::from("/out"))
    );
}

#[test]
fn organize_then_summary_passes() -> anyhow::Result<()> {
    let tmp = tempfile::tempdir()?;
    let source = tmp.path().join("flat");
    fs::create_dir_all(&source)?;
    write_jpg(&source.join("25_0_0_photo1.jpg"), 10)?;
    write_jpg(&source.join("25_1_0_photo2.jpg"), 20)?;
    write_jpg(&source.join("61_0_3_photo3.jpg"), 30)?;
    let dest = tmp.path().join("buckets");

    let report = run_organize(&args(source.clone(), dest.clone()), &PipelineConfig::default())?;
    assert_eq!(report.copied, 3);
    assert_eq!(report.buckets.get("25"), Some(&2));
    assert_eq!(
        fs::read(source.join("25_1_0_photo2.jpg"))?,
        fs::read(dest.join("25").join("25_1_0_photo2.jpg"))?
    );

    let summary = summarize_root(&dest)?;
    assert_eq!(summary.outcome, ValidationOutcome::Pass);
    let text = render_text(&summary);
    assert!(text.contains("3 images in 2 buckets: pass"), "{text}");
    Ok(())
}

#[test]
fn missing_source_is_an_error() {
    let tmp = tempfile::tempdir().unwrap();
    let result = run_organize(
        &args(tmp.path().join("absent"), tmp.path().join("out")),
        &PipelineConfig::default(),
    );
    assert!(result.is_err());
    assert!(!tmp.path().join("out").exists());
}

#[test]
fn summary_text_flags_non_numeric_buckets() -> anyhow::Result<()> {
    let tmp = tempfile::tempdir()?;
    let root = tmp.path();
    fs::create_dir_all(root.join("40"))?;
    fs::create_dir_all(root.join("misc"))?;
    write_jpg(&root.join("40").join("a.jpg"), 50)?;
    write_jpg(&root.join("misc").join("b.jpg"), 60)?;

    let summary = summarize_root(root)?;
    assert_eq!(summary.outcome, ValidationOutcome::Fail);
    let text = render_text(&summary);
    assert!(text.contains("misc"));
    assert!(text.contains("(non-numeric)"));
    assert!(text.contains("non-numeric buckets: misc"));
    Ok(())
}

#[test]
fn import_writes_a_loadable_backbone_record() -> anyhow::Result<()> {
    use burn::tensor::Tensor;
    use inference::InferenceBackend;
    use models::MobileNetV2Config;
    use tools::{run_import, ImportArgs};

    let tmp = tempfile::tempdir()?;
    let device = Default::default();
    let source = MobileNetV2Config::default().init::<InferenceBackend>(&device);
    let images = Tensor::<InferenceBackend, 4>::ones([1, 3, 32, 32], &device);
    let expected: Vec<f32> = source.forward(images.clone()).into_data().to_vec().unwrap();
    source
        .save_backbone(tmp.path().join("source"))
        .map_err(|e| anyhow::anyhow!("{e}"))?;

    let written = run_import(&ImportArgs {
        weights: tmp.path().join("source.bin"),
        out: tmp.path().join("records/backbone"),
    })?;
    assert_eq!(written, tmp.path().join("records/backbone.bin"));

    let loaded = MobileNetV2Config::default()
        .init::<InferenceBackend>(&device)
        .load_pretrained(&written, &device)?;
    let actual: Vec<f32> = loaded.forward(images).into_data().to_vec().unwrap();
    assert_eq!(actual, expected);
    Ok(())
}

#[test]
fn import_of_a_missing_file_fails_with_its_path() {
    let tmp = tempfile::tempdir().unwrap();
    let missing = tmp.path().join("nope.safetensors");
    let err = tools::run_import(&tools::ImportArgs {
        weights: missing.clone(),
        out: tmp.path().join("out"),
    })
    .unwrap_err();
    assert!(format!("{err:#}").contains("nope.safetensors"));
    assert!(!tmp.path().join("out.bin").exists());
}
