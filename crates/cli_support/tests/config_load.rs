use std::fs;
use std::path::PathBuf;

use cli_support::PipelineConfig;

#[test]
fn loads_minimal_config() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("age-pipeline.toml");
    fs::write(&path, "dataset_root = \"buckets\"\n").expect("write temp config");
    let cfg = PipelineConfig::from_path(&path).expect("load config");
    assert_eq!(cfg.dataset_root, PathBuf::from("buckets"));
    assert_eq!(cfg.checkpoint, PipelineConfig::default().checkpoint);
}

#[test]
fn missing_file_yields_none() {
    let dir = tempfile::tempdir().expect("tempdir");
    assert!(PipelineConfig::from_path(&dir.path().join("absent.toml")).is_none());
}

#[test]
fn unparsable_file_yields_none() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("broken.toml");
    fs::write(&path, "dataset_root = [unclosed").expect("write temp config");
    assert!(PipelineConfig::from_path(&path).is_none());
}

#[test]
fn home_prefix_is_expanded() {
    let Ok(home) = std::env::var("HOME") else {
        return;
    };
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("age-pipeline.toml");
    fs::write(&path, "backbone_weights = \"~/weights/mobilenet_v2\"\n").expect("write");
    let cfg = PipelineConfig::from_path(&path).expect("load config");
    assert_eq!(
        cfg.backbone_weights,
        Some(PathBuf::from(format!("{home}/weights/mobilenet_v2")))
    );
}
