use serial_test::serial;
use std::path::PathBuf;

use shoplens::{AppError, Config};

const KEYS: &[&str] = &[
    "SHOPLENS_DATASET_DIR",
    "SHOPLENS_UPLOAD_DIR",
    "SHOPLENS_TOP_K",
    "SHOPLENS_DETECTOR_MODEL",
    "SHOPLENS_ENCODER_MODEL",
    "SHOPLENS_CONF_THRESHOLD",
    "SHOPLENS_IOU_THRESHOLD",
    "SHOPLENS_BIND_ADDR",
];

fn clear_env() {
    for key in KEYS {
        std::env::remove_var(key);
    }
}

#[test]
#[serial]
fn test_from_env_defaults() {
    clear_env();
    assert_eq!(Config::from_env().unwrap(), Config::default());
}

#[test]
#[serial]
fn test_from_env_overrides() {
    clear_env();
    std::env::set_var("SHOPLENS_DATASET_DIR", "/srv/catalog");
    std::env::set_var("SHOPLENS_ENCODER_MODEL", "/models/clip.pt");
    std::env::set_var("SHOPLENS_IOU_THRESHOLD", "0.6");

    let config = Config::from_env().unwrap();
    clear_env();

    assert_eq!(config.dataset_dir, PathBuf::from("/srv/catalog"));
    assert_eq!(config.encoder_model, PathBuf::from("/models/clip.pt"));
    assert!((config.detector.iou_threshold - 0.6).abs() < 1e-6);
    assert_eq!(config.top_k, 5);
}

#[test]
#[serial]
fn test_from_env_rejects_bad_threshold() {
    clear_env();
    std::env::set_var("SHOPLENS_CONF_THRESHOLD", "-0.1");

    let err = Config::from_env().unwrap_err();
    clear_env();

    assert!(matches!(err, AppError::Config(_)));
}
