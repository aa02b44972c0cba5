//! Integration tests for YAML and JSON persistence of cameras and configuration

use court_calib_eval::camera::{CameraModel, CameraModelError, ProjectiveCamera};
use court_calib_eval::evaluation::{EvaluationError, EvaluatorConfig};
use std::fs;
use std::path::Path;

#[test]
fn test_projective_yaml_round_trip() {
    fs::create_dir_all("output").ok();

    let input_path = "samples/projective.yaml";
    let output_path = "output/test_projective.yaml";

    let model = ProjectiveCamera::load_from_yaml(input_path).expect("Failed to load model");

    model.save_to_yaml(output_path).expect("Failed to save model");

    let reloaded = ProjectiveCamera::load_from_yaml(output_path).expect("Failed to reload model");

    assert_eq!(model.to_row_major(), reloaded.to_row_major());
    assert_eq!(model.get_resolution(), reloaded.get_resolution());
    assert_eq!(reloaded.get_model_name(), "projective");

    fs::remove_file(output_path).ok();
}

#[test]
fn test_projective_yaml_load() {
    let model = ProjectiveCamera::load_from_yaml("samples/projective.yaml")
        .expect("Failed to load model");

    assert_eq!(model.get_resolution().width, 1920);
    assert_eq!(model.get_resolution().height, 1080);
    assert_eq!(model.to_row_major()[3], 167.402477208);
    assert_eq!(model.to_row_major()[11], 1.0);
}

#[test]
fn test_yaml_with_wrong_projection_length() {
    fs::create_dir_all("output").ok();
    let path = "output/test_short_projection.yaml";
    fs::write(
        path,
        "cam0:\n  camera_model: projective\n  projection: [1, 0, 0, 0, 0, 1]\n  resolution: [100, 50]\n",
    )
    .unwrap();

    let result = ProjectiveCamera::load_from_yaml(path);
    assert!(matches!(result, Err(CameraModelError::InvalidParams(_))));

    fs::remove_file(path).ok();
}

#[test]
fn test_yaml_missing_file_and_node() {
    let result = ProjectiveCamera::load_from_yaml("samples/does_not_exist.yaml");
    assert!(matches!(result, Err(CameraModelError::IOError(_))));

    fs::create_dir_all("output").ok();
    let path = "output/test_missing_cam0.yaml";
    fs::write(path, "camera:\n  projection: []\n").unwrap();
    let result = ProjectiveCamera::load_from_yaml(path);
    assert!(matches!(result, Err(CameraModelError::InvalidParams(_))));
    fs::remove_file(path).ok();
}

#[test]
fn test_camera_json_round_trip() {
    let model = ProjectiveCamera::load_from_yaml("samples/projective.yaml").unwrap();
    let json = serde_json::to_string(&model).unwrap();
    assert!(json.starts_with(r#"{"P":["#));

    let restored: ProjectiveCamera = serde_json::from_str(&json).unwrap();
    assert_eq!(restored, model);
}

#[test]
fn test_evaluator_config_yaml() {
    let config = EvaluatorConfig::load_from_yaml(Path::new("samples/evaluator.yaml"))
        .expect("Failed to load config");
    assert_eq!(config.resolution.width, 1920);
    assert_eq!(config.resolution.height, 1080);
    assert_eq!(config.extractor.confidence_threshold, 0.4);
    assert!(config.extractor.subpixel);
    assert_eq!(config.extractor.min_separation, 2.0);

    fs::create_dir_all("output").ok();
    let path = "output/test_bad_config.yaml";
    fs::write(path, "resolution: full-hd\n").unwrap();
    let result = EvaluatorConfig::load_from_yaml(Path::new(path));
    assert!(matches!(result, Err(EvaluationError::Config(_))));
    fs::remove_file(path).ok();
}
