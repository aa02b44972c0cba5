//! Integration tests for projection matrix estimation

use approx::assert_relative_eq;
use court_calib_eval::camera::{CameraModel, CameraModelError, ProjectiveCamera, Resolution};
use court_calib_eval::estimation::{estimate, Correspondence, MIN_CORRESPONDENCES};
use court_calib_eval::keypoints::{Landmark, COURT_LANDMARKS};
use nalgebra::{Vector2, Vector3};

fn load_broadcast_camera() -> ProjectiveCamera {
    ProjectiveCamera::load_from_yaml("samples/projective.yaml").expect("Failed to load model")
}

fn correspondences_for(camera: &ProjectiveCamera, landmarks: &[Landmark]) -> Vec<Correspondence> {
    landmarks
        .iter()
        .map(|l| Correspondence::new(camera.project(&l.position()).unwrap(), l.position()))
        .collect()
}

#[test]
fn test_recovers_camera_from_all_landmarks() {
    let truth = load_broadcast_camera();
    let correspondences = correspondences_for(&truth, &COURT_LANDMARKS);

    let estimated = estimate(&correspondences, truth.get_resolution()).unwrap();

    let expected = truth.get_projection_matrix() / truth.get_projection_matrix().norm();
    assert_relative_eq!(estimated.get_projection_matrix(), expected, epsilon = 1e-9);
    assert_eq!(estimated.get_resolution(), truth.get_resolution());

    for correspondence in &correspondences {
        let reprojected = estimated.project(&correspondence.world).unwrap();
        assert_relative_eq!(reprojected, correspondence.image, epsilon = 1e-6);
    }
}

#[test]
fn test_recovers_camera_from_minimal_set() {
    let truth = load_broadcast_camera();
    let landmarks = [
        COURT_LANDMARKS[0],
        COURT_LANDMARKS[1],
        COURT_LANDMARKS[2],
        COURT_LANDMARKS[3],
        COURT_LANDMARKS[14],
        COURT_LANDMARKS[20],
    ];
    assert_eq!(landmarks.len(), MIN_CORRESPONDENCES);
    let correspondences = correspondences_for(&truth, &landmarks);

    let estimated = estimate(&correspondences, truth.get_resolution()).unwrap();

    // Any floor point is localized where the true camera puts it.
    let pixel = Vector2::new(700.0, 800.0);
    let expected = truth.back_project(&pixel, 0.0).unwrap();
    let actual = estimated.back_project(&pixel, 0.0).unwrap();
    assert_relative_eq!(actual, expected, epsilon = 1e-4);
}

#[test]
fn test_fewer_than_six_correspondences() {
    let truth = load_broadcast_camera();
    let correspondences = correspondences_for(&truth, &COURT_LANDMARKS[14..19]);
    assert_eq!(correspondences.len(), 5);

    let result = estimate(&correspondences, truth.get_resolution());
    assert!(matches!(result, Err(CameraModelError::InsufficientData(_))));

    let result = estimate(&[], truth.get_resolution());
    assert!(matches!(result, Err(CameraModelError::InsufficientData(_))));
}

#[test]
fn test_coplanar_landmarks_rejected() {
    let truth = load_broadcast_camera();
    let floor: Vec<Landmark> = COURT_LANDMARKS
        .iter()
        .copied()
        .filter(|l| l.world[2] == 0.0)
        .collect();
    assert_eq!(floor.len(), 14);

    let result = estimate(&correspondences_for(&truth, &floor), truth.get_resolution());
    assert!(matches!(result, Err(CameraModelError::InsufficientData(_))));
}

#[test]
fn test_collinear_points_rejected() {
    let truth = load_broadcast_camera();
    let correspondences: Vec<Correspondence> = (0..8)
        .map(|i| {
            let world = Vector3::new(200.0 * i as f64, 100.0 * i as f64, 30.0 * i as f64);
            Correspondence::new(truth.project(&world).unwrap(), world)
        })
        .collect();

    let result = estimate(&correspondences, truth.get_resolution());
    assert!(matches!(result, Err(CameraModelError::InsufficientData(_))));
}

#[test]
fn test_duplicated_points_rejected() {
    let truth = load_broadcast_camera();
    let mut correspondences = correspondences_for(&truth, &COURT_LANDMARKS[..3]);
    correspondences.extend_from_slice(&correspondences.clone());
    assert_eq!(correspondences.len(), 6);

    let result = estimate(&correspondences, truth.get_resolution());
    assert!(matches!(result, Err(CameraModelError::InsufficientData(_))));
}

#[test]
fn test_estimate_is_deterministic_with_positive_sign() {
    let truth = load_broadcast_camera();
    let mut correspondences = correspondences_for(&truth, &COURT_LANDMARKS);
    // Perturb the observations so the system has no exact solution.
    for (i, c) in correspondences.iter_mut().enumerate() {
        c.image.x += 0.3 * ((i * 7) % 5) as f64 - 0.6;
        c.image.y -= 0.2 * ((i * 3) % 4) as f64 - 0.3;
    }

    let first = estimate(&correspondences, truth.get_resolution()).unwrap();
    let second = estimate(&correspondences, truth.get_resolution()).unwrap();
    assert_eq!(first.to_row_major(), second.to_row_major());

    let p = first.get_projection_matrix();
    assert_relative_eq!(p.norm(), 1.0, epsilon = 1e-12);
    assert!(p[(2, 3)] > 0.0);
}

#[test]
fn test_zero_resolution_rejected() {
    let truth = load_broadcast_camera();
    let correspondences = correspondences_for(&truth, &COURT_LANDMARKS);
    let result = estimate(
        &correspondences,
        Resolution {
            width: 0,
            height: 1080,
        },
    );
    assert!(matches!(result, Err(CameraModelError::InvalidResolution)));
}
