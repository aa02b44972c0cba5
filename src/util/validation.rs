//! Ground-plane localization validation.
//!
//! This module compares two cameras by how they localize the same image points
//! on a world plane: every test point is back-projected through both cameras
//! and the paired world points are compared.

use crate::camera::{CameraModel, CameraModelError};
use nalgebra::{Vector2, Vector3};
use serde::{Deserialize, Serialize};

use super::error_metrics::root_mean_square_distance;

/// Localization data for a single test point.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PointValidation {
    /// Image point that was back-projected (u, v)
    pub image_point: (f64, f64),
    /// World point recovered by the evaluated camera
    pub estimated_world: (f64, f64, f64),
    /// World point recovered by the reference camera
    pub ground_truth_world: (f64, f64, f64),
    /// Euclidean distance between the two world points
    pub error: f64,
}

/// Validation results for ground-plane localization.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroundPlaneValidation {
    /// Root mean square distance over all test points (world units)
    pub rms_error: f64,
    /// Largest single-point distance
    pub max_error: f64,
    /// Mean absolute difference over every coordinate of every point
    pub mean_absolute_error: f64,
    /// Per-point data, in test-point order
    pub point_data: Vec<PointValidation>,
}

/// Result of comparing an evaluated camera against a reference camera.
#[derive(Debug, Clone)]
pub enum GroundPlaneComparison {
    /// Every test point was localized by both cameras.
    Scored(GroundPlaneValidation),
    /// The reference camera cannot localize a test point; the comparison has
    /// no meaningful value. Holds the reason.
    GroundTruthDegenerate(String),
}

/// Compare ground-plane localization of `estimated` against `ground_truth`.
///
/// Test points are first back-projected through `ground_truth`. If that fails
/// for any point, the comparison is [`GroundPlaneComparison::GroundTruthDegenerate`]
/// and `estimated` is not consulted. Otherwise each point is back-projected
/// through `estimated` and the per-point Euclidean distances are combined into
/// an RMS error.
///
/// # Arguments
///
/// * `estimated` - Camera being evaluated (estimate or fallback)
/// * `ground_truth` - Reference camera
/// * `test_points` - Image points in pixels
/// * `plane_depth` - Height `Z` of the world plane
///
/// # Errors
///
/// * `CameraModelError::DegenerateProjection` - `estimated` cannot localize a test point
/// * `CameraModelError::InvalidParams` - `test_points` is empty
pub fn compare_ground_plane_localization<E, G>(
    estimated: &E,
    ground_truth: &G,
    test_points: &[Vector2<f64>],
    plane_depth: f64,
) -> Result<GroundPlaneComparison, CameraModelError>
where
    E: ?Sized + CameraModel,
    G: ?Sized + CameraModel,
{
    if test_points.is_empty() {
        return Err(CameraModelError::InvalidParams(
            "no test points to compare".to_string(),
        ));
    }

    let mut reference = Vec::with_capacity(test_points.len());
    for point in test_points {
        match ground_truth.back_project(point, plane_depth) {
            Ok(world) => reference.push(world),
            Err(CameraModelError::DegenerateProjection(reason)) => {
                return Ok(GroundPlaneComparison::GroundTruthDegenerate(reason));
            }
            Err(other) => return Err(other),
        }
    }

    let estimated_points = test_points
        .iter()
        .map(|point| estimated.back_project(point, plane_depth))
        .collect::<Result<Vec<Vector3<f64>>, CameraModelError>>()?;

    let rms_error = root_mean_square_distance(&estimated_points, &reference)
        .map_err(|e| CameraModelError::NumericalError(e.to_string()))?;

    let point_data: Vec<PointValidation> = test_points
        .iter()
        .zip(estimated_points.iter().zip(reference.iter()))
        .map(|(image, (est, gt))| PointValidation {
            image_point: (image.x, image.y),
            estimated_world: (est.x, est.y, est.z),
            ground_truth_world: (gt.x, gt.y, gt.z),
            error: (est - gt).norm(),
        })
        .collect();
    let max_error = point_data.iter().fold(0.0_f64, |acc, p| acc.max(p.error));
    let absolute_sum: f64 = estimated_points
        .iter()
        .zip(reference.iter())
        .map(|(est, gt)| (est - gt).abs().sum())
        .sum();
    let mean_absolute_error = absolute_sum / (3 * test_points.len()) as f64;

    Ok(GroundPlaneComparison::Scored(GroundPlaneValidation {
        rms_error,
        max_error,
        mean_absolute_error,
        point_data,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::ProjectiveCamera;
    use approx::assert_relative_eq;
    use nalgebra::Matrix3x4;

    fn points() -> Vec<Vector2<f64>> {
        vec![Vector2::new(10.0, 5.0), Vector2::new(50.0, 25.0)]
    }

    #[test]
    fn test_identical_cameras_have_zero_error() {
        let camera = ProjectiveCamera::default_fallback(100, 50).unwrap();
        match compare_ground_plane_localization(&camera, &camera, &points(), 0.0).unwrap() {
            GroundPlaneComparison::Scored(validation) => {
                assert_relative_eq!(validation.rms_error, 0.0);
                assert_eq!(validation.point_data.len(), 2);
            }
            other => panic!("unexpected comparison {other:?}"),
        }
    }

    #[test]
    fn test_scaled_camera_error() {
        let fallback = ProjectiveCamera::default_fallback(100, 50).unwrap();
        // Doubles image coordinates, so back-projection halves them.
        let zoom = Matrix3x4::new(2.0, 0.0, 0.0, 0.0, 0.0, 2.0, 0.0, 0.0, 0.0, 0.0, 1.0, 1.0);
        let zoomed = ProjectiveCamera::from_matrix(zoom, 100, 50).unwrap();

        match compare_ground_plane_localization(&zoomed, &fallback, &points(), 0.0).unwrap() {
            GroundPlaneComparison::Scored(validation) => {
                let d0 = Vector2::<f64>::new(5.0, 2.5).norm();
                let d1 = Vector2::<f64>::new(25.0, 12.5).norm();
                let expected = ((d0 * d0 + d1 * d1) / 2.0).sqrt();
                assert_relative_eq!(validation.rms_error, expected, epsilon = 1e-9);
                assert_relative_eq!(validation.max_error, d1, epsilon = 1e-9);
                // |dx| + |dy| per point, averaged over X, Y and Z of both points
                let expected_mae = (5.0 + 2.5 + 25.0 + 12.5) / 6.0;
                assert_relative_eq!(validation.mean_absolute_error, expected_mae, epsilon = 1e-9);
            }
            other => panic!("unexpected comparison {other:?}"),
        }
    }

    #[test]
    fn test_degenerate_sides() {
        let fallback = ProjectiveCamera::default_fallback(100, 50).unwrap();
        let p = Matrix3x4::new(0.0, 0.0, 1.0, 0.0, 0.0, 1.0, 0.0, 0.0, 1.0, 0.0, 0.0, 1.0);
        let parallel = ProjectiveCamera::from_matrix(p, 100, 50).unwrap();
        let test_points = [Vector2::new(0.0, 10.0)];

        let unscorable =
            compare_ground_plane_localization(&fallback, &parallel, &test_points, 0.0).unwrap();
        assert!(matches!(
            unscorable,
            GroundPlaneComparison::GroundTruthDegenerate(_)
        ));

        let failure = compare_ground_plane_localization(&parallel, &fallback, &test_points, 0.0);
        assert!(matches!(
            failure,
            Err(CameraModelError::DegenerateProjection(_))
        ));
    }
}
