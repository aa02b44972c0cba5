use std::fs;
use std::path::Path;

use crate::camera::CameraModelError;

// Module declarations
mod error_metrics;
mod point_sampling;
mod reporting;
mod validation;
mod visualization;

// Re-export all public items from sub-modules
pub use error_metrics::{compute_reprojection_error, root_mean_square_distance, ProjectionError};
pub use point_sampling::{
    broadcast_camera, look_at_camera, project_landmarks, render_landmark_heatmap,
};
pub use reporting::{display_detailed_results, display_results_summary, export_evaluation_results};
pub use validation::{
    compare_ground_plane_localization, GroundPlaneComparison, GroundPlaneValidation,
    PointValidation,
};
pub use visualization::{create_keypoint_overlay, save_keypoint_overlay};

/// Ensure the output directory exists
pub fn ensure_output_dir() -> Result<(), UtilError> {
    let output_dir = Path::new("output");
    if !output_dir.exists() {
        fs::create_dir_all(output_dir).map_err(|e| {
            UtilError::InvalidParams(format!("Failed to create output directory: {e}"))
        })?;
    }
    Ok(())
}

#[derive(thiserror::Error, Debug)]
pub enum UtilError {
    #[error("Numerical error in computation: {0}")]
    NumericalError(String),
    #[error("Zero projection points")]
    ZeroProjectionPoints,
    #[error("Invalid parameters: {0}")]
    InvalidParams(String),
}

impl From<std::io::Error> for UtilError {
    fn from(err: std::io::Error) -> Self {
        UtilError::NumericalError(err.to_string())
    }
}

impl From<CameraModelError> for UtilError {
    fn from(err: CameraModelError) -> Self {
        UtilError::NumericalError(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::Resolution;
    use crate::keypoints::{ExtractorConfig, KeypointExtractor, COURT_LANDMARKS};
    use nalgebra::{Matrix2xX, Vector3};

    #[test]
    fn test_synthetic_heatmap_extraction() {
        let resolution = Resolution {
            width: 1920,
            height: 1080,
        };
        let camera = look_at_camera(
            &Vector3::new(1400.0, -2500.0, 900.0),
            &Vector3::new(1400.0, 750.0, 0.0),
            1500.0,
            resolution,
        )
        .unwrap();
        let heatmap = render_landmark_heatmap(&camera, &COURT_LANDMARKS, 480, 270, 1.5).unwrap();

        let extractor = KeypointExtractor::new(ExtractorConfig::default());
        let correspondences = extractor.extract(&heatmap, resolution);
        assert_eq!(correspondences.len(), COURT_LANDMARKS.len());

        let points3d = nalgebra::Matrix3xX::from_columns(
            &correspondences.iter().map(|c| c.world).collect::<Vec<_>>(),
        );
        let points2d =
            Matrix2xX::from_columns(&correspondences.iter().map(|c| c.image).collect::<Vec<_>>());
        let error = compute_reprojection_error(&camera, &points3d, &points2d).unwrap();
        // Sub-pixel peaks in a 4x downsampled heatmap.
        assert!(error.max < 1.0, "{error:?}");
    }
}
