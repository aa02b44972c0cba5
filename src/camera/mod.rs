//! This module defines the camera projection interface and its error taxonomy.
//!
//! It provides a unified interface for mapping 3D world points to 2D image
//! coordinates and for intersecting image rays with a plane of constant world
//! height. The module also includes the image resolution type, parameter
//! validation helpers and the YAML I/O shared by camera implementations.
//!
//! This module re-exports the concrete camera model from its submodule:
//! - `projective`: a general 3x4 projection matrix camera.

use nalgebra::{Matrix3x4, Vector2, Vector3};
use serde::{Deserialize, Serialize};

pub mod projective;

pub use projective::{CameraDecomposition, ProjectiveCamera, FALLBACK_PROJECTION};

/// Represents the resolution of a camera image.
///
/// This struct holds the width and height of the image plane in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resolution {
    /// The width of the image in pixels.
    pub width: u32,
    /// The height of the image in pixels.
    pub height: u32,
}

/// Defines the possible errors that can occur during camera model operations.
///
/// This enum covers errors related to projection, back-projection, estimation,
/// parameter validation, file I/O, and numerical issues.
#[derive(thiserror::Error, Debug)]
pub enum CameraModelError {
    /// A projection or back-projection hit a zero homogeneous scale, or the
    /// camera ray is parallel to the target plane.
    #[error("Degenerate projection: {0}")]
    DegenerateProjection(String),
    /// Too few or degenerate correspondences to estimate a camera.
    #[error("Insufficient data for estimation: {0}")]
    InsufficientData(String),
    /// Error indicating that one or more camera parameters are invalid.
    #[error("Invalid camera parameters: {0}")]
    InvalidParams(String),
    /// Image width or height is zero.
    #[error("Resolution must be positive")]
    InvalidResolution,
    /// Error indicating a failure during YAML (de)serialization.
    #[error("Failed to load YAML: {0}")]
    YamlError(String),
    /// Error indicating a failure during file input/output operations.
    #[error("IO Error: {0}")]
    IOError(String),
    /// Error indicating a numerical instability or issue during calculations.
    #[error("NumericalError: {0}")]
    NumericalError(String),
}

/// Implements the conversion from `std::io::Error` to `CameraModelError::IOError`.
impl From<std::io::Error> for CameraModelError {
    fn from(err: std::io::Error) -> Self {
        CameraModelError::IOError(err.to_string())
    }
}

/// Implements the conversion from `yaml_rust::ScanError` to `CameraModelError::YamlError`.
impl From<yaml_rust::ScanError> for CameraModelError {
    fn from(err: yaml_rust::ScanError) -> Self {
        CameraModelError::YamlError(err.to_string())
    }
}

/// Relative tolerance below which a homogeneous scale is treated as zero.
pub const HOMOGENEOUS_EPSILON: f64 = 1e-12;

/// Validates that a homogeneous scale `w` is usable for dehomogenization.
///
/// `reference` is the magnitude of the homogeneous vector `w` belongs to; the
/// test is relative so that it does not depend on the arbitrary global scale of
/// a projection matrix.
///
/// # Examples
///
/// ```rust
/// use court_calib_eval::camera::validate_homogeneous_scale;
///
/// assert!(validate_homogeneous_scale(1.0, 1.0).is_ok());
/// assert!(validate_homogeneous_scale(0.0, 5.0).is_err());
/// assert!(validate_homogeneous_scale(f64::NAN, 1.0).is_err());
/// ```
pub fn validate_homogeneous_scale(w: f64, reference: f64) -> Result<(), CameraModelError> {
    if !w.is_finite() || w.abs() <= HOMOGENEOUS_EPSILON * reference.abs() || w == 0.0 {
        return Err(CameraModelError::DegenerateProjection(format!(
            "homogeneous scale {w:e} is zero relative to {reference:e}"
        )));
    }
    Ok(())
}

/// Defines the interface shared by camera models used in evaluation.
///
/// A camera maps world points (typically in centimetres, with the ground plane
/// at `Z = 0`) to pixel coordinates and back onto planes of constant height.
pub trait CameraModel {
    /// Projects a 3D world point to 2D image coordinates.
    ///
    /// # Errors
    /// * `DegenerateProjection` if the point lies on the camera's principal plane
    ///   (zero homogeneous scale).
    fn project(&self, point_3d: &Vector3<f64>) -> Result<Vector2<f64>, CameraModelError>;

    /// Back-projects a 2D image point onto the world plane `Z = plane_depth`.
    ///
    /// Returns the unique world point on that plane whose projection is
    /// `point_2d`.
    ///
    /// # Errors
    /// * `DegenerateProjection` if the camera ray through `point_2d` is parallel
    ///   to the plane.
    fn back_project(
        &self,
        point_2d: &Vector2<f64>,
        plane_depth: f64,
    ) -> Result<Vector3<f64>, CameraModelError>;

    /// Loads camera parameters from a YAML file.
    fn load_from_yaml(path: &str) -> Result<Self, CameraModelError>
    where
        Self: Sized;

    /// Saves the camera model's parameters to a YAML file.
    fn save_to_yaml(&self, path: &str) -> Result<(), CameraModelError>;

    /// Validates the current camera parameters.
    fn validate_params(&self) -> Result<(), CameraModelError>;

    /// Returns the resolution of the camera.
    fn get_resolution(&self) -> Resolution;

    /// Returns the 3x4 projection matrix of the camera.
    fn get_projection_matrix(&self) -> Matrix3x4<f64>;

    /// Returns the name of the camera model.
    fn get_model_name(&self) -> &'static str;
}

/// Provides common validation functions for camera parameters.
pub mod validation {
    use super::*;

    /// Ratio of smallest to largest singular value under which a projection
    /// matrix is considered rank deficient.
    pub const RANK_TOLERANCE: f64 = 1e-10;

    /// Validates that both image dimensions are positive.
    pub fn validate_resolution(resolution: &Resolution) -> Result<(), CameraModelError> {
        if resolution.width == 0 || resolution.height == 0 {
            return Err(CameraModelError::InvalidResolution);
        }
        Ok(())
    }

    /// Validates that a projection matrix is finite and has rank 3.
    ///
    /// # Errors
    /// * `InvalidParams` if an entry is not finite or the matrix is rank deficient.
    pub fn validate_projection_matrix(projection: &Matrix3x4<f64>) -> Result<(), CameraModelError> {
        if projection.iter().any(|v| !v.is_finite()) {
            return Err(CameraModelError::InvalidParams(
                "projection matrix has non-finite entries".to_string(),
            ));
        }

        let singular_values = projection.svd(false, false).singular_values;
        let max = singular_values.max();
        let min = singular_values.min();
        if max <= 0.0 || min / max < RANK_TOLERANCE {
            return Err(CameraModelError::InvalidParams(format!(
                "projection matrix must have rank 3 (singular values {:?})",
                singular_values.as_slice()
            )));
        }
        Ok(())
    }
}

/// Provides YAML I/O helpers for camera files.
///
/// Camera files use the structure:
/// ```yaml
/// cam0:
///   camera_model: projective
///   projection: [p00, p01, p02, p03, p10, ..., p23]
///   resolution: [width, height]
/// ```
pub mod yaml_io {
    use super::*;
    use std::fs;
    use std::io::Write;
    use yaml_rust::YamlLoader;

    /// Parses a row-major projection matrix and resolution from a YAML file.
    ///
    /// # Errors
    ///
    /// Returns `CameraModelError` if:
    /// * File cannot be read
    /// * YAML parsing fails
    /// * Required nodes are missing
    /// * The projection array does not hold exactly 12 numbers
    pub fn parse_yaml_camera(path: &str) -> Result<(Vec<f64>, Resolution), CameraModelError> {
        let contents = fs::read_to_string(path)?;
        let docs = YamlLoader::load_from_str(&contents)?;

        if docs.is_empty() {
            return Err(CameraModelError::InvalidParams(
                "Empty YAML document".to_string(),
            ));
        }

        let doc = &docs[0];
        let cam_node = &doc["cam0"];

        if cam_node.is_badvalue() {
            return Err(CameraModelError::InvalidParams(
                "Missing 'cam0' node in YAML".to_string(),
            ));
        }

        let projection_yaml = cam_node["projection"].as_vec().ok_or_else(|| {
            CameraModelError::InvalidParams(
                "YAML missing 'projection' array under 'cam0'".to_string(),
            )
        })?;

        if projection_yaml.len() != 12 {
            return Err(CameraModelError::InvalidParams(format!(
                "Projection array must have 12 elements, got {}",
                projection_yaml.len()
            )));
        }

        let resolution_yaml = cam_node["resolution"].as_vec().ok_or_else(|| {
            CameraModelError::InvalidParams(
                "YAML missing 'resolution' array under 'cam0'".to_string(),
            )
        })?;

        if resolution_yaml.len() < 2 {
            return Err(CameraModelError::InvalidParams(
                "Resolution array must have at least 2 elements (width, height)".to_string(),
            ));
        }

        let mut projection = Vec::with_capacity(12);
        for (i, value) in projection_yaml.iter().enumerate() {
            // Integers are accepted so that hand-written files may use `1` for `1.0`.
            let entry = value
                .as_f64()
                .or_else(|| value.as_i64().map(|v| v as f64))
                .ok_or_else(|| {
                    CameraModelError::InvalidParams(format!(
                        "Invalid projection entry at index {i}: not a number"
                    ))
                })?;
            projection.push(entry);
        }

        let resolution = Resolution {
            width: resolution_yaml[0].as_i64().ok_or_else(|| {
                CameraModelError::InvalidParams("Invalid width: not an integer".to_string())
            })? as u32,
            height: resolution_yaml[1].as_i64().ok_or_else(|| {
                CameraModelError::InvalidParams("Invalid height: not an integer".to_string())
            })? as u32,
        };

        Ok((projection, resolution))
    }

    /// Saves a row-major projection matrix and resolution to a YAML file.
    ///
    /// # Errors
    ///
    /// Returns `CameraModelError` if:
    /// * YAML serialization fails
    /// * File creation/writing fails
    pub fn save_yaml_camera(
        path: &str,
        model_name: &str,
        projection: &[f64],
        resolution: &Resolution,
    ) -> Result<(), CameraModelError> {
        let yaml = serde_yaml::to_value(serde_yaml::Mapping::from_iter([(
            serde_yaml::Value::String("cam0".to_string()),
            serde_yaml::to_value(serde_yaml::Mapping::from_iter([
                (
                    serde_yaml::Value::String("camera_model".to_string()),
                    serde_yaml::Value::String(model_name.to_string()),
                ),
                (
                    serde_yaml::Value::String("projection".to_string()),
                    serde_yaml::to_value(projection)
                        .map_err(|e| CameraModelError::YamlError(e.to_string()))?,
                ),
                (
                    serde_yaml::Value::String("resolution".to_string()),
                    serde_yaml::to_value(vec![resolution.width, resolution.height])
                        .map_err(|e| CameraModelError::YamlError(e.to_string()))?,
                ),
            ]))
            .map_err(|e| CameraModelError::YamlError(e.to_string()))?,
        )]))
        .map_err(|e| CameraModelError::YamlError(e.to_string()))?;

        let yaml_string =
            serde_yaml::to_string(&yaml).map_err(|e| CameraModelError::YamlError(e.to_string()))?;

        if let Some(parent) = std::path::Path::new(path).parent() {
            fs::create_dir_all(parent)?;
        }

        let mut file = fs::File::create(path)?;
        file.write_all(yaml_string.as_bytes())?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::validation::*;
    use super::*;

    #[test]
    fn test_validate_resolution() {
        assert!(validate_resolution(&Resolution {
            width: 100,
            height: 50
        })
        .is_ok());
        assert!(matches!(
            validate_resolution(&Resolution {
                width: 0,
                height: 50
            }),
            Err(CameraModelError::InvalidResolution)
        ));
        assert!(validate_resolution(&Resolution {
            width: 100,
            height: 0
        })
        .is_err());
    }

    #[test]
    fn test_validate_projection_matrix() {
        let p = Matrix3x4::new(1.0, 0.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 0.0, 1.0, 1.0);
        assert!(validate_projection_matrix(&p).is_ok());

        // Two identical rows: rank 2
        let rank2 = Matrix3x4::new(1.0, 2.0, 3.0, 4.0, 1.0, 2.0, 3.0, 4.0, 0.0, 0.0, 1.0, 1.0);
        assert!(matches!(
            validate_projection_matrix(&rank2),
            Err(CameraModelError::InvalidParams(_))
        ));

        let mut non_finite = p;
        non_finite[(1, 3)] = f64::INFINITY;
        assert!(validate_projection_matrix(&non_finite).is_err());

        assert!(validate_projection_matrix(&Matrix3x4::zeros()).is_err());
    }

    #[test]
    fn test_validate_homogeneous_scale() {
        assert!(validate_homogeneous_scale(2.0, 10.0).is_ok());
        assert!(validate_homogeneous_scale(-1e-3, 1.0).is_ok());
        assert!(validate_homogeneous_scale(0.0, 0.0).is_err());
        assert!(validate_homogeneous_scale(1e-15, 1e3).is_err());
        assert!(validate_homogeneous_scale(f64::INFINITY, 1.0).is_err());
    }
}
