//! Projective (3x4 matrix) Camera Model Implementation
//!
//! This module implements the general finite projective camera `x ~ P X`, where
//! `P` is a 3x4 matrix mapping homogeneous world points to homogeneous image
//! points. It adheres to the [`CameraModel`] trait defined in the parent
//! `camera` module ([`crate::camera`]).
//!
//! Besides forward projection, the model supports back-projection onto a world
//! plane of constant height, which is how image points are localized on the
//! court floor (`Z = 0`).
//!
//! # References
//!
//! Hartley & Zisserman, "Multiple View Geometry in Computer Vision", 2nd ed.,
//! Chapter 6 (camera models) and Section 6.2.2 (back-projection of points).

use crate::camera::{
    validate_homogeneous_scale, validation, CameraModel, CameraModelError, Resolution,
};
use log::debug;
use nalgebra::{Matrix3, Matrix3x4, Vector2, Vector3, Vector4};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Projection matrix substituted when no camera can be estimated for a sample.
///
/// Row-major `[[1, 0, 0, 0], [0, 1, 0, 0], [0, 0, 1, 1]]`: an identity camera
/// whose translation column places the world origin one unit in front of the
/// camera. On the ground plane `Z = 0` its back-projection is the identity
/// `(u, v) -> (u, v, 0)`, so it is always well defined.
pub const FALLBACK_PROJECTION: [f64; 12] = [
    1.0, 0.0, 0.0, 0.0, //
    0.0, 1.0, 0.0, 0.0, //
    0.0, 0.0, 1.0, 1.0,
];

/// Relative tolerance on the 2x2 determinant used for back-projection.
const PLANE_INTERSECTION_EPSILON: f64 = 1e-12;

/// Implements a general projective camera `x ~ P X`.
///
/// # Fields
///
/// *   `projection`: 3x4 matrix, finite and of rank 3.
/// *   `resolution`: [`Resolution`] - width and height of the image plane.
///
/// Fields are private: a camera is validated on construction and never
/// mutated afterwards.
///
/// # Examples
///
/// ```rust
/// use court_calib_eval::camera::{CameraModel, ProjectiveCamera};
/// use nalgebra::Vector2;
///
/// let camera = ProjectiveCamera::default_fallback(100, 50).unwrap();
/// let world = camera.back_project(&Vector2::new(10.0, 20.0), 0.0).unwrap();
/// assert_eq!((world.x, world.y, world.z), (10.0, 20.0, 0.0));
/// ```
#[derive(Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "CameraRecord", into = "CameraRecord")]
pub struct ProjectiveCamera {
    projection: Matrix3x4<f64>,
    resolution: Resolution,
}

/// Flat persisted form of a [`ProjectiveCamera`].
#[derive(Clone, Serialize, Deserialize)]
struct CameraRecord {
    #[serde(rename = "P")]
    projection: Vec<f64>,
    width: u32,
    height: u32,
}

impl TryFrom<CameraRecord> for ProjectiveCamera {
    type Error = CameraModelError;

    fn try_from(record: CameraRecord) -> Result<Self, Self::Error> {
        ProjectiveCamera::from_row_major(&record.projection, record.width, record.height)
    }
}

impl From<ProjectiveCamera> for CameraRecord {
    fn from(camera: ProjectiveCamera) -> Self {
        CameraRecord {
            projection: camera.to_row_major().to_vec(),
            width: camera.resolution.width,
            height: camera.resolution.height,
        }
    }
}

/// Decomposition `P ~ K [R | T]` of a projection matrix.
#[derive(Debug, Clone, PartialEq)]
pub struct CameraDecomposition {
    /// Intrinsics (upper triangular, positive diagonal, `K[2,2] = 1`).
    pub k: Matrix3<f64>,
    /// World-to-camera rotation (orthonormal, det = +1).
    pub r: Matrix3<f64>,
    /// World-to-camera translation.
    pub t: Vector3<f64>,
}

impl ProjectiveCamera {
    /// Creates a camera from a 3x4 projection matrix and image dimensions.
    ///
    /// # Errors
    ///
    /// * [`CameraModelError::InvalidResolution`] if a dimension is zero.
    /// * [`CameraModelError::InvalidParams`] if `projection` is not finite or
    ///   not of rank 3.
    pub fn from_matrix(
        projection: Matrix3x4<f64>,
        width: u32,
        height: u32,
    ) -> Result<Self, CameraModelError> {
        let camera = ProjectiveCamera {
            projection,
            resolution: Resolution { width, height },
        };
        camera.validate_params()?;
        Ok(camera)
    }

    /// Creates a camera from 12 row-major matrix entries, as stored in the
    /// ground-truth and prediction files.
    ///
    /// # Errors
    ///
    /// * [`CameraModelError::InvalidParams`] if `values` does not hold exactly 12 entries.
    /// * Any error of [`ProjectiveCamera::from_matrix`].
    pub fn from_row_major(values: &[f64], width: u32, height: u32) -> Result<Self, CameraModelError> {
        if values.len() != 12 {
            return Err(CameraModelError::InvalidParams(format!(
                "Expected 12 projection matrix entries (3x4), got {}",
                values.len()
            )));
        }
        Self::from_matrix(Matrix3x4::from_row_slice(values), width, height)
    }

    /// Returns the fallback camera ([`FALLBACK_PROJECTION`]) for the given image size.
    ///
    /// # Errors
    ///
    /// * [`CameraModelError::InvalidResolution`] if a dimension is zero.
    pub fn default_fallback(width: u32, height: u32) -> Result<Self, CameraModelError> {
        Self::from_row_major(&FALLBACK_PROJECTION, width, height)
    }

    /// Returns the 12 matrix entries in row-major order.
    pub fn to_row_major(&self) -> [f64; 12] {
        let mut values = [0.0; 12];
        for r in 0..3 {
            for c in 0..4 {
                values[4 * r + c] = self.projection[(r, c)];
            }
        }
        values
    }

    /// Borrow the projection matrix.
    pub fn projection(&self) -> &Matrix3x4<f64> {
        &self.projection
    }

    /// Decomposes the camera into intrinsics, rotation and translation.
    ///
    /// `P` and `-P` describe the same camera, so the sign giving the left 3x3
    /// block `M` a positive determinant is used. `K` is then the
    /// upper-triangular Cholesky factor of `M M^T = K K^T`, obtained from the
    /// lower factor of the index-reversed Gram matrix, and `R = K^-1 M`.
    ///
    /// # Errors
    ///
    /// * [`CameraModelError::NumericalError`] if the left 3x3 block of `P` is singular
    ///   (camera at infinity).
    pub fn decompose(&self) -> Result<CameraDecomposition, CameraModelError> {
        let det = self.projection.fixed_view::<3, 3>(0, 0).determinant();
        let block_norm = self.projection.fixed_view::<3, 3>(0, 0).norm();
        if det.abs() <= f64::EPSILON * block_norm.powi(3) {
            return Err(CameraModelError::NumericalError(
                "left 3x3 block of P is singular".to_string(),
            ));
        }

        let p = self.projection * det.signum();
        let m = p.fixed_view::<3, 3>(0, 0).into_owned();

        let exchange = Matrix3::new(0.0, 0.0, 1.0, 0.0, 1.0, 0.0, 1.0, 0.0, 0.0);
        let gram = exchange * m * m.transpose() * exchange;
        let lower = gram
            .cholesky()
            .ok_or_else(|| {
                CameraModelError::NumericalError("M M^T is not positive definite".to_string())
            })?
            .l();
        let k = exchange * lower * exchange;

        let k_inv = k.try_inverse().ok_or_else(|| {
            CameraModelError::NumericalError("intrinsics block is not invertible".to_string())
        })?;
        let r = k_inv * m;
        let t: Vector3<f64> = k_inv * p.column(3);

        Ok(CameraDecomposition {
            k: k / k[(2, 2)],
            r,
            t,
        })
    }
}

/// Provides a debug string representation for [`ProjectiveCamera`].
impl fmt::Debug for ProjectiveCamera {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let p = self.to_row_major();
        write!(
            f,
            "Projective [{}x{} P: [{:.6}, {:.6}, {:.6}, {:.6}; {:.6}, {:.6}, {:.6}, {:.6}; {:.6}, {:.6}, {:.6}, {:.6}]]",
            self.resolution.width,
            self.resolution.height,
            p[0], p[1], p[2], p[3], p[4], p[5], p[6], p[7], p[8], p[9], p[10], p[11]
        )
    }
}

impl CameraModel for ProjectiveCamera {
    /// Projects a world point by `x = P [X; 1]` followed by division by `x.z`.
    ///
    /// # Errors
    ///
    /// * [`CameraModelError::DegenerateProjection`]: the point lies on the
    ///   principal plane of the camera and projects to infinity.
    fn project(&self, point_3d: &Vector3<f64>) -> Result<Vector2<f64>, CameraModelError> {
        let homogeneous = self.projection * point_3d.push(1.0);
        validate_homogeneous_scale(homogeneous.z, homogeneous.norm())?;
        Ok(Vector2::new(
            homogeneous.x / homogeneous.z,
            homogeneous.y / homogeneous.z,
        ))
    }

    /// Intersects the camera ray through `point_2d` with the plane `Z = plane_depth`.
    ///
    /// With rows `p0, p1, p2` of `P` and `X = (x, y, plane_depth, 1)`, the image
    /// constraints `(p0 - u p2) . X = 0` and `(p1 - v p2) . X = 0` form a 2x2
    /// linear system in `(x, y)`, solved in closed form.
    ///
    /// # Errors
    ///
    /// * [`CameraModelError::DegenerateProjection`]: the system is singular (ray
    ///   parallel to the plane) or the intersection has zero homogeneous scale.
    fn back_project(
        &self,
        point_2d: &Vector2<f64>,
        plane_depth: f64,
    ) -> Result<Vector3<f64>, CameraModelError> {
        let p0 = self.projection.row(0).transpose();
        let p1 = self.projection.row(1).transpose();
        let p2 = self.projection.row(2).transpose();

        let a: Vector4<f64> = p0 - p2 * point_2d.x;
        let b: Vector4<f64> = p1 - p2 * point_2d.y;

        let det = a[0] * b[1] - a[1] * b[0];
        let reference = a.fixed_rows::<2>(0).norm() * b.fixed_rows::<2>(0).norm();
        if !det.is_finite() || det.abs() <= PLANE_INTERSECTION_EPSILON * reference || det == 0.0 {
            return Err(CameraModelError::DegenerateProjection(format!(
                "ray through ({}, {}) is parallel to plane Z = {}",
                point_2d.x, point_2d.y, plane_depth
            )));
        }

        let rhs_a = -(a[2] * plane_depth + a[3]);
        let rhs_b = -(b[2] * plane_depth + b[3]);
        let x = (rhs_a * b[1] - a[1] * rhs_b) / det;
        let y = (a[0] * rhs_b - rhs_a * b[0]) / det;

        let world = Vector4::new(x, y, plane_depth, 1.0);
        let w = p2.dot(&world);
        validate_homogeneous_scale(w, p2.norm() * world.norm())?;

        Ok(Vector3::new(x, y, plane_depth))
    }

    /// Loads a [`ProjectiveCamera`] from a YAML file written by
    /// [`ProjectiveCamera::save_to_yaml`].
    ///
    /// # Errors
    ///
    /// * [`CameraModelError::IOError`]: the file cannot be read.
    /// * [`CameraModelError::YamlError`]: the YAML content is malformed.
    /// * [`CameraModelError::InvalidParams`]: missing fields or an invalid matrix.
    fn load_from_yaml(path: &str) -> Result<Self, CameraModelError> {
        use crate::camera::yaml_io;

        let (projection, resolution) = yaml_io::parse_yaml_camera(path)?;
        let camera = Self::from_row_major(&projection, resolution.width, resolution.height)?;
        debug!("loaded camera from {path}: {camera:?}");
        Ok(camera)
    }

    /// Saves the camera under the `cam0` key with a row-major `projection` array.
    fn save_to_yaml(&self, path: &str) -> Result<(), CameraModelError> {
        use crate::camera::yaml_io;

        yaml_io::save_yaml_camera(
            path,
            self.get_model_name(),
            &self.to_row_major(),
            &self.resolution,
        )
    }

    /// Checks the resolution is positive and `P` is finite with rank 3.
    fn validate_params(&self) -> Result<(), CameraModelError> {
        validation::validate_resolution(&self.resolution)?;
        validation::validate_projection_matrix(&self.projection)
    }

    fn get_resolution(&self) -> Resolution {
        self.resolution
    }

    fn get_projection_matrix(&self) -> Matrix3x4<f64> {
        self.projection
    }

    fn get_model_name(&self) -> &'static str {
        "projective"
    }
}

/// Unit tests for the [`ProjectiveCamera`].
#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use nalgebra::{Rotation3, Translation3};

    /// Broadcast-style camera looking down at a 28m x 15m court (centimetres).
    fn get_sample_camera() -> ProjectiveCamera {
        let k = Matrix3::new(1500.0, 0.0, 960.0, 0.0, 1500.0, 540.0, 0.0, 0.0, 1.0);
        let rotation = Rotation3::from_euler_angles(-2.0, 0.05, 0.02);
        let center = Vector3::new(1400.0, -1500.0, 800.0);
        let translation = Translation3::from(-(rotation * center));

        let mut p = Matrix3x4::zeros();
        p.fixed_view_mut::<3, 3>(0, 0)
            .copy_from(&(k * rotation.matrix()));
        p.set_column(3, &(k * translation.vector));
        ProjectiveCamera::from_matrix(p, 1920, 1080).unwrap()
    }

    #[test]
    fn test_fallback_back_projection_is_identity() {
        let camera = ProjectiveCamera::default_fallback(100, 50).unwrap();
        for (u, v) in [(0.0, 0.0), (100.0, 50.0), (50.0, 25.0), (-3.5, 7.25)] {
            let world = camera.back_project(&Vector2::new(u, v), 0.0).unwrap();
            assert_relative_eq!(world.x, u, epsilon = 1e-12);
            assert_relative_eq!(world.y, v, epsilon = 1e-12);
            assert_eq!(world.z, 0.0);
        }
    }

    #[test]
    fn test_project_back_project_round_trip() {
        let camera = get_sample_camera();
        for z in [0.0, 120.0, 305.0] {
            for (x, y) in [(0.0, 0.0), (1400.0, 750.0), (2800.0, 1500.0), (580.0, 505.0)] {
                let world = Vector3::new(x, y, z);
                let image = camera.project(&world).unwrap();
                let recovered = camera.back_project(&image, z).unwrap();
                assert_relative_eq!(recovered, world, epsilon = 1e-6);
            }
        }
    }

    #[test]
    fn test_project_point_on_principal_plane() {
        // Third row of the fallback camera vanishes for Z = -1
        let camera = ProjectiveCamera::default_fallback(100, 50).unwrap();
        let result = camera.project(&Vector3::new(3.0, 4.0, -1.0));
        assert!(matches!(
            result,
            Err(CameraModelError::DegenerateProjection(_))
        ));
    }

    #[test]
    fn test_back_project_ray_parallel_to_plane() {
        // Camera whose image x does not depend on world X or Y: rays parallel to Z planes
        let p = Matrix3x4::new(0.0, 0.0, 1.0, 0.0, 0.0, 1.0, 0.0, 0.0, 1.0, 0.0, 0.0, 1.0);
        let camera = ProjectiveCamera::from_matrix(p, 100, 50).unwrap();
        let result = camera.back_project(&Vector2::new(0.0, 10.0), 0.0);
        assert!(matches!(
            result,
            Err(CameraModelError::DegenerateProjection(_))
        ));
    }

    #[test]
    fn test_from_row_major_validation() {
        assert!(matches!(
            ProjectiveCamera::from_row_major(&[1.0; 11], 100, 50),
            Err(CameraModelError::InvalidParams(_))
        ));
        assert!(matches!(
            ProjectiveCamera::from_row_major(&FALLBACK_PROJECTION, 0, 50),
            Err(CameraModelError::InvalidResolution)
        ));
        assert!(matches!(
            ProjectiveCamera::from_row_major(&[0.0; 12], 100, 50),
            Err(CameraModelError::InvalidParams(_))
        ));
    }

    #[test]
    fn test_row_major_layout() {
        let values: Vec<f64> = (1..=12).map(|v| v as f64).collect();
        // Rank 2 in general, so perturb to make it full rank.
        let mut values_full = values.clone();
        values_full[0] = 10.0;
        values_full[10] = -4.0;
        let camera = ProjectiveCamera::from_row_major(&values_full, 10, 10).unwrap();
        assert_eq!(camera.projection()[(0, 1)], 2.0);
        assert_eq!(camera.projection()[(1, 0)], 5.0);
        assert_eq!(camera.projection()[(2, 3)], 12.0);
        assert_eq!(camera.to_row_major().to_vec(), values_full);
    }

    #[test]
    fn test_decompose_recovers_pose() {
        let camera = get_sample_camera();
        let decomposition = camera.decompose().unwrap();

        assert_relative_eq!(decomposition.k[(0, 0)], 1500.0, epsilon = 1e-6);
        assert_relative_eq!(decomposition.k[(1, 1)], 1500.0, epsilon = 1e-6);
        assert_relative_eq!(decomposition.k[(0, 2)], 960.0, epsilon = 1e-6);
        assert_relative_eq!(decomposition.k[(1, 2)], 540.0, epsilon = 1e-6);
        assert_relative_eq!(decomposition.r.determinant(), 1.0, epsilon = 1e-9);

        let mut rebuilt = Matrix3x4::zeros();
        rebuilt
            .fixed_view_mut::<3, 3>(0, 0)
            .copy_from(&(decomposition.k * decomposition.r));
        rebuilt.set_column(3, &(decomposition.k * decomposition.t));
        let scale = camera.projection()[(2, 3)] / rebuilt[(2, 3)];
        assert_relative_eq!(rebuilt * scale, *camera.projection(), epsilon = 1e-6);
    }

    #[test]
    fn test_decompose_ignores_overall_sign() {
        let camera = get_sample_camera();
        let negated =
            ProjectiveCamera::from_matrix(camera.projection() * -0.01, 1920, 1080).unwrap();

        let a = camera.decompose().unwrap();
        let b = negated.decompose().unwrap();
        assert_relative_eq!(a.k, b.k, epsilon = 1e-6);
        assert_relative_eq!(a.r, b.r, epsilon = 1e-9);
        assert_relative_eq!(
            b.r * b.r.transpose(),
            Matrix3::identity(),
            epsilon = 1e-9
        );
        assert_eq!(b.k[(1, 0)], 0.0);
        assert_eq!(b.k[(2, 0)], 0.0);
        assert_eq!(b.k[(2, 1)], 0.0);
    }

    #[test]
    fn test_decompose_camera_at_infinity() {
        let p = Matrix3x4::new(1.0, 0.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 0.0, 0.0, 1.0);
        let camera = ProjectiveCamera::from_matrix(p, 100, 50).unwrap();
        assert!(matches!(
            camera.decompose(),
            Err(CameraModelError::NumericalError(_))
        ));
    }

    #[test]
    fn test_serde_uses_row_major_record() {
        let camera = ProjectiveCamera::default_fallback(100, 50).unwrap();
        let json = serde_json::to_string(&camera).unwrap();
        assert_eq!(
            json,
            r#"{"P":[1.0,0.0,0.0,0.0,0.0,1.0,0.0,0.0,0.0,0.0,1.0,1.0],"width":100,"height":50}"#
        );
        let restored: ProjectiveCamera = serde_json::from_str(&json).unwrap();
        assert_eq!(restored, camera);

        let invalid = r#"{"P":[0,0,0,0,0,0,0,0,0,0,0,0],"width":100,"height":50}"#;
        assert!(serde_json::from_str::<ProjectiveCamera>(invalid).is_err());
    }
}
