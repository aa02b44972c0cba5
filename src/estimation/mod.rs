//! Projection matrix estimation from 2D-3D correspondences.
//!
//! Implements the normalized Direct Linear Transform (DLT) for the 3x4 camera
//! matrix `P` with `x ~ P X`. Every correspondence contributes two homogeneous
//! linear equations in the 12 entries of `P`; the stacked system is solved for
//! the right singular vector of its smallest singular value.
//!
//! Estimation is all-or-nothing. Too few correspondences, or configurations
//! whose system has more than a one-dimensional null space (coplanar or
//! collinear world points, duplicated points), fail with
//! [`CameraModelError::InsufficientData`] instead of returning an unstable matrix.

use crate::camera::{CameraModel, CameraModelError, ProjectiveCamera, Resolution};
use crate::util::compute_reprojection_error;
use log::debug;
use nalgebra::{DMatrix, Matrix2xX, Matrix3x4, Matrix3xX, Vector2, Vector3};
use serde::{Deserialize, Serialize};

mod normalization;

pub use normalization::{normalize_points_2d, normalize_points_3d};

/// Minimum number of correspondences for a well-posed estimate
/// (11 degrees of freedom, two equations per pair).
pub const MIN_CORRESPONDENCES: usize = 6;

/// Ratio of the second-smallest to the largest singular value of the DLT
/// system below which the null space is considered more than one-dimensional.
pub const RANK_TOLERANCE: f64 = 1e-9;

/// Entries with a smaller magnitude are skipped by the sign convention.
const SIGN_EPSILON: f64 = 1e-12;

/// A paired image point and world point.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Correspondence {
    /// Pixel coordinates `(u, v)`.
    pub image: Vector2<f64>,
    /// World coordinates `(X, Y, Z)`.
    pub world: Vector3<f64>,
}

impl Correspondence {
    pub fn new(image: Vector2<f64>, world: Vector3<f64>) -> Self {
        Correspondence { image, world }
    }
}

/// Stateless DLT estimator for [`ProjectiveCamera`].
///
/// This is a thin namespace around [`DltEstimator::estimate`]; the free
/// function [`estimate`] is equivalent.
#[derive(Debug, Clone, Copy, Default)]
pub struct DltEstimator;

/// Estimate a camera from correspondences with the normalized DLT.
///
/// See [`DltEstimator::estimate`].
pub fn estimate(
    correspondences: &[Correspondence],
    resolution: Resolution,
) -> Result<ProjectiveCamera, CameraModelError> {
    DltEstimator::estimate(correspondences, resolution)
}

impl DltEstimator {
    /// Estimate `P` such that `x ~ P X` for every correspondence.
    ///
    /// Image points are normalized to mean distance `√2` and world points to
    /// `√3` before the system is built; the solution is de-normalized, scaled to
    /// unit Frobenius norm and its sign fixed so that the last non-zero entry
    /// (row-major) is positive. The result is deterministic for a given input.
    ///
    /// # Errors
    ///
    /// * [`CameraModelError::InsufficientData`] - fewer than
    ///   [`MIN_CORRESPONDENCES`] pairs, non-finite coordinates, coincident points,
    ///   a rank-deficient system, or a resulting matrix that is not of rank 3.
    /// * [`CameraModelError::InvalidResolution`] - zero image dimension.
    /// * [`CameraModelError::NumericalError`] - the SVD did not produce `V^T`.
    pub fn estimate(
        correspondences: &[Correspondence],
        resolution: Resolution,
    ) -> Result<ProjectiveCamera, CameraModelError> {
        let n = correspondences.len();
        if n < MIN_CORRESPONDENCES {
            return Err(CameraModelError::InsufficientData(format!(
                "need at least {MIN_CORRESPONDENCES} point correspondences, got {n}"
            )));
        }

        if correspondences
            .iter()
            .any(|c| c.image.iter().chain(c.world.iter()).any(|v| !v.is_finite()))
        {
            return Err(CameraModelError::InsufficientData(
                "correspondences contain non-finite coordinates".to_string(),
            ));
        }

        let image: Vec<Vector2<f64>> = correspondences.iter().map(|c| c.image).collect();
        let world: Vec<Vector3<f64>> = correspondences.iter().map(|c| c.world).collect();

        let (image_n, t_i) = normalize_points_2d(&image).ok_or_else(|| {
            CameraModelError::InsufficientData("all image points coincide".to_string())
        })?;
        let (world_n, t_w) = normalize_points_3d(&world).ok_or_else(|| {
            CameraModelError::InsufficientData("all world points coincide".to_string())
        })?;

        let mut a = DMatrix::<f64>::zeros(2 * n, 12);

        for (i, (pw, pi)) in world_n.iter().zip(image_n.iter()).enumerate() {
            let (x, y, z) = (pw.x, pw.y, pw.z);
            let (u, v) = (pi.x, pi.y);

            let r0 = 2 * i;
            let r1 = 2 * i + 1;

            a[(r0, 0)] = x;
            a[(r0, 1)] = y;
            a[(r0, 2)] = z;
            a[(r0, 3)] = 1.0;
            a[(r0, 8)] = -u * x;
            a[(r0, 9)] = -u * y;
            a[(r0, 10)] = -u * z;
            a[(r0, 11)] = -u;

            a[(r1, 4)] = x;
            a[(r1, 5)] = y;
            a[(r1, 6)] = z;
            a[(r1, 7)] = 1.0;
            a[(r1, 8)] = -v * x;
            a[(r1, 9)] = -v * y;
            a[(r1, 10)] = -v * z;
            a[(r1, 11)] = -v;
        }

        let svd = a.svd(false, true);
        let v_t = svd
            .v_t
            .ok_or_else(|| CameraModelError::NumericalError("SVD failed".to_string()))?;
        let singular_values = svd.singular_values;

        // Singular values are not assumed to be sorted.
        let mut order: Vec<usize> = (0..singular_values.len()).collect();
        order.sort_by(|&i, &j| singular_values[i].total_cmp(&singular_values[j]));
        let smallest = order[0];
        let second_smallest = singular_values[order[1]];
        let largest = singular_values[order[order.len() - 1]];

        if !(largest > 0.0) || second_smallest / largest < RANK_TOLERANCE {
            return Err(CameraModelError::InsufficientData(format!(
                "rank-deficient DLT system (singular value ratio {:e}); \
                 world points are coplanar, collinear or duplicated",
                if largest > 0.0 {
                    second_smallest / largest
                } else {
                    0.0
                }
            )));
        }

        let solution: Vec<f64> = v_t.row(smallest).iter().copied().collect();
        let p_norm = Matrix3x4::from_row_slice(&solution);

        let t_i_inv = t_i.try_inverse().ok_or_else(|| {
            CameraModelError::NumericalError("image normalization is not invertible".to_string())
        })?;
        let mut p = t_i_inv * p_norm * t_w;

        let norm = p.norm();
        if !norm.is_finite() || norm <= f64::EPSILON {
            return Err(CameraModelError::InsufficientData(
                "DLT solution vanished after de-normalization".to_string(),
            ));
        }
        p /= norm;
        apply_sign_convention(&mut p);

        let camera = ProjectiveCamera::from_matrix(p, resolution.width, resolution.height)
            .map_err(|e| match e {
                CameraModelError::InvalidParams(msg) => CameraModelError::InsufficientData(msg),
                other => other,
            })?;

        if log::log_enabled!(log::Level::Debug) {
            let points3d = Matrix3xX::from_columns(&world);
            let points2d = Matrix2xX::from_columns(&image);
            match compute_reprojection_error(&camera, &points3d, &points2d) {
                Ok(error) => debug!(
                    "DLT estimate from {n} correspondences: {:?}, {error:?}",
                    camera.get_projection_matrix()
                ),
                Err(e) => debug!("DLT estimate from {n} correspondences, no residual: {e}"),
            }
        }

        Ok(camera)
    }
}

/// Flip the sign of `p` so that its last non-zero entry in row-major order is positive.
fn apply_sign_convention(p: &mut Matrix3x4<f64>) {
    for r in (0..3).rev() {
        for c in (0..4).rev() {
            let value = p[(r, c)];
            if value.abs() > SIGN_EPSILON {
                if value < 0.0 {
                    *p = -*p;
                }
                return;
            }
        }
    }
}
