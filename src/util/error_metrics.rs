//! Error metrics and reprojection error computation.
//!
//! This module provides the residual statistics reported for estimated cameras
//! (reprojection RMSE, mean, median and spread in pixels) and the root mean
//! square distance used to compare paired world points.

use crate::camera::CameraModel;
use nalgebra::{Matrix2xX, Matrix3xX, Vector3};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::UtilError;

/// Projection error statistics for camera model evaluation.
///
/// Contains various statistical measures of reprojection errors,
/// useful for assessing how well an estimated camera explains its inputs.
#[derive(Clone, Serialize, Deserialize)]
pub struct ProjectionError {
    /// Root Mean Square Error of reprojection
    pub rmse: f64,
    /// Minimum reprojection error
    pub min: f64,
    /// Maximum reprojection error
    pub max: f64,
    /// Mean reprojection error
    pub mean: f64,
    /// Standard deviation of reprojection errors
    pub stddev: f64,
    /// Median reprojection error
    pub median: f64,
}

impl fmt::Debug for ProjectionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Projection Error [ rmse: {:.6}, min: {:.6}, max: {:.6}, mean: {:.6}, stddev: {:.6}, median: {:.6} ]",
            self.rmse, self.min, self.max, self.mean, self.stddev, self.median
        )
    }
}

/// Compute reprojection error statistics for a camera model.
///
/// Given a set of 3D points and their observed 2D locations, this function
/// measures how far the camera's projection of each 3D point lands from the
/// observation. Points that cannot be projected (principal plane) are skipped.
///
/// # Arguments
///
/// * `camera_model` - The camera model to evaluate
/// * `points3d` - Matrix of 3D points (3×N)
/// * `points2d` - Matrix of corresponding 2D points (2×N)
///
/// # Errors
///
/// * `UtilError::InvalidParams` - If the matrices have different column counts
/// * `UtilError::ZeroProjectionPoints` - If no valid projections could be computed
pub fn compute_reprojection_error<T>(
    camera_model: &T,
    points3d: &Matrix3xX<f64>,
    points2d: &Matrix2xX<f64>,
) -> Result<ProjectionError, UtilError>
where
    T: ?Sized + CameraModel,
{
    if points3d.ncols() != points2d.ncols() {
        return Err(UtilError::InvalidParams(format!(
            "point count mismatch: {} world points, {} image points",
            points3d.ncols(),
            points2d.ncols()
        )));
    }

    let mut errors = vec![];
    for i in 0..points3d.ncols() {
        let point3d = points3d.column(i).into_owned();
        let point2d = points2d.column(i).into_owned();

        if let Ok(point2d_projected) = camera_model.project(&point3d) {
            let reprojection_error = (point2d_projected - point2d).norm();
            errors.push(reprojection_error);
        }
    }

    if errors.is_empty() {
        return Err(UtilError::ZeroProjectionPoints);
    }

    // Calculate statistics
    let n = errors.len() as f64;
    let sum: f64 = errors.iter().sum::<f64>();
    let mean = sum / n;

    let variance: f64 = errors.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / n;
    let stddev = variance.sqrt();

    let sum_squared: f64 = errors.iter().map(|x| x.powi(2)).sum::<f64>();
    let rmse = (sum_squared / n).sqrt();

    let min = errors.iter().fold(f64::INFINITY, |a, &b| a.min(b));
    let max = errors.iter().fold(f64::NEG_INFINITY, |a, &b| a.max(b));

    let mut sorted_errors = errors;
    sorted_errors.sort_by(|a, b| a.total_cmp(b));
    let median = if sorted_errors.len() % 2 == 0 {
        let mid = sorted_errors.len() / 2;
        (sorted_errors[mid - 1] + sorted_errors[mid]) / 2.0
    } else {
        sorted_errors[sorted_errors.len() / 2]
    };

    Ok(ProjectionError {
        rmse,
        min,
        max,
        mean,
        stddev,
        median,
    })
}

/// Root mean square Euclidean distance between paired 3D points.
///
/// `sqrt(mean_i |a_i - b_i|^2)`, in the units of the inputs.
///
/// # Errors
///
/// * `UtilError::InvalidParams` - If the slices have different lengths
/// * `UtilError::ZeroProjectionPoints` - If the slices are empty
pub fn root_mean_square_distance(
    first: &[Vector3<f64>],
    second: &[Vector3<f64>],
) -> Result<f64, UtilError> {
    if first.len() != second.len() {
        return Err(UtilError::InvalidParams(format!(
            "cannot pair {} points with {} points",
            first.len(),
            second.len()
        )));
    }
    if first.is_empty() {
        return Err(UtilError::ZeroProjectionPoints);
    }

    let sum_squared: f64 = first
        .iter()
        .zip(second)
        .map(|(a, b)| (a - b).norm_squared())
        .sum();
    Ok((sum_squared / first.len() as f64).sqrt())
}
