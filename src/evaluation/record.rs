//! Per-sample prediction records, as persisted in the predictions log.

use crate::camera::{CameraModelError, ProjectiveCamera, Resolution};
use log::debug;
use nalgebra::Matrix3;
use serde::{Deserialize, Serialize};

/// What the evaluator stored for one sample.
///
/// A record without `P` (or with an empty `P`) stands for a sample whose
/// camera could not be estimated; it is scored with the fallback camera.
/// `K`, `R` and `T` are the decomposition `P ~ K [R | T]`, kept for
/// inspection only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationRecord {
    /// Number of 2D-3D correspondences extracted for the sample.
    #[serde(default, alias = "numper of points2d")]
    pub num_points2d: usize,
    /// Estimated projection matrix, 12 entries row-major.
    #[serde(rename = "P", default, skip_serializing_if = "Option::is_none")]
    pub projection: Option<Vec<f64>>,
    /// Intrinsics, 9 entries row-major.
    #[serde(rename = "K", default, skip_serializing_if = "Option::is_none")]
    pub intrinsics: Option<Vec<f64>>,
    /// Rotation, 9 entries row-major.
    #[serde(rename = "R", default, skip_serializing_if = "Option::is_none")]
    pub rotation: Option<Vec<f64>>,
    /// Translation, 3 entries.
    #[serde(rename = "T", default, skip_serializing_if = "Option::is_none")]
    pub translation: Option<Vec<f64>>,
}

fn row_major(m: &Matrix3<f64>) -> Vec<f64> {
    m.transpose().as_slice().to_vec()
}

impl EvaluationRecord {
    /// Record for a sample that fell back to the default camera.
    pub fn fallback(num_points2d: usize) -> Self {
        EvaluationRecord {
            num_points2d,
            projection: None,
            intrinsics: None,
            rotation: None,
            translation: None,
        }
    }

    /// Record for an estimated camera.
    ///
    /// `K`, `R`, `T` are omitted if the camera cannot be decomposed.
    pub fn from_camera(num_points2d: usize, camera: &ProjectiveCamera) -> Self {
        let mut record = Self::fallback(num_points2d);
        record.projection = Some(camera.to_row_major().to_vec());

        match camera.decompose() {
            Ok(decomposition) => {
                record.intrinsics = Some(row_major(&decomposition.k));
                record.rotation = Some(row_major(&decomposition.r));
                record.translation = Some(decomposition.t.as_slice().to_vec());
            }
            Err(e) => debug!("estimated camera not decomposable: {e}"),
        }
        record
    }

    /// Whether the record carries an estimated camera.
    pub fn is_success(&self) -> bool {
        self.projection.as_ref().is_some_and(|p| !p.is_empty())
    }

    /// The estimated camera, or `None` for a fallback record.
    ///
    /// # Errors
    ///
    /// Any error of [`ProjectiveCamera::from_row_major`]: wrong entry count,
    /// non-finite or rank-deficient matrix, zero resolution.
    pub fn camera(
        &self,
        resolution: Resolution,
    ) -> Result<Option<ProjectiveCamera>, CameraModelError> {
        match &self.projection {
            Some(values) if !values.is_empty() => {
                ProjectiveCamera::from_row_major(values, resolution.width, resolution.height)
                    .map(Some)
            }
            _ => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::FALLBACK_PROJECTION;

    #[test]
    fn fallback_record_omits_matrices() {
        let json = serde_json::to_string(&EvaluationRecord::fallback(3)).unwrap();
        assert_eq!(json, r#"{"num_points2d":3}"#);
    }

    #[test]
    fn success_record_carries_decomposition() {
        let camera = ProjectiveCamera::default_fallback(100, 50).unwrap();
        let record = EvaluationRecord::from_camera(8, &camera);
        assert!(record.is_success());
        assert_eq!(record.projection.as_deref(), Some(&FALLBACK_PROJECTION[..]));
        assert_eq!(record.intrinsics.as_ref().map(Vec::len), Some(9));
        assert_eq!(record.rotation.as_ref().map(Vec::len), Some(9));
        let translation = record.translation.unwrap();
        assert_eq!(translation.len(), 3);
        assert!(translation[0].abs() < 1e-12 && translation[1].abs() < 1e-12);
        assert!((translation[2] - 1.0).abs() < 1e-12);
    }

    #[test]
    fn legacy_and_empty_fields_parse() {
        let legacy: EvaluationRecord =
            serde_json::from_str(r#"{"numper of points2d": 4, "P": []}"#).unwrap();
        assert_eq!(legacy.num_points2d, 4);
        assert!(!legacy.is_success());
        let resolution = Resolution {
            width: 100,
            height: 50,
        };
        assert!(legacy.camera(resolution).unwrap().is_none());

        let short: EvaluationRecord = serde_json::from_str(r#"{"P": [1, 2, 3]}"#).unwrap();
        assert!(short.is_success());
        assert!(short.camera(resolution).is_err());
    }
}
