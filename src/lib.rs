//! Court Calibration Evaluation Library
//!
//! Converts predicted court-landmark heatmaps into a metric camera model and
//! measures how well that model localizes points on the ground plane.
//! The library provides:
//! - A projective (3x4 matrix) camera model with forward projection and
//!   back-projection onto a plane of constant height
//! - A normalized DLT estimator recovering the projection matrix from
//!   2D-3D correspondences
//! - A keypoint extractor pairing heatmap peaks with the canonical court layout
//! - An evaluator scoring estimated cameras against ground truth, with a fixed
//!   fallback camera when estimation is impossible

pub mod camera;
pub mod estimation;
pub mod evaluation;
pub mod keypoints;
pub mod util;

// Re-export commonly used types
pub use camera::{CameraModel, CameraModelError, ProjectiveCamera, Resolution};
pub use estimation::{estimate, Correspondence};
pub use evaluation::{AggregateReport, EvaluationError, EvaluationRecord, Evaluator, Sample};
pub use keypoints::{ExtractorConfig, Heatmap, KeypointExtractor};
