//! Camera calibration evaluation.
//!
//! Each sample goes through a fixed pipeline: extract correspondences from the
//! predicted heatmap, estimate a camera, substitute the fallback camera when
//! estimation is impossible, then compare against the ground-truth camera by
//! how both localize a fixed set of image points on the court floor.
//!
//! The [`Evaluator`] owns the state of a pass (ordered record log, ground-truth
//! cameras, per-sample errors, success count) and writes it out through a
//! [`ResultStore`] when the pass is finished. Persisted passes can be scored
//! again with [`rescore`] without any heatmaps.

use crate::camera::{CameraModel, CameraModelError, ProjectiveCamera, Resolution};
use crate::estimation::estimate;
use crate::keypoints::{ExtractorConfig, Heatmap, KeypointExtractor};
use crate::util::{compare_ground_plane_localization, save_keypoint_overlay, GroundPlaneComparison};
use log::{debug, error, info, warn};
use nalgebra::Vector2;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub mod record;
pub mod report;
pub mod store;

pub use record::EvaluationRecord;
pub use report::{AggregateReport, SampleScore};
pub use store::{parse_predictions, read_ground_truth, read_predictions, GroundTruth, ResultStore};

/// Image points at which estimated and ground-truth cameras are compared, as
/// fractions of `(width, height)`.
pub const TEST_POINTS_NORMALIZED: [[f64; 2]; 6] = [
    [1.0, 1.0],
    [1.0, 0.5],
    [0.5, 1.0],
    [0.5, 0.5],
    [0.0, 1.0],
    [0.0, 0.5],
];

/// Height of the plane test points are localized on.
pub const GROUND_PLANE_Z: f64 = 0.0;

/// Test points in pixels for an image of the given size.
pub fn test_points(resolution: Resolution) -> Vec<Vector2<f64>> {
    let (width, height) = (resolution.width as f64, resolution.height as f64);
    TEST_POINTS_NORMALIZED
        .iter()
        .map(|[x, y]| Vector2::new(x * width, y * height))
        .collect()
}

/// Errors that abort an evaluation pass.
#[derive(thiserror::Error, Debug)]
pub enum EvaluationError {
    /// Malformed ground-truth or predictions data.
    #[error("Format error in {source_name} at record {index}: {reason}")]
    Format {
        source_name: String,
        index: usize,
        reason: String,
    },
    #[error("Camera error: {0}")]
    Camera(CameraModelError),
    #[error("IO Error: {0}")]
    Io(String),
    #[error("JSON error: {0}")]
    Json(String),
    #[error("Invalid configuration: {0}")]
    Config(String),
}

impl From<CameraModelError> for EvaluationError {
    fn from(err: CameraModelError) -> Self {
        EvaluationError::Camera(err)
    }
}

impl From<std::io::Error> for EvaluationError {
    fn from(err: std::io::Error) -> Self {
        EvaluationError::Io(err.to_string())
    }
}

impl From<serde_json::Error> for EvaluationError {
    fn from(err: serde_json::Error) -> Self {
        EvaluationError::Json(err.to_string())
    }
}

impl From<serde_yaml::Error> for EvaluationError {
    fn from(err: serde_yaml::Error) -> Self {
        EvaluationError::Config(err.to_string())
    }
}

/// Settings of an evaluation pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EvaluatorConfig {
    /// Size of the images the heatmaps were predicted for.
    pub resolution: Resolution,
    /// Height of the plane the test points are localized on.
    pub plane_depth: f64,
    pub extractor: ExtractorConfig,
    /// When set, a keypoint overlay PNG is written here for every sample.
    pub overlay_dir: Option<PathBuf>,
}

impl Default for EvaluatorConfig {
    fn default() -> Self {
        EvaluatorConfig {
            resolution: Resolution {
                width: 1920,
                height: 1080,
            },
            plane_depth: GROUND_PLANE_Z,
            extractor: ExtractorConfig::default(),
            overlay_dir: None,
        }
    }
}

impl EvaluatorConfig {
    /// Load a configuration from YAML; missing keys take their defaults.
    ///
    /// ```yaml
    /// resolution: { width: 1920, height: 1080 }
    /// extractor:
    ///   confidence_threshold: 0.4
    /// ```
    pub fn load_from_yaml(path: &Path) -> Result<Self, EvaluationError> {
        let contents = std::fs::read_to_string(path)?;
        let config: EvaluatorConfig = serde_yaml::from_str(&contents)?;
        Ok(config)
    }
}

/// One evaluation input: the predicted heatmap and the true camera of the view.
#[derive(Debug, Clone)]
pub struct Sample {
    pub heatmap: Heatmap,
    pub ground_truth: ProjectiveCamera,
}

/// What the pipeline produced for one sample.
#[derive(Debug, Clone)]
pub struct SampleOutcome {
    pub record: EvaluationRecord,
    /// Ground-plane scores, `None` if the ground truth is degenerate.
    pub score: Option<SampleScore>,
    /// Whether the fallback camera was substituted.
    pub fallback: bool,
    /// Image positions of the extracted correspondences.
    pub keypoints: Vec<Vector2<f64>>,
}

impl SampleOutcome {
    /// RMS ground-plane distance, `None` for an unscorable sample.
    pub fn error(&self) -> Option<f64> {
        self.score.map(|s| s.rms_error)
    }
}

/// Score an estimated (or fallback) camera against the ground truth.
///
/// # Errors
///
/// [`EvaluationError::Camera`] if `estimated` cannot localize a test point.
/// A degenerate ground-truth camera is not an error: the sample is unscorable.
pub fn score_camera(
    estimated: &ProjectiveCamera,
    ground_truth: &ProjectiveCamera,
    test_points: &[Vector2<f64>],
    plane_depth: f64,
) -> Result<Option<SampleScore>, EvaluationError> {
    match compare_ground_plane_localization(estimated, ground_truth, test_points, plane_depth)? {
        GroundPlaneComparison::Scored(validation) => Ok(Some(SampleScore {
            rms_error: validation.rms_error,
            mean_absolute_error: validation.mean_absolute_error,
        })),
        GroundPlaneComparison::GroundTruthDegenerate(reason) => {
            warn!("ground-truth camera cannot localize test points, sample unscorable: {reason}");
            Ok(None)
        }
    }
}

/// Ground-truth cameras must share the resolution the heatmaps are scored at.
fn check_sample_resolution(
    sample: &Sample,
    resolution: Resolution,
    index: usize,
) -> Result<(), EvaluationError> {
    let actual = sample.ground_truth.get_resolution();
    if actual != resolution {
        return Err(EvaluationError::Format {
            source_name: "samples".to_string(),
            index,
            reason: format!(
                "ground-truth camera is {}x{}, pass is {}x{}",
                actual.width, actual.height, resolution.width, resolution.height
            ),
        });
    }
    Ok(())
}

fn evaluate_with_points(
    extractor: &KeypointExtractor,
    sample: &Sample,
    resolution: Resolution,
    test_points: &[Vector2<f64>],
    plane_depth: f64,
) -> Result<SampleOutcome, EvaluationError> {
    let correspondences = extractor.extract(&sample.heatmap, resolution);

    let (camera, fallback) = match estimate(&correspondences, resolution) {
        Ok(camera) => (camera, false),
        Err(CameraModelError::InsufficientData(reason)) => {
            debug!("estimation failed, using fallback camera: {reason}");
            (
                ProjectiveCamera::default_fallback(resolution.width, resolution.height)?,
                true,
            )
        }
        Err(e) => return Err(e.into()),
    };

    let record = if fallback {
        EvaluationRecord::fallback(correspondences.len())
    } else {
        EvaluationRecord::from_camera(correspondences.len(), &camera)
    };
    let score = score_camera(&camera, &sample.ground_truth, test_points, plane_depth)?;

    Ok(SampleOutcome {
        record,
        score,
        fallback,
        keypoints: correspondences.iter().map(|c| c.image).collect(),
    })
}

/// Run the full pipeline for one sample: extract, estimate (or fall back),
/// compare on the ground plane `Z = 0`, and build the record.
///
/// # Errors
///
/// [`EvaluationError::Format`] if the ground-truth camera is not at `resolution`.
pub fn evaluate_sample(
    extractor: &KeypointExtractor,
    sample: &Sample,
    resolution: Resolution,
) -> Result<SampleOutcome, EvaluationError> {
    check_sample_resolution(sample, resolution, 0)?;
    evaluate_with_points(
        extractor,
        sample,
        resolution,
        &test_points(resolution),
        GROUND_PLANE_Z,
    )
}

/// Accumulates an evaluation pass.
///
/// ```rust,no_run
/// use court_calib_eval::evaluation::{Evaluator, EvaluatorConfig, ResultStore, Sample};
///
/// # fn samples() -> Vec<Sample> { Vec::new() }
/// let mut evaluator = Evaluator::new(EvaluatorConfig::default()).unwrap();
/// evaluator.run(samples()).unwrap();
/// let report = evaluator.finish(&ResultStore::new("output/eval").unwrap()).unwrap();
/// println!("{report}");
/// ```
#[derive(Debug)]
pub struct Evaluator {
    config: EvaluatorConfig,
    extractor: KeypointExtractor,
    test_points: Vec<Vector2<f64>>,
    records: Vec<EvaluationRecord>,
    ground_truth: Vec<ProjectiveCamera>,
    scores: Vec<Option<SampleScore>>,
    success_count: usize,
}

impl Evaluator {
    /// # Errors
    ///
    /// [`EvaluationError::Config`] for a zero image dimension.
    pub fn new(config: EvaluatorConfig) -> Result<Self, EvaluationError> {
        if config.resolution.width == 0 || config.resolution.height == 0 {
            return Err(EvaluationError::Config(
                "image resolution must be positive".to_string(),
            ));
        }
        if !config.plane_depth.is_finite() {
            return Err(EvaluationError::Config(
                "plane depth must be finite".to_string(),
            ));
        }

        Ok(Evaluator {
            extractor: KeypointExtractor::new(config.extractor),
            test_points: test_points(config.resolution),
            config,
            records: Vec::new(),
            ground_truth: Vec::new(),
            scores: Vec::new(),
            success_count: 0,
        })
    }

    pub fn config(&self) -> &EvaluatorConfig {
        &self.config
    }

    pub fn records(&self) -> &[EvaluationRecord] {
        &self.records
    }

    pub fn sample_count(&self) -> usize {
        self.records.len()
    }

    fn evaluate(&self, index: usize, sample: &Sample) -> Result<SampleOutcome, EvaluationError> {
        let outcome = check_sample_resolution(sample, self.config.resolution, index)
            .and_then(|()| {
                evaluate_with_points(
                    &self.extractor,
                    sample,
                    self.config.resolution,
                    &self.test_points,
                    self.config.plane_depth,
                )
            })
            .inspect_err(|e| error!("sample {index}: {e}"))?;

        if let Some(dir) = &self.config.overlay_dir {
            let path = dir.join(format!("sample_{index:05}.png"));
            if let Err(e) =
                save_keypoint_overlay(&sample.heatmap, &outcome.keypoints, &sample.ground_truth, &path)
            {
                warn!("sample {index}: could not write overlay: {e}");
            }
        }
        Ok(outcome)
    }

    fn absorb(&mut self, outcome: SampleOutcome, ground_truth: ProjectiveCamera) {
        if !outcome.fallback {
            self.success_count += 1;
        }
        debug!(
            "sample {}: {} points, fallback {}, error {:?}",
            self.records.len(),
            outcome.record.num_points2d,
            outcome.fallback,
            outcome.score
        );
        self.records.push(outcome.record);
        self.scores.push(outcome.score);
        self.ground_truth.push(ground_truth);
    }

    /// Evaluate one sample and append its record. Returns the sample's RMS
    /// ground-plane error, `None` if it is unscorable.
    ///
    /// On error the evaluator is left unchanged.
    ///
    /// # Errors
    ///
    /// * [`EvaluationError::Format`] - the ground-truth camera's resolution
    ///   differs from the configured one
    /// * [`EvaluationError::Camera`] - the estimated camera cannot localize a
    ///   test point
    pub fn process(&mut self, sample: Sample) -> Result<Option<f64>, EvaluationError> {
        let outcome = self.evaluate(self.records.len(), &sample)?;
        let error = outcome.error();
        self.absorb(outcome, sample.ground_truth);
        Ok(error)
    }

    /// Process samples in order.
    pub fn run<I>(&mut self, samples: I) -> Result<(), EvaluationError>
    where
        I: IntoIterator<Item = Sample>,
    {
        for sample in samples {
            self.process(sample)?;
        }
        Ok(())
    }

    /// Evaluate samples on the rayon thread pool.
    ///
    /// Records are appended in input order. If any sample fails, nothing is
    /// appended and the first error in input order is returned.
    pub fn run_parallel(&mut self, samples: Vec<Sample>) -> Result<(), EvaluationError> {
        let offset = self.records.len();
        let outcomes = samples
            .par_iter()
            .enumerate()
            .map(|(i, sample)| self.evaluate(offset + i, sample))
            .collect::<Vec<Result<SampleOutcome, EvaluationError>>>()
            .into_iter()
            .collect::<Result<Vec<SampleOutcome>, EvaluationError>>()?;

        for (outcome, sample) in outcomes.into_iter().zip(samples) {
            self.absorb(outcome, sample.ground_truth);
        }
        Ok(())
    }

    /// Report over the samples processed so far.
    pub fn report(&self) -> AggregateReport {
        AggregateReport::from_scores(self.success_count, &self.scores)
    }

    /// End the pass: persist predictions, ground truth and report.
    ///
    /// The ground-truth header records the resolution and plane depth the
    /// pass was scored at, so [`rescore`] reproduces the report.
    pub fn finish(self, store: &ResultStore) -> Result<AggregateReport, EvaluationError> {
        let report = self.report();

        store.write_predictions(&self.records)?;
        store.write_ground_truth(&GroundTruth {
            resolution: self.config.resolution,
            plane_depth: self.config.plane_depth,
            cameras: self.ground_truth,
        })?;
        store.write_report(&report)?;

        info!("{report}");
        Ok(report)
    }
}

/// Score persisted prediction records against ground truth.
///
/// All records are validated before anything is scored. Test points are
/// localized on `Z = ground_truth.plane_depth`.
///
/// # Errors
///
/// * [`EvaluationError::Format`] - record count mismatch or an invalid `P`
/// * [`EvaluationError::Camera`] - a predicted camera cannot localize a test point
pub fn score_records(
    records: &[EvaluationRecord],
    ground_truth: &GroundTruth,
) -> Result<AggregateReport, EvaluationError> {
    if records.len() != ground_truth.cameras.len() {
        return Err(EvaluationError::Format {
            source_name: "predictions".to_string(),
            index: records.len().min(ground_truth.cameras.len()),
            reason: format!(
                "{} prediction records for {} ground-truth cameras",
                records.len(),
                ground_truth.cameras.len()
            ),
        });
    }

    let resolution = ground_truth.resolution;
    let cameras = records
        .iter()
        .enumerate()
        .map(|(index, record)| {
            record
                .camera(resolution)
                .map_err(|e| EvaluationError::Format {
                    source_name: "predictions".to_string(),
                    index,
                    reason: e.to_string(),
                })
        })
        .collect::<Result<Vec<Option<ProjectiveCamera>>, EvaluationError>>()?;

    let fallback = ProjectiveCamera::default_fallback(resolution.width, resolution.height)?;
    let points = test_points(resolution);

    let mut success_count = 0;
    let mut scores = Vec::with_capacity(records.len());
    for (index, (camera, gt)) in cameras.iter().zip(&ground_truth.cameras).enumerate() {
        if camera.is_some() {
            success_count += 1;
        }
        let estimated = camera.as_ref().unwrap_or(&fallback);
        let score = score_camera(estimated, gt, &points, ground_truth.plane_depth)
            .inspect_err(|e| error!("record {index}: {e}"))?;
        scores.push(score);
    }

    Ok(AggregateReport::from_scores(success_count, &scores))
}

/// Score a predictions file against a ground-truth file.
pub fn rescore(predictions: &Path, ground_truth: &Path) -> Result<AggregateReport, EvaluationError> {
    let ground_truth = read_ground_truth(ground_truth)?;
    let records = read_predictions(predictions)?;
    info!(
        "rescoring {} records at {}x{}",
        records.len(),
        ground_truth.resolution.width,
        ground_truth.resolution.height
    );
    let report = score_records(&records, &ground_truth)?;
    info!("{report}");
    Ok(report)
}
