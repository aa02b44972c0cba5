//! JSON persistence of evaluation results and ground truth.
//!
//! Files are written whole: content goes to a temporary file in the target
//! directory which is then renamed over the destination.

use crate::camera::{ProjectiveCamera, Resolution};
use log::info;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use super::{AggregateReport, EvaluationError, EvaluationRecord, GROUND_PLANE_Z};

/// Ground-truth cameras of an evaluation pass, all with one resolution.
#[derive(Debug, Clone, PartialEq)]
pub struct GroundTruth {
    pub resolution: Resolution,
    /// Height of the plane the pass localized test points on.
    pub plane_depth: f64,
    pub cameras: Vec<ProjectiveCamera>,
}

#[derive(Serialize, Deserialize)]
struct GroundTruthHeader {
    width: u32,
    height: u32,
    #[serde(default = "ground_plane_z")]
    plane_depth: f64,
}

fn ground_plane_z() -> f64 {
    GROUND_PLANE_Z
}

#[derive(Serialize, Deserialize)]
struct GroundTruthEntry {
    #[serde(rename = "P")]
    projection: Vec<f64>,
}

impl GroundTruth {
    /// Ground truth scored on the court floor `Z = 0`.
    pub fn new(resolution: Resolution, cameras: Vec<ProjectiveCamera>) -> Self {
        GroundTruth {
            resolution,
            plane_depth: GROUND_PLANE_Z,
            cameras,
        }
    }

    /// File layout: a header `{"width", "height", "plane_depth"}` followed by
    /// one `{"P": [12]}` entry per sample. `plane_depth` may be omitted when
    /// reading and defaults to the floor.
    pub fn to_json(&self) -> Result<Value, EvaluationError> {
        let mut entries = Vec::with_capacity(self.cameras.len() + 1);
        entries.push(serde_json::to_value(GroundTruthHeader {
            width: self.resolution.width,
            height: self.resolution.height,
            plane_depth: self.plane_depth,
        })?);
        for camera in &self.cameras {
            entries.push(serde_json::to_value(GroundTruthEntry {
                projection: camera.to_row_major().to_vec(),
            })?);
        }
        Ok(Value::Array(entries))
    }

    /// Parse the ground-truth file layout; `source_name` labels format errors.
    pub fn from_json(value: Value, source_name: &str) -> Result<Self, EvaluationError> {
        let format_error = |index: usize, reason: String| EvaluationError::Format {
            source_name: source_name.to_string(),
            index,
            reason,
        };

        let Value::Array(entries) = value else {
            return Err(format_error(0, "expected a JSON array".to_string()));
        };
        let mut entries = entries.into_iter();

        let header = entries
            .next()
            .ok_or_else(|| format_error(0, "missing width/height header".to_string()))?;
        let header: GroundTruthHeader = serde_json::from_value(header)
            .map_err(|e| format_error(0, format!("invalid width/height header: {e}")))?;
        if header.width == 0 || header.height == 0 {
            return Err(format_error(0, "width and height must be positive".to_string()));
        }
        let resolution = Resolution {
            width: header.width,
            height: header.height,
        };

        let cameras = entries
            .enumerate()
            .map(|(i, entry)| {
                let entry: GroundTruthEntry = serde_json::from_value(entry)
                    .map_err(|e| format_error(i + 1, e.to_string()))?;
                ProjectiveCamera::from_row_major(
                    &entry.projection,
                    resolution.width,
                    resolution.height,
                )
                .map_err(|e| format_error(i + 1, e.to_string()))
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(GroundTruth {
            resolution,
            plane_depth: header.plane_depth,
            cameras,
        })
    }
}

/// Read a ground-truth file.
pub fn read_ground_truth(path: &Path) -> Result<GroundTruth, EvaluationError> {
    let contents = fs::read_to_string(path)?;
    let value: Value = serde_json::from_str(&contents)?;
    GroundTruth::from_json(value, &path.display().to_string())
}

/// Parse a predictions log: a JSON array of [`EvaluationRecord`].
pub fn parse_predictions(value: Value, source_name: &str) -> Result<Vec<EvaluationRecord>, EvaluationError> {
    let Value::Array(entries) = value else {
        return Err(EvaluationError::Format {
            source_name: source_name.to_string(),
            index: 0,
            reason: "expected a JSON array".to_string(),
        });
    };

    entries
        .into_iter()
        .enumerate()
        .map(|(index, entry)| {
            serde_json::from_value(entry).map_err(|e| EvaluationError::Format {
                source_name: source_name.to_string(),
                index,
                reason: e.to_string(),
            })
        })
        .collect()
}

/// Read a predictions log file.
pub fn read_predictions(path: &Path) -> Result<Vec<EvaluationRecord>, EvaluationError> {
    let contents = fs::read_to_string(path)?;
    let value: Value = serde_json::from_str(&contents)?;
    parse_predictions(value, &path.display().to_string())
}

/// Directory-backed result store.
#[derive(Debug, Clone)]
pub struct ResultStore {
    root: PathBuf,
}

impl ResultStore {
    pub const PREDICTIONS_FILE: &'static str = "predictions.json";
    pub const GROUND_TRUTH_FILE: &'static str = "ground_truth.json";
    pub const REPORT_FILE: &'static str = "report.json";

    /// Open a store, creating the directory if needed.
    pub fn new(root: impl Into<PathBuf>) -> Result<Self, EvaluationError> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        Ok(ResultStore { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn path(&self, name: &str) -> PathBuf {
        self.root.join(name)
    }

    /// Serialize `value` as pretty JSON into `name`, replacing it atomically.
    pub fn write_json<T>(&self, name: &str, value: &T) -> Result<PathBuf, EvaluationError>
    where
        T: Serialize + ?Sized,
    {
        let target = self.path(name);
        let temporary = self.path(&format!(".{name}.tmp"));

        let contents = serde_json::to_string_pretty(value)?;
        {
            let mut file = fs::File::create(&temporary)?;
            file.write_all(contents.as_bytes())?;
            file.sync_all()?;
        }
        if let Err(e) = fs::rename(&temporary, &target) {
            let _ = fs::remove_file(&temporary);
            return Err(e.into());
        }

        info!("Wrote {}", target.display());
        Ok(target)
    }

    pub fn write_predictions(&self, records: &[EvaluationRecord]) -> Result<PathBuf, EvaluationError> {
        self.write_json(Self::PREDICTIONS_FILE, records)
    }

    pub fn write_ground_truth(&self, ground_truth: &GroundTruth) -> Result<PathBuf, EvaluationError> {
        self.write_json(Self::GROUND_TRUTH_FILE, &ground_truth.to_json()?)
    }

    pub fn write_report(&self, report: &AggregateReport) -> Result<PathBuf, EvaluationError> {
        self.write_json(Self::REPORT_FILE, report)
    }

    pub fn read_predictions(&self) -> Result<Vec<EvaluationRecord>, EvaluationError> {
        read_predictions(&self.path(Self::PREDICTIONS_FILE))
    }

    pub fn read_ground_truth(&self) -> Result<GroundTruth, EvaluationError> {
        read_ground_truth(&self.path(Self::GROUND_TRUTH_FILE))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn format_index(result: Result<GroundTruth, EvaluationError>) -> usize {
        match result {
            Err(EvaluationError::Format { index, .. }) => index,
            other => panic!("expected a format error, got {other:?}"),
        }
    }

    #[test]
    fn ground_truth_parses_header_and_cameras() {
        let value = json!([
            {"width": 100, "height": 50},
            {"P": [1, 0, 0, 0, 0, 1, 0, 0, 0, 0, 1, 1]}
        ]);
        let ground_truth = GroundTruth::from_json(value, "gt").unwrap();
        assert_eq!(
            ground_truth.resolution,
            Resolution {
                width: 100,
                height: 50
            }
        );
        assert_eq!(ground_truth.cameras.len(), 1);
        assert_eq!(ground_truth.plane_depth, GROUND_PLANE_Z);

        let round_trip = GroundTruth::from_json(ground_truth.to_json().unwrap(), "gt").unwrap();
        assert_eq!(round_trip, ground_truth);
    }

    #[test]
    fn ground_truth_header_carries_plane_depth() {
        let value = json!([
            {"width": 100, "height": 50, "plane_depth": 305.0},
            {"P": [1, 0, 0, 0, 0, 1, 0, 0, 0, 0, 1, 1]}
        ]);
        let ground_truth = GroundTruth::from_json(value, "gt").unwrap();
        assert_eq!(ground_truth.plane_depth, 305.0);

        let header = &ground_truth.to_json().unwrap()[0];
        assert_eq!(header["plane_depth"], json!(305.0));
        assert_eq!(header["width"], json!(100));
    }

    #[test]
    fn ground_truth_format_errors_name_the_record() {
        assert_eq!(format_index(GroundTruth::from_json(json!([]), "gt")), 0);
        assert_eq!(
            format_index(GroundTruth::from_json(json!([{"width": 100}]), "gt")),
            0
        );
        assert_eq!(
            format_index(GroundTruth::from_json(
                json!([{"width": 100, "height": 50}, {"P": [1, 2, 3]}]),
                "gt"
            )),
            1
        );
        assert_eq!(
            format_index(GroundTruth::from_json(json!({"width": 1}), "gt")),
            0
        );
    }

    #[test]
    fn predictions_format_errors_name_the_record() {
        let value = json!([{"num_points2d": 2}, {"P": "not a list"}]);
        match parse_predictions(value, "pred") {
            Err(EvaluationError::Format {
                source_name, index, ..
            }) => {
                assert_eq!(source_name, "pred");
                assert_eq!(index, 1);
            }
            other => panic!("expected a format error, got {other:?}"),
        }
    }
}
