//! Aggregate evaluation report.

use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

/// Ground-plane scores of one scorable sample.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SampleScore {
    /// RMS Euclidean distance between paired world points.
    pub rms_error: f64,
    /// Mean absolute difference over all coordinates of the paired points.
    pub mean_absolute_error: f64,
}

/// Result of an evaluation pass.
///
/// `mean_reprojection_error` is the arithmetic mean, over scorable samples, of
/// the per-sample RMS ground-plane distance (world units, centimetres for the
/// court layout). `mean_absolute_error` averages the per-sample mean absolute
/// coordinate differences the same way and is informational. Both are NaN
/// when no sample is scorable and are persisted as `null` in that case.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregateReport {
    /// Samples whose camera was estimated rather than substituted.
    pub success_count: usize,
    #[serde(deserialize_with = "nan_from_null")]
    pub mean_reprojection_error: f64,
    #[serde(default = "nan", deserialize_with = "nan_from_null")]
    pub mean_absolute_error: f64,
    pub sample_count: usize,
    /// Samples whose ground-truth camera could not localize the test points.
    pub unscorable_count: usize,
    /// Per-sample RMS error, `None` for unscorable samples.
    pub per_sample_errors: Vec<Option<f64>>,
}

fn nan() -> f64 {
    f64::NAN
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        f64::NAN
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}

fn nan_from_null<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<f64>::deserialize(deserializer)?.unwrap_or(f64::NAN))
}

impl AggregateReport {
    /// Aggregate per-sample scores, `None` marking unscorable samples.
    pub fn from_scores(success_count: usize, scores: &[Option<SampleScore>]) -> Self {
        let scored: Vec<&SampleScore> = scores.iter().flatten().collect();
        let rms: Vec<f64> = scored.iter().map(|s| s.rms_error).collect();
        let absolute: Vec<f64> = scored.iter().map(|s| s.mean_absolute_error).collect();

        AggregateReport {
            success_count,
            mean_reprojection_error: mean(&rms),
            mean_absolute_error: mean(&absolute),
            sample_count: scores.len(),
            unscorable_count: scores.len() - scored.len(),
            per_sample_errors: scores.iter().map(|s| s.map(|s| s.rms_error)).collect(),
        }
    }

    pub fn scorable_count(&self) -> usize {
        self.sample_count - self.unscorable_count
    }

    /// Share of samples with an estimated camera, in `[0, 1]`.
    pub fn success_rate(&self) -> f64 {
        if self.sample_count == 0 {
            0.0
        } else {
            self.success_count as f64 / self.sample_count as f64
        }
    }
}

impl fmt::Display for AggregateReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Accuracy: {}/{}, mean reprojection error: {:.4} cm, mean absolute error: {:.4} cm ({} unscorable)",
            self.success_count,
            self.sample_count,
            self.mean_reprojection_error,
            self.mean_absolute_error,
            self.unscorable_count
        )
    }
}
