//! Keypoint extraction from per-landmark heatmaps.
//!
//! A [`Heatmap`] stacks one confidence map per court landmark. The
//! [`KeypointExtractor`] picks the strongest response of every channel,
//! optionally refines it to sub-pixel precision, rescales it to image pixels
//! and pairs it with the world position of the landmark the channel stands for
//! (see [`layout::COURT_LANDMARKS`]). Channels without a confident response are
//! omitted; nothing is fabricated.

use crate::camera::{CameraModelError, Resolution};
use crate::estimation::Correspondence;
use log::{debug, warn};
use nalgebra::{DMatrix, Vector2};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};

pub mod layout;

pub use layout::{Landmark, COURT_LANDMARKS};

/// Stacked landmark confidence maps.
///
/// Every channel has the same shape: `rows` is the heatmap height and `cols`
/// its width.
#[derive(Debug, Clone, PartialEq)]
pub struct Heatmap {
    channels: Vec<DMatrix<f32>>,
}

impl Heatmap {
    /// Stack channels into a heatmap.
    ///
    /// An empty channel list is valid and yields no keypoints.
    ///
    /// # Errors
    ///
    /// * [`CameraModelError::InvalidParams`] if a channel is empty or the
    ///   channels differ in shape.
    pub fn new(channels: Vec<DMatrix<f32>>) -> Result<Self, CameraModelError> {
        if let Some(first) = channels.first() {
            let shape = first.shape();
            if shape.0 == 0 || shape.1 == 0 {
                return Err(CameraModelError::InvalidParams(
                    "heatmap channels must not be empty".to_string(),
                ));
            }
            if let Some((i, channel)) = channels
                .iter()
                .enumerate()
                .find(|(_, c)| c.shape() != shape)
            {
                return Err(CameraModelError::InvalidParams(format!(
                    "heatmap channel {i} has shape {:?}, expected {shape:?}",
                    channel.shape()
                )));
            }
        }
        Ok(Heatmap { channels })
    }

    /// A heatmap with `count` all-zero channels of the given size.
    pub fn zeros(count: usize, width: usize, height: usize) -> Result<Self, CameraModelError> {
        Self::new(vec![DMatrix::zeros(height, width); count])
    }

    pub fn channels(&self) -> &[DMatrix<f32>] {
        &self.channels
    }

    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    /// `(width, height)` of every channel, or `None` without channels.
    pub fn dimensions(&self) -> Option<(usize, usize)> {
        self.channels.first().map(|c| (c.ncols(), c.nrows()))
    }

    /// Per-pixel maximum over all channels.
    pub fn max_projection(&self) -> Option<DMatrix<f32>> {
        let mut channels = self.channels.iter();
        let first = channels.next()?.clone();
        Some(channels.fold(first, |acc, c| acc.zip_map(c, f32::max)))
    }
}

/// Configuration for [`KeypointExtractor`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractorConfig {
    /// Minimum peak response for a channel to yield a keypoint.
    pub confidence_threshold: f32,
    /// Refine peaks with a per-axis parabolic fit.
    pub subpixel: bool,
    /// Peaks of different channels closer than this (image pixels) are
    /// ambiguous; only the more confident one is kept. `0` disables pruning.
    pub min_separation: f64,
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        ExtractorConfig {
            confidence_threshold: 0.5,
            subpixel: true,
            min_separation: 2.0,
        }
    }
}

/// A detected landmark in image pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Keypoint {
    /// Heatmap channel, also the index into [`COURT_LANDMARKS`].
    pub channel: usize,
    pub position: Vector2<f64>,
    pub confidence: f32,
}

/// Converts heatmaps into 2D-3D correspondences.
#[derive(Debug, Default)]
pub struct KeypointExtractor {
    config: ExtractorConfig,
    warned_extra_channels: AtomicBool,
}

impl KeypointExtractor {
    pub fn new(config: ExtractorConfig) -> Self {
        KeypointExtractor {
            config,
            warned_extra_channels: AtomicBool::new(false),
        }
    }

    pub fn config(&self) -> &ExtractorConfig {
        &self.config
    }

    /// Detect one keypoint per confident channel, in ascending channel order.
    ///
    /// Positions are in pixels of an image of size `image_resolution`; the
    /// heatmap is assumed to cover the whole image.
    pub fn detect(&self, heatmap: &Heatmap, image_resolution: Resolution) -> Vec<Keypoint> {
        let Some((width, height)) = heatmap.dimensions() else {
            return Vec::new();
        };

        if heatmap.channel_count() > COURT_LANDMARKS.len()
            && !self.warned_extra_channels.swap(true, Ordering::Relaxed)
        {
            warn!(
                "heatmap has {} channels, layout has {} landmarks; extra channels are ignored",
                heatmap.channel_count(),
                COURT_LANDMARKS.len()
            );
        }

        let scale_x = image_resolution.width as f64 / width as f64;
        let scale_y = image_resolution.height as f64 / height as f64;

        let mut keypoints: Vec<Keypoint> = heatmap
            .channels
            .iter()
            .take(COURT_LANDMARKS.len())
            .enumerate()
            .filter_map(|(channel, map)| {
                let (row, col, confidence) = find_peak(map)?;
                if confidence < self.config.confidence_threshold {
                    return None;
                }
                let (x, y) = if self.config.subpixel {
                    let row_values: Vec<f32> = map.row(row).iter().copied().collect();
                    let col_values: Vec<f32> = map.column(col).iter().copied().collect();
                    (
                        refine_peak_subpixel(&row_values, col),
                        refine_peak_subpixel(&col_values, row),
                    )
                } else {
                    (col as f32, row as f32)
                };
                Some(Keypoint {
                    channel,
                    position: Vector2::new(x as f64 * scale_x, y as f64 * scale_y),
                    confidence,
                })
            })
            .collect();

        if self.config.min_separation > 0.0 {
            keypoints = prune_ambiguous(keypoints, self.config.min_separation);
        }

        debug!(
            "detected {} keypoints from {} channels",
            keypoints.len(),
            heatmap.channel_count()
        );
        keypoints
    }

    /// Detect keypoints and pair them with their court landmarks.
    ///
    /// The result may be empty or shorter than the estimator's minimum; it is
    /// ordered by ascending channel index.
    pub fn extract(&self, heatmap: &Heatmap, image_resolution: Resolution) -> Vec<Correspondence> {
        self.detect(heatmap, image_resolution)
            .into_iter()
            .map(|k| Correspondence::new(k.position, COURT_LANDMARKS[k.channel].position()))
            .collect()
    }
}

/// Row, column and value of the largest finite entry.
fn find_peak(map: &DMatrix<f32>) -> Option<(usize, usize, f32)> {
    let mut best: Option<(usize, usize, f32)> = None;
    for col in 0..map.ncols() {
        for row in 0..map.nrows() {
            let value = map[(row, col)];
            if !value.is_finite() {
                continue;
            }
            if best.map_or(true, |(_, _, b)| value > b) {
                best = Some((row, col, value));
            }
        }
    }
    best
}

/// Parabolic interpolation of a peak at `idx` from its two neighbours.
fn refine_peak_subpixel(curve: &[f32], idx: usize) -> f32 {
    if idx == 0 || idx + 1 >= curve.len() {
        return idx as f32;
    }
    let (y0, y1, y2) = (curve[idx - 1], curve[idx], curve[idx + 1]);
    if !(y0.is_finite() && y2.is_finite()) {
        return idx as f32;
    }
    let denom = y0 - 2.0 * y1 + y2;
    if denom.abs() < 1e-6 {
        return idx as f32;
    }
    let offset = 0.5 * (y0 - y2) / denom;
    (idx as f32 + offset.clamp(-0.5, 0.5)).clamp(0.0, (curve.len() - 1) as f32)
}

/// Drop the less confident of any two keypoints closer than `min_separation`.
///
/// Ties in confidence keep the lower channel. The survivors stay in channel order.
fn prune_ambiguous(keypoints: Vec<Keypoint>, min_separation: f64) -> Vec<Keypoint> {
    let mut by_confidence: Vec<&Keypoint> = keypoints.iter().collect();
    by_confidence.sort_by(|a, b| {
        b.confidence
            .total_cmp(&a.confidence)
            .then(a.channel.cmp(&b.channel))
    });

    let mut kept: Vec<Keypoint> = Vec::with_capacity(keypoints.len());
    for candidate in by_confidence {
        let clashes = kept
            .iter()
            .any(|k| (k.position - candidate.position).norm() < min_separation);
        if clashes {
            debug!(
                "dropping ambiguous keypoint for {}",
                COURT_LANDMARKS[candidate.channel].name
            );
        } else {
            kept.push(*candidate);
        }
    }
    kept.sort_by_key(|k| k.channel);
    kept
}
