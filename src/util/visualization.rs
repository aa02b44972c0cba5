//! Keypoint overlay images.
//!
//! Renders the heatmap of a sample as a grayscale background and marks the
//! extracted keypoints (green) and the ground-truth landmark projections
//! (magenta) on top, so extraction failures can be inspected visually.

use crate::camera::{CameraModel, Resolution};
use crate::keypoints::{Heatmap, COURT_LANDMARKS};
use image::{Rgb, RgbImage};
use log::info;
use nalgebra::Vector2;
use std::path::Path;

use super::point_sampling::project_landmarks;
use super::UtilError;

const EXTRACTED_COLOR: Rgb<u8> = Rgb([0, 255, 0]);
const GROUND_TRUTH_COLOR: Rgb<u8> = Rgb([255, 0, 255]);
const MARKER_RADIUS: i32 = 3;

/// Draw a filled disc, clipped to the image.
fn draw_marker(img: &mut RgbImage, center: &Vector2<f64>, color: Rgb<u8>) {
    let center_x = center.x.round() as i32;
    let center_y = center.y.round() as i32;
    let (width, height) = (img.width() as i32, img.height() as i32);

    for dy in -MARKER_RADIUS..=MARKER_RADIUS {
        for dx in -MARKER_RADIUS..=MARKER_RADIUS {
            if dx * dx + dy * dy > MARKER_RADIUS * MARKER_RADIUS {
                continue;
            }
            let x = center_x + dx;
            let y = center_y + dy;
            if x >= 0 && x < width && y >= 0 && y < height {
                img.put_pixel(x as u32, y as u32, color);
            }
        }
    }
}

/// Create an overlay image at image resolution.
///
/// The background is the per-pixel maximum over all heatmap channels, scaled to
/// `[0, 255]` and resampled (nearest neighbour) to `resolution`. An empty
/// heatmap gives a black background.
///
/// # Errors
///
/// * `UtilError::InvalidParams` - zero image dimension
pub fn create_keypoint_overlay(
    heatmap: &Heatmap,
    extracted: &[Vector2<f64>],
    ground_truth: &[Vector2<f64>],
    resolution: Resolution,
) -> Result<RgbImage, UtilError> {
    if resolution.width == 0 || resolution.height == 0 {
        return Err(UtilError::InvalidParams(
            "overlay resolution must be positive".to_string(),
        ));
    }

    let mut img = RgbImage::new(resolution.width, resolution.height);

    if let Some(background) = heatmap.max_projection() {
        let peak = background
            .iter()
            .copied()
            .filter(|v| v.is_finite())
            .fold(0.0_f32, f32::max);
        if peak > 0.0 {
            let scale_x = background.ncols() as f64 / resolution.width as f64;
            let scale_y = background.nrows() as f64 / resolution.height as f64;
            for (x, y, pixel) in img.enumerate_pixels_mut() {
                let col = ((x as f64 * scale_x) as usize).min(background.ncols() - 1);
                let row = ((y as f64 * scale_y) as usize).min(background.nrows() - 1);
                let value = background[(row, col)];
                let level = if value.is_finite() {
                    (value.max(0.0) / peak * 255.0).round() as u8
                } else {
                    0
                };
                *pixel = Rgb([level, level, level]);
            }
        }
    }

    for point in ground_truth {
        draw_marker(&mut img, point, GROUND_TRUTH_COLOR);
    }
    for point in extracted {
        draw_marker(&mut img, point, EXTRACTED_COLOR);
    }

    Ok(img)
}

/// Render and save a keypoint overlay as PNG.
///
/// Ground-truth markers are the projections of [`COURT_LANDMARKS`] through
/// `ground_truth` that fall inside the image.
///
/// # Errors
///
/// * `UtilError::InvalidParams` - the image cannot be written
pub fn save_keypoint_overlay<T>(
    heatmap: &Heatmap,
    extracted: &[Vector2<f64>],
    ground_truth: &T,
    path: &Path,
) -> Result<(), UtilError>
where
    T: ?Sized + CameraModel,
{
    let (_, projections, _) = project_landmarks(ground_truth, &COURT_LANDMARKS);
    let ground_truth_points: Vec<Vector2<f64>> = projections
        .column_iter()
        .map(|c| c.into_owned())
        .collect();

    let img = create_keypoint_overlay(
        heatmap,
        extracted,
        &ground_truth_points,
        ground_truth.get_resolution(),
    )?;

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    img.save(path)
        .map_err(|e| UtilError::InvalidParams(format!("Failed to save overlay image: {e}")))?;

    info!("Saved keypoint overlay: {}", path.display());
    Ok(())
}
