//! Synthetic views of the court layout.
//!
//! This module builds cameras looking at the court, projects the canonical
//! landmarks through them and renders the Gaussian heatmaps a landmark detector
//! would ideally produce. It is used for synthetic evaluation passes and tests.

use crate::camera::{CameraModel, CameraModelError, ProjectiveCamera, Resolution};
use crate::keypoints::{Heatmap, Landmark};
use nalgebra::{DMatrix, Matrix2xX, Matrix3, Matrix3x4, Matrix3xX, Vector2, Vector3};

use super::UtilError;

/// Build a pinhole camera at `center` looking at `target`, with the world `Z`
/// axis pointing up in the image and the principal point at the image centre.
///
/// # Errors
///
/// * `CameraModelError::InvalidParams` - `center == target`, the viewing
///   direction is vertical, or `focal_length` is not positive.
/// * `CameraModelError::InvalidResolution` - zero image dimension.
///
/// # Examples
///
/// ```rust
/// use court_calib_eval::camera::{CameraModel, Resolution};
/// use court_calib_eval::util::look_at_camera;
/// use nalgebra::Vector3;
///
/// let resolution = Resolution { width: 1920, height: 1080 };
/// let camera = look_at_camera(
///     &Vector3::new(1400.0, -2500.0, 900.0),
///     &Vector3::new(1400.0, 750.0, 0.0),
///     1500.0,
///     resolution,
/// )
/// .unwrap();
/// let centre = camera.project(&Vector3::new(1400.0, 750.0, 0.0)).unwrap();
/// assert!((centre.x - 960.0).abs() < 1e-6 && (centre.y - 540.0).abs() < 1e-6);
/// ```
pub fn look_at_camera(
    center: &Vector3<f64>,
    target: &Vector3<f64>,
    focal_length: f64,
    resolution: Resolution,
) -> Result<ProjectiveCamera, CameraModelError> {
    if !(focal_length > 0.0) {
        return Err(CameraModelError::InvalidParams(format!(
            "focal length must be positive, got {focal_length}"
        )));
    }

    let forward = (target - center)
        .try_normalize(f64::EPSILON)
        .ok_or_else(|| CameraModelError::InvalidParams("camera center equals target".into()))?;
    let right = forward
        .cross(&Vector3::z())
        .try_normalize(f64::EPSILON)
        .ok_or_else(|| CameraModelError::InvalidParams("viewing direction is vertical".into()))?;
    let down = forward.cross(&right);

    let rotation = Matrix3::from_rows(&[right.transpose(), down.transpose(), forward.transpose()]);
    let k = Matrix3::new(
        focal_length,
        0.0,
        resolution.width as f64 / 2.0,
        0.0,
        focal_length,
        resolution.height as f64 / 2.0,
        0.0,
        0.0,
        1.0,
    );

    let mut projection = Matrix3x4::zeros();
    projection
        .fixed_view_mut::<3, 3>(0, 0)
        .copy_from(&(k * rotation));
    projection.set_column(3, &(k * (-(rotation * center))));

    ProjectiveCamera::from_matrix(projection, resolution.width, resolution.height)
}

/// Deterministic family of broadcast-style views of the court.
///
/// View `0` is a centred camera behind the near sideline; further views move
/// the camera along the sideline, change its height and zoom, and pan the
/// target across the court.
pub fn broadcast_camera(view: usize, resolution: Resolution) -> Result<ProjectiveCamera, CameraModelError> {
    let t = view as f64;
    let center = Vector3::new(
        1400.0 + 300.0 * (0.7 * t).sin(),
        -2500.0 - 200.0 * (1.0 - (0.5 * t).cos()),
        900.0 + 150.0 * (0.3 * t).sin(),
    );
    let target = Vector3::new(1400.0 + 200.0 * (0.9 * t).sin(), 750.0, 0.0);
    let focal_length = 1500.0 * resolution.width as f64 / 1920.0 * (1.0 + 0.05 * (1.1 * t).sin());
    look_at_camera(&center, &target, focal_length, resolution)
}

/// Project landmarks through a camera, keeping those in front of it and
/// inside the image.
///
/// # Returns
///
/// * Indices into `landmarks` of the visible ones
/// * Matrix2xX of their pixel positions
/// * Matrix3xX of their world positions
pub fn project_landmarks<T>(
    camera_model: &T,
    landmarks: &[Landmark],
) -> (Vec<usize>, Matrix2xX<f64>, Matrix3xX<f64>)
where
    T: ?Sized + CameraModel,
{
    let resolution = camera_model.get_resolution();
    let projection = camera_model.get_projection_matrix();
    let orientation = projection.fixed_view::<3, 3>(0, 0).determinant();

    let mut indices = Vec::new();
    let mut points_2d = Vec::new();
    let mut points_3d = Vec::new();

    for (i, landmark) in landmarks.iter().enumerate() {
        let world = landmark.position();
        let w = projection.row(2).transpose().dot(&world.push(1.0));
        if w * orientation <= 0.0 {
            continue;
        }
        let Ok(image) = camera_model.project(&world) else {
            continue;
        };
        if (0.0..resolution.width as f64).contains(&image.x)
            && (0.0..resolution.height as f64).contains(&image.y)
        {
            indices.push(i);
            points_2d.push(image);
            points_3d.push(world);
        }
    }

    (
        indices,
        Matrix2xX::from_columns(&points_2d),
        Matrix3xX::from_columns(&points_3d),
    )
}

/// Render one Gaussian blob per landmark, peak value 1, as seen by `camera_model`.
///
/// The heatmap covers the whole image at `heatmap_width x heatmap_height`;
/// `sigma` is in heatmap pixels. Landmarks that are not visible leave their
/// channel at zero.
///
/// # Errors
///
/// * `UtilError::InvalidParams` - zero heatmap size or non-positive `sigma`
pub fn render_landmark_heatmap<T>(
    camera_model: &T,
    landmarks: &[Landmark],
    heatmap_width: usize,
    heatmap_height: usize,
    sigma: f64,
) -> Result<Heatmap, UtilError>
where
    T: ?Sized + CameraModel,
{
    if heatmap_width == 0 || heatmap_height == 0 || !(sigma > 0.0) {
        return Err(UtilError::InvalidParams(format!(
            "cannot render a {heatmap_width}x{heatmap_height} heatmap with sigma {sigma}"
        )));
    }

    let resolution = camera_model.get_resolution();
    let scale = Vector2::new(
        heatmap_width as f64 / resolution.width as f64,
        heatmap_height as f64 / resolution.height as f64,
    );

    let mut channels = vec![DMatrix::<f32>::zeros(heatmap_height, heatmap_width); landmarks.len()];
    let (indices, points_2d, _) = project_landmarks(camera_model, landmarks);

    let radius = (3.0 * sigma).ceil() as i64;
    let denom = 2.0 * sigma * sigma;
    for (column, &channel) in indices.iter().enumerate() {
        let centre = points_2d.column(column).component_mul(&scale);
        let (cx, cy) = (centre.x.round() as i64, centre.y.round() as i64);
        let map = &mut channels[channel];

        for row in (cy - radius).max(0)..=(cy + radius).min(heatmap_height as i64 - 1) {
            for col in (cx - radius).max(0)..=(cx + radius).min(heatmap_width as i64 - 1) {
                let dx = col as f64 - centre.x;
                let dy = row as f64 - centre.y;
                map[(row as usize, col as usize)] = (-(dx * dx + dy * dy) / denom).exp() as f32;
            }
        }
    }

    Heatmap::new(channels).map_err(UtilError::from)
}
