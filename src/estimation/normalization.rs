//! Hartley normalization of point sets for DLT conditioning.

use nalgebra::{Matrix3, Matrix4, Vector2, Vector3};

/// Centers 2D points at the origin and scales them to a mean distance of `√2`.
///
/// Returns the normalized points and the 3x3 transform `T` with
/// `p_norm = T * p_homogeneous`, or `None` when the input is empty or all points
/// coincide.
pub fn normalize_points_2d(points: &[Vector2<f64>]) -> Option<(Vec<Vector2<f64>>, Matrix3<f64>)> {
    if points.is_empty() {
        return None;
    }

    let n = points.len() as f64;
    let centroid = points.iter().fold(Vector2::zeros(), |acc, p| acc + p) / n;
    let mean_dist = points.iter().map(|p| (p - centroid).norm()).sum::<f64>() / n;

    if !mean_dist.is_finite() || mean_dist <= f64::EPSILON {
        return None;
    }

    let scale = 2.0_f64.sqrt() / mean_dist;
    let t = Matrix3::new(
        scale,
        0.0,
        -scale * centroid.x,
        0.0,
        scale,
        -scale * centroid.y,
        0.0,
        0.0,
        1.0,
    );

    let normalized = points.iter().map(|p| (p - centroid) * scale).collect();
    Some((normalized, t))
}

/// Centers 3D points at the origin and scales them to a mean distance of `√3`.
///
/// Returns the normalized points and the 4x4 transform `T` with
/// `p_norm = T * p_homogeneous`, or `None` when the input is empty or all points
/// coincide.
pub fn normalize_points_3d(points: &[Vector3<f64>]) -> Option<(Vec<Vector3<f64>>, Matrix4<f64>)> {
    if points.is_empty() {
        return None;
    }

    let n = points.len() as f64;
    let centroid = points.iter().fold(Vector3::zeros(), |acc, p| acc + p) / n;
    let mean_dist = points.iter().map(|p| (p - centroid).norm()).sum::<f64>() / n;

    if !mean_dist.is_finite() || mean_dist <= f64::EPSILON {
        return None;
    }

    let scale = 3.0_f64.sqrt() / mean_dist;
    let mut t = Matrix4::identity() * scale;
    t[(0, 3)] = -scale * centroid.x;
    t[(1, 3)] = -scale * centroid.y;
    t[(2, 3)] = -scale * centroid.z;
    t[(3, 3)] = 1.0;

    let normalized = points.iter().map(|p| (p - centroid) * scale).collect();
    Some((normalized, t))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn normalized_2d_points_have_unit_statistics() {
        let points = vec![
            Vector2::new(100.0, 200.0),
            Vector2::new(150.0, 250.0),
            Vector2::new(120.0, 220.0),
            Vector2::new(90.0, 260.0),
        ];
        let (normalized, t) = normalize_points_2d(&points).unwrap();

        let centroid = normalized.iter().fold(Vector2::zeros(), |acc, p| acc + p) / 4.0;
        assert_relative_eq!(centroid.norm(), 0.0, epsilon = 1e-12);
        let mean_dist = normalized.iter().map(|p| p.norm()).sum::<f64>() / 4.0;
        assert_relative_eq!(mean_dist, 2.0_f64.sqrt(), epsilon = 1e-12);

        let mapped = t * points[1].push(1.0);
        assert_relative_eq!(mapped.xy(), normalized[1], epsilon = 1e-12);
    }

    #[test]
    fn normalized_3d_transform_matches_points() {
        let points = vec![
            Vector3::new(0.0, 0.0, 0.0),
            Vector3::new(2800.0, 0.0, 0.0),
            Vector3::new(2800.0, 1500.0, 0.0),
            Vector3::new(120.0, 750.0, 395.0),
        ];
        let (normalized, t) = normalize_points_3d(&points).unwrap();
        let mean_dist = normalized.iter().map(|p| p.norm()).sum::<f64>() / 4.0;
        assert_relative_eq!(mean_dist, 3.0_f64.sqrt(), epsilon = 1e-12);

        let mapped = t * points[3].push(1.0);
        assert_relative_eq!(mapped.xyz(), normalized[3], epsilon = 1e-12);
        assert_relative_eq!(mapped.w, 1.0);
    }

    #[test]
    fn coincident_points_are_rejected() {
        let points = vec![Vector2::new(5.0, 5.0); 6];
        assert!(normalize_points_2d(&points).is_none());
        assert!(normalize_points_3d(&[]).is_none());
    }
}
