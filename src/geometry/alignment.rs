//! Closed-form rigid alignment of two 3D point sets (Horn / Kabsch).
//!
//! Finds the rigid transform T minimizing Σ ||T * source_i - target_i||².
//! Scale is fixed to 1.0.

use nalgebra::{Matrix3, Vector3};

use super::SE3;

/// Compute the rigid transform mapping `source` onto `target`.
///
/// Algorithm:
/// 1. Compute centroids of both point sets
/// 2. Center the points
/// 3. Compute rotation via SVD of the cross-covariance matrix
/// 4. Compute translation: t = c_target - R * c_source
///
/// Returns `None` for fewer than 3 correspondences, mismatched lengths, or if
/// the SVD fails to produce both singular vector bases.
pub fn align_rigid(source: &[Vector3<f64>], target: &[Vector3<f64>]) -> Option<SE3> {
    let n = source.len();
    if n < 3 || n != target.len() {
        return None;
    }

    let centroid_src = centroid(source);
    let centroid_dst = centroid(target);

    // Cross-covariance matrix: H = Σ (s_i - c_s)(d_i - c_d)^T
    let mut h = Matrix3::zeros();
    for (s, d) in source.iter().zip(target.iter()) {
        h += (s - centroid_src) * (d - centroid_dst).transpose();
    }

    let svd = h.svd(true, true);
    let u = svd.u?;
    let v_t = svd.v_t?;

    // R = V * U^T
    let mut v = v_t.transpose();
    let mut rotation = v * u.transpose();

    // Reflection case (det(R) = -1): flip the axis of the smallest singular value.
    if rotation.determinant() < 0.0 {
        let smallest = svd
            .singular_values
            .iter()
            .enumerate()
            .min_by(|a, b| a.1.total_cmp(b.1))
            .map(|(i, _)| i)
            .unwrap_or(2);
        for i in 0..3 {
            v[(i, smallest)] = -v[(i, smallest)];
        }
        rotation = v * u.transpose();
    }

    let translation = centroid_dst - rotation * centroid_src;
    let pose = SE3::from_rt(rotation, translation);

    if pose.translation.iter().all(|x| x.is_finite()) {
        Some(pose)
    } else {
        None
    }
}

fn centroid(points: &[Vector3<f64>]) -> Vector3<f64> {
    let sum: Vector3<f64> = points.iter().sum();
    sum / points.len() as f64
}
