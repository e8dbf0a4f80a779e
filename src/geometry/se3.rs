//! SE3: 6-DOF rigid transformation (rotation + translation).
//!
//! Candidate camera poses are stored as camera-to-world transforms, so
//! `pose.transform_point(p_cam)` yields the world-space position of a point
//! observed in the camera frame.

use nalgebra::{Matrix3, Matrix4, Rotation3, UnitQuaternion, Vector3, Vector6};

use super::so3::{left_jacobian_so3, left_jacobian_so3_inv};

/// Rigid transformation: p' = R * p + t.
#[derive(Debug, Clone, PartialEq)]
pub struct SE3 {
    pub rotation: UnitQuaternion<f64>,
    pub translation: Vector3<f64>,
}

impl SE3 {
    /// Identity transformation.
    pub fn identity() -> Self {
        Self {
            rotation: UnitQuaternion::identity(),
            translation: Vector3::zeros(),
        }
    }

    /// Construct from a rotation matrix and a translation.
    pub fn from_rt(rotation: Matrix3<f64>, translation: Vector3<f64>) -> Self {
        let rot3 = Rotation3::from_matrix_unchecked(rotation);
        Self {
            rotation: UnitQuaternion::from_rotation_matrix(&rot3),
            translation,
        }
    }

    /// Construct from a homogeneous 4x4 matrix of form [R | t; 0 | 1].
    pub fn from_matrix(mat: &Matrix4<f64>) -> Self {
        let rotation = mat.fixed_view::<3, 3>(0, 0).into_owned();
        let translation = Vector3::new(mat[(0, 3)], mat[(1, 3)], mat[(2, 3)]);
        Self::from_rt(rotation, translation)
    }

    /// Convert to a homogeneous 4x4 matrix.
    pub fn to_matrix(&self) -> Matrix4<f64> {
        let mut mat = Matrix4::identity();
        mat.fixed_view_mut::<3, 3>(0, 0)
            .copy_from(&self.rotation_matrix());
        mat.fixed_view_mut::<3, 1>(0, 3).copy_from(&self.translation);
        mat
    }

    /// Rotation as a 3x3 matrix.
    pub fn rotation_matrix(&self) -> Matrix3<f64> {
        self.rotation.to_rotation_matrix().into_inner()
    }

    /// Inverse transformation: [R^T | -R^T t].
    pub fn inverse(&self) -> Self {
        let rot_inv = self.rotation.inverse();
        Self {
            rotation: rot_inv,
            translation: -(rot_inv * self.translation),
        }
    }

    /// Compose two transforms: self ∘ other.
    pub fn compose(&self, other: &SE3) -> Self {
        Self {
            rotation: self.rotation * other.rotation,
            translation: self.rotation * other.translation + self.translation,
        }
    }

    /// Transform a single point: p' = R * p + t.
    #[inline]
    pub fn transform_point(&self, p: &Vector3<f64>) -> Vector3<f64> {
        self.rotation * p + self.translation
    }

    /// Exponential map from twist coordinates `[φ (3), ρ (3)]`.
    ///
    /// The rotation part comes first, matching the layout used by the
    /// optimizers in this crate.
    pub fn exp(twist: &Vector6<f64>) -> Self {
        let phi = Vector3::new(twist[0], twist[1], twist[2]);
        let rho = Vector3::new(twist[3], twist[4], twist[5]);
        Self {
            rotation: UnitQuaternion::from_scaled_axis(phi),
            translation: left_jacobian_so3(&phi) * rho,
        }
    }

    /// Logarithm map to twist coordinates `[φ (3), ρ (3)]`.
    pub fn log(&self) -> Vector6<f64> {
        let phi = self.rotation.scaled_axis();
        let rho = left_jacobian_so3_inv(&phi) * self.translation;
        Vector6::new(phi.x, phi.y, phi.z, rho.x, rho.y, rho.z)
    }

    /// Angle (radians) of the relative rotation between two poses.
    ///
    /// Uses `atan2` rather than `acos` so that tiny angles stay accurate.
    pub fn rotation_distance(&self, other: &SE3) -> f64 {
        let q = self.rotation.rotation_to(&other.rotation);
        2.0 * q.quaternion().imag().norm().atan2(q.quaternion().scalar().abs())
    }

    /// Euclidean distance between the two translations.
    pub fn translation_distance(&self, other: &SE3) -> f64 {
        (self.translation - other.translation).norm()
    }
}

impl Default for SE3 {
    fn default() -> Self {
        Self::identity()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn sample_pose() -> SE3 {
        SE3 {
            rotation: UnitQuaternion::from_euler_angles(0.3, -0.2, 1.1),
            translation: Vector3::new(0.5, -1.0, 2.0),
        }
    }

    #[test]
    fn test_inverse_compose_is_identity() {
        let pose = sample_pose();
        let ident = pose.compose(&pose.inverse());

        assert_relative_eq!(ident.translation, Vector3::zeros(), epsilon = 1e-12);
        assert_relative_eq!(ident.rotation_distance(&SE3::identity()), 0.0, epsilon = 1e-12);
    }

    #[test]
    fn test_matrix_round_trip_matches_point_transform() {
        let pose = sample_pose();
        let mat = pose.to_matrix();
        let p = Vector3::new(0.1, 0.2, 3.0);

        let via_matrix = (mat * p.push(1.0)).xyz();
        assert_relative_eq!(via_matrix, pose.transform_point(&p), epsilon = 1e-12);

        let back = SE3::from_matrix(&mat);
        assert_relative_eq!(back.translation, pose.translation, epsilon = 1e-12);
        assert_relative_eq!(back.rotation_distance(&pose), 0.0, epsilon = 1e-9);
    }

    #[test]
    fn test_exp_log_inverse() {
        let pose = sample_pose();
        let twist = pose.log();
        let back = SE3::exp(&twist);

        assert_relative_eq!(back.translation, pose.translation, epsilon = 1e-10);
        assert_relative_eq!(back.rotation_distance(&pose), 0.0, epsilon = 1e-10);
    }

    #[test]
    fn test_exp_pure_translation() {
        let twist = Vector6::new(0.0, 0.0, 0.0, 1.0, 2.0, 3.0);
        let pose = SE3::exp(&twist);

        assert_relative_eq!(pose.translation, Vector3::new(1.0, 2.0, 3.0), epsilon = 1e-12);
        assert_relative_eq!(pose.rotation_distance(&SE3::identity()), 0.0, epsilon = 1e-12);
    }
}
