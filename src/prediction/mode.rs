//! Gaussian modes: the 3D clusters a forest leaf combination predicts.

use std::f64::consts::PI;

use nalgebra::{Matrix3, Vector3};

/// (2π)³, the normalization constant of a trivariate Gaussian.
const TWO_PI_CUBED: f64 = 8.0 * PI * PI * PI;

/// A 3D Gaussian cluster of world-space positions.
#[derive(Debug, Clone, PartialEq)]
pub struct Mode {
    /// Mean world-space position.
    pub mean: Vector3<f64>,
    /// Mean RGB colour of the training points in this cluster.
    pub colour: Vector3<f64>,
    /// Inverse of the position covariance.
    pub inverse_covariance: Matrix3<f64>,
    /// Determinant of the position covariance.
    pub determinant: f64,
    /// Number of training points supporting this mode.
    pub support: u32,
    /// Index of the tree that produced this mode, when the evaluator knows it.
    pub tree: Option<u32>,
}

impl Mode {
    /// Build a mode from its covariance. Returns `None` if the covariance is
    /// not invertible.
    pub fn from_covariance(
        mean: Vector3<f64>,
        covariance: &Matrix3<f64>,
        colour: Vector3<f64>,
        support: u32,
    ) -> Option<Self> {
        let inverse_covariance = covariance.try_inverse()?;
        Some(Self {
            mean,
            colour,
            inverse_covariance,
            determinant: covariance.determinant(),
            support,
            tree: None,
        })
    }

    /// Isotropic mode with variance `sigma_sq` on every axis.
    pub fn isotropic(mean: Vector3<f64>, sigma_sq: f64, colour: Vector3<f64>, support: u32) -> Self {
        Self {
            mean,
            colour,
            inverse_covariance: Matrix3::identity() / sigma_sq,
            determinant: sigma_sq * sigma_sq * sigma_sq,
            support,
            tree: None,
        }
    }

    /// Tag the mode with the tree that produced it.
    pub fn with_tree(mut self, tree: u32) -> Self {
        self.tree = Some(tree);
        self
    }

    /// Squared Mahalanobis distance of `p` to the mean.
    #[inline]
    pub fn mahalanobis_squared(&self, p: &Vector3<f64>) -> f64 {
        let diff = p - self.mean;
        diff.dot(&(self.inverse_covariance * diff))
    }

    /// Gaussian probability density at `p`.
    ///
    /// Degenerate modes (non-positive or non-finite determinant) have zero
    /// density everywhere.
    pub fn density(&self, p: &Vector3<f64>) -> f64 {
        if !(self.determinant > 0.0) || !self.determinant.is_finite() {
            return 0.0;
        }
        let normalization = 1.0 / (self.determinant * TWO_PI_CUBED).sqrt();
        let density = normalization * (-0.5 * self.mahalanobis_squared(p)).exp();
        if density.is_finite() {
            density
        } else {
            0.0
        }
    }
}
