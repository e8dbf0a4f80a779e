//! Probabilistic energy used to rank pose candidates.
//!
//! For each inlier pixel the local point is moved into the world by the
//! candidate pose and evaluated against the pixel's most likely mode at that
//! location:
//!
//! ```text
//! p_i = support(m) * N(T * x_i; μ_m, Σ_m) / |modes_i| / support(m)
//! E   = Σ_i -log10(max(p_i, floor)) / |inliers|
//! ```
//!
//! Lower is better.

use crate::frame::FeatureImage;
use crate::geometry::SE3;
use crate::prediction::PredictionCache;

use super::candidate::{Inlier, PoseCandidate};

/// Scoring inputs shared by every candidate of one request.
pub struct EnergyContext<'a> {
    pub features: &'a FeatureImage,
    pub cache: &'a PredictionCache<'a>,
    pub probability_floor: f64,
}

impl<'a> EnergyContext<'a> {
    /// Negative log-likelihood of one inlier under `pose`, or `None` when the
    /// pixel carries no usable evidence.
    pub fn inlier_energy(&self, pose: &SE3, pixel: usize) -> Option<f64> {
        let local = self.features.position(pixel)?;
        let prediction = self.cache.get(pixel)?;

        let world = pose.transform_point(&local);
        let (index, density) = prediction.select_by_density(&world);
        let support = prediction.mode(index).support as f64;
        if support <= 0.0 {
            return None;
        }

        let mode_count = prediction.len() as f64;
        let probability = (support * density / mode_count) / support;
        Some(-probability.max(self.probability_floor).log10())
    }

    /// Average energy of `inliers` under `pose`.
    ///
    /// Pixels without evidence contribute zero but still count towards the
    /// average. An empty inlier set has infinite energy.
    pub fn pose_energy(&self, pose: &SE3, inliers: &[Inlier]) -> f64 {
        if inliers.is_empty() {
            return f64::INFINITY;
        }
        let total: f64 = inliers
            .iter()
            .filter_map(|inlier| self.inlier_energy(pose, inlier.pixel))
            .sum();
        total / inliers.len() as f64
    }

    /// Score `candidate` in place.
    pub fn score(&self, candidate: &mut PoseCandidate) {
        let energy = self.pose_energy(candidate.pose(), candidate.inliers());
        candidate.set_energy(energy);
    }

    /// Resolve every unresolved inlier of `candidate` to the mode with the
    /// highest density at its current pose.
    pub fn resolve_modes(&self, candidate: &mut PoseCandidate) {
        let pose = candidate.pose().clone();
        candidate.resolve_modes(|inlier| {
            let local = self.features.position(inlier.pixel)?;
            let prediction = self.cache.get(inlier.pixel)?;
            let (index, _) = prediction.select_by_density(&pose.transform_point(&local));
            Some(index)
        });
    }
}
