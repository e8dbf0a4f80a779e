//! Pose candidates competing in the preemptive tournament.

use nalgebra::Matrix4;

use crate::geometry::SE3;

/// A (pixel, mode) correspondence counted as evidence for a candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Inlier {
    /// Linear pixel index in the feature image.
    pub pixel: usize,
    /// Index into the pixel's prediction; `None` until resolved.
    pub mode: Option<usize>,
}

impl Inlier {
    pub fn resolved(pixel: usize, mode: usize) -> Self {
        Self {
            pixel,
            mode: Some(mode),
        }
    }

    pub fn unresolved(pixel: usize) -> Self {
        Self { pixel, mode: None }
    }
}

/// A camera pose hypothesis with its inlier evidence.
///
/// The energy is only meaningful right after scoring: any change to the pose
/// or to the inlier set clears it.
#[derive(Debug, Clone, PartialEq)]
pub struct PoseCandidate {
    pose: SE3,
    inliers: Vec<Inlier>,
    energy: Option<f64>,
    generation: usize,
}

impl PoseCandidate {
    pub fn new(pose: SE3, inliers: Vec<Inlier>, generation: usize) -> Self {
        Self {
            pose,
            inliers,
            energy: None,
            generation,
        }
    }

    /// Camera-to-world pose.
    pub fn pose(&self) -> &SE3 {
        &self.pose
    }

    /// Camera-to-world pose as a homogeneous 4x4 matrix.
    pub fn pose_matrix(&self) -> Matrix4<f64> {
        self.pose.to_matrix()
    }

    pub fn inliers(&self) -> &[Inlier] {
        &self.inliers
    }

    /// Energy from the last scoring pass.
    pub fn energy(&self) -> Option<f64> {
        self.energy
    }

    /// Index of the hypothesis attempt that produced this candidate.
    pub fn generation(&self) -> usize {
        self.generation
    }

    pub fn set_pose(&mut self, pose: SE3) {
        self.pose = pose;
        self.energy = None;
    }

    pub fn set_energy(&mut self, energy: f64) {
        self.energy = Some(energy);
    }

    /// Append unresolved inliers for freshly sampled pixels.
    pub fn extend_inliers(&mut self, pixels: &[usize]) {
        self.inliers
            .extend(pixels.iter().map(|&p| Inlier::unresolved(p)));
        self.energy = None;
    }

    /// Drop inliers beyond the first `len`.
    ///
    /// Only used to undo the evidence attached by the trim round.
    pub(crate) fn truncate_inliers(&mut self, len: usize) {
        if self.inliers.len() > len {
            self.inliers.truncate(len);
            self.energy = None;
        }
    }

    /// Fill in unresolved inlier modes. Pixels and resolved modes stay fixed.
    pub(crate) fn resolve_modes(&mut self, mut resolve: impl FnMut(&Inlier) -> Option<usize>) {
        for inlier in &mut self.inliers {
            if inlier.mode.is_none() {
                inlier.mode = resolve(inlier);
            }
        }
    }

    /// Sort key for the tournament; unscored candidates rank last.
    pub(crate) fn energy_key(&self) -> f64 {
        self.energy.unwrap_or(f64::INFINITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::Vector3;

    fn candidate() -> PoseCandidate {
        let inliers = vec![Inlier::resolved(3, 0), Inlier::resolved(8, 1), Inlier::resolved(9, 0)];
        PoseCandidate::new(SE3::identity(), inliers, 7)
    }

    #[test]
    fn test_mutation_invalidates_energy() {
        let mut c = candidate();
        c.set_energy(1.5);
        c.extend_inliers(&[12, 40]);
        assert_eq!(c.energy(), None);
        assert_eq!(c.inliers().len(), 5);
        assert_eq!(c.inliers()[4], Inlier::unresolved(40));

        c.set_energy(0.5);
        let mut pose = SE3::identity();
        pose.translation = Vector3::new(1.0, 0.0, 0.0);
        c.set_pose(pose);
        assert_eq!(c.energy(), None);
        assert_eq!(c.energy_key(), f64::INFINITY);
    }

    #[test]
    fn test_truncate_restores_hypothesis_inliers() {
        let mut c = candidate();
        c.extend_inliers(&[1, 2, 4]);
        c.truncate_inliers(3);
        assert_eq!(c.inliers(), candidate().inliers());
    }

    #[test]
    fn test_resolve_only_touches_unresolved() {
        let mut c = candidate();
        c.extend_inliers(&[20]);
        c.resolve_modes(|_| Some(5));
        let modes: Vec<_> = c.inliers().iter().map(|i| i.mode).collect();
        assert_eq!(modes, vec![Some(0), Some(1), Some(0), Some(5)]);
        assert_eq!(c.generation(), 7);
    }
}
