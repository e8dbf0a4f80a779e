use crate::frame::{FeatureImage, LeafImage};

use super::candidate::PoseCandidate;
use super::RelocalizationError;

/// Recovers a camera pose from a single frame after tracking was lost.
pub trait Relocalizer: Send + Sync {
    fn relocalize(
        &self,
        features: &FeatureImage,
        leaves: &LeafImage,
    ) -> Result<PoseCandidate, RelocalizationError>;

    /// Drop any state kept from previous requests.
    fn reset(&self);
}

/// Relocalizer used when relocalization is disabled. Always fails.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullRelocalizer;

impl Relocalizer for NullRelocalizer {
    fn relocalize(
        &self,
        _features: &FeatureImage,
        _leaves: &LeafImage,
    ) -> Result<PoseCandidate, RelocalizationError> {
        Err(RelocalizationError::Unavailable)
    }

    fn reset(&self) {}
}
