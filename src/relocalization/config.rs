//! Configuration for the preemptive RANSAC relocalizer.

use serde::{Deserialize, Serialize};

use crate::backend::BackendConfig;

use super::RelocalizationError;

/// How a hypothesis picks the mode of a sampled pixel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HypothesisModeSelection {
    /// Always use the highest-support mode.
    FirstMode,
    /// Sample uniformly among the modes contributed by the first tree.
    UniformFirstTree,
}

/// Continuous pose refinement settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RefinementConfig {
    /// Weight residuals by each mode's inverse covariance (Mahalanobis)
    /// instead of plain Euclidean distance.
    pub use_covariance: bool,
    /// Correspondences whose projected point lies farther than this from the
    /// selected mode mean are left out of the optimization.
    pub inlier_threshold: f64,
    /// Refinement is skipped with fewer accepted correspondences.
    pub min_correspondences: usize,
    /// Approximate cap on Levenberg-Marquardt residual evaluations, rounded
    /// up to a whole number of solver patience units.
    pub max_iterations: usize,
    /// Step used for the central-difference Jacobian.
    pub differentiation_step: f64,
    /// Convergence threshold on the gradient.
    pub gradient_tolerance: f64,
}

impl Default for RefinementConfig {
    fn default() -> Self {
        Self {
            use_covariance: true,
            inlier_threshold: 0.2,
            min_correspondences: 4,
            max_iterations: 100,
            differentiation_step: 1e-4,
            gradient_tolerance: 1e-6,
        }
    }
}

/// Preemptive RANSAC configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RansacConfig {
    /// Number of pose hypotheses attempted.
    pub hypothesis_count: usize,
    /// Correspondences per hypothesis (minimum 3 for rigid alignment).
    pub points_per_hypothesis: usize,
    /// Mode selection policy during hypothesis generation.
    pub mode_selection: HypothesisModeSelection,
    /// Reject correspondences whose mode mean is closer than
    /// `min_mode_distance` to an already selected one.
    pub check_min_distance: bool,
    pub min_mode_distance: f64,
    /// Reject correspondence pairs whose local and world distances disagree.
    pub check_rigidity: bool,
    /// Translation error tolerated for a correct pose; pairs may disagree by
    /// half of it.
    pub rigidity_tolerance: f64,
    /// Per-channel colour tolerance between the first sampled pixel and the
    /// colour of its mode.
    pub colour_tolerance: f64,
    /// Selection restarts per hypothesis.
    pub max_outer_iterations: usize,
    /// Draws on pixels with a valid prediction allowed per restart.
    pub max_inner_iterations: usize,
    /// Draws on pixels without depth or prediction allowed per restart.
    pub max_invalid_draws: usize,
    /// Pixels added to every candidate per tournament round.
    pub batch_size: usize,
    /// Draws allowed per batch slot before the batch is cut short.
    pub max_sampling_attempts: usize,
    /// Pool size after the first scoring round. Applied only when more
    /// candidates than this were generated.
    pub trim_threshold: usize,
    /// Run continuous pose refinement every round.
    pub pose_update: bool,
    pub refinement: RefinementConfig,
    /// Maximum number of modes kept per pixel prediction.
    pub max_modes: usize,
    /// Lower bound on per-pixel probabilities before taking the logarithm.
    pub probability_floor: f64,
    /// Base seed for every random stream.
    pub seed: u64,
    pub backend: BackendConfig,
}

impl Default for RansacConfig {
    fn default() -> Self {
        Self {
            hypothesis_count: 1024,
            points_per_hypothesis: 3,
            mode_selection: HypothesisModeSelection::UniformFirstTree,
            check_min_distance: true,
            min_mode_distance: 0.3,
            check_rigidity: false,
            rigidity_tolerance: 0.05,
            colour_tolerance: 30.0,
            max_outer_iterations: 20,
            max_inner_iterations: 6000,
            max_invalid_draws: 60_000,
            batch_size: 500,
            max_sampling_attempts: 50,
            trim_threshold: 64,
            pose_update: true,
            refinement: RefinementConfig::default(),
            max_modes: 20,
            probability_floor: 1e-10,
            seed: 0,
            backend: BackendConfig::default(),
        }
    }
}

impl RansacConfig {
    /// Minimum number of valid pixels a frame needs to be relocalized.
    pub fn min_valid_pixels(&self) -> usize {
        self.points_per_hypothesis.max(self.batch_size)
    }

    pub fn validate(&self) -> Result<(), RelocalizationError> {
        let invalid = |msg: &str| Err(RelocalizationError::InvalidConfig(msg.to_string()));

        if self.points_per_hypothesis < 3 {
            return invalid("points_per_hypothesis must be at least 3");
        }
        if self.hypothesis_count == 0 {
            return invalid("hypothesis_count must be positive");
        }
        if self.batch_size == 0 {
            return invalid("batch_size must be positive");
        }
        if self.max_outer_iterations == 0
            || self.max_inner_iterations == 0
            || self.max_invalid_draws == 0
        {
            return invalid("hypothesis iteration bounds must be positive");
        }
        if self.max_sampling_attempts == 0 {
            return invalid("max_sampling_attempts must be positive");
        }
        if self.trim_threshold == 0 {
            return invalid("trim_threshold must be positive");
        }
        if self.max_modes == 0 {
            return invalid("max_modes must be positive");
        }
        if !(self.probability_floor > 0.0) {
            return invalid("probability_floor must be positive");
        }
        if !(self.colour_tolerance >= 0.0) {
            return invalid("colour_tolerance must be non-negative");
        }
        if self.check_min_distance && !(self.min_mode_distance >= 0.0) {
            return invalid("min_mode_distance must be non-negative");
        }
        if self.check_rigidity && !(self.rigidity_tolerance > 0.0) {
            return invalid("rigidity_tolerance must be positive");
        }

        let r = &self.refinement;
        if !(r.inlier_threshold > 0.0) {
            return invalid("refinement inlier_threshold must be positive");
        }
        if r.min_correspondences == 0 {
            return invalid("refinement min_correspondences must be positive");
        }
        if !(r.differentiation_step > 0.0) {
            return invalid("refinement differentiation_step must be positive");
        }
        if !(r.gradient_tolerance >= 0.0) {
            return invalid("refinement gradient_tolerance must be non-negative");
        }
        Ok(())
    }
}
