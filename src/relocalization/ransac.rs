//! Forest-based preemptive RANSAC relocalizer.
//!
//! One request runs, in order:
//! 1. the valid-pixel check,
//! 2. parallel hypothesis generation,
//! 3. the preemptive tournament with optional pose refinement.
//!
//! The prediction cache lives only for the duration of the request.

use std::time::Instant;

use parking_lot::Mutex;
use tracing::{debug, info};

use crate::backend::ExecutionBackend;
use crate::frame::{FeatureImage, LeafImage};
use crate::prediction::{ForestEvaluator, PredictionCache};

use super::candidate::PoseCandidate;
use super::config::RansacConfig;
use super::hypothesis::HypothesisGenerator;
use super::relocalizer::Relocalizer;
use super::result::{RelocalizationReport, RelocalizationStats, TimingStats};
use super::tournament::Tournament;
use super::RelocalizationError;

pub struct PreemptiveRansac<E: ForestEvaluator> {
    config: RansacConfig,
    forest: E,
    backend: ExecutionBackend,
    last_stats: Mutex<Option<RelocalizationStats>>,
}

impl<E: ForestEvaluator> PreemptiveRansac<E> {
    /// Validate `config` and build the execution backend it selects.
    pub fn new(config: RansacConfig, forest: E) -> Result<Self, RelocalizationError> {
        config.validate()?;
        let backend = ExecutionBackend::from_config(&config.backend)?;
        Ok(Self {
            config,
            forest,
            backend,
            last_stats: Mutex::new(None),
        })
    }

    pub fn config(&self) -> &RansacConfig {
        &self.config
    }

    pub fn forest(&self) -> &E {
        &self.forest
    }

    /// Statistics of the last successful request.
    pub fn last_stats(&self) -> Option<RelocalizationStats> {
        self.last_stats.lock().clone()
    }

    /// Estimate the camera pose of one frame.
    pub fn estimate_pose(
        &self,
        features: &FeatureImage,
        leaves: &LeafImage,
    ) -> Result<PoseCandidate, RelocalizationError> {
        self.estimate_pose_detailed(features, leaves)
            .map(|report| report.candidate)
    }

    /// Like [`estimate_pose`](Self::estimate_pose), also returning
    /// per-phase statistics.
    pub fn estimate_pose_detailed(
        &self,
        features: &FeatureImage,
        leaves: &LeafImage,
    ) -> Result<RelocalizationReport, RelocalizationError> {
        let t_start = Instant::now();

        if features.len() != leaves.len() {
            return Err(RelocalizationError::InputMismatch {
                features: features.len(),
                leaves: leaves.len(),
            });
        }

        let valid_pixels = features.count_valid();
        let required = self.config.min_valid_pixels();
        if valid_pixels < required {
            info!(
                "[Relocalization] {} valid pixels, {} required; skipping",
                valid_pixels, required
            );
            return Err(RelocalizationError::InsufficientValidPixels {
                valid: valid_pixels,
                required,
            });
        }

        let cache = PredictionCache::new(&self.forest, leaves, self.config.max_modes);

        let t_generate = Instant::now();
        let pool = HypothesisGenerator::new(features, &cache, &self.config).generate(&self.backend);
        let generate_ms = t_generate.elapsed().as_secs_f64() * 1000.0;

        info!(
            "[Relocalization] generated {}/{} initial candidates",
            pool.len(),
            self.config.hypothesis_count
        );
        if pool.is_empty() {
            return Err(RelocalizationError::NoHypotheses {
                attempts: self.config.hypothesis_count,
            });
        }
        let hypotheses_generated = pool.len();

        let t_tournament = Instant::now();
        let outcome = Tournament::new(features, &cache, &self.config, &self.backend).run(pool)?;
        let tournament_ms = t_tournament.elapsed().as_secs_f64() * 1000.0;

        let stats = RelocalizationStats {
            valid_pixels,
            hypotheses_generated,
            tournament_rounds: outcome.rounds,
            pose_updates: outcome.pose_updates,
            predictions_cached: cache.cached_count(),
            timing: TimingStats {
                total_ms: t_start.elapsed().as_secs_f64() * 1000.0,
                generate_ms,
                tournament_ms,
            },
        };

        debug!(
            "[Relocalization] generate {:.2} ms, tournament {:.2} ms ({} rounds, {} pose updates)",
            generate_ms, tournament_ms, outcome.rounds, outcome.pose_updates
        );
        info!(
            "[Relocalization] final pose from candidate {} with energy {:.4} over {} inliers",
            outcome.winner.generation(),
            outcome.winner.energy().unwrap_or(f64::NAN),
            outcome.winner.inliers().len()
        );

        *self.last_stats.lock() = Some(stats.clone());
        Ok(RelocalizationReport {
            candidate: outcome.winner,
            stats,
        })
    }
}

impl<E: ForestEvaluator> Relocalizer for PreemptiveRansac<E> {
    fn relocalize(
        &self,
        features: &FeatureImage,
        leaves: &LeafImage,
    ) -> Result<PoseCandidate, RelocalizationError> {
        self.estimate_pose(features, leaves)
    }

    fn reset(&self) {
        *self.last_stats.lock() = None;
    }
}
