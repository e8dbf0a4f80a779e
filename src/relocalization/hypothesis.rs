//! Pose hypothesis generation from minimal correspondence sets.
//!
//! Every attempt draws `points_per_hypothesis` pixel/mode pairs under the
//! colour, diversity and rigidity gates and aligns the local points onto the
//! selected mode means. Attempts are independent and seeded by index, so the
//! resulting pool does not depend on how the backend partitions the work.

use nalgebra::Vector3;
use parking_lot::Mutex;
use rand::{rngs::StdRng, Rng, SeedableRng};

use crate::backend::ParallelBackend;
use crate::frame::{FeatureImage, FeaturePoint};
use crate::geometry::align_rigid;
use crate::prediction::{Mode, PredictionCache};

use super::candidate::{Inlier, PoseCandidate};
use super::config::{HypothesisModeSelection, RansacConfig};

/// Seed of the random stream used by task `index`.
#[inline]
pub fn task_seed(base: u64, index: usize) -> u64 {
    base.wrapping_add(1).wrapping_add(index as u64)
}

/// A sampled pixel matched to one of its modes.
#[derive(Debug, Clone, Copy)]
struct Selection {
    pixel: usize,
    mode: usize,
    local: Vector3<f64>,
    world: Vector3<f64>,
}

pub struct HypothesisGenerator<'a> {
    features: &'a FeatureImage,
    cache: &'a PredictionCache<'a>,
    config: &'a RansacConfig,
}

impl<'a> HypothesisGenerator<'a> {
    pub fn new(
        features: &'a FeatureImage,
        cache: &'a PredictionCache<'a>,
        config: &'a RansacConfig,
    ) -> Self {
        Self {
            features,
            cache,
            config,
        }
    }

    /// Run `hypothesis_count` attempts on `backend`.
    ///
    /// Failed attempts contribute nothing. The pool is ordered by generation
    /// index.
    pub fn generate<B: ParallelBackend>(&self, backend: &B) -> Vec<PoseCandidate> {
        let pool = Mutex::new(Vec::with_capacity(self.config.hypothesis_count));

        backend.map(self.config.hypothesis_count, |attempt| {
            if let Some(candidate) = self.hypothesize(attempt) {
                pool.lock().push(candidate);
            }
        });

        let mut pool = pool.into_inner();
        pool.sort_by_key(|c| c.generation());
        pool
    }

    /// One hypothesis attempt with its own random stream.
    pub fn hypothesize(&self, attempt: usize) -> Option<PoseCandidate> {
        let mut rng = StdRng::seed_from_u64(task_seed(self.config.seed, attempt));

        for _ in 0..self.config.max_outer_iterations {
            let Some(selections) = self.select(&mut rng) else {
                continue;
            };

            let local: Vec<_> = selections.iter().map(|s| s.local).collect();
            let world: Vec<_> = selections.iter().map(|s| s.world).collect();
            let Some(pose) = align_rigid(&local, &world) else {
                continue;
            };

            let inliers = selections
                .iter()
                .map(|s| Inlier::resolved(s.pixel, s.mode))
                .collect();
            return Some(PoseCandidate::new(pose, inliers, attempt));
        }
        None
    }

    /// Draw pixels until a full minimal set passes the gates or a draw
    /// budget runs out.
    ///
    /// Only draws that reach a prediction count against
    /// `max_inner_iterations`. Draws on pixels without depth or prediction
    /// are bounded separately by `max_invalid_draws`.
    fn select(&self, rng: &mut StdRng) -> Option<Vec<Selection>> {
        let count = self.config.points_per_hypothesis;
        let pixels = self.features.len();
        if pixels == 0 {
            return None;
        }

        let mut selections = Vec::with_capacity(count);
        let mut draws = 0;
        let mut invalid_draws = 0;
        while selections.len() < count
            && draws < self.config.max_inner_iterations
            && invalid_draws < self.config.max_invalid_draws
        {
            let pixel = rng.gen_range(0..pixels);
            let evidence = self.features.get(pixel).and_then(|feature| {
                let local = feature.position?;
                let prediction = self.cache.get(pixel)?;
                Some((feature, local, prediction))
            });
            let Some((feature, local, prediction)) = evidence else {
                invalid_draws += 1;
                continue;
            };
            draws += 1;

            let mode_index = match self.config.mode_selection {
                HypothesisModeSelection::FirstMode => 0,
                HypothesisModeSelection::UniformFirstTree => {
                    let first_tree = prediction.first_tree_modes();
                    first_tree[rng.gen_range(0..first_tree.len())]
                }
            };
            let mode = prediction.mode(mode_index);

            if selections.is_empty() && !self.colour_consistent(feature, mode) {
                continue;
            }
            if self.config.check_min_distance && !self.far_enough(&selections, &mode.mean) {
                continue;
            }
            if self.config.check_rigidity && !self.rigid(&selections, &local, &mode.mean) {
                continue;
            }

            selections.push(Selection {
                pixel,
                mode: mode_index,
                local,
                world: mode.mean,
            });
        }

        (selections.len() == count).then_some(selections)
    }

    fn colour_consistent(&self, feature: &FeaturePoint, mode: &Mode) -> bool {
        let diff = feature.colour_f64() - mode.colour;
        diff.iter().all(|d| d.abs() <= self.config.colour_tolerance)
    }

    fn far_enough(&self, selections: &[Selection], world: &Vector3<f64>) -> bool {
        selections
            .iter()
            .all(|s| (s.world - world).norm() >= self.config.min_mode_distance)
    }

    /// Every pair must be far enough apart locally and preserve its distance
    /// between the local and world frames.
    fn rigid(&self, selections: &[Selection], local: &Vector3<f64>, world: &Vector3<f64>) -> bool {
        selections.iter().all(|s| {
            let dist_local = (s.local - local).norm();
            let dist_world = (s.world - world).norm();
            dist_local >= self.config.min_mode_distance
                && (dist_local - dist_world).abs() <= 0.5 * self.config.rigidity_tolerance
        })
    }
}
