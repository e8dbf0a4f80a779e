//! Preemptive elimination tournament over the candidate pool.
//!
//! Each round attaches a fresh batch of pixels to every surviving candidate,
//! optionally refines the poses, rescores everything and keeps the better
//! half (rounded up) until a single candidate remains. A pixel is used as
//! evidence at most once per tournament.

use std::sync::atomic::{AtomicUsize, Ordering};

use rand::{rngs::StdRng, Rng, SeedableRng};
use tracing::{debug, warn};

use crate::backend::ParallelBackend;
use crate::frame::FeatureImage;
use crate::prediction::PredictionCache;

use super::candidate::PoseCandidate;
use super::config::RansacConfig;
use super::energy::EnergyContext;
use super::refine::PoseRefiner;
use super::RelocalizationError;

/// Tournament result.
#[derive(Debug, Clone)]
pub struct TournamentOutcome {
    pub winner: PoseCandidate,
    /// Halving rounds played (the trim round is not counted).
    pub rounds: usize,
    /// Pose refinements that lowered the energy and were applied.
    pub pose_updates: usize,
}

/// Sort ascending by energy and keep the better `P - floor(P / 2)`.
///
/// The sort is stable, so equal energies keep their pool order.
pub fn eliminate(candidates: &mut Vec<PoseCandidate>) {
    sort_by_energy(candidates);
    let keep = candidates.len() - candidates.len() / 2;
    candidates.truncate(keep);
}

fn sort_by_energy(candidates: &mut [PoseCandidate]) {
    candidates.sort_by(|a, b| a.energy_key().total_cmp(&b.energy_key()));
}

pub struct Tournament<'a, B: ParallelBackend> {
    features: &'a FeatureImage,
    cache: &'a PredictionCache<'a>,
    config: &'a RansacConfig,
    backend: &'a B,
    energy: EnergyContext<'a>,
    refiner: PoseRefiner<'a>,
}

impl<'a, B: ParallelBackend> Tournament<'a, B> {
    pub fn new(
        features: &'a FeatureImage,
        cache: &'a PredictionCache<'a>,
        config: &'a RansacConfig,
        backend: &'a B,
    ) -> Self {
        Self {
            features,
            cache,
            config,
            backend,
            energy: EnergyContext {
                features,
                cache,
                probability_floor: config.probability_floor,
            },
            refiner: PoseRefiner::new(features, cache, &config.refinement),
        }
    }

    /// Play the tournament to a single winner.
    pub fn run(
        &self,
        mut candidates: Vec<PoseCandidate>,
    ) -> Result<TournamentOutcome, RelocalizationError> {
        if candidates.is_empty() {
            return Err(RelocalizationError::EmptyCandidatePool);
        }

        let mut rng = StdRng::seed_from_u64(self.config.seed);

        if candidates.len() > self.config.trim_threshold {
            self.trim(&mut candidates, &mut rng);
        }

        let mut mask = vec![false; self.features.len()];
        let mut rounds = 0;
        let mut pose_updates = 0;

        while candidates.len() > 1 {
            rounds += 1;
            pose_updates += self.play_round(&mut candidates, &mut rng, &mut mask);
        }

        let mut winner = candidates
            .pop()
            .ok_or(RelocalizationError::EmptyCandidatePool)?;
        if winner.energy().is_none() {
            self.energy.score(&mut winner);
        }
        self.energy.resolve_modes(&mut winner);

        Ok(TournamentOutcome {
            winner,
            rounds,
            pose_updates,
        })
    }

    /// Score the whole pool once on an unmasked batch and keep the best
    /// `trim_threshold` candidates. With more than one survivor the batch is
    /// stripped from their inliers again.
    fn trim(&self, candidates: &mut Vec<PoseCandidate>, rng: &mut StdRng) {
        let hypothesis_len = candidates[0].inliers().len();
        let batch = self.sample_batch(rng, None);

        self.backend.for_each_mut(candidates, |_, c| {
            c.extend_inliers(&batch);
            self.energy.score(c);
        });
        sort_by_energy(candidates);

        let before = candidates.len();
        candidates.truncate(self.config.trim_threshold);
        if self.config.trim_threshold > 1 {
            for c in candidates.iter_mut() {
                c.truncate_inliers(hypothesis_len);
            }
        }
        debug!("[Tournament] trimmed pool {} -> {}", before, candidates.len());
    }

    /// One elimination round. Returns the number of accepted pose updates.
    fn play_round(
        &self,
        candidates: &mut Vec<PoseCandidate>,
        rng: &mut StdRng,
        mask: &mut [bool],
    ) -> usize {
        let batch = self.sample_batch(rng, Some(mask));
        let updated = AtomicUsize::new(0);

        self.backend.for_each_mut(candidates, |_, c| {
            c.extend_inliers(&batch);
            if self.config.pose_update && self.refiner.refine(c) {
                updated.fetch_add(1, Ordering::Relaxed);
            }
            self.energy.score(c);
        });

        let before = candidates.len();
        eliminate(candidates);

        let updated = updated.into_inner();
        debug!(
            "[Tournament] round: {} sampled, {} updated, pool {} -> {}, best energy {:.4}",
            batch.len(),
            updated,
            before,
            candidates.len(),
            candidates.first().map_or(f64::NAN, |c| c.energy_key())
        );
        updated
    }

    /// Draw up to `batch_size` pixels with a valid feature and prediction.
    ///
    /// With a mask, pixels already used in this tournament are skipped and
    /// newly drawn ones are marked. A slot that finds nothing within
    /// `max_sampling_attempts` draws ends the batch early.
    fn sample_batch(&self, rng: &mut StdRng, mut mask: Option<&mut [bool]>) -> Vec<usize> {
        let pixels = self.features.len();
        let mut batch = Vec::with_capacity(self.config.batch_size);
        if pixels == 0 {
            return batch;
        }

        for _ in 0..self.config.batch_size {
            let mut found = None;
            for _ in 0..self.config.max_sampling_attempts {
                let pixel = rng.gen_range(0..pixels);
                if self.features.position(pixel).is_none() || self.cache.get(pixel).is_none() {
                    continue;
                }
                if let Some(mask) = mask.as_deref_mut() {
                    if mask[pixel] {
                        continue;
                    }
                    mask[pixel] = true;
                }
                found = Some(pixel);
                break;
            }

            match found {
                Some(pixel) => batch.push(pixel),
                None => {
                    warn!(
                        "[Tournament] could not sample a valid pixel, batch cut to {}/{}",
                        batch.len(),
                        self.config.batch_size
                    );
                    break;
                }
            }
        }
        batch
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    use nalgebra::{UnitQuaternion, Vector3};

    use crate::backend::SequentialBackend;
    use crate::geometry::SE3;
    use crate::relocalization::candidate::Inlier;
    use crate::relocalization::hypothesis::HypothesisGenerator;
    use crate::synthetic::SyntheticScene;

    fn scored(energies: &[f64]) -> Vec<PoseCandidate> {
        energies
            .iter()
            .enumerate()
            .map(|(i, &e)| {
                let mut c = PoseCandidate::new(SE3::identity(), vec![Inlier::resolved(i, 0)], i);
                c.set_energy(e);
                c
            })
            .collect()
    }

    fn scene() -> SyntheticScene {
        let pose = SE3 {
            rotation: UnitQuaternion::from_euler_angles(0.05, 0.3, -0.2),
            translation: Vector3::new(0.2, 0.0, 1.5),
        };
        SyntheticScene::grid(32, 24, pose)
    }

    fn config() -> RansacConfig {
        RansacConfig {
            hypothesis_count: 40,
            batch_size: 20,
            trim_threshold: 16,
            ..Default::default()
        }
    }

    #[test]
    fn test_eliminate_keeps_lowest_half_rounded_up() {
        let energies = [3.0, 0.5, 2.0, 9.0, 1.0, 4.0, 0.1];
        let mut pool = scored(&energies);
        eliminate(&mut pool);

        let kept: Vec<_> = pool.iter().map(|c| c.energy().unwrap()).collect();
        assert_eq!(kept, vec![0.1, 0.5, 1.0, 2.0]);

        for p in 2..20 {
            let mut pool = scored(&vec![1.0; p]);
            eliminate(&mut pool);
            assert_eq!(pool.len(), p - p / 2);
            // Stable: ties stay in generation order.
            assert!(pool.windows(2).all(|w| w[0].generation() < w[1].generation()));
        }
    }

    #[test]
    fn test_unscored_candidates_rank_last() {
        let mut pool = scored(&[2.0, 1.0]);
        pool.push(PoseCandidate::new(SE3::identity(), Vec::new(), 9));
        eliminate(&mut pool);
        assert_eq!(pool.iter().map(|c| c.generation()).collect::<Vec<_>>(), vec![1, 0]);
    }

    #[test]
    fn test_empty_pool_fails() {
        let scene = scene();
        let cache = PredictionCache::new(&scene.forest, &scene.leaves, 20);
        let config = config();
        let tournament = Tournament::new(&scene.features, &cache, &config, &SequentialBackend);

        assert!(matches!(
            tournament.run(Vec::new()),
            Err(RelocalizationError::EmptyCandidatePool)
        ));
    }

    #[test]
    fn test_round_halves_pool() {
        let scene = scene();
        let cache = PredictionCache::new(&scene.forest, &scene.leaves, 20);
        let config = config();
        let pool = HypothesisGenerator::new(&scene.features, &cache, &config).generate(&SequentialBackend);
        let tournament = Tournament::new(&scene.features, &cache, &config, &SequentialBackend);

        let mut rng = StdRng::seed_from_u64(3);
        let mut mask = vec![false; scene.features.len()];
        let mut candidates: Vec<_> = pool.into_iter().take(11).collect();
        tournament.play_round(&mut candidates, &mut rng, &mut mask);

        assert_eq!(candidates.len(), 6);
        assert!(candidates.iter().all(|c| c.energy().is_some()));
        assert!(candidates.iter().all(|c| c.inliers().len() == 3 + config.batch_size));
        assert!(candidates
            .windows(2)
            .all(|w| w[0].energy_key() <= w[1].energy_key()));
    }

    #[test]
    fn test_trim_restores_hypothesis_inliers() {
        let scene = scene();
        let cache = PredictionCache::new(&scene.forest, &scene.leaves, 20);
        let config = config();
        let mut pool = HypothesisGenerator::new(&scene.features, &cache, &config).generate(&SequentialBackend);
        let tournament = Tournament::new(&scene.features, &cache, &config, &SequentialBackend);

        let mut rng = StdRng::seed_from_u64(5);
        tournament.trim(&mut pool, &mut rng);
        assert_eq!(pool.len(), config.trim_threshold);
        assert!(pool.iter().all(|c| c.inliers().len() == 3));
    }

    #[test]
    fn test_masked_sampling_never_repeats() {
        // 8x6 grid has 48 pixels; ask for more than that.
        let scene = SyntheticScene::grid(8, 6, SE3::identity());
        let cache = PredictionCache::new(&scene.forest, &scene.leaves, 20);
        let config = RansacConfig {
            batch_size: 100,
            max_sampling_attempts: 2000,
            ..Default::default()
        };
        let tournament = Tournament::new(&scene.features, &cache, &config, &SequentialBackend);

        let mut rng = StdRng::seed_from_u64(1);
        let mut mask = vec![false; scene.features.len()];
        let batch = tournament.sample_batch(&mut rng, Some(mask.as_mut_slice()));

        let unique: HashSet<_> = batch.iter().collect();
        assert_eq!(unique.len(), batch.len());
        assert_eq!(batch.len(), 48);
        assert!(mask.iter().all(|&m| m));

        // Exhausted mask: the next batch is cut short immediately.
        assert!(tournament.sample_batch(&mut rng, Some(mask.as_mut_slice())).is_empty());
    }

    #[test]
    fn test_run_converges_to_true_pose() {
        let scene = scene();
        let cache = PredictionCache::new(&scene.forest, &scene.leaves, 20);
        let config = RansacConfig {
            check_min_distance: false,
            ..config()
        };
        let pool = HypothesisGenerator::new(&scene.features, &cache, &config).generate(&SequentialBackend);
        let tournament = Tournament::new(&scene.features, &cache, &config, &SequentialBackend);

        let outcome = tournament.run(pool).unwrap();
        let winner = &outcome.winner;
        assert!(outcome.rounds >= 4);
        assert!(winner.pose().translation_distance(&scene.pose) < 1e-6);
        assert!(winner.energy().unwrap().abs() < 1e-6);
        assert!(winner.inliers().iter().all(|i| i.mode.is_some()));

        // Tournament evidence never repeats a pixel.
        let sampled: Vec<_> = winner.inliers()[3..].iter().map(|i| i.pixel).collect();
        let unique: HashSet<_> = sampled.iter().collect();
        assert_eq!(unique.len(), sampled.len());
    }

    #[test]
    fn test_lowest_energy_hypothesis_wins_over_decoys() {
        let scene = SyntheticScene::with_decoys(32, 24, scene().pose);
        let cache = PredictionCache::new(&scene.forest, &scene.leaves, 20);
        let config = RansacConfig {
            hypothesis_count: 128,
            ..config()
        };
        let pool = HypothesisGenerator::new(&scene.features, &cache, &config).generate(&SequentialBackend);
        assert!(pool
            .iter()
            .any(|c| c.pose().translation_distance(&scene.pose) > 1e-3));

        let tournament = Tournament::new(&scene.features, &cache, &config, &SequentialBackend);
        let winner = tournament.run(pool).unwrap().winner;

        assert!(winner.pose().translation_distance(&scene.pose) < 1e-6);
        assert!(winner.pose().rotation_distance(&scene.pose) < 1e-6);
        // Two modes per pixel: the best attainable probability is one half.
        assert!((winner.energy().unwrap() - 2f64.log10()).abs() < 1e-6);
        assert!(winner.inliers()[3..].iter().all(|i| i.mode == Some(1)));
    }
}
