//! Continuous pose refinement with Levenberg-Marquardt.
//!
//! The pose is parameterized by its twist `ξ = [φ, ρ]`. Over the
//! correspondences whose projected point already lies close to the selected
//! mode, the energy is
//!
//! ```text
//! E(ξ) = Σ_i d_i          d_i = || W_i (exp(ξ) * x_i - μ_i) ||   (Mahalanobis)
//! E(ξ) = Σ_i e_i²         e_i = || exp(ξ) * x_i - μ_i ||         (Euclidean)
//! ```
//!
//! `W_i` is the transposed Cholesky factor of the mode's inverse covariance,
//! so `d_i` is the Mahalanobis distance. For the least-squares solver each
//! Mahalanobis residual is scaled by `1 / sqrt(max(d_i, ε))`, whose squares
//! sum to `E` wherever `d_i ≥ ε`. The Jacobian is taken by central
//! differences.

use levenberg_marquardt::{LeastSquaresProblem, LevenbergMarquardt};
use nalgebra::storage::Owned;
use nalgebra::{DMatrix, DVector, Dyn, Matrix3, Vector3, Vector6};
use tracing::trace;

use crate::frame::FeatureImage;
use crate::geometry::SE3;
use crate::prediction::PredictionCache;

use super::candidate::{Inlier, PoseCandidate};
use super::config::RefinementConfig;

/// Degrees of freedom of the pose twist.
const TWIST_DIM: usize = 6;

/// Below this Mahalanobis distance a residual contributes quadratically.
const MAHALANOBIS_SMOOTHING: f64 = 1e-2;

/// Residual metric of the refinement energy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Metric {
    /// Sum of Mahalanobis distances.
    Mahalanobis,
    /// Sum of squared Euclidean distances.
    Euclidean,
}

/// Solver patience giving roughly `max_iterations` residual evaluations.
///
/// `levenberg-marquardt` stops after `patience * (n + 1)` evaluations for
/// `n` parameters.
fn patience_for(max_iterations: usize) -> usize {
    max_iterations.div_ceil(TWIST_DIM + 1).max(1)
}

/// One local point matched to a mode mean.
#[derive(Debug, Clone)]
struct Correspondence {
    local: Vector3<f64>,
    target: Vector3<f64>,
    weight: Matrix3<f64>,
}

/// Successful refinement result.
#[derive(Debug, Clone)]
pub struct RefinedPose {
    pub pose: SE3,
    pub correspondences: usize,
    pub energy_before: f64,
    pub energy_after: f64,
}

pub struct PoseRefiner<'a> {
    features: &'a FeatureImage,
    cache: &'a PredictionCache<'a>,
    config: &'a RefinementConfig,
}

impl<'a> PoseRefiner<'a> {
    pub fn new(
        features: &'a FeatureImage,
        cache: &'a PredictionCache<'a>,
        config: &'a RefinementConfig,
    ) -> Self {
        Self {
            features,
            cache,
            config,
        }
    }

    /// Refine `candidate` in place. Returns `true` if the pose was replaced.
    ///
    /// The inlier set is left untouched either way.
    pub fn refine(&self, candidate: &mut PoseCandidate) -> bool {
        match self.refine_pose(candidate.pose(), candidate.inliers()) {
            Some(refined) => {
                candidate.set_pose(refined.pose);
                true
            }
            None => false,
        }
    }

    /// Optimize `pose` against `inliers`. Returns `None` when there are too
    /// few usable correspondences or the optimizer did not strictly lower
    /// the energy.
    pub fn refine_pose(&self, pose: &SE3, inliers: &[Inlier]) -> Option<RefinedPose> {
        let correspondences = self.collect_correspondences(pose, inliers);
        if correspondences.len() < self.config.min_correspondences {
            return None;
        }

        let initial = pose.log();
        let problem = self.problem(&correspondences, &initial);
        let energy_before = problem.energy(&initial);

        let (problem, report) = LevenbergMarquardt::new()
            .with_gtol(self.config.gradient_tolerance)
            .with_patience(patience_for(self.config.max_iterations))
            .minimize(problem);

        trace!(
            "[PoseRefiner] {} correspondences, {:?} after {} evaluations",
            correspondences.len(),
            report.termination,
            report.number_of_evaluations
        );

        let twist = Vector6::from_column_slice(problem.twist.as_slice());
        let energy_after = problem.energy(&twist);
        if !(energy_after < energy_before) {
            return None;
        }

        Some(RefinedPose {
            pose: SE3::exp(&twist),
            correspondences: correspondences.len(),
            energy_before,
            energy_after,
        })
    }

    fn problem<'c>(
        &self,
        correspondences: &'c [Correspondence],
        twist: &Vector6<f64>,
    ) -> PoseProblem<'c> {
        PoseProblem {
            correspondences,
            twist: DVector::from_column_slice(twist.as_slice()),
            step: self.config.differentiation_step,
            metric: if self.config.use_covariance {
                Metric::Mahalanobis
            } else {
                Metric::Euclidean
            },
        }
    }

    /// Pair each inlier with its most likely mode at `pose`, keeping only
    /// the pairs already within the inlier threshold.
    fn collect_correspondences(&self, pose: &SE3, inliers: &[Inlier]) -> Vec<Correspondence> {
        inliers
            .iter()
            .filter_map(|inlier| {
                let local = self.features.position(inlier.pixel)?;
                let prediction = self.cache.get(inlier.pixel)?;
                let world = pose.transform_point(&local);
                let (index, _) = prediction.select_by_density(&world);
                let mode = prediction.mode(index);

                if (mode.mean - world).norm() >= self.config.inlier_threshold {
                    return None;
                }

                let weight = if self.config.use_covariance {
                    mode.inverse_covariance
                        .cholesky()
                        .map(|c| c.l().transpose())
                        .unwrap_or_else(Matrix3::identity)
                } else {
                    Matrix3::identity()
                };

                Some(Correspondence {
                    local,
                    target: mode.mean,
                    weight,
                })
            })
            .collect()
    }
}

struct PoseProblem<'a> {
    correspondences: &'a [Correspondence],
    twist: DVector<f64>,
    step: f64,
    metric: Metric,
}

impl<'a> PoseProblem<'a> {
    /// Weighted error of every correspondence at `twist`.
    fn errors_at(&self, twist: &Vector6<f64>) -> Vec<Vector3<f64>> {
        let pose = SE3::exp(twist);
        self.correspondences
            .iter()
            .map(|c| c.weight * (pose.transform_point(&c.local) - c.target))
            .collect()
    }

    fn residuals_at(&self, twist: &Vector6<f64>) -> DVector<f64> {
        let mut r = DVector::zeros(self.correspondences.len() * 3);
        for (i, e) in self.errors_at(twist).into_iter().enumerate() {
            let e = match self.metric {
                Metric::Mahalanobis => e / e.norm().max(MAHALANOBIS_SMOOTHING).sqrt(),
                Metric::Euclidean => e,
            };
            r.fixed_rows_mut::<3>(i * 3).copy_from(&e);
        }
        r
    }

    /// Refinement energy at `twist`.
    fn energy(&self, twist: &Vector6<f64>) -> f64 {
        match self.metric {
            Metric::Mahalanobis => self.errors_at(twist).iter().map(|e| e.norm()).sum(),
            Metric::Euclidean => self.errors_at(twist).iter().map(|e| e.norm_squared()).sum(),
        }
    }

    fn current(&self) -> Vector6<f64> {
        Vector6::from_column_slice(self.twist.as_slice())
    }
}

impl<'a> LeastSquaresProblem<f64, Dyn, Dyn> for PoseProblem<'a> {
    type ResidualStorage = Owned<f64, Dyn>;
    type JacobianStorage = Owned<f64, Dyn, Dyn>;
    type ParameterStorage = Owned<f64, Dyn>;

    fn set_params(&mut self, x: &DVector<f64>) {
        self.twist.copy_from(x);
    }

    fn params(&self) -> DVector<f64> {
        self.twist.clone()
    }

    fn residuals(&self) -> Option<DVector<f64>> {
        let r = self.residuals_at(&self.current());
        r.iter().all(|v| v.is_finite()).then_some(r)
    }

    fn jacobian(&self) -> Option<DMatrix<f64>> {
        let x = self.current();
        let mut jac = DMatrix::zeros(self.correspondences.len() * 3, TWIST_DIM);
        for j in 0..TWIST_DIM {
            let mut plus = x;
            let mut minus = x;
            plus[j] += self.step;
            minus[j] -= self.step;
            let column = (self.residuals_at(&plus) - self.residuals_at(&minus)) / (2.0 * self.step);
            jac.set_column(j, &column);
        }
        jac.iter().all(|v| v.is_finite()).then_some(jac)
    }
}
