//! Deterministic synthetic scenes with a known camera pose.
//!
//! Every pixel of a `width x height` grid sees a point on a curved surface in
//! front of the camera. The forest predicts exactly one isotropic mode per
//! pixel, centred on that point moved into the world by the scene pose, so
//! the true pose has zero energy. [`SyntheticScene::with_decoys`] adds a
//! second, better supported mode per pixel that no rigid pose explains.

use std::f64::consts::PI;

use nalgebra::{Vector3, Vector4};

use crate::frame::{FeatureImage, FeaturePoint, LeafId, LeafImage};
use crate::geometry::SE3;
use crate::prediction::{ForestEvaluator, Mode};

/// Mode variance giving a peak density of exactly one.
pub const MODE_VARIANCE: f64 = 1.0 / (2.0 * PI);

/// Grid spacing of the local points.
const SPACING: f64 = 0.05;

/// Distance of a decoy mode from the true world point.
pub const DECOY_DISTANCE: f64 = 1.0;

/// Support of the true mode. Decoys carry twice as much.
pub const TRUE_SUPPORT: u32 = 5;

/// Forest stub mapping leaf `i` to the `i`-th mode list.
#[derive(Debug, Clone)]
pub struct SyntheticForest {
    predictions: Vec<Vec<Mode>>,
}

impl SyntheticForest {
    pub fn new(predictions: Vec<Vec<Mode>>) -> Self {
        Self { predictions }
    }

    pub fn modes(&self, leaf: LeafId) -> &[Mode] {
        self.predictions
            .get(leaf.0 as usize)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }
}

impl ForestEvaluator for SyntheticForest {
    fn predict(&self, leaves: &[LeafId]) -> Option<Vec<Mode>> {
        let leaf = leaves.first()?;
        self.predictions.get(leaf.0 as usize).cloned()
    }
}

#[derive(Debug, Clone)]
pub struct SyntheticScene {
    /// Camera-to-world pose that generated the modes.
    pub pose: SE3,
    pub features: FeatureImage,
    pub leaves: LeafImage,
    pub forest: SyntheticForest,
}

impl SyntheticScene {
    pub fn grid(width: usize, height: usize, pose: SE3) -> Self {
        Self::build(width, height, pose, 1.0, |_, _| {})
    }

    /// Like [`grid`](Self::grid), with a decoy mode of support
    /// `2 * TRUE_SUPPORT` added to every pixel. Decoys sit `DECOY_DISTANCE`
    /// away from the true point in a direction that varies per pixel, and
    /// share the pixel colour. After sorting by support the true mode is
    /// index 1.
    pub fn with_decoys(width: usize, height: usize, pose: SE3) -> Self {
        let mut scene = Self::grid(width, height, pose);
        for (pixel, modes) in scene.forest.predictions.iter_mut().enumerate() {
            let Some(good) = modes.first().cloned() else {
                continue;
            };
            let decoy = Mode::isotropic(
                good.mean + decoy_direction(pixel) * DECOY_DISTANCE,
                MODE_VARIANCE,
                good.colour,
                2 * TRUE_SUPPORT,
            );
            modes.insert(0, decoy);
        }
        scene
    }

    /// Like [`grid`](Self::grid), then `edit(pixel, &mut feature)` is applied
    /// to every feature. Modes are computed from the unedited features.
    pub fn grid_with(
        width: usize,
        height: usize,
        pose: SE3,
        edit: impl FnMut(usize, &mut FeaturePoint),
    ) -> Self {
        Self::build(width, height, pose, 1.0, edit)
    }

    /// Scene whose world points are the local points scaled by `scale`
    /// before applying `pose`. No rigid transform explains it unless
    /// `scale` is one.
    pub fn grid_scaled(width: usize, height: usize, pose: SE3, scale: f64) -> Self {
        Self::build(width, height, pose, scale, |_, _| {})
    }

    fn build(
        width: usize,
        height: usize,
        pose: SE3,
        scale: f64,
        mut edit: impl FnMut(usize, &mut FeaturePoint),
    ) -> Self {
        let features = FeatureImage::from_fn(width, height, |x, y| {
            let local = local_point(x, y, width, height);
            FeaturePoint::from_homogeneous(
                x as u32,
                y as u32,
                Vector4::new(local.x, local.y, local.z, 1.0),
                pixel_colour(x, y),
            )
        });

        let modes = features
            .points()
            .iter()
            .map(|p| {
                let local = local_point(p.x as usize, p.y as usize, width, height);
                vec![Mode::isotropic(
                    pose.transform_point(&(local * scale)),
                    MODE_VARIANCE,
                    p.colour_f64(),
                    TRUE_SUPPORT,
                )]
            })
            .collect();

        let mut points = features.points().to_vec();
        for (i, p) in points.iter_mut().enumerate() {
            edit(i, p);
        }
        let features = FeatureImage::from_fn(width, height, |x, y| points[y * width + x].clone());

        let leaves = LeafImage::from_fn(width, height, 1, |pixel, _| LeafId(pixel as u32));

        Self {
            pose,
            features,
            leaves,
            forest: SyntheticForest::new(modes),
        }
    }
}

/// Camera-space point seen by pixel (x, y).
///
/// Depth is quadratic in both image directions, so no three distinct pixels
/// map to collinear points.
fn local_point(x: usize, y: usize, width: usize, height: usize) -> Vector3<f64> {
    let (xf, yf) = (x as f64, y as f64);
    let (w, h) = (width.max(1) as f64, height.max(1) as f64);
    let z = 2.0 + 0.02 * xf + 0.03 * yf * yf / h + 0.01 * xf * xf / w;
    Vector3::new((xf - w / 2.0) * SPACING, (yf - h / 2.0) * SPACING, z)
}

/// Unit direction on a golden-angle spiral over the sphere.
fn decoy_direction(pixel: usize) -> Vector3<f64> {
    let i = pixel as f64;
    let theta = i * 2.399_963_229_728_653;
    let z = 1.0 - 2.0 * (i * 0.618_033_988_749_895).fract();
    let r = (1.0 - z * z).max(0.0).sqrt();
    Vector3::new(r * theta.cos(), r * theta.sin(), z)
}

fn pixel_colour(x: usize, y: usize) -> [u8; 3] {
    [((x * 4) % 200) as u8, ((y * 4) % 200) as u8, 64]
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use nalgebra::UnitQuaternion;

    #[test]
    fn test_modes_follow_pose() {
        let pose = SE3 {
            rotation: UnitQuaternion::from_euler_angles(0.1, 0.2, 0.3),
            translation: Vector3::new(1.0, 2.0, 3.0),
        };
        let scene = SyntheticScene::grid(8, 6, pose.clone());

        assert_eq!(scene.features.len(), 48);
        assert_eq!(scene.leaves.len(), 48);
        for i in [0, 17, 47] {
            let local = scene.features.position(i).unwrap();
            let modes = scene.forest.predict(scene.leaves.leaves_at(i)).unwrap();
            assert_eq!(modes.len(), 1);
            assert_relative_eq!(modes[0].mean, pose.transform_point(&local), epsilon = 1e-12);
            assert_relative_eq!(modes[0].density(&modes[0].mean), 1.0, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_edits_leave_modes_untouched() {
        let scene = SyntheticScene::grid_with(4, 4, SE3::identity(), |i, p| {
            if i == 5 {
                p.position = None;
            }
        });
        assert_eq!(scene.features.count_valid(), 15);
        assert!(scene.forest.predict(scene.leaves.leaves_at(5)).is_some());
        assert!(scene.forest.predict(&[LeafId(16)]).is_none());
    }

    #[test]
    fn test_decoys_outrank_true_modes() {
        let scene = SyntheticScene::with_decoys(8, 6, SE3::identity());
        for i in [0, 9, 47] {
            let local = scene.features.position(i).unwrap();
            let modes = scene.forest.modes(LeafId(i as u32));
            assert_eq!(modes.len(), 2);
            assert_eq!(modes[0].support, 2 * TRUE_SUPPORT);
            assert_relative_eq!(modes[1].mean, local, epsilon = 1e-12);
            assert_relative_eq!((modes[0].mean - local).norm(), DECOY_DISTANCE, epsilon = 1e-12);
            assert_eq!(modes[0].colour, scene.features.get(i).unwrap().colour_f64());
        }
    }
}
