//! Per-pixel multi-modal 3D prediction.

use nalgebra::Vector3;

use super::Mode;

/// Ordered set of Gaussian modes predicted for one pixel.
///
/// Modes are sorted by descending support and capped at construction time;
/// a `Prediction` is immutable afterwards.
#[derive(Debug, Clone, PartialEq)]
pub struct Prediction {
    modes: Vec<Mode>,
    /// Indices of the modes contributed by the first tree.
    first_tree: Vec<usize>,
}

impl Prediction {
    /// Sort `modes` by descending support (stable) and keep at most
    /// `max_modes`. Returns `None` when there are no modes.
    pub fn from_modes(mut modes: Vec<Mode>, max_modes: usize) -> Option<Self> {
        modes.sort_by(|a, b| b.support.cmp(&a.support));
        modes.truncate(max_modes);
        if modes.is_empty() {
            return None;
        }
        let first_tree = first_tree_indices(&modes);
        Some(Self { modes, first_tree })
    }

    pub fn modes(&self) -> &[Mode] {
        &self.modes
    }

    #[inline]
    pub fn mode(&self, index: usize) -> &Mode {
        &self.modes[index]
    }

    pub fn len(&self) -> usize {
        self.modes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modes.is_empty()
    }

    /// Indices of the modes that belong to the first tree's contribution.
    /// Never empty.
    pub fn first_tree_modes(&self) -> &[usize] {
        &self.first_tree
    }

    /// Mode with the highest density at `point`, with that density.
    ///
    /// Ties resolve to the lowest index.
    pub fn select_by_density(&self, point: &Vector3<f64>) -> (usize, f64) {
        let mut best = (0, f64::NEG_INFINITY);
        for (i, mode) in self.modes.iter().enumerate() {
            let density = mode.density(point);
            if density > best.1 {
                best = (i, density);
            }
        }
        (best.0, best.1.max(0.0))
    }
}

/// Determine which modes were contributed by the first tree.
///
/// With explicit tree tags on every mode, the first tree is the lowest tag.
/// Otherwise the modes are assumed to be grouped per tree, each group sorted
/// by descending support, and the first group ends where the support count
/// increases.
fn first_tree_indices(modes: &[Mode]) -> Vec<usize> {
    if let Some(tags) = modes.iter().map(|m| m.tree).collect::<Option<Vec<_>>>() {
        if let Some(&first) = tags.iter().min() {
            return tags
                .iter()
                .enumerate()
                .filter(|&(_, &t)| t == first)
                .map(|(i, _)| i)
                .collect();
        }
    }

    let boundary = modes
        .windows(2)
        .position(|w| w[1].support > w[0].support)
        .map_or(modes.len(), |i| i + 1);
    (0..boundary).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mode(support: u32) -> Mode {
        Mode::isotropic(Vector3::new(support as f64, 0.0, 0.0), 0.01, Vector3::zeros(), support)
    }

    #[test]
    fn test_sorted_and_capped() {
        let modes = vec![mode(3), mode(9), mode(1), mode(5)];
        let pred = Prediction::from_modes(modes, 3).unwrap();

        let supports: Vec<_> = pred.modes().iter().map(|m| m.support).collect();
        assert_eq!(supports, vec![9, 5, 3]);
    }

    #[test]
    fn test_empty_is_invalid() {
        assert!(Prediction::from_modes(Vec::new(), 20).is_none());
        assert!(Prediction::from_modes(vec![mode(1)], 0).is_none());
    }

    #[test]
    fn test_boundary_heuristic_on_grouped_modes() {
        // Two trees: [8, 4] then [6, 2].
        let modes = vec![mode(8), mode(4), mode(6), mode(2)];
        assert_eq!(first_tree_indices(&modes), vec![0, 1]);

        // Monotone supports: a single tree contributed everything.
        let modes = vec![mode(8), mode(6), mode(4)];
        assert_eq!(first_tree_indices(&modes), vec![0, 1, 2]);
    }

    #[test]
    fn test_tree_tags_override_heuristic() {
        let modes = vec![
            mode(9).with_tree(1),
            mode(7).with_tree(0),
            mode(5).with_tree(1),
            mode(2).with_tree(0),
        ];
        let pred = Prediction::from_modes(modes, 20).unwrap();
        assert_eq!(pred.first_tree_modes(), &[1, 3]);
    }

    #[test]
    fn test_select_by_density_picks_nearest_mode() {
        let pred = Prediction::from_modes(vec![mode(1), mode(2), mode(3)], 20).unwrap();

        // Sorted order is supports [3, 2, 1] at x = 3, 2, 1.
        let (idx, density) = pred.select_by_density(&Vector3::new(1.9, 0.0, 0.0));
        assert_eq!(pred.mode(idx).support, 2);
        assert!(density > 0.0);
    }
}
