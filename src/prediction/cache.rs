//! Lazily filled, thread-safe per-pixel prediction cache.
//!
//! Each pixel owns one insert-once slot. The first worker to request a pixel
//! queries the forest evaluator and publishes the result (including the
//! "invalid" outcome); every later read is a lock-free load of the published
//! value. Entries are never evicted; the cache lives for one relocalization
//! request.

use std::sync::OnceLock;

use crate::frame::LeafImage;

use super::{ForestEvaluator, Prediction};

pub struct PredictionCache<'a> {
    forest: &'a dyn ForestEvaluator,
    leaves: &'a LeafImage,
    max_modes: usize,
    slots: Vec<OnceLock<Option<Prediction>>>,
}

impl<'a> PredictionCache<'a> {
    pub fn new(forest: &'a dyn ForestEvaluator, leaves: &'a LeafImage, max_modes: usize) -> Self {
        let slots = (0..leaves.len()).map(|_| OnceLock::new()).collect();
        Self {
            forest,
            leaves,
            max_modes,
            slots,
        }
    }

    /// Prediction for pixel `index`, computing and caching it on first access.
    ///
    /// Returns `None` if the pixel is out of range or the forest yields no
    /// modes for it; the latter is remembered permanently.
    pub fn get(&self, index: usize) -> Option<&Prediction> {
        self.slots
            .get(index)?
            .get_or_init(|| self.compute(index))
            .as_ref()
    }

    /// Prediction for pixel `index` only if it was already computed.
    pub fn peek(&self, index: usize) -> Option<&Prediction> {
        self.slots.get(index)?.get()?.as_ref()
    }

    /// Number of pixels whose prediction (valid or not) has been computed.
    pub fn cached_count(&self) -> usize {
        self.slots.iter().filter(|s| s.get().is_some()).count()
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    fn compute(&self, index: usize) -> Option<Prediction> {
        let modes = self.forest.predict(self.leaves.leaves_at(index))?;
        Prediction::from_modes(modes, self.max_modes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use nalgebra::Vector3;
    use rayon::prelude::*;

    use crate::frame::LeafId;
    use crate::prediction::Mode;

    /// Leaf id `n` yields `n` modes; leaf 0 yields nothing.
    struct CountingForest {
        calls: AtomicUsize,
    }

    impl ForestEvaluator for CountingForest {
        fn predict(&self, leaves: &[LeafId]) -> Option<Vec<Mode>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let n = leaves[0].0;
            if n == 0 {
                return None;
            }
            Some(
                (0..n)
                    .map(|i| Mode::isotropic(Vector3::new(i as f64, 0.0, 0.0), 0.1, Vector3::zeros(), i))
                    .collect(),
            )
        }
    }

    fn leaf_image() -> LeafImage {
        let leaves = vec![LeafId(0), LeafId(3), LeafId(30), LeafId(1)];
        LeafImage::new(4, 1, 1, leaves).unwrap()
    }

    #[test]
    fn test_lazy_and_memoized() {
        let forest = CountingForest { calls: AtomicUsize::new(0) };
        let leaves = leaf_image();
        let cache = PredictionCache::new(&forest, &leaves, 20);

        assert!(cache.peek(1).is_none());
        assert_eq!(cache.get(1).map(|p| p.len()), Some(3));
        assert_eq!(cache.get(1).map(|p| p.len()), Some(3));
        assert_eq!(forest.calls.load(Ordering::SeqCst), 1);
        assert!(cache.peek(1).is_some());
    }

    #[test]
    fn test_invalid_pixel_is_remembered() {
        let forest = CountingForest { calls: AtomicUsize::new(0) };
        let leaves = leaf_image();
        let cache = PredictionCache::new(&forest, &leaves, 20);

        assert!(cache.get(0).is_none());
        assert!(cache.get(0).is_none());
        assert_eq!(forest.calls.load(Ordering::SeqCst), 1);
        assert_eq!(cache.cached_count(), 1);
        assert!(cache.get(99).is_none());
    }

    #[test]
    fn test_mode_cap_and_ordering() {
        let forest = CountingForest { calls: AtomicUsize::new(0) };
        let leaves = leaf_image();
        let cache = PredictionCache::new(&forest, &leaves, 20);

        let pred = cache.get(2).unwrap();
        assert_eq!(pred.len(), 20);
        assert_eq!(pred.mode(0).support, 29);
    }

    #[test]
    fn test_concurrent_first_access_is_consistent() {
        let forest = CountingForest { calls: AtomicUsize::new(0) };
        let leaves = leaf_image();
        let cache = PredictionCache::new(&forest, &leaves, 20);

        let lens: Vec<_> = (0..256)
            .into_par_iter()
            .map(|i| cache.get(i % 4).map(|p| p.len()))
            .collect();

        for (i, len) in lens.iter().enumerate() {
            assert_eq!(*len, [None, Some(3), Some(20), Some(1)][i % 4]);
        }
        assert_eq!(cache.cached_count(), 4);
    }
}
