//! Forest evaluator collaborator.

use std::sync::Arc;

use crate::frame::LeafId;

use super::Mode;

/// Maps the leaves a pixel reached (one per tree) to the union of the
/// Gaussian modes stored in those leaves.
///
/// Returning `None` (or an empty vector) signals that no trained modes are
/// reachable from that leaf combination.
pub trait ForestEvaluator: Send + Sync {
    fn predict(&self, leaves: &[LeafId]) -> Option<Vec<Mode>>;
}

impl<T: ForestEvaluator + ?Sized> ForestEvaluator for Arc<T> {
    fn predict(&self, leaves: &[LeafId]) -> Option<Vec<Mode>> {
        (**self).predict(leaves)
    }
}

impl<T: ForestEvaluator + ?Sized> ForestEvaluator for &T {
    fn predict(&self, leaves: &[LeafId]) -> Option<Vec<Mode>> {
        (**self).predict(leaves)
    }
}
