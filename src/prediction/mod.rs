//! Forest predictions: Gaussian modes, per-pixel predictions and their cache.

pub mod cache;
pub mod forest;
pub mod mode;
pub mod prediction;

pub use cache::PredictionCache;
pub use forest::ForestEvaluator;
pub use mode::Mode;
pub use prediction::Prediction;
