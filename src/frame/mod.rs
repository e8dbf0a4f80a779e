//! Frame-level inputs: features from the feature provider and leaf
//! assignments from the forest evaluator.

pub mod features;
pub mod leaves;

pub use features::{FeatureImage, FeaturePoint};
pub use leaves::{LeafId, LeafImage};
