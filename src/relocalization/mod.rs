//! Camera relocalization by preemptive RANSAC over forest predictions.

pub mod candidate;
pub mod config;
pub mod energy;
pub mod error;
pub mod hypothesis;
pub mod ransac;
pub mod refine;
pub mod relocalizer;
pub mod result;
pub mod tournament;

pub use candidate::{Inlier, PoseCandidate};
pub use config::{HypothesisModeSelection, RansacConfig, RefinementConfig};
pub use error::RelocalizationError;
pub use ransac::PreemptiveRansac;
pub use relocalizer::{NullRelocalizer, Relocalizer};
pub use result::{RelocalizationReport, RelocalizationStats, TimingStats};
