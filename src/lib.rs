pub mod backend;
pub mod frame;
pub mod geometry;
pub mod prediction;
pub mod relocalization;
pub mod synthetic;

pub use relocalization::{
    PoseCandidate, PreemptiveRansac, RansacConfig, RelocalizationError, Relocalizer,
};
