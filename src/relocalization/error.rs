use thiserror::Error;

/// Reasons a relocalization request can fail.
///
/// None of these are fatal; the caller keeps its previous tracking state.
#[derive(Debug, Error)]
pub enum RelocalizationError {
    #[error("not enough valid pixels to relocalize: {valid} < {required}")]
    InsufficientValidPixels { valid: usize, required: usize },

    #[error("no pose hypothesis could be generated in {attempts} attempts")]
    NoHypotheses { attempts: usize },

    #[error("candidate pool is empty")]
    EmptyCandidatePool,

    #[error("feature image has {features} pixels but leaf image has {leaves}")]
    InputMismatch { features: usize, leaves: usize },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("failed to build worker pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),

    #[error("relocalization is not available")]
    Unavailable,
}
