//! Relocalization results and diagnostics.

use super::candidate::PoseCandidate;

/// Outcome of one relocalization request.
#[derive(Debug, Clone)]
pub struct RelocalizationReport {
    pub candidate: PoseCandidate,
    pub stats: RelocalizationStats,
}

/// Counters and timings for one request.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RelocalizationStats {
    pub valid_pixels: usize,
    pub hypotheses_generated: usize,
    pub tournament_rounds: usize,
    pub pose_updates: usize,
    /// Pixels whose prediction was looked up (valid or not).
    pub predictions_cached: usize,
    pub timing: TimingStats,
}

/// Wall-clock timing breakdown in milliseconds.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TimingStats {
    pub total_ms: f64,
    pub generate_ms: f64,
    pub tournament_ms: f64,
}
