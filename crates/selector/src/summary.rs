//! Run statistics.

use serde::{Deserialize, Serialize};

/// What happened during one selection run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    /// Wall-clock start of the run (RFC 3339).
    pub started_at: String,

    /// Seconds the run took.
    pub elapsed_secs: f64,

    /// Frames pulled from the source.
    pub frames_read: u64,

    /// Frames handed to the sink.
    pub frames_emitted: u64,

    /// Frames dropped by change detection, including baselines and frames
    /// that could not be compared.
    pub frames_pruned: u64,

    /// Frames dropped by the label policy.
    pub frames_rejected: u64,

    /// Frames dropped because the analysis did not answer in time.
    pub analysis_timeouts: u64,

    /// Frames dropped because the analysis result could not be parsed.
    pub parse_failures: u64,

    /// Whether the run stopped on request.
    pub cancelled: bool,
}

impl RunSummary {
    pub fn log(&self) {
        tracing::info!(
            started_at = %self.started_at,
            elapsed_secs = self.elapsed_secs,
            frames_read = self.frames_read,
            frames_emitted = self.frames_emitted,
            frames_pruned = self.frames_pruned,
            frames_rejected = self.frames_rejected,
            analysis_timeouts = self.analysis_timeouts,
            parse_failures = self.parse_failures,
            cancelled = self.cancelled,
            "Selection finished"
        );
    }
}
