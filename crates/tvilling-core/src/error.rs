//! Simulator error types.

use thiserror::Error;
use tvilling_proto::RunId;

/// Errors from simulator operations.
///
/// Every variant is a rejected request; the state the request targeted is
/// left untouched.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SimError {
    /// The stream set is full.
    #[error("stream capacity exceeded: at most {limit} streams")]
    CapacityExceeded {
        /// Maximum number of streams for the set.
        limit: usize,
    },

    /// A benchmark run is already active.
    #[error("benchmark run {} is already running", run.0)]
    AlreadyRunning {
        /// The active run.
        run: RunId,
    },

    /// No benchmark run is active.
    #[error("no benchmark run is active")]
    NotRunning,

    /// Benchmark parameters cannot produce a run.
    #[error("invalid benchmark: {reason}")]
    InvalidBenchmark {
        /// What is wrong with the parameters.
        reason: &'static str,
    },

    /// Timeline position outside `0..=100`.
    #[error("timeline position out of range: {position}")]
    InvalidPosition {
        /// The rejected position.
        position: f64,
    },

    /// Animation speed not in the accepted range.
    #[error("animation speed out of range: {speed}")]
    InvalidSpeed {
        /// The rejected speed.
        speed: f64,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        let err = SimError::CapacityExceeded { limit: 10 };
        assert_eq!(err.to_string(), "stream capacity exceeded: at most 10 streams");

        let err = SimError::AlreadyRunning { run: RunId(3) };
        assert_eq!(err.to_string(), "benchmark run 3 is already running");
    }
}
