//! Engine configuration.

use serde::{Deserialize, Serialize};
use tvilling_core::{RecoveryDelay, stream::MAX_STREAMS, timeline::DEFAULT_INCREMENT};
use tvilling_proto::Zone;

use crate::error::EngineError;

/// Engine configuration.
///
/// Every field has a default, so a partial TOML or JSON document only needs
/// to name what it changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Multiplexed streams open when the streaming demo starts.
    pub initial_streams: usize,
    /// Virtual time before a lossy stream is retransmitted.
    pub stream_recovery_ms: u64,
    /// Time for a zone change to settle.
    pub migration_recovery: RecoveryDelay,
    /// Virtual time between timeline playback ticks.
    pub timeline_tick_ms: u64,
    /// Timeline position increment per tick at speed 1.
    pub timeline_increment: f64,
    /// Zone the migration demo starts in.
    pub initial_zone: Zone,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            initial_streams: 4,
            stream_recovery_ms: 1_000,
            migration_recovery: RecoveryDelay::default(),
            timeline_tick_ms: 100,
            timeline_increment: DEFAULT_INCREMENT,
            initial_zone: Zone::Wifi,
        }
    }
}

impl EngineConfig {
    /// Check the configuration can drive an engine.
    ///
    /// # Errors
    ///
    /// - `InvalidConfig` naming the first offending field
    pub fn validate(&self) -> Result<(), EngineError> {
        if self.initial_streams > MAX_STREAMS {
            return Err(EngineError::InvalidConfig { field: "initial_streams" });
        }
        if self.timeline_tick_ms == 0 {
            return Err(EngineError::InvalidConfig { field: "timeline_tick_ms" });
        }
        if !self.timeline_increment.is_finite() || self.timeline_increment <= 0.0 {
            return Err(EngineError::InvalidConfig { field: "timeline_increment" });
        }
        if let RecoveryDelay::PerLatency { factor } = self.migration_recovery
            && (!factor.is_finite() || factor < 0.0)
        {
            return Err(EngineError::InvalidConfig { field: "migration_recovery" });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_valid() {
        assert_eq!(EngineConfig::default().validate(), Ok(()));
    }

    #[test]
    fn too_many_initial_streams() {
        let config = EngineConfig { initial_streams: 11, ..EngineConfig::default() };
        assert_eq!(config.validate(), Err(EngineError::InvalidConfig { field: "initial_streams" }));
    }

    #[test]
    fn zero_tick_is_rejected() {
        let config = EngineConfig { timeline_tick_ms: 0, ..EngineConfig::default() };
        assert!(config.validate().is_err());
    }
}
