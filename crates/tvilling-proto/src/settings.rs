//! Persisted user settings.
//!
//! A flat record read and written as a whole. The field names are fixed by
//! existing saved files: `{latency, speed, packetLoss, bandwidth,
//! timestamp}`.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{error::ProtoError, profile::NetworkProfile};

/// Animation speed used when nothing was saved.
pub const DEFAULT_SPEED: f64 = 1.0;

/// Saved network conditions and animation speed.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    /// Latency in milliseconds.
    pub latency: f64,
    /// Animation speed multiplier.
    pub speed: f64,
    /// Loss rate in percent.
    pub packet_loss: f64,
    /// Bandwidth in Mbps.
    pub bandwidth: f64,
    /// Save time, milliseconds since the Unix epoch.
    pub timestamp: u64,
}

/// Errors reading or writing the settings record.
#[derive(Debug, Error)]
pub enum SettingsError {
    /// The record is not valid JSON or misses fields.
    #[error("malformed settings: {0}")]
    Malformed(#[from] serde_json::Error),

    /// The stored conditions do not form a valid profile.
    #[error("settings hold an invalid profile: {0}")]
    Profile(#[from] ProtoError),
}

impl Settings {
    /// Record the given conditions.
    pub fn from_profile(profile: NetworkProfile, speed: f64, timestamp: u64) -> Self {
        Self {
            latency: profile.latency_ms(),
            speed,
            packet_loss: profile.loss_rate_percent(),
            bandwidth: profile.bandwidth_mbps(),
            timestamp,
        }
    }

    /// The network profile stored in the record.
    pub fn profile(&self) -> Result<NetworkProfile, SettingsError> {
        Ok(NetworkProfile::new(self.latency, self.packet_loss, self.bandwidth)?)
    }

    /// Parse a saved record.
    pub fn from_json(json: &str) -> Result<Self, SettingsError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Serialize the record.
    pub fn to_json(&self) -> Result<String, SettingsError> {
        Ok(serde_json::to_string(self)?)
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self::from_profile(NetworkProfile::default(), DEFAULT_SPEED, 0)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::profile::Preset;

    #[test]
    fn reads_reference_field_names() {
        let json = concat!(
            r#"{"latency":200,"speed":1.5,"packetLoss":3,"#,
            r#""bandwidth":10,"timestamp":1700000000000}"#,
        );
        let settings = Settings::from_json(json).unwrap();

        assert_eq!(settings.speed, 1.5);
        assert_eq!(settings.timestamp, 1_700_000_000_000);
        assert_eq!(settings.profile().unwrap(), Preset::Poor.profile());
    }

    #[test]
    fn writes_camel_case() {
        let json = Settings::default().to_json().unwrap();
        assert!(json.contains("\"packetLoss\":1.0"), "got {json}");
        assert!(json.contains("\"latency\":100.0"), "got {json}");
    }

    #[test]
    fn missing_field_is_malformed() {
        let err = Settings::from_json(r#"{"latency":10}"#).unwrap_err();
        assert!(matches!(err, SettingsError::Malformed(_)));
    }

    #[test]
    fn out_of_range_profile_is_reported() {
        let settings = Settings { packet_loss: 400.0, ..Settings::default() };
        assert!(matches!(settings.profile(), Err(SettingsError::Profile(_))));
    }
}
