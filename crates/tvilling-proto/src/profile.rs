//! Network condition profiles.
//!
//! A [`NetworkProfile`] is an immutable value. Slider changes and preset
//! applications never mutate a profile in place; they build a new one, which
//! is validated on construction.
//!
//! # Invariants
//!
//! - `latency_ms` is finite and `>= 0`
//! - `loss_rate_percent` is finite and within `0..=100`
//! - `bandwidth_mbps` is finite and `> 0`

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::error::ProtoError;

/// Largest accepted loss rate, in percent.
pub const MAX_LOSS_RATE_PERCENT: f64 = 100.0;

/// Synthetic network conditions applied to every simulator.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawProfile", into = "RawProfile")]
pub struct NetworkProfile {
    latency_ms: f64,
    loss_rate_percent: f64,
    bandwidth_mbps: f64,
}

/// Unvalidated wire shape of a profile.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawProfile {
    latency_ms: f64,
    loss_rate_percent: f64,
    bandwidth_mbps: f64,
}

impl NetworkProfile {
    /// Build a validated profile.
    ///
    /// # Errors
    ///
    /// Returns `ProtoError::InvalidProfile` naming the first field that is
    /// not finite or out of range.
    pub fn new(
        latency_ms: f64,
        loss_rate_percent: f64,
        bandwidth_mbps: f64,
    ) -> Result<Self, ProtoError> {
        if !latency_ms.is_finite() || latency_ms < 0.0 {
            return Err(ProtoError::InvalidProfile { field: "latency_ms", value: latency_ms });
        }

        if !loss_rate_percent.is_finite()
            || !(0.0..=MAX_LOSS_RATE_PERCENT).contains(&loss_rate_percent)
        {
            return Err(ProtoError::InvalidProfile {
                field: "loss_rate_percent",
                value: loss_rate_percent,
            });
        }

        if !bandwidth_mbps.is_finite() || bandwidth_mbps <= 0.0 {
            return Err(ProtoError::InvalidProfile {
                field: "bandwidth_mbps",
                value: bandwidth_mbps,
            });
        }

        Ok(Self { latency_ms, loss_rate_percent, bandwidth_mbps })
    }

    /// One-way step latency in milliseconds.
    pub fn latency_ms(&self) -> f64 {
        self.latency_ms
    }

    /// Packet loss rate in percent.
    pub fn loss_rate_percent(&self) -> f64 {
        self.loss_rate_percent
    }

    /// Link bandwidth in megabits per second.
    pub fn bandwidth_mbps(&self) -> f64 {
        self.bandwidth_mbps
    }

    /// Probability that a single packet is lost, in `0.0..=1.0`.
    pub fn loss_probability(&self) -> f64 {
        self.loss_rate_percent / 100.0
    }

    /// Copy of this profile with a different latency.
    pub fn with_latency(self, latency_ms: f64) -> Result<Self, ProtoError> {
        Self::new(latency_ms, self.loss_rate_percent, self.bandwidth_mbps)
    }

    /// Copy of this profile with a different loss rate.
    pub fn with_loss_rate(self, loss_rate_percent: f64) -> Result<Self, ProtoError> {
        Self::new(self.latency_ms, loss_rate_percent, self.bandwidth_mbps)
    }

    /// Copy of this profile with a different bandwidth.
    pub fn with_bandwidth(self, bandwidth_mbps: f64) -> Result<Self, ProtoError> {
        Self::new(self.latency_ms, self.loss_rate_percent, bandwidth_mbps)
    }
}

impl Default for NetworkProfile {
    fn default() -> Self {
        Preset::Average.profile()
    }
}

impl fmt::Display for NetworkProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}ms / {}% loss / {} Mbps",
            self.latency_ms, self.loss_rate_percent, self.bandwidth_mbps
        )
    }
}

impl TryFrom<RawProfile> for NetworkProfile {
    type Error = ProtoError;

    fn try_from(raw: RawProfile) -> Result<Self, Self::Error> {
        Self::new(raw.latency_ms, raw.loss_rate_percent, raw.bandwidth_mbps)
    }
}

impl From<NetworkProfile> for RawProfile {
    fn from(profile: NetworkProfile) -> Self {
        Self {
            latency_ms: profile.latency_ms,
            loss_rate_percent: profile.loss_rate_percent,
            bandwidth_mbps: profile.bandwidth_mbps,
        }
    }
}

/// Named network conditions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Preset {
    /// 10 ms, no loss, 1 Gbps.
    Excellent,
    /// 50 ms, 0.1% loss, 100 Mbps.
    Good,
    /// 100 ms, 1% loss, 50 Mbps.
    Average,
    /// 200 ms, 3% loss, 10 Mbps.
    Poor,
    /// 500 ms, 10% loss, 1 Mbps.
    Terrible,
}

impl Preset {
    /// Every preset, best conditions first.
    pub const ALL: [Self; 5] =
        [Self::Excellent, Self::Good, Self::Average, Self::Poor, Self::Terrible];

    /// Lowercase preset name as used in commands.
    pub const fn name(self) -> &'static str {
        match self {
            Self::Excellent => "excellent",
            Self::Good => "good",
            Self::Average => "average",
            Self::Poor => "poor",
            Self::Terrible => "terrible",
        }
    }

    /// The profile this preset stands for.
    pub const fn profile(self) -> NetworkProfile {
        let (latency_ms, loss_rate_percent, bandwidth_mbps) = match self {
            Self::Excellent => (10.0, 0.0, 1000.0),
            Self::Good => (50.0, 0.1, 100.0),
            Self::Average => (100.0, 1.0, 50.0),
            Self::Poor => (200.0, 3.0, 10.0),
            Self::Terrible => (500.0, 10.0, 1.0),
        };

        NetworkProfile { latency_ms, loss_rate_percent, bandwidth_mbps }
    }
}

impl fmt::Display for Preset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Preset {
    type Err = ProtoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        Self::ALL
            .into_iter()
            .find(|preset| preset.name().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| ProtoError::UnknownPreset { name: s.to_string() })
    }
}
