//! Identifiers carried by engine commands.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::error::ProtoError;

/// The two transports being compared.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    /// TCP three-way handshake followed by a TLS handshake. One ordered
    /// byte stream, so a single loss blocks everything behind it.
    TcpTls,
    /// QUIC with the TLS handshake folded into transport setup and
    /// independently ordered streams.
    Quic,
}

impl Protocol {
    /// Both protocols in comparison order.
    pub const ALL: [Self; 2] = [Self::TcpTls, Self::Quic];

    /// Short lowercase name used in commands and logs.
    pub const fn name(self) -> &'static str {
        match self {
            Self::TcpTls => "tcp",
            Self::Quic => "quic",
        }
    }

    /// Whether the protocol carries independent streams.
    pub const fn is_multiplexed(self) -> bool {
        matches!(self, Self::Quic)
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TcpTls => f.write_str("TCP+TLS"),
            Self::Quic => f.write_str("QUIC"),
        }
    }
}

impl FromStr for Protocol {
    type Err = ProtoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "tcp" | "tcp+tls" | "tls" | "a" => Ok(Self::TcpTls),
            "quic" | "b" => Ok(Self::Quic),
            _ => Err(ProtoError::UnknownProtocol { name: s.to_string() }),
        }
    }
}

/// The four interactive demos.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DemoKind {
    /// Connection setup step by step.
    #[default]
    Handshake,
    /// Packet bursts over one ordered stream vs many independent ones.
    Streaming,
    /// Moving a device between network zones.
    Migration,
    /// Synthetic benchmark time series.
    Performance,
}

impl DemoKind {
    /// Every demo.
    pub const ALL: [Self; 4] =
        [Self::Handshake, Self::Streaming, Self::Migration, Self::Performance];

    /// Lowercase demo name as used in commands.
    pub const fn name(self) -> &'static str {
        match self {
            Self::Handshake => "handshake",
            Self::Streaming => "streaming",
            Self::Migration => "migration",
            Self::Performance => "performance",
        }
    }
}

impl fmt::Display for DemoKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for DemoKind {
    type Err = ProtoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        Self::ALL
            .into_iter()
            .find(|demo| demo.name().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| ProtoError::UnknownDemo { name: s.to_string() })
    }
}

/// A simulated network environment a device can move between.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Zone {
    /// Home or office wireless network.
    #[default]
    Wifi,
    /// Mobile carrier network.
    Cellular,
    /// Wired network.
    Ethernet,
}

impl Zone {
    /// Every zone.
    pub const ALL: [Self; 3] = [Self::Wifi, Self::Cellular, Self::Ethernet];

    /// Lowercase zone id.
    pub const fn id(self) -> &'static str {
        match self {
            Self::Wifi => "wifi",
            Self::Cellular => "cellular",
            Self::Ethernet => "ethernet",
        }
    }
}

impl fmt::Display for Zone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

impl FromStr for Zone {
    type Err = ProtoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().trim_end_matches("-zone");
        Self::ALL
            .into_iter()
            .find(|zone| zone.id().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| ProtoError::UnknownZone { name: s.to_string() })
    }
}
