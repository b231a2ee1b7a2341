//! Connection migration snapshots.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::protocol::Zone;

/// Migration status shown for each protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum MigrationStatus {
    /// No network change in progress.
    #[default]
    Normal,
    /// The path broke and the connection is down.
    Disrupted,
    /// Path validation on the new network is in progress.
    Migrating,
    /// A new connection replaced the broken one.
    Reconnected,
}

impl fmt::Display for MigrationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Normal => f.write_str("Normal"),
            Self::Disrupted => f.write_str("Connection Lost"),
            Self::Migrating => f.write_str("Migrating"),
            Self::Reconnected => f.write_str("Reconnected"),
        }
    }
}

/// Path-independent session identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConnectionId(pub u64);

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016X}", self.0)
    }
}

/// TCP+TLS connection as seen during a migration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TcpPath {
    /// Whether the connection is usable.
    pub connected: bool,
    /// Migration status.
    pub status: MigrationStatus,
}

/// QUIC connection as seen during a migration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuicPath {
    /// Whether the connection is usable. Stays true across zone changes.
    pub connected: bool,
    /// Migration status.
    pub status: MigrationStatus,
    /// Session identifier carried across paths.
    pub connection_id: ConnectionId,
}

/// Migration demo snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MigrationState {
    /// Zone the device is in.
    pub current_zone: Zone,
    /// TCP+TLS side.
    pub tcp: TcpPath,
    /// QUIC side.
    pub quic: QuicPath,
}

impl MigrationState {
    /// Both connections established and idle in `zone`.
    pub const fn new(zone: Zone, connection_id: ConnectionId) -> Self {
        Self {
            current_zone: zone,
            tcp: TcpPath { connected: true, status: MigrationStatus::Normal },
            quic: QuicPath { connected: true, status: MigrationStatus::Normal, connection_id },
        }
    }

    /// Whether either protocol still waits on a recovery.
    pub fn is_settling(&self) -> bool {
        self.tcp.status == MigrationStatus::Disrupted
            || self.quic.status == MigrationStatus::Migrating
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_state_is_connected() {
        let state = MigrationState::new(Zone::Wifi, ConnectionId(7));
        assert!(state.tcp.connected);
        assert!(state.quic.connected);
        assert!(!state.is_settling());
        assert_eq!(state.quic.connection_id.to_string(), "0000000000000007");
    }
}
