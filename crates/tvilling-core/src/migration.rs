//! Connection migration simulator.
//!
//! A network zone change breaks protocol A outright: its connection is bound
//! to the old address and has to be re-established. Protocol B keeps the
//! same connection id and only migrates its path, so it never reports a
//! disconnect.
//!
//! ```text
//! A: Normal ──zone change──► Disrupted ──delay──► Reconnected
//! B: Normal ──zone change──► Migrating ──delay──► Normal
//! ```
//!
//! # Invariants
//!
//! - The connection id is never changed by a zone change or recovery
//! - Protocol B is connected in every state

use serde::{Deserialize, Serialize};
use tvilling_proto::{MigrationState, MigrationStatus, NetworkProfile, Zone};

/// How long a migration takes to settle after a zone change.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecoveryDelay {
    /// Same delay regardless of network conditions.
    Fixed {
        /// Delay in milliseconds.
        ms: u64,
    },
    /// `factor` round-trips of the current latency.
    PerLatency {
        /// Multiplier applied to `latency_ms`.
        factor: f64,
    },
}

impl RecoveryDelay {
    /// Two seconds, whatever the conditions.
    pub const FIXED_DEFAULT: Self = Self::Fixed { ms: 2_000 };

    /// Delay in milliseconds under `profile`.
    pub fn resolve(&self, profile: &NetworkProfile) -> u64 {
        match *self {
            Self::Fixed { ms } => ms,
            Self::PerLatency { factor } => {
                let ms = (factor * profile.latency_ms()).round();
                if ms.is_finite() && ms > 0.0 { ms as u64 } else { 0 }
            },
        }
    }
}

impl Default for RecoveryDelay {
    fn default() -> Self {
        Self::FIXED_DEFAULT
    }
}

/// Outcome of [`change_zone`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ZoneChange {
    /// State right after the change.
    pub state: MigrationState,
    /// Zone before the change.
    pub from: Zone,
    /// `false` when the new zone equals the current one.
    pub changed: bool,
}

/// Move the client to `new_zone`.
///
/// Changing to the current zone is a no-op.
pub fn change_zone(state: &MigrationState, new_zone: Zone) -> ZoneChange {
    let from = state.current_zone;
    if from == new_zone {
        return ZoneChange { state: *state, from, changed: false };
    }

    let mut next = *state;
    next.current_zone = new_zone;
    next.tcp.connected = false;
    next.tcp.status = MigrationStatus::Disrupted;
    next.quic.status = MigrationStatus::Migrating;

    ZoneChange { state: next, from, changed: true }
}

/// Settle a pending migration.
///
/// Only `Disrupted` (A) and `Migrating` (B) move; anything else is kept.
pub fn recover(state: &MigrationState) -> MigrationState {
    let mut next = *state;
    if next.tcp.status == MigrationStatus::Disrupted {
        next.tcp.connected = true;
        next.tcp.status = MigrationStatus::Reconnected;
    }
    if next.quic.status == MigrationStatus::Migrating {
        next.quic.status = MigrationStatus::Normal;
    }
    next
}

/// State `since_change_ms` after moving `state` to `new_zone`, given a
/// recovery delay of `delay_ms`.
pub fn status_at(
    state: &MigrationState,
    new_zone: Zone,
    since_change_ms: u64,
    delay_ms: u64,
) -> MigrationState {
    let change = change_zone(state, new_zone);
    if change.changed && since_change_ms >= delay_ms {
        recover(&change.state)
    } else {
        change.state
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;
    use tvilling_proto::{ConnectionId, Preset};

    use super::*;

    fn start() -> MigrationState {
        MigrationState::new(Zone::Wifi, ConnectionId(0xDEAD_BEEF))
    }

    #[test]
    fn wifi_to_cellular() {
        let change = change_zone(&start(), Zone::Cellular);
        assert!(change.changed);
        assert_eq!(change.from, Zone::Wifi);

        let s = change.state;
        assert_eq!(s.current_zone, Zone::Cellular);
        assert!(!s.tcp.connected);
        assert_eq!(s.tcp.status, MigrationStatus::Disrupted);
        assert!(s.quic.connected);
        assert_eq!(s.quic.status, MigrationStatus::Migrating);

        let settled = recover(&s);
        assert!(settled.tcp.connected);
        assert_eq!(settled.tcp.status, MigrationStatus::Reconnected);
        assert_eq!(settled.quic.status, MigrationStatus::Normal);
        assert_eq!(settled.quic.connection_id, ConnectionId(0xDEAD_BEEF));
    }

    #[test]
    fn same_zone_is_a_no_op() {
        let change = change_zone(&start(), Zone::Wifi);
        assert!(!change.changed);
        assert_eq!(change.state, start());
    }

    #[test]
    fn recover_without_change_keeps_state() {
        assert_eq!(recover(&start()), start());
    }

    #[test]
    fn status_at_switches_at_the_delay() {
        let before = status_at(&start(), Zone::Ethernet, 1_999, 2_000);
        assert_eq!(before.tcp.status, MigrationStatus::Disrupted);

        let after = status_at(&start(), Zone::Ethernet, 2_000, 2_000);
        assert_eq!(after.tcp.status, MigrationStatus::Reconnected);
    }

    #[test]
    fn recovery_delay_resolution() {
        let p = Preset::Average.profile();
        assert_eq!(RecoveryDelay::default().resolve(&p), 2_000);
        assert_eq!(RecoveryDelay::PerLatency { factor: 20.0 }.resolve(&p), 2_000);
        assert_eq!(RecoveryDelay::PerLatency { factor: -1.0 }.resolve(&p), 0);
    }

    fn zone() -> impl Strategy<Value = Zone> {
        prop_oneof![Just(Zone::Wifi), Just(Zone::Cellular), Just(Zone::Ethernet)]
    }

    proptest! {
        #[test]
        fn prop_quic_never_disconnects(
            id in any::<u64>(),
            moves in prop::collection::vec((zone(), any::<bool>()), 0..32)
        ) {
            let mut state = MigrationState::new(Zone::Wifi, ConnectionId(id));
            for (zone, settle) in moves {
                state = change_zone(&state, zone).state;
                prop_assert!(state.quic.connected);
                if settle {
                    state = recover(&state);
                }
                prop_assert!(state.quic.connected);
                prop_assert_eq!(state.quic.connection_id, ConnectionId(id));
                let disrupted = state.tcp.status == MigrationStatus::Disrupted;
                prop_assert_eq!(state.tcp.connected, !disrupted);
            }
        }
    }
}
