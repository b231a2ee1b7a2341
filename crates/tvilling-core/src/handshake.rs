//! Handshake simulator.
//!
//! Turns a protocol and a network profile into a step table, and evaluates
//! the handshake at any virtual instant. Every step of protocol A costs one
//! latency; protocol B costs one latency for each of its first two steps
//! and half a latency for the final 1-RTT data step.
//!
//! # Invariants
//!
//! - `evaluate` is a pure function of `(protocol, elapsed_ms, profile)`
//! - Applying [`step`] `k` times from the initial state equals evaluating at
//!   the completion offset of step `k`
//! - Step offsets are cumulative and never decrease

use tvilling_proto::{
    EndpointState, Endpoints, HandshakeState, HandshakeStep, NetworkProfile, Protocol, StepKind,
};

/// Duration of one step under `latency_ms`.
fn step_duration(kind: StepKind, latency_ms: f64) -> f64 {
    match kind {
        StepKind::OneRttData => latency_ms / 2.0,
        _ => latency_ms,
    }
}

/// The step table for `protocol` under `profile`.
pub fn steps(protocol: Protocol, profile: &NetworkProfile) -> Vec<HandshakeStep> {
    let latency = profile.latency_ms();
    let mut offset_ms = 0.0;

    protocol
        .handshake_steps()
        .iter()
        .enumerate()
        .map(|(index, &kind)| {
            let duration_ms = step_duration(kind, latency);
            let step = HandshakeStep { index, kind, duration_ms, offset_ms };
            offset_ms += duration_ms;
            step
        })
        .collect()
}

/// Time until the handshake of `protocol` is complete.
pub fn total_duration_ms(protocol: Protocol, profile: &NetworkProfile) -> f64 {
    steps(protocol, profile).last().map_or(0.0, HandshakeStep::completes_at_ms)
}

/// Endpoint states once `completed` steps of `protocol` have finished.
pub const fn endpoints_after(protocol: Protocol, completed: usize) -> Endpoints {
    use EndpointState::{
        Established, Handshake, Idle, Initial, Ready, SynReceived, SynSent, TlsHello,
    };

    let (client, server) = match protocol {
        Protocol::TcpTls => match completed {
            0 => (Idle, Idle),
            1 => (SynSent, Idle),
            2 => (SynSent, SynReceived),
            3 => (Established, Established),
            4 => (TlsHello, Established),
            5 => (TlsHello, TlsHello),
            _ => (Ready, Ready),
        },
        Protocol::Quic => match completed {
            0 => (Idle, Idle),
            1 => (Initial, Initial),
            2 => (Handshake, Handshake),
            _ => (Ready, Ready),
        },
    };

    Endpoints { client, server }
}

/// State after the first `completed` entries of `table`.
fn state_after(protocol: Protocol, table: &[HandshakeStep], completed: usize) -> HandshakeState {
    let completed = completed.min(table.len());
    let rtt_ms = completed
        .checked_sub(1)
        .and_then(|i| table.get(i))
        .map_or(0.0, HandshakeStep::completes_at_ms);

    let endpoints = endpoints_after(protocol, completed);
    HandshakeState { protocol, completed_steps: completed, rtt_ms, endpoints }
}

/// Handshake state of `protocol` after `elapsed_ms` of virtual time.
///
/// A step counts as completed once `elapsed_ms` reaches its completion
/// offset. Negative or NaN elapsed time evaluates to the initial state.
pub fn evaluate(protocol: Protocol, elapsed_ms: f64, profile: &NetworkProfile) -> HandshakeState {
    let table = steps(protocol, profile);
    let completed = table.iter().take_while(|s| s.completes_at_ms() <= elapsed_ms).count();
    state_after(protocol, &table, completed)
}

/// Advance `from` by exactly one step.
///
/// Stepping a complete handshake returns it unchanged.
pub fn step(from: &HandshakeState, profile: &NetworkProfile) -> HandshakeState {
    let table = steps(from.protocol, profile);
    if from.completed_steps >= table.len() {
        return *from;
    }
    state_after(from.protocol, &table, from.completed_steps + 1)
}

/// The step that follows `state`, if any.
pub fn next_step(state: &HandshakeState, profile: &NetworkProfile) -> Option<HandshakeStep> {
    steps(state.protocol, profile).get(state.completed_steps).copied()
}
