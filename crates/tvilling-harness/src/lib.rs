//! Deterministic simulation harness for tvilling.
//!
//! Provides a seeded, manually clocked implementation of the `Environment`
//! trait, a scenario builder with oracle checks, and a reference model for
//! model-based testing of the engine.
//!
//! # Model-Based Testing
//!
//! The `model` module provides a reference implementation. Operations are
//! applied to both the model and the real engine, and their observable
//! states are compared after every step.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod model;
pub mod scenario;
pub mod sim_env;

pub use model::{ModelWorld, ObservableState, Operation, OperationError, OperationResult};
pub use scenario::{Oracle, Scenario, ScenarioError, ScenarioWorld};
pub use sim_env::{SimEnv, SimInstant};

use tvilling_engine::Engine;
use tvilling_proto::Protocol;

/// Observable state of a real engine, in the shape the model reports.
pub fn observe(engine: &Engine<SimEnv>) -> ObservableState {
    let timeline = engine.timeline();
    let migration = engine.migration();

    ObservableState {
        now_ms: engine.now_ms(),
        demo: engine.demo(),
        handshake_steps: [
            engine.handshake(Protocol::TcpTls).completed_steps,
            engine.handshake(Protocol::Quic).completed_steps,
        ],
        quic_streams: engine.streams(Protocol::Quic).len(),
        zone: migration.current_zone,
        tcp_connected: migration.tcp.connected,
        quic_connected: migration.quic.connected,
        benchmark_running: engine.benchmark().is_some_and(|run| run.is_running()),
        benchmark_samples: engine.benchmark().map(|run| run.samples.len()),
        timeline_position: timeline.position,
        playing: timeline.playing,
    }
}
