//! Fuzz target for the [`Engine`] command state machine
//!
//! # Strategy
//!
//! - Arbitrary network conditions, including zero latency and total loss
//! - Arbitrary command sequences, including out-of-range positions, speeds
//!   and benchmark parameters
//! - Time advances interleaved with commands so timers fire mid-sequence
//!
//! # Invariants
//!
//! - NEVER panic on any command
//! - A rejected command leaves the snapshot unchanged
//! - Virtual time never decreases
//! - The multiplexed stream set holds at most 10 streams with ids 1..=n
//! - Protocol B stays connected and keeps its connection id across zone
//!   changes
//! - Timeline position stays within 0..=100
//! - A run never holds more samples than its duration allows

#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use tvilling_core::{benchmark::SAMPLE_INTERVAL_MS, stream::MAX_STREAMS};
use tvilling_engine::{Command, Engine, EngineConfig};
use tvilling_harness::{Operation, SimEnv, model::operation::demo};
use tvilling_proto::{DemoKind, NetworkProfile, Protocol};

#[derive(Debug, Clone, Arbitrary)]
struct FuzzInput {
    seed: u64,
    latency_ms: u16,
    loss_percent: u8,
    bandwidth_mbps: u16,
    operations: Vec<Operation>,
}

fuzz_target!(|input: FuzzInput| {
    let mut engine = match Engine::new(SimEnv::with_seed(input.seed), EngineConfig::default()) {
        Ok(engine) => engine,
        Err(_) => return,
    };

    if let Ok(profile) = NetworkProfile::new(
        f64::from(input.latency_ms),
        f64::from(input.loss_percent.min(100)),
        f64::from(input.bandwidth_mbps.max(1)),
    ) {
        assert!(engine.handle(Command::SetNetworkProfile(profile)).is_ok());
    }

    let mut connection_id = engine.migration().quic.connection_id;

    for op in &input.operations {
        let before = engine.snapshot();
        let leaving_migration =
            matches!(op, Operation::SwitchDemo { .. }) && engine.demo() == DemoKind::Migration;

        if engine.handle(op.to_command()).is_err() {
            assert_eq!(engine.snapshot(), before, "rejected {op:?} changed state");
        }

        assert!(engine.now_ms() >= before.now_ms);

        let quic = engine.streams(Protocol::Quic);
        assert!(quic.len() <= MAX_STREAMS);
        for (i, stream) in quic.streams().iter().enumerate() {
            assert_eq!(usize::from(stream.id.0), i + 1);
        }

        let migration = engine.migration();
        assert!(migration.quic.connected);
        let reset = leaving_migration
            || matches!(op, Operation::ResetDemo { index } if demo(*index) == DemoKind::Migration);
        if !reset {
            assert_eq!(migration.quic.connection_id, connection_id);
        }
        connection_id = migration.quic.connection_id;

        let position = engine.timeline().position;
        assert!((0.0..=100.0).contains(&position));

        if let Some(run) = engine.benchmark() {
            assert!(run.samples.len() as u64 <= run.duration_ms / SAMPLE_INTERVAL_MS);
        }
    }
});
