//! End-to-end scenarios with oracle checks.
//!
//! Each test drives a fresh engine through one user-visible story and checks
//! the resulting world.

use tvilling_core::stream::throughput;
use tvilling_engine::{Command, EngineError, EngineEvent};
use tvilling_harness::Scenario;
use tvilling_proto::{
    DemoKind, MigrationStatus, NetworkProfile, Preset, Protocol, RunStatus, StreamStatus, Zone,
};

#[test]
fn average_preset_throughput() {
    let world = Scenario::new()
        .command(Command::ApplyPreset(Preset::Average))
        .run()
        .expect("scenario must build");

    let profile = world.engine().profile();
    assert_eq!(throughput(Protocol::TcpTls, profile), 36.0);
    assert_eq!(throughput(Protocol::Quic, profile), 45.125);
}

#[test]
fn handshakes_complete_after_their_round_trips() {
    let latency = 80.0;
    let profile = NetworkProfile::default().with_latency(latency).expect("latency in range");

    let world = Scenario::new()
        .with_profile(profile)
        .command(Command::StartHandshake(Protocol::TcpTls))
        .command(Command::StartHandshake(Protocol::Quic))
        .advance(199)
        .oracle(Box::new(|world| {
            if world.engine().handshake(Protocol::Quic).is_complete() {
                return Err("QUIC finished before 2.5 round trips".into());
            }
            Ok(())
        }))
        .run()
        .expect("oracle must pass");
    assert_eq!(world.engine().handshake(Protocol::Quic).completed_steps, 2);

    let world = Scenario::new()
        .with_profile(profile)
        .command(Command::StartHandshake(Protocol::TcpTls))
        .command(Command::StartHandshake(Protocol::Quic))
        .advance(200)
        .run()
        .expect("scenario must build");
    let quic = world.engine().handshake(Protocol::Quic);
    assert!(quic.is_complete());
    assert_eq!(quic.rtt_ms, 2.5 * latency);
    assert!(!world.engine().handshake(Protocol::TcpTls).is_complete());

    let world = Scenario::new()
        .with_profile(profile)
        .command(Command::StartHandshake(Protocol::TcpTls))
        .advance(480)
        .run()
        .expect("scenario must build");
    let tcp = world.engine().handshake(Protocol::TcpTls);
    assert!(tcp.is_complete());
    assert_eq!(tcp.rtt_ms, 6.0 * latency);
    assert!(tcp.endpoints.is_ready());
}

#[test]
fn zone_change_disrupts_tcp_and_keeps_quic() {
    let world = Scenario::new()
        .command(Command::SwitchDemo(DemoKind::Migration))
        .command(Command::ChangeZone(Zone::Cellular))
        .run()
        .expect("scenario must build");

    let migration = world.engine().migration();
    assert_eq!(migration.current_zone, Zone::Cellular);
    assert!(!migration.tcp.connected);
    assert_eq!(migration.tcp.status, MigrationStatus::Disrupted);
    assert!(migration.quic.connected);
    assert_eq!(migration.quic.status, MigrationStatus::Migrating);
}

#[test]
fn zone_change_settles_with_stable_connection_id() {
    let before = Scenario::new().with_seed(42).run().expect("scenario must build");
    let id = before.engine().migration().quic.connection_id;

    let world = Scenario::new()
        .with_seed(42)
        .command(Command::ChangeZone(Zone::Cellular))
        .advance(2_000)
        .run()
        .expect("scenario must build");

    let migration = world.engine().migration();
    assert!(migration.tcp.connected);
    assert_eq!(migration.tcp.status, MigrationStatus::Reconnected);
    assert_eq!(migration.quic.status, MigrationStatus::Normal);
    assert_eq!(migration.quic.connection_id, id);
}

#[test]
fn changing_to_the_current_zone_is_a_no_op() {
    let world = Scenario::new()
        .command(Command::ChangeZone(Zone::Wifi))
        .run()
        .expect("scenario must build");

    let migration = world.engine().migration();
    assert!(migration.tcp.connected);
    assert_eq!(migration.tcp.status, MigrationStatus::Normal);
    assert!(world.rejected().is_empty());
}

#[test]
fn eleventh_stream_is_rejected() {
    let world = Scenario::new()
        .commands(std::iter::repeat_n(Command::AddStream, 7))
        .run()
        .expect("scenario must build");

    assert_eq!(world.engine().streams(Protocol::Quic).len(), 10);
    assert_eq!(world.rejected().len(), 1);
    let (index, error) = &world.rejected()[0];
    assert_eq!(*index, 6);
    assert!(matches!(
        error,
        EngineError::Sim(tvilling_core::SimError::CapacityExceeded { limit: 10 })
    ));
}

#[test]
fn lossless_burst_delivers_everything() {
    let profile = NetworkProfile::default().with_loss_rate(0.0).expect("loss in range");
    let world = Scenario::new()
        .with_profile(profile)
        .command(Command::SendBurst { seed: Some(9) })
        .run()
        .expect("scenario must build");

    let tcp = world.engine().streams(Protocol::TcpTls);
    assert!(tcp.streams().iter().all(|s| s.status == StreamStatus::Active));
    assert_eq!(tcp.streams()[0].delivered(), 5);

    let quic = world.engine().streams(Protocol::Quic);
    assert!(quic.streams().iter().all(|s| s.status == StreamStatus::Active && s.delivered() >= 1));
}

#[test]
fn total_loss_blocks_tcp_but_only_touches_each_quic_stream() {
    let profile = NetworkProfile::default().with_loss_rate(100.0).expect("loss in range");
    let world = Scenario::new()
        .with_profile(profile)
        .command(Command::SendBurst { seed: Some(3) })
        .advance(1_000)
        .run()
        .expect("scenario must build");

    let recovered = world
        .events()
        .iter()
        .filter(|e| matches!(e, EngineEvent::StreamRecovered { .. }))
        .count();
    assert_eq!(recovered, 1 + 4);
    let tcp = world.engine().streams(Protocol::TcpTls);
    assert!(tcp.streams().iter().all(|s| s.status == StreamStatus::Active));
}

#[test]
fn benchmark_stops_early_with_partial_samples() {
    let world = Scenario::new()
        .command(Command::SwitchDemo(DemoKind::Performance))
        .command(Command::StartBenchmark { duration_ms: 5_000, connection_count: 3 })
        .advance(1_250)
        .command(Command::StopBenchmark)
        .command(Command::StopBenchmark)
        .run()
        .expect("scenario must build");

    let run = world.engine().benchmark().expect("run recorded");
    assert_eq!(run.status, RunStatus::Stopped);
    assert_eq!(run.samples.len(), 12);
    assert_eq!(run.connection_count, 3);
    assert_eq!(world.rejected().len(), 1);

    let summary = run.summary().expect("samples recorded");
    assert!(summary.quic.throughput_mbps > summary.tcp.throughput_mbps);
}

#[test]
fn leaving_performance_discards_the_run() {
    let world = Scenario::new()
        .command(Command::SwitchDemo(DemoKind::Performance))
        .command(Command::StartBenchmark { duration_ms: 1_000, connection_count: 1 })
        .command(Command::SwitchDemo(DemoKind::Handshake))
        .advance(2_000)
        .run()
        .expect("scenario must build");

    assert!(world.engine().benchmark().is_none());
    assert!(!world.events().iter().any(|e| matches!(e, EngineEvent::BenchmarkSample { .. })));
}

#[test]
fn invalid_profile_never_reaches_the_engine() {
    assert!(NetworkProfile::default().with_latency(-1.0).is_err());
    assert!(NetworkProfile::default().with_loss_rate(100.5).is_err());
}
