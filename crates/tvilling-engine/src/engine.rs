//! Engine state machine.
//!
//! The `Engine` owns every demo's state, the virtual clock and the timer
//! queue. Commands go in through [`Engine::handle`] and snapshots come back
//! as [`EngineEvent`]s. It never sleeps and never reads the wall clock:
//! time only moves when the caller sends [`Command::Advance`].
//!
//! # Timers
//!
//! Everything that happens "later" (handshake steps, stream recovery,
//! migration settling, timeline ticks, benchmark samples) is a keyed entry
//! in one [`TimerQueue`]. Rescheduling a key replaces its deadline, and
//! resetting or leaving a demo cancels every key that demo owns, so a stale
//! callback can never touch fresh state.
//!
//! # Invariants
//!
//! - `now_ms` never decreases
//! - A command that returns `Err` leaves all state untouched
//! - Timers fire in deadline order, each with `now_ms` set to its deadline

use tracing::{debug, info, warn};
use tvilling_core::{
    BenchmarkEngine, Environment, StreamSet, TimelineController, TimelineSnapshot, TimerQueue,
    handshake, migration, rng, stream,
};
use tvilling_proto::{
    BenchmarkRun, ConnectionId, DemoKind, HandshakeState, MigrationState, NetworkProfile, Preset,
    Protocol, StreamId, Zone,
};

use crate::{
    config::EngineConfig,
    error::EngineError,
    event::{Command, EngineEvent, LogLevel, StreamsSnapshot, TimerKey},
};

/// One value per protocol.
#[derive(Debug, Clone, PartialEq)]
struct PerProtocol<T> {
    tcp: T,
    quic: T,
}

impl<T> PerProtocol<T> {
    fn new(mut make: impl FnMut(Protocol) -> T) -> Self {
        Self { tcp: make(Protocol::TcpTls), quic: make(Protocol::Quic) }
    }

    const fn get(&self, protocol: Protocol) -> &T {
        match protocol {
            Protocol::TcpTls => &self.tcp,
            Protocol::Quic => &self.quic,
        }
    }

    const fn get_mut(&mut self, protocol: Protocol) -> &mut T {
        match protocol {
            Protocol::TcpTls => &mut self.tcp,
            Protocol::Quic => &mut self.quic,
        }
    }
}

/// Handshake of one protocol and when its automatic run started.
#[derive(Debug, Clone, Copy, PartialEq)]
struct HandshakeRun {
    state: HandshakeState,
    started_at_ms: Option<u64>,
}

impl HandshakeRun {
    const fn idle(protocol: Protocol) -> Self {
        Self { state: HandshakeState::initial(protocol), started_at_ms: None }
    }
}

/// Everything observable about an engine at one instant.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineSnapshot {
    /// Virtual time.
    pub now_ms: u64,
    /// Current network conditions.
    pub profile: NetworkProfile,
    /// Shown demo.
    pub demo: DemoKind,
    /// Protocol A handshake.
    pub tcp_handshake: HandshakeState,
    /// Protocol B handshake.
    pub quic_handshake: HandshakeState,
    /// Stream sets.
    pub streams: StreamsSnapshot,
    /// Migration state.
    pub migration: MigrationState,
    /// Current or last benchmark run.
    pub benchmark: Option<BenchmarkRun>,
    /// Timeline at its current position.
    pub timeline: TimelineSnapshot,
    /// Number of pending timers.
    pub pending_timers: usize,
}

/// Command engine.
///
/// Pure state machine: returns events, the caller renders them and decides
/// when virtual time advances.
///
/// # Type Parameters
///
/// - `E`: Environment implementation supplying seeds
pub struct Engine<E: Environment> {
    env: E,
    config: EngineConfig,
    profile: NetworkProfile,
    demo: DemoKind,
    now_ms: u64,
    timers: TimerQueue<TimerKey>,
    handshakes: PerProtocol<HandshakeRun>,
    streams: PerProtocol<StreamSet>,
    migration: MigrationState,
    benchmark: BenchmarkEngine,
    timeline: TimelineController,
}

impl<E: Environment> Engine<E> {
    /// Create an engine at virtual time 0 with the default profile.
    ///
    /// # Errors
    ///
    /// - `InvalidConfig` if `config` does not validate
    pub fn new(env: E, config: EngineConfig) -> Result<Self, EngineError> {
        config.validate()?;

        let streams = fresh_streams(&config)?;
        let migration = MigrationState::new(config.initial_zone, ConnectionId(env.random_u64()));
        let timeline = TimelineController::new(config.timeline_increment);

        Ok(Self {
            env,
            config,
            profile: NetworkProfile::default(),
            demo: DemoKind::default(),
            now_ms: 0,
            timers: TimerQueue::new(),
            handshakes: PerProtocol::new(HandshakeRun::idle),
            streams,
            migration,
            benchmark: BenchmarkEngine::new(),
            timeline,
        })
    }

    /// Current virtual time.
    pub const fn now_ms(&self) -> u64 {
        self.now_ms
    }

    /// Current network conditions.
    pub const fn profile(&self) -> &NetworkProfile {
        &self.profile
    }

    /// Shown demo.
    pub const fn demo(&self) -> DemoKind {
        self.demo
    }

    /// Engine configuration.
    pub const fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Handshake state of `protocol`.
    pub const fn handshake(&self, protocol: Protocol) -> &HandshakeState {
        &self.handshakes.get(protocol).state
    }

    /// Stream set of `protocol`.
    pub const fn streams(&self, protocol: Protocol) -> &StreamSet {
        self.streams.get(protocol)
    }

    /// Migration state.
    pub const fn migration(&self) -> &MigrationState {
        &self.migration
    }

    /// Current or last benchmark run.
    pub const fn benchmark(&self) -> Option<&BenchmarkRun> {
        self.benchmark.run()
    }

    /// Timeline at its current position.
    pub fn timeline(&self) -> TimelineSnapshot {
        self.timeline.snapshot(&self.profile)
    }

    /// Deadline of the pending timer `key`.
    pub fn timer_deadline(&self, key: TimerKey) -> Option<u64> {
        self.timers.deadline(key)
    }

    /// Capture all observable state.
    pub fn snapshot(&self) -> EngineSnapshot {
        EngineSnapshot {
            now_ms: self.now_ms,
            profile: self.profile,
            demo: self.demo,
            tcp_handshake: self.handshakes.tcp.state,
            quic_handshake: self.handshakes.quic.state,
            streams: self.streams_snapshot(),
            migration: self.migration,
            benchmark: self.benchmark.run().cloned(),
            timeline: self.timeline(),
            pending_timers: self.timers.len(),
        }
    }

    /// Process a command and return resulting events.
    ///
    /// # Errors
    ///
    /// Returns `EngineError` if the command is rejected; state is unchanged.
    pub fn handle(&mut self, command: Command) -> Result<Vec<EngineEvent>, EngineError> {
        let result = match command {
            Command::SetNetworkProfile(profile) => Ok(self.handle_set_profile(profile)),
            Command::ApplyPreset(preset) => Ok(self.handle_set_profile(preset.profile())),
            Command::SwitchDemo(demo) => Ok(self.handle_switch_demo(demo)),
            Command::StartHandshake(protocol) => Ok(self.handle_start_handshake(protocol)),
            Command::StepHandshake(protocol) => Ok(self.handle_step_handshake(protocol)),
            Command::ResetDemo(demo) => Ok(self.reset(demo)),
            Command::AddStream => self.handle_add_stream(),
            Command::SendBurst { seed } => Ok(self.handle_send_burst(seed)),
            Command::ChangeZone(zone) => Ok(self.handle_change_zone(zone)),
            Command::StartBenchmark { duration_ms, connection_count } => {
                self.handle_start_benchmark(duration_ms, connection_count)
            },
            Command::StopBenchmark => self.handle_stop_benchmark(),
            Command::Seek(position) => self.handle_seek(position),
            Command::Play => Ok(self.handle_play()),
            Command::Pause => Ok(self.handle_pause()),
            Command::ResetTimeline => Ok(self.handle_reset_timeline()),
            Command::SetSpeed(speed) => self.handle_set_speed(speed),
            Command::Advance { elapsed_ms } => Ok(self.handle_advance(elapsed_ms)),
        };

        if let Err(error) = &result {
            warn!(%error, "command rejected");
        }
        result
    }

    /// Replace the network conditions.
    pub fn set_network_profile(
        &mut self,
        profile: NetworkProfile,
    ) -> Result<Vec<EngineEvent>, EngineError> {
        self.handle(Command::SetNetworkProfile(profile))
    }

    /// Apply the preset called `name`.
    pub fn apply_preset(&mut self, name: &str) -> Result<Vec<EngineEvent>, EngineError> {
        let preset: Preset = name.parse()?;
        self.handle(Command::ApplyPreset(preset))
    }

    /// Show the demo called `name`.
    pub fn switch_demo(&mut self, name: &str) -> Result<Vec<EngineEvent>, EngineError> {
        let demo: DemoKind = name.parse()?;
        self.handle(Command::SwitchDemo(demo))
    }

    /// Start the automatic handshake of `protocol`.
    pub fn start_handshake(&mut self, protocol: Protocol) -> Result<Vec<EngineEvent>, EngineError> {
        self.handle(Command::StartHandshake(protocol))
    }

    /// Complete the next handshake step of `protocol`.
    pub fn step_handshake(&mut self, protocol: Protocol) -> Result<Vec<EngineEvent>, EngineError> {
        self.handle(Command::StepHandshake(protocol))
    }

    /// Reset the demo called `name`.
    pub fn reset_demo(&mut self, name: &str) -> Result<Vec<EngineEvent>, EngineError> {
        let demo: DemoKind = name.parse()?;
        self.handle(Command::ResetDemo(demo))
    }

    /// Open one more multiplexed stream.
    pub fn add_stream(&mut self) -> Result<Vec<EngineEvent>, EngineError> {
        self.handle(Command::AddStream)
    }

    /// Send one burst on both connections.
    pub fn send_burst(&mut self, seed: Option<u64>) -> Result<Vec<EngineEvent>, EngineError> {
        self.handle(Command::SendBurst { seed })
    }

    /// Move to the zone with id `zone_id`.
    pub fn change_zone(&mut self, zone_id: &str) -> Result<Vec<EngineEvent>, EngineError> {
        let zone: Zone = zone_id.parse()?;
        self.handle(Command::ChangeZone(zone))
    }

    /// Start a benchmark run.
    pub fn start_benchmark(
        &mut self,
        duration_ms: u64,
        connection_count: u32,
    ) -> Result<Vec<EngineEvent>, EngineError> {
        self.handle(Command::StartBenchmark { duration_ms, connection_count })
    }

    /// Stop the running benchmark.
    pub fn stop_benchmark(&mut self) -> Result<Vec<EngineEvent>, EngineError> {
        self.handle(Command::StopBenchmark)
    }

    /// Move the timeline.
    pub fn seek(&mut self, position: f64) -> Result<Vec<EngineEvent>, EngineError> {
        self.handle(Command::Seek(position))
    }

    /// Start timeline playback.
    pub fn play(&mut self) -> Result<Vec<EngineEvent>, EngineError> {
        self.handle(Command::Play)
    }

    /// Pause timeline playback.
    pub fn pause(&mut self) -> Result<Vec<EngineEvent>, EngineError> {
        self.handle(Command::Pause)
    }

    /// Pause and rewind the timeline.
    pub fn reset_timeline(&mut self) -> Result<Vec<EngineEvent>, EngineError> {
        self.handle(Command::ResetTimeline)
    }

    /// Change the animation speed.
    pub fn set_speed(&mut self, speed: f64) -> Result<Vec<EngineEvent>, EngineError> {
        self.handle(Command::SetSpeed(speed))
    }

    /// Let virtual time pass.
    pub fn advance(&mut self, elapsed_ms: u64) -> Result<Vec<EngineEvent>, EngineError> {
        self.handle(Command::Advance { elapsed_ms })
    }

    fn streams_snapshot(&self) -> StreamsSnapshot {
        StreamsSnapshot { tcp: self.streams.tcp.clone(), quic: self.streams.quic.clone() }
    }

    fn handle_set_profile(&mut self, profile: NetworkProfile) -> Vec<EngineEvent> {
        self.profile = profile;
        info!(%profile, "network profile changed");

        vec![
            EngineEvent::Profile(profile),
            EngineEvent::Timeline(self.timeline()),
            EngineEvent::info(format!("Network: {profile}")),
        ]
    }

    fn handle_switch_demo(&mut self, demo: DemoKind) -> Vec<EngineEvent> {
        if demo == self.demo {
            return vec![EngineEvent::DemoChanged(demo)];
        }

        let leaving = self.demo;
        let mut events = self.reset(leaving);
        self.demo = demo;
        info!(from = %leaving, to = %demo, "demo switched");

        events.push(EngineEvent::DemoChanged(demo));
        events
    }

    fn handle_start_handshake(&mut self, protocol: Protocol) -> Vec<EngineEvent> {
        let run = self.handshakes.get_mut(protocol);
        let state = HandshakeState::initial(protocol);
        *run = HandshakeRun { state, started_at_ms: Some(self.now_ms) };

        self.schedule_next_step(protocol);
        info!(%protocol, "handshake started");

        vec![
            EngineEvent::Handshake(state),
            EngineEvent::info(format!("{protocol} handshake started")),
        ]
    }

    fn handle_step_handshake(&mut self, protocol: Protocol) -> Vec<EngineEvent> {
        self.timers.cancel(TimerKey::HandshakeStep(protocol));

        let profile = self.profile;
        let run = self.handshakes.get_mut(protocol);
        run.started_at_ms = None;

        if run.state.is_complete() {
            return vec![
                EngineEvent::Handshake(run.state),
                EngineEvent::debug(format!("{protocol} handshake already complete")),
            ];
        }

        run.state = handshake::step(&run.state, &profile);
        let state = run.state;
        vec![EngineEvent::Handshake(state), step_log(&state)]
    }

    fn handle_add_stream(&mut self) -> Result<Vec<EngineEvent>, EngineError> {
        let next = stream::add_stream(&self.streams.quic)?;
        self.streams.quic = next;

        let count = self.streams.quic.len();
        debug!(count, "stream added");
        Ok(vec![
            EngineEvent::Streams(self.streams_snapshot()),
            EngineEvent::info(format!("Opened stream {count}")),
        ])
    }

    fn handle_send_burst(&mut self, seed: Option<u64>) -> Vec<EngineEvent> {
        let seed = seed.unwrap_or_else(|| self.env.random_u64());
        let recover_at = self.now_ms.saturating_add(self.config.stream_recovery_ms);
        let mut events = Vec::new();

        for (index, protocol) in (0u64..).zip(Protocol::ALL) {
            let current = self.streams.get(protocol);
            let loss_seed = rng::derive(seed, index);
            let (next, report) = stream::deliver_burst(current, &self.profile, loss_seed);
            *self.streams.get_mut(protocol) = next;

            for id in &report.impaired {
                self.timers.schedule(TimerKey::StreamRecovery(protocol, *id), recover_at);
            }

            debug!(%protocol, sent = report.sent, lost = report.lost, "burst delivered");
            if report.lost > 0 {
                events.push(EngineEvent::warn(format!(
                    "{protocol}: {} of {} packets lost on {} stream(s)",
                    report.lost,
                    report.sent,
                    report.impaired.len()
                )));
            }
        }

        events.insert(0, EngineEvent::Streams(self.streams_snapshot()));
        events
    }

    fn handle_change_zone(&mut self, zone: Zone) -> Vec<EngineEvent> {
        let change = migration::change_zone(&self.migration, zone);
        if !change.changed {
            return vec![
                EngineEvent::Migration(self.migration),
                EngineEvent::debug(format!("Already on {zone}")),
            ];
        }

        self.migration = change.state;
        let delay = self.config.migration_recovery.resolve(&self.profile);
        self.timers.schedule(TimerKey::MigrationRecovery, self.now_ms.saturating_add(delay));
        info!(from = %change.from, to = %zone, delay_ms = delay, "zone changed");

        vec![
            EngineEvent::Migration(self.migration),
            EngineEvent::warn(format!(
                "{}: connection lost moving {} -> {zone}",
                Protocol::TcpTls,
                change.from
            )),
            EngineEvent::info(format!(
                "{}: migrating path, connection {} kept",
                Protocol::Quic,
                self.migration.quic.connection_id
            )),
        ]
    }

    fn handle_start_benchmark(
        &mut self,
        duration_ms: u64,
        connection_count: u32,
    ) -> Result<Vec<EngineEvent>, EngineError> {
        self.benchmark.validate_start(connection_count, duration_ms)?;
        let seed = self.env.random_u64();
        let run = self
            .benchmark
            .start(self.profile, connection_count, duration_ms, seed, self.now_ms)?;

        if let Some(at) = self.benchmark.next_sample_at() {
            self.timers.schedule(TimerKey::BenchmarkTick, at);
        }

        Ok(vec![
            EngineEvent::BenchmarkStarted { run },
            EngineEvent::info(format!(
                "Benchmark {} started: {connection_count} connection(s) for {duration_ms} ms",
                run.0
            )),
        ])
    }

    fn handle_stop_benchmark(&mut self) -> Result<Vec<EngineEvent>, EngineError> {
        let run = self.benchmark.stop(self.now_ms)?.clone();
        self.timers.cancel(TimerKey::BenchmarkTick);

        Ok(vec![
            EngineEvent::info(format!(
                "Benchmark {} stopped after {} sample(s)",
                run.id.0,
                run.samples.len()
            )),
            EngineEvent::BenchmarkFinished(run),
        ])
    }

    fn handle_seek(&mut self, position: f64) -> Result<Vec<EngineEvent>, EngineError> {
        let snapshot = self.timeline.seek(position, &self.profile)?;
        let mut events = vec![EngineEvent::Timeline(snapshot)];
        events.extend(self.follow_timeline(&snapshot));
        Ok(events)
    }

    fn handle_play(&mut self) -> Vec<EngineEvent> {
        if self.timeline.play() {
            let at = self.now_ms.saturating_add(self.config.timeline_tick_ms);
            self.timers.schedule(TimerKey::TimelineTick, at);
            debug!(position = self.timeline.position(), "timeline playing");
        }
        vec![EngineEvent::Timeline(self.timeline())]
    }

    fn handle_pause(&mut self) -> Vec<EngineEvent> {
        self.timeline.pause();
        self.timers.cancel(TimerKey::TimelineTick);
        vec![EngineEvent::Timeline(self.timeline())]
    }

    fn handle_reset_timeline(&mut self) -> Vec<EngineEvent> {
        self.timers.cancel(TimerKey::TimelineTick);
        let snapshot = self.timeline.reset(&self.profile);
        let mut events = vec![EngineEvent::Timeline(snapshot)];
        events.extend(self.follow_timeline(&snapshot));
        events
    }

    fn handle_set_speed(&mut self, speed: f64) -> Result<Vec<EngineEvent>, EngineError> {
        self.timeline.set_speed(speed)?;
        Ok(vec![EngineEvent::info(format!("Animation speed {speed}x"))])
    }

    fn handle_advance(&mut self, elapsed_ms: u64) -> Vec<EngineEvent> {
        let target = self.now_ms.saturating_add(elapsed_ms);
        let mut events = Vec::new();

        while let Some((deadline, key)) = self.timers.pop_due(target) {
            self.now_ms = self.now_ms.max(deadline);
            debug!(?key, now_ms = self.now_ms, "timer fired");
            events.extend(self.fire(key));
        }

        self.now_ms = target;
        events
    }

    fn fire(&mut self, key: TimerKey) -> Vec<EngineEvent> {
        match key {
            TimerKey::HandshakeStep(protocol) => self.fire_handshake_step(protocol),
            TimerKey::StreamRecovery(protocol, id) => self.fire_stream_recovery(protocol, id),
            TimerKey::MigrationRecovery => self.fire_migration_recovery(),
            TimerKey::TimelineTick => self.fire_timeline_tick(),
            TimerKey::BenchmarkTick => self.fire_benchmark_tick(),
        }
    }

    fn fire_handshake_step(&mut self, protocol: Protocol) -> Vec<EngineEvent> {
        let profile = self.profile;
        let run = self.handshakes.get_mut(protocol);
        run.state = handshake::step(&run.state, &profile);
        let state = run.state;

        if state.is_complete() {
            run.started_at_ms = None;
            info!(%protocol, rtt_ms = state.rtt_ms, "handshake complete");
        } else {
            self.schedule_next_step(protocol);
        }

        vec![EngineEvent::Handshake(state), step_log(&state)]
    }

    fn fire_stream_recovery(&mut self, protocol: Protocol, id: StreamId) -> Vec<EngineEvent> {
        let set = self.streams.get_mut(protocol);
        *set = stream::recover(set, id);
        debug!(%protocol, stream = %id, "stream recovered");

        vec![
            EngineEvent::StreamRecovered { protocol, stream: id },
            EngineEvent::Streams(self.streams_snapshot()),
        ]
    }

    fn fire_migration_recovery(&mut self) -> Vec<EngineEvent> {
        self.migration = migration::recover(&self.migration);
        info!(zone = %self.migration.current_zone, "migration settled");

        vec![
            EngineEvent::Migration(self.migration),
            EngineEvent::info(format!(
                "{}: reconnected; {}: path migrated",
                Protocol::TcpTls,
                Protocol::Quic
            )),
        ]
    }

    fn fire_timeline_tick(&mut self) -> Vec<EngineEvent> {
        let Some(snapshot) = self.timeline.tick(&self.profile) else {
            return Vec::new();
        };

        if snapshot.playing {
            let at = self.now_ms.saturating_add(self.config.timeline_tick_ms);
            self.timers.schedule(TimerKey::TimelineTick, at);
        }
        let mut events = vec![EngineEvent::Timeline(snapshot)];
        events.extend(self.follow_timeline(&snapshot));
        events
    }

    /// Put the shown handshakes where the timeline says they are.
    ///
    /// Only the handshake demo follows the timeline. Any automatic run is
    /// abandoned so no pending step can move the demo off the cursor.
    fn follow_timeline(&mut self, snapshot: &TimelineSnapshot) -> Vec<EngineEvent> {
        if self.demo != DemoKind::Handshake {
            return Vec::new();
        }

        let cancelled = self.timers.cancel_where(|key| matches!(key, TimerKey::HandshakeStep(_)));
        self.handshakes = PerProtocol {
            tcp: HandshakeRun { state: snapshot.tcp, started_at_ms: None },
            quic: HandshakeRun { state: snapshot.quic, started_at_ms: None },
        };
        debug!(position = snapshot.position, cancelled, "handshakes follow timeline");

        vec![EngineEvent::Handshake(snapshot.tcp), EngineEvent::Handshake(snapshot.quic)]
    }

    fn fire_benchmark_tick(&mut self) -> Vec<EngineEvent> {
        let samples = self.benchmark.advance_to(self.now_ms);
        let Some(run) = self.benchmark.run() else {
            return Vec::new();
        };

        let id = run.id;
        let mut events: Vec<_> = samples
            .into_iter()
            .map(|sample| EngineEvent::BenchmarkSample { run: id, sample })
            .collect();

        if run.is_running() {
            if let Some(at) = self.benchmark.next_sample_at() {
                self.timers.schedule(TimerKey::BenchmarkTick, at);
            }
        } else {
            events.push(EngineEvent::info(format!("Benchmark {} complete", id.0)));
            events.push(EngineEvent::BenchmarkFinished(run.clone()));
        }
        events
    }

    /// Schedule the automatic step after the current one, measured from the
    /// start of the run so rounding never accumulates.
    fn schedule_next_step(&mut self, protocol: Protocol) {
        let run = self.handshakes.get(protocol);
        let Some(started) = run.started_at_ms else {
            return;
        };

        if let Some(next) = handshake::next_step(&run.state, &self.profile) {
            let at = started.saturating_add(next.completes_at_ms().ceil() as u64);
            self.timers.schedule(TimerKey::HandshakeStep(protocol), at.max(self.now_ms));
        }
    }

    /// Return `demo` to its initial state and cancel its timers.
    fn reset(&mut self, demo: DemoKind) -> Vec<EngineEvent> {
        let cancelled = self.timers.cancel_where(|key| key.demo() == demo);
        debug!(%demo, cancelled, "demo reset");

        let mut events = match demo {
            DemoKind::Handshake => {
                self.handshakes = PerProtocol::new(HandshakeRun::idle);
                let timeline = self.timeline.reset(&self.profile);
                vec![
                    EngineEvent::Handshake(self.handshakes.tcp.state),
                    EngineEvent::Handshake(self.handshakes.quic.state),
                    EngineEvent::Timeline(timeline),
                ]
            },
            DemoKind::Streaming => {
                // Validated at construction, so the fallback is never taken.
                self.streams = fresh_streams(&self.config)
                    .unwrap_or_else(|_| PerProtocol::new(StreamSet::new));
                vec![EngineEvent::Streams(self.streams_snapshot())]
            },
            DemoKind::Migration => {
                let id = ConnectionId(self.env.random_u64());
                self.migration = MigrationState::new(self.config.initial_zone, id);
                vec![EngineEvent::Migration(self.migration)]
            },
            DemoKind::Performance => {
                self.benchmark.reset();
                Vec::new()
            },
        };

        events.push(EngineEvent::debug(format!("Reset {demo} demo")));
        events
    }
}

fn fresh_streams(config: &EngineConfig) -> Result<PerProtocol<StreamSet>, EngineError> {
    Ok(PerProtocol {
        tcp: StreamSet::new(Protocol::TcpTls),
        quic: StreamSet::with_streams(Protocol::Quic, config.initial_streams)?,
    })
}

fn step_log(state: &HandshakeState) -> EngineEvent {
    let label = state.last_step().map_or("start", |kind| kind.label());
    EngineEvent::Log {
        level: LogLevel::Debug,
        message: format!(
            "{}: {label} (step {}/{}, {:.1} ms)",
            state.protocol,
            state.completed_steps,
            state.protocol.handshake_steps().len(),
            state.rtt_ms
        ),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::{
        sync::{
            Arc,
            atomic::{AtomicU64, Ordering},
        },
        time::Duration,
    };

    use proptest::prelude::*;
    use tvilling_proto::{EndpointState, MigrationStatus, PacketOutcome, RunStatus, StreamStatus};

    use super::*;

    /// Counter-backed environment: each draw returns the next integer.
    #[derive(Clone, Default)]
    struct CountingEnv(Arc<AtomicU64>);

    impl Environment for CountingEnv {
        type Instant = Duration;

        fn now(&self) -> Duration {
            Duration::ZERO
        }

        fn sleep(&self, _duration: Duration) -> impl Future<Output = ()> + Send {
            std::future::ready(())
        }

        fn random_bytes(&self, buffer: &mut [u8]) {
            let n = self.0.fetch_add(1, Ordering::Relaxed).to_be_bytes();
            for (i, byte) in buffer.iter_mut().enumerate() {
                *byte = n[i % n.len()];
            }
        }
    }

    fn engine() -> Engine<CountingEnv> {
        Engine::new(CountingEnv::default(), EngineConfig::default()).unwrap()
    }

    #[test]
    fn automatic_handshake_steps_on_latency() {
        let mut engine = engine();
        engine.start_handshake(Protocol::TcpTls).unwrap();
        engine.start_handshake(Protocol::Quic).unwrap();

        engine.advance(99).unwrap();
        assert_eq!(engine.handshake(Protocol::TcpTls).completed_steps, 0);

        engine.advance(1).unwrap();
        assert_eq!(engine.handshake(Protocol::TcpTls).endpoints.client, EndpointState::SynSent);
        assert_eq!(engine.handshake(Protocol::Quic).endpoints.client, EndpointState::Initial);

        engine.advance(150).unwrap();
        assert!(engine.handshake(Protocol::Quic).is_complete());
        assert_eq!(engine.handshake(Protocol::TcpTls).completed_steps, 2);

        engine.advance(350).unwrap();
        assert!(engine.handshake(Protocol::TcpTls).is_complete());
        assert_eq!(engine.handshake(Protocol::TcpTls).rtt_ms, 600.0);
        assert_eq!(engine.snapshot().pending_timers, 0);
    }

    #[test]
    fn manual_step_stops_the_automatic_run() {
        let mut engine = engine();
        engine.start_handshake(Protocol::Quic).unwrap();
        engine.step_handshake(Protocol::Quic).unwrap();
        assert_eq!(engine.timer_deadline(TimerKey::HandshakeStep(Protocol::Quic)), None);

        engine.advance(10_000).unwrap();
        assert_eq!(engine.handshake(Protocol::Quic).completed_steps, 1);
    }

    #[test]
    fn streaming_starts_with_configured_streams() {
        let engine = engine();
        assert_eq!(engine.streams(Protocol::Quic).len(), 4);
        assert_eq!(engine.streams(Protocol::TcpTls).len(), 1);
    }

    #[test]
    fn eleventh_stream_is_rejected_without_change() {
        let mut engine = engine();
        for _ in 0..6 {
            engine.add_stream().unwrap();
        }
        let before = engine.snapshot();
        let err = engine.add_stream().unwrap_err();
        assert_eq!(err, EngineError::Sim(tvilling_core::SimError::CapacityExceeded { limit: 10 }));
        assert_eq!(engine.snapshot(), before);
    }

    #[test]
    fn lossy_burst_recovers_after_delay() {
        let mut engine = engine();
        let lossy = NetworkProfile::default().with_loss_rate(100.0).unwrap();
        engine.handle(Command::SetNetworkProfile(lossy)).unwrap();
        engine.send_burst(Some(5)).unwrap();

        let tcp = &engine.streams(Protocol::TcpTls).streams()[0];
        assert_eq!(tcp.status, StreamStatus::Blocked);
        let quic = engine.streams(Protocol::Quic).streams();
        assert!(quic.iter().all(|s| s.status == StreamStatus::Retransmitting));

        engine.advance(999).unwrap();
        assert_eq!(engine.streams(Protocol::TcpTls).streams()[0].status, StreamStatus::Blocked);

        let events = engine.advance(1).unwrap();
        assert!(events.iter().any(|e| matches!(e, EngineEvent::StreamRecovered { .. })));
        let tcp = &engine.streams(Protocol::TcpTls).streams()[0];
        assert_eq!(tcp.status, StreamStatus::Active);
        assert_eq!(tcp.count(PacketOutcome::Retransmitted), 5);
    }

    #[test]
    fn zone_change_settles_after_two_seconds() {
        let mut engine = engine();
        let id = engine.migration().quic.connection_id;
        engine.change_zone("cellular-zone").unwrap();
        assert_eq!(engine.migration().tcp.status, MigrationStatus::Disrupted);

        engine.advance(1_999).unwrap();
        assert!(!engine.migration().tcp.connected);

        engine.advance(1).unwrap();
        assert_eq!(engine.migration().tcp.status, MigrationStatus::Reconnected);
        assert_eq!(engine.migration().quic.status, MigrationStatus::Normal);
        assert_eq!(engine.migration().quic.connection_id, id);
    }

    #[test]
    fn second_zone_change_replaces_pending_recovery() {
        let mut engine = engine();
        engine.change_zone("cellular").unwrap();
        engine.advance(1_500).unwrap();
        engine.change_zone("ethernet").unwrap();

        engine.advance(600).unwrap();
        assert_eq!(
            engine.migration().tcp.status,
            MigrationStatus::Disrupted,
            "first recovery must not fire"
        );

        engine.advance(1_400).unwrap();
        assert_eq!(engine.migration().tcp.status, MigrationStatus::Reconnected);
    }

    #[test]
    fn unknown_zone_is_rejected() {
        let mut engine = engine();
        assert!(matches!(engine.change_zone("moon"), Err(EngineError::Proto(_))));
    }

    #[test]
    fn benchmark_runs_to_completion() {
        let mut engine = engine();
        engine.start_benchmark(1_000, 2).unwrap();
        assert!(engine.start_benchmark(1_000, 2).is_err());

        let events = engine.advance(1_000).unwrap();
        let samples =
            events.iter().filter(|e| matches!(e, EngineEvent::BenchmarkSample { .. })).count();
        assert_eq!(samples, 10);
        assert!(events.iter().any(|e| matches!(e, EngineEvent::BenchmarkFinished(_))));
        assert_eq!(engine.benchmark().unwrap().status, RunStatus::Completed);
        assert!(matches!(
            engine.stop_benchmark(),
            Err(EngineError::Sim(tvilling_core::SimError::NotRunning))
        ));
    }

    #[test]
    fn leaving_a_demo_cancels_its_timers() {
        let mut engine = engine();
        engine.change_zone("cellular").unwrap();
        engine.switch_demo("migration").unwrap();
        engine.switch_demo("streaming").unwrap();

        assert_eq!(engine.timer_deadline(TimerKey::MigrationRecovery), None);
        assert_eq!(engine.migration().current_zone, Zone::Wifi);
        assert_eq!(engine.demo(), DemoKind::Streaming);
    }

    #[test]
    fn timeline_plays_to_the_end() {
        let mut engine = engine();
        engine.play().unwrap();
        engine.advance(10_000).unwrap();

        let timeline = engine.timeline();
        assert_eq!(timeline.position, 100.0);
        assert!(!timeline.playing);
        assert!(timeline.tcp.is_complete());
        assert_eq!(engine.timer_deadline(TimerKey::TimelineTick), None);
    }

    #[test]
    fn rejected_seek_keeps_position() {
        let mut engine = engine();
        engine.seek(30.0).unwrap();
        assert!(engine.seek(130.0).is_err());
        assert_eq!(engine.timeline().position, 30.0);
    }

    #[test]
    fn seek_rewinds_a_running_handshake() {
        let mut engine = engine();
        engine.start_handshake(Protocol::TcpTls).unwrap();
        engine.advance(250).unwrap();
        assert_eq!(engine.handshake(Protocol::TcpTls).completed_steps, 2);

        let events = engine.seek(0.0).unwrap();
        assert!(events.contains(&EngineEvent::Handshake(engine.timeline().tcp)));
        assert_eq!(*engine.handshake(Protocol::TcpTls), engine.timeline().tcp);
        assert_eq!(engine.handshake(Protocol::TcpTls).completed_steps, 0);
        assert_eq!(engine.timer_deadline(TimerKey::HandshakeStep(Protocol::TcpTls)), None);

        engine.advance(1_000).unwrap();
        assert_eq!(*engine.handshake(Protocol::TcpTls), engine.timeline().tcp);
        assert_eq!(engine.handshake(Protocol::TcpTls).completed_steps, 0);
    }

    #[test]
    fn playback_drives_both_handshakes() {
        let mut engine = engine();
        engine.start_handshake(Protocol::Quic).unwrap();
        engine.play().unwrap();

        for _ in 0..10 {
            engine.advance(100).unwrap();
            let timeline = engine.timeline();
            assert_eq!(*engine.handshake(Protocol::TcpTls), timeline.tcp);
            assert_eq!(*engine.handshake(Protocol::Quic), timeline.quic);
        }

        engine.advance(10_000).unwrap();
        assert!(engine.handshake(Protocol::TcpTls).is_complete());
        assert!(engine.handshake(Protocol::Quic).is_complete());

        engine.reset_timeline().unwrap();
        assert_eq!(*engine.handshake(Protocol::Quic), HandshakeState::initial(Protocol::Quic));
    }

    #[test]
    fn other_demos_ignore_the_timeline() {
        let mut engine = engine();
        engine.switch_demo("streaming").unwrap();
        engine.seek(100.0).unwrap();
        assert_eq!(*engine.handshake(Protocol::TcpTls), HandshakeState::initial(Protocol::TcpTls));
    }

    #[test]
    fn rejected_benchmark_draws_no_seed() {
        let env = CountingEnv::default();
        let mut rejected = Engine::new(env.clone(), EngineConfig::default()).unwrap();
        let mut clean = engine();
        let draws = env.0.load(Ordering::Relaxed);

        assert!(rejected.start_benchmark(1_000, 0).is_err());
        assert!(rejected.start_benchmark(0, 1).is_err());
        assert_eq!(env.0.load(Ordering::Relaxed), draws);

        rejected.start_benchmark(1_000, 1).unwrap();
        clean.start_benchmark(1_000, 1).unwrap();
        assert!(rejected.start_benchmark(1_000, 1).is_err());

        rejected.advance(100).unwrap();
        clean.advance(100).unwrap();
        assert_eq!(rejected.snapshot(), clean.snapshot());
    }

    fn arb_command() -> impl Strategy<Value = Command> {
        prop_oneof![
            (-50.0f64..150.0).prop_map(Command::Seek),
            (-1.0f64..12.0).prop_map(Command::SetSpeed),
            (0u64..2_000, 0u32..3).prop_map(|(duration_ms, connection_count)| {
                Command::StartBenchmark { duration_ms, connection_count }
            }),
            Just(Command::StopBenchmark),
            Just(Command::AddStream),
            Just(Command::SendBurst { seed: None }),
            Just(Command::Play),
            Just(Command::Pause),
            Just(Command::ResetTimeline),
            prop::sample::select(Zone::ALL.to_vec()).prop_map(Command::ChangeZone),
            prop::sample::select(Protocol::ALL.to_vec()).prop_map(Command::StartHandshake),
            prop::sample::select(Protocol::ALL.to_vec()).prop_map(Command::StepHandshake),
            prop::sample::select(DemoKind::ALL.to_vec()).prop_map(Command::SwitchDemo),
            prop::sample::select(DemoKind::ALL.to_vec()).prop_map(Command::ResetDemo),
            (0u64..700).prop_map(|elapsed_ms| Command::Advance { elapsed_ms }),
        ]
    }

    proptest! {
        #[test]
        fn prop_rejected_commands_change_nothing(
            commands in prop::collection::vec(arb_command(), 1..60),
        ) {
            let env = CountingEnv::default();
            let mut engine = Engine::new(env.clone(), EngineConfig::default()).unwrap();

            for command in commands {
                let before = engine.snapshot();
                let draws = env.0.load(Ordering::Relaxed);

                if engine.handle(command.clone()).is_err() {
                    let after = engine.snapshot();
                    prop_assert_eq!(after, before, "rejected {:?} changed state", command);
                    let draws_now = env.0.load(Ordering::Relaxed);
                    prop_assert_eq!(draws_now, draws, "rejected {:?} drew a seed", command);
                }
            }
        }

        #[test]
        fn prop_handshake_demo_tracks_seek(position in 0.0f64..=100.0, lead in 0u64..700) {
            let mut engine = engine();
            engine.start_handshake(Protocol::TcpTls).unwrap();
            engine.start_handshake(Protocol::Quic).unwrap();
            engine.advance(lead).unwrap();

            engine.seek(position).unwrap();
            engine.advance(lead).unwrap();

            let timeline = engine.timeline();
            prop_assert_eq!(*engine.handshake(Protocol::TcpTls), timeline.tcp);
            prop_assert_eq!(*engine.handshake(Protocol::Quic), timeline.quic);
        }
    }
}
