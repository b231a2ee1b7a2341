//! Model world: a reference engine with no timer queue.
//!
//! Each deferred behaviour is an explicit deadline field instead of a queue
//! entry. Handshake steps and timeline ticks are processed in deadline
//! order, since a tick in the handshake demo overrides both handshakes.
//! On equal deadlines the tick wins either way.

use tvilling_core::{handshake, stream::MAX_STREAMS, timeline};
use tvilling_proto::{DemoKind, NetworkProfile, Protocol, Zone};

use super::operation::{Operation, OperationError, OperationResult, demo, preset, zone};

const INITIAL_STREAMS: usize = 4;
const MIGRATION_RECOVERY_MS: u64 = 2_000;
const TICK_MS: u64 = 100;
const TICK_INCREMENT: f64 = 2.0;
const SAMPLE_MS: u64 = 100;

/// Observable state for oracle comparison.
#[derive(Debug, Clone, PartialEq)]
pub struct ObservableState {
    /// Virtual time.
    pub now_ms: u64,
    /// Shown demo.
    pub demo: DemoKind,
    /// Completed handshake steps, protocol A then B.
    pub handshake_steps: [usize; 2],
    /// Open multiplexed streams.
    pub quic_streams: usize,
    /// Current zone.
    pub zone: Zone,
    /// Whether protocol A is connected.
    pub tcp_connected: bool,
    /// Whether protocol B is connected.
    pub quic_connected: bool,
    /// Whether a benchmark is running.
    pub benchmark_running: bool,
    /// Samples in the current or last run.
    pub benchmark_samples: Option<usize>,
    /// Timeline position.
    pub timeline_position: f64,
    /// Whether playback is running.
    pub playing: bool,
}

#[derive(Debug, Clone, Copy, Default)]
struct ModelHandshake {
    completed: usize,
    started_at: u64,
    next_at: Option<u64>,
}

#[derive(Debug, Clone, Copy)]
struct ModelBenchmark {
    started_at: u64,
    duration: u64,
    stopped_at: Option<u64>,
}

impl ModelBenchmark {
    fn ends_at(&self) -> u64 {
        let end = self.started_at + self.duration;
        self.stopped_at.unwrap_or(end).min(end)
    }

    fn is_running(&self, now: u64) -> bool {
        self.stopped_at.is_none() && now < self.started_at + self.duration
    }

    fn samples(&self, now: u64) -> usize {
        (now.min(self.ends_at()) - self.started_at) as usize / SAMPLE_MS as usize
    }
}

/// Model world - the reference implementation.
#[derive(Debug, Clone)]
pub struct ModelWorld {
    now_ms: u64,
    profile: NetworkProfile,
    demo: DemoKind,
    handshakes: [ModelHandshake; 2],
    quic_streams: usize,
    zone: Zone,
    migration_settles_at: Option<u64>,
    benchmark: Option<ModelBenchmark>,
    position: f64,
    playing: bool,
    speed: f64,
    next_tick: Option<u64>,
}

impl Default for ModelWorld {
    fn default() -> Self {
        Self::new()
    }
}

impl ModelWorld {
    /// Model of a freshly built engine with default configuration.
    pub fn new() -> Self {
        Self {
            now_ms: 0,
            profile: NetworkProfile::default(),
            demo: DemoKind::Handshake,
            handshakes: [ModelHandshake::default(); 2],
            quic_streams: INITIAL_STREAMS,
            zone: Zone::Wifi,
            migration_settles_at: None,
            benchmark: None,
            position: 0.0,
            playing: false,
            speed: 1.0,
            next_tick: None,
        }
    }

    /// Apply an operation and return the result.
    pub fn apply(&mut self, op: &Operation) -> OperationResult {
        match *op {
            Operation::ApplyPreset { index } => {
                self.profile = preset(index).profile();
                OperationResult::Ok
            },
            Operation::SwitchDemo { index } => {
                let next = demo(index);
                if next != self.demo {
                    self.reset(self.demo);
                    self.demo = next;
                }
                OperationResult::Ok
            },
            Operation::StartHandshake { quic } => {
                let now = self.now_ms;
                let first = self.step_deadline(quic, now, 0);
                self.handshakes[usize::from(quic)] =
                    ModelHandshake { completed: 0, started_at: now, next_at: first };
                OperationResult::Ok
            },
            Operation::StepHandshake { quic } => {
                let total = protocol(quic).handshake_steps().len();
                let hs = &mut self.handshakes[usize::from(quic)];
                hs.next_at = None;
                hs.completed = (hs.completed + 1).min(total);
                OperationResult::Ok
            },
            Operation::ResetDemo { index } => {
                self.reset(demo(index));
                OperationResult::Ok
            },
            Operation::AddStream => {
                if self.quic_streams >= MAX_STREAMS {
                    return OperationResult::Error(OperationError::CapacityExceeded);
                }
                self.quic_streams += 1;
                OperationResult::Ok
            },
            // Loss draws are not modelled.
            Operation::SendBurst { .. } => OperationResult::Ok,
            Operation::ChangeZone { index } => {
                let next = zone(index);
                if next != self.zone {
                    self.zone = next;
                    self.migration_settles_at = Some(self.now_ms + MIGRATION_RECOVERY_MS);
                }
                OperationResult::Ok
            },
            Operation::StartBenchmark { tenths, connections } => {
                if self.benchmark.is_some_and(|b| b.is_running(self.now_ms)) {
                    return OperationResult::Error(OperationError::AlreadyRunning);
                }
                if connections == 0 || tenths == 0 {
                    return OperationResult::Error(OperationError::InvalidBenchmark);
                }
                self.benchmark = Some(ModelBenchmark {
                    started_at: self.now_ms,
                    duration: u64::from(tenths) * 100,
                    stopped_at: None,
                });
                OperationResult::Ok
            },
            Operation::StopBenchmark => match self.benchmark.as_mut() {
                Some(b) if b.is_running(self.now_ms) => {
                    b.stopped_at = Some(self.now_ms);
                    OperationResult::Ok
                },
                _ => OperationResult::Error(OperationError::NotRunning),
            },
            Operation::Seek { position } => {
                if position > 100 {
                    return OperationResult::Error(OperationError::InvalidPosition);
                }
                self.position = f64::from(position);
                self.follow_timeline();
                OperationResult::Ok
            },
            Operation::Play => {
                if !self.playing && self.position < 100.0 {
                    self.playing = true;
                    self.next_tick = Some(self.now_ms + TICK_MS);
                }
                OperationResult::Ok
            },
            Operation::Pause => {
                self.playing = false;
                self.next_tick = None;
                OperationResult::Ok
            },
            Operation::ResetTimeline => {
                self.reset_timeline();
                self.follow_timeline();
                OperationResult::Ok
            },
            Operation::SetSpeed { tenths } => {
                if tenths == 0 || tenths > 100 {
                    return OperationResult::Error(OperationError::InvalidSpeed);
                }
                self.speed = f64::from(tenths) / 10.0;
                OperationResult::Ok
            },
            Operation::AdvanceTime { millis } => {
                self.advance(u64::from(millis));
                OperationResult::Ok
            },
        }
    }

    /// Extract observable state for comparison.
    pub fn observable_state(&self) -> ObservableState {
        ObservableState {
            now_ms: self.now_ms,
            demo: self.demo,
            handshake_steps: [self.handshakes[0].completed, self.handshakes[1].completed],
            quic_streams: self.quic_streams,
            zone: self.zone,
            tcp_connected: self.migration_settles_at.is_none(),
            quic_connected: true,
            benchmark_running: self.benchmark.is_some_and(|b| b.is_running(self.now_ms)),
            benchmark_samples: self.benchmark.map(|b| b.samples(self.now_ms)),
            timeline_position: self.position,
            playing: self.playing,
        }
    }

    fn step_deadline(&self, quic: bool, started_at: u64, completed: usize) -> Option<u64> {
        let next = handshake::steps(protocol(quic), &self.profile).get(completed).copied()?;
        Some(started_at + next.completes_at_ms().ceil() as u64)
    }

    fn advance(&mut self, millis: u64) {
        let target = self.now_ms + millis;

        loop {
            let step = [false, true]
                .into_iter()
                .filter_map(|quic| self.handshakes[usize::from(quic)].next_at.map(|at| (at, quic)))
                .min();

            match (step, self.next_tick) {
                (Some((at, quic)), tick) if at <= target && tick.is_none_or(|t| at < t) => {
                    self.step(quic, at);
                },
                (_, Some(at)) if at <= target => self.tick(at),
                _ => break,
            }
        }

        if self.migration_settles_at.is_some_and(|at| at <= target) {
            self.migration_settles_at = None;
        }

        self.now_ms = target;
    }

    fn step(&mut self, quic: bool, at: u64) {
        let hs = self.handshakes[usize::from(quic)];
        let completed = hs.completed + 1;
        let next_at = self.step_deadline(quic, hs.started_at, completed).map(|next| next.max(at));
        self.handshakes[usize::from(quic)] = ModelHandshake { completed, next_at, ..hs };
    }

    fn tick(&mut self, at: u64) {
        self.position = (self.position + TICK_INCREMENT * self.speed).min(100.0);
        if self.position >= 100.0 {
            self.playing = false;
            self.next_tick = None;
        } else {
            self.next_tick = Some(at + TICK_MS);
        }
        self.follow_timeline();
    }

    /// In the handshake demo, both handshakes sit where the timeline is.
    fn follow_timeline(&mut self) {
        if self.demo != DemoKind::Handshake {
            return;
        }

        let snapshot = timeline::evaluate_at(self.position, &self.profile);
        let completed = [snapshot.tcp.completed_steps, snapshot.quic.completed_steps];
        self.handshakes =
            completed.map(|completed| ModelHandshake { completed, ..ModelHandshake::default() });
    }

    fn reset(&mut self, demo: DemoKind) {
        match demo {
            DemoKind::Handshake => {
                self.handshakes = [ModelHandshake::default(); 2];
                self.reset_timeline();
            },
            DemoKind::Streaming => self.quic_streams = INITIAL_STREAMS,
            DemoKind::Migration => {
                self.zone = Zone::Wifi;
                self.migration_settles_at = None;
            },
            DemoKind::Performance => self.benchmark = None,
        }
    }

    fn reset_timeline(&mut self) {
        self.position = 0.0;
        self.playing = false;
        self.next_tick = None;
    }
}

const fn protocol(quic: bool) -> Protocol {
    if quic { Protocol::Quic } else { Protocol::TcpTls }
}
