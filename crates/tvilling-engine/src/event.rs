//! Commands into the engine and events out of it.

use serde::{Deserialize, Serialize};
use tvilling_core::{StreamSet, TimelineSnapshot};
use tvilling_proto::{
    BenchmarkRun, BenchmarkSample, DemoKind, HandshakeState, MigrationState, NetworkProfile, Preset,
    Protocol, RunId, StreamId, Zone,
};

/// Requests from the presentation layer.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// Replace the network conditions.
    SetNetworkProfile(NetworkProfile),
    /// Replace the network conditions with a preset.
    ApplyPreset(Preset),
    /// Show another demo, resetting the one being left.
    SwitchDemo(DemoKind),
    /// Run the handshake of `protocol` from the start, one step per step
    /// duration of virtual time.
    StartHandshake(Protocol),
    /// Complete the next handshake step of `protocol` right away.
    StepHandshake(Protocol),
    /// Return a demo to its initial state.
    ResetDemo(DemoKind),
    /// Open one more multiplexed stream.
    AddStream,
    /// Send one burst on both connections.
    SendBurst {
        /// Loss seed; drawn from the environment when `None`.
        seed: Option<u64>,
    },
    /// Move the client to another network zone.
    ChangeZone(Zone),
    /// Start a benchmark run.
    StartBenchmark {
        /// Run length in virtual milliseconds.
        duration_ms: u64,
        /// Parallel connections per protocol.
        connection_count: u32,
    },
    /// Stop the running benchmark.
    StopBenchmark,
    /// Move the timeline to `0..=100`.
    Seek(f64),
    /// Start timeline playback.
    Play,
    /// Pause timeline playback.
    Pause,
    /// Pause and rewind the timeline.
    ResetTimeline,
    /// Change the animation speed.
    SetSpeed(f64),
    /// Let `elapsed_ms` of virtual time pass, firing due timers.
    Advance {
        /// Virtual milliseconds to advance.
        elapsed_ms: u64,
    },
}

/// Severity of a [`EngineEvent::Log`] message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LogLevel {
    /// Fine-grained progress.
    Debug,
    /// Normal lifecycle messages.
    Info,
    /// Something the user should notice.
    Warn,
}

/// Both stream sets of the streaming demo.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamsSnapshot {
    /// Protocol A's single stream.
    pub tcp: StreamSet,
    /// Protocol B's multiplexed streams.
    pub quic: StreamSet,
}

/// Snapshots and messages produced by a command.
///
/// Every event carries an owned copy; nothing the presentation layer holds
/// aliases engine state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum EngineEvent {
    /// Network conditions changed.
    Profile(NetworkProfile),
    /// The shown demo changed.
    DemoChanged(DemoKind),
    /// One protocol's handshake changed.
    Handshake(HandshakeState),
    /// Stream sets changed.
    Streams(StreamsSnapshot),
    /// A stream finished recovering.
    StreamRecovered {
        /// Protocol the stream belongs to.
        protocol: Protocol,
        /// The recovered stream.
        stream: StreamId,
    },
    /// Migration state changed.
    Migration(MigrationState),
    /// A benchmark run started.
    BenchmarkStarted {
        /// The new run.
        run: RunId,
    },
    /// A benchmark run produced a sample.
    BenchmarkSample {
        /// The run the sample belongs to.
        run: RunId,
        /// The sample.
        sample: BenchmarkSample,
    },
    /// A benchmark run completed or was stopped.
    BenchmarkFinished(BenchmarkRun),
    /// Timeline position or playback changed.
    Timeline(TimelineSnapshot),
    /// Human-readable message.
    Log {
        /// Severity.
        level: LogLevel,
        /// Message text.
        message: String,
    },
}

impl EngineEvent {
    pub(crate) fn debug(message: impl Into<String>) -> Self {
        Self::Log { level: LogLevel::Debug, message: message.into() }
    }

    pub(crate) fn info(message: impl Into<String>) -> Self {
        Self::Log { level: LogLevel::Info, message: message.into() }
    }

    pub(crate) fn warn(message: impl Into<String>) -> Self {
        Self::Log { level: LogLevel::Warn, message: message.into() }
    }
}

/// Identity of a pending engine timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimerKey {
    /// Next automatic handshake step.
    HandshakeStep(Protocol),
    /// Retransmission of a stream's losses.
    StreamRecovery(Protocol, StreamId),
    /// Settling of a zone change.
    MigrationRecovery,
    /// Next timeline playback tick.
    TimelineTick,
    /// Next benchmark sample.
    BenchmarkTick,
}

impl TimerKey {
    /// Demo whose state the timer mutates.
    pub const fn demo(self) -> DemoKind {
        match self {
            Self::HandshakeStep(_) | Self::TimelineTick => DemoKind::Handshake,
            Self::StreamRecovery(..) => DemoKind::Streaming,
            Self::MigrationRecovery => DemoKind::Migration,
            Self::BenchmarkTick => DemoKind::Performance,
        }
    }
}
