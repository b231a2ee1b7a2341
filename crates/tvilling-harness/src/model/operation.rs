//! Operations for model-based testing.
//!
//! Operations are small, `Arbitrary` encodings of engine commands. Values
//! are deliberately allowed to fall out of range (positions above 100, zero
//! connections, speeds of 0) so the rejection paths get exercised too.

use arbitrary::Arbitrary;
use tvilling_engine::{Command, EngineError};
use tvilling_core::SimError;
use tvilling_proto::{DemoKind, Preset, Protocol, Zone};

/// Operations that can be applied to the system.
#[derive(Debug, Clone, Arbitrary)]
pub enum Operation {
    /// Apply preset `index % 5`.
    ApplyPreset {
        /// Preset selector.
        index: u8,
    },
    /// Switch to demo `index % 4`.
    SwitchDemo {
        /// Demo selector.
        index: u8,
    },
    /// Start the automatic handshake.
    StartHandshake {
        /// Protocol B when set, protocol A otherwise.
        quic: bool,
    },
    /// Step the handshake manually.
    StepHandshake {
        /// Protocol B when set, protocol A otherwise.
        quic: bool,
    },
    /// Reset demo `index % 4`.
    ResetDemo {
        /// Demo selector.
        index: u8,
    },
    /// Open one more multiplexed stream.
    AddStream,
    /// Send one burst with an explicit seed.
    SendBurst {
        /// Loss seed.
        seed: u64,
    },
    /// Move to zone `index % 3`.
    ChangeZone {
        /// Zone selector.
        index: u8,
    },
    /// Start a benchmark of `tenths × 100` ms.
    StartBenchmark {
        /// Duration in tenths of a second; 0 is rejected.
        tenths: u8,
        /// Connection count; 0 is rejected.
        connections: u8,
    },
    /// Stop the running benchmark.
    StopBenchmark,
    /// Seek to `position`; anything above 100 is rejected.
    Seek {
        /// Requested position.
        position: u8,
    },
    /// Start playback.
    Play,
    /// Pause playback.
    Pause,
    /// Rewind the timeline.
    ResetTimeline,
    /// Set speed `tenths / 10`; 0 and above 10 are rejected.
    SetSpeed {
        /// Speed in tenths.
        tenths: u8,
    },
    /// Let virtual time pass.
    AdvanceTime {
        /// Milliseconds to advance.
        millis: u16,
    },
}

const fn protocol(quic: bool) -> Protocol {
    if quic { Protocol::Quic } else { Protocol::TcpTls }
}

/// Demo selected by `index`.
pub const fn demo(index: u8) -> DemoKind {
    DemoKind::ALL[index as usize % DemoKind::ALL.len()]
}

/// Zone selected by `index`.
pub const fn zone(index: u8) -> Zone {
    Zone::ALL[index as usize % Zone::ALL.len()]
}

/// Preset selected by `index`.
pub const fn preset(index: u8) -> Preset {
    Preset::ALL[index as usize % Preset::ALL.len()]
}

impl Operation {
    /// The engine command this operation encodes.
    pub fn to_command(&self) -> Command {
        match *self {
            Self::ApplyPreset { index } => Command::ApplyPreset(preset(index)),
            Self::SwitchDemo { index } => Command::SwitchDemo(demo(index)),
            Self::StartHandshake { quic } => Command::StartHandshake(protocol(quic)),
            Self::StepHandshake { quic } => Command::StepHandshake(protocol(quic)),
            Self::ResetDemo { index } => Command::ResetDemo(demo(index)),
            Self::AddStream => Command::AddStream,
            Self::SendBurst { seed } => Command::SendBurst { seed: Some(seed) },
            Self::ChangeZone { index } => Command::ChangeZone(zone(index)),
            Self::StartBenchmark { tenths, connections } => Command::StartBenchmark {
                duration_ms: u64::from(tenths) * 100,
                connection_count: u32::from(connections),
            },
            Self::StopBenchmark => Command::StopBenchmark,
            Self::Seek { position } => Command::Seek(f64::from(position)),
            Self::Play => Command::Play,
            Self::Pause => Command::Pause,
            Self::ResetTimeline => Command::ResetTimeline,
            Self::SetSpeed { tenths } => Command::SetSpeed(f64::from(tenths) / 10.0),
            Self::AdvanceTime { millis } => Command::Advance { elapsed_ms: u64::from(millis) },
        }
    }
}

/// Result of applying an operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperationResult {
    /// Operation succeeded.
    Ok,

    /// Operation failed with expected error.
    Error(OperationError),
}

/// Expected errors that can occur during operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationError {
    /// Stream set is full.
    CapacityExceeded,
    /// A benchmark is already running.
    AlreadyRunning,
    /// No benchmark is running.
    NotRunning,
    /// Benchmark parameters are zero.
    InvalidBenchmark,
    /// Timeline position out of range.
    InvalidPosition,
    /// Speed out of range.
    InvalidSpeed,
    /// Anything the model does not produce.
    Other,
}

impl From<&EngineError> for OperationError {
    fn from(error: &EngineError) -> Self {
        match error {
            EngineError::Sim(SimError::CapacityExceeded { .. }) => Self::CapacityExceeded,
            EngineError::Sim(SimError::AlreadyRunning { .. }) => Self::AlreadyRunning,
            EngineError::Sim(SimError::NotRunning) => Self::NotRunning,
            EngineError::Sim(SimError::InvalidBenchmark { .. }) => Self::InvalidBenchmark,
            EngineError::Sim(SimError::InvalidPosition { .. }) => Self::InvalidPosition,
            EngineError::Sim(SimError::InvalidSpeed { .. }) => Self::InvalidSpeed,
            EngineError::Proto(_) | EngineError::InvalidConfig { .. } => Self::Other,
        }
    }
}

impl OperationResult {
    /// Check if operation succeeded.
    pub const fn is_ok(&self) -> bool {
        matches!(self, Self::Ok)
    }

    /// Check if operation failed.
    pub const fn is_err(&self) -> bool {
        !self.is_ok()
    }
}

impl<T> From<&Result<T, EngineError>> for OperationResult {
    fn from(result: &Result<T, EngineError>) -> Self {
        match result {
            Ok(_) => Self::Ok,
            Err(error) => Self::Error(error.into()),
        }
    }
}
