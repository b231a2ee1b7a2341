//! Tvilling value types
//!
//! Plain data shared between the simulators, the engine and any
//! presentation layer. Nothing in this crate knows about time or
//! randomness; it only describes the shapes the engine hands out as
//! snapshots.
//!
//! # Components
//!
//! - [`NetworkProfile`] and [`Preset`]: synthetic network conditions
//! - [`Protocol`], [`DemoKind`], [`Zone`]: the identifiers commands use
//! - [`HandshakeState`], [`Stream`], [`MigrationState`], [`BenchmarkRun`]:
//!   per-demo snapshots
//! - [`Settings`]: the flat persisted settings record

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod benchmark;
pub mod error;
pub mod handshake;
pub mod migration;
pub mod profile;
pub mod protocol;
pub mod settings;
pub mod stream;

pub use benchmark::{BenchmarkRun, BenchmarkSample, BenchmarkSummary, Metrics, RunId, RunStatus};
pub use error::ProtoError;
pub use handshake::{
    Direction, EndpointState, Endpoints, HandshakeState, HandshakeStep, PacketCategory, StepKind,
};
pub use migration::{ConnectionId, MigrationState, MigrationStatus, QuicPath, TcpPath};
pub use profile::{NetworkProfile, Preset};
pub use protocol::{DemoKind, Protocol, Zone};
pub use settings::{Settings, SettingsError};
pub use stream::{Packet, PacketOutcome, Stream, StreamId, StreamStatus};
