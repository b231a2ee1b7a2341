//! Tvilling engine
//!
//! The command side of the protocol comparison. A presentation layer sends
//! [`Command`]s and renders the [`EngineEvent`]s that come back; the engine
//! owns all demo state, the virtual clock and every pending timer.
//!
//! ## Architecture
//!
//! ```text
//! Presentation ──Command──► Engine ──► handshake / stream / migration /
//!      ▲                      │        benchmark / timeline simulators
//!      └────EngineEvent───────┘
//! ```

#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod config;
mod engine;
mod error;
mod event;

pub use config::EngineConfig;
pub use engine::{Engine, EngineSnapshot};
pub use error::EngineError;
pub use event::{Command, EngineEvent, LogLevel, StreamsSnapshot, TimerKey};
