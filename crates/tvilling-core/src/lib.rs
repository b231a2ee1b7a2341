//! Tvilling simulators
//!
//! Deterministic models of two transport protocols under synthetic network
//! conditions. Every simulator is a pure function of virtual time, a
//! [`NetworkProfile`](tvilling_proto::NetworkProfile) and an explicit seed;
//! none of them reads the wall clock. The engine owns the only clock and
//! drives them through a keyed [`TimerQueue`].
//!
//! # Components
//!
//! - [`handshake`]: step tables and handshake evaluation at any instant
//! - [`stream`]: multiplexed vs head-of-line-blocked delivery
//! - [`migration`]: zone change to connection-continuity state machine
//! - [`benchmark`]: seeded metric time series
//! - [`timeline`]: scrub position to reproducible snapshot
//! - [`Environment`]: time and randomness supplied from outside

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod benchmark;
pub mod env;
pub mod error;
pub mod handshake;
pub mod migration;
pub mod rng;
pub mod stream;
pub mod timeline;
pub mod timer;

pub use benchmark::BenchmarkEngine;
pub use env::Environment;
pub use error::SimError;
pub use migration::{RecoveryDelay, ZoneChange};
pub use stream::{BurstReport, StreamSet};
pub use timeline::{TimelineController, TimelineSnapshot};
pub use timer::TimerQueue;
