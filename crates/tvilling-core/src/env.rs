//! Environment abstraction for deterministic testing.
//!
//! The `Environment` trait decouples the engine from system resources (wall
//! time, randomness). Simulators never touch it: they are pure functions of
//! virtual time. Only the engine (for seeds) and the driver loop (for
//! pacing) call into it.
//!
//! - Deterministic Simulation: the harness provides a manual clock and a
//!   seeded RNG, so a whole session replays from one seed.
//!
//! - Live Runtime: the CLI uses system time, Tokio sleeps and OS entropy
//!   without any change to the engine.
//!
//! # Invariants
//!
//! - Monotonicity: `env.now()` must never go backwards
//! - Determinism: Given the same seed, `random_bytes()` produces the same
//!   sequence
//! - Isolation: Implementations must not share global state

use std::{fmt::Debug, ops::Sub, time::Duration};

/// Abstract environment providing wall time, randomness and sleeping.
///
/// # Safety
///
/// Implementations MUST guarantee:
///
/// 1. Time monotonicity: `now()` never goes backwards
/// 2. Minimal panics: Methods are infallible except in exceptional
///    circumstances (e.g., OS entropy exhaustion)
pub trait Environment: Clone + Send + Sync + 'static {
    /// Point in time as measured by this environment.
    type Instant: Copy + Ord + Debug + Send + Sync + Sub<Output = Duration>;

    /// Returns the current time.
    ///
    /// Used by drivers to measure how much virtual time to feed the engine.
    /// The engine itself never reads it.
    fn now(&self) -> Self::Instant;

    /// Sleeps for the specified duration.
    ///
    /// This is the ONLY async method in the trait, and it should only be used
    /// by driver code.
    fn sleep(&self, duration: Duration) -> impl std::future::Future<Output = ()> + Send;

    /// Fills the provided buffer with random bytes.
    ///
    /// # Invariants
    ///
    /// - Determinism during simulations: Given the same RNG seed, this produces
    ///   the same sequence of bytes
    /// - Live sessions may use any entropy source
    fn random_bytes(&self, buffer: &mut [u8]);

    /// Generates a random `u64`.
    ///
    /// The engine draws burst seeds, benchmark seeds and connection ids
    /// through this.
    fn random_u64(&self) -> u64 {
        let mut bytes = [0u8; 8];
        self.random_bytes(&mut bytes);
        u64::from_be_bytes(bytes)
    }
}
