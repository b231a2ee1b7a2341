//! Simulated environment with a manual clock and seeded RNG.
//!
//! `SimEnv` is the test implementation of the `Environment` trait. Its
//! clock only moves when something sleeps on it, and its randomness comes
//! from a `ChaCha8Rng`, so an engine built on it replays exactly from the
//! seed.

use std::{
    ops::Sub,
    sync::{Arc, Mutex, PoisonError},
    time::Duration,
};

use rand::{RngCore, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tvilling_core::Environment;

/// Point on the simulated clock, measured from its start.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct SimInstant(Duration);

impl SimInstant {
    /// Time since the simulation started.
    pub const fn since_start(self) -> Duration {
        self.0
    }
}

impl Sub for SimInstant {
    type Output = Duration;

    fn sub(self, rhs: Self) -> Duration {
        self.0.saturating_sub(rhs.0)
    }
}

#[derive(Debug)]
struct Inner {
    now: Duration,
    rng: ChaCha8Rng,
}

/// Deterministic environment.
///
/// Clones share one clock and one RNG.
#[derive(Debug, Clone)]
pub struct SimEnv {
    inner: Arc<Mutex<Inner>>,
}

impl SimEnv {
    /// Clock at zero, RNG seeded with `seed`.
    pub fn with_seed(seed: u64) -> Self {
        let inner = Inner { now: Duration::ZERO, rng: ChaCha8Rng::seed_from_u64(seed) };
        Self { inner: Arc::new(Mutex::new(inner)) }
    }

    /// Move the clock forward.
    pub fn advance(&self, duration: Duration) {
        let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        inner.now = inner.now.saturating_add(duration);
    }
}

impl Default for SimEnv {
    fn default() -> Self {
        Self::with_seed(0)
    }
}

impl Environment for SimEnv {
    type Instant = SimInstant;

    fn now(&self) -> SimInstant {
        SimInstant(self.inner.lock().unwrap_or_else(PoisonError::into_inner).now)
    }

    fn sleep(&self, duration: Duration) -> impl std::future::Future<Output = ()> + Send {
        self.advance(duration);
        std::future::ready(())
    }

    fn random_bytes(&self, buffer: &mut [u8]) {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner).rng.fill_bytes(buffer);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_seed_same_bytes() {
        let a = SimEnv::with_seed(11);
        let b = SimEnv::with_seed(11);
        assert_eq!(a.random_u64(), b.random_u64());
        assert_eq!(a.random_u64(), b.random_u64());
    }

    #[test]
    fn clones_share_the_clock() {
        let env = SimEnv::default();
        let other = env.clone();
        let start = env.now();

        other.advance(Duration::from_millis(250));
        assert_eq!(env.now() - start, Duration::from_millis(250));
    }

    #[test]
    fn sleep_advances_virtual_time() {
        let env = SimEnv::default();
        drop(env.sleep(Duration::from_secs(3)));
        assert_eq!(env.now().since_start(), Duration::from_secs(3));
    }
}
