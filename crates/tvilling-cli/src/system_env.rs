//! Live Environment implementation using system time and OS randomness.

use std::time::{Duration, Instant};

use tvilling_core::Environment;

/// Live environment: wall clock, Tokio sleeps and OS entropy.
///
/// Seeds drawn from it make each session different; use the harness
/// `SimEnv` to replay one.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemEnv;

impl SystemEnv {
    /// Create a new system environment.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl Environment for SystemEnv {
    type Instant = Instant;

    fn now(&self) -> Instant {
        Instant::now()
    }

    fn sleep(&self, duration: Duration) -> impl std::future::Future<Output = ()> + Send {
        tokio::time::sleep(duration)
    }

    fn random_bytes(&self, buffer: &mut [u8]) {
        getrandom::fill(buffer).unwrap_or_else(|e| {
            tracing::error!("getrandom failed: {}", e);
            buffer.fill(0);
        });
    }
}
