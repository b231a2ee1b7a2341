//! Live driver loop.
//!
//! The engine never reads a clock. The driver sleeps for one tick on its
//! environment, measures how long the sleep really took and feeds exactly
//! that much virtual time back as [`Command::Advance`]. Sub-millisecond
//! remainders are carried into the next tick so no time is lost.

use std::time::Duration;

use tvilling_core::Environment;
use tvilling_engine::{Command, Engine, EngineConfig, EngineEvent};

use crate::{error::CliError, render::render_all};

/// Real time between advances.
pub const DEFAULT_TICK: Duration = Duration::from_millis(50);

/// Engine plus the environment that paces it.
pub struct Driver<E: Environment> {
    engine: Engine<E>,
    env: E,
    tick: Duration,
    carry: Duration,
}

impl<E: Environment> Driver<E> {
    /// Build an engine on `env`.
    pub fn new(env: E, config: EngineConfig) -> Result<Self, CliError> {
        let engine = Engine::new(env.clone(), config)?;
        Ok(Self { engine, env, tick: DEFAULT_TICK, carry: Duration::ZERO })
    }

    /// Change the pacing tick.
    #[must_use]
    pub const fn with_tick(mut self, tick: Duration) -> Self {
        self.tick = tick;
        self
    }

    /// The driven engine.
    pub const fn engine(&self) -> &Engine<E> {
        &self.engine
    }

    /// Send one command and render what it produced.
    pub fn execute(&mut self, command: Command) -> Result<Vec<EngineEvent>, CliError> {
        let events = self.engine.handle(command)?;
        render_all(&events);
        Ok(events)
    }

    /// Advance in real time until `done` holds.
    ///
    /// Returns `false` if `limit` elapsed first.
    pub async fn run_until(
        &mut self,
        limit: Duration,
        mut done: impl FnMut(&Engine<E>) -> bool,
    ) -> Result<bool, CliError> {
        let start = self.env.now();

        while !done(&self.engine) {
            if self.env.now() - start >= limit {
                tracing::warn!(limit_ms = limit.as_millis(), "gave up waiting");
                return Ok(false);
            }
            self.tick().await?;
        }
        Ok(true)
    }

    /// Advance in real time for `duration`.
    pub async fn run_for(&mut self, duration: Duration) -> Result<(), CliError> {
        let start = self.env.now();
        while self.env.now() - start < duration {
            self.tick().await?;
        }
        Ok(())
    }

    async fn tick(&mut self) -> Result<(), CliError> {
        let before = self.env.now();
        self.env.sleep(self.tick).await;

        let elapsed = self.env.now() - before + self.carry;
        let elapsed_ms = elapsed.as_millis() as u64;
        self.carry = elapsed.saturating_sub(Duration::from_millis(elapsed_ms));

        self.execute(Command::Advance { elapsed_ms })?;
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use tvilling_harness::SimEnv;
    use tvilling_proto::{MigrationStatus, Protocol, Zone};

    use super::*;

    fn driver() -> Driver<SimEnv> {
        Driver::new(SimEnv::with_seed(7), EngineConfig::default()).unwrap()
    }

    #[tokio::test]
    async fn handshake_completes_in_virtual_time() {
        let mut driver = driver();
        driver.execute(Command::StartHandshake(Protocol::TcpTls)).unwrap();
        driver.execute(Command::StartHandshake(Protocol::Quic)).unwrap();

        let done = driver
            .run_until(Duration::from_secs(5), |engine| {
                Protocol::ALL.into_iter().all(|p| engine.handshake(p).is_complete())
            })
            .await
            .unwrap();

        assert!(done);
        assert_eq!(driver.engine().now_ms(), 600);
    }

    #[tokio::test]
    async fn zone_change_settles_while_running() {
        let mut driver = driver();
        driver.execute(Command::ChangeZone(Zone::Cellular)).unwrap();
        driver.run_for(Duration::from_secs(2)).await.unwrap();

        assert_eq!(driver.engine().migration().tcp.status, MigrationStatus::Reconnected);
    }

    #[tokio::test]
    async fn gives_up_at_the_limit() {
        let mut driver = driver().with_tick(Duration::from_millis(100));
        let done = driver.run_until(Duration::from_millis(300), |_| false).await.unwrap();

        assert!(!done);
        assert_eq!(driver.engine().now_ms(), 300);
    }

    #[tokio::test]
    async fn fractional_ticks_lose_no_time() {
        let mut driver = driver().with_tick(Duration::from_micros(2_500));
        driver.run_for(Duration::from_millis(100)).await.unwrap();

        assert_eq!(driver.engine().now_ms(), 100);
    }

    #[test]
    fn rejected_command_surfaces_as_error() {
        let mut driver = driver();
        assert!(matches!(driver.execute(Command::Seek(400.0)), Err(CliError::Engine(_))));
    }
}
