//! Benchmark engine.
//!
//! Produces a synthetic time series of comparable metrics for both
//! protocols. A run samples every [`SAMPLE_INTERVAL_MS`] of virtual time
//! until its duration is reached or it is stopped.
//!
//! Each sample is a pure function of `(profile, connection_count, seed,
//! index)`, so a run replays exactly from its seed no matter how the
//! virtual clock was advanced to reach a given sample.
//!
//! # Invariants
//!
//! - At most one run is `Running`
//! - A run never holds more than `duration_ms / SAMPLE_INTERVAL_MS` samples
//! - Sample `n` has `t_offset_ms == (n + 1) * SAMPLE_INTERVAL_MS`

use rand::Rng;
use tracing::{debug, info};
use tvilling_proto::{
    BenchmarkRun, BenchmarkSample, Metrics, NetworkProfile, Protocol, RunId, RunStatus,
};

use crate::{error::SimError, rng, stream};

/// Virtual time between samples.
pub const SAMPLE_INTERVAL_MS: u64 = 100;

/// Round trips protocol A needs before application data.
pub const TCP_HANDSHAKE_RTTS: f64 = 3.0;

/// Round trips protocol B needs before application data.
pub const QUIC_HANDSHAKE_RTTS: f64 = 1.0;

/// Connection-time jitter ceiling for protocol A.
pub const TCP_CONNECT_JITTER_MS: f64 = 20.0;

/// Connection-time jitter ceiling for protocol B.
pub const QUIC_CONNECT_JITTER_MS: f64 = 10.0;

/// Recovery time per percent of loss for protocol A.
pub const TCP_RECOVERY_PER_LOSS_MS: f64 = 50.0;

/// Recovery time per percent of loss for protocol B.
pub const QUIC_RECOVERY_PER_LOSS_MS: f64 = 20.0;

/// Recovery jitter ceiling for protocol A.
pub const TCP_RECOVERY_JITTER_MS: f64 = 30.0;

/// Recovery jitter ceiling for protocol B.
pub const QUIC_RECOVERY_JITTER_MS: f64 = 15.0;

fn metrics<R: Rng>(
    protocol: Protocol,
    profile: &NetworkProfile,
    connection_count: u32,
    rng: &mut R,
) -> Metrics {
    let (rtts, connect_jitter, per_loss, recovery_jitter) = match protocol {
        Protocol::TcpTls => (
            TCP_HANDSHAKE_RTTS,
            TCP_CONNECT_JITTER_MS,
            TCP_RECOVERY_PER_LOSS_MS,
            TCP_RECOVERY_JITTER_MS,
        ),
        Protocol::Quic => (
            QUIC_HANDSHAKE_RTTS,
            QUIC_CONNECT_JITTER_MS,
            QUIC_RECOVERY_PER_LOSS_MS,
            QUIC_RECOVERY_JITTER_MS,
        ),
    };

    let connection_time_ms = rtts * profile.latency_ms() + rng.gen_range(0.0..connect_jitter);
    let throughput_mbps = stream::throughput(protocol, profile) * f64::from(connection_count);
    let recovery_time_ms =
        profile.loss_rate_percent() * per_loss + rng.gen_range(0.0..recovery_jitter);

    Metrics { connection_time_ms, throughput_mbps, recovery_time_ms }
}

/// Sample `index` of a run.
pub fn sample(
    profile: &NetworkProfile,
    connection_count: u32,
    seed: u64,
    index: u64,
) -> BenchmarkSample {
    let mut rng = rng::seeded(rng::derive(seed, index));
    let tcp = metrics(Protocol::TcpTls, profile, connection_count, &mut rng);
    let quic = metrics(Protocol::Quic, profile, connection_count, &mut rng);

    BenchmarkSample { t_offset_ms: (index + 1) * SAMPLE_INTERVAL_MS, tcp, quic }
}

/// Owner of the current (or last) benchmark run.
#[derive(Debug, Clone, Default)]
pub struct BenchmarkEngine {
    run: Option<BenchmarkRun>,
    seed: u64,
    next_id: u64,
}

impl BenchmarkEngine {
    /// No run yet.
    pub fn new() -> Self {
        Self::default()
    }

    /// Current or most recent run.
    pub const fn run(&self) -> Option<&BenchmarkRun> {
        self.run.as_ref()
    }

    /// Whether a run is collecting samples.
    pub fn is_running(&self) -> bool {
        self.run.as_ref().is_some_and(BenchmarkRun::is_running)
    }

    /// Virtual time of the next sample of the running run.
    pub fn next_sample_at(&self) -> Option<u64> {
        let run = self.run.as_ref().filter(|r| r.is_running())?;
        let next = (run.samples.len() as u64 + 1) * SAMPLE_INTERVAL_MS;
        Some(run.started_at_ms + next.min(run.duration_ms))
    }

    /// Check that a run with these parameters could start now.
    ///
    /// # Errors
    ///
    /// - `AlreadyRunning` if a run is active
    /// - `InvalidBenchmark` if `connection_count` or `duration_ms` is zero
    pub fn validate_start(&self, connection_count: u32, duration_ms: u64) -> Result<(), SimError> {
        if let Some(run) = self.run.as_ref().filter(|r| r.is_running()) {
            return Err(SimError::AlreadyRunning { run: run.id });
        }
        if connection_count == 0 {
            return Err(SimError::InvalidBenchmark { reason: "connection count must be positive" });
        }
        if duration_ms == 0 {
            return Err(SimError::InvalidBenchmark { reason: "duration must be positive" });
        }
        Ok(())
    }

    /// Start a run at `now_ms`.
    ///
    /// # Errors
    ///
    /// Same as [`BenchmarkEngine::validate_start`].
    pub fn start(
        &mut self,
        profile: NetworkProfile,
        connection_count: u32,
        duration_ms: u64,
        seed: u64,
        now_ms: u64,
    ) -> Result<RunId, SimError> {
        self.validate_start(connection_count, duration_ms)?;

        self.next_id += 1;
        let id = RunId(self.next_id);
        self.seed = seed;
        self.run = Some(BenchmarkRun {
            id,
            profile,
            connection_count,
            started_at_ms: now_ms,
            duration_ms,
            status: RunStatus::Running,
            samples: Vec::new(),
        });

        info!(run = id.0, connection_count, duration_ms, "benchmark started");
        Ok(id)
    }

    /// Collect every sample due by `now_ms`.
    ///
    /// Completes the run once its duration has elapsed. Returns the new
    /// samples in order.
    pub fn advance_to(&mut self, now_ms: u64) -> Vec<BenchmarkSample> {
        let seed = self.seed;
        let Some(run) = self.run.as_mut().filter(|r| r.is_running()) else {
            return Vec::new();
        };

        let elapsed = now_ms.saturating_sub(run.started_at_ms).min(run.duration_ms);
        let due = elapsed / SAMPLE_INTERVAL_MS;

        let mut fresh = Vec::new();
        while (run.samples.len() as u64) < due {
            let index = run.samples.len() as u64;
            let s = sample(&run.profile, run.connection_count, seed, index);
            debug!(run = run.id.0, t_offset_ms = s.t_offset_ms, "benchmark sample");
            run.samples.push(s);
            fresh.push(s);
        }

        if elapsed >= run.duration_ms {
            run.status = RunStatus::Completed;
            info!(run = run.id.0, samples = run.samples.len(), "benchmark completed");
        }

        fresh
    }

    /// Stop the running run at `now_ms`, keeping the samples due so far.
    ///
    /// # Errors
    ///
    /// - `NotRunning` if no run is active
    pub fn stop(&mut self, now_ms: u64) -> Result<&BenchmarkRun, SimError> {
        if !self.is_running() {
            return Err(SimError::NotRunning);
        }

        self.advance_to(now_ms);
        let run = self.run.as_mut().ok_or(SimError::NotRunning)?;
        if run.is_running() {
            run.status = RunStatus::Stopped;
            info!(run = run.id.0, samples = run.samples.len(), "benchmark stopped");
        }
        Ok(run)
    }

    /// Forget the current run.
    pub fn reset(&mut self) {
        self.run = None;
    }
}
