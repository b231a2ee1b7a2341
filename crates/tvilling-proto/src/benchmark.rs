//! Benchmark runs and samples.

use serde::{Deserialize, Serialize};

use crate::{profile::NetworkProfile, protocol::Protocol};

/// Metrics measured for one protocol at one sample.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Metrics {
    /// Time to establish a connection.
    pub connection_time_ms: f64,
    /// Aggregate throughput over all connections.
    pub throughput_mbps: f64,
    /// Time to recover from loss.
    pub recovery_time_ms: f64,
}

/// Metrics of both protocols at one instant of a run.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BenchmarkSample {
    /// Virtual time since the run started.
    pub t_offset_ms: u64,
    /// TCP+TLS metrics.
    pub tcp: Metrics,
    /// QUIC metrics.
    pub quic: Metrics,
}

impl BenchmarkSample {
    /// Metrics for one protocol.
    pub const fn metrics(&self, protocol: Protocol) -> &Metrics {
        match protocol {
            Protocol::TcpTls => &self.tcp,
            Protocol::Quic => &self.quic,
        }
    }
}

/// Identifier of a benchmark run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RunId(pub u64);

/// Lifecycle of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RunStatus {
    /// Still producing samples.
    Running,
    /// Reached its duration.
    Completed,
    /// Stopped early by a command.
    Stopped,
}

/// A benchmark run and every sample it produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BenchmarkRun {
    /// Run identifier.
    pub id: RunId,
    /// Conditions the run was started under.
    pub profile: NetworkProfile,
    /// Parallel connections per protocol.
    pub connection_count: u32,
    /// Virtual time the run started.
    pub started_at_ms: u64,
    /// Requested duration.
    pub duration_ms: u64,
    /// Lifecycle status. Samples are frozen once this leaves `Running`.
    pub status: RunStatus,
    /// Samples in time order.
    pub samples: Vec<BenchmarkSample>,
}

/// Per-protocol means over a run.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BenchmarkSummary {
    /// Number of samples averaged.
    pub samples: usize,
    /// TCP+TLS means.
    pub tcp: Metrics,
    /// QUIC means.
    pub quic: Metrics,
}

impl BenchmarkRun {
    /// Whether the run still produces samples.
    pub fn is_running(&self) -> bool {
        self.status == RunStatus::Running
    }

    /// Most recent sample.
    pub fn latest(&self) -> Option<&BenchmarkSample> {
        self.samples.last()
    }

    /// Means over all samples, or `None` for an empty run.
    pub fn summary(&self) -> Option<BenchmarkSummary> {
        if self.samples.is_empty() {
            return None;
        }

        let n = self.samples.len() as f64;
        let mean = |protocol: Protocol| {
            let sum = self.samples.iter().map(|s| s.metrics(protocol)).fold(
                Metrics::default(),
                |acc, m| Metrics {
                    connection_time_ms: acc.connection_time_ms + m.connection_time_ms,
                    throughput_mbps: acc.throughput_mbps + m.throughput_mbps,
                    recovery_time_ms: acc.recovery_time_ms + m.recovery_time_ms,
                },
            );
            Metrics {
                connection_time_ms: sum.connection_time_ms / n,
                throughput_mbps: sum.throughput_mbps / n,
                recovery_time_ms: sum.recovery_time_ms / n,
            }
        };

        Some(BenchmarkSummary {
            samples: self.samples.len(),
            tcp: mean(Protocol::TcpTls),
            quic: mean(Protocol::Quic),
        })
    }
}
