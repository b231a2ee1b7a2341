//! Stream delivery simulator.
//!
//! Protocol A carries everything on one implicit stream, so one lost packet
//! blocks the whole connection until the loss is retransmitted. Protocol B
//! multiplexes independent streams and a loss only stalls the stream it
//! happened on.
//!
//! # Invariants
//!
//! - A protocol A set always holds exactly one stream, id 1
//! - A protocol B set holds at most [`MAX_STREAMS`] streams with ids
//!   `1..=len`
//! - While a protocol A stream is `Blocked`, no packet is `Delivered`
//! - A stream keeps at most [`MAX_PACKET_HISTORY`] packets; sequence
//!   numbers keep counting past the dropped ones

use std::ops::RangeInclusive;

use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::trace;
use tvilling_proto::{
    NetworkProfile, Packet, PacketOutcome, Protocol, Stream, StreamId, StreamStatus,
};

use crate::{error::SimError, rng};

/// Maximum number of streams a multiplexed connection can hold.
pub const MAX_STREAMS: usize = 10;

/// Most recent packets kept per stream.
pub const MAX_PACKET_HISTORY: usize = 64;

/// Packets sent by one protocol A burst.
pub const TCP_BURST_PACKETS: usize = 5;

/// Packets sent per stream by one protocol B burst.
pub const QUIC_BURST_PACKETS: RangeInclusive<u32> = 1..=3;

/// Fraction of the link bandwidth protocol A turns into goodput.
pub const TCP_EFFICIENCY: f64 = 0.8;

/// Fraction of the link bandwidth protocol B turns into goodput.
pub const QUIC_EFFICIENCY: f64 = 0.95;

/// Throughput penalty per percent of loss for protocol A.
pub const TCP_LOSS_IMPACT: f64 = 0.10;

/// Throughput penalty per percent of loss for protocol B.
pub const QUIC_LOSS_IMPACT: f64 = 0.05;

/// The streams of one connection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamSet {
    protocol: Protocol,
    streams: Vec<Stream>,
}

impl StreamSet {
    /// Fresh set for `protocol`.
    ///
    /// Protocol A starts with its implicit stream; protocol B starts empty.
    pub fn new(protocol: Protocol) -> Self {
        let streams =
            if protocol.is_multiplexed() { Vec::new() } else { vec![Stream::new(StreamId(1))] };
        Self { protocol, streams }
    }

    /// Fresh set for `protocol` with `count` open streams.
    ///
    /// Protocol A ignores `count`: it always has its one stream.
    pub fn with_streams(protocol: Protocol, count: usize) -> Result<Self, SimError> {
        let mut set = Self::new(protocol);
        if !protocol.is_multiplexed() {
            return Ok(set);
        }
        if count > MAX_STREAMS {
            return Err(SimError::CapacityExceeded { limit: MAX_STREAMS });
        }
        for _ in 0..count {
            set = add_stream(&set)?;
        }
        Ok(set)
    }

    /// Protocol of this connection.
    pub const fn protocol(&self) -> Protocol {
        self.protocol
    }

    /// All streams in id order.
    pub fn streams(&self) -> &[Stream] {
        &self.streams
    }

    /// Stream with `id`.
    pub fn get(&self, id: StreamId) -> Option<&Stream> {
        self.streams.iter().find(|s| s.id == id)
    }

    /// Number of open streams.
    pub fn len(&self) -> usize {
        self.streams.len()
    }

    /// Whether no stream is open.
    pub fn is_empty(&self) -> bool {
        self.streams.is_empty()
    }

    /// Stream limit for this protocol.
    pub const fn capacity(&self) -> usize {
        if self.protocol.is_multiplexed() { MAX_STREAMS } else { 1 }
    }
}

/// What one burst did.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BurstReport {
    /// Packets sent across all streams.
    pub sent: usize,
    /// Packets lost across all streams.
    pub lost: usize,
    /// Streams that lost at least one packet and now need recovery.
    pub impaired: Vec<StreamId>,
}

/// Open one more stream.
///
/// # Errors
///
/// - `CapacityExceeded` if the set is full; protocol A is always full
pub fn add_stream(set: &StreamSet) -> Result<StreamSet, SimError> {
    let limit = set.capacity();
    if set.len() >= limit {
        return Err(SimError::CapacityExceeded { limit });
    }

    let mut next = set.clone();
    let id = u8::try_from(next.len() + 1).map_err(|_| SimError::CapacityExceeded { limit })?;
    next.streams.push(Stream::new(StreamId(id)));
    Ok(next)
}

/// Send one burst on every open stream, drawing losses from `seed`.
pub fn deliver_burst(
    set: &StreamSet,
    profile: &NetworkProfile,
    seed: u64,
) -> (StreamSet, BurstReport) {
    let mut rng = rng::seeded(seed);
    deliver_burst_with(set, profile, &mut rng)
}

/// Send one burst drawing losses from `rng`.
pub fn deliver_burst_with<R: Rng>(
    set: &StreamSet,
    profile: &NetworkProfile,
    rng: &mut R,
) -> (StreamSet, BurstReport) {
    let p = profile.loss_probability();
    let mut next = set.clone();
    let mut report = BurstReport::default();

    for stream in &mut next.streams {
        let count = match set.protocol {
            Protocol::TcpTls => TCP_BURST_PACKETS,
            Protocol::Quic => rng.gen_range(QUIC_BURST_PACKETS) as usize,
        };

        let mut impaired = false;
        for _ in 0..count {
            let seq = stream.next_seq();
            let lost = rng.gen_range(0.0..1.0) < p;

            let outcome = if lost {
                stream.status = match set.protocol {
                    Protocol::TcpTls => StreamStatus::Blocked,
                    Protocol::Quic => StreamStatus::Retransmitting,
                };
                impaired = true;
                PacketOutcome::Lost
            } else if stream.status == StreamStatus::Blocked {
                PacketOutcome::HeldBack
            } else {
                PacketOutcome::Delivered
            };

            stream.packets.push(Packet { seq, outcome });
            report.sent += 1;
            if lost {
                report.lost += 1;
            }
        }

        let excess = stream.packets.len().saturating_sub(MAX_PACKET_HISTORY);
        stream.packets.drain(..excess);

        if impaired {
            trace!(stream = %stream.id, status = %stream.status, "loss in burst");
            report.impaired.push(stream.id);
        }
    }

    (next, report)
}

/// Retransmit everything stream `id` is waiting on.
///
/// Lost packets become `Retransmitted`, held-back packets are released as
/// `Delivered` and the stream goes back to `Active`. Unknown ids leave the
/// set unchanged.
pub fn recover(set: &StreamSet, id: StreamId) -> StreamSet {
    let mut next = set.clone();
    if let Some(stream) = next.streams.iter_mut().find(|s| s.id == id) {
        for packet in &mut stream.packets {
            packet.outcome = match packet.outcome {
                PacketOutcome::Lost => PacketOutcome::Retransmitted,
                PacketOutcome::HeldBack => PacketOutcome::Delivered,
                other => other,
            };
        }
        stream.status = StreamStatus::Active;
    }
    next
}

/// Steady-state goodput of `protocol` under `profile`, in Mbps.
pub fn throughput(protocol: Protocol, profile: &NetworkProfile) -> f64 {
    let (efficiency, loss_impact) = match protocol {
        Protocol::TcpTls => (TCP_EFFICIENCY, TCP_LOSS_IMPACT),
        Protocol::Quic => (QUIC_EFFICIENCY, QUIC_LOSS_IMPACT),
    };

    let base = profile.bandwidth_mbps() * efficiency;
    let impact = profile.loss_rate_percent() * loss_impact;
    (base - base * impact).max(0.0)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use proptest::prelude::*;
    use tvilling_proto::Preset;

    use super::*;

    fn lossy(loss: f64) -> NetworkProfile {
        NetworkProfile::default().with_loss_rate(loss).unwrap()
    }

    #[test]
    fn average_preset_throughput() {
        let p = Preset::Average.profile();
        assert_eq!(throughput(Protocol::TcpTls, &p), 36.0);
        assert_eq!(throughput(Protocol::Quic, &p), 45.125);
    }

    #[test]
    fn throughput_never_negative() {
        let p = lossy(100.0);
        assert_eq!(throughput(Protocol::TcpTls, &p), 0.0);
        assert_eq!(throughput(Protocol::Quic, &p), 0.0);
    }

    #[test]
    fn capacity_is_ten_streams() {
        let mut set = StreamSet::new(Protocol::Quic);
        for expected in 1..=10u8 {
            set = add_stream(&set).unwrap();
            assert_eq!(set.streams().last().unwrap().id, StreamId(expected));
        }
        assert_eq!(add_stream(&set), Err(SimError::CapacityExceeded { limit: 10 }));
        assert_eq!(set.len(), 10);
    }

    #[test]
    fn tcp_cannot_add_streams() {
        let set = StreamSet::new(Protocol::TcpTls);
        assert_eq!(set.len(), 1);
        assert_eq!(add_stream(&set), Err(SimError::CapacityExceeded { limit: 1 }));
        assert_eq!(StreamSet::with_streams(Protocol::TcpTls, 4).unwrap().len(), 1);
    }

    #[test]
    fn with_streams_rejects_overflow() {
        assert_eq!(StreamSet::with_streams(Protocol::Quic, 4).unwrap().len(), 4);
        assert!(StreamSet::with_streams(Protocol::Quic, 11).is_err());
    }

    #[test]
    fn lossless_burst_delivers_everything() {
        let set = StreamSet::with_streams(Protocol::Quic, 4).unwrap();
        let (next, report) = deliver_burst(&set, &lossy(0.0), 9);

        assert_eq!(report.lost, 0);
        assert!(report.impaired.is_empty());
        for stream in next.streams() {
            assert!((1..=3).contains(&stream.packets.len()));
            assert_eq!(stream.delivered(), stream.packets.len());
        }
    }

    #[test]
    fn total_loss_blocks_tcp() {
        let set = StreamSet::new(Protocol::TcpTls);
        let (next, report) = deliver_burst(&set, &lossy(100.0), 1);

        assert_eq!(report.sent, TCP_BURST_PACKETS);
        assert_eq!(report.lost, TCP_BURST_PACKETS);
        assert_eq!(report.impaired, vec![StreamId(1)]);
        assert_eq!(next.streams()[0].status, StreamStatus::Blocked);
    }

    #[test]
    fn history_keeps_the_latest_packets() {
        let mut set = StreamSet::new(Protocol::TcpTls);
        for seed in 0..30 {
            set = deliver_burst(&set, &lossy(0.0), seed).0;
        }

        let stream = &set.streams()[0];
        assert_eq!(stream.packets.len(), MAX_PACKET_HISTORY);
        assert_eq!(stream.packets.last().unwrap().seq, 150);
        assert_eq!(stream.packets[0].seq, 150 - MAX_PACKET_HISTORY as u32 + 1);
        assert_eq!(stream.next_seq(), 151);
    }

    #[test]
    fn recovery_releases_held_packets() {
        let mut set = StreamSet::new(Protocol::TcpTls);
        set.streams[0].status = StreamStatus::Blocked;
        set.streams[0].packets = vec![
            Packet { seq: 1, outcome: PacketOutcome::Delivered },
            Packet { seq: 2, outcome: PacketOutcome::Lost },
            Packet { seq: 3, outcome: PacketOutcome::HeldBack },
        ];

        let next = recover(&set, StreamId(1));
        let outcomes: Vec<_> = next.streams()[0].packets.iter().map(|p| p.outcome).collect();
        assert_eq!(
            outcomes,
            [PacketOutcome::Delivered, PacketOutcome::Retransmitted, PacketOutcome::Delivered]
        );
        assert_eq!(next.streams()[0].status, StreamStatus::Active);
        assert_eq!(recover(&next, StreamId(7)), next);
    }

    proptest! {
        #[test]
        fn prop_burst_is_deterministic(
            seed in any::<u64>(),
            loss in 0.0f64..=100.0,
            streams in 1usize..=10,
        ) {
            let p = lossy(loss);
            for protocol in Protocol::ALL {
                let set = StreamSet::with_streams(protocol, streams).unwrap();
                prop_assert_eq!(deliver_burst(&set, &p, seed), deliver_burst(&set, &p, seed));
            }
        }

        #[test]
        fn prop_tcp_holds_back_after_loss(seed in any::<u64>(), loss in 0.0f64..=100.0) {
            let set = StreamSet::new(Protocol::TcpTls);
            let (next, _) = deliver_burst(&set, &lossy(loss), seed);
            let packets = &next.streams()[0].packets;

            let first_loss = packets.iter().position(|p| p.outcome == PacketOutcome::Lost);
            if let Some(first_loss) = first_loss {
                prop_assert_eq!(next.streams()[0].status, StreamStatus::Blocked);
                let after = &packets[first_loss..];
                prop_assert!(after.iter().all(|p| p.outcome != PacketOutcome::Delivered));
            } else {
                prop_assert_eq!(next.streams()[0].status, StreamStatus::Active);
            }
        }

        #[test]
        fn prop_quic_losses_stay_on_their_stream(seed in any::<u64>(), loss in 0.0f64..=100.0) {
            let set = StreamSet::with_streams(Protocol::Quic, 4).unwrap();
            let (next, report) = deliver_burst(&set, &lossy(loss), seed);

            for stream in next.streams() {
                let lost = stream.count(PacketOutcome::Lost);
                prop_assert_eq!(stream.count(PacketOutcome::HeldBack), 0);
                if lost == 0 {
                    prop_assert_eq!(stream.status, StreamStatus::Active);
                    prop_assert!(!report.impaired.contains(&stream.id));
                } else {
                    prop_assert_eq!(stream.status, StreamStatus::Retransmitting);
                    prop_assert!(report.impaired.contains(&stream.id));
                }
            }
        }

        #[test]
        fn prop_throughput_falls_with_loss(
            bandwidth in 0.1f64..10_000.0,
            a in 0.0f64..=100.0,
            b in 0.0f64..=100.0,
        ) {
            let (low, high) = if a <= b { (a, b) } else { (b, a) };
            let base = NetworkProfile::default().with_bandwidth(bandwidth).unwrap();
            let less = base.with_loss_rate(low).unwrap();
            let more = base.with_loss_rate(high).unwrap();
            for protocol in Protocol::ALL {
                prop_assert!(throughput(protocol, &more) <= throughput(protocol, &less));
            }
        }

        #[test]
        fn prop_quic_outperforms_tcp_under_loss(
            bandwidth in 0.1f64..10_000.0,
            loss in 0.001f64..=100.0,
        ) {
            let p = NetworkProfile::default()
                .with_bandwidth(bandwidth)
                .unwrap()
                .with_loss_rate(loss)
                .unwrap();
            prop_assert!(throughput(Protocol::Quic, &p) >= throughput(Protocol::TcpTls, &p));
        }
    }
}
