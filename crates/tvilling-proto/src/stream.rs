//! Stream and packet delivery records.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Stream identifier, starting at 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct StreamId(pub u8);

impl fmt::Display for StreamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "stream {}", self.0)
    }
}

/// Delivery status of a stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum StreamStatus {
    /// Delivering normally.
    #[default]
    Active,
    /// Head-of-line blocked behind a lost packet.
    Blocked,
    /// Recovering a lost packet while other streams continue.
    Retransmitting,
}

impl fmt::Display for StreamStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Active => f.write_str("Active"),
            Self::Blocked => f.write_str("Blocked"),
            Self::Retransmitting => f.write_str("Retransmit"),
        }
    }
}

/// What happened to one packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PacketOutcome {
    /// Arrived and was handed to the application.
    Delivered,
    /// Dropped by the network.
    Lost,
    /// Arrived but is stuck behind an earlier loss in the same ordered
    /// stream.
    HeldBack,
    /// Was lost, then delivered by a retransmission.
    Retransmitted,
}

/// A packet in a stream's history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Packet {
    /// Sequence number within the stream, starting at 1.
    pub seq: u32,
    /// Delivery outcome.
    pub outcome: PacketOutcome,
}

/// One ordered stream and the packets sent on it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stream {
    /// Stream identifier.
    pub id: StreamId,
    /// Current status.
    pub status: StreamStatus,
    /// Packets in send order.
    pub packets: Vec<Packet>,
}

impl Stream {
    /// A fresh active stream with no packets.
    pub const fn new(id: StreamId) -> Self {
        Self { id, status: StreamStatus::Active, packets: Vec::new() }
    }

    /// Sequence number the next packet will get.
    pub fn next_seq(&self) -> u32 {
        self.packets.last().map_or(1, |p| p.seq + 1)
    }

    /// Number of packets with the given outcome.
    pub fn count(&self, outcome: PacketOutcome) -> usize {
        self.packets.iter().filter(|p| p.outcome == outcome).count()
    }

    /// Packets the application has received, in or out of a retransmission.
    pub fn delivered(&self) -> usize {
        self.count(PacketOutcome::Delivered) + self.count(PacketOutcome::Retransmitted)
    }
}
