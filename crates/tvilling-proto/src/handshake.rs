//! Handshake steps and endpoint states.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::protocol::Protocol;

/// One message exchange in a connection handshake.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StepKind {
    /// TCP SYN.
    Syn,
    /// TCP SYN-ACK.
    SynAck,
    /// TCP ACK.
    Ack,
    /// TLS `ClientHello`.
    ClientHello,
    /// TLS `ServerHello` with certificate.
    ServerHello,
    /// TLS Finished.
    Finished,
    /// QUIC Initial carrying the TLS `ClientHello`.
    InitialTls,
    /// QUIC Handshake carrying the TLS `ServerHello`.
    Handshake,
    /// First 1-RTT application data.
    OneRttData,
}

/// Which way a step's packet travels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    /// Client to server.
    ClientToServer,
    /// Server to client.
    ServerToClient,
}

/// Coarse packet class used to label handshake packets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PacketCategory {
    /// Connection open.
    Syn,
    /// Acknowledgement.
    Ack,
    /// Cryptographic handshake.
    Tls,
    /// Application data.
    Data,
}

const TCP_TLS_STEPS: [StepKind; 6] = [
    StepKind::Syn,
    StepKind::SynAck,
    StepKind::Ack,
    StepKind::ClientHello,
    StepKind::ServerHello,
    StepKind::Finished,
];

const QUIC_STEPS: [StepKind; 3] = [StepKind::InitialTls, StepKind::Handshake, StepKind::OneRttData];

impl Protocol {
    /// Ordered handshake steps for this protocol.
    pub const fn handshake_steps(self) -> &'static [StepKind] {
        match self {
            Self::TcpTls => &TCP_TLS_STEPS,
            Self::Quic => &QUIC_STEPS,
        }
    }
}

impl StepKind {
    /// Protocol this step belongs to.
    pub const fn protocol(self) -> Protocol {
        match self {
            Self::Syn
            | Self::SynAck
            | Self::Ack
            | Self::ClientHello
            | Self::ServerHello
            | Self::Finished => Protocol::TcpTls,
            Self::InitialTls | Self::Handshake | Self::OneRttData => Protocol::Quic,
        }
    }

    /// Direction the step's packet travels.
    pub const fn direction(self) -> Direction {
        match self {
            Self::SynAck | Self::ServerHello | Self::Handshake => Direction::ServerToClient,
            Self::Syn
            | Self::Ack
            | Self::ClientHello
            | Self::Finished
            | Self::InitialTls
            | Self::OneRttData => Direction::ClientToServer,
        }
    }

    /// Packet class of the step.
    pub const fn category(self) -> PacketCategory {
        match self {
            Self::Syn => PacketCategory::Syn,
            Self::SynAck | Self::Ack => PacketCategory::Ack,
            Self::ClientHello
            | Self::ServerHello
            | Self::Finished
            | Self::InitialTls
            | Self::Handshake => PacketCategory::Tls,
            Self::OneRttData => PacketCategory::Data,
        }
    }

    /// Short label shown on a packet.
    pub const fn label(self) -> &'static str {
        match self {
            Self::Syn => "SYN",
            Self::SynAck => "SYN-ACK",
            Self::Ack => "ACK",
            Self::ClientHello => "ClientHello",
            Self::ServerHello => "ServerHello",
            Self::Finished => "Finished",
            Self::InitialTls => "Initial+TLS",
            Self::Handshake => "Handshake",
            Self::OneRttData => "1-RTT Data",
        }
    }

    /// One-line explanation of what the step accomplishes.
    pub const fn description(self) -> &'static str {
        match self {
            Self::Syn => "TCP SYN - Synchronization packet to initiate connection",
            Self::SynAck => "TCP SYN-ACK - Server acknowledges and requests connection",
            Self::Ack => "TCP ACK - Client acknowledges connection established",
            Self::ClientHello => "TLS ClientHello - Begin TLS handshake",
            Self::ServerHello => "TLS ServerHello - Server responds with certificate",
            Self::Finished => "TLS Finished - Handshake complete, ready for data",
            Self::InitialTls => {
                "QUIC Initial + TLS ClientHello - Combined transport and crypto handshake"
            },
            Self::Handshake => {
                "QUIC Handshake + TLS ServerHello - Server response with certificate"
            },
            Self::OneRttData => "1-RTT Application Data - Ready for data transmission",
        }
    }
}

impl fmt::Display for StepKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Connection state of one endpoint during a handshake.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum EndpointState {
    /// Nothing sent yet.
    #[default]
    Idle,
    /// TCP client sent SYN.
    SynSent,
    /// TCP server received SYN and answered.
    SynReceived,
    /// TCP connection open, TLS not started.
    Established,
    /// TLS hello exchanged.
    TlsHello,
    /// QUIC Initial exchanged.
    Initial,
    /// QUIC Handshake exchanged.
    Handshake,
    /// Handshake complete; application data may flow.
    Ready,
}

impl EndpointState {
    /// Upper-case label matching the usual protocol state names.
    pub const fn label(self) -> &'static str {
        match self {
            Self::Idle => "Idle",
            Self::SynSent => "SYN-SENT",
            Self::SynReceived => "SYN-RECV",
            Self::Established => "ESTABLISHED",
            Self::TlsHello => "TLS-HELLO",
            Self::Initial => "INITIAL",
            Self::Handshake => "HANDSHAKE",
            Self::Ready => "READY",
        }
    }
}

impl fmt::Display for EndpointState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Client and server state side by side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Endpoints {
    /// Client endpoint.
    pub client: EndpointState,
    /// Server endpoint.
    pub server: EndpointState,
}

impl Endpoints {
    /// Both endpoints idle.
    pub const IDLE: Self = Self { client: EndpointState::Idle, server: EndpointState::Idle };

    /// Both endpoints in the same state.
    pub const fn both(state: EndpointState) -> Self {
        Self { client: state, server: state }
    }

    /// Whether both endpoints finished the handshake.
    pub fn is_ready(&self) -> bool {
        self.client == EndpointState::Ready && self.server == EndpointState::Ready
    }
}

/// A step in a protocol's step table with its timing.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HandshakeStep {
    /// Zero-based position in the table.
    pub index: usize,
    /// What is exchanged.
    pub kind: StepKind,
    /// How long the exchange takes.
    pub duration_ms: f64,
    /// When the step starts, relative to handshake start.
    pub offset_ms: f64,
}

impl HandshakeStep {
    /// When the step has completed, relative to handshake start.
    pub fn completes_at_ms(&self) -> f64 {
        self.offset_ms + self.duration_ms
    }
}

/// Handshake progress of one protocol.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HandshakeState {
    /// Protocol being set up.
    pub protocol: Protocol,
    /// Number of steps fully completed (0 before the first one finishes).
    pub completed_steps: usize,
    /// Handshake time consumed by the completed steps.
    pub rtt_ms: f64,
    /// Endpoint states after the completed steps.
    pub endpoints: Endpoints,
}

impl HandshakeState {
    /// Fresh state before any step.
    pub const fn initial(protocol: Protocol) -> Self {
        Self { protocol, completed_steps: 0, rtt_ms: 0.0, endpoints: Endpoints::IDLE }
    }

    /// Whether every step of the protocol has completed.
    pub fn is_complete(&self) -> bool {
        self.completed_steps >= self.protocol.handshake_steps().len()
    }

    /// The most recently completed step, if any.
    pub fn last_step(&self) -> Option<StepKind> {
        self.completed_steps
            .checked_sub(1)
            .and_then(|i| self.protocol.handshake_steps().get(i).copied())
    }
}
