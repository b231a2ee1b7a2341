//! Event rendering.
//!
//! The terminal front end has no widgets: every engine event becomes a
//! structured log line, so `RUST_LOG` decides how much of the comparison
//! the user sees.

use tvilling_engine::{EngineEvent, LogLevel};
use tvilling_proto::{BenchmarkRun, HandshakeState, Protocol, Stream};

/// Render one engine event.
pub fn render(event: &EngineEvent) {
    match event {
        EngineEvent::Profile(profile) => tracing::info!(%profile, "network"),
        EngineEvent::DemoChanged(demo) => tracing::info!(%demo, "demo"),
        EngineEvent::Handshake(state) => handshake(state),
        EngineEvent::Streams(streams) => {
            for stream in streams.tcp.streams() {
                stream_line(Protocol::TcpTls, stream);
            }
            for stream in streams.quic.streams() {
                stream_line(Protocol::Quic, stream);
            }
        },
        EngineEvent::StreamRecovered { protocol, stream } => {
            tracing::debug!(%protocol, %stream, "stream recovered");
        },
        EngineEvent::Migration(state) => tracing::info!(
            zone = %state.current_zone,
            tcp_connected = state.tcp.connected,
            tcp = ?state.tcp.status,
            quic_connected = state.quic.connected,
            quic = ?state.quic.status,
            connection_id = %state.quic.connection_id,
            "migration"
        ),
        EngineEvent::BenchmarkStarted { run } => tracing::debug!(run = run.0, "benchmark started"),
        EngineEvent::BenchmarkSample { run, sample } => tracing::debug!(
            run = run.0,
            t_ms = sample.t_offset_ms,
            tcp_mbps = sample.tcp.throughput_mbps,
            quic_mbps = sample.quic.throughput_mbps,
            "sample"
        ),
        EngineEvent::BenchmarkFinished(run) => report(run),
        EngineEvent::Timeline(snapshot) => tracing::debug!(
            position = snapshot.position,
            virtual_ms = snapshot.virtual_ms,
            tcp_steps = snapshot.tcp.completed_steps,
            quic_steps = snapshot.quic.completed_steps,
            playing = snapshot.playing,
            "timeline"
        ),
        EngineEvent::Log { level, message } => match level {
            LogLevel::Debug => tracing::debug!("{}", message),
            LogLevel::Info => tracing::info!("{}", message),
            LogLevel::Warn => tracing::warn!("{}", message),
        },
    }
}

/// Render every event in order.
pub fn render_all(events: &[EngineEvent]) {
    events.iter().for_each(render);
}

fn handshake(state: &HandshakeState) {
    tracing::info!(
        protocol = %state.protocol,
        step = state.completed_steps,
        of = state.protocol.handshake_steps().len(),
        rtt_ms = state.rtt_ms,
        client = ?state.endpoints.client,
        server = ?state.endpoints.server,
        complete = state.is_complete(),
        "handshake"
    );
}

fn stream_line(protocol: Protocol, stream: &Stream) {
    tracing::debug!(
        %protocol,
        stream = %stream.id,
        status = ?stream.status,
        packets = stream.packets.len(),
        delivered = stream.delivered(),
        "stream"
    );
}

/// Log the per-protocol means of a finished run side by side.
pub fn report(run: &BenchmarkRun) {
    let Some(summary) = run.summary() else {
        tracing::info!(run = run.id.0, status = ?run.status, "benchmark produced no samples");
        return;
    };

    tracing::info!(
        run = run.id.0,
        status = ?run.status,
        samples = summary.samples,
        connections = run.connection_count,
        "benchmark finished"
    );
    for protocol in Protocol::ALL {
        let m = match protocol {
            Protocol::TcpTls => &summary.tcp,
            Protocol::Quic => &summary.quic,
        };
        tracing::info!(
            %protocol,
            connect_ms = m.connection_time_ms,
            throughput_mbps = m.throughput_mbps,
            recovery_ms = m.recovery_time_ms,
            "mean"
        );
    }
}
