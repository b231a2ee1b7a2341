//! Tvilling command-line front end.
//!
//! # Usage
//!
//! ```bash
//! # Both handshakes on an average network
//! tvilling handshake
//!
//! # Head-of-line blocking on a lossy link
//! tvilling --preset poor stream --bursts 5
//!
//! # Walk from wifi to cellular and back, keeping the conditions
//! tvilling --settings tvilling.json --latency 80 --save migrate cellular wifi
//! ```

use std::{path::PathBuf, time::Duration};

use clap::{Parser, Subcommand};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};
use tvilling_cli::{CliError, Driver, SettingsStore, SystemEnv, load_config, unix_millis};
use tvilling_core::{handshake, stream::throughput};
use tvilling_engine::{Command, EngineConfig};
use tvilling_proto::{DemoKind, NetworkProfile, Preset, Protocol, Settings, Zone};

/// Tvilling protocol comparison
#[derive(Parser, Debug)]
#[command(name = "tvilling")]
#[command(about = "Compare TCP+TLS and QUIC under synthetic network conditions")]
#[command(version)]
struct Args {
    /// Network preset (excellent, good, average, poor, terrible)
    #[arg(long, global = true)]
    preset: Option<String>,

    /// Latency in milliseconds, applied after the preset
    #[arg(long, global = true)]
    latency: Option<f64>,

    /// Packet loss in percent, applied after the preset
    #[arg(long, global = true)]
    loss: Option<f64>,

    /// Bandwidth in Mbps, applied after the preset
    #[arg(long, global = true)]
    bandwidth: Option<f64>,

    /// Animation speed multiplier (0, 10]
    #[arg(long, global = true)]
    speed: Option<f64>,

    /// Settings record to start from
    #[arg(long, global = true)]
    settings: Option<PathBuf>,

    /// Write the final conditions back to the settings record
    #[arg(long, global = true, requires = "settings")]
    save: bool,

    /// Engine configuration (TOML)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    demo: Demo,
}

#[derive(Subcommand, Debug)]
enum Demo {
    /// Connection setup, one packet exchange at a time
    Handshake {
        /// Only this protocol (tcp, quic)
        #[arg(long)]
        protocol: Option<String>,

        /// Step without waiting for the network
        #[arg(long)]
        manual: bool,
    },

    /// Scrub the handshake timeline
    Timeline {
        /// Jump to this position (0-100) instead of playing
        #[arg(long)]
        seek: Option<f64>,
    },

    /// Packet bursts over one ordered stream and many independent ones
    Stream {
        /// Extra multiplexed streams to open first
        #[arg(long, default_value_t = 0)]
        add: usize,

        /// Bursts to send
        #[arg(long, default_value_t = 3)]
        bursts: u64,

        /// Loss seed of the first burst; later bursts count up from it
        #[arg(long)]
        seed: Option<u64>,
    },

    /// Move between network zones
    Migrate {
        /// Zones to visit in order
        #[arg(default_value = "cellular")]
        zones: Vec<String>,
    },

    /// Synthetic throughput, connection and recovery benchmark
    Benchmark {
        /// Run length in milliseconds
        #[arg(long, default_value_t = 5_000)]
        duration_ms: u64,

        /// Parallel connections per protocol
        #[arg(long, default_value_t = 1)]
        connections: u32,
    },
}

/// Slack on top of a demo's expected duration before giving up.
const GRACE: Duration = Duration::from_secs(1);

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    tracing_subscriber::registry().with(fmt::layer()).with(filter).init();

    let config = match &args.config {
        Some(path) => load_config(path)?,
        None => EngineConfig::default(),
    };

    let store = args.settings.as_ref().map(SettingsStore::new);
    let saved = store.as_ref().map_or_else(Settings::default, SettingsStore::load);
    let profile = profile(&args, &saved)?;
    let speed = args.speed.unwrap_or(saved.speed);

    let mut driver = Driver::new(SystemEnv::new(), config)?;
    driver.execute(Command::SetNetworkProfile(profile))?;
    driver.execute(Command::SetSpeed(speed))?;

    run_demo(&mut driver, args.demo).await?;

    if args.save
        && let Some(store) = &store
    {
        store.save(&Settings::from_profile(*driver.engine().profile(), speed, unix_millis()))?;
    }

    Ok(())
}

/// Saved conditions, then the preset, then individual overrides.
fn profile(args: &Args, saved: &Settings) -> Result<NetworkProfile, CliError> {
    let mut profile = match &args.preset {
        Some(name) => name.parse::<Preset>()?.profile(),
        None => saved.profile()?,
    };
    if let Some(latency) = args.latency {
        profile = profile.with_latency(latency)?;
    }
    if let Some(loss) = args.loss {
        profile = profile.with_loss_rate(loss)?;
    }
    if let Some(bandwidth) = args.bandwidth {
        profile = profile.with_bandwidth(bandwidth)?;
    }
    Ok(profile)
}

async fn run_demo(driver: &mut Driver<SystemEnv>, demo: Demo) -> Result<(), CliError> {
    match demo {
        Demo::Handshake { protocol, manual } => {
            let protocols = match protocol {
                Some(name) => vec![name.parse::<Protocol>()?],
                None => Protocol::ALL.to_vec(),
            };
            run_handshake(driver, &protocols, manual).await
        },
        Demo::Timeline { seek } => run_timeline(driver, seek).await,
        Demo::Stream { add, bursts, seed } => run_stream(driver, add, bursts, seed).await,
        Demo::Migrate { zones } => {
            let zones = zones.iter().map(|z| z.parse::<Zone>()).collect::<Result<Vec<_>, _>>()?;
            run_migration(driver, &zones).await
        },
        Demo::Benchmark { duration_ms, connections } => {
            run_benchmark(driver, duration_ms, connections).await
        },
    }
}

async fn run_handshake(
    driver: &mut Driver<SystemEnv>,
    protocols: &[Protocol],
    manual: bool,
) -> Result<(), CliError> {
    driver.execute(Command::SwitchDemo(DemoKind::Handshake))?;

    if manual {
        for &protocol in protocols {
            while !driver.engine().handshake(protocol).is_complete() {
                driver.execute(Command::StepHandshake(protocol))?;
            }
        }
        return Ok(());
    }

    for &protocol in protocols {
        driver.execute(Command::StartHandshake(protocol))?;
    }

    let profile = *driver.engine().profile();
    let longest = protocols
        .iter()
        .map(|&p| handshake::total_duration_ms(p, &profile))
        .fold(0.0, f64::max);
    let limit = Duration::from_secs_f64(longest / 1_000.0) + GRACE;

    driver
        .run_until(limit, |engine| protocols.iter().all(|&p| engine.handshake(p).is_complete()))
        .await?;
    Ok(())
}

async fn run_timeline(driver: &mut Driver<SystemEnv>, seek: Option<f64>) -> Result<(), CliError> {
    driver.execute(Command::SwitchDemo(DemoKind::Handshake))?;

    if let Some(position) = seek {
        driver.execute(Command::Seek(position))?;
    } else {
        driver.execute(Command::Play)?;
        driver.run_until(Duration::from_secs(60), |engine| !engine.timeline().playing).await?;
    }

    let timeline = driver.engine().timeline();
    tracing::info!(
        position = timeline.position,
        virtual_ms = timeline.virtual_ms,
        tcp_steps = timeline.tcp.completed_steps,
        quic_steps = timeline.quic.completed_steps,
        "timeline"
    );
    Ok(())
}

async fn run_stream(
    driver: &mut Driver<SystemEnv>,
    add: usize,
    bursts: u64,
    seed: Option<u64>,
) -> Result<(), CliError> {
    driver.execute(Command::SwitchDemo(DemoKind::Streaming))?;
    for _ in 0..add {
        driver.execute(Command::AddStream)?;
    }

    let recovery = Duration::from_millis(driver.engine().config().stream_recovery_ms);
    for i in 0..bursts {
        driver.execute(Command::SendBurst { seed: seed.map(|s| s.wrapping_add(i)) })?;
        driver.run_for(recovery).await?;
    }

    let profile = driver.engine().profile();
    for protocol in Protocol::ALL {
        tracing::info!(%protocol, mbps = throughput(protocol, profile), "effective throughput");
    }
    Ok(())
}

async fn run_migration(driver: &mut Driver<SystemEnv>, zones: &[Zone]) -> Result<(), CliError> {
    driver.execute(Command::SwitchDemo(DemoKind::Migration))?;

    let delay = driver.engine().config().migration_recovery.resolve(driver.engine().profile());
    let limit = Duration::from_millis(delay) + GRACE;

    for &zone in zones {
        driver.execute(Command::ChangeZone(zone))?;
        driver.run_until(limit, |engine| !engine.migration().is_settling()).await?;
    }
    Ok(())
}

async fn run_benchmark(
    driver: &mut Driver<SystemEnv>,
    duration_ms: u64,
    connections: u32,
) -> Result<(), CliError> {
    driver.execute(Command::SwitchDemo(DemoKind::Performance))?;
    driver.execute(Command::StartBenchmark { duration_ms, connection_count: connections })?;

    let limit = Duration::from_millis(duration_ms) + GRACE;
    let finished = driver
        .run_until(limit, |engine| engine.benchmark().is_none_or(|run| !run.is_running()))
        .await?;
    if !finished {
        driver.execute(Command::StopBenchmark)?;
    }
    Ok(())
}
