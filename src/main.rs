//! touchstrip - capacitive touch strip gesture daemon
//!
//! Reads six-channel frames from the sensor board, classifies taps, holds
//! and releases per strip zone, and runs the bound media actions.
//!
//! # Usage
//!
//! ```bash
//! # Sensor board on the default serial port
//! touchstrip
//!
//! # Explicit port and baud
//! touchstrip --serial /dev/ttyACM0 --baud 115200
//!
//! # Synthetic frames from the simulator
//! touch-sim --gestures 20 | touchstrip --stdin
//!
//! # Serial bridge over the network
//! touchstrip --tcp 192.168.1.40:2000
//!
//! # Replay a captured session at 100 Hz, gestures as JSON lines on stdout
//! touchstrip --replay capture.txt --replay-delay-ms 10 --events-json
//! ```
//!
//! # Environment Variables
//!
//! - `TOUCHSTRIP_CONFIG`: Path to the TOML config (overridden by `--config`)
//! - `RUST_LOG`: Logging level (default: info)

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use touchstrip::actions::{registry_from_config, ActionDispatcher, ActionState};
use touchstrip::config::TouchConfig;
use touchstrip::gesture::{ClassifierParams, GestureClassifier};
use touchstrip::pipeline::{
    JsonEventWriter, LoopExit, ProcessingLoop, ReplaySource, SampleSource, SerialSource,
    StdinSource, TcpSource,
};

// ============================================================================
// CLI Arguments
// ============================================================================

#[derive(Parser, Debug)]
#[command(name = "touchstrip")]
#[command(about = "Capacitive touch strip gesture recognizer")]
#[command(version)]
struct CliArgs {
    /// Serial device of the sensor board (overrides serial.port)
    #[arg(long, value_name = "PATH")]
    serial: Option<String>,

    /// Serial baud rate (overrides serial.baud)
    #[arg(long)]
    baud: Option<u32>,

    /// Read frames from a TCP serial bridge instead of a local port
    #[arg(long, value_name = "HOST:PORT", conflicts_with_all = ["stdin", "replay"])]
    tcp: Option<String>,

    /// Read frames from stdin (e.g. piped from touch-sim)
    #[arg(long, conflicts_with = "replay")]
    stdin: bool,

    /// Replay a captured frame file
    #[arg(long, value_name = "FILE")]
    replay: Option<PathBuf>,

    /// Delay between replayed lines; 0 replays as fast as possible
    #[arg(long, default_value = "10")]
    replay_delay_ms: u64,

    /// Config file (default: $TOUCHSTRIP_CONFIG, then ./touchstrip.toml)
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Print each gesture as a JSON line on stdout
    #[arg(long)]
    events_json: bool,

    /// Emit logs as JSON
    #[arg(long)]
    log_json: bool,

    /// Print the effective configuration as TOML and exit
    #[arg(long)]
    dump_config: bool,
}

impl CliArgs {
    fn apply_overrides(&self, config: &mut TouchConfig) {
        if let Some(port) = &self.serial {
            config.serial.port.clone_from(port);
        }
        if let Some(baud) = self.baud {
            config.serial.baud = baud;
        }
    }
}

// ============================================================================
// Setup
// ============================================================================

/// Logs go to stderr so stdout stays clean for `--events-json`.
fn init_logging(json: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    if json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .with_writer(std::io::stderr)
            .init();
    }
}

fn parse_host_port(addr: &str) -> Result<(&str, u16)> {
    let (host, port) = addr
        .rsplit_once(':')
        .ok_or_else(|| anyhow::anyhow!("Invalid TCP address '{addr}'. Expected HOST:PORT"))?;
    if host.is_empty() {
        anyhow::bail!("Invalid TCP address '{addr}'. Host is empty");
    }
    let port: u16 = port.parse().context("Invalid port number")?;
    Ok((host, port))
}

async fn open_source(args: &CliArgs, config: &TouchConfig) -> Result<Box<dyn SampleSource>> {
    if let Some(addr) = &args.tcp {
        let (host, port) = parse_host_port(addr)?;
        info!(address = %addr, "Input: TCP serial bridge");
        let source = TcpSource::connect(host, port, config.tcp.clone())
            .await
            .with_context(|| format!("Failed to connect to {addr}"))?;
        Ok(Box::new(source))
    } else if args.stdin {
        info!("Input: stdin");
        Ok(Box::new(StdinSource::stdin()))
    } else if let Some(path) = &args.replay {
        let source = ReplaySource::open(path, Duration::from_millis(args.replay_delay_ms))
            .await
            .context("Failed to open replay file")?;
        Ok(Box::new(source))
    } else {
        info!(port = %config.serial.port, baud = config.serial.baud, "Input: serial");
        let source = SerialSource::connect(&config.serial)
            .await
            .with_context(|| format!("Failed to open serial port {}", config.serial.port))?;
        Ok(Box::new(source))
    }
}

// ============================================================================
// Main Entry Point
// ============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    let args = CliArgs::parse();
    init_logging(args.log_json);

    let mut config =
        TouchConfig::load(args.config.as_deref()).context("Failed to load configuration")?;
    args.apply_overrides(&mut config);
    config.validate().context("Invalid command-line overrides")?;

    if args.dump_config {
        print!("{}", config.to_toml()?);
        return Ok(());
    }

    let registry = registry_from_config(&config.actions, &config.volume)
        .context("Invalid action bindings")?;
    info!(bindings = ?registry, "Actions bound");

    let initial_state = ActionState::new(&config.volume);
    let classifier = GestureClassifier::new(ClassifierParams::from(&config.gesture));
    info!(
        activate = config.gesture.activate_threshold,
        deactivate = config.gesture.deactivate_threshold,
        red_pos = config.gesture.red_pos_threshold,
        blue_pos = config.gesture.blue_pos_threshold,
        hold_window_ms = config.gesture.hold_window_ms,
        volume = initial_state.volume,
        "Gesture classifier ready"
    );

    // Graceful shutdown via Ctrl+C
    let cancel_token = CancellationToken::new();
    let shutdown_token = cancel_token.clone();
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        info!("Received Ctrl+C, shutting down");
        shutdown_token.cancel();
    });

    let mut source = tokio::select! {
        _ = cancel_token.cancelled() => return Ok(()),
        source = open_source(&args, &config) => source?,
    };

    let hooks = args
        .events_json
        .then(|| JsonEventWriter::new(std::io::stdout()));
    let mut pipeline = ProcessingLoop::new(
        classifier,
        ActionDispatcher::new(registry, initial_state),
        hooks,
        cancel_token.clone(),
    )
    .with_gap_warning(config.source.gap_warning());

    let exit = loop {
        match pipeline.run(source.as_mut()).await {
            Ok(exit) => break exit,
            Err(e) => {
                error!(source = source.source_name(), error = %e, "Connection lost");
                pipeline.reset_interaction();

                let reconnected = tokio::select! {
                    _ = cancel_token.cancelled() => break LoopExit::Cancelled,
                    result = source.reconnect() => result,
                };
                if let Err(e) = reconnected {
                    pipeline.log_summary();
                    return Err(e).context("Sample source could not be re-established");
                }
                info!(source = source.source_name(), "Source reconnected");
            }
        }
    };

    pipeline.log_summary();
    info!(reason = ?exit, "touchstrip shutdown complete");
    Ok(())
}
