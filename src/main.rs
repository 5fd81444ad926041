//! holdfast - headless client for the two-player site-capture game
//!
//! Replays scripted sessions or observes a live server.

mod config;
mod replay;

use anyhow::{Context, Result};
use config::ClientConfig;
use holdfast_client::{Client, ReceiveOutcome, SharedClient};
use replay::{StateLogEntry, StateLogger};
use std::net::TcpStream;
use std::time::{Duration, Instant};
use std::{env, path::PathBuf};
use tracing::info;
use tracing_subscriber::{fmt, layer::SubscriberExt, reload, util::SubscriberInitExt, EnvFilter};

fn main() -> Result<()> {
    // Warn by default until the config is read; RUST_LOG always wins.
    let env_filter = EnvFilter::try_from_default_env().ok();
    let from_env = env_filter.is_some();
    let (filter, filter_handle) =
        reload::Layer::new(env_filter.unwrap_or_else(|| EnvFilter::new("warn")));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = CliOptions::parse(env::args().skip(1));
    let config = match cli.config.as_deref() {
        Some(path) => ClientConfig::load_from_path(path),
        None => ClientConfig::load(),
    };
    if !from_env {
        match EnvFilter::try_new(&config.log_filter) {
            Ok(configured) => {
                if let Err(err) = filter_handle.reload(configured) {
                    tracing::warn!(%err, "Failed to apply configured log filter");
                }
            }
            Err(err) => {
                tracing::warn!(%err, filter = %config.log_filter, "Invalid log_filter; keeping warn");
            }
        }
    }

    info!("Starting holdfast v{}", env!("CARGO_PKG_VERSION"));

    let mut state_log = match cli.state_log.as_deref() {
        Some(path) => Some(StateLogger::create(path)?),
        None => None,
    };

    match cli.replay.as_deref() {
        Some(path) => {
            let entries = replay::load_script(path)?;
            let mut client = Client::new(cli.player);
            let summary = replay::run(&mut client, &entries, config.max_frame_dt, state_log.as_mut())?;
            info!(
                frames = summary.frames,
                ticks = summary.ticks,
                accepted = summary.intents_accepted,
                rejected = summary.intents_rejected,
                sent = summary.outbound.len(),
                exited = summary.exited,
                "Replay finished"
            );
            if let Some(log) = &state_log {
                info!(entries = log.entries_written(), "State log written");
            }
            for message in &summary.outbound {
                println!("{message}");
            }
            Ok(())
        }
        None => {
            let addr = cli
                .server
                .clone()
                .unwrap_or_else(|| config.server_addr.clone());
            observe(&addr, cli.player, &config, state_log.as_mut())
        }
    }
}

/// Connect, apply everything the server sends, and keep simulating until it
/// closes the session.
fn observe(
    addr: &str,
    player: u8,
    config: &ClientConfig,
    state_log: Option<&mut StateLogger>,
) -> Result<()> {
    let mut stream =
        TcpStream::connect(addr).with_context(|| format!("Failed to connect to {addr}"))?;
    info!(%addr, "Connected to server");

    let shared = SharedClient::new(Client::new(player));
    let reader = stream.try_clone().context("Failed to clone server stream")?;
    let receiver = shared
        .spawn_receiver(reader, config.framing)
        .context("Failed to spawn receive thread")?;

    let frame_time = Duration::from_secs_f32(1.0 / config.frame_rate as f32);
    let mut last = Instant::now();
    let mut sent = 0;
    while !receiver.is_finished() {
        std::thread::sleep(frame_time);
        let now = Instant::now();
        shared.tick(now.duration_since(last).as_secs_f32().min(config.max_frame_dt));
        last = now;
        sent += shared
            .flush_outbound(&mut stream, config.framing)
            .context("Failed to send to server")?;
    }

    match receiver.join() {
        Ok(ReceiveOutcome::Failed(err)) => {
            return Err(err).context("Connection to server failed");
        }
        Ok(outcome) => info!(?outcome, sent, "Session ended"),
        Err(_) => anyhow::bail!("Receive thread panicked"),
    }

    if let Some(log) = state_log {
        log.log(&StateLogEntry {
            step: 0,
            outbound: &[],
            state: &shared.snapshot(),
        })?;
        log.flush()?;
    }
    Ok(())
}

/// Command-line options.
#[derive(Debug, Clone, PartialEq)]
struct CliOptions {
    config: Option<PathBuf>,
    replay: Option<PathBuf>,
    state_log: Option<PathBuf>,
    server: Option<String>,
    player: u8,
}

impl CliOptions {
    fn parse<I: Iterator<Item = String>>(mut args: I) -> Self {
        let mut opts = CliOptions {
            config: None,
            replay: None,
            state_log: None,
            server: None,
            player: 1,
        };

        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--config" => {
                    if let Some(path) = args.next() {
                        opts.config = Some(PathBuf::from(path));
                    } else {
                        tracing::error!("--config requires a file path");
                    }
                }
                "--replay" => {
                    if let Some(path) = args.next() {
                        opts.replay = Some(PathBuf::from(path));
                    } else {
                        tracing::error!("--replay requires a file path");
                    }
                }
                "--state-log" => {
                    if let Some(path) = args.next() {
                        opts.state_log = Some(PathBuf::from(path));
                    } else {
                        tracing::error!("--state-log requires a file path");
                    }
                }
                "--server" => {
                    if let Some(addr) = args.next() {
                        opts.server = Some(addr);
                    } else {
                        tracing::error!("--server requires host:port");
                    }
                }
                "--player" => {
                    if let Some(raw) = args.next() {
                        match raw.parse::<u8>() {
                            Ok(value @ (1 | 2)) => opts.player = value,
                            Ok(value) => {
                                tracing::error!(value, "--player must be 1 or 2");
                            }
                            Err(err) => {
                                tracing::error!(%err, value = %raw, "--player must be an integer");
                            }
                        }
                    } else {
                        tracing::error!("--player requires 1 or 2");
                    }
                }
                other => {
                    tracing::warn!(arg = other, "Ignoring unknown argument");
                }
            }
        }

        opts
    }
}
