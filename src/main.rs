//! Kestrel - Wayland compositor core
//!
//! Window registry with focus tracking, window state transitions, interactive
//! move/resize and the shared-memory link to the `kestrel-bar` taskbar.
//! The binary drives the compositor through the headless backend from a
//! newline-delimited JSON event script (or stdin).

mod backend;
mod config;
mod shared;
mod wm;

use anyhow::{Context, Result};
use std::path::PathBuf;
use std::time::Duration;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use backend::{BackendEvent, HeadlessBackend};
use kestrel_ipc::SharedChannel;
use wm::Compositor;

/// Frame period; the taskbar channel is polled once per frame
const FRAME_INTERVAL: Duration = Duration::from_millis(16);

/// Command line options
#[derive(Debug, Default)]
struct Args {
    /// Extra command run after the configured startup commands
    startup: Option<String>,
    /// Event script for the headless backend; stdin when absent
    script: Option<PathBuf>,
}

impl Args {
    fn parse(args: impl IntoIterator<Item = String>) -> Result<Self> {
        let mut parsed = Self::default();
        let mut args = args.into_iter();
        while let Some(arg) = args.next() {
            match arg.as_str() {
                "-s" | "--startup" => {
                    parsed.startup = Some(args.next().context("--startup needs a command")?);
                }
                "--headless-script" => {
                    let path = args.next().context("--headless-script needs a path")?;
                    parsed.script = Some(PathBuf::from(path));
                }
                other => warn!("Ignoring unknown argument {:?}", other),
            }
        }
        Ok(parsed)
    }
}

/// Parse one script line; blank lines and `#` comments yield nothing
fn parse_event(line: &str) -> Option<Result<BackendEvent>> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return None;
    }
    Some(serde_json::from_str(line).with_context(|| format!("Invalid event {:?}", line)))
}

/// Forward events from `reader` until it runs dry
async fn read_events<R: AsyncBufRead + Unpin>(reader: R, tx: mpsc::Sender<BackendEvent>) {
    let mut lines = reader.lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => match parse_event(&line) {
                Some(Ok(event)) => {
                    if tx.send(event).await.is_err() {
                        break;
                    }
                }
                Some(Err(e)) => warn!("{:#}", e),
                None => {}
            },
            Ok(None) => break,
            Err(e) => {
                warn!("Failed to read events: {}", e);
                break;
            }
        }
    }
    debug!("Event source closed");
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "kestrel=debug,info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Kestrel compositor");

    let args = Args::parse(std::env::args().skip(1))?;
    let config = config::Config::load().context("Failed to load configuration")?;

    let channel_path = kestrel_ipc::channel_path();
    let channel = SharedChannel::create(&channel_path, config.taskbar.channel_capacity)
        .with_context(|| format!("Failed to create notification channel {:?}", channel_path))?;
    info!("Notification channel at {:?}", channel_path);

    let mut compositor = Compositor::new(HeadlessBackend::with_processes(), config, channel);
    compositor.run_startup(args.startup.as_deref());

    let (tx, mut events) = mpsc::channel::<BackendEvent>(64);
    match args.script {
        Some(path) => {
            let file = tokio::fs::File::open(&path)
                .await
                .with_context(|| format!("Failed to open event script {:?}", path))?;
            tokio::spawn(read_events(BufReader::new(file), tx));
        }
        None => {
            tokio::spawn(read_events(BufReader::new(tokio::io::stdin()), tx));
        }
    }

    // Handle SIGTERM and SIGINT
    use tokio::signal::unix::{signal, SignalKind};
    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigint = signal(SignalKind::interrupt())?;

    let mut frame = tokio::time::interval(FRAME_INTERVAL);

    while compositor.is_running() {
        tokio::select! {
            event = events.recv() => {
                match event {
                    Some(event) => compositor.dispatch(event),
                    None => {
                        info!("No more backend events");
                        break;
                    }
                }
            }

            _ = frame.tick() => compositor.poll_taskbar(),

            _ = sigterm.recv() => {
                info!("Received SIGTERM, shutting down gracefully");
                break;
            }
            _ = sigint.recv() => {
                info!("Received SIGINT, shutting down gracefully");
                break;
            }
        }
    }

    info!("Shutting down, {} windows left", compositor.registry.len());
    // Dropping the compositor stops the taskbar and unlinks the channel
    drop(compositor);
    Ok(())
}
