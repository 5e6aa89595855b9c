//! Kestrel Taskbar
//!
//! Companion process of the `kestrel` compositor. Mirrors the managed windows
//! as a row of icons and turns icon presses into focus/minimize requests,
//! all through the shared notification channel.
//!
//! Usage: `kestrel-bar <channel-path> <width> <height>`

mod icons;
mod mirror;

use anyhow::{Context, Result};
use icons::IconResolver;
use kestrel_ipc::{Action, Record, SharedChannel};
use mirror::IconMirror;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{debug, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// UI frame period; the channel is polled once per frame
const FRAME_INTERVAL: Duration = Duration::from_millis(16);

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "kestrel_bar=debug,info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args: Vec<String> = std::env::args().collect();
    if args.len() < 4 {
        anyhow::bail!("usage: kestrel-bar <channel-path> <width> <height>");
    }
    let width: i32 = args[2].parse().context("Invalid screen width")?;
    let height: i32 = args[3].parse().context("Invalid screen height")?;

    let mut channel = SharedChannel::open(&args[1])
        .with_context(|| format!("Failed to attach to notification channel {}", args[1]))?;
    info!("Starting Kestrel taskbar ({}x{} screen)", width, height);

    let resolver = IconResolver::from_xdg();
    let mut mirror = IconMirror::new(width as f32);

    let mut frame = tokio::time::interval(FRAME_INTERVAL);
    let mut input = BufReader::new(tokio::io::stdin()).lines();
    let mut input_open = true;

    loop {
        tokio::select! {
            _ = frame.tick() => {
                // Only acts when the slot changed
                if let Some(record) = channel.poll() {
                    debug!("Received {:?}", record);
                    if mirror.apply(&record, &resolver) {
                        log_layout(&mirror);
                    }
                }
            }

            line = input.next_line(), if input_open => {
                match line {
                    Ok(Some(line)) => handle_input(&line, &mut mirror, &mut channel),
                    Ok(None) => {
                        debug!("Pointer input closed");
                        input_open = false;
                    }
                    Err(e) => {
                        warn!("Failed to read pointer input: {}", e);
                        input_open = false;
                    }
                }
            }

            _ = tokio::signal::ctrl_c() => {
                info!("Shutting down taskbar");
                break;
            }
        }
    }

    Ok(())
}

/// Handle one line of pointer input (`press <x> <y>`)
fn handle_input(line: &str, mirror: &mut IconMirror, channel: &mut SharedChannel) {
    let Some((x, y)) = parse_press(line) else {
        debug!("Ignoring input {:?}", line);
        return;
    };

    if let Some(action) = mirror.press(x, y) {
        send(channel, action);
    }
}

fn parse_press(line: &str) -> Option<(f32, f32)> {
    let mut parts = line.split_whitespace();
    if parts.next()? != "press" {
        return None;
    }
    let x = parts.next()?.parse().ok()?;
    let y = parts.next()?.parse().ok()?;
    Some((x, y))
}

fn send(channel: &mut SharedChannel, action: Action) {
    let record = Record::from_taskbar(action);
    if let Err(e) = channel.publish(&record) {
        warn!("Failed to send {:?}: {}", record.action, e);
    }
}

fn log_layout(mirror: &IconMirror) {
    let (width, height) = mirror.size();
    debug!("Bar {}x{} with {} icons", width, height, mirror.icons().len());
    for (index, icon) in mirror.icons().iter().enumerate() {
        let image = mirror::image_rect(index);
        debug!(
            "icon {} window={} app={} title={:?} state={:?} focused={} image {:?} at ({}, {})",
            index,
            icon.window_id,
            icon.app_id,
            icon.title,
            icon.state,
            icon.focused,
            icon.icon_path,
            image.x,
            image.y
        );
    }
}
