//! Audio Streamer Application
//!
//! Captures raw sample blocks and streams them to the collector over UDP.
//!
//! Usage: `streamer [CONFIG_PATH]`

use anyhow::{Context, Result};
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use udp_audio_streamer::{
    config::{AppConfig, SourceKind},
    pipeline::{Pipeline, StatsSnapshot},
};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting UDP Audio Streamer");

    let config_path = std::env::args().nth(1).map(PathBuf::from);
    let config = AppConfig::load(config_path.as_deref()).context("Failed to load configuration")?;

    if config.acquisition.source == SourceKind::Device {
        print_input_devices();
    }

    tracing::info!(
        "Acquisition: {:?} source, {} Hz, {}-bit, {} channel(s), {} byte blocks every {:?}",
        config.acquisition.source,
        config.acquisition.sample_rate(),
        config.acquisition.bits_per_sample(),
        config.acquisition.channels,
        config.acquisition.block_size,
        config.acquisition.block_period()
    );
    tracing::info!(
        "Collector: {}{}",
        config.network.destination,
        if config.network.dry_run { " (dry run)" } else { "" }
    );

    let stats_interval = Duration::from_secs(config.tasks.stats_interval_secs.max(1));

    let pipeline = Pipeline::from_config(config).context("Failed to build pipeline")?;
    let handle = pipeline.start().context("Failed to start pipeline")?;
    let stats = handle.stats();

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    let mut stats_timer = tokio::time::interval(stats_interval);
    let mut liveness_timer = tokio::time::interval(Duration::from_millis(200));

    loop {
        tokio::select! {
            _ = &mut shutdown => {
                tracing::info!("Interrupted, exiting");
                log_stats(&stats.snapshot());
                return Ok(());
            }
            _ = stats_timer.tick() => log_stats(&stats.snapshot()),
            _ = liveness_timer.tick() => {
                if handle.is_finished() {
                    break;
                }
            }
        }
    }

    let exit = tokio::task::spawn_blocking(move || handle.join()).await?;
    log_stats(&stats.snapshot());

    if let Err(e) = &exit.acquisition {
        tracing::error!("Acquisition ended: {}", e);
    }
    if let Err(e) = &exit.transmission {
        tracing::error!("Transmission ended: {}", e);
    }

    exit.acquisition.context("Acquisition failed")?;
    exit.transmission.context("Transmission failed")?;
    Ok(())
}

fn log_stats(snap: &StatsSnapshot) {
    tracing::info!(
        "Stats: {} blocks captured, {} dropped ({:.1}%), {} datagrams sent, {:.1} KB sent, \
         {} send failures, {} sessions opened",
        snap.blocks_captured,
        snap.blocks_dropped,
        snap.drop_rate() * 100.0,
        snap.datagrams_sent,
        snap.bytes_sent as f64 / 1024.0,
        snap.send_failures,
        snap.sessions_opened
    );
    if let Ok(json) = serde_json::to_string(snap) {
        tracing::debug!("stats {}", json);
    }
}

#[cfg(feature = "cpal")]
fn print_input_devices() {
    println!("\n=== Available Input Devices ===");
    for device in udp_audio_streamer::audio::list_input_devices() {
        let default_marker = if device.is_default { " [DEFAULT]" } else { "" };
        println!("  {}{}", device.name, default_marker);
        println!("    Channels: {:?}", device.channels);
    }
    println!();
}

#[cfg(not(feature = "cpal"))]
fn print_input_devices() {
    tracing::warn!("Device source selected but this build has no `cpal` support");
}
