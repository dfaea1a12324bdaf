//! E-Paper panel driver service for Raspberry Pi
//!
//! A Rust-based service that:
//! - Drives a Waveshare monochrome e-paper panel over SPI
//! - Renders a local image to it at a configurable interval
//! - Runs as a systemd service with graceful shutdown

use anyhow::Context;
use clap::Parser;
use epaper_driver::config::{Config, DEFAULT_CONFIG_PATH};
use epaper_driver::display::{rpi, DisplayController, Model, Refresh};
use epaper_driver::render::ImageRenderer;
use epaper_driver::scheduler::Scheduler;
use std::time::Duration;
use tokio::sync::broadcast;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Command line arguments
#[derive(Parser, Debug)]
#[command(name = "epaper-driver")]
#[command(about = "Waveshare e-paper panel driver for Raspberry Pi")]
#[command(version)]
struct Args {
    /// Configuration file path
    #[arg(short, long, default_value = DEFAULT_CONFIG_PATH)]
    config: String,

    /// Panel model (overrides config), e.g. 2.90in
    #[arg(short, long)]
    model: Option<Model>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Show test pattern and exit
    #[arg(long)]
    test: bool,

    /// Clear display and exit
    #[arg(long)]
    clear: bool,

    /// Render the configured image once and exit
    #[arg(long)]
    once: bool,

    /// Write the effective configuration to the config path and exit
    #[arg(long)]
    write_config: bool,
}

/// Using current_thread runtime for single-core Pi Zero W
/// This reduces memory overhead and avoids thread synchronization costs
#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let loaded = Config::load_optional(&args.config);
    init_logging(args.verbose || matches!(&loaded, Ok(Some(c)) if c.verbose));

    // Only a missing file falls back to defaults; a bad one must not pick a panel
    let mut config = match loaded
        .with_context(|| format!("Invalid configuration in {}", args.config))?
    {
        Some(config) => config,
        None => {
            tracing::warn!("Config file {} not found, using defaults", args.config);
            Config::default()
        }
    };
    if let Some(model) = args.model {
        config.model = model;
    }
    if config.full_update_every >= 2 && !config.model.profile().switches_lut() {
        tracing::warn!(
            "full_update_every is ignored for the {} panel (always full refresh)",
            config.model
        );
    }

    if args.write_config {
        config
            .save(&args.config)
            .with_context(|| format!("Failed to write {}", args.config))?;
        tracing::info!("Configuration written to {}", args.config);
        return Ok(());
    }

    tracing::info!("Starting e-paper driver for the {} panel", config.model);

    let panel = rpi::open(&config).context("Failed to open display hardware")?;
    let display = DisplayController::new(panel);

    // Handle one-shot commands
    if args.test {
        tracing::info!("Running test pattern...");
        report(display.test_pattern().await?);
        return Ok(());
    }

    if args.clear {
        tracing::info!("Clearing display...");
        report(display.clear().await?);
        return Ok(());
    }

    let renderer = ImageRenderer::from_config(&config);
    let scheduler = Scheduler::new(
        display,
        renderer,
        Duration::from_secs(config.update_interval_secs),
    );

    if args.once {
        if scheduler.refresh_display().await.is_none() {
            anyhow::bail!("No image was displayed");
        }
        return Ok(());
    }

    // Setup shutdown signal handling
    let (shutdown_tx, _) = broadcast::channel::<()>(1);

    let scheduler_shutdown = shutdown_tx.subscribe();
    let scheduler_handle = tokio::spawn(async move {
        scheduler.run(scheduler_shutdown).await;
    });

    wait_for_shutdown().await?;
    tracing::info!("Shutdown signal received");

    let _ = shutdown_tx.send(());

    // A refresh in progress finishes before the scheduler sees the signal
    tokio::select! {
        _ = scheduler_handle => {},
        _ = tokio::time::sleep(Duration::from_secs(5)) => {
            tracing::warn!("Scheduler shutdown timeout");
        }
    }

    tracing::info!("Shutdown complete");
    Ok(())
}

fn report(refresh: Refresh) {
    match refresh {
        Refresh::Completed => tracing::info!("Display refreshed"),
        Refresh::Skipped => tracing::warn!("Display busy, refresh skipped"),
    }
}

/// Initialize tracing/logging
///
/// Default level is "warn" to minimize SD card wear from log writes.
/// Use --verbose flag for "debug" level during development/troubleshooting.
fn init_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "warn" };

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| format!("epaper_driver={}", level).into());

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();
}

/// Wait for shutdown signals (SIGTERM, SIGINT)
async fn wait_for_shutdown() -> anyhow::Result<()> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigterm =
        signal(SignalKind::terminate()).context("Failed to setup SIGTERM handler")?;
    let mut sigint = signal(SignalKind::interrupt()).context("Failed to setup SIGINT handler")?;

    tokio::select! {
        _ = sigterm.recv() => {
            tracing::info!("Received SIGTERM");
        }
        _ = sigint.recv() => {
            tracing::info!("Received SIGINT");
        }
    }
    Ok(())
}
