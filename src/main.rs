use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use tracing::{error, info};

use ndi_bridge::capture::{SourceCapture, SourceDescriptor};
use ndi_bridge::cli::{Cli, Command};
use ndi_bridge::config::Config;
use ndi_bridge::metrics::Metrics;
use ndi_bridge::output::{SimulatedOutput, SourceOutput};
use ndi_bridge::receiver::{self, ReceiverOptions};
use ndi_bridge::sender::{self, SenderOptions};
use ndi_bridge::shutdown;

/// Production builds provide a platform-specific `SourceCapture` behind
/// the same trait (§1/§6/§7 treats it as an external capability,
/// out of this crate's scope). This binary wires the simulated
/// implementation so the CLI is runnable standalone.
fn default_capture() -> Box<dyn SourceCapture> {
    let descriptors = vec![
        SourceDescriptor { name: "Camera 1".to_string() },
        SourceDescriptor { name: "Camera 2".to_string() },
    ];
    Box::new(ndi_bridge::capture::SimulatedCapture::new(descriptors, Vec::new()))
}

fn default_output() -> Arc<dyn SourceOutput> {
    SimulatedOutput::new()
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_max_level(if cli.verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        })
        .with_target(false)
        .init();

    let config = match &cli.config {
        Some(path) => Config::load(path).await?,
        None => Config::default(),
    };

    let result = match cli.command {
        Command::Discover => run_discover().await,
        Command::Host {
            target,
            port,
            bitrate,
            source,
            exclude,
            auto,
        } => {
            let mut host = config.host.clone();
            if source.is_some() {
                host.source = source;
            }
            if auto {
                host.auto = true;
            }
            if !exclude.is_empty() {
                host.exclude_patterns = exclude;
            }
            if let Some(mbps) = bitrate {
                host.bitrate_bps = (mbps * 1_000_000.0) as u32;
            }

            let target_addr = target
                .or_else(|| port.map(|p| format!("127.0.0.1:{p}")))
                .unwrap_or_else(|| format!("127.0.0.1:{}", config.wire.port));

            run_host(target_addr, config.wire.mtu_payload, host).await
        }
        Command::Join { port, name, buffer } => {
            let port = port.unwrap_or(config.wire.port);
            let buffer_ms = buffer.unwrap_or(config.join.buffer_ms);
            let name = name
                .or(config.join.name)
                .unwrap_or_else(|| "ndi-bridge".to_string());
            run_join(port, name, buffer_ms).await
        }
    };

    if let Err(e) = &result {
        error!("{e}");
        std::process::exit(1);
    }
    Ok(())
}

async fn run_discover() -> Result<()> {
    let mut capture = default_capture();
    capture.initialize().await?;
    let sources = capture.discover(10).await?;
    for (i, s) in sources.iter().enumerate() {
        println!("[{i}] {}", s.name);
    }
    if sources.is_empty() {
        std::process::exit(1);
    }
    Ok(())
}

async fn run_host(target: String, mtu_payload: usize, host: ndi_bridge::config::HostConfig) -> Result<()> {
    let metrics = Metrics::new();
    metrics.spawn_periodic_log(std::time::Duration::from_secs(30));

    let (shutdown_tx, shutdown_rx) = sender::shutdown_channel();
    let capture = default_capture();

    info!("starting host orchestrator, target={target}");
    let mut orchestrator = tokio::spawn(sender::run(
        capture,
        SenderOptions { target, mtu_payload, host },
        metrics,
        shutdown_rx,
    ));

    tokio::select! {
        result = &mut orchestrator => result?,
        signal = shutdown::wait_for_stop_signal() => {
            info!(signal, "received shutdown signal");
            let _ = shutdown_tx.send(true);
            // Give the orchestrator a chance to observe the shutdown
            // signal and unwind cleanly (sockets closed, capture stopped)
            // before this process exits (§5 "stop() MUST ... ensure
            // no callback fires after it returns").
            orchestrator.await?
        }
    }
}

async fn run_join(port: u16, name: String, buffer_ms: u64) -> Result<()> {
    let metrics = Metrics::new();
    metrics.spawn_periodic_log(std::time::Duration::from_secs(30));

    let (shutdown_tx, shutdown_rx) = sender::shutdown_channel();
    let output = default_output();

    info!(port, buffer_ms, name = %name, "starting join orchestrator");
    let mut orchestrator = tokio::spawn(receiver::run(
        output,
        ReceiverOptions { port, buffer_ms, name },
        metrics,
        shutdown_rx,
    ));

    tokio::select! {
        result = &mut orchestrator => result?,
        signal = shutdown::wait_for_stop_signal() => {
            info!(signal, "received shutdown signal");
            let _ = shutdown_tx.send(true);
            orchestrator.await?
        }
    }
}
