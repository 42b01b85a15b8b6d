//! Sender orchestrator (C5): source → encoder → fragmenter → UDP socket,
//! including PCM audio passthrough and reconnect policy (§4.5).
//! Top-level wiring is grounded on
//! `liveion_udp_bridge/src/bridge.rs::UdpDataChannelBridge::run` (spawn
//! per subsystem, `tokio::select!` on completion); the reconnect loop is
//! grounded on `liveion/src/stream/source/rtsp_source.rs::run_rtsp_client`.

use std::io::{self, Write};
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use tokio::net::UdpSocket;
use tokio::sync::watch;
use tracing::{info, warn};

use crate::capture::{apply_exclusions, select_source, CaptureEvent, SourceCapture, SourceDescriptor};
use crate::codec::{Encoder, EncoderParams};
use crate::config::HostConfig;
use crate::metrics::Metrics;
use crate::wire::{self, Header, MediaType};

pub struct SenderOptions {
    pub target: String,
    pub mtu_payload: usize,
    pub host: HostConfig,
}

/// Runs the sender orchestrator until `shutdown` fires or the capture
/// source is exhausted (e.g. a finite simulated capture completes).
pub async fn run(
    mut capture: Box<dyn SourceCapture>,
    options: SenderOptions,
    metrics: Metrics,
    mut shutdown: watch::Receiver<bool>,
) -> Result<()> {
    capture
        .initialize()
        .await
        .context("failed to initialize source capture")?;

    let socket = UdpSocket::bind("0.0.0.0:0")
        .await
        .context("failed to bind sender UDP socket")?;
    socket
        .connect(&options.target)
        .await
        .with_context(|| format!("failed to resolve/connect target {}", options.target))?;

    let source = discover_and_select(&mut *capture, &options.host).await?;
    info!(source = %source.name, "selected source");

    let reconnect_delay = Duration::from_secs(options.host.reconnect_interval_secs);
    let mut sequence_number: u32 = 0;

    loop {
        if *shutdown.borrow() {
            return Ok(());
        }

        if let Err(e) = capture.connect(&source).await {
            warn!(error = %e, "failed to connect to selected source, will retry");
            if wait_for_reconnect_or_shutdown(reconnect_delay, &mut shutdown).await {
                return Ok(());
            }
            continue;
        }

        let mut rx = match capture.start_capture().await {
            Ok(rx) => rx,
            Err(e) => {
                warn!(error = %e, "failed to start capture, will retry");
                if wait_for_reconnect_or_shutdown(reconnect_delay, &mut shutdown).await {
                    return Ok(());
                }
                continue;
            }
        };

        let mut encoder = Encoder::new(EncoderParams {
            bitrate_bps: options.host.bitrate_bps,
            keyframe_interval: options.host.keyframe_interval,
            ..EncoderParams::default()
        });

        let disconnected = loop {
            tokio::select! {
                biased;
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        let _ = capture.stop().await;
                        return Ok(());
                    }
                }
                event = rx.recv() => {
                    match event {
                        Some(CaptureEvent::Video { pixel, timestamp_100ns, .. }) => {
                            let encoded = encoder.encode(&pixel, timestamp_100ns, None);
                            if let Err(e) = send_frame(
                                &socket,
                                MediaType::Video,
                                sequence_number,
                                timestamp_100ns,
                                encoded.is_keyframe,
                                &encoded.payload,
                                options.mtu_payload,
                                0,
                                0,
                            ).await {
                                metrics.record_transient_network_error();
                                warn!(error = %e, "failed to send video fragment");
                            }
                            sequence_number = sequence_number.wrapping_add(1);
                        }
                        Some(CaptureEvent::Audio(frame)) => {
                            if let Err(e) = send_frame(
                                &socket,
                                MediaType::Audio,
                                sequence_number,
                                frame.timestamp,
                                false,
                                &frame.payload,
                                options.mtu_payload,
                                frame.sample_rate,
                                frame.channels,
                            ).await {
                                metrics.record_transient_network_error();
                                warn!(error = %e, "failed to send audio fragment");
                            }
                            sequence_number = sequence_number.wrapping_add(1);
                        }
                        Some(CaptureEvent::Disconnect { error }) => {
                            break Some(error);
                        }
                        None => break None,
                    }
                }
            }
        };

        match disconnected {
            Some(Some(err)) => warn!(error = %err, "source disconnected"),
            Some(None) => warn!("source disconnected"),
            None => info!("capture stream ended"),
        }

        if *shutdown.borrow() {
            return Ok(());
        }

        info!(delay_secs = reconnect_delay.as_secs(), "reconnecting");
        if wait_for_reconnect_or_shutdown(reconnect_delay, &mut shutdown).await {
            return Ok(());
        }
    }
}

/// Sleeps for `delay` (§4.5 "Reconnect policy": 2-second intervals
/// by default), waking early on shutdown. Returns `true` if shutdown was
/// requested and the caller should stop retrying.
async fn wait_for_reconnect_or_shutdown(delay: Duration, shutdown: &mut watch::Receiver<bool>) -> bool {
    tokio::select! {
        _ = tokio::time::sleep(delay) => false,
        _ = shutdown.changed() => *shutdown.borrow(),
    }
}

async fn discover_and_select(
    capture: &mut dyn SourceCapture,
    host: &HostConfig,
) -> Result<SourceDescriptor> {
    let discovered = capture.discover(10).await.context("source discovery failed")?;
    let candidates = apply_exclusions(discovered, &host.exclude_patterns);

    if candidates.is_empty() {
        return Err(anyhow!("no sources available after applying exclusions"));
    }

    if host.source.is_some() || host.auto {
        return select_source(&candidates, host.source.as_deref())
            .cloned()
            .ok_or_else(|| anyhow!("requested source not found among candidates"));
    }

    prompt_for_source(&candidates)
}

/// Interactive prompt (§4.5 step 2c): lists candidates and reads a
/// 0-based index from stdin.
fn prompt_for_source(candidates: &[SourceDescriptor]) -> Result<SourceDescriptor> {
    println!("Available sources:");
    for (i, c) in candidates.iter().enumerate() {
        println!("[{}] {}", i, c.name);
    }
    print!("Select a source: ");
    io::stdout().flush().ok();

    let mut line = String::new();
    io::stdin()
        .read_line(&mut line)
        .context("failed to read source selection")?;
    let index: usize = line.trim().parse().context("expected a numeric index")?;
    candidates
        .get(index)
        .cloned()
        .ok_or_else(|| anyhow!("index out of range"))
}

#[allow(clippy::too_many_arguments)]
async fn send_frame(
    socket: &UdpSocket,
    media_type: MediaType,
    sequence_number: u32,
    timestamp: u64,
    keyframe: bool,
    payload: &[u8],
    mtu_payload: usize,
    sample_rate: u32,
    channels: u8,
) -> Result<()> {
    let fragments = wire::fragment(payload, mtu_payload);
    let fragment_count = fragments.len() as u16;
    let total_size = payload.len() as u32;

    for (index, chunk) in fragments.iter().enumerate() {
        // `flags` is set once per frame and replicated on every fragment
        // (§4.1); built via `Header::with_keyframe` rather than a
        // hand-rolled bitmask.
        let header = Header {
            version: wire::VERSION_CURRENT,
            media_type,
            source_id: 0,
            flags: 0,
            sequence_number,
            timestamp,
            total_size,
            fragment_index: index as u16,
            fragment_count,
            payload_size: chunk.len() as u16,
            sample_rate,
            channels,
        }
        .with_keyframe(keyframe);
        let mut datagram = wire::encode_header(&header, mtu_payload)
            .map_err(|e| anyhow!("header encode failed: {e}"))?;
        datagram.extend_from_slice(chunk);
        socket.send(&datagram).await?;
    }

    Ok(())
}

pub fn shutdown_channel() -> (watch::Sender<bool>, watch::Receiver<bool>) {
    watch::channel(false)
}

pub type BoxedCapture = Box<dyn SourceCapture>;

pub fn boxed<C: SourceCapture + 'static>(capture: C) -> BoxedCapture {
    Box::new(capture)
}
