//! Receiver orchestrator (C6): UDP → C1 → C2 (×2) → C3.Decoder →
//! (C4 optional) → `SourceOutput`. Top-level wiring grounded on
//! `liveion_udp_bridge/src/udp_server.rs`'s `tokio::select!` receive loop
//! and `liveion_udp_bridge/src/bridge.rs`'s task-per-subsystem shape.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::net::UdpSocket;
use tokio::sync::watch;
use tracing::{debug, warn};

use crate::codec::{Decoded, Decoder};
use crate::delay_buffer::{DelayBuffer, Released};
use crate::media::AudioFrame;
use crate::metrics::Metrics;
use crate::output::SourceOutput;
use crate::reassembler::Reassembler;
use crate::wire::{self, MediaType};

const RECV_BUFFER_SIZE: usize = 65536;
const PUMP_INTERVAL: Duration = Duration::from_millis(1);

pub struct ReceiverOptions {
    pub port: u16,
    pub buffer_ms: u64,
    /// Local source name to republish under (§6 `join --name`).
    pub name: String,
}

/// Runs the receiver orchestrator until `shutdown` fires.
pub async fn run(
    output: Arc<dyn SourceOutput>,
    options: ReceiverOptions,
    metrics: Metrics,
    mut shutdown: watch::Receiver<bool>,
) -> Result<()> {
    let socket = UdpSocket::bind(("0.0.0.0", options.port))
        .await
        .with_context(|| format!("failed to bind UDP port {}", options.port))?;

    output
        .start(&options.name, 0, 0)
        .await
        .context("failed to start source output")?;

    let delay_buffer = Arc::new(DelayBuffer::new(options.buffer_ms));

    let pump_task = if delay_buffer.is_enabled() {
        let delay_buffer = delay_buffer.clone();
        let output = output.clone();
        let mut pump_shutdown = shutdown.clone();
        Some(tokio::spawn(async move {
            output_pump(delay_buffer, output, &mut pump_shutdown).await;
        }))
    } else {
        None
    };

    let mut video_reassembler = Reassembler::new();
    let mut audio_reassembler = Reassembler::new();
    let mut decoder = Decoder::new();
    let mut known_resolution: Option<(u32, u32)> = None;
    let mut buf = vec![0u8; RECV_BUFFER_SIZE];

    loop {
        tokio::select! {
            biased;
            _ = shutdown.changed() => {
                if *shutdown.borrow() {
                    break;
                }
            }
            result = socket.recv(&mut buf) => {
                let len = match result {
                    Ok(len) => len,
                    Err(e) => {
                        metrics.record_transient_network_error();
                        warn!(error = %e, "UDP receive error");
                        continue;
                    }
                };

                let datagram = &buf[..len];
                let (header, header_len) = match wire::decode_header(datagram) {
                    Ok(parsed) => parsed,
                    Err(e) => {
                        metrics.record_protocol_error();
                        debug!(error = %e, "dropping datagram with invalid header");
                        continue;
                    }
                };

                // Defensive clamp (§9 open question 3): trust the
                // header's payloadSize only up to what actually remains.
                let available = len.saturating_sub(header_len);
                let payload_len = (header.payload_size as usize).min(available);
                let payload = &datagram[header_len..header_len + payload_len];

                match header.media_type {
                    MediaType::Video => {
                        let frame = video_reassembler.admit(&header, payload);
                        for _ in 0..video_reassembler.take_drop_count() {
                            metrics.record_reassembly_drop();
                        }
                        if let Some(frame) = frame {
                            handle_video_frame(
                                frame.payload,
                                frame.timestamp,
                                &mut decoder,
                                &delay_buffer,
                                &output,
                                &metrics,
                                &mut known_resolution,
                            ).await;
                        }
                    }
                    MediaType::Audio => {
                        let frame = audio_reassembler.admit(&header, payload);
                        for _ in 0..audio_reassembler.take_drop_count() {
                            metrics.record_reassembly_drop();
                        }
                        if let Some(frame) = frame {
                            let audio = AudioFrame {
                                payload: frame.payload,
                                timestamp: frame.timestamp,
                                sample_rate: frame.sample_rate,
                                channels: frame.channels,
                            };
                            if delay_buffer.is_enabled() {
                                delay_buffer.enqueue_audio(&audio).await;
                            } else {
                                output.send_audio(audio).await;
                            }
                        }
                    }
                }
            }
        }
    }

    if let Some(task) = pump_task {
        task.abort();
    }
    output.stop().await.ok();
    Ok(())
}

#[allow(clippy::too_many_arguments)]
async fn handle_video_frame(
    payload: Vec<u8>,
    timestamp: u64,
    decoder: &mut Decoder,
    delay_buffer: &DelayBuffer,
    output: &Arc<dyn SourceOutput>,
    metrics: &Metrics,
    known_resolution: &mut Option<(u32, u32)>,
) {
    match decoder.decode(&payload, timestamp) {
        Decoded::Frame(decoded) => {
            let dims = (decoded.pixel.width, decoded.pixel.height);
            if *known_resolution != Some(dims) {
                *known_resolution = Some(dims);
                output.set_resolution(dims.0, dims.1).await;
            }

            if delay_buffer.is_enabled() {
                delay_buffer.enqueue_video(&decoded.pixel, decoded.timestamp).await;
            } else {
                output.send_video(decoded.pixel, decoded.timestamp).await;
            }
        }
        Decoded::Skipped => {
            // Still waiting on SPS/PPS, or this access unit legitimately
            // carried no slice NAL (e.g. parameter sets only). Not an
            // error (§7): log and drop the frame, no counter bump.
            debug!("no frame to emit for this access unit, dropping");
        }
        Decoded::Failed => {
            metrics.record_codec_error();
            warn!("decode failed for frame, dropping");
        }
    }
}

/// 1-ms cadence pump from the delay buffer to `SourceOutput` (§4.6
/// "Output pump (buffered mode only)").
async fn output_pump(
    delay_buffer: Arc<DelayBuffer>,
    output: Arc<dyn SourceOutput>,
    shutdown: &mut watch::Receiver<bool>,
) {
    let mut ticker = tokio::time::interval(PUMP_INTERVAL);
    loop {
        tokio::select! {
            biased;
            _ = shutdown.changed() => {
                if *shutdown.borrow() {
                    return;
                }
            }
            _ = ticker.tick() => {
                for released in delay_buffer.dequeue_ready().await {
                    match released {
                        Released::Video(pixel, timestamp) => {
                            output.send_video(pixel, timestamp).await;
                        }
                        Released::Audio(frame) => {
                            output.send_audio(frame).await;
                        }
                    }
                }
            }
        }
    }
}
