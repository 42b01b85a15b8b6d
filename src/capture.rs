//! `SourceCapture` (C7): the discovery/capture half of the external media
//! library boundary (§4.7). Treated as a black box; this module
//! defines only the trait and a deterministic in-process simulation used
//! by tests and the loopback integration scenarios (§8 S1/S2/S3).

use anyhow::Result;
use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::media::{AudioFrame, PixelBuffer};

#[derive(Debug, Clone)]
pub struct SourceDescriptor {
    pub name: String,
}

/// Events a capture session emits on its registered channel. §4.7
/// describes these as callbacks (`onVideo`/`onAudio`/`onDisconnect`);
/// this crate realizes "a registration point for exactly one consumer"
/// (§9 "Callback-based wiring") as an mpsc channel, matching
/// `liveion_udp_bridge/src/bridge.rs`'s channel-wiring style.
#[derive(Debug)]
pub enum CaptureEvent {
    Video {
        pixel: PixelBuffer,
        timestamp_100ns: u64,
        frame_number: u64,
    },
    Audio(AudioFrame),
    Disconnect {
        error: Option<String>,
    },
}

#[async_trait]
pub trait SourceCapture: Send {
    async fn initialize(&mut self) -> Result<()>;
    async fn discover(&mut self, timeout_seconds: u64) -> Result<Vec<SourceDescriptor>>;
    async fn connect(&mut self, source: &SourceDescriptor) -> Result<()>;
    /// Starts capture, returning a receiver that yields `CaptureEvent`s
    /// until `stop()` is called. `stop()` guarantees no further events
    /// are sent after it returns (§5 "Cancellation").
    async fn start_capture(&mut self) -> Result<mpsc::Receiver<CaptureEvent>>;
    async fn stop(&mut self) -> Result<()>;
}

/// Applies case-insensitive substring exclusion patterns to a candidate
/// list (§4.5 step 1).
pub fn apply_exclusions(candidates: Vec<SourceDescriptor>, patterns: &[String]) -> Vec<SourceDescriptor> {
    candidates
        .into_iter()
        .filter(|c| {
            let name_lower = c.name.to_lowercase();
            !patterns
                .iter()
                .any(|p| name_lower.contains(&p.to_lowercase()))
        })
        .collect()
}

/// Selects a source by exact/partial name match, else the first
/// remaining candidate (§4.5 step 2, auto-mode half).
pub fn select_source<'a>(
    candidates: &'a [SourceDescriptor],
    requested_name: Option<&str>,
) -> Option<&'a SourceDescriptor> {
    if let Some(name) = requested_name {
        if let Some(exact) = candidates.iter().find(|c| c.name == name) {
            return Some(exact);
        }
        if let Some(partial) = candidates
            .iter()
            .find(|c| c.name.to_lowercase().contains(&name.to_lowercase()))
        {
            return Some(partial);
        }
        return None;
    }
    candidates.first()
}

/// A deterministic in-process capture used by tests and the loopback
/// integration scenarios: replays a fixed sequence of video frames (and
/// optionally audio) on a background task.
pub struct SimulatedCapture {
    descriptors: Vec<SourceDescriptor>,
    frames: Vec<(PixelBuffer, u64)>,
    audio: Vec<AudioFrame>,
    connected: Option<SourceDescriptor>,
}

impl SimulatedCapture {
    pub fn new(descriptors: Vec<SourceDescriptor>, frames: Vec<(PixelBuffer, u64)>) -> Self {
        Self {
            descriptors,
            frames,
            audio: Vec::new(),
            connected: None,
        }
    }

    pub fn with_audio(mut self, audio: Vec<AudioFrame>) -> Self {
        self.audio = audio;
        self
    }
}

#[async_trait]
impl SourceCapture for SimulatedCapture {
    async fn initialize(&mut self) -> Result<()> {
        Ok(())
    }

    async fn discover(&mut self, _timeout_seconds: u64) -> Result<Vec<SourceDescriptor>> {
        Ok(self.descriptors.clone())
    }

    async fn connect(&mut self, source: &SourceDescriptor) -> Result<()> {
        self.connected = Some(source.clone());
        Ok(())
    }

    async fn start_capture(&mut self) -> Result<mpsc::Receiver<CaptureEvent>> {
        let (tx, rx) = mpsc::channel(64);
        let frames = std::mem::take(&mut self.frames);
        let audio = std::mem::take(&mut self.audio);
        tokio::spawn(async move {
            let mut frame_number = 0u64;
            for (pixel, ts) in frames {
                if tx
                    .send(CaptureEvent::Video {
                        pixel,
                        timestamp_100ns: ts,
                        frame_number,
                    })
                    .await
                    .is_err()
                {
                    return;
                }
                frame_number += 1;
            }
            for frame in audio {
                if tx.send(CaptureEvent::Audio(frame)).await.is_err() {
                    return;
                }
            }
        });
        Ok(rx)
    }

    async fn stop(&mut self) -> Result<()> {
        Ok(())
    }
}
