//! `SourceOutput` (C7): the republishing half of the external media
//! library boundary (§4.7). Treated as a black box; this module
//! defines only the trait and a recording simulation used by tests and
//! the loopback integration scenarios.

use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::media::{AudioFrame, PixelBuffer};

#[async_trait]
pub trait SourceOutput: Send + Sync {
    /// Starts republishing under `name` — the local source name join
    /// peers should see (§6 `join --name`).
    async fn start(&self, name: &str, initial_width: u32, initial_height: u32) -> Result<()>;
    async fn send_video(&self, pixel: PixelBuffer, timestamp_100ns: u64);
    async fn send_audio(&self, frame: AudioFrame);
    async fn set_resolution(&self, width: u32, height: u32);
    async fn stop(&self) -> Result<()>;
}

/// What `SimulatedOutput` recorded, in call order — used by the
/// integration tests to assert S1/S2/S3 from §8.
#[derive(Debug, Clone)]
pub enum Recorded {
    Started { name: String },
    Video { pixel: PixelBuffer, timestamp: u64 },
    Audio(AudioFrame),
    ResolutionChanged { width: u32, height: u32 },
}

#[derive(Default)]
pub struct SimulatedOutput {
    calls: Mutex<Vec<Recorded>>,
}

impl SimulatedOutput {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub async fn recorded(&self) -> Vec<Recorded> {
        self.calls.lock().await.clone()
    }

    pub async fn video_count(&self) -> usize {
        self.calls
            .lock()
            .await
            .iter()
            .filter(|r| matches!(r, Recorded::Video { .. }))
            .count()
    }
}

#[async_trait]
impl SourceOutput for SimulatedOutput {
    async fn start(&self, name: &str, _initial_width: u32, _initial_height: u32) -> Result<()> {
        self.calls.lock().await.push(Recorded::Started {
            name: name.to_string(),
        });
        Ok(())
    }

    async fn send_video(&self, pixel: PixelBuffer, timestamp_100ns: u64) {
        self.calls.lock().await.push(Recorded::Video {
            pixel,
            timestamp: timestamp_100ns,
        });
    }

    async fn send_audio(&self, frame: AudioFrame) {
        self.calls.lock().await.push(Recorded::Audio(frame));
    }

    async fn set_resolution(&self, width: u32, height: u32) {
        self.calls
            .lock()
            .await
            .push(Recorded::ResolutionChanged { width, height });
    }

    async fn stop(&self) -> Result<()> {
        Ok(())
    }
}
