//! Delay buffer (C4): FIFO, deep-copied, wall-clock-gated queues for
//! video and audio. Grounded on `liveion/src/stream/source/manager.rs`'s
//! `tokio::time::sleep` polling idiom and the mutual-exclusion
//! requirement in §5 ("a mutual-exclusion primitive guards both
//! operations").

use std::collections::VecDeque;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;

use crate::media::{AudioFrame, PixelBuffer};

enum Payload {
    Video(PixelBuffer),
    Audio(AudioFrame),
}

struct Entry {
    payload: Payload,
    original_timestamp: u64,
    release_at: Instant,
}

/// Output of `dequeue_ready`: a released video or audio entry, still
/// tagged by kind so the caller can route it to `SourceOutput`.
pub enum Released {
    Video(PixelBuffer, u64),
    Audio(AudioFrame),
}

struct Queue {
    entries: VecDeque<Entry>,
}

impl Queue {
    fn new() -> Self {
        Self {
            entries: VecDeque::new(),
        }
    }
}

/// Two independent FIFOs (video, audio), configured with a single delay.
/// `delay_ms == 0` means disabled; callers are expected to short-circuit
/// around the buffer entirely in that case (§4.4), but `enqueue`/
/// `dequeue_ready` remain correct (zero delay) if used anyway.
pub struct DelayBuffer {
    delay: Duration,
    video: Mutex<Queue>,
    audio: Mutex<Queue>,
}

impl DelayBuffer {
    pub fn new(delay_ms: u64) -> Self {
        Self {
            delay: Duration::from_millis(delay_ms),
            video: Mutex::new(Queue::new()),
            audio: Mutex::new(Queue::new()),
        }
    }

    pub fn is_enabled(&self) -> bool {
        !self.delay.is_zero()
    }

    /// Deep-copies `pixel` (it is typically drawn from a pool recycled by
    /// the decoder — §9) and stamps its release time.
    pub async fn enqueue_video(&self, pixel: &PixelBuffer, timestamp: u64) {
        let entry = Entry {
            payload: Payload::Video(pixel.deep_copy()),
            original_timestamp: timestamp,
            release_at: Instant::now() + self.delay,
        };
        self.video.lock().await.entries.push_back(entry);
    }

    pub async fn enqueue_audio(&self, frame: &AudioFrame) {
        let entry = Entry {
            payload: Payload::Audio(frame.clone()),
            original_timestamp: frame.timestamp,
            release_at: Instant::now() + self.delay,
        };
        self.audio.lock().await.entries.push_back(entry);
    }

    /// Returns, in presentation (enqueue) order, every entry whose release
    /// time has passed, removing them from the buffer. FIFO is preserved
    /// because delay is constant (§4.4 invariant).
    pub async fn dequeue_ready(&self) -> Vec<Released> {
        let now = Instant::now();
        let mut out = Vec::new();

        {
            let mut q = self.video.lock().await;
            while let Some(front) = q.entries.front() {
                if front.release_at > now {
                    break;
                }
                let entry = q.entries.pop_front().unwrap();
                if let Payload::Video(pixel) = entry.payload {
                    out.push(Released::Video(pixel, entry.original_timestamp));
                }
            }
        }
        {
            let mut q = self.audio.lock().await;
            while let Some(front) = q.entries.front() {
                if front.release_at > now {
                    break;
                }
                let entry = q.entries.pop_front().unwrap();
                if let Payload::Audio(frame) = entry.payload {
                    out.push(Released::Audio(frame));
                }
            }
        }

        out
    }

    pub async fn flush(&self) {
        self.video.lock().await.entries.clear();
        self.audio.lock().await.entries.clear();
    }
}
