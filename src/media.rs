//! Shared media data types crossing the C7 capability boundary: the
//! pixel-buffer abstraction handed between `SourceCapture`, `Encoder`,
//! `Decoder`, and `SourceOutput`, plus planar PCM audio.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelFormat {
    /// 8-bit BGRA, the common choice per §4.7.
    Bgra8,
}

/// A captured or decoded video frame's pixel data. Implementations of
/// `SourceCapture`/`Decoder` typically draw these from a recycled pool —
/// see `delay_buffer.rs` for the deep-copy requirement this implies.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PixelBuffer {
    pub width: u32,
    pub height: u32,
    pub format: PixelFormat,
    /// Bytes per row; may exceed `width * bytes_per_pixel` due to padding.
    pub stride: u32,
    pub data: Vec<u8>,
}

impl PixelBuffer {
    /// Deep-copies this buffer, preserving width/height/format/stride.
    /// Required by the delay buffer (§4.4, §9 "Owning decoded
    /// buffers").
    pub fn deep_copy(&self) -> PixelBuffer {
        PixelBuffer {
            width: self.width,
            height: self.height,
            format: self.format,
            stride: self.stride,
            data: self.data.clone(),
        }
    }
}

/// Planar (channel-major) 32-bit float PCM audio, as produced by
/// `SourceCapture::onAudio` (§3, §4.7).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioFrame {
    pub payload: Vec<u8>,
    pub timestamp: u64,
    pub sample_rate: u32,
    pub channels: u8,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deep_copy_is_independent_of_source() {
        let mut original = PixelBuffer {
            width: 4,
            height: 2,
            format: PixelFormat::Bgra8,
            stride: 16,
            data: vec![1, 2, 3, 4],
        };
        let copy = original.deep_copy();
        original.data[0] = 99;
        assert_eq!(copy.data[0], 1);
    }
}
