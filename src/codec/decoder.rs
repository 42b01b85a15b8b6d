//! Decoder side of the codec adapter (C3). Parses Annex-B NAL units,
//! tracks SPS/PPS, lazily creates a session once both are known, and
//! rebuilds it on format change. Grounded on
//! `liveion/src/recorder/codec/h264.rs::H264Adapter::convert_frame`.

use tracing::warn;

use crate::codec::annexb::{
    length_prefixed_payload, nal_to_length_prefixed, scan, strip_emulation_prevention,
    NAL_TYPE_IDR, NAL_TYPE_PPS, NAL_TYPE_SLICE_NON_IDR, NAL_TYPE_SPS,
};
use crate::codec::session::{Dimensions, ParameterSets};
use crate::media::{PixelBuffer, PixelFormat};

/// One decoded frame, produced on the decoder's output callback
/// (§4.3): `(pixelBuffer, timestamp)`.
pub struct DecodedFrame {
    pub pixel: PixelBuffer,
    pub timestamp: u64,
}

/// Outcome of a `Decoder::decode` call. Distinguishes "nothing to emit,
/// and that's expected" from a genuine decode failure (§7: only the
/// latter should be logged/counted as a codec error).
pub enum Decoded {
    /// A frame was produced.
    Frame(DecodedFrame),
    /// No frame this call, and that's normal: the access unit carried no
    /// slice NAL (e.g. parameter sets only), or the session isn't ready
    /// yet (still waiting on SPS/PPS).
    Skipped,
    /// A slice NAL was present and the session was ready, but the frame
    /// could not be assembled.
    Failed,
}

pub struct Decoder {
    params: ParameterSets,
    dims: Option<Dimensions>,
}

impl Default for Decoder {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder {
    pub fn new() -> Self {
        Self {
            params: ParameterSets::default(),
            dims: None,
        }
    }

    pub fn is_ready(&self) -> bool {
        self.params.ready()
    }

    pub fn dims(&self) -> Option<Dimensions> {
        self.dims
    }

    fn parse_dims(sps: &[u8]) -> Option<Dimensions> {
        if sps.is_empty() {
            return None;
        }
        // `Encoder::synth_sps` escapes the raw width/height bytes with
        // emulation prevention before appending them to the NAL header
        // byte (see encoder.rs); undo that here before reading them back.
        let unescaped = strip_emulation_prevention(&sps[1..]);
        if unescaped.len() < 8 {
            return None;
        }
        let width = u32::from_be_bytes([unescaped[0], unescaped[1], unescaped[2], unescaped[3]]);
        let height = u32::from_be_bytes([unescaped[4], unescaped[5], unescaped[6], unescaped[7]]);
        Some(Dimensions { width, height })
    }

    /// Parses `payload` (an Annex-B access unit) and returns a decoded
    /// frame once a session is ready and a slice NAL (IDR or non-IDR) is
    /// present. Returns `Decoded::Skipped` while only parameter sets have
    /// arrived, the session is not yet ready, or this access unit simply
    /// carries no slice NAL (e.g. a parameter-set-only unit) — none of
    /// those are failures. `Decoded::Failed` is reserved for a slice NAL
    /// that the session failed to turn into a frame.
    pub fn decode(&mut self, payload: &[u8], timestamp: u64) -> Decoded {
        let units = scan(payload);
        let mut slice: Option<(&[u8], bool)> = None;

        for unit in &units {
            match unit.nal_type {
                t if t == NAL_TYPE_SPS => {
                    if self.params.set_sps(unit.payload.to_vec()) {
                        if self.params.ready() {
                            warn!("decoder: SPS changed after session was ready, rebuilding");
                        }
                        self.dims = Self::parse_dims(unit.payload);
                    }
                }
                t if t == NAL_TYPE_PPS => {
                    if self.params.set_pps(unit.payload.to_vec()) && self.params.ready() {
                        warn!("decoder: PPS changed after session was ready, rebuilding");
                    }
                }
                t if t == NAL_TYPE_IDR => slice = Some((unit.payload, true)),
                t if t == NAL_TYPE_SLICE_NON_IDR => slice = Some((unit.payload, false)),
                _ => {
                    // Unknown types are passed through, not dropped (§4.3);
                    // this software loopback codec has nothing further to do
                    // with them since it owns no downstream consumer for raw
                    // NAL data.
                }
            }
        }

        let Some((raw, _is_idr)) = slice else {
            return Decoded::Skipped;
        };
        if !self.is_ready() {
            return Decoded::Skipped;
        }
        let Some(dims) = self.dims else {
            return Decoded::Skipped;
        };

        // The host codec consumes length-prefixed ("AVCC") NAL units
        // natively (§4.3); convert the Annex-B unit recovered above
        // before handing it off, mirroring `Encoder`'s reverse conversion.
        let avcc = nal_to_length_prefixed(raw);
        let Some(framed) = length_prefixed_payload(&avcc) else {
            return Decoded::Failed;
        };

        // framed[0] is the synthetic NAL header byte written by `Encoder`;
        // the remainder is the original pixel payload (see encoder.rs).
        let Some(data) = framed.get(1..) else {
            return Decoded::Failed;
        };
        let pixel = PixelBuffer {
            width: dims.width,
            height: dims.height,
            format: PixelFormat::Bgra8,
            stride: dims.width * 4,
            data: data.to_vec(),
        };
        Decoded::Frame(DecodedFrame { pixel, timestamp })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::encoder::Encoder;
    use crate::codec::session::EncoderParams;
    use crate::media::{PixelBuffer, PixelFormat};

    fn pixel(w: u32, h: u32, fill: u8) -> PixelBuffer {
        PixelBuffer {
            width: w,
            height: h,
            format: PixelFormat::Bgra8,
            stride: w * 4,
            data: vec![fill; (w * h * 4) as usize],
        }
    }

    #[test]
    fn decoder_waits_for_sps_and_pps_before_emitting() {
        let mut dec = Decoder::new();
        // A lone IDR NAL with no parameter sets yet.
        let mut payload = Vec::new();
        payload.extend_from_slice(&[0, 0, 0, 1, 0x65, 1, 2, 3]);
        assert!(matches!(dec.decode(&payload, 0), Decoded::Skipped));
    }

    #[test]
    fn round_trips_through_encoder_keyframe() {
        let mut enc = Encoder::new(EncoderParams::default());
        let mut dec = Decoder::new();

        let input = pixel(32, 24, 77);
        let encoded = enc.encode(&input, 500, None);
        assert!(encoded.is_keyframe);

        let Decoded::Frame(decoded) = dec.decode(&encoded.payload, encoded.timestamp) else {
            panic!("expected a decoded frame");
        };
        assert_eq!(decoded.timestamp, 500);
        assert_eq!(decoded.pixel.width, 32);
        assert_eq!(decoded.pixel.height, 24);
        assert_eq!(decoded.pixel.data, input.data);
    }

    #[test]
    fn p_frames_decode_once_session_is_established() {
        let mut enc = Encoder::new(EncoderParams::default());
        let mut dec = Decoder::new();

        let first = enc.encode(&pixel(16, 16, 1), 0, None);
        assert!(matches!(dec.decode(&first.payload, 0), Decoded::Frame(_)));

        let second_input = pixel(16, 16, 42);
        let second = enc.encode(&second_input, 1000, None);
        assert!(!second.is_keyframe);
        let Decoded::Frame(decoded) = dec.decode(&second.payload, second.timestamp) else {
            panic!("expected a decoded frame");
        };
        assert_eq!(decoded.pixel.data, second_input.data);
    }

    #[test]
    fn resolutions_whose_bytes_collide_with_a_start_code_still_decode() {
        // 640x480: height 480 = 0x0000_01E0, a literal 3-byte start code
        // if embedded unescaped (see encoder.rs::synth_sps).
        for (w, h) in [(640u32, 480u32), (854, 480), (320, 480)] {
            let mut enc = Encoder::new(EncoderParams::default());
            let mut dec = Decoder::new();
            let input = pixel(w, h, 13);
            let encoded = enc.encode(&input, 0, None);
            let Decoded::Frame(decoded) = dec.decode(&encoded.payload, encoded.timestamp) else {
                panic!("decode failed for {w}x{h}");
            };
            assert_eq!(decoded.pixel.width, w);
            assert_eq!(decoded.pixel.height, h);
            assert_eq!(decoded.pixel.data, input.data);
        }
    }

    #[test]
    fn unknown_nal_type_is_ignored_not_fatal() {
        let mut dec = Decoder::new();
        // type 12 (SEI-ish) followed by nothing else: must not panic.
        let payload = [0, 0, 0, 1, 0x6C, 9, 9];
        assert!(matches!(dec.decode(&payload, 0), Decoded::Skipped));
    }

    #[test]
    fn parameter_set_only_unit_is_skipped_not_a_failure() {
        // Session already ready; this access unit re-sends SPS/PPS with no
        // slice NAL — a legitimate parameter-set refresh, not a decode error.
        let mut enc = Encoder::new(EncoderParams::default());
        let mut dec = Decoder::new();
        let first = enc.encode(&pixel(16, 16, 1), 0, None);
        assert!(matches!(dec.decode(&first.payload, 0), Decoded::Frame(_)));

        let units = scan(&first.payload);
        let mut params_only = Vec::new();
        for unit in units.iter().filter(|u| {
            u.nal_type == NAL_TYPE_SPS || u.nal_type == NAL_TYPE_PPS
        }) {
            params_only.extend_from_slice(&crate::codec::annexb::with_start_code(unit.payload));
        }
        assert!(matches!(dec.decode(&params_only, 10), Decoded::Skipped));
    }
}
