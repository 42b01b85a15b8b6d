//! Encoder side of the codec adapter (C3). `VideoCodec` (§4.7) is a
//! capability interface — the concrete platform H.264 encoder is out of
//! scope (§1). This module implements the adapter contract
//! (keyframe policy, Annex-B framing, SPS/PPS injection) against a
//! software loopback codec so the crate is exercisable end to end
//! without a platform binding; see `DESIGN.md`.

use crate::codec::annexb::{
    add_emulation_prevention, avcc_stream_to_annex_b, nal_to_length_prefixed, NAL_TYPE_IDR,
    NAL_TYPE_PPS, NAL_TYPE_SLICE_NON_IDR, NAL_TYPE_SPS,
};
use crate::codec::session::{Dimensions, EncoderParams};
use crate::media::PixelBuffer;

/// One encoded access unit, produced on the encoder's output callback
/// (§4.3): `(annexBPayload, isKeyframe, timestamp, duration)`.
pub struct EncodedFrame {
    pub payload: Vec<u8>,
    pub is_keyframe: bool,
    pub timestamp: u64,
    pub duration: Option<u64>,
}

/// Builds a synthetic SPS NAL payload (type 7) that embeds width/height so
/// the matching `Decoder` can recover dimensions without a real H.264
/// bitstream parser. The raw width/height bytes are run through H.264
/// emulation prevention before being appended to the NAL header byte:
/// plenty of common resolutions (e.g. 640x480, 854x480— any dimension
/// whose big-endian bytes are `00 00 01 xx` or `00 00 00 01`) otherwise
/// embed a literal Annex-B start code, which would split this SPS at a
/// false boundary when the decoder re-scans the payload.
fn synth_sps(dims: Dimensions) -> Vec<u8> {
    let mut raw = Vec::with_capacity(8);
    raw.extend_from_slice(&dims.width.to_be_bytes());
    raw.extend_from_slice(&dims.height.to_be_bytes());

    let mut out = vec![(NAL_TYPE_SPS & 0x1F) | 0x60];
    out.extend_from_slice(&add_emulation_prevention(&raw));
    out
}

fn synth_pps() -> Vec<u8> {
    vec![(NAL_TYPE_PPS & 0x1F) | 0x60]
}

pub struct Encoder {
    params: EncoderParams,
    dims: Option<Dimensions>,
    frame_count: u64,
    force_keyframe: bool,
}

impl Encoder {
    pub fn new(params: EncoderParams) -> Self {
        Self {
            params,
            dims: None,
            frame_count: 0,
            force_keyframe: false,
        }
    }

    /// Applies `params`, re-resolving `auto` fields from `pixel` if given.
    pub fn configure(&mut self, params: EncoderParams) {
        self.params = params;
        self.force_keyframe = true; // §4.3: keyframe forced "on configure"
    }

    pub fn force_keyframe(&mut self) {
        self.force_keyframe = true;
    }

    fn resolve_dims(&mut self, pixel: &PixelBuffer) -> Dimensions {
        if let Some(d) = self.dims {
            return d;
        }
        let d = Dimensions {
            width: self.params.width.unwrap_or(pixel.width),
            height: self.params.height.unwrap_or(pixel.height),
        };
        self.dims = Some(d);
        d
    }

    /// Encodes one pixel buffer. Forces a keyframe on the first frame and
    /// every `keyframe_interval` frames thereafter, or when
    /// `force_keyframe()` was called (§4.3 "Keyframe placement").
    pub fn encode(
        &mut self,
        pixel: &PixelBuffer,
        timestamp: u64,
        duration: Option<u64>,
    ) -> EncodedFrame {
        let dims = self.resolve_dims(pixel);

        let due_by_interval = self.params.keyframe_interval > 0
            && self.frame_count % self.params.keyframe_interval as u64 == 0;
        let is_keyframe = self.frame_count == 0 || due_by_interval || self.force_keyframe;
        self.force_keyframe = false;
        self.frame_count += 1;

        // The underlying host codec natively produces length-prefixed
        // ("AVCC") NAL units with parameter sets held out-of-band (§4.3);
        // build that native form first, then convert it to the
        // Annex-B form the wire protocol carries.
        let mut avcc = Vec::new();
        if is_keyframe {
            avcc.extend_from_slice(&nal_to_length_prefixed(&synth_sps(dims)));
            avcc.extend_from_slice(&nal_to_length_prefixed(&synth_pps()));
        }

        let nal_type = if is_keyframe {
            NAL_TYPE_IDR
        } else {
            NAL_TYPE_SLICE_NON_IDR
        };
        let mut slice = vec![(nal_type & 0x1F) | 0x60];
        slice.extend_from_slice(&pixel.data);
        avcc.extend_from_slice(&nal_to_length_prefixed(&slice));

        let payload = avcc_stream_to_annex_b(&avcc);

        EncodedFrame {
            payload,
            is_keyframe,
            timestamp,
            duration,
        }
    }

    /// Drains pending frames. The loopback codec is synchronous, so there
    /// is never anything pending.
    pub fn flush(&mut self) -> Vec<EncodedFrame> {
        Vec::new()
    }
}
