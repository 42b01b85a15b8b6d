//! Codec adapter (C3): H.264 Annex-B handling, SPS/PPS lifecycle,
//! keyframe policy, and conversion to/from the host codec's native
//! (length-prefixed) shape. See `DESIGN.md` for grounding.

pub mod annexb;
pub mod decoder;
pub mod encoder;
pub mod session;

pub use decoder::{Decoded, DecodedFrame, Decoder};
pub use encoder::{EncodedFrame, Encoder};
pub use session::EncoderParams;
