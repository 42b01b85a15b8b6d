//! `VideoCodec` (C7): re-exports the concrete `Encoder`/`Decoder` from
//! `codec/` as the capability interface C5/C6 program against. §4.7
//! defines this interface's operations identically to §4.3; there is
//! nothing to add here beyond naming the seam, the way
//! `liveion/src/recorder/codec/mod.rs::CodecAdapter` names the seam
//! between the segmenter and concrete per-codec adapters.

pub use crate::codec::{Decoded, DecodedFrame, Decoder, EncodedFrame, Encoder, EncoderParams};
