//! Wire protocol (C1): the 38-byte (v2) / 28-byte (v1) datagram header,
//! big-endian codec, and MTU fragmentation math.

use bytes::{BufMut, BytesMut};

pub const MAGIC: u32 = 0x4E44_4942; // "NDIB"
pub const VERSION_CURRENT: u8 = 2;
pub const VERSION_LEGACY: u8 = 1;

pub const HEADER_LEN_V2: usize = 38;
pub const HEADER_LEN_V1: usize = 28;

pub const DEFAULT_PORT: u16 = 5990;
pub const DEFAULT_MTU_PAYLOAD: usize = 1400 - HEADER_LEN_V2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaType {
    Video = 0,
    Audio = 1,
}

impl MediaType {
    fn from_u8(b: u8) -> Option<Self> {
        match b {
            0 => Some(MediaType::Video),
            1 => Some(MediaType::Audio),
            _ => None,
        }
    }
}

/// A decoded datagram header, in wire order (see §3).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    pub version: u8,
    pub media_type: MediaType,
    pub source_id: u8,
    pub flags: u8,
    pub sequence_number: u32,
    pub timestamp: u64,
    pub total_size: u32,
    pub fragment_index: u16,
    pub fragment_count: u16,
    pub payload_size: u16,
    /// Audio only; 0 for video and for v1 headers.
    pub sample_rate: u32,
    /// Audio only; 0 for video and for v1 headers.
    pub channels: u8,
}

impl Header {
    pub fn is_keyframe(&self) -> bool {
        self.flags & 0x01 != 0
    }

    pub fn with_keyframe(mut self, keyframe: bool) -> Self {
        if keyframe {
            self.flags |= 0x01;
        } else {
            self.flags &= !0x01;
        }
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvalidHeader {
    TooShort,
    BadMagic,
    BadVersion,
    BadFragmentIndex,
    PayloadTooLarge,
}

impl std::fmt::Display for InvalidHeader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let msg = match self {
            InvalidHeader::TooShort => "datagram shorter than minimum header length",
            InvalidHeader::BadMagic => "magic tag mismatch",
            InvalidHeader::BadVersion => "unsupported version",
            InvalidHeader::BadFragmentIndex => "fragmentIndex >= fragmentCount",
            InvalidHeader::PayloadTooLarge => "payloadSize exceeds what fits in one datagram",
        };
        f.write_str(msg)
    }
}

impl std::error::Error for InvalidHeader {}

/// Encodes `header` as a version-2, 38-byte header. Refuses to emit when
/// `payload_size` exceeds what fits in one datagram — the caller must
/// fragment first.
pub fn encode_header(header: &Header, mtu_payload: usize) -> Result<BytesMut, InvalidHeader> {
    if header.payload_size as usize > mtu_payload {
        return Err(InvalidHeader::PayloadTooLarge);
    }
    if header.fragment_index >= header.fragment_count {
        return Err(InvalidHeader::BadFragmentIndex);
    }

    let mut buf = BytesMut::with_capacity(HEADER_LEN_V2);
    buf.put_u32(MAGIC);
    buf.put_u8(VERSION_CURRENT);
    buf.put_u8(header.media_type as u8);
    buf.put_u8(header.source_id);
    buf.put_u8(header.flags);
    buf.put_u32(header.sequence_number);
    buf.put_u64(header.timestamp);
    buf.put_u32(header.total_size);
    buf.put_u16(header.fragment_index);
    buf.put_u16(header.fragment_count);
    buf.put_u16(header.payload_size);
    buf.put_u32(header.sample_rate);
    buf.put_u8(header.channels);
    buf.put_bytes(0, 3); // reserved
    Ok(buf)
}

/// Decodes a header from the front of `bytes`, selecting v1/v2 layout by
/// the version byte. Returns the header plus the byte offset where the
/// payload begins.
pub fn decode_header(bytes: &[u8]) -> Result<(Header, usize), InvalidHeader> {
    if bytes.len() < HEADER_LEN_V1 {
        return Err(InvalidHeader::TooShort);
    }
    let magic = u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
    if magic != MAGIC {
        return Err(InvalidHeader::BadMagic);
    }
    let version = bytes[4];

    let header = match version {
        VERSION_CURRENT => {
            if bytes.len() < HEADER_LEN_V2 {
                return Err(InvalidHeader::TooShort);
            }
            decode_v2(bytes)?
        }
        VERSION_LEGACY => decode_v1(bytes)?,
        _ => return Err(InvalidHeader::BadVersion),
    };

    if header.fragment_index >= header.fragment_count {
        return Err(InvalidHeader::BadFragmentIndex);
    }

    let header_len = if version == VERSION_LEGACY {
        HEADER_LEN_V1
    } else {
        HEADER_LEN_V2
    };
    Ok((header, header_len))
}

fn decode_v2(b: &[u8]) -> Result<Header, InvalidHeader> {
    let media_type = MediaType::from_u8(b[5]).ok_or(InvalidHeader::BadVersion)?;
    let source_id = b[6];
    let flags = b[7];
    let sequence_number = u32::from_be_bytes([b[8], b[9], b[10], b[11]]);
    let timestamp = u64::from_be_bytes([
        b[12], b[13], b[14], b[15], b[16], b[17], b[18], b[19],
    ]);
    let total_size = u32::from_be_bytes([b[20], b[21], b[22], b[23]]);
    let fragment_index = u16::from_be_bytes([b[24], b[25]]);
    let fragment_count = u16::from_be_bytes([b[26], b[27]]);
    let payload_size = u16::from_be_bytes([b[28], b[29]]);
    let sample_rate = u32::from_be_bytes([b[30], b[31], b[32], b[33]]);
    let channels = b[34];
    // b[35..38] reserved

    Ok(Header {
        version: VERSION_CURRENT,
        media_type,
        source_id,
        flags,
        sequence_number,
        timestamp,
        total_size,
        fragment_index,
        fragment_count,
        payload_size,
        sample_rate,
        channels,
    })
}

/// Legacy 28-byte header: video-only, no `sourceId`/`sampleRate`/`channels`.
fn decode_v1(b: &[u8]) -> Result<Header, InvalidHeader> {
    let flags = b[6];
    let sequence_number = u32::from_be_bytes([b[7], b[8], b[9], b[10]]);
    let timestamp = u64::from_be_bytes([
        b[11], b[12], b[13], b[14], b[15], b[16], b[17], b[18],
    ]);
    let total_size = u32::from_be_bytes([b[19], b[20], b[21], b[22]]);
    let fragment_index = u16::from_be_bytes([b[23], b[24]]);
    let fragment_count = u16::from_be_bytes([b[25], b[26]]);
    let payload_size = b[27] as u16;

    Ok(Header {
        version: VERSION_LEGACY,
        media_type: MediaType::Video,
        source_id: 0,
        flags,
        sequence_number,
        timestamp,
        total_size,
        fragment_index,
        fragment_count,
        payload_size,
        sample_rate: 0,
        channels: 0,
    })
}

/// Splits a logical frame payload into `(header without payload_size set,
/// fragment bytes)` pairs ready for `encode_header` + `send_to`.
pub fn fragment(payload: &[u8], mtu_payload: usize) -> Vec<&[u8]> {
    if payload.is_empty() {
        return vec![&payload[0..0]];
    }
    payload.chunks(mtu_payload.max(1)).collect()
}

pub fn fragment_count_for(len: usize, mtu_payload: usize) -> u16 {
    if len == 0 {
        return 1;
    }
    let mtu = mtu_payload.max(1);
    (len.div_ceil(mtu)) as u16
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_header() -> Header {
        Header {
            version: VERSION_CURRENT,
            media_type: MediaType::Audio,
            source_id: 0,
            flags: 0b0000_0001,
            sequence_number: 0xDEAD_BEEF,
            timestamp: 0x0123_4567_89AB_CDEF,
            total_size: 4096,
            fragment_index: 2,
            fragment_count: 5,
            payload_size: 1362,
            sample_rate: 48000,
            channels: 2,
        }
    }

    #[test]
    fn round_trip_preserves_every_field() {
        let h = sample_header();
        let encoded = encode_header(&h, 1362).unwrap();
        assert_eq!(encoded.len(), HEADER_LEN_V2);
        let (decoded, header_len) = decode_header(&encoded).unwrap();
        assert_eq!(header_len, HEADER_LEN_V2);
        assert_eq!(decoded, h);
    }

    #[test]
    fn reserved_bytes_are_zero() {
        let h = sample_header();
        let encoded = encode_header(&h, 1362).unwrap();
        assert_eq!(&encoded[35..38], &[0, 0, 0]);
    }

    #[test]
    fn rejects_short_datagram() {
        let short = vec![0u8; 10];
        assert_eq!(decode_header(&short), Err(InvalidHeader::TooShort));
    }

    #[test]
    fn rejects_bad_magic() {
        let mut bytes = encode_header(&sample_header(), 1362).unwrap();
        bytes[0] = 0xFF;
        assert_eq!(decode_header(&bytes), Err(InvalidHeader::BadMagic));
    }

    #[test]
    fn rejects_bad_version() {
        let mut bytes = encode_header(&sample_header(), 1362).unwrap();
        bytes[4] = 9;
        assert_eq!(decode_header(&bytes), Err(InvalidHeader::BadVersion));
    }

    #[test]
    fn rejects_fragment_index_out_of_range() {
        let mut h = sample_header();
        h.fragment_index = 5;
        h.fragment_count = 5;
        assert_eq!(
            encode_header(&h, 1362),
            Err(InvalidHeader::BadFragmentIndex)
        );
    }

    #[test]
    fn rejects_oversized_payload_distinctly_from_bad_fragment_index() {
        let mut h = sample_header();
        h.payload_size = 2000;
        assert_eq!(
            encode_header(&h, 1362),
            Err(InvalidHeader::PayloadTooLarge)
        );
    }

    #[test]
    fn accepts_legacy_v1_header() {
        // Hand-build a 28-byte v1 header: magic, version=1, flags,
        // sequence, timestamp, totalSize, fragIdx, fragCount, payloadSize.
        let mut buf = BytesMut::with_capacity(HEADER_LEN_V1);
        buf.put_u32(MAGIC);
        buf.put_u8(VERSION_LEGACY);
        buf.put_u8(0); // mediaType unused in v1 layout (video-only)
        buf.put_u8(1); // flags: keyframe
        buf.put_u32(42);
        buf.put_u64(1_000_000);
        buf.put_u32(100);
        buf.put_u16(0);
        buf.put_u16(1);
        buf.put_u8(100);
        assert_eq!(buf.len(), HEADER_LEN_V1);

        let (header, header_len) = decode_header(&buf).unwrap();
        assert_eq!(header_len, HEADER_LEN_V1);
        assert_eq!(header.version, VERSION_LEGACY);
        assert_eq!(header.media_type, MediaType::Video);
        assert!(header.is_keyframe());
        assert_eq!(header.sequence_number, 42);
        assert_eq!(header.total_size, 100);
    }

    #[test]
    fn minimum_legal_datagram_is_accepted() {
        let h = Header {
            payload_size: 0,
            fragment_count: 1,
            fragment_index: 0,
            ..sample_header()
        };
        let encoded = encode_header(&h, 1362).unwrap();
        let (decoded, len) = decode_header(&encoded).unwrap();
        assert_eq!(len, HEADER_LEN_V2);
        assert_eq!(decoded.payload_size, 0);
    }

    #[test]
    fn fragment_count_matches_ceil_division() {
        assert_eq!(fragment_count_for(0, 1362), 1);
        assert_eq!(fragment_count_for(1362, 1362), 1);
        assert_eq!(fragment_count_for(1363, 1362), 2);
        assert_eq!(fragment_count_for(10_000_000, 1362), 7343);
    }

    #[test]
    fn fragmenting_and_concatenating_reproduces_frame() {
        let frame: Vec<u8> = (0..10_000u32).map(|i| (i % 256) as u8).collect();
        let mtu = 1362;
        let pieces = fragment(&frame, mtu);
        assert_eq!(pieces.len(), fragment_count_for(frame.len(), mtu) as usize);
        let rebuilt: Vec<u8> = pieces.concat();
        assert_eq!(rebuilt, frame);
    }
}
