//! Annex-B NAL unit scanner (C3). Walks a byte stream linearly, preferring
//! the 4-byte start code over the 3-byte one when both would match at the
//! same position (§4.3 "Annex-B parsing specifics").

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NalUnit<'a> {
    /// Payload bytes, excluding the start code.
    pub payload: &'a [u8],
    /// Low 5 bits of the first payload byte.
    pub nal_type: u8,
}

/// Splits `bytes` into the NAL units delimited by Annex-B start codes.
/// Bytes before the first start code are ignored (Annex-B streams never
/// carry meaningful data there).
pub fn scan(bytes: &[u8]) -> Vec<NalUnit<'_>> {
    let starts = start_code_positions(bytes);
    let mut units = Vec::with_capacity(starts.len());

    for (i, &(pos, code_len)) in starts.iter().enumerate() {
        let payload_start = pos + code_len;
        let payload_end = starts
            .get(i + 1)
            .map(|&(next_pos, _)| next_pos)
            .unwrap_or(bytes.len());

        if payload_start >= payload_end {
            continue;
        }
        let payload = &bytes[payload_start..payload_end];
        units.push(NalUnit {
            payload,
            nal_type: payload[0] & 0x1F,
        });
    }

    units
}

/// Returns `(position, start_code_len)` for every start code in `bytes`,
/// preferring a 4-byte match over a 3-byte match at the same position.
fn start_code_positions(bytes: &[u8]) -> Vec<(usize, usize)> {
    let mut out = Vec::new();
    let mut i = 0usize;
    while i + 3 <= bytes.len() {
        if bytes[i] == 0 && bytes[i + 1] == 0 && bytes[i + 2] == 1 {
            // A 4-byte start code is a 3-byte one preceded by a zero byte;
            // prefer the longer match when both would fit.
            if i > 0 && bytes[i - 1] == 0 {
                out.push((i - 1, 4));
            } else {
                out.push((i, 3));
            }
            i += 3;
        } else {
            i += 1;
        }
    }
    out
}

/// Prepends a 4-byte Annex-B start code to `payload`.
pub fn with_start_code(payload: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(4 + payload.len());
    out.extend_from_slice(&[0, 0, 0, 1]);
    out.extend_from_slice(payload);
    out
}

/// Converts one Annex-B NAL unit (with or without its start code already
/// stripped) to a 4-byte big-endian length-prefixed ("AVCC") form.
/// Grounded on `liveion/src/recorder/fmp4.rs::nalu_to_avcc`.
pub fn nal_to_length_prefixed(nalu: &[u8]) -> Vec<u8> {
    let offset = if nalu.len() >= 4 && nalu[..4] == [0, 0, 0, 1] {
        4
    } else if nalu.len() >= 3 && nalu[..3] == [0, 0, 1] {
        3
    } else {
        0
    };
    let payload = &nalu[offset..];
    let mut out = Vec::with_capacity(4 + payload.len());
    out.extend_from_slice(&(payload.len() as u32).to_be_bytes());
    out.extend_from_slice(payload);
    out
}

/// Strips one 4-byte big-endian length prefix from the front of `avcc`,
/// returning the payload it frames. The inverse of a single
/// `nal_to_length_prefixed` call; used by `Decoder` to hand the host
/// codec's native length-prefixed shape back, one NAL at a time, after
/// converting an incoming Annex-B unit.
pub fn length_prefixed_payload(avcc: &[u8]) -> Option<&[u8]> {
    if avcc.len() < 4 {
        return None;
    }
    let len = u32::from_be_bytes([avcc[0], avcc[1], avcc[2], avcc[3]]) as usize;
    avcc.get(4..4 + len)
}

/// Reassembles a length-prefixed ("AVCC") stream of one or more NAL units
/// — as produced by repeated `nal_to_length_prefixed` calls concatenated
/// together — back into Annex-B form, each unit prefixed with a 4-byte
/// start code. Used by `Encoder` to convert the host codec's native
/// length-prefixed output into the wire's Annex-B payload shape (§4.3
/// "Annex-B ↔ length-prefixed conversion"); malformed/truncated
/// entries are dropped rather than panicking.
pub fn avcc_stream_to_annex_b(avcc: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(avcc.len());
    let mut i = 0usize;
    while i + 4 <= avcc.len() {
        let len = u32::from_be_bytes([avcc[i], avcc[i + 1], avcc[i + 2], avcc[i + 3]]) as usize;
        i += 4;
        if i + len > avcc.len() {
            break;
        }
        out.extend_from_slice(&with_start_code(&avcc[i..i + len]));
        i += len;
    }
    out
}

pub const NAL_TYPE_SLICE_NON_IDR: u8 = 1;
pub const NAL_TYPE_IDR: u8 = 5;
pub const NAL_TYPE_SPS: u8 = 7;
pub const NAL_TYPE_PPS: u8 = 8;

/// H.264 emulation prevention: inserts `0x03` after every `00 00` run
/// whenever the next raw byte is `<= 0x03`, so the escaped bytes never
/// contain a sequence a start-code scanner could mistake for `00 00 01`
/// or `00 00 00 01`. Any NAL payload that embeds arbitrary binary data
/// (not just real H.264 RBSP) must be escaped this way before it is
/// placed between start codes.
pub fn add_emulation_prevention(payload: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(payload.len() + payload.len() / 3 + 1);
    let mut zero_run = 0u32;
    for &b in payload {
        if zero_run >= 2 && b <= 0x03 {
            out.push(0x03);
            zero_run = 0;
        }
        out.push(b);
        zero_run = if b == 0 { zero_run + 1 } else { 0 };
    }
    out
}

/// Inverse of `add_emulation_prevention`: drops every `0x03` byte that
/// follows a `00 00` run.
pub fn strip_emulation_prevention(payload: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(payload.len());
    let mut zero_run = 0u32;
    for &b in payload {
        if zero_run >= 2 && b == 0x03 {
            zero_run = 0;
            continue;
        }
        out.push(b);
        zero_run = if b == 0 { zero_run + 1 } else { 0 };
    }
    out
}
