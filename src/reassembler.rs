//! Reassembler (C2): turns fragmented datagrams of a single media type
//! back into whole frames. Complete-or-drop policy on sequence change,
//! last-writer-wins on duplicate fragment index (see §4.2).

use std::collections::BTreeMap;

use tracing::warn;

use crate::wire::Header;

/// A fully reassembled logical frame (§3).
#[derive(Debug, Clone)]
pub struct Frame {
    pub sequence_number: u32,
    pub timestamp: u64,
    pub flags: u8,
    pub payload: Vec<u8>,
    pub sample_rate: u32,
    pub channels: u8,
}

impl Frame {
    pub fn is_keyframe(&self) -> bool {
        self.flags & 0x01 != 0
    }
}

struct Slot {
    current_sequence: Option<u32>,
    expected_count: u16,
    expected_total_size: u32,
    timestamp: u64,
    flags: u8,
    sample_rate: u32,
    channels: u8,
    fragments: BTreeMap<u16, Vec<u8>>,
}

impl Slot {
    fn empty() -> Self {
        Self {
            current_sequence: None,
            expected_count: 0,
            expected_total_size: 0,
            timestamp: 0,
            flags: 0,
            sample_rate: 0,
            channels: 0,
            fragments: BTreeMap::new(),
        }
    }

    /// Resets the slot for a new sequence. Returns `true` if this reset
    /// dropped a partially filled slot (§7 "Reassembly loss").
    fn reset(&mut self, header: &Header) -> bool {
        let dropped_partial = self.current_sequence.is_some() && !self.fragments.is_empty();
        if dropped_partial {
            warn!(
                got = self.fragments.len(),
                expected = self.expected_count as usize,
                sequence = self.current_sequence.unwrap(),
                "reassembly: sequence changed with a partially filled slot, dropping"
            );
        }
        self.current_sequence = Some(header.sequence_number);
        self.expected_count = header.fragment_count;
        self.expected_total_size = header.total_size;
        self.timestamp = header.timestamp;
        self.flags = header.flags;
        self.sample_rate = header.sample_rate;
        self.channels = header.channels;
        self.fragments.clear();
        dropped_partial
    }
}

/// Per-media-type reassembly state (one instance for video, one for audio).
pub struct Reassembler {
    slot: Slot,
    /// Count of partial-slot drops since the last `take_drop_count` call
    /// (§7's "counter is incremented for observability"); drained by
    /// the orchestrator into `Metrics::record_reassembly_drop`.
    drop_count: u64,
}

impl Default for Reassembler {
    fn default() -> Self {
        Self::new()
    }
}

impl Reassembler {
    pub fn new() -> Self {
        Self {
            slot: Slot::empty(),
            drop_count: 0,
        }
    }

    /// Returns and resets the number of partial-slot drops observed since
    /// the last call.
    pub fn take_drop_count(&mut self) -> u64 {
        std::mem::take(&mut self.drop_count)
    }

    /// Admits one fragment. Returns `Some(Frame)` when this fragment
    /// completes its sequence.
    pub fn admit(&mut self, header: &Header, payload: &[u8]) -> Option<Frame> {
        if self.slot.current_sequence != Some(header.sequence_number) && self.slot.reset(header) {
            self.drop_count += 1;
        }

        self.slot
            .fragments
            .insert(header.fragment_index, payload.to_vec());

        if self.slot.fragments.len() == self.slot.expected_count as usize {
            let mut concatenated = Vec::with_capacity(self.slot.expected_total_size as usize);
            for idx in 0..self.slot.expected_count {
                if let Some(chunk) = self.slot.fragments.get(&idx) {
                    concatenated.extend_from_slice(chunk);
                }
            }

            if concatenated.len() != self.slot.expected_total_size as usize {
                warn!(
                    got = concatenated.len(),
                    expected = self.slot.expected_total_size,
                    sequence = header.sequence_number,
                    "reassembly: concatenated length disagrees with totalSize, delivering anyway"
                );
            }

            let frame = Frame {
                sequence_number: header.sequence_number,
                timestamp: self.slot.timestamp,
                flags: self.slot.flags,
                payload: concatenated,
                sample_rate: self.slot.sample_rate,
                channels: self.slot.channels,
            };

            self.slot.current_sequence = None;
            self.slot.fragments.clear();
            return Some(frame);
        }

        None
    }
}
