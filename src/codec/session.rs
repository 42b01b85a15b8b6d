//! Shared codec session state (C3): parameters, SPS/PPS lifecycle, and
//! the derived format description used to decide when a decoder session
//! must be (re)created.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

/// Encoder-side configuration (§4.3). `None` fields are `auto` and
/// get resolved from the first input frame.
#[derive(Debug, Clone)]
pub struct EncoderParams {
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub bitrate_bps: u32,
    pub keyframe_interval: u32,
    pub frame_rate: Option<f64>,
    pub low_latency: bool,
}

impl Default for EncoderParams {
    fn default() -> Self {
        Self {
            width: None,
            height: None,
            bitrate_bps: 6_000_000,
            keyframe_interval: 120,
            frame_rate: None,
            low_latency: true,
        }
    }
}

/// Decoder-side state: latest SPS/PPS and whether a session is ready.
/// Grounded on `liveion/src/recorder/codec/h264.rs::H264Adapter`.
#[derive(Debug, Default)]
pub struct ParameterSets {
    pub sps: Option<Vec<u8>>,
    pub pps: Option<Vec<u8>>,
}

impl ParameterSets {
    pub fn ready(&self) -> bool {
        self.sps.is_some() && self.pps.is_some()
    }

    /// Updates SPS, returning `true` if this changed the known parameter
    /// set (a format change that invalidates any existing session).
    pub fn set_sps(&mut self, sps: Vec<u8>) -> bool {
        let changed = self.sps.as_deref() != Some(sps.as_slice());
        self.sps = Some(sps);
        changed
    }

    /// Updates PPS, returning `true` if this changed the known parameter
    /// set.
    pub fn set_pps(&mut self, pps: Vec<u8>) -> bool {
        let changed = self.pps.as_deref() != Some(pps.as_slice());
        self.pps = Some(pps);
        changed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_ready_until_both_sps_and_pps_known() {
        let mut ps = ParameterSets::default();
        assert!(!ps.ready());
        ps.set_sps(vec![0x67, 1, 2]);
        assert!(!ps.ready());
        ps.set_pps(vec![0x68, 3]);
        assert!(ps.ready());
    }

    #[test]
    fn reports_change_on_differing_parameter_sets() {
        let mut ps = ParameterSets::default();
        assert!(ps.set_sps(vec![1, 2, 3]));
        assert!(!ps.set_sps(vec![1, 2, 3]));
        assert!(ps.set_sps(vec![1, 2, 4]));
    }
}
