//! Bus-facing channel types.
//!
//! Only the fields the bridge acts on are modelled: no IDs, no strobes, no
//! QoS. A channel's `valid` is expressed as `Option` presence.

use serde::{Deserialize, Serialize};

/// AXI burst type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BurstMode {
    /// Every beat targets the base address.
    Fixed,
    /// Each beat advances by the beat size.
    #[default]
    Incr,
    /// Incrementing, wrapped at the burst-sized aligned boundary.
    Wrap,
}

/// Address-channel payload, captured when the address handshake completes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BurstDescriptor {
    pub address: u32,
    /// Bytes per beat as a power of two (`AxSIZE`), 0..=7.
    pub size: u8,
    /// Beats minus one. Wider than `AxLEN` so oversize requests can be
    /// represented and rejected.
    pub len: u16,
    #[serde(default)]
    pub mode: BurstMode,
}

impl BurstDescriptor {
    /// An INCR burst. `size` is masked to its three-bit field.
    #[must_use]
    pub fn incr(address: u32, size: u8, len: u16) -> Self {
        Self {
            address,
            size: size & 0x7,
            len,
            mode: BurstMode::Incr,
        }
    }

    #[must_use]
    pub fn with_mode(mut self, mode: BurstMode) -> Self {
        self.mode = mode;
        self
    }

    /// Total beats in the burst (`len + 1`).
    #[must_use]
    pub fn beats(&self) -> u32 {
        u32::from(self.len) + 1
    }

    #[must_use]
    pub fn bytes_per_beat(&self) -> u32 {
        1 << (self.size & 0x7)
    }

    /// Device address of beat `index` (zero-based).
    #[must_use]
    pub fn beat_address(&self, index: u32) -> u32 {
        let step = index.wrapping_mul(self.bytes_per_beat());
        match self.mode {
            BurstMode::Fixed => self.address,
            BurstMode::Incr => self.address.wrapping_add(step),
            BurstMode::Wrap => {
                let window = self.beats() * self.bytes_per_beat();
                if !window.is_power_of_two() {
                    // AXI only allows 2, 4, 8 or 16 beat wrapping bursts;
                    // anything else degrades to INCR.
                    return self.address.wrapping_add(step);
                }
                let lower = self.address & !(window - 1);
                let offset = (self.address - lower).wrapping_add(step) & (window - 1);
                lower | offset
            }
        }
    }
}

/// Response status on the B and R channels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Resp {
    #[default]
    Okay,
    SlaveError,
}

impl Resp {
    #[must_use]
    pub fn is_error(self) -> bool {
        self == Resp::SlaveError
    }
}

/// One write-data beat.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WriteBeat {
    pub data: u64,
    pub last: bool,
}

/// One read-data beat as presented on the R channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ReadBeat {
    pub data: u64,
    pub resp: Resp,
    pub last: bool,
}

impl ReadBeat {
    /// The single terminating beat emitted on every read fault.
    #[must_use]
    pub fn error() -> Self {
        Self {
            data: 0,
            resp: Resp::SlaveError,
            last: true,
        }
    }
}

/// Levels driven by the bus master during one cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AxiInputs {
    /// AW channel (`AWVALID` when `Some`).
    pub aw: Option<BurstDescriptor>,
    /// W channel (`WVALID` when `Some`).
    pub w: Option<WriteBeat>,
    pub b_ready: bool,
    /// AR channel (`ARVALID` when `Some`).
    pub ar: Option<BurstDescriptor>,
    pub r_ready: bool,
}

/// Levels driven by the bridge toward the bus master.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AxiOutputs {
    pub aw_ready: bool,
    pub w_ready: bool,
    /// B channel (`BVALID` when `Some`).
    pub b: Option<Resp>,
    pub ar_ready: bool,
    /// R channel (`RVALID` when `Some`).
    pub r: Option<ReadBeat>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn incr_advances_by_beat_size() {
        let desc = BurstDescriptor::incr(0x200, 3, 3);
        let addrs: Vec<u32> = (0..desc.beats()).map(|i| desc.beat_address(i)).collect();
        assert_eq!(addrs, vec![0x200, 0x208, 0x210, 0x218]);
    }

    #[test]
    fn fixed_repeats_base() {
        let desc = BurstDescriptor::incr(0x40, 2, 7).with_mode(BurstMode::Fixed);
        assert!((0..desc.beats()).all(|i| desc.beat_address(i) == 0x40));
    }

    #[test]
    fn wrap_stays_inside_window() {
        // 4 beats x 8 bytes = 32-byte window starting at 0x100.
        let desc = BurstDescriptor::incr(0x110, 3, 3).with_mode(BurstMode::Wrap);
        let addrs: Vec<u32> = (0..desc.beats()).map(|i| desc.beat_address(i)).collect();
        assert_eq!(addrs, vec![0x110, 0x118, 0x100, 0x108]);
    }

    #[test]
    fn size_is_masked_to_field_width() {
        let desc = BurstDescriptor::incr(0, 0x0B, 0);
        assert_eq!(desc.size, 3);
        assert_eq!(desc.bytes_per_beat(), 8);
    }

    #[test]
    fn error_beat_is_last_slave_error() {
        assert!(ReadBeat::error().resp.is_error());
        assert!(ReadBeat::error().last);
    }
}
