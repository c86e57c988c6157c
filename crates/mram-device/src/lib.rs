//! Behavioural MRAM model.
//!
//! Standalone device driven purely by its pins, following the project's
//! chip-level library pattern: the bridge never calls into it, it only sees
//! the levels on chip-select, write-enable, address and data.
//!
//! # Access handshake
//!
//! An access starts on an edge where chip-select is high, the device is not
//! busy, and the (address, write-enable) pair differs from the last access
//! started under the current chip-select assertion. The device then reports
//! busy for the configured latency. Read data appears on the data-out pins
//! when the access completes and holds until the next read completes.
//!
//! Storage is non-volatile: `reset` and loss of power drop in-flight work
//! but keep every written word.

use std::collections::BTreeMap;

use axi_mram_bridge::{DeviceAccess, DevicePins, DeviceStatus, Direction};
use serde::{Deserialize, Serialize};
use sim_core::{Clocked, Observable, Value};

/// Access timing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MramConfig {
    /// Busy cycles per read.
    pub read_latency: u32,
    /// Busy cycles per write.
    pub write_latency: u32,
}

pub struct Mram {
    config: MramConfig,
    words: BTreeMap<u32, u64>,
    cycle: u64,
    busy_remaining: u32,
    /// Word to publish when the in-flight read completes.
    pending_read: Option<u64>,
    read_data: u64,
    /// Access started under the current chip-select assertion.
    active: Option<(u32, bool)>,
    stuck: bool,
    stall_after: Option<usize>,
    log: Vec<DeviceAccess>,
}

impl Mram {
    #[must_use]
    pub fn new(config: MramConfig) -> Self {
        Self {
            config,
            words: BTreeMap::new(),
            cycle: 0,
            busy_remaining: 0,
            pending_read: None,
            read_data: 0,
            active: None,
            stuck: false,
            stall_after: None,
            log: Vec::new(),
        }
    }

    /// Stored word at `address`; never-written locations read as zero.
    #[must_use]
    pub fn peek(&self, address: u32) -> u64 {
        self.words.get(&address).copied().unwrap_or(0)
    }

    /// Preload a word without a bus access.
    pub fn poke(&mut self, address: u32, value: u64) {
        self.words.insert(address, value);
    }

    /// Every access started since power-up, in order.
    #[must_use]
    pub fn accesses(&self) -> &[DeviceAccess] {
        &self.log
    }

    /// Force busy high (or release it). A wedged device starts no accesses.
    pub fn set_stuck(&mut self, stuck: bool) {
        self.stuck = stuck;
    }

    /// Wedge the device once `count` accesses have started.
    pub fn stall_after(&mut self, count: Option<usize>) {
        self.stall_after = count;
    }

    #[must_use]
    pub fn status(&self) -> DeviceStatus {
        DeviceStatus {
            read_data: self.read_data,
            busy: self.stuck || self.busy_remaining > 0,
        }
    }

    fn start(&mut self, pins: &DevicePins) {
        let (direction, data, latency) = if pins.write_enable {
            self.words.insert(pins.address, pins.write_data);
            self.pending_read = None;
            (Direction::Write, pins.write_data, self.config.write_latency)
        } else {
            let word = self.peek(pins.address);
            self.pending_read = Some(word);
            (Direction::Read, word, self.config.read_latency)
        };
        tracing::trace!(
            cycle = self.cycle,
            ?direction,
            address = format_args!("{:#010X}", pins.address),
            data = format_args!("{data:#018X}"),
            "mram access"
        );
        self.log.push(DeviceAccess {
            address: pins.address,
            direction,
            data,
        });
        self.active = Some((pins.address, pins.write_enable));
        self.busy_remaining = latency;
        if latency == 0 {
            self.complete();
        }
        if self.stall_after.is_some_and(|count| self.log.len() >= count) {
            tracing::debug!(accesses = self.log.len(), "mram wedged");
            self.stuck = true;
        }
    }

    fn complete(&mut self) {
        if let Some(word) = self.pending_read.take() {
            self.read_data = word;
        }
    }
}

impl Default for Mram {
    fn default() -> Self {
        Self::new(MramConfig::default())
    }
}

impl Clocked for Mram {
    type Inputs = DevicePins;
    type Outputs = DeviceStatus;

    fn step(&mut self, pins: &DevicePins) -> DeviceStatus {
        self.cycle += 1;

        if !pins.power_enable {
            self.busy_remaining = 0;
            self.pending_read = None;
            self.active = None;
            return self.status();
        }
        if !pins.chip_select {
            self.active = None;
        }

        if self.busy_remaining > 0 {
            self.busy_remaining -= 1;
            if self.busy_remaining == 0 {
                self.complete();
            }
        }

        if pins.chip_select && !self.stuck && self.busy_remaining == 0 {
            let key = (pins.address, pins.write_enable);
            if self.active != Some(key) {
                self.start(pins);
            }
        }
        self.status()
    }

    /// Drop in-flight work and fault injection; stored words survive.
    fn reset(&mut self) {
        self.cycle = 0;
        self.busy_remaining = 0;
        self.pending_read = None;
        self.read_data = 0;
        self.active = None;
        self.stuck = false;
        self.stall_after = None;
    }
}

impl Observable for Mram {
    fn query(&self, path: &str) -> Option<Value> {
        let count = |direction| self.log.iter().filter(|a| a.direction == direction).count() as u32;
        let value = match path {
            "cycle" => self.cycle.into(),
            "busy" => self.status().busy.into(),
            "stuck" => self.stuck.into(),
            "read_data" => self.read_data.into(),
            "accesses" => (self.log.len() as u32).into(),
            "reads" => count(Direction::Read).into(),
            "writes" => count(Direction::Write).into(),
            "words" => (self.words.len() as u32).into(),
            _ => return None,
        };
        Some(value)
    }

    fn query_paths(&self) -> &'static [&'static str] {
        &["cycle", "busy", "stuck", "read_data", "accesses", "reads", "writes", "words"]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pins(cs: bool, we: bool, address: u32, write_data: u64) -> DevicePins {
        DevicePins {
            power_enable: true,
            chip_select: cs,
            write_enable: we,
            address,
            write_data,
        }
    }

    #[test]
    fn zero_latency_write_then_read() {
        let mut mram = Mram::default();
        let status = mram.step(&pins(true, true, 0x100, 0xDEAD_BEEF));
        assert!(!status.busy);
        assert_eq!(mram.peek(0x100), 0xDEAD_BEEF);

        mram.step(&pins(false, false, 0x100, 0));
        let status = mram.step(&pins(true, false, 0x100, 0));
        assert_eq!(status.read_data, 0xDEAD_BEEF);
        assert_eq!(mram.accesses().len(), 2);
    }

    #[test]
    fn held_chip_select_starts_one_access() {
        let mut mram = Mram::default();
        for _ in 0..5 {
            mram.step(&pins(true, true, 0x40, 9));
        }
        assert_eq!(mram.accesses().len(), 1);
    }

    #[test]
    fn address_change_under_chip_select_starts_a_read() {
        let mut mram = Mram::default();
        mram.poke(0x0, 10);
        mram.poke(0x8, 20);
        assert_eq!(mram.step(&pins(true, false, 0x0, 0)).read_data, 10);
        assert_eq!(mram.step(&pins(true, false, 0x8, 0)).read_data, 20);
        let reads: Vec<u32> = mram.accesses().iter().map(|a| a.address).collect();
        assert_eq!(reads, vec![0x0, 0x8]);
    }

    #[test]
    fn latency_holds_busy_and_data() {
        let mut mram = Mram::new(MramConfig {
            read_latency: 3,
            write_latency: 0,
        });
        mram.poke(0x10, 77);
        let mut busy_edges = 0;
        let mut status = mram.step(&pins(true, false, 0x10, 0));
        while status.busy {
            assert_eq!(status.read_data, 0);
            busy_edges += 1;
            status = mram.step(&pins(true, false, 0x10, 0));
        }
        assert_eq!(busy_edges, 3);
        assert_eq!(status.read_data, 77);
    }

    #[test]
    fn request_while_busy_is_deferred() {
        let mut mram = Mram::new(MramConfig {
            read_latency: 2,
            write_latency: 0,
        });
        mram.poke(0x20, 5);
        mram.step(&pins(true, false, 0x10, 0));
        mram.step(&pins(true, false, 0x20, 0));
        assert_eq!(mram.accesses().len(), 1);
        mram.step(&pins(true, false, 0x20, 0));
        assert_eq!(mram.accesses().len(), 2);
        assert_eq!(mram.accesses()[1].address, 0x20);
    }

    #[test]
    fn stall_after_wedges_busy() {
        let mut mram = Mram::default();
        mram.stall_after(Some(1));
        let status = mram.step(&pins(true, true, 0, 1));
        assert!(status.busy);
        mram.step(&pins(false, false, 0, 0));
        assert!(mram.step(&pins(true, true, 8, 2)).busy);
        assert_eq!(mram.accesses().len(), 1);
    }

    #[test]
    fn power_loss_keeps_words() {
        let mut mram = Mram::default();
        mram.step(&pins(true, true, 0x30, 3));
        let mut off = pins(true, true, 0x38, 4);
        off.power_enable = false;
        mram.step(&off);
        assert_eq!(mram.accesses().len(), 1);
        mram.reset();
        assert_eq!(mram.peek(0x30), 3);
        assert_eq!(mram.query("busy"), Some(Value::Bool(false)));
    }
}
