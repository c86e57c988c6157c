//! Shared device port and its exclusive lease.
//!
//! Both controllers drive the same chip-select, write-enable, address and
//! data lines. Ownership is an explicit lease: `acquire` hands out a token
//! that cannot be copied, every pin-driving call takes it, and `release`
//! consumes it. A second acquisition while a lease is outstanding fails.

use std::fmt;

use serde::Serialize;
use thiserror::Error;

/// The controller that holds the device port.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum PortOwner {
    Write,
    Read,
}

impl PortOwner {
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            PortOwner::Write => "write",
            PortOwner::Read => "read",
        }
    }
}

impl fmt::Display for PortOwner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum PortError {
    #[error("device port requested by {requester} while held by {holder}")]
    Held { holder: PortOwner, requester: PortOwner },
}

/// Device-facing output pins.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DevicePins {
    pub power_enable: bool,
    pub chip_select: bool,
    pub write_enable: bool,
    pub address: u32,
    pub write_data: u64,
}

/// Device-facing input pins.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeviceStatus {
    pub read_data: u64,
    pub busy: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Direction {
    Read,
    Write,
}

/// A single device access, as seen on the pins when it starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DeviceAccess {
    pub address: u32,
    pub direction: Direction,
    /// Write data, or the word returned for a read once it completes.
    pub data: u64,
}

/// Proof of port ownership. Not `Clone`: exactly one exists while the port
/// is held.
#[derive(Debug, PartialEq, Eq)]
pub struct PortLease {
    owner: PortOwner,
}

/// The shared device port.
#[derive(Debug, Default)]
pub struct DevicePort {
    pins: DevicePins,
    owner: Option<PortOwner>,
}

impl DevicePort {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Take the port. Powers the device domain.
    pub fn acquire(&mut self, requester: PortOwner) -> Result<PortLease, PortError> {
        if let Some(holder) = self.owner {
            return Err(PortError::Held { holder, requester });
        }
        self.owner = Some(requester);
        self.pins.power_enable = true;
        tracing::trace!(owner = %requester, "device port acquired");
        Ok(PortLease { owner: requester })
    }

    /// Give the port back. Chip-select and write-enable drop with it.
    pub fn release(&mut self, lease: PortLease) {
        self.check(&lease);
        self.owner = None;
        self.pins.chip_select = false;
        self.pins.write_enable = false;
        self.pins.power_enable = false;
        tracing::trace!(owner = %lease.owner, "device port released");
    }

    /// Start a read access at `address`.
    pub fn select_read(&mut self, lease: &PortLease, address: u32) {
        self.check(lease);
        self.pins.chip_select = true;
        self.pins.write_enable = false;
        self.pins.address = address;
    }

    /// Start a write access of `data` at `address`.
    pub fn select_write(&mut self, lease: &PortLease, address: u32, data: u64) {
        self.check(lease);
        self.pins.chip_select = true;
        self.pins.write_enable = true;
        self.pins.address = address;
        self.pins.write_data = data;
    }

    /// Retarget the read address with chip-select held.
    pub fn set_address(&mut self, lease: &PortLease, address: u32) {
        self.check(lease);
        self.pins.address = address;
    }

    pub fn deselect(&mut self, lease: &PortLease) {
        self.check(lease);
        self.pins.chip_select = false;
        self.pins.write_enable = false;
    }

    #[must_use]
    pub fn pins(&self) -> DevicePins {
        self.pins
    }

    #[must_use]
    pub fn owner(&self) -> Option<PortOwner> {
        self.owner
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    fn check(&self, lease: &PortLease) {
        debug_assert_eq!(
            self.owner,
            Some(lease.owner),
            "device port driven through a lease it did not issue"
        );
    }
}
