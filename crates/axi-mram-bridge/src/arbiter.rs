//! Address-channel arbitration.
//!
//! At most one of AWREADY/ARREADY is offered on any cycle, so two bursts can
//! never be accepted on the same edge. When both channels are free the
//! requester that did not win last time is preferred.

use crate::port::PortOwner;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Arbiter {
    /// Channel offered when nobody is requesting.
    preferred: PortOwner,
}

impl Arbiter {
    #[must_use]
    pub fn new() -> Self {
        Self {
            preferred: PortOwner::Write,
        }
    }

    /// Pick the channel to offer address-ready to for the next cycle.
    ///
    /// `*_open` says whether a channel could accept a burst at all;
    /// `*_request` is the master's current valid level on that channel.
    #[must_use]
    pub fn offer(
        &self,
        write_open: bool,
        read_open: bool,
        write_request: bool,
        read_request: bool,
    ) -> Option<PortOwner> {
        match (write_open, read_open) {
            (false, false) => None,
            (true, false) => Some(PortOwner::Write),
            (false, true) => Some(PortOwner::Read),
            (true, true) => {
                let pick = match (write_request, read_request) {
                    (true, false) => PortOwner::Write,
                    (false, true) => PortOwner::Read,
                    _ => self.preferred,
                };
                Some(pick)
            }
        }
    }

    /// Record that `winner` completed an address handshake.
    pub fn granted(&mut self, winner: PortOwner) {
        self.preferred = match winner {
            PortOwner::Write => PortOwner::Read,
            PortOwner::Read => PortOwner::Write,
        };
    }

    pub fn reset(&mut self) {
        *self = Self::new();
    }
}

impl Default for Arbiter {
    fn default() -> Self {
        Self::new()
    }
}
