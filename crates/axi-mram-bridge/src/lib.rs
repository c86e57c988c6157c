//! AXI4 burst bridge for a busy/ready MRAM device.
//!
//! Bursts arriving on the bus are broken into single device accesses on a
//! shared port. Writes go one beat at a time with a configurable inter-beat
//! delay; reads prefetch the whole burst into a 256-word buffer and then
//! stream it back. A shared watchdog aborts any transaction whose device
//! stays busy past the configured budget, and every fault latches a sticky
//! cause code.
//!
//! # Timing model
//!
//! [`Bridge::step`](sim_core::Clocked::step) is one rising edge. It samples
//! the levels the master and the device drive during the cycle, and returns
//! the levels the bridge drives for the next cycle. A handshake completes on
//! an edge where the sampled `valid` met the `ready` the bridge returned on
//! the edge before.
//!
//! # Port ownership
//!
//! Only one controller may drive the device at a time. The address channels
//! are arbitrated so a burst is only accepted while the other direction is
//! idle, and the port itself refuses a second lease.

pub mod arbiter;
pub mod axi;
mod bridge;
pub mod config;
pub mod fault;
pub mod fifo;
pub mod port;
pub mod read;
pub mod timeout;
pub mod write;

pub use axi::{AxiInputs, AxiOutputs, BurstDescriptor, BurstMode, ReadBeat, Resp, WriteBeat};
pub use bridge::{Bridge, BridgeInputs, BridgeOutputs, EdgeContext};
pub use config::{BridgeConfig, ConfigError};
pub use fault::{FaultCause, FaultRecord};
pub use fifo::{FifoError, PREFETCH_CAPACITY, PrefetchBuffer};
pub use port::{
    DeviceAccess, DevicePins, DevicePort, DeviceStatus, Direction, PortError, PortLease, PortOwner,
};
pub use read::ReadPhase;
pub use write::WritePhase;
