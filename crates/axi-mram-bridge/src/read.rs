//! Read-burst controller with prefetch.
//!
//! Idle → Wait (prefetch the whole burst into the buffer) → Stream (hand
//! buffered words to R) → Idle. Every fault leaves through a single
//! SlaveError beat with RLAST set and returns to Idle.

use crate::axi::{BurstDescriptor, ReadBeat, Resp};
use crate::fault::FaultCause;
use crate::fifo::{PREFETCH_CAPACITY, PrefetchBuffer};
use crate::port::{PortLease, PortOwner};
use crate::EdgeContext;

/// Observable phase of the read controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadPhase {
    Idle,
    Wait,
    Stream,
}

impl ReadPhase {
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            ReadPhase::Idle => "idle",
            ReadPhase::Wait => "wait",
            ReadPhase::Stream => "stream",
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ReadInputs {
    /// Burst whose AR handshake completed on this edge.
    pub accepted: Option<BurstDescriptor>,
    pub r_ready: bool,
}

#[derive(Debug)]
struct Burst {
    desc: BurstDescriptor,
    lease: PortLease,
    /// Words captured into the buffer so far.
    fetched: u32,
}

#[derive(Debug, Default)]
enum State {
    #[default]
    Idle,
    Wait {
        burst: Burst,
        /// Cycles left before the addressed word is sampled.
        latency: u32,
        /// Chip-select was dropped to repeat an address; reassert it first.
        reselect: bool,
    },
    Stream {
        burst: Burst,
        /// Beats handed to R so far.
        delivered: u32,
    },
}

#[derive(Debug)]
pub struct ReadController {
    state: State,
    fifo: PrefetchBuffer,
    /// R channel register (`RVALID` when `Some`).
    beat: Option<ReadBeat>,
    read_latency: u32,
}

impl ReadController {
    #[must_use]
    pub fn new(read_latency: u32) -> Self {
        Self {
            state: State::Idle,
            fifo: PrefetchBuffer::new(),
            beat: None,
            read_latency,
        }
    }

    #[must_use]
    pub fn phase(&self) -> ReadPhase {
        match self.state {
            State::Idle => ReadPhase::Idle,
            State::Wait { .. } => ReadPhase::Wait,
            State::Stream { .. } => ReadPhase::Stream,
        }
    }

    /// Idle with no error beat left to drain.
    #[must_use]
    pub fn accepts_address(&self) -> bool {
        matches!(self.state, State::Idle) && self.beat.is_none()
    }

    #[must_use]
    pub fn is_waiting(&self) -> bool {
        matches!(self.state, State::Wait { .. })
    }

    #[must_use]
    pub fn r(&self) -> Option<ReadBeat> {
        self.beat
    }

    #[must_use]
    pub fn fifo(&self) -> &PrefetchBuffer {
        &self.fifo
    }

    #[must_use]
    pub fn fetched(&self) -> Option<u32> {
        match &self.state {
            State::Wait { burst, .. } | State::Stream { burst, .. } => Some(burst.fetched),
            State::Idle => None,
        }
    }

    #[must_use]
    pub fn delivered(&self) -> Option<u32> {
        match self.state {
            State::Stream { delivered, .. } => Some(delivered),
            _ => None,
        }
    }

    pub fn step(&mut self, inputs: &ReadInputs, ctx: &mut EdgeContext<'_>) {
        let taken = if inputs.r_ready { self.beat.take() } else { None };

        self.state = match std::mem::take(&mut self.state) {
            State::Idle => match inputs.accepted {
                Some(desc) => self.begin(desc, ctx),
                None => State::Idle,
            },

            State::Wait {
                mut burst,
                latency,
                reselect,
            } => {
                if ctx.timed_out {
                    self.fail(burst.lease, FaultCause::Timeout, ctx)
                } else if ctx.device.busy {
                    State::Wait {
                        burst,
                        latency,
                        reselect,
                    }
                } else if reselect {
                    let address = burst.desc.beat_address(burst.fetched);
                    ctx.port.select_read(&burst.lease, address);
                    State::Wait {
                        burst,
                        latency,
                        reselect: false,
                    }
                } else if latency > 0 {
                    State::Wait {
                        burst,
                        latency: latency - 1,
                        reselect: false,
                    }
                } else if self.fifo.push(ctx.device.read_data).is_err() {
                    self.fail(burst.lease, FaultCause::FifoOverflow, ctx)
                } else {
                    burst.fetched += 1;
                    if burst.fetched >= burst.desc.beats() {
                        tracing::debug!(words = burst.fetched, "prefetch complete");
                        State::Stream {
                            burst,
                            delivered: 0,
                        }
                    } else {
                        let address = burst.desc.beat_address(burst.fetched);
                        // The device only starts an access on a new address
                        // or a fresh chip-select, so a repeat needs a gap.
                        let reselect = address == ctx.port.pins().address;
                        if reselect {
                            ctx.port.deselect(&burst.lease);
                        } else {
                            ctx.port.set_address(&burst.lease, address);
                        }
                        tracing::trace!(
                            beat = burst.fetched,
                            address = format_args!("{address:#010X}"),
                            "device read issued"
                        );
                        State::Wait {
                            burst,
                            latency: self.read_latency,
                            reselect,
                        }
                    }
                }
            }

            State::Stream {
                burst,
                mut delivered,
            } => match taken {
                Some(beat) if beat.last => {
                    tracing::debug!(beats = delivered, "read burst complete");
                    ctx.port.release(burst.lease);
                    State::Idle
                }
                // Accepted this edge: RVALID drops for one cycle.
                Some(_) => State::Stream { burst, delivered },
                None if inputs.r_ready => match self.fifo.pop() {
                    Ok(data) => {
                        self.beat = Some(ReadBeat {
                            data,
                            resp: Resp::Okay,
                            last: delivered >= u32::from(burst.desc.len),
                        });
                        // Keep the device running ahead of the stream; the
                        // word is dropped when the next burst clears the buffer.
                        let ahead = burst.desc.beat_address(burst.desc.beats() + delivered);
                        ctx.port.set_address(&burst.lease, ahead);
                        delivered += 1;
                        State::Stream { burst, delivered }
                    }
                    Err(_) => self.fail(burst.lease, FaultCause::FifoUnderflow, ctx),
                },
                None => State::Stream { burst, delivered },
            },
        };
    }

    pub fn reset(&mut self) {
        self.state = State::Idle;
        self.fifo.clear();
        self.beat = None;
    }

    fn begin(&mut self, desc: BurstDescriptor, ctx: &mut EdgeContext<'_>) -> State {
        if usize::from(desc.len) >= PREFETCH_CAPACITY {
            ctx.faults.raise(FaultCause::BurstTooLong);
            self.beat = Some(ReadBeat::error());
            return State::Idle;
        }
        let lease = match ctx.port.acquire(PortOwner::Read) {
            Ok(lease) => lease,
            Err(err) => {
                tracing::error!(%err, "read burst refused");
                self.beat = Some(ReadBeat::error());
                return State::Idle;
            }
        };
        tracing::debug!(
            address = format_args!("{:#010X}", desc.address),
            len = desc.len,
            size = desc.size,
            "read burst accepted"
        );
        self.fifo.clear();
        ctx.port.select_read(&lease, desc.beat_address(0));
        State::Wait {
            burst: Burst {
                desc,
                lease,
                fetched: 0,
            },
            latency: self.read_latency,
            reselect: false,
        }
    }

    fn fail(&mut self, lease: PortLease, cause: FaultCause, ctx: &mut EdgeContext<'_>) -> State {
        ctx.faults.raise(cause);
        ctx.port.release(lease);
        self.beat = Some(ReadBeat::error());
        State::Idle
    }
}
