//! Write-burst controller.
//!
//! Idle → Setup → Wait → Respond → Idle. One device write per beat, each
//! held for the inter-beat delay before the next beat is taken.

use crate::axi::{BurstDescriptor, Resp, WriteBeat};
use crate::fault::FaultCause;
use crate::port::{PortLease, PortOwner};
use crate::EdgeContext;

/// Observable phase of the write controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WritePhase {
    Idle,
    Setup,
    Wait,
    Respond,
}

impl WritePhase {
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            WritePhase::Idle => "idle",
            WritePhase::Setup => "setup",
            WritePhase::Wait => "wait",
            WritePhase::Respond => "respond",
        }
    }
}

/// Channel inputs the write controller samples on an edge.
#[derive(Debug, Clone, Copy, Default)]
pub struct WriteInputs {
    /// Burst whose AW handshake completed on this edge.
    pub accepted: Option<BurstDescriptor>,
    /// Master's W channel level.
    pub w: Option<WriteBeat>,
    pub b_ready: bool,
    /// Inter-beat delay in cycles, sampled when each beat is issued.
    pub write_delay: u32,
}

#[derive(Debug)]
struct Burst {
    desc: BurstDescriptor,
    lease: PortLease,
    /// Zero-based index of the beat being handled.
    beat: u32,
}

#[derive(Debug, Default)]
enum State {
    #[default]
    Idle,
    Setup {
        burst: Burst,
        /// Beat taken from W but not yet issued because the device is busy.
        pending: Option<WriteBeat>,
    },
    Wait {
        burst: Burst,
        elapsed: u32,
        delay: u32,
        last: bool,
    },
    Respond {
        lease: Option<PortLease>,
        resp: Resp,
    },
}

#[derive(Debug, Default)]
pub struct WriteController {
    state: State,
}

impl WriteController {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn phase(&self) -> WritePhase {
        match self.state {
            State::Idle => WritePhase::Idle,
            State::Setup { .. } => WritePhase::Setup,
            State::Wait { .. } => WritePhase::Wait,
            State::Respond { .. } => WritePhase::Respond,
        }
    }

    /// Whether the controller can take a new AW burst.
    #[must_use]
    pub fn accepts_address(&self) -> bool {
        matches!(self.state, State::Idle)
    }

    /// Whether the controller is stalled on the device this cycle, which
    /// is what the timeout monitor counts.
    #[must_use]
    pub fn is_waiting(&self) -> bool {
        match &self.state {
            State::Wait { .. } => true,
            State::Setup { pending, .. } => pending.is_some(),
            _ => false,
        }
    }

    #[must_use]
    pub fn w_ready(&self) -> bool {
        matches!(self.state, State::Setup { pending: None, .. })
    }

    /// B channel level (`BVALID` when `Some`).
    #[must_use]
    pub fn b(&self) -> Option<Resp> {
        match self.state {
            State::Respond { resp, .. } => Some(resp),
            _ => None,
        }
    }

    /// Index of the beat in flight, if a burst is active.
    #[must_use]
    pub fn beat(&self) -> Option<u32> {
        match &self.state {
            State::Setup { burst, .. } | State::Wait { burst, .. } => Some(burst.beat),
            _ => None,
        }
    }

    pub fn step(&mut self, inputs: &WriteInputs, ctx: &mut EdgeContext<'_>) {
        // Channel levels this edge were produced from the state at entry.
        let w_fire = self.w_ready() && inputs.w.is_some();
        let b_fire = self.b().is_some() && inputs.b_ready;

        self.state = match std::mem::take(&mut self.state) {
            State::Idle => match inputs.accepted {
                Some(desc) => match ctx.port.acquire(PortOwner::Write) {
                    Ok(lease) => {
                        tracing::debug!(
                            address = format_args!("{:#010X}", desc.address),
                            len = desc.len,
                            size = desc.size,
                            "write burst accepted"
                        );
                        State::Setup {
                            burst: Burst {
                                desc,
                                lease,
                                beat: 0,
                            },
                            pending: None,
                        }
                    }
                    Err(err) => {
                        tracing::error!(%err, "write burst refused");
                        State::Respond {
                            lease: None,
                            resp: Resp::SlaveError,
                        }
                    }
                },
                None => State::Idle,
            },

            State::Setup { burst, pending } => {
                let pending = if w_fire { inputs.w } else { pending };
                match pending {
                    Some(_) if ctx.timed_out => abort(burst.lease, ctx),
                    Some(beat) if !ctx.device.busy => {
                        let address = burst.desc.beat_address(burst.beat);
                        ctx.port.select_write(&burst.lease, address, beat.data);
                        tracing::trace!(
                            beat = burst.beat,
                            address = format_args!("{address:#010X}"),
                            data = format_args!("{:#018X}", beat.data),
                            "device write issued"
                        );
                        State::Wait {
                            burst,
                            elapsed: 0,
                            delay: inputs.write_delay,
                            last: beat.last,
                        }
                    }
                    _ => State::Setup { burst, pending },
                }
            }

            State::Wait {
                mut burst,
                elapsed,
                delay,
                last,
            } => {
                if ctx.timed_out {
                    abort(burst.lease, ctx)
                } else {
                    let elapsed = elapsed.saturating_add(1);
                    if elapsed >= delay && !ctx.device.busy {
                        ctx.port.deselect(&burst.lease);
                        if last || burst.beat >= u32::from(burst.desc.len) {
                            tracing::debug!(beats = burst.beat + 1, "write burst complete");
                            State::Respond {
                                lease: Some(burst.lease),
                                resp: Resp::Okay,
                            }
                        } else {
                            burst.beat += 1;
                            State::Setup {
                                burst,
                                pending: None,
                            }
                        }
                    } else {
                        State::Wait {
                            burst,
                            elapsed,
                            delay,
                            last,
                        }
                    }
                }
            }

            State::Respond { lease, resp } => {
                if b_fire {
                    if let Some(lease) = lease {
                        ctx.port.release(lease);
                    }
                    State::Idle
                } else {
                    State::Respond { lease, resp }
                }
            }
        };
    }

    pub fn reset(&mut self) {
        self.state = State::Idle;
    }
}

/// Timeout exit: fault, drop the access, answer SlaveError.
fn abort(lease: PortLease, ctx: &mut EdgeContext<'_>) -> State {
    ctx.faults.raise(FaultCause::Timeout);
    ctx.port.deselect(&lease);
    State::Respond {
        lease: Some(lease),
        resp: Resp::SlaveError,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fault::FaultRecord;
    use crate::port::{DevicePort, DeviceStatus};

    struct Rig {
        ctl: WriteController,
        port: DevicePort,
        faults: FaultRecord,
    }

    impl Rig {
        fn new() -> Self {
            Self {
                ctl: WriteController::new(),
                port: DevicePort::new(),
                faults: FaultRecord::new(),
            }
        }

        fn step(&mut self, inputs: WriteInputs, busy: bool, timed_out: bool) {
            let mut ctx = EdgeContext {
                device: DeviceStatus { read_data: 0, busy },
                timed_out,
                port: &mut self.port,
                faults: &mut self.faults,
            };
            self.ctl.step(&inputs, &mut ctx);
        }
    }

    fn accept(desc: BurstDescriptor) -> WriteInputs {
        WriteInputs {
            accepted: Some(desc),
            ..WriteInputs::default()
        }
    }

    fn beat(data: u64, last: bool, write_delay: u32) -> WriteInputs {
        WriteInputs {
            w: Some(WriteBeat { data, last }),
            write_delay,
            ..WriteInputs::default()
        }
    }

    fn respond() -> WriteInputs {
        WriteInputs {
            b_ready: true,
            ..WriteInputs::default()
        }
    }

    #[test]
    fn single_beat_waits_out_the_delay() {
        let mut rig = Rig::new();
        let desc = BurstDescriptor::incr(0x100, 3, 0);

        rig.step(accept(desc), false, false);
        assert_eq!(rig.ctl.phase(), WritePhase::Setup);
        assert!(rig.ctl.w_ready());
        assert_eq!(rig.port.owner(), Some(PortOwner::Write));

        rig.step(beat(0xDEAD_BEEF, true, 2), false, false);
        assert_eq!(rig.ctl.phase(), WritePhase::Wait);
        let pins = rig.port.pins();
        assert!(pins.chip_select && pins.write_enable);
        assert_eq!((pins.address, pins.write_data), (0x100, 0xDEAD_BEEF));

        rig.step(WriteInputs::default(), false, false);
        assert_eq!(rig.ctl.phase(), WritePhase::Wait);
        rig.step(WriteInputs::default(), false, false);
        assert_eq!(rig.ctl.b(), Some(Resp::Okay));
        assert!(!rig.port.pins().chip_select);

        rig.step(respond(), false, false);
        assert_eq!(rig.ctl.phase(), WritePhase::Idle);
        assert_eq!(rig.port.owner(), None);
        assert!(!rig.faults.is_active());
    }

    #[test]
    fn beat_addresses_step_by_size() {
        let mut rig = Rig::new();
        rig.step(accept(BurstDescriptor::incr(0x1000, 2, 2)), false, false);
        let mut addresses = Vec::new();
        for i in 0..3u64 {
            rig.step(beat(i, i == 2, 0), false, false);
            addresses.push(rig.port.pins().address);
            // Zero delay: one Wait edge completes the beat.
            rig.step(WriteInputs::default(), false, false);
        }
        assert_eq!(addresses, vec![0x1000, 0x1004, 0x1008]);
        assert_eq!(rig.ctl.b(), Some(Resp::Okay));
    }

    #[test]
    fn beat_counter_ends_burst_without_wlast() {
        let mut rig = Rig::new();
        rig.step(accept(BurstDescriptor::incr(0, 3, 1)), false, false);
        rig.step(beat(1, false, 0), false, false);
        rig.step(WriteInputs::default(), false, false);
        rig.step(beat(2, false, 0), false, false);
        rig.step(WriteInputs::default(), false, false);
        assert_eq!(rig.ctl.b(), Some(Resp::Okay));
    }

    #[test]
    fn busy_device_holds_the_beat() {
        let mut rig = Rig::new();
        rig.step(accept(BurstDescriptor::incr(0x20, 3, 0)), false, false);
        rig.step(beat(7, true, 0), true, false);
        assert_eq!(rig.ctl.phase(), WritePhase::Setup);
        assert!(!rig.ctl.w_ready());
        assert!(rig.ctl.is_waiting());
        assert!(!rig.port.pins().chip_select);

        rig.step(WriteInputs::default(), false, false);
        assert_eq!(rig.ctl.phase(), WritePhase::Wait);
        assert_eq!(rig.port.pins().write_data, 7);
    }

    #[test]
    fn wait_extends_while_device_busy() {
        let mut rig = Rig::new();
        rig.step(accept(BurstDescriptor::incr(0, 3, 0)), false, false);
        rig.step(beat(1, true, 1), false, false);
        rig.step(WriteInputs::default(), true, false);
        rig.step(WriteInputs::default(), true, false);
        assert_eq!(rig.ctl.phase(), WritePhase::Wait);
        rig.step(WriteInputs::default(), false, false);
        assert_eq!(rig.ctl.b(), Some(Resp::Okay));
    }

    #[test]
    fn timeout_in_wait_answers_slave_error() {
        let mut rig = Rig::new();
        rig.step(accept(BurstDescriptor::incr(0, 3, 3)), false, false);
        rig.step(beat(1, false, 5), false, false);
        rig.step(WriteInputs::default(), true, true);
        assert_eq!(rig.ctl.b(), Some(Resp::SlaveError));
        assert_eq!(rig.faults.cause(), Some(FaultCause::Timeout));
        assert!(!rig.port.pins().chip_select);

        rig.step(respond(), true, false);
        assert!(rig.ctl.accepts_address());
        assert_eq!(rig.port.owner(), None);
    }

    #[test]
    fn refused_acquisition_still_responds() {
        let mut rig = Rig::new();
        let _held = rig.port.acquire(PortOwner::Read).expect("free port");
        rig.step(accept(BurstDescriptor::incr(0, 3, 0)), false, false);
        assert_eq!(rig.ctl.b(), Some(Resp::SlaveError));
        rig.step(respond(), false, false);
        assert_eq!(rig.ctl.phase(), WritePhase::Idle);
        assert_eq!(rig.port.owner(), Some(PortOwner::Read));
    }
}
