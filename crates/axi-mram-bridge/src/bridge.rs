//! Top level: both controllers, the shared port, watchdog and fault record
//! advanced together on one edge.

use sim_core::{Clocked, Observable, Value};

use crate::arbiter::Arbiter;
use crate::axi::{AxiInputs, AxiOutputs};
use crate::config::BridgeConfig;
use crate::fault::FaultRecord;
use crate::port::{DevicePins, DevicePort, DeviceStatus, PortOwner};
use crate::read::{ReadController, ReadInputs, ReadPhase};
use crate::timeout::TimeoutMonitor;
use crate::write::{WriteController, WriteInputs, WritePhase};

/// Shared resources handed to each controller for one edge.
pub struct EdgeContext<'a> {
    pub device: DeviceStatus,
    pub timed_out: bool,
    pub port: &'a mut DevicePort,
    pub faults: &'a mut FaultRecord,
}

/// Everything sampled on one edge.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BridgeInputs {
    pub axi: AxiInputs,
    pub device: DeviceStatus,
    /// Inter-beat write delay, re-read for every beat.
    pub write_delay: u32,
}

/// Everything driven for the next cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BridgeOutputs {
    pub axi: AxiOutputs,
    pub pins: DevicePins,
    pub fault: FaultRecord,
}

pub struct Bridge {
    write: WriteController,
    read: ReadController,
    monitor: TimeoutMonitor,
    port: DevicePort,
    faults: FaultRecord,
    arbiter: Arbiter,
    aw_ready: bool,
    ar_ready: bool,
    cycle: u64,
}

impl Bridge {
    #[must_use]
    pub fn new(config: BridgeConfig) -> Self {
        let mut bridge = Self {
            write: WriteController::new(),
            read: ReadController::new(config.read_latency),
            monitor: TimeoutMonitor::new(config.timeout_budget),
            port: DevicePort::new(),
            faults: FaultRecord::new(),
            arbiter: Arbiter::new(),
            aw_ready: false,
            ar_ready: false,
            cycle: 0,
        };
        bridge.offer_address(false, false);
        bridge
    }

    /// Levels currently driven, i.e. the outputs of the last edge.
    #[must_use]
    pub fn outputs(&self) -> BridgeOutputs {
        BridgeOutputs {
            axi: AxiOutputs {
                aw_ready: self.aw_ready,
                w_ready: self.write.w_ready(),
                b: self.write.b(),
                ar_ready: self.ar_ready,
                r: self.read.r(),
            },
            pins: self.port.pins(),
            fault: self.faults,
        }
    }

    #[must_use]
    pub fn fault(&self) -> FaultRecord {
        self.faults
    }

    #[must_use]
    pub fn write_phase(&self) -> WritePhase {
        self.write.phase()
    }

    #[must_use]
    pub fn read_phase(&self) -> ReadPhase {
        self.read.phase()
    }

    #[must_use]
    pub fn port_owner(&self) -> Option<PortOwner> {
        self.port.owner()
    }

    #[must_use]
    pub fn timeout_count(&self) -> u32 {
        self.monitor.count()
    }

    #[must_use]
    pub fn cycle(&self) -> u64 {
        self.cycle
    }

    /// Both controllers idle, nothing left to drain.
    #[must_use]
    pub fn is_quiescent(&self) -> bool {
        self.write.accepts_address() && self.read.accepts_address()
    }

    fn edge(&mut self, inputs: &BridgeInputs) -> BridgeOutputs {
        self.cycle += 1;

        let waiting = self.write.is_waiting() || self.read.is_waiting();
        self.monitor.update(waiting, inputs.device.busy);

        let aw = inputs.axi.aw.filter(|_| self.aw_ready);
        let ar = inputs.axi.ar.filter(|_| self.ar_ready);
        if aw.is_some() {
            self.arbiter.granted(PortOwner::Write);
        }
        if ar.is_some() {
            self.arbiter.granted(PortOwner::Read);
        }

        let mut ctx = EdgeContext {
            device: inputs.device,
            timed_out: self.monitor.timed_out(),
            port: &mut self.port,
            faults: &mut self.faults,
        };
        // Write first: on a same-edge double fault the read cause is kept.
        self.write.step(
            &WriteInputs {
                accepted: aw,
                w: inputs.axi.w,
                b_ready: inputs.axi.b_ready,
                write_delay: inputs.write_delay,
            },
            &mut ctx,
        );
        self.read.step(
            &ReadInputs {
                accepted: ar,
                r_ready: inputs.axi.r_ready,
            },
            &mut ctx,
        );

        self.offer_address(
            inputs.axi.aw.is_some() && aw.is_none(),
            inputs.axi.ar.is_some() && ar.is_none(),
        );
        self.outputs()
    }

    /// Drive AWREADY/ARREADY for the next cycle. A channel is closed while
    /// the other one holds the device port.
    fn offer_address(&mut self, write_request: bool, read_request: bool) {
        let owner = self.port.owner();
        let write_open = self.write.accepts_address() && owner != Some(PortOwner::Read);
        let read_open = self.read.accepts_address() && owner != Some(PortOwner::Write);
        let offer = self.arbiter.offer(write_open, read_open, write_request, read_request);
        self.aw_ready = offer == Some(PortOwner::Write);
        self.ar_ready = offer == Some(PortOwner::Read);
    }
}

impl Clocked for Bridge {
    type Inputs = BridgeInputs;
    type Outputs = BridgeOutputs;

    fn step(&mut self, inputs: &BridgeInputs) -> BridgeOutputs {
        self.edge(inputs)
    }

    fn reset(&mut self) {
        tracing::debug!(cycle = self.cycle, "bridge reset");
        self.write.reset();
        self.read.reset();
        self.monitor.reset();
        self.port.reset();
        self.faults.clear();
        self.arbiter.reset();
        self.cycle = 0;
        self.offer_address(false, false);
    }
}

impl Observable for Bridge {
    fn query(&self, path: &str) -> Option<Value> {
        let pins = self.port.pins();
        let value = match path {
            "cycle" => self.cycle.into(),
            "aw_ready" => self.aw_ready.into(),
            "ar_ready" => self.ar_ready.into(),
            "write.phase" => self.write.phase().name().into(),
            "write.beat" => self.write.beat().map_or(Value::from("-"), Value::from),
            "read.phase" => self.read.phase().name().into(),
            "read.fetched" => self.read.fetched().map_or(Value::from("-"), Value::from),
            "read.delivered" => self.read.delivered().map_or(Value::from("-"), Value::from),
            "fifo.len" => (self.read.fifo().len() as u32).into(),
            "fifo.write_cursor" => (self.read.fifo().write_cursor() as u32).into(),
            "fifo.read_cursor" => (self.read.fifo().read_cursor() as u32).into(),
            "timeout.count" => self.monitor.count().into(),
            "timeout.budget" => self.monitor.budget().into(),
            "fault.active" => self.faults.is_active().into(),
            "fault.code" => self.faults.code().into(),
            "fault.raised" => self.faults.raised().into(),
            "port.owner" => self.port.owner().map_or("none", PortOwner::name).into(),
            "port.power" => pins.power_enable.into(),
            "port.chip_select" => pins.chip_select.into(),
            "port.write_enable" => pins.write_enable.into(),
            "port.address" => pins.address.into(),
            "port.write_data" => pins.write_data.into(),
            _ => return None,
        };
        Some(value)
    }

    fn query_paths(&self) -> &'static [&'static str] {
        &[
            "cycle",
            "aw_ready",
            "ar_ready",
            "write.phase",
            "write.beat",
            "read.phase",
            "read.fetched",
            "read.delivered",
            "fifo.len",
            "fifo.write_cursor",
            "fifo.read_cursor",
            "timeout.count",
            "timeout.budget",
            "fault.active",
            "fault.code",
            "fault.raised",
            "port.owner",
            "port.power",
            "port.chip_select",
            "port.write_enable",
            "port.address",
            "port.write_data",
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::axi::{BurstDescriptor, Resp, WriteBeat};
    use crate::fault::FaultCause;

    fn config(budget: u32) -> BridgeConfig {
        BridgeConfig {
            timeout_budget: budget,
            read_latency: 0,
            default_write_delay: 0,
        }
    }

    fn idle_inputs(busy: bool) -> BridgeInputs {
        BridgeInputs {
            axi: AxiInputs {
                b_ready: true,
                r_ready: true,
                ..AxiInputs::default()
            },
            device: DeviceStatus { read_data: 0, busy },
            write_delay: 0,
        }
    }

    #[test]
    fn power_up_offers_one_address_channel() {
        let bridge = Bridge::new(BridgeConfig::default());
        let out = bridge.outputs().axi;
        assert!(out.aw_ready);
        assert!(!out.ar_ready);
        assert!(bridge.is_quiescent());
    }

    #[test]
    fn lone_read_request_moves_the_offer() {
        let mut bridge = Bridge::new(config(8));
        let mut inputs = idle_inputs(false);
        inputs.axi.ar = Some(BurstDescriptor::incr(0, 3, 0));
        let out = bridge.step(&inputs);
        assert!(out.axi.ar_ready && !out.axi.aw_ready);
        bridge.step(&inputs);
        assert_eq!(bridge.read_phase(), ReadPhase::Wait);
        assert_eq!(bridge.port_owner(), Some(PortOwner::Read));
    }

    #[test]
    fn write_owner_closes_the_read_channel() {
        let mut bridge = Bridge::new(config(8));
        let mut inputs = idle_inputs(false);
        inputs.axi.aw = Some(BurstDescriptor::incr(0, 3, 1));
        inputs.axi.ar = Some(BurstDescriptor::incr(0x100, 3, 0));
        let out = bridge.step(&inputs);
        assert_eq!(bridge.write_phase(), WritePhase::Setup);
        assert!(!out.axi.aw_ready && !out.axi.ar_ready);
        for _ in 0..5 {
            let out = bridge.step(&inputs);
            assert!(!out.axi.ar_ready);
            assert_eq!(bridge.read_phase(), ReadPhase::Idle);
        }
    }

    #[test]
    fn stuck_device_times_out_after_budget_cycles_in_wait() {
        let budget = 5;
        let mut bridge = Bridge::new(config(budget));
        let mut inputs = idle_inputs(false);
        inputs.axi.aw = Some(BurstDescriptor::incr(0x100, 3, 0));
        bridge.step(&inputs);
        inputs.axi.aw = None;
        inputs.axi.w = Some(WriteBeat {
            data: 1,
            last: true,
        });
        inputs.write_delay = 100;
        bridge.step(&inputs);
        assert_eq!(bridge.write_phase(), WritePhase::Wait);

        inputs.axi.w = None;
        inputs.axi.b_ready = false;
        inputs.device.busy = true;
        let mut busy_edges = 0;
        while bridge.write_phase() == WritePhase::Wait {
            bridge.step(&inputs);
            busy_edges += 1;
            assert!(busy_edges <= budget, "no timeout within the budget");
        }
        assert_eq!(busy_edges, budget);
        let out = bridge.outputs();
        assert_eq!(out.axi.b, Some(Resp::SlaveError));
        assert_eq!(out.fault.cause(), Some(FaultCause::Timeout));
        assert_eq!(out.fault.code(), 4);
        assert!(!out.pins.chip_select);
    }

    #[test]
    fn timeout_count_only_runs_while_waiting_on_busy() {
        let mut bridge = Bridge::new(config(8));
        bridge.step(&idle_inputs(true));
        bridge.step(&idle_inputs(true));
        assert_eq!(bridge.timeout_count(), 0);
    }

    #[test]
    fn reset_returns_everything_to_power_up() {
        let mut bridge = Bridge::new(config(2));
        let mut inputs = idle_inputs(true);
        inputs.axi.ar = Some(BurstDescriptor::incr(0, 3, 3));
        for _ in 0..6 {
            bridge.step(&inputs);
        }
        assert!(bridge.fault().is_active());

        bridge.reset();
        let fresh = Bridge::new(config(2));
        assert_eq!(bridge.outputs(), fresh.outputs());
        assert_eq!(bridge.snapshot(), fresh.snapshot());
    }

    #[test]
    fn queries_cover_every_listed_path() {
        let bridge = Bridge::new(BridgeConfig::default());
        for path in bridge.query_paths() {
            assert!(bridge.query(path).is_some(), "unanswered path {path}");
        }
        assert_eq!(bridge.query("write.phase"), Some(Value::from("idle")));
        assert_eq!(bridge.query("fault.code"), Some(Value::U8(0)));
        assert_eq!(bridge.query("nope"), None);
    }
}
