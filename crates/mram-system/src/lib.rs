//! Bridge, MRAM and a scripted AXI master on one clock.
//!
//! Each [`System::tick`] is one cycle. The master drives its channels, the
//! bridge takes its edge over those levels plus the device status, the
//! master resolves its handshakes against what the bridge drove during the
//! cycle, and finally the device takes its edge over the new pin levels.

pub mod master;
pub mod scenario;

use axi_mram_bridge::{Bridge, BridgeConfig, BridgeInputs, BridgeOutputs, DeviceStatus};
use mram_device::{Mram, MramConfig};
use sim_core::{Clocked, Observable, Value};
use thiserror::Error;

pub use master::{BusMaster, Completion, Dispatch, Outcome, Transaction};
pub use scenario::{Preload, Scenario, ScenarioError};

#[derive(Debug, Error)]
pub enum SystemError {
    #[error("write transaction has no data beats")]
    EmptyWrite,
    #[error("write transaction of {beats} beats exceeds the AXI length field")]
    WriteTooLong { beats: usize },
    #[error("{outstanding} transaction(s) still outstanding after {ticks} ticks")]
    Stalled { ticks: u64, outstanding: usize },
}

pub struct System {
    bridge: Bridge,
    device: Mram,
    master: BusMaster,
    /// Device levels the bridge samples on its next edge.
    status: DeviceStatus,
    /// Bridge levels driven during the current cycle.
    outputs: BridgeOutputs,
    write_delay: u32,
    cycle: u64,
    completions: Vec<Completion>,
}

impl System {
    #[must_use]
    pub fn new(bridge: BridgeConfig, device: MramConfig) -> Self {
        Self::with_master(bridge, device, BusMaster::new(Dispatch::Serial, 1))
    }

    #[must_use]
    pub fn with_master(config: BridgeConfig, device: MramConfig, master: BusMaster) -> Self {
        let bridge = Bridge::new(config);
        let outputs = bridge.outputs();
        Self {
            write_delay: config.default_write_delay,
            bridge,
            device: Mram::new(device),
            master,
            status: DeviceStatus::default(),
            outputs,
            cycle: 0,
            completions: Vec::new(),
        }
    }

    /// Build a system with the scenario's device, master and script loaded.
    pub fn from_scenario(config: BridgeConfig, scenario: &Scenario) -> Result<Self, SystemError> {
        let master = BusMaster::new(scenario.dispatch, scenario.r_ready_period);
        let mut system = Self::with_master(config, scenario.device, master);
        if let Some(delay) = scenario.write_delay {
            system.set_write_delay(delay);
        }
        for preload in &scenario.preload {
            system.device.poke(preload.address, preload.value);
        }
        system.device.set_stuck(scenario.stuck);
        system.device.stall_after(scenario.stall_after);
        for transaction in &scenario.transactions {
            system.submit(transaction.clone())?;
        }
        Ok(system)
    }

    #[must_use]
    pub fn bridge(&self) -> &Bridge {
        &self.bridge
    }

    #[must_use]
    pub fn device(&self) -> &Mram {
        &self.device
    }

    pub fn device_mut(&mut self) -> &mut Mram {
        &mut self.device
    }

    #[must_use]
    pub fn master(&self) -> &BusMaster {
        &self.master
    }

    #[must_use]
    pub fn cycle(&self) -> u64 {
        self.cycle
    }

    /// Bridge levels driven during the current cycle.
    #[must_use]
    pub fn outputs(&self) -> BridgeOutputs {
        self.outputs
    }

    #[must_use]
    pub fn write_delay(&self) -> u32 {
        self.write_delay
    }

    /// Takes effect from the next beat the bridge issues.
    pub fn set_write_delay(&mut self, delay: u32) {
        self.write_delay = delay;
    }

    pub fn submit(&mut self, transaction: Transaction) -> Result<usize, SystemError> {
        self.master.submit(transaction)
    }

    #[must_use]
    pub fn completions(&self) -> &[Completion] {
        &self.completions
    }

    /// Nothing queued, nothing in flight, bridge back in idle.
    #[must_use]
    pub fn is_idle(&self) -> bool {
        self.master.is_idle() && self.bridge.is_quiescent()
    }

    /// Advance one cycle. Returns how many transactions completed on it.
    pub fn tick(&mut self) -> usize {
        self.cycle += 1;
        let axi = self.master.drive(self.cycle);
        let driven = self.outputs.axi;

        let outputs = self.bridge.step(&BridgeInputs {
            axi,
            device: self.status,
            write_delay: self.write_delay,
        });
        let done = self.master.observe(&driven, &axi, self.cycle);
        self.status = self.device.step(&outputs.pins);
        self.outputs = outputs;

        for completion in &done {
            tracing::debug!(
                id = completion.id,
                cycle = self.cycle,
                latency = completion.completed_at - completion.issued_at,
                error = completion.outcome.is_error(),
                "transaction complete"
            );
        }
        let count = done.len();
        self.completions.extend(done);
        count
    }

    /// Tick until every submitted transaction has completed. Returns every
    /// completion recorded since the last reset.
    pub fn run(&mut self, max_ticks: u64) -> Result<Vec<Completion>, SystemError> {
        let start = self.cycle;
        while !self.is_idle() {
            if self.cycle - start >= max_ticks {
                return Err(SystemError::Stalled {
                    ticks: max_ticks,
                    outstanding: self.master.outstanding(),
                });
            }
            self.tick();
        }
        Ok(self.completions.clone())
    }

    /// Power-on reset of bridge and device. The script and completions are
    /// discarded; stored words survive.
    pub fn reset(&mut self) {
        tracing::info!(cycle = self.cycle, "system reset");
        self.bridge.reset();
        self.device.reset();
        self.master.reset();
        self.status = self.device.status();
        self.outputs = self.bridge.outputs();
        self.cycle = 0;
        self.completions.clear();
    }
}

impl Observable for System {
    fn query(&self, path: &str) -> Option<Value> {
        if let Some(rest) = path.strip_prefix("bridge.") {
            return self.bridge.query(rest);
        }
        if let Some(rest) = path.strip_prefix("device.") {
            return self.device.query(rest);
        }
        let value = match path {
            "cycle" => self.cycle.into(),
            "write_delay" => self.write_delay.into(),
            "outstanding" => (self.master.outstanding() as u32).into(),
            "completed" => (self.completions.len() as u32).into(),
            _ => return None,
        };
        Some(value)
    }

    fn query_paths(&self) -> &'static [&'static str] {
        &[
            "cycle",
            "write_delay",
            "outstanding",
            "completed",
            "bridge.cycle",
            "bridge.aw_ready",
            "bridge.ar_ready",
            "bridge.write.phase",
            "bridge.write.beat",
            "bridge.read.phase",
            "bridge.read.fetched",
            "bridge.read.delivered",
            "bridge.fifo.len",
            "bridge.fifo.write_cursor",
            "bridge.fifo.read_cursor",
            "bridge.timeout.count",
            "bridge.timeout.budget",
            "bridge.fault.active",
            "bridge.fault.code",
            "bridge.fault.raised",
            "bridge.port.owner",
            "bridge.port.power",
            "bridge.port.chip_select",
            "bridge.port.write_enable",
            "bridge.port.address",
            "bridge.port.write_data",
            "device.cycle",
            "device.busy",
            "device.stuck",
            "device.read_data",
            "device.accesses",
            "device.reads",
            "device.writes",
            "device.words",
        ]
    }
}
