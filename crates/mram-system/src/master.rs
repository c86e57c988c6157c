//! Scripted AXI master.
//!
//! Two engines, one per direction, each working through its share of the
//! submitted transactions. Both honour the valid/ready rules: a valid is
//! held with stable payload until the handshake edge.

use std::collections::VecDeque;

use axi_mram_bridge::{AxiInputs, AxiOutputs, BurstDescriptor, BurstMode, ReadBeat, Resp, WriteBeat};
use serde::{Deserialize, Serialize};

use crate::SystemError;

fn default_size() -> u8 {
    3
}

/// One bus transaction as a test or scenario describes it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "lowercase")]
pub enum Transaction {
    Write {
        address: u32,
        #[serde(default = "default_size")]
        size: u8,
        #[serde(default)]
        mode: BurstMode,
        data: Vec<u64>,
    },
    Read {
        address: u32,
        #[serde(default = "default_size")]
        size: u8,
        #[serde(default)]
        mode: BurstMode,
        /// Beats minus one.
        len: u16,
    },
}

impl Transaction {
    #[must_use]
    pub fn write(address: u32, size: u8, data: Vec<u64>) -> Self {
        Self::Write {
            address,
            size,
            mode: BurstMode::Incr,
            data,
        }
    }

    #[must_use]
    pub fn read(address: u32, size: u8, len: u16) -> Self {
        Self::Read {
            address,
            size,
            mode: BurstMode::Incr,
            len,
        }
    }

    #[must_use]
    pub fn is_write(&self) -> bool {
        matches!(self, Self::Write { .. })
    }

    /// Address-channel payload for this transaction.
    pub fn descriptor(&self) -> Result<BurstDescriptor, SystemError> {
        match self {
            Self::Write {
                address,
                size,
                mode,
                data,
            } => {
                let beats = data.len();
                if beats == 0 {
                    return Err(SystemError::EmptyWrite);
                }
                let len = u16::try_from(beats - 1)
                    .map_err(|_| SystemError::WriteTooLong { beats })?;
                Ok(BurstDescriptor::incr(*address, *size, len).with_mode(*mode))
            }
            Self::Read {
                address,
                size,
                mode,
                len,
            } => Ok(BurstDescriptor::incr(*address, *size, *len).with_mode(*mode)),
        }
    }
}

/// What the bus reported back.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    Write { resp: Resp },
    Read { beats: Vec<ReadBeat> },
}

impl Outcome {
    /// Whether any part of the transaction came back SlaveError.
    #[must_use]
    pub fn is_error(&self) -> bool {
        match self {
            Outcome::Write { resp } => resp.is_error(),
            Outcome::Read { beats } => beats.iter().any(|b| b.resp.is_error()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Completion {
    pub id: usize,
    pub transaction: Transaction,
    pub outcome: Outcome,
    /// Cycle the address was first presented.
    pub issued_at: u64,
    /// Cycle the final response handshake completed.
    pub completed_at: u64,
}

/// How submitted transactions are dispatched to the engines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dispatch {
    /// One transaction in flight at a time, in submission order.
    #[default]
    Serial,
    /// Write and read engines run independently, each in submission order.
    Concurrent,
}

#[derive(Debug)]
struct Job {
    id: usize,
    transaction: Transaction,
    desc: BurstDescriptor,
    issued_at: u64,
    address_sent: bool,
}

#[derive(Debug)]
struct WriteJob {
    job: Job,
    data: Vec<u64>,
    next_beat: usize,
}

#[derive(Debug)]
struct ReadJob {
    job: Job,
    beats: Vec<ReadBeat>,
}

#[derive(Debug)]
pub struct BusMaster {
    dispatch: Dispatch,
    /// RREADY is high one cycle in this many.
    r_ready_period: u32,
    pending: VecDeque<(usize, Transaction, BurstDescriptor)>,
    next_id: usize,
    write: Option<WriteJob>,
    read: Option<ReadJob>,
}

impl BusMaster {
    #[must_use]
    pub fn new(dispatch: Dispatch, r_ready_period: u32) -> Self {
        Self {
            dispatch,
            r_ready_period: r_ready_period.max(1),
            pending: VecDeque::new(),
            next_id: 0,
            write: None,
            read: None,
        }
    }

    /// Queue a transaction, returning its id.
    pub fn submit(&mut self, transaction: Transaction) -> Result<usize, SystemError> {
        let desc = transaction.descriptor()?;
        let id = self.next_id;
        self.next_id += 1;
        self.pending.push_back((id, transaction, desc));
        Ok(id)
    }

    /// Nothing queued and nothing in flight.
    #[must_use]
    pub fn is_idle(&self) -> bool {
        self.pending.is_empty() && self.write.is_none() && self.read.is_none()
    }

    #[must_use]
    pub fn outstanding(&self) -> usize {
        self.pending.len() + usize::from(self.write.is_some()) + usize::from(self.read.is_some())
    }

    /// Levels to drive during `cycle`.
    pub fn drive(&mut self, cycle: u64) -> AxiInputs {
        self.dispatch_jobs(cycle);

        let mut inputs = AxiInputs {
            b_ready: true,
            r_ready: cycle % u64::from(self.r_ready_period) == 0,
            ..AxiInputs::default()
        };
        if let Some(w) = &self.write {
            if !w.job.address_sent {
                inputs.aw = Some(w.job.desc);
            }
            if let Some(&data) = w.data.get(w.next_beat) {
                inputs.w = Some(WriteBeat {
                    data,
                    last: w.next_beat + 1 == w.data.len(),
                });
            }
        }
        if let Some(r) = &self.read {
            if !r.job.address_sent {
                inputs.ar = Some(r.job.desc);
            }
        }
        inputs
    }

    /// Resolve the handshakes of `cycle`: `driven` is what the bridge drove
    /// during it, `inputs` what this master drove.
    pub fn observe(
        &mut self,
        driven: &AxiOutputs,
        inputs: &AxiInputs,
        cycle: u64,
    ) -> Vec<Completion> {
        let mut done = Vec::new();

        if let Some(w) = &mut self.write {
            if inputs.aw.is_some() && driven.aw_ready {
                w.job.address_sent = true;
            }
            if inputs.w.is_some() && driven.w_ready {
                w.next_beat += 1;
            }
        }
        if let (Some(resp), true) = (driven.b, inputs.b_ready) {
            if let Some(w) = self.write.take() {
                done.push(finish(w.job, Outcome::Write { resp }, cycle));
            }
        }

        if let Some(r) = &mut self.read {
            if inputs.ar.is_some() && driven.ar_ready {
                r.job.address_sent = true;
            }
            if let (Some(beat), true) = (driven.r, inputs.r_ready) {
                r.beats.push(beat);
            }
        }
        if self.read.as_ref().is_some_and(|r| r.beats.last().is_some_and(|b| b.last)) {
            if let Some(r) = self.read.take() {
                done.push(finish(r.job, Outcome::Read { beats: r.beats }, cycle));
            }
        }
        done
    }

    /// Drop everything queued and in flight and restart id numbering.
    pub fn reset(&mut self) {
        self.pending.clear();
        self.next_id = 0;
        self.write = None;
        self.read = None;
    }

    fn dispatch_jobs(&mut self, cycle: u64) {
        match self.dispatch {
            Dispatch::Serial => {
                if self.write.is_none() && self.read.is_none() {
                    if let Some(entry) = self.pending.pop_front() {
                        self.start(entry, cycle);
                    }
                }
            }
            Dispatch::Concurrent => {
                for want_write in [true, false] {
                    let engine_free = if want_write {
                        self.write.is_none()
                    } else {
                        self.read.is_none()
                    };
                    if !engine_free {
                        continue;
                    }
                    let position = self
                        .pending
                        .iter()
                        .position(|(_, t, _)| t.is_write() == want_write);
                    if let Some(entry) = position.and_then(|i| self.pending.remove(i)) {
                        self.start(entry, cycle);
                    }
                }
            }
        }
    }

    fn start(
        &mut self,
        (id, transaction, desc): (usize, Transaction, BurstDescriptor),
        cycle: u64,
    ) {
        let data = match &transaction {
            Transaction::Write { data, .. } => Some(data.clone()),
            Transaction::Read { .. } => None,
        };
        let job = Job {
            id,
            transaction,
            desc,
            issued_at: cycle,
            address_sent: false,
        };
        match data {
            Some(data) => {
                self.write = Some(WriteJob {
                    job,
                    data,
                    next_beat: 0,
                });
            }
            None => {
                self.read = Some(ReadJob {
                    job,
                    beats: Vec::new(),
                });
            }
        }
    }
}

fn finish(job: Job, outcome: Outcome, cycle: u64) -> Completion {
    Completion {
        id: job.id,
        transaction: job.transaction,
        outcome,
        issued_at: job.issued_at,
        completed_at: cycle,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_write_is_refused() {
        let mut master = BusMaster::new(Dispatch::Serial, 1);
        let err = master.submit(Transaction::write(0, 3, Vec::new())).expect_err("no beats");
        assert!(matches!(err, SystemError::EmptyWrite));
        assert!(master.is_idle());
    }

    #[test]
    fn write_length_comes_from_the_data() {
        let desc = Transaction::write(0x100, 3, vec![1, 2, 3]).descriptor().expect("valid");
        assert_eq!(desc.len, 2);
        assert_eq!(desc.address, 0x100);
    }

    #[test]
    fn valid_holds_until_ready() {
        let mut master = BusMaster::new(Dispatch::Serial, 1);
        master.submit(Transaction::write(0x40, 3, vec![7])).expect("valid");
        let first = master.drive(1);
        assert!(first.aw.is_some());
        assert_eq!(first.w, Some(WriteBeat { data: 7, last: true }));

        master.observe(&AxiOutputs::default(), &first, 1);
        assert_eq!(master.drive(2), first);

        let ready = AxiOutputs {
            aw_ready: true,
            ..AxiOutputs::default()
        };
        master.observe(&ready, &first, 2);
        let third = master.drive(3);
        assert!(third.aw.is_none());
        assert!(third.w.is_some());
    }

    #[test]
    fn serial_dispatch_waits_for_completion() {
        let mut master = BusMaster::new(Dispatch::Serial, 1);
        master.submit(Transaction::write(0, 3, vec![1])).expect("valid");
        master.submit(Transaction::read(0, 3, 0)).expect("valid");
        let inputs = master.drive(1);
        assert!(inputs.aw.is_some());
        assert!(inputs.ar.is_none());

        let response = AxiOutputs {
            b: Some(Resp::Okay),
            ..AxiOutputs::default()
        };
        let done = master.observe(&response, &inputs, 1);
        assert_eq!(done.len(), 1);
        assert_eq!(done[0].outcome, Outcome::Write { resp: Resp::Okay });
        assert!(master.drive(2).ar.is_some());
    }

    #[test]
    fn concurrent_dispatch_drives_both_channels() {
        let mut master = BusMaster::new(Dispatch::Concurrent, 1);
        master.submit(Transaction::read(0x80, 3, 1)).expect("valid");
        master.submit(Transaction::write(0, 3, vec![1])).expect("valid");
        let inputs = master.drive(1);
        assert!(inputs.aw.is_some());
        assert!(inputs.ar.is_some());
        assert_eq!(master.outstanding(), 2);
    }

    #[test]
    fn read_completes_on_last_beat() {
        let mut master = BusMaster::new(Dispatch::Serial, 1);
        master.submit(Transaction::read(0, 3, 1)).expect("valid");
        let inputs = master.drive(1);
        let beat = |data, last| AxiOutputs {
            r: Some(ReadBeat {
                data,
                resp: Resp::Okay,
                last,
            }),
            ..AxiOutputs::default()
        };
        assert!(master.observe(&beat(1, false), &inputs, 1).is_empty());
        let done = master.observe(&beat(2, true), &inputs, 2);
        assert_eq!(done.len(), 1);
        match &done[0].outcome {
            Outcome::Read { beats } => {
                let data: Vec<u64> = beats.iter().map(|b| b.data).collect();
                assert_eq!(data, vec![1, 2]);
            }
            other => panic!("unexpected {other:?}"),
        }
        assert!(master.is_idle());
    }

    #[test]
    fn backpressure_period_gates_rready() {
        let mut master = BusMaster::new(Dispatch::Serial, 3);
        let ready: Vec<bool> = (1..=6).map(|c| master.drive(c).r_ready).collect();
        assert_eq!(ready, vec![false, false, true, false, false, true]);
    }

    #[test]
    fn scenario_syntax_round_trips() {
        let text = r#"{ "op": "read", "address": 512, "len": 3 }"#;
        let t: Transaction = serde_json::from_str(text).expect("valid transaction");
        assert_eq!(t, Transaction::read(0x200, 3, 3));
    }
}
