//! Fixed-latency execution of one instruction over the narrow bus.
//!
//! [`Sequencer::execute`] walks [`SequencerState`] one bus phase at a time.
//! Every instruction takes the same thirteen phases whatever it encodes.

use std::collections::VecDeque;

use crate::assembler::Port;
use crate::bus::{Bus, Dut, Edge, ResetRequest, Signals};
use crate::config::EmptyQueuePolicy;
use crate::encoding::{self, Status, INSTRUCTION_GROUPS, RESULT_WIDTH, WORD_NIBBLES};
use crate::error::{DriverError, Result};

/// Bus phases per instruction.
pub const PHASES_PER_INSTRUCTION: usize = 13;
/// Clock edges per instruction once the bus is in steady state.
pub const EDGES_PER_INSTRUCTION: u64 = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SequencerState {
    /// Transmit 6-bit group `n` of the instruction word.
    SendInstruction(u8),
    /// Transmit the 2-bit tail; decode the status captured after group 4.
    SampleStatus,
    ShiftOperand1Lo,
    ShiftOperand1Hi,
    /// Also samples the PC.
    ShiftOperand2Lo,
    ShiftOperand2Hi,
    /// Read the result low byte.
    CollectResult,
    /// Read the result high nibble and sign-extend.
    LatchResult,
    /// Reset pulse plus queue pops and output pushes.
    ApplySideEffects,
    Idle,
}

impl SequencerState {
    fn edge(self) -> Edge {
        match self {
            SequencerState::SendInstruction(n) if n % 2 == 1 => Edge::Falling,
            SequencerState::SendInstruction(_)
            | SequencerState::ShiftOperand1Lo
            | SequencerState::ShiftOperand2Lo
            | SequencerState::CollectResult
            | SequencerState::LatchResult
            | SequencerState::ApplySideEffects
            | SequencerState::Idle => Edge::Rising,
            SequencerState::SampleStatus
            | SequencerState::ShiftOperand1Hi
            | SequencerState::ShiftOperand2Hi => Edge::Falling,
        }
    }

    fn next(self) -> Self {
        match self {
            SequencerState::SendInstruction(n) if (n as usize) < INSTRUCTION_GROUPS - 1 => {
                SequencerState::SendInstruction(n + 1)
            }
            SequencerState::SendInstruction(_) => SequencerState::SampleStatus,
            SequencerState::SampleStatus => SequencerState::ShiftOperand1Lo,
            SequencerState::ShiftOperand1Lo => SequencerState::ShiftOperand1Hi,
            SequencerState::ShiftOperand1Hi => SequencerState::ShiftOperand2Lo,
            SequencerState::ShiftOperand2Lo => SequencerState::ShiftOperand2Hi,
            SequencerState::ShiftOperand2Hi => SequencerState::CollectResult,
            SequencerState::CollectResult => SequencerState::LatchResult,
            SequencerState::LatchResult => SequencerState::ApplySideEffects,
            SequencerState::ApplySideEffects | SequencerState::Idle => SequencerState::Idle,
        }
    }
}

/// Input and output queues owned by whoever drives the program.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IoQueues {
    pub in1: VecDeque<i16>,
    pub in2: VecDeque<i16>,
    pub out1: Vec<i16>,
    pub out2: Vec<i16>,
    /// Route port 2 writes to the back of `in2` instead of `out2`, giving
    /// programs a scratch queue.
    pub loopback: bool,
}

impl IoQueues {
    pub fn new(in1: impl IntoIterator<Item = i16>, in2: impl IntoIterator<Item = i16>) -> Self {
        Self {
            in1: in1.into_iter().collect(),
            in2: in2.into_iter().collect(),
            ..Self::default()
        }
    }

    /// Port 1 fed from `in1`; port 2 reads back whatever the program writes
    /// to it.
    pub fn looped(in1: impl IntoIterator<Item = i16>) -> Self {
        Self {
            in1: in1.into_iter().collect(),
            loopback: true,
            ..Self::default()
        }
    }

    fn input_mut(&mut self, port: Port) -> &mut VecDeque<i16> {
        match port {
            Port::One => &mut self.in1,
            Port::Two => &mut self.in2,
        }
    }

    /// Value to shift in for `port`: the head left once a signalled
    /// consumption has been accounted for, or 0.
    fn operand(&self, port: Port, consumed: bool) -> i16 {
        let queue = match port {
            Port::One => &self.in1,
            Port::Two => &self.in2,
        };
        queue.get(consumed as usize).copied().unwrap_or(0)
    }
}

/// What one execution observed on the bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Execution {
    pub pc: u8,
    pub status: Status,
    /// Sign-extended result, meaningful when an output valid bit is set.
    pub result: i16,
    pub out1: Option<i16>,
    pub out2: Option<i16>,
    /// Raw values read back during the five instruction groups.
    pub debug: [u8; INSTRUCTION_GROUPS],
}

/// Ephemeral per-instruction state.
#[derive(Debug)]
struct TransferSession {
    nibbles: [u8; WORD_NIBBLES],
    debug: [u8; INSTRUCTION_GROUPS],
    status: Status,
    operands: [[u8; 2]; 2],
    pc: u8,
    low: u8,
    result: i16,
    underflow: Option<Port>,
}

impl TransferSession {
    fn new(word: u32) -> Self {
        Self {
            nibbles: encoding::encode(word),
            debug: [0; INSTRUCTION_GROUPS],
            status: Status::default(),
            operands: [[0; 2]; 2],
            pc: 0,
            low: 0,
            result: 0,
            underflow: None,
        }
    }
}

pub struct Sequencer<D> {
    bus: Bus<D>,
    state: SequencerState,
    random_enabled: bool,
    empty_queue: EmptyQueuePolicy,
}

impl<D: Dut> Sequencer<D> {
    pub fn new(bus: Bus<D>, empty_queue: EmptyQueuePolicy) -> Self {
        Self {
            bus,
            state: SequencerState::Idle,
            random_enabled: false,
            empty_queue,
        }
    }

    /// Full device reset: `rst` high with the full-reset code for `cycles`
    /// clock periods. The random generator comes back disabled.
    pub fn reset(&mut self, cycles: u32) {
        log::info!("reset ({} cycles)", cycles);
        self.random_enabled = false;
        self.bus.pulse_reset(ResetRequest::Full, cycles);
    }

    /// Enable or disable the random generator now and on every later pulse.
    pub fn set_random_enabled(&mut self, enabled: bool) {
        log::info!("random generator {}", if enabled { "enabled" } else { "disabled" });
        self.random_enabled = enabled;
        self.bus.pulse_reset(ResetRequest::for_random(enabled), 1);
    }

    pub fn random_enabled(&self) -> bool {
        self.random_enabled
    }

    pub fn state(&self) -> SequencerState {
        self.state
    }

    pub fn bus(&self) -> &Bus<D> {
        &self.bus
    }

    pub fn bus_mut(&mut self) -> &mut Bus<D> {
        &mut self.bus
    }

    pub fn into_bus(self) -> Bus<D> {
        self.bus
    }

    /// Run every phase of `word` against the device and apply its side
    /// effects to `io`.
    ///
    /// A strict-mode underflow is only reported once every phase has run, and
    /// the error carries the full [`Execution`].
    pub fn execute(&mut self, word: u32, io: &mut IoQueues) -> Result<Execution> {
        let mut session = TransferSession::new(word);
        self.state = SequencerState::SendInstruction(0);
        while self.state != SequencerState::Idle {
            self.advance(&mut session, io);
            self.state = self.state.next();
        }

        let execution = Execution {
            pc: session.pc,
            status: session.status,
            result: session.result,
            out1: session.status.out1_valid.then_some(session.result),
            out2: (session.status.out2_valid && !session.status.out1_valid)
                .then_some(session.result),
            debug: session.debug,
        };
        log::debug!(
            "exec {:#010x}: pc={} status={:04b} result={}",
            word,
            execution.pc,
            execution.status.to_nibble(),
            execution.result
        );
        match session.underflow {
            Some(port) => Err(DriverError::QueueUnderflow { port, execution }),
            None => Ok(execution),
        }
    }

    fn advance(&mut self, session: &mut TransferSession, io: &mut IoQueues) {
        let state = self.state;
        let edge = state.edge();
        log::trace!("{:?}", state);
        match state {
            SequencerState::SendInstruction(n) => {
                let n = n as usize;
                session.debug[n] = self.bus.transfer(Signals::data(session.nibbles[n]), edge);
            }
            SequencerState::SampleStatus => {
                session.status = encoding::decode_status(session.debug[INSTRUCTION_GROUPS - 1]);
                session.operands = [
                    encoding::operand_nibbles(io.operand(Port::One, session.status.consume_in1)),
                    encoding::operand_nibbles(io.operand(Port::Two, session.status.consume_in2)),
                ];
                self.bus
                    .transfer(Signals::data(session.nibbles[INSTRUCTION_GROUPS]), edge);
            }
            SequencerState::ShiftOperand1Lo => {
                self.bus.transfer(Signals::data(session.operands[0][0]), edge);
            }
            SequencerState::ShiftOperand1Hi => {
                self.bus.transfer(Signals::data(session.operands[0][1]), edge);
            }
            SequencerState::ShiftOperand2Lo => {
                session.pc = self.bus.transfer(Signals::data(session.operands[1][0]), edge);
            }
            SequencerState::ShiftOperand2Hi => {
                self.bus.transfer(Signals::data(session.operands[1][1]), edge);
            }
            SequencerState::CollectResult => {
                session.low = self.bus.transfer(Signals::idle(), edge);
            }
            SequencerState::LatchResult => {
                let high = self.bus.cycles(Signals::idle(), 1);
                let raw = encoding::assemble_result(session.low, high);
                session.result = encoding::sign_extend(raw as u32, RESULT_WIDTH) as i16;
            }
            SequencerState::ApplySideEffects => {
                self.bus
                    .pulse_reset(ResetRequest::for_random(self.random_enabled), 1);
                self.apply_side_effects(session, io);
            }
            SequencerState::Idle => {}
        }
    }

    fn apply_side_effects(&self, session: &mut TransferSession, io: &mut IoQueues) {
        let status = session.status;
        for (port, consumed) in [(Port::One, status.consume_in1), (Port::Two, status.consume_in2)] {
            if !consumed {
                continue;
            }
            if io.input_mut(port).pop_front().is_none() {
                match self.empty_queue {
                    EmptyQueuePolicy::Tolerant => {
                        log::warn!("input {} consumed while empty", port);
                    }
                    EmptyQueuePolicy::Strict => {
                        session.underflow.get_or_insert(port);
                    }
                }
            }
        }
        if status.out1_valid {
            io.out1.push(session.result);
        } else if status.out2_valid {
            if io.loopback {
                io.in2.push_back(session.result);
            } else {
                io.out2.push(session.result);
            }
        }
    }
}
