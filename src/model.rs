//! Behavioural stand-in for the HoVa silicon, driven through its pins.
//!
//! Edge-indexed protocol, counted from the first rising edge after a reset
//! (or after the previous instruction's last edge):
//!
//! | edge | input            | output after edge   |
//! |------|------------------|---------------------|
//! | 0..4 | instruction bits | debug; 4 is status  |
//! | 5    | 2-bit tail       | -                   |
//! | 6, 7 | in1 low, high    | -                   |
//! | 8, 9 | in2 low, high    | PC after 8          |
//! | 10   | -                | result low byte     |
//! | 12   | -                | result high nibble  |
//!
//! Edges with `rst` high apply the reset code on `data_in` and realign the
//! transfer to the next rising edge.

use crate::assembler::InstructionWord;
use crate::bus::{Dut, Pins, RESET_ADDRESS, RESET_FULL, RESET_RANDOM_ENABLE};
use crate::config::ModelConfig;
use crate::encoding::{self, Status, INSTRUCTION_GROUPS, NIBBLE_BITS, NIBBLE_MASK, TAIL_MASK};
use crate::semantics::{Machine, Step};

const TAIL_EDGE: u8 = 5;
const IN1_LO_EDGE: u8 = 6;
const IN1_HI_EDGE: u8 = 7;
const IN2_LO_EDGE: u8 = 8;
const IN2_HI_EDGE: u8 = 9;
const RESULT_LO_EDGE: u8 = 10;
const RESULT_HI_EDGE: u8 = 12;
/// Edges in one transfer before the device waits for the next rising edge.
pub const TRANSFER_EDGES: u8 = 13;

pub struct HovaModel {
    machine: Machine,
    clk: bool,
    /// Edge index within the current transfer; `None` until the next rising edge.
    edge: Option<u8>,
    shift: u32,
    operands: [u8; 4],
    step: Option<Step>,
    data_out: u8,
    instructions: u64,
}

impl HovaModel {
    pub fn new(config: &ModelConfig) -> Self {
        Self {
            machine: Machine::new(config.rng_seed, config.flag_timing),
            clk: false,
            edge: None,
            shift: 0,
            operands: [0; 4],
            step: None,
            data_out: 0,
            instructions: 0,
        }
    }

    pub fn machine(&self) -> &Machine {
        &self.machine
    }

    /// Instructions executed since construction.
    pub fn instructions(&self) -> u64 {
        self.instructions
    }

    fn reset(&mut self, code: u8) {
        if code & RESET_FULL != 0 {
            log::debug!("model: full reset");
            self.machine.reset();
        } else {
            if code & RESET_ADDRESS == 0 {
                log::warn!("model: reset code {:#x} without address bit", code);
            }
            self.machine
                .set_random_enabled(code & RESET_RANDOM_ENABLE != 0);
        }
        self.edge = None;
        self.shift = 0;
        self.step = None;
        self.data_out = 0;
    }

    fn on_edge(&mut self, edge: u8, data: u8) -> u8 {
        match edge {
            0..=4 => {
                self.shift |= ((data & NIBBLE_MASK) as u32) << (edge as u32 * NIBBLE_BITS);
                if edge as usize == INSTRUCTION_GROUPS - 1 {
                    // A, O and I all sit below bit 30, so the status is known
                    // before the tail arrives.
                    crate::semantics::status_for(&InstructionWord::decode(self.shift)).to_nibble()
                } else {
                    0
                }
            }
            TAIL_EDGE => {
                let tail = ((data & TAIL_MASK) as u32) << (INSTRUCTION_GROUPS as u32 * NIBBLE_BITS);
                let word = InstructionWord::decode(self.shift | tail);
                self.step = Some(self.machine.step(&word));
                self.instructions += 1;
                0
            }
            IN1_LO_EDGE | IN1_HI_EDGE => {
                self.operands[(edge - IN1_LO_EDGE) as usize] = data;
                0
            }
            IN2_LO_EDGE => {
                self.operands[2] = data;
                self.step.map(|s| s.pc).unwrap_or_default()
            }
            IN2_HI_EDGE => {
                self.operands[3] = data;
                let [in1_lo, in1_hi, in2_lo, in2_hi] = self.operands;
                self.machine.latch_inputs(
                    encoding::operand_from_nibbles(in1_lo, in1_hi),
                    encoding::operand_from_nibbles(in2_lo, in2_hi),
                );
                0
            }
            RESULT_LO_EDGE => (self.result_bits() & 0xFF) as u8,
            RESULT_HI_EDGE => ((self.result_bits() >> 8) & 0xF) as u8,
            _ => 0,
        }
    }

    fn result_bits(&self) -> u16 {
        self.step.map(|s| s.output as u16 & 0xFFF).unwrap_or_default()
    }

    /// Status of the instruction currently in flight, if one has executed.
    pub fn last_status(&self) -> Option<Status> {
        self.step.map(|s| s.status)
    }
}

impl Dut for HovaModel {
    fn apply(&mut self, pins: Pins) {
        let edge = pins.clk != self.clk;
        self.clk = pins.clk;
        if !edge {
            return;
        }
        if pins.rst {
            self.reset(pins.data_in);
            return;
        }

        let index = match self.edge {
            Some(index) => index,
            None if pins.clk => {
                self.shift = 0;
                0
            }
            None => return,
        };
        self.data_out = self.on_edge(index, pins.data_in);
        self.edge = (index + 1 < TRANSFER_EDGES).then_some(index + 1);
    }

    fn data_out(&self) -> u8 {
        self.data_out
    }
}
