//! Instruction-level reference behaviour of the HoVa core.
//!
//! Nothing on the driver side computes these results; they exist to build
//! expected values for assertions and to back the behavioural device model.

use serde::{Deserialize, Serialize};

use crate::assembler::{
    ASource, AluOp, BSource, CSource, FlagSelect, InstructionWord, PcControl, WSource,
};
use crate::encoding::{sign_extend, Status, RESULT_WIDTH};

/// Wrap an intermediate value to the 12-bit signed data path.
pub fn wrap(value: i32) -> i16 {
    sign_extend(value as u32, RESULT_WIDTH) as i16
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AluInputs {
    pub a: i16,
    pub b: i16,
    pub c: i16,
    pub flag: bool,
    /// Generator output this instruction, 0 when disabled.
    pub random: i16,
}

pub fn evaluate(op: AluOp, inputs: AluInputs) -> i16 {
    let a = inputs.a as i32;
    let b = inputs.b as i32;
    let f = inputs.flag as i32;
    let value = match op {
        AluOp::Zero => 0,
        AluOp::Negate => -a,
        AluOp::PassB => b,
        AluOp::PassC => inputs.c as i32,
        AluOp::ShiftRight => a >> 1,
        AluOp::Add => a + b,
        AluOp::Sub => b - a,
        AluOp::AddFlag => a + b + f,
        AluOp::SubFlag => b - a - f,
        AluOp::Or => a | b,
        AluOp::And => a & b,
        AluOp::Xor => a ^ b,
        AluOp::Not => !a,
        AluOp::PassA => a,
        AluOp::Random => inputs.random as i32,
        AluOp::One => 1,
    };
    wrap(value)
}

pub fn update_flag(select: FlagSelect, alu: i16, previous: bool) -> bool {
    match select {
        FlagSelect::Zero => alu == 0,
        FlagSelect::Negative => alu < 0,
        FlagSelect::Hold | FlagSelect::Reserved => previous,
    }
}

/// Which flag value a conditional jump tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlagTiming {
    /// The flag as just updated by this instruction's `f_ctrl`.
    #[default]
    SameInstruction,
    /// The flag as it stood before this instruction.
    PreviousInstruction,
}

/// Next PC for a resolved branch condition. DECNZ and `pc_ctrl` are OR-ed.
pub fn next_pc(control: PcControl, flag: bool, decnz_taken: bool, pc: u8, target: u8) -> u8 {
    let taken = decnz_taken
        || match control {
            PcControl::Increment => false,
            PcControl::Jump => true,
            PcControl::JumpIfTrue => flag,
            PcControl::JumpIfFalse => !flag,
        };
    if taken {
        target
    } else {
        pc.wrapping_add(1)
    }
}

/// Status the device reports for `word`.
pub fn status_for(word: &InstructionWord) -> Status {
    let port_two = word.port == crate::assembler::Port::Two;
    Status {
        consume_in1: word.reads_input() && !port_two,
        consume_in2: word.reads_input() && port_two,
        out1_valid: word.out1_en(),
        out2_valid: word.out2_en(),
    }
}

/// 12-bit maximal-length LFSR standing in for the ring-oscillator generator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Lfsr {
    state: u16,
}

impl Lfsr {
    pub fn new(seed: u16) -> Self {
        let state = seed & 0xFFF;
        Self {
            state: if state == 0 { 1 } else { state },
        }
    }

    /// Advance one step and return the new state as a signed 12-bit value.
    pub fn next_value(&mut self) -> i16 {
        // Taps 12, 6, 4, 1.
        let s = self.state;
        let feedback = ((s >> 11) ^ (s >> 5) ^ (s >> 3) ^ s) & 1;
        self.state = ((s << 1) | feedback) & 0xFFF;
        sign_extend(self.state as u32, RESULT_WIDTH) as i16
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Registers {
    pub a: i16,
    pub b: i16,
    pub c: i16,
    pub d: i16,
    pub w: i16,
    pub flag: bool,
    pub pc: u8,
}

/// Observable outcome of one instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Step {
    pub status: Status,
    pub pc: u8,
    /// Value presented to the output port: W before this instruction.
    pub output: i16,
    pub alu: i16,
}

/// Reference executor over decoded instruction words.
#[derive(Debug, Clone)]
pub struct Machine {
    pub regs: Registers,
    /// Input values latched during the previous instruction's operand phases.
    pub inputs: [i16; 2],
    rng: Lfsr,
    seed: u16,
    random_enabled: bool,
    timing: FlagTiming,
}

impl Machine {
    pub fn new(seed: u16, timing: FlagTiming) -> Self {
        Self {
            regs: Registers::default(),
            inputs: [0; 2],
            rng: Lfsr::new(seed),
            seed,
            random_enabled: false,
            timing,
        }
    }

    /// Back to the power-on state. The generator restarts from its seed.
    pub fn reset(&mut self) {
        self.regs = Registers::default();
        self.inputs = [0; 2];
        self.rng = Lfsr::new(self.seed);
        self.random_enabled = false;
    }

    pub fn set_random_enabled(&mut self, enabled: bool) {
        self.random_enabled = enabled;
    }

    pub fn random_enabled(&self) -> bool {
        self.random_enabled
    }

    pub fn timing(&self) -> FlagTiming {
        self.timing
    }

    /// Latch the operands shifted in for the next instruction.
    pub fn latch_inputs(&mut self, in1: i16, in2: i16) {
        self.inputs = [in1, in2];
    }

    pub fn step(&mut self, word: &InstructionWord) -> Step {
        let r = self.regs;
        let random = if self.random_enabled {
            self.rng.next_value()
        } else {
            0
        };
        let alu = evaluate(
            word.alu,
            AluInputs {
                a: r.a,
                b: r.b,
                c: r.c,
                flag: r.flag,
                random,
            },
        );
        let imm = word.data_immediate();

        let a = match word.a {
            ASource::Hold => r.a,
            ASource::Alu => alu,
            ASource::D => r.d,
            ASource::Input => self.inputs[word.port.index()],
        };
        let b = match word.b {
            BSource::Hold => r.b,
            BSource::Alu => alu,
            BSource::A => r.a,
            BSource::Immediate => imm,
        };
        let c = match word.c {
            CSource::Hold => r.c,
            CSource::Alu => alu,
            CSource::Decrement | CSource::DecrementBranch => wrap(r.c as i32 - 1),
        };
        let d = if word.d { r.a } else { r.d };
        let w = match word.w {
            WSource::Hold => r.w,
            WSource::Alu => alu,
            WSource::A => r.a,
            WSource::Immediate => imm,
        };
        let flag = update_flag(word.flag, alu, r.flag);
        let branch_flag = match self.timing {
            FlagTiming::SameInstruction => flag,
            FlagTiming::PreviousInstruction => r.flag,
        };
        let decnz_taken = word.c == CSource::DecrementBranch && c != 0;
        let pc = next_pc(word.pc, branch_flag, decnz_taken, r.pc, word.jump_target());

        self.regs = Registers {
            a,
            b,
            c,
            d,
            w,
            flag,
            pc,
        };

        Step {
            status: status_for(word),
            pc,
            output: r.w,
            alu,
        }
    }
}
