//! Structured HoVa instruction words and a builder for assembling them.
//!
//! Field layout, most significant bit first:
//!
//! ```text
//! ALU- A- B- C- D W- F- PC O I X K----- L-----
//! 31   27 25 23 21 20 18 16 14 13 12 11  5
//! ```

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum AluOp {
    Zero = 0b0000,
    Negate = 0b0001,
    PassB = 0b0010,
    PassC = 0b0011,
    ShiftRight = 0b0100,
    Add = 0b0101,
    Sub = 0b0110,
    AddFlag = 0b0111,
    SubFlag = 0b1000,
    Or = 0b1001,
    And = 0b1010,
    Xor = 0b1011,
    Not = 0b1100,
    PassA = 0b1101,
    Random = 0b1110,
    One = 0b1111,
}

impl AluOp {
    pub const ALL: [AluOp; 16] = [
        AluOp::Zero,
        AluOp::Negate,
        AluOp::PassB,
        AluOp::PassC,
        AluOp::ShiftRight,
        AluOp::Add,
        AluOp::Sub,
        AluOp::AddFlag,
        AluOp::SubFlag,
        AluOp::Or,
        AluOp::And,
        AluOp::Xor,
        AluOp::Not,
        AluOp::PassA,
        AluOp::Random,
        AluOp::One,
    ];

    pub fn from_bits(bits: u32) -> Self {
        Self::ALL[(bits & 0xF) as usize]
    }
}

/// Source written into register A.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ASource {
    Hold = 0b00,
    Alu = 0b01,
    D = 0b10,
    /// The input port chosen by [`InstructionWord::port`].
    Input = 0b11,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum BSource {
    Hold = 0b00,
    Alu = 0b01,
    A = 0b10,
    Immediate = 0b11,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum CSource {
    Hold = 0b00,
    Alu = 0b01,
    Decrement = 0b10,
    /// DECNZ: decrement, then branch to the jump target unless C reached zero.
    DecrementBranch = 0b11,
}

/// What drives the result bus W.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum WSource {
    Hold = 0b00,
    Alu = 0b01,
    A = 0b10,
    Immediate = 0b11,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum FlagSelect {
    Hold = 0b00,
    Zero = 0b01,
    Negative = 0b10,
    /// Undocumented encoding. Modelled as hold, but silicon updates the flag
    /// here, so programs that select it diverge from hardware.
    Reserved = 0b11,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum PcControl {
    Increment = 0b00,
    Jump = 0b01,
    JumpIfTrue = 0b10,
    JumpIfFalse = 0b11,
}

/// I/O port selector shared by the input mux and the output latch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Port {
    #[default]
    One,
    Two,
}

impl Port {
    pub fn index(self) -> usize {
        match self {
            Port::One => 0,
            Port::Two => 1,
        }
    }
}

impl std::fmt::Display for Port {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Port::One => write!(f, "1"),
            Port::Two => write!(f, "2"),
        }
    }
}

macro_rules! two_bit_decode {
    ($ty:ident { $($bits:literal => $variant:ident),+ $(,)? }) => {
        impl $ty {
            pub fn from_bits(bits: u32) -> Self {
                match bits & 0b11 {
                    $($bits => $ty::$variant,)+
                    _ => unreachable!(),
                }
            }
        }
    };
}

two_bit_decode!(ASource { 0 => Hold, 1 => Alu, 2 => D, 3 => Input });
two_bit_decode!(BSource { 0 => Hold, 1 => Alu, 2 => A, 3 => Immediate });
two_bit_decode!(CSource { 0 => Hold, 1 => Alu, 2 => Decrement, 3 => DecrementBranch });
two_bit_decode!(WSource { 0 => Hold, 1 => Alu, 2 => A, 3 => Immediate });
two_bit_decode!(FlagSelect { 0 => Hold, 1 => Zero, 2 => Negative, 3 => Reserved });
two_bit_decode!(PcControl { 0 => Increment, 1 => Jump, 2 => JumpIfTrue, 3 => JumpIfFalse });

const ALU_SHIFT: u32 = 28;
const A_SHIFT: u32 = 26;
const B_SHIFT: u32 = 24;
const C_SHIFT: u32 = 22;
const D_SHIFT: u32 = 21;
const W_SHIFT: u32 = 19;
const F_SHIFT: u32 = 17;
const PC_SHIFT: u32 = 15;
const OUT_SHIFT: u32 = 14;
const PORT_SHIFT: u32 = 13;
const X_SHIFT: u32 = 12;
const K_SHIFT: u32 = 6;

/// A decoded 32-bit instruction word.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct InstructionWord {
    pub alu: AluOp,
    pub a: ASource,
    pub b: BSource,
    pub c: CSource,
    /// Copy A into D.
    pub d: bool,
    pub w: WSource,
    pub flag: FlagSelect,
    pub pc: PcControl,
    /// Latch W into the output port selected by `port`.
    pub out: bool,
    pub port: Port,
    /// Wide immediate: `k:l` as a 12-bit value instead of `k` alone.
    pub wide: bool,
    pub k: u8, // 6-bit
    pub l: u8, // 6-bit
}

impl Default for InstructionWord {
    fn default() -> Self {
        Self::decode(0)
    }
}

impl InstructionWord {
    pub fn decode(word: u32) -> Self {
        Self {
            alu: AluOp::from_bits(word >> ALU_SHIFT),
            a: ASource::from_bits(word >> A_SHIFT),
            b: BSource::from_bits(word >> B_SHIFT),
            c: CSource::from_bits(word >> C_SHIFT),
            d: (word >> D_SHIFT) & 1 != 0,
            w: WSource::from_bits(word >> W_SHIFT),
            flag: FlagSelect::from_bits(word >> F_SHIFT),
            pc: PcControl::from_bits(word >> PC_SHIFT),
            out: (word >> OUT_SHIFT) & 1 != 0,
            port: if (word >> PORT_SHIFT) & 1 != 0 {
                Port::Two
            } else {
                Port::One
            },
            wide: (word >> X_SHIFT) & 1 != 0,
            k: ((word >> K_SHIFT) & 0x3F) as u8,
            l: (word & 0x3F) as u8,
        }
    }

    pub fn encode(&self) -> u32 {
        ((self.alu as u32) << ALU_SHIFT)
            | ((self.a as u32) << A_SHIFT)
            | ((self.b as u32) << B_SHIFT)
            | ((self.c as u32) << C_SHIFT)
            | ((self.d as u32) << D_SHIFT)
            | ((self.w as u32) << W_SHIFT)
            | ((self.flag as u32) << F_SHIFT)
            | ((self.pc as u32) << PC_SHIFT)
            | ((self.out as u32) << OUT_SHIFT)
            | (((self.port == Port::Two) as u32) << PORT_SHIFT)
            | ((self.wide as u32) << X_SHIFT)
            | (((self.k & 0x3F) as u32) << K_SHIFT)
            | ((self.l & 0x3F) as u32)
    }

    /// Raw 12-bit `k:l` concatenation.
    pub fn immediate_bits(&self) -> u16 {
        (((self.k & 0x3F) as u16) << 6) | (self.l & 0x3F) as u16
    }

    /// Signed data immediate as fed to B and W.
    pub fn data_immediate(&self) -> i16 {
        if self.wide {
            crate::encoding::sign_extend(self.immediate_bits() as u32, 12) as i16
        } else {
            crate::encoding::sign_extend((self.k & 0x3F) as u32, 6) as i16
        }
    }

    pub fn jump_target(&self) -> u8 {
        (self.immediate_bits() & 0xFF) as u8
    }

    /// The instruction reads the input port it selects.
    pub fn reads_input(&self) -> bool {
        self.a == ASource::Input
    }

    pub fn out1_en(&self) -> bool {
        self.out && self.port == Port::One
    }

    pub fn out2_en(&self) -> bool {
        self.out && self.port == Port::Two
    }
}

/// Fluent builder for instruction words.
#[derive(Debug, Clone, Default)]
pub struct Instr {
    word: InstructionWord,
}

impl Instr {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn alu(mut self, op: AluOp) -> Self {
        self.word.alu = op;
        self
    }

    pub fn a(mut self, src: ASource) -> Self {
        self.word.a = src;
        self
    }

    pub fn b(mut self, src: BSource) -> Self {
        self.word.b = src;
        self
    }

    pub fn c(mut self, src: CSource) -> Self {
        self.word.c = src;
        self
    }

    pub fn d_from_a(mut self) -> Self {
        self.word.d = true;
        self
    }

    pub fn w(mut self, src: WSource) -> Self {
        self.word.w = src;
        self
    }

    pub fn flag(mut self, select: FlagSelect) -> Self {
        self.word.flag = select;
        self
    }

    pub fn pc(mut self, control: PcControl) -> Self {
        self.word.pc = control;
        self
    }

    /// Select the input port read by `A = Input`.
    pub fn input(mut self, port: Port) -> Self {
        self.word.port = port;
        self
    }

    /// Latch W into `port` this instruction.
    pub fn out(mut self, port: Port) -> Self {
        self.word.out = true;
        self.word.port = port;
        self
    }

    /// Narrow immediate, stored in `k` and sign-extended from 6 bits.
    pub fn imm6(mut self, value: i8) -> Self {
        assert!(
            (-32..32).contains(&value),
            "Narrow immediate must fit in 6 signed bits"
        );
        self.word.wide = false;
        self.word.k = (value as u8) & 0x3F;
        self
    }

    /// Wide immediate spanning `k:l`, sign-extended from 12 bits.
    pub fn imm12(mut self, value: i16) -> Self {
        assert!(
            (-2048..2048).contains(&value),
            "Wide immediate must fit in 12 signed bits"
        );
        let bits = (value as u16) & 0xFFF;
        self.word.wide = true;
        self.word.k = (bits >> 6) as u8;
        self.word.l = (bits & 0x3F) as u8;
        self
    }

    /// Jump target in the low 8 bits of `k:l`. Leaves `wide` untouched.
    pub fn target(mut self, address: u8) -> Self {
        self.word.k = (address >> 6) & 0x3F;
        self.word.l = address & 0x3F;
        self
    }

    pub fn build(self) -> InstructionWord {
        self.word
    }

    pub fn assemble(self) -> u32 {
        self.word.encode()
    }
}

pub fn instr() -> Instr {
    Instr::new()
}

/// Handy words used by the directed tests and the program runner.
pub mod words {
    use super::*;

    pub const NOP: u32 = 0;

    pub fn jump(target: u8) -> u32 {
        instr().pc(PcControl::Jump).target(target).assemble()
    }

    pub fn load_a_from(port: Port) -> u32 {
        instr().a(ASource::Input).input(port).assemble()
    }

    pub fn load_b_immediate(value: i16) -> u32 {
        instr().b(BSource::Immediate).imm12(value).assemble()
    }

    pub fn copy_b_to_c() -> u32 {
        instr().alu(AluOp::PassB).c(CSource::Alu).assemble()
    }

    /// W = ALU(op), F = NEG(ALU).
    pub fn alu_to_w(op: AluOp) -> u32 {
        instr()
            .alu(op)
            .w(WSource::Alu)
            .flag(FlagSelect::Negative)
            .assemble()
    }

    pub fn output(port: Port) -> u32 {
        instr().out(port).assemble()
    }
}
