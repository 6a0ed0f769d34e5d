//! Narrow-bus transport for instruction words, operands and results.
//!
//! The device shifts an instruction in as five 6-bit groups followed by a
//! 2-bit tail, least significant group first. Everything read back is a
//! narrow value too: a 4-bit status, an 8-bit PC and a 12-bit result split
//! over two phases.

pub const NIBBLE_BITS: u32 = 6;
pub const NIBBLE_MASK: u8 = 0x3F;
/// Full 6-bit groups per instruction word.
pub const INSTRUCTION_GROUPS: usize = 5;
pub const TAIL_BITS: u32 = 2;
pub const TAIL_MASK: u8 = 0x3;
/// Groups plus the tail.
pub const WORD_NIBBLES: usize = INSTRUCTION_GROUPS + 1;
/// Width of the signed data path and of results read back.
pub const RESULT_WIDTH: u32 = 12;

const CONSUME_IN1: u8 = 0x1;
const CONSUME_IN2: u8 = 0x2;
const OUT1_VALID: u8 = 0x4;
const OUT2_VALID: u8 = 0x8;

/// Split `word` into the nibbles put on the bus, in transmission order.
pub fn encode(word: u32) -> [u8; WORD_NIBBLES] {
    let mut nibbles = [0u8; WORD_NIBBLES];
    let mut rest = word;
    for nibble in nibbles.iter_mut().take(INSTRUCTION_GROUPS) {
        *nibble = (rest as u8) & NIBBLE_MASK;
        rest >>= NIBBLE_BITS;
    }
    nibbles[INSTRUCTION_GROUPS] = (rest as u8) & TAIL_MASK;
    nibbles
}

/// Inverse of [`encode`]. Bits outside each nibble's width are ignored.
pub fn decode(nibbles: &[u8; WORD_NIBBLES]) -> u32 {
    let tail = (nibbles[INSTRUCTION_GROUPS] & TAIL_MASK) as u32;
    nibbles[..INSTRUCTION_GROUPS]
        .iter()
        .rev()
        .fold(tail, |acc, &n| (acc << NIBBLE_BITS) | (n & NIBBLE_MASK) as u32)
}

/// Per-instruction status reported by the device after the fifth group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Status {
    pub consume_in1: bool,
    pub consume_in2: bool,
    pub out1_valid: bool,
    pub out2_valid: bool,
}

impl Status {
    pub fn to_nibble(self) -> u8 {
        let mut nibble = 0;
        if self.consume_in1 {
            nibble |= CONSUME_IN1;
        }
        if self.consume_in2 {
            nibble |= CONSUME_IN2;
        }
        if self.out1_valid {
            nibble |= OUT1_VALID;
        }
        if self.out2_valid {
            nibble |= OUT2_VALID;
        }
        nibble
    }
}

pub fn decode_status(nibble: u8) -> Status {
    Status {
        consume_in1: nibble & CONSUME_IN1 != 0,
        consume_in2: nibble & CONSUME_IN2 != 0,
        out1_valid: nibble & OUT1_VALID != 0,
        out2_valid: nibble & OUT2_VALID != 0,
    }
}

/// Reinterpret the low `width` bits of `raw` as two's complement.
///
/// `width` is clamped to `1..=32`.
pub fn sign_extend(raw: u32, width: u32) -> i32 {
    let width = width.clamp(1, 32);
    if width == 32 {
        return raw as i32;
    }
    let mask = (1u32 << width) - 1;
    let sign = 1i64 << (width - 1);
    (((raw & mask) as i64 ^ sign) - sign) as i32
}

/// Combine the result low byte and high nibble into the raw 12-bit value.
pub fn assemble_result(low: u8, high: u8) -> u16 {
    low as u16 | (((high & 0xF) as u16) << 8)
}

/// Low then high 6-bit halves of a 12-bit operand.
pub fn operand_nibbles(value: i16) -> [u8; 2] {
    [
        (value as u8) & NIBBLE_MASK,
        ((value >> NIBBLE_BITS) as u8) & NIBBLE_MASK,
    ]
}

/// Rebuild a signed operand from the halves produced by [`operand_nibbles`].
pub fn operand_from_nibbles(low: u8, high: u8) -> i16 {
    let raw = (((high & NIBBLE_MASK) as u32) << NIBBLE_BITS) | (low & NIBBLE_MASK) as u32;
    sign_extend(raw, RESULT_WIDTH) as i16
}
