//! Instruction decoding.
//!
//! Instruction words are classified by their family nibble through a table
//! of decode functions. Each family decoder is self-contained and returns
//! exactly one [`Op`], so decoding can never fall through into a
//! neighbouring family.
use std::fmt::{self, Formatter};

use crate::{bytecode::Instr, constants::Address};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[allow(non_camel_case_types)]
pub enum Op {
    /// 00E0 (CLS)
    ///
    /// Clear the screen.
    ClearScreen,
    /// 00EE (RET)
    ///
    /// Return from the sub-routine.
    Return,
    /// 1nnn (JP addr)
    ///
    /// Jump to the address in `nnn`.
    JumpAddress { address: Address },
    /// 2nnn (CALL addr)
    ///
    /// Call the sub-routine at address `nnn`.
    Call { address: Address },
    /// 3xnn (SE Vx, byte)
    ///
    /// Skip the next instruction if register `Vx` equals value `nn`
    Skip_Eq_Byte { vx: u8, nn: u8 },
    /// 4xnn (SNE Vx, byte)
    ///
    /// Skip the next instruction if register `Vx` does not equal value `nn`.
    Skip_NotEq_Byte { vx: u8, nn: u8 },
    /// 5xy0 (SE Vx, Vy)
    ///
    /// Skip the next instruction if register `Vx` equals register `Vy`.
    Skip_Eq { vx: u8, vy: u8 },
    /// 6xnn (LD Vx, byte)
    Load_Byte { vx: u8, nn: u8 },
    /// 7xnn (ADD Vx, byte)
    ///
    /// Add byte to the value in register `Vx`, store the result in `Vx`.
    /// Carry flag is not set.
    Add_Byte { vx: u8, nn: u8 },

    // ------------------------------------------------------------------------
    // Math
    /// 8xy0 (LD Vx, Vy)
    Load_Vx_Vy { vx: u8, vy: u8 },
    /// 8xy1 (OR Vx, Vy)
    Or_Vx_Vy { vx: u8, vy: u8 },
    /// 8xy2 (AND Vx, Vy)
    And_Vx_Vy { vx: u8, vy: u8 },
    /// 8xy3 (XOR Vx, Vy)
    Xor_Vx_Vy { vx: u8, vy: u8 },
    /// 8xy4 (ADD Vx, Vy)
    ///
    /// Overflow is wrapped. If overflowed, set VF to 1, else 0.
    Add_Vx_Vy { vx: u8, vy: u8 },
    /// 8xy5 (SUB Vx, Vy)
    ///
    /// VF is set to 0 when there is a borrow, set to 1 when there isn't.
    Sub_Vx_Vy { vx: u8, vy: u8 },
    /// 8xy6 (SHR Vx {, Vy})
    ///
    /// `Vy` is only read when the shift quirk is enabled.
    ShiftRight { vx: u8, vy: u8 },
    /// 8xy7 (SUBN Vx, Vy)
    ///
    /// Subtracts VX from VY, and stores the result in VX.
    SubReverse_Vx_Vy { vx: u8, vy: u8 },
    /// 8xyE (SHL Vx {, Vy})
    ShiftLeft { vx: u8, vy: u8 },
    /// 9xy0 (SNE Vx, Vy)
    Skip_NotEq { vx: u8, vy: u8 },

    /// Annn (LD I, addr)
    ///
    /// Load address into register `I`.
    Load_Address { address: Address },
    /// Bnnn (JP V0, addr)
    ///
    /// Jump to location nnn plus an offset register.
    /// The register is `V0`, or `Vx` taken from the address' high nibble
    /// when the jump quirk is enabled.
    Jump_Offset { address: Address },
    /// Cxnn (RND Vx, byte)
    Random { vx: u8, nn: u8 },
    /// Dxyn (DRW Vx, Vy, nibble)
    ///
    /// Draw sprite to the display buffer.
    Draw { vx: u8, vy: u8, n: u8 },

    // ------------------------------------------------------------------------
    // Keyboard
    /// Ex9E (SKP Vx)
    Skip_Key { vx: u8 },
    /// ExA1 (SKNP Vx)
    Skip_NotKey { vx: u8 },

    // ------------------------------------------------------------------------
    // Timers and memory
    /// Fx07 (LD Vx, DT)
    Load_Vx_Delay { vx: u8 },
    /// Fx0A (LD Vx, K)
    Wait_Key { vx: u8 },
    /// Fx15 (LD DT, Vx)
    Load_Delay_Vx { vx: u8 },
    /// Fx18 (LD ST, Vx)
    Load_Sound_Vx { vx: u8 },
    /// Fx1E (ADD I, Vx)
    Add_Address_Vx { vx: u8 },
    /// Fx29 (LD F, Vx)
    Load_Font { vx: u8 },
    /// Fx33 (LD B, Vx)
    Store_Bcd { vx: u8 },
    /// Fx55 (LD [I], Vx)
    Store_Registers { vx: u8 },
    /// Fx65 (LD Vx, [I])
    Load_Registers { vx: u8 },

    /// Instruction word that is not part of the instruction set.
    Unknown(Instr),
}

type DecodeFn = fn(Instr) -> Op;

/// Family decoders indexed by the top nibble of the instruction word.
static DECODE_TABLE: [DecodeFn; 16] = [
    decode_sys,
    decode_jump,
    decode_call,
    decode_skip_eq_byte,
    decode_skip_not_eq_byte,
    decode_skip_eq,
    decode_load_byte,
    decode_add_byte,
    decode_math,
    decode_skip_not_eq,
    decode_load_address,
    decode_jump_offset,
    decode_random,
    decode_draw,
    decode_keys,
    decode_misc,
];

/// Classify an instruction word into its operation.
#[inline]
pub fn decode(instr: Instr) -> Op {
    DECODE_TABLE[instr.family() as usize](instr)
}

fn decode_sys(instr: Instr) -> Op {
    match instr.0 {
        0x00E0 => Op::ClearScreen,
        0x00EE => Op::Return,
        _ => Op::Unknown(instr),
    }
}

fn decode_jump(instr: Instr) -> Op {
    Op::JumpAddress {
        address: instr.nnn(),
    }
}

fn decode_call(instr: Instr) -> Op {
    Op::Call {
        address: instr.nnn(),
    }
}

fn decode_skip_eq_byte(instr: Instr) -> Op {
    Op::Skip_Eq_Byte {
        vx: instr.x(),
        nn: instr.nn(),
    }
}

fn decode_skip_not_eq_byte(instr: Instr) -> Op {
    Op::Skip_NotEq_Byte {
        vx: instr.x(),
        nn: instr.nn(),
    }
}

fn decode_skip_eq(instr: Instr) -> Op {
    match instr.n() {
        0x0 => Op::Skip_Eq {
            vx: instr.x(),
            vy: instr.y(),
        },
        _ => Op::Unknown(instr),
    }
}

fn decode_load_byte(instr: Instr) -> Op {
    Op::Load_Byte {
        vx: instr.x(),
        nn: instr.nn(),
    }
}

fn decode_add_byte(instr: Instr) -> Op {
    Op::Add_Byte {
        vx: instr.x(),
        nn: instr.nn(),
    }
}

fn decode_math(instr: Instr) -> Op {
    let (vx, vy) = (instr.x(), instr.y());

    match instr.n() {
        0x0 => Op::Load_Vx_Vy { vx, vy },
        0x1 => Op::Or_Vx_Vy { vx, vy },
        0x2 => Op::And_Vx_Vy { vx, vy },
        0x3 => Op::Xor_Vx_Vy { vx, vy },
        0x4 => Op::Add_Vx_Vy { vx, vy },
        0x5 => Op::Sub_Vx_Vy { vx, vy },
        0x6 => Op::ShiftRight { vx, vy },
        0x7 => Op::SubReverse_Vx_Vy { vx, vy },
        0xE => Op::ShiftLeft { vx, vy },
        _ => Op::Unknown(instr),
    }
}

fn decode_skip_not_eq(instr: Instr) -> Op {
    match instr.n() {
        0x0 => Op::Skip_NotEq {
            vx: instr.x(),
            vy: instr.y(),
        },
        _ => Op::Unknown(instr),
    }
}

fn decode_load_address(instr: Instr) -> Op {
    Op::Load_Address {
        address: instr.nnn(),
    }
}

fn decode_jump_offset(instr: Instr) -> Op {
    Op::Jump_Offset {
        address: instr.nnn(),
    }
}

fn decode_random(instr: Instr) -> Op {
    Op::Random {
        vx: instr.x(),
        nn: instr.nn(),
    }
}

fn decode_draw(instr: Instr) -> Op {
    Op::Draw {
        vx: instr.x(),
        vy: instr.y(),
        n: instr.n(),
    }
}

fn decode_keys(instr: Instr) -> Op {
    let vx = instr.x();

    match instr.nn() {
        0x9E => Op::Skip_Key { vx },
        0xA1 => Op::Skip_NotKey { vx },
        _ => Op::Unknown(instr),
    }
}

fn decode_misc(instr: Instr) -> Op {
    let vx = instr.x();

    match instr.nn() {
        0x07 => Op::Load_Vx_Delay { vx },
        0x0A => Op::Wait_Key { vx },
        0x15 => Op::Load_Delay_Vx { vx },
        0x18 => Op::Load_Sound_Vx { vx },
        0x1E => Op::Add_Address_Vx { vx },
        0x29 => Op::Load_Font { vx },
        0x33 => Op::Store_Bcd { vx },
        0x55 => Op::Store_Registers { vx },
        0x65 => Op::Load_Registers { vx },
        _ => Op::Unknown(instr),
    }
}

/// Assembly mnemonic of the operation.
impl fmt::Display for Op {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        match self {
            Op::ClearScreen => write!(f, "CLS"),
            Op::Return => write!(f, "RET"),
            Op::JumpAddress { address } => write!(f, "JP 0x{address:03X}"),
            Op::Call { address } => write!(f, "CALL 0x{address:03X}"),
            Op::Skip_Eq_Byte { vx, nn } => write!(f, "SE v{vx:X}, 0x{nn:02X}"),
            Op::Skip_NotEq_Byte { vx, nn } => write!(f, "SNE v{vx:X}, 0x{nn:02X}"),
            Op::Skip_Eq { vx, vy } => write!(f, "SE v{vx:X}, v{vy:X}"),
            Op::Load_Byte { vx, nn } => write!(f, "LD v{vx:X}, 0x{nn:02X}"),
            Op::Add_Byte { vx, nn } => write!(f, "ADD v{vx:X}, 0x{nn:02X}"),
            // ------
            Op::Load_Vx_Vy { vx, vy } => write!(f, "LD v{vx:X}, v{vy:X}"),
            Op::Or_Vx_Vy { vx, vy } => write!(f, "OR v{vx:X}, v{vy:X}"),
            Op::And_Vx_Vy { vx, vy } => write!(f, "AND v{vx:X}, v{vy:X}"),
            Op::Xor_Vx_Vy { vx, vy } => write!(f, "XOR v{vx:X}, v{vy:X}"),
            Op::Add_Vx_Vy { vx, vy } => write!(f, "ADD v{vx:X}, v{vy:X}"),
            Op::Sub_Vx_Vy { vx, vy } => write!(f, "SUB v{vx:X}, v{vy:X}"),
            Op::ShiftRight { vx, vy } => write!(f, "SHR v{vx:X}, v{vy:X}"),
            Op::SubReverse_Vx_Vy { vx, vy } => write!(f, "SUBN v{vx:X}, v{vy:X}"),
            Op::ShiftLeft { vx, vy } => write!(f, "SHL v{vx:X}, v{vy:X}"),
            Op::Skip_NotEq { vx, vy } => write!(f, "SNE v{vx:X}, v{vy:X}"),
            // ------
            Op::Load_Address { address } => write!(f, "LD I, 0x{address:03X}"),
            Op::Jump_Offset { address } => write!(f, "JP v0, 0x{address:03X}"),
            Op::Random { vx, nn } => write!(f, "RND v{vx:X}, 0x{nn:02X}"),
            Op::Draw { vx, vy, n } => write!(f, "DRW v{vx:X}, v{vy:X}, {n}"),
            // ------
            Op::Skip_Key { vx } => write!(f, "SKP v{vx:X}"),
            Op::Skip_NotKey { vx } => write!(f, "SKNP v{vx:X}"),
            // ------
            Op::Load_Vx_Delay { vx } => write!(f, "LD v{vx:X}, DT"),
            Op::Wait_Key { vx } => write!(f, "LD v{vx:X}, K"),
            Op::Load_Delay_Vx { vx } => write!(f, "LD DT, v{vx:X}"),
            Op::Load_Sound_Vx { vx } => write!(f, "LD ST, v{vx:X}"),
            Op::Add_Address_Vx { vx } => write!(f, "ADD I, v{vx:X}"),
            Op::Load_Font { vx } => write!(f, "LD F, v{vx:X}"),
            Op::Store_Bcd { vx } => write!(f, "LD B, v{vx:X}"),
            Op::Store_Registers { vx } => write!(f, "LD [I], v{vx:X}"),
            Op::Load_Registers { vx } => write!(f, "LD v{vx:X}, [I]"),

            Op::Unknown(instr) => write!(f, "0x{instr}"),
        }
    }
}
