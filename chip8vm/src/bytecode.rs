//! Helpers for extracting data from opcodes.
use std::fmt;

use crate::constants::Address;

/// A single 16-bit instruction word.
///
/// Instructions are stored big-endian in memory, two bytes each, with the
/// instruction family in the first 4-bit nibble.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Instr(pub u16);

impl Instr {
    /// Assemble an instruction from the two bytes as they appear in memory.
    #[inline(always)]
    pub fn from_bytes(bytes: [u8; 2]) -> Self {
        Self(u16::from_be_bytes(bytes))
    }

    /// Extract instruction family from the upper nibble.
    /// `0xF000`
    #[inline(always)]
    pub fn family(self) -> u8 {
        (self.0 >> 12) as u8
    }

    /// Extract operand X, the index of register Vx.
    /// `0x0F00`
    #[inline(always)]
    pub fn x(self) -> u8 {
        ((self.0 >> 8) & 0xF) as u8
    }

    /// Extract operand Y, the index of register Vy.
    /// `0x00F0`
    #[inline(always)]
    pub fn y(self) -> u8 {
        ((self.0 >> 4) & 0xF) as u8
    }

    /// Extract operand N, the lowest nibble.
    /// `0x000F`
    #[inline(always)]
    pub fn n(self) -> u8 {
        (self.0 & 0xF) as u8
    }

    /// Extract operand NN, the lowest byte.
    /// `0x00FF`
    #[inline(always)]
    pub fn nn(self) -> u8 {
        (self.0 & 0xFF) as u8
    }

    /// Extract operand NNN, a 12-bit address.
    /// `0x0FFF`
    #[inline(always)]
    pub fn nnn(self) -> Address {
        self.0 & 0x0FFF
    }

    #[inline(always)]
    pub fn to_bytes(self) -> [u8; 2] {
        self.0.to_be_bytes()
    }
}

impl From<u16> for Instr {
    fn from(word: u16) -> Self {
        Self(word)
    }
}

impl fmt::Display for Instr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04X}", self.0)
    }
}
