//! Disassembler.
use std::fmt::{self, Write as FmtWrite};

use crate::{bytecode::Instr, constants::MEM_START, op::decode};

/// Lists a program image as one instruction per line.
pub struct Disassembler<'a> {
    bytecode: &'a [u8],
    cursor: usize,
}

impl<'a> Disassembler<'a> {
    pub fn new(bytecode: &'a [u8]) -> Self {
        Self {
            bytecode,
            cursor: 0,
        }
    }

    /// Write the whole program to the given writer.
    pub fn disassemble<W: FmtWrite>(&mut self, w: &mut W) -> fmt::Result {
        self.cursor = 0;
        while self.cursor < self.bytecode.len() {
            self.disassemble_instr(w)?;
            self.cursor += 2;
        }
        self.cursor = 0;

        Ok(())
    }

    /// Write a single instruction to the given writer.
    fn disassemble_instr<W: FmtWrite>(&self, w: &mut W) -> fmt::Result {
        let address = MEM_START + self.cursor;

        match self.bytecode.get(self.cursor..self.cursor + 2) {
            Some(&[a, b]) => {
                let instr = Instr::from_bytes([a, b]);
                writeln!(w, "0x{address:04X} {instr} {}", decode(instr))
            }
            // Trailing odd byte can only be data.
            _ => {
                let a = self.bytecode[self.cursor];
                writeln!(w, "0x{address:04X} {a:02X}   0b{a:08b}")
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    #[rustfmt::skip]
    fn test_disassemble() {
        let rom = [
            0x00, 0xE0, // CLS
            0xA2, 0x0A, // LD I, 0x20A
            0xD0, 0x15, // DRW v0, v1, 5
            0x12, 0x06, // JP 0x206
            0xFF,       // ; trailing data
        ];

        let mut buf = String::new();
        Disassembler::new(&rom).disassemble(&mut buf).unwrap();

        let lines: Vec<&str> = buf.lines().collect();
        assert_eq!(lines, [
            "0x0200 00E0 CLS",
            "0x0202 A20A LD I, 0x20A",
            "0x0204 D015 DRW v0, v1, 5",
            "0x0206 1206 JP 0x206",
            "0x0208 FF   0b11111111",
        ]);
    }
}
