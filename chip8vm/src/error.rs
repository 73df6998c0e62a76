//! Result and errors.
use std::fmt::{self, Display, Formatter};

use crate::constants::{Address, MAX_PROGRAM_SIZE};

pub type Chip8Result<T> = std::result::Result<T, Chip8Error>;

/// Conditions reported by the virtual machine.
///
/// None of the runtime errors are fatal. The step that reports one leaves the
/// machine in a consistent state, so the host may log it and keep stepping.
#[derive(Debug)]
pub enum Chip8Error {
    /// Jump, call or index target falls outside of memory.
    /// The instruction was skipped.
    AddressOutOfRange { opcode: u16, address: usize },
    /// Instruction word does not decode to a known operation.
    /// It was treated as a no-op.
    UnknownOpcode(u16),
    /// Subroutine call while the call stack is full.
    StackOverflow,
    /// Return while the call stack is empty.
    StackUnderflow,
    /// Program counter ran past the end of memory. Nothing was fetched.
    PcOutOfBounds(usize),
    /// Attempt to write into the font table.
    ProtectedWrite { address: Address },
    /// Attempt to load a bytecode program that can't fit in memory.
    LargeProgram,
    /// Attempt to load a program with no bytes.
    EmptyProgram,
    Io(std::io::Error),
    Fmt(fmt::Error),
}

impl Display for Chip8Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::AddressOutOfRange { opcode, address } => write!(
                f,
                "address 0x{address:04X} out of range for instruction {opcode:04X}"
            ),
            Self::UnknownOpcode(opcode) => write!(f, "unknown opcode {opcode:04X}"),
            Self::StackOverflow => write!(f, "call stack overflow"),
            Self::StackUnderflow => write!(f, "call stack underflow"),
            Self::PcOutOfBounds(pc) => {
                write!(f, "program counter 0x{pc:04X} is past the end of memory")
            }
            Self::ProtectedWrite { address } => {
                write!(f, "write to protected font memory at 0x{address:03X}")
            }
            Self::LargeProgram => write!(
                f,
                "program too large for VM memory, limit is {MAX_PROGRAM_SIZE} bytes"
            ),
            Self::EmptyProgram => write!(f, "program is empty"),
            Self::Io(err) => write!(f, "{err}"),
            Self::Fmt(err) => write!(f, "{err}"),
        }
    }
}

impl std::error::Error for Chip8Error {}

impl From<fmt::Error> for Chip8Error {
    fn from(err: fmt::Error) -> Self {
        Chip8Error::Fmt(err)
    }
}

impl From<std::io::Error> for Chip8Error {
    fn from(err: std::io::Error) -> Self {
        Chip8Error::Io(err)
    }
}
