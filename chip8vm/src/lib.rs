mod bytecode;
mod clock;
pub mod constants;
mod cpu;
mod devices;
mod disasm;
mod error;
mod interp;
mod op;
mod vm;

pub use self::{
    bytecode::Instr,
    clock::{Clock, Hz},
    devices::{Devices, InvalidKeyCode, KeyCode},
    error::{Chip8Error, Chip8Result},
    op::{decode, Op},
};

/// Version of this implementation.
pub const IMPL_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Read-only view of the 64x32 monochrome display, row by row.
pub type Chip8DisplayBuffer<'a> = &'a [bool; constants::DISPLAY_BUFFER_SIZE];

pub mod prelude {
    pub use super::{
        devices::{Devices, KeyCode},
        disasm::Disassembler,
        error::{Chip8Error, Chip8Result},
        vm::{Chip8Conf, Chip8Vm, Flow, Quirks, DEFAULT_CLOCK_FREQUENCY},
        Chip8DisplayBuffer, Hz,
    };
}
