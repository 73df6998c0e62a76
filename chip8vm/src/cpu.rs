//! CPU and memory state.
use crate::{
    bytecode::Instr,
    constants::*,
    error::{Chip8Error, Chip8Result},
};

/// Core state for a chip8 interpreter.
pub struct Chip8Cpu {
    // ------------------------------------------------------------------------
    // Registers
    /// Program counter pointing to the next instruction to fetch.
    pub(crate) pc: usize,
    /// Stack pointer, the number of return addresses on the stack.
    pub(crate) sp: usize,
    /// General purpose registers for temporary values.
    ///
    /// Register 16 (VF) is used for either the carry flag or borrow switch depending on opcode.
    pub(crate) registers: [u8; REGISTER_COUNT],
    /// Index register (I) used for temporarily storing an address.
    pub(crate) address: Address,
    /// (DT) Delay timer that counts down to 0.
    pub(crate) delay_timer: u8,
    /// (ST) Sound timer that counts down to 0. When it has a non-zero value, a beep is played.
    pub(crate) sound_timer: u8,
    /// Keyboard input state. Pressed is a 1 bit, released is a 0 bit.
    pub(crate) key_state: u16,
    /// Instruction word most recently fetched.
    pub(crate) opcode: u16,

    // ------------------------------------------------------------------------
    // Memory
    /// Main memory storage space.
    pub(crate) ram: Box<[u8; MEM_SIZE]>,
    /// Stack of return pointers used for jumping when a routine call finishes.
    pub(crate) stack: Box<[Address; STACK_SIZE]>,
    /// Screen buffer that is drawn too.
    pub(crate) display: Box<[bool; DISPLAY_BUFFER_SIZE]>,
}

impl Default for Chip8Cpu {
    fn default() -> Self {
        let mut ram = Box::new([0; MEM_SIZE]);
        ram[FONTSET_START as usize..FONTSET_START as usize + FONTSET_DATA_LENGTH]
            .copy_from_slice(&FONTSET);

        Self {
            pc: MEM_START,
            sp: 0,
            registers: [0; REGISTER_COUNT],
            address: 0,
            delay_timer: 0,
            sound_timer: 0,
            key_state: 0,
            opcode: 0,

            ram,
            stack: Box::new([0; STACK_SIZE]),
            display: Box::new([false; DISPLAY_BUFFER_SIZE]),
        }
    }
}

impl Chip8Cpu {
    pub fn new() -> Self {
        Default::default()
    }

    /// Put registers, stack, display and keyboard back to their power-on state.
    ///
    /// Memory is kept, so a loaded program can be restarted.
    pub(crate) fn reset(&mut self) {
        self.pc = MEM_START;
        self.sp = 0;
        self.registers.fill(0);
        self.address = 0;
        self.delay_timer = 0;
        self.sound_timer = 0;
        self.key_state = 0;
        self.opcode = 0;
        self.stack.fill(0);
        self.display.fill(false);
    }

    pub fn clear_display(&mut self) {
        self.display.fill(false);
    }

    pub fn set_key_state(&mut self, key_id: u8, state: bool) {
        if key_id < KEY_COUNT {
            if state {
                self.key_state |= 1 << key_id;
            } else {
                self.key_state &= !(1 << key_id);
            }
        }
    }

    pub fn key_state(&self, key_id: u8) -> bool {
        if key_id < KEY_COUNT {
            self.key_state & (1 << key_id) > 0
        } else {
            false
        }
    }

    /// Check whether any key is pressed down.
    #[inline(always)]
    pub fn any_key(&self) -> bool {
        self.key_state > 0
    }

    /// Retrieve the value of the first key that is pressed down.
    #[inline]
    pub fn first_key(&self) -> Option<u8> {
        if self.any_key() {
            Some(self.key_state.trailing_zeros() as u8)
        } else {
            None
        }
    }

    /// Clear the keyboard input state, setting all keys to up.
    #[inline(always)]
    pub fn clear_keys(&mut self) {
        self.key_state = 0;
    }

    /// Count down the delay and sound timers, stopping at zero.
    #[inline]
    pub fn tick_timers(&mut self) {
        self.delay_timer = self.delay_timer.saturating_sub(1);
        self.sound_timer = self.sound_timer.saturating_sub(1);
    }

    /// Read the instruction at the program counter and advance past it.
    ///
    /// The program counter is left untouched when the instruction would be
    /// read from beyond the end of memory.
    pub fn fetch(&mut self) -> Chip8Result<Instr> {
        if self.pc >= MEM_SIZE - 1 {
            return Err(Chip8Error::PcOutOfBounds(self.pc));
        }

        let instr = Instr::from_bytes([self.ram[self.pc], self.ram[self.pc + 1]]);
        self.opcode = instr.0;
        self.pc += 2;

        Ok(instr)
    }

    /// Push a return address onto the call stack.
    pub fn push_stack(&mut self, address: Address) -> Chip8Result<()> {
        if self.sp >= STACK_SIZE {
            return Err(Chip8Error::StackOverflow);
        }

        self.stack[self.sp] = address;
        self.sp += 1;

        Ok(())
    }

    /// Pop the most recent return address off the call stack.
    pub fn pop_stack(&mut self) -> Chip8Result<Address> {
        if self.sp == 0 {
            return Err(Chip8Error::StackUnderflow);
        }

        self.sp -= 1;

        Ok(self.stack[self.sp])
    }

    /// Read a byte at an offset from the index register.
    ///
    /// The address wraps around the 12-bit address space.
    #[inline(always)]
    pub fn read_indexed(&self, offset: usize) -> u8 {
        self.ram[(self.address as usize + offset) & ADDRESS_MASK]
    }

    /// Write a byte at an offset from the index register.
    ///
    /// Callers must check the range with [`Chip8Cpu::check_writable`] first.
    #[inline(always)]
    pub(crate) fn write_indexed(&mut self, offset: usize, value: u8) {
        self.ram[(self.address as usize + offset) & ADDRESS_MASK] = value;
    }

    /// Ensure `len` bytes starting at the index register can be written
    /// without touching the font table.
    pub fn check_writable(&self, len: usize) -> Chip8Result<()> {
        let start = FONTSET_START as usize;
        let end = start + FONTSET_DATA_LENGTH;

        for offset in 0..len {
            let address = (self.address as usize + offset) & ADDRESS_MASK;
            if (start..end).contains(&address) {
                return Err(Chip8Error::ProtectedWrite {
                    address: address as Address,
                });
            }
        }

        Ok(())
    }
}
