//! Instruction semantics.
//!
//! Every decoded [`Op`] maps to exactly one handler, and every handler
//! finishes the step by returning its [`Flow`] or error.
use rand::Rng;

use crate::{
    constants::*,
    error::{Chip8Error, Chip8Result},
    op::Op,
    vm::{Chip8Vm, Flow},
};

impl Chip8Vm {
    /// Execute a decoded instruction.
    ///
    /// The program counter already points past the instruction.
    pub(crate) fn execute(&mut self, op: Op) -> Chip8Result<Flow> {
        match op {
            Op::ClearScreen => self.exec_clear(),
            Op::Return => self.exec_return(),
            Op::JumpAddress { address } => self.exec_jump(address as usize),
            Op::Call { address } => self.exec_call(address as usize),
            Op::Skip_Eq_Byte { vx, nn } => self.skip_if(self.v(vx) == nn),
            Op::Skip_NotEq_Byte { vx, nn } => self.skip_if(self.v(vx) != nn),
            Op::Skip_Eq { vx, vy } => self.skip_if(self.v(vx) == self.v(vy)),
            Op::Skip_NotEq { vx, vy } => self.skip_if(self.v(vx) != self.v(vy)),
            Op::Load_Byte { vx, nn } => {
                self.set_v(vx, nn);
                Ok(Flow::Ok)
            }
            Op::Add_Byte { vx, nn } => {
                self.set_v(vx, self.v(vx).wrapping_add(nn));
                Ok(Flow::Ok)
            }
            Op::Load_Vx_Vy { .. }
            | Op::Or_Vx_Vy { .. }
            | Op::And_Vx_Vy { .. }
            | Op::Xor_Vx_Vy { .. }
            | Op::Add_Vx_Vy { .. }
            | Op::Sub_Vx_Vy { .. }
            | Op::ShiftRight { .. }
            | Op::SubReverse_Vx_Vy { .. }
            | Op::ShiftLeft { .. } => self.exec_math(op),
            Op::Load_Address { address } => self.exec_load_address(address as usize),
            Op::Jump_Offset { address } => self.exec_jump_offset(address),
            Op::Random { vx, nn } => {
                let byte: u8 = self.rng.gen();
                self.set_v(vx, byte & nn);
                Ok(Flow::Ok)
            }
            Op::Draw { vx, vy, n } => self.exec_draw(vx, vy, n),
            Op::Skip_Key { vx } => self.skip_if(self.cpu.key_state(self.v(vx))),
            Op::Skip_NotKey { vx } => self.skip_if(!self.cpu.key_state(self.v(vx))),
            Op::Wait_Key { vx } => self.exec_wait_key(vx),
            Op::Load_Vx_Delay { .. }
            | Op::Load_Delay_Vx { .. }
            | Op::Load_Sound_Vx { .. }
            | Op::Add_Address_Vx { .. }
            | Op::Load_Font { .. } => self.exec_misc(op),
            Op::Store_Bcd { vx } => self.exec_bcd(vx),
            Op::Store_Registers { vx } => self.exec_store(vx),
            Op::Load_Registers { vx } => self.exec_load(vx),
            Op::Unknown(instr) => Err(Chip8Error::UnknownOpcode(instr.0)),
        }
    }

    #[inline(always)]
    fn v(&self, index: u8) -> u8 {
        self.cpu.registers[index as usize & 0xF]
    }

    #[inline(always)]
    fn set_v(&mut self, index: u8, value: u8) {
        self.cpu.registers[index as usize & 0xF] = value;
    }

    #[inline(always)]
    fn set_flag(&mut self, flag: bool) {
        self.cpu.registers[FLAG_REGISTER] = flag as u8;
    }

    /// Skip the next instruction when the condition holds.
    #[inline]
    fn skip_if(&mut self, condition: bool) -> Chip8Result<Flow> {
        if condition {
            self.cpu.pc += 2;
        }
        Ok(Flow::Ok)
    }

    /// Reject addresses outside of memory.
    fn check_address(&self, address: usize) -> Chip8Result<()> {
        if address >= MEM_SIZE {
            Err(Chip8Error::AddressOutOfRange {
                opcode: self.cpu.opcode,
                address,
            })
        } else {
            Ok(())
        }
    }

    // ------------------------------------------------------------------------
    // Flow control

    /// 00E0 (CLS)
    fn exec_clear(&mut self) -> Chip8Result<Flow> {
        self.cpu.clear_display();
        Ok(Flow::Draw)
    }

    /// 00EE (RET)
    ///
    /// Set the program counter to the address popped off the stack.
    fn exec_return(&mut self) -> Chip8Result<Flow> {
        let address = self.cpu.pop_stack()?;
        self.cpu.pc = address as usize;
        Ok(Flow::Jump)
    }

    /// 1nnn (JP addr)
    fn exec_jump(&mut self, address: usize) -> Chip8Result<Flow> {
        self.check_address(address)?;
        self.cpu.pc = address;
        Ok(Flow::Jump)
    }

    /// 2nnn (CALL addr)
    ///
    /// Push the address of the next instruction, then jump.
    fn exec_call(&mut self, address: usize) -> Chip8Result<Flow> {
        self.check_address(address)?;
        self.cpu.push_stack(self.cpu.pc as Address)?;
        self.cpu.pc = address;
        Ok(Flow::Jump)
    }

    /// Bnnn (JP V0, addr)
    fn exec_jump_offset(&mut self, address: Address) -> Chip8Result<Flow> {
        let offset_register = if self.conf.quirks.jump_vx {
            (address >> 8) as u8 & 0xF
        } else {
            0
        };
        let target = address as usize + self.v(offset_register) as usize;

        self.exec_jump(target)
    }

    // ------------------------------------------------------------------------
    // Arithmetic

    /// 8xyN
    fn exec_math(&mut self, op: Op) -> Chip8Result<Flow> {
        match op {
            // 8xy0 (LD Vx, Vy)
            Op::Load_Vx_Vy { vx, vy } => self.set_v(vx, self.v(vy)),
            // 8xy1 (OR Vx, Vy)
            Op::Or_Vx_Vy { vx, vy } => self.set_v(vx, self.v(vx) | self.v(vy)),
            // 8xy2 (AND Vx, Vy)
            Op::And_Vx_Vy { vx, vy } => self.set_v(vx, self.v(vx) & self.v(vy)),
            // 8xy3 (XOR Vx, Vy)
            Op::Xor_Vx_Vy { vx, vy } => self.set_v(vx, self.v(vx) ^ self.v(vy)),
            // 8xy4 (ADD Vx, Vy)
            //
            // If overflow, set VF to 1, else 0.
            Op::Add_Vx_Vy { vx, vy } => {
                let (result, carry) = self.v(vx).overflowing_add(self.v(vy));
                self.set_v(vx, result);
                self.set_flag(carry);
            }
            // 8xy5 (SUB Vx, Vy)
            //
            // VF is set to 0 when there is a borrow, set to 1 when there isn't.
            Op::Sub_Vx_Vy { vx, vy } => {
                let (x, y) = (self.v(vx), self.v(vy));
                self.set_v(vx, x.wrapping_sub(y));
                self.set_flag(x >= y);
            }
            // 8xy7 (SUBN Vx, Vy)
            Op::SubReverse_Vx_Vy { vx, vy } => {
                let (x, y) = (self.v(vx), self.v(vy));
                self.set_v(vx, y.wrapping_sub(x));
                self.set_flag(y >= x);
            }
            // 8xy6 (SHR Vx)
            //
            // VF is set to the bit shifted out.
            Op::ShiftRight { vx, vy } => {
                if self.conf.quirks.shift_vy {
                    self.set_v(vx, self.v(vy));
                }
                let x = self.v(vx);
                self.set_v(vx, x >> 1);
                self.set_flag(x & 1 == 1);
            }
            // 8xyE (SHL Vx)
            Op::ShiftLeft { vx, vy } => {
                if self.conf.quirks.shift_vy {
                    self.set_v(vx, self.v(vy));
                }
                let x = self.v(vx);
                self.set_v(vx, x << 1);
                self.set_flag(x >> 7 == 1);
            }
            _ => return Err(Chip8Error::UnknownOpcode(self.cpu.opcode)),
        }

        Ok(Flow::Ok)
    }

    // ------------------------------------------------------------------------
    // Memory

    /// Annn (LD I, addr)
    fn exec_load_address(&mut self, address: usize) -> Chip8Result<Flow> {
        self.check_address(address)?;
        self.cpu.address = address as Address;
        Ok(Flow::Ok)
    }

    /// Dxyn (DRW Vx, Vy, nibble)
    ///
    /// Draw sprite to the display buffer, at coordinate as per registers Vx and Vy.
    /// Sprite is encoded as 8 pixels wide, N pixels high, stored in bits located in
    /// memory pointed to by address register I.
    ///
    /// The starting coordinate wraps around the display, but the sprite itself
    /// is clipped at the right and bottom edges.
    ///
    /// If the drawing operation erases existing pixels in the display buffer, register VF is set to
    /// 1, and set to 0 if no display bits are unset. This is used for collision detection.
    fn exec_draw(&mut self, vx: u8, vy: u8, n: u8) -> Chip8Result<Flow> {
        let x = self.v(vx) as usize % DISPLAY_WIDTH;
        let y = self.v(vy) as usize % DISPLAY_HEIGHT;
        let mut is_erased = false;

        for r in 0..(n as usize).min(DISPLAY_HEIGHT - y) {
            let row = self.cpu.read_indexed(r);

            // Each row is 8 bits representing the 8 pixels of the sprite.
            for c in 0..8usize.min(DISPLAY_WIDTH - x) {
                if (row >> (7 - c)) & 1 == 0 {
                    continue;
                }

                let d = (x + c) + (y + r) * DISPLAY_WIDTH;

                // XOR erases a pixel when both the old and new values are both 1.
                is_erased |= self.cpu.display[d];
                self.cpu.display[d] ^= true;
            }
        }

        self.set_flag(is_erased);
        Ok(Flow::Draw)
    }

    /// Fx0A (LD Vx, K)
    ///
    /// Wait for a key press, store the value of the key in Vx.
    fn exec_wait_key(&mut self, vx: u8) -> Chip8Result<Flow> {
        match self.cpu.first_key() {
            Some(key) => {
                self.set_v(vx, key);
                Ok(Flow::Ok)
            }
            None => {
                // rewind the program counter to stall the machine
                self.cpu.pc -= 2;
                Ok(Flow::KeyWait)
            }
        }
    }

    /// Timer and index register instructions.
    fn exec_misc(&mut self, op: Op) -> Chip8Result<Flow> {
        match op {
            // Fx07 (LD Vx, DT)
            Op::Load_Vx_Delay { vx } => self.set_v(vx, self.cpu.delay_timer),
            // Fx15 (LD DT, Vx)
            Op::Load_Delay_Vx { vx } => self.cpu.delay_timer = self.v(vx),
            // Fx18 (LD ST, Vx)
            Op::Load_Sound_Vx { vx } => {
                self.cpu.sound_timer = self.v(vx);
                return Ok(Flow::Sound);
            }
            // Fx1E (ADD I, Vx)
            //
            // VF flags an index that went past the end of memory.
            // The index is wrapped, not clamped.
            Op::Add_Address_Vx { vx } => {
                let sum = self.cpu.address as usize + self.v(vx) as usize;
                self.cpu.address = (sum & ADDRESS_MASK) as Address;
                self.set_flag(sum >= MEM_SIZE);
            }
            // Fx29 (LD F, Vx)
            //
            // Set I = location of sprite for digit Vx.
            Op::Load_Font { vx } => {
                self.cpu.address = FONTSET_START + self.v(vx) as Address * FONTSET_HEIGHT as Address;
            }
            _ => return Err(Chip8Error::UnknownOpcode(self.cpu.opcode)),
        }

        Ok(Flow::Ok)
    }

    /// Fx33 (LD B, Vx)
    ///
    /// Store the binary-coded decimal representation of Vx
    /// in the memory locations I, I+1, and I+2.
    #[rustfmt::skip]
    fn exec_bcd(&mut self, vx: u8) -> Chip8Result<Flow> {
        self.cpu.check_writable(3)?;

        let x = self.v(vx);
        self.cpu.write_indexed(0, x / 100 % 10);
        self.cpu.write_indexed(1, x / 10  % 10);
        self.cpu.write_indexed(2, x       % 10);

        Ok(Flow::Ok)
    }

    /// Fx55 (LD [I], Vx)
    ///
    /// Store registers V0 through Vx in memory starting at location I.
    fn exec_store(&mut self, vx: u8) -> Chip8Result<Flow> {
        let count = vx as usize + 1;
        self.cpu.check_writable(count)?;

        for i in 0..count {
            let value = self.cpu.registers[i];
            self.cpu.write_indexed(i, value);
        }
        self.advance_index(count);

        Ok(Flow::Ok)
    }

    /// Fx65 (LD Vx, [I])
    ///
    /// Read registers V0 through Vx from memory starting at location I.
    fn exec_load(&mut self, vx: u8) -> Chip8Result<Flow> {
        let count = vx as usize + 1;

        for i in 0..count {
            self.cpu.registers[i] = self.cpu.read_indexed(i);
        }
        self.advance_index(count);

        Ok(Flow::Ok)
    }

    /// Legacy block store and load leave I pointing past the last byte.
    #[inline]
    fn advance_index(&mut self, count: usize) {
        if self.conf.quirks.load_store_increment {
            self.cpu.address = ((self.cpu.address as usize + count) & ADDRESS_MASK) as Address;
        }
    }
}
