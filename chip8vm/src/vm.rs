//! Virtual machine.
use std::{
    fmt::{self, Write},
    path::Path,
};

use log::{debug, warn};
use rand::{rngs::StdRng, RngCore, SeedableRng};

use crate::{
    bytecode::Instr,
    clock::Hz,
    constants::*,
    cpu::Chip8Cpu,
    devices::{Devices, KeyCode},
    error::{Chip8Error, Chip8Result},
    op::{decode, Op},
    Chip8DisplayBuffer,
};

pub struct Chip8Vm {
    pub(crate) cpu: Chip8Cpu,
    pub(crate) conf: Chip8Conf,
    /// Source of the `Cxnn` random bytes.
    pub(crate) rng: Box<dyn RngCore>,
    /// Size in bytes of the loaded program image.
    program_len: usize,
    /// Last buzzer state reported to the devices.
    buzzer: bool,
}

impl Chip8Vm {
    /// Create a machine with its random source seeded from the configuration,
    /// or from system entropy when no seed is given.
    pub fn new(conf: Chip8Conf) -> Self {
        let rng = match conf.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        Self::with_rng(conf, rng)
    }

    /// Create a machine drawing its random bytes from the given generator.
    pub fn with_rng(conf: Chip8Conf, rng: impl RngCore + 'static) -> Self {
        Chip8Vm {
            cpu: Chip8Cpu::new(),
            conf,
            rng: Box::new(rng),
            program_len: 0,
            buzzer: false,
        }
    }

    /// Configuration that was used to instantiate the VM.
    pub fn config(&self) -> &Chip8Conf {
        &self.conf
    }

    /// Copy a program image into memory, starting at [`MEM_START`].
    ///
    /// Any previous program is erased. Registers, stack and display are
    /// left as they are. On error the machine is not modified.
    pub fn load_bytecode(&mut self, bytecode: &[u8]) -> Chip8Result<()> {
        if bytecode.is_empty() {
            return Err(Chip8Error::EmptyProgram);
        }
        if bytecode.len() > MAX_PROGRAM_SIZE {
            return Err(Chip8Error::LargeProgram);
        }

        // Start with clean memory to avoid leaking previous program.
        self.cpu.ram[MEM_START..].fill(0);
        self.cpu.ram[MEM_START..MEM_START + bytecode.len()].copy_from_slice(bytecode);
        self.program_len = bytecode.len();

        debug!("loaded program of {} bytes", bytecode.len());

        Ok(())
    }

    /// Read a program image from a file and load it.
    pub fn load_rom(&mut self, filepath: impl AsRef<Path>) -> Chip8Result<()> {
        let bytecode = std::fs::read(filepath.as_ref())?;
        self.load_bytecode(&bytecode)
    }

    /// Put the machine back into its power-on state, keeping the loaded program.
    pub fn reset(&mut self) {
        self.cpu.reset();
        self.buzzer = false;
    }

    pub fn display_buffer(&self) -> Chip8DisplayBuffer<'_> {
        &self.cpu.display
    }

    /// Whether the host should be emitting a tone.
    pub fn sound_active(&self) -> bool {
        self.cpu.sound_timer > 0
    }

    pub fn registers(&self) -> &[u8; REGISTER_COUNT] {
        &self.cpu.registers
    }

    pub fn pc(&self) -> usize {
        self.cpu.pc
    }

    /// Value of the index register `I`.
    pub fn index(&self) -> Address {
        self.cpu.address
    }

    pub fn delay_timer(&self) -> u8 {
        self.cpu.delay_timer
    }

    pub fn sound_timer(&self) -> u8 {
        self.cpu.sound_timer
    }

    pub fn stack_pointer(&self) -> usize {
        self.cpu.sp
    }

    /// Instruction word most recently fetched.
    pub fn last_opcode(&self) -> u16 {
        self.cpu.opcode
    }

    pub fn program_len(&self) -> usize {
        self.program_len
    }

    pub fn ram(&self) -> &[u8; MEM_SIZE] {
        &self.cpu.ram
    }
}

/// What the host may need to react to after a step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Flow {
    Ok,
    /// Program counter has jumped to a new address.
    ///
    /// This is useful for the caller to avoid being
    /// blocked on infinite or long running loops.
    ///
    /// This is returned when the interpreter encounters:
    ///
    /// - 1nnn (`JP addr`)
    /// - 2nnn (`CALL addr`)
    /// - 00EE (`RET`)
    /// - Bnnn (`JP V0, addr`)
    Jump,
    /// Display buffer was changed.
    Draw,
    /// Sound timer was set.
    Sound,
    /// Wait for a keypress.
    ///
    /// This is triggered by the opcode `Fx0A` (`LD Vx, K`). The program
    /// counter was rewound, so the same instruction runs again on the next
    /// step until a key is pressed.
    KeyWait,
}

/// VM Configuration Parameters.
#[derive(Debug, Default, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize), serde(default))]
pub struct Chip8Conf {
    /// Instruction clock frequency for hosts that pace the machine.
    pub clock_frequency: Option<Hz>,
    pub quirks: Quirks,
    /// Seed for the random number generator.
    pub seed: Option<u64>,
}

impl Chip8Conf {
    /// Number of steps to run per 60Hz timer frame.
    pub fn steps_per_frame(&self) -> usize {
        let Hz(freq) = self.clock_frequency.unwrap_or(DEFAULT_CLOCK_FREQUENCY);
        ((freq / DELAY_FREQUENCY) as usize).max(1)
    }
}

/// Instruction clock used when none is configured.
pub const DEFAULT_CLOCK_FREQUENCY: Hz = Hz(600);

/// Switches between the legacy and revised interpretation of ambiguous
/// instructions.
///
/// Fixed for the lifetime of a machine.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize), serde(default))]
pub struct Quirks {
    /// `8xy6` and `8xyE` copy `Vy` into `Vx` before shifting.
    pub shift_vy: bool,
    /// `Fx55` and `Fx65` advance `I` by `x + 1`.
    pub load_store_increment: bool,
    /// `Bnnn` offsets by `Vx`, where `x` is the high nibble of `nnn`,
    /// instead of `V0`.
    pub jump_vx: bool,
}

impl Quirks {
    /// Behaviour of the COSMAC VIP interpreter.
    pub fn cosmac() -> Self {
        Self {
            shift_vy: true,
            load_store_increment: true,
            jump_vx: false,
        }
    }

    /// Behaviour of the SUPER-CHIP interpreter.
    pub fn super_chip() -> Self {
        Self {
            shift_vy: false,
            load_store_increment: false,
            jump_vx: true,
        }
    }
}

/// Interpreter
impl Chip8Vm {
    /// Sets the keyboard key input state.
    pub fn set_key(&mut self, key: KeyCode, pressed: bool) {
        self.cpu.set_key_state(key.as_u8(), pressed);
    }

    /// Clear the keyboard input state, setting all keys to up.
    pub fn clear_keys(&mut self) {
        self.cpu.clear_keys()
    }

    /// Execute a single instruction.
    ///
    /// Errors are local to the step. The instruction that caused one was
    /// skipped, and the machine can keep running.
    pub fn step(&mut self) -> Chip8Result<Flow> {
        let instr = self.cpu.fetch()?;
        let op = decode(instr);

        op_trace(self.cpu.pc - 2, instr, &op);

        self.execute(op)
    }

    /// Count down the delay and sound timers.
    ///
    /// Must be called at 60Hz by the host, independent of the instruction clock.
    pub fn tick_timers(&mut self) {
        self.cpu.tick_timers();
    }

    /// Execute up to `step_count` instructions.
    ///
    /// Returns early on the first error, or when the machine starts waiting
    /// for a key.
    pub fn run_steps(&mut self, step_count: usize) -> Chip8Result<Flow> {
        for _ in 0..step_count {
            if let Flow::KeyWait = self.step()? {
                return Ok(Flow::KeyWait);
            }
        }

        Ok(Flow::Ok)
    }

    /// Run one 60Hz frame against the host devices.
    ///
    /// Key state is refreshed from the devices, up to `step_count` steps are
    /// executed and the timers are counted down once. The display is pushed
    /// to the devices when it changed, and the buzzer is toggled when the
    /// sound timer starts or stops.
    ///
    /// Step errors are logged and do not end the frame, except for a program
    /// counter that ran off the end of memory.
    pub fn run_frame(&mut self, devices: &mut impl Devices, step_count: usize) {
        for key in KeyCode::all() {
            self.cpu.set_key_state(key.as_u8(), devices.is_pressed(key));
        }

        let mut redraw = false;

        for _ in 0..step_count {
            match self.step() {
                Ok(Flow::Draw) => redraw = true,
                Ok(Flow::KeyWait) => break,
                Ok(_) => {}
                Err(err @ Chip8Error::PcOutOfBounds(_)) => {
                    warn!("{err}");
                    break;
                }
                Err(err) => warn!("{:04X}: {err}", self.cpu.pc - 2),
            }
        }

        self.tick_timers();

        if redraw {
            devices.draw(self.display_buffer());
        }

        let sound = self.sound_active();
        if sound != self.buzzer {
            self.buzzer = sound;
            devices.buzz(sound);
        }
    }
}

/// Troubleshooting
#[doc(hidden)]
impl Chip8Vm {
    /// Returns the contents of the memory as a human readable string.
    pub fn dump_ram(&self, count: usize) -> Result<String, fmt::Error> {
        let iter = self
            .cpu
            .ram
            .iter()
            .enumerate()
            .skip(MEM_START)
            .take(count)
            .step_by(2);
        let mut buf = String::new();

        for (i, op) in iter {
            let next = self.cpu.ram.get(i + 1).copied().unwrap_or_default();
            writeln!(buf, "{:04X}: {:02X}{:02X}", i, op, next)?;
        }

        Ok(buf)
    }

    pub fn dump_display(&self) -> Result<String, fmt::Error> {
        let mut buf = String::new();

        for y in 0..DISPLAY_HEIGHT {
            for x in 0..DISPLAY_WIDTH {
                if self.cpu.display[x + y * DISPLAY_WIDTH] {
                    write!(buf, "#")?;
                } else {
                    write!(buf, ".")?;
                }
            }
            writeln!(buf)?;
        }

        Ok(buf)
    }

    pub fn dump_keys(&self) -> Result<String, fmt::Error> {
        let mut buf = String::new();

        if self.cpu.any_key() {
            write!(buf, "keys: ")?;
            for i in 0..KEY_COUNT {
                if self.cpu.key_state(i) {
                    write!(buf, "k{i:x}")?;
                }
            }
        }

        Ok(buf)
    }
}

#[cfg(feature = "op_trace")]
#[inline]
fn op_trace(pc: usize, instr: Instr, op: &Op) {
    log::trace!("{pc:04X}: {instr} {op}");
}

#[cfg(not(feature = "op_trace"))]
#[inline]
fn op_trace(_: usize, _: Instr, _: &Op) {}

#[cfg(test)]
mod test {
    use rand::rngs::mock::StepRng;

    use super::*;

    fn vm_with(program: &[u8]) -> Chip8Vm {
        let mut vm = Chip8Vm::with_rng(Chip8Conf::default(), StepRng::new(0, 1));
        vm.load_bytecode(program).unwrap();
        vm
    }

    /// Fx0A (LD Vx, K)
    ///
    /// Wait for a keypress, then store the key value in Vx.
    /// The VM must stall while waiting, and signal the state to the outer executer.
    #[test]
    #[rustfmt::skip]
    fn test_key_wait() {
        let mut vm = vm_with(&[
            0xF1, 0x0A, // LD v1, K
            0x62, 0x42  // LD v2, 0x42  ; sentinal
        ]);

        // machine must stall
        for _ in 0..6 {
            assert_eq!(vm.step().unwrap(), Flow::KeyWait);
            assert_eq!(vm.cpu.pc, MEM_START);
        }

        // machine has yielded, waiting for any key to be pressed.
        vm.set_key(KeyCode::Key5, true);

        // machine will now advance
        assert_eq!(vm.step().unwrap(), Flow::Ok);
        assert_eq!(vm.cpu.pc, MEM_START + 2);
        assert_eq!(vm.cpu.registers[1], 0x05);

        // Ensure the machine is continuing
        vm.step().unwrap();
        assert_eq!(vm.cpu.pc, MEM_START + 4);
        assert_eq!(vm.cpu.registers[2], 0x42); // sentinal
    }

    /// Booleans must be cast to u8 1 or 0
    #[test]
    fn test_assert_bool_cast() {
        assert_eq!(true as u8, 1);
        assert_eq!(false as u8, 0);
    }

    #[test]
    fn test_load_errors_leave_machine_untouched() {
        let mut vm = vm_with(&[0x12, 0x00]);

        assert!(matches!(vm.load_bytecode(&[]), Err(Chip8Error::EmptyProgram)));
        let large = vec![0xAA; MAX_PROGRAM_SIZE + 1];
        assert!(matches!(vm.load_bytecode(&large), Err(Chip8Error::LargeProgram)));
        assert!(matches!(
            vm.load_rom("this/file/does/not/exist.ch8"),
            Err(Chip8Error::Io(_))
        ));

        assert_eq!(vm.program_len(), 2);
        assert_eq!(&vm.ram()[MEM_START..MEM_START + 3], &[0x12, 0x00, 0x00]);
    }

    #[test]
    fn test_load_largest_program() {
        let mut vm = vm_with(&[0x00, 0xE0]);
        let program = vec![0xAA; MAX_PROGRAM_SIZE];
        vm.load_bytecode(&program).unwrap();
        assert_eq!(vm.ram()[MEM_SIZE - 1], 0xAA);
        assert_eq!(&vm.ram()[..FONTSET_DATA_LENGTH], &FONTSET[..]);
    }

    #[test]
    fn test_reload_resets_nothing_else() {
        let mut vm = vm_with(&[0x6A, 0x42, 0x6B, 0x43]);
        vm.run_steps(2).unwrap();

        vm.load_bytecode(&[0x00, 0xE0]).unwrap();
        assert_eq!(vm.pc(), MEM_START + 4);
        assert_eq!(vm.registers()[0xA], 0x42);
        // Remainder of the previous program is erased.
        assert_eq!(&vm.ram()[MEM_START..MEM_START + 4], &[0x00, 0xE0, 0x00, 0x00]);

        vm.reset();
        assert_eq!(vm.pc(), MEM_START);
        assert_eq!(vm.registers()[0xA], 0);
        assert_eq!(vm.program_len(), 2);
    }

    #[test]
    fn test_run_steps_stops_at_error() {
        #[rustfmt::skip]
        let mut vm = vm_with(&[
            0x60, 0x01, // LD v0, 1
            0x00, 0xEE, // RET    ; underflow
            0x60, 0x02, // LD v0, 2
        ]);

        assert!(matches!(vm.run_steps(10), Err(Chip8Error::StackUnderflow)));
        assert_eq!(vm.pc(), MEM_START + 4);
        assert_eq!(vm.registers()[0], 1);

        // Execution can carry on after the error.
        vm.step().unwrap();
        assert_eq!(vm.registers()[0], 2);
    }

    #[test]
    fn test_steps_per_frame() {
        assert_eq!(Chip8Conf::default().steps_per_frame(), 10);

        let conf = Chip8Conf {
            clock_frequency: Some(Hz(1)),
            ..Default::default()
        };
        assert_eq!(conf.steps_per_frame(), 1);
    }

    #[test]
    fn test_seeded_rng_is_repeatable() {
        let program = [0xC0, 0xFF, 0xC1, 0xFF, 0xC2, 0xFF];
        let conf = Chip8Conf {
            seed: Some(1234),
            ..Default::default()
        };

        let mut a = Chip8Vm::new(conf.clone());
        let mut b = Chip8Vm::new(conf);
        a.load_bytecode(&program).unwrap();
        b.load_bytecode(&program).unwrap();
        a.run_steps(3).unwrap();
        b.run_steps(3).unwrap();

        assert_eq!(a.registers(), b.registers());
    }

    #[test]
    fn test_dump_display() {
        let mut vm = vm_with(&[0x00, 0xE0]);
        vm.cpu.display[1] = true;

        let dump = vm.dump_display().unwrap();
        let first = dump.lines().next().unwrap();
        assert_eq!(first.len(), DISPLAY_WIDTH);
        assert!(first.starts_with(".#.."));
        assert_eq!(dump.lines().count(), DISPLAY_HEIGHT);
    }

    #[test]
    fn test_dump_ram_and_keys() {
        let mut vm = vm_with(&[0x12, 0x34, 0xAB, 0xCD]);
        assert_eq!(vm.dump_ram(4).unwrap(), "0200: 1234\n0202: ABCD\n");

        assert_eq!(vm.dump_keys().unwrap(), "");
        vm.set_key(KeyCode::KeyA, true);
        assert_eq!(vm.dump_keys().unwrap(), "keys: ka");
    }
}
