use chip8vm::{constants::*, prelude::*};
use rand::rngs::mock::StepRng;

/// Records everything the machine pushes out to the host.
#[derive(Default)]
struct MockDevices {
    pressed: Vec<KeyCode>,
    draws: usize,
    lit: usize,
    buzz: Vec<bool>,
}

impl Devices for MockDevices {
    fn is_pressed(&self, key: KeyCode) -> bool {
        self.pressed.contains(&key)
    }

    fn draw(&mut self, display: Chip8DisplayBuffer<'_>) {
        self.draws += 1;
        self.lit = display.iter().filter(|px| **px).count();
    }

    fn buzz(&mut self, state: bool) {
        self.buzz.push(state);
    }
}

fn vm_with(program: &[u8]) -> Chip8Vm {
    let mut vm = Chip8Vm::with_rng(Chip8Conf::default(), StepRng::new(0, 0));
    vm.load_bytecode(program).unwrap();
    vm
}

#[test]
#[rustfmt::skip]
fn test_frame_draws_once() {
    let mut vm = vm_with(&[
        0x60, 0x00, // LD v0, 0
        0xF0, 0x29, // LD F, v0
        0xD0, 0x05, // DRW v0, v0, 5
        0x61, 0x08, // LD v1, 8
        0xD1, 0x05, // DRW v1, v0, 5
        0x12, 0x0A, // JP 0x20A
    ]);
    let mut devices = MockDevices::default();

    vm.run_frame(&mut devices, 10);
    assert_eq!(devices.draws, 1);
    // Glyph "0" has 14 lit pixels, drawn twice.
    assert_eq!(devices.lit, 28);

    // Spinning on the jump changes nothing on screen.
    vm.run_frame(&mut devices, 10);
    assert_eq!(devices.draws, 1);
}

#[test]
#[rustfmt::skip]
fn test_frame_buzzes_on_edges() {
    let mut vm = vm_with(&[
        0x60, 0x02, // LD v0, 2
        0xF0, 0x18, // LD ST, v0
        0x12, 0x04, // JP 0x204
    ]);
    let mut devices = MockDevices::default();

    vm.run_frame(&mut devices, 3);
    assert_eq!(vm.sound_timer(), 1);
    assert_eq!(devices.buzz, [true]);

    vm.run_frame(&mut devices, 3);
    assert_eq!(vm.sound_timer(), 0);
    assert_eq!(devices.buzz, [true, false]);

    vm.run_frame(&mut devices, 3);
    assert_eq!(devices.buzz, [true, false]);
}

#[test]
#[rustfmt::skip]
fn test_frame_ticks_delay_timer() {
    let mut vm = vm_with(&[
        0x60, 0x05, // LD v0, 5
        0xF0, 0x15, // LD DT, v0
        0xF1, 0x07, // LD v1, DT
        0x31, 0x00, // SE v1, 0
        0x12, 0x04, // JP 0x204
        0x62, 0x01, // LD v2, 1
        0x12, 0x0C, // JP 0x20C
    ]);
    let mut devices = MockDevices::default();

    // Delay timer counts down once per frame.
    for _ in 0..5 {
        vm.run_frame(&mut devices, 10);
        assert_eq!(vm.registers()[2], 0);
    }
    assert_eq!(vm.delay_timer(), 0);

    vm.run_frame(&mut devices, 10);
    assert_eq!(vm.registers()[2], 1);
}

#[test]
#[rustfmt::skip]
fn test_frame_key_wait_yields() {
    let mut vm = vm_with(&[
        0xF3, 0x0A, // LD v3, K
        0x64, 0x01, // LD v4, 1
        0x12, 0x04, // JP 0x204
    ]);
    let mut devices = MockDevices::default();

    vm.run_frame(&mut devices, 10);
    assert_eq!(vm.pc(), MEM_START);

    devices.pressed.push(KeyCode::Key7);
    vm.run_frame(&mut devices, 10);
    assert_eq!(vm.registers()[3], 7);
    assert_eq!(vm.registers()[4], 1);

    // Key state follows the devices every frame.
    devices.pressed.clear();
    vm.run_frame(&mut devices, 1);
    assert_eq!(vm.dump_keys().unwrap(), "");
}

#[test]
fn test_frame_continues_past_errors() {
    #[rustfmt::skip]
    let mut vm = vm_with(&[
        0xFF, 0xFF, // unknown
        0x00, 0xEE, // RET ; underflow
        0x6A, 0x01, // LD vA, 1
        0x12, 0x06, // JP 0x206
    ]);
    let mut devices = MockDevices::default();

    vm.run_frame(&mut devices, 4);
    assert_eq!(vm.registers()[0xA], 1);
    assert_eq!(vm.pc(), 0x206);
}

#[test]
fn test_frame_halts_at_end_of_memory() {
    let mut vm = vm_with(&[0x1F, 0xFE]);
    let mut devices = MockDevices::default();

    // Runs through zeroed memory up to the end, then stops.
    vm.run_frame(&mut devices, 10_000);
    assert_eq!(vm.pc(), MEM_SIZE);
    vm.run_frame(&mut devices, 10);
    assert_eq!(vm.pc(), MEM_SIZE);
}

#[test]
#[rustfmt::skip]
fn test_disassemble_program() {
    let program = [
        0x6A, 0x02, // LD vA, 0x02
        0xF3, 0x33, // LD B, v3
        0xB1, 0x23, // JP v0, 0x123
        0xFF, 0xFF, // unknown
    ];

    let mut buf = String::new();
    Disassembler::new(&program).disassemble(&mut buf).unwrap();
    assert_eq!(buf, "\
0x0200 6A02 LD vA, 0x02
0x0202 F333 LD B, v3
0x0204 B123 JP v0, 0x123
0x0206 FFFF 0xFFFF
");
}
