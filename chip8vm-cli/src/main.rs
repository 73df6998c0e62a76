//! Entrypoint for CLI
use std::{env, error::Error, fs, time::Instant};

use chip8vm::{prelude::*, Clock, IMPL_VERSION};
use log::info;

use crate::{config::RunConfig, headless::Headless};

mod config;
mod headless;

static USAGE: &str = r#"
usage: chip8vm CMD FILE [CONFIG]

commands:
    run     Run the target ROM file without a window, then print the display
    dis     Disassemble the target ROM into readable assembly

examples:
    chip8vm run breakout.rom
    chip8vm run breakout.rom breakout.yaml
    chip8vm dis breakout.rom
"#;

fn run_bytecode(filepath: &str, config_path: Option<&str>) -> Result<(), Box<dyn Error>> {
    let config = match config_path {
        Some(path) => RunConfig::from_file(path)?,
        None => RunConfig::default(),
    };
    let steps_per_frame = config.vm.steps_per_frame();

    let mut vm = Chip8Vm::new(config.vm);
    vm.load_rom(filepath)?;
    info!(
        "running {filepath}, {} bytes, {} frames at {steps_per_frame} steps per frame",
        vm.program_len(),
        config.frames
    );

    let mut devices = Headless::new(config.keys);
    let mut clock = Clock::timer();

    let start = Instant::now();
    for _ in 0..config.frames {
        vm.run_frame(&mut devices, steps_per_frame);
        clock.wait();
    }
    let end = Instant::now();

    info!(
        "time taken: {}ms, {} draws, {} buzzes",
        end.duration_since(start).as_nanos() as f64 / 1000000.0,
        devices.draw_count,
        devices.buzz_count,
    );
    println!("{}", vm.dump_display()?);

    Ok(())
}

fn run_disassembler(filepath: &str) -> Result<(), Box<dyn Error>> {
    let bytecode = fs::read(filepath)?;

    let mut buf = String::new();
    Disassembler::new(&bytecode).disassemble(&mut buf)?;
    print!("{buf}");

    Ok(())
}

fn main() -> Result<(), Box<dyn Error>> {
    simple_logger::SimpleLogger::new().env().init()?;

    match parse_args() {
        Some(Cmd::Run { filepath, config }) => run_bytecode(&filepath, config.as_deref())?,
        Some(Cmd::Dis { filepath }) => run_disassembler(&filepath)?,
        None => {
            print_usage();
            // FreeBSD EX_USAGE (64)
            std::process::exit(64)
        }
    }

    Ok(())
}

fn parse_args() -> Option<Cmd> {
    let mut args = env::args().skip(1);
    let cmd = args.next()?;

    match cmd.as_str() {
        "run" => Some(Cmd::Run {
            filepath: args.next()?,
            config: args.next(),
        }),
        "dis" => Some(Cmd::Dis {
            filepath: args.next()?,
        }),
        _ => None,
    }
}

fn print_usage() {
    println!("Chip8 VM v{IMPL_VERSION}");
    println!("{USAGE}");
}

enum Cmd {
    /// Run file headless
    Run {
        filepath: String,
        config: Option<String>,
    },
    /// Disassemble
    Dis { filepath: String },
}
