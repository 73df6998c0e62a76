//! Devices for running without a window.
use chip8vm::prelude::*;
use log::{debug, info};

/// Keeps a fixed set of keys held down, and counts what the machine
/// sends to the screen and speaker.
#[derive(Debug, Default)]
pub struct Headless {
    keys: Vec<KeyCode>,
    pub draw_count: usize,
    pub buzz_count: usize,
}

impl Headless {
    pub fn new(keys: Vec<KeyCode>) -> Self {
        Self {
            keys,
            ..Default::default()
        }
    }
}

impl Devices for Headless {
    fn is_pressed(&self, key: KeyCode) -> bool {
        self.keys.contains(&key)
    }

    fn draw(&mut self, display: Chip8DisplayBuffer<'_>) {
        self.draw_count += 1;
        debug!(
            "draw #{}: {} pixels lit",
            self.draw_count,
            display.iter().filter(|px| **px).count()
        );
    }

    fn buzz(&mut self, state: bool) {
        if state {
            self.buzz_count += 1;
            info!("buzzer on");
        } else {
            info!("buzzer off");
        }
    }
}
