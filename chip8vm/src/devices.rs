//! IO device interface
use crate::{constants::*, Chip8DisplayBuffer};

/// Hooks to provide IO devices to the virtual machine.
///
/// The machine never calls these from inside an instruction. The frame
/// driver polls and notifies them between steps.
pub trait Devices {
    /// Checks immediately whether the given key is currently pressed.
    fn is_pressed(&self, key: KeyCode) -> bool;

    /// Blit the display buffer to screen output.
    fn draw(&mut self, display: Chip8DisplayBuffer<'_>);

    /// Turn the sound buzzer on or off.
    fn buzz(&mut self, state: bool);
}

/// Keys of the COSMAC VIP hexadecimal keypad.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize), serde(try_from = "u8"))]
#[repr(u8)]
pub enum KeyCode {
    Key0 = 0,
    Key1,
    Key2,
    Key3,
    Key4,
    Key5,
    Key6,
    Key7,
    Key8,
    Key9,
    KeyA,
    KeyB,
    KeyC,
    KeyD,
    KeyE,
    KeyF = 0xF,
}

impl KeyCode {
    #[inline(always)]
    pub fn as_u8(&self) -> u8 {
        *self as u8
    }

    /// All keys in keypad order.
    pub fn all() -> impl Iterator<Item = KeyCode> {
        (0..KEY_COUNT).filter_map(|key_id| KeyCode::try_from(key_id).ok())
    }
}

impl std::fmt::Display for KeyCode {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        let key_id = self.as_u8();
        write!(f, "k{key_id:x}")
    }
}

impl From<KeyCode> for u8 {
    fn from(keycode: KeyCode) -> Self {
        keycode.as_u8()
    }
}

impl TryFrom<u8> for KeyCode {
    type Error = InvalidKeyCode;

    fn try_from(key_id: u8) -> Result<Self, Self::Error> {
        match key_id {
            0 => Ok(Self::Key0),
            1 => Ok(Self::Key1),
            2 => Ok(Self::Key2),
            3 => Ok(Self::Key3),
            4 => Ok(Self::Key4),
            5 => Ok(Self::Key5),
            6 => Ok(Self::Key6),
            7 => Ok(Self::Key7),
            8 => Ok(Self::Key8),
            9 => Ok(Self::Key9),
            10 => Ok(Self::KeyA),
            11 => Ok(Self::KeyB),
            12 => Ok(Self::KeyC),
            13 => Ok(Self::KeyD),
            14 => Ok(Self::KeyE),
            15 => Ok(Self::KeyF),
            _ => Err(InvalidKeyCode),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvalidKeyCode;

impl std::error::Error for InvalidKeyCode {}

impl std::fmt::Display for InvalidKeyCode {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "keycode must be in range 0 <= keycode < 16")
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_keycode_conversion() {
        assert_eq!(KeyCode::try_from(0xA), Ok(KeyCode::KeyA));
        assert_eq!(KeyCode::try_from(16), Err(InvalidKeyCode));
        assert_eq!(u8::from(KeyCode::KeyF), 15);
        assert_eq!(KeyCode::Key5.to_string(), "k5");
        assert_eq!(KeyCode::all().count(), KEY_COUNT as usize);
    }
}
