//! Joypad register P1 (0xFF00)
//!
//! Eight keys sit on a 2x4 matrix. Bits 4 and 5 of P1 select which row is
//! driven low (P14 directional, P15 buttons); the low nibble reads back the
//! selected row, active low.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Key {
    Right,
    Left,
    Up,
    Down,
    A,
    B,
    Select,
    Start,
}

impl Key {
    /// Bit within its row (P10-P13)
    fn bit(self) -> u8 {
        match self {
            Key::Right | Key::A => 0x01,
            Key::Left | Key::B => 0x02,
            Key::Up | Key::Select => 0x04,
            Key::Down | Key::Start => 0x08,
        }
    }

    fn is_directional(self) -> bool {
        matches!(self, Key::Right | Key::Left | Key::Up | Key::Down)
    }
}

const SELECT_DIRECTIONAL: u8 = 0x10;
const SELECT_STANDARD: u8 = 0x20;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Joypad {
    directional: u8,
    standard: u8,
    select: u8,
}

impl Default for Joypad {
    fn default() -> Self {
        Self::new()
    }
}

impl Joypad {
    pub fn new() -> Self {
        Self {
            directional: 0x0F,
            standard: 0x0F,
            select: SELECT_DIRECTIONAL | SELECT_STANDARD,
        }
    }

    /// Apply a press or release. Returns true when a released key became
    /// pressed, which is when the joypad interrupt fires.
    pub fn key_event(&mut self, key: Key, pressed: bool) -> bool {
        let row = if key.is_directional() {
            &mut self.directional
        } else {
            &mut self.standard
        };
        let was_released = *row & key.bit() != 0;
        if pressed {
            *row &= !key.bit();
        } else {
            *row |= key.bit();
        }
        pressed && was_released
    }

    pub fn write(&mut self, val: u8) {
        self.select = val & (SELECT_DIRECTIONAL | SELECT_STANDARD);
    }

    pub fn read(&self) -> u8 {
        let mut val = self.select | 0xCF;
        if self.select & SELECT_DIRECTIONAL == 0 {
            val &= 0xF0 | self.directional;
        }
        if self.select & SELECT_STANDARD == 0 {
            val &= 0xF0 | self.standard;
        }
        val
    }
}
