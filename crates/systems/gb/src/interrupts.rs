//! Interrupt enable (IE, 0xFFFF) and request (IF, 0xFF0F) registers
//!
//! Five lines, lowest bit first. Components request a line here; the CPU
//! reads both registers through the bus and clears the IF bit it services.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interrupt {
    VBlank,
    LcdStat,
    Timer,
    Serial,
    Joypad,
}

impl Interrupt {
    pub fn bit(self) -> u8 {
        1 << self as u8
    }
}

const LINE_MASK: u8 = 0x1F;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Interrupts {
    ie: u8,
    flags: u8,
}

impl Interrupts {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn request(&mut self, interrupt: Interrupt) {
        self.flags |= interrupt.bit();
    }

    pub fn is_requested(&self, interrupt: Interrupt) -> bool {
        self.flags & interrupt.bit() != 0
    }

    /// Lines both requested and enabled; the CPU polls this before every
    /// instruction
    pub fn deliverable(&self) -> u8 {
        self.ie & self.flags & LINE_MASK
    }

    /// IF as seen on the bus; unused bits read as 1
    pub fn read_if(&self) -> u8 {
        self.flags | 0xE0
    }

    pub fn write_if(&mut self, val: u8) {
        self.flags = val & LINE_MASK;
    }

    pub fn read_ie(&self) -> u8 {
        self.ie
    }

    pub fn write_ie(&mut self, val: u8) {
        self.ie = val;
    }
}
