//! Divider and programmable timer
//!
//! # Registers
//!
//! - `$FF04 (DIV)`: upper byte of a free-running 16-bit counter; any write clears it
//! - `$FF05 (TIMA)`: counter, incremented at the TAC rate
//! - `$FF06 (TMA)`: loaded into TIMA when it overflows
//! - `$FF07 (TAC)`: bit 2 enables TIMA, bits 1-0 pick the period
//!   - 00: every 1024 cycles
//!   - 01: every 16 cycles
//!   - 10: every 64 cycles
//!   - 11: every 256 cycles
//!
//! TIMA runs from its own sub-counter rather than from divider edges, so a
//! change of clock select restarts the sub-counter instead of producing an
//! early increment.

use serde::{Deserialize, Serialize};

use crate::interrupts::{Interrupt, Interrupts};
use crate::GbError;

const TAC_ENABLE: u8 = 0x04;
const TAC_CLOCK_MASK: u8 = 0x03;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Timer {
    /// DIV is the upper byte
    counter: u16,
    tima: u8,
    tma: u8,
    tac: u8,
    /// Cycles accumulated toward the next TIMA increment
    sub_counter: u32,
}

impl Timer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Seed DIV without going through the reset-on-write path
    pub fn set_div(&mut self, val: u8) {
        self.counter = (val as u16) << 8;
    }

    pub fn div(&self) -> u8 {
        (self.counter >> 8) as u8
    }

    fn period(&self) -> u32 {
        match self.tac & TAC_CLOCK_MASK {
            0 => 1024,
            1 => 16,
            2 => 64,
            _ => 256,
        }
    }

    pub fn read_register(&self, addr: u16) -> u8 {
        match addr {
            0xFF04 => self.div(),
            0xFF05 => self.tima,
            0xFF06 => self.tma,
            0xFF07 => self.tac | 0xF8,
            _ => 0xFF,
        }
    }

    pub fn write_register(&mut self, addr: u16, val: u8) {
        match addr {
            0xFF04 => {
                self.counter = 0;
                self.sub_counter = 0;
            }
            0xFF05 => self.tima = val,
            0xFF06 => self.tma = val,
            0xFF07 => {
                let val = val & 0x07;
                if (val ^ self.tac) & TAC_CLOCK_MASK != 0 {
                    self.sub_counter = 0;
                }
                self.tac = val;
            }
            _ => {}
        }
    }

    /// Check counters restored from a snapshot
    pub fn check_counters(&self) -> Result<(), GbError> {
        if self.tac & !0x07 != 0 {
            return Err(GbError::InvalidSnapshot {
                field: "timer.tac",
                value: self.tac.to_string(),
            });
        }
        if self.sub_counter >= self.period() {
            return Err(GbError::InvalidSnapshot {
                field: "timer.sub_counter",
                value: self.sub_counter.to_string(),
            });
        }
        Ok(())
    }

    /// Advance by `cycles`, requesting the timer interrupt on TIMA overflow
    pub fn tick(&mut self, cycles: u32, interrupts: &mut Interrupts) {
        self.counter = self.counter.wrapping_add(cycles as u16);

        if self.tac & TAC_ENABLE == 0 {
            return;
        }

        let period = self.period();
        self.sub_counter += cycles;
        while self.sub_counter >= period {
            self.sub_counter -= period;
            let (next, overflow) = self.tima.overflowing_add(1);
            self.tima = if overflow { self.tma } else { next };
            if overflow {
                interrupts.request(Interrupt::Timer);
            }
        }
    }
}
