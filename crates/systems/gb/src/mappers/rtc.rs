//! MBC3 real-time clock
//!
//! Five registers, selected through the MBC3 RAM bank register:
//!
//! - 0x08: seconds (0-59)
//! - 0x09: minutes (0-59)
//! - 0x0A: hours (0-23)
//! - 0x0B: day counter, low 8 bits
//! - 0x0C: bit 0 day counter bit 8, bit 6 halt, bit 7 day carry
//!
//! The clock runs from emulated cycles, not host time. Reads see a latched
//! copy taken by writing 0x00 then 0x01 to 0x6000-0x7FFF. Once the first
//! latch has happened reads never go back to the live registers: re-arming
//! with 0x00 only prepares the next copy.

use serde::{Deserialize, Serialize};

use crate::GbError;

pub const CYCLES_PER_SECOND: u32 = 4_194_304;

pub const REG_SECONDS: u8 = 0x08;
pub const REG_MINUTES: u8 = 0x09;
pub const REG_HOURS: u8 = 0x0A;
pub const REG_DAY_LOW: u8 = 0x0B;
pub const REG_DAY_HIGH: u8 = 0x0C;

const DH_DAY_BIT8: u8 = 0x01;
const DH_HALT: u8 = 0x40;
const DH_CARRY: u8 = 0x80;
const DH_MASK: u8 = DH_DAY_BIT8 | DH_HALT | DH_CARRY;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RtcRegisters {
    pub seconds: u8,
    pub minutes: u8,
    pub hours: u8,
    pub day_low: u8,
    pub day_high: u8,
}

impl RtcRegisters {
    pub fn days(&self) -> u16 {
        ((self.day_high & DH_DAY_BIT8) as u16) << 8 | self.day_low as u16
    }

    fn set_days(&mut self, days: u16) {
        self.day_low = days as u8;
        self.day_high = (self.day_high & !DH_DAY_BIT8) | ((days >> 8) as u8 & DH_DAY_BIT8);
    }

    fn advance_second(&mut self) {
        // Out-of-range values count up to the field mask and wrap to 0
        // without carrying.
        self.seconds = (self.seconds + 1) & 0x3F;
        if self.seconds != 60 {
            return;
        }
        self.seconds = 0;

        self.minutes = (self.minutes + 1) & 0x3F;
        if self.minutes != 60 {
            return;
        }
        self.minutes = 0;

        self.hours = (self.hours + 1) & 0x1F;
        if self.hours != 24 {
            return;
        }
        self.hours = 0;

        let days = self.days() + 1;
        if days > 0x1FF {
            self.set_days(0);
            self.day_high |= DH_CARRY;
        } else {
            self.set_days(days);
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rtc {
    live: RtcRegisters,
    latched: RtcRegisters,
    is_latched: bool,
    latch_armed: bool,
    /// Cycles toward the next second
    sub_second: u32,
}

impl Rtc {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_halted(&self) -> bool {
        self.live.day_high & DH_HALT != 0
    }

    pub fn live(&self) -> &RtcRegisters {
        &self.live
    }

    pub fn tick(&mut self, cycles: u32) {
        if self.is_halted() {
            return;
        }
        self.sub_second += cycles;
        while self.sub_second >= CYCLES_PER_SECOND {
            self.sub_second -= CYCLES_PER_SECOND;
            self.live.advance_second();
        }
    }

    /// Check a clock restored from a snapshot
    pub fn check_registers(&self) -> Result<(), GbError> {
        let live = &self.live;
        let fields = [
            ("rtc.seconds", live.seconds, 0x3F),
            ("rtc.minutes", live.minutes, 0x3F),
            ("rtc.hours", live.hours, 0x1F),
            ("rtc.day_high", live.day_high, DH_MASK),
        ];
        for (field, value, mask) in fields {
            if value & !mask != 0 {
                return Err(GbError::InvalidSnapshot {
                    field,
                    value: value.to_string(),
                });
            }
        }
        if self.sub_second >= CYCLES_PER_SECOND {
            return Err(GbError::InvalidSnapshot {
                field: "rtc.sub_second",
                value: self.sub_second.to_string(),
            });
        }
        Ok(())
    }

    /// Write to the latch control range
    pub fn write_latch(&mut self, val: u8) {
        match val {
            0x00 => self.latch_armed = true,
            0x01 if self.latch_armed => {
                self.latched = self.live;
                self.is_latched = true;
                self.latch_armed = false;
            }
            _ => self.latch_armed = false,
        }
    }

    /// Read a register from the latched copy; 0xFF before the first latch
    pub fn read(&self, reg: u8) -> u8 {
        if !self.is_latched {
            return 0xFF;
        }
        let regs = &self.latched;
        match reg {
            REG_SECONDS => regs.seconds | 0xC0,
            REG_MINUTES => regs.minutes | 0xC0,
            REG_HOURS => regs.hours | 0xE0,
            REG_DAY_LOW => regs.day_low,
            REG_DAY_HIGH => regs.day_high | 0x3E,
            _ => 0xFF,
        }
    }

    /// Write a live register. Only the day-high register (which holds the
    /// halt bit) accepts writes while the clock runs.
    pub fn write(&mut self, reg: u8, val: u8) {
        if reg == REG_DAY_HIGH {
            self.live.day_high = val & DH_MASK;
            return;
        }
        if !self.is_halted() {
            return;
        }
        match reg {
            REG_SECONDS => {
                self.live.seconds = val & 0x3F;
                self.sub_second = 0;
            }
            REG_MINUTES => self.live.minutes = val & 0x3F,
            REG_HOURS => self.live.hours = val & 0x1F,
            REG_DAY_LOW => self.live.day_low = val,
            _ => {}
        }
    }
}
