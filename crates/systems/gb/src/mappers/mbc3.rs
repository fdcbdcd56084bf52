//! MBC3
//!
//! Up to 2 MiB ROM, 32 KiB RAM and, on timer variants, a real-time clock.
//!
//! # Register Map
//!
//! - 0x0000-0x1FFF: RAM and clock enable (low nibble 0xA enables)
//! - 0x2000-0x3FFF: ROM bank, 7 bits, 0 reads as 1
//! - 0x4000-0x5FFF: RAM bank (0x00-0x03) or clock register (0x08-0x0C)
//! - 0x6000-0x7FFF: clock latch (0x00 then 0x01)

use super::rtc::{Rtc, REG_DAY_HIGH, REG_SECONDS};
use super::{BankController, BankState};

#[derive(Debug, Clone, Default)]
pub struct Mbc3 {
    /// Last value written to 0x4000-0x5FFF
    select: u8,
    rtc: Option<Rtc>,
}

impl Mbc3 {
    pub fn new(with_rtc: bool) -> Self {
        Self {
            select: 0,
            rtc: with_rtc.then(Rtc::new),
        }
    }

    pub fn rtc(&self) -> Option<&Rtc> {
        self.rtc.as_ref()
    }

    pub fn rtc_mut(&mut self) -> Option<&mut Rtc> {
        self.rtc.as_mut()
    }

    /// Clock register selected for the A000-BFFF window, if any
    fn rtc_register(&self) -> Option<u8> {
        match self.select {
            REG_SECONDS..=REG_DAY_HIGH if self.rtc.is_some() => Some(self.select),
            _ => None,
        }
    }
}

impl BankController for Mbc3 {
    fn get(&self, state: &BankState, addr: u16) -> u8 {
        match addr {
            0x0000..=0x3FFF => state.read_rom(0, addr),
            0x4000..=0x7FFF => state.read_rom(state.rom_bank, addr),
            0xA000..=0xBFFF if state.ram_enabled => {
                if let (Some(reg), Some(rtc)) = (self.rtc_register(), &self.rtc) {
                    rtc.read(reg)
                } else if self.select <= 0x03 {
                    state.read_ram(addr)
                } else {
                    0xFF
                }
            }
            _ => 0xFF,
        }
    }

    fn set(&mut self, state: &mut BankState, addr: u16, val: u8) {
        match addr {
            0x0000..=0x1FFF => state.ram_enabled = val & 0x0F == 0x0A,
            0x2000..=0x3FFF => {
                state.rom_bank = match val & 0x7F {
                    0 => 1,
                    bank => bank as usize,
                };
            }
            0x4000..=0x5FFF => {
                self.select = val;
                if val <= 0x03 {
                    state.ram_bank = val as usize;
                }
            }
            0x6000..=0x7FFF => {
                if let Some(rtc) = self.rtc.as_mut() {
                    rtc.write_latch(val);
                }
            }
            0xA000..=0xBFFF if state.ram_enabled => {
                if let Some(reg) = self.rtc_register() {
                    if let Some(rtc) = self.rtc.as_mut() {
                        rtc.write(reg, val);
                    }
                } else if self.select <= 0x03 {
                    state.write_ram(addr, val);
                }
            }
            _ => {}
        }
    }

    fn tick(&mut self, cycles: u32) {
        if let Some(rtc) = self.rtc.as_mut() {
            rtc.tick(cycles);
        }
    }

    fn reset(&mut self) {
        self.select = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::super::rtc::{CYCLES_PER_SECOND, REG_MINUTES};
    use super::super::test_rom::build;
    use super::*;

    fn setup(with_rtc: bool, ram_banks: usize) -> (Mbc3, BankState) {
        let rom = build(0x10, 0x05, 0x00); // 64 banks
        (Mbc3::new(with_rtc), BankState::new(rom, 64, ram_banks))
    }

    #[test]
    fn test_mbc3_rom_banking() {
        let (mut mbc, mut state) = setup(false, 0);
        assert_eq!(mbc.get(&state, 0x0000), 0);
        assert_eq!(mbc.get(&state, 0x4000), 1);

        mbc.set(&mut state, 0x2000, 5);
        assert_eq!(mbc.get(&state, 0x4000), 5);

        mbc.set(&mut state, 0x2000, 63);
        assert_eq!(mbc.get(&state, 0x4000), 63);

        mbc.set(&mut state, 0x2000, 0);
        assert_eq!(mbc.get(&state, 0x4000), 1);

        // Seven bits, wrapped to 64 banks: 0x7F is bank 63
        mbc.set(&mut state, 0x2000, 0xFF);
        assert_eq!(mbc.get(&state, 0x4000), 63);
    }

    #[test]
    fn test_mbc3_ram_banking() {
        let (mut mbc, mut state) = setup(false, 4);
        mbc.set(&mut state, 0x0000, 0x0A);

        for bank in 0..4u8 {
            mbc.set(&mut state, 0x4000, bank);
            mbc.set(&mut state, 0xA000, bank + 0x20);
        }
        for bank in 0..4u8 {
            mbc.set(&mut state, 0x4000, bank);
            assert_eq!(mbc.get(&state, 0xA000), bank + 0x20);
        }

        mbc.set(&mut state, 0x0000, 0x00);
        assert_eq!(mbc.get(&state, 0xA000), 0xFF);
    }

    #[test]
    fn test_mbc3_rtc_select_without_clock() {
        let (mut mbc, mut state) = setup(false, 1);
        mbc.set(&mut state, 0x0000, 0x0A);
        mbc.set(&mut state, 0xA000, 0x11);

        mbc.set(&mut state, 0x4000, 0x08);
        assert_eq!(mbc.get(&state, 0xA000), 0xFF);
        mbc.set(&mut state, 0xA000, 0x22);

        mbc.set(&mut state, 0x4000, 0x00);
        assert_eq!(mbc.get(&state, 0xA000), 0x11);
    }

    #[test]
    fn test_mbc3_rtc_registers() {
        let (mut mbc, mut state) = setup(true, 1);
        mbc.set(&mut state, 0x0000, 0x0A);

        // Halt, then set minutes
        mbc.set(&mut state, 0x4000, REG_DAY_HIGH);
        mbc.set(&mut state, 0xA000, 0x40);
        mbc.set(&mut state, 0x4000, REG_MINUTES);
        mbc.set(&mut state, 0xA000, 0x1F);

        mbc.set(&mut state, 0x6000, 0x00);
        mbc.set(&mut state, 0x6000, 0x01);
        assert_eq!(mbc.get(&state, 0xA000), 0x1F | 0xC0);

        // RAM bank 0 is still reachable
        mbc.set(&mut state, 0x4000, 0x00);
        mbc.set(&mut state, 0xA000, 0x77);
        assert_eq!(mbc.get(&state, 0xA000), 0x77);
    }

    #[test]
    fn test_mbc3_clock_ticks() {
        let (mut mbc, mut state) = setup(true, 0);
        mbc.set(&mut state, 0x0000, 0x0A);
        mbc.tick(CYCLES_PER_SECOND * 2);

        mbc.set(&mut state, 0x4000, REG_SECONDS);
        mbc.set(&mut state, 0x6000, 0x00);
        mbc.set(&mut state, 0x6000, 0x01);
        assert_eq!(mbc.get(&state, 0xA000) & 0x3F, 2);
    }

    #[test]
    fn test_mbc3_no_ram() {
        let (mut mbc, mut state) = setup(false, 0);
        mbc.set(&mut state, 0x0000, 0x0A);
        mbc.set(&mut state, 0xA000, 0x42);
        assert_eq!(mbc.get(&state, 0xA000), 0xFF);
    }
}
