//! MBC1
//!
//! Up to 2 MiB ROM and 32 KiB RAM.
//!
//! # Register Map
//!
//! - 0x0000-0x1FFF: RAM enable (low nibble 0xA enables)
//! - 0x2000-0x3FFF: primary ROM bank, 5 bits, 0 reads as 1
//! - 0x4000-0x5FFF: secondary 2-bit select, ROM bank bits 5-6 or RAM bank
//! - 0x6000-0x7FFF: banking mode
//!
//! The secondary select always contributes to the bank at 0x4000-0x7FFF.
//! Mode 1 additionally applies it to the bank at 0x0000-0x3FFF and to the
//! RAM bank; in mode 0 both of those stay at bank 0.

use super::{BankController, BankState};

#[derive(Debug, Clone, Default)]
pub struct Mbc1 {
    primary: u8,
    secondary: u8,
    mode: u8,
}

impl Mbc1 {
    pub fn new() -> Self {
        Self::default()
    }

    fn apply(&self, state: &mut BankState) {
        let primary = match self.primary & 0x1F {
            0 => 1,
            bank => bank as usize,
        };
        let upper = (self.secondary as usize) << 5;

        state.rom_bank = upper | primary;
        if self.mode == 1 {
            state.lower_rom_bank = upper;
            state.ram_bank = self.secondary as usize;
        } else {
            state.lower_rom_bank = 0;
            state.ram_bank = 0;
        }
    }
}

impl BankController for Mbc1 {
    fn set(&mut self, state: &mut BankState, addr: u16, val: u8) {
        match addr {
            0x0000..=0x1FFF => state.ram_enabled = val & 0x0F == 0x0A,
            0x2000..=0x3FFF => {
                self.primary = val & 0x1F;
                self.apply(state);
            }
            0x4000..=0x5FFF => {
                self.secondary = val & 0x03;
                self.apply(state);
            }
            0x6000..=0x7FFF => {
                self.mode = val & 0x01;
                self.apply(state);
            }
            0xA000..=0xBFFF => state.write_ram(addr, val),
            _ => {}
        }
    }

    fn reset(&mut self) {
        *self = Self::default();
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_rom::build;
    use super::*;

    fn setup(rom_code: u8, ram_banks: usize) -> (Mbc1, BankState) {
        let rom = build(0x03, rom_code, 0x00);
        let banks = 2 << rom_code;
        (Mbc1::new(), BankState::new(rom, banks, ram_banks))
    }

    #[test]
    fn test_mbc1_default_banks() {
        let (mbc, state) = setup(0x04, 0);
        assert_eq!(mbc.get(&state, 0x0000), 0);
        assert_eq!(mbc.get(&state, 0x4000), 1);
    }

    #[test]
    fn test_mbc1_rom_banking() {
        let (mut mbc, mut state) = setup(0x04, 0); // 32 banks

        mbc.set(&mut state, 0x2000, 5);
        assert_eq!(mbc.get(&state, 0x4000), 5);

        // Bank 0 is not selectable at 0x4000
        mbc.set(&mut state, 0x2000, 0);
        assert_eq!(mbc.get(&state, 0x4000), 1);

        // Only five bits are kept; 0x20 is bank 0 again
        mbc.set(&mut state, 0x2000, 0x20);
        assert_eq!(mbc.get(&state, 0x4000), 1);

        mbc.set(&mut state, 0x2000, 0x1F);
        assert_eq!(mbc.get(&state, 0x4000), 31);
    }

    #[test]
    fn test_mbc1_upper_rom_bits() {
        let (mut mbc, mut state) = setup(0x06, 0); // 128 banks

        mbc.set(&mut state, 0x2000, 1);
        for (secondary, expected) in [(1, 33), (2, 65), (3, 97)] {
            mbc.set(&mut state, 0x4000, secondary);
            assert_eq!(mbc.get(&state, 0x4000), expected);
        }
    }

    #[test]
    fn test_mbc1_mode_moves_lower_bank() {
        let (mut mbc, mut state) = setup(0x06, 0);

        mbc.set(&mut state, 0x4000, 1);
        assert_eq!(mbc.get(&state, 0x0000), 0);

        mbc.set(&mut state, 0x6000, 1);
        assert_eq!(mbc.get(&state, 0x0000), 32);

        mbc.set(&mut state, 0x4000, 2);
        assert_eq!(mbc.get(&state, 0x0000), 64);

        mbc.set(&mut state, 0x6000, 0);
        assert_eq!(mbc.get(&state, 0x0000), 0);
    }

    #[test]
    fn test_mbc1_bank_wrapping() {
        let (mut mbc, mut state) = setup(0x02, 0); // 8 banks

        mbc.set(&mut state, 0x2000, 9);
        assert_eq!(mbc.get(&state, 0x4000), 1);

        // Secondary bits push past the physical count and wrap too
        mbc.set(&mut state, 0x2000, 3);
        mbc.set(&mut state, 0x4000, 1);
        assert_eq!(mbc.get(&state, 0x4000), 3);
    }

    #[test]
    fn test_mbc1_ram_enable() {
        let (mut mbc, mut state) = setup(0x00, 1);

        // Disabled RAM reads 0xFF and ignores writes
        mbc.set(&mut state, 0xA000, 0x42);
        assert_eq!(mbc.get(&state, 0xA000), 0xFF);

        mbc.set(&mut state, 0x0000, 0x0A);
        mbc.set(&mut state, 0xA000, 0x42);
        assert_eq!(mbc.get(&state, 0xA000), 0x42);

        // Upper nibble is ignored
        mbc.set(&mut state, 0x1FFF, 0xFA);
        assert!(state.ram_enabled);

        mbc.set(&mut state, 0x0000, 0x00);
        assert_eq!(mbc.get(&state, 0xBFFF), 0xFF);
        mbc.set(&mut state, 0xA000, 0x13);

        mbc.set(&mut state, 0x0000, 0x0A);
        assert_eq!(mbc.get(&state, 0xA000), 0x42);
    }

    #[test]
    fn test_mbc1_ram_banking() {
        let (mut mbc, mut state) = setup(0x00, 4);
        mbc.set(&mut state, 0x0000, 0x0A);

        for bank in 0..4u8 {
            mbc.set(&mut state, 0x6000, 1);
            mbc.set(&mut state, 0x4000, bank);
            mbc.set(&mut state, 0xA000, bank + 0x10);
        }

        // Mode 0 pins bank 0
        mbc.set(&mut state, 0x6000, 0);
        mbc.set(&mut state, 0x4000, 2);
        assert_eq!(mbc.get(&state, 0xA000), 0x10);

        mbc.set(&mut state, 0x6000, 1);
        for bank in 0..4u8 {
            mbc.set(&mut state, 0x4000, bank);
            assert_eq!(mbc.get(&state, 0xA000), bank + 0x10);
        }
    }

    #[test]
    fn test_mbc1_no_ram() {
        let (mut mbc, mut state) = setup(0x00, 0);
        mbc.set(&mut state, 0x0000, 0x0A);
        mbc.set(&mut state, 0xA000, 0x42);
        assert_eq!(mbc.get(&state, 0xA000), 0xFF);
    }
}
