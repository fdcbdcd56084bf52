//! MBC5
//!
//! Up to 8 MiB ROM and 128 KiB RAM. Unlike the older chips, bank 0 can be
//! mapped at 0x4000-0x7FFF.
//!
//! # Register Map
//!
//! - 0x0000-0x1FFF: RAM enable (low nibble 0xA enables)
//! - 0x2000-0x2FFF: ROM bank, low 8 bits
//! - 0x3000-0x3FFF: ROM bank, bit 8
//! - 0x4000-0x5FFF: RAM bank, 4 bits

use super::{BankController, BankState};

#[derive(Debug, Clone)]
pub struct Mbc5 {
    rom_select: u16,
}

impl Default for Mbc5 {
    fn default() -> Self {
        Self::new()
    }
}

impl Mbc5 {
    pub fn new() -> Self {
        Self { rom_select: 1 }
    }
}

impl BankController for Mbc5 {
    fn set(&mut self, state: &mut BankState, addr: u16, val: u8) {
        match addr {
            0x0000..=0x1FFF => state.ram_enabled = val & 0x0F == 0x0A,
            0x2000..=0x2FFF => {
                self.rom_select = (self.rom_select & 0x100) | val as u16;
                state.rom_bank = self.rom_select as usize;
            }
            0x3000..=0x3FFF => {
                self.rom_select = (self.rom_select & 0x0FF) | ((val as u16 & 0x01) << 8);
                state.rom_bank = self.rom_select as usize;
            }
            0x4000..=0x5FFF => state.ram_bank = (val & 0x0F) as usize,
            0xA000..=0xBFFF => state.write_ram(addr, val),
            _ => {}
        }
    }

    fn reset(&mut self) {
        *self = Self::new();
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_rom::build;
    use super::*;

    fn setup(rom_code: u8, ram_banks: usize) -> (Mbc5, BankState) {
        let rom = build(0x1B, rom_code, 0x00);
        (Mbc5::new(), BankState::new(rom, 2 << rom_code, ram_banks))
    }

    /// Tag byte of the bank at 0x4000 (low byte of its number)
    fn bank_at_upper(mbc: &Mbc5, state: &BankState) -> usize {
        mbc.get(state, 0x4000) as usize
    }

    #[test]
    fn test_mbc5_bank_zero_selectable() {
        let (mut mbc, mut state) = setup(0x03, 0);
        assert_eq!(bank_at_upper(&mbc, &state), 1);
        mbc.set(&mut state, 0x2000, 0);
        assert_eq!(bank_at_upper(&mbc, &state), 0);
    }

    #[test]
    fn test_mbc5_nine_bit_bank() {
        let (mut mbc, mut state) = setup(0x08, 0); // 512 banks
        mbc.set(&mut state, 0x2000, 0x05);
        mbc.set(&mut state, 0x3000, 0x01);
        assert_eq!(state.rom_bank, 0x105);
        assert_eq!(bank_at_upper(&mbc, &state), 0x05);

        // Low byte write keeps bit 8
        mbc.set(&mut state, 0x2FFF, 0x80);
        assert_eq!(state.rom_bank, 0x180);

        // Only bit 0 counts in the high register
        mbc.set(&mut state, 0x3000, 0xFE);
        assert_eq!(state.rom_bank, 0x080);
    }

    #[test]
    fn test_mbc5_bank_wraps() {
        let (mut mbc, mut state) = setup(0x02, 0); // 8 banks
        mbc.set(&mut state, 0x2000, 0x0B);
        assert_eq!(bank_at_upper(&mbc, &state), 3);
        mbc.set(&mut state, 0x3000, 0x01);
        assert_eq!(bank_at_upper(&mbc, &state), 3);
    }

    #[test]
    fn test_mbc5_ram_banks() {
        let (mut mbc, mut state) = setup(0x00, 16);
        mbc.set(&mut state, 0x0000, 0x0A);
        for bank in 0..16u8 {
            mbc.set(&mut state, 0x4000, bank);
            mbc.set(&mut state, 0xBFFF, bank);
        }
        mbc.set(&mut state, 0x4000, 0x1C); // 4 bits: bank 12
        assert_eq!(mbc.get(&state, 0xBFFF), 12);

        mbc.set(&mut state, 0x0000, 0x00);
        assert_eq!(mbc.get(&state, 0xBFFF), 0xFF);
    }
}
