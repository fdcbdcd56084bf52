//! Cartridges without a controller: 32 KiB of ROM, no RAM

use super::{BankController, BankState};

#[derive(Debug, Clone, Copy, Default)]
pub struct RomOnly;

impl BankController for RomOnly {
    fn get(&self, state: &BankState, addr: u16) -> u8 {
        match addr {
            0x0000..=0x3FFF => state.read_rom(0, addr),
            0x4000..=0x7FFF => state.read_rom(1, addr),
            _ => 0xFF,
        }
    }

    fn set(&mut self, _state: &mut BankState, _addr: u16, _val: u8) {}

    fn reset(&mut self) {}
}

#[cfg(test)]
mod tests {
    use super::super::test_rom::build;
    use super::*;

    #[test]
    fn test_fixed_banks() {
        let mut rom = build(0x00, 0x00, 0x00);
        rom[0x0000] = 0xAA;
        rom[0x7FFF] = 0xBB;
        let mut state = BankState::new(rom, 2, 0);
        let mut mbc = RomOnly;

        assert_eq!(mbc.get(&state, 0x0000), 0xAA);
        assert_eq!(mbc.get(&state, 0x4000), 1);
        assert_eq!(mbc.get(&state, 0x7FFF), 0xBB);

        // Register writes have nothing to select
        mbc.set(&mut state, 0x2000, 0x00);
        assert_eq!(mbc.get(&state, 0x4000), 1);
    }

    #[test]
    fn test_no_ram() {
        let mut state = BankState::new(build(0x00, 0x00, 0x00), 2, 0);
        let mut mbc = RomOnly;
        mbc.set(&mut state, 0x0000, 0x0A);
        mbc.set(&mut state, 0xA000, 0x42);
        assert_eq!(mbc.get(&state, 0xA000), 0xFF);
        assert_eq!(mbc.get(&state, 0xBFFF), 0xFF);
    }
}
