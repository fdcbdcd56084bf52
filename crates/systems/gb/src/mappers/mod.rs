//! Cartridges and their memory bank controllers (MBCs)
//!
//! A [`Cartridge`] owns the ROM image, the external RAM and the bank
//! selection that is currently mapped in ([`BankState`]). The controller
//! chip is a separate value that only holds its own registers; every access
//! hands it the bank state explicitly, so controllers never point back at
//! the cartridge that owns them.

mod header;
mod mbc1;
mod mbc3;
mod mbc5;
mod rom_only;
pub mod rtc;
pub mod save_ram;

pub use header::{
    header_checksum, CartridgeError, CartridgeHeader, CartridgeType, ControllerKind,
    RAM_BANK_SIZE, ROM_BANK_SIZE,
};
pub use mbc1::Mbc1;
pub use mbc3::Mbc3;
pub use mbc5::Mbc5;
pub use rom_only::RomOnly;
pub use rtc::Rtc;

#[cfg(test)]
pub(crate) use header::test_rom;

/// ROM/RAM contents plus the banks currently visible to the CPU
#[derive(Debug, Clone)]
pub struct BankState {
    rom: Vec<u8>,
    ram: Vec<u8>,
    rom_banks: usize,
    ram_banks: usize,
    /// Bank mapped at 0x0000-0x3FFF
    pub lower_rom_bank: usize,
    /// Bank mapped at 0x4000-0x7FFF
    pub rom_bank: usize,
    pub ram_bank: usize,
    pub ram_enabled: bool,
}

impl BankState {
    pub fn new(rom: Vec<u8>, rom_banks: usize, ram_banks: usize) -> Self {
        Self {
            rom,
            ram: vec![0; ram_banks * RAM_BANK_SIZE],
            rom_banks: rom_banks.max(1),
            ram_banks,
            lower_rom_bank: 0,
            rom_bank: 1,
            ram_bank: 0,
            ram_enabled: false,
        }
    }

    pub fn rom_banks(&self) -> usize {
        self.rom_banks
    }

    pub fn ram_banks(&self) -> usize {
        self.ram_banks
    }

    /// Read from ROM `bank` (wrapped to the physical count) at the window
    /// offset of `addr`
    pub fn read_rom(&self, bank: usize, addr: u16) -> u8 {
        let offset = (bank % self.rom_banks) * ROM_BANK_SIZE + (addr as usize & 0x3FFF);
        self.rom.get(offset).copied().unwrap_or(0xFF)
    }

    fn ram_offset(&self, addr: u16) -> Option<usize> {
        if !self.ram_enabled || self.ram_banks == 0 {
            return None;
        }
        let bank = self.ram_bank % self.ram_banks;
        Some(bank * RAM_BANK_SIZE + (addr as usize & 0x1FFF))
    }

    pub fn read_ram(&self, addr: u16) -> u8 {
        self.ram_offset(addr)
            .and_then(|offset| self.ram.get(offset).copied())
            .unwrap_or(0xFF)
    }

    pub fn write_ram(&mut self, addr: u16, val: u8) {
        if let Some(slot) = self.ram_offset(addr).and_then(|o| self.ram.get_mut(o)) {
            *slot = val;
        }
    }

    pub fn ram(&self) -> &[u8] {
        &self.ram
    }

    /// Replace RAM contents; refused when the size differs
    pub fn load_ram(&mut self, data: &[u8]) -> bool {
        if data.len() != self.ram.len() {
            return false;
        }
        self.ram.copy_from_slice(data);
        true
    }

    fn reset_selection(&mut self) {
        self.lower_rom_bank = 0;
        self.rom_bank = 1;
        self.ram_bank = 0;
        self.ram_enabled = false;
    }
}

/// Register-level behaviour of one controller chip
///
/// `get` and `set` receive the CPU address (0x0000-0x7FFF or 0xA000-0xBFFF).
pub trait BankController {
    fn get(&self, state: &BankState, addr: u16) -> u8 {
        match addr {
            0x0000..=0x3FFF => state.read_rom(state.lower_rom_bank, addr),
            0x4000..=0x7FFF => state.read_rom(state.rom_bank, addr),
            0xA000..=0xBFFF => state.read_ram(addr),
            _ => 0xFF,
        }
    }

    fn set(&mut self, state: &mut BankState, addr: u16, val: u8);

    /// Advance cartridge-side clocks
    fn tick(&mut self, _cycles: u32) {}

    /// Return controller registers to power-on values
    fn reset(&mut self);
}

#[derive(Debug, Clone)]
pub enum Mapper {
    RomOnly(RomOnly),
    Mbc1(Mbc1),
    Mbc3(Mbc3),
    Mbc5(Mbc5),
}

impl Mapper {
    pub fn for_type(cart_type: CartridgeType) -> Self {
        match cart_type.kind {
            ControllerKind::RomOnly => Mapper::RomOnly(RomOnly),
            ControllerKind::Mbc1 => Mapper::Mbc1(Mbc1::new()),
            ControllerKind::Mbc3 => Mapper::Mbc3(Mbc3::new(cart_type.rtc)),
            ControllerKind::Mbc5 => Mapper::Mbc5(Mbc5::new()),
        }
    }

    pub fn get(&self, state: &BankState, addr: u16) -> u8 {
        match self {
            Mapper::RomOnly(m) => m.get(state, addr),
            Mapper::Mbc1(m) => m.get(state, addr),
            Mapper::Mbc3(m) => m.get(state, addr),
            Mapper::Mbc5(m) => m.get(state, addr),
        }
    }

    pub fn set(&mut self, state: &mut BankState, addr: u16, val: u8) {
        match self {
            Mapper::RomOnly(m) => m.set(state, addr, val),
            Mapper::Mbc1(m) => m.set(state, addr, val),
            Mapper::Mbc3(m) => m.set(state, addr, val),
            Mapper::Mbc5(m) => m.set(state, addr, val),
        }
    }

    pub fn tick(&mut self, cycles: u32) {
        if let Mapper::Mbc3(m) = self {
            m.tick(cycles);
        }
    }

    pub fn reset(&mut self) {
        match self {
            Mapper::RomOnly(m) => m.reset(),
            Mapper::Mbc1(m) => m.reset(),
            Mapper::Mbc3(m) => m.reset(),
            Mapper::Mbc5(m) => m.reset(),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Mapper::RomOnly(_) => "ROM",
            Mapper::Mbc1(_) => "MBC1",
            Mapper::Mbc3(_) => "MBC3",
            Mapper::Mbc5(_) => "MBC5",
        }
    }
}

/// A validated cartridge with its controller
#[derive(Debug, Clone)]
pub struct Cartridge {
    header: CartridgeHeader,
    mapper: Mapper,
    state: BankState,
}

impl Cartridge {
    pub fn from_rom(rom: Vec<u8>) -> Result<Self, CartridgeError> {
        let header = CartridgeHeader::parse(&rom)?;
        let mapper = Mapper::for_type(header.cart_type);
        let state = BankState::new(rom, header.rom_banks, header.ram_banks);
        Ok(Self {
            header,
            mapper,
            state,
        })
    }

    pub fn header(&self) -> &CartridgeHeader {
        &self.header
    }

    pub fn mapper_name(&self) -> &'static str {
        self.mapper.name()
    }

    pub fn read(&self, addr: u16) -> u8 {
        self.mapper.get(&self.state, addr)
    }

    pub fn write(&mut self, addr: u16, val: u8) {
        self.mapper.set(&mut self.state, addr, val);
    }

    pub fn tick(&mut self, cycles: u32) {
        self.mapper.tick(cycles);
    }

    /// Bank currently mapped at 0x4000-0x7FFF, after wrapping
    pub fn rom_bank(&self) -> usize {
        self.state.rom_bank % self.state.rom_banks()
    }

    pub fn has_battery(&self) -> bool {
        self.header.cart_type.battery && self.state.ram_banks() > 0
    }

    pub fn ram(&self) -> &[u8] {
        self.state.ram()
    }

    pub fn load_ram(&mut self, data: &[u8]) -> bool {
        self.state.load_ram(data)
    }

    pub fn rtc(&self) -> Option<&Rtc> {
        match &self.mapper {
            Mapper::Mbc3(m) => m.rtc(),
            _ => None,
        }
    }

    pub fn rtc_mut(&mut self) -> Option<&mut Rtc> {
        match &mut self.mapper {
            Mapper::Mbc3(m) => m.rtc_mut(),
            _ => None,
        }
    }

    /// Power-cycle the controller; RAM contents and the clock are kept
    pub fn reset(&mut self) {
        self.mapper.reset();
        self.state.reset_selection();
    }
}

#[cfg(test)]
mod tests {
    use super::test_rom::build;
    use super::*;

    #[test]
    fn test_mapper_from_cart_type() {
        for (code, name) in [
            (0x00, "ROM"),
            (0x01, "MBC1"),
            (0x03, "MBC1"),
            (0x0F, "MBC3"),
            (0x11, "MBC3"),
            (0x13, "MBC3"),
            (0x19, "MBC5"),
            (0x1B, "MBC5"),
        ] {
            let cart = Cartridge::from_rom(build(code, 0x01, 0x00)).unwrap();
            assert_eq!(cart.mapper_name(), name, "type {:02X}", code);
        }
    }

    #[test]
    fn test_rtc_only_on_timer_carts() {
        let cart = Cartridge::from_rom(build(0x10, 0x01, 0x03)).unwrap();
        assert!(cart.rtc().is_some());
        let cart = Cartridge::from_rom(build(0x13, 0x01, 0x03)).unwrap();
        assert!(cart.rtc().is_none());
    }

    #[test]
    fn test_battery_needs_ram() {
        let cart = Cartridge::from_rom(build(0x03, 0x01, 0x02)).unwrap();
        assert!(cart.has_battery());
        assert_eq!(cart.ram().len(), RAM_BANK_SIZE);

        let cart = Cartridge::from_rom(build(0x03, 0x01, 0x00)).unwrap();
        assert!(!cart.has_battery());
        assert!(cart.ram().is_empty());

        let cart = Cartridge::from_rom(build(0x02, 0x01, 0x02)).unwrap();
        assert!(!cart.has_battery());
    }

    #[test]
    fn test_bank_wraps_modulo_count() {
        let mut state = BankState::new(build(0x00, 0x01, 0x00), 4, 2);
        // Bank 6 of 4 is bank 2
        assert_eq!(state.read_rom(6, 0x4000), 2);
        assert_eq!(state.read_rom(0x1FF, 0x4000), 3);

        state.ram_enabled = true;
        state.ram_bank = 3;
        state.write_ram(0xA000, 0x42);
        state.ram_bank = 1;
        assert_eq!(state.read_ram(0xA000), 0x42);
    }

    #[test]
    fn test_load_ram_size_check() {
        let mut cart = Cartridge::from_rom(build(0x03, 0x01, 0x03)).unwrap();
        assert!(!cart.load_ram(&[1, 2, 3]));
        assert!(cart.ram().iter().all(|&b| b == 0));

        let image = vec![0x5A; 4 * RAM_BANK_SIZE];
        assert!(cart.load_ram(&image));
        assert_eq!(cart.ram(), image.as_slice());
    }

    #[test]
    fn test_reset_keeps_ram() {
        let mut cart = Cartridge::from_rom(build(0x03, 0x02, 0x02)).unwrap();
        cart.write(0x0000, 0x0A);
        cart.write(0xA010, 0x99);
        cart.write(0x2000, 0x05);
        assert_eq!(cart.rom_bank(), 5);

        cart.reset();
        assert_eq!(cart.rom_bank(), 1);
        assert_eq!(cart.read(0xA010), 0xFF);
        cart.write(0x0000, 0x0A);
        assert_eq!(cart.read(0xA010), 0x99);
    }
}
