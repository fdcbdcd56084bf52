//! Boot ROM overlay
//!
//! While enabled the boot image shadows the start of cartridge ROM. The
//! monochrome image covers 0x0000-0x00FF; the colour image is 2304 bytes and
//! also covers 0x0200-0x08FF, leaving the cartridge header visible in
//! between.

use crate::GbError;

pub const DMG_BOOT_SIZE: usize = 0x100;
pub const CGB_BOOT_SIZE: usize = 0x900;

#[derive(Debug, Clone)]
pub struct BootRom {
    data: Vec<u8>,
    enabled: bool,
}

impl BootRom {
    pub fn new(data: Vec<u8>) -> Result<Self, GbError> {
        if data.len() != DMG_BOOT_SIZE && data.len() != CGB_BOOT_SIZE {
            return Err(GbError::BootRomSize { actual: data.len() });
        }
        Ok(Self {
            data,
            enabled: true,
        })
    }

    /// Image length in bytes
    pub fn size(&self) -> usize {
        self.data.len()
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Whether `addr` is served by the overlay right now
    pub fn covers(&self, addr: u16) -> bool {
        if !self.enabled {
            return false;
        }
        let addr = addr as usize;
        addr < DMG_BOOT_SIZE
            || (self.data.len() == CGB_BOOT_SIZE && (0x200..CGB_BOOT_SIZE).contains(&addr))
    }

    pub fn read(&self, addr: u16) -> u8 {
        self.data.get(addr as usize).copied().unwrap_or(0xFF)
    }

    pub fn enable(&mut self) {
        self.enabled = true;
    }

    pub fn disable(&mut self) {
        self.enabled = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_odd_sizes() {
        assert!(matches!(
            BootRom::new(vec![0; 0x200]),
            Err(GbError::BootRomSize { actual: 0x200 })
        ));
        assert!(BootRom::new(vec![0; DMG_BOOT_SIZE]).is_ok());
        assert!(BootRom::new(vec![0; CGB_BOOT_SIZE]).is_ok());
    }

    #[test]
    fn test_dmg_window() {
        let boot = BootRom::new(vec![0x31; DMG_BOOT_SIZE]).unwrap();
        assert!(boot.covers(0x0000));
        assert!(boot.covers(0x00FF));
        assert!(!boot.covers(0x0100));
        assert!(!boot.covers(0x0200));
    }

    #[test]
    fn test_cgb_window_skips_header() {
        let boot = BootRom::new(vec![0; CGB_BOOT_SIZE]).unwrap();
        assert!(boot.covers(0x00FF));
        assert!(!boot.covers(0x0100));
        assert!(!boot.covers(0x014D));
        assert!(boot.covers(0x0200));
        assert!(boot.covers(0x08FF));
        assert!(!boot.covers(0x0900));
    }

    #[test]
    fn test_disable_uncovers() {
        let mut boot = BootRom::new(vec![0; DMG_BOOT_SIZE]).unwrap();
        boot.disable();
        assert!(!boot.covers(0x0000));
        assert!(!boot.is_enabled());
    }
}
