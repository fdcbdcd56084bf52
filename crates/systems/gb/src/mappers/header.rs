//! Cartridge header (0x0100-0x014F)
//!
//! Parsed and validated once, when a ROM is loaded. Everything that can be
//! wrong with an image is reported here, before any bank controller exists.

use thiserror::Error;

pub const ROM_BANK_SIZE: usize = 0x4000;
pub const RAM_BANK_SIZE: usize = 0x2000;

const TITLE: std::ops::Range<usize> = 0x0134..0x0143;
const CGB_FLAG: usize = 0x0143;
const CART_TYPE: usize = 0x0147;
const ROM_SIZE: usize = 0x0148;
const RAM_SIZE: usize = 0x0149;
const HEADER_CHECKSUM: usize = 0x014D;
const HEADER_END: usize = 0x0150;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CartridgeError {
    #[error("ROM image is {actual} bytes, too small to hold a header (0x0150 bytes)")]
    TooSmall { actual: usize },
    #[error("header checksum at 0x014D is {actual:02X}, computed {expected:02X}")]
    HeaderChecksum { expected: u8, actual: u8 },
    #[error("unknown cartridge type {code:02X} at 0x0147")]
    UnknownCartridgeType { code: u8 },
    #[error("unknown ROM size code {code:02X} at 0x0148")]
    UnknownRomSize { code: u8 },
    #[error("unknown RAM size code {code:02X} at 0x0149")]
    UnknownRamSize { code: u8 },
    #[error("ROM size code at 0x0148 declares {declared} bytes, image has {actual}")]
    RomSizeMismatch { declared: usize, actual: usize },
}

/// Bank controller family selected by the cartridge type byte
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControllerKind {
    RomOnly,
    Mbc1,
    Mbc3,
    Mbc5,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CartridgeType {
    pub kind: ControllerKind,
    pub battery: bool,
    pub rtc: bool,
}

impl CartridgeType {
    pub fn from_code(code: u8) -> Result<Self, CartridgeError> {
        let (kind, battery, rtc) = match code {
            0x00 => (ControllerKind::RomOnly, false, false),
            0x01 | 0x02 => (ControllerKind::Mbc1, false, false),
            0x03 => (ControllerKind::Mbc1, true, false),
            0x0F | 0x10 => (ControllerKind::Mbc3, true, true),
            0x11 | 0x12 => (ControllerKind::Mbc3, false, false),
            0x13 => (ControllerKind::Mbc3, true, false),
            0x19 | 0x1A | 0x1C | 0x1D => (ControllerKind::Mbc5, false, false),
            0x1B | 0x1E => (ControllerKind::Mbc5, true, false),
            _ => return Err(CartridgeError::UnknownCartridgeType { code }),
        };
        Ok(Self { kind, battery, rtc })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CartridgeHeader {
    pub title: String,
    pub cgb_flag: u8,
    pub cart_type: CartridgeType,
    pub cart_type_code: u8,
    pub rom_size_code: u8,
    pub ram_size_code: u8,
    pub rom_banks: usize,
    pub ram_banks: usize,
}

/// Rolling checksum over 0x0134..=0x014C
pub fn header_checksum(rom: &[u8]) -> u8 {
    rom[TITLE.start..HEADER_CHECKSUM]
        .iter()
        .fold(0u8, |cs, &b| cs.wrapping_sub(b).wrapping_sub(1))
}

fn rom_banks_for(code: u8) -> Result<usize, CartridgeError> {
    match code {
        0x00..=0x08 => Ok(2 << code),
        _ => Err(CartridgeError::UnknownRomSize { code }),
    }
}

fn ram_banks_for(code: u8) -> Result<usize, CartridgeError> {
    match code {
        0x00 => Ok(0),
        0x02 => Ok(1),
        0x03 => Ok(4),
        0x04 => Ok(16),
        0x05 => Ok(8),
        _ => Err(CartridgeError::UnknownRamSize { code }),
    }
}

impl CartridgeHeader {
    pub fn parse(rom: &[u8]) -> Result<Self, CartridgeError> {
        if rom.len() < HEADER_END {
            return Err(CartridgeError::TooSmall { actual: rom.len() });
        }

        let expected = header_checksum(rom);
        let actual = rom[HEADER_CHECKSUM];
        if expected != actual {
            return Err(CartridgeError::HeaderChecksum { expected, actual });
        }

        let cart_type_code = rom[CART_TYPE];
        let cart_type = CartridgeType::from_code(cart_type_code)?;
        let rom_size_code = rom[ROM_SIZE];
        let rom_banks = rom_banks_for(rom_size_code)?;
        let ram_size_code = rom[RAM_SIZE];
        let ram_banks = ram_banks_for(ram_size_code)?;

        let declared = rom_banks * ROM_BANK_SIZE;
        if declared != rom.len() {
            return Err(CartridgeError::RomSizeMismatch {
                declared,
                actual: rom.len(),
            });
        }

        // Colour titles are shorter; the trailing bytes hold the
        // manufacturer code and CGB flag, so stop at the first NUL.
        let title = rom[TITLE]
            .iter()
            .take_while(|&&b| b != 0)
            .map(|&b| {
                if b.is_ascii_graphic() || b == b' ' {
                    b as char
                } else {
                    '?'
                }
            })
            .collect::<String>()
            .trim_end()
            .to_string();

        Ok(Self {
            title,
            cgb_flag: rom[CGB_FLAG],
            cart_type,
            cart_type_code,
            rom_size_code,
            ram_size_code,
            rom_banks,
            ram_banks,
        })
    }

    /// Colour-capable (0x80) or colour-only (0xC0)
    pub fn is_cgb(&self) -> bool {
        self.cgb_flag & 0x80 != 0
    }
}

/// Synthetic ROM images for tests
#[cfg(test)]
pub(crate) mod test_rom {
    use super::*;

    /// A ROM of `2 << rom_code` banks, each bank's first byte set to its
    /// number, with a valid header checksum.
    pub fn build(cart_type: u8, rom_code: u8, ram_code: u8) -> Vec<u8> {
        let banks = 2usize << rom_code;
        let mut rom = vec![0u8; banks * ROM_BANK_SIZE];
        for bank in 1..banks {
            rom[bank * ROM_BANK_SIZE] = bank as u8;
        }
        rom[TITLE.start..TITLE.start + 4].copy_from_slice(b"TEST");
        rom[CART_TYPE] = cart_type;
        rom[ROM_SIZE] = rom_code;
        rom[RAM_SIZE] = ram_code;
        fix_checksum(&mut rom);
        rom
    }

    pub fn fix_checksum(rom: &mut [u8]) {
        rom[HEADER_CHECKSUM] = header_checksum(rom);
    }
}
