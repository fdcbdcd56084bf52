//! Synthetic cartridge images for the integration tests

#![allow(dead_code)]

use emu_core::System;
use emu_gb::mappers::{header_checksum, ROM_BANK_SIZE};
use emu_gb::GbSystem;

const CGB_FLAG: usize = 0x0143;
const CART_TYPE: usize = 0x0147;
const ROM_SIZE: usize = 0x0148;
const RAM_SIZE: usize = 0x0149;
const HEADER_CHECKSUM: usize = 0x014D;

/// Builds a ROM with a valid header around hand-assembled code
pub struct RomBuilder {
    rom: Vec<u8>,
}

impl RomBuilder {
    /// ROM-only, 32 KiB, no RAM
    pub fn new() -> Self {
        Self::with_type(0x00, 0x00, 0x00)
    }

    pub fn with_type(cart_type: u8, rom_code: u8, ram_code: u8) -> Self {
        let mut rom = vec![0u8; (2usize << rom_code) * ROM_BANK_SIZE];
        rom[0x0134..0x0138].copy_from_slice(b"TEST");
        rom[CART_TYPE] = cart_type;
        rom[ROM_SIZE] = rom_code;
        rom[RAM_SIZE] = ram_code;
        Self { rom }
    }

    /// Place `bytes` at `addr`
    pub fn code(mut self, addr: usize, bytes: &[u8]) -> Self {
        self.rom[addr..addr + bytes.len()].copy_from_slice(bytes);
        self
    }

    pub fn cgb(mut self) -> Self {
        self.rom[CGB_FLAG] = 0x80;
        self
    }

    pub fn build(mut self) -> Vec<u8> {
        self.rom[HEADER_CHECKSUM] = header_checksum(&self.rom);
        self.rom
    }
}

/// `INC B; JR -3`, a busy loop that keeps PC moving
pub const SPIN: [u8; 3] = [0x04, 0x18, 0xFD];

pub fn mounted(rom: &[u8]) -> GbSystem {
    let mut sys = GbSystem::new();
    sys.mount("Cartridge", rom).unwrap();
    sys
}

pub fn run_frames(sys: &mut GbSystem, frames: usize) {
    for _ in 0..frames {
        sys.step_frame().unwrap();
    }
}
