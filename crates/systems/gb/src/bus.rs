//! Game Boy memory bus implementation
//!
//! The bus owns every addressable component and routes CPU reads and writes
//! to them. It also drives the cycle-based peripherals (cartridge clock,
//! timer, LCD and HBlank DMA) from [`GbBus::tick`].
//!
//! # Memory Map
//!
//! ```text
//! $0000-$00FF  Boot ROM overlay (CGB images also cover $0200-$08FF)
//! $0000-$3FFF  ROM bank 0 (or the MBC1 mode 1 lower bank)
//! $4000-$7FFF  Switchable ROM bank
//! $8000-$9FFF  Video RAM (CGB: 2 banks selected by VBK)
//! $A000-$BFFF  External RAM / MBC3 clock registers
//! $C000-$CFFF  Work RAM bank 0
//! $D000-$DFFF  Work RAM bank 1 (CGB: banks 1-7 selected by SVBK)
//! $E000-$FDFF  Echo of $C000-$DDFF
//! $FE00-$FE9F  OAM
//! $FEA0-$FEFF  Not usable, reads $FF
//! $FF00-$FF7F  I/O registers
//! $FF80-$FFFE  High RAM
//! $FFFF        Interrupt enable
//! ```
//!
//! # I/O Registers With Side Effects
//!
//! - `$FF00 (P1)`: joypad row select; reads combine the selected key rows
//! - `$FF04-$FF07`: timer; any write to DIV clears it
//! - `$FF0F (IF)`: upper three bits read as 1
//! - `$FF40-$FF4B`: LCD; STAT mode bits are read-only, writing LY clears it
//! - `$FF46 (DMA)`: copies 160 bytes from `value << 8` into OAM
//! - `$FF4D (KEY1)`: speed switch is not emulated, reads $FF
//! - `$FF4F (VBK)`, `$FF70 (SVBK)`: CGB VRAM/WRAM bank select
//! - `$FF50`: boot ROM disable ($01 on DMG, $11 on CGB)
//! - `$FF51-$FF55`: CGB general purpose and HBlank DMA
//! - `$FF68-$FF6B`: CGB background and object palette ports
//!
//! Everything else in $FF00-$FF7F (serial, sound) is plain storage.

use std::sync::Arc;

use emu_core::cpu_lr35902::MemoryLr35902;
use emu_core::logging::{LogCategory, LogLevel};

use crate::bootrom::BootRom;
use crate::context::EmuContext;
use crate::interrupts::{Interrupt, Interrupts};
use crate::joypad::{Joypad, Key};
use crate::lcd::{Lcd, VideoSource};
use crate::mappers::Cartridge;
use crate::palette::CgbPalette;
use crate::timer::Timer;
use crate::GbError;

const IO_START: u16 = 0xFF00;

const P1: u16 = 0xFF00;
const IF: u16 = 0xFF0F;
const DMA: u16 = 0xFF46;
const KEY1: u16 = 0xFF4D;
const VBK: u16 = 0xFF4F;
const BOOT_DISABLE: u16 = 0xFF50;
const HDMA1: u16 = 0xFF51;
const HDMA2: u16 = 0xFF52;
const HDMA3: u16 = 0xFF53;
const HDMA4: u16 = 0xFF54;
const HDMA5: u16 = 0xFF55;
const BCPS: u16 = 0xFF68;
const BCPD: u16 = 0xFF69;
const OCPS: u16 = 0xFF6A;
const OCPD: u16 = 0xFF6B;
const SVBK: u16 = 0xFF70;

/// Cartridge entry point, where PC lands once the boot ROM unmaps itself
const ENTRY_POINT: u16 = 0x0100;

const OAM_SIZE: usize = 0xA0;
const HDMA_BLOCK: u16 = 0x10;

/// I/O contents left behind by the monochrome boot ROM
const DMG_IO_INIT: [u8; 0x80] = io_table([
    0xCF, 0x00, 0x7E, 0x00, 0xAB, 0x00, 0x00, 0xF8, // FF00
    0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0xE1, // FF08
    0x80, 0xBF, 0xF3, 0xFF, 0xBF, 0x00, 0x3F, 0x00, // FF10
    0xFF, 0xBF, 0x7F, 0xFF, 0x9F, 0xFF, 0xBF, 0x00, // FF18
    0xFF, 0x00, 0x00, 0xBF, 0x77, 0xF3, 0xF1, 0x00, // FF20
    0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, // FF28
    0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, // FF30
    0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, // FF38
    0x91, 0x85, 0x00, 0x00, 0x00, 0x00, 0xFF, 0xFC, // FF40
    0x07, 0x07, 0x00, 0x00, 0x00, 0xFF, 0x00, 0xFF, // FF48
    0x00, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0x00, // FF50
    0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, // FF58
    0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, // FF60
    0xFF, 0xFF, 0xFF, 0xFF, 0x00, 0x00, 0x00, 0x00, // FF68
    0xFF,
]);

/// I/O contents left behind by the colour boot ROM
const CGB_IO_INIT: [u8; 0x80] = io_table([
    0xCF, 0x00, 0x7F, 0x00, 0x06, 0x00, 0x00, 0xF8, // FF00
    0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0xE1, // FF08
    0x80, 0xBF, 0xF3, 0xFF, 0xBF, 0x00, 0x3F, 0x00, // FF10
    0xFF, 0xBF, 0x7F, 0xFF, 0x9F, 0xFF, 0xBF, 0x00, // FF18
    0xFF, 0x00, 0x00, 0xBF, 0x77, 0xF3, 0xF1, 0x00, // FF20
    0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, // FF28
    0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, // FF30
    0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, // FF38
    0x91, 0x06, 0x00, 0x00, 0x06, 0x00, 0x00, 0xFC, // FF40
    0x07, 0x07, 0x00, 0x00, 0x00, 0xFF, 0x00, 0x00, // FF48
    0x00, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0x00, // FF50
    0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, // FF58
    0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, // FF60
    0x08, 0x08, 0x08, 0x08, 0x00, 0x00, 0x00, 0x00, // FF68
    0x00,
]);

/// Pad the listed registers ($FF00-$FF70) with zeroes up to $FF7F
const fn io_table(head: [u8; 0x71]) -> [u8; 0x80] {
    let mut table = [0u8; 0x80];
    let mut i = 0;
    while i < head.len() {
        table[i] = head[i];
        i += 1;
    }
    table
}

/// HBlank DMA progress
#[derive(Debug, Clone, Copy, Default)]
struct Hdma {
    active: bool,
    /// Blocks left after the next one, as stored in HDMA5
    remaining: u8,
}

/// Game Boy memory bus
pub struct GbBus {
    ctx: Arc<EmuContext>,
    cgb: bool,
    cartridge: Option<Cartridge>,
    boot_rom: Option<BootRom>,
    vram: Box<[[u8; 0x2000]; 2]>,
    wram: Box<[[u8; 0x1000]; 8]>,
    oam: [u8; OAM_SIZE],
    hram: [u8; 0x7F],
    /// Backing store for registers without a dedicated component
    io: [u8; 0x80],
    pub interrupts: Interrupts,
    pub timer: Timer,
    pub lcd: Lcd,
    pub joypad: Joypad,
    bg_palette: CgbPalette,
    obj_palette: CgbPalette,
    hdma: Hdma,
    pc_redirect: Option<u16>,
}

impl GbBus {
    pub fn new(ctx: Arc<EmuContext>) -> Self {
        let mut bus = Self {
            ctx,
            cgb: false,
            cartridge: None,
            boot_rom: None,
            vram: Box::new([[0; 0x2000]; 2]),
            wram: Box::new([[0; 0x1000]; 8]),
            oam: [0; OAM_SIZE],
            hram: [0; 0x7F],
            io: [0; 0x80],
            interrupts: Interrupts::new(),
            timer: Timer::new(),
            lcd: Lcd::new(),
            joypad: Joypad::new(),
            bg_palette: CgbPalette::new(),
            obj_palette: CgbPalette::new(),
            hdma: Hdma::default(),
            pc_redirect: None,
        };
        bus.reset(false);
        bus
    }

    /// Power-cycle everything on the bus.
    ///
    /// Cartridge RAM and the cartridge clock survive. The I/O block is
    /// seeded with the values the boot ROM would have left; when a boot ROM
    /// is attached its overlay is re-armed and the LCD is switched off so
    /// the boot code starts from a dark screen.
    pub fn reset(&mut self, cgb: bool) {
        self.cgb = cgb;
        *self.vram = [[0; 0x2000]; 2];
        *self.wram = [[0; 0x1000]; 8];
        self.oam = [0xFF; OAM_SIZE];
        self.hram = [0; 0x7F];
        self.interrupts = Interrupts::new();
        self.timer = Timer::new();
        self.lcd = Lcd::new();
        self.joypad = Joypad::new();
        self.bg_palette = CgbPalette::new();
        self.obj_palette = CgbPalette::new();
        self.hdma = Hdma::default();
        self.pc_redirect = None;

        if let Some(cart) = self.cartridge.as_mut() {
            cart.reset();
        }

        let table = if cgb { &CGB_IO_INIT } else { &DMG_IO_INIT };
        self.io = *table;
        for (offset, &val) in table.iter().enumerate() {
            self.seed_register(IO_START + offset as u16, val);
        }

        if let Some(boot) = self.boot_rom.as_mut() {
            boot.enable();
            self.lcd.write_register(0xFF40, 0x00, &mut self.interrupts);
        }
    }

    /// Load a power-on value into the component that owns `addr`
    fn seed_register(&mut self, addr: u16, val: u8) {
        match addr {
            P1 => self.joypad.write(val),
            0xFF04 => self.timer.set_div(val),
            0xFF05..=0xFF07 => self.timer.write_register(addr, val),
            IF => self.interrupts.write_if(val),
            0xFF40..=0xFF45 | 0xFF47..=0xFF4B => self.lcd.load_register(addr, val),
            _ => {}
        }
    }

    pub fn is_cgb(&self) -> bool {
        self.cgb
    }

    pub fn insert_cartridge(&mut self, cartridge: Cartridge) {
        self.cartridge = Some(cartridge);
    }

    pub fn remove_cartridge(&mut self) -> Option<Cartridge> {
        self.cartridge.take()
    }

    pub fn cartridge(&self) -> Option<&Cartridge> {
        self.cartridge.as_ref()
    }

    pub fn cartridge_mut(&mut self) -> Option<&mut Cartridge> {
        self.cartridge.as_mut()
    }

    pub fn set_boot_rom(&mut self, boot_rom: Option<BootRom>) {
        self.boot_rom = boot_rom;
    }

    pub fn boot_rom(&self) -> Option<&BootRom> {
        self.boot_rom.as_ref()
    }

    pub fn has_boot_rom(&self) -> bool {
        self.boot_rom.is_some()
    }

    /// Whether the boot ROM currently shadows cartridge ROM
    pub fn boot_rom_active(&self) -> bool {
        self.boot_rom.as_ref().is_some_and(BootRom::is_enabled)
    }

    /// Read-only copy of $FF00-$FF7F as the CPU would see it
    pub fn io_snapshot(&self) -> [u8; 0x80] {
        std::array::from_fn(|offset| self.read_io(IO_START + offset as u16))
    }

    /// Checked write for callers holding a wider value.
    ///
    /// Values that do not fit in a byte are rejected rather than truncated.
    pub fn write_wide(&mut self, addr: u16, value: u16) -> Result<(), GbError> {
        let val = u8::try_from(value).map_err(|_| GbError::ValueOutOfRange { addr, value })?;
        self.write(addr, val);
        Ok(())
    }

    /// Forward a key press or release, raising the joypad interrupt on a
    /// new press
    pub fn key_event(&mut self, key: Key, pressed: bool) {
        if self.joypad.key_event(key, pressed) {
            self.interrupts.request(Interrupt::Joypad);
        }
    }

    /// Advance the cartridge clock, timer and LCD by `cycles`
    pub fn tick(&mut self, cycles: u32) {
        if let Some(cart) = self.cartridge.as_mut() {
            cart.tick(cycles);
        }

        self.timer.tick(cycles, &mut self.interrupts);

        let video = VideoSource {
            vram: &self.vram,
            cgb_palette: if self.cgb {
                Some(&self.bg_palette)
            } else {
                None
            },
            dmg_colors: self.ctx.palette().colors(),
        };
        let events = self.lcd.tick(cycles, &video, &mut self.interrupts);

        for _ in 0..events.hblanks {
            self.hblank_dma();
        }
    }

    fn log(&self, category: LogCategory, level: LogLevel, message: impl FnOnce() -> String) {
        self.ctx.logger().log(category, level, message);
    }

    fn io_reg(&self, addr: u16) -> u8 {
        self.io[(addr - IO_START) as usize]
    }

    fn set_io_reg(&mut self, addr: u16, val: u8) {
        self.io[(addr - IO_START) as usize] = val;
    }

    fn vram_bank(&self) -> usize {
        if self.cgb {
            (self.io_reg(VBK) & 0x01) as usize
        } else {
            0
        }
    }

    /// WRAM bank mapped at $D000; SVBK 0 selects bank 1
    fn wram_bank(&self) -> usize {
        if !self.cgb {
            return 1;
        }
        match self.io_reg(SVBK) & 0x07 {
            0 => 1,
            bank => bank as usize,
        }
    }

    fn read_io(&self, addr: u16) -> u8 {
        match addr {
            P1 => self.joypad.read(),
            0xFF04..=0xFF07 => self.timer.read_register(addr),
            IF => self.interrupts.read_if(),
            0xFF40..=0xFF45 | 0xFF47..=0xFF4B => self.lcd.read_register(addr),
            DMA => self.io_reg(DMA),
            KEY1 => 0xFF,
            VBK if self.cgb => self.io_reg(VBK) | 0xFE,
            BOOT_DISABLE => 0xFF,
            // HDMA source and destination are write-only
            HDMA1..=HDMA4 => 0xFF,
            HDMA5 if self.cgb => self.io_reg(HDMA5),
            BCPS if self.cgb => self.bg_palette.read_index(),
            BCPD if self.cgb => self.bg_palette.read_data(),
            OCPS if self.cgb => self.obj_palette.read_index(),
            OCPD if self.cgb => self.obj_palette.read_data(),
            SVBK if self.cgb => self.io_reg(SVBK) | 0xF8,
            VBK | HDMA5 | BCPS..=OCPD | SVBK => 0xFF,
            _ => self.io_reg(addr),
        }
    }

    fn write_io(&mut self, addr: u16, val: u8) {
        match addr {
            P1 => self.joypad.write(val),
            0xFF04..=0xFF07 => self.timer.write_register(addr, val),
            IF => self.interrupts.write_if(val),
            0xFF40..=0xFF45 | 0xFF47..=0xFF4B => {
                self.lcd.write_register(addr, val, &mut self.interrupts)
            }
            DMA => {
                self.set_io_reg(DMA, val);
                self.oam_dma(val);
            }
            KEY1 => {}
            VBK if self.cgb && !self.hdma.active => self.set_io_reg(VBK, val & 0x01),
            BOOT_DISABLE => self.write_boot_disable(val),
            HDMA1..=HDMA4 if self.cgb => self.set_io_reg(addr, val),
            HDMA5 if self.cgb => self.start_hdma(val),
            BCPS if self.cgb => self.bg_palette.write_index(val),
            BCPD if self.cgb => self.bg_palette.write_data(val),
            OCPS if self.cgb => self.obj_palette.write_index(val),
            OCPD if self.cgb => self.obj_palette.write_data(val),
            SVBK if self.cgb => self.set_io_reg(SVBK, val & 0x07),
            VBK | HDMA1..=HDMA5 | BCPS..=OCPD | SVBK => {
                self.log(LogCategory::Bus, LogLevel::Trace, || {
                    format!("ignored CGB register write {val:02X} to {addr:04X}")
                });
            }
            // Serial and sound registers are plain storage
            0xFF01..=0xFF02 | 0xFF10..=0xFF3F => self.set_io_reg(addr, val),
            _ => {
                self.log(LogCategory::Bus, LogLevel::Trace, || {
                    format!("write {val:02X} to unmapped I/O {addr:04X}")
                });
                self.set_io_reg(addr, val);
            }
        }
    }

    fn write_boot_disable(&mut self, val: u8) {
        let magic = if self.cgb { 0x11 } else { 0x01 };
        match self.boot_rom.as_mut() {
            Some(boot) if boot.is_enabled() && val == magic => {
                boot.disable();
                self.pc_redirect = Some(ENTRY_POINT);
                self.log(LogCategory::Bus, LogLevel::Info, || {
                    format!("boot ROM disabled, jumping to {ENTRY_POINT:04X}")
                });
            }
            Some(boot) if boot.is_enabled() => {
                self.log(LogCategory::Bus, LogLevel::Debug, || {
                    format!("boot ROM disable ignored, wrote {val:02X} expecting {magic:02X}")
                });
            }
            _ => {
                self.log(LogCategory::Bus, LogLevel::Trace, || {
                    format!("write {val:02X} to {BOOT_DISABLE:04X} with no boot ROM mapped")
                });
            }
        }
    }

    /// Copy 160 bytes from `page << 8` into OAM
    fn oam_dma(&mut self, page: u8) {
        let source = (page as u16) << 8;
        self.log(LogCategory::Bus, LogLevel::Debug, || {
            format!("OAM DMA from {source:04X}")
        });
        for i in 0..OAM_SIZE as u16 {
            self.oam[i as usize] = self.read(source.wrapping_add(i));
        }
    }

    fn start_hdma(&mut self, val: u8) {
        if self.hdma.active && val & 0x80 == 0 {
            self.hdma.active = false;
            let left = self.io_reg(HDMA5);
            self.set_io_reg(HDMA5, left | 0x80);
            self.log(LogCategory::Bus, LogLevel::Debug, || "HBlank DMA aborted".into());
            return;
        }

        let blocks = val & 0x7F;
        if val & 0x80 == 0 {
            let length = (blocks as u16 + 1) * HDMA_BLOCK;
            self.log(LogCategory::Bus, LogLevel::Debug, || {
                format!("general purpose DMA, {length} bytes")
            });
            self.hdma_copy(length);
            self.set_io_reg(HDMA5, 0xFF);
        } else {
            self.log(LogCategory::Bus, LogLevel::Debug, || {
                format!("HBlank DMA armed, {} blocks", blocks as u16 + 1)
            });
            self.hdma = Hdma {
                active: true,
                remaining: blocks,
            };
            self.set_io_reg(HDMA5, blocks);
        }
    }

    fn hblank_dma(&mut self) {
        if !self.hdma.active {
            return;
        }
        self.hdma_copy(HDMA_BLOCK);
        if self.hdma.remaining > 0 {
            self.hdma.remaining -= 1;
            self.set_io_reg(HDMA5, self.hdma.remaining);
        } else {
            self.hdma.active = false;
            self.set_io_reg(HDMA5, 0xFF);
        }
    }

    /// Copy `length` bytes from the HDMA source to the HDMA destination in
    /// the current VRAM bank, leaving both registers pointing past the block
    fn hdma_copy(&mut self, length: u16) {
        let mut source = (self.io_reg(HDMA1) as u16) << 8 | (self.io_reg(HDMA2) & 0xF0) as u16;
        let mut dest = ((self.io_reg(HDMA3) as u16) << 8 & 0x1F00) | (self.io_reg(HDMA4) & 0xF0) as u16;
        let bank = self.vram_bank();

        for _ in 0..length {
            let byte = self.read(source);
            self.vram[bank][(dest & 0x1FFF) as usize] = byte;
            source = source.wrapping_add(1);
            dest = dest.wrapping_add(1);
        }

        self.set_io_reg(HDMA1, (source >> 8) as u8);
        self.set_io_reg(HDMA2, source as u8);
        self.set_io_reg(HDMA3, (dest >> 8) as u8 & 0x1F);
        self.set_io_reg(HDMA4, dest as u8);
    }

    fn write_rom_area(&mut self, addr: u16, val: u8) {
        if self.boot_rom.as_ref().is_some_and(|boot| boot.covers(addr)) {
            self.log(LogCategory::Bus, LogLevel::Trace, || {
                format!("write {val:02X} to {addr:04X} under the boot ROM dropped")
            });
            return;
        }
        let Some(cart) = self.cartridge.as_mut() else {
            return;
        };

        let before = cart.rom_bank();
        cart.write(addr, val);
        let after = cart.rom_bank();
        if before != after {
            self.log(LogCategory::Cartridge, LogLevel::Debug, || {
                format!("ROM bank {before} -> {after} (wrote {val:02X} to {addr:04X})")
            });
        }
    }
}

impl MemoryLr35902 for GbBus {
    fn read(&self, addr: u16) -> u8 {
        match addr {
            0x0000..=0x7FFF => match &self.boot_rom {
                Some(boot) if boot.covers(addr) => boot.read(addr),
                _ => self.cartridge.as_ref().map_or(0xFF, |cart| cart.read(addr)),
            },
            0x8000..=0x9FFF => self.vram[self.vram_bank()][(addr - 0x8000) as usize],
            0xA000..=0xBFFF => self.cartridge.as_ref().map_or(0xFF, |cart| cart.read(addr)),
            0xC000..=0xCFFF => self.wram[0][(addr - 0xC000) as usize],
            0xD000..=0xDFFF => self.wram[self.wram_bank()][(addr - 0xD000) as usize],
            // Echo RAM
            0xE000..=0xFDFF => self.read(addr - 0x2000),
            0xFE00..=0xFE9F => self.oam[(addr - 0xFE00) as usize],
            0xFEA0..=0xFEFF => 0xFF,
            0xFF00..=0xFF7F => self.read_io(addr),
            0xFF80..=0xFFFE => self.hram[(addr - 0xFF80) as usize],
            0xFFFF => self.interrupts.read_ie(),
        }
    }

    fn write(&mut self, addr: u16, val: u8) {
        match addr {
            0x0000..=0x7FFF => self.write_rom_area(addr, val),
            0x8000..=0x9FFF => {
                let bank = self.vram_bank();
                self.vram[bank][(addr - 0x8000) as usize] = val;
            }
            0xA000..=0xBFFF => {
                if let Some(cart) = self.cartridge.as_mut() {
                    cart.write(addr, val);
                }
            }
            0xC000..=0xCFFF => self.wram[0][(addr - 0xC000) as usize] = val,
            0xD000..=0xDFFF => {
                let bank = self.wram_bank();
                self.wram[bank][(addr - 0xD000) as usize] = val;
            }
            0xE000..=0xFDFF => self.write(addr - 0x2000, val),
            0xFE00..=0xFE9F => self.oam[(addr - 0xFE00) as usize] = val,
            0xFEA0..=0xFEFF => {}
            0xFF00..=0xFF7F => self.write_io(addr, val),
            0xFF80..=0xFFFE => self.hram[(addr - 0xFF80) as usize] = val,
            0xFFFF => self.interrupts.write_ie(val),
        }
    }

    fn take_pc_redirect(&mut self) -> Option<u16> {
        self.pc_redirect.take()
    }

    fn pending_interrupts(&self) -> u8 {
        self.interrupts.deliverable()
    }
}
