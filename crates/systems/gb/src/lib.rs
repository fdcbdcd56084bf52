//! Game Boy system implementation
//!
//! [`GbSystem`] ties the LR35902 core from `emu_core` to the [`bus::GbBus`]
//! and exposes it through the workspace [`System`] trait. Each call to
//! `step_frame` runs one frame's worth of cycles; after every instruction
//! the bus advances the timer, LCD and cartridge clock by the same number of
//! cycles.
//!
//! Runtime settings (log levels, monochrome palette, stuck-CPU policy) come
//! from an [`EmuContext`] shared with the bus.

use std::path::Path;
use std::sync::Arc;

use emu_core::cpu_lr35902::{CpuLr35902, RunMode};
use emu_core::logging::{LogCategory, LogLevel};
use emu_core::{types::Frame, MountPointInfo, System};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

pub mod bootrom;
pub mod bus;
pub mod context;
pub mod interrupts;
pub mod joypad;
pub mod lcd;
pub mod mappers;
pub mod palette;
pub mod timer;

use bootrom::{BootRom, CGB_BOOT_SIZE, DMG_BOOT_SIZE};
use bus::GbBus;
use context::EmuContext;
use interrupts::Interrupts;
use joypad::{Joypad, Key};
use lcd::{FrameBuffer, Lcd, CYCLES_PER_FRAME, SCREEN_HEIGHT, SCREEN_WIDTH};
use mappers::{save_ram, Cartridge, CartridgeError, CartridgeHeader, Rtc};
use timer::Timer;

const CARTRIDGE: &str = "Cartridge";
const BOOT_ROM: &str = "BootROM";

/// Snapshot format understood by `load_state`
const STATE_VERSION: u64 = 1;

#[derive(thiserror::Error, Debug)]
pub enum GbError {
    #[error("Invalid cartridge: {0}")]
    Cartridge(#[from] CartridgeError),
    #[error("No cartridge loaded")]
    NoCartridge,
    #[error("Invalid mount point")]
    InvalidMountPoint,
    #[error("Value {value:#06X} written to {addr:#06X} does not fit in a byte")]
    ValueOutOfRange { addr: u16, value: u16 },
    #[error("CPU stuck at PC={pc:04X} SP={sp:04X}")]
    CpuStuck { pc: u16, sp: u16 },
    #[error("Save RAM I/O failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("Boot ROM must be 256 or 2304 bytes, got {actual}")]
    BootRomSize { actual: usize },
    #[error("{mode} mode needs a {expected}-byte boot ROM, got {actual} bytes")]
    BootRomMode {
        mode: &'static str,
        expected: usize,
        actual: usize,
    },
    #[error("Malformed snapshot: {0}")]
    Snapshot(#[from] serde_json::Error),
    #[error("Snapshot field {field} out of range: {value}")]
    InvalidSnapshot { field: &'static str, value: String },
    #[error("Invalid {field} in configuration: {value:?}")]
    InvalidConfig { field: &'static str, value: String },
}

/// Register file as stored in a snapshot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct CpuSnapshot {
    a: u8,
    f: u8,
    b: u8,
    c: u8,
    d: u8,
    e: u8,
    h: u8,
    l: u8,
    sp: u16,
    pc: u16,
    ime: bool,
    ime_pending: bool,
    mode: RunMode,
}

impl CpuSnapshot {
    fn capture<M>(cpu: &CpuLr35902<M>) -> Self
    where
        M: emu_core::cpu_lr35902::MemoryLr35902,
    {
        Self {
            a: cpu.a,
            f: cpu.f,
            b: cpu.b,
            c: cpu.c,
            d: cpu.d,
            e: cpu.e,
            h: cpu.h,
            l: cpu.l,
            sp: cpu.sp,
            pc: cpu.pc,
            ime: cpu.ime,
            ime_pending: cpu.ime_pending,
            mode: cpu.mode,
        }
    }

    fn restore<M>(&self, cpu: &mut CpuLr35902<M>)
    where
        M: emu_core::cpu_lr35902::MemoryLr35902,
    {
        cpu.a = self.a;
        cpu.set_f(self.f);
        cpu.b = self.b;
        cpu.c = self.c;
        cpu.d = self.d;
        cpu.e = self.e;
        cpu.h = self.h;
        cpu.l = self.l;
        cpu.sp = self.sp;
        cpu.pc = self.pc;
        cpu.ime = self.ime;
        cpu.ime_pending = self.ime_pending;
        cpu.mode = self.mode;
    }
}

/// The boot image has to be the one for the mode the cartridge runs in;
/// otherwise its 0xFF50 write never unmaps the overlay.
fn check_boot_mode(cgb: bool, actual: usize) -> Result<(), GbError> {
    let (mode, expected) = if cgb {
        ("Colour", CGB_BOOT_SIZE)
    } else {
        ("Monochrome", DMG_BOOT_SIZE)
    };
    if actual != expected {
        return Err(GbError::BootRomMode {
            mode,
            expected,
            actual,
        });
    }
    Ok(())
}

/// A snapshot section; absent or null sections are skipped
fn section<T: DeserializeOwned>(
    v: &serde_json::Value,
    key: &str,
) -> Result<Option<T>, GbError> {
    match v.get(key) {
        None | Some(serde_json::Value::Null) => Ok(None),
        Some(part) => Ok(Some(T::deserialize(part)?)),
    }
}

pub struct GbSystem {
    cpu: CpuLr35902<GbBus>,
    ctx: Arc<EmuContext>,
    cgb: bool,
    stuck_reported: bool,
}

impl Default for GbSystem {
    fn default() -> Self {
        Self::new()
    }
}

impl GbSystem {
    pub fn new() -> Self {
        Self::with_context(Arc::new(EmuContext::new()))
    }

    pub fn with_context(ctx: Arc<EmuContext>) -> Self {
        let bus = GbBus::new(Arc::clone(&ctx));
        Self {
            cpu: CpuLr35902::new(bus),
            ctx,
            cgb: false,
            stuck_reported: false,
        }
    }

    pub fn context(&self) -> &Arc<EmuContext> {
        &self.ctx
    }

    /// Running in colour mode
    pub fn is_cgb(&self) -> bool {
        self.cgb
    }

    pub fn cpu(&self) -> &CpuLr35902<GbBus> {
        &self.cpu
    }

    pub fn bus(&self) -> &GbBus {
        &self.cpu.memory
    }

    pub fn cartridge_header(&self) -> Option<&CartridgeHeader> {
        self.cpu.memory.cartridge().map(Cartridge::header)
    }

    pub fn key_event(&mut self, key: Key, pressed: bool) {
        self.cpu.memory.key_event(key, pressed);
    }

    /// The last frame the LCD finished, shared with the display
    pub fn completed_frame(&self) -> Arc<FrameBuffer> {
        self.cpu.memory.lcd.completed_frame()
    }

    /// $FF00-$FF7F as the CPU sees it, for debug viewers
    pub fn io_snapshot(&self) -> [u8; 0x80] {
        self.cpu.memory.io_snapshot()
    }

    fn log(&self, category: LogCategory, level: LogLevel, message: impl FnOnce() -> String) {
        self.ctx.logger().log(category, level, message);
    }

    /// Write battery-backed RAM to `path`.
    ///
    /// Returns `false` without touching the file when the cartridge has no
    /// battery.
    pub fn save_ram_to(&self, path: &Path) -> Result<bool, GbError> {
        let cart = self.cpu.memory.cartridge().ok_or(GbError::NoCartridge)?;
        if !cart.has_battery() {
            return Ok(false);
        }
        save_ram::store(path, cart.ram())?;
        self.log(LogCategory::Cartridge, LogLevel::Info, || {
            format!("wrote {} bytes of save RAM to {}", cart.ram().len(), path.display())
        });
        Ok(true)
    }

    /// Load battery-backed RAM from `path`.
    ///
    /// A missing file is not an error. A file whose size does not match the
    /// cartridge RAM is logged and ignored.
    pub fn load_ram_from(&mut self, path: &Path) -> Result<bool, GbError> {
        let has_battery = self
            .cpu
            .memory
            .cartridge()
            .ok_or(GbError::NoCartridge)?
            .has_battery();
        if !has_battery {
            return Ok(false);
        }
        let Some(data) = save_ram::load(path)? else {
            return Ok(false);
        };

        let Some(cart) = self.cpu.memory.cartridge_mut() else {
            return Err(GbError::NoCartridge);
        };
        let expected = cart.ram().len();
        if cart.load_ram(&data) {
            self.log(LogCategory::Cartridge, LogLevel::Info, || {
                format!("loaded {} bytes of save RAM from {}", data.len(), path.display())
            });
            Ok(true)
        } else {
            self.log(LogCategory::Cartridge, LogLevel::Warn, || {
                format!(
                    "ignoring save RAM {}: {} bytes, cartridge has {}",
                    path.display(),
                    data.len(),
                    expected
                )
            });
            Ok(false)
        }
    }

    fn load_cartridge(&mut self, data: &[u8]) -> Result<(), GbError> {
        let cart = match Cartridge::from_rom(data.to_vec()) {
            Ok(cart) => cart,
            Err(e) => {
                self.log(LogCategory::Cartridge, LogLevel::Error, || {
                    format!("rejected cartridge: {e}")
                });
                return Err(e.into());
            }
        };

        let header = cart.header();
        let cgb = header.is_cgb() && !self.ctx.force_dmg();
        if let Some(boot) = self.cpu.memory.boot_rom() {
            if let Err(e) = check_boot_mode(cgb, boot.size()) {
                self.log(LogCategory::Cartridge, LogLevel::Error, || {
                    format!("rejected cartridge: {e}")
                });
                return Err(e);
            }
        }

        self.log(LogCategory::Cartridge, LogLevel::Info, || {
            format!(
                "loaded \"{}\": {} (type {:02X}), {} ROM banks, {} RAM banks{}",
                header.title,
                cart.mapper_name(),
                header.cart_type_code,
                header.rom_banks,
                header.ram_banks,
                if header.is_cgb() { ", colour" } else { "" }
            )
        });

        self.cgb = cgb;
        self.cpu.memory.insert_cartridge(cart);
        self.reset();
        Ok(())
    }

    fn load_boot_rom(&mut self, data: &[u8]) -> Result<(), GbError> {
        let boot = BootRom::new(data.to_vec())?;
        if self.cpu.memory.cartridge().is_some() {
            if let Err(e) = check_boot_mode(self.cgb, boot.size()) {
                self.log(LogCategory::Bus, LogLevel::Error, || {
                    format!("rejected boot ROM: {e}")
                });
                return Err(e);
            }
        }
        self.log(LogCategory::Bus, LogLevel::Info, || {
            format!("boot ROM mapped, {} bytes", data.len())
        });
        self.cpu.memory.set_boot_rom(Some(boot));
        self.reset();
        Ok(())
    }

    /// Report a stuck CPU once; fail when the context asks for it
    fn check_stuck(&mut self) -> Result<(), GbError> {
        if !self.cpu.is_stuck() {
            return Ok(());
        }
        let (pc, sp) = (self.cpu.pc, self.cpu.sp);
        if !self.stuck_reported {
            self.stuck_reported = true;
            let (opcode, _) = self.cpu.decode_at_pc();
            self.log(LogCategory::CPU, LogLevel::Warn, || {
                format!("CPU stuck at PC={pc:04X} SP={sp:04X}, opcode {opcode:03X}")
            });
        }
        if self.ctx.panic_on_stuck() {
            return Err(GbError::CpuStuck { pc, sp });
        }
        Ok(())
    }

    /// Parse and check every snapshot section, then apply them together.
    ///
    /// Nothing changes unless the whole snapshot is usable.
    fn restore_state(&mut self, v: &serde_json::Value) -> Result<(), GbError> {
        if let Some(version) = v.get("version").and_then(|v| v.as_u64()) {
            if version != STATE_VERSION {
                return Err(GbError::InvalidSnapshot {
                    field: "version",
                    value: version.to_string(),
                });
            }
        }

        let cpu = section::<CpuSnapshot>(v, "cpu")?;
        let interrupts = section::<Interrupts>(v, "interrupts")?;
        let timer = section::<Timer>(v, "timer")?;
        let lcd = section::<Lcd>(v, "lcd")?;
        let joypad = section::<Joypad>(v, "joypad")?;
        let rtc = section::<Rtc>(v, "rtc")?;

        if let Some(timer) = &timer {
            timer.check_counters()?;
        }
        if let Some(lcd) = &lcd {
            lcd.check_timing()?;
        }
        if let Some(rtc) = &rtc {
            rtc.check_registers()?;
        }

        if let Some(cpu) = cpu {
            cpu.restore(&mut self.cpu);
        }
        let bus = &mut self.cpu.memory;
        if let Some(interrupts) = interrupts {
            bus.interrupts = interrupts;
        }
        if let Some(timer) = timer {
            bus.timer = timer;
        }
        if let Some(lcd) = lcd {
            bus.lcd.restore(lcd);
        }
        if let Some(joypad) = joypad {
            bus.joypad = joypad;
        }
        if let (Some(rtc), Some(live)) = (rtc, bus.cartridge_mut().and_then(Cartridge::rtc_mut)) {
            *live = rtc;
        }

        self.cpu.clear_stuck();
        self.stuck_reported = false;
        Ok(())
    }

    /// Convert the completed RGB buffer into packed 0xFFRRGGBB pixels
    fn export_frame(&self) -> Frame {
        let buffer = self.cpu.memory.lcd.completed_frame();
        let mut frame = Frame::new(SCREEN_WIDTH as u32, SCREEN_HEIGHT as u32);
        for (dst, &[r, g, b]) in frame.pixels.iter_mut().zip(buffer.pixels()) {
            *dst = 0xFF00_0000 | (r as u32) << 16 | (g as u32) << 8 | b as u32;
        }
        frame
    }
}

impl System for GbSystem {
    type Error = GbError;

    fn reset(&mut self) {
        self.cpu.memory.reset(self.cgb);
        if self.cpu.memory.boot_rom_active() {
            self.cpu.reset_for_boot_rom();
        } else {
            self.cpu.reset();
            if self.cgb {
                // Colour hardware identifies itself through A
                self.cpu.a = 0x11;
            }
        }
        self.stuck_reported = false;
    }

    fn step_frame(&mut self) -> Result<Frame, Self::Error> {
        if self.cpu.memory.cartridge().is_none() {
            return Err(GbError::NoCartridge);
        }

        let mut cycles = 0;
        while cycles < CYCLES_PER_FRAME {
            let spent = self.cpu.step();
            self.cpu.memory.tick(spent);
            cycles += spent;
            self.check_stuck()?;
        }

        Ok(self.export_frame())
    }

    fn save_state(&self) -> serde_json::Value {
        let bus = &self.cpu.memory;
        serde_json::json!({
            "system": "gb",
            "version": STATE_VERSION,
            "cgb": self.cgb,
            "cpu": CpuSnapshot::capture(&self.cpu),
            "interrupts": bus.interrupts,
            "timer": bus.timer,
            "lcd": bus.lcd,
            "joypad": bus.joypad,
            "rtc": bus.cartridge().and_then(Cartridge::rtc),
        })
    }

    fn load_state(&mut self, v: &serde_json::Value) -> Result<(), serde_json::Error> {
        use serde::de::Error as _;

        self.restore_state(v).map_err(|e| match e {
            GbError::Snapshot(e) => e,
            other => serde_json::Error::custom(other),
        })
    }

    fn supports_save_states(&self) -> bool {
        true
    }

    fn mount_points(&self) -> Vec<MountPointInfo> {
        vec![
            MountPointInfo {
                id: CARTRIDGE.to_string(),
                name: "Cartridge Slot".to_string(),
                extensions: vec!["gb".to_string(), "gbc".to_string()],
                required: true,
            },
            MountPointInfo {
                id: BOOT_ROM.to_string(),
                name: "Boot ROM".to_string(),
                extensions: vec!["bin".to_string()],
                required: false,
            },
        ]
    }

    fn mount(&mut self, mount_point_id: &str, data: &[u8]) -> Result<(), Self::Error> {
        match mount_point_id {
            CARTRIDGE => self.load_cartridge(data),
            BOOT_ROM => self.load_boot_rom(data),
            _ => Err(GbError::InvalidMountPoint),
        }
    }

    fn unmount(&mut self, mount_point_id: &str) -> Result<(), Self::Error> {
        match mount_point_id {
            CARTRIDGE => {
                self.cpu.memory.remove_cartridge();
                self.cgb = false;
            }
            BOOT_ROM => self.cpu.memory.set_boot_rom(None),
            _ => return Err(GbError::InvalidMountPoint),
        }
        self.reset();
        Ok(())
    }

    fn is_mounted(&self, mount_point_id: &str) -> bool {
        match mount_point_id {
            CARTRIDGE => self.cpu.memory.cartridge().is_some(),
            BOOT_ROM => self.cpu.memory.has_boot_rom(),
            _ => false,
        }
    }
}
