//! LCD timing and scanline rendering
//!
//! Each line is 456 dots. Visible lines (LY 0-143) run mode 2 (OAM search,
//! 80 dots), mode 3 (pixel transfer, 172 dots) and mode 0 (HBlank, the
//! rest); lines 144-153 are mode 1 (VBlank). Background and window pixels
//! for a line are produced when it enters mode 3.
//!
//! Two frame buffers are kept. The in-progress one is written line by line
//! and swapped into the completed `Arc` when LY wraps from 153 to 0, so a
//! reader holding the completed frame never sees a partial picture.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::interrupts::{Interrupt, Interrupts};
use crate::palette::CgbPalette;
use crate::GbError;

pub const SCREEN_WIDTH: usize = 160;
pub const SCREEN_HEIGHT: usize = 144;
pub const DOTS_PER_LINE: u32 = 456;
pub const LINES_PER_FRAME: u8 = 154;
pub const CYCLES_PER_FRAME: u32 = DOTS_PER_LINE * LINES_PER_FRAME as u32;

const OAM_SEARCH_END: u32 = 80;
const TRANSFER_END: u32 = 252;
const VBLANK_START: u8 = 144;

const WHITE: [u8; 3] = [0xFF, 0xFF, 0xFF];

// LCDC bits
const LCDC_ENABLE: u8 = 0x80;
const LCDC_WIN_TILEMAP: u8 = 0x40;
const LCDC_WIN_ENABLE: u8 = 0x20;
const LCDC_BG_WIN_TILES: u8 = 0x10;
const LCDC_BG_TILEMAP: u8 = 0x08;
const LCDC_BG_WIN_ENABLE: u8 = 0x01;

// STAT bits
const STAT_MODE_MASK: u8 = 0x03;
const STAT_COINCIDENCE: u8 = 0x04;
const STAT_HBLANK_INT: u8 = 0x08;
const STAT_VBLANK_INT: u8 = 0x10;
const STAT_OAM_INT: u8 = 0x20;
const STAT_LYC_INT: u8 = 0x40;
const STAT_WRITABLE: u8 = 0x78;

// CGB background attributes (VRAM bank 1)
const ATTR_PALETTE: u8 = 0x07;
const ATTR_BANK: u8 = 0x08;
const ATTR_HFLIP: u8 = 0x20;
const ATTR_VFLIP: u8 = 0x40;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LcdMode {
    HBlank = 0,
    VBlank = 1,
    OamSearch = 2,
    Transfer = 3,
}

/// 160x144 RGB picture
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameBuffer {
    pixels: Vec<[u8; 3]>,
}

impl Default for FrameBuffer {
    fn default() -> Self {
        Self {
            pixels: vec![WHITE; SCREEN_WIDTH * SCREEN_HEIGHT],
        }
    }
}

impl FrameBuffer {
    pub fn pixel(&self, x: usize, y: usize) -> [u8; 3] {
        self.pixels[y * SCREEN_WIDTH + x]
    }

    pub fn row(&self, y: usize) -> &[[u8; 3]] {
        &self.pixels[y * SCREEN_WIDTH..(y + 1) * SCREEN_WIDTH]
    }

    pub fn pixels(&self) -> &[[u8; 3]] {
        &self.pixels
    }

    fn row_mut(&mut self, y: usize) -> &mut [[u8; 3]] {
        &mut self.pixels[y * SCREEN_WIDTH..(y + 1) * SCREEN_WIDTH]
    }
}

/// Video memory and colours a line is rendered from
pub struct VideoSource<'a> {
    pub vram: &'a [[u8; 0x2000]; 2],
    /// Colour mode background palettes; `None` on monochrome hardware
    pub cgb_palette: Option<&'a CgbPalette>,
    /// Monochrome shades for BGP values 0-3
    pub dmg_colors: [[u8; 3]; 4],
}

/// What happened during one `tick`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LcdEvents {
    /// Number of HBlank periods entered
    pub hblanks: u32,
    /// The completed frame was replaced
    pub frame: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Lcd {
    pub lcdc: u8,
    stat: u8,
    pub scy: u8,
    pub scx: u8,
    ly: u8,
    lyc: u8,
    pub bgp: u8,
    pub obp0: u8,
    pub obp1: u8,
    pub wy: u8,
    pub wx: u8,
    dot: u32,
    mode: LcdMode,
    #[serde(skip)]
    completed: Arc<FrameBuffer>,
    #[serde(skip)]
    in_progress: Box<FrameBuffer>,
}

impl Default for Lcd {
    fn default() -> Self {
        Self::new()
    }
}

impl Lcd {
    pub fn new() -> Self {
        Self {
            lcdc: 0x91,
            stat: STAT_COINCIDENCE,
            scy: 0,
            scx: 0,
            ly: 0,
            lyc: 0,
            bgp: 0xFC,
            obp0: 0xFF,
            obp1: 0xFF,
            wy: 0,
            wx: 0,
            dot: 0,
            mode: LcdMode::OamSearch,
            completed: Arc::default(),
            in_progress: Box::default(),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.lcdc & LCDC_ENABLE != 0
    }

    pub fn ly(&self) -> u8 {
        self.ly
    }

    pub fn mode(&self) -> LcdMode {
        self.mode
    }

    /// Dot within the current line
    pub fn dot(&self) -> u32 {
        self.dot
    }

    /// The last finished frame
    pub fn completed_frame(&self) -> Arc<FrameBuffer> {
        Arc::clone(&self.completed)
    }

    pub fn read_register(&self, addr: u16) -> u8 {
        match addr {
            0xFF40 => self.lcdc,
            0xFF41 => 0x80 | (self.stat & !STAT_MODE_MASK) | self.mode as u8,
            0xFF42 => self.scy,
            0xFF43 => self.scx,
            0xFF44 => self.ly,
            0xFF45 => self.lyc,
            0xFF47 => self.bgp,
            0xFF48 => self.obp0,
            0xFF49 => self.obp1,
            0xFF4A => self.wy,
            0xFF4B => self.wx,
            _ => 0xFF,
        }
    }

    pub fn write_register(&mut self, addr: u16, val: u8, interrupts: &mut Interrupts) {
        match addr {
            0xFF40 => self.write_lcdc(val, interrupts),
            0xFF41 => self.stat = (self.stat & !STAT_WRITABLE) | (val & STAT_WRITABLE),
            0xFF42 => self.scy = val,
            0xFF43 => self.scx = val,
            0xFF44 => {
                self.ly = 0;
                if self.is_enabled() {
                    // Jump straight to the mode of the new position; the
                    // skipped edge raises nothing
                    self.mode = self.mode_for_position();
                }
                self.update_coincidence(interrupts);
            }
            0xFF45 => {
                self.lyc = val;
                self.update_coincidence(interrupts);
            }
            0xFF47 => self.bgp = val,
            0xFF48 => self.obp0 = val,
            0xFF49 => self.obp1 = val,
            0xFF4A => self.wy = val,
            0xFF4B => self.wx = val,
            _ => {}
        }
    }

    /// Seed registers from the power-on table without side effects
    pub fn load_register(&mut self, addr: u16, val: u8) {
        match addr {
            0xFF40 => self.lcdc = val,
            0xFF41 => self.stat = val & (STAT_WRITABLE | STAT_COINCIDENCE),
            0xFF44 => self.ly = val % LINES_PER_FRAME,
            0xFF45 => self.lyc = val,
            _ => {
                let mut scratch = Interrupts::new();
                self.write_register(addr, val, &mut scratch);
            }
        }
    }

    fn write_lcdc(&mut self, val: u8, interrupts: &mut Interrupts) {
        let was_enabled = self.is_enabled();
        self.lcdc = val;
        match (was_enabled, self.is_enabled()) {
            (true, false) => self.blank(),
            (false, true) => {
                self.dot = 0;
                self.ly = 0;
                self.mode = LcdMode::OamSearch;
                self.update_coincidence(interrupts);
            }
            _ => {}
        }
    }

    /// LCD switched off: mode 0 at line 0, and a white picture until it
    /// comes back. Coincidence is dropped so switching back on re-detects
    /// LY=LYC as a fresh edge.
    fn blank(&mut self) {
        self.dot = 0;
        self.ly = 0;
        self.mode = LcdMode::HBlank;
        self.stat &= !STAT_COINCIDENCE;
        self.completed = Arc::default();
        *self.in_progress = FrameBuffer::default();
    }

    /// Check counters restored from a snapshot.
    ///
    /// LY and the dot counter must lie within a frame, and the mode must be
    /// the one `tick` would report at that position.
    pub fn check_timing(&self) -> Result<(), GbError> {
        if self.ly >= LINES_PER_FRAME {
            return Err(invalid("lcd.ly", self.ly));
        }
        if self.dot >= DOTS_PER_LINE {
            return Err(invalid("lcd.dot", self.dot));
        }
        let expected = if self.is_enabled() {
            self.mode_for_position()
        } else {
            LcdMode::HBlank
        };
        if self.mode != expected {
            return Err(invalid("lcd.mode", format!("{:?}", self.mode)));
        }
        Ok(())
    }

    /// Take registers and timing from `saved`, keeping the current pictures
    pub fn restore(&mut self, mut saved: Lcd) {
        saved.completed = Arc::clone(&self.completed);
        saved.in_progress = std::mem::take(&mut self.in_progress);
        *self = saved;
    }

    fn update_coincidence(&mut self, interrupts: &mut Interrupts) {
        let was_equal = self.stat & STAT_COINCIDENCE != 0;
        if self.ly == self.lyc {
            self.stat |= STAT_COINCIDENCE;
            if !was_equal && self.stat & STAT_LYC_INT != 0 {
                interrupts.request(Interrupt::LcdStat);
            }
        } else {
            self.stat &= !STAT_COINCIDENCE;
        }
    }

    fn mode_for_position(&self) -> LcdMode {
        if self.ly >= VBLANK_START {
            LcdMode::VBlank
        } else if self.dot < OAM_SEARCH_END {
            LcdMode::OamSearch
        } else if self.dot < TRANSFER_END {
            LcdMode::Transfer
        } else {
            LcdMode::HBlank
        }
    }

    /// Next dot at which the mode can change
    fn next_boundary(&self) -> u32 {
        if self.ly >= VBLANK_START || self.dot >= TRANSFER_END {
            DOTS_PER_LINE
        } else if self.dot >= OAM_SEARCH_END {
            TRANSFER_END
        } else {
            OAM_SEARCH_END
        }
    }

    /// Advance by `cycles` dots
    pub fn tick(
        &mut self,
        cycles: u32,
        video: &VideoSource,
        interrupts: &mut Interrupts,
    ) -> LcdEvents {
        let mut events = LcdEvents::default();
        if !self.is_enabled() {
            return events;
        }

        let mut remaining = cycles;
        while remaining > 0 {
            let step = remaining.min(self.next_boundary() - self.dot);
            self.dot += step;
            remaining -= step;

            if self.dot >= DOTS_PER_LINE {
                self.dot = 0;
                self.ly += 1;
                if self.ly == LINES_PER_FRAME {
                    self.ly = 0;
                    self.swap_frames();
                    events.frame = true;
                }
                self.update_coincidence(interrupts);
            }

            let mode = self.mode_for_position();
            if mode != self.mode {
                self.enter_mode(mode, video, interrupts, &mut events);
            }
        }
        events
    }

    fn enter_mode(
        &mut self,
        mode: LcdMode,
        video: &VideoSource,
        interrupts: &mut Interrupts,
        events: &mut LcdEvents,
    ) {
        self.mode = mode;
        let stat_enable = match mode {
            LcdMode::HBlank => {
                events.hblanks += 1;
                STAT_HBLANK_INT
            }
            LcdMode::VBlank => {
                interrupts.request(Interrupt::VBlank);
                STAT_VBLANK_INT
            }
            LcdMode::OamSearch => STAT_OAM_INT,
            LcdMode::Transfer => {
                let line = self.render_line(video);
                self.in_progress
                    .row_mut(self.ly as usize)
                    .copy_from_slice(&line);
                0
            }
        };
        if self.stat & stat_enable != 0 {
            interrupts.request(Interrupt::LcdStat);
        }
    }

    fn swap_frames(&mut self) {
        let finished = std::mem::take(&mut *self.in_progress);
        self.completed = Arc::new(finished);
    }

    /// Address of a tile row within a VRAM bank
    fn tile_row_addr(&self, tile_index: u8, row: usize) -> usize {
        let tile_addr = if self.lcdc & LCDC_BG_WIN_TILES != 0 {
            tile_index as usize * 16
        } else {
            // Signed indices around 0x9000
            (0x1000 + tile_index as i8 as isize * 16) as usize
        };
        tile_addr + row * 2
    }

    /// Background and window pixels for the current line
    fn render_line(&self, video: &VideoSource) -> [[u8; 3]; SCREEN_WIDTH] {
        let mut line = [video.dmg_colors[0]; SCREEN_WIDTH];
        let cgb = video.cgb_palette;
        if cgb.is_none() && self.lcdc & LCDC_BG_WIN_ENABLE == 0 {
            return line;
        }

        let ly = self.ly as usize;
        let window_line = self.lcdc & LCDC_WIN_ENABLE != 0 && self.wy as usize <= ly;

        for (x, pixel) in line.iter_mut().enumerate() {
            let in_window = window_line && x + 7 >= self.wx as usize;
            let (map_base, px, py) = if in_window {
                let map = if self.lcdc & LCDC_WIN_TILEMAP != 0 {
                    0x1C00
                } else {
                    0x1800
                };
                (map, x + 7 - self.wx as usize, ly - self.wy as usize)
            } else {
                let map = if self.lcdc & LCDC_BG_TILEMAP != 0 {
                    0x1C00
                } else {
                    0x1800
                };
                (
                    map,
                    (x + self.scx as usize) & 0xFF,
                    (ly + self.scy as usize) & 0xFF,
                )
            };

            let map_addr = map_base + (py / 8) * 32 + px / 8;
            let tile_index = video.vram[0][map_addr];
            let attrs = if cgb.is_some() { video.vram[1][map_addr] } else { 0 };

            let mut row = py % 8;
            if attrs & ATTR_VFLIP != 0 {
                row = 7 - row;
            }
            let mut bit = 7 - px % 8;
            if attrs & ATTR_HFLIP != 0 {
                bit = px % 8;
            }

            let bank = &video.vram[(attrs & ATTR_BANK != 0) as usize];
            let addr = self.tile_row_addr(tile_index, row);
            let lo = (bank[addr] >> bit) & 1;
            let hi = (bank[addr + 1] >> bit) & 1;
            let color = (hi << 1) | lo;

            *pixel = match cgb {
                Some(palette) => palette.color(attrs & ATTR_PALETTE, color),
                None => video.dmg_colors[((self.bgp >> (color * 2)) & 0x03) as usize],
            };
        }
        line
    }
}

fn invalid(field: &'static str, value: impl ToString) -> GbError {
    GbError::InvalidSnapshot {
        field,
        value: value.to_string(),
    }
}
