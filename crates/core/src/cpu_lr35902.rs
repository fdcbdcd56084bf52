//! Sharp LR35902 CPU core (Game Boy CPU)
//!
//! This is a Z80-like CPU used in Game Boy and Game Boy Color.
//!
//! # Decoding
//!
//! The CB prefix opens a second page of 256 opcodes. Both pages share one
//! logical opcode space of 512 entries: base opcodes keep their byte value,
//! CB opcodes become `0x100 | byte`. Two fixed tables are indexed by that
//! value: the operand length (0, 1 or 2 immediate bytes) and the routine
//! that executes the instruction.
//!
//! Routines receive the decoded immediate and move PC themselves. The
//! dispatcher never advances PC, because branches, calls and returns all
//! overwrite it.
//!
//! # Interrupts
//!
//! The CPU reads IE (0xFFFF) and IF (0xFF0F) through the bus. When
//! `IE & IF & 0x1F` is non-zero and IME is set, the lowest pending line is
//! serviced: PC is pushed, the IF bit is cleared, IME is cleared and PC jumps
//! to `0x40 + 8 * line`. EI takes effect after the following instruction;
//! RETI re-enables immediately.

mod flags;
mod ops;

pub use flags::{
    add16_with_flags, add8_with_flags, add_signed_with_flags, and8_with_flags, daa_with_flags,
    or8_with_flags, sub8_with_flags, xor8_with_flags,
};

use serde::{Deserialize, Serialize};

/// Memory interface trait for the LR35902 CPU
pub trait MemoryLr35902 {
    /// Read a byte from memory
    fn read(&self, addr: u16) -> u8;

    /// Write a byte to memory
    fn write(&mut self, addr: u16, val: u8);

    /// A jump target the bus wants applied once the current instruction
    /// finishes (the boot ROM unmapping itself, for instance).
    fn take_pc_redirect(&mut self) -> Option<u16> {
        None
    }

    /// Interrupt lines both requested (IF) and enabled (IE)
    fn pending_interrupts(&self) -> u8 {
        self.read(IE_ADDR) & self.read(IF_ADDR) & 0x1F
    }
}

// Flag bit positions (in F register)
pub const FLAG_Z: u8 = 0b1000_0000; // Zero
pub const FLAG_N: u8 = 0b0100_0000; // Subtract (BCD)
pub const FLAG_H: u8 = 0b0010_0000; // Half Carry (BCD)
pub const FLAG_C: u8 = 0b0001_0000; // Carry

/// Interrupt Flag register
pub const IF_ADDR: u16 = 0xFF0F;
/// Interrupt Enable register
pub const IE_ADDR: u16 = 0xFFFF;
/// Divider register, reset by STOP
const DIV_ADDR: u16 = 0xFF04;

/// Service routine addresses, indexed by interrupt line
pub const INTERRUPT_VECTORS: [u16; 5] = [0x0040, 0x0048, 0x0050, 0x0058, 0x0060];

/// Cycles spent pushing PC and jumping to a vector
pub const INTERRUPT_DISPATCH_CYCLES: u32 = 20;

/// Cycles reported for a step in which the CPU does nothing
pub const IDLE_CYCLES: u32 = 4;

const CB_PREFIX: u8 = 0xCB;
const JOYPAD_LINE_MASK: u8 = 0x10;

/// Execution state of the core
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunMode {
    Running,
    Halted,
    Stopped,
}

/// Signature shared by every instruction routine: the low byte of the
/// logical opcode and the decoded immediate.
type Op<M> = fn(&mut CpuLr35902<M>, u8, u16) -> u32;

/// Number of immediate bytes following each logical opcode.
pub const OPERAND_LENGTHS: [u8; 512] = build_operand_lengths();

const fn build_operand_lengths() -> [u8; 512] {
    let mut table = [0u8; 512];
    let mut op = 0;
    while op < 256 {
        table[op] = base_operand_length(op as u8);
        op += 1;
    }
    // CB-page instructions never take an immediate
    table
}

const fn base_operand_length(op: u8) -> u8 {
    match op {
        0x01 | 0x11 | 0x21 | 0x31 | 0x08 | 0xC2 | 0xC3 | 0xC4 | 0xCA | 0xCC | 0xCD | 0xD2
        | 0xD4 | 0xDA | 0xDC | 0xEA | 0xFA => 2,
        0x06 | 0x0E | 0x16 | 0x1E | 0x26 | 0x2E | 0x36 | 0x3E | 0x10 | 0x18 | 0x20 | 0x28
        | 0x30 | 0x38 | 0xC6 | 0xCE | 0xD6 | 0xDE | 0xE6 | 0xEE | 0xF6 | 0xFE | 0xE0 | 0xF0
        | 0xE8 | 0xF8 => 1,
        _ => 0,
    }
}

/// Opcodes with no defined behaviour on this CPU
pub const ILLEGAL_OPCODES: [u8; 11] = [
    0xD3, 0xDB, 0xDD, 0xE3, 0xE4, 0xEB, 0xEC, 0xED, 0xF4, 0xFC, 0xFD,
];

/// Sharp LR35902 CPU state
#[derive(Debug)]
pub struct CpuLr35902<M: MemoryLr35902> {
    /// Accumulator & Flags (combined as AF)
    pub a: u8,
    pub f: u8,
    /// BC register pair
    pub b: u8,
    pub c: u8,
    /// DE register pair
    pub d: u8,
    pub e: u8,
    /// HL register pair
    pub h: u8,
    pub l: u8,
    /// Stack pointer
    pub sp: u16,
    /// Program counter
    pub pc: u16,
    /// Interrupt Master Enable flag
    pub ime: bool,
    /// Set by EI; IME turns on after the next instruction completes
    pub ime_pending: bool,
    pub mode: RunMode,
    /// Total cycles executed
    pub cycles: u64,
    stuck: bool,
    /// Memory interface
    pub memory: M,
}

impl<M: MemoryLr35902> CpuLr35902<M> {
    const OPS: [Op<M>; 512] = Self::build_ops();

    const fn build_ops() -> [Op<M>; 512] {
        let mut table = [Self::op_illegal as Op<M>; 512];
        let mut op = 0;
        while op < 512 {
            table[op] = Self::op_for(op);
            op += 1;
        }
        table
    }

    /// Create a new LR35902 CPU in the post-boot state
    pub fn new(memory: M) -> Self {
        let mut cpu = Self {
            a: 0,
            f: 0,
            b: 0,
            c: 0,
            d: 0,
            e: 0,
            h: 0,
            l: 0,
            sp: 0,
            pc: 0,
            ime: false,
            ime_pending: false,
            mode: RunMode::Running,
            cycles: 0,
            stuck: false,
            memory,
        };
        cpu.reset();
        cpu
    }

    /// Reset to the register values the boot ROM leaves behind, with PC at
    /// the cartridge entry point.
    pub fn reset(&mut self) {
        self.a = 0x01;
        self.f = 0xB0;
        self.b = 0x00;
        self.c = 0x13;
        self.d = 0x00;
        self.e = 0xD8;
        self.h = 0x01;
        self.l = 0x4D;
        self.sp = 0xFFFE;
        self.pc = 0x0100;
        self.clear_control_state();
    }

    /// Reset with every register cleared and PC at 0, for running a boot ROM
    pub fn reset_for_boot_rom(&mut self) {
        self.a = 0;
        self.f = 0;
        self.b = 0;
        self.c = 0;
        self.d = 0;
        self.e = 0;
        self.h = 0;
        self.l = 0;
        self.sp = 0;
        self.pc = 0;
        self.clear_control_state();
    }

    fn clear_control_state(&mut self) {
        self.ime = false;
        self.ime_pending = false;
        self.mode = RunMode::Running;
        self.cycles = 0;
        self.stuck = false;
    }

    /// True once an instruction has left both PC and SP unchanged while not
    /// halted. Stays set until [`clear_stuck`](Self::clear_stuck) or reset.
    pub fn is_stuck(&self) -> bool {
        self.stuck
    }

    pub fn clear_stuck(&mut self) {
        self.stuck = false;
    }

    /// Interrupt lines that are both requested and enabled
    pub fn pending_interrupts(&self) -> u8 {
        self.memory.pending_interrupts()
    }

    /// Execute one instruction or service one interrupt
    pub fn step(&mut self) -> u32 {
        let cycles = self.step_inner();
        self.cycles += cycles as u64;
        cycles
    }

    fn step_inner(&mut self) -> u32 {
        let pending = self.pending_interrupts();

        if self.mode == RunMode::Stopped {
            // Only a joypad line brings the CPU out of STOP
            if pending & JOYPAD_LINE_MASK == 0 {
                return IDLE_CYCLES;
            }
            self.mode = RunMode::Running;
        }

        if pending != 0 {
            if self.ime {
                return self.dispatch_interrupt(pending);
            }
            if self.mode == RunMode::Halted {
                // IME is off: leave HALT without servicing and continue
                // after the HALT opcode.
                self.mode = RunMode::Running;
                self.pc = self.pc.wrapping_add(1);
                return IDLE_CYCLES;
            }
        }

        if self.mode == RunMode::Halted {
            return IDLE_CYCLES;
        }

        self.execute_next()
    }

    fn dispatch_interrupt(&mut self, pending: u8) -> u32 {
        let line = pending.trailing_zeros() as usize;

        if self.mode == RunMode::Halted {
            // HALT left PC on itself; resume after it on return
            self.pc = self.pc.wrapping_add(1);
        }
        self.mode = RunMode::Running;
        self.ime = false;
        self.ime_pending = false;

        let requested = self.memory.read(IF_ADDR);
        self.memory.write(IF_ADDR, requested & !(1 << line));

        self.push_u16(self.pc);
        self.pc = INTERRUPT_VECTORS[line];
        INTERRUPT_DISPATCH_CYCLES
    }

    /// Fetch the logical opcode at PC and its immediate operand.
    ///
    /// Returns `(logical_opcode, operand)`; PC is left untouched.
    pub fn decode_at_pc(&self) -> (u16, u16) {
        let first = self.memory.read(self.pc);
        let (opcode, operand_start) = if first == CB_PREFIX {
            let second = self.memory.read(self.pc.wrapping_add(1));
            (0x100 | second as u16, self.pc.wrapping_add(2))
        } else {
            (first as u16, self.pc.wrapping_add(1))
        };

        let operand = match OPERAND_LENGTHS[opcode as usize] {
            0 => 0,
            1 => self.memory.read(operand_start) as u16,
            _ => {
                let lo = self.memory.read(operand_start) as u16;
                let hi = self.memory.read(operand_start.wrapping_add(1)) as u16;
                (hi << 8) | lo
            }
        };

        (opcode, operand)
    }

    fn execute_next(&mut self) -> u32 {
        let old_pc = self.pc;
        let old_sp = self.sp;
        let enable_ime_after = self.ime_pending;

        let (opcode, operand) = self.decode_at_pc();
        let cycles = Self::OPS[opcode as usize](self, opcode as u8, operand);

        // DI in between cancels a pending EI
        if enable_ime_after && self.ime_pending {
            self.ime = true;
            self.ime_pending = false;
        }

        if let Some(target) = self.memory.take_pc_redirect() {
            self.pc = target;
        }

        if self.mode == RunMode::Running && self.pc == old_pc && self.sp == old_sp {
            self.stuck = true;
        }

        cycles
    }

    #[inline]
    fn advance(&mut self, len: u16) {
        self.pc = self.pc.wrapping_add(len);
    }

    fn push_u16(&mut self, val: u16) {
        self.memory.write(self.sp.wrapping_sub(1), (val >> 8) as u8);
        self.memory.write(self.sp.wrapping_sub(2), val as u8);
        self.sp = self.sp.wrapping_sub(2);
    }

    fn pop_u16(&mut self) -> u16 {
        let lo = self.memory.read(self.sp) as u16;
        let hi = self.memory.read(self.sp.wrapping_add(1)) as u16;
        self.sp = self.sp.wrapping_add(2);
        (hi << 8) | lo
    }

    // Register pair accessors
    pub fn bc(&self) -> u16 {
        ((self.b as u16) << 8) | (self.c as u16)
    }

    pub fn set_bc(&mut self, val: u16) {
        self.b = (val >> 8) as u8;
        self.c = val as u8;
    }

    pub fn de(&self) -> u16 {
        ((self.d as u16) << 8) | (self.e as u16)
    }

    pub fn set_de(&mut self, val: u16) {
        self.d = (val >> 8) as u8;
        self.e = val as u8;
    }

    pub fn hl(&self) -> u16 {
        ((self.h as u16) << 8) | (self.l as u16)
    }

    pub fn set_hl(&mut self, val: u16) {
        self.h = (val >> 8) as u8;
        self.l = val as u8;
    }

    pub fn af(&self) -> u16 {
        ((self.a as u16) << 8) | (self.f as u16)
    }

    pub fn set_af(&mut self, val: u16) {
        self.a = (val >> 8) as u8;
        self.set_f(val as u8);
    }

    /// Write F; the low nibble is always zero
    #[inline]
    pub fn set_f(&mut self, val: u8) {
        self.f = val & 0xF0;
    }

    #[inline]
    fn flag(&self, flag: u8) -> bool {
        (self.f & flag) != 0
    }

    /// Read register by its 3-bit encoding: B C D E H L (HL) A
    #[inline]
    fn reg(&self, idx: u8) -> u8 {
        match idx & 7 {
            0 => self.b,
            1 => self.c,
            2 => self.d,
            3 => self.e,
            4 => self.h,
            5 => self.l,
            6 => self.memory.read(self.hl()),
            _ => self.a,
        }
    }

    #[inline]
    fn set_reg(&mut self, idx: u8, val: u8) {
        match idx & 7 {
            0 => self.b = val,
            1 => self.c = val,
            2 => self.d = val,
            3 => self.e = val,
            4 => self.h = val,
            5 => self.l = val,
            6 => {
                let hl = self.hl();
                self.memory.write(hl, val);
            }
            _ => self.a = val,
        }
    }

    /// BC, DE, HL, SP by the 2-bit encoding used by 16-bit loads and arithmetic
    #[inline]
    fn reg16(&self, idx: u8) -> u16 {
        match idx & 3 {
            0 => self.bc(),
            1 => self.de(),
            2 => self.hl(),
            _ => self.sp,
        }
    }

    #[inline]
    fn set_reg16(&mut self, idx: u8, val: u16) {
        match idx & 3 {
            0 => self.set_bc(val),
            1 => self.set_de(val),
            2 => self.set_hl(val),
            _ => self.sp = val,
        }
    }

    /// NZ, Z, NC, C
    #[inline]
    fn condition(&self, idx: u8) -> bool {
        match idx & 3 {
            0 => !self.flag(FLAG_Z),
            1 => self.flag(FLAG_Z),
            2 => !self.flag(FLAG_C),
            _ => self.flag(FLAG_C),
        }
    }
}
