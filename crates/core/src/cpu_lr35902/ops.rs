//! Instruction routines for the LR35902.
//!
//! Routines that cover a whole block of the opcode map (LD r,r', ALU A,r,
//! the CB page) decode their register and operation fields from the opcode
//! byte they are handed.

use super::flags::{
    add16_with_flags, add8_with_flags, add_signed_with_flags, and8_with_flags, daa_with_flags,
    or8_with_flags, sub8_with_flags, xor8_with_flags,
};
use super::{CpuLr35902, MemoryLr35902, Op, RunMode, DIV_ADDR, FLAG_C, FLAG_H, FLAG_N, FLAG_Z};

/// Register encoding for (HL) in the 3-bit register field
const HL_INDIRECT: u8 = 6;

impl<M: MemoryLr35902> CpuLr35902<M> {
    /// Routine for a logical opcode (0x000-0x1FF)
    pub(super) const fn op_for(opcode: usize) -> Op<M> {
        match opcode {
            0x000 => Self::op_nop,
            0x001 | 0x011 | 0x021 | 0x031 => Self::op_ld_rr_d16,
            0x002 | 0x012 | 0x022 | 0x032 => Self::op_ld_indirect_a,
            0x00A | 0x01A | 0x02A | 0x03A => Self::op_ld_a_indirect,
            0x003 | 0x013 | 0x023 | 0x033 => Self::op_inc_rr,
            0x00B | 0x01B | 0x02B | 0x03B => Self::op_dec_rr,
            0x004 | 0x00C | 0x014 | 0x01C | 0x024 | 0x02C | 0x034 | 0x03C => Self::op_inc_r,
            0x005 | 0x00D | 0x015 | 0x01D | 0x025 | 0x02D | 0x035 | 0x03D => Self::op_dec_r,
            0x006 | 0x00E | 0x016 | 0x01E | 0x026 | 0x02E | 0x036 | 0x03E => Self::op_ld_r_d8,
            0x007 | 0x00F | 0x017 | 0x01F => Self::op_rotate_a,
            0x008 => Self::op_ld_a16_sp,
            0x009 | 0x019 | 0x029 | 0x039 => Self::op_add_hl_rr,
            0x010 => Self::op_stop,
            0x018 => Self::op_jr,
            0x020 | 0x028 | 0x030 | 0x038 => Self::op_jr_cc,
            0x027 => Self::op_daa,
            0x02F => Self::op_cpl,
            0x037 => Self::op_scf,
            0x03F => Self::op_ccf,
            0x076 => Self::op_halt,
            0x040..=0x07F => Self::op_ld_r_r,
            0x080..=0x0BF => Self::op_alu_r,
            0x0C6 | 0x0CE | 0x0D6 | 0x0DE | 0x0E6 | 0x0EE | 0x0F6 | 0x0FE => Self::op_alu_d8,
            0x0C0 | 0x0C8 | 0x0D0 | 0x0D8 => Self::op_ret_cc,
            0x0C9 => Self::op_ret,
            0x0D9 => Self::op_reti,
            0x0C1 | 0x0D1 | 0x0E1 | 0x0F1 => Self::op_pop,
            0x0C5 | 0x0D5 | 0x0E5 | 0x0F5 => Self::op_push,
            0x0C2 | 0x0CA | 0x0D2 | 0x0DA => Self::op_jp_cc,
            0x0C3 => Self::op_jp,
            0x0E9 => Self::op_jp_hl,
            0x0C4 | 0x0CC | 0x0D4 | 0x0DC => Self::op_call_cc,
            0x0CD => Self::op_call,
            0x0C7 | 0x0CF | 0x0D7 | 0x0DF | 0x0E7 | 0x0EF | 0x0F7 | 0x0FF => Self::op_rst,
            0x0E0 => Self::op_ldh_a8_a,
            0x0F0 => Self::op_ldh_a_a8,
            0x0E2 => Self::op_ld_c_a,
            0x0F2 => Self::op_ld_a_c,
            0x0EA => Self::op_ld_a16_a,
            0x0FA => Self::op_ld_a_a16,
            0x0E8 => Self::op_add_sp_r8,
            0x0F8 => Self::op_ld_hl_sp_r8,
            0x0F9 => Self::op_ld_sp_hl,
            0x0F3 => Self::op_di,
            0x0FB => Self::op_ei,
            0x100..=0x13F => Self::op_cb_shift,
            0x140..=0x17F => Self::op_cb_bit,
            0x180..=0x1BF => Self::op_cb_res,
            0x1C0..=0x1FF => Self::op_cb_set,
            // 0xCB itself is consumed by the decoder
            _ => Self::op_illegal,
        }
    }

    /// Undefined opcode: PC does not move, which the step loop reports as stuck
    pub(super) fn op_illegal(&mut self, _op: u8, _operand: u16) -> u32 {
        4
    }

    fn op_nop(&mut self, _op: u8, _operand: u16) -> u32 {
        self.advance(1);
        4
    }

    // ---- 8-bit loads ----

    fn op_ld_r_r(&mut self, op: u8, _operand: u16) -> u32 {
        let dst = (op >> 3) & 7;
        let src = op & 7;
        let val = self.reg(src);
        self.set_reg(dst, val);
        self.advance(1);
        if dst == HL_INDIRECT || src == HL_INDIRECT {
            8
        } else {
            4
        }
    }

    fn op_ld_r_d8(&mut self, op: u8, operand: u16) -> u32 {
        let dst = (op >> 3) & 7;
        self.set_reg(dst, operand as u8);
        self.advance(2);
        if dst == HL_INDIRECT {
            12
        } else {
            8
        }
    }

    /// (BC), (DE), (HL+), (HL-) used by LD (rr),A and LD A,(rr)
    fn indirect_address(&mut self, op: u8) -> u16 {
        match (op >> 4) & 3 {
            0 => self.bc(),
            1 => self.de(),
            2 => {
                let hl = self.hl();
                self.set_hl(hl.wrapping_add(1));
                hl
            }
            _ => {
                let hl = self.hl();
                self.set_hl(hl.wrapping_sub(1));
                hl
            }
        }
    }

    fn op_ld_indirect_a(&mut self, op: u8, _operand: u16) -> u32 {
        let addr = self.indirect_address(op);
        self.memory.write(addr, self.a);
        self.advance(1);
        8
    }

    fn op_ld_a_indirect(&mut self, op: u8, _operand: u16) -> u32 {
        let addr = self.indirect_address(op);
        self.a = self.memory.read(addr);
        self.advance(1);
        8
    }

    fn op_ldh_a8_a(&mut self, _op: u8, operand: u16) -> u32 {
        self.memory.write(0xFF00 | (operand & 0xFF), self.a);
        self.advance(2);
        12
    }

    fn op_ldh_a_a8(&mut self, _op: u8, operand: u16) -> u32 {
        self.a = self.memory.read(0xFF00 | (operand & 0xFF));
        self.advance(2);
        12
    }

    fn op_ld_c_a(&mut self, _op: u8, _operand: u16) -> u32 {
        self.memory.write(0xFF00 | self.c as u16, self.a);
        self.advance(1);
        8
    }

    fn op_ld_a_c(&mut self, _op: u8, _operand: u16) -> u32 {
        self.a = self.memory.read(0xFF00 | self.c as u16);
        self.advance(1);
        8
    }

    fn op_ld_a16_a(&mut self, _op: u8, operand: u16) -> u32 {
        self.memory.write(operand, self.a);
        self.advance(3);
        16
    }

    fn op_ld_a_a16(&mut self, _op: u8, operand: u16) -> u32 {
        self.a = self.memory.read(operand);
        self.advance(3);
        16
    }

    // ---- 16-bit loads and stack ----

    fn op_ld_rr_d16(&mut self, op: u8, operand: u16) -> u32 {
        self.set_reg16(op >> 4, operand);
        self.advance(3);
        12
    }

    fn op_ld_a16_sp(&mut self, _op: u8, operand: u16) -> u32 {
        self.memory.write(operand, self.sp as u8);
        self.memory.write(operand.wrapping_add(1), (self.sp >> 8) as u8);
        self.advance(3);
        20
    }

    fn op_ld_sp_hl(&mut self, _op: u8, _operand: u16) -> u32 {
        self.sp = self.hl();
        self.advance(1);
        8
    }

    fn op_ld_hl_sp_r8(&mut self, _op: u8, operand: u16) -> u32 {
        let (result, flags) = add_signed_with_flags(self.sp, operand as u8);
        self.set_hl(result);
        self.set_f(flags);
        self.advance(2);
        12
    }

    fn op_push(&mut self, op: u8, _operand: u16) -> u32 {
        let val = match (op >> 4) & 3 {
            3 => self.af(),
            idx => self.reg16(idx),
        };
        self.push_u16(val);
        self.advance(1);
        16
    }

    fn op_pop(&mut self, op: u8, _operand: u16) -> u32 {
        let val = self.pop_u16();
        match (op >> 4) & 3 {
            3 => self.set_af(val),
            idx => self.set_reg16(idx, val),
        }
        self.advance(1);
        12
    }

    // ---- 8-bit arithmetic ----

    fn alu(&mut self, sel: u8, val: u8) {
        let carry = self.flag(FLAG_C);
        let (result, flags) = match sel & 7 {
            0 => add8_with_flags(self.a, val, false),
            1 => add8_with_flags(self.a, val, carry),
            2 => sub8_with_flags(self.a, val, false),
            3 => sub8_with_flags(self.a, val, carry),
            4 => and8_with_flags(self.a, val),
            5 => xor8_with_flags(self.a, val),
            6 => or8_with_flags(self.a, val),
            _ => {
                // CP: flags only
                let (_, flags) = sub8_with_flags(self.a, val, false);
                (self.a, flags)
            }
        };
        self.a = result;
        self.set_f(flags);
    }

    fn op_alu_r(&mut self, op: u8, _operand: u16) -> u32 {
        let src = op & 7;
        let val = self.reg(src);
        self.alu(op >> 3, val);
        self.advance(1);
        if src == HL_INDIRECT {
            8
        } else {
            4
        }
    }

    fn op_alu_d8(&mut self, op: u8, operand: u16) -> u32 {
        self.alu(op >> 3, operand as u8);
        self.advance(2);
        8
    }

    fn op_inc_r(&mut self, op: u8, _operand: u16) -> u32 {
        let idx = (op >> 3) & 7;
        let (result, flags) = add8_with_flags(self.reg(idx), 1, false);
        self.set_reg(idx, result);
        self.set_f((flags & !FLAG_C) | (self.f & FLAG_C));
        self.advance(1);
        if idx == HL_INDIRECT {
            12
        } else {
            4
        }
    }

    fn op_dec_r(&mut self, op: u8, _operand: u16) -> u32 {
        let idx = (op >> 3) & 7;
        let (result, flags) = sub8_with_flags(self.reg(idx), 1, false);
        self.set_reg(idx, result);
        self.set_f((flags & !FLAG_C) | (self.f & FLAG_C));
        self.advance(1);
        if idx == HL_INDIRECT {
            12
        } else {
            4
        }
    }

    fn op_daa(&mut self, _op: u8, _operand: u16) -> u32 {
        let (result, flags) = daa_with_flags(self.a, self.f);
        self.a = result;
        self.set_f(flags);
        self.advance(1);
        4
    }

    fn op_cpl(&mut self, _op: u8, _operand: u16) -> u32 {
        self.a = !self.a;
        self.set_f(self.f | FLAG_N | FLAG_H);
        self.advance(1);
        4
    }

    fn op_scf(&mut self, _op: u8, _operand: u16) -> u32 {
        self.set_f((self.f & FLAG_Z) | FLAG_C);
        self.advance(1);
        4
    }

    fn op_ccf(&mut self, _op: u8, _operand: u16) -> u32 {
        self.set_f((self.f & (FLAG_Z | FLAG_C)) ^ FLAG_C);
        self.advance(1);
        4
    }

    // ---- 16-bit arithmetic ----

    fn op_inc_rr(&mut self, op: u8, _operand: u16) -> u32 {
        let idx = op >> 4;
        self.set_reg16(idx, self.reg16(idx).wrapping_add(1));
        self.advance(1);
        8
    }

    fn op_dec_rr(&mut self, op: u8, _operand: u16) -> u32 {
        let idx = op >> 4;
        self.set_reg16(idx, self.reg16(idx).wrapping_sub(1));
        self.advance(1);
        8
    }

    fn op_add_hl_rr(&mut self, op: u8, _operand: u16) -> u32 {
        let (result, flags) = add16_with_flags(self.hl(), self.reg16(op >> 4));
        self.set_hl(result);
        self.set_f((self.f & FLAG_Z) | flags);
        self.advance(1);
        8
    }

    fn op_add_sp_r8(&mut self, _op: u8, operand: u16) -> u32 {
        let (result, flags) = add_signed_with_flags(self.sp, operand as u8);
        self.sp = result;
        self.set_f(flags);
        self.advance(2);
        16
    }

    // ---- rotates on A ----

    /// RLCA, RRCA, RLA, RRA: like the CB forms but Z is always clear
    fn op_rotate_a(&mut self, op: u8, _operand: u16) -> u32 {
        let (result, flags) = self.shift_op((op >> 3) & 3, self.a);
        self.a = result;
        self.set_f(flags & FLAG_C);
        self.advance(1);
        4
    }

    // ---- jumps, calls, returns ----

    fn relative_target(&self, operand: u16) -> u16 {
        let offset = operand as u8 as i8 as i16 as u16;
        self.pc.wrapping_add(2).wrapping_add(offset)
    }

    fn op_jr(&mut self, _op: u8, operand: u16) -> u32 {
        self.pc = self.relative_target(operand);
        12
    }

    fn op_jr_cc(&mut self, op: u8, operand: u16) -> u32 {
        if self.condition(op >> 3) {
            self.pc = self.relative_target(operand);
            12
        } else {
            self.advance(2);
            8
        }
    }

    fn op_jp(&mut self, _op: u8, operand: u16) -> u32 {
        self.pc = operand;
        16
    }

    fn op_jp_cc(&mut self, op: u8, operand: u16) -> u32 {
        if self.condition(op >> 3) {
            self.pc = operand;
            16
        } else {
            self.advance(3);
            12
        }
    }

    fn op_jp_hl(&mut self, _op: u8, _operand: u16) -> u32 {
        self.pc = self.hl();
        4
    }

    fn op_call(&mut self, _op: u8, operand: u16) -> u32 {
        self.push_u16(self.pc.wrapping_add(3));
        self.pc = operand;
        24
    }

    fn op_call_cc(&mut self, op: u8, operand: u16) -> u32 {
        if self.condition(op >> 3) {
            self.op_call(op, operand)
        } else {
            self.advance(3);
            12
        }
    }

    fn op_ret(&mut self, _op: u8, _operand: u16) -> u32 {
        self.pc = self.pop_u16();
        16
    }

    fn op_ret_cc(&mut self, op: u8, _operand: u16) -> u32 {
        if self.condition(op >> 3) {
            self.pc = self.pop_u16();
            20
        } else {
            self.advance(1);
            8
        }
    }

    fn op_reti(&mut self, _op: u8, _operand: u16) -> u32 {
        self.pc = self.pop_u16();
        self.ime = true;
        self.ime_pending = false;
        16
    }

    fn op_rst(&mut self, op: u8, _operand: u16) -> u32 {
        self.push_u16(self.pc.wrapping_add(1));
        self.pc = (op & 0x38) as u16;
        16
    }

    // ---- control ----

    fn op_di(&mut self, _op: u8, _operand: u16) -> u32 {
        self.ime = false;
        self.ime_pending = false;
        self.advance(1);
        4
    }

    fn op_ei(&mut self, _op: u8, _operand: u16) -> u32 {
        self.ime_pending = true;
        self.advance(1);
        4
    }

    /// PC stays on the HALT opcode; waking moves past it
    fn op_halt(&mut self, _op: u8, _operand: u16) -> u32 {
        self.mode = RunMode::Halted;
        4
    }

    fn op_stop(&mut self, _op: u8, _operand: u16) -> u32 {
        self.memory.write(DIV_ADDR, 0);
        self.mode = RunMode::Stopped;
        self.advance(2);
        4
    }

    // ---- CB page ----

    /// RLC RRC RL RR SLA SRA SWAP SRL, returning (result, flags)
    fn shift_op(&self, sel: u8, val: u8) -> (u8, u8) {
        let carry_in = self.flag(FLAG_C) as u8;
        let (result, carry_out) = match sel & 7 {
            0 => (val.rotate_left(1), val & 0x80 != 0),
            1 => (val.rotate_right(1), val & 0x01 != 0),
            2 => ((val << 1) | carry_in, val & 0x80 != 0),
            3 => ((val >> 1) | (carry_in << 7), val & 0x01 != 0),
            4 => (val << 1, val & 0x80 != 0),
            5 => ((val >> 1) | (val & 0x80), val & 0x01 != 0),
            6 => (val.rotate_left(4), false),
            _ => (val >> 1, val & 0x01 != 0),
        };
        let mut flags = if result == 0 { FLAG_Z } else { 0 };
        if carry_out {
            flags |= FLAG_C;
        }
        (result, flags)
    }

    fn op_cb_shift(&mut self, op: u8, _operand: u16) -> u32 {
        let idx = op & 7;
        let (result, flags) = self.shift_op(op >> 3, self.reg(idx));
        self.set_reg(idx, result);
        self.set_f(flags);
        self.advance(2);
        if idx == HL_INDIRECT {
            16
        } else {
            8
        }
    }

    fn op_cb_bit(&mut self, op: u8, _operand: u16) -> u32 {
        let idx = op & 7;
        let bit = (op >> 3) & 7;
        let mut flags = (self.f & FLAG_C) | FLAG_H;
        if self.reg(idx) & (1 << bit) == 0 {
            flags |= FLAG_Z;
        }
        self.set_f(flags);
        self.advance(2);
        if idx == HL_INDIRECT {
            12
        } else {
            8
        }
    }

    fn op_cb_res(&mut self, op: u8, _operand: u16) -> u32 {
        let idx = op & 7;
        let bit = (op >> 3) & 7;
        self.set_reg(idx, self.reg(idx) & !(1 << bit));
        self.advance(2);
        if idx == HL_INDIRECT {
            16
        } else {
            8
        }
    }

    fn op_cb_set(&mut self, op: u8, _operand: u16) -> u32 {
        let idx = op & 7;
        let bit = (op >> 3) & 7;
        self.set_reg(idx, self.reg(idx) | (1 << bit));
        self.advance(2);
        if idx == HL_INDIRECT {
            16
        } else {
            8
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::tests::make_cpu;
    use super::super::{FLAG_C, FLAG_H, FLAG_N, FLAG_Z, ILLEGAL_OPCODES};
    use super::*;

    #[test]
    fn test_every_legal_opcode_moves_pc_or_mode() {
        // Run each base opcode once from a clean state; only the illegal
        // set may leave PC in place.
        for op in 0..=0xFFu8 {
            if op == 0xCB || op == 0x76 || ILLEGAL_OPCODES.contains(&op) {
                continue;
            }
            let mut cpu = make_cpu(&[op, 0x10, 0x20]);
            cpu.sp = 0xD000;
            cpu.step();
            assert!(
                cpu.pc != 0x0100 || cpu.mode != RunMode::Running,
                "opcode {:02X} did not move PC",
                op
            );
        }
    }

    #[test]
    fn test_illegal_opcodes_are_inert() {
        for &op in ILLEGAL_OPCODES.iter() {
            let mut cpu = make_cpu(&[op]);
            cpu.step();
            assert_eq!(cpu.pc, 0x0100);
            assert!(cpu.is_stuck(), "opcode {:02X}", op);
        }
    }

    #[test]
    fn test_ld_r_r_and_hl_indirect() {
        // LD B,A ; LD (HL),B ; LD C,(HL)
        let mut cpu = make_cpu(&[0x47, 0x70, 0x4E]);
        cpu.a = 0x5A;
        cpu.set_hl(0xC000);
        assert_eq!(cpu.step(), 4);
        assert_eq!(cpu.step(), 8);
        assert_eq!(cpu.memory.0[0xC000], 0x5A);
        assert_eq!(cpu.step(), 8);
        assert_eq!(cpu.c, 0x5A);
    }

    #[test]
    fn test_ld_hl_increment_decrement() {
        // LD (HL+),A ; LD A,(HL-)
        let mut cpu = make_cpu(&[0x22, 0x3A]);
        cpu.a = 0x11;
        cpu.set_hl(0xC000);
        cpu.memory.0[0xC001] = 0x22;
        cpu.step();
        assert_eq!(cpu.memory.0[0xC000], 0x11);
        assert_eq!(cpu.hl(), 0xC001);
        cpu.step();
        assert_eq!(cpu.a, 0x22);
        assert_eq!(cpu.hl(), 0xC000);
    }

    #[test]
    fn test_ldh_round_trip() {
        // LDH (0x80),A ; LD A,0 ; LDH A,(0x80)
        let mut cpu = make_cpu(&[0xE0, 0x80, 0x3E, 0x00, 0xF0, 0x80]);
        cpu.a = 0x99;
        assert_eq!(cpu.step(), 12);
        cpu.step();
        assert_eq!(cpu.a, 0);
        cpu.step();
        assert_eq!(cpu.a, 0x99);
        assert_eq!(cpu.pc, 0x0106);
    }

    #[test]
    fn test_alu_block() {
        // ADD A,B ; SUB 0x10 ; AND 0x0F ; XOR A ; CP 0x01
        let mut cpu = make_cpu(&[0x80, 0xD6, 0x10, 0xE6, 0x0F, 0xAF, 0xFE, 0x01]);
        cpu.a = 0x3F;
        cpu.b = 0x01;
        cpu.step();
        assert_eq!(cpu.a, 0x40);
        assert_eq!(cpu.f, FLAG_H);
        cpu.step();
        assert_eq!(cpu.a, 0x30);
        assert_eq!(cpu.f, FLAG_N);
        cpu.step();
        assert_eq!(cpu.a, 0x00);
        assert_eq!(cpu.f, FLAG_Z | FLAG_H);
        cpu.step();
        assert_eq!(cpu.f, FLAG_Z);
        cpu.step();
        assert_eq!(cpu.a, 0x00);
        assert_eq!(cpu.f, FLAG_N | FLAG_H | FLAG_C);
    }

    #[test]
    fn test_adc_sbc_use_carry() {
        // ADC A,0x00 ; SBC A,0x00
        let mut cpu = make_cpu(&[0xCE, 0x00, 0xDE, 0x00]);
        cpu.a = 0x10;
        cpu.f = FLAG_C;
        cpu.step();
        assert_eq!(cpu.a, 0x11);
        cpu.f = FLAG_C;
        cpu.step();
        assert_eq!(cpu.a, 0x10);
    }

    #[test]
    fn test_dec_keeps_carry() {
        let mut cpu = make_cpu(&[0x05]); // DEC B
        cpu.b = 0x01;
        cpu.f = FLAG_C;
        cpu.step();
        assert_eq!(cpu.b, 0);
        assert_eq!(cpu.f, FLAG_Z | FLAG_N | FLAG_C);
    }

    #[test]
    fn test_inc_hl_indirect_cycles() {
        let mut cpu = make_cpu(&[0x34]);
        cpu.set_hl(0xC000);
        cpu.memory.0[0xC000] = 0x0F;
        assert_eq!(cpu.step(), 12);
        assert_eq!(cpu.memory.0[0xC000], 0x10);
        assert_eq!(cpu.f & FLAG_H, FLAG_H);
    }

    #[test]
    fn test_add_hl_preserves_zero() {
        let mut cpu = make_cpu(&[0x09]); // ADD HL,BC
        cpu.set_hl(0x0FFF);
        cpu.set_bc(0x0001);
        cpu.f = FLAG_Z | FLAG_N;
        cpu.step();
        assert_eq!(cpu.hl(), 0x1000);
        assert_eq!(cpu.f, FLAG_Z | FLAG_H);
    }

    #[test]
    fn test_add_sp_r8_and_ld_hl_sp() {
        // ADD SP,-1 ; LD HL,SP+2
        let mut cpu = make_cpu(&[0xE8, 0xFF, 0xF8, 0x02]);
        cpu.sp = 0xFFF8;
        assert_eq!(cpu.step(), 16);
        assert_eq!(cpu.sp, 0xFFF7);
        assert_eq!(cpu.f, FLAG_H | FLAG_C);
        assert_eq!(cpu.step(), 12);
        assert_eq!(cpu.hl(), 0xFFF9);
        assert_eq!(cpu.sp, 0xFFF7);
    }

    #[test]
    fn test_ld_a16_sp() {
        let mut cpu = make_cpu(&[0x08, 0x00, 0xC0]);
        cpu.sp = 0xABCD;
        assert_eq!(cpu.step(), 20);
        assert_eq!(cpu.memory.0[0xC000], 0xCD);
        assert_eq!(cpu.memory.0[0xC001], 0xAB);
    }

    #[test]
    fn test_jr_cc_taken_and_not_taken() {
        // JR NZ,+2 (taken) ... JR Z,-4 (not taken)
        let mut cpu = make_cpu(&[0x20, 0x02, 0x00, 0x00, 0x28, 0xFC]);
        assert_eq!(cpu.step(), 12);
        assert_eq!(cpu.pc, 0x0104);
        assert_eq!(cpu.step(), 8);
        assert_eq!(cpu.pc, 0x0106);
    }

    #[test]
    fn test_jp_cc_and_ret_cc() {
        // JP C,0x0200 (not taken) ; JP NC,0x0200 (taken)
        let mut cpu = make_cpu(&[0xDA, 0x00, 0x02, 0xD2, 0x00, 0x02]);
        assert_eq!(cpu.step(), 12);
        assert_eq!(cpu.pc, 0x0103);
        assert_eq!(cpu.step(), 16);
        assert_eq!(cpu.pc, 0x0200);

        // RET Z with Z clear is not taken
        cpu.memory.0[0x0200] = 0xC8;
        assert_eq!(cpu.step(), 8);
        assert_eq!(cpu.pc, 0x0201);
    }

    #[test]
    fn test_rst_pushes_next_pc() {
        let mut cpu = make_cpu(&[0xEF]); // RST 28h
        assert_eq!(cpu.step(), 16);
        assert_eq!(cpu.pc, 0x0028);
        assert_eq!(cpu.memory.0[0xFFFC], 0x01);
        assert_eq!(cpu.memory.0[0xFFFD], 0x01);
    }

    #[test]
    fn test_rotate_a_clears_zero() {
        let mut cpu = make_cpu(&[0x07]); // RLCA
        cpu.a = 0x00;
        cpu.f = FLAG_Z;
        cpu.step();
        assert_eq!(cpu.f, 0);

        let mut cpu = make_cpu(&[0x1F]); // RRA
        cpu.a = 0x01;
        cpu.step();
        assert_eq!(cpu.a, 0x00);
        assert_eq!(cpu.f, FLAG_C);
    }

    #[test]
    fn test_cb_swap_and_srl() {
        // SWAP A ; SRL B
        let mut cpu = make_cpu(&[0xCB, 0x37, 0xCB, 0x38]);
        cpu.a = 0xF1;
        cpu.b = 0x01;
        assert_eq!(cpu.step(), 8);
        assert_eq!(cpu.a, 0x1F);
        assert_eq!(cpu.pc, 0x0102);
        cpu.step();
        assert_eq!(cpu.b, 0x00);
        assert_eq!(cpu.f, FLAG_Z | FLAG_C);
    }

    #[test]
    fn test_cb_bit_res_set() {
        // BIT 7,H ; RES 0,(HL) ; SET 3,(HL)
        let mut cpu = make_cpu(&[0xCB, 0x7C, 0xCB, 0x86, 0xCB, 0xDE]);
        cpu.set_hl(0xC0FF);
        cpu.memory.0[0xC0FF] = 0x01;
        cpu.f = FLAG_C;
        assert_eq!(cpu.step(), 8);
        assert_eq!(cpu.f, FLAG_C | FLAG_H);
        assert_eq!(cpu.step(), 16);
        assert_eq!(cpu.memory.0[0xC0FF], 0x00);
        assert_eq!(cpu.step(), 16);
        assert_eq!(cpu.memory.0[0xC0FF], 0x08);
    }

    #[test]
    fn test_cb_bit_hl_cycles() {
        let mut cpu = make_cpu(&[0xCB, 0x46]); // BIT 0,(HL)
        cpu.set_hl(0xC000);
        assert_eq!(cpu.step(), 12);
        assert_eq!(cpu.f & FLAG_Z, FLAG_Z);
    }

    #[test]
    fn test_scf_ccf_cpl() {
        let mut cpu = make_cpu(&[0x37, 0x3F, 0x2F]);
        cpu.a = 0x0F;
        cpu.step();
        assert_eq!(cpu.f, FLAG_C);
        cpu.step();
        assert_eq!(cpu.f, 0);
        cpu.step();
        assert_eq!(cpu.a, 0xF0);
        assert_eq!(cpu.f, FLAG_N | FLAG_H);
    }
}
