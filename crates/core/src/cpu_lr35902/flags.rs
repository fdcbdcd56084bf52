//! Flag arithmetic for the LR35902.
//!
//! Every helper widens its operands, computes the result, and derives the
//! half-carry/carry bits from the widened value. Each returns `(result, flags)`
//! where `flags` is a complete upper nibble for F; callers that preserve some
//! bits (INC/DEC keep C, ADD HL keeps Z) mask the returned value themselves.

use super::{FLAG_C, FLAG_H, FLAG_N, FLAG_Z};

#[inline]
fn zero(result: u8) -> u8 {
    if result == 0 {
        FLAG_Z
    } else {
        0
    }
}

/// 8-bit add with optional carry-in (ADD, ADC, INC).
#[inline]
pub fn add8_with_flags(a: u8, b: u8, carry_in: bool) -> (u8, u8) {
    let wide = a as u16 + b as u16 + carry_in as u16;
    let result = wide as u8;
    let mut flags = zero(result);
    if (a as u16 ^ b as u16 ^ wide) & 0x10 != 0 {
        flags |= FLAG_H;
    }
    if wide & 0x100 != 0 {
        flags |= FLAG_C;
    }
    (result, flags)
}

/// 8-bit subtract with optional borrow-in (SUB, SBC, CP, DEC).
#[inline]
pub fn sub8_with_flags(a: u8, b: u8, carry_in: bool) -> (u8, u8) {
    let wide = (a as u16)
        .wrapping_sub(b as u16)
        .wrapping_sub(carry_in as u16);
    let result = wide as u8;
    let mut flags = zero(result) | FLAG_N;
    if (a as u16 ^ b as u16 ^ wide) & 0x10 != 0 {
        flags |= FLAG_H;
    }
    if wide & 0x100 != 0 {
        flags |= FLAG_C;
    }
    (result, flags)
}

/// 16-bit add (ADD HL,rr). Only N/H/C are meaningful; Z is never returned.
#[inline]
pub fn add16_with_flags(a: u16, b: u16) -> (u16, u8) {
    let wide = a as u32 + b as u32;
    let mut flags = 0;
    if (a as u32 ^ b as u32 ^ wide) & 0x1000 != 0 {
        flags |= FLAG_H;
    }
    if wide & 0x10000 != 0 {
        flags |= FLAG_C;
    }
    (wide as u16, flags)
}

/// SP plus a signed 8-bit immediate (ADD SP,r8 and LD HL,SP+r8).
///
/// H and C come from the low byte of the signed 32-bit sum; Z and N are
/// always clear.
#[inline]
pub fn add_signed_with_flags(base: u16, offset: u8) -> (u16, u8) {
    let base = base as i32;
    let offset = offset as i8 as i32;
    let wide = base + offset;
    let mut flags = 0;
    if (base ^ offset ^ wide) & 0x10 != 0 {
        flags |= FLAG_H;
    }
    if (base ^ offset ^ wide) & 0x100 != 0 {
        flags |= FLAG_C;
    }
    (wide as u16, flags)
}

#[inline]
pub fn and8_with_flags(a: u8, b: u8) -> (u8, u8) {
    let result = a & b;
    (result, zero(result) | FLAG_H)
}

#[inline]
pub fn or8_with_flags(a: u8, b: u8) -> (u8, u8) {
    let result = a | b;
    (result, zero(result))
}

#[inline]
pub fn xor8_with_flags(a: u8, b: u8) -> (u8, u8) {
    let result = a ^ b;
    (result, zero(result))
}

/// Decimal adjust after an add or subtract.
///
/// N is kept from the incoming flags, H is cleared.
#[inline]
pub fn daa_with_flags(a: u8, flags: u8) -> (u8, u8) {
    let subtract = flags & FLAG_N != 0;
    let mut correction = 0u8;
    let mut carry = false;

    if flags & FLAG_H != 0 || (!subtract && (a & 0x0F) > 0x09) {
        correction |= 0x06;
    }
    if flags & FLAG_C != 0 || (!subtract && a > 0x99) {
        correction |= 0x60;
        carry = true;
    }

    let result = if subtract {
        a.wrapping_sub(correction)
    } else {
        a.wrapping_add(correction)
    };

    let mut out = zero(result) | (flags & FLAG_N);
    if carry {
        out |= FLAG_C;
    }
    (result, out)
}
