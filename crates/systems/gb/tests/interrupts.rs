//! Interrupt delivery through the whole machine: priority, timer and joypad

mod common;

use common::{mounted, run_frames, RomBuilder, SPIN};
use emu_core::cpu_lr35902::MemoryLr35902;
use emu_gb::joypad::Key;

#[test]
fn test_vblank_before_timer_then_timer_after_reti() {
    let rom = RomBuilder::new()
        .code(
            0x0100,
            &[
                0x3E, 0x00, // LD A,$00
                0xE0, 0x40, // LDH ($40),A   LCD off, no further VBlanks
                0x3E, 0x05, // LD A,$05
                0xE0, 0xFF, // LDH ($FF),A   IE = VBlank | Timer
                0xE0, 0x0F, // LDH ($0F),A   IF = VBlank | Timer
                0x21, 0x00, 0xC0, // LD HL,$C000
                0xFB, // EI
                0x00, // NOP
            ],
        )
        .code(0x010F, &SPIN)
        // Each handler appends its vector to the log at HL
        .code(0x0040, &[0x3E, 0x40, 0x22, 0xD9])
        .code(0x0050, &[0x3E, 0x50, 0x22, 0xD9])
        .build();

    let mut sys = mounted(&rom);
    run_frames(&mut sys, 1);

    let bus = sys.bus();
    assert_eq!(bus.read(0xC000), 0x40);
    assert_eq!(bus.read(0xC001), 0x50);
    assert_eq!(bus.read(0xC002), 0x00);
    assert_eq!(bus.read(0xFF0F), 0xE0);
    assert_eq!(sys.cpu().hl(), 0xC002);
    assert!(sys.cpu().ime);
}

#[test]
fn test_disabled_interrupts_stay_pending() {
    let rom = RomBuilder::new()
        .code(
            0x0100,
            &[
                0x3E, 0x00, // LD A,$00
                0xE0, 0x40, // LDH ($40),A
                0x3E, 0x04, // LD A,$04
                0xE0, 0x0F, // LDH ($0F),A   Timer requested
                0xE0, 0xFF, // LDH ($FF),A   and enabled, but IME stays off
            ],
        )
        .code(0x010A, &SPIN)
        .code(0x0050, &[0x3E, 0x50, 0xEA, 0x00, 0xC0, 0xD9])
        .build();

    let mut sys = mounted(&rom);
    run_frames(&mut sys, 1);

    assert_eq!(sys.bus().read(0xC000), 0x00);
    assert_eq!(sys.bus().read(0xFF0F) & 0x1F, 0x04);
}

#[test]
fn test_timer_overflow_interrupts() {
    let rom = RomBuilder::new()
        .code(
            0x0100,
            &[
                0x21, 0x80, 0xFF, // LD HL,$FF80
                0x3E, 0x00, // LD A,$00
                0xE0, 0x06, // LDH ($06),A   TMA = 0
                0xE0, 0x05, // LDH ($05),A   TIMA = 0
                0x3E, 0x04, // LD A,$04
                0xE0, 0xFF, // LDH ($FF),A   IE = Timer
                0xAF, // XOR A
                0xE0, 0x0F, // LDH ($0F),A
                0x3E, 0x05, // LD A,$05
                0xE0, 0x07, // LDH ($07),A   TAC: on, 16 cycles per tick
                0xFB, // EI
            ],
        )
        .code(0x0115, &SPIN)
        // INC (HL); RETI
        .code(0x0050, &[0x34, 0xD9])
        .build();

    let mut sys = mounted(&rom);
    run_frames(&mut sys, 1);

    // One overflow every 256 * 16 cycles
    let overflows = sys.bus().read(0xFF80);
    assert!(
        (16..=18).contains(&overflows),
        "unexpected overflow count {overflows}"
    );
}

#[test]
fn test_joypad_wakes_halted_cpu() {
    let rom = RomBuilder::new()
        .code(
            0x0100,
            &[
                0x3E, 0x10, // LD A,$10
                0xE0, 0x00, // LDH ($00),A   select the button row
                0x3E, 0x10, // LD A,$10
                0xE0, 0xFF, // LDH ($FF),A   IE = Joypad
                0xAF, // XOR A
                0xE0, 0x0F, // LDH ($0F),A
                0xFB, // EI
                0x76, // HALT
                0x18, 0xFD, // JR -3
            ],
        )
        // Store P1 at $C000 and count wake-ups at $C001
        .code(
            0x0060,
            &[
                0xF0, 0x00, // LDH A,($00)
                0xEA, 0x00, 0xC0, // LD ($C000),A
                0x21, 0x01, 0xC0, // LD HL,$C001
                0x34, // INC (HL)
                0xD9, // RETI
            ],
        )
        .build();

    let mut sys = mounted(&rom);
    run_frames(&mut sys, 2);
    assert_eq!(sys.bus().read(0xC001), 0);
    assert!(!sys.cpu().is_stuck());

    sys.key_event(Key::Start, true);
    run_frames(&mut sys, 1);
    assert_eq!(sys.bus().read(0xC001), 1);
    // Start is bit 3 of the button row
    assert_eq!(sys.bus().read(0xC000), 0xD7);

    // Holding the key does not fire again
    sys.key_event(Key::Start, true);
    run_frames(&mut sys, 1);
    assert_eq!(sys.bus().read(0xC001), 1);

    sys.key_event(Key::Start, false);
    sys.key_event(Key::A, true);
    run_frames(&mut sys, 1);
    assert_eq!(sys.bus().read(0xC001), 2);
    assert_eq!(sys.bus().read(0xC000), 0xDE);
}
