mod common;

use common::*;
use rusty_nes_mapper::{Mapper, MapperHandle, StateError};

/// Register writes that move a board away from its power-on state
fn scripted_writes(number: u16) -> Vec<(u16, u8)> {
    let mut writes = Vec::new();
    if number == 24 || number == 26 {
        // PRG RAM is disabled until $B003 bit 7 is set
        writes.push((0xB003, 0x84));
    }
    writes.push((0x6003, 0x5A));
    match number {
        1 => {
            // control 0x1E, CHR0 = 3, PRG = 5, each as five serial writes
            for (addr, value) in [(0x8000u16, 0x1Eu8), (0xA000, 3), (0xE000, 5)] {
                for bit in 0..5 {
                    writes.push((addr, (value >> bit) & 1));
                }
            }
            // leave a partial shift in progress
            writes.push((0xC000, 1));
            writes.push((0xC000, 0));
        }
        2 | 3 => writes.push((0x8000, 5)),
        4 => writes.extend([
            (0x8000, 0x46),
            (0x8001, 3),
            (0x8000, 0x82),
            (0x8001, 7),
            (0xA000, 1),
            (0xC000, 5),
            (0xC001, 0),
            (0xE001, 0),
        ]),
        5 => writes.extend([
            (0x5102, 2),
            (0x5103, 1),
            (0x6010, 0x77),
            (0x5100, 2),
            (0x5115, 0x83),
            (0x5116, 0x85),
            (0x5101, 1),
            (0x5123, 2),
            (0x5127, 3),
            (0x5105, 0x44),
            (0x5104, 2),
            (0x5C05, 0x44),
            (0x5203, 12),
            (0x5204, 0x80),
            (0x5205, 7),
            (0x5206, 9),
            (0x5011, 0x30),
        ]),
        7 => writes.push((0x8000, 0x13)),
        9 | 10 => writes.extend([
            (0xA000, 2),
            (0xB000, 1),
            (0xC000, 2),
            (0xD000, 3),
            (0xE000, 0),
            (0xF000, 1),
        ]),
        11 => writes.push((0x8000, 0x21)),
        24 | 26 => writes.extend([
            (0x8000, 2),
            (0xC000, 5),
            (0xD001, 3),
            (0xE002, 6),
            (0xF000, 0xF8),
            (0xF001, 0x03),
        ]),
        71 => writes.extend([(0xC000, 3), (0x9000, 0x10)]),
        _ => {}
    }
    writes
}

fn prepared(number: u16) -> MapperHandle {
    let mut mapper = board(number, 8, 4);
    for (addr, value) in scripted_writes(number) {
        mapper.cpu_write(addr, value);
    }
    // flip the MMC2/MMC4 low latch to $FD
    mapper.ppu_read(0x0FD8);
    for _ in 0..5 {
        mapper.notify_scanline();
    }
    mapper
}

/// Everything observable through the bus, in a fixed order
fn observe(mapper: &mut MapperHandle) -> Vec<u8> {
    let mut seen = Vec::new();
    for addr in cpu_probe_addresses() {
        seen.push(mapper.cpu_read(addr));
    }
    for addr in ppu_probe_addresses() {
        seen.push(mapper.ppu_read(addr));
    }
    seen.push(mapper.irq_pending() as u8);
    seen.push(mapper.mirroring().nametable_pages().iter().fold(0, |acc, page| acc << 1 | page));
    seen
}

const ALL_MAPPERS: [u16; 13] = [0, 1, 2, 3, 4, 5, 7, 9, 10, 11, 24, 26, 71];

#[test]
fn save_then_load_reproduces_reads() {
    for number in ALL_MAPPERS {
        let mut original = prepared(number);
        let data = original.save_state().unwrap();

        let mut restored = board(number, 8, 4);
        restored.load_state(&data).unwrap();
        assert_eq!(restored.registers(), original.registers(), "mapper {}", number);

        for step in 0..20 {
            original.notify_scanline();
            restored.notify_scanline();
            if step == 10 {
                original.notify_vblank();
                restored.notify_vblank();
            }
            assert_eq!(observe(&mut restored), observe(&mut original), "mapper {} step {}", number, step);
        }
    }
}

#[test]
fn battery_ram_travels_with_state() {
    for number in [1u16, 4, 5, 10, 24] {
        let original = prepared(number);
        let data = original.save_state().unwrap();

        let mut restored = board(number, 8, 4);
        restored.load_state(&data).unwrap();
        assert_eq!(restored.battery_ram(), original.battery_ram(), "mapper {}", number);
        assert!(restored.battery_ram().unwrap().iter().any(|&b| b != 0), "mapper {}", number);
    }
}

#[test]
fn truncated_state_is_rejected_and_resets() {
    for number in ALL_MAPPERS {
        let original = prepared(number);
        let mut data = original.save_state().unwrap();
        data.truncate(data.len() - 1);

        let mut target = prepared(number);
        let ram_before = target.image().prg_ram.clone();
        let result = target.load_state(&data);
        assert!(matches!(result, Err(StateError::SizeMismatch { .. })), "mapper {}", number);

        let fresh = board(number, 8, 4);
        assert_eq!(target.registers(), fresh.registers(), "mapper {}", number);
        assert_eq!(target.image().prg_ram, ram_before, "mapper {}", number);
    }
}

#[test]
fn rejected_registers_leave_ram_untouched() {
    let original = prepared(1);
    let mut data = original.save_state().unwrap();
    // shift_count sits after the 4-byte variant tag and the shift register
    data[5] = 7;

    let mut target = board(1, 8, 4);
    target.image_mut().prg_ram[3] = 0x11;
    let result = target.load_state(&data);
    assert!(matches!(result, Err(StateError::InvalidData)));
    assert_eq!(target.image().prg_ram[3], 0x11);
    assert_eq!(target.registers(), board(1, 8, 4).registers());
}

#[test]
fn state_from_another_board_is_rejected() {
    let uxrom = prepared(2);
    let data = uxrom.save_state().unwrap();

    let mut cnrom = prepared(3);
    let result = cnrom.load_state(&data);
    assert!(matches!(
        result,
        Err(StateError::MapperMismatch { expected: "CNROM", found: "UxROM" })
    ));
    assert_eq!(cnrom.registers(), board(3, 8, 4).registers());
}

#[test]
fn state_file_round_trip() {
    let mut original = prepared(4);
    let path = std::env::temp_dir().join(format!("mapper-state-{}.bin", std::process::id()));
    rusty_nes_mapper::savestate::save_to_file(&original, &path).unwrap();

    let mut restored = board(4, 8, 4);
    rusty_nes_mapper::savestate::load_from_file(&mut restored, &path).unwrap();
    std::fs::remove_file(&path).unwrap();

    assert_eq!(observe(&mut restored), observe(&mut original));
}
