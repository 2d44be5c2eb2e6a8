mod common;

use common::*;
use rusty_nes_mapper::{create_mapper, CartridgeImage, Mapper, MapperError, Mirroring};

const ALL_MAPPERS: [u16; 13] = [0, 1, 2, 3, 4, 5, 7, 9, 10, 11, 24, 26, 71];

#[test]
fn default_reads_are_stable() {
    for number in ALL_MAPPERS {
        let mut mapper = board(number, 8, 4);
        for addr in cpu_probe_addresses() {
            let first = mapper.cpu_read(addr);
            assert_eq!(mapper.cpu_read(addr), first, "mapper {} at {:04X}", number, addr);
        }
    }
}

#[test]
fn reset_vector_comes_from_last_bank() {
    let prg = addressed_rom(8 * KB16);
    for number in [1u16, 2, 4, 5, 9, 10, 24, 26, 71] {
        let mut mapper = board(number, 8, 4);
        assert_eq!(mapper.cpu_read(0xFFFC), prg[prg.len() - 4], "mapper {}", number);
        assert_eq!(mapper.cpu_read(0xFFFD), prg[prg.len() - 3], "mapper {}", number);
    }
}

#[test]
fn uxrom_bank_select_matches_formula() {
    init_logging();
    let prg = addressed_rom(8 * KB16);
    let image = CartridgeImage::new(2, prg.clone(), Vec::new());
    let mut mapper = create_mapper(image).unwrap();

    for w in [0u8, 1, 5, 7, 8, 9, 100, 255] {
        mapper.cpu_write(0x8000, w);
        for offset in [0usize, 1, 0x0FFF, 0x2345, 0x3FFF] {
            let expected = prg[(w as usize % 8) * KB16 + offset];
            assert_eq!(mapper.cpu_read(0x8000 + offset as u16), expected, "bank {} offset {:04X}", w, offset);
        }
    }
}

#[test]
fn uxrom_128k_with_chr_ram() {
    init_logging();
    let image = CartridgeImage::new(2, patterned_banks(8, KB16), Vec::new());
    let mut mapper = create_mapper(image).unwrap();

    mapper.cpu_write(0x8000, 9);
    assert_eq!(mapper.cpu_read(0x8000), 1);
    assert_eq!(mapper.cpu_read(0xC000), 7);

    for addr in [0x0000u16, 0x0FFF, 0x1000, 0x1FFF] {
        mapper.ppu_write(addr, (addr >> 4) as u8);
    }
    for addr in [0x0000u16, 0x0FFF, 0x1000, 0x1FFF] {
        assert_eq!(mapper.ppu_read(addr), (addr >> 4) as u8);
    }
}

#[test]
fn chr_rom_writes_are_ignored() {
    for number in ALL_MAPPERS {
        let mut mapper = board(number, 8, 4);
        for addr in ppu_probe_addresses() {
            let before = mapper.ppu_read(addr);
            mapper.ppu_write(addr, !before);
            assert_eq!(mapper.ppu_read(addr), before, "mapper {} at {:04X}", number, addr);
        }
    }
}

#[test]
fn nrom_prg_writes_are_ignored() {
    let mut mapper = board(0, 2, 1);
    for addr in [0x8000u16, 0x9234, 0xFFFF] {
        let before = mapper.cpu_read(addr);
        mapper.cpu_write(addr, !before);
        assert_eq!(mapper.cpu_read(addr), before);
    }
}

#[test]
fn out_of_range_addresses_read_open_bus() {
    for number in ALL_MAPPERS {
        let mut mapper = board(number, 8, 4);
        assert_eq!(mapper.cpu_read(0x0000), 0x00);
        assert_eq!(mapper.cpu_read(0x4020), 0x00);
        assert_eq!(mapper.ppu_read(0x2000), 0x00);
        assert_eq!(mapper.ppu_read(0xFFFF), 0x00);
        mapper.ppu_write(0x3000, 0x55);
    }
}

#[test]
fn malformed_images_are_rejected() {
    init_logging();
    let image = CartridgeImage::new(4, vec![0; 0x3000], vec![0; KB8]);
    assert!(matches!(create_mapper(image), Err(MapperError::MisalignedRom { .. })));

    let image = CartridgeImage::new(7, vec![0; KB16], Vec::new());
    assert!(matches!(create_mapper(image), Err(MapperError::MisalignedRom { .. })));

    let mut image = CartridgeImage::new(2, vec![0; KB16 * 2], Vec::new());
    image.prg_rom_size = KB16 * 4;
    assert!(matches!(create_mapper(image), Err(MapperError::SizeMismatch { .. })));

    let image = CartridgeImage::new(200, vec![0; KB16], Vec::new());
    assert!(matches!(create_mapper(image), Err(MapperError::UnsupportedMapper(200))));
}

#[test]
fn mmc3_irq_after_reload_plus_one_scanlines() {
    for reload in [0u8, 1, 7, 30] {
        let mut mapper = board(4, 8, 4);
        mapper.cpu_write(0xC000, reload);
        mapper.cpu_write(0xC001, 0);
        mapper.cpu_write(0xE001, 0);

        let mut raised_at = Vec::new();
        for line in 0..=reload as u32 {
            mapper.notify_scanline();
            if mapper.irq_pending() {
                raised_at.push(line);
            }
        }
        assert_eq!(raised_at, vec![reload as u32], "reload {}", reload);

        // stays raised until acknowledged
        mapper.notify_scanline();
        assert!(mapper.irq_pending());
        mapper.irq_acknowledge();
        assert!(!mapper.irq_pending());
    }
}

#[test]
fn mmc3_disable_reenable_keeps_count() {
    let mut mapper = board(4, 8, 4);
    mapper.cpu_write(0xC000, 6);
    mapper.cpu_write(0xC001, 0);
    mapper.cpu_write(0xE001, 0);
    for _ in 0..3 {
        mapper.notify_scanline();
    }

    mapper.cpu_write(0xE000, 0);
    mapper.notify_scanline();
    assert!(!mapper.irq_pending());
    mapper.cpu_write(0xE001, 0);

    // the disabled clock left the counter at 3
    for _ in 0..2 {
        mapper.notify_scanline();
        assert!(!mapper.irq_pending());
    }
    mapper.notify_scanline();
    assert!(mapper.irq_pending());
}

#[test]
fn latch_boards_count_one_transition_per_repeated_trigger() {
    for number in [9u16, 10] {
        let mut mapper = board(number, 8, 4);
        mapper.cpu_write(0xB000, 1);
        mapper.cpu_write(0xC000, 2);
        let fe_byte = mapper.ppu_read(0x0000);

        mapper.ppu_read(0x0FD8);
        mapper.ppu_read(0x0FD8);
        let fd_byte = mapper.ppu_read(0x0000);
        assert_ne!(fd_byte, fe_byte, "mapper {}", number);

        for addr in [0x0000u16, 0x0FC8, 0x0FF8, 0x1000, 0x1FC8] {
            mapper.ppu_read(addr);
        }
        assert_eq!(mapper.ppu_read(0x0000), fd_byte, "mapper {}", number);
    }
}

#[test]
fn latch_ignores_reads_outside_pattern_tables() {
    for number in [9u16, 10] {
        let mut mapper = board(number, 8, 4);
        mapper.cpu_write(0xB000, 1);
        mapper.cpu_write(0xC000, 2);
        mapper.cpu_write(0xD000, 1);
        mapper.cpu_write(0xE000, 2);
        let low = mapper.ppu_read(0x0000);
        let high = mapper.ppu_read(0x1000);

        for addr in [0x2FD8u16, 0x2FE8, 0x3FD8, 0x3FE8, 0x3FDA, 0x3FEA] {
            assert_eq!(mapper.ppu_read(addr), 0x00, "mapper {} at {:04X}", number, addr);
        }
        assert_eq!(mapper.ppu_read(0x0000), low, "mapper {}", number);
        assert_eq!(mapper.ppu_read(0x1000), high, "mapper {}", number);
    }
}

#[test]
fn mirroring_defaults_to_header_for_fixed_boards() {
    for number in [0u16, 2, 3, 11] {
        init_logging();
        let image = CartridgeImage::new(number, addressed_rom(4 * KB16), addressed_rom(KB8))
            .with_mirroring(Mirroring::Vertical);
        let mapper = create_mapper(image).unwrap();
        assert_eq!(mapper.mirroring(), Mirroring::Vertical, "mapper {}", number);
    }
}
