#![allow(dead_code)]

use rusty_nes_mapper::{create_mapper, CartridgeImage, MapperHandle};

pub const KB1: usize = 0x0400;
pub const KB4: usize = 0x1000;
pub const KB8: usize = 0x2000;
pub const KB16: usize = 0x4000;
pub const KB32: usize = 0x8000;

/// Route library logging through the test harness
pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// `count` banks of `bank_size` bytes, each byte holding its bank index
pub fn patterned_banks(count: usize, bank_size: usize) -> Vec<u8> {
    let mut data = vec![0u8; count * bank_size];
    for (bank, chunk) in data.chunks_mut(bank_size).enumerate() {
        chunk.fill(bank as u8);
    }
    data
}

/// ROM whose bytes differ within a bank as well as between banks
pub fn addressed_rom(size: usize) -> Vec<u8> {
    (0..size).map(|i| (i ^ (i >> 8) ^ (i >> 13)) as u8).collect()
}

/// A board with patterned PRG and CHR and 8KB of battery-backed PRG RAM
pub fn board(mapper: u16, prg_banks_16k: usize, chr_banks_8k: usize) -> MapperHandle {
    init_logging();
    let chr = if chr_banks_8k == 0 {
        Vec::new()
    } else {
        addressed_rom(chr_banks_8k * KB8)
    };
    let image = CartridgeImage::new(mapper, addressed_rom(prg_banks_16k * KB16), chr)
        .with_prg_ram(KB8)
        .with_battery(true);
    create_mapper(image).expect("test board is valid")
}

/// Addresses spread over the PRG windows and PRG RAM
pub fn cpu_probe_addresses() -> Vec<u16> {
    (0..96u16).map(|i| 0x6000u16.wrapping_add(i.wrapping_mul(0x0107))).collect()
}

/// Addresses spread over both pattern tables
pub fn ppu_probe_addresses() -> Vec<u16> {
    (0..80u16).map(|i| (i * 0x0067) & 0x1FFF).collect()
}
