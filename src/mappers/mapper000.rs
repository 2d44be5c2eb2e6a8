//! Mapper 000 (NROM) implementation
//!
//! This is the simplest NES mapper with no banking capabilities.
//! Used by games like Super Mario Bros, Donkey Kong, etc.
//!
//! Memory map:
//! - PRG RAM: optional, up to 8KB (0x6000-0x7FFF), Family Basic only
//! - PRG ROM: 16KB (0x8000-0xBFFF, mirrored at 0xC000) or 32KB (0x8000-0xFFFF)
//! - CHR ROM/RAM: 8KB (0x0000-0x1FFF)

use crate::cartridge::{BankLayout, CartridgeImage, Mirroring};
use crate::savestate::{RegisterSnapshot, StateError};
use super::banking::{BankMapping, KB16, KB32, KB8};
use super::{mismatch, Mapper, MapperError};

#[derive(Debug)]
pub struct Mapper000 {
    image: CartridgeImage,
}

impl Mapper000 {
    pub const LAYOUT: BankLayout = BankLayout {
        prg_bank_size: KB16,
        chr_bank_size: KB8,
    };

    /// Create a new Mapper000 instance
    pub fn new(image: CartridgeImage) -> Result<Self, MapperError> {
        image.validate(Self::LAYOUT)?;
        Ok(Mapper000 { image })
    }
}

impl Mapper for Mapper000 {
    #[inline]
    fn map_cpu(&self, addr: u16) -> Option<BankMapping> {
        match addr {
            0x6000..=0x7FFF => self.image.prg_ram_bank(0, KB8, (addr - 0x6000) as usize),
            // A 16KB ROM wraps inside the 32KB window
            0x8000..=0xFFFF => Some(self.image.prg_rom_bank(0, KB32, (addr - 0x8000) as usize)),
            _ => None,
        }
    }

    #[inline]
    fn map_ppu(&self, addr: u16) -> Option<BankMapping> {
        if addr < 0x2000 {
            self.image.chr_bank(0, KB8, addr as usize)
        } else {
            None
        }
    }

    #[inline]
    fn cpu_write(&mut self, addr: u16, value: u8) {
        // No registers; only PRG RAM takes the write
        if let Some(mapping) = self.map_cpu(addr) {
            self.image.write_mapped(mapping, value);
        }
    }

    #[inline]
    fn mirroring(&self) -> Mirroring {
        self.image.mirroring
    }

    fn reset(&mut self) {
        // Nothing to reset in NROM
    }

    fn registers(&self) -> RegisterSnapshot {
        RegisterSnapshot::Nrom
    }

    fn restore_registers(&mut self, snapshot: RegisterSnapshot) -> Result<(), StateError> {
        match snapshot {
            RegisterSnapshot::Nrom => Ok(()),
            other => Err(mismatch("NROM", &other)),
        }
    }

    fn image(&self) -> &CartridgeImage {
        &self.image
    }

    fn image_mut(&mut self) -> &mut CartridgeImage {
        &mut self.image
    }

    fn into_image(self) -> CartridgeImage {
        self.image
    }

    fn name(&self) -> &'static str {
        "NROM"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mappers::banking::patterned_banks;

    #[test]
    fn nrom_128_is_mirrored() {
        let mut mapper = Mapper000::new(CartridgeImage::new(0, patterned_banks(1, KB16), vec![0; KB8])).unwrap();
        let mut prg = vec![0; KB16];
        prg[0x0123] = 0x42;
        mapper.image_mut().prg_rom = prg;

        assert_eq!(mapper.cpu_read(0x8123), 0x42);
        assert_eq!(mapper.cpu_read(0xC123), 0x42);
    }

    #[test]
    fn nrom_256_maps_both_banks() {
        let mut mapper = Mapper000::new(CartridgeImage::new(0, patterned_banks(2, KB16), vec![0; KB8])).unwrap();
        assert_eq!(mapper.cpu_read(0x8000), 0);
        assert_eq!(mapper.cpu_read(0xBFFF), 0);
        assert_eq!(mapper.cpu_read(0xC000), 1);
        assert_eq!(mapper.cpu_read(0xFFFF), 1);
    }

    #[test]
    fn rom_writes_and_missing_ram_are_ignored() {
        let mut mapper = Mapper000::new(CartridgeImage::new(0, patterned_banks(2, KB16), patterned_banks(1, KB8))).unwrap();
        mapper.cpu_write(0xC000, 0x99);
        assert_eq!(mapper.cpu_read(0xC000), 1);

        mapper.cpu_write(0x6000, 0x99);
        assert_eq!(mapper.cpu_read(0x6000), 0x00);

        mapper.ppu_write(0x0000, 0x99);
        assert_eq!(mapper.ppu_read(0x0000), 0);
        assert_eq!(mapper.ppu_read(0x2000), 0x00);
    }
}
