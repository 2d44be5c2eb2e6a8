//! Mapper 003 (CNROM) implementation
//!
//! This mapper features CHR ROM banking with fixed PRG ROM.
//! Used by games like Adventure Island, Paperboy, Defender II, etc.
//!
//! Memory map:
//! - PRG ROM: 16KB/32KB (fixed, 16KB mirrored)
//! - CHR ROM: 8KB with banking

use log::{debug, info};
use crate::cartridge::{BankLayout, CartridgeImage, Mirroring};
use crate::savestate::{CnRomState, RegisterSnapshot, StateError};
use super::banking::{BankMapping, KB16, KB32, KB8};
use super::{mismatch, Mapper, MapperError};

#[derive(Debug)]
pub struct Mapper003 {
    image: CartridgeImage,

    /// Current CHR bank
    chr_bank: u8,
}

impl Mapper003 {
    pub const LAYOUT: BankLayout = BankLayout {
        prg_bank_size: KB16,
        chr_bank_size: KB8,
    };

    /// Create a new Mapper003 instance
    pub fn new(image: CartridgeImage) -> Result<Self, MapperError> {
        image.validate(Self::LAYOUT)?;
        Ok(Mapper003 { image, chr_bank: 0 })
    }

    #[inline]
    pub fn chr_bank(&self) -> u8 {
        self.chr_bank
    }
}

impl Mapper for Mapper003 {
    fn map_cpu(&self, addr: u16) -> Option<BankMapping> {
        match addr {
            0x6000..=0x7FFF => self.image.prg_ram_bank(0, KB8, (addr - 0x6000) as usize),
            0x8000..=0xFFFF => Some(self.image.prg_rom_bank(0, KB32, (addr - 0x8000) as usize)),
            _ => None,
        }
    }

    fn map_ppu(&self, addr: u16) -> Option<BankMapping> {
        if addr < 0x2000 {
            self.image.chr_bank(self.chr_bank as usize, KB8, addr as usize)
        } else {
            None
        }
    }

    fn cpu_write(&mut self, addr: u16, data: u8) {
        match addr {
            0x6000..=0x7FFF => {
                if let Some(mapping) = self.map_cpu(addr) {
                    self.image.write_mapped(mapping, data);
                }
            }
            0x8000..=0xFFFF => {
                // CHR bank select
                self.chr_bank = data;
                debug!("CNROM CHR bank: {}", data);
            }
            _ => {}
        }
    }

    fn mirroring(&self) -> Mirroring {
        self.image.mirroring
    }

    fn reset(&mut self) {
        self.chr_bank = 0;
        info!("CNROM reset");
    }

    fn registers(&self) -> RegisterSnapshot {
        RegisterSnapshot::CnRom(CnRomState { chr_bank: self.chr_bank })
    }

    fn restore_registers(&mut self, snapshot: RegisterSnapshot) -> Result<(), StateError> {
        match snapshot {
            RegisterSnapshot::CnRom(state) => {
                self.chr_bank = state.chr_bank;
                Ok(())
            }
            other => Err(mismatch("CNROM", &other)),
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
        "CNROM"
    }
}
