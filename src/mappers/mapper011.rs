//! Mapper 011 (Color Dreams) implementation
//!
//! Unlicensed discrete-logic board with one register switching both PRG and CHR.
//! Used by games like Crystal Mines, Metal Fighter, Bible Adventures, etc.
//!
//! Memory map:
//! - PRG ROM: Switchable 32KB bank (0x8000-0xFFFF)
//! - CHR ROM: Switchable 8KB bank (0x0000-0x1FFF)
//!
//! Register (0x8000-0xFFFF):
//! - Bits 0-1: PRG bank
//! - Bits 4-7: CHR bank

use log::{debug, info};
use crate::cartridge::{BankLayout, CartridgeImage, Mirroring};
use crate::savestate::{ColorDreamsState, RegisterSnapshot, StateError};
use super::banking::{BankMapping, KB32, KB8};
use super::{mismatch, Mapper, MapperError};

#[derive(Debug)]
pub struct Mapper011 {
    image: CartridgeImage,
    prg_bank: u8,
    chr_bank: u8,
}

impl Mapper011 {
    pub const LAYOUT: BankLayout = BankLayout {
        prg_bank_size: KB32,
        chr_bank_size: KB8,
    };

    /// Create a new Mapper011 instance
    pub fn new(image: CartridgeImage) -> Result<Self, MapperError> {
        image.validate(Self::LAYOUT)?;
        Ok(Mapper011 {
            image,
            prg_bank: 0,
            chr_bank: 0,
        })
    }
}

impl Mapper for Mapper011 {
    fn map_cpu(&self, addr: u16) -> Option<BankMapping> {
        match addr {
            0x8000..=0xFFFF => Some(self.image.prg_rom_bank(
                self.prg_bank as usize,
                KB32,
                (addr & 0x7FFF) as usize,
            )),
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
        if addr >= 0x8000 {
            self.prg_bank = data & 0x03;
            self.chr_bank = data >> 4;
            debug!("Color Dreams PRG bank: {}, CHR bank: {}", self.prg_bank, self.chr_bank);
        }
    }

    fn mirroring(&self) -> Mirroring {
        self.image.mirroring
    }

    fn reset(&mut self) {
        self.prg_bank = 0;
        self.chr_bank = 0;
        info!("Color Dreams reset");
    }

    fn registers(&self) -> RegisterSnapshot {
        RegisterSnapshot::ColorDreams(ColorDreamsState {
            prg_bank: self.prg_bank,
            chr_bank: self.chr_bank,
        })
    }

    fn restore_registers(&mut self, snapshot: RegisterSnapshot) -> Result<(), StateError> {
        match snapshot {
            RegisterSnapshot::ColorDreams(state) => {
                self.prg_bank = state.prg_bank;
                self.chr_bank = state.chr_bank;
                Ok(())
            }
            other => Err(mismatch("Color Dreams", &other)),
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
        "Color Dreams"
    }
}
