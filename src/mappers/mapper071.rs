//! Mapper 071 (Camerica/Codemasters) implementation
//!
//! UxROM-like PRG banking with the bank register at 0xC000-0xFFFF. The Fire
//! Hawk board adds a single-screen select at 0x9000-0x9FFF; other boards keep
//! the header mirroring until that register is written.
//! Used by games like Micro Machines, Fantastic Dizzy, Bee 52, etc.
//!
//! Memory map:
//! - PRG ROM: Switchable 16KB bank (0x8000-0xBFFF) + fixed last 16KB bank
//! - CHR RAM: 8KB (fixed)

use log::{debug, info};
use crate::cartridge::{BankLayout, CartridgeImage, Mirroring};
use crate::savestate::{CamericaState, RegisterSnapshot, StateError};
use crate::util::check_bit;
use super::banking::{last_bank, BankMapping, KB16, KB8};
use super::{mismatch, Mapper, MapperError};

#[derive(Debug)]
pub struct Mapper071 {
    image: CartridgeImage,

    /// Switchable 16KB PRG bank at 0x8000
    prg_bank: u8,

    /// Mirroring in effect
    mirroring: Mirroring,
}

impl Mapper071 {
    pub const LAYOUT: BankLayout = BankLayout {
        prg_bank_size: KB16,
        chr_bank_size: KB8,
    };

    /// Create a new Mapper071 instance
    pub fn new(image: CartridgeImage) -> Result<Self, MapperError> {
        image.validate(Self::LAYOUT)?;
        let mirroring = image.mirroring;
        Ok(Mapper071 {
            image,
            prg_bank: 0,
            mirroring,
        })
    }
}

impl Mapper for Mapper071 {
    fn map_cpu(&self, addr: u16) -> Option<BankMapping> {
        let within = (addr & 0x3FFF) as usize;
        match addr {
            0x8000..=0xBFFF => Some(self.image.prg_rom_bank(self.prg_bank as usize, KB16, within)),
            0xC000..=0xFFFF => {
                let last = last_bank(self.image.prg_rom.len(), KB16);
                Some(self.image.prg_rom_bank(last, KB16, within))
            }
            _ => None,
        }
    }

    fn map_ppu(&self, addr: u16) -> Option<BankMapping> {
        if addr < 0x2000 {
            self.image.chr_bank(0, KB8, addr as usize)
        } else {
            None
        }
    }

    fn cpu_write(&mut self, addr: u16, data: u8) {
        match addr {
            0x9000..=0x9FFF => {
                self.mirroring = if check_bit(data, 4) {
                    Mirroring::SingleScreenUpper
                } else {
                    Mirroring::SingleScreenLower
                };
                debug!("Camerica mirroring: {:?}", self.mirroring);
            }
            0xC000..=0xFFFF => {
                self.prg_bank = data;
                debug!("Camerica PRG bank: {}", data);
            }
            _ => {}
        }
    }

    fn mirroring(&self) -> Mirroring {
        self.mirroring
    }

    fn reset(&mut self) {
        self.prg_bank = 0;
        self.mirroring = self.image.mirroring;
        info!("Camerica reset");
    }

    fn registers(&self) -> RegisterSnapshot {
        RegisterSnapshot::Camerica(CamericaState {
            prg_bank: self.prg_bank,
            mirroring: self.mirroring,
        })
    }

    fn restore_registers(&mut self, snapshot: RegisterSnapshot) -> Result<(), StateError> {
        match snapshot {
            RegisterSnapshot::Camerica(state) => {
                self.prg_bank = state.prg_bank;
                self.mirroring = state.mirroring;
                Ok(())
            }
            other => Err(mismatch("Camerica", &other)),
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
        "Camerica"
    }
}
