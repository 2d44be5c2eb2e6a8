//! Mapper 002 (UxROM) implementation
//!
//! This mapper features PRG ROM banking with fixed last bank.
//! Used by games like Mega Man, Duck Tales, Castlevania, etc.
//!
//! Memory map:
//! - PRG ROM: Switchable 16KB bank (0x8000-0xBFFF) + fixed last 16KB bank (0xC000-0xFFFF)
//! - CHR ROM/RAM: 8KB (fixed)

use log::{debug, info};
use crate::cartridge::{BankLayout, CartridgeImage, Mirroring};
use crate::savestate::{RegisterSnapshot, StateError, UxRomState};
use super::banking::{last_bank, BankMapping, KB16, KB8};
use super::{mismatch, Mapper, MapperError};

#[derive(Debug)]
pub struct Mapper002 {
    image: CartridgeImage,

    /// Current PRG ROM bank, as written. Reduced modulo the bank count on use.
    prg_bank: u8,
}

impl Mapper002 {
    pub const LAYOUT: BankLayout = BankLayout {
        prg_bank_size: KB16,
        chr_bank_size: KB8,
    };

    /// Create a new Mapper002 instance
    pub fn new(image: CartridgeImage) -> Result<Self, MapperError> {
        image.validate(Self::LAYOUT)?;
        Ok(Mapper002 { image, prg_bank: 0 })
    }

    #[inline]
    pub fn prg_bank(&self) -> u8 {
        self.prg_bank
    }
}

impl Mapper for Mapper002 {
    fn map_cpu(&self, addr: u16) -> Option<BankMapping> {
        let within = (addr & 0x3FFF) as usize;
        match addr {
            0x6000..=0x7FFF => self.image.prg_ram_bank(0, KB8, (addr - 0x6000) as usize),
            // Switchable bank
            0x8000..=0xBFFF => Some(self.image.prg_rom_bank(self.prg_bank as usize, KB16, within)),
            // Fixed to last bank
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
            0x6000..=0x7FFF => {
                if let Some(mapping) = self.map_cpu(addr) {
                    self.image.write_mapped(mapping, data);
                }
            }
            0x8000..=0xFFFF => {
                // Bank select
                self.prg_bank = data;
                debug!("UxROM PRG bank: {}", data);
            }
            _ => {}
        }
    }

    fn mirroring(&self) -> Mirroring {
        self.image.mirroring
    }

    fn reset(&mut self) {
        self.prg_bank = 0;
        info!("UxROM reset");
    }

    fn registers(&self) -> RegisterSnapshot {
        RegisterSnapshot::UxRom(UxRomState { prg_bank: self.prg_bank })
    }

    fn restore_registers(&mut self, snapshot: RegisterSnapshot) -> Result<(), StateError> {
        match snapshot {
            RegisterSnapshot::UxRom(state) => {
                self.prg_bank = state.prg_bank;
                Ok(())
            }
            other => Err(mismatch("UxROM", &other)),
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
        "UxROM"
    }
}
