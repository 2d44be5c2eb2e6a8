//! Mapper 007 (AxROM) implementation
//!
//! 32KB PRG ROM banking with a single-screen mirroring select.
//! Used by games like Battletoads, Marble Madness, Wizards & Warriors, etc.
//!
//! Memory map:
//! - PRG ROM: Switchable 32KB bank (0x8000-0xFFFF)
//! - CHR RAM: 8KB (fixed)
//!
//! Register (0x8000-0xFFFF):
//! - Bits 0-3: PRG bank
//! - Bit 4: Nametable page for single-screen mirroring

use log::{debug, info};
use crate::cartridge::{BankLayout, CartridgeImage, Mirroring};
use crate::savestate::{AxRomState, RegisterSnapshot, StateError};
use crate::util::check_bit;
use super::banking::{BankMapping, KB32, KB8};
use super::{mismatch, Mapper, MapperError};

#[derive(Debug)]
pub struct Mapper007 {
    image: CartridgeImage,

    /// Current 32KB PRG bank
    prg_bank: u8,

    /// Single-screen page select
    upper_screen: bool,
}

impl Mapper007 {
    pub const LAYOUT: BankLayout = BankLayout {
        prg_bank_size: KB32,
        chr_bank_size: KB8,
    };

    /// Create a new Mapper007 instance
    pub fn new(image: CartridgeImage) -> Result<Self, MapperError> {
        image.validate(Self::LAYOUT)?;
        Ok(Mapper007 {
            image,
            prg_bank: 0,
            upper_screen: false,
        })
    }
}

impl Mapper for Mapper007 {
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
            self.image.chr_bank(0, KB8, addr as usize)
        } else {
            None
        }
    }

    fn cpu_write(&mut self, addr: u16, data: u8) {
        if addr >= 0x8000 {
            self.prg_bank = data & 0x0F;
            self.upper_screen = check_bit(data, 4);
            debug!("AxROM PRG bank: {}, upper screen: {}", self.prg_bank, self.upper_screen);
        }
    }

    fn mirroring(&self) -> Mirroring {
        if self.upper_screen {
            Mirroring::SingleScreenUpper
        } else {
            Mirroring::SingleScreenLower
        }
    }

    fn reset(&mut self) {
        self.prg_bank = 0;
        self.upper_screen = false;
        info!("AxROM reset");
    }

    fn registers(&self) -> RegisterSnapshot {
        RegisterSnapshot::AxRom(AxRomState {
            prg_bank: self.prg_bank,
            upper_screen: self.upper_screen,
        })
    }

    fn restore_registers(&mut self, snapshot: RegisterSnapshot) -> Result<(), StateError> {
        match snapshot {
            RegisterSnapshot::AxRom(state) => {
                self.prg_bank = state.prg_bank;
                self.upper_screen = state.upper_screen;
                Ok(())
            }
            other => Err(mismatch("AxROM", &other)),
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
        "AxROM"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mappers::banking::patterned_banks;

    #[test]
    fn bank_and_screen_select() {
        let image = CartridgeImage::new(7, patterned_banks(8, KB32), Vec::new());
        let mut mapper = Mapper007::new(image).unwrap();
        assert_eq!(mapper.cpu_read(0x8000), 0);
        assert_eq!(mapper.mirroring(), Mirroring::SingleScreenLower);

        mapper.cpu_write(0x8000, 0x15);
        assert_eq!(mapper.cpu_read(0x8000), 5);
        assert_eq!(mapper.cpu_read(0xFFFF), 5);
        assert_eq!(mapper.mirroring(), Mirroring::SingleScreenUpper);

        // bit 3 selects past the end of a 256KB board and wraps
        mapper.cpu_write(0x8000, 0x0A);
        assert_eq!(mapper.cpu_read(0x8000), 2);
        assert_eq!(mapper.mirroring(), Mirroring::SingleScreenLower);
    }
}
