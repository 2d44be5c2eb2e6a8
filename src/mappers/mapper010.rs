//! Mapper 010 (MMC4) implementation
//!
//! The MMC2's sibling: the same latch-driven CHR banking, but with 16KB PRG
//! banking, 8KB of PRG RAM and a latch 0 that reacts to the whole $FD/$FE tile
//! row rather than a single address.
//! Used by games like Fire Emblem, Famicom Wars, etc.
//!
//! Memory map:
//! - PRG RAM: 8KB (0x6000-0x7FFF)
//! - PRG ROM: Switchable 16KB bank (0x8000-0xBFFF) + fixed last 16KB bank
//! - CHR ROM: Two latch-selected 4KB banks (0x0000-0x0FFF, 0x1000-0x1FFF)

use log::{debug, info};
use crate::cartridge::{BankLayout, CartridgeImage, Mirroring};
use crate::savestate::{LatchMapperState, RegisterSnapshot, StateError};
use crate::util::check_bit;
use super::banking::{last_bank, BankMapping, KB16, KB4, KB8};
use super::latch::{LatchPair, LatchState, TriggerWidth};
use super::{mismatch, Mapper, MapperError, OPEN_BUS};

#[derive(Debug)]
pub struct Mapper010 {
    image: CartridgeImage,

    /// Switchable 16KB PRG bank at 0x8000
    prg_bank: u8,

    /// CHR banks for the $FD latch state ($B000, $D000)
    chr_fd: [u8; 2],

    /// CHR banks for the $FE latch state ($C000, $E000)
    chr_fe: [u8; 2],

    mirroring: Mirroring,

    latches: LatchPair,
}

impl Mapper010 {
    pub const LAYOUT: BankLayout = BankLayout {
        prg_bank_size: KB16,
        chr_bank_size: KB4,
    };

    /// Create a new Mapper010 instance
    pub fn new(image: CartridgeImage) -> Result<Self, MapperError> {
        image.validate(Self::LAYOUT)?;
        let mirroring = image.mirroring;
        Ok(Mapper010 {
            image,
            prg_bank: 0,
            chr_fd: [0; 2],
            chr_fe: [0; 2],
            mirroring,
            latches: LatchPair::default(),
        })
    }

    #[inline]
    pub fn latches(&self) -> &LatchPair {
        &self.latches
    }

    fn chr_bank_for(&self, addr: u16) -> usize {
        let table = ((addr >> 12) & 0x01) as usize;
        let bank = match self.latches.for_addr(addr) {
            LatchState::Fd => self.chr_fd[table],
            LatchState::Fe => self.chr_fe[table],
        };
        bank as usize
    }
}

impl Mapper for Mapper010 {
    fn map_cpu(&self, addr: u16) -> Option<BankMapping> {
        let within = (addr & 0x3FFF) as usize;
        match addr {
            0x6000..=0x7FFF => self.image.prg_ram_bank(0, KB8, (addr - 0x6000) as usize),
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
            self.image.chr_bank(self.chr_bank_for(addr), KB4, (addr & 0x0FFF) as usize)
        } else {
            None
        }
    }

    fn ppu_read(&mut self, addr: u16) -> u8 {
        let value = match self.map_ppu(addr) {
            Some(mapping) => self.image.read_mapped(mapping),
            None => OPEN_BUS,
        };
        self.latches.observe(addr, TriggerWidth::TileRow);
        value
    }

    fn cpu_write(&mut self, addr: u16, data: u8) {
        match addr {
            0x6000..=0x7FFF => {
                if let Some(mapping) = self.map_cpu(addr) {
                    self.image.write_mapped(mapping, data);
                }
                return;
            }
            0xA000..=0xAFFF => self.prg_bank = data & 0x0F,
            0xB000..=0xBFFF => self.chr_fd[0] = data & 0x1F,
            0xC000..=0xCFFF => self.chr_fe[0] = data & 0x1F,
            0xD000..=0xDFFF => self.chr_fd[1] = data & 0x1F,
            0xE000..=0xEFFF => self.chr_fe[1] = data & 0x1F,
            0xF000..=0xFFFF => {
                self.mirroring = if check_bit(data, 0) {
                    Mirroring::Horizontal
                } else {
                    Mirroring::Vertical
                };
            }
            _ => return,
        }
        debug!("MMC4 write ${:04X} = ${:02X}", addr, data);
    }

    fn mirroring(&self) -> Mirroring {
        self.mirroring
    }

    fn reset(&mut self) {
        self.prg_bank = 0;
        self.chr_fd = [0; 2];
        self.chr_fe = [0; 2];
        self.mirroring = self.image.mirroring;
        self.latches = LatchPair::default();
        info!("MMC4 reset");
    }

    fn registers(&self) -> RegisterSnapshot {
        RegisterSnapshot::Mmc4(LatchMapperState {
            prg_bank: self.prg_bank,
            chr_fd: self.chr_fd,
            chr_fe: self.chr_fe,
            mirroring: self.mirroring,
            latches: self.latches.clone(),
        })
    }

    fn restore_registers(&mut self, snapshot: RegisterSnapshot) -> Result<(), StateError> {
        match snapshot {
            RegisterSnapshot::Mmc4(state) => {
                self.prg_bank = state.prg_bank;
                self.chr_fd = state.chr_fd;
                self.chr_fe = state.chr_fe;
                self.mirroring = state.mirroring;
                self.latches = state.latches;
                Ok(())
            }
            other => Err(mismatch("MMC4", &other)),
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
        "MMC4"
    }
}
