//! Mapper 009 (MMC2) implementation
//!
//! PRG banking plus latch-driven CHR banking: each pattern-table half has two
//! candidate 4KB banks and a latch, flipped by the PPU fetching tile $FD or $FE,
//! chooses between them. Only Mike Tyson's Punch-Out!! uses it.
//!
//! Memory map:
//! - PRG ROM: Switchable 8KB bank (0x8000-0x9FFF) + last three 8KB banks fixed
//! - CHR ROM: Two latch-selected 4KB banks (0x0000-0x0FFF, 0x1000-0x1FFF)
//!
//! Registers:
//! - 0xA000-0xAFFF: PRG bank
//! - 0xB000-0xBFFF: CHR bank for 0x0000 when latch 0 is $FD
//! - 0xC000-0xCFFF: CHR bank for 0x0000 when latch 0 is $FE
//! - 0xD000-0xDFFF: CHR bank for 0x1000 when latch 1 is $FD
//! - 0xE000-0xEFFF: CHR bank for 0x1000 when latch 1 is $FE
//! - 0xF000-0xFFFF: Mirroring (0: vertical, 1: horizontal)

use log::{debug, info};
use crate::cartridge::{BankLayout, CartridgeImage, Mirroring};
use crate::savestate::{LatchMapperState, RegisterSnapshot, StateError};
use crate::util::check_bit;
use super::banking::{bank_count, BankMapping, KB4, KB8};
use super::latch::{LatchPair, LatchState, TriggerWidth};
use super::{mismatch, Mapper, MapperError, OPEN_BUS};

#[derive(Debug)]
pub struct Mapper009 {
    image: CartridgeImage,

    /// Switchable 8KB PRG bank at 0x8000
    prg_bank: u8,

    /// CHR banks selected while a latch holds $FD, per pattern table
    chr_fd: [u8; 2],

    /// CHR banks selected while a latch holds $FE, per pattern table
    chr_fe: [u8; 2],

    mirroring: Mirroring,

    latches: LatchPair,
}

impl Mapper009 {
    pub const LAYOUT: BankLayout = BankLayout {
        prg_bank_size: KB8,
        chr_bank_size: KB4,
    };

    /// Create a new Mapper009 instance
    pub fn new(image: CartridgeImage) -> Result<Self, MapperError> {
        image.validate(Self::LAYOUT)?;
        let mirroring = image.mirroring;
        Ok(Mapper009 {
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
        match self.latches.for_addr(addr) {
            LatchState::Fd => self.chr_fd[table] as usize,
            LatchState::Fe => self.chr_fe[table] as usize,
        }
    }
}

impl Mapper for Mapper009 {
    fn map_cpu(&self, addr: u16) -> Option<BankMapping> {
        let within = (addr & 0x1FFF) as usize;
        match addr {
            0x6000..=0x7FFF => self.image.prg_ram_bank(0, KB8, within),
            0x8000..=0x9FFF => Some(self.image.prg_rom_bank(self.prg_bank as usize, KB8, within)),
            0xA000..=0xFFFF => {
                // Last three banks, in order; wraps on boards smaller than 32KB
                let count = bank_count(self.image.prg_rom.len(), KB8);
                let from_end = 3 - ((addr - 0xA000) >> 13) as usize;
                Some(self.image.prg_rom_bank(4 * count - from_end, KB8, within))
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
        // The triggering fetch still comes from the old bank
        let value = match self.map_ppu(addr) {
            Some(mapping) => self.image.read_mapped(mapping),
            None => OPEN_BUS,
        };
        self.latches.observe(addr, TriggerWidth::Exact);
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
        debug!("MMC2 write ${:04X} = ${:02X}", addr, data);
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
        info!("MMC2 reset");
    }

    fn registers(&self) -> RegisterSnapshot {
        RegisterSnapshot::Mmc2(LatchMapperState {
            prg_bank: self.prg_bank,
            chr_fd: self.chr_fd,
            chr_fe: self.chr_fe,
            mirroring: self.mirroring,
            latches: self.latches.clone(),
        })
    }

    fn restore_registers(&mut self, snapshot: RegisterSnapshot) -> Result<(), StateError> {
        match snapshot {
            RegisterSnapshot::Mmc2(state) => {
                self.prg_bank = state.prg_bank;
                self.chr_fd = state.chr_fd;
                self.chr_fe = state.chr_fe;
                self.mirroring = state.mirroring;
                self.latches = state.latches;
                Ok(())
            }
            other => Err(mismatch("MMC2", &other)),
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
        "MMC2"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mappers::banking::patterned_banks;

    fn mmc2() -> Mapper009 {
        let image = CartridgeImage::new(9, patterned_banks(16, KB8), patterned_banks(32, KB4));
        let mut mapper = Mapper009::new(image).unwrap();
        mapper.cpu_write(0xB000, 4);
        mapper.cpu_write(0xC000, 5);
        mapper.cpu_write(0xD000, 6);
        mapper.cpu_write(0xE000, 7);
        mapper
    }

    #[test]
    fn prg_layout() {
        let mut mapper = mmc2();
        mapper.cpu_write(0xA000, 3);
        assert_eq!(mapper.cpu_read(0x8000), 3);
        assert_eq!(mapper.cpu_read(0xA000), 13);
        assert_eq!(mapper.cpu_read(0xC000), 14);
        assert_eq!(mapper.cpu_read(0xE000), 15);
    }

    #[test]
    fn latch_switches_after_trigger_fetch() {
        let mut mapper = mmc2();
        // power-on state is $FE
        assert_eq!(mapper.ppu_read(0x0000), 5);

        // the trigger fetch itself comes from the $FE bank
        assert_eq!(mapper.ppu_read(0x0FD8), 5);
        assert_eq!(mapper.ppu_read(0x0000), 4);

        assert_eq!(mapper.ppu_read(0x0FE8), 4);
        assert_eq!(mapper.ppu_read(0x0000), 5);
    }

    #[test]
    fn low_latch_only_reacts_to_exact_address() {
        let mut mapper = mmc2();
        mapper.ppu_read(0x0FD9);
        mapper.ppu_read(0x0FDF);
        assert_eq!(mapper.latches().low.transitions(), 0);
        assert_eq!(mapper.ppu_read(0x0000), 5);
    }

    #[test]
    fn high_latch_uses_tile_row() {
        let mut mapper = mmc2();
        assert_eq!(mapper.ppu_read(0x1000), 7);
        mapper.ppu_read(0x1FDB);
        mapper.ppu_read(0x1FDB);
        assert_eq!(mapper.latches().high.transitions(), 1);
        assert_eq!(mapper.ppu_read(0x1000), 6);
    }

    #[test]
    fn mirroring_register() {
        let mut mapper = mmc2();
        mapper.cpu_write(0xF000, 0);
        assert_eq!(mapper.mirroring(), Mirroring::Vertical);
        mapper.cpu_write(0xF000, 1);
        assert_eq!(mapper.mirroring(), Mirroring::Horizontal);
    }
}
