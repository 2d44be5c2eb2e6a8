//! Mapper 001 (MMC1) implementation
//!
//! This mapper features PRG ROM banking, CHR ROM banking, and configurable mirroring.
//! Used by games like The Legend of Zelda, Metroid, Final Fantasy, etc.
//!
//! Memory map:
//! - PRG ROM: 16KB/32KB with banking
//! - PRG RAM: 8KB (0x6000-0x7FFF)
//! - CHR ROM/RAM: 8KB with banking
//!
//! Registers are loaded serially: five writes to 0x8000-0xFFFF shift one bit
//! each into a shift register, and the fifth write copies the result into the
//! register selected by address bits 13-14. On 512KB boards (SUROM) bit 4 of
//! the CHR bank registers selects which 256KB half of PRG ROM is visible.

use log::{debug, info};
use crate::cartridge::{BankLayout, CartridgeImage, Mirroring};
use crate::savestate::{Mmc1State, RegisterSnapshot, StateError};
use crate::util::check_bit;
use super::banking::{last_bank, BankMapping, KB16, KB4, KB8};
use super::{mismatch, Mapper, MapperError};

/// Shift register value after a reset
const SHIFT_RESET: u8 = 0x10;

/// Control value after a reset: PRG mode 3, 8KB CHR
const CONTROL_RESET: u8 = 0x0C;

/// PRG banks (16KB) addressable without the outer bank bit
const INNER_PRG_BANKS: usize = 16;

#[derive(Debug)]
pub struct Mapper001 {
    image: CartridgeImage,

    /// Shift register for serial MMC1 writes
    shift_register: u8,

    /// Shift register bit counter
    shift_count: u8,

    /// Control register (0x8000-0x9FFF)
    /// - Bits 0-1: Mirroring
    /// - Bits 2-3: PRG ROM bank mode
    /// - Bit 4: CHR ROM bank mode
    control: u8,

    /// CHR bank 0 register (0xA000-0xBFFF)
    chr_bank_0: u8,

    /// CHR bank 1 register (0xC000-0xDFFF)
    chr_bank_1: u8,

    /// PRG bank register (0xE000-0xFFFF)
    /// - Bits 0-3: PRG bank
    /// - Bit 4: PRG RAM disable
    prg_bank: u8,
}

impl Mapper001 {
    pub const LAYOUT: BankLayout = BankLayout {
        prg_bank_size: KB16,
        chr_bank_size: KB4,
    };

    /// Create a new Mapper001 instance
    pub fn new(image: CartridgeImage) -> Result<Self, MapperError> {
        image.validate(Self::LAYOUT)?;
        Ok(Mapper001 {
            image,
            shift_register: SHIFT_RESET,
            shift_count: 0,
            control: CONTROL_RESET,
            chr_bank_0: 0,
            chr_bank_1: 0,
            prg_bank: 0,
        })
    }

    /// PRG bank mode: 0/1 = 32KB, 2 = fix first bank, 3 = fix last bank
    #[inline]
    pub fn prg_mode(&self) -> u8 {
        (self.control >> 2) & 0x03
    }

    /// Whether CHR is switched as two 4KB banks
    #[inline]
    pub fn chr_4k_mode(&self) -> bool {
        check_bit(self.control, 4)
    }

    #[inline]
    pub fn prg_ram_enabled(&self) -> bool {
        !check_bit(self.prg_bank, 4)
    }

    /// 256KB half of PRG ROM selected on SUROM boards
    #[inline]
    fn prg_outer_bank(&self) -> usize {
        if self.image.prg_rom.len() > INNER_PRG_BANKS * KB16 {
            ((self.chr_bank_0 >> 4) & 0x01) as usize
        } else {
            0
        }
    }

    /// 16KB PRG bank visible at `addr`
    fn prg_bank_for(&self, addr: u16) -> usize {
        let bank = (self.prg_bank & 0x0F) as usize;
        let last = last_bank(self.image.prg_rom.len(), KB16).min(INNER_PRG_BANKS - 1);
        let upper_half = addr >= 0xC000;

        let inner = match self.prg_mode() {
            0 | 1 => (bank & !1) | upper_half as usize,
            2 => if upper_half { bank } else { 0 },
            _ => if upper_half { last } else { bank },
        };
        self.prg_outer_bank() * INNER_PRG_BANKS + inner
    }

    /// 4KB CHR bank visible at `addr`
    fn chr_bank_for(&self, addr: u16) -> usize {
        let upper_half = addr & 0x1000 != 0;
        if self.chr_4k_mode() {
            if upper_half { self.chr_bank_1 as usize } else { self.chr_bank_0 as usize }
        } else {
            (self.chr_bank_0 & 0x1E) as usize | upper_half as usize
        }
    }

    /// Write to a mapper register
    fn write_register(&mut self, addr: u16, data: u8) {
        // Register area is selected by bits 13-14 of the address
        match (addr >> 13) & 0x03 {
            0 => self.control = data,
            1 => self.chr_bank_0 = data,
            2 => self.chr_bank_1 = data,
            _ => self.prg_bank = data,
        }

        debug!("MMC1 Register update: addr=${:04X}, data=${:02X}, control=${:02X}, chr0=${:02X}, chr1=${:02X}, prg=${:02X}",
              addr, data, self.control, self.chr_bank_0, self.chr_bank_1, self.prg_bank);
    }
}

impl Mapper for Mapper001 {
    fn map_cpu(&self, addr: u16) -> Option<BankMapping> {
        match addr {
            0x6000..=0x7FFF if self.prg_ram_enabled() => {
                self.image.prg_ram_bank(0, KB8, (addr - 0x6000) as usize)
            }
            0x8000..=0xFFFF => Some(self.image.prg_rom_bank(
                self.prg_bank_for(addr),
                KB16,
                (addr & 0x3FFF) as usize,
            )),
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

    fn cpu_write(&mut self, addr: u16, data: u8) {
        match addr {
            0x6000..=0x7FFF => {
                if let Some(mapping) = self.map_cpu(addr) {
                    self.image.write_mapped(mapping, data);
                }
            }
            0x8000..=0xFFFF => {
                // Reset on bit 7 set
                if check_bit(data, 7) {
                    self.shift_register = SHIFT_RESET;
                    self.shift_count = 0;
                    self.control |= CONTROL_RESET;
                    return;
                }

                // Serial shift register
                self.shift_register >>= 1;
                self.shift_register |= (data & 0x01) << 4;
                self.shift_count += 1;

                // If 5 bits have been written, update the register
                if self.shift_count == 5 {
                    self.write_register(addr, self.shift_register);
                    self.shift_register = SHIFT_RESET;
                    self.shift_count = 0;
                }
            }
            _ => {}
        }
    }

    fn mirroring(&self) -> Mirroring {
        match self.control & 0x03 {
            0 => Mirroring::SingleScreenLower,
            1 => Mirroring::SingleScreenUpper,
            2 => Mirroring::Vertical,
            _ => Mirroring::Horizontal,
        }
    }

    fn reset(&mut self) {
        self.shift_register = SHIFT_RESET;
        self.shift_count = 0;
        self.control = CONTROL_RESET;
        self.chr_bank_0 = 0;
        self.chr_bank_1 = 0;
        self.prg_bank = 0;
        info!("MMC1 reset");
    }

    fn registers(&self) -> RegisterSnapshot {
        RegisterSnapshot::Mmc1(Mmc1State {
            shift_register: self.shift_register,
            shift_count: self.shift_count,
            control: self.control,
            chr_bank_0: self.chr_bank_0,
            chr_bank_1: self.chr_bank_1,
            prg_bank: self.prg_bank,
        })
    }

    fn restore_registers(&mut self, snapshot: RegisterSnapshot) -> Result<(), StateError> {
        match snapshot {
            RegisterSnapshot::Mmc1(state) => {
                if state.shift_count >= 5 {
                    return Err(StateError::InvalidData);
                }
                self.shift_register = state.shift_register;
                self.shift_count = state.shift_count;
                self.control = state.control;
                self.chr_bank_0 = state.chr_bank_0;
                self.chr_bank_1 = state.chr_bank_1;
                self.prg_bank = state.prg_bank;
                Ok(())
            }
            other => Err(mismatch("MMC1", &other)),
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
        "MMC1"
    }
}
