//! NES cartridge image
//!
//! This module holds the storage a cartridge brings to the console: PRG ROM
//! (program code), CHR ROM or CHR RAM (pattern tables), optional PRG RAM and the
//! board's wiring of the nametables. Header parsing happens in the loader; by the
//! time a `CartridgeImage` exists its buffers are plain byte vectors and the
//! mapper takes ownership of them for the length of the session.

use std::fmt;
use log::warn;
use serde::{Deserialize, Serialize};

use crate::mappers::MapperError;

/// Size of a PRG ROM bank as declared by the iNES header (16KB)
pub const PRG_ROM_UNIT: usize = 16 * 1024;

/// Size of a CHR ROM bank as declared by the iNES header (8KB)
pub const CHR_ROM_UNIT: usize = 8 * 1024;

/// Nametable mirroring modes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Mirroring {
    /// Horizontal mirroring (vertical arrangement of nametables)
    Horizontal,

    /// Vertical mirroring (horizontal arrangement of nametables)
    Vertical,

    /// Single-screen mirroring, lower bank
    SingleScreenLower,

    /// Single-screen mirroring, upper bank
    SingleScreenUpper,

    /// Four-screen mirroring (no mirroring)
    FourScreen,
}

impl Mirroring {
    /// Which of the two CIRAM pages backs each of the four logical nametables.
    ///
    /// Four-screen boards bring their own nametable RAM; the first two entries
    /// are returned for them so a PPU without extra RAM still renders something.
    pub fn nametable_pages(self) -> [u8; 4] {
        match self {
            Mirroring::Horizontal => [0, 0, 1, 1],
            Mirroring::Vertical => [0, 1, 0, 1],
            Mirroring::SingleScreenLower => [0, 0, 0, 0],
            Mirroring::SingleScreenUpper => [1, 1, 1, 1],
            Mirroring::FourScreen => [0, 1, 0, 1],
        }
    }
}

/// Bank granularity a mapper variant expects its ROM to be cut into
#[derive(Debug, Clone, Copy)]
pub struct BankLayout {
    /// Smallest PRG ROM bank the variant can switch
    pub prg_bank_size: usize,

    /// Smallest CHR ROM bank the variant can switch
    pub chr_bank_size: usize,
}

/// The storage of one cartridge, already split out of the ROM file
#[derive(Clone)]
pub struct CartridgeImage {
    /// iNES mapper number
    pub mapper: u16,

    /// PRG ROM data
    pub prg_rom: Vec<u8>,

    /// PRG ROM size declared by the loader
    pub prg_rom_size: usize,

    /// CHR ROM data (empty for CHR RAM boards)
    pub chr_rom: Vec<u8>,

    /// CHR ROM size declared by the loader
    pub chr_rom_size: usize,

    /// PRG RAM (work RAM or battery-backed save RAM), empty if absent
    pub prg_ram: Vec<u8>,

    /// CHR RAM, empty if the board uses CHR ROM
    pub chr_ram: Vec<u8>,

    /// Whether PRG RAM is battery-backed
    pub has_battery: bool,

    /// Mirroring wired on the board
    pub mirroring: Mirroring,
}

impl CartridgeImage {
    /// Create an image from PRG and CHR ROM. An empty `chr_rom` means the board
    /// uses CHR RAM, which is given 8KB until `with_chr_ram` says otherwise.
    pub fn new(mapper: u16, prg_rom: Vec<u8>, chr_rom: Vec<u8>) -> Self {
        let chr_ram = if chr_rom.is_empty() {
            vec![0; CHR_ROM_UNIT]
        } else {
            Vec::new()
        };

        CartridgeImage {
            mapper,
            prg_rom_size: prg_rom.len(),
            prg_rom,
            chr_rom_size: chr_rom.len(),
            chr_rom,
            prg_ram: Vec::new(),
            chr_ram,
            has_battery: false,
            mirroring: Mirroring::Horizontal,
        }
    }

    /// Attach `size` bytes of PRG RAM
    pub fn with_prg_ram(mut self, size: usize) -> Self {
        self.prg_ram = vec![0; size];
        self
    }

    /// Replace the CHR RAM with `size` bytes (0 removes it)
    pub fn with_chr_ram(mut self, size: usize) -> Self {
        self.chr_ram = vec![0; size];
        self
    }

    /// Mark PRG RAM as battery-backed
    pub fn with_battery(mut self, has_battery: bool) -> Self {
        self.has_battery = has_battery;
        self
    }

    /// Set the mirroring wired on the board
    pub fn with_mirroring(mut self, mirroring: Mirroring) -> Self {
        self.mirroring = mirroring;
        self
    }

    /// Whether the pattern tables are backed by CHR RAM
    #[inline]
    pub fn chr_is_ram(&self) -> bool {
        self.chr_rom.is_empty()
    }

    /// The authoritative pattern-table storage
    #[inline]
    pub fn chr(&self) -> &[u8] {
        if self.chr_is_ram() {
            &self.chr_ram
        } else {
            &self.chr_rom
        }
    }

    /// Check that the buffers agree with the declared sizes and with the bank
    /// granularity of the variant that is about to own them.
    pub fn validate(&self, layout: BankLayout) -> Result<(), MapperError> {
        if self.prg_rom.len() != self.prg_rom_size {
            return Err(MapperError::SizeMismatch {
                region: "PRG ROM",
                declared: self.prg_rom_size,
                actual: self.prg_rom.len(),
            });
        }
        if self.chr_rom.len() != self.chr_rom_size {
            return Err(MapperError::SizeMismatch {
                region: "CHR ROM",
                declared: self.chr_rom_size,
                actual: self.chr_rom.len(),
            });
        }
        if self.prg_rom.is_empty() {
            return Err(MapperError::MissingPrgRom);
        }
        if self.prg_rom.len() % layout.prg_bank_size != 0 {
            return Err(MapperError::MisalignedRom {
                region: "PRG ROM",
                size: self.prg_rom.len(),
                bank_size: layout.prg_bank_size,
            });
        }
        match (self.chr_rom.is_empty(), self.chr_ram.is_empty()) {
            (true, true) => return Err(MapperError::MissingChr),
            (false, false) => return Err(MapperError::ConflictingChr),
            _ => {}
        }
        if !self.chr_rom.is_empty() && self.chr_rom.len() % layout.chr_bank_size != 0 {
            return Err(MapperError::MisalignedRom {
                region: "CHR ROM",
                size: self.chr_rom.len(),
                bank_size: layout.chr_bank_size,
            });
        }
        if self.has_battery && self.prg_ram.is_empty() {
            warn!("Battery flag set on mapper {} without PRG RAM; nothing will be saved", self.mapper);
        }
        Ok(())
    }
}

impl fmt::Debug for CartridgeImage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CartridgeImage")
            .field("mapper", &self.mapper)
            .field("mirroring", &self.mirroring)
            .field("prg_rom_size", &self.prg_rom.len())
            .field("chr_rom_size", &self.chr_rom.len())
            .field("prg_ram_size", &self.prg_ram.len())
            .field("chr_ram_size", &self.chr_ram.len())
            .field("has_battery", &self.has_battery)
            .finish()
    }
}
