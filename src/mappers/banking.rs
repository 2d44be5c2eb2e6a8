//! Bank arithmetic shared by every mapper
//!
//! A mapper never hands out raw pointers into cartridge storage. It resolves an
//! address into a `BankMapping` (which buffer, which offset) and the cartridge
//! image performs the access. Every offset produced here is reduced modulo the
//! bank count and the buffer length, so a register holding a bank number larger
//! than the ROM simply aliases onto an existing bank.

use crate::cartridge::CartridgeImage;
use super::OPEN_BUS;

/// 1KB bank
pub const KB1: usize = 0x0400;
/// 2KB bank
pub const KB2: usize = 0x0800;
/// 4KB bank
pub const KB4: usize = 0x1000;
/// 8KB bank
pub const KB8: usize = 0x2000;
/// 16KB bank
pub const KB16: usize = 0x4000;
/// 32KB bank
pub const KB32: usize = 0x8000;

/// Storage an access resolves to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Source {
    PrgRom,
    PrgRam,
    ChrRom,
    ChrRam,
}

impl Source {
    /// Whether writes through this mapping reach storage
    #[inline]
    pub fn is_writable(self) -> bool {
        matches!(self, Source::PrgRam | Source::ChrRam)
    }
}

/// Result of translating a bus address
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BankMapping {
    pub source: Source,
    pub offset: usize,
}

impl BankMapping {
    #[inline]
    pub fn new(source: Source, offset: usize) -> Self {
        BankMapping { source, offset }
    }
}

/// Number of whole `bank_size` banks in a buffer of `len` bytes (at least one,
/// so a buffer smaller than a bank still mirrors into the window)
#[inline]
pub fn bank_count(len: usize, bank_size: usize) -> usize {
    (len / bank_size).max(1)
}

/// Offset of byte `within` of bank `bank` in a buffer of `len` bytes.
///
/// `len` must be non-zero. The result is always `< len`.
#[inline]
pub fn bank_offset(bank: usize, bank_size: usize, len: usize, within: usize) -> usize {
    let bank = bank % bank_count(len, bank_size);
    (bank * bank_size + within % bank_size) % len
}

/// Index of the last bank of a buffer
#[inline]
pub fn last_bank(len: usize, bank_size: usize) -> usize {
    bank_count(len, bank_size) - 1
}

impl CartridgeImage {
    fn storage(&self, source: Source) -> &[u8] {
        match source {
            Source::PrgRom => &self.prg_rom,
            Source::PrgRam => &self.prg_ram,
            Source::ChrRom => &self.chr_rom,
            Source::ChrRam => &self.chr_ram,
        }
    }

    /// Length of the buffer behind `source`
    #[inline]
    pub fn storage_len(&self, source: Source) -> usize {
        self.storage(source).len()
    }

    /// Source that backs pattern-table accesses
    #[inline]
    pub fn chr_source(&self) -> Source {
        if self.chr_is_ram() {
            Source::ChrRam
        } else {
            Source::ChrRom
        }
    }

    /// Map byte `within` of PRG ROM bank `bank`
    #[inline]
    pub fn prg_rom_bank(&self, bank: usize, bank_size: usize, within: usize) -> BankMapping {
        BankMapping::new(
            Source::PrgRom,
            bank_offset(bank, bank_size, self.prg_rom.len(), within),
        )
    }

    /// Map byte `within` of PRG RAM bank `bank`; None when the board has no PRG RAM
    #[inline]
    pub fn prg_ram_bank(&self, bank: usize, bank_size: usize, within: usize) -> Option<BankMapping> {
        if self.prg_ram.is_empty() {
            return None;
        }
        Some(BankMapping::new(
            Source::PrgRam,
            bank_offset(bank, bank_size, self.prg_ram.len(), within),
        ))
    }

    /// Map byte `within` of CHR bank `bank`, in whichever CHR storage the board has
    #[inline]
    pub fn chr_bank(&self, bank: usize, bank_size: usize, within: usize) -> Option<BankMapping> {
        let source = self.chr_source();
        let len = self.storage_len(source);
        if len == 0 {
            return None;
        }
        Some(BankMapping::new(source, bank_offset(bank, bank_size, len, within)))
    }

    /// Read through a mapping. Offsets past the end read as open bus.
    #[inline]
    pub fn read_mapped(&self, mapping: BankMapping) -> u8 {
        self.storage(mapping.source)
            .get(mapping.offset)
            .copied()
            .unwrap_or(OPEN_BUS)
    }

    /// Write through a mapping. ROM sources and offsets past the end are ignored.
    #[inline]
    pub fn write_mapped(&mut self, mapping: BankMapping, value: u8) {
        let storage = match mapping.source {
            Source::PrgRam => &mut self.prg_ram,
            Source::ChrRam => &mut self.chr_ram,
            Source::PrgRom | Source::ChrRom => return,
        };
        if let Some(byte) = storage.get_mut(mapping.offset) {
            *byte = value;
        }
    }
}

/// ROM whose every byte holds the index of the bank it sits in
#[cfg(test)]
pub(crate) fn patterned_banks(count: usize, bank_size: usize) -> Vec<u8> {
    (0..count)
        .flat_map(|bank| std::iter::repeat(bank as u8).take(bank_size))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bank_index_wraps_modulo_bank_count() {
        // 8 banks of 16KB
        let len = 8 * KB16;
        assert_eq!(bank_offset(9, KB16, len, 0x0123), KB16 + 0x0123);
        assert_eq!(bank_offset(255, KB16, len, 0), 7 * KB16);
    }

    #[test]
    fn short_buffer_mirrors_inside_window() {
        // 16KB ROM in a 32KB window
        assert_eq!(bank_offset(0, KB32, KB16, 0x4001), 0x0001);
        // 2KB RAM in an 8KB window
        assert_eq!(bank_offset(3, KB8, KB2, 0x1801), 0x0001);
    }

    #[test]
    fn non_power_of_two_bank_counts_stay_in_bounds() {
        let len = 3 * KB16;
        for bank in 0..=255 {
            assert!(bank_offset(bank, KB16, len, KB16 - 1) < len);
        }
        assert_eq!(last_bank(len, KB16), 2);
    }

    #[test]
    fn rom_writes_are_dropped() {
        let mut image = CartridgeImage::new(0, vec![0x11; KB16], Vec::new());
        let rom = image.prg_rom_bank(0, KB16, 5);
        image.write_mapped(rom, 0x99);
        assert_eq!(image.read_mapped(rom), 0x11);

        let chr = image.chr_bank(0, KB8, 5).expect("CHR RAM present");
        assert_eq!(chr.source, Source::ChrRam);
        image.write_mapped(chr, 0x99);
        assert_eq!(image.read_mapped(chr), 0x99);
    }

    #[test]
    fn missing_prg_ram_is_unmapped() {
        let image = CartridgeImage::new(0, vec![0; KB16], Vec::new());
        assert_eq!(image.prg_ram_bank(0, KB8, 0), None);
    }
}
