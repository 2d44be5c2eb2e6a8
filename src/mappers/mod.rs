//! Mapper implementations for NES cartridges
//!
//! The NES uses various memory mappers to expand the capabilities of the hardware.
//! This module provides the `Mapper` contract every board implements, the
//! closed set of supported boards behind `MapperHandle`, and the factory that
//! picks one from the iNES mapper number.
//!
//! Supported boards:
//! - 0 NROM, 1 MMC1, 2 UxROM, 3 CNROM, 4 MMC3
//! - 5 MMC5, 7 AxROM, 9 MMC2, 10 MMC4, 11 Color Dreams
//! - 24/26 VRC6, 71 Camerica

pub mod banking;
pub mod irq;
pub mod latch;

mod mapper000; // NROM
mod mapper001; // MMC1
mod mapper002; // UxROM
mod mapper003; // CNROM
mod mapper004; // MMC3
mod mapper005; // MMC5
mod mapper007; // AxROM
mod mapper009; // MMC2
mod mapper010; // MMC4
mod mapper011; // Color Dreams
mod mapper024; // VRC6a, VRC6b (26)
mod mapper071; // Camerica

pub use mapper000::Mapper000;
pub use mapper001::Mapper001;
pub use mapper002::Mapper002;
pub use mapper003::Mapper003;
pub use mapper004::Mapper004;
pub use mapper005::Mapper005;
pub use mapper007::Mapper007;
pub use mapper009::Mapper009;
pub use mapper010::Mapper010;
pub use mapper011::Mapper011;
pub use mapper024::Mapper024;
pub use mapper071::Mapper071;

use log::{info, warn};
use thiserror::Error;

use crate::cartridge::{CartridgeImage, Mirroring};
use crate::savestate::{self, RegisterSnapshot, StateError};
use banking::BankMapping;
use irq::IrqClockSource;

/// Value returned for reads that hit nothing
pub const OPEN_BUS: u8 = 0x00;

/// Size of the console's internal nametable RAM
pub const CIRAM_SIZE: usize = 0x0800;

/// Errors that can occur when creating a mapper
#[derive(Error, Debug)]
pub enum MapperError {
    #[error("Unsupported mapper: {0}")]
    UnsupportedMapper(u16),

    #[error("{region} size mismatch: declared {declared} bytes, buffer holds {actual}")]
    SizeMismatch {
        region: &'static str,
        declared: usize,
        actual: usize,
    },

    #[error("Cartridge has no PRG ROM")]
    MissingPrgRom,

    #[error("{region} size {size} is not a multiple of the {bank_size}-byte bank size")]
    MisalignedRom {
        region: &'static str,
        size: usize,
        bank_size: usize,
    },

    #[error("Cartridge has neither CHR ROM nor CHR RAM")]
    MissingChr,

    #[error("Cartridge has both CHR ROM and CHR RAM")]
    ConflictingChr,
}

/// Options that change how a mapper is driven
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MapperConfig {
    /// What clocks the MMC3 scanline counter
    pub irq_clock: IrqClockSource,
}

/// Trait for NES mappers
///
/// Reads take `&mut self` because several boards react to what is fetched:
/// MMC2/MMC4 latches flip on pattern fetches, MMC3 counts A12 edges and the
/// MMC5 status register acknowledges its IRQ when read.
pub trait Mapper {
    /// Translate a CPU address. None means nothing is mapped there.
    fn map_cpu(&self, addr: u16) -> Option<BankMapping>;

    /// Translate a PPU pattern-table address
    fn map_ppu(&self, addr: u16) -> Option<BankMapping>;

    /// Read from the CPU bus ($4020-$FFFF)
    fn cpu_read(&mut self, addr: u16) -> u8 {
        match self.map_cpu(addr) {
            Some(mapping) => self.image().read_mapped(mapping),
            None => OPEN_BUS,
        }
    }

    /// Write to the CPU bus. Register writes and RAM writes both land here.
    fn cpu_write(&mut self, addr: u16, value: u8);

    /// Read a pattern-table byte ($0000-$1FFF)
    fn ppu_read(&mut self, addr: u16) -> u8 {
        match self.map_ppu(addr) {
            Some(mapping) => self.image().read_mapped(mapping),
            None => OPEN_BUS,
        }
    }

    /// Write a pattern-table byte. Only CHR RAM accepts it.
    fn ppu_write(&mut self, addr: u16, value: u8) {
        if let Some(mapping) = self.map_ppu(addr) {
            self.image_mut().write_mapped(mapping, value);
        }
    }

    /// Read a nametable byte ($2000-$3EFF) given the console's CIRAM
    fn ppu_nametable_read(&mut self, addr: u16, ciram: &[u8; CIRAM_SIZE]) -> u8 {
        ciram[ciram_index(self.mirroring(), addr)]
    }

    /// Write a nametable byte ($2000-$3EFF) into the console's CIRAM
    fn ppu_nametable_write(&mut self, addr: u16, value: u8, ciram: &mut [u8; CIRAM_SIZE]) {
        ciram[ciram_index(self.mirroring(), addr)] = value;
    }

    /// Get the current mirroring mode
    fn mirroring(&self) -> Mirroring;

    /// Reset the mapper to its initial state
    fn reset(&mut self);

    /// Notify that a scanline has been completed
    fn notify_scanline(&mut self) {}

    /// Notify that the PPU entered vertical blank
    fn notify_vblank(&mut self) {}

    /// Notify that `cycles` CPU cycles elapsed
    fn notify_cpu_cycles(&mut self, _cycles: u32) {}

    /// Check if an IRQ is being asserted
    fn irq_pending(&self) -> bool {
        false
    }

    /// Acknowledge an IRQ
    fn irq_acknowledge(&mut self) {}

    /// Current register contents
    fn registers(&self) -> RegisterSnapshot;

    /// Replace the register contents
    fn restore_registers(&mut self, snapshot: RegisterSnapshot) -> Result<(), StateError>;

    /// The cartridge this mapper owns
    fn image(&self) -> &CartridgeImage;

    fn image_mut(&mut self) -> &mut CartridgeImage;

    /// End the session and hand the cartridge back
    fn into_image(self) -> CartridgeImage
    where
        Self: Sized;

    /// iNES mapper number
    fn mapper_number(&self) -> u16 {
        self.image().mapper
    }

    /// Board name
    fn name(&self) -> &'static str;

    /// Battery-backed PRG RAM, if the board has any
    fn battery_ram(&self) -> Option<&[u8]> {
        let image = self.image();
        if image.has_battery && !image.prg_ram.is_empty() {
            Some(&image.prg_ram)
        } else {
            None
        }
    }

    /// Load battery-backed PRG RAM from a save file
    fn load_battery_ram(&mut self, data: &[u8]) {
        let prg_ram = &mut self.image_mut().prg_ram;
        if !data.is_empty() && data.len() <= prg_ram.len() {
            prg_ram[..data.len()].copy_from_slice(data);
        } else {
            warn!("Ignoring battery RAM of {} bytes for {} bytes of PRG RAM", data.len(), prg_ram.len());
        }
    }

    /// Level of the board's expansion audio DAC, for boards that have one
    fn expansion_audio(&self) -> Option<u8> {
        None
    }

    /// Serialize registers and RAM
    fn save_state(&self) -> Result<Vec<u8>, StateError> {
        savestate::encode_state(&self.registers(), self.image())
    }

    /// Restore registers and RAM. A rejected payload leaves the mapper reset
    /// and its RAM untouched.
    fn load_state(&mut self, data: &[u8]) -> Result<(), StateError> {
        let current = self.registers();
        let result = savestate::decode_state(data, &current, self.image()).and_then(|decoded| {
            self.restore_registers(decoded.registers.clone())?;
            decoded.apply_ram(self.image_mut());
            Ok(())
        });

        if let Err(e) = &result {
            warn!("Rejected save state for {}: {}", self.name(), e);
            self.reset();
        }
        result
    }
}

/// CIRAM offset of a nametable address under a mirroring mode
#[inline]
pub fn ciram_index(mirroring: Mirroring, addr: u16) -> usize {
    let table = ((addr as usize) >> 10) & 0x03;
    let page = mirroring.nametable_pages()[table] as usize;
    page * 0x0400 + (addr as usize & 0x03FF)
}

/// Error for a snapshot handed to the wrong variant
pub(crate) fn mismatch(expected: &'static str, snapshot: &RegisterSnapshot) -> StateError {
    StateError::MapperMismatch {
        expected,
        found: snapshot.name(),
    }
}

/// Board name for an iNES mapper number
pub fn mapper_name(number: u16) -> Option<&'static str> {
    let name = match number {
        0 => "NROM",
        1 => "MMC1",
        2 => "UxROM",
        3 => "CNROM",
        4 => "MMC3",
        5 => "MMC5",
        7 => "AxROM",
        9 => "MMC2",
        10 => "MMC4",
        11 => "Color Dreams",
        24 => "VRC6a",
        26 => "VRC6b",
        71 => "Camerica",
        _ => return None,
    };
    Some(name)
}

/// One of the supported boards
#[derive(Debug)]
pub enum MapperHandle {
    Nrom(Mapper000),
    Mmc1(Mapper001),
    UxRom(Mapper002),
    CnRom(Mapper003),
    Mmc3(Mapper004),
    Mmc5(Mapper005),
    AxRom(Mapper007),
    Mmc2(Mapper009),
    Mmc4(Mapper010),
    ColorDreams(Mapper011),
    Vrc6(Mapper024),
    Camerica(Mapper071),
}

macro_rules! dispatch {
    ($handle:expr, $mapper:ident => $body:expr) => {
        match $handle {
            MapperHandle::Nrom($mapper) => $body,
            MapperHandle::Mmc1($mapper) => $body,
            MapperHandle::UxRom($mapper) => $body,
            MapperHandle::CnRom($mapper) => $body,
            MapperHandle::Mmc3($mapper) => $body,
            MapperHandle::Mmc5($mapper) => $body,
            MapperHandle::AxRom($mapper) => $body,
            MapperHandle::Mmc2($mapper) => $body,
            MapperHandle::Mmc4($mapper) => $body,
            MapperHandle::ColorDreams($mapper) => $body,
            MapperHandle::Vrc6($mapper) => $body,
            MapperHandle::Camerica($mapper) => $body,
        }
    };
}

impl Mapper for MapperHandle {
    fn map_cpu(&self, addr: u16) -> Option<BankMapping> {
        dispatch!(self, m => m.map_cpu(addr))
    }

    fn map_ppu(&self, addr: u16) -> Option<BankMapping> {
        dispatch!(self, m => m.map_ppu(addr))
    }

    fn cpu_read(&mut self, addr: u16) -> u8 {
        dispatch!(self, m => m.cpu_read(addr))
    }

    fn cpu_write(&mut self, addr: u16, value: u8) {
        dispatch!(self, m => m.cpu_write(addr, value))
    }

    fn ppu_read(&mut self, addr: u16) -> u8 {
        dispatch!(self, m => m.ppu_read(addr))
    }

    fn ppu_write(&mut self, addr: u16, value: u8) {
        dispatch!(self, m => m.ppu_write(addr, value))
    }

    fn ppu_nametable_read(&mut self, addr: u16, ciram: &[u8; CIRAM_SIZE]) -> u8 {
        dispatch!(self, m => m.ppu_nametable_read(addr, ciram))
    }

    fn ppu_nametable_write(&mut self, addr: u16, value: u8, ciram: &mut [u8; CIRAM_SIZE]) {
        dispatch!(self, m => m.ppu_nametable_write(addr, value, ciram))
    }

    fn mirroring(&self) -> Mirroring {
        dispatch!(self, m => m.mirroring())
    }

    fn reset(&mut self) {
        dispatch!(self, m => m.reset())
    }

    fn notify_scanline(&mut self) {
        dispatch!(self, m => m.notify_scanline())
    }

    fn notify_vblank(&mut self) {
        dispatch!(self, m => m.notify_vblank())
    }

    fn notify_cpu_cycles(&mut self, cycles: u32) {
        dispatch!(self, m => m.notify_cpu_cycles(cycles))
    }

    fn irq_pending(&self) -> bool {
        dispatch!(self, m => m.irq_pending())
    }

    fn irq_acknowledge(&mut self) {
        dispatch!(self, m => m.irq_acknowledge())
    }

    fn registers(&self) -> RegisterSnapshot {
        dispatch!(self, m => m.registers())
    }

    fn restore_registers(&mut self, snapshot: RegisterSnapshot) -> Result<(), StateError> {
        dispatch!(self, m => m.restore_registers(snapshot))
    }

    fn image(&self) -> &CartridgeImage {
        dispatch!(self, m => m.image())
    }

    fn image_mut(&mut self) -> &mut CartridgeImage {
        dispatch!(self, m => m.image_mut())
    }

    fn into_image(self) -> CartridgeImage {
        dispatch!(self, m => m.into_image())
    }

    fn mapper_number(&self) -> u16 {
        dispatch!(self, m => m.mapper_number())
    }

    fn name(&self) -> &'static str {
        dispatch!(self, m => m.name())
    }

    fn battery_ram(&self) -> Option<&[u8]> {
        dispatch!(self, m => m.battery_ram())
    }

    fn load_battery_ram(&mut self, data: &[u8]) {
        dispatch!(self, m => m.load_battery_ram(data))
    }

    fn expansion_audio(&self) -> Option<u8> {
        dispatch!(self, m => m.expansion_audio())
    }
}

/// Create a mapper for `image` with the default configuration
pub fn create_mapper(image: CartridgeImage) -> Result<MapperHandle, MapperError> {
    create_mapper_with(image, &MapperConfig::default())
}

/// Create a new mapper instance based on the image's mapper number
pub fn create_mapper_with(image: CartridgeImage, config: &MapperConfig) -> Result<MapperHandle, MapperError> {
    let handle = match image.mapper {
        0 => MapperHandle::Nrom(Mapper000::new(image)?),
        1 => MapperHandle::Mmc1(Mapper001::new(image)?),
        2 => MapperHandle::UxRom(Mapper002::new(image)?),
        3 => MapperHandle::CnRom(Mapper003::new(image)?),
        4 => MapperHandle::Mmc3(Mapper004::with_clock(image, config.irq_clock)?),
        5 => MapperHandle::Mmc5(Mapper005::new(image)?),
        7 => MapperHandle::AxRom(Mapper007::new(image)?),
        9 => MapperHandle::Mmc2(Mapper009::new(image)?),
        10 => MapperHandle::Mmc4(Mapper010::new(image)?),
        11 => MapperHandle::ColorDreams(Mapper011::new(image)?),
        24 | 26 => MapperHandle::Vrc6(Mapper024::new(image)?),
        71 => MapperHandle::Camerica(Mapper071::new(image)?),
        number => return Err(MapperError::UnsupportedMapper(number)),
    };

    let image = handle.image();
    info!(
        "Mapper {} ({}): PRG ROM {}KB, CHR {} {}KB, PRG RAM {}KB{}",
        handle.mapper_number(),
        handle.name(),
        image.prg_rom.len() / 1024,
        if image.chr_is_ram() { "RAM" } else { "ROM" },
        image.chr().len() / 1024,
        image.prg_ram.len() / 1024,
        if image.has_battery { " (battery)" } else { "" }
    );
    Ok(handle)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_mapper_numbers_are_rejected() {
        let image = CartridgeImage::new(6, vec![0; 0x8000], vec![0; 0x2000]);
        assert!(matches!(create_mapper(image), Err(MapperError::UnsupportedMapper(6))));
    }

    #[test]
    fn every_named_mapper_can_be_created() {
        for number in [0u16, 1, 2, 3, 4, 5, 7, 9, 10, 11, 24, 26, 71] {
            let image = CartridgeImage::new(number, vec![0; 0x20000], vec![0; 0x8000]).with_prg_ram(0x2000);
            let mapper = create_mapper(image).unwrap();
            assert_eq!(mapper.mapper_number(), number);
            assert_eq!(Some(mapper.name()), mapper_name(number));
        }
    }

    #[test]
    fn default_nametables_follow_mirroring() {
        let image = CartridgeImage::new(0, vec![0; 0x4000], vec![0; 0x2000]).with_mirroring(Mirroring::Vertical);
        let mut mapper = create_mapper(image).unwrap();
        let mut ciram = [0u8; CIRAM_SIZE];
        mapper.ppu_nametable_write(0x2405, 0x77, &mut ciram);
        assert_eq!(ciram[0x0405], 0x77);
        assert_eq!(mapper.ppu_nametable_read(0x2C05, &ciram), 0x77);
        assert_eq!(mapper.ppu_nametable_read(0x2805, &ciram), 0x00);
    }

    #[test]
    fn battery_ram_loads_only_when_it_fits() {
        let image = CartridgeImage::new(0, vec![0; 0x4000], vec![0; 0x2000])
            .with_prg_ram(0x2000)
            .with_battery(true);
        let mut mapper = create_mapper(image).unwrap();

        // a short file fills the front and leaves the rest alone
        mapper.load_battery_ram(&[0xAA; 0x100]);
        let ram = mapper.battery_ram().unwrap();
        assert_eq!(ram[0xFF], 0xAA);
        assert_eq!(ram[0x100], 0x00);

        let full: Vec<u8> = (0..0x2000).map(|i| i as u8).collect();
        mapper.load_battery_ram(&full);
        assert_eq!(mapper.battery_ram().unwrap(), &full[..]);
        assert_eq!(mapper.cpu_read(0x6005), 0x05);

        mapper.load_battery_ram(&[0x55; 0x2001]);
        assert_eq!(mapper.battery_ram().unwrap(), &full[..]);

        mapper.load_battery_ram(&[]);
        assert_eq!(mapper.battery_ram().unwrap(), &full[..]);
    }

    #[test]
    fn into_image_returns_ram_contents() {
        let image = CartridgeImage::new(0, vec![0; 0x4000], Vec::new()).with_prg_ram(0x2000);
        let mut mapper = create_mapper(image).unwrap();
        mapper.cpu_write(0x6010, 0x5A);
        mapper.ppu_write(0x0010, 0xA5);
        let image = mapper.into_image();
        assert_eq!(image.prg_ram[0x10], 0x5A);
        assert_eq!(image.chr_ram[0x10], 0xA5);
    }
}
