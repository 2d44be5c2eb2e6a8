//! Mapper 005 (MMC5) implementation
//!
//! The most capable Nintendo mapper: four PRG banking modes with ROM/RAM
//! selectable per window, four CHR banking modes with two register sets,
//! 1KB of internal ExRAM, per-quadrant nametable mapping with a fill mode,
//! a scanline compare IRQ and an 8x8 multiplier.
//! Used by games like Castlevania III, Just Breed, Uncharted Waters, etc.
//!
//! Memory map:
//! - 0x5000-0x5206: Control registers
//! - 0x5C00-0x5FFF: ExRAM
//! - 0x6000-0x7FFF: PRG RAM bank ($5113)
//! - 0x8000-0xFFFF: PRG ROM/RAM windows ($5114-$5117, by PRG mode)
//! - CHR: 8KB/4KB/2KB/1KB banks ($5120-$512B, by CHR mode)
//!
//! Pulse channels ($5000-$5007, $5015) are not emulated; the raw PCM level
//! written to $5011 is exposed through `expansion_audio()`.

use log::{debug, info};
use crate::cartridge::{BankLayout, CartridgeImage, Mirroring};
use crate::savestate::{Mmc5State, RegisterSnapshot, StateError};
use crate::util::check_bit;
use super::banking::{BankMapping, KB1, KB8};
use super::irq::ScanlineCompare;
use super::{mismatch, Mapper, MapperError, CIRAM_SIZE, OPEN_BUS};

/// Size of the internal ExRAM
pub const EXRAM_SIZE: usize = 0x0400;

/// Nametable source selected by $5105
const NT_CIRAM_0: u8 = 0;
const NT_CIRAM_1: u8 = 1;
const NT_EXRAM: u8 = 2;

/// Offset of the attribute table within a nametable
const ATTRIBUTE_OFFSET: usize = 0x03C0;

/// ExRAM mode ($5104)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExRamMode {
    /// Extra nametable
    Nametable,
    /// Extended attributes (stored, used as a nametable here)
    ExtendedAttributes,
    /// CPU scratch RAM
    ReadWrite,
    /// CPU read-only
    ReadOnly,
}

impl ExRamMode {
    fn from_bits(bits: u8) -> Self {
        match bits & 0x03 {
            0 => ExRamMode::Nametable,
            1 => ExRamMode::ExtendedAttributes,
            2 => ExRamMode::ReadWrite,
            _ => ExRamMode::ReadOnly,
        }
    }

    /// ExRAM is only visible to the PPU as a nametable in modes 0 and 1
    fn is_nametable(self) -> bool {
        matches!(self, ExRamMode::Nametable | ExRamMode::ExtendedAttributes)
    }
}

#[derive(Debug)]
pub struct Mapper005 {
    image: CartridgeImage,

    /// PRG mode ($5100): 0 = 32KB, 1 = 16KB+16KB, 2 = 16KB+8KB+8KB, 3 = 4x8KB
    prg_mode: u8,

    /// CHR mode ($5101): 0 = 8KB, 1 = 4KB, 2 = 2KB, 3 = 1KB
    chr_mode: u8,

    /// ExRAM mode ($5104)
    exram_mode: u8,

    /// PRG RAM protect ($5102, $5103). Writes need 0b10 and 0b01.
    prg_ram_protect: [u8; 2],

    /// Nametable source per quadrant ($5105)
    nametable_map: [u8; 4],

    /// Fill mode tile ($5106)
    fill_tile: u8,

    /// Fill mode palette ($5107)
    fill_attr: u8,

    /// PRG bank registers ($5113-$5117)
    prg_regs: [u8; 5],

    /// CHR bank registers: set A ($5120-$5127), set B ($5128-$512B)
    chr_regs: [u16; 12],

    /// Upper CHR bank bits ($5130)
    chr_upper_bits: u8,

    /// Last CHR register write went to set B
    bg_set_last: bool,

    /// Scanline compare IRQ ($5203, $5204)
    irq: ScanlineCompare,

    /// Multiplier operands ($5205, $5206)
    multiplicand: u8,
    multiplier: u8,

    /// Raw PCM level ($5011)
    pcm_level: u8,

    /// Internal ExRAM
    exram: Vec<u8>,
}

impl Mapper005 {
    pub const LAYOUT: BankLayout = BankLayout {
        prg_bank_size: KB8,
        chr_bank_size: KB1,
    };

    /// Create a new Mapper005 instance
    pub fn new(image: CartridgeImage) -> Result<Self, MapperError> {
        image.validate(Self::LAYOUT)?;
        let mut mapper = Mapper005 {
            image,
            prg_mode: 3,
            chr_mode: 3,
            exram_mode: 0,
            prg_ram_protect: [0; 2],
            nametable_map: [0; 4],
            fill_tile: 0,
            fill_attr: 0,
            prg_regs: [0; 5],
            chr_regs: [0; 12],
            chr_upper_bits: 0,
            bg_set_last: false,
            irq: ScanlineCompare::default(),
            multiplicand: 0xFF,
            multiplier: 0xFF,
            pcm_level: 0,
            exram: vec![0; EXRAM_SIZE],
        };
        mapper.reset_registers();
        Ok(mapper)
    }

    fn reset_registers(&mut self) {
        self.prg_mode = 3;
        self.chr_mode = 3;
        self.exram_mode = 0;
        self.prg_ram_protect = [0; 2];
        self.nametable_map = self.image.mirroring.nametable_pages();
        self.fill_tile = 0;
        self.fill_attr = 0;
        self.prg_regs = [0, 0, 0, 0, 0xFF];
        self.chr_regs = [0; 12];
        self.chr_upper_bits = 0;
        self.bg_set_last = false;
        self.irq = ScanlineCompare::default();
        self.multiplicand = 0xFF;
        self.multiplier = 0xFF;
        self.pcm_level = 0;
        self.exram.fill(0);
    }

    #[inline]
    pub fn exram_mode(&self) -> ExRamMode {
        ExRamMode::from_bits(self.exram_mode)
    }

    /// Both protect registers hold their unlock values
    #[inline]
    pub fn prg_ram_writable(&self) -> bool {
        self.prg_ram_protect[0] == 0x02 && self.prg_ram_protect[1] == 0x01
    }

    /// 16-bit result of the hardware multiplier
    #[inline]
    pub fn product(&self) -> u16 {
        self.multiplicand as u16 * self.multiplier as u16
    }

    /// Register driving the window at `addr` (0x8000-0xFFFF), the window size
    /// in 8KB banks, and whether the window can only hold ROM
    fn prg_window(&self, addr: u16) -> (u8, usize, bool) {
        match (self.prg_mode, addr) {
            (0, _) => (self.prg_regs[4], 4, true),
            (1, 0x8000..=0xBFFF) => (self.prg_regs[2], 2, false),
            (1, _) => (self.prg_regs[4], 2, true),
            (2, 0x8000..=0xBFFF) => (self.prg_regs[2], 2, false),
            (2, 0xC000..=0xDFFF) => (self.prg_regs[3], 1, false),
            (2, _) => (self.prg_regs[4], 1, true),
            (_, 0x8000..=0x9FFF) => (self.prg_regs[1], 1, false),
            (_, 0xA000..=0xBFFF) => (self.prg_regs[2], 1, false),
            (_, 0xC000..=0xDFFF) => (self.prg_regs[3], 1, false),
            _ => (self.prg_regs[4], 1, true),
        }
    }

    /// Index of the CHR register serving 1KB slot `slot` and that register's
    /// bank size in KB
    fn chr_register_for(&self, slot: usize) -> (usize, usize) {
        let unit = 8 >> self.chr_mode;
        if self.bg_set_last {
            // Set B only has four registers; they repeat for 0x1000-0x1FFF
            let unit = unit.min(4);
            let slot = slot & 0x03;
            (8 + (slot / unit) * unit + unit - 1, unit)
        } else {
            ((slot / unit) * unit + unit - 1, unit)
        }
    }

    fn read_exram_cpu(&self, addr: u16) -> u8 {
        match self.exram_mode() {
            ExRamMode::ReadWrite | ExRamMode::ReadOnly => self.exram[(addr - 0x5C00) as usize],
            _ => OPEN_BUS,
        }
    }

    fn fill_attribute_byte(&self) -> u8 {
        let attr = self.fill_attr & 0x03;
        attr | attr << 2 | attr << 4 | attr << 6
    }
}

impl Mapper for Mapper005 {
    fn map_cpu(&self, addr: u16) -> Option<BankMapping> {
        match addr {
            0x6000..=0x7FFF => {
                let bank = (self.prg_regs[0] & 0x0F) as usize;
                self.image.prg_ram_bank(bank, KB8, (addr - 0x6000) as usize)
            }
            0x8000..=0xFFFF => {
                let (register, banks, rom_only) = self.prg_window(addr);
                let within_window = (addr as usize - 0x8000) % (banks * KB8);
                let bank = ((register & 0x7F) as usize & !(banks - 1)) + within_window / KB8;
                let within = within_window % KB8;

                if rom_only || check_bit(register, 7) {
                    Some(self.image.prg_rom_bank(bank, KB8, within))
                } else {
                    self.image.prg_ram_bank(bank & 0x0F, KB8, within)
                }
            }
            _ => None,
        }
    }

    fn map_ppu(&self, addr: u16) -> Option<BankMapping> {
        if addr >= 0x2000 {
            return None;
        }
        let slot = (addr >> 10) as usize;
        let (register, unit) = self.chr_register_for(slot);
        let bank_size = unit * KB1;
        self.image.chr_bank(
            self.chr_regs[register] as usize,
            bank_size,
            addr as usize % bank_size,
        )
    }

    fn cpu_read(&mut self, addr: u16) -> u8 {
        match addr {
            0x5204 => self.irq.read_status(),
            0x5205 => self.product() as u8,
            0x5206 => (self.product() >> 8) as u8,
            0x5C00..=0x5FFF => self.read_exram_cpu(addr),
            _ => match self.map_cpu(addr) {
                Some(mapping) => self.image.read_mapped(mapping),
                None => OPEN_BUS,
            },
        }
    }

    fn cpu_write(&mut self, addr: u16, data: u8) {
        match addr {
            0x5011 => {
                // Raw PCM; a zero write is ignored by the DAC
                if data != 0 {
                    self.pcm_level = data;
                }
            }
            0x5100 => self.prg_mode = data & 0x03,
            0x5101 => self.chr_mode = data & 0x03,
            0x5102 => self.prg_ram_protect[0] = data & 0x03,
            0x5103 => self.prg_ram_protect[1] = data & 0x03,
            0x5104 => self.exram_mode = data & 0x03,
            0x5105 => {
                for (quadrant, source) in self.nametable_map.iter_mut().enumerate() {
                    *source = (data >> (quadrant * 2)) & 0x03;
                }
            }
            0x5106 => self.fill_tile = data,
            0x5107 => self.fill_attr = data & 0x03,
            0x5113..=0x5117 => self.prg_regs[(addr - 0x5113) as usize] = data,
            0x5120..=0x512B => {
                let register = (addr - 0x5120) as usize;
                self.chr_regs[register] = data as u16 | (self.chr_upper_bits as u16) << 8;
                self.bg_set_last = register >= 8;
            }
            0x5130 => self.chr_upper_bits = data & 0x03,
            0x5203 => self.irq.set_compare(data),
            0x5204 => self.irq.set_enabled(check_bit(data, 7)),
            0x5205 => self.multiplicand = data,
            0x5206 => self.multiplier = data,
            0x5C00..=0x5FFF => {
                let offset = (addr - 0x5C00) as usize;
                match self.exram_mode() {
                    ExRamMode::ReadOnly => {}
                    ExRamMode::ReadWrite => self.exram[offset] = data,
                    // the PPU owns it while rendering; writes outside a frame store 0
                    _ => self.exram[offset] = if self.irq.in_frame() { data } else { 0 },
                }
            }
            0x6000..=0xFFFF => {
                if !self.prg_ram_writable() {
                    return;
                }
                if let Some(mapping) = self.map_cpu(addr) {
                    self.image.write_mapped(mapping, data);
                }
                return;
            }
            _ => return,
        }
        debug!("MMC5 write ${:04X} = ${:02X}", addr, data);
    }

    fn ppu_nametable_read(&mut self, addr: u16, ciram: &[u8; CIRAM_SIZE]) -> u8 {
        let quadrant = ((addr >> 10) & 0x03) as usize;
        let offset = (addr & 0x03FF) as usize;
        match self.nametable_map[quadrant] {
            page @ (NT_CIRAM_0 | NT_CIRAM_1) => ciram[page as usize * 0x0400 + offset],
            NT_EXRAM => {
                if self.exram_mode().is_nametable() {
                    self.exram[offset]
                } else {
                    OPEN_BUS
                }
            }
            _ => {
                if offset < ATTRIBUTE_OFFSET {
                    self.fill_tile
                } else {
                    self.fill_attribute_byte()
                }
            }
        }
    }

    fn ppu_nametable_write(&mut self, addr: u16, value: u8, ciram: &mut [u8; CIRAM_SIZE]) {
        let quadrant = ((addr >> 10) & 0x03) as usize;
        let offset = (addr & 0x03FF) as usize;
        match self.nametable_map[quadrant] {
            page @ (NT_CIRAM_0 | NT_CIRAM_1) => ciram[page as usize * 0x0400 + offset] = value,
            NT_EXRAM => {
                if self.exram_mode().is_nametable() {
                    self.exram[offset] = value;
                }
            }
            // Fill mode has no storage
            _ => {}
        }
    }

    fn mirroring(&self) -> Mirroring {
        match self.nametable_map {
            [0, 0, 1, 1] => Mirroring::Horizontal,
            [0, 1, 0, 1] => Mirroring::Vertical,
            [0, 0, 0, 0] => Mirroring::SingleScreenLower,
            [1, 1, 1, 1] => Mirroring::SingleScreenUpper,
            _ => Mirroring::FourScreen,
        }
    }

    fn notify_scanline(&mut self) {
        self.irq.scanline();
    }

    fn notify_vblank(&mut self) {
        self.irq.vblank();
    }

    fn irq_pending(&self) -> bool {
        self.irq.asserted()
    }

    fn irq_acknowledge(&mut self) {
        self.irq.acknowledge();
    }

    fn expansion_audio(&self) -> Option<u8> {
        Some(self.pcm_level)
    }

    fn reset(&mut self) {
        self.reset_registers();
        info!("MMC5 reset");
    }

    fn registers(&self) -> RegisterSnapshot {
        RegisterSnapshot::Mmc5(Mmc5State {
            prg_mode: self.prg_mode,
            chr_mode: self.chr_mode,
            exram_mode: self.exram_mode,
            prg_ram_protect: self.prg_ram_protect,
            nametable_map: self.nametable_map,
            fill_tile: self.fill_tile,
            fill_attr: self.fill_attr,
            prg_regs: self.prg_regs,
            chr_regs: self.chr_regs,
            chr_upper_bits: self.chr_upper_bits,
            bg_set_last: self.bg_set_last,
            irq: self.irq.clone(),
            multiplicand: self.multiplicand,
            multiplier: self.multiplier,
            pcm_level: self.pcm_level,
            exram: self.exram.clone(),
        })
    }

    fn restore_registers(&mut self, snapshot: RegisterSnapshot) -> Result<(), StateError> {
        match snapshot {
            RegisterSnapshot::Mmc5(state) => {
                if state.exram.len() != EXRAM_SIZE {
                    return Err(StateError::InvalidData);
                }
                self.prg_mode = state.prg_mode & 0x03;
                self.chr_mode = state.chr_mode & 0x03;
                self.exram_mode = state.exram_mode & 0x03;
                self.prg_ram_protect = state.prg_ram_protect;
                self.nametable_map = state.nametable_map.map(|source| source & 0x03);
                self.fill_tile = state.fill_tile;
                self.fill_attr = state.fill_attr;
                self.prg_regs = state.prg_regs;
                self.chr_regs = state.chr_regs;
                self.chr_upper_bits = state.chr_upper_bits;
                self.bg_set_last = state.bg_set_last;
                self.irq = state.irq;
                self.multiplicand = state.multiplicand;
                self.multiplier = state.multiplier;
                self.pcm_level = state.pcm_level;
                self.exram = state.exram;
                Ok(())
            }
            other => Err(mismatch("MMC5", &other)),
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
        "MMC5"
    }
}
