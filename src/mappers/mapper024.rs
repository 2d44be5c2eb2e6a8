//! Mapper 024/026 (Konami VRC6) implementation
//!
//! Used by Akumajou Densetsu (mapper 24, VRC6a) and Madara / Esper Dream 2
//! (mapper 26, VRC6b). The two boards differ only in how CPU A0 and A1 are
//! wired to the chip: mapper 26 swaps them, so register $x001 on one is $x002
//! on the other.
//!
//! Memory map:
//! - PRG RAM: 8KB (0x6000-0x7FFF), enabled by $B003 bit 7
//! - PRG ROM: 16KB switchable (0x8000-0xBFFF) + 8KB switchable (0xC000-0xDFFF)
//!   + last 8KB fixed (0xE000-0xFFFF)
//! - CHR: Eight switchable 1KB banks
//!
//! Registers (VRC6a addresses):
//! - 0x8000-0x8003: 16KB PRG bank
//! - 0x9000-0xB002: expansion audio (not emulated)
//! - 0xB003: bits 2-3 mirroring, bit 7 PRG RAM enable
//! - 0xC000-0xC003: 8KB PRG bank
//! - 0xD000-0xD003, 0xE000-0xE003: 1KB CHR banks 0-7
//! - 0xF000: IRQ latch, 0xF001: IRQ control, 0xF002: IRQ acknowledge

use log::{debug, info};
use crate::cartridge::{BankLayout, CartridgeImage, Mirroring};
use crate::savestate::{RegisterSnapshot, StateError, Vrc6State};
use crate::util::check_bit;
use super::banking::{last_bank, BankMapping, KB1, KB16, KB8};
use super::irq::VrcIrqCounter;
use super::{mismatch, Mapper, MapperError};

#[derive(Debug)]
pub struct Mapper024 {
    image: CartridgeImage,

    /// Mapper 26 wiring: A0 and A1 swapped
    swapped_lines: bool,

    /// 16KB PRG bank at 0x8000
    prg_bank_16k: u8,

    /// 8KB PRG bank at 0xC000
    prg_bank_8k: u8,

    /// 1KB CHR banks
    chr_banks: [u8; 8],

    /// Banking control ($B003)
    control: u8,

    irq: VrcIrqCounter,
}

impl Mapper024 {
    pub const LAYOUT: BankLayout = BankLayout {
        prg_bank_size: KB8,
        chr_bank_size: KB1,
    };

    /// Create a new VRC6 instance. Mapper 26 images get the swapped wiring.
    pub fn new(image: CartridgeImage) -> Result<Self, MapperError> {
        image.validate(Self::LAYOUT)?;
        let swapped_lines = image.mapper == 26;
        Ok(Mapper024 {
            image,
            swapped_lines,
            prg_bank_16k: 0,
            prg_bank_8k: 0,
            chr_banks: [0; 8],
            control: 0,
            irq: VrcIrqCounter::default(),
        })
    }

    /// Register address as VRC6a sees it
    #[inline]
    fn register(&self, addr: u16) -> u16 {
        let addr = addr & 0xF003;
        if self.swapped_lines {
            (addr & 0xF000) | ((addr & 0x01) << 1) | ((addr & 0x02) >> 1)
        } else {
            addr
        }
    }

    #[inline]
    pub fn prg_ram_enabled(&self) -> bool {
        check_bit(self.control, 7)
    }

    #[inline]
    pub fn irq_counter(&self) -> &VrcIrqCounter {
        &self.irq
    }
}

impl Mapper for Mapper024 {
    fn map_cpu(&self, addr: u16) -> Option<BankMapping> {
        match addr {
            0x6000..=0x7FFF if self.prg_ram_enabled() => {
                self.image.prg_ram_bank(0, KB8, (addr - 0x6000) as usize)
            }
            0x8000..=0xBFFF => Some(self.image.prg_rom_bank(
                self.prg_bank_16k as usize,
                KB16,
                (addr & 0x3FFF) as usize,
            )),
            0xC000..=0xDFFF => Some(self.image.prg_rom_bank(
                self.prg_bank_8k as usize,
                KB8,
                (addr & 0x1FFF) as usize,
            )),
            0xE000..=0xFFFF => {
                let last = last_bank(self.image.prg_rom.len(), KB8);
                Some(self.image.prg_rom_bank(last, KB8, (addr & 0x1FFF) as usize))
            }
            _ => None,
        }
    }

    fn map_ppu(&self, addr: u16) -> Option<BankMapping> {
        if addr < 0x2000 {
            let bank = self.chr_banks[(addr >> 10) as usize];
            self.image.chr_bank(bank as usize, KB1, (addr & 0x03FF) as usize)
        } else {
            None
        }
    }

    fn cpu_write(&mut self, addr: u16, data: u8) {
        if (0x6000..=0x7FFF).contains(&addr) {
            if let Some(mapping) = self.map_cpu(addr) {
                self.image.write_mapped(mapping, data);
            }
            return;
        }

        match self.register(addr) {
            0x8000..=0x8003 => self.prg_bank_16k = data & 0x0F,
            0xB003 => self.control = data,
            0xC000..=0xC003 => self.prg_bank_8k = data & 0x1F,
            reg @ 0xD000..=0xD003 => self.chr_banks[(reg & 0x03) as usize] = data,
            reg @ 0xE000..=0xE003 => self.chr_banks[4 + (reg & 0x03) as usize] = data,
            0xF000 => self.irq.set_latch(data),
            0xF001 => self.irq.write_control(data),
            0xF002 => self.irq.acknowledge_register(),
            // Expansion audio and unmapped registers
            _ => return,
        }
        debug!("VRC6 write ${:04X} = ${:02X}", addr, data);
    }

    fn mirroring(&self) -> Mirroring {
        match (self.control >> 2) & 0x03 {
            0 => Mirroring::Vertical,
            1 => Mirroring::Horizontal,
            2 => Mirroring::SingleScreenLower,
            _ => Mirroring::SingleScreenUpper,
        }
    }

    fn notify_scanline(&mut self) {
        if self.irq.scanline() {
            debug!("VRC6 IRQ asserted");
        }
    }

    fn notify_cpu_cycles(&mut self, cycles: u32) {
        if self.irq.cpu_cycles(cycles) {
            debug!("VRC6 IRQ asserted");
        }
    }

    fn irq_pending(&self) -> bool {
        self.irq.pending()
    }

    fn irq_acknowledge(&mut self) {
        self.irq.acknowledge();
    }

    fn reset(&mut self) {
        self.prg_bank_16k = 0;
        self.prg_bank_8k = 0;
        self.chr_banks = [0; 8];
        self.control = 0;
        self.irq = VrcIrqCounter::default();
        info!("{} reset", self.name());
    }

    fn registers(&self) -> RegisterSnapshot {
        RegisterSnapshot::Vrc6(Vrc6State {
            prg_bank_16k: self.prg_bank_16k,
            prg_bank_8k: self.prg_bank_8k,
            chr_banks: self.chr_banks,
            control: self.control,
            irq: self.irq.clone(),
        })
    }

    fn restore_registers(&mut self, snapshot: RegisterSnapshot) -> Result<(), StateError> {
        match snapshot {
            RegisterSnapshot::Vrc6(state) => {
                self.prg_bank_16k = state.prg_bank_16k & 0x0F;
                self.prg_bank_8k = state.prg_bank_8k & 0x1F;
                self.chr_banks = state.chr_banks;
                self.control = state.control;
                self.irq = state.irq;
                Ok(())
            }
            other => Err(mismatch(self.name(), &other)),
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
        if self.swapped_lines {
            "VRC6b"
        } else {
            "VRC6a"
        }
    }
}
