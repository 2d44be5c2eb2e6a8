//! Mapper 004 (MMC3) implementation
//!
//! This mapper features PRG ROM banking, CHR ROM banking, and configurable mirroring.
//! It also has an IRQ counter that can trigger on scanlines.
//!
//! Used by games like Super Mario Bros. 2/3, Mega Man 3-6, Kirby's Adventure, etc.
//!
//! Memory map:
//! - PRG RAM: 8KB (0x6000-0x7FFF)
//! - PRG ROM: Two switchable 8KB banks + one fixed 8KB bank + one switchable 8KB bank
//! - CHR ROM/RAM: Two switchable 2KB banks + four switchable 1KB banks
//!
//! The IRQ counter is clocked either by `notify_scanline()` or by rising edges
//! of PPU A12 seen through `ppu_read()`, depending on `IrqClockSource`.

use log::{debug, info};
use crate::cartridge::{BankLayout, CartridgeImage, Mirroring};
use crate::savestate::{Mmc3State, RegisterSnapshot, StateError};
use crate::util::check_bit;
use super::banking::{last_bank, BankMapping, KB1, KB8};
use super::irq::{A12Watcher, IrqClockSource, ScanlineCounter};
use super::{mismatch, Mapper, MapperError};

/// Bank registers after power-on
const BANK_REGISTERS_RESET: [u8; 8] = [0, 2, 4, 5, 6, 7, 0, 1];

#[derive(Debug)]
pub struct Mapper004 {
    image: CartridgeImage,

    /// Bank select register (0x8000, even)
    /// - Bits 0-2: Bank register to update on the next data write
    /// - Bit 6: PRG ROM bank mode
    /// - Bit 7: CHR A12 inversion
    bank_select: u8,

    /// Bank registers (R0-R7)
    bank_registers: [u8; 8],

    /// Mirroring mode
    mirroring: Mirroring,

    /// PRG RAM chip enable (0xA001 bit 7)
    prg_ram_enabled: bool,

    /// PRG RAM write protect (0xA001 bit 6)
    prg_ram_write_protect: bool,

    /// Scanline counter
    irq: ScanlineCounter,

    /// A12 edge detector
    a12: A12Watcher,

    /// What clocks the counter
    clock_source: IrqClockSource,
}

impl Mapper004 {
    pub const LAYOUT: BankLayout = BankLayout {
        prg_bank_size: KB8,
        chr_bank_size: KB1,
    };

    /// Create a new Mapper004 instance clocked by scanline notifications
    pub fn new(image: CartridgeImage) -> Result<Self, MapperError> {
        Self::with_clock(image, IrqClockSource::default())
    }

    /// Create a new Mapper004 instance with an explicit IRQ clock source
    pub fn with_clock(image: CartridgeImage, clock_source: IrqClockSource) -> Result<Self, MapperError> {
        image.validate(Self::LAYOUT)?;
        let mirroring = image.mirroring;
        Ok(Mapper004 {
            image,
            bank_select: 0,
            bank_registers: BANK_REGISTERS_RESET,
            mirroring,
            prg_ram_enabled: true,
            prg_ram_write_protect: false,
            irq: ScanlineCounter::new(),
            a12: A12Watcher::default(),
            clock_source,
        })
    }

    /// PRG mode 1 swaps the R6 window with the fixed second-to-last bank
    #[inline]
    pub fn prg_mode(&self) -> bool {
        check_bit(self.bank_select, 6)
    }

    /// CHR inversion puts the 2KB banks at 0x1000
    #[inline]
    pub fn chr_inversion(&self) -> bool {
        check_bit(self.bank_select, 7)
    }

    #[inline]
    pub fn irq_counter(&self) -> &ScanlineCounter {
        &self.irq
    }

    /// 8KB PRG bank visible at `addr` (0x8000-0xFFFF)
    fn prg_bank_for(&self, addr: u16) -> usize {
        let last = last_bank(self.image.prg_rom.len(), KB8);
        let second_last = last.saturating_sub(1);
        let r6 = (self.bank_registers[6] & 0x3F) as usize;
        let r7 = (self.bank_registers[7] & 0x3F) as usize;

        match (addr >> 13) & 0x03 {
            0 => if self.prg_mode() { second_last } else { r6 },
            1 => r7,
            2 => if self.prg_mode() { r6 } else { second_last },
            _ => last,
        }
    }

    /// 1KB CHR bank visible at `addr`
    fn chr_bank_for(&self, addr: u16) -> usize {
        let addr = if self.chr_inversion() { addr ^ 0x1000 } else { addr };
        let slot = ((addr >> 10) & 0x07) as usize;
        match slot {
            // 2KB banks ignore the low bit
            0 | 1 => (self.bank_registers[0] & 0xFE) as usize + slot,
            2 | 3 => (self.bank_registers[1] & 0xFE) as usize + slot - 2,
            _ => self.bank_registers[slot - 2] as usize,
        }
    }

    fn clock_irq(&mut self) {
        if self.irq.clock() {
            debug!("MMC3 IRQ asserted");
        }
    }
}

impl Mapper for Mapper004 {
    fn map_cpu(&self, addr: u16) -> Option<BankMapping> {
        match addr {
            0x6000..=0x7FFF if self.prg_ram_enabled => {
                self.image.prg_ram_bank(0, KB8, (addr - 0x6000) as usize)
            }
            0x8000..=0xFFFF => Some(self.image.prg_rom_bank(
                self.prg_bank_for(addr),
                KB8,
                (addr & 0x1FFF) as usize,
            )),
            _ => None,
        }
    }

    fn map_ppu(&self, addr: u16) -> Option<BankMapping> {
        if addr < 0x2000 {
            self.image.chr_bank(self.chr_bank_for(addr), KB1, (addr & 0x03FF) as usize)
        } else {
            None
        }
    }

    fn ppu_read(&mut self, addr: u16) -> u8 {
        if self.clock_source == IrqClockSource::A12 && addr < 0x2000 && self.a12.observe(addr) {
            self.clock_irq();
        }
        match self.map_ppu(addr) {
            Some(mapping) => self.image.read_mapped(mapping),
            None => super::OPEN_BUS,
        }
    }

    fn cpu_write(&mut self, addr: u16, data: u8) {
        let even = addr & 0x01 == 0;
        match addr {
            0x6000..=0x7FFF => {
                // PRG RAM
                if self.prg_ram_write_protect {
                    return;
                }
                if let Some(mapping) = self.map_cpu(addr) {
                    self.image.write_mapped(mapping, data);
                }
            }
            0x8000..=0x9FFF => {
                if even {
                    // Bank select
                    self.bank_select = data;
                } else {
                    // Bank data
                    let register = (self.bank_select & 0x07) as usize;
                    self.bank_registers[register] = data;
                    debug!("MMC3 R{} = ${:02X}", register, data);
                }
            }
            0xA000..=0xBFFF => {
                if even {
                    // Mirroring; four-screen boards ignore it
                    if self.image.mirroring != Mirroring::FourScreen {
                        self.mirroring = if check_bit(data, 0) {
                            Mirroring::Horizontal
                        } else {
                            Mirroring::Vertical
                        };
                    }
                } else {
                    // PRG RAM protect
                    self.prg_ram_enabled = check_bit(data, 7);
                    self.prg_ram_write_protect = check_bit(data, 6);
                }
            }
            0xC000..=0xDFFF => {
                if even {
                    self.irq.set_latch(data);
                } else {
                    self.irq.request_reload();
                }
            }
            0xE000..=0xFFFF => {
                if even {
                    self.irq.disable();
                } else {
                    self.irq.enable();
                }
            }
            _ => {}
        }
    }

    fn mirroring(&self) -> Mirroring {
        self.mirroring
    }

    fn notify_scanline(&mut self) {
        if self.clock_source == IrqClockSource::Scanline {
            self.clock_irq();
        }
    }

    fn irq_pending(&self) -> bool {
        self.irq.pending()
    }

    fn irq_acknowledge(&mut self) {
        self.irq.acknowledge();
    }

    fn reset(&mut self) {
        self.bank_select = 0;
        self.bank_registers = BANK_REGISTERS_RESET;
        self.mirroring = self.image.mirroring;
        self.prg_ram_enabled = true;
        self.prg_ram_write_protect = false;
        self.irq = ScanlineCounter::new();
        self.a12 = A12Watcher::default();
        info!("MMC3 reset");
    }

    fn registers(&self) -> RegisterSnapshot {
        RegisterSnapshot::Mmc3(Mmc3State {
            bank_select: self.bank_select,
            bank_registers: self.bank_registers,
            mirroring: self.mirroring,
            prg_ram_enabled: self.prg_ram_enabled,
            prg_ram_write_protect: self.prg_ram_write_protect,
            irq: self.irq.clone(),
            a12: self.a12.clone(),
        })
    }

    fn restore_registers(&mut self, snapshot: RegisterSnapshot) -> Result<(), StateError> {
        match snapshot {
            RegisterSnapshot::Mmc3(state) => {
                self.bank_select = state.bank_select;
                self.bank_registers = state.bank_registers;
                self.mirroring = state.mirroring;
                self.prg_ram_enabled = state.prg_ram_enabled;
                self.prg_ram_write_protect = state.prg_ram_write_protect;
                self.irq = state.irq;
                self.a12 = state.a12;
                Ok(())
            }
            other => Err(mismatch("MMC3", &other)),
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
        "MMC3"
    }
}
