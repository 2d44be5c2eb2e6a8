//! Scanline and IRQ units
//!
//! Three pieces of timing hardware live here:
//! - `ScanlineCounter`: the MMC3 reload/decrement counter that asserts /IRQ when
//!   it reaches zero.
//! - `A12Watcher`: detects rising edges of PPU address line A12, the signal the
//!   MMC3 counter is clocked by on real boards.
//! - `ScanlineCompare`: the MMC5 in-frame scanline counter with its compare
//!   register.
//! - `VrcIrqCounter`: the Konami VRC up-counter, clocked per scanline or per
//!   CPU cycle.

use bincode::{Decode, Encode};
use log::trace;
use serde::{Deserialize, Serialize};

use crate::util::check_bit;

/// Where the IRQ counter is in its cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Encode, Decode)]
pub enum IrqPhase {
    /// Never clocked since reset
    Idle,
    /// Counting scanlines
    Armed,
    /// Counter hit zero with IRQs enabled; /IRQ is asserted
    Triggered,
    /// The CPU cleared the interrupt; the counter keeps running
    Acknowledged,
}

/// What clocks the MMC3 counter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IrqClockSource {
    /// One clock per `notify_scanline()`
    #[default]
    Scanline,
    /// One clock per rising edge of A12 observed through `ppu_read`
    A12,
}

/// MMC3-style scanline counter
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Encode, Decode)]
pub struct ScanlineCounter {
    counter: u8,
    latch: u8,
    reload_requested: bool,
    enabled: bool,
    pending: bool,
    phase: IrqPhase,
}

impl Default for ScanlineCounter {
    fn default() -> Self {
        ScanlineCounter {
            counter: 0,
            latch: 0,
            reload_requested: false,
            enabled: false,
            pending: false,
            phase: IrqPhase::Idle,
        }
    }
}

impl ScanlineCounter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the value the counter reloads from
    pub fn set_latch(&mut self, value: u8) {
        self.latch = value;
    }

    /// Clear the counter so the next clock reloads it from the latch
    pub fn request_reload(&mut self) {
        self.counter = 0;
        self.reload_requested = true;
    }

    /// Enable assertion. The count is left alone.
    pub fn enable(&mut self) {
        self.enabled = true;
    }

    /// Disable assertion and drop any pending interrupt. The count is left alone.
    pub fn disable(&mut self) {
        self.enabled = false;
        self.acknowledge();
    }

    /// Clear a pending interrupt
    pub fn acknowledge(&mut self) {
        if self.pending {
            self.pending = false;
            self.phase = IrqPhase::Acknowledged;
        }
    }

    /// Clock the counter once. Returns true when this clock asserted /IRQ.
    pub fn clock(&mut self) -> bool {
        if self.counter == 0 || self.reload_requested {
            self.counter = self.latch;
            self.reload_requested = false;
        } else {
            self.counter -= 1;
        }
        trace!("IRQ counter clocked: counter={} latch={} enabled={}", self.counter, self.latch, self.enabled);

        if self.counter == 0 && self.enabled {
            self.pending = true;
            self.phase = IrqPhase::Triggered;
            return true;
        }
        if self.phase != IrqPhase::Triggered {
            self.phase = IrqPhase::Armed;
        }
        false
    }

    #[inline]
    pub fn pending(&self) -> bool {
        self.pending
    }

    #[inline]
    pub fn counter(&self) -> u8 {
        self.counter
    }

    #[inline]
    pub fn latch(&self) -> u8 {
        self.latch
    }

    #[inline]
    pub fn enabled(&self) -> bool {
        self.enabled
    }

    #[inline]
    pub fn phase(&self) -> IrqPhase {
        self.phase
    }
}

/// Rising-edge detector for PPU A12
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, Encode, Decode)]
pub struct A12Watcher {
    last_high: bool,
}

impl A12Watcher {
    /// Feed a PPU address; true on a low-to-high transition of A12
    #[inline]
    pub fn observe(&mut self, addr: u16) -> bool {
        let high = addr & 0x1000 != 0;
        let rising = high && !self.last_high;
        self.last_high = high;
        rising
    }
}

/// MMC5 scanline detector and compare register
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, Encode, Decode)]
pub struct ScanlineCompare {
    compare: u8,
    scanline: u8,
    enabled: bool,
    pending: bool,
    in_frame: bool,
}

impl ScanlineCompare {
    /// $5203
    pub fn set_compare(&mut self, value: u8) {
        self.compare = value;
    }

    /// $5204 write: bit 7 enables the interrupt
    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    /// A new scanline started rendering
    pub fn scanline(&mut self) {
        if !self.in_frame {
            self.in_frame = true;
            self.scanline = 0;
            return;
        }

        self.scanline = self.scanline.wrapping_add(1);
        if self.compare != 0 && self.scanline == self.compare {
            trace!("MMC5 scanline {} matched compare", self.scanline);
            self.pending = true;
        }
    }

    /// Rendering stopped for the frame
    pub fn vblank(&mut self) {
        self.in_frame = false;
        self.scanline = 0;
    }

    /// $5204 read: pending in bit 7, in-frame in bit 6. Reading acknowledges.
    pub fn read_status(&mut self) -> u8 {
        let status = ((self.pending as u8) << 7) | ((self.in_frame as u8) << 6);
        self.pending = false;
        status
    }

    pub fn acknowledge(&mut self) {
        self.pending = false;
    }

    /// /IRQ line level
    #[inline]
    pub fn asserted(&self) -> bool {
        self.pending && self.enabled
    }

    #[inline]
    pub fn in_frame(&self) -> bool {
        self.in_frame
    }
}

/// Konami VRC IRQ counter
///
/// An 8-bit up-counter. The clock after $FF reloads it from the latch and
/// asserts /IRQ, so a latch of N fires every 256 - N clocks. In scanline mode
/// it counts `notify_scanline()` calls, in cycle mode CPU cycles.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, Encode, Decode)]
pub struct VrcIrqCounter {
    latch: u8,
    counter: u8,
    enabled: bool,
    enable_after_ack: bool,
    cycle_mode: bool,
    pending: bool,
}

impl VrcIrqCounter {
    /// IRQ latch register
    pub fn set_latch(&mut self, value: u8) {
        self.latch = value;
    }

    /// IRQ control register
    /// - Bit 0: enable again after acknowledge
    /// - Bit 1: enable; setting it reloads the counter from the latch
    /// - Bit 2: count CPU cycles instead of scanlines
    ///
    /// Any write clears a pending interrupt.
    pub fn write_control(&mut self, value: u8) {
        self.enable_after_ack = check_bit(value, 0);
        self.enabled = check_bit(value, 1);
        self.cycle_mode = check_bit(value, 2);
        self.pending = false;
        if self.enabled {
            self.counter = self.latch;
        }
    }

    /// IRQ acknowledge register: clears the interrupt and copies the
    /// enable-after-ack bit into enable
    pub fn acknowledge_register(&mut self) {
        self.pending = false;
        self.enabled = self.enable_after_ack;
    }

    /// Clear a pending interrupt without touching enable
    pub fn acknowledge(&mut self) {
        self.pending = false;
    }

    fn clock(&mut self) -> bool {
        if self.counter == 0xFF {
            self.counter = self.latch;
            self.pending = true;
            trace!("VRC IRQ counter overflowed, reloaded to {}", self.latch);
            true
        } else {
            self.counter += 1;
            false
        }
    }

    /// A scanline finished. Returns true when this clock asserted /IRQ.
    pub fn scanline(&mut self) -> bool {
        self.enabled && !self.cycle_mode && self.clock()
    }

    /// `cycles` CPU cycles elapsed. Returns true if any of them asserted /IRQ.
    pub fn cpu_cycles(&mut self, cycles: u32) -> bool {
        if !self.enabled || !self.cycle_mode {
            return false;
        }
        let mut fired = false;
        for _ in 0..cycles {
            fired |= self.clock();
        }
        fired
    }

    #[inline]
    pub fn pending(&self) -> bool {
        self.pending
    }

    #[inline]
    pub fn counter(&self) -> u8 {
        self.counter
    }

    #[inline]
    pub fn enabled(&self) -> bool {
        self.enabled
    }

    #[inline]
    pub fn cycle_mode(&self) -> bool {
        self.cycle_mode
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counter_fires_after_reload_plus_latch_clocks() {
        let mut irq = ScanlineCounter::new();
        irq.set_latch(3);
        irq.request_reload();
        irq.enable();
        assert_eq!(irq.phase(), IrqPhase::Idle);

        assert!(!irq.clock()); // reload to 3
        assert_eq!(irq.phase(), IrqPhase::Armed);
        assert!(!irq.clock()); // 2
        assert!(!irq.clock()); // 1
        assert!(irq.clock()); // 0
        assert_eq!(irq.phase(), IrqPhase::Triggered);
        assert!(irq.pending());

        // stays asserted while the counter keeps running
        assert!(!irq.clock());
        assert!(irq.pending());
        assert_eq!(irq.phase(), IrqPhase::Triggered);

        irq.acknowledge();
        assert!(!irq.pending());
        assert_eq!(irq.phase(), IrqPhase::Acknowledged);
        assert_eq!(irq.counter(), 3);
    }

    #[test]
    fn disable_keeps_count() {
        let mut irq = ScanlineCounter::new();
        irq.set_latch(10);
        irq.enable();
        irq.clock();
        irq.clock();
        irq.clock();
        assert_eq!(irq.counter(), 8);

        irq.disable();
        irq.clock();
        assert_eq!(irq.counter(), 7);
        irq.enable();
        assert_eq!(irq.counter(), 7);
        assert!(!irq.pending());
    }

    #[test]
    fn zero_latch_fires_every_clock() {
        let mut irq = ScanlineCounter::new();
        irq.enable();
        assert!(irq.clock());
        irq.acknowledge();
        assert!(irq.clock());
    }

    #[test]
    fn a12_counts_only_rising_edges() {
        let mut a12 = A12Watcher::default();
        assert!(!a12.observe(0x0000));
        assert!(a12.observe(0x1000));
        assert!(!a12.observe(0x1008));
        assert!(!a12.observe(0x0FF0));
        assert!(a12.observe(0x1FF0));
    }

    #[test]
    fn compare_raises_on_matching_scanline() {
        let mut unit = ScanlineCompare::default();
        unit.set_compare(2);
        unit.set_enabled(true);

        unit.scanline(); // enters frame, line 0
        assert!(unit.in_frame());
        unit.scanline(); // 1
        assert!(!unit.asserted());
        unit.scanline(); // 2
        assert!(unit.asserted());

        assert_eq!(unit.read_status(), 0xC0);
        assert!(!unit.asserted());

        unit.vblank();
        assert_eq!(unit.read_status(), 0x00);
    }

    #[test]
    fn vrc_counter_reloads_on_overflow() {
        let mut irq = VrcIrqCounter::default();
        irq.set_latch(0xFD);
        irq.write_control(0x02);
        assert_eq!(irq.counter(), 0xFD);

        assert!(!irq.scanline()); // FE
        assert!(!irq.scanline()); // FF
        assert!(irq.scanline());
        assert_eq!(irq.counter(), 0xFD);
        assert!(irq.pending());

        // still running after the reload
        assert!(!irq.scanline());
        assert!(!irq.scanline());
        assert!(irq.scanline());
    }

    #[test]
    fn vrc_acknowledge_register_copies_enable_after_ack() {
        let mut irq = VrcIrqCounter::default();
        irq.set_latch(0xFF);
        irq.write_control(0x03);
        assert!(irq.scanline());
        irq.acknowledge_register();
        assert!(!irq.pending());
        assert!(irq.enabled());

        irq.write_control(0x02);
        assert!(irq.scanline());
        irq.acknowledge_register();
        assert!(!irq.enabled());
        assert!(!irq.scanline());
        assert!(!irq.pending());
    }

    #[test]
    fn vrc_cycle_mode_ignores_scanlines() {
        let mut irq = VrcIrqCounter::default();
        irq.set_latch(0xF0);
        irq.write_control(0x06);
        assert!(irq.cycle_mode());

        assert!(!irq.scanline());
        assert_eq!(irq.counter(), 0xF0);
        assert!(!irq.cpu_cycles(15));
        assert!(irq.cpu_cycles(1));
        assert_eq!(irq.counter(), 0xF0);
    }

    #[test]
    fn vrc_control_write_clears_pending() {
        let mut irq = VrcIrqCounter::default();
        irq.set_latch(0xFF);
        irq.write_control(0x02);
        assert!(irq.scanline());
        irq.write_control(0x00);
        assert!(!irq.pending());
        assert!(!irq.scanline());
    }
}
