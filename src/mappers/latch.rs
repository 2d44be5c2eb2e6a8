//! MMC2/MMC4 CHR latches
//!
//! Each pattern-table half has a flip-flop that picks one of two CHR banks. The
//! PPU flips it by fetching tile $FD or $FE from that half. A latch only moves
//! when a trigger address is seen that differs from the last one it reacted to;
//! the PPU re-fetches the same tile every scanline and those repeats are not
//! transitions.

use bincode::{Decode, Encode};
use serde::{Deserialize, Serialize};

/// Which bank register the latch currently selects
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Encode, Decode)]
pub enum LatchState {
    /// Tile $FD was fetched last
    Fd,
    /// Tile $FE was fetched last
    Fe,
}

/// How wide the trigger window for pattern table 0 is
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerWidth {
    /// MMC2: only $0FD8 and $0FE8 flip latch 0
    Exact,
    /// MMC4: the whole 8-byte tile row ($0FD8-$0FDF, $0FE8-$0FEF)
    TileRow,
}

/// No trigger fetch seen since reset. Zero is never a trigger address.
const NO_TRIGGER: u16 = 0;

/// One flip-flop
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Encode, Decode)]
pub struct ChrLatch {
    state: LatchState,
    last_trigger: u16,
    transitions: u32,
}

impl Default for ChrLatch {
    fn default() -> Self {
        ChrLatch {
            state: LatchState::Fe,
            last_trigger: NO_TRIGGER,
            transitions: 0,
        }
    }
}

impl ChrLatch {
    #[inline]
    pub fn state(&self) -> LatchState {
        self.state
    }

    /// Number of state changes since reset
    #[inline]
    pub fn transitions(&self) -> u32 {
        self.transitions
    }

    /// React to a trigger fetch at `addr` that selects `target`
    fn trigger(&mut self, addr: u16, target: LatchState) {
        if self.last_trigger == addr {
            return;
        }
        self.last_trigger = addr;
        if self.state != target {
            self.state = target;
            self.transitions = self.transitions.wrapping_add(1);
        }
    }
}

/// The two latches of an MMC2/MMC4 board
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, Encode, Decode)]
pub struct LatchPair {
    pub low: ChrLatch,
    pub high: ChrLatch,
}

impl LatchPair {
    /// Feed a PPU fetch address. Only pattern-table addresses can trigger;
    /// nametable and palette addresses above $1FFF are ignored.
    pub fn observe(&mut self, addr: u16, width: TriggerWidth) {
        match (addr, width) {
            (0x0FD8, _) | (0x0FD9..=0x0FDF, TriggerWidth::TileRow) => {
                self.low.trigger(addr, LatchState::Fd)
            }
            (0x0FE8, _) | (0x0FE9..=0x0FEF, TriggerWidth::TileRow) => {
                self.low.trigger(addr, LatchState::Fe)
            }
            (0x1FD8..=0x1FDF, _) => self.high.trigger(addr, LatchState::Fd),
            (0x1FE8..=0x1FEF, _) => self.high.trigger(addr, LatchState::Fe),
            _ => {}
        }
    }

    /// Latch responsible for a pattern-table address
    #[inline]
    pub fn for_addr(&self, addr: u16) -> LatchState {
        if addr & 0x1000 == 0 {
            self.low.state()
        } else {
            self.high.state()
        }
    }
}
