//! RustyNES mapper core
//!
//! Cartridge hardware for the Nintendo Entertainment System. A mapper takes
//! ownership of a `CartridgeImage`, translates CPU and PPU bus addresses into
//! bank-switched PRG and CHR storage, and reproduces the side effects of the
//! board's chips: mirroring changes, RAM protection, scanline IRQs and the
//! MMC5 multiplier.
//!
//! ```no_run
//! use rusty_nes_mapper::{create_mapper, CartridgeImage, Mapper};
//!
//! let image = CartridgeImage::new(2, vec![0; 128 * 1024], Vec::new());
//! let mut mapper = create_mapper(image).expect("supported board");
//! mapper.cpu_write(0x8000, 3);
//! let opcode = mapper.cpu_read(0x8000);
//! # let _ = opcode;
//! ```

pub mod cartridge;
pub mod mappers;
pub mod savestate;
pub mod util;

pub use cartridge::{BankLayout, CartridgeImage, Mirroring};
pub use mappers::banking::{BankMapping, Source};
pub use mappers::irq::IrqClockSource;
pub use mappers::{
    create_mapper, create_mapper_with, mapper_name, Mapper, MapperConfig, MapperError, MapperHandle,
    CIRAM_SIZE, OPEN_BUS,
};
pub use savestate::{RegisterSnapshot, StateError};
