//! Save state implementation
//!
//! A mapper's persisted state is a fixed-order byte sequence:
//!
//! ```text
//! register snapshot || PRG RAM (battery-backed boards only) || CHR RAM (if present)
//! ```
//!
//! The register snapshot is the bincode encoding of `RegisterSnapshot` using
//! fixed-width integers, so its length depends only on the mapper variant. ROM is
//! never stored; the loader supplies it again. Loading checks the total length
//! against what the current cartridge expects before touching anything.

use std::fs::File;
use std::io::{Read, Write};
use std::mem::discriminant;
use std::path::Path;
use bincode::config::{Configuration, Fixint, LittleEndian};
use bincode::de::{BorrowDecoder, Decoder};
use bincode::enc::Encoder;
use bincode::error::{DecodeError, EncodeError};
use bincode::{BorrowDecode, Decode, Encode};
use log::info;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::cartridge::{CartridgeImage, Mirroring};
use crate::mappers::irq::{A12Watcher, ScanlineCompare, ScanlineCounter, VrcIrqCounter};
use crate::mappers::latch::LatchPair;
use crate::mappers::Mapper;

/// Errors that can occur during save state operations
#[derive(Error, Debug)]
pub enum StateError {
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Deserialization error: {0}")]
    DeserializationError(String),

    #[error("State size mismatch: expected {expected} bytes, found {actual}")]
    SizeMismatch { expected: usize, actual: usize },

    #[error("State belongs to {found}, current mapper is {expected}")]
    MapperMismatch {
        expected: &'static str,
        found: &'static str,
    },

    #[error("Invalid save state data")]
    InvalidData,
}

/// Register contents of one mapper variant
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Encode, Decode)]
pub enum RegisterSnapshot {
    /// NROM (Mapper 0) - No state needed
    Nrom,

    /// MMC1 (Mapper 1)
    Mmc1(Mmc1State),

    /// UxROM (Mapper 2)
    UxRom(UxRomState),

    /// CNROM (Mapper 3)
    CnRom(CnRomState),

    /// MMC3 (Mapper 4)
    Mmc3(Mmc3State),

    /// MMC5 (Mapper 5)
    Mmc5(Mmc5State),

    /// AxROM (Mapper 7)
    AxRom(AxRomState),

    /// MMC2 (Mapper 9)
    Mmc2(LatchMapperState),

    /// MMC4 (Mapper 10)
    Mmc4(LatchMapperState),

    /// Color Dreams (Mapper 11)
    ColorDreams(ColorDreamsState),

    /// Camerica (Mapper 71)
    Camerica(CamericaState),

    /// VRC6 (Mappers 24 and 26)
    Vrc6(Vrc6State),
}

impl RegisterSnapshot {
    /// Board name of the variant this snapshot belongs to
    pub fn name(&self) -> &'static str {
        match self {
            RegisterSnapshot::Nrom => "NROM",
            RegisterSnapshot::Mmc1(_) => "MMC1",
            RegisterSnapshot::UxRom(_) => "UxROM",
            RegisterSnapshot::CnRom(_) => "CNROM",
            RegisterSnapshot::Mmc3(_) => "MMC3",
            RegisterSnapshot::Mmc5(_) => "MMC5",
            RegisterSnapshot::AxRom(_) => "AxROM",
            RegisterSnapshot::Mmc2(_) => "MMC2",
            RegisterSnapshot::Mmc4(_) => "MMC4",
            RegisterSnapshot::ColorDreams(_) => "Color Dreams",
            RegisterSnapshot::Camerica(_) => "Camerica",
            RegisterSnapshot::Vrc6(_) => "VRC6",
        }
    }
}

/// MMC1 (Mapper 1) state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Encode, Decode)]
pub struct Mmc1State {
    pub shift_register: u8,
    pub shift_count: u8,
    pub control: u8,
    pub chr_bank_0: u8,
    pub chr_bank_1: u8,
    pub prg_bank: u8,
}

/// UxROM (Mapper 2) state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Encode, Decode)]
pub struct UxRomState {
    pub prg_bank: u8,
}

/// CNROM (Mapper 3) state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Encode, Decode)]
pub struct CnRomState {
    pub chr_bank: u8,
}

/// MMC3 (Mapper 4) state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Encode, Decode)]
pub struct Mmc3State {
    pub bank_select: u8,
    pub bank_registers: [u8; 8],
    pub mirroring: Mirroring,
    pub prg_ram_enabled: bool,
    pub prg_ram_write_protect: bool,
    pub irq: ScanlineCounter,
    pub a12: A12Watcher,
}

/// MMC5 (Mapper 5) state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Encode, Decode)]
pub struct Mmc5State {
    pub prg_mode: u8,
    pub chr_mode: u8,
    pub exram_mode: u8,
    pub prg_ram_protect: [u8; 2],
    pub nametable_map: [u8; 4],
    pub fill_tile: u8,
    pub fill_attr: u8,
    pub prg_regs: [u8; 5],
    pub chr_regs: [u16; 12],
    pub chr_upper_bits: u8,
    pub bg_set_last: bool,
    pub irq: ScanlineCompare,
    pub multiplicand: u8,
    pub multiplier: u8,
    pub pcm_level: u8,
    pub exram: Vec<u8>,
}

/// AxROM (Mapper 7) state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Encode, Decode)]
pub struct AxRomState {
    pub prg_bank: u8,
    pub upper_screen: bool,
}

/// MMC2/MMC4 (Mappers 9 and 10) state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Encode, Decode)]
pub struct LatchMapperState {
    pub prg_bank: u8,
    pub chr_fd: [u8; 2],
    pub chr_fe: [u8; 2],
    pub mirroring: Mirroring,
    pub latches: LatchPair,
}

/// Color Dreams (Mapper 11) state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Encode, Decode)]
pub struct ColorDreamsState {
    pub prg_bank: u8,
    pub chr_bank: u8,
}

/// Camerica (Mapper 71) state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Encode, Decode)]
pub struct CamericaState {
    pub prg_bank: u8,
    pub mirroring: Mirroring,
}

/// VRC6 (Mappers 24 and 26) state, with registers at their VRC6a addresses
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Encode, Decode)]
pub struct Vrc6State {
    pub prg_bank_16k: u8,
    pub prg_bank_8k: u8,
    pub chr_banks: [u8; 8],
    pub control: u8,
    pub irq: VrcIrqCounter,
}

/// bincode configuration with fixed-width integers, so a variant's snapshot
/// always encodes to the same number of bytes
fn config() -> Configuration<LittleEndian, Fixint> {
    bincode::config::standard().with_fixed_int_encoding()
}

/// Serialize a register snapshot
pub fn encode_registers(snapshot: &RegisterSnapshot) -> Result<Vec<u8>, StateError> {
    bincode::encode_to_vec(snapshot, config())
        .map_err(|e| StateError::SerializationError(e.to_string()))
}

/// Bytes of PRG RAM that belong in a state payload
fn persisted_prg_ram(image: &CartridgeImage) -> &[u8] {
    if image.has_battery {
        &image.prg_ram
    } else {
        &[]
    }
}

/// Build the full state payload for a mapper
pub fn encode_state(snapshot: &RegisterSnapshot, image: &CartridgeImage) -> Result<Vec<u8>, StateError> {
    let mut data = encode_registers(snapshot)?;
    data.extend_from_slice(persisted_prg_ram(image));
    data.extend_from_slice(&image.chr_ram);
    Ok(data)
}

/// A payload that passed the length and variant checks
#[derive(Debug)]
pub struct DecodedState<'a> {
    pub registers: RegisterSnapshot,
    prg_ram: &'a [u8],
    chr_ram: &'a [u8],
}

impl DecodedState<'_> {
    /// Copy the payload's RAM sections into `image`
    pub fn apply_ram(&self, image: &mut CartridgeImage) {
        if image.has_battery {
            image.prg_ram.copy_from_slice(self.prg_ram);
        }
        image.chr_ram.copy_from_slice(self.chr_ram);
    }
}

/// Validate a payload against the current mapper and split it into registers
/// and RAM sections. `image` is only inspected; the caller applies the RAM with
/// `DecodedState::apply_ram` once the registers have been accepted.
pub fn decode_state<'a>(
    payload: &'a [u8],
    current: &RegisterSnapshot,
    image: &CartridgeImage,
) -> Result<DecodedState<'a>, StateError> {
    let register_len = encode_registers(current)?.len();
    let prg_len = persisted_prg_ram(image).len();
    let expected = register_len + prg_len + image.chr_ram.len();
    if payload.len() != expected {
        return Err(StateError::SizeMismatch {
            expected,
            actual: payload.len(),
        });
    }

    let (registers, rest) = payload.split_at(register_len);
    let (snapshot, consumed): (RegisterSnapshot, usize) = bincode::decode_from_slice(registers, config())
        .map_err(|e| StateError::DeserializationError(e.to_string()))?;
    if consumed != register_len {
        return Err(StateError::InvalidData);
    }
    if discriminant(&snapshot) != discriminant(current) {
        return Err(StateError::MapperMismatch {
            expected: current.name(),
            found: snapshot.name(),
        });
    }

    let (prg_ram, chr_ram) = rest.split_at(prg_len);
    Ok(DecodedState {
        registers: snapshot,
        prg_ram,
        chr_ram,
    })
}

/// Save a mapper's state to a file
pub fn save_to_file<M: Mapper + ?Sized, P: AsRef<Path>>(mapper: &M, path: P) -> Result<(), StateError> {
    let data = mapper.save_state()?;

    let mut file = File::create(path.as_ref())?;
    file.write_all(&data)?;

    info!("Save state written to {}", path.as_ref().display());
    Ok(())
}

/// Load a mapper's state from a file
pub fn load_from_file<M: Mapper + ?Sized, P: AsRef<Path>>(mapper: &mut M, path: P) -> Result<(), StateError> {
    let mut file = File::open(path.as_ref())?;
    let mut data = Vec::new();
    file.read_to_end(&mut data)?;

    mapper.load_state(&data)?;

    info!("Save state loaded from {}", path.as_ref().display());
    Ok(())
}

// Mirroring is stored as a one-byte tag
impl Encode for Mirroring {
    fn encode<E: Encoder>(&self, encoder: &mut E) -> Result<(), EncodeError> {
        match self {
            Mirroring::Horizontal => 0u8.encode(encoder),
            Mirroring::Vertical => 1u8.encode(encoder),
            Mirroring::FourScreen => 2u8.encode(encoder),
            Mirroring::SingleScreenLower => 3u8.encode(encoder),
            Mirroring::SingleScreenUpper => 4u8.encode(encoder),
        }
    }
}

fn mirroring_from_tag(value: u8) -> Result<Mirroring, DecodeError> {
    match value {
        0 => Ok(Mirroring::Horizontal),
        1 => Ok(Mirroring::Vertical),
        2 => Ok(Mirroring::FourScreen),
        3 => Ok(Mirroring::SingleScreenLower),
        4 => Ok(Mirroring::SingleScreenUpper),
        _ => Err(DecodeError::Other("Invalid Mirroring value")),
    }
}

impl<Context> Decode<Context> for Mirroring {
    fn decode<D: Decoder<Context = Context>>(decoder: &mut D) -> Result<Self, DecodeError> {
        mirroring_from_tag(u8::decode(decoder)?)
    }
}

impl<'de, Context> BorrowDecode<'de, Context> for Mirroring {
    fn borrow_decode<D: BorrowDecoder<'de, Context = Context>>(decoder: &mut D) -> Result<Self, DecodeError> {
        mirroring_from_tag(u8::decode(decoder)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn image_with_ram(battery: bool) -> CartridgeImage {
        CartridgeImage::new(2, vec![0; 0x8000], Vec::new())
            .with_prg_ram(0x2000)
            .with_battery(battery)
    }

    #[test]
    fn layout_is_registers_then_prg_ram_then_chr_ram() {
        let mut image = image_with_ram(true);
        image.prg_ram[0] = 0xAA;
        image.chr_ram[0] = 0xBB;
        let snapshot = RegisterSnapshot::UxRom(UxRomState { prg_bank: 3 });

        let data = encode_state(&snapshot, &image).unwrap();
        let register_len = encode_registers(&snapshot).unwrap().len();
        assert_eq!(data.len(), register_len + 0x2000 + 0x2000);
        assert_eq!(data[register_len], 0xAA);
        assert_eq!(data[register_len + 0x2000], 0xBB);
    }

    #[test]
    fn prg_ram_without_battery_is_not_persisted() {
        let image = image_with_ram(false);
        let snapshot = RegisterSnapshot::UxRom(UxRomState { prg_bank: 0 });
        let data = encode_state(&snapshot, &image).unwrap();
        let register_len = encode_registers(&snapshot).unwrap().len();
        assert_eq!(data.len(), register_len + 0x2000);
    }

    #[test]
    fn snapshot_length_does_not_depend_on_values() {
        let small = RegisterSnapshot::UxRom(UxRomState { prg_bank: 0 });
        let large = RegisterSnapshot::UxRom(UxRomState { prg_bank: 0xFF });
        assert_eq!(
            encode_registers(&small).unwrap().len(),
            encode_registers(&large).unwrap().len()
        );
    }

    #[test]
    fn decode_rejects_wrong_length_without_touching_ram() {
        let mut image = image_with_ram(true);
        image.prg_ram[0] = 0x42;
        let snapshot = RegisterSnapshot::UxRom(UxRomState { prg_bank: 1 });
        let mut data = encode_state(&snapshot, &image).unwrap();
        data.pop();

        image.prg_ram[0] = 0x17;
        let result = decode_state(&data, &snapshot, &image);
        assert!(matches!(result, Err(StateError::SizeMismatch { .. })));
        assert_eq!(image.prg_ram[0], 0x17);
    }

    #[test]
    fn decode_leaves_ram_to_the_caller() {
        let mut image = image_with_ram(true);
        image.prg_ram[0] = 0x42;
        image.chr_ram[1] = 0x24;
        let snapshot = RegisterSnapshot::UxRom(UxRomState { prg_bank: 1 });
        let data = encode_state(&snapshot, &image).unwrap();

        let mut target = image_with_ram(true);
        let decoded = decode_state(&data, &snapshot, &target).unwrap();
        assert_eq!(decoded.registers, snapshot);
        assert_eq!(target.prg_ram[0], 0x00);

        decoded.apply_ram(&mut target);
        assert_eq!(target.prg_ram[0], 0x42);
        assert_eq!(target.chr_ram[1], 0x24);
    }

    #[test]
    fn decode_rejects_other_variant() {
        let image = CartridgeImage::new(3, vec![0; 0x8000], vec![0; 0x2000]);
        let saved = RegisterSnapshot::CnRom(CnRomState { chr_bank: 1 });
        let data = encode_state(&saved, &image).unwrap();

        let current = RegisterSnapshot::UxRom(UxRomState { prg_bank: 0 });
        let result = decode_state(&data, &current, &image);
        assert!(matches!(
            result,
            Err(StateError::MapperMismatch { expected: "UxROM", found: "CNROM" })
        ));
    }

    #[test]
    fn mirroring_tag_round_trips() {
        let snapshot = RegisterSnapshot::Camerica(CamericaState {
            prg_bank: 2,
            mirroring: Mirroring::SingleScreenUpper,
        });
        let bytes = encode_registers(&snapshot).unwrap();
        let (decoded, _): (RegisterSnapshot, usize) = bincode::decode_from_slice(&bytes, config()).unwrap();
        assert_eq!(decoded, snapshot);
    }
}
