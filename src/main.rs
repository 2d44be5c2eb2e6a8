//! mapper-probe - drive a NES cartridge mapper from the command line
//!
//! Loads raw PRG (and optional CHR) dumps, builds the mapper for the given
//! iNES number, applies scripted CPU writes, runs scanlines while reporting
//! IRQs, and hex-dumps a window of the CPU or PPU address space. Mapper state
//! can be saved to and restored from a file between runs.

use std::fs;
use std::path::PathBuf;

use anyhow::{anyhow, Context, Result};
use clap::{Parser, ValueEnum};
use log::{info, warn};

use rusty_nes_mapper::savestate;
use rusty_nes_mapper::util::{format_addr, format_byte, hexdump, parse_hex};
use rusty_nes_mapper::{
    create_mapper_with, mapper_name, CartridgeImage, IrqClockSource, Mapper, MapperConfig, Mirroring,
};

/// Visible scanlines per frame; a vblank notification follows them
const VISIBLE_SCANLINES: u32 = 240;

/// PPU dots per scanline; the CPU runs one cycle per three dots
const DOTS_PER_SCANLINE: u64 = 341;

/// Mirroring wired on the board
#[derive(ValueEnum, Clone, Copy, Debug)]
enum MirroringArg {
    Horizontal,
    Vertical,
    SingleLower,
    SingleUpper,
    FourScreen,
}

impl From<MirroringArg> for Mirroring {
    fn from(arg: MirroringArg) -> Self {
        match arg {
            MirroringArg::Horizontal => Mirroring::Horizontal,
            MirroringArg::Vertical => Mirroring::Vertical,
            MirroringArg::SingleLower => Mirroring::SingleScreenLower,
            MirroringArg::SingleUpper => Mirroring::SingleScreenUpper,
            MirroringArg::FourScreen => Mirroring::FourScreen,
        }
    }
}

/// Command line arguments for mapper-probe
#[derive(Parser, Debug)]
#[clap(author, version, about)]
struct Args {
    /// Path to the raw PRG ROM dump
    #[clap(name = "PRG")]
    prg_path: PathBuf,

    /// Path to the raw CHR ROM dump (omit for CHR RAM boards)
    #[clap(long)]
    chr: Option<PathBuf>,

    /// iNES mapper number
    #[clap(short, long, default_value = "0")]
    mapper: u16,

    /// CHR RAM size in KB when no CHR ROM is given
    #[clap(long, default_value = "8")]
    chr_ram: usize,

    /// PRG RAM size in KB
    #[clap(long, default_value = "0")]
    prg_ram: usize,

    /// PRG RAM is battery-backed
    #[clap(long)]
    battery: bool,

    /// Battery RAM file, loaded before and written after the run
    #[clap(long)]
    sav: Option<PathBuf>,

    /// Mirroring wired on the board
    #[clap(long, value_enum, default_value = "horizontal")]
    mirroring: MirroringArg,

    /// CPU write to apply, as ADDR=VALUE in hex (repeatable)
    #[clap(short, long = "write", value_parser = parse_write)]
    writes: Vec<(u16, u8)>,

    /// Number of scanlines to run after the writes
    #[clap(long, default_value = "0")]
    scanlines: u32,

    /// Clock the MMC3 IRQ counter from PPU A12 instead of scanlines
    #[clap(long)]
    a12_irq: bool,

    /// Start of the window to dump, in hex
    #[clap(long, value_parser = parse_addr, default_value = "8000")]
    dump: u16,

    /// Number of bytes to dump
    #[clap(long, default_value = "64")]
    len: usize,

    /// Dump the PPU pattern space instead of the CPU bus
    #[clap(long)]
    ppu: bool,

    /// Restore mapper state from this file before the writes
    #[clap(long)]
    load_state: Option<PathBuf>,

    /// Save mapper state to this file after the run
    #[clap(long)]
    save_state: Option<PathBuf>,

    /// Enable debug logging
    #[clap(short, long)]
    debug: bool,
}

fn parse_addr(text: &str) -> Result<u16, String> {
    let value = parse_hex(text).map_err(|e| format!("invalid address '{}': {}", text, e))?;
    u16::try_from(value).map_err(|_| format!("address '{}' is out of range", text))
}

fn parse_write(text: &str) -> Result<(u16, u8), String> {
    let (addr, value) = text
        .split_once('=')
        .ok_or_else(|| format!("expected ADDR=VALUE, got '{}'", text))?;
    let addr = parse_addr(addr)?;
    let value = parse_hex(value).map_err(|e| format!("invalid value '{}': {}", value, e))?;
    let value = u8::try_from(value).map_err(|_| format!("value '{}' does not fit in a byte", text))?;
    Ok((addr, value))
}

fn main() -> Result<()> {
    // Parse command line arguments
    let args = Args::parse();

    // Initialize logging
    if args.debug {
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("debug")).init();
    } else {
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    }

    let board = mapper_name(args.mapper).ok_or_else(|| anyhow!("Unsupported mapper: {}", args.mapper))?;
    info!("mapper-probe: mapper {} ({})", args.mapper, board);

    // Load the dumps
    let prg = fs::read(&args.prg_path)
        .with_context(|| format!("Failed to read PRG ROM: {}", args.prg_path.display()))?;
    let chr = match &args.chr {
        Some(path) => fs::read(path).with_context(|| format!("Failed to read CHR ROM: {}", path.display()))?,
        None => Vec::new(),
    };

    let mut image = CartridgeImage::new(args.mapper, prg, chr)
        .with_prg_ram(args.prg_ram * 1024)
        .with_battery(args.battery)
        .with_mirroring(args.mirroring.into());
    if image.chr_is_ram() {
        image = image.with_chr_ram(args.chr_ram * 1024);
    }

    let config = MapperConfig {
        irq_clock: if args.a12_irq { IrqClockSource::A12 } else { IrqClockSource::Scanline },
    };
    let mut mapper = create_mapper_with(image, &config).context("Failed to create mapper")?;

    if let Some(path) = &args.sav {
        match fs::read(path) {
            Ok(data) => mapper.load_battery_ram(&data),
            Err(e) => warn!("No battery RAM loaded from {}: {}", path.display(), e),
        }
    }

    if let Some(path) = &args.load_state {
        savestate::load_from_file(&mut mapper, path)
            .with_context(|| format!("Failed to load state: {}", path.display()))?;
    }

    for &(addr, value) in &args.writes {
        info!("write {} = {}", format_addr(addr), format_byte(value));
        mapper.cpu_write(addr, value);
    }

    let mut dots: u64 = 0;
    for line in 0..args.scanlines {
        let cycles_before = dots / 3;
        dots += DOTS_PER_SCANLINE;
        mapper.notify_cpu_cycles((dots / 3 - cycles_before) as u32);
        mapper.notify_scanline();
        if mapper.irq_pending() {
            info!("IRQ asserted after scanline {}", line);
            mapper.irq_acknowledge();
        }
        if (line + 1) % VISIBLE_SCANLINES == 0 {
            mapper.notify_vblank();
        }
    }

    let window: Vec<u8> = (0..args.len)
        .map(|i| {
            let addr = args.dump.wrapping_add(i as u16);
            if args.ppu { mapper.ppu_read(addr) } else { mapper.cpu_read(addr) }
        })
        .collect();
    hexdump(&window, args.dump);

    println!("mapper:     {} ({})", mapper.mapper_number(), mapper.name());
    println!("mirroring:  {:?}", mapper.mirroring());
    println!("irq:        {}", if mapper.irq_pending() { "pending" } else { "clear" });
    if let Some(level) = mapper.expansion_audio() {
        println!("pcm level:  {}", format_byte(level));
    }

    if let Some(path) = &args.save_state {
        savestate::save_to_file(&mapper, path)
            .with_context(|| format!("Failed to save state: {}", path.display()))?;
    }

    if let (Some(path), Some(ram)) = (&args.sav, mapper.battery_ram()) {
        fs::write(path, ram).with_context(|| format!("Failed to write battery RAM: {}", path.display()))?;
        info!("Battery RAM written to {}", path.display());
    }

    Ok(())
}
