//! Utility functions and helpers
//!
//! Bit tests used by the register decoders, plus the formatting and parsing
//! helpers the `mapper-probe` tool uses for addresses and bytes.

use std::num::ParseIntError;

/// Check if a bit is set in a byte
#[inline]
pub fn check_bit(value: u8, bit: u8) -> bool {
    (value & (1 << bit)) != 0
}

/// Format a 16-bit address as a hex string
pub fn format_addr(addr: u16) -> String {
    format!("${:04X}", addr)
}

/// Format an 8-bit value as a hex string
pub fn format_byte(value: u8) -> String {
    format!("${:02X}", value)
}

/// Parse a hex number written as `$1F`, `0x1F` or `1F`
pub fn parse_hex(text: &str) -> Result<u32, ParseIntError> {
    let digits = text
        .trim()
        .trim_start_matches('$')
        .trim_start_matches("0x")
        .trim_start_matches("0X");
    u32::from_str_radix(digits, 16)
}

/// One line of a hexdump: address, up to 16 bytes, ASCII column
pub fn hexdump_line(addr: u16, chunk: &[u8]) -> String {
    let mut line = format!("{:04X}: ", addr);

    for (j, byte) in chunk.iter().enumerate() {
        line.push_str(&format!("{:02X} ", byte));
        if j == 7 {
            line.push(' ');
        }
    }

    // Padding for incomplete lines
    for _ in chunk.len()..16 {
        line.push_str("   ");
    }
    if chunk.len() <= 8 {
        line.push(' ');
    }

    line.push_str(" |");
    for byte in chunk {
        if *byte >= 0x20 && *byte < 0x7F {
            line.push(*byte as char);
        } else {
            line.push('.');
        }
    }
    line.push('|');
    line
}

/// Debug hexdump of a memory region
pub fn hexdump(data: &[u8], start_addr: u16) {
    for (i, chunk) in data.chunks(16).enumerate() {
        let addr = start_addr.wrapping_add((i * 16) as u16);
        println!("{}", hexdump_line(addr, chunk));
    }
}
