//! Hexdump command implementation.
//!
//! Displays raw snapshot bytes in traditional hexdump format, useful for
//! checking a layout against the memory it is supposed to describe.
//!
//! # Output Format
//!
//! ```text
//! 0x000: 48 65 6C 6C 6F 20 57 6F  72 6C 64 00 00 00 00 00  |Hello World.....|
//! ```

use std::path::Path;

use anyhow::{Result, bail};
use memlayout::{AbstractState, PlatformConfig};
use owo_colors::OwoColorize;

use super::open_snapshot;

const BYTES_PER_LINE: usize = 16;

/// Run the hexdump command
pub fn run(snapshot: &Path, address: u64, size: usize, base: u64, ascii: bool) -> Result<()> {
    let state = open_snapshot(snapshot, base, PlatformConfig::host())?;

    let end = state.base() + state.len() as u64;
    if address < state.base() || address >= end {
        bail!(
            "Address 0x{:X} is outside the snapshot (0x{:X}..0x{:X})",
            address,
            state.base(),
            end
        );
    }
    let size = size.min((end - address) as usize);
    let bytes = state.read_bytes(address, size)?;

    println!(
        "{}",
        format!("Hexdump at 0x{:X} ({} bytes):", address, size).bold()
    );
    println!();
    for line in format_lines(&bytes, ascii) {
        println!("{}", line);
    }

    Ok(())
}

/// Render `bytes` as hexdump lines with offsets relative to the first byte
pub fn format_lines(bytes: &[u8], ascii: bool) -> Vec<String> {
    bytes
        .chunks(BYTES_PER_LINE)
        .enumerate()
        .map(|(i, chunk)| format_line(i * BYTES_PER_LINE, chunk, ascii))
        .collect()
}

fn format_line(offset: usize, chunk: &[u8], ascii: bool) -> String {
    let mut line = format!("0x{:03X}: ", offset);

    for j in 0..BYTES_PER_LINE {
        if j == 8 {
            line.push(' ');
        }
        match chunk.get(j) {
            Some(byte) => line.push_str(&format!("{:02X} ", byte)),
            // padding for incomplete lines
            None => line.push_str("   "),
        }
    }

    if ascii {
        line.push_str(" |");
        for byte in chunk {
            if (0x20..0x7F).contains(byte) {
                line.push(*byte as char);
            } else {
                line.push('.');
            }
        }
        for _ in chunk.len()..BYTES_PER_LINE {
            line.push(' ');
        }
        line.push('|');
    }

    line
}
