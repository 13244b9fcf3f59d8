//! Hex address parsing and formatting utilities.

use anyhow::{Result, anyhow};

/// Parse a hex address string (with or without 0x prefix)
pub fn parse_hex_address(s: &str) -> Result<u64> {
    let s = s.trim();
    let digits = s
        .strip_prefix("0x")
        .or_else(|| s.strip_prefix("0X"))
        .unwrap_or(s);
    u64::from_str_radix(digits, 16).map_err(|e| anyhow!("Invalid hex address '{}': {}", s, e))
}

/// Format an address as a hex string with 0x prefix
pub fn format_hex_address(addr: u64) -> String {
    format!("0x{:X}", addr)
}

/// Format a signed layout offset, e.g. `-0x18` or `+0x8`
pub fn format_hex_offset(offset: i64) -> String {
    if offset < 0 {
        format!("-0x{:X}", offset.unsigned_abs())
    } else {
        format!("+0x{:X}", offset)
    }
}
