//! Read command implementation.
//!
//! Decodes an instance of a predefined type out of a raw memory snapshot and
//! prints its fields. Embedded structs are expanded in place; pointers are
//! shown as addresses and never followed.

use std::path::Path;

use anyhow::Result;
use memlayout::{Instance, PlatformConfig, Value};
use owo_colors::OwoColorize;
use tracing::debug;

use super::hex_utils::format_hex_address;
use super::{find_type, open_snapshot};

/// Embedded composites nested deeper than this are printed as a summary
const MAX_DEPTH: usize = 4;

/// Run the read command
pub fn run(
    snapshot: &Path,
    type_name: &str,
    address: u64,
    base: u64,
    config: PlatformConfig,
) -> Result<()> {
    let ty = find_type(type_name)?;
    let state = open_snapshot(snapshot, base, config)?;
    let instance = ty.instance(&state, address)?;

    println!(
        "{} @ {} ({} bytes, {})",
        instance.type_name().bold(),
        format_hex_address(address),
        instance.size(),
        config
    );
    for line in read_lines(&instance) {
        println!("{}", line);
    }

    Ok(())
}

/// One line per field, nested fields indented below their parent
pub fn read_lines(instance: &Instance<'_>) -> Vec<String> {
    let mut lines = Vec::new();
    push_fields(instance, 1, &mut lines);
    lines
}

fn push_fields(instance: &Instance<'_>, depth: usize, lines: &mut Vec<String>) {
    let indent = "  ".repeat(depth);
    for (name, value) in instance.fields() {
        match value {
            Ok(Value::Composite(nested)) if depth < MAX_DEPTH => {
                lines.push(format!("{}{}: {}", indent, name, nested.type_name()));
                push_fields(&nested, depth + 1, lines);
            }
            Ok(value) => lines.push(format!("{}{} = {}", indent, name, value)),
            Err(e) => {
                debug!("Failed to read {}.{}: {}", instance.type_name(), name, e);
                lines.push(format!("{}{} = <{}>", indent, name, e));
            }
        }
    }
}
