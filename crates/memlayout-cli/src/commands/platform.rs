//! Platform command implementation.
//!
//! Prints the ABI sizes a platform implies and can save the description so
//! later runs pick it up with `--platform-file`.

use std::path::Path;

use anyhow::{Context, Result};
use memlayout::{ByteOrder, PlatformConfig, save_platform_config};
use owo_colors::OwoColorize;
use tracing::info;

/// Run the platform command
pub fn run(config: PlatformConfig, save: Option<&Path>) -> Result<()> {
    println!("{}", config.to_string().bold());
    println!("  os:         {}", config.os());
    println!("  bits:       {}", config.bits());
    println!(
        "  byte order: {} (resolves to {})",
        config.byte_order(),
        ByteOrder::Native.resolve(&config)
    );
    println!("  pointer:    {} bytes", config.pointer_size());
    println!("  int:        {} bytes", config.int_size());
    println!("  long:       {} bytes", config.long_size());

    if let Some(path) = save {
        save_platform_config(path, &config)
            .with_context(|| format!("Failed to save platform to {}", path.display()))?;
        info!("Saved platform {} to {}", config, path.display());
    }

    Ok(())
}
