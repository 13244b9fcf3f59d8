//! CLI command implementations.
//!
//! This module contains the implementation of each CLI command.

pub mod hex_utils;
pub mod hexdump;
pub mod layout;
pub mod platform;
pub mod read;
pub mod types;

use std::path::Path;

use anyhow::{Context, Result, anyhow};
use memlayout::{BufferState, CompositeType, PlatformConfig, load_platform_config, schema};

/// Pick the platform from a name, a saved file, or the host
pub fn resolve_platform(name: Option<&str>, file: Option<&Path>) -> Result<PlatformConfig> {
    if let Some(path) = file {
        return load_platform_config(path)
            .with_context(|| format!("Failed to load platform from {}", path.display()));
    }
    match name {
        Some(name) => Ok(name.parse()?),
        None => Ok(PlatformConfig::host()),
    }
}

/// Look up a predefined type, suggesting `types` when the name is unknown
pub fn find_type(name: &str) -> Result<CompositeType> {
    schema::lookup(name)
        .ok_or_else(|| anyhow!("Unknown type '{}' (run `memlayout types` for the list)", name))
}

/// Load a snapshot file whose first byte was taken from `base`
pub fn open_snapshot(path: &Path, base: u64, config: PlatformConfig) -> Result<BufferState> {
    BufferState::from_file(config, base, path)
        .with_context(|| format!("Failed to load snapshot {}", path.display()))
}
