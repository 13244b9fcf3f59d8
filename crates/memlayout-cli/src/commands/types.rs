//! Types command implementation.

use anyhow::Result;
use memlayout::{PlatformConfig, schema};
use owo_colors::OwoColorize;

/// Run the types command
pub fn run() -> Result<()> {
    let config = PlatformConfig::host();
    println!("Predefined types ({}):", config);
    for name in schema::names() {
        let Some(ty) = schema::lookup(name) else {
            continue;
        };
        let layout = ty.compute_layout(&config)?;
        println!(
            "  {:<20} {:<6} {:>5} bytes",
            name.bold(),
            ty.kind(),
            layout.size()
        );
    }
    Ok(())
}
