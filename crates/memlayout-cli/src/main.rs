mod commands;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use commands::hex_utils::parse_hex_address;

#[derive(Parser)]
#[command(name = "memlayout")]
#[command(about = "Inspect foreign memory layouts and snapshots")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

/// Target platform selection shared by the layout-aware commands
#[derive(Args)]
struct PlatformArgs {
    /// Platform name such as `windows_x32` or `android_x64_le` (default: host)
    #[arg(short, long)]
    platform: Option<String>,

    /// JSON file holding a saved platform description
    #[arg(long, conflicts_with = "platform")]
    platform_file: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Command {
    /// List the predefined types
    Types,

    /// Show the computed layout of a predefined type
    Layout {
        /// Type name (case-insensitive)
        r#type: String,

        #[command(flatten)]
        platform: PlatformArgs,

        /// Emit JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Decode an instance of a predefined type from a memory snapshot
    Read {
        /// Raw memory snapshot file
        snapshot: PathBuf,

        /// Type name (case-insensitive)
        r#type: String,

        /// Address of the instance origin (hex)
        #[arg(short, long, value_parser = parse_hex_address)]
        address: u64,

        /// Address the first snapshot byte was taken from (hex)
        #[arg(short, long, value_parser = parse_hex_address, default_value = "0")]
        base: u64,

        #[command(flatten)]
        platform: PlatformArgs,
    },

    /// Dump raw bytes from a memory snapshot
    Hexdump {
        /// Raw memory snapshot file
        snapshot: PathBuf,

        /// Start address (hex)
        #[arg(short, long, value_parser = parse_hex_address)]
        address: u64,

        /// Number of bytes to show
        #[arg(short, long, default_value = "256")]
        size: usize,

        /// Address the first snapshot byte was taken from (hex)
        #[arg(short, long, value_parser = parse_hex_address, default_value = "0")]
        base: u64,

        /// Show the ASCII column
        #[arg(long)]
        ascii: bool,
    },

    /// Describe a platform, optionally saving it for later runs
    Platform {
        #[command(flatten)]
        platform: PlatformArgs,

        /// Write the platform description to this JSON file
        #[arg(long)]
        save: Option<PathBuf>,
    },
}

impl PlatformArgs {
    fn resolve(&self) -> Result<memlayout::PlatformConfig> {
        commands::resolve_platform(self.platform.as_deref(), self.platform_file.as_deref())
    }
}

fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("memlayout=info".parse()?))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Types => commands::types::run(),
        Command::Layout {
            r#type,
            platform,
            json,
        } => commands::layout::run(&r#type, platform.resolve()?, json),
        Command::Read {
            snapshot,
            r#type,
            address,
            base,
            platform,
        } => commands::read::run(&snapshot, &r#type, address, base, platform.resolve()?),
        Command::Hexdump {
            snapshot,
            address,
            size,
            base,
            ascii,
        } => commands::hexdump::run(&snapshot, address, size, base, ascii),
        Command::Platform { platform, save } => {
            commands::platform::run(platform.resolve()?, save.as_deref())
        }
    }
}
