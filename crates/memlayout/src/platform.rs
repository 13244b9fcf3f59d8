//! Target platform description.
//!
//! A [`PlatformConfig`] describes the architecture of the process whose memory is
//! being modelled: word width, operating system family and byte order. Every
//! size and alignment computation takes one as input.
//!
//! The compact text form is `<os>_x<bits>`, optionally followed by `_le` or `_be`
//! to pin the byte order:
//!
//! ```
//! use memlayout::{Bits, OsFamily, PlatformConfig};
//!
//! let config: PlatformConfig = "windows_x64".parse().unwrap();
//! assert_eq!(config.bits(), Bits::B64);
//! assert_eq!(config.os(), OsFamily::Windows);
//! assert_eq!(config.to_string(), "windows_x64");
//! ```

use std::fmt;
use std::fs;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString, IntoStaticStr};

use crate::error::{Error, Result};

/// Operating system family of the target process
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Default,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    EnumIter,
    IntoStaticStr,
)]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
#[serde(rename_all = "snake_case")]
pub enum OsFamily {
    #[default]
    Unknown,
    Android,
    Ios,
    IpadOs,
    Linux,
    MacOs,
    Windows,
}

impl OsFamily {
    pub fn is_windows(self) -> bool {
        self == OsFamily::Windows
    }

    /// OS family of the running machine
    pub fn host() -> Self {
        if cfg!(target_os = "windows") {
            OsFamily::Windows
        } else if cfg!(target_os = "android") {
            OsFamily::Android
        } else if cfg!(target_os = "ios") {
            OsFamily::Ios
        } else if cfg!(target_os = "macos") {
            OsFamily::MacOs
        } else if cfg!(any(target_os = "linux", target_os = "freebsd")) {
            OsFamily::Linux
        } else {
            OsFamily::Unknown
        }
    }

    pub fn as_str(&self) -> &'static str {
        self.into()
    }
}

/// Byte order used for typed memory access
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, Display, EnumIter,
)]
#[serde(rename_all = "snake_case")]
pub enum ByteOrder {
    #[strum(serialize = "little")]
    Little,
    #[strum(serialize = "big")]
    Big,
    /// Whatever the target platform uses
    #[default]
    #[strum(serialize = "native")]
    Native,
}

impl ByteOrder {
    /// Byte order of the running machine
    pub fn host() -> Self {
        if cfg!(target_endian = "big") {
            ByteOrder::Big
        } else {
            ByteOrder::Little
        }
    }

    /// Resolve `Native` against the target config.
    ///
    /// A config whose own order is `Native` falls back to the host order, so the
    /// result is always `Little` or `Big`.
    pub fn resolve(self, config: &PlatformConfig) -> Self {
        match self {
            ByteOrder::Native => match config.byte_order() {
                ByteOrder::Native => ByteOrder::host(),
                explicit => explicit,
            },
            explicit => explicit,
        }
    }

    pub fn is_big_endian(self, config: &PlatformConfig) -> bool {
        self.resolve(config) == ByteOrder::Big
    }
}

/// Word width of the target process
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, EnumIter)]
#[serde(try_from = "u32", into = "u32")]
pub enum Bits {
    B8,
    B16,
    B32,
    B64,
}

impl Bits {
    pub fn get(self) -> u32 {
        match self {
            Bits::B8 => 8,
            Bits::B16 => 16,
            Bits::B32 => 32,
            Bits::B64 => 64,
        }
    }

    /// Width of one machine word in bytes
    pub fn bytes(self) -> usize {
        self.get() as usize / 8
    }

    pub fn host() -> Self {
        match usize::BITS {
            16 => Bits::B16,
            32 => Bits::B32,
            _ => Bits::B64,
        }
    }
}

impl TryFrom<u32> for Bits {
    type Error = Error;

    fn try_from(value: u32) -> Result<Self> {
        match value {
            8 => Ok(Bits::B8),
            16 => Ok(Bits::B16),
            32 => Ok(Bits::B32),
            64 => Ok(Bits::B64),
            _ => Err(Error::UnsupportedBits(value)),
        }
    }
}

impl From<Bits> for u32 {
    fn from(bits: Bits) -> Self {
        bits.get()
    }
}

impl fmt::Display for Bits {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.get())
    }
}

/// Immutable description of the target process architecture.
///
/// If the target changes (for example after attaching to another binary), build a
/// new config instead of mutating the old one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PlatformConfig {
    bits: Bits,
    os: OsFamily,
    #[serde(default)]
    byte_order: ByteOrder,
}

impl PlatformConfig {
    pub const fn new(bits: Bits, os: OsFamily) -> Self {
        Self {
            bits,
            os,
            byte_order: ByteOrder::Native,
        }
    }

    pub const fn with_byte_order(self, byte_order: ByteOrder) -> Self {
        Self {
            bits: self.bits,
            os: self.os,
            byte_order,
        }
    }

    /// Config describing the running machine
    pub fn host() -> Self {
        Self::new(Bits::host(), OsFamily::host())
    }

    pub fn bits(&self) -> Bits {
        self.bits
    }

    pub fn os(&self) -> OsFamily {
        self.os
    }

    pub fn byte_order(&self) -> ByteOrder {
        self.byte_order
    }

    /// Size of pointers, `size_t` and `intptr_t`
    pub fn pointer_size(&self) -> usize {
        self.bits.bytes()
    }

    /// Size of C `int`: 2 bytes below 32-bit, otherwise 4
    pub fn int_size(&self) -> usize {
        if self.bits.get() < 32 { 2 } else { 4 }
    }

    /// Size of C `long`.
    ///
    /// 8 bytes only on 64-bit targets outside the Windows family (LLP64 keeps
    /// `long` at 4 bytes).
    pub fn long_size(&self) -> usize {
        if self.bits.get() > 32 && !self.os.is_windows() {
            8
        } else {
            4
        }
    }
}

impl Default for PlatformConfig {
    fn default() -> Self {
        Self::host()
    }
}

const BITS_SEPARATOR: &str = "_x";
const LITTLE_SUFFIX: &str = "_le";
const BIG_SUFFIX: &str = "_be";

impl fmt::Display for PlatformConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}{}", self.os, BITS_SEPARATOR, self.bits)?;
        match self.byte_order {
            ByteOrder::Little => f.write_str(LITTLE_SUFFIX),
            ByteOrder::Big => f.write_str(BIG_SUFFIX),
            ByteOrder::Native => Ok(()),
        }
    }
}

impl FromStr for PlatformConfig {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let invalid = || Error::InvalidPlatform(s.to_string());

        let s = s.trim();
        let (rest, byte_order) = if let Some(rest) = s.strip_suffix(LITTLE_SUFFIX) {
            (rest, ByteOrder::Little)
        } else if let Some(rest) = s.strip_suffix(BIG_SUFFIX) {
            (rest, ByteOrder::Big)
        } else {
            (s, ByteOrder::Native)
        };

        let (os, bits) = rest.rsplit_once(BITS_SEPARATOR).ok_or_else(invalid)?;
        let os = OsFamily::from_str(os).map_err(|_| invalid())?;
        let bits: u32 = bits.parse().map_err(|_| invalid())?;

        Ok(Self::new(Bits::try_from(bits)?, os).with_byte_order(byte_order))
    }
}

/// Load a platform description from a JSON file
pub fn load_platform_config<P: AsRef<Path>>(path: P) -> Result<PlatformConfig> {
    let content = fs::read_to_string(&path)?;
    let config = serde_json::from_str(&content)?;
    Ok(config)
}

/// Save a platform description as pretty-printed JSON
pub fn save_platform_config<P: AsRef<Path>>(path: P, config: &PlatformConfig) -> Result<()> {
    let content = serde_json::to_string_pretty(config)?;
    fs::write(path, content)?;
    Ok(())
}
