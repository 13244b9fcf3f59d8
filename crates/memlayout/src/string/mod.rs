//! Native `std::string` marshalling.
//!
//! Two ABIs are modelled:
//!
//! - [`StringAbi::Sso`]: a 16-byte inline buffer overlaid with a heap pointer,
//!   followed by `length` and `capacity` (MSVC).
//! - [`StringAbi::RefCounted`]: a single pointer to the character data, preceded
//!   in memory by a `{capacity, length, ref_count}` header (pre-C++11 libstdc++).
//!
//! Growing a string allocates inside the target process through
//! [`AbstractState::allocate`]; old buffers are never freed.

pub mod refcounted;
pub mod sso;

use std::borrow::Cow;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString};
use tracing::warn;

use crate::error::{Error, Result};
use crate::layout::CompositeType;
use crate::platform::{ByteOrder, PlatformConfig};
use crate::state::AbstractState;

/// Native string representation
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
)]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
#[serde(rename_all = "snake_case")]
pub enum StringAbi {
    /// Short-string optimized layout
    Sso,
    /// Reference-counted long-string layout
    RefCounted,
    /// `Sso` on Windows, `RefCounted` elsewhere
    #[default]
    Native,
}

impl StringAbi {
    /// Concrete ABI used on `config`
    pub fn resolve(self, config: &PlatformConfig) -> Self {
        match self {
            StringAbi::Native if config.os().is_windows() => StringAbi::Sso,
            StringAbi::Native => StringAbi::RefCounted,
            explicit => explicit,
        }
    }

    /// Composite type describing the string object itself
    pub fn layout_type(self, config: &PlatformConfig) -> &'static CompositeType {
        match self.resolve(config) {
            StringAbi::Sso => sso::std_string_type(),
            _ => refcounted::old_std_string_type(),
        }
    }

    pub(crate) fn read(
        self,
        state: &dyn AbstractState,
        address: u64,
        order: ByteOrder,
    ) -> Result<String> {
        match self.resolve(&state.config()) {
            StringAbi::Sso => sso::read(state, address, order),
            _ => refcounted::read(state, address, order),
        }
    }

    pub(crate) fn write(
        self,
        state: &dyn AbstractState,
        address: u64,
        text: &str,
        order: ByteOrder,
    ) -> Result<()> {
        match self.resolve(&state.config()) {
            StringAbi::Sso => sso::write(state, address, text, order),
            _ => refcounted::write(state, address, text, order),
        }
    }
}

/// Strict UTF-8 decode; malformed input is an error
pub(crate) fn decode(address: u64, bytes: &[u8]) -> Result<String> {
    encoding_rs::UTF_8
        .decode_without_bom_handling_and_without_replacement(bytes)
        .map(Cow::into_owned)
        .ok_or_else(|| Error::Decode {
            address,
            message: format!("{} bytes are not valid UTF-8", bytes.len()),
        })
}

/// Decode, or log and fall back to an empty string
pub(crate) fn decode_or_empty(address: u64, bytes: &[u8]) -> String {
    decode(address, bytes).unwrap_or_else(|err| {
        warn!("{}", err);
        String::new()
    })
}

/// Text bytes followed by a NUL terminator
pub(crate) fn terminated(text: &str) -> Vec<u8> {
    let mut data = Vec::with_capacity(text.len() + 1);
    data.extend_from_slice(text.as_bytes());
    data.push(0);
    data
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::{Field, Value};
    use crate::platform::{Bits, OsFamily};
    use crate::state::BufferState;

    #[test]
    fn test_native_abi_resolution() {
        let windows = PlatformConfig::new(Bits::B32, OsFamily::Windows);
        let android = PlatformConfig::new(Bits::B32, OsFamily::Android);

        assert_eq!(StringAbi::Native.resolve(&windows), StringAbi::Sso);
        assert_eq!(StringAbi::Native.resolve(&android), StringAbi::RefCounted);
        assert_eq!(StringAbi::Sso.resolve(&android), StringAbi::Sso);
    }

    #[test]
    fn test_layout_type_sizes() {
        let windows = PlatformConfig::new(Bits::B32, OsFamily::Windows);
        let mac = PlatformConfig::new(Bits::B64, OsFamily::MacOs);

        let sso = StringAbi::Native.layout_type(&windows).compute_layout(&windows).unwrap();
        assert_eq!(sso.size(), 24);

        let refcounted = StringAbi::Native.layout_type(&mac).compute_layout(&mac).unwrap();
        assert_eq!(refcounted.size(), 8);
    }

    #[test]
    fn test_decode_is_strict() {
        assert_eq!(decode(0, "héllo".as_bytes()).unwrap(), "héllo");
        assert!(matches!(decode(0x40, &[0xFF, 0xFE]), Err(Error::Decode { address: 0x40, .. })));
        assert_eq!(decode_or_empty(0, &[0xC3]), "");
    }

    #[test]
    fn test_abi_from_str() {
        assert_eq!("ref_counted".parse::<StringAbi>().unwrap(), StringAbi::RefCounted);
        assert_eq!(StringAbi::Sso.to_string(), "sso");
    }

    #[test]
    fn test_string_field_follows_platform() {
        let field = Field::string(StringAbi::Native);

        for os in [OsFamily::Windows, OsFamily::Linux] {
            let config = PlatformConfig::new(Bits::B64, os).with_byte_order(ByteOrder::Little);
            let state = BufferState::new(config, 0x1000, 0x40);

            field
                .write(&state, 0x1000, &Value::from("platform string"), ByteOrder::Native)
                .unwrap();
            let value = field.read(&state, 0x1000, ByteOrder::Native).unwrap();
            assert_eq!(value.as_str(), Some("platform string"), "{}", config);
        }
    }
}
