//! # memlayout
//!
//! Typed access to data living in another process's address space.
//!
//! This crate provides:
//! - Platform descriptions (word width, OS family, byte order) and ABI sizing
//! - The [`AbstractState`] memory port plus an in-memory [`BufferState`]
//! - Field descriptors for scalars, arrays, pointers, composites and strings
//! - Struct/union layout with inheritance, packing, vtable slots and origin fields
//! - Lazy cursors ([`Instance`], [`ArrayProxy`], [`PointerCursor`])
//! - Marshalling for the SSO and reference-counted `std::string` ABIs
//! - Predefined Cocos2d-x schemas
//!
//! ```
//! use memlayout::{
//!     AbstractState, BufferState, CompositeType, Definition, Field, PlatformConfig, StringAbi,
//! };
//!
//! let player = CompositeType::new_struct(
//!     "Player",
//!     Definition::new()
//!         .field("id", Field::U32)
//!         .field("name", Field::string(StringAbi::Sso)),
//! );
//!
//! let state = BufferState::new(PlatformConfig::host(), 0x1000, 0x100);
//! let instance = player.instance(&state, 0x1000).unwrap();
//! instance.set("id", 42u32).unwrap();
//! instance.set("name", "RobTop").unwrap();
//!
//! assert_eq!(instance.get_as::<u32>("id").unwrap(), 42);
//! assert_eq!(instance.get_as::<String>("name").unwrap(), "RobTop");
//! assert_eq!(state.allocation_count(), 0);
//! ```

pub mod array;
pub mod error;
pub mod field;
pub mod layout;
pub mod platform;
pub mod pointer;
pub mod schema;
pub mod state;
pub mod string;
pub mod util;

pub use array::{ArrayIter, ArrayProxy};
pub use error::{Error, Result};
pub use field::{Field, Primitive, Value};
pub use layout::{
    CompositeKind, CompositeLayout, CompositeType, Definition, FieldIter, Instance, LayoutField,
};
pub use platform::{
    Bits, ByteOrder, OsFamily, PlatformConfig, load_platform_config, save_platform_config,
};
pub use pointer::PointerCursor;
pub use state::{AbstractState, Allocation, BufferState, BufferStateBuilder};
pub use string::StringAbi;
pub use util::{
    checked_round_up, closest_power_of_two, closest_power_of_two_bits, collect_fields, round_up,
};
