//! Composite types and their computed layouts.
//!
//! Declaring a type and resolving its layout are separate steps. A
//! [`CompositeType`] can be declared first and defined later, so types that
//! refer to each other (or to themselves through pointers) can be built in any
//! order. Layouts are resolved lazily, the first time a platform asks for one,
//! and cached per [`PlatformConfig`].
//!
//! ```
//! use memlayout::{Bits, CompositeType, Definition, Field, OsFamily, PlatformConfig};
//!
//! let header = CompositeType::new_struct(
//!     "Header",
//!     Definition::new()
//!         .field("tag", Field::U8)
//!         .field("length", Field::U32)
//!         .field("flags", Field::U16),
//! );
//!
//! let layout = header
//!     .compute_layout(&PlatformConfig::new(Bits::B32, OsFamily::Linux))
//!     .unwrap();
//! assert_eq!(layout.get("length").unwrap().offset, 4);
//! assert_eq!(layout.size(), 12);
//! ```

pub(crate) mod engine;
mod instance;

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, OnceLock, PoisonError, RwLock};

use strum::{Display, IntoStaticStr};

pub use instance::{FieldIter, Instance};

use crate::error::{Error, Result};
use crate::field::Field;
use crate::platform::PlatformConfig;
use crate::state::AbstractState;
use engine::Visiting;

/// Whether members follow each other or overlap
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, IntoStaticStr)]
#[strum(serialize_all = "snake_case")]
pub enum CompositeKind {
    Struct,
    Union,
}

/// Declarative body of a composite type.
///
/// Fields are listed in declaration order. A base type's fields come first;
/// redeclaring one of them replaces its descriptor without moving it.
#[derive(Debug, Clone, Default)]
pub struct Definition {
    base: Option<CompositeType>,
    fields: Vec<(String, Field)>,
    packed: bool,
    vtable: bool,
    origin: Option<String>,
}

impl Definition {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inherit the fields of `base`, placed before this type's own
    pub fn base(mut self, base: &CompositeType) -> Self {
        self.base = Some(base.clone());
        self
    }

    pub fn field(mut self, name: impl Into<String>, field: Field) -> Self {
        self.fields.push((name.into(), field));
        self
    }

    /// Padding of a per-platform byte count; platforms not listed get none
    pub fn fill(self, name: impl Into<String>, fills: HashMap<PlatformConfig, usize>) -> Self {
        self.field(name, Field::fill(fills))
    }

    /// Lay fields out back to back with no padding
    pub fn packed(mut self) -> Self {
        self.packed = true;
        self
    }

    /// Reserve a leading pointer-sized vtable slot
    pub fn vtable(mut self) -> Self {
        self.vtable = true;
        self
    }

    /// Place the named field at offset 0; earlier fields get negative offsets
    pub fn origin(mut self, field: impl Into<String>) -> Self {
        self.origin = Some(field.into());
        self
    }

    pub(crate) fn base_type(&self) -> Option<&CompositeType> {
        self.base.as_ref()
    }

    pub fn fields(&self) -> impl Iterator<Item = &(String, Field)> {
        self.fields.iter()
    }

    pub fn has_vtable(&self) -> bool {
        self.vtable
    }

    pub fn is_packed(&self) -> bool {
        self.packed
    }

    pub fn origin_field(&self) -> Option<&str> {
        self.origin.as_deref()
    }
}

struct CompositeInner {
    name: String,
    kind: CompositeKind,
    definition: OnceLock<Definition>,
    layouts: RwLock<HashMap<PlatformConfig, Arc<CompositeLayout>>>,
}

/// Shared handle to a struct or union type.
///
/// Clones refer to the same type. Two handles are equal only if they are
/// clones of each other, regardless of name.
#[derive(Clone)]
pub struct CompositeType(Arc<CompositeInner>);

impl CompositeType {
    fn declare(name: impl Into<String>, kind: CompositeKind) -> Self {
        Self(Arc::new(CompositeInner {
            name: name.into(),
            kind,
            definition: OnceLock::new(),
            layouts: RwLock::new(HashMap::new()),
        }))
    }

    /// Declare a struct whose fields are supplied later through [`define`](Self::define)
    pub fn declare_struct(name: impl Into<String>) -> Self {
        Self::declare(name, CompositeKind::Struct)
    }

    pub fn declare_union(name: impl Into<String>) -> Self {
        Self::declare(name, CompositeKind::Union)
    }

    pub fn new_struct(name: impl Into<String>, definition: Definition) -> Self {
        Self::with_definition(Self::declare_struct(name), definition)
    }

    pub fn new_union(name: impl Into<String>, definition: Definition) -> Self {
        Self::with_definition(Self::declare_union(name), definition)
    }

    /// Build a struct that refers to itself, e.g. through a parent pointer
    pub fn cyclic_struct(
        name: impl Into<String>,
        build: impl FnOnce(&CompositeType) -> Definition,
    ) -> Self {
        let ty = Self::declare_struct(name);
        let definition = build(&ty);
        Self::with_definition(ty, definition)
    }

    fn with_definition(ty: Self, definition: Definition) -> Self {
        // freshly declared, so the cell is empty
        let _ = ty.0.definition.set(definition);
        ty
    }

    /// Supply the fields of a declared type. A type can only be defined once.
    pub fn define(&self, definition: Definition) -> Result<()> {
        self.0
            .definition
            .set(definition)
            .map_err(|_| Error::Layout(format!("{} {} is already defined", self.kind(), self.name())))
    }

    pub fn name(&self) -> &str {
        &self.0.name
    }

    pub fn kind(&self) -> CompositeKind {
        self.0.kind
    }

    pub fn is_defined(&self) -> bool {
        self.0.definition.get().is_some()
    }

    pub fn definition(&self) -> Result<&Definition> {
        self.0.definition.get().ok_or_else(|| {
            Error::Layout(format!("{} {} is declared but never defined", self.kind(), self.name()))
        })
    }

    pub fn same_type(&self, other: &CompositeType) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    pub(crate) fn id(&self) -> usize {
        Arc::as_ptr(&self.0) as usize
    }

    /// Layout of this type on `config`, computed once and then cached
    pub fn compute_layout(&self, config: &PlatformConfig) -> Result<Arc<CompositeLayout>> {
        self.layout_in(config, &mut Visiting::default())
    }

    pub(crate) fn layout_in(
        &self,
        config: &PlatformConfig,
        visiting: &mut Visiting,
    ) -> Result<Arc<CompositeLayout>> {
        if let Some(layout) = self.cached_layout(config) {
            return Ok(layout);
        }

        visiting.enter(self)?;
        let computed = engine::compute(self, config, visiting);
        visiting.leave();

        let layout = Arc::new(computed?);
        let mut layouts = self.0.layouts.write().unwrap_or_else(PoisonError::into_inner);
        Ok(layouts.entry(*config).or_insert(layout).clone())
    }

    fn cached_layout(&self, config: &PlatformConfig) -> Option<Arc<CompositeLayout>> {
        let layouts = self.0.layouts.read().unwrap_or_else(PoisonError::into_inner);
        layouts.get(config).cloned()
    }

    /// Cursor over an instance of this type whose origin is at `address`
    pub fn instance<'s>(&self, state: &'s dyn AbstractState, address: u64) -> Result<Instance<'s>> {
        let layout = self.compute_layout(&state.config())?;
        Ok(Instance::new(state, address, layout))
    }
}

impl PartialEq for CompositeType {
    fn eq(&self, other: &Self) -> bool {
        self.same_type(other)
    }
}

impl fmt::Debug for CompositeType {
    // fields may point back at this type
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.kind(), self.name())
    }
}

/// One placed member of a [`CompositeLayout`]
#[derive(Debug, Clone, PartialEq)]
pub struct LayoutField {
    pub name: String,
    pub field: Field,
    /// Offset from the instance origin; negative before an origin field
    pub offset: i64,
    /// Zero for a trailing unsized array
    pub size: usize,
    pub alignment: usize,
}

/// Resolved layout of a composite type on one platform
#[derive(Debug, Clone)]
pub struct CompositeLayout {
    name: String,
    kind: CompositeKind,
    config: PlatformConfig,
    size: usize,
    alignment: usize,
    start: i64,
    fields: Vec<LayoutField>,
    index: HashMap<String, usize>,
}

impl CompositeLayout {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> CompositeKind {
        self.kind
    }

    pub fn config(&self) -> PlatformConfig {
        self.config
    }

    /// Total size, trailing padding included
    pub fn size(&self) -> usize {
        self.size
    }

    pub fn alignment(&self) -> usize {
        self.alignment
    }

    /// Offset of the first byte relative to the origin (0 unless an origin field is set)
    pub fn start(&self) -> i64 {
        self.start
    }

    /// Members in layout order
    pub fn fields(&self) -> &[LayoutField] {
        &self.fields
    }

    pub fn field(&self, name: &str) -> Option<&LayoutField> {
        self.index.get(name).map(|&position| &self.fields[position])
    }

    pub fn get(&self, name: &str) -> Result<&LayoutField> {
        self.field(name).ok_or_else(|| Error::UnknownField {
            type_name: self.name.clone(),
            field: name.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::{Bits, OsFamily};

    fn linux64() -> PlatformConfig {
        PlatformConfig::new(Bits::B64, OsFamily::Linux)
    }

    #[test]
    fn test_define_once() {
        let ty = CompositeType::declare_struct("Later");
        assert!(!ty.is_defined());
        assert!(matches!(ty.compute_layout(&linux64()), Err(Error::Layout(_))));

        ty.define(Definition::new().field("a", Field::U32)).unwrap();
        assert!(ty.is_defined());
        assert_eq!(ty.compute_layout(&linux64()).unwrap().size(), 4);

        let err = ty.define(Definition::new()).unwrap_err();
        assert!(matches!(err, Error::Layout(_)));
    }

    #[test]
    fn test_layout_is_cached_per_config() {
        let ty = CompositeType::new_struct("Slot", Definition::new().field("p", Field::USIZE));

        let first = ty.compute_layout(&linux64()).unwrap();
        let again = ty.compute_layout(&linux64()).unwrap();
        assert!(Arc::ptr_eq(&first, &again));

        let narrow = ty
            .compute_layout(&PlatformConfig::new(Bits::B32, OsFamily::Linux))
            .unwrap();
        assert_eq!(first.size(), 8);
        assert_eq!(narrow.size(), 4);
    }

    #[test]
    fn test_unknown_field_lookup() {
        let ty = CompositeType::new_struct("Slot", Definition::new().field("p", Field::USIZE));
        let layout = ty.compute_layout(&linux64()).unwrap();

        assert!(layout.field("q").is_none());
        let err = layout.get("q").unwrap_err();
        assert!(matches!(err, Error::UnknownField { .. }));
    }

    #[test]
    fn test_type_identity() {
        let a = CompositeType::declare_struct("Same");
        let b = CompositeType::declare_struct("Same");
        assert_eq!(a, a.clone());
        assert_ne!(a, b);
        assert_eq!(format!("{:?}", a), "struct Same");
    }
}
