//! Generational, type-tagged handles

use std::fmt;

use super::type_id::{type_id, TypeTag, NO_TYPE};

const INDEX_BITS: u32 = 32;
const GENERATION_BITS: u32 = 16;
const GENERATION_SHIFT: u32 = INDEX_BITS;
const TYPE_SHIFT: u32 = INDEX_BITS + GENERATION_BITS;

/// Handle to a value owned by a [`Pool`](super::Pool)
///
/// Packs `{ index: u32, generation: u16, type: u16 }` into one 64-bit word. Handles are
/// plain values: copying one does not keep the referenced value alive, and a handle whose
/// slot has been removed simply stops resolving.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Handle(u64);

impl Handle {
    /// The canonical invalid handle (all bits set)
    pub const INVALID: Self = Self(u64::MAX);

    /// Build a handle from its parts
    pub const fn from_parts(index: u32, generation: u16, type_tag: TypeTag) -> Self {
        Self(
            index as u64
                | (generation as u64) << GENERATION_SHIFT
                | (type_tag as u64) << TYPE_SHIFT,
        )
    }

    /// Build a handle tagged with the type tag of `T`
    pub fn make<T: 'static>(index: u32, generation: u16) -> Self {
        Self::from_parts(index, generation, type_id::<T>())
    }

    /// Reinterpret a raw 64-bit value as a handle
    pub const fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    /// The packed 64-bit value
    pub const fn raw(self) -> u64 {
        self.0
    }

    /// Slot index
    pub const fn index(self) -> u32 {
        self.0 as u32
    }

    /// Slot generation this handle was issued for
    pub const fn generation(self) -> u16 {
        (self.0 >> GENERATION_SHIFT) as u16
    }

    /// Type tag of the value this handle refers to
    pub const fn type_tag(self) -> TypeTag {
        (self.0 >> TYPE_SHIFT) as u16
    }

    /// True unless this is the invalid bit pattern or carries no type
    ///
    /// This only says the handle is well formed. Whether it still refers to a live value
    /// is answered by the owning pool.
    pub const fn is_valid(self) -> bool {
        self.0 != u64::MAX && self.type_tag() != NO_TYPE
    }

    /// True if this handle is tagged with `T`
    pub fn is_type<T: 'static>(self) -> bool {
        self.is_valid() && self.type_tag() == type_id::<T>()
    }
}

impl Default for Handle {
    fn default() -> Self {
        Self::INVALID
    }
}

impl fmt::Debug for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if *self == Self::INVALID {
            return f.write_str("Handle(invalid)");
        }
        f.debug_struct("Handle")
            .field("index", &self.index())
            .field("generation", &self.generation())
            .field("type", &self.type_tag())
            .finish()
    }
}
