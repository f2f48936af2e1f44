//! Process-wide type tags for handles
//!
//! Every value type stored behind a [`Handle`](super::Handle) gets a small integer tag the
//! first time it is requested. The counter behind [`type_id`] is the only global mutable
//! state in the engine core; nothing else may mutate it.

use std::any::TypeId;
use std::collections::HashMap;
use std::sync::{Mutex, OnceLock, PoisonError};

/// Type tag carried by a handle
pub type TypeTag = u16;

/// Reserved tag meaning "no type"
pub const NO_TYPE: TypeTag = 0;

/// Largest tag that can be issued. `u16::MAX` is kept free so a fully populated handle
/// can never alias the invalid bit pattern through its type field.
pub const MAX_TYPE: TypeTag = u16::MAX - 1;

struct TypeTable {
    tags: HashMap<TypeId, TypeTag>,
    next: TypeTag,
}

fn table() -> &'static Mutex<TypeTable> {
    static TABLE: OnceLock<Mutex<TypeTable>> = OnceLock::new();
    TABLE.get_or_init(|| {
        Mutex::new(TypeTable {
            tags: HashMap::new(),
            next: 1,
        })
    })
}

/// Returns the tag for `T`, assigning the next free one on first request
///
/// Idempotent for a given `T`. If the tag space is exhausted the reserved [`NO_TYPE`] is
/// returned, which makes every handle built from it invalid.
pub fn type_id<T: 'static>() -> TypeTag {
    let key = TypeId::of::<T>();
    let mut table = table().lock().unwrap_or_else(PoisonError::into_inner);

    if let Some(&tag) = table.tags.get(&key) {
        return tag;
    }

    if table.next > MAX_TYPE {
        log::error!(
            "Type tag space exhausted, {} cannot be stored behind handles",
            std::any::type_name::<T>()
        );
        return NO_TYPE;
    }

    let tag = table.next;
    table.next += 1;
    table.tags.insert(key, tag);
    log::debug!("Assigned type tag {} to {}", tag, std::any::type_name::<T>());
    tag
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Texture;
    struct Material;

    #[test]
    fn test_type_id_is_stable() {
        let first = type_id::<Texture>();
        let second = type_id::<Texture>();

        assert_eq!(first, second);
        assert_ne!(first, NO_TYPE);
    }

    #[test]
    fn test_distinct_types_get_distinct_tags() {
        assert_ne!(type_id::<Texture>(), type_id::<Material>());
    }
}
