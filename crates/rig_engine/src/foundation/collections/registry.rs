//! Heterogeneous handle registry
//!
//! A [`Registry`] owns one [`Pool`] per value type, keyed by the type tag embedded in every
//! handle. Typed access checks the tag before any pool memory is touched, so a texture
//! handle can never be used to fetch a material. Untyped operations (`remove`, `contains`,
//! deferred removal) dispatch on the tag through a small object-safe pool interface.

use std::any::Any;
use std::collections::HashMap;

use super::handle::Handle;
use super::pool::Pool;
use super::type_id::{type_id, TypeTag, NO_TYPE};

/// Type-erased view of a pool used for tag-based dispatch
trait ErasedPool {
    fn remove(&mut self, handle: Handle) -> bool;
    fn contains(&self, handle: Handle) -> bool;
    fn queue_remove(&mut self, handle: Handle) -> bool;
    fn flush_removals(&mut self) -> usize;
    fn has_pending_removals(&self) -> bool;
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl<T: 'static> ErasedPool for Pool<T> {
    fn remove(&mut self, handle: Handle) -> bool {
        Pool::remove(self, handle)
    }

    fn contains(&self, handle: Handle) -> bool {
        Pool::contains(self, handle)
    }

    fn queue_remove(&mut self, handle: Handle) -> bool {
        Pool::queue_remove(self, handle)
    }

    fn flush_removals(&mut self) -> usize {
        Pool::flush_removals(self)
    }

    fn has_pending_removals(&self) -> bool {
        Pool::has_pending_removals(self)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// Collection of pools, one per value type
#[derive(Default)]
pub struct Registry {
    pools: HashMap<TypeTag, Box<dyn ErasedPool>>,
}

impl Registry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    fn typed<T: 'static>(&self) -> Option<&Pool<T>> {
        self.pools
            .get(&type_id::<T>())?
            .as_any()
            .downcast_ref::<Pool<T>>()
    }

    fn typed_mut<T: 'static>(&mut self) -> Option<&mut Pool<T>> {
        self.pools
            .get_mut(&type_id::<T>())?
            .as_any_mut()
            .downcast_mut::<Pool<T>>()
    }

    /// Pool for `T`, created on first use
    ///
    /// Returns `None` only if `T` could not be assigned a type tag.
    pub fn pool_mut<T: 'static>(&mut self) -> Option<&mut Pool<T>> {
        let tag = type_id::<T>();
        if tag == NO_TYPE {
            return None;
        }
        self.pools
            .entry(tag)
            .or_insert_with(|| {
                log::debug!("Creating registry pool for {}", std::any::type_name::<T>());
                Box::new(Pool::<T>::new()) as Box<dyn ErasedPool>
            })
            .as_any_mut()
            .downcast_mut::<Pool<T>>()
    }

    /// Pool for `T`, if one has been created
    pub fn pool<T: 'static>(&self) -> Option<&Pool<T>> {
        self.typed::<T>()
    }

    /// Store `value` in the pool for `T`
    pub fn add<T: 'static>(&mut self, value: T) -> Handle {
        self.pool_mut::<T>()
            .map_or(Handle::INVALID, |pool| pool.insert(value))
    }

    /// Pre-allocate `additional` slots for `T`
    pub fn reserve<T: 'static>(&mut self, additional: usize) {
        if let Some(pool) = self.pool_mut::<T>() {
            pool.reserve(additional);
        }
    }

    /// Typed lookup; empty for stale handles and handles of another type
    pub fn get<T: 'static>(&self, handle: Handle) -> Option<&T> {
        if !handle.is_type::<T>() {
            return None;
        }
        self.typed::<T>()?.get(handle)
    }

    /// Typed mutable lookup; empty for stale handles and handles of another type
    pub fn get_mut<T: 'static>(&mut self, handle: Handle) -> Option<&mut T> {
        if !handle.is_type::<T>() {
            return None;
        }
        self.typed_mut::<T>()?.get_mut(handle)
    }

    /// True if `handle` refers to a live value of whatever type it is tagged with
    pub fn contains(&self, handle: Handle) -> bool {
        handle.is_valid()
            && self
                .pools
                .get(&handle.type_tag())
                .is_some_and(|pool| pool.contains(handle))
    }

    /// Remove the value behind `handle`, dispatching on its type tag
    ///
    /// No-op returning false for invalid, stale or unknown-type handles.
    pub fn remove(&mut self, handle: Handle) -> bool {
        if !handle.is_valid() {
            return false;
        }
        self.pools
            .get_mut(&handle.type_tag())
            .is_some_and(|pool| pool.remove(handle))
    }

    /// Typed removal returning the value
    pub fn take<T: 'static>(&mut self, handle: Handle) -> Option<T> {
        if !handle.is_type::<T>() {
            return None;
        }
        self.typed_mut::<T>()?.take(handle)
    }

    /// Schedule `handle` for removal at the next [`flush_removals`](Self::flush_removals)
    pub fn queue_remove(&mut self, handle: Handle) -> bool {
        if !handle.is_valid() {
            return false;
        }
        self.pools
            .get_mut(&handle.type_tag())
            .is_some_and(|pool| pool.queue_remove(handle))
    }

    /// Flush queued removals in every pool, returning how many values were removed
    pub fn flush_removals(&mut self) -> usize {
        self.pools.values_mut().map(|pool| pool.flush_removals()).sum()
    }

    /// True if any pool has queued removals
    pub fn has_pending_removals(&self) -> bool {
        self.pools.values().any(|pool| pool.has_pending_removals())
    }

    /// Number of live values of type `T`
    pub fn len<T: 'static>(&self) -> usize {
        self.typed::<T>().map_or(0, Pool::len)
    }

    /// Remove every value of type `T`
    pub fn clear<T: 'static>(&mut self) {
        if let Some(pool) = self.typed_mut::<T>() {
            pool.clear();
        }
    }

    /// Number of pools created so far
    pub fn pool_count(&self) -> usize {
        self.pools.len()
    }
}
