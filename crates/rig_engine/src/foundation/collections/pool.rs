//! Generational slot pool
//!
//! [`Pool<T>`] owns values of one type and hands out [`Handle`]s to them. A slot's
//! generation is bumped every time its value is removed, so handles issued before the
//! removal stop resolving even after the index is reused.
//!
//! Every operation accepts arbitrary handles, including stale, foreign or never-issued
//! ones, and reports them as "not found" instead of panicking.

use super::handle::Handle;
use super::type_id::{type_id, TypeTag, NO_TYPE};

#[derive(Debug)]
struct Slot<T> {
    value: Option<T>,
    generation: u16,
}

/// Generational slot array owning values of type `T`
#[derive(Debug)]
pub struct Pool<T: 'static> {
    slots: Vec<Slot<T>>,
    free_indices: Vec<u32>,
    pending_removals: Vec<Handle>,
    live: usize,
    type_tag: TypeTag,
}

impl<T: 'static> Pool<T> {
    /// Create an empty pool
    pub fn new() -> Self {
        Self {
            slots: Vec::new(),
            free_indices: Vec::new(),
            pending_removals: Vec::new(),
            live: 0,
            type_tag: type_id::<T>(),
        }
    }

    /// Create a pool with `capacity` pre-allocated free slots
    pub fn with_capacity(capacity: usize) -> Self {
        let mut pool = Self::new();
        pool.reserve(capacity);
        pool
    }

    /// Pre-allocate `additional` empty slots
    ///
    /// Previously freed slots are still reused first; the reserved ones are then handed out
    /// lowest index first.
    pub fn reserve(&mut self, additional: usize) {
        let start = self.slots.len();
        let end = start.saturating_add(additional).min(u32::MAX as usize);
        if end <= start {
            return;
        }

        self.slots.reserve(end - start);
        let mut free = Vec::with_capacity(self.free_indices.len() + (end - start));
        for index in (start..end).rev() {
            self.slots.push(Slot {
                value: None,
                generation: 0,
            });
            free.push(index as u32);
        }
        free.append(&mut self.free_indices);
        self.free_indices = free;

        log::debug!(
            "Reserved {} slots in pool of {} (capacity {})",
            end - start,
            std::any::type_name::<T>(),
            self.slots.len()
        );
    }

    /// Type tag every handle from this pool carries
    pub fn type_tag(&self) -> TypeTag {
        self.type_tag
    }

    /// Insert a value and return a handle to it
    ///
    /// Reuses the most recently freed slot if there is one, otherwise appends a new slot at
    /// generation 0. Returns [`Handle::INVALID`] (dropping the value) only when the type
    /// tag or index space is exhausted.
    pub fn insert(&mut self, value: T) -> Handle {
        if self.type_tag == NO_TYPE {
            log::error!("Pool of {} has no type tag, insert rejected", std::any::type_name::<T>());
            return Handle::INVALID;
        }

        let index = if let Some(index) = self.free_indices.pop() {
            self.slots[index as usize].value = Some(value);
            index
        } else {
            if self.slots.len() >= u32::MAX as usize {
                log::error!("Pool of {} is out of indices", std::any::type_name::<T>());
                return Handle::INVALID;
            }
            let index = self.slots.len() as u32;
            self.slots.push(Slot {
                value: Some(value),
                generation: 0,
            });
            index
        };

        self.live += 1;
        Handle::from_parts(index, self.slots[index as usize].generation, self.type_tag)
    }

    fn slot_index(&self, handle: Handle) -> Option<usize> {
        if !handle.is_valid() || handle.type_tag() != self.type_tag {
            return None;
        }
        let index = handle.index() as usize;
        let slot = self.slots.get(index)?;
        (slot.generation == handle.generation() && slot.value.is_some()).then_some(index)
    }

    /// Get the value behind `handle`, if it is still live
    pub fn get(&self, handle: Handle) -> Option<&T> {
        let index = self.slot_index(handle)?;
        self.slots[index].value.as_ref()
    }

    /// Get mutable access to the value behind `handle`, if it is still live
    pub fn get_mut(&mut self, handle: Handle) -> Option<&mut T> {
        let index = self.slot_index(handle)?;
        self.slots[index].value.as_mut()
    }

    /// True if `handle` refers to a live value in this pool
    #[doc(alias = "is_valid")]
    pub fn contains(&self, handle: Handle) -> bool {
        self.slot_index(handle).is_some()
    }

    /// Remove the value behind `handle` and return it
    pub fn take(&mut self, handle: Handle) -> Option<T> {
        let index = self.slot_index(handle)?;
        let slot = &mut self.slots[index];
        let value = slot.value.take();
        slot.generation = slot.generation.wrapping_add(1);
        self.free_indices.push(index as u32);
        self.live -= 1;
        value
    }

    /// Remove the value behind `handle`
    ///
    /// Returns false (and does nothing) if the handle is already stale.
    pub fn remove(&mut self, handle: Handle) -> bool {
        self.take(handle).is_some()
    }

    /// Schedule `handle` for removal at the next [`flush_removals`](Self::flush_removals)
    ///
    /// Used for values the GPU may still be reading this frame. Only live handles are
    /// queued and each at most once.
    pub fn queue_remove(&mut self, handle: Handle) -> bool {
        if !self.contains(handle) || self.pending_removals.contains(&handle) {
            return false;
        }
        self.pending_removals.push(handle);
        true
    }

    /// Handles waiting for [`flush_removals`](Self::flush_removals)
    pub fn pending_removals(&self) -> &[Handle] {
        &self.pending_removals
    }

    /// True if any removal is queued
    pub fn has_pending_removals(&self) -> bool {
        !self.pending_removals.is_empty()
    }

    /// Remove every queued handle, returning how many values were actually removed
    pub fn flush_removals(&mut self) -> usize {
        let pending = std::mem::take(&mut self.pending_removals);
        pending.into_iter().filter(|&handle| self.remove(handle)).count()
    }

    /// Remove every value
    ///
    /// Slots are kept and their generations bumped, so handles issued before the clear
    /// never become valid again.
    pub fn clear(&mut self) {
        for (index, slot) in self.slots.iter_mut().enumerate() {
            if slot.value.take().is_some() {
                slot.generation = slot.generation.wrapping_add(1);
                self.free_indices.push(index as u32);
            }
        }
        self.pending_removals.clear();
        self.live = 0;
    }

    /// Handle for the live value stored at `index`, or [`Handle::INVALID`]
    pub fn handle_at(&self, index: u32) -> Handle {
        match self.slots.get(index as usize) {
            Some(slot) if slot.value.is_some() => {
                Handle::from_parts(index, slot.generation, self.type_tag)
            }
            _ => Handle::INVALID,
        }
    }

    /// Number of live values
    pub fn len(&self) -> usize {
        self.live
    }

    /// True if no value is live
    pub fn is_empty(&self) -> bool {
        self.live == 0
    }

    /// Number of slots, live or free
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Iterate over live values with their handles
    pub fn iter(&self) -> impl Iterator<Item = (Handle, &T)> + '_ {
        let type_tag = self.type_tag;
        self.slots.iter().enumerate().filter_map(move |(index, slot)| {
            slot.value
                .as_ref()
                .map(|value| (Handle::from_parts(index as u32, slot.generation, type_tag), value))
        })
    }

    /// Iterate mutably over live values with their handles
    pub fn iter_mut(&mut self) -> impl Iterator<Item = (Handle, &mut T)> + '_ {
        let type_tag = self.type_tag;
        self.slots.iter_mut().enumerate().filter_map(move |(index, slot)| {
            let generation = slot.generation;
            slot.value
                .as_mut()
                .map(|value| (Handle::from_parts(index as u32, generation, type_tag), value))
        })
    }
}

impl<T: 'static> Default for Pool<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::rc::Rc;

    #[test]
    fn test_insert_then_get() {
        let mut pool = Pool::new();
        let handle = pool.insert(42_u32);

        assert!(handle.is_valid());
        assert_eq!(pool.get(handle), Some(&42));
        assert_eq!(pool.len(), 1);
    }

    #[test]
    fn test_removed_handle_stays_stale_after_reuse() {
        let mut pool = Pool::new();
        let first = pool.insert(String::from("first"));

        assert!(pool.remove(first));
        assert!(!pool.contains(first));

        let second = pool.insert(String::from("second"));

        // LIFO reuse of the freed index with an advanced generation
        assert_eq!(second.index(), first.index());
        assert_ne!(second.generation(), first.generation());
        assert_eq!(pool.get(first), None);
        assert_eq!(pool.get(second).map(String::as_str), Some("second"));
    }

    #[test]
    fn test_remove_stale_handle_is_noop() {
        let mut pool = Pool::new();
        let handle = pool.insert(1_i32);

        assert!(pool.remove(handle));
        assert!(!pool.remove(handle));
        assert_eq!(pool.len(), 0);
    }

    #[test]
    fn test_free_list_is_lifo() {
        let mut pool = Pool::new();
        let a = pool.insert(1_u8);
        let b = pool.insert(2_u8);
        let _c = pool.insert(3_u8);

        pool.remove(a);
        pool.remove(b);

        assert_eq!(pool.insert(4_u8).index(), b.index());
        assert_eq!(pool.insert(5_u8).index(), a.index());
        assert_eq!(pool.capacity(), 3);
    }

    #[test]
    fn test_distinct_handles_distinct_storage() {
        let mut pool = Pool::new();
        let a = pool.insert(7_u64);
        let b = pool.insert(7_u64);

        let pa = pool.get(a).map(|value| value as *const u64);
        let pb = pool.get(b).map(|value| value as *const u64);

        assert!(pa.is_some());
        assert_ne!(pa, pb);
    }

    #[test]
    fn test_arbitrary_handles_never_panic() {
        let mut pool: Pool<f32> = Pool::new();
        pool.insert(1.0);

        let out_of_bounds = Handle::from_parts(999, 0, pool.type_tag());
        let wrong_generation = Handle::from_parts(0, 3, pool.type_tag());
        let wrong_type = Handle::make::<u8>(0, 0);

        for handle in [Handle::INVALID, out_of_bounds, wrong_generation, wrong_type] {
            assert!(pool.get(handle).is_none());
            assert!(pool.get_mut(handle).is_none());
            assert!(!pool.remove(handle));
        }
        assert_eq!(pool.len(), 1);
    }

    #[test]
    fn test_generation_wraps() {
        let mut pool = Pool::new();
        let mut handle = pool.insert(0_u32);
        for i in 1..=u32::from(u16::MAX) + 2 {
            pool.remove(handle);
            handle = pool.insert(i);
        }

        assert_eq!(pool.capacity(), 1);
        assert_eq!(handle.generation(), 1);
        assert!(pool.contains(handle));
    }

    #[test]
    fn test_reserve_hands_out_lowest_index_first() {
        let mut pool = Pool::with_capacity(4);

        assert_eq!(pool.capacity(), 4);
        assert!(pool.is_empty());
        assert_eq!(pool.insert('a').index(), 0);
        assert_eq!(pool.insert('b').index(), 1);
    }

    #[test]
    fn test_reserve_keeps_freed_slots_first() {
        let mut pool = Pool::new();
        let a = pool.insert('a');
        pool.insert('b');
        pool.remove(a);
        pool.reserve(2);

        assert_eq!(pool.insert('c').index(), a.index());
        assert_eq!(pool.insert('d').index(), 2);
    }

    #[test]
    fn test_queued_removal() {
        let mut pool = Pool::new();
        let a = pool.insert(1_i32);
        let b = pool.insert(2_i32);

        assert!(pool.queue_remove(a));
        assert!(!pool.queue_remove(a));
        assert!(pool.contains(a));
        assert!(pool.has_pending_removals());

        // Removed directly before the flush; the flush skips it
        pool.queue_remove(b);
        pool.remove(b);

        assert_eq!(pool.flush_removals(), 1);
        assert!(!pool.contains(a));
        assert!(!pool.has_pending_removals());
    }

    #[test]
    fn test_clear_invalidates_outstanding_handles() {
        let mut pool = Pool::new();
        let a = pool.insert(10_u16);
        let b = pool.insert(20_u16);
        pool.clear();

        assert!(pool.is_empty());
        let c = pool.insert(30_u16);
        let d = pool.insert(40_u16);

        assert!(!pool.contains(a));
        assert!(!pool.contains(b));
        assert!(pool.contains(c));
        assert!(pool.contains(d));
    }

    #[test]
    fn test_handle_at_and_iter() {
        let mut pool = Pool::new();
        let a = pool.insert(1_u32);
        let b = pool.insert(2_u32);
        pool.remove(a);

        assert_eq!(pool.handle_at(b.index()), b);
        assert_eq!(pool.handle_at(a.index()), Handle::INVALID);
        assert_eq!(pool.handle_at(99), Handle::INVALID);

        let live: Vec<_> = pool.iter().collect();
        assert_eq!(live, vec![(b, &2)]);

        for (_, value) in pool.iter_mut() {
            *value *= 10;
        }
        assert_eq!(pool.get(b), Some(&20));
    }

    #[test]
    fn test_dropping_pool_drops_values() {
        let shared = Rc::new(());
        let mut pool = Pool::new();
        pool.insert(Rc::clone(&shared));
        let removed = pool.insert(Rc::clone(&shared));
        pool.remove(removed);

        assert_eq!(Rc::strong_count(&shared), 2);
        drop(pool);
        assert_eq!(Rc::strong_count(&shared), 1);
    }
}
