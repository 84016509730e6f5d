//! # jasset-pool
//!
//! Fixed-chunk slot pool used underneath every jasset container.
//!
//! Objects live in 64-slot chunks. Each chunk tracks occupancy with a single
//! `u64` bitmask, so finding a free slot is one `trailing_zeros` on the
//! inverted mask. The pool grows by appending chunks and never moves a live
//! object: an address taken from [`PoolAllocator::get`] stays valid until
//! that object is deallocated.
//!
//! ## Handles
//!
//! ```text
//! flat index = chunk * 64 + slot
//! PoolKey    = { index, generation }
//! ```
//!
//! Every slot has a generation counter that is bumped when the slot is
//! freed, so a [`PoolKey`] kept past deallocation is rejected instead of
//! silently aliasing whatever reused the slot.

use tracing::{debug, trace};

/// Number of slots in one chunk (one bit per slot in the usage mask).
pub const CHUNK_SLOTS: usize = 64;

/// Largest number of slots a pool will ever hand out.
///
/// Flat indices must fit in 31 bits and the all-ones pattern is reserved as
/// a null handle by callers.
pub const MAX_SLOTS: usize = (1 << 31) - 1;

/// Generation-checked handle to a pooled object
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PoolKey {
    index: u32,
    generation: u32,
}

impl PoolKey {
    /// Rebuild a key from its raw parts.
    pub const fn from_parts(index: u32, generation: u32) -> Self {
        Self { index, generation }
    }

    /// Flat slot index (`chunk * 64 + slot`)
    #[inline]
    pub fn index(&self) -> u32 {
        self.index
    }

    /// Generation the slot had when this key was issued
    #[inline]
    pub fn generation(&self) -> u32 {
        self.generation
    }

    #[inline]
    fn chunk(&self) -> usize {
        self.index as usize / CHUNK_SLOTS
    }

    #[inline]
    fn slot(&self) -> usize {
        self.index as usize % CHUNK_SLOTS
    }
}

/// One fixed block of 64 slots plus its usage mask.
///
/// A slot holds a live value iff its bit in `mask` is set.
pub struct PoolChunk<T> {
    mask: u64,
    slots: [Option<T>; CHUNK_SLOTS],
}

impl<T> PoolChunk<T> {
    fn new() -> Box<Self> {
        Box::new(Self {
            mask: 0,
            slots: std::array::from_fn(|_| None),
        })
    }

    /// First free slot, if any
    #[inline]
    pub fn first_free(&self) -> Option<usize> {
        let free = !self.mask;
        if free == 0 {
            None
        } else {
            Some(free.trailing_zeros() as usize)
        }
    }

    /// Number of live slots
    #[inline]
    pub fn used(&self) -> usize {
        self.mask.count_ones() as usize
    }

    #[inline]
    pub fn is_full(&self) -> bool {
        self.mask == u64::MAX
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.mask == 0
    }

    #[inline]
    fn is_set(&self, slot: usize) -> bool {
        self.mask & (1u64 << slot) != 0
    }

    fn put(&mut self, slot: usize, value: T) {
        debug_assert!(!self.is_set(slot), "slot {slot} already in use");
        self.slots[slot] = Some(value);
        self.mask |= 1u64 << slot;
    }

    fn take(&mut self, slot: usize) -> Option<T> {
        if !self.is_set(slot) {
            return None;
        }
        self.mask &= !(1u64 << slot);
        self.slots[slot].take()
    }
}

/// Chunked free-list allocator handing out stable object slots.
///
/// Trimmed chunks leave a hole in the chunk table so that the flat indices
/// of objects in later chunks never change. Holes are refilled before the
/// table is extended.
pub struct PoolAllocator<T> {
    chunks: Vec<Option<Box<PoolChunk<T>>>>,
    generations: Vec<u32>,
    len: usize,
}

impl<T> Default for PoolAllocator<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> PoolAllocator<T> {
    /// Create an empty pool. No chunk is allocated until first use.
    pub fn new() -> Self {
        Self {
            chunks: Vec::new(),
            generations: Vec::new(),
            len: 0,
        }
    }

    /// Create a pool with room for at least `n` objects.
    pub fn with_capacity(n: usize) -> Self {
        let mut pool = Self::new();
        pool.reserve(n);
        pool
    }

    /// Number of live objects
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Total number of slots in allocated chunks
    pub fn capacity(&self) -> usize {
        self.chunk_count() * CHUNK_SLOTS
    }

    /// Number of chunks currently holding memory
    pub fn chunk_count(&self) -> usize {
        self.chunks.iter().filter(|c| c.is_some()).count()
    }

    /// Place `value` into the first free slot, growing by one chunk if every
    /// chunk is full.
    ///
    /// Returns `None` only when the 31-bit index space is exhausted.
    pub fn allocate_with(&mut self, value: T) -> Option<PoolKey> {
        let chunk_idx = match self.find_chunk_with_room() {
            Some(idx) => idx,
            None => self.grow()?,
        };

        let chunk = self.chunks[chunk_idx].as_mut()?;
        let slot = chunk.first_free()?;
        let index = chunk_idx * CHUNK_SLOTS + slot;
        if index >= MAX_SLOTS {
            return None;
        }
        chunk.put(slot, value);
        self.len += 1;

        trace!(index, "pool slot allocated");
        Some(PoolKey {
            index: index as u32,
            generation: self.generations[index],
        })
    }

    /// Place a default-constructed value into the first free slot.
    pub fn allocate(&mut self) -> Option<PoolKey>
    where
        T: Default,
    {
        self.allocate_with(T::default())
    }

    /// Free the slot `key` refers to, returning its value.
    ///
    /// Stale keys (slot already freed or reused) return `None`.
    pub fn deallocate(&mut self, key: PoolKey) -> Option<T> {
        if !self.contains(key) {
            return None;
        }
        let value = self.chunks[key.chunk()].as_mut()?.take(key.slot())?;
        let generation = &mut self.generations[key.index as usize];
        *generation = generation.wrapping_add(1);
        self.len -= 1;
        Some(value)
    }

    /// Free the object living at `ptr`.
    ///
    /// Scans the chunks for the slot owning that address. Returns false when
    /// the pointer does not belong to this pool.
    pub fn deallocate_ptr(&mut self, ptr: *const T) -> bool {
        match self.key_of_ptr(ptr) {
            Some(key) => self.deallocate(key).is_some(),
            None => false,
        }
    }

    /// Handle for the live object stored at `ptr`, if it is owned by this pool.
    pub fn key_of_ptr(&self, ptr: *const T) -> Option<PoolKey> {
        for (chunk_idx, chunk) in self.chunks.iter().enumerate() {
            let Some(chunk) = chunk else { continue };
            for (slot, value) in chunk.slots.iter().enumerate() {
                if value.as_ref().is_some_and(|v| std::ptr::eq(v, ptr)) {
                    let index = chunk_idx * CHUNK_SLOTS + slot;
                    return Some(PoolKey {
                        index: index as u32,
                        generation: self.generations[index],
                    });
                }
            }
        }
        None
    }

    /// Whether `key` still refers to a live object
    pub fn contains(&self, key: PoolKey) -> bool {
        let index = key.index as usize;
        index < self.generations.len()
            && self.generations[index] == key.generation
            && self
                .chunks
                .get(key.chunk())
                .and_then(|c| c.as_ref())
                .is_some_and(|c| c.is_set(key.slot()))
    }

    pub fn get(&self, key: PoolKey) -> Option<&T> {
        if !self.contains(key) {
            return None;
        }
        self.chunks[key.chunk()].as_ref()?.slots[key.slot()].as_ref()
    }

    pub fn get_mut(&mut self, key: PoolKey) -> Option<&mut T> {
        if !self.contains(key) {
            return None;
        }
        self.chunks[key.chunk()].as_mut()?.slots[key.slot()].as_mut()
    }

    /// Current key for a flat index, if that slot is live.
    pub fn key_at(&self, index: u32) -> Option<PoolKey> {
        let key = PoolKey {
            index,
            generation: *self.generations.get(index as usize)?,
        };
        self.contains(key).then_some(key)
    }

    /// Live object at a flat index, whatever its generation
    pub fn get_by_index(&self, index: u32) -> Option<&T> {
        self.key_at(index).and_then(|key| self.get(key))
    }

    /// Ensure at least `n` free slots exist without further growth.
    pub fn reserve(&mut self, n: usize) {
        let free = self.capacity() - self.len;
        if free >= n {
            return;
        }
        let needed = (n - free).div_ceil(CHUNK_SLOTS);
        for _ in 0..needed {
            if self.grow().is_none() {
                break;
            }
        }
    }

    /// Release every chunk that holds no live object.
    ///
    /// Returns the number of chunks released.
    pub fn trim(&mut self) -> usize {
        let mut released = 0;
        for chunk in self.chunks.iter_mut() {
            if chunk.as_ref().is_some_and(|c| c.is_empty()) {
                *chunk = None;
                released += 1;
            }
        }
        // Trailing holes can go entirely; their generations must stay so
        // old keys keep failing if the table grows back over them.
        while matches!(self.chunks.last(), Some(None)) {
            self.chunks.pop();
        }
        if released > 0 {
            debug!(released, "pool trimmed");
        }
        released
    }

    /// Drop every live object. With `full`, chunk memory is released too.
    pub fn clear(&mut self, full: bool) {
        for (chunk_idx, chunk) in self.chunks.iter_mut().enumerate() {
            let Some(chunk) = chunk else { continue };
            for slot in 0..CHUNK_SLOTS {
                if chunk.take(slot).is_some() {
                    let generation = &mut self.generations[chunk_idx * CHUNK_SLOTS + slot];
                    *generation = generation.wrapping_add(1);
                }
            }
        }
        if full {
            self.chunks.clear();
        }
        self.len = 0;
    }

    /// Iterate live objects with their keys, in slot order.
    pub fn iter(&self) -> impl Iterator<Item = (PoolKey, &T)> + '_ {
        self.chunks
            .iter()
            .enumerate()
            .filter_map(|(ci, c)| c.as_ref().map(|c| (ci, c)))
            .flat_map(move |(ci, chunk)| {
                chunk.slots.iter().enumerate().filter_map(move |(si, v)| {
                    let index = ci * CHUNK_SLOTS + si;
                    v.as_ref().map(|v| {
                        (
                            PoolKey {
                                index: index as u32,
                                generation: self.generations[index],
                            },
                            v,
                        )
                    })
                })
            })
    }

    fn find_chunk_with_room(&self) -> Option<usize> {
        self.chunks
            .iter()
            .position(|c| c.as_ref().is_some_and(|c| !c.is_full()))
    }

    /// Add one chunk, refilling a trimmed hole first. Returns its position.
    fn grow(&mut self) -> Option<usize> {
        if let Some(hole) = self.chunks.iter().position(|c| c.is_none()) {
            self.chunks[hole] = Some(PoolChunk::new());
            return Some(hole);
        }
        let idx = self.chunks.len();
        if idx * CHUNK_SLOTS >= MAX_SLOTS {
            return None;
        }
        self.chunks.push(Some(PoolChunk::new()));
        let wanted = (idx + 1) * CHUNK_SLOTS;
        if self.generations.len() < wanted {
            self.generations.resize(wanted, 0);
        }
        trace!(chunk = idx, "pool grew");
        Some(idx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allocate_deallocate_roundtrip() {
        let mut pool: PoolAllocator<u32> = PoolAllocator::new();
        let a = pool.allocate_with(1).unwrap();
        let before = pool.len();

        let b = pool.allocate_with(2).unwrap();
        assert_eq!(pool.deallocate(b), Some(2));
        assert_eq!(pool.len(), before);

        // Freed slot is the first free one again
        let c = pool.allocate_with(3).unwrap();
        assert_eq!(c.index(), b.index());
        assert_eq!(pool.get(a), Some(&1));
    }

    #[test]
    fn test_stale_key_rejected() {
        let mut pool: PoolAllocator<String> = PoolAllocator::new();
        let old = pool.allocate_with("old".to_string()).unwrap();
        pool.deallocate(old);
        let new = pool.allocate_with("new".to_string()).unwrap();

        assert_eq!(old.index(), new.index());
        assert!(pool.get(old).is_none());
        assert!(pool.deallocate(old).is_none());
        assert_eq!(pool.get(new).map(String::as_str), Some("new"));
    }

    #[test]
    fn test_address_stable_across_growth() {
        let mut pool: PoolAllocator<u64> = PoolAllocator::new();
        let first = pool.allocate_with(42).unwrap();
        let addr = pool.get(first).unwrap() as *const u64;

        for i in 0..1000 {
            pool.allocate_with(i).unwrap();
        }
        assert!(pool.chunk_count() > 1);
        assert_eq!(pool.get(first).unwrap() as *const u64, addr);
    }

    #[test]
    fn test_grows_by_whole_chunks() {
        let mut pool: PoolAllocator<u8> = PoolAllocator::new();
        for _ in 0..CHUNK_SLOTS {
            pool.allocate().unwrap();
        }
        assert_eq!(pool.chunk_count(), 1);
        pool.allocate().unwrap();
        assert_eq!(pool.chunk_count(), 2);
        assert_eq!(pool.capacity(), 2 * CHUNK_SLOTS);
    }

    #[test]
    fn test_deallocate_ptr() {
        let mut pool: PoolAllocator<i32> = PoolAllocator::new();
        let key = pool.allocate_with(7).unwrap();
        let ptr = pool.get(key).unwrap() as *const i32;

        let foreign = 7i32;
        assert!(!pool.deallocate_ptr(&foreign as *const i32));
        assert!(pool.deallocate_ptr(ptr));
        assert!(pool.is_empty());
        assert!(!pool.deallocate_ptr(ptr));
    }

    #[test]
    fn test_reserve() {
        let mut pool: PoolAllocator<u8> = PoolAllocator::new();
        pool.reserve(130);
        assert_eq!(pool.chunk_count(), 3);
        for _ in 0..130 {
            pool.allocate().unwrap();
        }
        assert_eq!(pool.chunk_count(), 3);
    }

    #[test]
    fn test_trim_keeps_live_slots() {
        let mut pool: PoolAllocator<u32> = PoolAllocator::new();
        let keys: Vec<_> = (0..3 * CHUNK_SLOTS as u32)
            .map(|i| pool.allocate_with(i).unwrap())
            .collect();

        // Empty the second chunk only
        for key in &keys[CHUNK_SLOTS..2 * CHUNK_SLOTS] {
            pool.deallocate(*key);
        }
        let survivor = keys[150];
        let addr = pool.get(survivor).unwrap() as *const u32;

        assert_eq!(pool.trim(), 1);
        assert_eq!(pool.chunk_count(), 2);
        assert_eq!(pool.get(survivor).unwrap() as *const u32, addr);
        assert_eq!(pool.get(survivor), Some(&150));

        // The hole is refilled before the table grows
        let refill = pool.allocate_with(999).unwrap();
        assert_eq!(refill.index() as usize / CHUNK_SLOTS, 1);
        assert!(pool.get(keys[CHUNK_SLOTS]).is_none());
    }

    #[test]
    fn test_clear() {
        let mut pool: PoolAllocator<String> = PoolAllocator::new();
        let key = pool.allocate_with("x".into()).unwrap();
        pool.allocate_with("y".into()).unwrap();

        pool.clear(false);
        assert!(pool.is_empty());
        assert_eq!(pool.chunk_count(), 1);
        assert!(pool.get(key).is_none());

        pool.clear(true);
        assert_eq!(pool.chunk_count(), 0);
    }

    #[test]
    fn test_iter_and_key_at() {
        let mut pool: PoolAllocator<u32> = PoolAllocator::new();
        let a = pool.allocate_with(10).unwrap();
        let b = pool.allocate_with(20).unwrap();
        pool.deallocate(a);

        let live: Vec<_> = pool.iter().map(|(k, v)| (k, *v)).collect();
        assert_eq!(live, vec![(b, 20)]);
        assert_eq!(pool.key_at(b.index()), Some(b));
        assert_eq!(pool.key_at(a.index()), None);
        assert_eq!(pool.get_by_index(b.index()), Some(&20));
        assert_eq!(pool.get_by_index(a.index()), None);
    }
}
