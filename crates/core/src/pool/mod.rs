//! Handle-based slot allocation.
//!
//! [`SlotPool`] hands out [`SlotRef`]s: an index plus the generation the slot
//! had when it was allocated. Every lookup revalidates the pair, so a ref to
//! a destroyed slot stays harmless even after the index has been reused.
//! Per-slot data lives in storage owned by the caller and indexed by
//! [`SlotRef::index`]; [`SlotVec`] bundles the two for the common case.

use std::{cmp::Reverse, collections::BinaryHeap, fmt, mem};

/// Weak reference to a pool slot.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct SlotRef {
    index: u32,
    generation: u32,
}

impl SlotRef {
    /// Reference that never matches a live slot.
    pub const NULL: SlotRef = SlotRef {
        index: u32::MAX,
        generation: u32::MAX,
    };

    pub const fn is_null(self) -> bool {
        self.index == u32::MAX
    }

    /// Raw slot index. Only meaningful while the ref is in use.
    pub const fn index(self) -> usize {
        self.index as usize
    }

    pub const fn generation(self) -> u32 {
        self.generation
    }
}

impl Default for SlotRef {
    fn default() -> Self {
        Self::NULL
    }
}

impl fmt::Debug for SlotRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_null() {
            f.write_str("SlotRef(null)")
        } else {
            write!(f, "SlotRef({}v{})", self.index, self.generation)
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Slot {
    generation: u32,
    in_use: bool,
}

/// Reusable-slot allocator producing generation-checked references.
#[derive(Debug, Default, Clone)]
pub struct SlotPool {
    slots: Vec<Slot>,
    free: BinaryHeap<Reverse<u32>>,
    num_in_use: usize,
    capacity_limit: Option<usize>,
    // Starting generation for appended slots. Raised by clear_slots so refs
    // issued before a clear can't alias slots appended after it.
    generation_base: u32,
}

impl SlotPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a bounded pool: once `limit` slots exist and none are free,
    /// [`create_slot`](Self::create_slot) returns [`SlotRef::NULL`].
    pub fn with_capacity_limit(limit: usize) -> Self {
        Self {
            slots: Vec::with_capacity(limit),
            capacity_limit: Some(limit),
            ..Self::default()
        }
    }

    pub fn capacity_limit(&self) -> Option<usize> {
        self.capacity_limit
    }

    /// Storage size: the high-water mark of allocated slots, not the live count.
    pub fn num_slots(&self) -> usize {
        self.slots.len()
    }

    pub fn num_slots_in_use(&self) -> usize {
        self.num_in_use
    }

    /// Allocates a slot, reusing the lowest free index if there is one.
    /// O(log n) in the number of free slots, as is [`destroy_slot`](Self::destroy_slot).
    pub fn create_slot(&mut self) -> SlotRef {
        let index = match self.free.pop() {
            Some(Reverse(index)) => {
                let slot = &mut self.slots[index as usize];
                debug_assert!(!slot.in_use);
                slot.generation = slot.generation.wrapping_add(1);
                slot.in_use = true;
                index
            }
            None => {
                if self
                    .capacity_limit
                    .is_some_and(|limit| self.slots.len() >= limit)
                {
                    return SlotRef::NULL;
                }
                // Keep NULL's index out of reach.
                if self.slots.len() >= u32::MAX as usize {
                    return SlotRef::NULL;
                }
                self.slots.push(Slot {
                    generation: self.generation_base,
                    in_use: true,
                });
                (self.slots.len() - 1) as u32
            }
        };

        self.num_in_use += 1;
        SlotRef {
            index,
            generation: self.slots[index as usize].generation,
        }
    }

    /// Frees the slot behind `slot_ref`. Returns false, doing nothing, if the
    /// ref is null, stale, or already freed.
    pub fn destroy_slot(&mut self, slot_ref: SlotRef) -> bool {
        if !self.in_use(slot_ref) {
            return false;
        }

        self.slots[slot_ref.index()].in_use = false;
        self.free.push(Reverse(slot_ref.index));
        self.num_in_use -= 1;
        true
    }

    pub fn in_use(&self, slot_ref: SlotRef) -> bool {
        self.slots
            .get(slot_ref.index())
            .is_some_and(|slot| slot.in_use && slot.generation == slot_ref.generation)
    }

    pub fn index_in_use(&self, index: usize) -> bool {
        self.slots.get(index).is_some_and(|slot| slot.in_use)
    }

    /// Frees every slot at once. No per-slot notification is made, so callers
    /// must tear down whatever they keep in parallel storage themselves.
    pub fn clear_slots(&mut self) {
        let highest = self.slots.iter().map(|slot| slot.generation).max();
        if let Some(highest) = highest {
            self.generation_base = self.generation_base.max(highest.wrapping_add(1));
        }
        self.slots.clear();
        self.free.clear();
        self.num_in_use = 0;
    }

    /// Returns a ref carrying the current generation of `index`, or
    /// [`SlotRef::NULL`] if that slot is not in use.
    pub fn ref_from_index(&self, index: usize) -> SlotRef {
        match self.slots.get(index) {
            Some(slot) if slot.in_use => SlotRef {
                index: index as u32,
                generation: slot.generation,
            },
            _ => SlotRef::NULL,
        }
    }

    pub fn index_from_ref(&self, slot_ref: SlotRef) -> Option<usize> {
        self.in_use(slot_ref).then_some(slot_ref.index())
    }
}

/// A [`SlotPool`] with one value of `T` stored per slot.
#[derive(Debug, Clone)]
pub struct SlotVec<T> {
    pool: SlotPool,
    items: Vec<T>,
}

impl<T> Default for SlotVec<T> {
    fn default() -> Self {
        Self {
            pool: SlotPool::new(),
            items: Vec::new(),
        }
    }
}

impl<T: Default> SlotVec<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity_limit(limit: usize) -> Self {
        Self {
            pool: SlotPool::with_capacity_limit(limit),
            items: Vec::with_capacity(limit),
        }
    }

    /// Stores `value` in a fresh slot. Returns [`SlotRef::NULL`] (dropping the
    /// value) if the pool is bounded and full.
    pub fn insert(&mut self, value: T) -> SlotRef {
        let slot_ref = self.pool.create_slot();
        if slot_ref.is_null() {
            return slot_ref;
        }

        self.items.resize_with(self.pool.num_slots(), T::default);
        self.items[slot_ref.index()] = value;
        slot_ref
    }

    /// Frees the slot and hands back its value, leaving a default behind.
    pub fn remove(&mut self, slot_ref: SlotRef) -> Option<T> {
        if self.pool.destroy_slot(slot_ref) {
            Some(mem::take(&mut self.items[slot_ref.index()]))
        } else {
            None
        }
    }

    /// Empties the container, returning every live value.
    pub fn take_all(&mut self) -> Vec<T> {
        let live = self
            .items
            .iter_mut()
            .enumerate()
            .filter(|(index, _)| self.pool.index_in_use(*index))
            .map(|(_, item)| mem::take(item))
            .collect();

        self.clear();
        live
    }
}

impl<T> SlotVec<T> {
    pub fn contains(&self, slot_ref: SlotRef) -> bool {
        self.pool.in_use(slot_ref)
    }

    pub fn get(&self, slot_ref: SlotRef) -> Option<&T> {
        if self.pool.in_use(slot_ref) {
            self.items.get(slot_ref.index())
        } else {
            None
        }
    }

    pub fn get_mut(&mut self, slot_ref: SlotRef) -> Option<&mut T> {
        if self.pool.in_use(slot_ref) {
            self.items.get_mut(slot_ref.index())
        } else {
            None
        }
    }

    pub fn len(&self) -> usize {
        self.pool.num_slots_in_use()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drops every value and invalidates every ref handed out so far.
    pub fn clear(&mut self) {
        self.pool.clear_slots();
        self.items.clear();
    }

    pub fn iter(&self) -> impl Iterator<Item = (SlotRef, &T)> + '_ {
        self.items
            .iter()
            .enumerate()
            .filter_map(|(index, item)| {
                let slot_ref = self.pool.ref_from_index(index);
                (!slot_ref.is_null()).then_some((slot_ref, item))
            })
    }

    pub fn values_mut(&mut self) -> impl Iterator<Item = &mut T> + '_ {
        let pool = &self.pool;
        self.items
            .iter_mut()
            .enumerate()
            .filter(|(index, _)| pool.index_in_use(*index))
            .map(|(_, item)| item)
    }
}
