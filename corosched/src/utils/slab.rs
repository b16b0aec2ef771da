/// A key into a [`Slab`].
///
/// Keys carry the generation of the slot they were issued for, so a key
/// kept around after its value was removed never aliases a newer value
/// stored in the same slot.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub(crate) struct Key {
    index: usize,
    generation: u32,
}

enum Slot<T> {
    Occupied { generation: u32, value: T },
    Vacant { generation: u32 },
}

/// A generational slab allocator.
///
/// A `Slab` stores values of type `T` in a contiguous array and returns
/// [`Key`]s that stay valid until the value is removed. Freed slots are
/// reused; each reuse bumps the slot generation.
pub(crate) struct Slab<T> {
    /// Storage for items.
    slots: Vec<Slot<T>>,
    /// Stack of free indices that can be reused.
    free: Vec<usize>,
    /// Number of occupied slots.
    len: usize,
}

impl<T> Slab<T> {
    /// Creates a new `Slab` with `size` preallocated vacant slots.
    pub(crate) fn new(size: usize) -> Self {
        let slots = (0..size).map(|_| Slot::Vacant { generation: 0 }).collect();
        let free = (0..size).rev().collect();

        Self {
            slots,
            free,
            len: 0,
        }
    }

    /// Inserts a value and returns its key.
    ///
    /// If a free slot is available, it is reused. Otherwise, the slab
    /// grows exponentially.
    pub(crate) fn insert(&mut self, value: T) -> Key {
        let index = match self.free.pop() {
            Some(i) => i,
            None => {
                let len = self.slots.len();
                let new_len = if len == 0 { 1 } else { 2 * len };

                self.slots
                    .extend((len..new_len).map(|_| Slot::Vacant { generation: 0 }));
                self.free.extend(((len + 1)..new_len).rev());

                len
            }
        };

        let generation = match self.slots[index] {
            Slot::Vacant { generation } => generation,
            Slot::Occupied { .. } => unreachable!("free list points at an occupied slot"),
        };

        self.slots[index] = Slot::Occupied { generation, value };
        self.len += 1;

        Key { index, generation }
    }

    /// Removes and returns the value stored under `key`.
    ///
    /// Returns `None` if the key is stale or was never issued.
    pub(crate) fn remove(&mut self, key: Key) -> Option<T> {
        match self.slots.get(key.index) {
            Some(Slot::Occupied { generation, .. }) if *generation == key.generation => {}
            _ => return None,
        }

        let next = Slot::Vacant {
            generation: key.generation.wrapping_add(1),
        };

        match std::mem::replace(&mut self.slots[key.index], next) {
            Slot::Occupied { value, .. } => {
                self.free.push(key.index);
                self.len -= 1;
                Some(value)
            }
            Slot::Vacant { .. } => None,
        }
    }

    /// Returns a reference to the value stored under `key`.
    pub(crate) fn get(&self, key: Key) -> Option<&T> {
        match self.slots.get(key.index) {
            Some(Slot::Occupied { generation, value }) if *generation == key.generation => {
                Some(value)
            }
            _ => None,
        }
    }

    /// Returns a mutable reference to the value stored under `key`.
    pub(crate) fn get_mut(&mut self, key: Key) -> Option<&mut T> {
        match self.slots.get_mut(key.index) {
            Some(Slot::Occupied { generation, value }) if *generation == key.generation => {
                Some(value)
            }
            _ => None,
        }
    }

    /// Returns the number of stored values.
    pub(crate) fn len(&self) -> usize {
        self.len
    }
}
