use std::ops::Index;
use std::ops::IndexMut;

/// A slot of the pool, either holding a value or linking to the next free slot.
#[derive(Debug)]
enum Slot<T> {
    Occupied(T),
    Free(Option<usize>),
}

/// An arena of fixed-size records that recycles freed slots.
///
/// Handles are indices into the backing vector, so they stay valid when the
/// vector grows. Freed slots form an intrusive free list that is threaded
/// through the slots themselves, which makes both `allocate` and `deallocate`
/// O(1).
#[derive(Debug)]
pub struct Pool<T> {
    slots: Vec<Slot<T>>,
    first_free: Option<usize>,
    len: usize,
}

impl<T> Default for Pool<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Pool<T> {
    pub fn new() -> Self {
        Self {
            slots: Vec::new(),
            first_free: None,
            len: 0,
        }
    }

    /// Stores the value in a free slot, or in a newly appended one, and returns its handle.
    pub fn allocate(&mut self, value: T) -> usize {
        self.len += 1;

        match self.first_free {
            Some(index) => {
                let next = match &self.slots[index] {
                    Slot::Free(next) => *next,
                    Slot::Occupied(_) => panic!("Slot {index} on the free list is occupied"),
                };
                self.first_free = next;
                self.slots[index] = Slot::Occupied(value);
                index
            }
            None => {
                self.slots.push(Slot::Occupied(value));
                self.slots.len() - 1
            }
        }
    }

    /// Returns the value stored at the handle and puts its slot on the free list.
    pub fn deallocate(&mut self, index: usize) -> T {
        let slot = std::mem::replace(&mut self.slots[index], Slot::Free(self.first_free));
        match slot {
            Slot::Occupied(value) => {
                self.first_free = Some(index);
                self.len -= 1;
                value
            }
            Slot::Free(next) => {
                // Restore the free list before reporting the double free.
                self.slots[index] = Slot::Free(next);
                panic!("Slot {index} was deallocated twice");
            }
        }
    }

    pub fn get(&self, index: usize) -> Option<&T> {
        match self.slots.get(index) {
            Some(Slot::Occupied(value)) => Some(value),
            _ => None,
        }
    }

    pub fn get_mut(&mut self, index: usize) -> Option<&mut T> {
        match self.slots.get_mut(index) {
            Some(Slot::Occupied(value)) => Some(value),
            _ => None,
        }
    }

    /// Returns the number of allocated values.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Returns the number of slots, which is the largest number of values that were alive at once.
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Iterates over the handles and values of all allocated slots.
    pub fn iter(&self) -> impl Iterator<Item = (usize, &T)> {
        self.slots.iter().enumerate().filter_map(|(index, slot)| match slot {
            Slot::Occupied(value) => Some((index, value)),
            Slot::Free(_) => None,
        })
    }
}

impl<T> Index<usize> for Pool<T> {
    type Output = T;

    fn index(&self, index: usize) -> &T {
        self.get(index)
            .unwrap_or_else(|| panic!("Slot {index} of the pool is not allocated"))
    }
}

impl<T> IndexMut<usize> for Pool<T> {
    fn index_mut(&mut self, index: usize) -> &mut T {
        self.get_mut(index)
            .unwrap_or_else(|| panic!("Slot {index} of the pool is not allocated"))
    }
}
