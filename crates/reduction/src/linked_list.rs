/// The intrusive part of an element that can be a member of one [LinkedList].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Link {
    prev: Option<usize>,
    next: Option<usize>,
}

/// Gives a [LinkedList] access to the links stored inside its elements.
pub trait LinkStorage {
    fn link(&self, index: usize) -> &Link;

    fn link_mut(&mut self, index: usize) -> &mut Link;
}

impl LinkStorage for Vec<Link> {
    fn link(&self, index: usize) -> &Link {
        &self[index]
    }

    fn link_mut(&mut self, index: usize) -> &mut Link {
        &mut self[index]
    }
}

/// A size-tracked doubly-linked list of element indices.
///
/// The elements live elsewhere, in a [LinkStorage], and every element stores
/// its own predecessor and successor. An element is a member of at most one
/// list per link, and all operations are preconditioned on that membership.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LinkedList {
    head: Option<usize>,
    tail: Option<usize>,
    len: usize,
}

impl LinkedList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn front(&self) -> Option<usize> {
        self.head
    }

    pub fn back(&self) -> Option<usize> {
        self.tail
    }

    /// Inserts the element at the front of the list.
    pub fn push_front(&mut self, storage: &mut impl LinkStorage, index: usize) {
        *storage.link_mut(index) = Link {
            prev: None,
            next: self.head,
        };

        match self.head {
            Some(head) => storage.link_mut(head).prev = Some(index),
            None => self.tail = Some(index),
        }

        self.head = Some(index);
        self.len += 1;
    }

    /// Inserts the element at the back of the list.
    pub fn push_back(&mut self, storage: &mut impl LinkStorage, index: usize) {
        *storage.link_mut(index) = Link {
            prev: self.tail,
            next: None,
        };

        match self.tail {
            Some(tail) => storage.link_mut(tail).next = Some(index),
            None => self.head = Some(index),
        }

        self.tail = Some(index);
        self.len += 1;
    }

    /// Unlinks the element, which must be a member of this list.
    pub fn remove(&mut self, storage: &mut impl LinkStorage, index: usize) {
        debug_assert!(self.len > 0, "Removing element {index} from an empty list");
        let Link { prev, next } = *storage.link(index);

        match prev {
            Some(prev) => storage.link_mut(prev).next = next,
            None => {
                debug_assert_eq!(self.head, Some(index), "Element {index} is not a member of this list");
                self.head = next;
            }
        }

        match next {
            Some(next) => storage.link_mut(next).prev = prev,
            None => {
                debug_assert_eq!(self.tail, Some(index), "Element {index} is not a member of this list");
                self.tail = prev;
            }
        }

        *storage.link_mut(index) = Link::default();
        self.len -= 1;
    }

    /// Moves the element from this list to the front of `other`.
    pub fn move_to(&mut self, other: &mut LinkedList, storage: &mut impl LinkStorage, index: usize) {
        self.remove(storage, index);
        other.push_front(storage, index);
    }

    /// Moves the element, a member of this list, to the front.
    pub fn move_to_front(&mut self, storage: &mut impl LinkStorage, index: usize) {
        if self.head != Some(index) {
            self.remove(storage, index);
            self.push_front(storage, index);
        }
    }

    /// Moves the element, a member of this list, to the back.
    pub fn move_to_back(&mut self, storage: &mut impl LinkStorage, index: usize) {
        if self.tail != Some(index) {
            self.remove(storage, index);
            self.push_back(storage, index);
        }
    }

    /// Exchanges the contents of both lists.
    pub fn swap(&mut self, other: &mut LinkedList) {
        std::mem::swap(self, other);
    }

    /// Returns the element following `index` in its list.
    pub fn next(storage: &impl LinkStorage, index: usize) -> Option<usize> {
        storage.link(index).next
    }

    /// Iterates over the elements from front to back.
    pub fn iter<'a, S: LinkStorage>(&self, storage: &'a S) -> LinkedListIter<'a, S> {
        LinkedListIter {
            storage,
            current: self.head,
        }
    }
}

pub struct LinkedListIter<'a, S> {
    storage: &'a S,
    current: Option<usize>,
}

impl<S: LinkStorage> Iterator for LinkedListIter<'_, S> {
    type Item = usize;

    fn next(&mut self) -> Option<usize> {
        let current = self.current?;
        self.current = self.storage.link(current).next;
        Some(current)
    }
}

#[cfg(test)]
mod tests {
    use test_log::test;

    use super::*;

    #[test]
    fn test_linked_list_operations() {
        let mut links = vec![Link::default(); 6];
        let mut list = LinkedList::new();

        for index in 0..4 {
            list.push_back(&mut links, index);
        }
        list.push_front(&mut links, 4);
        assert_eq!(list.iter(&links).collect::<Vec<_>>(), vec![4, 0, 1, 2, 3]);
        assert_eq!(list.len(), 5);

        list.remove(&mut links, 1);
        list.remove(&mut links, 4);
        list.remove(&mut links, 3);
        assert_eq!(list.iter(&links).collect::<Vec<_>>(), vec![0, 2]);
        assert_eq!(list.front(), Some(0));
        assert_eq!(list.back(), Some(2));

        list.move_to_back(&mut links, 0);
        list.push_back(&mut links, 5);
        list.move_to_front(&mut links, 5);
        assert_eq!(list.iter(&links).collect::<Vec<_>>(), vec![5, 2, 0]);
        assert_eq!(LinkedList::next(&links, 2), Some(0));
    }

    #[test]
    fn test_linked_list_move_and_swap() {
        let mut links = vec![Link::default(); 4];
        let mut first = LinkedList::new();
        let mut second = LinkedList::new();

        for index in 0..4 {
            first.push_back(&mut links, index);
        }

        first.move_to(&mut second, &mut links, 2);
        first.move_to(&mut second, &mut links, 0);
        assert_eq!(first.iter(&links).collect::<Vec<_>>(), vec![1, 3]);
        assert_eq!(second.iter(&links).collect::<Vec<_>>(), vec![0, 2]);

        first.swap(&mut second);
        assert_eq!(first.len(), 2);
        assert_eq!(first.iter(&links).collect::<Vec<_>>(), vec![0, 2]);
        assert_eq!(second.iter(&links).collect::<Vec<_>>(), vec![1, 3]);

        second.remove(&mut links, 1);
        second.remove(&mut links, 3);
        assert!(second.is_empty());
        assert_eq!(second.front(), None);
        assert_eq!(second.back(), None);
    }
}
