use serde::{Serialize, Serializer};

/// Fixed capacity history that evicts its oldest element once full.
///
/// Storage is allocated once up front. Pushing into a full buffer overwrites
/// the oldest slot and advances the read position, so no allocation happens
/// after the buffer filled up.
#[derive(Debug, Clone, PartialEq)]
pub struct RingBuffer<T> {
    slots: Vec<T>,
    capacity: usize,
    /// Index of the oldest element once the buffer is full.
    head: usize,
}

impl<T> RingBuffer<T> {
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            slots: Vec::with_capacity(capacity),
            capacity,
            head: 0,
        }
    }

    /// Appends `value`, evicting the oldest element if the buffer is full.
    ///
    /// A buffer with capacity 0 never holds anything.
    pub fn push(&mut self, value: T) {
        if self.capacity == 0 {
            return;
        }

        if self.slots.len() < self.capacity {
            self.slots.push(value);
        } else {
            self.slots[self.head] = value;
            self.head = (self.head + 1) % self.capacity;
        }
    }

    pub fn clear(&mut self) {
        self.slots.clear();
        self.head = 0;
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Iterates from the oldest to the newest element.
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &T> + Clone {
        let (newer, older) = self.slots.split_at(self.head);
        older.iter().chain(newer.iter())
    }

    /// The most recently pushed element.
    #[must_use]
    pub fn latest(&self) -> Option<&T> {
        self.iter().next_back()
    }
}

impl<T> Default for RingBuffer<T> {
    fn default() -> Self {
        Self::new(0)
    }
}

impl<T: Clone> RingBuffer<T> {
    /// Copies the elements into a `Vec`, oldest first.
    #[must_use]
    pub fn to_vec(&self) -> Vec<T> {
        self.iter().cloned().collect()
    }
}

impl<T> Extend<T> for RingBuffer<T> {
    fn extend<I: IntoIterator<Item = T>>(&mut self, iter: I) {
        for value in iter {
            self.push(value);
        }
    }
}

impl<T: Serialize> Serialize for RingBuffer<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(self.iter())
    }
}
