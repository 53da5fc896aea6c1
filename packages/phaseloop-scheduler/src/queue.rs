use thiserror::Error;

/// Anything the heap can order. Lower keys come out first.
pub trait Keyed {
    type Key: Ord + Copy;

    fn key(&self) -> Self::Key;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum QueueError {
    #[error("queue capacity {capacity} exceeded")]
    CapacityExceeded { capacity: usize },

    #[error("queue is empty")]
    EmptyQueue,
}

/// A fixed-capacity binary min-heap.
///
/// Items live in a dense `Vec`; the parent of slot `i` is `(i - 1) / 2` and its
/// children are `2i + 1` and `2i + 2`. Every non-root item's key is `>=` its
/// parent's key. The capacity is a strict bound: with capacity `c` the queue
/// holds at most `c` items.
#[derive(Debug)]
pub struct PriorityQueue<T> {
    items: Vec<T>,
    capacity: usize,
}

impl<T: Keyed> PriorityQueue<T> {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            items: Vec::with_capacity(capacity),
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn has_items(&self) -> bool {
        !self.items.is_empty()
    }

    pub fn push(&mut self, item: T) -> Result<(), QueueError> {
        if self.items.len() >= self.capacity {
            return Err(QueueError::CapacityExceeded {
                capacity: self.capacity,
            });
        }
        self.items.push(item);
        self.sift_up(self.items.len() - 1);
        Ok(())
    }

    pub fn pop(&mut self) -> Result<T, QueueError> {
        if self.items.is_empty() {
            return Err(QueueError::EmptyQueue);
        }
        let last = self.items.len() - 1;
        self.items.swap(0, last);
        let min = self.items.pop().ok_or(QueueError::EmptyQueue)?;
        if !self.items.is_empty() {
            self.sift_down(0);
        }
        Ok(min)
    }

    pub fn peek(&self) -> Result<&T, QueueError> {
        self.items.first().ok_or(QueueError::EmptyQueue)
    }

    /// Keys in storage order. Exposed for heap-shape assertions.
    pub fn keys(&self) -> Vec<T::Key> {
        self.items.iter().map(|item| item.key()).collect()
    }

    fn sift_up(&mut self, mut idx: usize) {
        while idx > 0 {
            let parent = (idx - 1) / 2;
            if self.items[parent].key() <= self.items[idx].key() {
                break;
            }
            self.items.swap(parent, idx);
            idx = parent;
        }
    }

    fn sift_down(&mut self, mut idx: usize) {
        let len = self.items.len();
        loop {
            let left = 2 * idx + 1;
            if left >= len {
                break;
            }
            let right = left + 1;
            // Right child only wins when strictly smaller.
            let smaller = if right < len && self.items[right].key() < self.items[left].key() {
                right
            } else {
                left
            };
            if self.items[idx].key() <= self.items[smaller].key() {
                break;
            }
            self.items.swap(idx, smaller);
            idx = smaller;
        }
    }
}
