//! Experience replay buffer

use rand::Rng;
use std::collections::VecDeque;

/// Bounded FIFO replay buffer with uniform sampling
#[derive(Debug, Clone)]
pub struct ReplayBuffer<T> {
    /// Buffer storage, oldest first
    buffer: VecDeque<T>,
    /// Maximum capacity
    capacity: usize,
}

impl<T: Clone> ReplayBuffer<T> {
    /// Create a new replay buffer
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            buffer: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Add an item, evicting the oldest one when full
    pub fn push(&mut self, item: T) {
        if self.capacity == 0 {
            return;
        }
        if self.buffer.len() >= self.capacity {
            self.buffer.pop_front();
        }
        self.buffer.push_back(item);
    }

    /// Draw `batch_size` distinct items uniformly at random.
    ///
    /// Returns `None` while the buffer holds fewer than `batch_size` items.
    pub fn sample<R: Rng + ?Sized>(&self, batch_size: usize, rng: &mut R) -> Option<Vec<T>> {
        if self.buffer.len() < batch_size {
            return None;
        }

        let batch = rand::seq::index::sample(rng, self.buffer.len(), batch_size)
            .into_iter()
            .map(|i| self.buffer[i].clone())
            .collect();

        Some(batch)
    }

    /// Iterate from oldest to newest
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.buffer.iter()
    }

    /// Get the current size of the buffer
    #[must_use]
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    /// Check if buffer is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Maximum number of items held
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Clear the buffer
    pub fn clear(&mut self) {
        self.buffer.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::collections::HashSet;

    #[test]
    fn overflow_evicts_oldest_first() {
        let mut buffer = ReplayBuffer::new(4);
        for i in 0..5 {
            buffer.push(i);
        }
        assert_eq!(buffer.len(), 4);
        assert_eq!(buffer.iter().copied().collect::<Vec<_>>(), vec![1, 2, 3, 4]);

        buffer.push(5);
        assert_eq!(buffer.iter().copied().collect::<Vec<_>>(), vec![2, 3, 4, 5]);
    }

    #[test]
    fn sample_refuses_short_buffer() {
        let mut buffer = ReplayBuffer::new(10);
        let mut rng = StdRng::seed_from_u64(0);
        for i in 0..3 {
            buffer.push(i);
        }
        assert!(buffer.sample(4, &mut rng).is_none());
        assert_eq!(buffer.sample(3, &mut rng).map(|b| b.len()), Some(3));
    }

    #[test]
    fn sample_draws_distinct_members() {
        let mut buffer = ReplayBuffer::new(100);
        for i in 0..100 {
            buffer.push(i);
        }
        let mut rng = StdRng::seed_from_u64(42);
        for _ in 0..50 {
            let batch = buffer.sample(64, &mut rng).unwrap();
            let unique: HashSet<_> = batch.iter().copied().collect();
            assert_eq!(batch.len(), 64);
            assert_eq!(unique.len(), 64);
            assert!(batch.iter().all(|i| (0..100).contains(i)));
        }
    }

    #[test]
    fn same_seed_same_batch() {
        let mut buffer = ReplayBuffer::new(50);
        for i in 0..50 {
            buffer.push(i);
        }
        let a = buffer.sample(10, &mut StdRng::seed_from_u64(7)).unwrap();
        let b = buffer.sample(10, &mut StdRng::seed_from_u64(7)).unwrap();
        assert_eq!(a, b);
    }
}
