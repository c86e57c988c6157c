//! Prefetch buffer between device reads and R-channel delivery.

use thiserror::Error;

/// Words the prefetch buffer holds. A read burst may not exceed it.
pub const PREFETCH_CAPACITY: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum FifoError {
    #[error("prefetch buffer overflow")]
    Overflow,
    #[error("prefetch buffer underflow")]
    Underflow,
}

/// Fixed-capacity circular queue of fetched words.
///
/// The cursors count words ever pushed and popped since the last `clear`,
/// so `write - read` is the fill level and never exceeds the capacity.
#[derive(Debug, Clone)]
pub struct PrefetchBuffer {
    words: Box<[u64; PREFETCH_CAPACITY]>,
    write: usize,
    read: usize,
}

impl PrefetchBuffer {
    #[must_use]
    pub fn new() -> Self {
        Self {
            words: Box::new([0; PREFETCH_CAPACITY]),
            write: 0,
            read: 0,
        }
    }

    pub fn push(&mut self, word: u64) -> Result<(), FifoError> {
        if self.is_full() {
            return Err(FifoError::Overflow);
        }
        self.words[self.write % PREFETCH_CAPACITY] = word;
        self.write += 1;
        Ok(())
    }

    pub fn pop(&mut self) -> Result<u64, FifoError> {
        if self.is_empty() {
            return Err(FifoError::Underflow);
        }
        let word = self.words[self.read % PREFETCH_CAPACITY];
        self.read += 1;
        Ok(word)
    }

    /// Reset both cursors. Stale words stay in storage but are unreachable.
    pub fn clear(&mut self) {
        self.write = 0;
        self.read = 0;
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.write - self.read
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.write == self.read
    }

    #[must_use]
    pub fn is_full(&self) -> bool {
        self.len() == PREFETCH_CAPACITY
    }

    #[must_use]
    pub fn write_cursor(&self) -> usize {
        self.write
    }

    #[must_use]
    pub fn read_cursor(&self) -> usize {
        self.read
    }
}

impl Default for PrefetchBuffer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fifo_order() {
        let mut fifo = PrefetchBuffer::new();
        for word in [0xA, 0xB, 0xC] {
            fifo.push(word).expect("room");
        }
        assert_eq!(fifo.pop(), Ok(0xA));
        assert_eq!(fifo.pop(), Ok(0xB));
        assert_eq!(fifo.pop(), Ok(0xC));
    }

    #[test]
    fn empty_pop_underflows_instead_of_returning_stale_data() {
        let mut fifo = PrefetchBuffer::new();
        fifo.push(0x55).expect("room");
        fifo.clear();
        assert_eq!(fifo.pop(), Err(FifoError::Underflow));
        assert_eq!(fifo.read_cursor(), 0);
    }

    #[test]
    fn full_push_overflows() {
        let mut fifo = PrefetchBuffer::new();
        for i in 0..PREFETCH_CAPACITY as u64 {
            fifo.push(i).expect("room");
        }
        assert!(fifo.is_full());
        assert_eq!(fifo.push(999), Err(FifoError::Overflow));
        assert_eq!(fifo.len(), PREFETCH_CAPACITY);
    }

    #[test]
    fn wraps_storage_after_drain() {
        let mut fifo = PrefetchBuffer::new();
        for i in 0..PREFETCH_CAPACITY as u64 {
            fifo.push(i).expect("room");
        }
        for _ in 0..10 {
            fifo.pop().expect("data");
        }
        for i in 0..10 {
            fifo.push(1000 + i).expect("room after drain");
        }
        assert!(fifo.is_full());
        assert_eq!(fifo.pop(), Ok(10));
        assert_eq!(fifo.write_cursor() - fifo.read_cursor(), PREFETCH_CAPACITY - 1);
    }

    #[test]
    fn clear_resets_cursors() {
        let mut fifo = PrefetchBuffer::new();
        fifo.push(1).expect("room");
        fifo.push(2).expect("room");
        fifo.pop().expect("data");
        fifo.clear();
        assert_eq!((fifo.write_cursor(), fifo.read_cursor()), (0, 0));
        assert!(fifo.is_empty());
    }
}
