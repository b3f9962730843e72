//! Lock-protected circular byte store.
//!
//! Decouples a real-time audio callback from the encode/network side.
//! Capacity is always a power of two so indices wrap with a bitmask, and
//! it doubles whenever a write would not leave at least one free slot
//! (one slot stays empty so `head == tail` always means "empty").
//!
//! All mutation goes through a single `parking_lot::Mutex` per instance,
//! so a `RingBuffer` can sit behind an `Arc` shared by producer and
//! consumer threads.

use std::fmt;

use parking_lot::Mutex;

struct Inner {
    storage: Vec<u8>,
    head: usize,
    tail: usize,
}

impl Inner {
    fn capacity(&self) -> usize {
        self.storage.len()
    }

    fn mask(&self) -> usize {
        self.storage.len() - 1
    }

    fn count(&self) -> usize {
        self.tail.wrapping_sub(self.head) & self.mask()
    }

    fn reset(&mut self) {
        self.head = 0;
        self.tail = 0;
    }

    /// Copy the unread bytes to the front of a larger store.
    fn grow_to(&mut self, new_capacity: usize) {
        let count = self.count();
        let mut storage = vec![0u8; new_capacity];
        let first = count.min(self.capacity() - self.head);
        storage[..first].copy_from_slice(&self.storage[self.head..self.head + first]);
        storage[first..count].copy_from_slice(&self.storage[..count - first]);
        self.storage = storage;
        self.head = 0;
        self.tail = count;
    }

    fn write(&mut self, bytes: &[u8]) {
        let needed = bytes.len();
        if self.capacity() - self.count() <= needed {
            let mut new_capacity = self.capacity() << 1;
            while new_capacity - self.count() <= needed {
                new_capacity <<= 1;
            }
            tracing::debug!(
                old = self.capacity(),
                new = new_capacity,
                "ring buffer capacity increased"
            );
            self.grow_to(new_capacity);
        }

        let first = needed.min(self.capacity() - self.tail);
        let tail = self.tail;
        self.storage[tail..tail + first].copy_from_slice(&bytes[..first]);
        self.storage[..needed - first].copy_from_slice(&bytes[first..]);
        self.tail = (tail + needed) & self.mask();
    }

    fn read(&mut self, count: usize) -> Option<Vec<u8>> {
        if self.count() < count {
            return None;
        }
        let mut out = Vec::with_capacity(count);
        let first = count.min(self.capacity() - self.head);
        out.extend_from_slice(&self.storage[self.head..self.head + first]);
        out.extend_from_slice(&self.storage[..count - first]);
        self.advance_head(count);
        Some(out)
    }

    fn advance_head(&mut self, count: usize) {
        self.head = (self.head + count) & self.mask();
        if self.head == self.tail {
            self.reset();
        }
    }
}

/// Thread-safe growable ring buffer of bytes.
pub struct RingBuffer {
    inner: Mutex<Inner>,
}

impl RingBuffer {
    /// Create a buffer whose capacity is `initial_capacity` rounded up to a power of two.
    pub fn new(initial_capacity: usize) -> Self {
        let capacity = initial_capacity.max(1).next_power_of_two();
        Self {
            inner: Mutex::new(Inner {
                storage: vec![0u8; capacity],
                head: 0,
                tail: 0,
            }),
        }
    }

    /// Append bytes, growing the storage when needed. Never fails.
    pub fn write(&self, bytes: &[u8]) {
        if bytes.is_empty() {
            return;
        }
        self.inner.lock().write(bytes);
    }

    /// Remove and return exactly `count` bytes, or `None` if fewer are buffered.
    pub fn read(&self, count: usize) -> Option<Vec<u8>> {
        self.inner.lock().read(count)
    }

    /// Discard up to `count` unread bytes.
    pub fn skip(&self, count: usize) {
        let mut inner = self.inner.lock();
        let count = count.min(inner.count());
        inner.advance_head(count);
    }

    /// Drop all buffered data.
    pub fn reset(&self) {
        self.inner.lock().reset();
    }

    /// Number of unread bytes.
    pub fn len(&self) -> usize {
        self.inner.lock().count()
    }

    pub fn is_empty(&self) -> bool {
        let inner = self.inner.lock();
        inner.head == inner.tail
    }

    pub fn capacity(&self) -> usize {
        self.inner.lock().capacity()
    }
}

impl fmt::Debug for RingBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.lock();
        f.debug_struct("RingBuffer")
            .field("head", &inner.head)
            .field("tail", &inner.tail)
            .field("capacity", &inner.capacity())
            .field("len", &inner.count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn capacity_rounds_up_to_power_of_two() {
        assert_eq!(RingBuffer::new(3048).capacity(), 4096);
        assert_eq!(RingBuffer::new(1024).capacity(), 1024);
        assert_eq!(RingBuffer::new(0).capacity(), 1);
    }

    #[test]
    fn read_requires_enough_data() {
        let ring = RingBuffer::new(16);
        ring.write(&[1, 2, 3]);
        assert!(ring.read(4).is_none());
        assert_eq!(ring.len(), 3);
        assert_eq!(ring.read(3).unwrap(), vec![1, 2, 3]);
        assert!(ring.is_empty());
    }

    #[test]
    fn wraparound_preserves_order() {
        let ring = RingBuffer::new(8);
        ring.write(&[1, 2, 3, 4, 5]);
        assert_eq!(ring.read(4).unwrap(), vec![1, 2, 3, 4]);
        // tail at 5, head at 4: next write wraps
        ring.write(&[6, 7, 8, 9]);
        assert_eq!(ring.capacity(), 8);
        assert_eq!(ring.read(5).unwrap(), vec![5, 6, 7, 8, 9]);
    }

    #[test]
    fn empty_state_is_canonical() {
        let ring = RingBuffer::new(8);
        ring.write(&[1, 2, 3]);
        ring.read(3).unwrap();
        let dbg = format!("{:?}", ring);
        assert!(dbg.contains("head: 0"), "{dbg}");
        assert!(dbg.contains("tail: 0"), "{dbg}");
    }

    #[test]
    fn growth_relinearizes_wrapped_data() {
        let ring = RingBuffer::new(8);
        ring.write(&[1, 2, 3, 4, 5, 6]);
        ring.read(5).unwrap();
        ring.write(&[7, 8, 9]); // wraps: head=5, tail=1
        ring.write(&[10, 11, 12, 13, 14]);
        assert_eq!(ring.capacity(), 16);
        assert_eq!(
            ring.read(9).unwrap(),
            vec![6, 7, 8, 9, 10, 11, 12, 13, 14]
        );
    }

    #[test]
    fn large_write_doubles_until_it_fits() {
        let ring = RingBuffer::new(4);
        let data: Vec<u8> = (0..100).collect();
        ring.write(&data);
        assert_eq!(ring.capacity(), 128);
        assert_eq!(ring.read(100).unwrap(), data);
    }

    #[test]
    fn reset_is_idempotent() {
        let ring = RingBuffer::new(8);
        ring.reset();
        assert_eq!(ring.len(), 0);
        assert!(ring.is_empty());

        ring.write(&[0xAA; 7]);
        ring.reset();
        assert_eq!(ring.len(), 0);
        assert!(ring.is_empty());
        ring.reset();
        assert!(ring.is_empty());
    }

    #[test]
    fn skip_discards_bytes() {
        let ring = RingBuffer::new(8);
        ring.write(&[1, 2, 3, 4]);
        ring.skip(2);
        assert_eq!(ring.read(2).unwrap(), vec![3, 4]);
        ring.skip(10);
        assert!(ring.is_empty());
    }

    #[test]
    fn interleaved_writes_and_reads_roundtrip() {
        let ring = RingBuffer::new(4);
        let mut written = Vec::new();
        let mut read = Vec::new();
        let mut next = 0u8;
        for step in 1..60usize {
            let chunk: Vec<u8> = (0..step % 11)
                .map(|_| {
                    next = next.wrapping_add(1);
                    next
                })
                .collect();
            ring.write(&chunk);
            written.extend_from_slice(&chunk);
            let want = step % 7;
            if let Some(bytes) = ring.read(want) {
                read.extend(bytes);
            }
        }
        let rest = ring.len();
        read.extend(ring.read(rest).unwrap());
        assert_eq!(read, written);
    }

    #[test]
    fn concurrent_producer_consumer() {
        let ring = Arc::new(RingBuffer::new(64));
        let producer = {
            let ring = ring.clone();
            thread::spawn(move || {
                for i in 0..1000u32 {
                    ring.write(&i.to_be_bytes());
                }
            })
        };
        let mut out = Vec::new();
        while out.len() < 1000 {
            if let Some(b) = ring.read(4) {
                out.push(u32::from_be_bytes([b[0], b[1], b[2], b[3]]));
            } else {
                thread::yield_now();
            }
        }
        producer.join().unwrap();
        assert_eq!(out, (0..1000u32).collect::<Vec<_>>());
    }
}
