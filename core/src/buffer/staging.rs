//! Contiguous staging buffer shared by the producer and every subscriber.
//!
//! Data lives in `[head, tail)`. The producer appends at `tail`; subscribers
//! read the fill-level window starting at `head`. Space is reclaimed only by
//! [`StagingBuffer::compact`], which slides the unread tail back to offset 0.

/// Byte store with head/tail offsets. `head <= tail <= capacity` always holds.
#[derive(Debug)]
pub struct StagingBuffer {
    data: Vec<u8>,
    head: usize,
    tail: usize,
}

impl StagingBuffer {
    /// Wraps an already zeroed allocation.
    pub fn new(data: Vec<u8>) -> Self {
        Self {
            data,
            head: 0,
            tail: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.data.len()
    }

    pub fn head(&self) -> usize {
        self.head
    }

    pub fn tail(&self) -> usize {
        self.tail
    }

    pub fn buffered(&self) -> usize {
        self.tail - self.head
    }

    /// Bytes that can still be appended without compaction.
    pub fn room(&self) -> usize {
        self.capacity() - self.tail
    }

    /// Writable region past `tail`.
    pub fn spare_mut(&mut self) -> &mut [u8] {
        &mut self.data[self.tail..]
    }

    /// Accepts `count` bytes previously written into [`Self::spare_mut`].
    /// Returns false, leaving the buffer untouched, if `count` exceeds the room.
    pub fn commit(&mut self, count: usize) -> bool {
        if count > self.room() {
            return false;
        }
        self.tail += count;
        true
    }

    /// The `len` bytes at `head`, if that much is buffered.
    pub fn window(&self, len: usize) -> Option<&[u8]> {
        if self.buffered() < len {
            return None;
        }
        Some(&self.data[self.head..self.head + len])
    }

    /// Drops `consumed` bytes from the front and moves the remainder to offset 0.
    pub fn compact(&mut self, consumed: usize) {
        self.head += consumed.min(self.buffered());
        if self.head > 0 {
            self.data.copy_within(self.head..self.tail, 0);
            self.tail -= self.head;
            self.head = 0;
        }
    }

    /// Hard reset when the buffer is filled to the end with nothing unread.
    pub fn reset_if_exhausted(&mut self) -> bool {
        if self.tail == self.capacity() && self.head == self.tail {
            self.clear();
            return true;
        }
        false
    }

    pub fn clear(&mut self) {
        self.head = 0;
        self.tail = 0;
        self.data.fill(0);
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn into_inner(self) -> Vec<u8> {
        self.data
    }

    #[cfg(test)]
    pub(crate) fn seek(&mut self, head: usize, tail: usize) {
        assert!(head <= tail && tail <= self.capacity());
        self.head = head;
        self.tail = tail;
    }
}
