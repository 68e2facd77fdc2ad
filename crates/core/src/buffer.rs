//! Fixed-capacity event byte buffer
//!
//! Bytes are appended at the write cursor and consumed from the read cursor.
//! Unread bytes are moved back to the front only when the tail runs out of
//! room, so consuming a record is O(1).

/// Owned byte region holding raw inotify records between the reactor and consumers
pub struct EventBuffer {
    data: Box<[u8]>,
    /// Start of unread bytes
    read: usize,
    /// End of unread bytes
    write: usize,
    /// Buffered length above which the reactor parses before reading again
    high_water: usize,
}

impl EventBuffer {
    /// Create a buffer of `capacity` bytes with its high-water mark at
    /// `high_water_percent` of capacity
    pub fn new(capacity: usize, high_water_percent: u8) -> Self {
        let high_water = capacity * usize::from(high_water_percent.min(100)) / 100;
        Self {
            data: vec![0u8; capacity].into_boxed_slice(),
            read: 0,
            write: 0,
            high_water,
        }
    }

    /// Total capacity in bytes
    pub fn capacity(&self) -> usize {
        self.data.len()
    }

    /// Number of unread bytes
    pub fn len(&self) -> usize {
        self.write - self.read
    }

    /// True when nothing is buffered
    pub fn is_empty(&self) -> bool {
        self.read == self.write
    }

    /// Bytes that could still be appended, counting space reclaimable by compaction
    pub fn available(&self) -> usize {
        self.capacity() - self.len()
    }

    /// High-water mark in bytes
    pub fn high_water(&self) -> usize {
        self.high_water
    }

    /// True when buffered bytes exceed the high-water mark
    pub fn is_above_high_water(&self) -> bool {
        self.len() > self.high_water
    }

    /// Unread bytes, oldest first
    pub fn as_slice(&self) -> &[u8] {
        &self.data[self.read..self.write]
    }

    /// Append as much of `bytes` as fits and return how many were taken
    pub fn append(&mut self, bytes: &[u8]) -> usize {
        let spare = self.spare_mut();
        let count = bytes.len().min(spare.len());
        spare[..count].copy_from_slice(&bytes[..count]);
        self.commit(count);
        count
    }

    /// Writable tail of the buffer
    ///
    /// Compacts first, so the returned slice is as large as [`available`](Self::available).
    /// Call [`commit`](Self::commit) with the number of bytes actually written.
    pub fn spare_mut(&mut self) -> &mut [u8] {
        self.compact();
        &mut self.data[self.write..]
    }

    /// Mark `count` bytes written into [`spare_mut`](Self::spare_mut) as valid
    pub fn commit(&mut self, count: usize) {
        assert!(
            self.write + count <= self.capacity(),
            "commit of {} bytes overruns buffer ({} of {} used)",
            count,
            self.write,
            self.capacity()
        );
        self.write += count;
    }

    /// Drop `count` bytes from the front
    pub fn consume(&mut self, count: usize) {
        let count = count.min(self.len());
        self.read += count;
        if self.read == self.write {
            self.read = 0;
            self.write = 0;
        }
    }

    /// Discard everything buffered
    pub fn clear(&mut self) {
        self.read = 0;
        self.write = 0;
    }

    fn compact(&mut self) {
        if self.read == 0 {
            return;
        }
        self.data.copy_within(self.read..self.write, 0);
        self.write -= self.read;
        self.read = 0;
    }
}

impl std::fmt::Debug for EventBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBuffer")
            .field("len", &self.len())
            .field("capacity", &self.capacity())
            .field("high_water", &self.high_water)
            .finish()
    }
}
