//! Fixed-capacity circular buffer used as the endpointer's pre-roll.
//!
//! While nobody is speaking the endpointer keeps only the most recent few
//! hundred milliseconds of audio here.  When speech starts, the pre-roll is
//! drained into the phrase so the first syllable is not clipped.
//!
//! ```rust
//! use voice_chat::audio::RingBuffer;
//!
//! let mut buf = RingBuffer::new(4);
//! buf.push_slice(&[1.0, 2.0, 3.0, 4.0, 5.0]);
//! assert_eq!(buf.drain(), vec![2.0, 3.0, 4.0, 5.0]);
//! ```

/// A fixed-capacity circular buffer.  When full, new samples overwrite the
/// oldest ones; it never allocates beyond its initial capacity.
pub struct RingBuffer<T> {
    buf: Vec<T>,
    capacity: usize,
    /// Index of the next write position.
    write_pos: usize,
    len: usize,
}

impl<T: Copy + Default> RingBuffer<T> {
    /// # Panics
    ///
    /// Panics if `capacity == 0`.
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "RingBuffer capacity must be > 0");
        Self {
            buf: vec![T::default(); capacity],
            capacity,
            write_pos: 0,
            len: 0,
        }
    }

    /// Append `data`, overwriting the oldest samples on overflow.
    pub fn push_slice(&mut self, data: &[T]) {
        for &item in data {
            self.buf[self.write_pos] = item;
            self.write_pos = (self.write_pos + 1) % self.capacity;
            self.len = (self.len + 1).min(self.capacity);
        }
    }

    /// Take all stored samples in chronological order and reset the buffer.
    pub fn drain(&mut self) -> Vec<T> {
        // Once wrapped, the oldest sample sits where the next write would go.
        let read_pos = if self.len < self.capacity {
            0
        } else {
            self.write_pos
        };
        let out = (0..self.len)
            .map(|i| self.buf[(read_pos + i) % self.capacity])
            .collect();
        self.clear();
        out
    }

    pub fn clear(&mut self) {
        self.write_pos = 0;
        self.len = 0;
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
