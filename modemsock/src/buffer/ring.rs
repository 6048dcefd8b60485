//! Fixed-capacity byte FIFO backing each channel's receive queue.
//!
//! The transport produces into the queue and sockets consume from it.
//! When the queue is full, newly arriving bytes are rejected; nothing
//! already queued is ever overwritten.

/// A fixed-size ring buffer of bytes.
#[derive(Debug, Clone)]
pub struct RingBuffer<const N: usize> {
    /// The underlying storage.
    buffer: [u8; N],

    /// Read position (head).
    head: usize,

    /// Current number of bytes in buffer.
    len: usize,
}

impl<const N: usize> RingBuffer<N> {
    /// Creates a new empty ring buffer.
    pub const fn new() -> Self {
        Self {
            buffer: [0u8; N],
            head: 0,
            len: 0,
        }
    }

    /// Returns the number of queued bytes.
    #[inline]
    pub const fn len(&self) -> usize {
        self.len
    }

    /// Returns true if nothing is queued.
    #[inline]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Returns true if no further byte can be accepted.
    #[inline]
    pub const fn is_full(&self) -> bool {
        self.len == N
    }

    /// Returns the buffer capacity.
    #[inline]
    pub const fn capacity(&self) -> usize {
        N
    }

    /// Returns the number of bytes that can still be accepted.
    #[inline]
    pub const fn free(&self) -> usize {
        N - self.len
    }

    /// Discards everything queued.
    pub fn clear(&mut self) {
        self.head = 0;
        self.len = 0;
    }

    #[inline]
    fn tail(&self) -> usize {
        (self.head + self.len) % N
    }

    /// Appends one byte. Returns false if the queue is full.
    pub fn put(&mut self, byte: u8) -> bool {
        if self.is_full() {
            return false;
        }
        let tail = self.tail();
        self.buffer[tail] = byte;
        self.len += 1;
        true
    }

    /// Appends as much of `data` as fits, in order.
    ///
    /// Returns the number of bytes accepted; the rest is dropped.
    pub fn push(&mut self, data: &[u8]) -> usize {
        let accepted = core::cmp::min(data.len(), self.free());
        if accepted == 0 {
            return 0;
        }

        let tail = self.tail();
        let first = core::cmp::min(accepted, N - tail);
        self.buffer[tail..tail + first].copy_from_slice(&data[..first]);
        if accepted > first {
            self.buffer[..accepted - first].copy_from_slice(&data[first..accepted]);
        }

        self.len += accepted;
        accepted
    }

    /// Removes and returns the oldest byte.
    pub fn pop(&mut self) -> Option<u8> {
        if self.is_empty() {
            return None;
        }
        let byte = self.buffer[self.head];
        self.head = (self.head + 1) % N;
        self.len -= 1;
        Some(byte)
    }

    /// Returns the oldest byte without removing it.
    pub fn peek(&self) -> Option<u8> {
        if self.is_empty() {
            None
        } else {
            Some(self.buffer[self.head])
        }
    }

    /// Moves up to `buf.len()` bytes out of the queue into `buf`.
    ///
    /// Returns the number of bytes copied.
    pub fn read(&mut self, buf: &mut [u8]) -> usize {
        let to_read = core::cmp::min(buf.len(), self.len);
        if to_read == 0 {
            return 0;
        }

        let first = core::cmp::min(to_read, N - self.head);
        buf[..first].copy_from_slice(&self.buffer[self.head..self.head + first]);
        if to_read > first {
            buf[first..to_read].copy_from_slice(&self.buffer[..to_read - first]);
        }

        self.head = (self.head + to_read) % N;
        self.len -= to_read;
        if self.len == 0 {
            self.head = 0;
        }

        to_read
    }
}

impl<const N: usize> Default for RingBuffer<N> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_read_fifo() {
        let mut queue: RingBuffer<64> = RingBuffer::new();

        assert_eq!(queue.push(b"Hello"), 5);
        assert_eq!(queue.len(), 5);

        let mut out = [0u8; 3];
        assert_eq!(queue.read(&mut out), 3);
        assert_eq!(&out, b"Hel");
        assert_eq!(queue.pop(), Some(b'l'));
        assert_eq!(queue.peek(), Some(b'o'));
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn test_wrap_around() {
        let mut queue: RingBuffer<8> = RingBuffer::new();

        queue.push(b"12345");
        let mut out = [0u8; 3];
        queue.read(&mut out);
        assert_eq!(&out, b"123");

        // Tail wraps past the end of storage
        assert_eq!(queue.push(b"ABCDE"), 5);
        assert_eq!(queue.len(), 7);

        let mut out = [0u8; 8];
        let n = queue.read(&mut out);
        assert_eq!(&out[..n], b"45ABCDE");
        assert!(queue.is_empty());
    }

    #[test]
    fn test_overrun_drops_newest() {
        let mut queue: RingBuffer<4> = RingBuffer::new();

        assert_eq!(queue.push(b"abcdef"), 4);
        assert!(queue.is_full());
        assert!(!queue.put(b'x'));
        assert_eq!(queue.push(b"y"), 0);

        let mut out = [0u8; 8];
        let n = queue.read(&mut out);
        assert_eq!(&out[..n], b"abcd");
    }

    #[test]
    fn test_clear_restores_capacity() {
        let mut queue: RingBuffer<16> = RingBuffer::new();
        queue.push(b"leftover");
        queue.clear();

        assert!(queue.is_empty());
        assert_eq!(queue.free(), queue.capacity());
        assert_eq!(queue.pop(), None);
    }
}
