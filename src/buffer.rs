/// An ordered byte container used to assemble and carve up wire messages.
///
/// Everything this crate sends or receives is staged in a `Buffer`: USB/IP
/// frames are packed into one before the single socket write, and incoming
/// HTTP bodies accumulate in one while they are reassembled from bulk-OUT
/// URBs. The operations are deliberately few: append (optionally a window
/// of another buffer), random range erase, truncation, and a linear
/// substring search. There is no cursor; parsers erase what they consume.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Buffer {
    data: Vec<u8>,
}

impl Buffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            data: Vec::with_capacity(capacity),
        }
    }

    pub fn from_vec(data: Vec<u8>) -> Self {
        Self { data }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn into_vec(self) -> Vec<u8> {
        self.data
    }

    pub fn add_bytes(&mut self, bytes: &[u8]) {
        self.data.extend_from_slice(bytes);
    }

    pub fn add_u8(&mut self, value: u8) {
        self.data.push(value);
    }

    /// Appends `value` in network byte order.
    pub fn add_u16_be(&mut self, value: u16) {
        self.data.extend_from_slice(&value.to_be_bytes());
    }

    /// Appends `value` in network byte order.
    pub fn add_u32_be(&mut self, value: u32) {
        self.data.extend_from_slice(&value.to_be_bytes());
    }

    /// Appends `value` in network byte order.
    pub fn add_i32_be(&mut self, value: i32) {
        self.data.extend_from_slice(&value.to_be_bytes());
    }

    /// Appends `value` in network byte order.
    pub fn add_u64_be(&mut self, value: u64) {
        self.data.extend_from_slice(&value.to_be_bytes());
    }

    /// Appends the entire contents of `other`.
    pub fn add(&mut self, other: &Buffer) {
        self.data.extend_from_slice(&other.data);
    }

    /// Appends the window of `other` starting at `start`, of length `len`.
    ///
    /// # Panics
    ///
    /// Panics if `start + len` exceeds `other.len()`; an out-of-bounds
    /// window is a programming error, not a wire condition.
    pub fn add_window(&mut self, other: &Buffer, start: usize, len: usize) {
        assert!(
            start + len <= other.len(),
            "window {}+{} out of bounds of buffer of length {}",
            start,
            len,
            other.len()
        );
        self.data.extend_from_slice(&other.data[start..start + len]);
    }

    /// Removes the range starting at `start`, of length `len`.
    ///
    /// # Panics
    ///
    /// Panics if `start + len` exceeds the buffer length.
    pub fn erase(&mut self, start: usize, len: usize) {
        assert!(
            start + len <= self.len(),
            "erase {}+{} out of bounds of buffer of length {}",
            start,
            len,
            self.len()
        );
        self.data.drain(start..start + len);
    }

    /// Truncates the buffer to `len` bytes; a no-op if it is already
    /// `len` bytes or shorter.
    pub fn shrink(&mut self, len: usize) {
        self.data.truncate(len);
    }

    /// Returns the first offset at or after `start` where `pattern`
    /// appears as contiguous bytes, or `None` if it does not appear.
    pub fn find(&self, pattern: &[u8], start: usize) -> Option<usize> {
        if pattern.is_empty() || start >= self.data.len() {
            return None;
        }
        self.data[start..]
            .windows(pattern.len())
            .position(|w| w == pattern)
            .map(|pos| pos + start)
    }

    /// True if the buffer begins with `pattern`.
    pub fn starts_with(&self, pattern: &[u8]) -> bool {
        self.data.starts_with(pattern)
    }
}

impl From<&[u8]> for Buffer {
    fn from(bytes: &[u8]) -> Self {
        Self {
            data: bytes.to_vec(),
        }
    }
}

#[cfg(test)]
#[path = "tests/buffer.rs"]
mod tests;
