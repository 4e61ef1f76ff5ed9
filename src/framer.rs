/// Size of the line buffer, including room for one spare byte: lines of up
/// to `PARSE_BUFFER_SIZE - 1` bytes are delivered intact.
pub const PARSE_BUFFER_SIZE: usize = 512;

/// Splits a byte stream into newline-terminated lines.
///
/// A line that does not fit in the buffer is dropped whole: the buffer is
/// reset and everything up to the next `\n` is discarded, so the line after
/// it is parsed normally.
#[derive(Debug)]
pub struct LineFramer {
    buf: Vec<u8>,
    capacity: usize,
    overflowed: bool,
}

impl Default for LineFramer {
    fn default() -> Self {
        Self::new()
    }
}

impl LineFramer {
    pub fn new() -> Self {
        Self::with_capacity(PARSE_BUFFER_SIZE)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(2);
        Self {
            buf: Vec::with_capacity(capacity),
            capacity,
            overflowed: false,
        }
    }

    /// Forget any partial line.
    pub fn clear(&mut self) {
        self.buf.clear();
        self.overflowed = false;
    }

    /// Append `bytes` and iterate over the lines they complete.
    ///
    /// Bytes are consumed as the iterator advances; whatever is left when the
    /// iterator is dropped is never seen by the framer.
    pub fn feed<'a>(&'a mut self, bytes: &'a [u8]) -> Lines<'a> {
        Lines {
            framer: self,
            bytes: bytes.iter(),
        }
    }

    fn push(&mut self, byte: u8) -> Option<String> {
        if byte == b'\n' {
            let line = String::from_utf8_lossy(&self.buf).into_owned();
            self.buf.clear();
            if std::mem::take(&mut self.overflowed) {
                return None;
            }
            return Some(line);
        }

        if self.overflowed {
            return None;
        }

        if self.buf.len() == self.capacity - 1 {
            log::debug!(
                "Sender overflowed {} byte line buffer waiting for newline",
                self.capacity
            );
            self.buf.clear();
            self.overflowed = true;
            return None;
        }

        self.buf.push(byte);
        None
    }
}

pub struct Lines<'a> {
    framer: &'a mut LineFramer,
    bytes: std::slice::Iter<'a, u8>,
}

impl Iterator for Lines<'_> {
    type Item = String;

    fn next(&mut self) -> Option<String> {
        for &byte in self.bytes.by_ref() {
            if let Some(line) = self.framer.push(byte) {
                return Some(line);
            }
        }
        None
    }
}
