//! Splits a raw byte stream into newline-terminated lines.

use memchr::memchr;

/// Longest line, terminator excluded, the framer will hold.
pub const MAX_LINE_LEN: usize = 4096;

/// Accumulates bytes across reads and yields complete lines.
///
/// Bytes after the last newline stay buffered, so a line split across several
/// reads (or across a read timeout) comes out whole. The terminator (`\n`, and
/// a `\r` right before it) is not part of the yielded line.
///
/// A line longer than the limit is dropped whole: bytes are discarded up to
/// and including its newline, and framing resumes with the next line.
#[derive(Debug)]
pub struct LineFramer {
    pending: Vec<u8>,
    max_line: usize,
    /// Inside an over-long line; skip until its newline.
    discarding: bool,
    discarded: usize,
}

impl Default for LineFramer {
    fn default() -> Self {
        Self::with_max_line(MAX_LINE_LEN)
    }
}

impl LineFramer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_line(max_line: usize) -> Self {
        Self {
            pending: Vec::new(),
            max_line,
            discarding: false,
            discarded: 0,
        }
    }

    pub fn extend(&mut self, bytes: &[u8]) {
        self.pending.extend_from_slice(bytes);
    }

    /// Pop the next complete line, if one is buffered.
    pub fn next_line(&mut self) -> Option<Vec<u8>> {
        loop {
            let Some(end) = memchr(b'\n', &self.pending) else {
                // One extra byte for a `\r` still waiting on its `\n`.
                if self.pending.len() > self.max_line + 1 {
                    self.discard(self.pending.len());
                    self.discarding = true;
                }
                return None;
            };

            if self.discarding {
                self.discard(end + 1);
                self.discarding = false;
                continue;
            }

            let mut line: Vec<u8> = self.pending.drain(..=end).collect();
            line.pop();
            if line.last() == Some(&b'\r') {
                line.pop();
            }
            if line.len() > self.max_line {
                self.discarded += end + 1;
                continue;
            }
            return Some(line);
        }
    }

    /// Bytes received after the last newline.
    pub fn partial_len(&self) -> usize {
        self.pending.len()
    }

    /// Bytes dropped from over-long lines since the last call.
    pub fn take_discarded(&mut self) -> usize {
        std::mem::take(&mut self.discarded)
    }

    fn discard(&mut self, n: usize) {
        self.pending.drain(..n);
        self.discarded += n;
    }
}
