/// Longest partial line held back before it is dropped.
pub const MAX_PENDING_LINE_BYTES: usize = 1024 * 1024;

/// Byte buffer that hands out complete lines and keeps the trailing partial.
///
/// Bytes after the last `\n` stay buffered until a later push completes them.
/// Decoding is lossy so invalid UTF-8 surfaces as an unparseable line instead
/// of an error. A partial line longer than the cap is dropped together with
/// the rest of that line once its newline arrives.
#[derive(Debug)]
pub struct LineBuffer {
    buffer: Vec<u8>,
    max_line_len: usize,
    discarding: bool,
    dropped: usize,
}

impl Default for LineBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl LineBuffer {
    pub fn new() -> Self {
        Self::with_max_line_len(MAX_PENDING_LINE_BYTES)
    }

    pub fn with_max_line_len(max_line_len: usize) -> Self {
        Self {
            buffer: Vec::new(),
            max_line_len,
            discarding: false,
            dropped: 0,
        }
    }

    pub fn push(&mut self, chunk: &[u8]) {
        let mut chunk = chunk;
        if self.discarding {
            match chunk.iter().position(|&b| b == b'\n') {
                Some(end) => {
                    self.discarding = false;
                    chunk = &chunk[end + 1..];
                }
                None => return,
            }
        }
        self.buffer.extend_from_slice(chunk);
    }

    /// Drain all complete lines, without their terminators (`\n` or `\r\n`).
    pub fn drain_complete_lines(&mut self) -> Vec<String> {
        let lines = match self.buffer.iter().rposition(|&b| b == b'\n') {
            Some(last_newline) => {
                let complete: Vec<u8> = self.buffer.drain(..=last_newline).collect();
                String::from_utf8_lossy(&complete)
                    .lines()
                    .map(str::to_string)
                    .collect()
            }
            None => Vec::new(),
        };

        if self.buffer.len() > self.max_line_len {
            self.buffer.clear();
            self.discarding = true;
            self.dropped += 1;
        }
        lines
    }

    /// Number of oversized lines dropped since the last call.
    pub fn take_dropped(&mut self) -> usize {
        std::mem::take(&mut self.dropped)
    }

    /// Bytes held back as an incomplete line.
    pub fn pending(&self) -> &[u8] {
        &self.buffer
    }

    pub fn clear(&mut self) {
        self.buffer.clear();
        self.discarding = false;
        self.dropped = 0;
    }
}
