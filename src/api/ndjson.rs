//! Newline-delimited JSON line splitting for chunked response bodies

/// Longest line kept in full (1MB); anything past it is dropped
pub const MAX_LINE_SIZE: usize = 1_048_576;

/// Reassembles lines from arbitrarily split byte chunks.
///
/// A trailing partial line is held back until the next chunk (or `finish`).
/// Lines are decoded only once complete, so a multi-byte UTF-8 sequence cut
/// by a chunk boundary is decoded intact.
///
/// A line longer than the limit is returned cut at the limit, and the rest
/// of it up to the next newline is discarded.
#[derive(Debug)]
pub struct LineBuffer {
    pending: Vec<u8>,
    max_line: usize,
    /// Inside the tail of an overlong line that was already returned
    skipping: bool,
}

impl Default for LineBuffer {
    fn default() -> Self {
        Self::with_max_line(MAX_LINE_SIZE)
    }
}

impl LineBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_line(max_line: usize) -> Self {
        Self {
            pending: Vec::new(),
            max_line,
            skipping: false,
        }
    }

    /// Add a chunk and return every line it completes, without the terminator
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        let mut chunk = chunk;
        if self.skipping {
            let Some(newline) = chunk.iter().position(|&b| b == b'\n') else {
                return Vec::new();
            };
            self.skipping = false;
            chunk = &chunk[newline + 1..];
        }

        self.pending.extend_from_slice(chunk);

        let max_line = self.max_line;
        let mut lines = Vec::new();

        if let Some(last_newline) = self.pending.iter().rposition(|&b| b == b'\n') {
            let rest = self.pending.split_off(last_newline + 1);
            let complete = std::mem::replace(&mut self.pending, rest);

            lines.extend(
                complete[..last_newline]
                    .split(|&b| b == b'\n')
                    .map(|line| decode_line(&line[..line.len().min(max_line)])),
            );
        }

        if self.pending.len() > max_line {
            tracing::warn!(limit = max_line, "Line exceeds size limit, truncating");
            lines.push(decode_line(&self.pending[..max_line]));
            self.pending.clear();
            self.skipping = true;
        }

        lines
    }

    /// Flush whatever is left once the stream has ended
    pub fn finish(&mut self) -> Option<String> {
        self.skipping = false;
        if self.pending.is_empty() {
            return None;
        }
        let rest = std::mem::take(&mut self.pending);
        Some(decode_line(&rest))
    }

    /// Bytes held back waiting for a newline
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }
}

fn decode_line(bytes: &[u8]) -> String {
    let bytes = bytes.strip_suffix(b"\r").unwrap_or(bytes);
    String::from_utf8_lossy(bytes).into_owned()
}
