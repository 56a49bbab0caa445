//! Line framing for NDJSON bodies
//!
//! Network chunks arrive with arbitrary boundaries: one chunk may hold many
//! records, and one record (or one UTF-8 code point) may span several chunks.

use tracing::trace;

/// Reassembles newline-terminated lines from a byte stream
#[derive(Debug, Default)]
pub struct LineDecoder {
    /// Bytes after the last newline seen so far
    partial: Vec<u8>,
    /// Bytes received since creation or the last reset
    bytes_received: usize,
}

impl LineDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one network chunk, returning every line it completes
    ///
    /// Lines are split on the raw `\n` byte and decoded only once complete.
    /// `\n` never occurs inside a multi-byte UTF-8 sequence, so a code point
    /// split across chunks is decoded whole.
    pub fn feed(&mut self, bytes: &[u8]) -> Vec<String> {
        self.bytes_received += bytes.len();
        // The buffered prefix never holds a newline; only new bytes are searched
        let mut scanned = self.partial.len();
        self.partial.extend_from_slice(bytes);

        let mut lines = Vec::new();
        let mut start = 0;
        while let Some(pos) = self.partial[scanned..].iter().position(|&b| b == b'\n') {
            let end = scanned + pos;
            if let Some(line) = decode_line(&self.partial[start..end]) {
                lines.push(line);
            }
            start = end + 1;
            scanned = start;
        }
        self.partial.drain(..start);

        trace!(
            "LineDecoder: {} bytes in, {} lines out, {} bytes buffered",
            bytes.len(),
            lines.len(),
            self.partial.len()
        );
        lines
    }

    /// End of stream: return the unterminated last line, if any
    pub fn flush(&mut self) -> Option<String> {
        let rest = std::mem::take(&mut self.partial);
        decode_line(&rest)
    }

    /// Drop buffered state without emitting it
    pub fn reset(&mut self) {
        self.partial = Vec::new();
        self.bytes_received = 0;
    }

    pub fn buffered_len(&self) -> usize {
        self.partial.len()
    }

    pub fn bytes_received(&self) -> usize {
        self.bytes_received
    }
}

/// Decode one raw line; blank lines yield None
fn decode_line(raw: &[u8]) -> Option<String> {
    let raw = raw.strip_suffix(b"\r").unwrap_or(raw);
    let text = String::from_utf8_lossy(raw);
    if text.trim().is_empty() {
        None
    } else {
        Some(text.into_owned())
    }
}
