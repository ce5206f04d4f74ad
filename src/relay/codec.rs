//! Newline line codec.
//!
//! Wire format:
//! ```text
//! ┌──────────────────────────┬────┐
//! │ UTF-8 text (≤ 1024 B)    │ \n │   optional \r before \n is dropped
//! └──────────────────────────┴────┘
//! ```
//!
//! The decoder accumulates bytes one at a time and yields complete lines.
//! This handles partial reads gracefully: a single `Transport::read` may
//! return part of a line or several lines concatenated; the caller feeds
//! every byte and acts on each completed line.

/// Longest line accepted from the downstream unit.
pub const MAX_LINE_LEN: usize = 1024;

/// Streaming line decoder.
pub struct LineDecoder {
    buf: [u8; MAX_LINE_LEN],
    len: usize,
    /// Set once the current line exceeded [`MAX_LINE_LEN`]; the rest of it
    /// is discarded up to the next newline.
    overflowed: bool,
    /// A `\r` seen but not yet stored: dropped if `\n` follows.
    held_cr: bool,
}

impl Default for LineDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl LineDecoder {
    pub fn new() -> Self {
        Self {
            buf: [0; MAX_LINE_LEN],
            len: 0,
            overflowed: false,
            held_cr: false,
        }
    }

    /// Feed one byte.
    ///
    /// Returns `Some(line)` (without the terminator) when `byte` completes
    /// a line.  Over-long lines are dropped whole; the `\r` of a `\r\n`
    /// terminator does not count towards the limit.
    pub fn feed(&mut self, byte: u8) -> Option<&[u8]> {
        if byte == b'\n' {
            let len = self.len;
            let overflowed = self.overflowed;
            self.reset();
            if overflowed {
                log::warn!("LineDecoder: dropped line longer than {} bytes", MAX_LINE_LEN);
                return None;
            }
            return Some(&self.buf[..len]);
        }

        if core::mem::take(&mut self.held_cr) {
            self.push(b'\r');
        }
        if byte == b'\r' {
            self.held_cr = true;
        } else {
            self.push(byte);
        }
        None
    }

    /// Bytes buffered for the line in progress.
    pub fn pending(&self) -> usize {
        self.len
    }

    /// Discard any partial line (e.g. after the link was reset).
    pub fn reset(&mut self) {
        self.len = 0;
        self.overflowed = false;
        self.held_cr = false;
    }

    fn push(&mut self, byte: u8) {
        if self.len == MAX_LINE_LEN {
            self.overflowed = true;
        } else if !self.overflowed {
            self.buf[self.len] = byte;
            self.len += 1;
        }
    }
}

/// Append the line terminator to `payload`.
pub fn encode_line(payload: &str) -> String {
    let mut out = String::with_capacity(payload.len() + 1);
    out.push_str(payload);
    out.push('\n');
    out
}
