//! Reassembles newline-delimited messages from arbitrary read chunks.

use crate::domain::error::DaytraderError;

pub const DEFAULT_MAX_LINE: usize = 4 * 1024 * 1024;

#[derive(Debug)]
pub struct LineBuffer {
    pending: Vec<u8>,
    max_line: usize,
}

impl Default for LineBuffer {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_LINE)
    }
}

impl LineBuffer {
    pub fn new(max_line: usize) -> Self {
        Self {
            pending: Vec::new(),
            max_line,
        }
    }

    /// Appends a chunk. Fails when an unterminated line grows past `max_line`.
    pub fn push(&mut self, chunk: &[u8]) -> Result<(), DaytraderError> {
        self.pending.extend_from_slice(chunk);
        let unterminated = match self.pending.iter().rposition(|&b| b == b'\n') {
            Some(pos) => self.pending.len() - pos - 1,
            None => self.pending.len(),
        };
        if unterminated > self.max_line {
            return Err(DaytraderError::Connection {
                reason: format!("line exceeds {} bytes without a newline", self.max_line),
            });
        }
        Ok(())
    }

    /// Next complete line without its terminator (`\n` or `\r\n`). Empty
    /// lines are dropped. Invalid UTF-8 is replaced, not rejected.
    pub fn next_line(&mut self) -> Option<String> {
        loop {
            let pos = self.pending.iter().position(|&b| b == b'\n')?;
            let mut line: Vec<u8> = self.pending.drain(..=pos).collect();
            line.pop();
            if line.last() == Some(&b'\r') {
                line.pop();
            }
            if line.iter().all(u8::is_ascii_whitespace) {
                continue;
            }
            return Some(String::from_utf8_lossy(&line).into_owned());
        }
    }

    /// Whatever is left after the stream ended, if it is not blank.
    pub fn take_remainder(&mut self) -> Option<String> {
        let rest = std::mem::take(&mut self.pending);
        let text = String::from_utf8_lossy(&rest).trim().to_string();
        (!text.is_empty()).then_some(text)
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reassembles_split_lines() {
        let mut buf = LineBuffer::default();
        buf.push(b"{\"a\":").unwrap();
        assert_eq!(buf.next_line(), None);
        buf.push(b"1}\n{\"b\"").unwrap();
        assert_eq!(buf.next_line().as_deref(), Some("{\"a\":1}"));
        assert_eq!(buf.next_line(), None);
        buf.push(b":2}\r\n\n").unwrap();
        assert_eq!(buf.next_line().as_deref(), Some("{\"b\":2}"));
        assert_eq!(buf.next_line(), None);
        assert_eq!(buf.pending_len(), 0);
    }

    #[test]
    fn several_lines_in_one_chunk() {
        let mut buf = LineBuffer::default();
        buf.push(b"one\ntwo\nthree").unwrap();
        assert_eq!(buf.next_line().as_deref(), Some("one"));
        assert_eq!(buf.next_line().as_deref(), Some("two"));
        assert_eq!(buf.next_line(), None);
        assert_eq!(buf.take_remainder().as_deref(), Some("three"));
        assert_eq!(buf.take_remainder(), None);
    }

    #[test]
    fn overlong_line_is_an_error() {
        let mut buf = LineBuffer::new(8);
        buf.push(b"12345\n").unwrap();
        assert!(buf.push(b"123456789").is_err());
    }
}
