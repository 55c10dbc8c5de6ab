use bytes::{Buf, BytesMut};
use tracing::trace;

use crate::codec::{decode_frame, frame_len, Frame, DEFAULT_MAX_DATA_SIZE, MAGIC};
use crate::error::Result;

const INITIAL_BUFFER_CAPACITY: usize = 4 * 1024;

/// Accumulates raw socket bytes and yields complete frames.
///
/// A single read may carry several replies, or the first part of a long one.
/// The assembler splits on the header's data size and keeps an incomplete
/// tail for the next read. When a frame fails structural validation the
/// assembler skips ahead to the next `ISCP` magic so the stream can recover.
#[derive(Debug)]
pub struct FrameAssembler {
    buf: BytesMut,
    max_data_size: usize,
}

impl Default for FrameAssembler {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_DATA_SIZE)
    }
}

impl FrameAssembler {
    pub fn new(max_data_size: usize) -> Self {
        Self {
            buf: BytesMut::with_capacity(INITIAL_BUFFER_CAPACITY),
            max_data_size,
        }
    }

    /// Append bytes received from the socket.
    pub fn extend(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    /// Take the next complete frame.
    ///
    /// Returns `None` when no complete frame is buffered. A decode failure is
    /// returned once, after which the offending bytes are discarded.
    pub fn next_frame(&mut self) -> Option<Result<Frame>> {
        match decode_frame(&mut self.buf, self.max_data_size) {
            Ok(Some(frame)) => Some(Ok(frame)),
            Ok(None) => None,
            Err(err) => {
                self.resync();
                Some(Err(err))
            }
        }
    }

    /// True while the buffer ends inside a frame.
    ///
    /// Used by readers to decide whether a full-block read must be followed
    /// by another read.
    pub fn needs_more(&self) -> bool {
        let mut offset = 0;
        while offset < self.buf.len() {
            match frame_len(&self.buf[offset..], self.max_data_size) {
                Ok(Some(total)) if offset + total <= self.buf.len() => offset += total,
                Ok(_) => return true,
                // Garbage is dealt with by `next_frame`, not by reading more.
                Err(_) => return false,
            }
        }
        false
    }

    /// Number of buffered bytes not yet returned as frames.
    pub fn buffered(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Drop everything buffered, e.g. after a reconnect.
    pub fn clear(&mut self) {
        self.buf.clear();
    }

    fn resync(&mut self) {
        let skip = self.buf[1.min(self.buf.len())..]
            .windows(MAGIC.len())
            .position(|window| window == MAGIC)
            .map(|pos| pos + 1)
            .unwrap_or_else(|| self.buf.len() - partial_magic_suffix(&self.buf));
        let skip = skip.max(1).min(self.buf.len());
        trace!(skip, "discarding bytes to resynchronise on frame magic");
        self.buf.advance(skip);
    }
}

/// Length of the longest suffix of `buf` that is a proper prefix of the magic.
fn partial_magic_suffix(buf: &[u8]) -> usize {
    (1..MAGIC.len())
        .rev()
        .find(|&len| len < buf.len() && buf.ends_with(&MAGIC[..len]))
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::Frame;
    use crate::command::CommandCode;
    use crate::error::FrameError;

    fn wire(code: &str, arg: &str) -> Vec<u8> {
        Frame::new(code.parse::<CommandCode>().unwrap(), arg)
            .to_bytes()
            .unwrap()
            .to_vec()
    }

    #[test]
    fn splits_coalesced_frames() {
        let mut asm = FrameAssembler::default();
        asm.extend(&wire("NLS", "A0-Menu"));
        asm.extend(&wire("PWR", "01"));

        let first = asm.next_frame().unwrap().unwrap();
        let second = asm.next_frame().unwrap().unwrap();
        assert_eq!(first.command.as_str(), "NLS");
        assert_eq!(second.command.as_str(), "PWR");
        assert!(asm.next_frame().is_none());
        assert!(asm.is_empty());
    }

    #[test]
    fn keeps_partial_tail_until_complete() {
        let bytes = wire("MVL", "2A");
        let mut asm = FrameAssembler::default();
        asm.extend(&bytes[..10]);
        assert!(asm.needs_more());
        assert!(asm.next_frame().is_none());

        asm.extend(&bytes[10..]);
        assert!(!asm.needs_more());
        let frame = asm.next_frame().unwrap().unwrap();
        assert_eq!(frame.argument, "2A");
    }

    #[test]
    fn resyncs_after_garbage() {
        let mut asm = FrameAssembler::default();
        asm.extend(b"junk!");
        asm.extend(&wire("PWR", "00"));

        let err = asm.next_frame().unwrap().unwrap_err();
        assert!(matches!(err, FrameError::Malformed(_)));

        let frame = asm.next_frame().unwrap().unwrap();
        assert_eq!(frame.argument, "00");
    }

    #[test]
    fn skips_frame_with_bad_version() {
        let mut bad = wire("PWR", "01");
        bad[12] = 9;
        let mut asm = FrameAssembler::default();
        asm.extend(&bad);
        asm.extend(&wire("AMT", "00"));

        let err = asm.next_frame().unwrap().unwrap_err();
        assert!(matches!(err, FrameError::UnsupportedVersion(9)));
        let frame = asm.next_frame().unwrap().unwrap();
        assert_eq!(frame.command.as_str(), "AMT");
    }

    #[test]
    fn keeps_partial_magic_after_garbage() {
        let frame = wire("PWR", "01");
        let mut asm = FrameAssembler::default();
        asm.extend(b"xxxxIS");

        assert!(asm.next_frame().unwrap().is_err());
        assert_eq!(asm.buffered(), 2);

        asm.extend(&frame[2..]);
        let decoded = asm.next_frame().unwrap().unwrap();
        assert_eq!(decoded.argument, "01");
    }

    #[test]
    fn clear_drops_buffered_bytes() {
        let mut asm = FrameAssembler::default();
        asm.extend(&wire("PWR", "01")[..5]);
        asm.clear();
        assert!(asm.is_empty());
        assert!(!asm.needs_more());
    }
}
