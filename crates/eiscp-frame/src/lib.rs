//! eISCP wire framing.
//!
//! Every message on the wire is an ISCP packet wrapped in an eISCP header:
//! - The 4-byte ASCII magic `ISCP`
//! - A 4-byte big-endian header size (always 16)
//! - A 4-byte big-endian data size
//! - A version byte (always 1) and 3 reserved bytes
//! - The data: `!`, a destination-type byte, a 3-character command code,
//!   the ASCII argument and a terminator
//!
//! Devices have no length-prefixed read primitive of their own, so the reader
//! assembles replies from fixed-size block reads and splits them on the
//! header's data size. No partial reads, no buffer management in user code.

pub mod assembler;
pub mod codec;
pub mod command;
pub mod error;
pub mod reader;
pub mod writer;

pub use assembler::FrameAssembler;
pub use codec::{
    decode_frame, encode_frame, parse_frame, Frame, FrameConfig, DEFAULT_BLOCK_SIZE,
    DEFAULT_MAX_DATA_SIZE, DEFAULT_READ_TIMEOUT, DEFAULT_SETTLE_DELAY, HEADER_SIZE, MAGIC,
    PROTOCOL_VERSION,
};
pub use command::{CommandCode, DestinationType, NOT_AVAILABLE, QUERY};
pub use error::{FrameError, Result};
pub use reader::FrameReader;
pub use writer::FrameWriter;
